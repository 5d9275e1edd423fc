use actix_web::http::StatusCode;
use actix_web::{get, patch, post, web, App, HttpResponse, HttpServer, Responder, ResponseError};
use chrono::{DateTime, Utc};
use gasroute_lib::location::{DEFAULT_FALLBACK, DEFAULT_IP_LOOKUP_ENDPOINT};
use gasroute_lib::route::DEFAULT_ROUTING_ENDPOINT;
use gasroute_lib::{
    rank_cheapest_offers, rank_nearest, Catalog, Coordinate, DisplayMode, DisplayState,
    LocationResolver, LocationStatus, RouteClient, DEFAULT_RADIUS_KM,
};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use url::Url;

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_ip_lookup_url() -> String {
    DEFAULT_IP_LOOKUP_ENDPOINT.to_string()
}

fn default_routing_url() -> String {
    DEFAULT_ROUTING_ENDPOINT.to_string()
}

fn default_lookup_timeout_secs() -> u64 {
    5
}

fn default_radius_km() -> f64 {
    DEFAULT_RADIUS_KM
}

fn default_fallback_latitude() -> f64 {
    DEFAULT_FALLBACK.latitude
}

fn default_fallback_longitude() -> f64 {
    DEFAULT_FALLBACK.longitude
}

#[derive(Deserialize, Clone, Debug)]
struct Config {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_ip_lookup_url")]
    ip_lookup_url: String,
    #[serde(default = "default_routing_url")]
    routing_url: String,
    #[serde(default = "default_lookup_timeout_secs")]
    lookup_timeout_secs: u64,
    #[serde(default = "default_radius_km")]
    default_radius_km: f64,
    #[serde(default = "default_fallback_latitude")]
    fallback_latitude: f64,
    #[serde(default = "default_fallback_longitude")]
    fallback_longitude: f64,
    #[serde(default)]
    catalog_path: Option<String>,
    #[serde(default)]
    offline: bool,
}

impl Config {
    fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    fn fallback(&self) -> Coordinate {
        Coordinate::new(self.fallback_latitude, self.fallback_longitude)
    }

    fn validate(&self) -> std::io::Result<()> {
        if !(self.default_radius_km.is_finite() && self.default_radius_km >= 0.0) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("DEFAULT_RADIUS_KM must be a finite, non-negative number, got {}", self.default_radius_km),
            ));
        }
        Ok(())
    }
}

struct AppState {
    catalog: Catalog,
    location: LocationStatus,
    display: DisplayState,
    default_radius_km: f64,
    started_at: DateTime<Utc>,
}

impl AppState {
    fn new(catalog: Catalog, default_radius_km: f64) -> Self {
        Self {
            catalog,
            location: LocationStatus::Unresolved,
            display: DisplayState::new(default_radius_km),
            default_radius_km,
            started_at: Utc::now(),
        }
    }

    fn origin(&self) -> Option<Coordinate> {
        self.location.origin()
    }
}

type SharedState = web::Data<Arc<RwLock<AppState>>>;

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
struct ApiError(StatusCode, String);

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.1)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.0
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.0).json(ApiErrorBody {
            error: self.1.clone(),
            code: self.0.as_u16(),
        })
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

fn read_state(state: &SharedState) -> Result<RwLockReadGuard<'_, AppState>, ApiError> {
    state
        .read()
        .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "state lock poisoned"))
}

fn write_state(state: &SharedState) -> Result<RwLockWriteGuard<'_, AppState>, ApiError> {
    state
        .write()
        .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "state lock poisoned"))
}

fn validate_radius(radius: f64) -> Result<f64, ApiError> {
    if radius.is_finite() && radius >= 0.0 {
        Ok(radius)
    } else {
        Err(api_error(StatusCode::BAD_REQUEST, format!("invalid radius {}", radius)))
    }
}

#[derive(Deserialize, Debug)]
struct RankParams {
    radius: Option<f64>,
    fuel: Option<String>,
}

/// `located` tells "no matches" apart from "location not known yet".
#[derive(Serialize)]
struct RankResponse<T: Serialize> {
    located: bool,
    radius_km: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    fuel: Option<String>,
    results: Vec<T>,
}

#[derive(Deserialize, Debug, Default)]
struct FilterUpdate {
    fuel: Option<String>,
    radius: Option<f64>,
}

#[derive(Serialize)]
struct VersionInfo {
    version: &'static str,
    started_at: DateTime<Utc>,
}

#[get("/location")]
async fn get_location(data: SharedState) -> Result<impl Responder, ApiError> {
    let state = read_state(&data)?;
    Ok(web::Json(state.location.clone()))
}

#[get("/stations")]
async fn get_stations(data: SharedState) -> Result<impl Responder, ApiError> {
    let state = read_state(&data)?;
    Ok(web::Json(state.catalog.stations().to_vec()))
}

#[get("/stations/nearest")]
async fn get_nearest(data: SharedState, params: web::Query<RankParams>) -> Result<impl Responder, ApiError> {
    let state = read_state(&data)?;
    let radius_km = validate_radius(params.radius.unwrap_or(state.default_radius_km))?;
    let results = rank_nearest(state.catalog.stations(), state.origin(), radius_km, params.fuel.as_deref());

    debug!("nearest within {} km -> {} stations", radius_km, results.len());

    Ok(web::Json(RankResponse {
        located: state.location.is_resolved(),
        radius_km,
        fuel: params.fuel.clone(),
        results,
    }))
}

#[get("/stations/cheapest")]
async fn get_cheapest(data: SharedState, params: web::Query<RankParams>) -> Result<impl Responder, ApiError> {
    let state = read_state(&data)?;
    let radius_km = validate_radius(params.radius.unwrap_or(state.default_radius_km))?;
    let results = rank_cheapest_offers(state.catalog.stations(), state.origin(), radius_km, params.fuel.as_deref());

    debug!("cheapest within {} km -> {} offers", radius_km, results.len());

    Ok(web::Json(RankResponse {
        located: state.location.is_resolved(),
        radius_km,
        fuel: params.fuel.clone(),
        results,
    }))
}

#[get("/stations/{id}/route")]
async fn get_route(
    data: SharedState,
    routes: web::Data<RouteClient>,
    path: web::Path<String>,
) -> Result<impl Responder, ApiError> {
    let id = path.into_inner();

    // the lock must not be held across the routing call
    let (origin, destination) = {
        let state = read_state(&data)?;
        let station = state
            .catalog
            .get(&id)
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("unknown station '{}'", id)))?;
        let origin = state
            .origin()
            .ok_or_else(|| api_error(StatusCode::CONFLICT, "location not resolved yet"))?;
        (origin, station.coordinate())
    };

    let plan = routes
        .route(origin, destination)
        .await
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e.to_string()))?;

    Ok(web::Json(plan))
}

#[get("/display")]
async fn get_display(data: SharedState) -> Result<impl Responder, ApiError> {
    let state = read_state(&data)?;
    Ok(web::Json(state.display.clone()))
}

fn switch_display(data: &SharedState, mode: DisplayMode) -> Result<DisplayState, ApiError> {
    let mut guard = write_state(data)?;
    let state = &mut *guard;
    state.display.show(mode, state.catalog.stations(), state.location.origin());

    info!("showing {} ({} rows)", mode, state.display.result.len());
    Ok(state.display.clone())
}

#[post("/display/nearest")]
async fn show_nearest(data: SharedState) -> Result<impl Responder, ApiError> {
    Ok(web::Json(switch_display(&data, DisplayMode::Nearest)?))
}

#[post("/display/cheapest")]
async fn show_cheapest(data: SharedState) -> Result<impl Responder, ApiError> {
    Ok(web::Json(switch_display(&data, DisplayMode::Cheapest)?))
}

#[patch("/display/filters")]
async fn update_filters(data: SharedState, update: web::Json<FilterUpdate>) -> Result<impl Responder, ApiError> {
    let update = update.into_inner();
    let radius = update.radius.map(validate_radius).transpose()?;

    let mut guard = write_state(&data)?;
    let state = &mut *guard;
    let origin = state.location.origin();

    if let Some(radius) = radius {
        state.display.set_radius(radius, state.catalog.stations(), origin);
    }
    if let Some(fuel) = update.fuel {
        state.display.set_fuel_filter(Some(fuel), state.catalog.stations(), origin);
    }

    Ok(web::Json(state.display.clone()))
}

#[get("/version")]
async fn get_version(data: SharedState) -> Result<impl Responder, ApiError> {
    let state = read_state(&data)?;
    Ok(web::Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
    }))
}

fn services(cfg: &mut web::ServiceConfig) {
    cfg.service(get_location)
        .service(get_nearest)
        .service(get_cheapest)
        .service(get_stations)
        .service(get_route)
        .service(get_display)
        .service(show_nearest)
        .service(show_cheapest)
        .service(update_filters)
        .service(get_version);
}

fn load_catalog(config: &Config) -> std::io::Result<Catalog> {
    match &config.catalog_path {
        Some(path) => {
            let catalog = Catalog::from_path(path).map_err(std::io::Error::other)?;
            info!("loaded {} stations from {}", catalog.len(), path);
            Ok(catalog)
        }
        None => {
            let catalog = Catalog::sample();
            info!("using built-in sample catalog ({} stations)", catalog.len());
            Ok(catalog)
        }
    }
}

fn build_clients(config: &Config) -> std::io::Result<(LocationResolver, RouteClient)> {
    let client = reqwest::Client::builder()
        .timeout(config.lookup_timeout())
        .build()
        .map_err(std::io::Error::other)?;

    let ip_lookup = Url::parse(&config.ip_lookup_url).map_err(std::io::Error::other)?;
    let routing = Url::parse(&config.routing_url).map_err(std::io::Error::other)?;

    let resolver = LocationResolver::new(client.clone())
        .map_err(std::io::Error::other)?
        .with_endpoint(ip_lookup)
        .with_fallback(config.fallback())
        .with_timeout(config.lookup_timeout())
        .offline(config.offline);

    let routes = RouteClient::new(client)
        .map_err(std::io::Error::other)?
        .with_base(routing)
        .with_timeout(config.lookup_timeout());

    Ok((resolver, routes))
}

/// Resolves once; later calls leave an existing location untouched.
async fn resolve_location(resolver: LocationResolver, data: SharedState) {
    debug!("resolving user location");

    let location = resolver.resolve().await;

    let mut guard = match data.write() {
        Ok(guard) => guard,
        Err(_) => {
            error!("state lock poisoned, location not stored");
            return;
        }
    };

    if guard.location.is_resolved() {
        warn!("location already resolved, ignoring {}", location.coordinate());
        return;
    }

    info!("user location {} via {}", location.coordinate(), location.source);
    let state = &mut *guard;
    state.location = LocationStatus::Resolved(location);

    // a view opened before resolution was empty; fill it now
    if let Some(mode) = state.display.mode() {
        state.display.show(mode, state.catalog.stations(), state.location.origin());
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = envy::from_env::<Config>().map_err(std::io::Error::other)?;
    config.validate()?;
    let address = format!("{}:{}", config.host, config.port);

    let catalog = load_catalog(&config)?;
    let (resolver, routes) = build_clients(&config)?;

    let data = web::Data::new(Arc::new(RwLock::new(AppState::new(catalog, config.default_radius_km))));
    let routes = web::Data::new(routes);

    let resolution = tokio::spawn(resolve_location(resolver, data.clone()));

    info!("starting http server @ {}", address.clone());

    let result = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .app_data(routes.clone())
            .configure(services)
    })
        .bind(address)?
        .run()
        .await;

    resolution.abort();
    result
}
