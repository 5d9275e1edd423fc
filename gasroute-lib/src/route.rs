use std::time::Duration;
use log::{debug, error};
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use url::Url;
use crate::error::GasRouteError;
use crate::geo::Coordinate;
use crate::location::{DEFAULT_LOOKUP_TIMEOUT, USER_AGENT_VALUE};

pub static DEFAULT_ROUTING_ENDPOINT: &'static str = "https://router.project-osrm.org/";

/// A driving route ready to draw: endpoints, map centre and the polyline.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RoutePlan {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub center: Coordinate,
    pub distance_km: f64,
    pub duration_s: f64,
    pub path: Vec<Coordinate>,
}

#[derive(Deserialize, Debug)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize, Debug)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
}

// GeoJSON LineString, positions are [lon, lat]
#[derive(Deserialize, Debug)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

/// Client for an OSRM-compatible `/route/v1/driving` service.
#[derive(Clone, Debug)]
pub struct RouteClient {
    client: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl RouteClient {
    pub fn new(client: reqwest::Client) -> Result<Self, GasRouteError> {
        Ok(Self {
            client,
            base: Url::parse(DEFAULT_ROUTING_ENDPOINT)?,
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        })
    }

    pub fn with_base(mut self, base: Url) -> Self {
        self.base = base;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn route_url(&self, origin: Coordinate, destination: Coordinate) -> Result<Url, GasRouteError> {
        let waypoints = format!(
            "{},{};{},{}",
            origin.longitude, origin.latitude, destination.longitude, destination.latitude
        );

        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| GasRouteError::InvalidEndpoint(self.base.to_string()))?
            .pop_if_empty()
            .extend(["route", "v1", "driving", waypoints.as_str()]);
        url.query_pairs_mut()
            .clear()
            .append_pair("overview", "full")
            .append_pair("geometries", "geojson");

        Ok(url)
    }

    pub async fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RoutePlan, GasRouteError> {
        let url = self.route_url(origin, destination)?;
        debug!("requesting route {}", url);

        let plan = self.fetch(&url, origin, destination).await;
        if let Err(err) = &plan {
            error!("routing {} -> {} failed: {}", origin, destination, err);
        }
        plan
    }

    async fn fetch(&self, url: &Url, origin: Coordinate, destination: Coordinate) -> Result<RoutePlan, GasRouteError> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, USER_AGENT_VALUE)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GasRouteError::UnexpectedStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.json::<OsrmResponse>().await?;
        if body.code != "Ok" {
            return Err(GasRouteError::InvalidResponse {
                provider: "osrm",
                reason: body.message.unwrap_or(body.code),
            });
        }

        let route = body
            .routes
            .into_iter()
            .next()
            .ok_or(GasRouteError::NoRoute { from: origin, to: destination })?;

        Ok(RoutePlan {
            origin,
            destination,
            center: origin.midpoint(&destination),
            distance_km: route.distance / 1000.0,
            duration_s: route.duration,
            path: route
                .geometry
                .coordinates
                .into_iter()
                .map(|[lon, lat]| Coordinate::new(lat, lon))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALENCIA: Coordinate = Coordinate::new(39.4676, -0.3771);
    const GALP: Coordinate = Coordinate::new(39.47, -0.3765);

    fn client_for(server: &MockServer) -> RouteClient {
        RouteClient::new(reqwest::Client::new())
            .unwrap()
            .with_base(Url::parse(&server.uri()).unwrap())
            .with_timeout(Duration::from_millis(500))
    }

    #[test]
    fn url_puts_longitude_first() {
        let client = RouteClient::new(reqwest::Client::new()).unwrap();
        let url = client.route_url(VALENCIA, GALP).unwrap();
        assert_eq!(
            url.as_str(),
            "https://router.project-osrm.org/route/v1/driving/-0.3771,39.4676;-0.3765,39.47?overview=full&geometries=geojson"
        );
    }

    #[test]
    fn url_keeps_base_path_prefix() {
        let client = RouteClient::new(reqwest::Client::new())
            .unwrap()
            .with_base(Url::parse("http://localhost:5000/osrm").unwrap());
        let url = client.route_url(VALENCIA, GALP).unwrap();
        assert!(url.as_str().starts_with("http://localhost:5000/osrm/route/v1/driving/"));
    }

    #[tokio::test]
    async fn parses_geojson_route() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/route/v1/driving/-0.3771,39.4676;-0.3765,39.47"))
            .and(query_param("geometries", "geojson"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "Ok",
                "routes": [{
                    "distance": 412.5,
                    "duration": 61.2,
                    "geometry": {
                        "type": "LineString",
                        "coordinates": [[-0.3771, 39.4676], [-0.3768, 39.4688], [-0.3765, 39.47]]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let plan = client_for(&server).route(VALENCIA, GALP).await.unwrap();
        assert_eq!(plan.path.len(), 3);
        assert_eq!(plan.path[0], VALENCIA);
        assert_eq!(plan.path[2], GALP);
        assert!((plan.distance_km - 0.4125).abs() < 1e-9);
        assert_eq!(plan.center, VALENCIA.midpoint(&GALP));
    }

    #[tokio::test]
    async fn empty_routes_is_no_route() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": "Ok", "routes": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server).route(VALENCIA, GALP).await.unwrap_err();
        assert!(matches!(err, GasRouteError::NoRoute { .. }));
    }

    #[tokio::test]
    async fn error_code_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "NoSegment",
                "message": "Could not find a matching segment"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).route(VALENCIA, GALP).await.unwrap_err();
        assert!(err.to_string().contains("matching segment"));
    }

    #[tokio::test]
    async fn http_failure_is_unexpected_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client_for(&server).route(VALENCIA, GALP).await.unwrap_err();
        assert!(matches!(err, GasRouteError::UnexpectedStatus { status: 429, .. }));
    }
}
