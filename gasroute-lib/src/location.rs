//! IP-based location lookup with a fixed fallback.
//!
//! Resolution never fails from the caller's point of view: any transport
//! error, bad status, malformed payload or timeout yields the fallback
//! coordinate, tagged as such.

use std::fmt::Display;
use std::time::Duration;
use chrono::{DateTime, Utc};
use log::{info, warn};
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use url::Url;
use crate::error::GasRouteError;
use crate::geo::Coordinate;

pub static DEFAULT_IP_LOOKUP_ENDPOINT: &'static str = "http://ip-api.com/json/";

pub static USER_AGENT_VALUE: &'static str = concat!("gasroute/", env!("CARGO_PKG_VERSION"));

/// Valencia city centre.
pub const DEFAULT_FALLBACK: Coordinate = Coordinate::new(39.4676, -0.3771);

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Eq, PartialEq, Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    IpLookup,
    Fallback,
}

impl Display for LocationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationSource::IpLookup => write!(f, "IP lookup"),
            LocationSource::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub source: LocationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

impl UserLocation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    pub fn fallback(at: Coordinate) -> Self {
        Self {
            latitude: at.latitude,
            longitude: at.longitude,
            source: LocationSource::Fallback,
            city: None,
            country: None,
            resolved_at: Utc::now(),
        }
    }
}

/// Whether a location is known yet. Ranking before resolution sees no origin.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "status", content = "location", rename_all = "lowercase")]
pub enum LocationStatus {
    #[default]
    Unresolved,
    Resolved(UserLocation),
}

impl LocationStatus {
    pub fn origin(&self) -> Option<Coordinate> {
        match self {
            LocationStatus::Unresolved => None,
            LocationStatus::Resolved(location) => Some(location.coordinate()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, LocationStatus::Resolved(_))
    }
}

#[derive(Deserialize, Debug)]
struct IpApiResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LocationResolver {
    client: reqwest::Client,
    endpoint: Url,
    fallback: Coordinate,
    timeout: Duration,
    offline: bool,
}

impl LocationResolver {
    pub fn new(client: reqwest::Client) -> Result<Self, GasRouteError> {
        Ok(Self {
            client,
            endpoint: Url::parse(DEFAULT_IP_LOOKUP_ENDPOINT)?,
            fallback: DEFAULT_FALLBACK,
            timeout: DEFAULT_LOOKUP_TIMEOUT,
            offline: false,
        })
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_fallback(mut self, fallback: Coordinate) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip the network and go straight to the fallback.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub async fn resolve(&self) -> UserLocation {
        if self.offline {
            info!("offline mode, using fallback location {}", self.fallback);
            return UserLocation::fallback(self.fallback);
        }

        match self.lookup().await {
            Ok(location) => {
                info!(
                    "located via IP at {} ({})",
                    location.coordinate(),
                    location.city.as_deref().unwrap_or("unknown city")
                );
                location
            }
            Err(err) => {
                warn!("IP geolocation failed, using fallback {}: {}", self.fallback, err);
                UserLocation::fallback(self.fallback)
            }
        }
    }

    async fn lookup(&self) -> Result<UserLocation, GasRouteError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .header(USER_AGENT, USER_AGENT_VALUE)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GasRouteError::UnexpectedStatus {
                status: response.status().as_u16(),
                url: self.endpoint.to_string(),
            });
        }

        let body = response.json::<IpApiResponse>().await?;
        parse_ip_api(body)
    }
}

fn parse_ip_api(body: IpApiResponse) -> Result<UserLocation, GasRouteError> {
    let invalid = |reason: String| GasRouteError::InvalidResponse {
        provider: "ip-api",
        reason,
    };

    if body.status.as_deref() == Some("fail") {
        return Err(invalid(body.message.unwrap_or_else(|| "lookup failed".to_string())));
    }

    let (latitude, longitude) = match (body.lat, body.lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(invalid("missing coordinates".to_string())),
    };

    let coordinate = Coordinate::new(latitude, longitude);
    if !coordinate.is_valid() {
        return Err(invalid(format!("coordinates out of range {}", coordinate)));
    }

    Ok(UserLocation {
        latitude,
        longitude,
        source: LocationSource::IpLookup,
        city: body.city,
        country: body.country,
        resolved_at: Utc::now(),
    })
}
