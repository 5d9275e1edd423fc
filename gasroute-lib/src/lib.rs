pub mod catalog;
pub mod display;
pub mod error;
pub mod geo;
pub mod location;
pub mod ranking;
pub mod route;
pub mod station;

pub use catalog::{Catalog, SAMPLE_CATALOG};
pub use display::{DisplayMode, DisplayResult, DisplayState, DEFAULT_RADIUS_KM};
pub use error::GasRouteError;
pub use geo::{distance_km, Coordinate};
pub use location::{LocationResolver, LocationSource, LocationStatus, UserLocation};
pub use ranking::{rank_cheapest_offers, rank_nearest, FuelFilter, RankedOffer, RankedStation, MAX_RESULTS};
pub use route::{RouteClient, RoutePlan};
pub use station::{FuelOffer, Station};
