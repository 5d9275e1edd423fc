use thiserror::Error;

use crate::geo::Coordinate;

#[derive(Debug, Error)]
pub enum GasRouteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid response from {provider}: {reason}")]
    InvalidResponse {
        provider: &'static str,
        reason: String,
    },

    #[error("no route found between {from} and {to}")]
    NoRoute { from: Coordinate, to: Coordinate },

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("endpoint URL cannot carry a path: {0}")]
    InvalidEndpoint(String),

    #[error("cannot read catalog {path}: {source}")]
    CatalogIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse catalog: {0}")]
    CatalogParse(#[from] serde_json::Error),

    #[error("duplicate station id '{0}' in catalog")]
    DuplicateStation(String),

    #[error("invalid price {price} for offer '{offer}'")]
    InvalidPrice { offer: String, price: f32 },
}
