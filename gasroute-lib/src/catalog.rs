use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use lazy_static::lazy_static;
use log::debug;
use crate::error::GasRouteError;
use crate::station::{FuelOffer, Station};

struct SampleStation {
    id: &'static str,
    name: &'static str,
    latitude: f64,
    longitude: f64,
    brand: &'static str,
    schedule: &'static str,
    offers: &'static [(&'static str, f32)],
}

const SAMPLE_STATIONS: &[SampleStation] = &[
    SampleStation {
        id: "G1",
        name: "Gasolinera Alcampo",
        latitude: 39.5340,
        longitude: -0.4170,
        brand: "ALCAMPO",
        schedule: "L-D: 24h",
        offers: &[("Gasolina 95 E5", 1.459), ("Gasolina 98 E5", 1.579), ("Diesel A", 1.399)],
    },
    SampleStation {
        id: "G2",
        name: "Repsol Primado Reig",
        latitude: 39.4820,
        longitude: -0.3690,
        brand: "REPSOL",
        schedule: "L-D: 07:00-23:00",
        offers: &[("Gasolina 95 E5", 1.649), ("Diesel A", 1.579)],
    },
    SampleStation {
        id: "G3",
        name: "CEPSA Avenida",
        latitude: 39.5365,
        longitude: -0.4040,
        brand: "CEPSA",
        schedule: "L-D: 06:00-22:00",
        offers: &[("Gasolina 95 E5", 1.489), ("Diesel A", 1.409)],
    },
    SampleStation {
        id: "G4",
        name: "BALLENOIL Burjasot",
        latitude: 39.5201,
        longitude: -0.4191,
        brand: "BALLENOIL",
        schedule: "L-D: 24h",
        offers: &[("Gasolina 95 E5", 1.459), ("Diesel A", 1.439)],
    },
    SampleStation {
        id: "G5",
        name: "Galp Valencia Centro",
        latitude: 39.4700,
        longitude: -0.3765,
        brand: "GALP",
        schedule: "L-D: 06:00-22:00",
        offers: &[("Gasolina 95 E5", 1.599), ("Diesel A", 1.529)],
    },
    SampleStation {
        id: "G6",
        name: "Repsol Portal C",
        latitude: 39.4612,
        longitude: -0.3800,
        brand: "REPSOL",
        schedule: "L-D: 24h",
        offers: &[("Gasolina 98 E5", 1.689), ("Diesel A", 1.529)],
    },
];

lazy_static! {
    pub static ref SAMPLE_CATALOG: Vec<Station> = SAMPLE_STATIONS
        .iter()
        .map(|s| Station {
            id: s.id.to_string(),
            name: s.name.to_string(),
            latitude: s.latitude,
            longitude: s.longitude,
            operator_brand: s.brand.to_string(),
            schedule: s.schedule.to_string(),
            offers: s
                .offers
                .iter()
                .filter_map(|(name, price)| FuelOffer::new(*name, *price).ok())
                .collect(),
        })
        .collect();
}

/// Read-only list of stations, in source order.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    stations: Vec<Arc<Station>>,
}

impl Catalog {
    /// The built-in Valencia sample.
    pub fn sample() -> Self {
        Self {
            stations: SAMPLE_CATALOG.iter().cloned().map(Arc::new).collect(),
        }
    }

    pub fn from_stations(stations: Vec<Station>) -> Result<Self, GasRouteError> {
        let mut seen = HashSet::new();
        for station in &stations {
            if !seen.insert(station.id.as_str()) {
                return Err(GasRouteError::DuplicateStation(station.id.clone()));
            }
        }

        Ok(Self {
            stations: stations.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, GasRouteError> {
        let stations: Vec<Station> = serde_json::from_str(json)?;
        Self::from_stations(stations)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GasRouteError> {
        let path = path.as_ref();
        debug!("loading catalog from {}", path.display());

        let json = fs::read_to_string(path).map_err(|source| GasRouteError::CatalogIo {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_json_str(&json)
    }

    pub fn stations(&self) -> &[Arc<Station>] {
        &self.stations
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Station>> {
        self.stations.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
