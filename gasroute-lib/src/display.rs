use std::fmt::Display;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use crate::geo::Coordinate;
use crate::ranking::{rank_cheapest_offers, rank_nearest, RankedOffer, RankedStation};
use crate::station::Station;

pub const DEFAULT_RADIUS_KM: f64 = 3.0;

#[derive(Eq, PartialEq, Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Nearest,
    Cheapest,
}

impl Display for DisplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayMode::Nearest => write!(f, "nearest stations"),
            DisplayMode::Cheapest => write!(f, "cheapest fuel"),
        }
    }
}

/// The one result currently shown. Switching view replaces it wholesale.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(tag = "mode", content = "results", rename_all = "lowercase")]
pub enum DisplayResult {
    #[default]
    Empty,
    Nearest(Vec<RankedStation>),
    Cheapest(Vec<RankedOffer>),
}

impl DisplayResult {
    pub fn mode(&self) -> Option<DisplayMode> {
        match self {
            DisplayResult::Empty => None,
            DisplayResult::Nearest(_) => Some(DisplayMode::Nearest),
            DisplayResult::Cheapest(_) => Some(DisplayMode::Cheapest),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DisplayResult::Empty => 0,
            DisplayResult::Nearest(stations) => stations.len(),
            DisplayResult::Cheapest(offers) => offers.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DisplayState {
    pub radius_km: f64,
    pub fuel_filter: Option<String>,
    pub result: DisplayResult,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::new(DEFAULT_RADIUS_KM)
    }
}

impl DisplayState {
    pub fn new(radius_km: f64) -> Self {
        Self {
            radius_km,
            fuel_filter: None,
            result: DisplayResult::Empty,
        }
    }

    pub fn mode(&self) -> Option<DisplayMode> {
        self.result.mode()
    }

    pub fn show(&mut self, mode: DisplayMode, stations: &[Arc<Station>], origin: Option<Coordinate>) -> &DisplayResult {
        let filter = self.fuel_filter.as_deref();
        self.result = match mode {
            DisplayMode::Nearest => {
                DisplayResult::Nearest(rank_nearest(stations, origin, self.radius_km, filter))
            }
            DisplayMode::Cheapest => {
                DisplayResult::Cheapest(rank_cheapest_offers(stations, origin, self.radius_km, filter))
            }
        };
        &self.result
    }

    pub fn show_nearest(&mut self, stations: &[Arc<Station>], origin: Option<Coordinate>) -> &DisplayResult {
        self.show(DisplayMode::Nearest, stations, origin)
    }

    pub fn show_cheapest(&mut self, stations: &[Arc<Station>], origin: Option<Coordinate>) -> &DisplayResult {
        self.show(DisplayMode::Cheapest, stations, origin)
    }

    /// Stores the filter and re-runs whichever view is active.
    pub fn set_fuel_filter(
        &mut self,
        filter: Option<String>,
        stations: &[Arc<Station>],
        origin: Option<Coordinate>,
    ) -> &DisplayResult {
        self.fuel_filter = filter
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        self.refresh(stations, origin)
    }

    pub fn set_radius(&mut self, radius_km: f64, stations: &[Arc<Station>], origin: Option<Coordinate>) -> &DisplayResult {
        self.radius_km = radius_km;
        self.refresh(stations, origin)
    }

    fn refresh(&mut self, stations: &[Arc<Station>], origin: Option<Coordinate>) -> &DisplayResult {
        match self.mode() {
            Some(mode) => self.show(mode, stations, origin),
            None => &self.result,
        }
    }
}
