use std::hash::{Hash, Hasher};
use convert_case::{Case, Casing};
use ordered_float::NotNan;
use serde::{Deserialize, Serialize, Serializer};
use serde::ser::SerializeStruct;
use crate::error::GasRouteError;
use crate::geo::Coordinate;

/// A fuel sold at a station, e.g. "Gasolina 95 E5" at 1.459.
#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
#[serde(try_from = "RawFuelOffer")]
pub struct FuelOffer {
    pub name: String,
    pub price: NotNan<f32>,
}

#[derive(Deserialize)]
struct RawFuelOffer {
    #[serde(alias = "label")]
    name: String,
    price: f32,
}

impl TryFrom<RawFuelOffer> for FuelOffer {
    type Error = GasRouteError;

    fn try_from(raw: RawFuelOffer) -> Result<Self, Self::Error> {
        FuelOffer::new(raw.name, raw.price)
    }
}

impl Serialize for FuelOffer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer
    {
        let mut s = serializer.serialize_struct("FuelOffer", 3)?;
        s.serialize_field("id", &self.id())?;
        s.serialize_field("label", &self.name)?;
        s.serialize_field("price", &self.price.into_inner())?;
        s.end()
    }
}

impl FuelOffer {
    pub fn new(name: impl Into<String>, price: f32) -> Result<Self, GasRouteError> {
        let name = name.into();
        if !price.is_finite() || price < 0.0 {
            return Err(GasRouteError::InvalidPrice { offer: name, price });
        }
        match NotNan::new(price) {
            Ok(price) => Ok(Self { name, price }),
            Err(_) => Err(GasRouteError::InvalidPrice { offer: name, price }),
        }
    }

    /// Stable snake_case identifier derived from the display name.
    pub fn id(&self) -> String {
        self.name.to_case(Case::Snake)
    }

    /// Case-insensitive substring match; `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(alias = "brand")]
    pub operator_brand: String,
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub offers: Vec<FuelOffer>,
}

impl Station {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    pub fn offers_matching<'a>(&'a self, needle: &'a str) -> impl Iterator<Item = &'a FuelOffer> + 'a {
        self.offers.iter().filter(move |offer| offer.matches(needle))
    }
}

impl Hash for Station {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialEq for Station {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Station {
    //
}
