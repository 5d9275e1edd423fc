use std::sync::Arc;
use ordered_float::NotNan;
use serde::Serialize;
use crate::geo::{distance_km, Coordinate};
use crate::station::{FuelOffer, Station};

/// Maximum number of entries either view returns.
pub const MAX_RESULTS: usize = 5;

#[derive(Clone, Serialize, Debug)]
pub struct RankedStation {
    pub station: Arc<Station>,
    pub distance_km: f64,
}

#[derive(Clone, Serialize, Debug)]
pub struct RankedOffer {
    pub station: Arc<Station>,
    pub distance_km: f64,
    pub offer_name: String,
    pub price: NotNan<f32>,
}

/// Lowercased, trimmed fuel-name needle. Blank input means no filter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FuelFilter(Option<String>);

impl FuelFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        let needle = raw
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        Self(needle)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn accepts_station(&self, station: &Station) -> bool {
        match &self.0 {
            Some(needle) => station.offers_matching(needle).next().is_some(),
            None => true,
        }
    }

    pub fn accepts_offer(&self, offer: &FuelOffer) -> bool {
        match &self.0 {
            Some(needle) => offer.matches(needle),
            None => true,
        }
    }
}

fn within_radius(stations: &[Arc<Station>], origin: Coordinate, radius_km: f64) -> Vec<RankedStation> {
    // also rejects a NaN radius
    if !(radius_km >= 0.0) {
        return Vec::new();
    }

    stations
        .iter()
        .map(|station| RankedStation {
            distance_km: distance_km(origin, station.coordinate()),
            station: Arc::clone(station),
        })
        .filter(|ranked| ranked.distance_km <= radius_km)
        .collect()
}

/// Up to five stations within `radius_km` of `origin`, nearest first.
///
/// With a fuel filter only stations selling at least one matching fuel are
/// kept. Equal distances keep catalog order. No origin yields an empty list.
pub fn rank_nearest(
    stations: &[Arc<Station>],
    origin: Option<Coordinate>,
    radius_km: f64,
    fuel_filter: Option<&str>,
) -> Vec<RankedStation> {
    let Some(origin) = origin else {
        return Vec::new();
    };
    let filter = FuelFilter::parse(fuel_filter);

    let mut ranked: Vec<RankedStation> = within_radius(stations, origin, radius_km)
        .into_iter()
        .filter(|r| filter.accepts_station(&r.station))
        .collect();

    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked.truncate(MAX_RESULTS);
    ranked
}

/// Up to five fuel offers from stations within `radius_km`, cheapest first.
///
/// The fuel filter applies per offer, so one station may contribute several
/// entries. Equal prices keep catalog order, then each station's offer order.
pub fn rank_cheapest_offers(
    stations: &[Arc<Station>],
    origin: Option<Coordinate>,
    radius_km: f64,
    fuel_filter: Option<&str>,
) -> Vec<RankedOffer> {
    let Some(origin) = origin else {
        return Vec::new();
    };
    let filter = FuelFilter::parse(fuel_filter);

    let mut offers: Vec<RankedOffer> = within_radius(stations, origin, radius_km)
        .into_iter()
        .flat_map(|ranked| {
            let filter = &filter;
            ranked
                .station
                .offers
                .iter()
                .filter(move |offer| filter.accepts_offer(offer))
                .map(|offer| RankedOffer {
                    station: Arc::clone(&ranked.station),
                    distance_km: ranked.distance_km,
                    offer_name: offer.name.clone(),
                    price: offer.price,
                })
                .collect::<Vec<_>>()
        })
        .collect();

    offers.sort_by_key(|offer| offer.price);
    offers.truncate(MAX_RESULTS);
    offers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    const VALENCIA: Coordinate = Coordinate::new(39.4676, -0.3771);

    fn station(id: &str, latitude: f64, longitude: f64, offers: &[(&str, f32)]) -> Arc<Station> {
        Arc::new(Station {
            id: id.to_string(),
            name: format!("Station {}", id),
            latitude,
            longitude,
            operator_brand: "TEST".to_string(),
            schedule: "24h".to_string(),
            offers: offers
                .iter()
                .map(|(name, price)| FuelOffer::new(*name, *price).unwrap())
                .collect(),
        })
    }

    fn ids(ranked: &[RankedStation]) -> Vec<&str> {
        ranked.iter().map(|r| r.station.id.as_str()).collect()
    }

    #[test]
    fn nearest_within_three_km_of_valencia() {
        let catalog = Catalog::sample();
        let ranked = rank_nearest(catalog.stations(), Some(VALENCIA), 3.0, None);

        assert_eq!(ids(&ranked), vec!["G5", "G6", "G2"]);
        assert!(ranked.iter().all(|r| r.distance_km <= 3.0));
        assert!(ranked.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
        assert!((ranked[0].distance_km - 0.27).abs() < 0.05);
    }

    #[test]
    fn nearest_is_capped_at_five() {
        let catalog = Catalog::sample();
        let ranked = rank_nearest(catalog.stations(), Some(VALENCIA), 10.0, None);

        assert_eq!(ranked.len(), MAX_RESULTS);
        // Alcampo is the farthest of the six and falls off the end
        assert_eq!(ids(&ranked), vec!["G5", "G6", "G2", "G4", "G3"]);
    }

    #[test]
    fn nearest_filters_stations_by_fuel_name() {
        let catalog = Catalog::sample();

        let ranked = rank_nearest(catalog.stations(), Some(VALENCIA), 3.0, Some("98"));
        assert_eq!(ids(&ranked), vec!["G6"]);

        let ranked = rank_nearest(catalog.stations(), Some(VALENCIA), 3.0, Some("  DIESEL "));
        assert_eq!(ids(&ranked), vec!["G5", "G6", "G2"]);
    }

    #[test]
    fn filter_is_applied_before_truncation() {
        let stations: Vec<_> = (0..6)
            .map(|i| station(&format!("D{}", i), 0.0, i as f64 * 0.001, &[("Diesel A", 1.0)]))
            .chain(std::iter::once(station("LPG", 0.0, 0.01, &[("GLP", 0.9)])))
            .collect();

        let ranked = rank_nearest(&stations, Some(Coordinate::new(0.0, 0.0)), 5.0, Some("glp"));
        assert_eq!(ids(&ranked), vec!["LPG"]);
    }

    #[test]
    fn equal_distances_keep_catalog_order() {
        let stations = vec![
            station("B", 0.0, 0.01, &[("Diesel A", 1.0)]),
            station("A", 0.0, -0.01, &[("Diesel A", 1.0)]),
            station("C", 0.0, 0.0, &[("Diesel A", 1.0)]),
        ];
        let ranked = rank_nearest(&stations, Some(Coordinate::new(0.0, 0.0)), 5.0, None);
        assert_eq!(ids(&ranked), vec!["C", "B", "A"]);
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let catalog = Catalog::sample();
        let target = catalog.get("G2").unwrap();
        let radius = distance_km(VALENCIA, target.coordinate());

        let ranked = rank_nearest(catalog.stations(), Some(VALENCIA), radius, None);
        assert_eq!(ids(&ranked).last(), Some(&"G2"));

        let offers = rank_cheapest_offers(catalog.stations(), Some(VALENCIA), radius, Some("95"));
        assert!(offers.iter().any(|o| o.station.id == "G2"));
    }

    #[test]
    fn zero_radius_keeps_only_colocated_stations() {
        let stations = vec![
            station("HERE", 1.0, 1.0, &[("Diesel A", 1.0)]),
            station("NEAR", 1.0, 1.0001, &[("Diesel A", 1.0)]),
        ];
        let ranked = rank_nearest(&stations, Some(Coordinate::new(1.0, 1.0)), 0.0, None);
        assert_eq!(ids(&ranked), vec!["HERE"]);
    }

    #[test]
    fn no_origin_or_empty_catalog_gives_empty_results() {
        let catalog = Catalog::sample();
        assert!(rank_nearest(catalog.stations(), None, 100.0, None).is_empty());
        assert!(rank_cheapest_offers(catalog.stations(), None, 100.0, None).is_empty());
        assert!(rank_nearest(&[], Some(VALENCIA), 100.0, None).is_empty());
        assert!(rank_cheapest_offers(&[], Some(VALENCIA), 100.0, None).is_empty());
    }

    #[test]
    fn negative_or_nan_radius_gives_empty_results() {
        let catalog = Catalog::sample();
        assert!(rank_nearest(catalog.stations(), Some(VALENCIA), -1.0, None).is_empty());
        assert!(rank_cheapest_offers(catalog.stations(), Some(VALENCIA), f64::NAN, None).is_empty());
    }

    #[test]
    fn unmatched_filter_gives_empty_results() {
        let catalog = Catalog::sample();
        assert!(rank_nearest(catalog.stations(), Some(VALENCIA), 50.0, Some("hydrogen")).is_empty());
        assert!(rank_cheapest_offers(catalog.stations(), Some(VALENCIA), 50.0, Some("hydrogen")).is_empty());
    }

    #[test]
    fn cheapest_95_near_valencia() {
        let catalog = Catalog::sample();
        let offers = rank_cheapest_offers(catalog.stations(), Some(VALENCIA), 3.0, Some("95"));

        let got: Vec<_> = offers.iter().map(|o| (o.station.id.as_str(), o.price.into_inner())).collect();
        assert_eq!(got, vec![("G5", 1.599), ("G2", 1.649)]);
        assert!(offers.iter().all(|o| o.offer_name == "Gasolina 95 E5"));
    }

    #[test]
    fn cheapest_95_within_ten_km_ranks_alcampo_first() {
        let catalog = Catalog::sample();
        let offers = rank_cheapest_offers(catalog.stations(), Some(VALENCIA), 10.0, Some("95"));

        let got: Vec<_> = offers.iter().map(|o| (o.station.id.as_str(), o.price.into_inner())).collect();
        // Alcampo and Ballenoil tie at 1.459; catalog order decides
        assert_eq!(
            got,
            vec![("G1", 1.459), ("G4", 1.459), ("G3", 1.489), ("G5", 1.599), ("G2", 1.649)]
        );
        assert!(offers.iter().all(|o| o.distance_km <= 10.0));
    }

    #[test]
    fn cheapest_without_filter_expands_every_offer() {
        let catalog = Catalog::sample();
        let offers = rank_cheapest_offers(catalog.stations(), Some(VALENCIA), 3.0, None);

        let got: Vec<_> = offers
            .iter()
            .map(|o| (o.station.id.as_str(), o.offer_name.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("G5", "Diesel A"),
                ("G6", "Diesel A"),
                ("G2", "Diesel A"),
                ("G5", "Gasolina 95 E5"),
                ("G2", "Gasolina 95 E5"),
            ]
        );
        assert!(offers.windows(2).all(|w| w[0].price <= w[1].price));
    }

    #[test]
    fn one_station_can_contribute_several_offers() {
        let stations = vec![station(
            "MULTI",
            0.0,
            0.0,
            &[("Gasolina 95 E5", 1.5), ("Gasolina 95 E10", 1.4), ("Diesel A", 1.3)],
        )];
        let offers = rank_cheapest_offers(&stations, Some(Coordinate::new(0.0, 0.0)), 1.0, Some("gasolina 95"));

        let names: Vec<_> = offers.iter().map(|o| o.offer_name.as_str()).collect();
        assert_eq!(names, vec!["Gasolina 95 E10", "Gasolina 95 E5"]);
    }

    #[test]
    fn blank_filter_means_no_filter() {
        assert!(FuelFilter::parse(Some("   ")).is_empty());
        assert!(FuelFilter::parse(None).is_empty());
        assert_eq!(FuelFilter::parse(Some(" Diesel ")), FuelFilter(Some("diesel".to_string())));
    }
}
