//! Great-circle distance between coordinate pairs.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0088;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Haversine distance in kilometers.
pub fn distance_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlat = (to.lat - from.lat).to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Distances under 3 km read better in meters.
pub fn distance_to_string(distance_in_km: f64) -> String {
    if distance_in_km > 3.0 {
        format!("{} km", distance_in_km as i64)
    } else {
        format!("{} m", (distance_in_km * 1000.0) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        let point = Coordinates::new(50.06, 19.94);
        assert!(distance_km(point, point) < 1e-9);
    }

    #[test]
    fn krakow_to_warsaw_is_about_252_km() {
        let krakow = Coordinates::new(50.0614, 19.9366);
        let warsaw = Coordinates::new(52.2297, 21.0122);
        let distance = distance_km(krakow, warsaw);
        assert!((distance - 252.0).abs() < 5.0, "got {distance}");
    }

    #[test]
    fn crossing_the_antimeridian_stays_short() {
        let east = Coordinates::new(0.0, 179.9);
        let west = Coordinates::new(0.0, -179.9);
        assert!(distance_km(east, west) < 30.0);
    }

    #[test]
    fn short_distances_render_in_meters() {
        assert_eq!(distance_to_string(0.25), "250 m");
        assert_eq!(distance_to_string(2.999), "2999 m");
        assert_eq!(distance_to_string(12.7), "12 km");
    }
}
