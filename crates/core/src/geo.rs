//! Geolocation helpers.
//!
//! Distance is a pure function of two coordinate pairs; nothing here touches
//! stores or carries invariants.

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate pair (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, in kilometers (haversine).
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat_a, lat_b) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_to_self() {
        let p = GeoPoint::new(28.6139, 77.2090);
        assert!(distance_km(p, p) < 1e-9);
    }

    #[test]
    fn distance_is_symmetric() {
        let delhi = GeoPoint::new(28.6139, 77.2090);
        let mumbai = GeoPoint::new(19.0760, 72.8777);
        let there = distance_km(delhi, mumbai);
        let back = distance_km(mumbai, delhi);
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn delhi_to_mumbai_is_roughly_1150_km() {
        let delhi = GeoPoint::new(28.6139, 77.2090);
        let mumbai = GeoPoint::new(19.0760, 72.8777);
        let d = distance_km(delhi, mumbai);
        assert!((1100.0..1200.0).contains(&d), "got {d}");
    }
}
