/// A validated WGS84 position in degrees.
///
/// Construction goes through [`GeoPoint::new`], so holding a `GeoPoint` means
/// the coordinates are finite and inside the valid lat/lon ranges.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

impl GeoPoint {
    /// Returns `None` for non-finite values, out-of-range values and the
    /// `(0, 0)` placeholder that upstream data uses for "unknown".
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        if lat == 0.0 && lon == 0.0 {
            return None;
        }
        Some(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

/// Parses a loosely-typed coordinate string such as `" 14.5995 "`.
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    let v: f64 = raw.trim().parse().ok()?;
    v.is_finite().then_some(v)
}
