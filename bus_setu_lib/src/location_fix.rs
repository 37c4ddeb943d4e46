use chrono::{DateTime, Utc};
use geo_types::Point;

/// A single location sample. `x` is longitude and `y` is latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub position: Point,
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            position: Point::new(longitude, latitude),
            timestamp,
        }
    }

    /// Fix captured right now.
    pub fn now(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, Utc::now())
    }

    pub fn latitude(&self) -> f64 {
        self.position.y()
    }

    pub fn longitude(&self) -> f64 {
        self.position.x()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    High,
    Balanced,
}

/// What the reporting loop asks of the device location provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRequest {
    pub accuracy: Accuracy,
    pub interval_ms: u64,
    /// Fixes closer together than this are not forwarded.
    pub min_interval_ms: u64,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            accuracy: Accuracy::High,
            interval_ms: 5000,
            min_interval_ms: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latitude_and_longitude_map_to_point_axes() {
        let fix = LocationFix::now(18.5204, 73.8567);
        assert_eq!(fix.latitude(), 18.5204);
        assert_eq!(fix.longitude(), 73.8567);
        assert_eq!(fix.position.x(), 73.8567);
    }
}
