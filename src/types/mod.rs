//! Event and geometry types shared by the sensor feeds, the telemetry merge
//! and the camera controller.
//!
//! Sensor payload fields are `Option` because the platform may hand us a
//! partial reading. An event whose required fields are missing or not finite
//! is malformed and gets dropped by the consumer.

use serde::{Deserialize, Serialize};

/// Geographic coordinate in degrees (WGS84)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    pub(crate) fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationEvent {
    pub timestamp: f64,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Horizontal accuracy radius in meters
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Ground speed in m/s; negative means the platform does not know
    #[serde(default)]
    pub speed: Option<f64>,
}

impl LocationEvent {
    pub fn fix(timestamp: f64, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Default::default()
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    /// The reported position, if present and finite
    pub fn coordinate(&self) -> Option<Coordinate> {
        let coord = Coordinate::new(self.latitude?, self.longitude?);
        coord.is_finite().then_some(coord)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadingEvent {
    pub timestamp: f64,
    /// Degrees from geographic north; negative when invalid
    #[serde(default)]
    pub true_heading: Option<f64>,
    /// Degrees from magnetic north
    #[serde(default)]
    pub magnetic_heading: Option<f64>,
}

impl HeadingEvent {
    pub fn new(timestamp: f64, true_heading: f64, magnetic_heading: f64) -> Self {
        Self {
            timestamp,
            true_heading: Some(true_heading),
            magnetic_heading: Some(magnetic_heading),
        }
    }

    pub fn magnetic(timestamp: f64, magnetic_heading: f64) -> Self {
        Self {
            timestamp,
            true_heading: None,
            magnetic_heading: Some(magnetic_heading),
        }
    }
}

/// Device attitude in radians
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttitudeEvent {
    pub timestamp: f64,
    #[serde(default)]
    pub yaw: Option<f64>,
    #[serde(default)]
    pub pitch: Option<f64>,
    #[serde(default)]
    pub roll: Option<f64>,
}

impl AttitudeEvent {
    pub fn new(timestamp: f64, yaw: f64, pitch: f64, roll: f64) -> Self {
        Self {
            timestamp,
            yaw: Some(yaw),
            pitch: Some(pitch),
            roll: Some(roll),
        }
    }
}

/// Visible map region as reported by the renderer
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewportRegion {
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub latitude_delta_degrees: f64,
    pub longitude_delta_degrees: f64,
}

/// Settled viewport after any pan, zoom or programmatic move
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewportChange {
    pub center: Coordinate,
    pub distance_meters: f64,
    pub region: ViewportRegion,
}

pub fn current_timestamp() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
