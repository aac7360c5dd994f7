// telemetry.rs: Merged device snapshot
//
// Each field group has exactly one producer: location events own the
// position block, heading events own heading_degrees, attitude events own the
// attitude block and the clock ticker owns utc_clock. Groups are displayed
// independently, so there is no cross-group atomicity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AttitudeEvent, Coordinate, HeadingEvent, LocationEvent};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_meters: f64,
    pub horizontal_accuracy_meters: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub yaw_degrees: f64,
    pub pitch_degrees: f64,
    pub roll_degrees: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryState {
    pub position: Position,
    pub speed_meters_per_second: f64,
    /// Whole degrees in [0, 360)
    pub heading_degrees: u16,
    pub attitude: Attitude,
    /// HH:MM:SS in UTC, empty until the first tick
    pub utc_clock: String,
    /// Most recent valid fix, None until one arrives
    pub last_location: Option<Coordinate>,
}

impl TelemetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a location fix. Returns true if anything changed.
    ///
    /// Latitude and longitude are required; altitude and accuracy keep their
    /// previous values when missing. A missing, negative or non-finite speed
    /// means "unknown" and is stored as 0.
    pub fn apply_location_event(&mut self, event: &LocationEvent) -> bool {
        let Some(coord) = event.coordinate() else {
            log::debug!("Dropping location event without a usable coordinate");
            return false;
        };

        let mut position = Position {
            latitude: coord.latitude,
            longitude: coord.longitude,
            ..self.position.clone()
        };
        if let Some(altitude) = event.altitude.filter(|a| a.is_finite()) {
            position.altitude_meters = altitude;
        }
        if let Some(accuracy) = event.accuracy.filter(|a| a.is_finite()) {
            position.horizontal_accuracy_meters = accuracy;
        }
        let speed = clamp_speed(event.speed);

        let changed = position != self.position
            || speed != self.speed_meters_per_second
            || self.last_location != Some(coord);

        self.position = position;
        self.speed_meters_per_second = speed;
        self.last_location = Some(coord);
        changed
    }

    /// Merge a compass reading, debounced on whole degrees.
    ///
    /// True heading wins when present and non-negative, otherwise the
    /// magnetic heading is used. The stored value only moves when the rounded
    /// integer differs from what is already stored.
    pub fn apply_heading_event(&mut self, event: &HeadingEvent) -> bool {
        let candidate = match event.true_heading {
            Some(true_heading) if true_heading.is_finite() && true_heading >= 0.0 => true_heading,
            _ => match event.magnetic_heading {
                Some(magnetic) if magnetic.is_finite() => magnetic,
                _ => {
                    log::debug!("Dropping heading event without a usable heading");
                    return false;
                }
            },
        };

        let whole = whole_degrees(candidate);
        if whole == self.heading_degrees {
            return false;
        }
        self.heading_degrees = whole;
        true
    }

    /// Merge a device attitude sample (radians). No debounce.
    pub fn apply_attitude_event(&mut self, event: &AttitudeEvent) -> bool {
        let (Some(yaw), Some(pitch), Some(roll)) = (event.yaw, event.pitch, event.roll) else {
            log::debug!("Dropping attitude event with missing axes");
            return false;
        };
        if !(yaw.is_finite() && pitch.is_finite() && roll.is_finite()) {
            log::debug!("Dropping attitude event with non-finite axes");
            return false;
        }

        let attitude = Attitude {
            yaw_degrees: radians_to_degrees(yaw),
            pitch_degrees: radians_to_degrees(pitch),
            roll_degrees: radians_to_degrees(roll),
        };
        let changed = attitude != self.attitude;
        self.attitude = attitude;
        changed
    }

    /// Refresh the UTC clock string
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let clock = format_utc_clock(now);
        if clock == self.utc_clock {
            return false;
        }
        self.utc_clock = clock;
        true
    }
}

pub fn format_utc_clock(now: DateTime<Utc>) -> String {
    now.format("%H:%M:%S").to_string()
}

pub fn radians_to_degrees(radians: f64) -> f64 {
    radians * 180.0 / std::f64::consts::PI
}

fn clamp_speed(speed: Option<f64>) -> f64 {
    match speed {
        Some(s) if s.is_finite() && s >= 0.0 => s,
        _ => 0.0,
    }
}

/// Round to the nearest whole degree and fold into [0, 360)
fn whole_degrees(heading: f64) -> u16 {
    (heading.round() as i64).rem_euclid(360) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use std::f64::consts::PI;

    #[test]
    fn test_location_overwrites_position() {
        let mut state = TelemetryState::new();
        let event = LocationEvent::fix(1.0, 37.7749, -122.4194)
            .with_altitude(12.5)
            .with_accuracy(4.0)
            .with_speed(8.2);

        assert!(state.apply_location_event(&event));
        assert_eq!(state.position.latitude, 37.7749);
        assert_eq!(state.position.longitude, -122.4194);
        assert_eq!(state.position.altitude_meters, 12.5);
        assert_eq!(state.position.horizontal_accuracy_meters, 4.0);
        assert_eq!(state.speed_meters_per_second, 8.2);
        assert_eq!(
            state.last_location,
            Some(Coordinate::new(37.7749, -122.4194))
        );
    }

    #[test]
    fn test_negative_speed_is_clamped() {
        let mut state = TelemetryState::new();
        for (i, speed) in [-1.0, 3.0, -0.001, -250.0, f64::NAN].iter().enumerate() {
            let event = LocationEvent::fix(i as f64, 10.0, 20.0).with_speed(*speed);
            state.apply_location_event(&event);
            assert!(state.speed_meters_per_second >= 0.0);
        }
        assert_eq!(state.speed_meters_per_second, 0.0);
    }

    #[test]
    fn test_location_is_idempotent() {
        let mut state = TelemetryState::new();
        let event = LocationEvent::fix(1.0, 51.5, -0.12).with_speed(2.0);

        assert!(state.apply_location_event(&event));
        let after_first = state.clone();
        assert!(!state.apply_location_event(&event));
        assert_eq!(state, after_first);
    }

    #[test]
    fn test_missing_altitude_keeps_previous() {
        let mut state = TelemetryState::new();
        state.apply_location_event(&LocationEvent::fix(1.0, 1.0, 1.0).with_altitude(100.0));
        state.apply_location_event(&LocationEvent::fix(2.0, 1.1, 1.1));
        assert_eq!(state.position.altitude_meters, 100.0);
        assert_eq!(state.position.latitude, 1.1);
    }

    #[test]
    fn test_malformed_location_dropped() {
        let mut state = TelemetryState::new();
        state.apply_location_event(&LocationEvent::fix(1.0, 48.0, 2.0).with_speed(5.0));
        let before = state.clone();

        let missing_lon = LocationEvent {
            timestamp: 2.0,
            latitude: Some(10.0),
            ..Default::default()
        };
        assert!(!state.apply_location_event(&missing_lon));
        assert!(!state.apply_location_event(&LocationEvent::fix(3.0, f64::NAN, 2.0)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_heading_debounce_single_change() {
        let mut state = TelemetryState::new();
        let mut changes = 0;
        for heading in [10.6, 10.9, 11.2] {
            if state.apply_heading_event(&HeadingEvent::new(0.0, heading, 0.0)) {
                changes += 1;
            }
        }
        assert_eq!(changes, 1);
        assert_eq!(state.heading_degrees, 11);
    }

    #[test]
    fn test_heading_rounds_to_nearest_degree() {
        let mut state = TelemetryState::new();
        assert!(state.apply_heading_event(&HeadingEvent::new(0.0, 10.4, 0.0)));
        assert_eq!(state.heading_degrees, 10);
        // Crossing the half-degree mark is a new whole degree
        assert!(state.apply_heading_event(&HeadingEvent::new(1.0, 10.6, 0.0)));
        assert_eq!(state.heading_degrees, 11);
        assert!(!state.apply_heading_event(&HeadingEvent::new(2.0, 10.7, 0.0)));
    }

    #[test]
    fn test_heading_prefers_true_heading() {
        let mut state = TelemetryState::new();
        state.apply_heading_event(&HeadingEvent::new(0.0, 90.2, 100.0));
        assert_eq!(state.heading_degrees, 90);
    }

    #[test]
    fn test_heading_falls_back_to_magnetic() {
        let mut state = TelemetryState::new();
        assert!(state.apply_heading_event(&HeadingEvent::new(0.0, -1.0, 181.7)));
        assert_eq!(state.heading_degrees, 182);

        assert!(state.apply_heading_event(&HeadingEvent::magnetic(1.0, 45.0)));
        assert_eq!(state.heading_degrees, 45);
    }

    #[test]
    fn test_heading_wraps_to_zero() {
        let mut state = TelemetryState::new();
        state.apply_heading_event(&HeadingEvent::new(0.0, 180.0, 0.0));
        assert!(state.apply_heading_event(&HeadingEvent::new(1.0, 359.6, 0.0)));
        assert_eq!(state.heading_degrees, 0);
    }

    #[test]
    fn test_heading_without_payload_dropped() {
        let mut state = TelemetryState::new();
        state.apply_heading_event(&HeadingEvent::new(0.0, 270.0, 0.0));
        let empty = HeadingEvent {
            timestamp: 1.0,
            true_heading: Some(-1.0),
            magnetic_heading: None,
        };
        assert!(!state.apply_heading_event(&empty));
        assert_eq!(state.heading_degrees, 270);
    }

    #[test]
    fn test_attitude_conversion() {
        let mut state = TelemetryState::new();
        assert!(state.apply_attitude_event(&AttitudeEvent::new(0.0, PI / 2.0, -PI / 4.0, PI)));
        assert_relative_eq!(state.attitude.yaw_degrees, 90.0, epsilon = 1e-6);
        assert_relative_eq!(state.attitude.pitch_degrees, -45.0, epsilon = 1e-6);
        assert_relative_eq!(state.attitude.roll_degrees, 180.0, epsilon = 1e-6);
    }

    #[test]
    fn test_attitude_missing_axis_dropped() {
        let mut state = TelemetryState::new();
        let partial = AttitudeEvent {
            timestamp: 0.0,
            yaw: Some(1.0),
            pitch: None,
            roll: Some(0.5),
        };
        assert!(!state.apply_attitude_event(&partial));
        assert_eq!(state.attitude, Attitude::default());
    }

    #[test]
    fn test_tick_formats_utc_clock() {
        let mut state = TelemetryState::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 3).unwrap();
        assert!(state.tick(now));
        assert_eq!(state.utc_clock, "07:05:03");
        assert!(!state.tick(now));
    }
}
