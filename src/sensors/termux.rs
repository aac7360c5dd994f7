//! Termux:API backed sensors for Android phones.
//!
//! `termux-location` reports JSON fixes. `termux-sensor -s orientation`
//! reports `[azimuth, pitch, roll]` in degrees; the azimuth doubles as the
//! magnetic compass heading (no true heading is available) and all three
//! angles are handed on as radians for attitude.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use serde_json::Value;

use super::{Authorization, FeedPoll, LocationAuthorizer, PermissionGate, SensorFeed, SensorSource};
use crate::types::{current_timestamp, AttitudeEvent, HeadingEvent, LocationEvent};

const LOCATION_CMD: &str = "termux-location";
const SENSOR_CMD: &str = "termux-sensor";

#[derive(Debug, Deserialize)]
struct TermuxFix {
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<f64>,
    accuracy: Option<f64>,
    speed: Option<f64>,
}

pub(crate) fn parse_location(output: &str) -> Option<LocationEvent> {
    let fix: TermuxFix = serde_json::from_str(output.trim()).ok()?;
    Some(LocationEvent {
        timestamp: current_timestamp(),
        latitude: fix.latitude,
        longitude: fix.longitude,
        altitude: fix.altitude,
        accuracy: fix.accuracy,
        speed: fix.speed,
    })
}

/// Extract `[azimuth, pitch, roll]` (degrees) from a termux-sensor dump.
///
/// The dump is keyed by the device-specific sensor name, so take the first
/// entry carrying a `values` array.
pub(crate) fn parse_orientation(output: &str) -> Option<[f64; 3]> {
    let value: Value = serde_json::from_str(output.trim()).ok()?;
    let values = value
        .as_object()?
        .values()
        .find_map(|sensor| sensor.get("values")?.as_array().cloned())?;
    if values.len() < 3 {
        return None;
    }
    Some([values[0].as_f64()?, values[1].as_f64()?, values[2].as_f64()?])
}

fn run(cmd: &str, args: &[&str]) -> Option<String> {
    match Command::new(cmd).args(args).output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            log::debug!("{} exited with {}", cmd, output.status);
            None
        }
        Err(e) => {
            log::debug!("{} failed to start: {}", cmd, e);
            None
        }
    }
}

fn read_orientation() -> Option<[f64; 3]> {
    run(SENSOR_CMD, &["-s", "orientation", "-n", "1"]).and_then(|text| parse_orientation(&text))
}

pub fn command_on_path(cmd: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| Path::new(&dir).join(cmd).is_file()))
        .unwrap_or(false)
}

pub struct TermuxLocation;

impl SensorFeed for TermuxLocation {
    type Event = LocationEvent;

    fn name(&self) -> &'static str {
        "location"
    }

    fn is_available(&self) -> bool {
        command_on_path(LOCATION_CMD)
    }

    fn poll(&mut self) -> FeedPoll<LocationEvent> {
        match run(LOCATION_CMD, &["-p", "gps", "-r", "once"]).and_then(|t| parse_location(&t)) {
            Some(event) => FeedPoll::Sample(event),
            None => FeedPoll::Idle,
        }
    }
}

pub struct TermuxHeading;

impl SensorFeed for TermuxHeading {
    type Event = HeadingEvent;

    fn name(&self) -> &'static str {
        "heading"
    }

    fn is_available(&self) -> bool {
        command_on_path(SENSOR_CMD)
    }

    fn poll(&mut self) -> FeedPoll<HeadingEvent> {
        match read_orientation() {
            Some([azimuth, _, _]) => FeedPoll::Sample(HeadingEvent {
                timestamp: current_timestamp(),
                true_heading: Some(-1.0),
                magnetic_heading: Some(azimuth),
            }),
            None => FeedPoll::Idle,
        }
    }
}

pub struct TermuxAttitude;

impl SensorFeed for TermuxAttitude {
    type Event = AttitudeEvent;

    fn name(&self) -> &'static str {
        "attitude"
    }

    fn is_available(&self) -> bool {
        command_on_path(SENSOR_CMD)
    }

    fn poll(&mut self) -> FeedPoll<AttitudeEvent> {
        match read_orientation() {
            Some(angles) => FeedPoll::Sample(orientation_to_attitude(angles)),
            None => FeedPoll::Idle,
        }
    }
}

/// Azimuth runs 0..360; fold it into (-180, 180] so yaw matches the other backends.
fn orientation_to_attitude([azimuth, pitch, roll]: [f64; 3]) -> AttitudeEvent {
    let yaw = if azimuth > 180.0 { azimuth - 360.0 } else { azimuth };
    AttitudeEvent::new(
        current_timestamp(),
        yaw.to_radians(),
        pitch.to_radians(),
        roll.to_radians(),
    )
}

/// The first `termux-location` call is what raises the Android permission
/// prompt. A failed call counts as denied.
pub struct TermuxAuthorizer;

impl LocationAuthorizer for TermuxAuthorizer {
    fn request_when_in_use(&mut self) -> Authorization {
        if !command_on_path(LOCATION_CMD) {
            return Authorization::Denied;
        }
        match run(LOCATION_CMD, &["-p", "network", "-r", "last"]) {
            Some(_) => Authorization::Granted,
            None => Authorization::Denied,
        }
    }
}

pub fn termux_source() -> SensorSource {
    SensorSource::new(
        Box::new(TermuxLocation),
        Box::new(TermuxHeading),
        Box::new(TermuxAttitude),
        PermissionGate::new(TermuxAuthorizer),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_location() {
        let json = r#"{
            "latitude": 52.5200,
            "longitude": 13.4050,
            "altitude": 34.0,
            "accuracy": 3.9,
            "vertical_accuracy": 2.1,
            "bearing": 0.0,
            "speed": -1.0,
            "elapsedMs": 12,
            "provider": "gps"
        }"#;
        let event = parse_location(json).unwrap();
        assert_eq!(event.latitude, Some(52.52));
        assert_eq!(event.longitude, Some(13.405));
        assert_eq!(event.accuracy, Some(3.9));
        assert_eq!(event.speed, Some(-1.0));
    }

    #[test]
    fn test_parse_location_partial() {
        let event = parse_location(r#"{"latitude": 1.0}"#).unwrap();
        assert!(event.coordinate().is_none());
        assert!(parse_location("not json").is_none());
    }

    #[test]
    fn test_parse_orientation() {
        let json = r#"{"LSM6DSO Orientation": {"values": [270.5, -12.0, 3.25]}}"#;
        assert_eq!(parse_orientation(json), Some([270.5, -12.0, 3.25]));
        assert!(parse_orientation(r#"{"x": {"values": [1.0]}}"#).is_none());
        assert!(parse_orientation("{}").is_none());
    }

    #[test]
    fn test_orientation_to_attitude_folds_azimuth() {
        let event = orientation_to_attitude([270.0, 10.0, -5.0]);
        assert_relative_eq!(event.yaw.unwrap(), (-90.0f64).to_radians(), epsilon = 1e-9);
        assert_relative_eq!(event.pitch.unwrap(), 10.0f64.to_radians(), epsilon = 1e-9);
        assert_relative_eq!(event.roll.unwrap(), (-5.0f64).to_radians(), epsilon = 1e-9);
    }

    #[test]
    fn test_missing_command_not_on_path() {
        assert!(!command_on_path("definitely-not-a-termux-command"));
    }
}
