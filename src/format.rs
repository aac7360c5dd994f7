/// Presentation helpers: turn a telemetry snapshot into display values.
/// Stateless; the View decides how to draw them.
use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetryState;

const KPH_PER_MPS: f64 = 3.6;
const MPH_PER_MPS: f64 = 2.23694;
const CAUTION_DEGREES: f64 = 15.0;
const ALERT_DEGREES: f64 = 45.0;

pub fn mps_to_kph(mps: f64) -> f64 {
    mps * KPH_PER_MPS
}

pub fn mps_to_mph(mps: f64) -> f64 {
    mps * MPH_PER_MPS
}

/// Color band for an orientation gauge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrientationBand {
    Nominal,
    Caution,
    Alert,
}

impl OrientationBand {
    pub fn for_degrees(degrees: f64) -> Self {
        let magnitude = degrees.abs();
        if magnitude < CAUTION_DEGREES {
            OrientationBand::Nominal
        } else if magnitude < ALERT_DEGREES {
            OrientationBand::Caution
        } else {
            OrientationBand::Alert
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    pub label: &'static str,
    pub value: String,
}

fn row(label: &'static str, value: String) -> DisplayRow {
    DisplayRow { label, value }
}

/// The GPS info table, top to bottom
pub fn display_rows(state: &TelemetryState) -> Vec<DisplayRow> {
    let speed = state.speed_meters_per_second;
    vec![
        row("UTC Time", state.utc_clock.clone()),
        row("Latitude", format!("{:.6}", state.position.latitude)),
        row("Longitude", format!("{:.6}", state.position.longitude)),
        row("Altitude", format!("{:.1} m", state.position.altitude_meters)),
        row("Speed (m/s)", format!("{:.1}", speed)),
        row("Speed (km/h)", format!("{:.1}", mps_to_kph(speed))),
        row("Speed (mph)", format!("{:.1}", mps_to_mph(speed))),
        row("Heading", format!("{}°", state.heading_degrees)),
        row(
            "Accuracy",
            format!("{:.1} m", state.position.horizontal_accuracy_meters),
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gauge {
    pub label: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub text: String,
    pub band: OrientationBand,
}

fn gauge(label: &'static str, value: f64, min: f64, max: f64) -> Gauge {
    Gauge {
        label,
        value,
        min,
        max,
        text: format!("{:.0}°", value),
        band: OrientationBand::for_degrees(value),
    }
}

/// Yaw, pitch and roll gauges
pub fn orientation_gauges(state: &TelemetryState) -> [Gauge; 3] {
    let attitude = &state.attitude;
    [
        gauge("Yaw", attitude.yaw_degrees, -180.0, 180.0),
        gauge("Pitch", attitude.pitch_degrees, -90.0, 90.0),
        gauge("Roll", attitude.roll_degrees, -180.0, 180.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Position;

    #[test]
    fn test_speed_conversions() {
        assert!((mps_to_kph(10.0) - 36.0).abs() < 1e-9);
        assert!((mps_to_mph(10.0) - 22.3694).abs() < 1e-9);
    }

    #[test]
    fn test_orientation_bands() {
        assert_eq!(OrientationBand::for_degrees(0.0), OrientationBand::Nominal);
        assert_eq!(OrientationBand::for_degrees(-14.9), OrientationBand::Nominal);
        assert_eq!(OrientationBand::for_degrees(15.0), OrientationBand::Caution);
        assert_eq!(OrientationBand::for_degrees(-44.9), OrientationBand::Caution);
        assert_eq!(OrientationBand::for_degrees(45.0), OrientationBand::Alert);
        assert_eq!(OrientationBand::for_degrees(-170.0), OrientationBand::Alert);
    }

    #[test]
    fn test_display_rows() {
        let state = TelemetryState {
            position: Position {
                latitude: 37.774929,
                longitude: -122.419416,
                altitude_meters: 16.04,
                horizontal_accuracy_meters: 4.95,
            },
            speed_meters_per_second: 10.0,
            heading_degrees: 271,
            utc_clock: "12:00:01".to_string(),
            ..Default::default()
        };

        let rows = display_rows(&state);
        let value = |label: &str| {
            rows.iter()
                .find(|r| r.label == label)
                .map(|r| r.value.clone())
                .unwrap()
        };
        assert_eq!(rows.len(), 9);
        assert_eq!(value("UTC Time"), "12:00:01");
        assert_eq!(value("Latitude"), "37.774929");
        assert_eq!(value("Altitude"), "16.0 m");
        assert_eq!(value("Speed (km/h)"), "36.0");
        assert_eq!(value("Speed (mph)"), "22.4");
        assert_eq!(value("Heading"), "271°");
    }

    #[test]
    fn test_gauges() {
        let mut state = TelemetryState::default();
        state.attitude.pitch_degrees = 20.4;
        let [yaw, pitch, roll] = orientation_gauges(&state);
        assert_eq!(yaw.band, OrientationBand::Nominal);
        assert_eq!(pitch.text, "20°");
        assert_eq!(pitch.band, OrientationBand::Caution);
        assert_eq!((pitch.min, pitch.max), (-90.0, 90.0));
        assert_eq!(roll.label, "Roll");
    }
}
