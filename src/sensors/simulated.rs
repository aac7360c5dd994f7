//! Deterministic stand-in sensors for hosts without hardware.
//!
//! The simulated device drives a slow circle around a fixed center at a
//! steady speed, with the compass following the direction of travel and a
//! gentle attitude wobble.

use std::f64::consts::PI;

use super::{FeedPoll, PermissionGate, SensorFeed, SensorSource};
use crate::types::{current_timestamp, AttitudeEvent, Coordinate, HeadingEvent, LocationEvent};

const CIRCLE_RADIUS_M: f64 = 150.0;
const SPEED_MS: f64 = 10.0;
const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Clone, Debug)]
pub struct SimulatedDrive {
    pub center: Coordinate,
    pub altitude_m: f64,
    /// Seconds of simulated time advanced per location fix
    pub fix_step_secs: f64,
}

impl Default for SimulatedDrive {
    fn default() -> Self {
        Self {
            center: Coordinate::new(37.7749, -122.4194),
            altitude_m: 16.0,
            fix_step_secs: 1.0,
        }
    }
}

impl SimulatedDrive {
    /// Angle around the circle after `t` seconds (radians, counter-clockwise from east)
    fn angle_at(&self, t: f64) -> f64 {
        (SPEED_MS / CIRCLE_RADIUS_M) * t
    }

    pub fn position_at(&self, t: f64) -> Coordinate {
        let angle = self.angle_at(t);
        let north = CIRCLE_RADIUS_M * angle.sin();
        let east = CIRCLE_RADIUS_M * angle.cos();
        let lon_scale = METERS_PER_DEGREE * self.center.latitude.to_radians().cos();
        Coordinate::new(
            self.center.latitude + north / METERS_PER_DEGREE,
            self.center.longitude + east / lon_scale,
        )
    }

    /// Compass bearing of travel (degrees clockwise from north)
    pub fn bearing_at(&self, t: f64) -> f64 {
        // Counter-clockwise travel: velocity points 90° ahead of the radius
        let travel = self.angle_at(t) + PI / 2.0;
        (90.0 - travel.to_degrees()).rem_euclid(360.0)
    }
}

pub struct SimulatedLocation {
    drive: SimulatedDrive,
    seq: u64,
}

impl SensorFeed for SimulatedLocation {
    type Event = LocationEvent;

    fn name(&self) -> &'static str {
        "location"
    }

    fn poll(&mut self) -> FeedPoll<LocationEvent> {
        let t = self.seq as f64 * self.drive.fix_step_secs;
        self.seq += 1;
        let coord = self.drive.position_at(t);
        FeedPoll::Sample(
            LocationEvent::fix(current_timestamp(), coord.latitude, coord.longitude)
                .with_altitude(self.drive.altitude_m + (t * 0.1).sin())
                .with_accuracy(5.0 + (t * 0.1).sin() * 2.0)
                .with_speed(SPEED_MS),
        )
    }
}

pub struct SimulatedHeading {
    drive: SimulatedDrive,
    seq: u64,
}

impl SensorFeed for SimulatedHeading {
    type Event = HeadingEvent;

    fn name(&self) -> &'static str {
        "heading"
    }

    fn poll(&mut self) -> FeedPoll<HeadingEvent> {
        // Compass runs at 10x the fix rate
        let t = self.seq as f64 * self.drive.fix_step_secs * 0.1;
        self.seq += 1;
        let bearing = self.drive.bearing_at(t);
        let jitter = (t * 7.0).sin() * 0.4;
        FeedPoll::Sample(HeadingEvent::new(
            current_timestamp(),
            (bearing + jitter).rem_euclid(360.0),
            (bearing + jitter - 13.0).rem_euclid(360.0),
        ))
    }
}

pub struct SimulatedAttitude {
    seq: u64,
}

impl SensorFeed for SimulatedAttitude {
    type Event = AttitudeEvent;

    fn name(&self) -> &'static str {
        "attitude"
    }

    fn poll(&mut self) -> FeedPoll<AttitudeEvent> {
        let t = self.seq as f64 * 0.1;
        self.seq += 1;
        FeedPoll::Sample(AttitudeEvent::new(
            current_timestamp(),
            (t * 0.2).sin() * PI * 0.9,
            (t * 0.5).sin() * 0.3,
            (t * 0.8).cos() * 0.6,
        ))
    }
}

pub fn simulated_feeds(
    drive: SimulatedDrive,
) -> (SimulatedLocation, SimulatedHeading, SimulatedAttitude) {
    (
        SimulatedLocation {
            drive: drive.clone(),
            seq: 0,
        },
        SimulatedHeading { drive, seq: 0 },
        SimulatedAttitude { seq: 0 },
    )
}

pub fn simulated_source(permission: PermissionGate) -> SensorSource {
    let (location, heading, attitude) = simulated_feeds(SimulatedDrive::default());
    SensorSource::new(
        Box::new(location),
        Box::new(heading),
        Box::new(attitude),
        permission,
    )
}
