//! Replay of recorded sensor logs.
//!
//! A log is `{"readings": [...]}` where each reading carries a timestamp and
//! any of `location`, `heading` and `attitude`. Files ending in `.gz` are
//! gunzipped on load. Events are released on the recorded schedule, scaled
//! by the playback rate.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Instant;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use super::{FeedPoll, PermissionGate, SensorFeed, SensorSource};
use crate::error::{Result, WhereError};
use crate::types::{AttitudeEvent, HeadingEvent, LocationEvent};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: f64,
    #[serde(default)]
    pub location: Option<LocationEvent>,
    #[serde(default)]
    pub heading: Option<HeadingEvent>,
    #[serde(default)]
    pub attitude: Option<AttitudeEvent>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReplayLog {
    pub readings: Vec<Reading>,
}

impl ReplayLog {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| WhereError::ReplayLog {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let reader: Box<dyn Read> = if path.extension().map(|e| e == "gz").unwrap_or(false) {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Self::from_reader(reader).map_err(|e| WhereError::ReplayLog {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn from_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(BufReader::new(reader))
    }

    /// Split into one feed per sensor, all sharing the first reading as time zero.
    pub fn into_feeds(
        self,
        rate: f64,
    ) -> (
        ReplayFeed<LocationEvent>,
        ReplayFeed<HeadingEvent>,
        ReplayFeed<AttitudeEvent>,
    ) {
        let origin = self
            .readings
            .iter()
            .map(|r| r.timestamp)
            .fold(f64::INFINITY, f64::min);
        let origin = if origin.is_finite() { origin } else { 0.0 };

        let mut location = VecDeque::new();
        let mut heading = VecDeque::new();
        let mut attitude = VecDeque::new();
        for reading in self.readings {
            let offset = reading.timestamp - origin;
            if let Some(event) = reading.location {
                location.push_back((offset, event));
            }
            if let Some(event) = reading.heading {
                heading.push_back((offset, event));
            }
            if let Some(event) = reading.attitude {
                attitude.push_back((offset, event));
            }
        }

        (
            ReplayFeed::new("location", location, rate),
            ReplayFeed::new("heading", heading, rate),
            ReplayFeed::new("attitude", attitude, rate),
        )
    }
}

pub struct ReplayFeed<E> {
    name: &'static str,
    pending: VecDeque<(f64, E)>,
    rate: f64,
    started: Option<Instant>,
}

impl<E> ReplayFeed<E> {
    fn new(name: &'static str, pending: VecDeque<(f64, E)>, rate: f64) -> Self {
        Self {
            name,
            pending,
            rate: if rate.is_finite() && rate > 0.0 { rate } else { 1.0 },
            started: None,
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Release the next event if it is due `elapsed_secs` into playback
    fn next_due(&mut self, elapsed_secs: f64) -> FeedPoll<E> {
        let due = match self.pending.front() {
            None => return FeedPoll::Exhausted,
            Some((offset, _)) => *offset / self.rate <= elapsed_secs,
        };
        if !due {
            return FeedPoll::Idle;
        }
        match self.pending.pop_front() {
            Some((_, event)) => FeedPoll::Sample(event),
            None => FeedPoll::Exhausted,
        }
    }
}

impl<E: Send + 'static> SensorFeed for ReplayFeed<E> {
    type Event = E;

    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> bool {
        !self.pending.is_empty()
    }

    fn poll(&mut self) -> FeedPoll<E> {
        let started = *self.started.get_or_insert_with(Instant::now);
        self.next_due(started.elapsed().as_secs_f64())
    }
}

pub fn replay_source(path: &Path, rate: f64) -> Result<SensorSource> {
    let log = ReplayLog::load(path)?;
    log::info!(
        "Loaded {} readings from {}",
        log.readings.len(),
        path.display()
    );
    let (location, heading, attitude) = log.into_feeds(rate);
    Ok(SensorSource::new(
        Box::new(location),
        Box::new(heading),
        Box::new(attitude),
        PermissionGate::always_granted(),
    ))
}
