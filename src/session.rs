// session.rs: Single processing context for one tracking session
//
// The session task is the only owner of TelemetryState and the camera
// controller. Sensor subscriptions and the clock ticker run on their own
// tasks and hand events over through channels; the View sends commands in
// and reads snapshots out of a watch channel, so readers never hold up
// the producers.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::camera::{CameraFollowController, CameraState, DEFAULT_CAMERA_DISTANCE_M};
use crate::clock::ClockTicker;
use crate::error::{Result, WhereError};
use crate::health_monitor::{HealthMonitor, SensorHealth, SensorStatusReport};
use crate::preferences::{MapStyle, PreferenceStore};
use crate::sensors::{SensorConfig, SensorSource, Subscription};
use crate::telemetry::TelemetryState;
use crate::types::{AttitudeEvent, HeadingEvent, LocationEvent, ViewportChange};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub sensors: SensorConfig,
    pub attitude_interval_secs: f64,
    pub clock_period: Duration,
    pub default_camera_distance_m: f64,
    pub location_silence: Duration,
    pub orientation_silence: Duration,
    pub health_check_interval: Duration,
    pub command_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sensors: SensorConfig::default(),
            attitude_interval_secs: 0.1,
            clock_period: Duration::from_secs(1),
            default_camera_distance_m: DEFAULT_CAMERA_DISTANCE_M,
            location_silence: Duration::from_secs(30),
            orientation_silence: Duration::from_secs(5),
            health_check_interval: Duration::from_secs(2),
            command_capacity: 64,
        }
    }
}

// ─── Events and snapshots ────────────────────────────────────────────────────

/// Interaction coming back from the View layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewCommand {
    ViewportChange(ViewportChange),
    Recenter,
    SetMapStyle { style: MapStyle },
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Location(LocationEvent),
    Heading(HeadingEvent),
    Attitude(AttitudeEvent),
    Tick(DateTime<Utc>),
    View(ViewCommand),
}

/// Read-only view of everything a renderer needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub telemetry: TelemetryState,
    pub camera: CameraState,
    pub map_style: MapStyle,
    pub sensors: SensorStatusReport,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Synchronous state transitions, free of any runtime
#[derive(Debug, Clone)]
pub struct TelemetryEngine {
    telemetry: TelemetryState,
    camera: CameraFollowController,
    map_style: MapStyle,
}

impl TelemetryEngine {
    pub fn new(default_camera_distance_m: f64, map_style: MapStyle) -> Self {
        Self {
            telemetry: TelemetryState::new(),
            camera: CameraFollowController::new(default_camera_distance_m),
            map_style,
        }
    }

    pub fn telemetry(&self) -> &TelemetryState {
        &self.telemetry
    }

    pub fn camera(&self) -> &CameraState {
        self.camera.state()
    }

    pub fn map_style(&self) -> MapStyle {
        self.map_style
    }

    /// Apply one event. Returns true if the visible state changed.
    pub fn apply(&mut self, event: &SessionEvent) -> bool {
        match event {
            SessionEvent::Location(event) => {
                let changed = self.telemetry.apply_location_event(event);
                // Malformed fixes are dropped by telemetry and must not move the camera
                match event.coordinate() {
                    Some(coord) => self.camera.on_location(coord) | changed,
                    None => changed,
                }
            }
            SessionEvent::Heading(event) => self.telemetry.apply_heading_event(event),
            SessionEvent::Attitude(event) => self.telemetry.apply_attitude_event(event),
            SessionEvent::Tick(now) => self.telemetry.tick(*now),
            SessionEvent::View(ViewCommand::ViewportChange(change)) => {
                self.camera.on_viewport_change(change)
            }
            SessionEvent::View(ViewCommand::Recenter) => {
                self.camera.on_recenter(self.telemetry.last_location)
            }
            SessionEvent::View(ViewCommand::SetMapStyle { style }) => {
                let changed = *style != self.map_style;
                self.map_style = *style;
                changed
            }
        }
    }

    pub fn snapshot(&self, sensors: SensorStatusReport) -> Snapshot {
        Snapshot {
            telemetry: self.telemetry.clone(),
            camera: self.camera.state().clone(),
            map_style: self.map_style,
            sensors,
        }
    }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// Clonable entry point for the View layer
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<ViewCommand>,
    snapshots: watch::Receiver<Snapshot>,
}

impl SessionHandle {
    pub async fn send(&self, command: ViewCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| WhereError::SessionClosed)
    }

    pub async fn on_viewport_change(&self, change: ViewportChange) -> Result<()> {
        self.send(ViewCommand::ViewportChange(change)).await
    }

    pub async fn on_recenter_requested(&self) -> Result<()> {
        self.send(ViewCommand::Recenter).await
    }

    pub async fn set_map_style(&self, style: MapStyle) -> Result<()> {
        self.send(ViewCommand::SetMapStyle { style }).await
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }
}

pub struct TelemetrySession {
    handle: SessionHandle,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct Streams {
    location: Subscription<LocationEvent>,
    heading: Subscription<HeadingEvent>,
    attitude: Subscription<AttitudeEvent>,
}

impl Streams {
    fn unsubscribe_all(&mut self) {
        self.location.unsubscribe();
        self.heading.unsubscribe();
        self.attitude.unsubscribe();
    }
}

impl TelemetrySession {
    /// Subscribe to every sensor, start the clock and spawn the processing loop.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn start(
        mut source: SensorSource,
        config: SessionConfig,
        preferences: PreferenceStore,
    ) -> Self {
        let map_style = MapStyle::load(&preferences);
        let engine = TelemetryEngine::new(config.default_camera_distance_m, map_style);

        let streams = Streams {
            location: source.subscribe_location(),
            heading: source.subscribe_heading(),
            attitude: source.subscribe_attitude(config.attitude_interval_secs),
        };

        let mut health = HealthMonitor::new(config.location_silence, config.orientation_silence);
        for (sub_available, sensor) in [
            (streams.location.is_available(), &mut health.location),
            (streams.heading.is_available(), &mut health.heading),
            (streams.attitude.is_available(), &mut health.attitude),
        ] {
            if !sub_available {
                sensor.mark_unavailable();
            }
        }

        let (clock_tx, clock_rx) = mpsc::channel(4);
        let ticker = ClockTicker::start(config.clock_period, clock_tx);

        let (command_tx, command_rx) = mpsc::channel(config.command_capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot(health.report()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        log::info!(
            "Session started (map style {}, camera distance {:.0} m)",
            map_style.label(),
            config.default_camera_distance_m
        );

        let task = tokio::spawn(run_session(
            SessionLoop {
                engine,
                health,
                preferences,
                snapshot_tx,
                health_check_interval: config.health_check_interval,
            },
            streams,
            ticker,
            clock_rx,
            command_rx,
            shutdown_rx,
        ));

        Self {
            handle: SessionHandle {
                commands: command_tx,
                snapshots: snapshot_rx,
            },
            shutdown_tx,
            task,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Stop the clock, unsubscribe all sensors and wait for the loop to end.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            log::warn!("Session task ended abnormally: {}", e);
        }
    }
}

struct SessionLoop {
    engine: TelemetryEngine,
    health: HealthMonitor,
    preferences: PreferenceStore,
    snapshot_tx: watch::Sender<Snapshot>,
    health_check_interval: Duration,
}

impl SessionLoop {
    fn on_sample(&mut self, event: SessionEvent) -> bool {
        let sensor = match event {
            SessionEvent::Location(_) => Some(&mut self.health.location),
            SessionEvent::Heading(_) => Some(&mut self.health.heading),
            SessionEvent::Attitude(_) => Some(&mut self.health.attitude),
            _ => None,
        };
        if let Some(sensor) = sensor {
            sensor.update();
        }
        self.engine.apply(&event)
    }

    fn on_command(&mut self, command: ViewCommand) -> bool {
        let changed = self.engine.apply(&SessionEvent::View(command.clone()));
        if let ViewCommand::SetMapStyle { style } = command {
            if changed {
                if let Err(e) = style.save(&mut self.preferences) {
                    log::warn!("Failed to persist map style: {}", e);
                }
            }
        }
        changed
    }

    fn publish(&self) {
        let snapshot = self.engine.snapshot(self.health.report());
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

fn stream_ended(sensor: &mut SensorHealth) -> bool {
    sensor.mark_unavailable();
    true
}

async fn run_session(
    mut state: SessionLoop,
    mut streams: Streams,
    mut ticker: ClockTicker,
    mut clock_rx: mpsc::Receiver<DateTime<Utc>>,
    mut commands: mpsc::Receiver<ViewCommand>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut location_open = streams.location.is_available();
    let mut heading_open = streams.heading.is_available();
    let mut attitude_open = streams.attitude.is_available();

    let mut health_timer = interval(state.health_check_interval);
    health_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let changed = tokio::select! {
            _ = &mut shutdown_rx => break,
            event = streams.location.next(), if location_open => match event {
                Some(event) => state.on_sample(SessionEvent::Location(event)),
                None => {
                    location_open = false;
                    stream_ended(&mut state.health.location)
                }
            },
            event = streams.heading.next(), if heading_open => match event {
                Some(event) => state.on_sample(SessionEvent::Heading(event)),
                None => {
                    heading_open = false;
                    stream_ended(&mut state.health.heading)
                }
            },
            event = streams.attitude.next(), if attitude_open => match event {
                Some(event) => state.on_sample(SessionEvent::Attitude(event)),
                None => {
                    attitude_open = false;
                    stream_ended(&mut state.health.attitude)
                }
            },
            Some(now) = clock_rx.recv() => state.on_sample(SessionEvent::Tick(now)),
            command = commands.recv() => match command {
                Some(command) => state.on_command(command),
                None => break,
            },
            _ = health_timer.tick() => {
                state.health.check_health();
                true
            }
        };

        if changed {
            state.publish();
        }
    }

    ticker.stop();
    streams.unsubscribe_all();
    log::info!("Session stopped. {}", state.health.format_status());
}
