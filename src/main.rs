use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tokio::time::{sleep, Duration, Instant};

use where_rs::format::{mps_to_kph, OrientationBand};
use where_rs::sensors::replay::replay_source;
use where_rs::sensors::simulated::simulated_source;
use where_rs::sensors::termux::termux_source;
use where_rs::sensors::{PermissionGate, SensorConfig, SensorSource};
use where_rs::{dashboard, PreferenceStore, SessionConfig, TelemetrySession};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Backend {
    /// Termux:API commands on an Android phone
    Termux,
    /// Deterministic simulated drive
    Simulated,
    /// Recorded log given by --replay
    Replay,
}

#[derive(Parser, Debug)]
#[command(name = "where_tracker")]
#[command(about = "Live GPS, heading and orientation dashboard", long_about = None)]
struct Args {
    /// Duration in seconds (0 = continuous)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Sensor backend
    #[arg(long, value_enum, default_value = "termux")]
    backend: Backend,

    /// Path to a readings log (.json or .json.gz) for the replay backend
    #[arg(long, required_if_eq("backend", "replay"))]
    replay: Option<PathBuf>,

    /// Replay speed multiplier
    #[arg(long, default_value = "1.0")]
    replay_rate: f64,

    /// Dashboard port (0 disables the dashboard)
    #[arg(long, default_value = "8081")]
    port: u16,

    /// Preferences file
    #[arg(long, default_value = "where_prefs.json")]
    prefs: PathBuf,

    /// Location polling period in milliseconds
    #[arg(long, default_value = "1000")]
    location_ms: u64,

    /// Compass polling period in milliseconds
    #[arg(long, default_value = "100")]
    heading_ms: u64,

    /// Attitude update interval in seconds
    #[arg(long, default_value = "0.1")]
    attitude_interval: f64,

    /// Initial camera distance in meters
    #[arg(long, default_value = "500")]
    camera_distance: f64,

    /// Seconds between status lines on the console
    #[arg(long, default_value = "2")]
    status_interval: u64,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            sensors: SensorConfig {
                location_period: Duration::from_millis(self.location_ms.max(1)),
                heading_period: Duration::from_millis(self.heading_ms.max(1)),
                ..SensorConfig::default()
            },
            attitude_interval_secs: self.attitude_interval,
            default_camera_distance_m: self.camera_distance,
            ..SessionConfig::default()
        }
    }

    fn sensor_source(&self) -> Result<SensorSource> {
        let source = match self.backend {
            Backend::Termux => termux_source(),
            Backend::Simulated => simulated_source(PermissionGate::always_granted()),
            Backend::Replay => {
                let path = self
                    .replay
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("--replay <PATH> is required for the replay backend"))?;
                replay_source(path, self.replay_rate)?
            }
        };
        Ok(source.with_config(self.session_config().sensors))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    log::info!("Where tracker starting");
    log::info!("  Duration: {} seconds (0=continuous)", args.duration);
    log::info!("  Backend: {:?}", args.backend);
    log::info!("  Preferences: {}", args.prefs.display());

    let preferences = match PreferenceStore::load(&args.prefs) {
        Ok(store) => store,
        Err(e) => {
            log::warn!("{}; starting with defaults", e);
            PreferenceStore::in_memory()
        }
    };

    let session = TelemetrySession::start(args.sensor_source()?, args.session_config(), preferences);
    let handle = session.handle();

    let dashboard_task = (args.port != 0).then(|| {
        let handle = handle.clone();
        let port = args.port;
        tokio::spawn(async move {
            if let Err(e) = dashboard::start_dashboard(handle, port).await {
                log::error!("{}", e);
            }
        })
    });

    let start = Instant::now();
    let status_every = Duration::from_secs(args.status_interval.max(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, stopping...");
                break;
            }
            _ = sleep(status_every) => {}
        }

        let snapshot = handle.snapshot();
        let t = &snapshot.telemetry;
        let worst_tilt = OrientationBand::for_degrees(
            t.attitude.pitch_degrees.abs().max(t.attitude.roll_degrees.abs()),
        );
        log::info!(
            "[{}] {:.6}, {:.6} | {:.1} km/h | hdg {}° | {} | tilt {:?} | sensors {:?}",
            t.utc_clock,
            t.position.latitude,
            t.position.longitude,
            mps_to_kph(t.speed_meters_per_second),
            t.heading_degrees,
            if snapshot.camera.is_following { "following" } else { "free" },
            worst_tilt,
            snapshot.sensors
        );

        if args.duration > 0 {
            if start.elapsed() >= Duration::from_secs(args.duration) {
                log::info!("Duration reached, stopping...");
                break;
            }
        }
    }

    session.shutdown().await;
    if let Some(task) = dashboard_task {
        task.abort();
    }
    Ok(())
}
