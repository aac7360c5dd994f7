//! Live device telemetry: merges location, compass, attitude and clock
//! streams into one snapshot and drives a follow/free map camera.

pub mod camera;
pub mod clock;
pub mod dashboard;
pub mod error;
pub mod format;
pub mod health_monitor;
pub mod preferences;
pub mod sensors;
pub mod session;
pub mod telemetry;
pub mod types;

pub use camera::{CameraFollowController, CameraState, FollowMode};
pub use error::{Result, WhereError};
pub use preferences::{MapStyle, PreferenceStore};
pub use sensors::{SensorSource, Subscription};
pub use session::{SessionConfig, SessionHandle, Snapshot, TelemetrySession, ViewCommand};
pub use telemetry::TelemetryState;
pub use types::{AttitudeEvent, Coordinate, HeadingEvent, LocationEvent, ViewportChange};
