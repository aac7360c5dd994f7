use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// What the View should show for one sensor stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorStatus {
    /// Subscribed, no sample yet
    Waiting,
    Active,
    /// Had samples, but none within the silence threshold
    Silent,
    /// Missing, denied, or the stream ended
    Unavailable,
}

/// Tracks health metrics for one sensor stream.
///
/// Owned by the session task, so plain fields are enough.
#[derive(Clone, Debug)]
pub struct SensorHealth {
    pub name: &'static str,
    last_update: Option<Instant>,
    silence_threshold: Duration,
    available: bool,
    sample_count: u64,
    reported_silent: bool,
}

impl SensorHealth {
    pub fn new(name: &'static str, silence_threshold: Duration) -> Self {
        SensorHealth {
            name,
            last_update: None,
            silence_threshold,
            available: true,
            sample_count: 0,
            reported_silent: false,
        }
    }

    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    fn update_at(&mut self, now: Instant) {
        if self.reported_silent {
            log::info!("[HEALTH] {} back after silence", self.name);
            self.reported_silent = false;
        }
        self.last_update = Some(now);
        self.sample_count += 1;
    }

    pub fn mark_unavailable(&mut self) {
        if self.available {
            log::warn!("[HEALTH] {} unavailable", self.name);
        }
        self.available = false;
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn time_since_last_update(&self) -> Option<Duration> {
        self.last_update.map(|t| t.elapsed())
    }

    pub fn status(&self) -> SensorStatus {
        self.status_at(Instant::now())
    }

    fn status_at(&self, now: Instant) -> SensorStatus {
        if !self.available {
            return SensorStatus::Unavailable;
        }
        match self.last_update {
            None => SensorStatus::Waiting,
            Some(t) if now.saturating_duration_since(t) > self.silence_threshold => {
                SensorStatus::Silent
            }
            Some(_) => SensorStatus::Active,
        }
    }

    /// Log once when the stream goes quiet. Returns true on that transition.
    pub fn check_silence(&mut self) -> bool {
        if self.reported_silent || self.status() != SensorStatus::Silent {
            return false;
        }
        self.reported_silent = true;
        log::warn!(
            "[HEALTH] {} SILENT for {:.1}s",
            self.name,
            self.time_since_last_update()
                .unwrap_or_default()
                .as_secs_f64()
        );
        true
    }
}

/// Health of the three sensor streams
#[derive(Clone, Debug)]
pub struct HealthMonitor {
    pub location: SensorHealth,
    pub heading: SensorHealth,
    pub attitude: SensorHealth,
}

impl HealthMonitor {
    pub fn new(location_silence: Duration, orientation_silence: Duration) -> Self {
        HealthMonitor {
            location: SensorHealth::new("Location", location_silence),
            heading: SensorHealth::new("Heading", orientation_silence),
            attitude: SensorHealth::new("Attitude", orientation_silence),
        }
    }

    pub fn check_health(&mut self) -> SensorStatusReport {
        self.location.check_silence();
        self.heading.check_silence();
        self.attitude.check_silence();
        self.report()
    }

    pub fn report(&self) -> SensorStatusReport {
        SensorStatusReport {
            location: self.location.status(),
            heading: self.heading.status(),
            attitude: self.attitude.status(),
        }
    }

    /// Format health status for logging
    pub fn format_status(&self) -> String {
        format!(
            "Health: Location {} | Heading {} | Attitude {}",
            status_glyph(&self.location),
            status_glyph(&self.heading),
            status_glyph(&self.attitude)
        )
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(5))
    }
}

fn status_glyph(health: &SensorHealth) -> String {
    match health.status() {
        SensorStatus::Active => format!("✓ ({})", health.sample_count()),
        SensorStatus::Waiting => "…".to_string(),
        SensorStatus::Silent => format!(
            "⚠ (silent {:.1}s)",
            health
                .time_since_last_update()
                .unwrap_or_default()
                .as_secs_f64()
        ),
        SensorStatus::Unavailable => "✗".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorStatusReport {
    pub location: SensorStatus,
    pub heading: SensorStatus,
    pub attitude: SensorStatus,
}

impl Default for SensorStatusReport {
    fn default() -> Self {
        Self {
            location: SensorStatus::Waiting,
            heading: SensorStatus::Waiting,
            attitude: SensorStatus::Waiting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_health_detection() {
        let mut health = SensorHealth::new("test", Duration::from_secs(1));
        let start = Instant::now();

        assert_eq!(health.status_at(start), SensorStatus::Waiting);

        health.update_at(start);
        assert_eq!(health.status_at(start), SensorStatus::Active);
        assert_eq!(
            health.status_at(start + Duration::from_millis(1100)),
            SensorStatus::Silent
        );

        health.update_at(start + Duration::from_millis(1200));
        assert_eq!(
            health.status_at(start + Duration::from_millis(1300)),
            SensorStatus::Active
        );
        assert_eq!(health.sample_count(), 2);
    }

    #[test]
    fn test_unavailable_wins() {
        let mut health = SensorHealth::new("test", Duration::from_secs(10));
        health.update();
        health.mark_unavailable();
        assert_eq!(health.status(), SensorStatus::Unavailable);
    }

    #[test]
    fn test_silence_reported_once() {
        let mut health = SensorHealth::new("test", Duration::ZERO);
        health.update_at(Instant::now() - Duration::from_millis(50));
        assert!(health.check_silence());
        assert!(!health.check_silence());

        health.update();
        assert!(!health.reported_silent);
    }

    #[test]
    fn test_health_monitor() {
        let mut monitor = HealthMonitor::default();
        monitor.location.update();
        monitor.attitude.mark_unavailable();

        let report = monitor.check_health();
        assert_eq!(report.location, SensorStatus::Active);
        assert_eq!(report.heading, SensorStatus::Waiting);
        assert_eq!(report.attitude, SensorStatus::Unavailable);

        let status = monitor.format_status();
        assert!(status.contains("✓"));
        assert!(status.contains("✗"));
    }
}
