use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Periodic UTC clock source, started and stopped with the session.
///
/// Independent of every sensor: it keeps ticking when all of them are absent.
pub struct ClockTicker {
    task: Option<JoinHandle<()>>,
}

impl ClockTicker {
    /// Send the current UTC time every `period`, starting immediately.
    pub fn start(period: Duration, tx: Sender<DateTime<Utc>>) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(Utc::now()).await.is_err() {
                    break;
                }
            }
        });
        Self { task: Some(task) }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ClockTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_ticks_until_stopped() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut ticker = ClockTicker::start(Duration::from_millis(5), tx);

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        assert!(ticker.is_running());

        ticker.stop();
        assert!(!ticker.is_running());
        // Sender is dropped with the aborted task, so the channel drains and closes
        while rx.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn test_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        let ticker = ClockTicker::start(Duration::from_millis(1), tx);
        drop(rx);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!ticker.is_running());
    }
}
