//! Sensor adapters
//!
//! Every provider is wrapped as a [`SensorFeed`] and driven by its own polling
//! task. The task pushes events into a bounded channel and the consumer sees a
//! [`Subscription`], a lazy `Stream` that ends when the feed is exhausted or
//! was never available. Nothing here retries: an absent sensor is reported
//! by an empty stream and the host decides what to do about it.

pub mod replay;
pub mod simulated;
pub mod termux;

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::types::{AttitudeEvent, HeadingEvent, LocationEvent};

/// Outcome of one poll of a sensor
#[derive(Debug, Clone, PartialEq)]
pub enum FeedPoll<E> {
    Sample(E),
    /// Nothing new this tick
    Idle,
    /// The feed will never produce again
    Exhausted,
}

pub trait SensorFeed: Send + 'static {
    type Event: Send + 'static;

    fn name(&self) -> &'static str;

    /// Whether the capability exists on this host
    fn is_available(&self) -> bool {
        true
    }

    /// Read one sample. May block; the polling loop runs it off the runtime.
    fn poll(&mut self) -> FeedPoll<Self::Event>;
}

impl<F: SensorFeed + ?Sized> SensorFeed for Box<F> {
    type Event = F::Event;

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn poll(&mut self) -> FeedPoll<Self::Event> {
        (**self).poll()
    }
}

pub type LocationFeed = Box<dyn SensorFeed<Event = LocationEvent>>;
pub type HeadingFeed = Box<dyn SensorFeed<Event = HeadingEvent>>;
pub type AttitudeFeed = Box<dyn SensorFeed<Event = AttitudeEvent>>;

/// Live event stream from one sensor. Dropping it stops the polling task.
pub struct Subscription<E> {
    name: &'static str,
    available: bool,
    rx: mpsc::Receiver<E>,
    task: Option<JoinHandle<()>>,
}

impl<E> Subscription<E> {
    /// A stream that ends immediately
    pub fn empty(name: &'static str) -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self {
            name,
            available: false,
            rx,
            task: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Stop the polling task. Events already queued are still delivered.
    pub fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.rx.close();
    }
}

impl<E> Stream for Subscription<E> {
    type Item = E;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Start polling `feed` every `period`.
pub fn subscribe<F: SensorFeed>(
    feed: F,
    period: Duration,
    capacity: usize,
) -> Subscription<F::Event> {
    let name = feed.name();
    if !feed.is_available() {
        log::warn!("[{}] sensor unavailable, stream stays empty", name);
        return Subscription::empty(name);
    }

    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(poll_loop(feed, period, tx));
    Subscription {
        name,
        available: true,
        rx,
        task: Some(task),
    }
}

async fn poll_loop<F: SensorFeed>(feed: F, period: Duration, tx: mpsc::Sender<F::Event>) {
    let name = feed.name();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut feed = Some(feed);
    let mut sample_count = 0u64;

    loop {
        ticker.tick().await;

        let Some(mut current) = feed.take() else {
            break;
        };
        let (returned, reading) = match tokio::task::spawn_blocking(move || {
            let reading = current.poll();
            (current, reading)
        })
        .await
        {
            Ok(result) => result,
            Err(e) => {
                log::warn!("[{}] sensor read panicked: {}", name, e);
                break;
            }
        };
        feed = Some(returned);

        let event = match reading {
            FeedPoll::Sample(event) => event,
            FeedPoll::Idle => continue,
            FeedPoll::Exhausted => {
                log::info!("[{}] feed exhausted after {} samples", name, sample_count);
                break;
            }
        };

        match tx.try_send(event) {
            Ok(_) => {
                sample_count += 1;
                if sample_count % 100 == 0 {
                    log::debug!("[{}] {} samples", name, sample_count);
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("[{}] subscriber gone after {} samples", name, sample_count);
                break;
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Consumer is behind, drop this sample
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Granted,
    Denied,
}

/// Asks the platform for permission to use location
pub trait LocationAuthorizer: Send {
    fn request_when_in_use(&mut self) -> Authorization;
}

impl<F: FnMut() -> Authorization + Send> LocationAuthorizer for F {
    fn request_when_in_use(&mut self) -> Authorization {
        self()
    }
}

/// Runs the location authorization request at most once and remembers the answer.
pub struct PermissionGate {
    authorizer: Box<dyn LocationAuthorizer>,
    outcome: Option<Authorization>,
}

impl PermissionGate {
    pub fn new(authorizer: impl LocationAuthorizer + 'static) -> Self {
        Self {
            authorizer: Box::new(authorizer),
            outcome: None,
        }
    }

    pub fn always_granted() -> Self {
        Self::new(|| Authorization::Granted)
    }

    pub fn request(&mut self) -> Authorization {
        if let Some(outcome) = self.outcome {
            return outcome;
        }
        let outcome = self.authorizer.request_when_in_use();
        log::info!("Location authorization: {:?}", outcome);
        self.outcome = Some(outcome);
        outcome
    }
}

#[derive(Clone, Debug)]
pub struct SensorConfig {
    pub location_period: Duration,
    pub heading_period: Duration,
    pub channel_capacity: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            location_period: Duration::from_secs(1),
            heading_period: Duration::from_millis(100),
            channel_capacity: 64,
        }
    }
}

/// The three providers of one host plus its permission gate.
///
/// Each subscription consumes its feed; subscribing twice yields an empty
/// stream.
pub struct SensorSource {
    location: Option<LocationFeed>,
    heading: Option<HeadingFeed>,
    attitude: Option<AttitudeFeed>,
    permission: PermissionGate,
    config: SensorConfig,
}

impl SensorSource {
    pub fn new(
        location: LocationFeed,
        heading: HeadingFeed,
        attitude: AttitudeFeed,
        permission: PermissionGate,
    ) -> Self {
        Self {
            location: Some(location),
            heading: Some(heading),
            attitude: Some(attitude),
            permission,
            config: SensorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SensorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn subscribe_location(&mut self) -> Subscription<LocationEvent> {
        if self.permission.request() == Authorization::Denied {
            log::warn!("[location] authorization denied, stream stays empty");
            return Subscription::empty("location");
        }
        match self.location.take() {
            Some(feed) => subscribe(
                feed,
                self.config.location_period,
                self.config.channel_capacity,
            ),
            None => already_subscribed("location"),
        }
    }

    pub fn subscribe_heading(&mut self) -> Subscription<HeadingEvent> {
        match self.heading.take() {
            Some(feed) => subscribe(
                feed,
                self.config.heading_period,
                self.config.channel_capacity,
            ),
            None => already_subscribed("heading"),
        }
    }

    pub fn subscribe_attitude(&mut self, interval_seconds: f64) -> Subscription<AttitudeEvent> {
        let period = if interval_seconds.is_finite() && interval_seconds > 0.0 {
            Duration::from_secs_f64(interval_seconds)
        } else {
            log::warn!("[attitude] bad interval {}, using 0.1 s", interval_seconds);
            Duration::from_millis(100)
        };
        match self.attitude.take() {
            Some(feed) => subscribe(feed, period, self.config.channel_capacity),
            None => already_subscribed("attitude"),
        }
    }
}

fn already_subscribed<E>(name: &'static str) -> Subscription<E> {
    log::warn!("[{}] already subscribed, streams cannot be restarted", name);
    Subscription::empty(name)
}
