//! The schedulable unit: interval, due time, user arguments and subscribers.
//!
//! A [`Timer`] is built and configured by its owner, handed to the
//! [`TimerRegistry`](crate::registry::TimerRegistry) with `insert`, and then
//! started. The due time is only ever changed by the registry (on start and
//! after each firing).

use std::fmt;

use tracing::warn;

use crate::arena::TimerId;
use crate::clock::Timestamp;
use crate::error::TimerError;

/// Opaque owner-defined payload copied into every [`TimerEvent`].
pub type UserArgs = serde_json::Value;

/// Subscriber callback invoked when a timer fires.
///
/// Callbacks run synchronously on the event loop thread and must return
/// promptly. An `Err` is logged and counted; it never aborts the sweep.
pub type TimerCallback =
    Box<dyn FnMut(&TimerEvent, &mut FireContext) -> anyhow::Result<()> + Send>;

/// Payload delivered to subscribers on each firing.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerEvent {
    /// The timer that fired.
    pub source: TimerId,
    /// Copy of the timer's user arguments at fire time.
    pub user_args: UserArgs,
    /// Time the firing was dispatched.
    pub fired_at: Timestamp,
}

/// Identifies one subscriber on one timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    callback: TimerCallback,
}

/// Requests a firing callback can make while the registry is busy dispatching.
///
/// Subscribers never see the registry itself. Stopping the firing timer takes
/// effect as soon as dispatch returns; stopping any other timer is deferred
/// until the current sweep (or direct fire) has finished, so the sweep never
/// loses or revisits an entry.
#[derive(Debug)]
pub struct FireContext {
    source: TimerId,
    now: Timestamp,
    stop_self: bool,
    interval: Option<i64>,
    deferred_stops: Vec<TimerId>,
}

impl FireContext {
    pub(crate) fn new(source: TimerId, now: Timestamp) -> Self {
        Self {
            source,
            now,
            stop_self: false,
            interval: None,
            deferred_stops: Vec::new(),
        }
    }

    /// The timer being dispatched.
    pub fn source(&self) -> TimerId {
        self.source
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Unregister the firing timer.
    pub fn stop(&mut self) {
        self.stop_self = true;
    }

    /// Unregister `id`. Applied immediately for the firing timer, deferred
    /// until dispatch completes for any other.
    pub fn stop_timer(&mut self, id: TimerId) {
        if id == self.source {
            self.stop();
        } else if !self.deferred_stops.contains(&id) {
            self.deferred_stops.push(id);
        }
    }

    /// Change the firing timer's interval. Used for the reschedule that
    /// follows this firing.
    pub fn set_interval(&mut self, secs: i64) -> Result<(), TimerError> {
        validate_interval(secs)?;
        self.interval = Some(secs);
        Ok(())
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_self
    }

    pub(crate) fn take_deferred_stops(&mut self) -> Vec<TimerId> {
        std::mem::take(&mut self.deferred_stops)
    }
}

fn validate_interval(secs: i64) -> Result<(), TimerError> {
    if secs < 0 {
        return Err(TimerError::NegativeInterval(secs));
    }
    Ok(())
}

/// A periodic timer.
pub struct Timer {
    label: String,
    interval: i64,
    next_fire: Timestamp,
    user_args: UserArgs,
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
    registered: bool,
}

impl Timer {
    /// Create an unstarted timer with a zero interval and no subscribers.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            interval: 0,
            next_fire: 0,
            user_args: UserArgs::Null,
            subscribers: Vec::new(),
            next_subscription: 0,
            registered: false,
        }
    }

    pub fn with_interval(mut self, secs: i64) -> Result<Self, TimerError> {
        self.set_interval(secs)?;
        Ok(self)
    }

    pub fn with_user_args(mut self, args: UserArgs) -> Self {
        self.user_args = args;
        self
    }

    /// Builder form of [`subscribe`](Self::subscribe).
    pub fn on_fire<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&TimerEvent, &mut FireContext) -> anyhow::Result<()> + Send + 'static,
    {
        self.subscribe(callback);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Set the recurrence interval in seconds. Does not move an already
    /// pending due time; the new value applies from the next reschedule.
    pub fn set_interval(&mut self, secs: i64) -> Result<(), TimerError> {
        validate_interval(secs)?;
        self.interval = secs;
        Ok(())
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }

    pub fn set_user_args(&mut self, args: UserArgs) {
        self.user_args = args;
    }

    pub fn user_args(&self) -> &UserArgs {
        &self.user_args
    }

    /// Add a subscriber. Subscribers are invoked in subscription order.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&TimerEvent, &mut FireContext) -> anyhow::Result<()> + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push(Subscriber {
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Remove a subscriber. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Absolute time this timer is next due. Meaningless until started.
    pub fn next_fire(&self) -> Timestamp {
        self.next_fire
    }

    /// Whether the timer currently has an entry in the registry.
    pub fn is_started(&self) -> bool {
        self.registered
    }

    pub(crate) fn reschedule(&mut self, next: Timestamp) {
        self.next_fire = next;
    }

    pub(crate) fn set_registered(&mut self, registered: bool) {
        self.registered = registered;
    }

    /// Invoke every subscriber once. Returns the number that failed.
    pub(crate) fn fire(&mut self, event: &TimerEvent, ctx: &mut FireContext) -> usize {
        let mut failures = 0;
        for subscriber in &mut self.subscribers {
            if let Err(e) = (subscriber.callback)(event, ctx) {
                failures += 1;
                warn!(
                    timer = %self.label,
                    id = %event.source,
                    subscription = subscriber.id.0,
                    error = %e,
                    "timer callback failed"
                );
            }
        }

        if let Some(secs) = ctx.interval.take() {
            self.interval = secs;
        }

        failures
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("label", &self.label)
            .field("interval", &self.interval)
            .field("next_fire", &self.next_fire)
            .field("user_args", &self.user_args)
            .field("subscribers", &self.subscribers.len())
            .field("registered", &self.registered)
            .finish()
    }
}
