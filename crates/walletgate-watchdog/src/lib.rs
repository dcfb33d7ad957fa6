//! Fixed-interval watchdog for walletgate.
//!
//! Session expiry doesn't need real-time precision: checking once a minute
//! is plenty. This crate provides the periodic tick and the task plumbing
//! around it, so the auth layer only has to supply the check itself.
//!
//! # Integration
//!
//! ```ignore
//! let handle = spawn(WatchdogConfig::every(Duration::from_secs(60)), move || {
//!     if session_expired() {
//!         disconnect();
//!         return Verdict::Stop;
//!     }
//!     Verdict::Continue
//! });
//! // Dropping `handle` aborts the task.
//! ```
//!
//! The check runs on the watchdog task, between ticks. It must not block.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant as TokioInstant, Interval, MissedTickBehavior};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a watchdog.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Time between checks. The first check happens one interval after
    /// the watchdog starts, not immediately.
    pub interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
        }
    }
}

impl WatchdogConfig {
    /// Once per minute.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

    /// Shortest interval accepted. Tokio refuses a zero period outright.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Create a config with the given interval.
    pub fn every(interval: Duration) -> Self {
        Self { interval }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`Watchdog::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                "watchdog interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// What a check tells the watchdog to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep ticking.
    Continue,
    /// The watched thing is gone or has been handled; end the task.
    Stop,
}

// ---------------------------------------------------------------------------
// Watchdog
// ---------------------------------------------------------------------------

/// The tick source behind a watchdog task.
///
/// Missed ticks (the runtime was busy, the machine slept) are skipped, not
/// replayed: after a long pause there is one check, not a burst.
pub struct Watchdog {
    interval: Interval,
    period: Duration,
    ticks: u64,
}

impl Watchdog {
    /// Create a watchdog whose first tick is one interval from now.
    pub fn new(config: WatchdogConfig) -> Self {
        let config = config.validated();
        let period = config.interval;
        let mut interval = time::interval_at(TokioInstant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(interval_ms = period.as_millis() as u64, "watchdog created");

        Self {
            interval,
            period,
            ticks: 0,
        }
    }

    /// Wait for the next tick. Returns the tick number (starting at 1).
    pub async fn wait_for_tick(&mut self) -> u64 {
        self.interval.tick().await;
        self.ticks += 1;
        trace!(tick = self.ticks, "watchdog tick");
        self.ticks
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// The configured interval.
    pub fn period(&self) -> Duration {
        self.period
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Owns a running watchdog task. Dropping the handle aborts the task, so a
/// watchdog can never outlive whatever holds its handle.
#[derive(Debug)]
pub struct WatchdogHandle {
    task: JoinHandle<()>,
}

impl WatchdogHandle {
    /// Whether the task has ended (its check returned [`Verdict::Stop`] or
    /// it was aborted).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Abort the task now. Equivalent to dropping the handle.
    pub fn stop(self) {}
}

impl Drop for WatchdogHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a task calling `check` on every tick until it returns
/// [`Verdict::Stop`] or the returned handle is dropped.
///
/// Must be called from inside a Tokio runtime.
pub fn spawn<F>(config: WatchdogConfig, mut check: F) -> WatchdogHandle
where
    F: FnMut() -> Verdict + Send + 'static,
{
    let mut watchdog = Watchdog::new(config);
    let task = tokio::spawn(async move {
        loop {
            let tick = watchdog.wait_for_tick().await;
            if check() == Verdict::Stop {
                debug!(tick, "watchdog stopped by its check");
                break;
            }
        }
    });
    WatchdogHandle { task }
}
