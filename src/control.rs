//! Cooperative cancellation and the fixed-tick control loop.
//!
//! Every long-running motion loop advances one state step per tick and polls
//! the shared cancellation token at the top of each iteration, so an
//! interrupt from another thread takes effect within one control period.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One-shot cancellation token shared between the motion loops and the
/// finalization layer. Once cancelled it stays cancelled for the rest of
/// the round.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Suspension point of a control loop. `wait` blocks (or, under simulation,
/// advances the world) for exactly one control period.
pub trait Ticker: Send + Sync {
    fn wait(&self);

    /// The control period. Loops with a duration ceiling count ticks against
    /// this instead of reading the wall clock, so they behave identically
    /// under simulation.
    fn period(&self) -> Duration;
}

/// Production ticker: sleeps one control period per wait.
pub struct IntervalTicker {
    period: Duration,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl Ticker for IntervalTicker {
    fn wait(&self) {
        std::thread::sleep(self.period);
    }

    fn period(&self) -> Duration {
        self.period
    }
}
