//! Upload progress plumbing.
//!
//! Every upload reports through a [`ProgressGuard`], which keeps the stream
//! of percentages non-decreasing, holds it below 100 until the upload has
//! genuinely completed, and goes silent once the upload has failed. Stores
//! that cannot report progress get a synthetic ticker instead
//! ([`with_simulated_progress`]), so callers never sit without feedback.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;

use crate::{ProgressFn, ProgressRules, MIN_PROGRESS_INTERVAL};

/// Highest percentage allowed before an upload settles
const PENDING_MAX: u8 = 99;

#[derive(Debug, Default)]
struct GuardState {
    last: Option<u8>,
    closed: bool,
}

/// Monotonic, close-once wrapper around a progress sink
pub struct ProgressGuard {
    sink: ProgressFn,
    state: Mutex<GuardState>,
}

impl ProgressGuard {
    pub fn new(sink: ProgressFn) -> Arc<Self> {
        Arc::new(Self {
            sink,
            state: Mutex::new(GuardState::default()),
        })
    }

    /// Report an in-flight percentage. Regressions and repeats are dropped.
    pub fn report(&self, percent: u8) {
        let percent = percent.min(PENDING_MAX);
        {
            let mut state = self.state.lock();
            if state.closed || state.last.is_some_and(|last| percent <= last) {
                return;
            }
            state.last = Some(percent);
        }
        // sink runs unlocked so it may read the guard back
        (self.sink)(percent);
    }

    /// Deliver the final 100 and stop forwarding
    pub fn complete(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.last = Some(100);
        }
        (self.sink)(100);
    }

    /// Stop forwarding without a final value
    pub fn fail(&self) {
        self.state.lock().closed = true;
    }

    pub fn last(&self) -> Option<u8> {
        self.state.lock().last
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Expose the guard as a plain sink, e.g. for stores with native progress
    pub fn as_sink(self: &Arc<Self>) -> ProgressFn {
        let guard = Arc::clone(self);
        Arc::new(move |percent| guard.report(percent))
    }
}

/// Drive `work` to completion while ticking synthetic progress into `guard`.
///
/// Starts at 0 and advances by `rules.step` every `rules.interval`, never
/// above `rules.ceiling`. The caller decides what happens once `work` settles.
pub async fn with_simulated_progress<F>(
    rules: &ProgressRules,
    guard: &ProgressGuard,
    work: F,
) -> F::Output
where
    F: Future,
{
    tokio::pin!(work);

    let mut ticker = tokio::time::interval(rules.interval.max(MIN_PROGRESS_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick resolves immediately
    ticker.tick().await;

    let step = rules.step.max(1);
    let mut current: u8 = 0;
    guard.report(current);

    loop {
        tokio::select! {
            biased;
            output = &mut work => return output,
            _ = ticker.tick() => {
                current = current.saturating_add(step).min(rules.ceiling);
                guard.report(current);
            }
        }
    }
}
