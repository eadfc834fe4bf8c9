// src/enrich/budget.rs
//! Shared rate budget for the GitHub API.
//!
//! Two states: open and exhausted. A remaining-quota reading below the
//! buffer trips the budget to exhausted, and it stays there for the rest of
//! the run. A fresh budget is built (and probed) at the start of every run.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use metrics::gauge;
use tracing::info;

/// Returned by [`RateBudget::check_open`] once the buffer has been reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted;

impl fmt::Display for Exhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("github rate limit buffer reached")
    }
}

impl std::error::Error for Exhausted {}

#[derive(Debug, Default, Clone, Copy)]
struct BudgetState {
    remaining: Option<u32>,
    exhausted: bool,
    // 403/429 seen since the last probe
    throttled: bool,
}

#[derive(Debug)]
pub struct RateBudget {
    buffer: u32,
    state: Mutex<BudgetState>,
}

impl RateBudget {
    pub fn new(buffer: u32) -> Self {
        Self {
            buffer,
            state: Mutex::new(BudgetState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BudgetState> {
        // State is plain data; a panic elsewhere can't leave it half-written.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a remaining-quota reading from a response header or probe.
    pub fn observe(&self, remaining: u32) {
        let mut st = self.lock();
        st.remaining = Some(remaining);
        if remaining < self.buffer && !st.exhausted {
            st.exhausted = true;
            info!(
                target: "enrich",
                remaining,
                buffer = self.buffer,
                "rate limit buffer reached; no new requests will be issued"
            );
        }
        gauge!("enrich_rate_remaining").set(f64::from(remaining));
    }

    /// Must be called immediately before issuing a request.
    pub fn check_open(&self) -> Result<(), Exhausted> {
        if self.lock().exhausted {
            Err(Exhausted)
        } else {
            Ok(())
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.lock().exhausted
    }

    /// Last observed remaining quota, if any response carried one.
    pub fn remaining(&self) -> Option<u32> {
        self.lock().remaining
    }

    pub fn buffer(&self) -> u32 {
        self.buffer
    }

    /// A 403/429 was seen; the orchestrator should re-probe before the next batch.
    pub fn mark_throttled(&self) {
        self.lock().throttled = true;
    }

    /// Returns whether a throttle was seen since the last call, and clears it.
    pub fn take_throttled(&self) -> bool {
        std::mem::take(&mut self.lock().throttled)
    }
}
