//! # Closure Limits
//!
//! Bounds applied to every closure resolution: accumulated size, number of
//! frontier rounds, an optional wall-clock deadline and an optional
//! cancellation flag.
//!
//! Rounds, deadline and cancellation are checked before each round. Size is
//! checked after each fetch and counts only slices that exist, so dangling
//! references never count against it. Exceeding any limit fails the whole
//! resolution; no partial graph is ever returned.

use crate::SliceError;
use crate::primitives::{MAX_CLOSURE_ROUNDS, MAX_CLOSURE_SLICES};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative cancellation shared between a caller and a running resolution.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The resolver stops at its next round.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Bounds for a single closure resolution.
#[derive(Debug, Clone)]
pub struct ClosureLimits {
    /// Maximum slices fetched into one closure.
    pub max_slices: usize,
    /// Maximum number of frontier rounds.
    pub max_rounds: usize,
    /// Wall-clock deadline for the whole resolution.
    pub deadline: Option<Instant>,
    /// Caller-held cancellation flag.
    pub cancel: Option<CancelFlag>,
}

impl Default for ClosureLimits {
    fn default() -> Self {
        Self {
            max_slices: MAX_CLOSURE_SLICES,
            max_rounds: MAX_CLOSURE_ROUNDS,
            deadline: None,
            cancel: None,
        }
    }
}

impl ClosureLimits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_slices(mut self, max_slices: usize) -> Self {
        self.max_slices = max_slices;
        self
    }

    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Set the deadline to `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Check whether round `round` (zero-based) may start.
    pub(crate) fn check_round(&self, round: usize) -> Result<(), SliceError> {
        if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            return Err(SliceError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(SliceError::DeadlineExceeded);
        }
        if round >= self.max_rounds {
            return Err(SliceError::ClosureLimitExceeded {
                limit: format!("more than {} rounds", self.max_rounds),
            });
        }
        Ok(())
    }

    /// Check the number of slices fetched so far.
    pub(crate) fn check_size(&self, fetched: usize) -> Result<(), SliceError> {
        if fetched > self.max_slices {
            return Err(SliceError::ClosureLimitExceeded {
                limit: format!("more than {} slices", self.max_slices),
            });
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
