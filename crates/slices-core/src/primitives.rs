//! # Primitives
//!
//! Hardcoded runtime constants for the slices engine.
//!
//! Every traversal and every scan the engine performs is bounded by one of
//! these values unless the caller supplies a tighter limit.

/// Number of slices returned by `sample` when the caller names no amount.
pub const DEFAULT_SAMPLE_SIZE: usize = 3;

/// Upper bound on a single sample request.
pub const MAX_SAMPLE_SIZE: usize = 1000;

/// Maximum number of slices a single closure may accumulate.
///
/// A closure that would grow past this fails with
/// `SliceError::ClosureLimitExceeded` instead of returning a partial graph.
pub const MAX_CLOSURE_SLICES: usize = 10_000;

/// Maximum number of frontier rounds (BFS levels) in a single closure.
pub const MAX_CLOSURE_ROUNDS: usize = 1_000;

/// Maximum number of seed IDs accepted in one comma-separated list.
pub const MAX_SEED_IDS: usize = 1_000;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for a slice fragment (64KB).
pub const MAX_FRAGMENT_LENGTH: usize = 65536;

/// Maximum number of `uses` entries on one slice.
pub const MAX_USES: usize = 10_000;
