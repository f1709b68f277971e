//! # slices-core
//!
//! The engine behind the slices catalog.
//!
//! Slices are short fragments that reference each other through their
//! `uses` lists, forming a directed graph that may contain cycles and
//! dangling edges. This crate provides:
//!
//! - `SliceStore`: the document store contract, with an in-memory
//!   (`MemoryStore`) and a redb-backed (`RedbStore`) implementation
//! - `GraphResolver`: bounded breadth-first reference closure and the
//!   filtered scans
//! - `Mutator`: insert-if-absent and store-atomic vote/like updates
//!
//! ## Architectural Constraints
//!
//! - Synchronous: every store round-trip is a plain blocking call; the app
//!   layer decides where to run it
//! - The store handle is always injected, never global
//! - The resolver never mutates; the mutator never traverses

// =============================================================================
// MODULES
// =============================================================================

pub mod filter;
pub mod limits;
pub mod mutator;
pub mod primitives;
pub mod resolver;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use types::{InsertOutcome, Reference, Slice, SliceError, SliceId, Use};

pub use filter::SliceFilter;
pub use limits::{CancelFlag, ClosureLimits};
pub use mutator::{Mutator, Vote};
pub use resolver::{Closure, GraphResolver};
pub use storage::RedbStore;
pub use store::{FieldUpdate, MemoryStore, SliceStore};
