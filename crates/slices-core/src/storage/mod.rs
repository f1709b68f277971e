//! # Persistent Storage
//!
//! Disk-backed implementations of `SliceStore`.

mod redb_store;

pub use redb_store::RedbStore;
