//! # Slice Store
//!
//! The `SliceStore` trait is the document store contract the resolver and the
//! mutator run against, plus `MemoryStore`, the in-process implementation.
//!
//! Stores are shared (`&self` everywhere) and must make every `insert` and
//! `update` atomic per document: concurrent updates of one slice serialize
//! inside the store, so no vote or toggle is ever lost.

use crate::{InsertOutcome, Slice, SliceError, SliceFilter, SliceId};
use rand::seq::IteratorRandom;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

// =============================================================================
// FIELD UPDATES
// =============================================================================

/// Single-document update expressions with default-if-absent semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUpdate {
    /// `upvotes = (upvotes ?? 0) + delta`
    AddUpvotes(i64),
    /// `liked = !(liked ?? false)`
    ToggleLiked,
}

impl FieldUpdate {
    /// Apply the expression in place.
    pub fn apply(self, slice: &mut Slice) {
        match self {
            Self::AddUpvotes(delta) => {
                slice.set_upvotes(slice.upvote_count().saturating_add(delta));
            }
            Self::ToggleLiked => {
                slice.set_liked(!slice.is_liked());
            }
        }
    }
}

// =============================================================================
// SLICESTORE TRAIT
// =============================================================================

/// The document store holding one collection of slices keyed by `sliceID`.
///
/// All fallible operations return `Result<T, SliceError>` so in-memory and
/// persistent backends are used uniformly.
pub trait SliceStore: Send + Sync {
    /// Fetch every slice whose ID is in `ids`. Missing IDs yield nothing.
    fn get_many(&self, ids: &BTreeSet<SliceId>) -> Result<Vec<Slice>, SliceError>;

    /// Every slice, ascending by ID.
    fn all(&self) -> Result<Vec<Slice>, SliceError>;

    /// Up to `amount` slices chosen uniformly at random.
    fn sample(&self, amount: usize) -> Result<Vec<Slice>, SliceError>;

    /// Number of slices stored under `id` (0 or 1).
    fn count_by_id(&self, id: SliceId) -> Result<usize, SliceError>;

    /// Insert unless the ID already exists.
    ///
    /// The existence check and the write happen under one write critical
    /// section, so two concurrent inserts of one new ID yield exactly one
    /// `Inserted`.
    fn insert(&self, slice: &Slice) -> Result<InsertOutcome, SliceError>;

    /// Atomically apply `update` to one slice and return the new document.
    ///
    /// Returns `Ok(None)` if no slice has this ID; nothing is created.
    fn update(&self, id: SliceId, update: FieldUpdate) -> Result<Option<Slice>, SliceError>;

    /// Total number of slices.
    fn len(&self) -> Result<usize, SliceError>;

    /// Every slice matching `filter`, ascending by ID.
    fn scan(&self, filter: SliceFilter) -> Result<Vec<Slice>, SliceError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|slice| filter.matches(slice))
            .collect())
    }

    /// Fetch one slice.
    fn get(&self, id: SliceId) -> Result<Option<Slice>, SliceError> {
        Ok(self.get_many(&BTreeSet::from([id]))?.into_iter().next())
    }

    /// Check whether the store holds no slices.
    fn is_empty(&self) -> Result<bool, SliceError> {
        Ok(self.len()? == 0)
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-memory slice store.
///
/// Uses `BTreeMap` for deterministic ordering. A single `RwLock` makes each
/// insert and update one critical section.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slices: RwLock<BTreeMap<SliceId, Slice>>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `slices`. Later duplicates are ignored.
    #[must_use]
    pub fn with_slices(slices: impl IntoIterator<Item = Slice>) -> Self {
        let mut map = BTreeMap::new();
        for slice in slices {
            map.entry(slice.slice_id).or_insert(slice);
        }
        Self {
            slices: RwLock::new(map),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<SliceId, Slice>>, SliceError> {
        self.slices
            .read()
            .map_err(|_| SliceError::IoError("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<SliceId, Slice>>, SliceError> {
        self.slices
            .write()
            .map_err(|_| SliceError::IoError("memory store lock poisoned".to_string()))
    }
}

impl SliceStore for MemoryStore {
    fn get_many(&self, ids: &BTreeSet<SliceId>) -> Result<Vec<Slice>, SliceError> {
        let slices = self.read()?;
        Ok(ids.iter().filter_map(|id| slices.get(id).cloned()).collect())
    }

    fn all(&self) -> Result<Vec<Slice>, SliceError> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn sample(&self, amount: usize) -> Result<Vec<Slice>, SliceError> {
        let slices = self.read()?;
        let mut rng = rand::thread_rng();
        Ok(slices
            .values()
            .choose_multiple(&mut rng, amount)
            .into_iter()
            .cloned()
            .collect())
    }

    fn count_by_id(&self, id: SliceId) -> Result<usize, SliceError> {
        Ok(usize::from(self.read()?.contains_key(&id)))
    }

    fn insert(&self, slice: &Slice) -> Result<InsertOutcome, SliceError> {
        let mut slices = self.write()?;
        if slices.contains_key(&slice.slice_id) {
            return Ok(InsertOutcome::Conflict(slice.slice_id));
        }
        slices.insert(slice.slice_id, slice.clone());
        Ok(InsertOutcome::Inserted(slice.clone()))
    }

    fn update(&self, id: SliceId, update: FieldUpdate) -> Result<Option<Slice>, SliceError> {
        let mut slices = self.write()?;
        Ok(slices.get_mut(&id).map(|slice| {
            update.apply(slice);
            slice.clone()
        }))
    }

    fn len(&self) -> Result<usize, SliceError> {
        Ok(self.read()?.len())
    }

    fn scan(&self, filter: SliceFilter) -> Result<Vec<Slice>, SliceError> {
        Ok(self
            .read()?
            .values()
            .filter(|slice| filter.matches(slice))
            .cloned()
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(ids: &[u64]) -> MemoryStore {
        MemoryStore::with_slices(
            ids.iter()
                .map(|&id| Slice::new(SliceId(id), format!("slice {id}"))),
        )
    }

    #[test]
    fn get_many_skips_missing() {
        let store = store_with(&[1, 2]);
        let ids = BTreeSet::from([SliceId(1), SliceId(9)]);
        let found = store.get_many(&ids).expect("get");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slice_id, SliceId(1));
    }

    #[test]
    fn insert_conflict_keeps_original() {
        let store = store_with(&[1]);
        let replacement = Slice::new(SliceId(1), "other");
        let outcome = store.insert(&replacement).expect("insert");
        assert_eq!(outcome, InsertOutcome::Conflict(SliceId(1)));
        let kept = store.get(SliceId(1)).expect("get").expect("present");
        assert_eq!(kept.fragment, "slice 1");
    }

    #[test]
    fn update_missing_returns_none() {
        let store = MemoryStore::new();
        let updated = store
            .update(SliceId(3), FieldUpdate::AddUpvotes(1))
            .expect("update");
        assert!(updated.is_none());
        assert!(store.is_empty().expect("empty"));
    }

    #[test]
    fn add_upvotes_defaults_to_zero() {
        let store = store_with(&[1]);
        let updated = store
            .update(SliceId(1), FieldUpdate::AddUpvotes(-1))
            .expect("update")
            .expect("present");
        assert_eq!(updated.upvotes, Some(Some(-1)));
    }

    #[test]
    fn toggle_liked_defaults_to_false() {
        let store = store_with(&[1]);
        let updated = store
            .update(SliceId(1), FieldUpdate::ToggleLiked)
            .expect("update")
            .expect("present");
        assert_eq!(updated.liked, Some(Some(true)));
    }

    #[test]
    fn upvotes_saturate() {
        let mut slice = Slice::new(SliceId(1), "x");
        slice.set_upvotes(i64::MAX);
        FieldUpdate::AddUpvotes(1).apply(&mut slice);
        assert_eq!(slice.upvote_count(), i64::MAX);
    }

    #[test]
    fn sample_caps_at_store_size() {
        let store = store_with(&[1, 2, 3, 4, 5]);
        assert_eq!(store.sample(3).expect("sample").len(), 3);
        assert_eq!(store.sample(50).expect("sample").len(), 5);
        assert!(store.sample(0).expect("sample").is_empty());
    }

    #[test]
    fn sample_returns_distinct_slices() {
        let store = store_with(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let sampled = store.sample(8).expect("sample");
        let ids: BTreeSet<_> = sampled.iter().map(|s| s.slice_id).collect();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn scan_filters_in_id_order() {
        let store = MemoryStore::with_slices([
            Slice::new(SliceId(3), "c").with_reference(SliceId(1)),
            Slice::new(SliceId(1), "a"),
            Slice::new(SliceId(2), "b").with_reference(SliceId(1)),
        ]);
        let ids: Vec<_> = store
            .scan(SliceFilter::WithReferences)
            .expect("scan")
            .into_iter()
            .map(|s| s.slice_id)
            .collect();
        assert_eq!(ids, vec![SliceId(2), SliceId(3)]);
    }
}
