//! # Mutator
//!
//! Insert-if-absent plus the two atomic counters a slice carries after
//! creation: `upvotes` and `liked`.
//!
//! The mutator holds no locks of its own. Vote and toggle atomicity is
//! delegated to `SliceStore::update`, which applies one `FieldUpdate` per
//! call inside the store's write critical section. The mutator never
//! traverses references.

use crate::store::{FieldUpdate, SliceStore};
use crate::{InsertOutcome, Slice, SliceError, SliceId};

/// Direction of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    /// The counter delta: +1 or -1.
    #[must_use]
    pub const fn delta(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

/// Write-side operations over an injected store.
pub struct Mutator<'s, S: SliceStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: SliceStore + ?Sized> Mutator<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Insert `slice` unless its ID already exists.
    ///
    /// The slice is validated before any store call. An existing ID is
    /// reported as `InsertOutcome::Conflict` and the stored record is left
    /// untouched. The store's own insert re-checks existence under its write
    /// critical section, so a concurrent insert racing past the count below
    /// still ends in `Conflict` rather than an overwrite.
    pub fn insert(&self, slice: Slice) -> Result<InsertOutcome, SliceError> {
        slice.validate()?;

        if self.store.count_by_id(slice.slice_id)? > 0 {
            tracing::info!(slice_id = %slice.slice_id, "insert rejected: slice exists");
            return Ok(InsertOutcome::Conflict(slice.slice_id));
        }

        let outcome = self.store.insert(&slice)?;
        match &outcome {
            InsertOutcome::Inserted(_) => {
                tracing::info!(slice_id = %slice.slice_id, "slice inserted");
            }
            InsertOutcome::Conflict(id) => {
                tracing::info!(slice_id = %id, "insert lost race: slice exists");
            }
        }
        Ok(outcome)
    }

    /// Apply one vote and return the new `upvotes` value.
    pub fn vote(&self, id: SliceId, vote: Vote) -> Result<i64, SliceError> {
        let updated = self
            .store
            .update(id, FieldUpdate::AddUpvotes(vote.delta()))?
            .ok_or(SliceError::NotFound(id))?;
        tracing::debug!(slice_id = %id, ?vote, upvotes = updated.upvote_count(), "vote applied");
        Ok(updated.upvote_count())
    }

    /// Flip `liked` and return the new value.
    pub fn toggle_like(&self, id: SliceId) -> Result<bool, SliceError> {
        let updated = self
            .store
            .update(id, FieldUpdate::ToggleLiked)?
            .ok_or(SliceError::NotFound(id))?;
        tracing::debug!(slice_id = %id, liked = updated.is_liked(), "like toggled");
        Ok(updated.is_liked())
    }
}

// =============================================================================
// TESTS
// =============================================================================
