//! # Filter Module
//!
//! The closed set of single-level predicates the store can scan with.
//!
//! Filters never traverse references; they look at one document at a time.

use crate::Slice;

/// Named scan predicates over the slice shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceFilter {
    /// `count(instances) > 0`
    WithInstances,
    /// `count(uses) > 0`
    WithReferences,
    /// `count(uses) == 0`
    WithoutReferences,
    /// `liked == true`
    Liked,
}

impl SliceFilter {
    /// Evaluate the predicate against one slice.
    #[must_use]
    pub fn matches(self, slice: &Slice) -> bool {
        match self {
            Self::WithInstances => slice.has_instances(),
            Self::WithReferences => slice.has_references(),
            Self::WithoutReferences => !slice.has_references(),
            Self::Liked => slice.is_liked(),
        }
    }

    /// Stable name, used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::WithInstances => "with_instances",
            Self::WithReferences => "with_references",
            Self::WithoutReferences => "without_references",
            Self::Liked => "liked",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
