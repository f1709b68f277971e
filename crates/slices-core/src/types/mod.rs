//! # Core Type Definitions
//!
//! This module contains the data contract shared by the store, the resolver
//! and the mutator:
//! - Identifiers (`SliceId`)
//! - The stored document (`Slice`) and its edges (`Use`, `Reference`)
//! - Insert outcomes (`InsertOutcome`)
//! - Error types (`SliceError`)
//!
//! ## Document Layout
//!
//! A slice is stored as one JSON document:
//!
//! ```text
//! { sliceID, fragment, uses: [{ reference: { otherSlice } }], instances, liked, upvotes }
//! ```
//!
//! The referenced ID is nested one level under `reference` inside each `uses`
//! entry. Fields this crate does not know about are carried in `extra` maps so
//! a document reads back exactly as it was inserted.

use crate::primitives::{MAX_FRAGMENT_LENGTH, MAX_SEED_IDS, MAX_USES};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier of a slice. Always positive once validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SliceId(pub u64);

impl SliceId {
    /// Get the raw identifier value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Zero is never a valid slice identifier.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }

    /// Parse a seed list: a single ID or a comma-separated list of IDs.
    ///
    /// Items are trimmed and deduplicated. Empty items, non-numeric items and
    /// zero are rejected with `SliceError::MalformedId`.
    pub fn parse_list(input: &str) -> Result<BTreeSet<SliceId>, SliceError> {
        let mut ids = BTreeSet::new();
        for item in input.split(',') {
            ids.insert(item.parse::<SliceId>()?);
            if ids.len() > MAX_SEED_IDS {
                return Err(SliceError::MalformedId(format!(
                    "more than {} seed IDs",
                    MAX_SEED_IDS
                )));
            }
        }
        Ok(ids)
    }
}

impl FromStr for SliceId {
    type Err = SliceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.parse::<u64>() {
            Ok(0) | Err(_) => Err(SliceError::MalformedId(trimmed.to_string())),
            Ok(id) => Ok(Self(id)),
        }
    }
}

impl fmt::Display for SliceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SliceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// =============================================================================
// NULLABLE FIELDS
// =============================================================================

/// Optional document fields keep absent (`None`) apart from an explicit
/// `null` (`Some(None)`), so a document reads back as it was written.
/// Used together with `#[serde(default)]`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// =============================================================================
// REFERENCES
// =============================================================================

/// Edge descriptor: the slice a use points at, if any.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reference {
    /// Target slice. May be absent, `null` or dangling.
    #[serde(
        rename = "otherSlice",
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub other_slice: Option<Option<SliceId>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of a slice's `uses` list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Use {
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub reference: Option<Option<Reference>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Use {
    /// A use that references another slice.
    #[must_use]
    pub fn reference_to(target: SliceId) -> Self {
        Self {
            reference: Some(Some(Reference {
                other_slice: Some(Some(target)),
                extra: Map::new(),
            })),
            extra: Map::new(),
        }
    }

    /// The referenced slice, ignoring absent and zero targets.
    #[must_use]
    pub fn target(&self) -> Option<SliceId> {
        self.reference
            .as_ref()
            .and_then(Option::as_ref)
            .and_then(|r| r.other_slice.flatten())
            .filter(|id| id.is_valid())
    }
}

// =============================================================================
// SLICE
// =============================================================================

/// A catalogued fragment and its outgoing references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    #[serde(rename = "sliceID")]
    pub slice_id: SliceId,
    #[serde(default)]
    pub fragment: String,
    #[serde(default)]
    pub uses: Vec<Use>,
    /// Opaque; only its emptiness matters here.
    #[serde(default)]
    pub instances: Vec<Value>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub liked: Option<Option<bool>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub upvotes: Option<Option<i64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Slice {
    /// Create a slice with no uses, no instances and no votes.
    #[must_use]
    pub fn new(slice_id: SliceId, fragment: impl Into<String>) -> Self {
        Self {
            slice_id,
            fragment: fragment.into(),
            uses: Vec::new(),
            instances: Vec::new(),
            liked: None,
            upvotes: None,
            extra: Map::new(),
        }
    }

    /// Append a use referencing `target`.
    #[must_use]
    pub fn with_reference(mut self, target: SliceId) -> Self {
        self.uses.push(Use::reference_to(target));
        self
    }

    /// Append an opaque instance value.
    #[must_use]
    pub fn with_instance(mut self, instance: Value) -> Self {
        self.instances.push(instance);
        self
    }

    /// IDs referenced through `uses[*].reference.otherSlice`, in list order.
    pub fn referenced_ids(&self) -> impl Iterator<Item = SliceId> + '_ {
        self.uses.iter().filter_map(Use::target)
    }

    #[must_use]
    pub fn has_instances(&self) -> bool {
        !self.instances.is_empty()
    }

    #[must_use]
    pub fn has_references(&self) -> bool {
        !self.uses.is_empty()
    }

    /// `liked`, with absent or `null` meaning false.
    #[must_use]
    pub fn is_liked(&self) -> bool {
        self.liked.flatten().unwrap_or(false)
    }

    /// `upvotes`, with absent or `null` meaning zero.
    #[must_use]
    pub fn upvote_count(&self) -> i64 {
        self.upvotes.flatten().unwrap_or(0)
    }

    pub fn set_liked(&mut self, liked: bool) {
        self.liked = Some(Some(liked));
    }

    pub fn set_upvotes(&mut self, upvotes: i64) {
        self.upvotes = Some(Some(upvotes));
    }

    /// Validate a slice before it is inserted.
    pub fn validate(&self) -> Result<(), SliceError> {
        if !self.slice_id.is_valid() {
            return Err(SliceError::InvalidSlice(
                "sliceID must be a positive integer".to_string(),
            ));
        }
        if self.fragment.len() > MAX_FRAGMENT_LENGTH {
            return Err(SliceError::InvalidSlice(format!(
                "fragment length {} exceeds maximum {} bytes",
                self.fragment.len(),
                MAX_FRAGMENT_LENGTH
            )));
        }
        if self.uses.len() > MAX_USES {
            return Err(SliceError::InvalidSlice(format!(
                "{} uses exceed maximum {}",
                self.uses.len(),
                MAX_USES
            )));
        }
        Ok(())
    }
}

// =============================================================================
// INSERT OUTCOME
// =============================================================================

/// Result of an insert-if-absent.
///
/// A conflict is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The slice was stored.
    Inserted(Slice),
    /// A slice with this ID already exists and was left unchanged.
    Conflict(SliceId),
}

impl InsertOutcome {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by the store, the resolver and the mutator.
///
/// - No silent failures: store errors surface, never partial results
/// - Dangling references are not errors
/// - Insert conflicts are values (`InsertOutcome::Conflict`), not errors
#[derive(Debug, Error)]
pub enum SliceError {
    /// An ID parameter is not a positive integer.
    #[error("Malformed slice ID: {0:?}")]
    MalformedId(String),

    /// A slice failed validation before insertion.
    #[error("Invalid slice: {0}")]
    InvalidSlice(String),

    /// A vote or like targeted a slice that does not exist.
    #[error("Slice not found: {0}")]
    NotFound(SliceId),

    /// A closure grew past the configured size or round limit.
    #[error("Closure limit exceeded: {limit}")]
    ClosureLimitExceeded { limit: String },

    /// A closure did not finish before its deadline.
    #[error("Closure deadline exceeded")]
    DeadlineExceeded,

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// A stored document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The store is unavailable or failed an I/O operation.
    #[error("Store unavailable: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
