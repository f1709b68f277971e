//! # Graph Resolver
//!
//! Resolves the reference closure of one or more seed slices: the seeds plus
//! every slice reachable through `uses[*].reference.otherSlice`, each exactly
//! once.
//!
//! ## Algorithm
//!
//! Breadth-first over frontier *sets*, one store round-trip per level:
//!
//! 1. `requested` holds every ID ever put in a frontier; it only grows.
//! 2. Fetch the whole frontier with `SliceStore::get_many`. Missing IDs
//!    (dangling references, absent seeds) simply yield no document.
//! 3. The next frontier is every ID referenced by this round's documents that
//!    is not already in `requested`.
//! 4. Stop when the frontier is empty.
//!
//! Because an ID enters a frontier at most once, the loop terminates on
//! cyclic graphs and self-references after at most one round per reachable
//! ID. `ClosureLimits` additionally bounds size, rounds and wall-clock time.
//! Size counts fetched slices only; a frontier full of dangling IDs costs one
//! round and nothing else.
//!
//! The resolver never mutates the store.

use crate::filter::SliceFilter;
use crate::limits::ClosureLimits;
use crate::primitives::MAX_SAMPLE_SIZE;
use crate::store::SliceStore;
use crate::{Slice, SliceError, SliceId};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// CLOSURE
// =============================================================================

/// The deduplicated result of a closure resolution, keyed by `sliceID`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Closure {
    slices: BTreeMap<SliceId, Slice>,
    rounds: usize,
}

impl Closure {
    /// Number of distinct slices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: SliceId) -> bool {
        self.slices.contains_key(&id)
    }

    /// IDs in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = SliceId> + '_ {
        self.slices.keys().copied()
    }

    /// Number of store round-trips the resolution took.
    #[must_use]
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Remove one slice from the result.
    pub fn remove(&mut self, id: SliceId) -> Option<Slice> {
        self.slices.remove(&id)
    }

    /// The slices, ascending by ID.
    #[must_use]
    pub fn into_slices(self) -> Vec<Slice> {
        self.slices.into_values().collect()
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Read-only query engine over an injected store.
pub struct GraphResolver<'s, S: SliceStore + ?Sized> {
    store: &'s S,
    limits: ClosureLimits,
}

impl<'s, S: SliceStore + ?Sized> GraphResolver<'s, S> {
    /// Create a resolver with default limits.
    pub fn new(store: &'s S) -> Self {
        Self::with_limits(store, ClosureLimits::default())
    }

    pub fn with_limits(store: &'s S, limits: ClosureLimits) -> Self {
        Self { store, limits }
    }

    #[must_use]
    pub fn limits(&self) -> &ClosureLimits {
        &self.limits
    }

    /// Resolve the closure of `seeds`.
    ///
    /// Seeds absent from the store contribute nothing. An empty seed set
    /// yields an empty closure without touching the store.
    pub fn resolve_closure(&self, seeds: &BTreeSet<SliceId>) -> Result<Closure, SliceError> {
        let mut accumulated: BTreeMap<SliceId, Slice> = BTreeMap::new();
        let mut requested: BTreeSet<SliceId> = seeds.clone();
        let mut frontier: BTreeSet<SliceId> = seeds.clone();
        let mut rounds = 0usize;

        while !frontier.is_empty() {
            self.limits.check_round(rounds)?;

            let fetched = self.store.get_many(&frontier)?;
            rounds = rounds.saturating_add(1);

            tracing::trace!(
                round = rounds,
                requested = frontier.len(),
                fetched = fetched.len(),
                "closure round"
            );

            let mut next = BTreeSet::new();
            for slice in fetched {
                for target in slice.referenced_ids() {
                    if !requested.contains(&target) {
                        next.insert(target);
                    }
                }
                accumulated.entry(slice.slice_id).or_insert(slice);
            }
            self.limits.check_size(accumulated.len())?;

            requested.extend(next.iter().copied());
            frontier = next;
        }

        tracing::debug!(
            seeds = seeds.len(),
            slices = accumulated.len(),
            rounds,
            "closure resolved"
        );

        Ok(Closure {
            slices: accumulated,
            rounds,
        })
    }

    /// Resolve the closure of a single slice.
    pub fn resolve(&self, id: SliceId) -> Result<Closure, SliceError> {
        self.resolve_closure(&BTreeSet::from([id]))
    }

    /// Every slice reachable from `id`, excluding `id` itself even when a
    /// cycle leads back to it.
    pub fn references_only(&self, id: SliceId) -> Result<Vec<Slice>, SliceError> {
        let mut closure = self.resolve(id)?;
        closure.remove(id);
        Ok(closure.into_slices())
    }

    // =========================================================================
    // FILTERED SCANS
    // =========================================================================

    /// Every slice matching `filter`.
    pub fn scan(&self, filter: SliceFilter) -> Result<Vec<Slice>, SliceError> {
        let slices = self.store.scan(filter)?;
        tracing::debug!(filter = filter.name(), count = slices.len(), "scan");
        Ok(slices)
    }

    pub fn with_instances(&self) -> Result<Vec<Slice>, SliceError> {
        self.scan(SliceFilter::WithInstances)
    }

    pub fn with_references(&self) -> Result<Vec<Slice>, SliceError> {
        self.scan(SliceFilter::WithReferences)
    }

    pub fn without_references(&self) -> Result<Vec<Slice>, SliceError> {
        self.scan(SliceFilter::WithoutReferences)
    }

    pub fn liked(&self) -> Result<Vec<Slice>, SliceError> {
        self.scan(SliceFilter::Liked)
    }

    /// Up to `amount` random slices; `amount` is capped at `MAX_SAMPLE_SIZE`.
    pub fn sample(&self, amount: usize) -> Result<Vec<Slice>, SliceError> {
        self.store.sample(amount.min(MAX_SAMPLE_SIZE))
    }

    /// Every slice, unfiltered.
    pub fn all(&self) -> Result<Vec<Slice>, SliceError> {
        self.store.all()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ids(slices: &[Slice]) -> Vec<u64> {
        slices.iter().map(|s| s.slice_id.0).collect()
    }

    /// `{1 -> 2}`, `{2 -> 1}`, `{3}`
    fn two_cycle_store() -> MemoryStore {
        MemoryStore::with_slices([
            Slice::new(SliceId(1), "one").with_reference(SliceId(2)),
            Slice::new(SliceId(2), "two").with_reference(SliceId(1)),
            Slice::new(SliceId(3), "three"),
        ])
    }

    #[test]
    fn two_cycle_resolves_both() {
        let store = two_cycle_store();
        let resolver = GraphResolver::new(&store);

        let closure = resolver.resolve(SliceId(1)).expect("resolve");
        assert_eq!(closure.ids().collect::<Vec<_>>(), vec![SliceId(1), SliceId(2)]);
        assert_eq!(closure.rounds(), 2);
    }

    #[test]
    fn leaf_resolves_to_itself() {
        let store = two_cycle_store();
        let resolver = GraphResolver::new(&store);
        let closure = resolver.resolve(SliceId(3)).expect("resolve");
        assert_eq!(ids(&closure.into_slices()), vec![3]);
    }

    #[test]
    fn references_only_drops_seed() {
        let store = two_cycle_store();
        let resolver = GraphResolver::new(&store);
        let refs = resolver.references_only(SliceId(1)).expect("refs");
        assert_eq!(ids(&refs), vec![2]);
    }

    #[test]
    fn missing_seed_yields_empty() {
        let store = two_cycle_store();
        let resolver = GraphResolver::new(&store);
        let closure = resolver.resolve(SliceId(42)).expect("resolve");
        assert!(closure.is_empty());
    }

    #[test]
    fn empty_seed_set_touches_nothing() {
        let store = two_cycle_store();
        let resolver = GraphResolver::new(&store);
        let closure = resolver.resolve_closure(&BTreeSet::new()).expect("resolve");
        assert!(closure.is_empty());
        assert_eq!(closure.rounds(), 0);
    }

    #[test]
    fn self_reference_terminates() {
        let store =
            MemoryStore::with_slices([Slice::new(SliceId(5), "loop").with_reference(SliceId(5))]);
        let resolver = GraphResolver::new(&store);
        let closure = resolver.resolve(SliceId(5)).expect("resolve");
        assert_eq!(closure.len(), 1);
        assert!(resolver.references_only(SliceId(5)).expect("refs").is_empty());
    }

    #[test]
    fn dangling_reference_is_silent() {
        let store = MemoryStore::with_slices([Slice::new(SliceId(1), "a")
            .with_reference(SliceId(99))
            .with_reference(SliceId(2))]);
        let resolver = GraphResolver::new(&store);
        let closure = resolver.resolve(SliceId(1)).expect("resolve");
        assert_eq!(closure.ids().collect::<Vec<_>>(), vec![SliceId(1)]);
    }

    #[test]
    fn diamond_appears_once() {
        // 1 -> 2, 1 -> 3, 2 -> 4, 3 -> 4
        let store = MemoryStore::with_slices([
            Slice::new(SliceId(1), "top")
                .with_reference(SliceId(2))
                .with_reference(SliceId(3)),
            Slice::new(SliceId(2), "left").with_reference(SliceId(4)),
            Slice::new(SliceId(3), "right").with_reference(SliceId(4)),
            Slice::new(SliceId(4), "bottom"),
        ]);
        let resolver = GraphResolver::new(&store);
        let closure = resolver.resolve(SliceId(1)).expect("resolve");
        assert_eq!(ids(&closure.clone().into_slices()), vec![1, 2, 3, 4]);
        assert_eq!(closure.rounds(), 3);
    }

    #[test]
    fn multiple_seeds_merge() {
        let store = two_cycle_store();
        let resolver = GraphResolver::new(&store);
        let seeds = SliceId::parse_list("3,1").expect("parse");
        let closure = resolver.resolve_closure(&seeds).expect("resolve");
        assert_eq!(closure.len(), 3);
    }

    #[test]
    fn size_limit_fails_without_partial_result() {
        let store = MemoryStore::with_slices((1..=10).map(|i| {
            let slice = Slice::new(SliceId(i), "chain");
            if i < 10 {
                slice.with_reference(SliceId(i + 1))
            } else {
                slice
            }
        }));
        let limits = ClosureLimits::new().with_max_slices(4);
        let resolver = GraphResolver::with_limits(&store, limits);
        assert!(matches!(
            resolver.resolve(SliceId(1)),
            Err(SliceError::ClosureLimitExceeded { .. })
        ));
    }

    #[test]
    fn dangling_references_do_not_count_toward_size() {
        let hub = (100..=104).fold(
            Slice::new(SliceId(1), "hub").with_reference(SliceId(2)),
            |hub, id| hub.with_reference(SliceId(id)),
        );
        let store = MemoryStore::with_slices([hub, Slice::new(SliceId(2), "real")]);
        let resolver = GraphResolver::with_limits(&store, ClosureLimits::new().with_max_slices(3));
        let closure = resolver.resolve(SliceId(1)).expect("resolve");
        assert_eq!(ids(&closure.into_slices()), vec![1, 2]);
    }

    #[test]
    fn round_limit_bounds_depth() {
        let store = MemoryStore::with_slices([
            Slice::new(SliceId(1), "a").with_reference(SliceId(2)),
            Slice::new(SliceId(2), "b").with_reference(SliceId(3)),
            Slice::new(SliceId(3), "c"),
        ]);
        let shallow = GraphResolver::with_limits(&store, ClosureLimits::new().with_max_rounds(2));
        assert!(shallow.resolve(SliceId(1)).is_err());

        let enough = GraphResolver::with_limits(&store, ClosureLimits::new().with_max_rounds(3));
        assert_eq!(enough.resolve(SliceId(1)).expect("resolve").len(), 3);
    }

    #[test]
    fn cancelled_resolution_fails() {
        let store = two_cycle_store();
        let flag = crate::limits::CancelFlag::new();
        flag.cancel();
        let resolver = GraphResolver::with_limits(&store, ClosureLimits::new().with_cancel(flag));
        assert!(matches!(
            resolver.resolve(SliceId(1)),
            Err(SliceError::Cancelled)
        ));
    }

    #[test]
    fn scans_delegate_to_filters() {
        let mut liked = Slice::new(SliceId(4), "liked");
        liked.set_liked(true);
        let store = MemoryStore::with_slices([
            Slice::new(SliceId(1), "a").with_reference(SliceId(2)),
            Slice::new(SliceId(2), "b").with_instance(serde_json::json!({"t": 1})),
            liked,
        ]);
        let resolver = GraphResolver::new(&store);

        assert_eq!(ids(&resolver.with_references().expect("scan")), vec![1]);
        assert_eq!(ids(&resolver.without_references().expect("scan")), vec![2, 4]);
        assert_eq!(ids(&resolver.with_instances().expect("scan")), vec![2]);
        assert_eq!(ids(&resolver.liked().expect("scan")), vec![4]);
        assert_eq!(resolver.all().expect("all").len(), 3);
        assert_eq!(resolver.sample(2).expect("sample").len(), 2);
    }
}
