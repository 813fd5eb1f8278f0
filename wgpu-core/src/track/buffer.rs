//! The Buffer Tracker and its matching Usage Scope.

use std::marker::PhantomData;

use hal::BufferUses;
use smallvec::SmallVec;

use crate::{
    hal_api::HalApi,
    track::{
        metadata::ResourceMetadata, PendingTransition, ResourceTracker, ResourceUses,
        StateTransition, TrackerIndex,
    },
};

use super::UsageConflict;

/// The per-command-buffer-local accumulation of requested buffer usage
/// (the buffer half of `UsageScope`).
///
/// Owned by a command encoder or pass encoder; single-threaded. Detects
/// conflicting usage requests for the same buffer within one scope
/// immediately, rather than deferring that check to submit time.
#[derive(Debug)]
pub struct BufferUsageScope<A: HalApi> {
    metadata: ResourceMetadata<()>,
    state: Vec<BufferUses>,
    _phantom: PhantomData<A>,
}

impl<A: HalApi> BufferUsageScope<A> {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(),
            state: Vec::new(),
            _phantom: PhantomData,
        }
    }

    fn set_size(&mut self, size: usize) {
        self.metadata.set_size(size);
        if size > self.state.len() {
            self.state.resize(size, BufferUses::empty());
        }
    }

    /// Records that `index` was used with `requested` in this scope.
    ///
    /// If `index` has no prior state in this scope, stores `requested`
    /// outright. If it does, and the prior and requested usages are
    /// compatible, stores their union. Otherwise fails
    /// with [`UsageConflict`] and leaves the scope's state for `index`
    /// unchanged.
    pub fn set_single(
        &mut self,
        index: TrackerIndex,
        requested: BufferUses,
    ) -> Result<(), UsageConflict<BufferUses>> {
        let index_usize = index.as_usize();
        self.set_size(index_usize + 1);

        if !self.metadata.is_owned(index_usize) {
            self.metadata.set_owned(index_usize, true);
            self.state[index_usize] = requested;
            return Ok(());
        }

        let existing = self.state[index_usize];
        if !existing.is_compatible(requested) {
            return Err(UsageConflict {
                index,
                existing,
                requested,
            });
        }
        self.state[index_usize] = existing | requested;
        Ok(())
    }

    pub fn get_usage(&self, index: TrackerIndex) -> BufferUses {
        let index_usize = index.as_usize();
        if !self.metadata.is_owned(index_usize) {
            return BufferUses::empty();
        }
        self.state[index_usize]
    }

    pub fn is_used(&self, index: TrackerIndex) -> bool {
        self.metadata.is_owned(index.as_usize())
    }

    /// Returns the scope to empty, retaining its storage capacity.
    pub fn clear(&mut self) {
        self.metadata.clear();
    }

    pub(crate) fn owned_indices(&self) -> impl Iterator<Item = TrackerIndex> + '_ {
        self.metadata.owned_indices().map(|i| TrackerIndex::from_usize(i))
    }
}

impl<A: HalApi> Default for BufferUsageScope<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// The device-global authoritative end-of-queue usage state for every live
/// buffer.
#[derive(Debug)]
pub struct BufferTracker<A: HalApi> {
    metadata: ResourceMetadata<()>,
    state: Vec<BufferUses>,
    _phantom: PhantomData<A>,
}

impl<A: HalApi> BufferTracker<A> {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(),
            state: Vec::new(),
            _phantom: PhantomData,
        }
    }

    fn set_size(&mut self, size: usize) {
        self.metadata.set_size(size);
        if size > self.state.len() {
            self.state.resize(size, BufferUses::empty());
        }
    }

    /// Begins tracking `index` with initial state `usage`. The index must
    /// not already be tracked.
    pub fn insert(&mut self, index: TrackerIndex, usage: BufferUses) {
        let index_usize = index.as_usize();
        self.set_size(index_usize + 1);
        debug_assert!(
            !self.metadata.is_owned(index_usize),
            "BufferTracker::insert called on an already-tracked index {index}"
        );
        self.metadata.set_owned(index_usize, true);
        self.state[index_usize] = usage;
    }

    /// Stops tracking `index`. Idempotent if not tracked.
    pub fn remove(&mut self, index: TrackerIndex) {
        self.metadata.set_owned(index.as_usize(), false);
    }

    /// The current state, or the empty usage if untracked.
    pub fn get_usage(&self, index: TrackerIndex) -> BufferUses {
        let index_usize = index.as_usize();
        if !self.metadata.is_owned(index_usize) || index_usize >= self.state.len() {
            return BufferUses::empty();
        }
        self.state[index_usize]
    }

    /// Overwrites the tracked state. A no-op if `index` is untracked.
    pub fn set_usage(&mut self, index: TrackerIndex, usage: BufferUses) {
        let index_usize = index.as_usize();
        if !self.metadata.is_owned(index_usize) {
            return;
        }
        self.state[index_usize] = usage;
    }

    pub fn is_tracked(&self, index: TrackerIndex) -> bool {
        self.metadata.is_owned(index.as_usize())
    }

    pub fn size(&self) -> usize {
        self.metadata.count()
    }

    /// Reconciles `scope`'s requested usages against this tracker's
    /// authoritative state, producing the transitions a backend must
    /// execute before the scope's command buffer runs, and advancing this
    /// tracker's state to match the scope's end-state for every index the
    /// scope touched.
    ///
    /// Infallible by construction: every pair of states is a valid
    /// transition, possibly a zero-barrier one. An empty scope produces an
    /// empty transition list and leaves this tracker unchanged. Most scopes
    /// touch only a handful of buffers, so the result stays inline rather
    /// than allocating.
    #[must_use]
    pub fn merge(
        &mut self,
        scope: &BufferUsageScope<A>,
    ) -> SmallVec<[PendingTransition<BufferUses>; 4]> {
        profiling::scope!("BufferTracker::merge");
        let mut transitions = SmallVec::new();

        for index in scope.owned_indices() {
            let requested = scope.get_usage(index);
            let index_usize = index.as_usize();
            self.set_size(index_usize + 1);

            if !self.metadata.is_owned(index_usize) {
                log::trace!("buffer {index} first use in this tracker, state -> {requested:?}");
                self.metadata.set_owned(index_usize, true);
                self.state[index_usize] = requested;
                continue;
            }

            let old = self.state[index_usize];
            if old == requested {
                continue;
            }

            let transition = StateTransition {
                from: old,
                to: requested,
            };
            if transition.needs_barrier() {
                log::trace!("buffer {index} transition {old:?} -> {requested:?}");
            }
            transitions.push(PendingTransition {
                index,
                selector: None,
                usage: transition,
            });
            self.state[index_usize] = requested;
        }

        transitions
    }
}

impl<A: HalApi> Default for BufferTracker<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: HalApi> ResourceTracker for BufferTracker<A> {
    fn remove_abandoned(&mut self, index: TrackerIndex) -> bool {
        let index_usize = index.as_usize();
        if !self.metadata.is_owned(index_usize) {
            return false;
        }
        self.metadata.set_owned(index_usize, false);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FakeApi;
    impl hal::Api for FakeApi {
        type Buffer = ();
        type Texture = ();
    }

    fn idx(i: u32) -> TrackerIndex {
        TrackerIndex::from_usize(i as usize)
    }

    #[test]
    fn scope_merges_compatible_reads() {
        let mut scope = BufferUsageScope::<FakeApi>::new();
        scope.set_single(idx(0), BufferUses::VERTEX).unwrap();
        scope.set_single(idx(0), BufferUses::UNIFORM).unwrap();
        assert_eq!(
            scope.get_usage(idx(0)),
            BufferUses::VERTEX | BufferUses::UNIFORM
        );
    }

    #[test]
    fn scope_rejects_incompatible_usages() {
        let mut scope = BufferUsageScope::<FakeApi>::new();
        scope.set_single(idx(0), BufferUses::COPY_SRC).unwrap();
        let err = scope.set_single(idx(0), BufferUses::COPY_DST).unwrap_err();
        assert_eq!(err.existing, BufferUses::COPY_SRC);
        assert_eq!(err.requested, BufferUses::COPY_DST);
        // Unchanged after the rejected call.
        assert_eq!(scope.get_usage(idx(0)), BufferUses::COPY_SRC);
    }

    #[test]
    fn first_use_insert_emits_no_transition() {
        let mut tracker = BufferTracker::<FakeApi>::new();
        let mut scope = BufferUsageScope::<FakeApi>::new();
        scope.set_single(idx(5), BufferUses::UNIFORM).unwrap();

        let transitions = tracker.merge(&scope);
        assert!(transitions.is_empty());
        assert!(tracker.is_tracked(idx(5)));
        assert_eq!(tracker.get_usage(idx(5)), BufferUses::UNIFORM);
    }

    #[test]
    fn read_to_write_generates_barrier() {
        let mut tracker = BufferTracker::<FakeApi>::new();
        tracker.insert(idx(0), BufferUses::VERTEX);

        let mut scope = BufferUsageScope::<FakeApi>::new();
        scope.set_single(idx(0), BufferUses::COPY_DST).unwrap();

        let transitions = tracker.merge(&scope);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].usage.from, BufferUses::VERTEX);
        assert_eq!(transitions[0].usage.to, BufferUses::COPY_DST);
        assert!(transitions[0].needs_barrier());
        assert_eq!(tracker.get_usage(idx(0)), BufferUses::COPY_DST);
    }

    #[test]
    fn read_to_different_read_generates_no_barrier_transition() {
        let mut tracker = BufferTracker::<FakeApi>::new();
        tracker.insert(idx(0), BufferUses::VERTEX);

        let mut scope = BufferUsageScope::<FakeApi>::new();
        scope.set_single(idx(0), BufferUses::UNIFORM).unwrap();

        let transitions = tracker.merge(&scope);
        assert_eq!(transitions.len(), 1);
        assert!(!transitions[0].needs_barrier());
        assert_eq!(tracker.get_usage(idx(0)), BufferUses::UNIFORM);
    }

    #[test]
    fn merge_of_empty_scope_is_a_noop() {
        let mut tracker = BufferTracker::<FakeApi>::new();
        tracker.insert(idx(0), BufferUses::VERTEX);

        let scope = BufferUsageScope::<FakeApi>::new();
        let transitions = tracker.merge(&scope);
        assert!(transitions.is_empty());
        assert_eq!(tracker.get_usage(idx(0)), BufferUses::VERTEX);
    }

    #[test]
    fn remove_then_insert_restores_fresh_state() {
        let mut tracker = BufferTracker::<FakeApi>::new();
        tracker.insert(idx(0), BufferUses::STORAGE_WRITE);
        tracker.remove(idx(0));
        assert!(!tracker.is_tracked(idx(0)));
        tracker.insert(idx(0), BufferUses::VERTEX);
        assert_eq!(tracker.get_usage(idx(0)), BufferUses::VERTEX);
    }
}
