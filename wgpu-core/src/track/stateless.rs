//! The shared tracker for resource classes that never need state
//! transitions: samplers, bind groups, bind-group layouts, pipelines,
//! pipeline layouts, render bundles, query sets. These still need dense
//! index bookkeeping and at-most-once-release semantics, just not a
//! [`super::ResourceUses`] algebra.

use std::{marker::PhantomData, sync::Arc};

use crate::{hal_api::HalApi, track::metadata::ResourceMetadata, track::ResourceTracker};

use super::TrackerIndex;

/// Dense-index bookkeeping for a stateless resource class, holding the
/// `Arc` that keeps each resource alive while this tracker still cares
/// about it.
///
/// Unlike [`super::BufferTracker`]/[`super::TextureTracker`], which only
/// ever store usage bits, this tracker owns a strong reference — it is the
/// one device-global tracker for which "the tracker is this resource's last
/// owner" (the `ResourceTracker` trait) is a real
/// question rather than vacuously true.
#[derive(Debug)]
pub struct StatelessTracker<A: HalApi, T> {
    metadata: ResourceMetadata<Arc<T>>,
    _phantom: PhantomData<A>,
}

impl<A: HalApi, T> StatelessTracker<A, T> {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(),
            _phantom: PhantomData,
        }
    }

    /// Starts (or restarts) tracking `resource` under `index`.
    pub fn insert(&mut self, index: TrackerIndex, resource: Arc<T>) {
        self.metadata.insert(index.as_usize(), resource);
    }

    pub fn contains(&self, index: TrackerIndex) -> bool {
        self.metadata.is_owned(index.as_usize())
    }

    pub fn get(&self, index: TrackerIndex) -> Option<&Arc<T>> {
        self.metadata.get(index.as_usize())
    }

    pub fn remove(&mut self, index: TrackerIndex) -> Option<Arc<T>> {
        self.metadata.remove(index.as_usize())
    }

    pub fn size(&self) -> usize {
        self.metadata.count()
    }

    /// Drains every resource this tracker still holds, e.g. at device
    /// teardown.
    pub fn drain_resources(&mut self) -> impl Iterator<Item = Arc<T>> + '_ {
        self.metadata.drain_resources()
    }
}

impl<A: HalApi, T> Default for StatelessTracker<A, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: HalApi, T> ResourceTracker for StatelessTracker<A, T> {
    /// Removes `index` only if this tracker is its last owner: the resource
    /// has no id-table entry left and no in-flight command buffer captured
    /// it.
    fn remove_abandoned(&mut self, index: TrackerIndex) -> bool {
        let index_usize = index.as_usize();
        match self.metadata.get(index_usize) {
            Some(resource) if Arc::strong_count(resource) == 1 => {
                self.metadata.remove(index_usize);
                true
            }
            _ => false,
        }
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
    fn remove_abandoned_only_removes_sole_owner() {
        let mut tracker = StatelessTracker::<FakeApi, &'static str>::new();
        let resource = Arc::new("sampler-0");
        let kept_alive = Arc::clone(&resource);

        tracker.insert(idx(0), resource);
        assert!(!tracker.remove_abandoned(idx(0)));
        assert!(tracker.contains(idx(0)));

        drop(kept_alive);
        assert!(tracker.remove_abandoned(idx(0)));
        assert!(!tracker.contains(idx(0)));
    }

    #[test]
    fn remove_abandoned_on_untracked_index_is_false() {
        let mut tracker = StatelessTracker::<FakeApi, u32>::new();
        assert!(!tracker.remove_abandoned(idx(9)));
    }

    #[test]
    fn drain_resources_yields_every_live_entry() {
        let mut tracker = StatelessTracker::<FakeApi, u32>::new();
        tracker.insert(idx(0), Arc::new(10));
        tracker.insert(idx(2), Arc::new(30));
        let drained: Vec<_> = tracker.drain_resources().map(|a| *a).collect();
        assert_eq!(drained, vec![10, 30]);
        assert_eq!(tracker.size(), 0);
    }
}
