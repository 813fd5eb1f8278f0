//! Dense index allocation and the per-resource handle that binds a resource
//! to its allocator (`TrackingData`).

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::lock::Mutex;

/// A dense, small, unsigned integer identifying a resource within its
/// resource class (buffers, textures, texture views, ... each have their
/// own independent allocator and so their own independent index space).
///
/// `TrackerIndex::INVALID` is the sentinel meaning "no index" and is never
/// returned by [`TrackerIndexAllocator::alloc`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TrackerIndex(u32);

impl TrackerIndex {
    pub const INVALID: Self = Self(u32::MAX);

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Builds a `TrackerIndex` from a raw dense index, as handed back by
    /// [`crate::track::metadata::ResourceMetadata::owned_indices`]. Callers
    /// outside this crate should only ever see indices that came from
    /// [`TrackerIndexAllocator::alloc`]; this is not a generic `From<usize>`
    /// conversion.
    pub(crate) const fn from_usize(index: usize) -> Self {
        Self(index as u32)
    }

    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl std::fmt::Display for TrackerIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "<invalid>")
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// Freed indices available for immediate reuse, LIFO.
    unused: Vec<TrackerIndex>,
    /// One past the largest index ever handed out. Equivalently, the number
    /// of indices ever allocated (fresh or reused share this counter only
    /// going up on first mint).
    next_fresh: u32,
}

/// Allocates dense [`TrackerIndex`] values for one resource class.
///
/// Reuses the most recently freed index (LIFO, for cache locality) before
/// minting a fresh one. All operations are safe under concurrent callers;
/// a single mutex protects the free list and the high-water counter, and
/// `size() == next_fresh - unused.len()` holds at every lock release.
#[derive(Debug, Default)]
pub struct TrackerIndexAllocator {
    inner: Mutex<Inner>,
}

impl TrackerIndexAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an index not currently in the live set. Never returns
    /// [`TrackerIndex::INVALID`].
    pub fn alloc(&self) -> TrackerIndex {
        let mut inner = self.inner.lock();
        if let Some(index) = inner.unused.pop() {
            return index;
        }
        let index = inner.next_fresh;
        inner.next_fresh = index
            .checked_add(1)
            .expect("TrackerIndexAllocator exhausted the 32-bit index space");
        TrackerIndex(index)
    }

    /// Returns `index` to the free list, making it eligible for immediate
    /// reallocation. A no-op for [`TrackerIndex::INVALID`]. Double-freeing a
    /// live index is a logic error in the caller; callers prevent it via
    /// [`TrackingData`]'s atomic release flag, so this only asserts in debug
    /// builds rather than checking at runtime in release.
    pub fn free(&self, index: TrackerIndex) {
        if !index.is_valid() {
            return;
        }
        let mut inner = self.inner.lock();
        debug_assert!(
            !inner.unused.contains(&index),
            "double free of {index} in TrackerIndexAllocator"
        );
        inner.unused.push(index);
    }

    /// The number of indices currently live.
    pub fn size(&self) -> usize {
        let inner = self.inner.lock();
        inner.next_fresh as usize - inner.unused.len()
    }

    /// The largest index ever allocated, or `None` if nothing has been
    /// allocated yet.
    pub fn high_water_mark(&self) -> Option<u32> {
        let inner = self.inner.lock();
        inner.next_fresh.checked_sub(1)
    }

    /// Empties the free list and resets the high-water mark to zero,
    /// invalidating every outstanding index. Intended for device teardown
    /// only: any `TrackingData` still holding an index from before a reset
    /// will free into a free list that no longer agrees with the indices in
    /// use.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.unused.clear();
        inner.next_fresh = 0;
    }
}

/// A [`TrackerIndexAllocator`] shared between every resource of a class and
/// the device trackers that index by it.
///
/// The allocator must outlive every index it hands out; an `Arc` models
/// that without a back-reference from the allocator to its resources.
#[derive(Clone, Debug)]
pub struct SharedTrackerIndexAllocator(Arc<TrackerIndexAllocator>);

impl SharedTrackerIndexAllocator {
    pub fn new() -> Self {
        Self(Arc::new(TrackerIndexAllocator::new()))
    }

    pub fn alloc(&self) -> TrackerIndex {
        self.0.alloc()
    }

    pub fn free(&self, index: TrackerIndex) {
        self.0.free(index)
    }

    pub fn size(&self) -> usize {
        self.0.size()
    }

    pub fn high_water_mark(&self) -> Option<u32> {
        self.0.high_water_mark()
    }

    pub fn reset(&self) {
        self.0.reset()
    }
}

impl Default for SharedTrackerIndexAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// The handle a resource carries to bind it to its allocator.
///
/// Created at resource construction, released exactly once — a second
/// [`TrackingData::release`] is a documented no-op, guaranteed by the atomic
/// compare-and-swap on `released` rather than by caller discipline.
#[derive(Debug)]
pub struct TrackingData {
    index: TrackerIndex,
    allocator: SharedTrackerIndexAllocator,
    released: AtomicBool,
}

impl TrackingData {
    pub fn new(allocator: SharedTrackerIndexAllocator) -> Self {
        let index = allocator.alloc();
        Self {
            index,
            allocator,
            released: AtomicBool::new(false),
        }
    }

    pub fn index(&self) -> TrackerIndex {
        self.index
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Releases this handle's index back to its allocator. Idempotent: only
    /// the caller that wins the compare-and-swap from `false` to `true`
    /// actually frees the index, so concurrent calls (e.g. from multiple
    /// drop paths racing on the same resource) result in exactly one `free`.
    pub fn release(&self) {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.allocator.free(self.index);
        }
    }
}

impl Drop for TrackingData {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_allocate_free_realloc_lifo() {
        let alloc = TrackerIndexAllocator::new();
        assert_eq!(alloc.alloc().as_usize(), 0);
        assert_eq!(alloc.alloc().as_usize(), 1);
        assert_eq!(alloc.alloc().as_usize(), 2);
        alloc.free(TrackerIndex(1));
        assert_eq!(alloc.alloc().as_usize(), 1);
        assert_eq!(alloc.alloc().as_usize(), 3);
        assert_eq!(alloc.size(), 4);
        assert_eq!(alloc.high_water_mark(), Some(3));
    }

    #[test]
    fn free_of_invalid_is_noop() {
        let alloc = TrackerIndexAllocator::new();
        alloc.free(TrackerIndex::INVALID);
        assert_eq!(alloc.size(), 0);
        assert_eq!(alloc.high_water_mark(), None);
    }

    #[test]
    fn reset_invalidates_everything() {
        let alloc = TrackerIndexAllocator::new();
        alloc.alloc();
        alloc.alloc();
        alloc.reset();
        assert_eq!(alloc.size(), 0);
        assert_eq!(alloc.alloc().as_usize(), 0);
    }

    #[test]
    fn round_trip_alloc_free_alloc_returns_same_index_when_free_list_was_empty() {
        let alloc = TrackerIndexAllocator::new();
        let x = alloc.alloc();
        alloc.free(x);
        assert_eq!(alloc.alloc(), x);
    }

    #[test]
    fn tracking_data_double_release_is_single_free() {
        let allocator = SharedTrackerIndexAllocator::new();
        let data = TrackingData::new(allocator.clone());
        let index = data.index();
        assert_eq!(allocator.size(), 1);
        data.release();
        data.release();
        assert_eq!(allocator.size(), 0);
        assert_eq!(allocator.alloc(), index);
    }

    #[test]
    fn concurrent_release_frees_exactly_once() {
        use std::sync::Arc as StdArc;
        let allocator = SharedTrackerIndexAllocator::new();
        let data = StdArc::new(TrackingData::new(allocator.clone()));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let data = StdArc::clone(&data);
                scope.spawn(move || data.release());
            }
        });

        // Exactly one free reached the allocator: size must be 0, and the
        // index must be immediately reusable (it's not still "half freed").
        assert_eq!(allocator.size(), 0);
    }

    #[test]
    fn uniqueness_under_concurrent_alloc() {
        let allocator = TrackerIndexAllocator::new();
        let results: Vec<TrackerIndex> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| (0..64).map(|_| allocator.alloc()).collect::<Vec<_>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });
        let mut seen = std::collections::HashSet::new();
        for index in results {
            assert!(seen.insert(index), "index {index} allocated twice");
        }
        assert_eq!(seen.len(), 8 * 64);
    }
}
