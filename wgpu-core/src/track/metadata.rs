//! Resource Metadata: a dense `owned[idx] -> bool`
//! vector with a cached population count, so iterating "indices touched"
//! costs proportional to how many were touched rather than to the
//! allocator's high-water mark.
//!
//! Trackers that need nothing beyond liveness use `ResourceMetadata<()>`.
//! [`crate::track::stateless::StatelessTracker`] instantiates it with
//! `Arc<T>` instead, reusing the same owned-bitset/count machinery to also
//! hold the strong reference that keeps a resource alive while the tracker
//! still cares about it.

use bit_vec::BitVec;

#[derive(Debug)]
pub(crate) struct ResourceMetadata<T> {
    owned: BitVec,
    resources: Vec<Option<T>>,
    count: usize,
}

impl<T> ResourceMetadata<T> {
    pub fn new() -> Self {
        Self {
            owned: BitVec::new(),
            resources: Vec::new(),
            count: 0,
        }
    }

    /// Grows the underlying storage to cover `size` indices, if it doesn't
    /// already. Never shrinks.
    pub fn set_size(&mut self, size: usize) {
        if size <= self.resources.len() {
            return;
        }
        self.resources.resize_with(size, || None);
        self.owned.grow(size - self.owned.len(), false);
    }

    fn ensure_len(&mut self, index: usize) {
        if index >= self.resources.len() {
            self.set_size(index + 1);
        }
    }

    /// Marks `index` as owned or not, growing storage to cover it if
    /// needed. The cached count only changes on an actual true/false
    /// transition. Clears any stored payload when un-marking.
    pub fn set_owned(&mut self, index: usize, owned: bool) {
        self.ensure_len(index);
        let was_owned = self.owned.get(index).unwrap();
        if was_owned != owned {
            self.count = if owned { self.count + 1 } else { self.count - 1 };
        }
        self.owned.set(index, owned);
        if !owned {
            self.resources[index] = None;
        }
    }

    /// Marks `index` owned and stores `value` as its payload.
    pub fn insert(&mut self, index: usize, value: T) {
        self.ensure_len(index);
        if !self.owned.get(index).unwrap() {
            self.count += 1;
        }
        self.owned.set(index, true);
        self.resources[index] = Some(value);
    }

    /// Un-marks `index` and returns its payload, if any.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index >= self.owned.len() {
            return None;
        }
        if self.owned.get(index).unwrap() {
            self.count -= 1;
            self.owned.set(index, false);
        }
        self.resources[index].take()
    }

    /// `false` for indices past the current length, rather than panicking.
    pub fn is_owned(&self, index: usize) -> bool {
        index < self.owned.len() && self.owned.get(index).unwrap()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.resources.get(index).and_then(|slot| slot.as_ref())
    }

    /// O(1) cached population size.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Zeros every entry and resets the count; retains the underlying
    /// storage's capacity.
    pub fn clear(&mut self) {
        for slot in self.resources.iter_mut() {
            *slot = None;
        }
        self.owned = BitVec::from_elem(self.resources.len(), false);
        self.count = 0;
    }

    /// Iterates the indices currently marked owned, in ascending order.
    /// Cost is proportional to storage length, not to `count()`; trackers
    /// that need sub-linear iteration over "touched" indices keep a
    /// separate side list (see [`super::buffer::BufferUsageScope`]).
    pub fn owned_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.owned.iter().enumerate().filter_map(|(i, owned)| owned.then_some(i))
    }

    /// Drains every owned payload, leaving the metadata empty (but with
    /// capacity retained).
    pub fn drain_resources(&mut self) -> impl Iterator<Item = T> + '_ {
        self.count = 0;
        self.owned = BitVec::new();
        self.resources.drain(..).flatten()
    }
}

impl<T> Default for ResourceMetadata<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_tracks_actual_transitions_only() {
        let mut meta = ResourceMetadata::<()>::new();
        meta.set_owned(5, true);
        assert_eq!(meta.count(), 1);
        // Setting the same index owned again must not double-count.
        meta.set_owned(5, true);
        assert_eq!(meta.count(), 1);
        meta.set_owned(5, false);
        assert_eq!(meta.count(), 0);
        meta.set_owned(5, false);
        assert_eq!(meta.count(), 0);
    }

    #[test]
    fn is_owned_false_past_length() {
        let meta = ResourceMetadata::<()>::new();
        assert!(!meta.is_owned(100));
    }

    #[test]
    fn insert_and_remove_round_trip_payload() {
        let mut meta = ResourceMetadata::<&'static str>::new();
        meta.insert(3, "buffer-3");
        assert!(meta.is_owned(3));
        assert_eq!(meta.get(3), Some(&"buffer-3"));
        assert_eq!(meta.remove(3), Some("buffer-3"));
        assert!(!meta.is_owned(3));
        assert_eq!(meta.remove(3), None);
    }

    #[test]
    fn clear_resets_count_but_keeps_capacity() {
        let mut meta = ResourceMetadata::<u32>::new();
        meta.insert(0, 10);
        meta.insert(1, 20);
        meta.clear();
        assert_eq!(meta.count(), 0);
        assert!(!meta.is_owned(0));
        // Re-inserting at a previously-used index still works after clear.
        meta.insert(0, 30);
        assert_eq!(meta.get(0), Some(&30));
    }

    #[test]
    fn owned_indices_iterates_only_set_bits() {
        let mut meta = ResourceMetadata::<()>::new();
        meta.set_owned(1, true);
        meta.set_owned(4, true);
        let indices: Vec<_> = meta.owned_indices().collect();
        assert_eq!(indices, vec![1, 4]);
    }

    #[test]
    fn drain_resources_empties_and_yields_everything_owned() {
        let mut meta = ResourceMetadata::<u32>::new();
        meta.insert(0, 1);
        meta.insert(2, 3);
        let drained: Vec<_> = meta.drain_resources().collect();
        assert_eq!(drained, vec![1, 3]);
        assert_eq!(meta.count(), 0);
        assert!(!meta.is_owned(0));
    }
}
