//! The Texture Tracker and its matching Usage Scope.
//!
//! A texture's state is not a single usage but a set of `(mip_range,
//! layer_range, usage)` tiles that exactly partition its
//! `mip_count × layer_count` rectangle — different subresources of the same
//! texture may sit in different states simultaneously. This module keeps
//! that partition as a flat `Vec<Tile>` rather than a balanced tree: real
//! textures rarely fragment past a handful of tiles, so a linear scan with
//! an O(n²) coalescing pass is simpler to get right without a compiler to
//! check it against, at the cost of pathological behavior under adversarial
//! subresource access patterns. See `DESIGN.md`.

use std::{marker::PhantomData, ops::Range};

pub use hal::TextureSelector;
use hal::TextureUses;
use smallvec::SmallVec;

use crate::{
    hal_api::HalApi,
    track::{
        metadata::ResourceMetadata, PendingTransition, ResourceTracker, ResourceUses,
        StateTransition, TrackerIndex,
    },
};

use super::UsageConflict;

/// One `(mip_range, layer_range)` rectangle of a texture's subresources, all
/// sharing one usage.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Tile {
    mips: Range<u32>,
    layers: Range<u32>,
    usage: TextureUses,
}

/// `true` iff a transition away from `from` needs a barrier.
///
/// Overrides the generic buffer/texture rule for one case: leaving
/// `UNINITIALIZED` is always an implicit discard, never a barrier, even
/// though `UNINITIALIZED` reads as "read-only" under the bitmask rule and so
/// a write destination would otherwise look like it needs one. A texture's
/// first use of a subresource never needs a load, only a discard.
fn texture_needs_barrier(from: TextureUses, to: TextureUses) -> bool {
    if from == TextureUses::UNINITIALIZED {
        return false;
    }
    super::needs_barrier(from, to)
}

/// Splits `r` against `s`, returning its pieces in ascending order tagged
/// with whether each piece lies inside `s`. Yields 1 to 3 pieces; a `false`
/// piece is returned unmodified by the caller, a `true` piece is the one
/// subject to the newly requested usage.
fn split_range(r: &Range<u32>, s: &Range<u32>) -> Vec<(Range<u32>, bool)> {
    let lo = s.start.max(r.start);
    let hi = s.end.min(r.end);
    if lo >= hi {
        return vec![(r.clone(), false)];
    }
    let mut out = Vec::with_capacity(3);
    if r.start < lo {
        out.push((r.start..lo, false));
    }
    out.push((lo..hi, true));
    if hi < r.end {
        out.push((hi..r.end, false));
    }
    out
}

/// The full subresource state of one texture: a partition of its
/// `mip_count × layer_count` rectangle into usage-tagged tiles.
#[derive(Clone, Debug)]
struct TextureState {
    mip_count: u32,
    layer_count: u32,
    tiles: Vec<Tile>,
}

impl TextureState {
    fn new(mip_count: u32, layer_count: u32, usage: TextureUses) -> Self {
        Self {
            mip_count,
            layer_count,
            tiles: vec![Tile {
                mips: 0..mip_count,
                layers: 0..layer_count,
                usage,
            }],
        }
    }

    fn full_selector(&self) -> TextureSelector {
        TextureSelector {
            mips: 0..self.mip_count,
            layers: 0..self.layer_count,
        }
    }

    /// Applies `requested` over `selector`:
    /// intersects `selector` against every existing tile, 3×3-splits the
    /// intersecting tiles, and passes each covered piece's prior usage to
    /// `combine` to compute its new usage. Returns `(from, to)` for every
    /// piece whose usage actually changed, in ascending `(mips, layers)`
    /// order. Leaves `self` unmodified if `combine` errors on any piece.
    fn apply(
        &mut self,
        selector: &TextureSelector,
        requested: TextureUses,
        mut combine: impl FnMut(TextureUses, TextureUses) -> Result<TextureUses, ()>,
    ) -> Result<Vec<(Range<u32>, Range<u32>, TextureUses, TextureUses)>, ()> {
        let mut new_tiles = Vec::with_capacity(self.tiles.len() + 8);
        let mut changes = Vec::new();

        for tile in &self.tiles {
            let mip_pieces = split_range(&tile.mips, &selector.mips);
            let layer_pieces = split_range(&tile.layers, &selector.layers);

            for (mips, mip_inside) in &mip_pieces {
                for (layers, layer_inside) in &layer_pieces {
                    if mips.is_empty() || layers.is_empty() {
                        continue;
                    }
                    if *mip_inside && *layer_inside {
                        let new_usage = combine(tile.usage, requested)?;
                        if new_usage != tile.usage {
                            changes.push((mips.clone(), layers.clone(), tile.usage, new_usage));
                        }
                        new_tiles.push(Tile {
                            mips: mips.clone(),
                            layers: layers.clone(),
                            usage: new_usage,
                        });
                    } else {
                        new_tiles.push(Tile {
                            mips: mips.clone(),
                            layers: layers.clone(),
                            usage: tile.usage,
                        });
                    }
                }
            }
        }

        self.tiles = new_tiles;
        self.coalesce();
        Ok(changes)
    }

    /// Merges adjacent tiles sharing a usage, so repeated partial writes to
    /// the same region don't leave the tile list growing without bound.
    fn coalesce(&mut self) {
        loop {
            let mut merged = false;
            'search: for i in 0..self.tiles.len() {
                for j in (i + 1)..self.tiles.len() {
                    let (a, b) = (&self.tiles[i], &self.tiles[j]);
                    if a.usage != b.usage {
                        continue;
                    }
                    let merged_tile = if a.layers == b.layers && adjacent(&a.mips, &b.mips) {
                        Some(Tile {
                            mips: union(&a.mips, &b.mips),
                            layers: a.layers.clone(),
                            usage: a.usage,
                        })
                    } else if a.mips == b.mips && adjacent(&a.layers, &b.layers) {
                        Some(Tile {
                            mips: a.mips.clone(),
                            layers: union(&a.layers, &b.layers),
                            usage: a.usage,
                        })
                    } else {
                        None
                    };
                    if let Some(tile) = merged_tile {
                        let (lo, hi) = (i.min(j), i.max(j));
                        self.tiles.remove(hi);
                        self.tiles.remove(lo);
                        self.tiles.push(tile);
                        merged = true;
                        break 'search;
                    }
                }
            }
            if !merged {
                break;
            }
        }
        self.sort();
    }

    fn sort(&mut self) {
        self.tiles
            .sort_by_key(|t| (t.mips.start, t.layers.start));
    }

    /// Checks the tiling invariants: the tiles exactly cover the rectangle,
    /// none overlap, and no two adjacent tiles (in iteration order) share a
    /// usage. Runs under `debug_assertions` or the `strict_asserts` feature
    /// (see [`crate::strict_assert`]); a no-op plain release build skips it.
    fn assert_valid(&self) {
        let mut area = 0u64;
        for (i, a) in self.tiles.iter().enumerate() {
            crate::strict_assert!(!a.mips.is_empty() && !a.layers.is_empty());
            crate::strict_assert!(a.mips.end <= self.mip_count && a.layers.end <= self.layer_count);
            area += (a.mips.end - a.mips.start) as u64 * (a.layers.end - a.layers.start) as u64;
            for b in self.tiles.iter().skip(i + 1) {
                let mips_overlap = a.mips.start < b.mips.end && b.mips.start < a.mips.end;
                let layers_overlap = a.layers.start < b.layers.end && b.layers.start < a.layers.end;
                crate::strict_assert!(
                    !(mips_overlap && layers_overlap),
                    "overlapping texture tiles {a:?} and {b:?}"
                );
            }
        }
        crate::strict_assert_eq!(area, self.mip_count as u64 * self.layer_count as u64);
    }
}

fn adjacent(a: &Range<u32>, b: &Range<u32>) -> bool {
    a.end == b.start || b.end == a.start
}

fn union(a: &Range<u32>, b: &Range<u32>) -> Range<u32> {
    a.start.min(b.start)..a.end.max(b.end)
}

/// The per-command-buffer-local accumulation of requested texture usage,
/// per subresource.
#[derive(Debug)]
pub struct TextureUsageScope<A: HalApi> {
    metadata: ResourceMetadata<TextureState>,
    _phantom: PhantomData<A>,
}

impl<A: HalApi> TextureUsageScope<A> {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(),
            _phantom: PhantomData,
        }
    }

    /// Records a request for `usage` over `selector` of texture `index`
    /// within this scope. `mip_count`/`layer_count` describe the texture's
    /// full extent and are only consulted the first time `index` appears in
    /// this scope.
    pub fn set_single(
        &mut self,
        index: TrackerIndex,
        mip_count: u32,
        layer_count: u32,
        selector: TextureSelector,
        requested: TextureUses,
    ) -> Result<(), UsageConflict<TextureUses>> {
        let index_usize = index.as_usize();
        self.metadata.set_size(index_usize + 1);

        if self.metadata.get(index_usize).is_none() {
            self.metadata.insert(
                index_usize,
                TextureState::new(mip_count, layer_count, TextureUses::empty()),
            );
        }

        let state = self.metadata.get(index_usize).expect("just inserted");
        let mut conflict = None;
        let mut state = state.clone();
        let result = state.apply(&selector, requested, |existing, requested| {
            if existing.is_compatible(requested) {
                Ok(existing | requested)
            } else {
                conflict = Some((existing, requested));
                Err(())
            }
        });

        match result {
            Ok(_) => {
                self.metadata.insert(index_usize, state);
                Ok(())
            }
            Err(()) => {
                let (existing, requested) = conflict.expect("apply only errors via combine");
                Err(UsageConflict {
                    index,
                    existing,
                    requested,
                })
            }
        }
    }

    pub fn is_used(&self, index: TrackerIndex) -> bool {
        self.metadata.is_owned(index.as_usize())
    }

    pub fn clear(&mut self) {
        self.metadata.clear();
    }

    pub(crate) fn owned_indices(&self) -> impl Iterator<Item = TrackerIndex> + '_ {
        self.metadata
            .owned_indices()
            .map(TrackerIndex::from_usize)
    }
}

impl<A: HalApi> Default for TextureUsageScope<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// The device-global authoritative end-of-queue subresource state for every
/// live texture.
#[derive(Debug)]
pub struct TextureTracker<A: HalApi> {
    metadata: ResourceMetadata<TextureState>,
    _phantom: PhantomData<A>,
}

impl<A: HalApi> TextureTracker<A> {
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetadata::new(),
            _phantom: PhantomData,
        }
    }

    /// Begins tracking `index`: every subresource starts `UNINITIALIZED`.
    pub fn insert(&mut self, index: TrackerIndex, mip_count: u32, layer_count: u32) {
        let index_usize = index.as_usize();
        self.metadata.set_size(index_usize + 1);
        debug_assert!(
            !self.metadata.is_owned(index_usize),
            "TextureTracker::insert called on an already-tracked index {index}"
        );
        self.metadata.insert(
            index_usize,
            TextureState::new(mip_count, layer_count, TextureUses::UNINITIALIZED),
        );
    }

    pub fn remove(&mut self, index: TrackerIndex) {
        self.metadata.remove(index.as_usize());
    }

    pub fn is_tracked(&self, index: TrackerIndex) -> bool {
        self.metadata.is_owned(index.as_usize())
    }

    pub fn size(&self) -> usize {
        self.metadata.count()
    }

    /// Applies every tile the scope recorded for each index onto this
    /// tracker's authoritative state, emitting a [`PendingTransition`] per
    /// subresource piece whose usage actually changed. A texture untracked
    /// before this call adopts the scope's tiles outright, with no
    /// transitions — the same "first use" rule as
    /// [`super::BufferTracker::merge`].
    #[must_use]
    pub fn merge(
        &mut self,
        scope: &TextureUsageScope<A>,
    ) -> SmallVec<[PendingTransition<TextureUses>; 4]> {
        profiling::scope!("TextureTracker::merge");
        let mut transitions = SmallVec::new();

        for index in scope.owned_indices() {
            let index_usize = index.as_usize();
            let scope_state = scope
                .metadata
                .get(index_usize)
                .expect("owned_indices only yields present indices");

            if !self.metadata.is_owned(index_usize) {
                log::trace!("texture {index} first use in this tracker");
                self.metadata.insert(index_usize, scope_state.clone());
                continue;
            }

            let mut device_state = self
                .metadata
                .get(index_usize)
                .expect("is_owned implies present")
                .clone();

            for tile in &scope_state.tiles {
                // The scope's tiling covers the whole texture; untouched
                // subresources sit at `empty()` (see `set_single`) and must
                // not overwrite the device's authoritative state for them.
                if tile.usage.is_empty_set() {
                    continue;
                }
                let selector = TextureSelector {
                    mips: tile.mips.clone(),
                    layers: tile.layers.clone(),
                };
                let changes = device_state
                    .apply(&selector, tile.usage, |_existing, requested| Ok(requested))
                    .expect("overwrite combine is infallible");

                for (mips, layers, from, to) in changes {
                    let needs_barrier = texture_needs_barrier(from, to);
                    if needs_barrier {
                        log::trace!(
                            "texture {index} subresource {mips:?}/{layers:?} transition {from:?} -> {to:?}"
                        );
                    }
                    transitions.push(PendingTransition {
                        index,
                        selector: Some(TextureSelector { mips, layers }),
                        usage: StateTransition { from, to },
                    });
                }
            }

            device_state.assert_valid();

            self.metadata.insert(index_usize, device_state);
        }

        transitions
    }
}

impl<A: HalApi> Default for TextureTracker<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: HalApi> ResourceTracker for TextureTracker<A> {
    fn remove_abandoned(&mut self, index: TrackerIndex) -> bool {
        self.metadata.remove(index.as_usize()).is_some()
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

    fn whole(mips: u32, layers: u32) -> TextureSelector {
        TextureSelector {
            mips: 0..mips,
            layers: 0..layers,
        }
    }

    #[test]
    fn fresh_texture_first_use_emits_no_transition() {
        let mut tracker = TextureTracker::<FakeApi>::new();
        let mut scope = TextureUsageScope::<FakeApi>::new();
        scope
            .set_single(idx(0), 1, 1, whole(1, 1), TextureUses::COLOR_TARGET)
            .unwrap();

        let transitions = tracker.merge(&scope);
        assert!(transitions.is_empty());
        assert!(tracker.is_tracked(idx(0)));
    }

    #[test]
    fn subresource_write_after_whole_texture_use_barriers_only_that_tile() {
        let mut tracker = TextureTracker::<FakeApi>::new();
        tracker.insert(idx(0), 4, 1);

        // First, the whole texture is sampled.
        let mut scope1 = TextureUsageScope::<FakeApi>::new();
        scope1
            .set_single(idx(0), 4, 1, whole(4, 1), TextureUses::SAMPLED_READ)
            .unwrap();
        let transitions = tracker.merge(&scope1);
        // UNINITIALIZED -> SAMPLED_READ is an implicit discard: no barrier,
        // but the transition is still real (usage changed).
        assert_eq!(transitions.len(), 1);
        assert!(!transitions[0].needs_barrier());

        // Then mip 2 alone is written.
        let mut scope2 = TextureUsageScope::<FakeApi>::new();
        let selector = TextureSelector {
            mips: 2..3,
            layers: 0..1,
        };
        scope2
            .set_single(idx(0), 4, 1, selector, TextureUses::COPY_DST)
            .unwrap();
        let transitions = tracker.merge(&scope2);
        assert_eq!(transitions.len(), 1);
        assert!(transitions[0].needs_barrier());
        let sel = transitions[0].selector.as_ref().unwrap();
        assert_eq!(sel.mips, 2..3);
    }

    #[test]
    fn scope_detects_conflicting_subresource_usage() {
        let mut scope = TextureUsageScope::<FakeApi>::new();
        scope
            .set_single(idx(0), 1, 1, whole(1, 1), TextureUses::COPY_SRC)
            .unwrap();
        let err = scope
            .set_single(idx(0), 1, 1, whole(1, 1), TextureUses::COPY_DST)
            .unwrap_err();
        assert_eq!(err.existing, TextureUses::COPY_SRC);
        assert_eq!(err.requested, TextureUses::COPY_DST);
    }

    #[test]
    fn scope_allows_disjoint_subresources_to_differ() {
        let mut scope = TextureUsageScope::<FakeApi>::new();
        scope
            .set_single(
                idx(0),
                2,
                1,
                TextureSelector {
                    mips: 0..1,
                    layers: 0..1,
                },
                TextureUses::COPY_SRC,
            )
            .unwrap();
        scope
            .set_single(
                idx(0),
                2,
                1,
                TextureSelector {
                    mips: 1..2,
                    layers: 0..1,
                },
                TextureUses::COPY_DST,
            )
            .unwrap();
        assert!(scope.is_used(idx(0)));
    }

    #[test]
    fn coalesces_back_to_one_tile_after_uniform_write() {
        let mut tracker = TextureTracker::<FakeApi>::new();
        tracker.insert(idx(0), 2, 1);

        let mut scope = TextureUsageScope::<FakeApi>::new();
        scope
            .set_single(
                idx(0),
                2,
                1,
                TextureSelector {
                    mips: 0..1,
                    layers: 0..1,
                },
                TextureUses::COPY_DST,
            )
            .unwrap();
        scope
            .set_single(
                idx(0),
                2,
                1,
                TextureSelector {
                    mips: 1..2,
                    layers: 0..1,
                },
                TextureUses::COPY_DST,
            )
            .unwrap();
        tracker.merge(&scope);

        let state = tracker.metadata.get(0).unwrap();
        assert_eq!(state.tiles.len(), 1);
        assert_eq!(state.tiles[0].mips, 0..2);
    }

    #[test]
    fn remove_abandoned_stops_tracking() {
        let mut tracker = TextureTracker::<FakeApi>::new();
        tracker.insert(idx(0), 1, 1);
        assert!(ResourceTracker::remove_abandoned(&mut tracker, idx(0)));
        assert!(!tracker.is_tracked(idx(0)));
        assert!(!ResourceTracker::remove_abandoned(&mut tracker, idx(0)));
    }
}
