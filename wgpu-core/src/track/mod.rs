/*! Per-resource usage trackers, usage scopes, and the merge protocol that
 *  connects them: the engine that decides which memory barriers, layout
 *  transitions, and state changes a backend must issue to keep execution
 *  correct, given the commands a user recorded.
 *
 *  Three pieces, bottom-up:
 *
 *  - [`index`] — dense [`TrackerIndex`] allocation, so sparse,
 *    epoch-tagged resource identifiers become small integers suitable for
 *    O(1) array-indexed state.
 *  - [`buffer`] / [`texture`] — the device-global trackers holding the
 *    authoritative end-of-queue usage state for every live resource of a
 *    class, and the matching per-command-buffer scopes that accumulate
 *    requested usage during recording.
 *  - [`stateless`] — the same dense-index bookkeeping for resource classes
 *    that never need state transitions (samplers, bind groups, pipelines,
 *    ...), reused so iteration stays proportional to what a scope actually
 *    touched.
 *
 *  [`merge`](BufferTracker::merge) ties the two halves together at submit
 *  time: it reconciles a command buffer's [`BufferUsageScope`] /
 *  [`TextureUsageScope`] against the device's tracker, producing the
 *  [`PendingTransition`]s a backend lowers into barriers.
 */

pub(crate) mod buffer;
mod index;
pub(crate) mod metadata;
pub(crate) mod stateless;
pub(crate) mod texture;

pub use buffer::{BufferTracker, BufferUsageScope};
pub use index::{SharedTrackerIndexAllocator, TrackerIndex, TrackerIndexAllocator, TrackingData};
pub use stateless::StatelessTracker;
pub use texture::{TextureSelector, TextureTracker, TextureUsageScope};

use std::ops::{BitAnd, BitOr};

use smallvec::SmallVec;
use thiserror::Error;

use crate::hal_api;

/// Two incompatible usages were requested for the same resource within a
/// single command buffer.
///
/// Raised only by a scope's `set_usage`; the caller must discard the scope
/// (or the sub-portion of it recorded so far) and re-record — no partial
/// mutation of the scope occurs when this is returned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("Usage of index {index} conflicts between {existing:?} (already recorded) and {requested:?} (newly requested)")]
pub struct UsageConflict<U: std::fmt::Debug> {
    pub index: TrackerIndex,
    pub existing: U,
    pub requested: U,
}

/// Attempted use of a [`TrackerIndex`] whose tracking data has already been
/// released, or of the invalid sentinel index, at a boundary that chooses
/// to check rather than trust the caller.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("Resource index {0} is invalid or has already been released")]
pub struct InvalidIndex(pub TrackerIndex);

/// The compatibility and merge rules shared by [`hal::BufferUses`] and
/// [`hal::TextureUses`].
///
/// Implemented for both bitflag types so [`BufferUsageScope`] and
/// [`TextureUsageScope`] can share one definition of "compatible" and
/// "needs a barrier" instead of duplicating the rule per resource class.
pub trait ResourceUses:
    Copy + Eq + std::fmt::Debug + BitOr<Output = Self> + BitAnd<Output = Self>
{
    /// The subset of states in which the resource may be written to.
    const WRITABLE: Self;
    /// The empty usage set.
    const EMPTY: Self;

    fn is_empty_set(self) -> bool {
        self == Self::EMPTY
    }

    /// `true` iff no bit of `self` is outside the writable subset,
    /// including the empty usage.
    fn is_read_only(self) -> bool {
        (self & Self::WRITABLE) == Self::EMPTY
    }

    /// `true` iff `other` is a subset of `self`.
    fn contains_usage(self, other: Self) -> bool {
        (self & other) == other
    }

    /// Two usages may be held simultaneously (and thus merged with a
    /// bitwise OR) iff either is empty, both are read-only, or they are
    /// exactly equal.
    fn is_compatible(self, other: Self) -> bool {
        self.is_empty_set()
            || other.is_empty_set()
            || (self.is_read_only() && other.is_read_only())
            || self == other
    }
}

impl ResourceUses for hal::BufferUses {
    const WRITABLE: Self = Self::WRITABLE;
    const EMPTY: Self = Self::empty();
}

impl ResourceUses for hal::TextureUses {
    const WRITABLE: Self = Self::WRITABLE;
    const EMPTY: Self = Self::empty();
}

/// `true` iff a transition from `from` to `to` needs a barrier: the states
/// differ and it is not the case that both are read-only.
pub fn needs_barrier<U: ResourceUses>(from: U, to: U) -> bool {
    from != to && !(from.is_read_only() && to.is_read_only())
}

/// A `{from, to}` usage change (`StateTransition`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateTransition<U> {
    pub from: U,
    pub to: U,
}

impl<U: ResourceUses> StateTransition<U> {
    pub fn needs_barrier(&self) -> bool {
        needs_barrier(self.from, self.to)
    }
}

/// An entry in a tracker's `merge` output: a resource (and, for textures, a
/// subresource range) whose usage changed across a submission boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransition<U> {
    pub index: TrackerIndex,
    pub selector: Option<TextureSelector>,
    pub usage: StateTransition<U>,
}

impl<U: ResourceUses> PendingTransition<U> {
    pub fn needs_barrier(&self) -> bool {
        self.usage.needs_barrier()
    }
}

/// Shared surface implemented by every device-global tracker: removing a
/// resource whose user handle has died.
///
/// [`BufferTracker`]/[`TextureTracker`] only ever hold usage state, not a
/// strong reference to the resource, so "abandoned" for them just means
/// "still tracked"; [`StatelessTracker`] holds the `Arc` that keeps the
/// resource alive, so for it "abandoned" means the tracker is the last
/// owner.
pub(crate) trait ResourceTracker {
    /// Removes `index` from this tracker if the tracker is the resource's
    /// last owner. Returns whether the index was removed.
    fn remove_abandoned(&mut self, index: TrackerIndex) -> bool;
}

impl PendingTransition<hal::BufferUses> {
    /// Lowers this transition into the backend's buffer barrier descriptor.
    ///
    /// The mapping is total: a transition whose `from == to` (or whose halves
    /// are both read-only) still produces a `BufferBarrier`, just one
    /// [`needs_barrier`](Self::needs_barrier) reports `false` for — the
    /// backend is expected to skip emitting anything for it rather than have
    /// the tracker filter such transitions out of `merge`'s output twice.
    pub fn into_hal<A: hal_api::HalApi>(self, buffer: &A::Buffer) -> hal::BufferBarrier<'_, A> {
        hal::BufferBarrier {
            buffer,
            usage: self.usage.from..self.usage.to,
        }
    }
}

impl PendingTransition<hal::TextureUses> {
    /// Lowers this transition into the backend's texture barrier descriptor.
    /// Every texture [`PendingTransition`] carries a `selector` (see
    /// [`TextureTracker::merge`]), so this never needs to fall back to the
    /// texture's full extent.
    pub fn into_hal<A: hal_api::HalApi>(self, texture: &A::Texture) -> hal::TextureBarrier<'_, A> {
        hal::TextureBarrier {
            texture,
            range: self
                .selector
                .expect("texture PendingTransition always carries a selector"),
            usage: self.usage.from..self.usage.to,
        }
    }
}

/// The per-command-buffer-local usage accumulation for every stateful
/// resource class, bundled: the concrete type `set_usage`'s caller (a
/// command/pass encoder) actually owns. Stateless resource classes
/// (samplers, bind groups, pipelines, ...) don't accumulate usage at all —
/// an encoder just needs to keep them alive, which it does by holding an
/// `Arc` directly rather than recording anything into a scope.
#[derive(Debug)]
pub struct UsageScope<A: hal_api::HalApi> {
    pub buffers: BufferUsageScope<A>,
    pub textures: TextureUsageScope<A>,
}

impl<A: hal_api::HalApi> UsageScope<A> {
    pub fn new() -> Self {
        Self {
            buffers: BufferUsageScope::new(),
            textures: TextureUsageScope::new(),
        }
    }

    /// Returns every resource class to empty, retaining storage capacity.
    pub fn clear(&mut self) {
        self.buffers.clear();
        self.textures.clear();
    }
}

impl<A: hal_api::HalApi> Default for UsageScope<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// The device-global authoritative state for every live resource of every
/// class, the thing `queue.submit` merges each [`UsageScope`] into.
///
/// Stateful classes (`buffers`, `textures`) hold usage state and produce
/// [`PendingTransition`]s; stateless classes hold an `Arc` purely for
/// lifetime bookkeeping (`device::life`'s suspected-resource triage reads
/// them to find what a dropped resource was the last owner of).
#[derive(Debug)]
pub struct Tracker<A: hal_api::HalApi> {
    pub buffers: BufferTracker<A>,
    pub textures: TextureTracker<A>,
    pub views: StatelessTracker<A, crate::resource::TextureView<A>>,
    pub samplers: StatelessTracker<A, crate::resource::Sampler<A>>,
    pub bind_groups: StatelessTracker<A, crate::binding_model::BindGroup<A>>,
    pub bind_group_layouts: StatelessTracker<A, crate::binding_model::BindGroupLayout<A>>,
    pub render_pipelines: StatelessTracker<A, crate::pipeline::RenderPipeline<A>>,
    pub compute_pipelines: StatelessTracker<A, crate::pipeline::ComputePipeline<A>>,
    pub pipeline_layouts: StatelessTracker<A, crate::pipeline::PipelineLayout<A>>,
    pub bundles: StatelessTracker<A, crate::command::RenderBundle<A>>,
    pub query_sets: StatelessTracker<A, crate::resource::QuerySet<A>>,
}

impl<A: hal_api::HalApi> Tracker<A> {
    pub fn new() -> Self {
        Self {
            buffers: BufferTracker::new(),
            textures: TextureTracker::new(),
            views: StatelessTracker::new(),
            samplers: StatelessTracker::new(),
            bind_groups: StatelessTracker::new(),
            bind_group_layouts: StatelessTracker::new(),
            render_pipelines: StatelessTracker::new(),
            compute_pipelines: StatelessTracker::new(),
            pipeline_layouts: StatelessTracker::new(),
            bundles: StatelessTracker::new(),
            query_sets: StatelessTracker::new(),
        }
    }

    /// Reconciles a scope's buffer and texture usage against this tracker,
    /// the two halves of the merge protocol spec.md §4.6 describes as one
    /// operation over "every resource the scope owns". Stateless classes
    /// never appear in a `UsageScope` (see its doc comment), so they never
    /// appear here either.
    #[must_use]
    pub fn merge(
        &mut self,
        scope: &UsageScope<A>,
    ) -> (
        SmallVec<[PendingTransition<hal::BufferUses>; 4]>,
        SmallVec<[PendingTransition<hal::TextureUses>; 4]>,
    ) {
        profiling::scope!("Tracker::merge");
        (
            self.buffers.merge(&scope.buffers),
            self.textures.merge(&scope.textures),
        )
    }
}

impl<A: hal_api::HalApi> Default for Tracker<A> {
    fn default() -> Self {
        Self::new()
    }
}
