//! Command recording, trimmed to the one piece the tracker's lifetime
//! bookkeeping needs a name for: a render bundle's captured resource set.
//!
//! A render bundle is pre-recorded once and replayed into many render
//! passes; `command_encoder`/`render_pass`/`compute_pass` themselves are the
//! per-command-buffer [`crate::track::buffer::BufferUsageScope`]/
//! [`crate::track::texture::TextureUsageScope`] callers spec.md §4.6
//! describes directly, and are not reconstructed here since they carry no
//! logic beyond "call `set_usage` once per resource reference" — mechanical,
//! per spec.md §1.

use crate::{
    binding_model::BindGroup,
    hal_api::HalApi,
    lock::RwLock,
    pipeline::RenderPipeline,
    resource::{Buffer, QuerySet, Resource, ResourceInfo, Texture},
    track::{SharedTrackerIndexAllocator, StatelessTracker},
};

/// The set of resources a recorded [`RenderBundle`] references.
///
/// A render bundle is built up incrementally by a `RenderBundleEncoder` that
/// may, in principle, be shared across threads before it finishes recording,
/// so each field is behind its own [`RwLock`] rather than requiring the whole
/// bundle locked for every resource class at once (mirrors how
/// `bundle.used.buffers` is locked independently of `.textures`/
/// `.bind_groups` during triage, the same pattern
/// [`crate::binding_model::BindGroupStates`] uses for the same reason: both
/// are reachable only through an `Arc` once their owning resource is shared).
#[derive(Debug)]
pub struct RenderBundleScope<A: HalApi> {
    pub buffers: RwLock<StatelessTracker<A, Buffer<A>>>,
    pub textures: RwLock<StatelessTracker<A, Texture<A>>>,
    pub bind_groups: RwLock<StatelessTracker<A, BindGroup<A>>>,
    pub render_pipelines: RwLock<StatelessTracker<A, RenderPipeline<A>>>,
    pub query_sets: RwLock<StatelessTracker<A, QuerySet<A>>>,
}

impl<A: HalApi> RenderBundleScope<A> {
    pub fn new() -> Self {
        Self {
            buffers: RwLock::new(StatelessTracker::new()),
            textures: RwLock::new(StatelessTracker::new()),
            bind_groups: RwLock::new(StatelessTracker::new()),
            render_pipelines: RwLock::new(StatelessTracker::new()),
            query_sets: RwLock::new(StatelessTracker::new()),
        }
    }
}

impl<A: HalApi> Default for RenderBundleScope<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct RenderBundle<A: HalApi> {
    pub info: ResourceInfo<Self>,
    pub used: RenderBundleScope<A>,
}

impl<A: HalApi> RenderBundle<A> {
    pub fn new(label: &str, tracker_indices: &SharedTrackerIndexAllocator) -> Self {
        Self {
            info: ResourceInfo::new(label, tracker_indices),
            used: RenderBundleScope::new(),
        }
    }
}

impl<A: HalApi> Resource for RenderBundle<A> {
    fn as_info(&self) -> &ResourceInfo<Self> {
        &self.info
    }
}
