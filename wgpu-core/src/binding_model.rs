//! Bind groups and bind-group layouts, kept to the depth the tracker's
//! lifetime bookkeeping needs: a bind group is a bundle of resource
//! references captured at *creation* time, distinct from the usage a
//! command encoder accumulates at *recording* time in a
//! [`crate::track::buffer::BufferUsageScope`]/
//! [`crate::track::texture::TextureUsageScope`].
//!
//! Binding validation (layout compatibility, dynamic offsets, shader
//! visibility) is application-level semantics the tracker does not own; see
//! spec.md's Non-goals.

use std::sync::Arc;

use crate::{
    hal_api::HalApi,
    lock::RwLock,
    resource::{Buffer, Resource, ResourceInfo, Sampler, Texture, TextureView},
    track::{SharedTrackerIndexAllocator, StatelessTracker},
};

/// The set of resources a [`BindGroup`] references, captured once at
/// creation time.
///
/// This is *not* a [`crate::track::buffer::BufferUsageScope`]: it never
/// participates in a submission's merge. Its only job is to keep the
/// referenced resources alive and to let `device::life`'s suspected-resource
/// triage recurse from a dropped bind group into the buffers, textures,
/// views, and samplers it was the last owner of (`remove_abandoned`, drained
/// when the bind group itself is collected). A bind group is reachable only
/// through an `Arc` once created, so each field is behind its own
/// [`RwLock`] for the same reason [`crate::command::RenderBundleScope`]'s
/// fields are: triage drains a field through a shared reference.
#[derive(Debug)]
pub struct BindGroupStates<A: HalApi> {
    pub buffers: RwLock<StatelessTracker<A, Buffer<A>>>,
    pub textures: RwLock<StatelessTracker<A, Texture<A>>>,
    pub views: RwLock<StatelessTracker<A, TextureView<A>>>,
    pub samplers: RwLock<StatelessTracker<A, Sampler<A>>>,
}

impl<A: HalApi> BindGroupStates<A> {
    pub fn new() -> Self {
        Self {
            buffers: RwLock::new(StatelessTracker::new()),
            textures: RwLock::new(StatelessTracker::new()),
            views: RwLock::new(StatelessTracker::new()),
            samplers: RwLock::new(StatelessTracker::new()),
        }
    }
}

impl<A: HalApi> Default for BindGroupStates<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct BindGroupLayout<A: HalApi> {
    pub info: ResourceInfo<Self>,
    marker: std::marker::PhantomData<A>,
}

impl<A: HalApi> BindGroupLayout<A> {
    pub fn new(label: &str, tracker_indices: &SharedTrackerIndexAllocator) -> Self {
        Self {
            info: ResourceInfo::new(label, tracker_indices),
            marker: std::marker::PhantomData,
        }
    }
}

impl<A: HalApi> Resource for BindGroupLayout<A> {
    fn as_info(&self) -> &ResourceInfo<Self> {
        &self.info
    }
}

#[derive(Debug)]
pub struct BindGroup<A: HalApi> {
    pub info: ResourceInfo<Self>,
    pub layout: Arc<BindGroupLayout<A>>,
    pub used: BindGroupStates<A>,
}

impl<A: HalApi> Resource for BindGroup<A> {
    fn as_info(&self) -> &ResourceInfo<Self> {
        &self.info
    }
}
