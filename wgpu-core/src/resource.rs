//! The interface the tracker requires from the resource layer.
//!
//! The resource layer itself — buffer and texture allocation, descriptor
//! validation, mapping state machines — is out of scope here. What the
//! tracker needs from it is a way to obtain a
//! [`TrackingData`](crate::track::TrackingData) for each live resource,
//! exposing its dense [`TrackerIndex`](crate::track::TrackerIndex). This
//! module is that seam: a `Resource` trait and the `ResourceInfo` every
//! concrete resource type embeds to satisfy it.

use std::{marker::PhantomData, sync::atomic::{AtomicU64, Ordering}};

use crate::{
    hal_api::HalApi,
    track::{SharedTrackerIndexAllocator, TrackerIndex, TrackingData},
    SubmissionIndex,
};

/// Anything the tracker can hold an index for.
///
/// A concrete resource type (a real crate's `Buffer<A>`, `Texture<A>`, ...)
/// embeds one [`ResourceInfo<Self>`] and implements this trait by returning
/// a reference to it. `wgpu-core` itself never needs to go the other way
/// (from a `TrackerIndex` back to the resource) — the device-global
/// trackers only ever store usage state, not resource handles; see
/// `DESIGN.md` for why `StatelessTracker` is the one exception.
pub trait Resource: 'static + Sized + Send + Sync {
    fn as_info(&self) -> &ResourceInfo<Self>;
}

/// The per-resource bookkeeping the tracker's callers need: which dense
/// index this resource was allocated, and the most recent queue submission
/// it was used in (needed by the resource layer to decide when a resource
/// is safe to map or free — out of scope here, but the field is cheap to
/// carry since [`TrackingData`] already needs a home).
#[derive(Debug)]
pub struct ResourceInfo<T: Resource> {
    tracking_data: TrackingData,
    submission_index: AtomicU64,
    label: String,
    marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Resource> ResourceInfo<T> {
    pub fn new(label: &str, tracker_indices: &SharedTrackerIndexAllocator) -> Self {
        Self {
            tracking_data: TrackingData::new(tracker_indices.clone()),
            submission_index: AtomicU64::new(0),
            label: label.to_string(),
            marker: std::marker::PhantomData,
        }
    }

    /// The dense index the tracker indexes this resource by.
    pub fn tracker_index(&self) -> TrackerIndex {
        self.tracking_data.index()
    }

    /// Record that this resource was used by the given queue submission.
    pub fn use_at(&self, submit_index: SubmissionIndex) {
        self.submission_index.store(submit_index, Ordering::Release);
    }

    pub fn submission_index(&self) -> SubmissionIndex {
        self.submission_index.load(Ordering::Acquire)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Concrete resource types the tracker has real callers for.
///
/// These carry only the fields `device::life`'s `LifetimeTracker` and the
/// `track` module actually touch (an [`ResourceInfo`] to bind the resource
/// to its dense index, plus whatever per-class data a suspected-resource
/// triage pass reads). Descriptor validation, HAL object creation, and the
/// buffer-mapping state machine are the resource layer's concern and out of
/// scope here.

/// A GPU-visible linear allocation.
#[derive(Debug)]
pub struct Buffer<A: HalApi> {
    pub raw: A::Buffer,
    pub usage: wgt::BufferUsages,
    pub info: ResourceInfo<Self>,
}

impl<A: HalApi> Resource for Buffer<A> {
    fn as_info(&self) -> &ResourceInfo<Self> {
        &self.info
    }
}

/// A GPU-visible image, tracked per `(mip, layer)` subresource.
#[derive(Debug)]
pub struct Texture<A: HalApi> {
    pub raw: A::Texture,
    pub usage: wgt::TextureUsages,
    pub mip_level_count: u32,
    pub array_layer_count: u32,
    pub info: ResourceInfo<Self>,
}

impl<A: HalApi> Resource for Texture<A> {
    fn as_info(&self) -> &ResourceInfo<Self> {
        &self.info
    }
}

/// A view into a (sub-range of a) [`Texture`]. Stateless: a view's liveness
/// is tracked, but it has no usage state of its own — it is the texture it
/// points into that the tracker reasons about.
#[derive(Debug)]
pub struct TextureView<A: HalApi> {
    pub info: ResourceInfo<Self>,
    marker: PhantomData<A>,
}

impl<A: HalApi> TextureView<A> {
    pub fn new(label: &str, tracker_indices: &SharedTrackerIndexAllocator) -> Self {
        Self {
            info: ResourceInfo::new(label, tracker_indices),
            marker: PhantomData,
        }
    }
}

impl<A: HalApi> Resource for TextureView<A> {
    fn as_info(&self) -> &ResourceInfo<Self> {
        &self.info
    }
}

/// A stateless resource: liveness is tracked, usage is not.
#[derive(Debug)]
pub struct Sampler<A: HalApi> {
    pub info: ResourceInfo<Self>,
    marker: PhantomData<A>,
}

impl<A: HalApi> Sampler<A> {
    pub fn new(label: &str, tracker_indices: &SharedTrackerIndexAllocator) -> Self {
        Self {
            info: ResourceInfo::new(label, tracker_indices),
            marker: PhantomData,
        }
    }
}

impl<A: HalApi> Resource for Sampler<A> {
    fn as_info(&self) -> &ResourceInfo<Self> {
        &self.info
    }
}

/// A set of occlusion/timestamp queries. Stateless from the tracker's point
/// of view: it participates in lifetime bookkeeping but never produces a
/// [`crate::track::PendingTransition`].
#[derive(Debug)]
pub struct QuerySet<A: HalApi> {
    pub info: ResourceInfo<Self>,
    marker: PhantomData<A>,
}

impl<A: HalApi> QuerySet<A> {
    pub fn new(label: &str, tracker_indices: &SharedTrackerIndexAllocator) -> Self {
        Self {
            info: ResourceInfo::new(label, tracker_indices),
            marker: PhantomData,
        }
    }
}

impl<A: HalApi> Resource for QuerySet<A> {
    fn as_info(&self) -> &ResourceInfo<Self> {
        &self.info
    }
}
