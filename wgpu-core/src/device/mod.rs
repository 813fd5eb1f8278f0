//! Device-facing errors the tracker passes through without inspecting.
//!
//! The device, queue, encoder, and pipeline objects themselves are out of
//! scope for the resource-state tracking engine (see the crate's top-level
//! documentation): they are mechanical hardware-abstraction plumbing. What
//! the tracker does need is a name for the errors a backend can surface
//! through calls that happen to sit next to tracker operations (queue
//! submission, buffer mapping), so that those call sites can use `?`
//! without the tracker ever constructing or matching on a variant itself.

pub(crate) mod life;

use thiserror::Error;

/// Errors a backend may report from operations adjacent to the tracker.
///
/// The tracker neither generates nor consumes any of these; `merge` is
/// infallible by construction (see [`crate::track::UsageConflict`] for the
/// one error the tracker itself can raise, and only from `UsageScope`).
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum DeviceError {
    #[error("Parent device is lost")]
    Lost,
    #[error("Not enough memory left to complete the requested operation")]
    OutOfMemory,
    #[error("Creation of a resource failed for a reason other than running out of memory")]
    ResourceCreationFailed,
    #[error("Surface timed out while waiting for a frame")]
    Timeout,
    #[error("Surface is outdated, needs to be re-created")]
    Outdated,
    #[error("Surface has been lost and needs to be re-created")]
    SurfaceLost,
    #[error("Surface has a zero area")]
    ZeroAreaSurface,
}
