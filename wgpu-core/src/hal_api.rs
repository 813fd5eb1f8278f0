//! The generic parameter every tracked resource and every tracker carries:
//! which backend's opaque handles it was created against.

/// Blanket bound tying a backend's [`hal::Api`] to the bounds `wgpu-core`
/// needs to hold resources and trackers across threads.
///
/// The real crate also uses this trait as a dispatch point for backend
/// registration; that plumbing is out of scope here, so this is just the
/// bound.
pub trait HalApi: hal::Api + 'static + Send + Sync {}

impl<A: hal::Api + 'static + Send + Sync> HalApi for A {}
