//! Sparse, epoch-tagged resource identifiers.
//!
//! These are the handles the public API hands out; they are deliberately
//! not dense (an `Id` can be large and sparsely populated across its
//! lifetime so that reuse of a slot can be detected via its epoch). The
//! tracker never indexes anything by an `Id` directly — see
//! [`crate::track::TrackerIndex`] for the dense integer it uses instead, and
//! [`crate::resource::ResourceInfo`] for how a resource binds the two
//! together.

use std::{fmt, hash::Hash, marker::PhantomData, num::NonZeroU32};

type Index = u32;
type Epoch = NonZeroU32;

/// An opaque, epoch-tagged identifier for a single resource class.
///
/// Two `Id`s with the same `index` but different `epoch` refer to different
/// resources that happened to reuse the same backing slot; comparing them
/// with `==` tells them apart correctly.
pub struct Id<T> {
    index: Index,
    epoch: Epoch,
    marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub fn zip(index: Index, epoch: Epoch) -> Self {
        Self {
            index,
            epoch,
            marker: PhantomData,
        }
    }

    pub fn unzip(self) -> (Index, Epoch) {
        (self.index, self.epoch)
    }

    pub fn index(self) -> Index {
        self.index
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.epoch == other.epoch
    }
}
impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.epoch.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({}, {})", self.index, self.epoch.get())
    }
}

pub struct DeviceMarker;
pub type DeviceId = Id<DeviceMarker>;

pub struct QueueMarker;
pub type QueueId = Id<QueueMarker>;

pub struct BufferMarker;
pub type BufferId = Id<BufferMarker>;

pub struct TextureMarker;
pub type TextureId = Id<TextureMarker>;

pub struct TextureViewMarker;
pub type TextureViewId = Id<TextureViewMarker>;

pub struct SamplerMarker;
pub type SamplerId = Id<SamplerMarker>;
