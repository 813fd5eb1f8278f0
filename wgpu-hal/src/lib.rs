//! The hardware-abstraction seam the resource tracker targets.
//!
//! Everything in this crate is mechanical plumbing: it exists only so the
//! tracker in `wgpu-core` has a concrete `Api` to be generic over and a
//! concrete barrier descriptor to lower a [`PendingTransition`] into. No
//! actual backend (Vulkan/Metal/DX12/GL) is implemented here; that work is
//! out of scope for the resource-state tracking engine this repository
//! implements. See `DESIGN.md` for the list of teacher dependencies (ash,
//! metal, gpu-alloc, naga, ...) this crate dropped because there is no
//! backend left to use them.
//!
//! [`PendingTransition`]: https://docs.rs/wgpu-core (not published; see
//! `wgpu_core::track::PendingTransition`)

#![warn(trivial_casts, trivial_numeric_casts, unused_extern_crates)]

use std::ops::Range;

use bitflags::bitflags;

bitflags! {
    /// The granular, hal-level access modes a buffer may be used with.
    ///
    /// `WRITABLE` names the writable subset the tracker's usage algebra
    /// treats specially.
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
    pub struct BufferUses: u16 {
        const MAP_READ = 1 << 0;
        const MAP_WRITE = 1 << 1;
        const COPY_SRC = 1 << 2;
        const COPY_DST = 1 << 3;
        const INDEX = 1 << 4;
        const VERTEX = 1 << 5;
        const UNIFORM = 1 << 6;
        const STORAGE_READ = 1 << 7;
        const STORAGE_WRITE = 1 << 8;
        const INDIRECT = 1 << 9;
        const QUERY_RESOLVE = 1 << 10;

        /// The subset of states in which the buffer may be written to by the GPU or CPU.
        const WRITABLE = Self::COPY_DST.bits()
            | Self::STORAGE_WRITE.bits()
            | Self::MAP_WRITE.bits()
            | Self::QUERY_RESOLVE.bits();
    }
}

bitflags! {
    /// The granular, hal-level access modes and layouts a texture subresource
    /// may be in.
    ///
    /// `UNINITIALIZED` is not a "use" in the usual sense: it is the sentinel
    /// state every subresource starts in, and a transition away from it is
    /// always barrier-free (an implicit discard).
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
    pub struct TextureUses: u16 {
        /// Never tracked as a "current" state outside of the texture's
        /// initial value; see [`TextureUses::is_uninitialized`].
        const UNINITIALIZED = 1 << 0;
        const PRESENT = 1 << 1;
        const COPY_SRC = 1 << 2;
        const COPY_DST = 1 << 3;
        const SAMPLED_READ = 1 << 4;
        const COLOR_TARGET = 1 << 5;
        const DEPTH_STENCIL_READ = 1 << 6;
        const DEPTH_STENCIL_WRITE = 1 << 7;
        const STORAGE_READ = 1 << 8;
        const STORAGE_WRITE = 1 << 9;
        const RESOLVE_SRC = 1 << 10;
        const RESOLVE_DST = 1 << 11;

        /// The subset of states in which the subresource may be written to.
        const WRITABLE = Self::COPY_DST.bits()
            | Self::COLOR_TARGET.bits()
            | Self::DEPTH_STENCIL_WRITE.bits()
            | Self::STORAGE_WRITE.bits()
            | Self::RESOLVE_DST.bits();
    }
}

impl BufferUses {
    /// `true` iff no bit in `self` is outside the writable subset, i.e. `self`
    /// describes a purely read-only use (including the empty use).
    pub fn is_read_only(self) -> bool {
        (self & Self::WRITABLE).is_empty()
    }
}

impl TextureUses {
    /// `true` iff no bit in `self` is outside the writable subset.
    pub fn is_read_only(self) -> bool {
        (self & Self::WRITABLE).is_empty()
    }

    /// `true` iff `self` is exactly the initial, undefined-content state.
    pub fn is_uninitialized(self) -> bool {
        self == Self::UNINITIALIZED
    }
}

/// A minimal stand-in for the real `hal::Api` trait: just enough associated
/// state for the tracker to be generic over a backend's opaque buffer and
/// texture handles without knowing anything about them.
pub trait Api: 'static + Sized + Send + Sync {
    type Buffer: std::fmt::Debug + Send + Sync;
    type Texture: std::fmt::Debug + Send + Sync;
}

/// A single mip/array-layer rectangle of a texture's subresources.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TextureSelector {
    pub mips: Range<u32>,
    pub layers: Range<u32>,
}

/// The barrier descriptor a backend encoder consumes for a buffer transition.
///
/// `usage.start == usage.end` (or both halves read-only) lowers to a no-op;
/// backends are expected to skip emitting anything in that case rather than
/// have the tracker filter it out twice.
#[derive(Debug)]
pub struct BufferBarrier<'a, A: Api> {
    pub buffer: &'a A::Buffer,
    pub usage: Range<BufferUses>,
}

/// The barrier descriptor a backend encoder consumes for a texture
/// transition over some subresource rectangle.
#[derive(Debug)]
pub struct TextureBarrier<'a, A: Api> {
    pub texture: &'a A::Texture,
    pub range: TextureSelector,
    pub usage: Range<TextureUses>,
}

/// Projects the granular, hal-level [`BufferUses`] the tracker reasons about
/// down onto the public, WebGPU-facing [`wgt::BufferUsages`] a buffer was
/// created with.
///
/// Many-to-one: `STORAGE_READ` and `STORAGE_WRITE` both collapse onto the
/// single `STORAGE` bit, since the public API never distinguished the two —
/// that distinction only exists so the tracker can tell a storage-read-only
/// pass from one that writes. Used only when a caller needs to serialize a
/// requested usage back out (e.g. an API-trace replay layer), never on the
/// tracker's own hot path.
impl From<BufferUses> for wgt::BufferUsages {
    fn from(internal: BufferUses) -> Self {
        let mut external = wgt::BufferUsages::empty();
        external.set(wgt::BufferUsages::MAP_READ, internal.contains(BufferUses::MAP_READ));
        external.set(wgt::BufferUsages::MAP_WRITE, internal.contains(BufferUses::MAP_WRITE));
        external.set(wgt::BufferUsages::COPY_SRC, internal.contains(BufferUses::COPY_SRC));
        external.set(wgt::BufferUsages::COPY_DST, internal.contains(BufferUses::COPY_DST));
        external.set(wgt::BufferUsages::INDEX, internal.contains(BufferUses::INDEX));
        external.set(wgt::BufferUsages::VERTEX, internal.contains(BufferUses::VERTEX));
        external.set(wgt::BufferUsages::UNIFORM, internal.contains(BufferUses::UNIFORM));
        external.set(
            wgt::BufferUsages::STORAGE,
            internal.intersects(BufferUses::STORAGE_READ | BufferUses::STORAGE_WRITE),
        );
        external.set(wgt::BufferUsages::INDIRECT, internal.contains(BufferUses::INDIRECT));
        external.set(
            wgt::BufferUsages::QUERY_RESOLVE,
            internal.contains(BufferUses::QUERY_RESOLVE),
        );
        external
    }
}

/// The inverse direction: expands a buffer's creation-time public usages
/// into the granular hal-level set the tracker seeds a fresh
/// [`crate::BufferTracker`]-equivalent's initial state with (see
/// `wgpu_core::track::buffer::BufferTracker::insert`).
///
/// One-to-many where the public API was silent: `STORAGE` expands to both
/// `STORAGE_READ` and `STORAGE_WRITE`, since a freshly created buffer must
/// be ready for whichever one a binding actually turns out to use.
impl From<wgt::BufferUsages> for BufferUses {
    fn from(external: wgt::BufferUsages) -> Self {
        let mut internal = BufferUses::empty();
        internal.set(BufferUses::MAP_READ, external.contains(wgt::BufferUsages::MAP_READ));
        internal.set(BufferUses::MAP_WRITE, external.contains(wgt::BufferUsages::MAP_WRITE));
        internal.set(BufferUses::COPY_SRC, external.contains(wgt::BufferUsages::COPY_SRC));
        internal.set(BufferUses::COPY_DST, external.contains(wgt::BufferUsages::COPY_DST));
        internal.set(BufferUses::INDEX, external.contains(wgt::BufferUsages::INDEX));
        internal.set(BufferUses::VERTEX, external.contains(wgt::BufferUsages::VERTEX));
        internal.set(BufferUses::UNIFORM, external.contains(wgt::BufferUsages::UNIFORM));
        if external.contains(wgt::BufferUsages::STORAGE) {
            internal.insert(BufferUses::STORAGE_READ | BufferUses::STORAGE_WRITE);
        }
        internal.set(BufferUses::INDIRECT, external.contains(wgt::BufferUsages::INDIRECT));
        internal.set(
            BufferUses::QUERY_RESOLVE,
            external.contains(wgt::BufferUsages::QUERY_RESOLVE),
        );
        internal
    }
}

/// Projects hal-level texture usage down onto the public
/// [`wgt::TextureUsages`] a texture was created with. Layout-only states
/// (`UNINITIALIZED`, `PRESENT`, the depth/stencil and resolve variants) have
/// no public equivalent and are dropped; `STORAGE_READ`/`STORAGE_WRITE`
/// collapse onto `STORAGE_BINDING`, matching the buffer projection above.
impl From<TextureUses> for wgt::TextureUsages {
    fn from(internal: TextureUses) -> Self {
        let mut external = wgt::TextureUsages::empty();
        external.set(wgt::TextureUsages::COPY_SRC, internal.contains(TextureUses::COPY_SRC));
        external.set(wgt::TextureUsages::COPY_DST, internal.contains(TextureUses::COPY_DST));
        external.set(
            wgt::TextureUsages::TEXTURE_BINDING,
            internal.contains(TextureUses::SAMPLED_READ),
        );
        external.set(
            wgt::TextureUsages::STORAGE_BINDING,
            internal.intersects(TextureUses::STORAGE_READ | TextureUses::STORAGE_WRITE),
        );
        external.set(
            wgt::TextureUsages::RENDER_ATTACHMENT,
            internal.intersects(
                TextureUses::COLOR_TARGET
                    | TextureUses::DEPTH_STENCIL_READ
                    | TextureUses::DEPTH_STENCIL_WRITE,
            ),
        );
        external
    }
}

/// The inverse direction: expands a texture's creation-time public usages
/// into the hal-level set a fresh texture's tracked state is seeded from
/// before its first real use (`wgpu_core::track::texture::TextureTracker`
/// always starts a subresource at `UNINITIALIZED` regardless, per spec.md
/// §4.5 — this projection instead answers "which hal states must the
/// backend be prepared to transition this texture into").
impl From<wgt::TextureUsages> for TextureUses {
    fn from(external: wgt::TextureUsages) -> Self {
        let mut internal = TextureUses::empty();
        internal.set(TextureUses::COPY_SRC, external.contains(wgt::TextureUsages::COPY_SRC));
        internal.set(TextureUses::COPY_DST, external.contains(wgt::TextureUsages::COPY_DST));
        internal.set(
            TextureUses::SAMPLED_READ,
            external.contains(wgt::TextureUsages::TEXTURE_BINDING),
        );
        if external.contains(wgt::TextureUsages::STORAGE_BINDING) {
            internal.insert(TextureUses::STORAGE_READ | TextureUses::STORAGE_WRITE);
        }
        if external.contains(wgt::TextureUsages::RENDER_ATTACHMENT) {
            internal.insert(TextureUses::COLOR_TARGET | TextureUses::DEPTH_STENCIL_WRITE);
        }
        internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_storage_read_and_write_collapse_to_one_public_flag() {
        let internal = BufferUses::STORAGE_READ | BufferUses::STORAGE_WRITE;
        let external: wgt::BufferUsages = internal.into();
        assert_eq!(external, wgt::BufferUsages::STORAGE);
    }

    #[test]
    fn buffer_storage_expands_to_both_read_and_write() {
        let internal: BufferUses = wgt::BufferUsages::STORAGE.into();
        assert!(internal.contains(BufferUses::STORAGE_READ));
        assert!(internal.contains(BufferUses::STORAGE_WRITE));
    }

    #[test]
    fn buffer_non_storage_flags_round_trip() {
        let external = wgt::BufferUsages::VERTEX | wgt::BufferUsages::COPY_DST;
        let internal: BufferUses = external.into();
        let back: wgt::BufferUsages = internal.into();
        assert_eq!(external, back);
    }

    #[test]
    fn texture_storage_read_and_write_collapse_to_storage_binding() {
        let internal = TextureUses::STORAGE_READ | TextureUses::STORAGE_WRITE;
        let external: wgt::TextureUsages = internal.into();
        assert_eq!(external, wgt::TextureUsages::STORAGE_BINDING);
    }

    #[test]
    fn texture_layout_only_states_have_no_public_equivalent() {
        let external: wgt::TextureUsages = TextureUses::UNINITIALIZED.into();
        assert!(external.is_empty());
        let external: wgt::TextureUsages = TextureUses::PRESENT.into();
        assert!(external.is_empty());
    }
}
