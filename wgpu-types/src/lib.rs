//! Plain data shared across the tracker's callers: the public, WebGPU-facing
//! usage bitflags and the handful of descriptor fields the tracker needs to
//! reason about subresources.
//!
//! This crate carries no logic of its own. Usage compatibility, merge rules,
//! and barrier emission live in `wgpu-core`'s `track` module; `wgpu-hal`
//! carries the lower-level, hal-facing superset of these bitflags. The only
//! thing that crosses the boundary in both directions is a many-to-one
//! projection from granular hal usage down to these public flags.

#![warn(trivial_casts, trivial_numeric_casts, unused_extern_crates)]

use bitflags::bitflags;

bitflags! {
    /// The public, WebGPU-facing usage set a buffer may be created with.
    ///
    /// Unlike the hal-level `BufferUses` this crate's sibling `wgpu-hal`
    /// tracks internally, `STORAGE` here does not distinguish between read
    /// and write access; that distinction only matters to the tracker, which
    /// reconstructs it from how the buffer is actually bound.
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct BufferUsages: u32 {
        const MAP_READ = 1 << 0;
        const MAP_WRITE = 1 << 1;
        const COPY_SRC = 1 << 2;
        const COPY_DST = 1 << 3;
        const INDEX = 1 << 4;
        const VERTEX = 1 << 5;
        const UNIFORM = 1 << 6;
        const STORAGE = 1 << 7;
        const INDIRECT = 1 << 8;
        const QUERY_RESOLVE = 1 << 9;
    }
}

bitflags! {
    /// The public, WebGPU-facing usage set a texture may be created with.
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct TextureUsages: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const TEXTURE_BINDING = 1 << 2;
        const STORAGE_BINDING = 1 << 3;
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

/// Which planes of a texture a view or copy addresses.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextureAspect {
    All,
    StencilOnly,
    DepthOnly,
    Plane0,
    Plane1,
    Plane2,
}

impl Default for TextureAspect {
    fn default() -> Self {
        Self::All
    }
}

/// The full subresource extent of a texture, in the coordinates the tracker
/// indexes by: mip levels and array layers. Depth/width/height are not the
/// tracker's concern (they never affect synchronization), so they are not
/// modeled here.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TextureSubresourceCount {
    pub mip_level_count: u32,
    pub array_layer_count: u32,
}
