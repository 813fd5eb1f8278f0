/*! The resource-state tracking and synchronization engine that sits between
 *  a portable, high-level WebGPU-shaped API and one or more native backends.
 *
 *  Given the commands a user recorded, [`track`] answers which memory
 *  barriers, layout transitions, and state changes a backend must issue to
 *  keep execution correct, and composes those decisions across command
 *  buffers submitted concurrently. Everything else in this crate (resource
 *  and device scaffolding) exists only to give the tracker real callers; the
 *  hardware abstraction layer, shader translation, and the public API
 *  surface are out of scope and live elsewhere.
 */

#![allow(
    // We don't use syntax sugar where it's not necessary.
    clippy::match_like_matches_macro,
    // Explicit lifetimes are often easier to reason about.
    clippy::needless_lifetimes,
)]
#![warn(
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_qualifications
)]

pub mod binding_model;
pub mod command;
pub mod device;
pub mod hal_api;
pub mod id;
pub mod lock;
pub mod pipeline;
pub mod resource;
pub mod track;

/// The index of a queue submission, as assigned by a device's fence.
///
/// Submission order on a queue is preserved and fence signal values are
/// monotonic per fence.
pub type SubmissionIndex = u64;

/// Fast hash map used internally; matches the hashing strategy `wgpu-core`
/// uses everywhere it isn't handed a user-supplied key type.
pub(crate) type FastHashMap<K, V> =
    std::collections::HashMap<K, V, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>;
/// Fast hash set used internally.
pub(crate) type FastHashSet<K> =
    std::collections::HashSet<K, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>;

/// Asserts active only when `cfg(debug_assertions)` or the `strict_asserts`
/// feature is enabled. Used for the tracker's internal tiling and density
/// invariants, which are too expensive to pay for in every release build
/// but which a caller may want checked anyway.
#[macro_export]
macro_rules! strict_assert {
    ($($arg:tt)*) => {
        if cfg!(any(debug_assertions, feature = "strict_asserts")) {
            assert!($($arg)*);
        }
    };
}

/// See [`strict_assert!`].
#[macro_export]
macro_rules! strict_assert_eq {
    ($($arg:tt)*) => {
        if cfg!(any(debug_assertions, feature = "strict_asserts")) {
            assert_eq!($($arg)*);
        }
    };
}
