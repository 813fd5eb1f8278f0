//! Thin re-export of the mutex this crate locks device-global trackers and
//! scopes with, kept as its own module (rather than using `parking_lot`
//! directly at every call site) so the lock strategy can change in one
//! place if it ever needs to.

pub use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
