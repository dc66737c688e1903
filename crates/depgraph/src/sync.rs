//! Outer-boundary synchronization for the MDG (spec §5 "concurrent_perform").
//!
//! The planner itself is single-threaded: all mutation of the [`Mdg`]
//! happens on the one planning thread (spec §5 "all mutations of the MDG
//! and of the build record happen on that thread"). `SyncMdg` exists only
//! for the driver's outer boundary, where several planning tasks may be
//! spawned under a `concurrent_perform`-style fan-out and need to share
//! one graph; it is a thin `Mutex` wrapper, never used internally by
//! `Mdg` or the planner's own single-threaded integration loop.

use crate::mdg::Mdg;
use std::sync::{Mutex, MutexGuard};

/// Exclusive-access wrapper around an [`Mdg`] for use across threads.
///
/// Locking is coarse-grained by design: a caller takes the lock, performs
/// its graph mutation, and releases it before any blocking I/O (scanner
/// queries, CAS queries, reading a just-compiled SFDG off disk) — those
/// suspension points must happen outside the critical section (spec §5
/// "does not perform I/O while holding the MDG lock beyond the minimum
/// needed to stream bytes into the parser").
#[derive(Debug, Default)]
pub struct SyncMdg {
    inner: Mutex<Mdg>,
}

impl SyncMdg {
    pub fn new(mdg: Mdg) -> Self {
        Self { inner: Mutex::new(mdg) }
    }

    /// Take the exclusive lock for a graph mutation. Panics if a prior
    /// holder panicked while holding the lock, matching `Mdg`'s own
    /// "never silently continue past a broken invariant" stance.
    pub fn lock(&self) -> MutexGuard<'_, Mdg> {
        self.inner.lock().expect("SyncMdg lock poisoned by a prior panic")
    }

    /// Unwrap back into the plain, single-threaded `Mdg` once fan-out has
    /// completed and only the planning thread remains.
    pub fn into_inner(self) -> Mdg {
        self.inner.into_inner().expect("SyncMdg lock poisoned by a prior panic")
    }
}
