//! Debug-only detection of nested entry into a `HashedMap`.
//!
//! Chain scans call user code (`Hash` through the hasher, `Eq` on keys)
//! while the map holds references into its own storage. A key whose `Eq`
//! reaches back into the same map through a raw pointer would observe that
//! storage mid-operation. In debug builds every map entry point opens a
//! scope, and opening a second scope while one is active panics, naming
//! both operations. In release builds the tracker is zero-sized and the
//! scope is a no-op.

use core::marker::PhantomData;

#[cfg(debug_assertions)]
use core::cell::Cell;

/// Per-map tracker of the operation currently running.
#[derive(Debug)]
pub(crate) struct ScanTracker {
    #[cfg(debug_assertions)]
    active: Cell<Option<&'static str>>,
    // Single-threaded: keep the owner !Send + !Sync.
    _single_thread: PhantomData<*mut ()>,
}

impl ScanTracker {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(None),
            _single_thread: PhantomData,
        }
    }

    /// Open the scope for `op`. Panics in debug builds if another scope of
    /// the same map is still open.
    #[inline]
    pub(crate) fn enter(&self, op: &'static str) -> ScanScope<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(running) = self.active.get() {
                panic!("nested call into HashedMap::{op} while HashedMap::{running} is running");
            }
            self.active.set(Some(op));
            ScanScope { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = op;
            ScanScope { _z: PhantomData }
        }
    }
}

impl Default for ScanTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Closes the scope opened by `ScanTracker::enter` when dropped.
pub(crate) struct ScanScope<'a> {
    #[cfg(debug_assertions)]
    owner: &'a ScanTracker,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl Drop for ScanScope<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            debug_assert!(self.owner.active.get().is_some());
            self.owner.active.set(None);
        }
    }
}
