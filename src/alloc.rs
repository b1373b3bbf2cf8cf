//! Allocator capability used by `Vector` and `HashedMap` for every storage
//! lifecycle operation: obtaining slots, releasing them, and running an
//! element's destructor in place.

use crate::error::ContainerError;
use core::cell::Cell;
use core::mem;
use core::ptr::{self, NonNull};
use std::alloc::Layout;
use std::rc::Rc;

/// Source of uninitialized, typed storage.
///
/// # Safety
///
/// `allocate::<T>(n)` must return a pointer that is valid for reads and
/// writes of `n` consecutive `T` values, properly aligned, and not aliased
/// by any other live allocation, until it is handed back to `deallocate`
/// with the same `n`. Containers rely on this for memory safety.
pub unsafe trait Allocator {
    /// Allocate uninitialized storage for `count` values of `T`.
    ///
    /// For zero-sized requests (either `count == 0` or a zero-sized `T`)
    /// a dangling, well-aligned pointer may be returned.
    fn allocate<T>(&self, count: usize) -> Result<NonNull<T>, ContainerError>;

    /// Release storage obtained from `allocate::<T>(count)`.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator (or a clone of it) with the same
    /// `T` and `count`, and must not be used afterwards.
    unsafe fn deallocate<T>(&self, ptr: NonNull<T>, count: usize);

    /// Run the destructor of the value in `slot`, leaving the slot
    /// uninitialized.
    ///
    /// # Safety
    ///
    /// `slot` must point at an initialized `T` that is not used again
    /// without being rewritten.
    unsafe fn destroy<T>(&self, slot: NonNull<T>) {
        ptr::drop_in_place(slot.as_ptr());
    }
}

fn array_layout<T>(count: usize) -> Result<Layout, ContainerError> {
    Layout::array::<T>(count).map_err(|_| ContainerError::CapacityOverflow { requested: count })
}

/// The process heap (`std::alloc`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global;

unsafe impl Allocator for Global {
    fn allocate<T>(&self, count: usize) -> Result<NonNull<T>, ContainerError> {
        let layout = array_layout::<T>(count)?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        // SAFETY: the layout has a non-zero size.
        let raw = unsafe { std::alloc::alloc(layout) };
        NonNull::new(raw.cast::<T>()).ok_or(ContainerError::AllocFailed {
            size: layout.size(),
            align: layout.align(),
        })
    }

    unsafe fn deallocate<T>(&self, ptr: NonNull<T>, count: usize) {
        let size = mem::size_of::<T>() * count;
        if size == 0 {
            return;
        }
        // The same layout passed `Layout::array` when the block was allocated.
        let layout = Layout::from_size_align_unchecked(size, mem::align_of::<T>());
        std::alloc::dealloc(ptr.as_ptr().cast::<u8>(), layout);
    }
}

/// Snapshot of the calls observed by a `CountingAllocator`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Successful `allocate` calls.
    pub allocations: usize,
    /// `deallocate` calls.
    pub deallocations: usize,
    /// Slots currently handed out (allocated minus released).
    pub live_slots: usize,
    /// `destroy` calls, one per element destructor run.
    pub destroyed: usize,
}

impl AllocStats {
    /// Every allocation has been released.
    pub fn is_balanced(&self) -> bool {
        self.allocations == self.deallocations && self.live_slots == 0
    }
}

#[derive(Debug, Default)]
struct Counters {
    allocations: Cell<usize>,
    deallocations: Cell<usize>,
    live_slots: Cell<usize>,
    destroyed: Cell<usize>,
}

fn bump(c: &Cell<usize>, by: usize) {
    c.set(c.get() + by);
}

/// Allocator wrapper that counts every call before forwarding it.
///
/// Clones share their counters, so a clone kept by a test observes all
/// traffic of the containers built from the original.
#[derive(Clone, Debug, Default)]
pub struct CountingAllocator<A = Global> {
    inner: A,
    counters: Rc<Counters>,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::wrapping(Global)
    }
}

impl<A> CountingAllocator<A> {
    pub fn wrapping(inner: A) -> Self {
        Self {
            inner,
            counters: Rc::new(Counters::default()),
        }
    }

    pub fn stats(&self) -> AllocStats {
        let c = &self.counters;
        AllocStats {
            allocations: c.allocations.get(),
            deallocations: c.deallocations.get(),
            live_slots: c.live_slots.get(),
            destroyed: c.destroyed.get(),
        }
    }
}

unsafe impl<A: Allocator> Allocator for CountingAllocator<A> {
    fn allocate<T>(&self, count: usize) -> Result<NonNull<T>, ContainerError> {
        let ptr = self.inner.allocate::<T>(count)?;
        bump(&self.counters.allocations, 1);
        bump(&self.counters.live_slots, count);
        Ok(ptr)
    }

    unsafe fn deallocate<T>(&self, ptr: NonNull<T>, count: usize) {
        bump(&self.counters.deallocations, 1);
        let live = self.counters.live_slots.get();
        debug_assert!(live >= count, "released more slots than were allocated");
        self.counters.live_slots.set(live.saturating_sub(count));
        self.inner.deallocate(ptr, count);
    }

    unsafe fn destroy<T>(&self, slot: NonNull<T>) {
        bump(&self.counters.destroyed, 1);
        self.inner.destroy(slot);
    }
}
