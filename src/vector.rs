//! Vector: contiguous growable array over a pluggable allocator.
//!
//! Layout: `ptr` owns `cap` slots obtained from `alloc`; slots `[0, len)`
//! are initialized, `[len, cap)` are not. `ptr` is `None` exactly when
//! `cap == 0`. Every reallocation bumps `generation` so cursors created
//! before it can be recognized as stale.

use crate::alloc::{Allocator, Global};
use crate::cursor::{ConstCursor, Cursor};
use crate::error::ContainerError;
use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ops::{Deref, DerefMut, Index, IndexMut};
use core::ptr::{self, NonNull};
use core::slice;
use std::alloc::Layout;

/// Capacity allocated by `new` and the first growth step from an empty
/// buffer.
pub const DEFAULT_CAPACITY: usize = 4;

/// Capacity multiplier applied when an append or insert runs out of room.
pub const GROWTH_FACTOR: usize = 2;

pub struct Vector<T, A: Allocator = Global> {
    ptr: Option<NonNull<T>>,
    len: usize,
    cap: usize,
    generation: u32,
    alloc: A,
    _owns: PhantomData<T>,
}

#[cold]
#[inline(never)]
fn alloc_failure(e: ContainerError) -> ! {
    if let ContainerError::AllocFailed { size, align } = e {
        if let Ok(layout) = Layout::from_size_align(size, align) {
            std::alloc::handle_alloc_error(layout);
        }
    }
    panic!("{e}")
}

impl<T> Vector<T> {
    /// Empty vector with `DEFAULT_CAPACITY` slots on the global heap.
    pub fn new() -> Self {
        Self::new_in(Global)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, Global)
    }
}

impl<T: Clone> Vector<T> {
    /// `count` clones of `value`.
    pub fn from_elem(count: usize, value: T) -> Self {
        Self::from_elem_in(count, value, Global)
    }
}

impl<T, A: Allocator> Vector<T, A> {
    pub fn new_in(alloc: A) -> Self {
        Self::with_capacity_in(DEFAULT_CAPACITY, alloc)
    }

    pub fn with_capacity_in(capacity: usize, alloc: A) -> Self {
        let mut v = Self::unallocated(alloc);
        if capacity > 0 {
            v.reallocate(capacity);
        }
        v
    }

    pub fn from_elem_in(count: usize, value: T, alloc: A) -> Self
    where
        T: Clone,
    {
        let mut v = Self::with_capacity_in(count, alloc);
        for _ in 0..count {
            // SAFETY: capacity was allocated for `count` elements.
            unsafe { v.push_unchecked(value.clone()) };
        }
        v
    }

    fn unallocated(alloc: A) -> Self {
        Self {
            ptr: None,
            len: 0,
            cap: 0,
            generation: 0,
            alloc,
            _owns: PhantomData,
        }
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Move the contents out, leaving `self` empty with no buffer.
    ///
    /// The returned vector owns the original buffer (so `data()` is
    /// unchanged) and the original allocator; `self` keeps a clone of the
    /// allocator and reports a null `data()`.
    pub fn take(&mut self) -> Self
    where
        A: Clone,
    {
        let empty = Self::unallocated(self.alloc.clone());
        mem::replace(self, empty)
    }

    /// Drop the current contents and take over those of `other`, which is
    /// left empty as by `take`.
    pub fn assign_take(&mut self, other: &mut Self)
    where
        A: Clone,
    {
        *self = other.take();
    }

    // ---- element access ----

    /// Bounds-checked shared access.
    pub fn at(&self, index: usize) -> Result<&T, ContainerError> {
        let len = self.len;
        self.as_slice()
            .get(index)
            .ok_or(ContainerError::OutOfRange { index, len })
    }

    /// Bounds-checked exclusive access.
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T, ContainerError> {
        let len = self.len;
        self.as_mut_slice()
            .get_mut(index)
            .ok_or(ContainerError::OutOfRange { index, len })
    }

    /// First element. Panics on an empty vector.
    pub fn front(&self) -> &T {
        assert!(self.len > 0, "front() called on an empty Vector");
        &self.as_slice()[0]
    }

    pub fn front_mut(&mut self) -> &mut T {
        assert!(self.len > 0, "front_mut() called on an empty Vector");
        &mut self.as_mut_slice()[0]
    }

    /// Last element. Panics on an empty vector.
    pub fn back(&self) -> &T {
        assert!(self.len > 0, "back() called on an empty Vector");
        &self.as_slice()[self.len - 1]
    }

    pub fn back_mut(&mut self) -> &mut T {
        assert!(self.len > 0, "back_mut() called on an empty Vector");
        let last = self.len - 1;
        &mut self.as_mut_slice()[last]
    }

    /// Start of the buffer, or null when no buffer is held. Valid until the
    /// next reallocation.
    pub fn data(&self) -> *const T {
        self.ptr.map_or(ptr::null(), |p| p.as_ptr() as *const T)
    }

    pub fn data_mut(&mut self) -> *mut T {
        self.ptr.map_or(ptr::null_mut(), |p| p.as_ptr())
    }

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `[0, len)` is initialized; the base is dangling only when
        // `len == 0`.
        unsafe { slice::from_raw_parts(self.base_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as in `as_slice`, and `&mut self` is exclusive.
        unsafe { slice::from_raw_parts_mut(self.base_ptr(), self.len) }
    }

    // ---- capacity ----

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Largest element count a buffer of `T` can address.
    pub fn max_elements(&self) -> usize {
        match mem::size_of::<T>() {
            0 => usize::MAX,
            size => isize::MAX as usize / size,
        }
    }

    /// Ensure room for exactly `capacity` slots; no-op if already there.
    ///
    /// Reallocation relocates every element and invalidates all cursors.
    pub fn reserve(&mut self, capacity: usize) {
        if let Err(e) = self.try_reserve(capacity) {
            alloc_failure(e);
        }
    }

    /// Fallible `reserve`. On error the vector is unchanged.
    pub fn try_reserve(&mut self, capacity: usize) -> Result<(), ContainerError> {
        if capacity <= self.cap {
            return Ok(());
        }
        self.try_reallocate(capacity)
    }

    /// Reallocate so that `capacity() == len()`. An empty vector releases
    /// its buffer.
    pub fn shrink_to_fit(&mut self) {
        if self.cap > self.len {
            self.reallocate(self.len);
        }
    }

    // ---- modifiers ----

    /// Destroy every element in index order. Capacity is kept.
    pub fn clear(&mut self) {
        let len = self.len;
        self.len = 0;
        // SAFETY: `[0, len)` was live and is no longer reachable.
        unsafe { self.destroy_range(0, len) };
    }

    /// Append, doubling the capacity first when full.
    pub fn push_back(&mut self, value: T) {
        self.grow_for(1);
        // SAFETY: `grow_for` guarantees a free slot.
        unsafe { self.push_unchecked(value) };
    }

    /// Append the result of `f`, constructed once the slot is available.
    pub fn emplace_back_with<F>(&mut self, f: F) -> Cursor<T>
    where
        F: FnOnce() -> T,
    {
        self.grow_for(1);
        // SAFETY: as in `push_back`.
        unsafe { self.push_unchecked(f()) };
        self.cursor_at(self.len - 1)
    }

    /// Destroy the last element. Panics on an empty vector.
    pub fn pop_back(&mut self) {
        assert!(self.len > 0, "pop_back() called on an empty Vector");
        self.len -= 1;
        // SAFETY: the slot was live and is now past `len`.
        unsafe { self.destroy_range(self.len, self.len + 1) };
    }

    /// Move the last element out, if any.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: the slot was live and is now past `len`, so it is read once.
        Some(unsafe { ptr::read(self.base_ptr().add(self.len)) })
    }

    /// Grow with `T::default()` or shrink to `new_len`.
    pub fn resize(&mut self, new_len: usize)
    where
        T: Default,
    {
        self.resize_with(new_len, T::default);
    }

    /// Grow with values from `f` or shrink to `new_len`.
    ///
    /// Growing past capacity reallocates to `max(2 * capacity, new_len)`.
    pub fn resize_with<F>(&mut self, new_len: usize, mut f: F)
    where
        F: FnMut() -> T,
    {
        if new_len <= self.len {
            let old_len = self.len;
            self.len = new_len;
            // SAFETY: `[new_len, old_len)` was live and is now past `len`.
            unsafe { self.destroy_range(new_len, old_len) };
            return;
        }
        if new_len > self.cap {
            self.reallocate(self.grown_capacity(new_len));
        }
        while self.len < new_len {
            // SAFETY: capacity covers `new_len`.
            unsafe { self.push_unchecked(f()) };
        }
    }

    /// Insert `value` before `pos`; returns a cursor to it.
    pub fn insert<P>(&mut self, pos: P, value: T) -> Cursor<T>
    where
        P: Into<ConstCursor<T>>,
    {
        self.emplace_with(pos, || value)
    }

    /// Insert the result of `f` before `pos`; returns a cursor to it.
    ///
    /// `f` runs after any reallocation, so it may not rely on cursors into
    /// this vector.
    pub fn emplace_with<P, F>(&mut self, pos: P, f: F) -> Cursor<T>
    where
        P: Into<ConstCursor<T>>,
        F: FnOnce() -> T,
    {
        let index = self.offset_of(pos.into());
        self.grow_for(1);
        let value = f();
        // SAFETY: one free slot exists; the tail is moved as a block and
        // the opened slot is written before `len` covers it.
        unsafe {
            let base = self.base_ptr();
            ptr::copy(base.add(index), base.add(index + 1), self.len - index);
            base.add(index).write(value);
        }
        self.len += 1;
        self.cursor_at(index)
    }

    /// Insert `count` clones of `value` before `pos`; returns a cursor to
    /// the first of them (or `pos` itself when `count == 0`).
    pub fn insert_n<P>(&mut self, pos: P, count: usize, value: T) -> Cursor<T>
    where
        P: Into<ConstCursor<T>>,
        T: Clone,
    {
        let index = self.offset_of(pos.into());
        let mut written = 0;
        self.splice_in(index, count, || {
            written += 1;
            if written < count {
                Some(value.clone())
            } else {
                None
            }
        });
        if count > 0 {
            // SAFETY: `splice_in` left exactly this slot unwritten and
            // already counted in `len`.
            unsafe { self.base_ptr().add(index + count - 1).write(value) };
        }
        self.cursor_at(index)
    }

    /// Insert every item of `items` before `pos`, in order; returns a
    /// cursor to the first inserted element.
    ///
    /// An exact size hint reserves the gap up front. An iterator that then
    /// yields fewer items has the gap closed behind it; surplus items are
    /// not consumed. Without an exact hint the items are appended and
    /// rotated into place.
    pub fn insert_iter<P, I>(&mut self, pos: P, items: I) -> Cursor<T>
    where
        P: Into<ConstCursor<T>>,
        I: IntoIterator<Item = T>,
    {
        let index = self.offset_of(pos.into());
        let mut items = items.into_iter();
        match items.size_hint() {
            (lower, Some(upper)) if lower == upper => {
                self.splice_exact(index, lower, &mut items);
            }
            _ => {
                let old_len = self.len;
                for item in items {
                    self.push_back(item);
                }
                let added = self.len - old_len;
                self.as_mut_slice()[index..].rotate_right(added);
            }
        }
        self.cursor_at(index)
    }

    fn splice_exact<I>(&mut self, index: usize, count: usize, items: &mut I)
    where
        I: Iterator<Item = T>,
    {
        let inserted = self.splice_in(index, count, || items.next());
        if inserted < count {
            // SAFETY: `[index + inserted, index + count)` holds no values;
            // the tail behind it moves down to close the hole.
            unsafe {
                let base = self.base_ptr();
                let tail = self.len - index - count;
                ptr::copy(
                    base.add(index + count),
                    base.add(index + inserted),
                    tail,
                );
            }
            self.len -= count - inserted;
        }
    }

    /// Clone `items` in before `pos`.
    pub fn insert_slice<P>(&mut self, pos: P, items: &[T]) -> Cursor<T>
    where
        P: Into<ConstCursor<T>>,
        T: Clone,
    {
        self.insert_iter(pos, items.iter().cloned())
    }

    /// Destroy the element at `pos` and close the gap; returns a cursor to
    /// the element that now occupies its slot (or `end()`).
    pub fn erase<P>(&mut self, pos: P) -> Cursor<T>
    where
        P: Into<ConstCursor<T>>,
    {
        let first: ConstCursor<T> = pos.into();
        assert!(
            first.index() < self.len,
            "erase() at index {} of a Vector with len {}",
            first.index(),
            self.len
        );
        self.erase_range(first, first + 1)
    }

    /// Destroy `[first, last)` and move the tail down; returns a cursor to
    /// the slot at `first`.
    pub fn erase_range<P, Q>(&mut self, first: P, last: Q) -> Cursor<T>
    where
        P: Into<ConstCursor<T>>,
        Q: Into<ConstCursor<T>>,
    {
        let start = self.offset_of(first.into());
        let end = self.offset_of(last.into());
        assert!(start <= end, "erase range starts at {start} after its end {end}");
        let old_len = self.len;
        // A panicking destructor leaks the tail rather than dropping twice.
        self.len = start;
        // SAFETY: `[start, end)` is live and excluded from `len`; the tail
        // `[end, old_len)` is moved as one block.
        unsafe {
            self.destroy_range(start, end);
            let base = self.base_ptr();
            ptr::copy(base.add(end), base.add(start), old_len - end);
        }
        self.len = old_len - (end - start);
        self.cursor_at(start)
    }

    /// Exchange buffers, lengths, capacities and allocators in O(1).
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    // ---- cursors ----

    pub fn begin(&self) -> Cursor<T> {
        self.cursor_at(0)
    }

    pub fn end(&self) -> Cursor<T> {
        self.cursor_at(self.len)
    }

    pub fn cbegin(&self) -> ConstCursor<T> {
        ConstCursor::new(self.data(), 0, self.generation)
    }

    pub fn cend(&self) -> ConstCursor<T> {
        ConstCursor::new(self.data(), self.len, self.generation)
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    pub(crate) fn is_current(&self, base: *const T, generation: u32) -> bool {
        base == self.data() && generation == self.generation
    }

    // ---- internals ----

    fn cursor_at(&self, index: usize) -> Cursor<T> {
        Cursor::new(self.data(), index, self.generation)
    }

    fn offset_of(&self, pos: ConstCursor<T>) -> usize {
        let index = pos.resolve(self);
        assert!(
            index <= self.len,
            "cursor at index {index} is past the end of a Vector with len {}",
            self.len
        );
        index
    }

    fn base_ptr(&self) -> *mut T {
        self.ptr.unwrap_or(NonNull::dangling()).as_ptr()
    }

    fn grown_capacity(&self, required: usize) -> usize {
        let grown = match self.cap {
            0 => DEFAULT_CAPACITY,
            cap => cap.saturating_mul(GROWTH_FACTOR),
        };
        grown.max(required)
    }

    /// Make room for `additional` more elements using the growth rule.
    fn grow_for(&mut self, additional: usize) {
        let Some(required) = self.len.checked_add(additional) else {
            alloc_failure(ContainerError::CapacityOverflow {
                requested: usize::MAX,
            });
        };
        if required > self.cap {
            self.reallocate(self.grown_capacity(required));
        }
    }

    fn reallocate(&mut self, capacity: usize) {
        if let Err(e) = self.try_reallocate(capacity) {
            alloc_failure(e);
        }
    }

    /// Move the live elements into a fresh buffer of `capacity` slots.
    fn try_reallocate(&mut self, capacity: usize) -> Result<(), ContainerError> {
        debug_assert!(capacity >= self.len);
        let fresh = match capacity {
            0 => None,
            n => Some(self.alloc.allocate::<T>(n)?),
        };
        if let Some(dst) = fresh {
            // SAFETY: distinct allocations, both valid for `len` elements.
            unsafe { ptr::copy_nonoverlapping(self.base_ptr(), dst.as_ptr(), self.len) };
        }
        self.release_buffer();
        self.ptr = fresh;
        self.cap = capacity;
        self.generation = self.generation.wrapping_add(1);
        Ok(())
    }

    /// Return the buffer to the allocator without touching elements.
    fn release_buffer(&mut self) {
        if let Some(p) = self.ptr.take() {
            // SAFETY: `p` came from `allocate::<T>(self.cap)`.
            unsafe { self.alloc.deallocate(p, self.cap) };
        }
        self.cap = 0;
    }

    /// # Safety
    ///
    /// `len < cap`.
    unsafe fn push_unchecked(&mut self, value: T) {
        debug_assert!(self.len < self.cap);
        self.base_ptr().add(self.len).write(value);
        self.len += 1;
    }

    /// Shift `[index, len)` up by `count`, then fill the opened slots from
    /// `fill` until it returns `None` or the gap is full. Returns the number
    /// of slots written; `len` covers the whole gap afterwards.
    fn splice_in<F>(&mut self, index: usize, count: usize, mut fill: F) -> usize
    where
        F: FnMut() -> Option<T>,
    {
        self.grow_for(count);
        let old_len = self.len;
        // A panic in `fill` leaks the tail rather than dropping it twice.
        self.len = index;
        let mut written = 0;
        // SAFETY: capacity covers `old_len + count`; the tail moves as one
        // block and each gap slot is written at most once.
        unsafe {
            let base = self.base_ptr();
            ptr::copy(base.add(index), base.add(index + count), old_len - index);
            while written < count {
                match fill() {
                    Some(v) => base.add(index + written).write(v),
                    None => break,
                }
                written += 1;
            }
        }
        self.len = old_len + count;
        written
    }

    /// Run destructors for `[start, end)` through the allocator.
    ///
    /// # Safety
    ///
    /// The range must be initialized and already excluded from `len`.
    unsafe fn destroy_range(&self, start: usize, end: usize) {
        if !mem::needs_drop::<T>() {
            return;
        }
        let base = self.base_ptr();
        for i in start..end {
            self.alloc.destroy(NonNull::new_unchecked(base.add(i)));
        }
    }
}

impl<T, A: Allocator> Drop for Vector<T, A> {
    fn drop(&mut self) {
        self.clear();
        self.release_buffer();
    }
}

impl<T> Default for Vector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, A: Allocator + Clone> Clone for Vector<T, A> {
    /// Deep copy into a buffer of the same capacity.
    fn clone(&self) -> Self {
        let mut out = Self::with_capacity_in(self.cap, self.alloc.clone());
        for item in self.iter() {
            // SAFETY: `out` has `self.cap >= self.len` slots.
            unsafe { out.push_unchecked(item.clone()) };
        }
        out
    }

    /// Destroy the current elements, then copy `source`'s in, keeping this
    /// vector's allocator.
    fn clone_from(&mut self, source: &Self) {
        self.clear();
        self.reserve(source.cap);
        for item in source.iter() {
            // SAFETY: capacity was raised to at least `source.cap`.
            unsafe { self.push_unchecked(item.clone()) };
        }
    }
}

impl<T, A: Allocator> Deref for Vector<T, A> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, A: Allocator> DerefMut for Vector<T, A> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

/// Unchecked-by-contract access; panics on a bad index.
impl<T, A: Allocator> Index<usize> for Vector<T, A> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<T, A: Allocator> IndexMut<usize> for Vector<T, A> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.as_mut_slice()[index]
    }
}

impl<T: PartialEq, A: Allocator, B: Allocator> PartialEq<Vector<T, B>> for Vector<T, A> {
    fn eq(&self, other: &Vector<T, B>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, A: Allocator> Eq for Vector<T, A> {}

impl<T: fmt::Debug, A: Allocator> fmt::Debug for Vector<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T, A: Allocator> Extend<T> for Vector<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.grow_for(lower);
        for item in iter {
            self.push_back(item);
        }
    }
}

impl<T, A: Allocator + Default> FromIterator<T> for Vector<T, A> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut v = Self::new_in(A::default());
        v.extend(iter);
        v
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a Vector<T, A> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a mut Vector<T, A> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
