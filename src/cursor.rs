//! Index-based cursors into a `Vector`.
//!
//! A cursor names one slot of a vector's buffer by index and remembers the
//! buffer it was created for (base address plus the vector's reallocation
//! generation). It holds no borrow: reading or writing through it goes via
//! the vector, which bounds-checks the access. Any reallocation makes every
//! outstanding cursor stale; debug builds catch a stale dereference.
//!
//! `Cursor` carries mutation capability, `ConstCursor` is read-only. Both
//! are `Copy`, support pointer-style arithmetic, and compare by slot
//! identity.

use crate::alloc::Allocator;
use crate::vector::Vector;
use core::cmp::Ordering;
use core::fmt;
use core::ops::{Add, AddAssign, Sub, SubAssign};

/// Read-only interface shared by `Cursor` and `ConstCursor`.
pub trait Position: Copy {
    type Item;

    /// Offset of the named slot from the start of the buffer.
    fn index(&self) -> usize;

    /// Shared access to the element at this position.
    ///
    /// Panics if the position is at or past the end.
    fn get<'a, A: Allocator>(&self, vec: &'a Vector<Self::Item, A>) -> &'a Self::Item;
}

// Buffer identity plus offset. Raw base keeps cursors !Send/!Sync.
struct Slot<T> {
    base: *const T,
    index: usize,
    generation: u32,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Slot<T> {}

impl<T> Slot<T> {
    fn same_buffer(&self, other: &Self) -> bool {
        self.base == other.base && self.generation == other.generation
    }

    fn resolve<A: Allocator>(&self, vec: &Vector<T, A>) -> usize {
        debug_assert!(
            vec.is_current(self.base, self.generation),
            "stale cursor: the vector was reallocated after this cursor was created"
        );
        self.index
    }
}

/// Mutable cursor: read, write and navigate one slot of a `Vector`.
pub struct Cursor<T>(Slot<T>);

/// Read-only cursor: read and navigate one slot of a `Vector`.
pub struct ConstCursor<T>(Slot<T>);

macro_rules! cursor_common {
    ($name:ident) => {
        impl<T> $name<T> {
            pub(crate) fn new(base: *const T, index: usize, generation: u32) -> Self {
                $name(Slot {
                    base,
                    index,
                    generation,
                })
            }

            pub fn index(&self) -> usize {
                self.0.index
            }

            /// Move one slot forward (prefix `++`).
            pub fn inc(&mut self) -> &mut Self {
                self.0.index += 1;
                self
            }

            /// Move one slot backward (prefix `--`).
            pub fn dec(&mut self) -> &mut Self {
                self.0.index -= 1;
                self
            }

            pub fn get<'a, A: Allocator>(&self, vec: &'a Vector<T, A>) -> &'a T {
                &vec.as_slice()[self.0.resolve(vec)]
            }
        }

        impl<T> Position for $name<T> {
            type Item = T;

            fn index(&self) -> usize {
                self.0.index
            }

            fn get<'a, A: Allocator>(&self, vec: &'a Vector<T, A>) -> &'a T {
                $name::get(self, vec)
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }
        impl<T> Copy for $name<T> {}

        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                self.0.same_buffer(&other.0) && self.0.index == other.0.index
            }
        }
        impl<T> Eq for $name<T> {}

        impl<T> PartialOrd for $name<T> {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                if self.0.same_buffer(&other.0) {
                    Some(self.0.index.cmp(&other.0.index))
                } else {
                    None
                }
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("index", &self.0.index)
                    .field("generation", &self.0.generation)
                    .finish()
            }
        }

        impl<T> Add<usize> for $name<T> {
            type Output = Self;
            fn add(mut self, n: usize) -> Self {
                self.0.index += n;
                self
            }
        }

        impl<T> Sub<usize> for $name<T> {
            type Output = Self;
            fn sub(mut self, n: usize) -> Self {
                self.0.index -= n;
                self
            }
        }

        impl<T> AddAssign<usize> for $name<T> {
            fn add_assign(&mut self, n: usize) {
                self.0.index += n;
            }
        }

        impl<T> SubAssign<usize> for $name<T> {
            fn sub_assign(&mut self, n: usize) {
                self.0.index -= n;
            }
        }

        /// Signed distance between two positions of the same buffer.
        impl<T> Sub for $name<T> {
            type Output = isize;
            fn sub(self, other: Self) -> isize {
                debug_assert!(
                    self.0.same_buffer(&other.0),
                    "distance between cursors of different buffers"
                );
                self.0.index as isize - other.0.index as isize
            }
        }
    };
}

cursor_common!(Cursor);
cursor_common!(ConstCursor);

impl<T> Cursor<T> {
    /// Exclusive access to the element at this position.
    ///
    /// Panics if the position is at or past the end.
    pub fn get_mut<'a, A: Allocator>(&self, vec: &'a mut Vector<T, A>) -> &'a mut T {
        let i = self.0.resolve(vec);
        &mut vec.as_mut_slice()[i]
    }

    /// Drop the mutation capability.
    pub fn as_const(&self) -> ConstCursor<T> {
        ConstCursor(self.0)
    }
}

impl<T> ConstCursor<T> {
    pub(crate) fn resolve<A: Allocator>(&self, vec: &Vector<T, A>) -> usize {
        self.0.resolve(vec)
    }
}

impl<T> From<Cursor<T>> for ConstCursor<T> {
    fn from(c: Cursor<T>) -> Self {
        ConstCursor(c.0)
    }
}

impl<T> PartialEq<ConstCursor<T>> for Cursor<T> {
    fn eq(&self, other: &ConstCursor<T>) -> bool {
        self.0.same_buffer(&other.0) && self.0.index == other.0.index
    }
}

impl<T> PartialEq<Cursor<T>> for ConstCursor<T> {
    fn eq(&self, other: &Cursor<T>) -> bool {
        other == self
    }
}
