//! stl-container: a growable contiguous `Vector` with index-based cursors
//! and a separately chained `HashedMap`, both parameterized over a
//! pluggable element allocator.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: two single-threaded containers whose storage goes through one
//!   small allocator capability, so tests can observe every allocation,
//!   release and element destruction.
//! - Layers:
//!   - Allocator: `allocate`/`deallocate` raw slots and `destroy` one
//!     element. `Global` forwards to the global heap; `CountingAllocator`
//!     wraps another allocator and counts calls.
//!   - Vector<T, A>: contiguous buffer with geometric growth. Positions
//!     are `Cursor`/`ConstCursor` values (index plus buffer identity).
//!   - NodeArena<T, A>: generation-tagged slots with a free list, stored in
//!     a `Vector` so it shares the container's allocator.
//!   - HashedMap<K, V, H, A>: bucket heads stored in a `Vector`, overflow
//!     chains in a `NodeArena`; includes a debug-only guard against nested
//!     entry while a chain scan is running.
//!
//! Constraints
//! - Single-threaded: no internal synchronization.
//! - Growth policy: an empty buffer grows to `DEFAULT_CAPACITY`, otherwise
//!   capacity is multiplied by `GROWTH_FACTOR`, and never below what the
//!   caller asked for.
//! - Element destructors run exactly once, through `Allocator::destroy`,
//!   and only for types that need dropping.
//! - The map never rehashes on its own; `rehash` and `reserve` are the
//!   only operations that change the bucket count.
//!
//! Cursor invalidation
//! - A cursor holds no borrow. Any reallocation bumps the vector's
//!   generation, which makes older cursors stale; debug builds panic on a
//!   stale dereference. Access always goes through the vector and is
//!   bounds checked, so a stale cursor in release reads whatever now sits
//!   at its index rather than freed memory.
//!
//! Hasher and rehashing invariants
//! - A hasher produces any primitive integer (`HashValue`); it is widened
//!   to `u64` and stored with the entry. Rehashing redistributes by the
//!   stored hash and never calls the hasher again.
//!
//! Reentrancy policy
//! - Map operations call user code (`KeyHasher`, `Eq`) while chain links
//!   are being followed or rewritten. Each public entry point opens a
//!   debug-only scope and a nested entry panics. Removed entries are
//!   dropped after the scope closes.
//!
//! Notes and non-goals
//! - No automatic load-factor rehash on insert.
//! - No thread-safe variants and no fallible allocation beyond
//!   `Vector::try_reserve`.

pub mod alloc;
pub mod cursor;
mod debug_guard;
pub mod error;
pub mod hash;
pub mod hashed_map;
mod hashed_map_proptest;
mod node_arena;
pub mod vector;

// Public surface
pub use alloc::{AllocStats, Allocator, CountingAllocator, Global};
pub use cursor::{ConstCursor, Cursor, Position};
pub use error::ContainerError;
pub use hash::{DefaultHashBuilder, HashValue, KeyHasher};
pub use hashed_map::{HashedMap, Node, DEFAULT_BUCKET_COUNT, DEFAULT_MAX_LOAD_FACTOR};
pub use vector::{Vector, DEFAULT_CAPACITY, GROWTH_FACTOR};
