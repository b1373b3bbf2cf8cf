//! Hash capability for `HashedMap`.
//!
//! A hasher maps a key to an integral value. The integral requirement is a
//! trait bound (`HashValue` is sealed and implemented only for the
//! primitive integers), so a hasher returning anything else is rejected at
//! compile time. Every `BuildHasher` qualifies, producing `u64`.

use core::hash::{BuildHasher, Hash};

mod sealed {
    pub trait Sealed {}
}

/// Integral hash result.
pub trait HashValue: Copy + sealed::Sealed {
    /// Widen (or reinterpret) to the `u64` stored with each entry.
    fn to_u64(self) -> u64;
}

macro_rules! hash_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $t {}
            impl HashValue for $t {
                #[inline]
                fn to_u64(self) -> u64 {
                    self as u64
                }
            }
        )*
    };
}

hash_value!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

/// Deterministic hash function over keys of type `K`.
///
/// Equal keys must produce equal outputs. When a map is queried with a
/// borrowed form `Q` of its key type, the hasher must hash `Q` the same way
/// it hashes the owning `K`.
pub trait KeyHasher<K: ?Sized> {
    type Output: HashValue;

    fn hash_key(&self, key: &K) -> Self::Output;
}

impl<K, S> KeyHasher<K> for S
where
    K: ?Sized + Hash,
    S: BuildHasher,
{
    type Output = u64;

    #[inline]
    fn hash_key(&self, key: &K) -> u64 {
        self.hash_one(key)
    }
}

/// Default hasher of `HashedMap`.
pub type DefaultHashBuilder = hashbrown::hash_map::DefaultHashBuilder;

#[inline]
pub(crate) fn bucket_of(hash: u64, bucket_count: usize) -> usize {
    (hash % bucket_count as u64) as usize
}
