//! Error type shared by `Vector`, `HashedMap` and the allocators.

use std::error::Error;
use std::fmt;

/// Recoverable failures reported by the containers.
///
/// Precondition violations (`front` on an empty vector, dereferencing an
/// end cursor) are not represented here; they panic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContainerError {
    /// Checked index access past the live elements.
    OutOfRange {
        /// The requested index.
        index: usize,
        /// Number of live elements at the time of the call.
        len: usize,
    },
    /// Checked key lookup for a key that is not in the map.
    KeyNotFound,
    /// Insertion of a key that is already present.
    DuplicateKey,
    /// The requested slot count does not fit the address space.
    CapacityOverflow {
        /// Number of slots requested.
        requested: usize,
    },
    /// The allocator could not provide the requested block.
    AllocFailed {
        /// Size of the block in bytes.
        size: usize,
        /// Alignment of the block in bytes.
        align: usize,
    },
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { index, len } => {
                write!(f, "index out of range: index {index}, len {len}")
            }
            Self::KeyNotFound => f.write_str("key not found"),
            Self::DuplicateKey => f.write_str("key already present"),
            Self::CapacityOverflow { requested } => {
                write!(f, "capacity overflow: requested {requested} slots")
            }
            Self::AllocFailed { size, align } => {
                write!(
                    f,
                    "allocation failed: {size} bytes with alignment {align}"
                )
            }
        }
    }
}

impl Error for ContainerError {}
