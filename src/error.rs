//! Allocator error types.

use core::error::Error;
use core::fmt;

/// Everything that can go wrong in an allocate or deallocate call.
///
/// None of these are fatal, the arena stays usable after any of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocatorError {
    /// Zero bytes, or more than the largest payload the arena can ever hold.
    InvalidSize {
        /// Number of bytes requested.
        requested: usize,
        /// Largest payload a fresh arena can hand out.
        max: usize,
    },
    /// The whole arena was scanned and no free block was large enough.
    OutOfMemory {
        /// Number of bytes requested, after rounding up to 8.
        requested: usize,
    },
    /// Deallocation was called with a null pointer.
    NullPointerFree,
    /// The block owning the pointer is already free.
    DoubleFree {
        /// Arena offset of the payload.
        offset: usize,
    },
    /// No block's payload starts at the pointer, it is foreign or the headers are corrupted.
    PointerNotFound,
}

impl fmt::Display for AllocatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSize { requested, max } => {
                write!(
                    f,
                    "invalid allocation size {requested} (must be between 1 and {max})"
                )
            }
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory when trying to allocate {requested} bytes")
            }
            Self::NullPointerFree => write!(f, "attempt to free a null pointer"),
            Self::DoubleFree { offset } => {
                write!(f, "double free of the block at offset {offset:#X}")
            }
            Self::PointerNotFound => write!(f, "pointer not found in allocated memory"),
        }
    }
}

impl Error for AllocatorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_values() {
        let err = AllocatorError::InvalidSize {
            requested: 0,
            max: 32760,
        };
        assert_eq!(
            err.to_string(),
            "invalid allocation size 0 (must be between 1 and 32760)"
        );
        assert_eq!(
            AllocatorError::DoubleFree { offset: 24 }.to_string(),
            "double free of the block at offset 0x18"
        );
    }
}
