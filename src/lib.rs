//! A first fit allocator over one fixed size buffer
//!
//! Every block in the buffer is an 8 byte header holding the payload size and an in use bit,
//! followed directly by the payload. Blocks tile the whole buffer:
//!
//! ```text
//!   0                                                                   CAPACITY
//!   ┌────────┬──────────────┬────────┬────────┬────────┬────────────────────┐
//!   │ header │   payload    │ header │payload │ header │      payload       │
//!   │ 32, 1  │              │ 8, 0   │        │ 64, 1  │                    │
//!   └────────┴──────────────┴────────┴────────┴────────┴────────────────────┘
//! ```
//!
//! Allocation takes the first free block large enough and splits off the rest when it can
//! still hold a header and 8 bytes. Deallocation walks the chain, marks the block free and
//! merges every run of neighbouring free blocks, so no two free blocks are ever next to each
//! other.
//!
//! ```
//! use fixed_alloc::{site, BlockAllocator};
//!
//! let heap = Box::new(BlockAllocator::<1024>::new());
//! let ptr = heap.allocate(100, site!()).unwrap();
//! assert_eq!(heap.usage().used_bytes, 104);
//!
//! heap.deallocate(ptr.as_ptr(), site!());
//! assert!(heap.is_pristine());
//! ```
//!
//! Failures never panic. [`BlockAllocator::allocate`] and [`BlockAllocator::deallocate`] report
//! them through `log` together with the call [`Site`], the `try_` variants return an
//! [`AllocatorError`] instead.

#![cfg_attr(not(test), no_std)]
#![deny(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]
#![allow(unstable_name_collisions)]

mod arena;
/// The main allocator
mod block;
mod error;
mod header;
mod locked;
mod site;

pub use block::{BlockAllocator, BlockInfo, Usage, DEFAULT_CAPACITY};
pub use error::AllocatorError;
pub use header::{ALIGNMENT, HEADER_SIZE, MIN_PAYLOAD};
pub use locked::{Allocator, Locked, GLOBAL_ALLOC_SITE};
pub use site::Site;
