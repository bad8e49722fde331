use core::cell::UnsafeCell;
use core::ptr::NonNull;
use sptr::Strict;

use crate::header::{next_offset, payload_offset, BlockHeader, ALIGNMENT, HEADER_SIZE};

/// The backing buffer. Headers are addressed by byte offset, never by a pointer a caller handed in.
#[repr(C, align(8))]
pub(crate) struct Arena<const CAPACITY: usize> {
    bytes: UnsafeCell<[u8; CAPACITY]>,
}

impl<const CAPACITY: usize> Arena<CAPACITY> {
    pub const fn new() -> Self {
        Self {
            bytes: UnsafeCell::new([0; CAPACITY]),
        }
    }

    fn base(&self) -> *mut u8 {
        self.bytes.get().cast()
    }

    /// Read the header at `offset`, `None` if it would cross the end of the arena
    pub fn header_at(&self, offset: usize) -> Option<BlockHeader> {
        if !Self::holds_header(offset) {
            return None;
        }
        // Safety: the header lies inside the buffer and is 8 byte aligned since the buffer is
        // and `offset` is a multiple of 8
        let bits = unsafe { self.base().add(offset).cast::<u64>().read() };
        Some(BlockHeader::from_bits_retain(bits))
    }

    /// Overwrite the header at `offset`. Only ever called with offsets of blocks that fit.
    ///
    /// Writes go through the `UnsafeCell` from a shared borrow so pointers handed out
    /// earlier stay valid.
    pub fn set_header(&self, offset: usize, header: BlockHeader) {
        assert!(Self::holds_header(offset), "header at {offset:#X} is outside the arena");
        // Safety: same as `header_at`, and no reference into the buffer is ever created
        unsafe { self.base().add(offset).cast::<u64>().write(header.bits()) };
    }

    fn holds_header(offset: usize) -> bool {
        offset % ALIGNMENT == 0
            && offset
                .checked_add(HEADER_SIZE)
                .is_some_and(|end| end <= CAPACITY)
    }

    /// Pointer to the payload of the block whose header sits at `offset`
    pub fn payload_ptr(&self, offset: usize) -> NonNull<u8> {
        let payload = payload_offset(offset);
        debug_assert!(payload < CAPACITY);
        let base = self.base();
        let ptr = Strict::with_addr(base, Strict::addr(base) + payload);
        // Safety: `base` comes from a reference so it is never null, and adding an in bounds
        // offset keeps it that way
        unsafe { NonNull::new_unchecked(ptr) }
    }

    /// Turn a caller pointer back into an arena offset, `None` if it points outside the buffer
    pub fn offset_of(&self, ptr: *const u8) -> Option<usize> {
        let offset = Strict::addr(ptr).checked_sub(Strict::addr(self.base()))?;
        (offset < CAPACITY).then_some(offset)
    }

    /// True until the first allocation writes the initial block
    pub fn is_blank(&self) -> bool {
        self.header_at(0).is_some_and(|header| header.is_blank())
    }

    /// Walk the block chain from offset 0
    pub fn walk(&self) -> Walk<'_, CAPACITY> {
        Walk {
            arena: self,
            offset: Some(0),
        }
    }

    /// True if the block chain ends exactly on the arena end
    pub fn lines_up(&self) -> bool {
        let mut walk = self.walk();
        walk.by_ref().for_each(drop);
        walk.offset == Some(CAPACITY)
    }
}

/// A block as seen while walking the arena
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockView {
    pub offset: usize,
    pub header: BlockHeader,
}

/// Iterator over the block chain, stops at the arena end or before a block that would run
/// past it
pub(crate) struct Walk<'a, const CAPACITY: usize> {
    arena: &'a Arena<CAPACITY>,
    offset: Option<usize>,
}

impl<const CAPACITY: usize> Iterator for Walk<'_, CAPACITY> {
    type Item = BlockView;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offset?;
        let header = self.arena.header_at(offset)?;
        let next = next_offset(offset, header).filter(|&next| next <= CAPACITY)?;
        self.offset = Some(next);
        Some(BlockView { offset, header })
    }
}
