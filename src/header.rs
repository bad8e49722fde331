use bitflags::bitflags;

/// The size of a block header in bytes
pub const HEADER_SIZE: usize = 8;

/// Every payload size and every payload offset is a multiple of this
pub const ALIGNMENT: usize = 8;

/// The smallest payload a free block split off from a larger one may have
pub const MIN_PAYLOAD: usize = ALIGNMENT;

bitflags! {
    /// The header in front of every payload. The 3 least significant bits are unused for the
    /// size since it will always be a multiple of 8, instead we store the block status there.
    ///
    /// An all zero header reads as a free block of size 0, which only exists on an arena
    /// that has never been initialized.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    #[repr(transparent)]
    pub(crate) struct BlockHeader: u64 {
        /// The block is handed out to a caller
        const IN_USE = 0b1;
    }
}

impl BlockHeader {
    /// Mask over the bits that hold the status flags
    const STATUS_MASK: u64 = (ALIGNMENT - 1) as u64;

    /// Create a new block header
    pub fn new(size: usize, in_use: bool) -> Self {
        debug_assert!(size % ALIGNMENT == 0);
        // the low bits are masked off so the size can never leak into the status
        let mut header = Self::from_bits_retain(size as u64 & !Self::STATUS_MASK);
        header.set(Self::IN_USE, in_use);
        header
    }

    /// Returns the size of the payload (without taking into account the header), will always be a multiple of 8
    pub fn size(&self) -> usize {
        (self.bits() & !Self::STATUS_MASK) as usize
    }

    /// Same status, different payload size
    pub fn with_size(self, size: usize) -> Self {
        Self::new(size, self.is_in_use())
    }

    pub fn is_in_use(&self) -> bool {
        self.contains(Self::IN_USE)
    }

    pub fn is_free(&self) -> bool {
        !self.is_in_use()
    }

    pub fn set_in_use(&mut self, in_use: bool) {
        self.set(Self::IN_USE, in_use);
    }

    /// True for the all zero word of an arena that was never initialized
    pub fn is_blank(&self) -> bool {
        self.bits() == 0
    }
}

/// Offset of the payload that belongs to the header at `offset`
pub(crate) const fn payload_offset(offset: usize) -> usize {
    offset + HEADER_SIZE
}

/// Offset of the header following the block at `offset`, `None` if a corrupted size overflows
pub(crate) fn next_offset(offset: usize, header: BlockHeader) -> Option<usize> {
    payload_offset(offset).checked_add(header.size())
}

/// Round up to the next multiple of 8, `None` if that overflows
pub(crate) fn align_up(value: usize) -> Option<usize> {
    Some(value.checked_add(ALIGNMENT - 1)? & !(ALIGNMENT - 1))
}
