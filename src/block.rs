use core::fmt;
use core::ptr::NonNull;
use log::{error, trace, warn};

use crate::arena::Arena;
use crate::header::{align_up, next_offset, payload_offset, BlockHeader, HEADER_SIZE, MIN_PAYLOAD};
use crate::{AllocatorError, Site, ALIGNMENT};

/// Capacity of the arena when none is given, in bytes
pub const DEFAULT_CAPACITY: usize = 4096 * 8;

/// A first fit allocator over one fixed size buffer it owns.
///
/// The buffer is tiled by blocks, each a header followed by its payload. The first allocation
/// turns the whole buffer into a single free block, allocations split free blocks and
/// deallocations merge neighbouring free blocks back together.
///
/// Returned pointers point into the allocator itself, so it must not be moved while any of
/// them are still in use. Put it in a `static`, a `Box` or some other stable place first.
///
/// Every operation takes `&self` so later calls never invalidate pointers handed out earlier.
/// The arena lives in an `UnsafeCell`, which keeps the allocator `!Sync`: share it between
/// threads through [`Locked`](crate::Locked).
pub struct BlockAllocator<const CAPACITY: usize = DEFAULT_CAPACITY> {
    arena: Arena<CAPACITY>,
}

/// A block as reported by [`BlockAllocator::blocks`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset of the header from the start of the arena
    pub offset: usize,
    /// Size of the payload, never including the header
    pub size: usize,
    /// Whether the block is handed out
    pub in_use: bool,
}

impl BlockInfo {
    /// Offset of the payload from the start of the arena
    pub fn payload_offset(&self) -> usize {
        payload_offset(self.offset)
    }
}

/// A summary of the arena, see [`BlockAllocator::usage`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    /// Number of blocks, free or not
    pub blocks: usize,
    /// Number of free blocks
    pub free_blocks: usize,
    /// Payload bytes handed out, including the padding of rounded up and unsplit blocks
    pub used_bytes: usize,
    /// Payload bytes in free blocks
    pub free_bytes: usize,
    /// Payload of the largest free block, the most a single allocation can get right now
    pub largest_free: usize,
}

impl<const CAPACITY: usize> BlockAllocator<CAPACITY> {
    const VALID_CAPACITY: () = assert!(
        CAPACITY % ALIGNMENT == 0 && CAPACITY >= HEADER_SIZE + MIN_PAYLOAD,
        "capacity must be a multiple of 8 large enough for one header and 8 bytes of payload"
    );

    /// Create a new allocator, the arena is set up lazily by the first allocation
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_CAPACITY;
        Self {
            arena: Arena::new(),
        }
    }

    /// Size of the arena in bytes, headers included
    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    /// The largest payload a single allocation can ever get
    pub const fn max_payload(&self) -> usize {
        CAPACITY - HEADER_SIZE
    }

    /// Allocate `size` bytes, reporting a failure to the log along with `site`.
    ///
    /// Returns `None` if the size is invalid or no free block is large enough.
    pub fn allocate(&self, size: usize, site: Site) -> Option<NonNull<u8>> {
        self.try_allocate(size)
            .inspect_err(|err| error!("{err} at {site}"))
            .ok()
    }

    /// Give back a pointer returned by [`allocate`](Self::allocate), reporting a failure to
    /// the log along with `site`. A failed call leaves every block as it was.
    pub fn deallocate(&self, ptr: *mut u8, site: Site) {
        if let Err(err) = self.try_deallocate(ptr) {
            error!("{err} at {site}");
        }
    }

    /// Allocate `size` bytes from the first free block large enough to hold them.
    ///
    /// The size is rounded up to a multiple of 8. When the rest of the chosen block can still
    /// hold a header and 8 bytes it is split off as a new free block, otherwise the whole block
    /// is handed out.
    pub fn try_allocate(&self, size: usize) -> Result<NonNull<u8>, AllocatorError> {
        let max = self.max_payload();
        if size == 0 || size > max {
            return Err(AllocatorError::InvalidSize {
                requested: size,
                max,
            });
        }
        // max is a multiple of 8 so rounding up cannot push us past it
        let size = align_up(size).ok_or(AllocatorError::InvalidSize {
            requested: size,
            max,
        })?;

        if self.arena.is_blank() {
            trace!("initializing arena of {CAPACITY} bytes");
            self.arena.set_header(0, BlockHeader::new(max, false));
        }

        let found = self
            .arena
            .walk()
            .find(|block| block.header.is_free() && block.header.size() >= size);
        let Some(block) = found else {
            if !self.arena.lines_up() {
                warn!("block chain runs past the arena end, only the blocks before it were searched");
            }
            return Err(AllocatorError::OutOfMemory { requested: size });
        };

        let mut header = block.header;
        let remaining = header.size() - size;
        if remaining >= HEADER_SIZE + MIN_PAYLOAD {
            let split = payload_offset(block.offset) + size;
            trace!(
                "splitting block at {:#X}: {size} bytes in use, {} free at {split:#X}",
                block.offset,
                remaining - HEADER_SIZE
            );
            header = header.with_size(size);
            self.arena
                .set_header(split, BlockHeader::new(remaining - HEADER_SIZE, false));
        }
        // otherwise the rest is too small for a block of its own and the caller gets the slack
        header.set_in_use(true);
        self.arena.set_header(block.offset, header);

        Ok(self.arena.payload_ptr(block.offset))
    }

    /// Free the block whose payload starts at `ptr`.
    ///
    /// The whole chain is walked and every run of adjacent free blocks is merged into its
    /// first block on the way, not just the neighbours of the freed one.
    pub fn try_deallocate(&self, ptr: *mut u8) -> Result<(), AllocatorError> {
        if ptr.is_null() {
            return Err(AllocatorError::NullPointerFree);
        }
        if self.arena.is_blank() {
            // nothing was ever handed out
            return Err(AllocatorError::PointerNotFound);
        }
        let target = self.arena.offset_of(ptr);

        // the chain is fine as long as it ends exactly on the arena end
        let mut cursor = 0;
        let mut run_start: Option<usize> = None;
        let mut found = false;
        let mut stale = false;
        while let Some(mut header) = self.arena.header_at(cursor) {
            let Some(next) = next_offset(cursor, header).filter(|&next| next <= CAPACITY) else {
                break;
            };

            if target == Some(payload_offset(cursor)) {
                if header.is_free() {
                    return Err(AllocatorError::DoubleFree {
                        offset: payload_offset(cursor),
                    });
                }
                header.set_in_use(false);
                self.arena.set_header(cursor, header);
                found = true;
            }

            if header.is_free() {
                stale |= target.is_some_and(|target| self.is_absorbed(target, cursor, next));
            }

            match run_start {
                Some(start) if header.is_free() => self.merge(start, next),
                _ => run_start = header.is_free().then_some(cursor),
            }
            cursor = next;
        }

        if cursor != CAPACITY {
            warn!("block chain does not line up with the arena end, stopped at {cursor:#X}");
        }

        match (found, target) {
            (true, _) => Ok(()),
            // freed once already and merged into the free block before it since
            (false, Some(offset)) if stale => Err(AllocatorError::DoubleFree { offset }),
            _ => Err(AllocatorError::PointerNotFound),
        }
    }

    /// True if `target` is the payload of a free block that was merged into the free block
    /// spanning `start..end`. Its old header is still there, inside the merged payload.
    fn is_absorbed(&self, target: usize, start: usize, end: usize) -> bool {
        let Some(offset) = target.checked_sub(HEADER_SIZE) else {
            return false;
        };
        if offset <= start || target >= end {
            return false;
        }
        self.arena.header_at(offset).is_some_and(|header| {
            header.is_free() && next_offset(offset, header).is_some_and(|next| next <= end)
        })
    }

    /// Grow the free block at `start` so that it ends at `end`, absorbing every block between
    fn merge(&self, start: usize, end: usize) {
        if end > CAPACITY || end < payload_offset(start) {
            warn!("refusing to merge {start:#X}..{end:#X}, it does not fit the arena");
            return;
        }
        let size = end - payload_offset(start);
        trace!("coalescing free blocks from {start:#X} into {size} bytes");
        self.arena.set_header(start, BlockHeader::new(size, false));
    }

    /// Every block in offset order
    pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        // a blank arena is a single free block once touched, report it as such
        let blank = self.arena.is_blank();
        let fresh = blank.then_some(BlockInfo {
            offset: 0,
            size: self.max_payload(),
            in_use: false,
        });
        let walk = (!blank)
            .then(|| self.arena.walk())
            .into_iter()
            .flatten()
            .map(|block| BlockInfo {
                offset: block.offset,
                size: block.header.size(),
                in_use: block.header.is_in_use(),
            });
        fresh.into_iter().chain(walk)
    }

    /// True if nothing is allocated, the whole arena is a single free block
    pub fn is_pristine(&self) -> bool {
        let mut blocks = self.blocks();
        matches!(
            (blocks.next(), blocks.next()),
            (Some(BlockInfo { in_use: false, size, .. }), None) if size == self.max_payload()
        )
    }

    /// Count blocks and bytes over the whole arena
    pub fn usage(&self) -> Usage {
        self.blocks().fold(Usage::default(), |mut usage, block| {
            usage.blocks += 1;
            if block.in_use {
                usage.used_bytes += block.size;
            } else {
                usage.free_blocks += 1;
                usage.free_bytes += block.size;
                usage.largest_free = usage.largest_free.max(block.size);
            }
            usage
        })
    }
}

impl<const CAPACITY: usize> Default for BlockAllocator<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> fmt::Debug for BlockAllocator<CAPACITY> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // we want a better debug for this type
        #[derive(Debug)]
        #[allow(dead_code)]
        struct Block {
            offset: Hex,
            size: usize,
            in_use: bool,
        }

        struct Hex(usize);

        impl fmt::Debug for Hex {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#X}", self.0)
            }
        }

        f.debug_list()
            .entries(self.blocks().map(|block| Block {
                offset: Hex(block.offset),
                size: block.size,
                in_use: block.in_use,
            }))
            .finish()
    }
}
