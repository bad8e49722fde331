use core::alloc::{GlobalAlloc, Layout};
use core::ptr;
use log::error;

use crate::{BlockAllocator, Site, ALIGNMENT, DEFAULT_CAPACITY};

/// A [`BlockAllocator`] behind a lock, usable as the `#[global_allocator]`
///
/// ```no_run
/// use fixed_alloc::{Allocator, BlockAllocator, Locked};
///
/// #[global_allocator]
/// static ALLOCATOR: Allocator = Locked::new(BlockAllocator::new());
///
/// fn main() {}
/// ```
///
/// Failures are reported through `log`, so the installed logger must not allocate from this
/// same allocator.
pub type Allocator<const CAPACITY: usize = DEFAULT_CAPACITY> = Locked<BlockAllocator<CAPACITY>>;

/// Reported as the site of failures coming through [`GlobalAlloc`], the real caller is behind
/// the runtime's allocation shims
pub const GLOBAL_ALLOC_SITE: Site = Site::new("<global allocator>", 0);

/// Allows putting a type behind a Mutex
#[derive(Debug)]
pub struct Locked<T> {
    inner: spin::Mutex<T>,
}

impl<T> Locked<T> {
    /// Create a new Mutex locked type
    pub const fn new(inner: T) -> Self {
        Self {
            inner: spin::Mutex::new(inner),
        }
    }

    /// Get the interior
    pub fn lock(&self) -> spin::MutexGuard<'_, T> {
        self.inner.lock()
    }
}

unsafe impl<const CAPACITY: usize> GlobalAlloc for Allocator<CAPACITY> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            error!(
                "alignment {} is not supported, payloads are {ALIGNMENT} byte aligned",
                layout.align()
            );
            return ptr::null_mut();
        }
        // shared access only, outstanding payload pointers stay valid
        let heap = self.lock();
        heap.allocate(layout.size(), GLOBAL_ALLOC_SITE)
            .map_or(ptr::null_mut(), |ptr| ptr.as_ptr())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        let heap = self.lock();
        heap.deallocate(ptr, GLOBAL_ALLOC_SITE);
    }
}
