use alloc::alloc::{alloc_zeroed, Layout};
use alloc::boxed::Box;

use crate::kstack::StackPage;

/// Source of kernel stack pages.
pub trait PageAllocator {
    /// Allocates one zeroed page, or `None` when memory is exhausted.
    fn allocate_page(&mut self) -> Option<Box<StackPage>>;
}

/// Page allocator backed by the kernel heap, with an optional page budget.
#[derive(Debug, Default)]
pub struct HeapPages {
    limit: Option<usize>,
    allocated: usize,
}

impl HeapPages {
    /// Creates an allocator bounded only by the heap.
    pub fn new() -> Self {
        Self {
            limit: None,
            allocated: 0,
        }
    }

    /// Creates an allocator that hands out at most `limit` pages.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            allocated: 0,
        }
    }

    /// Returns the number of pages handed out so far.
    pub fn allocated(&self) -> usize {
        self.allocated
    }
}

impl PageAllocator for HeapPages {
    fn allocate_page(&mut self) -> Option<Box<StackPage>> {
        if self.limit.is_some_and(|limit| self.allocated >= limit) {
            return None;
        }
        let layout = Layout::new::<StackPage>();
        // SAFETY: `StackPage` has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) }.cast::<StackPage>();
        if ptr.is_null() {
            return None;
        }
        self.allocated += 1;
        // SAFETY: `ptr` was allocated with the layout of `StackPage` and an
        // all-zero `StackPage` is valid.
        Some(unsafe { Box::from_raw(ptr) })
    }
}
