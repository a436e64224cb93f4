use core::alloc::Layout;
use core::ptr;

use kernel_core::{MAX_PROC, PAGE_SIZE};
use linked_list_allocator::LockedHeap;

/// Room for one page-aligned kernel stack per process slot. Aligning a page
/// inside the heap can cost up to one more page.
const KSTACK_BYTES: usize = MAX_PROC * 2 * PAGE_SIZE;
/// TSS, syscall table, boxed scheduler state and log formatting.
const HEADROOM: usize = 16 * PAGE_SIZE;
const HEAP_SIZE: usize = KSTACK_BYTES + HEADROOM;

const _: () = assert!(HEAP_SIZE % PAGE_SIZE == 0);

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

#[link_section = ".bss.heap"]
static mut HEAP_SPACE: [u8; HEAP_SIZE] = [0; HEAP_SIZE];

/// Hands the static heap region to the allocator. Called once at boot,
/// before the first kernel stack is allocated.
pub fn init_heap() {
    let start = ptr::addr_of_mut!(HEAP_SPACE).cast::<u8>();
    // SAFETY: the region is reserved for the heap and initialized once.
    unsafe { ALLOCATOR.lock().init(start, HEAP_SIZE) };
    log::debug!(
        "heap: {} KiB for {} process slots",
        HEAP_SIZE / 1024,
        MAX_PROC
    );
}

#[alloc_error_handler]
fn alloc_error(layout: Layout) -> ! {
    log::error!(
        "heap exhausted allocating {} bytes (align {})",
        layout.size(),
        layout.align()
    );
    arch_i386::halt_loop()
}
