#![no_std]
#![feature(alloc_error_handler)]

extern crate alloc;

use arch_i386 as arch;

pub mod allocator;
pub mod console;
pub mod devices;
pub mod logger;
pub mod memory;
pub mod sched;

use kernel_core::{HeapPages, Scheduler};

use crate::memory::ExternalMemory;

/// Kernel entrypoint invoked by the boot code.
pub fn entry() -> ! {
    console::init_early();
    logger::init();
    allocator::init_heap();
    arch::init();
    kprintln!("kernel: entry");

    let Some(scheduler) = sched::install(Scheduler::new(
        ExternalMemory,
        arch::I386Cpu,
        HeapPages::new(),
        devices::handlers(),
    )) else {
        kprintln!("kernel: scheduler already installed");
        arch::halt_loop();
    };
    // SAFETY: the only reference to the scheduler ends with this statement.
    if let Err(err) = unsafe { (*scheduler).init() } {
        kprintln!("kernel: cannot start scheduler ({:?})", err);
        arch::halt_loop();
    }
    // SAFETY: `scheduler` came from `install` and nothing borrows it.
    unsafe { sched::run(scheduler) }
}
