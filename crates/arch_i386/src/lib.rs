#![no_std]

use core::arch::global_asm;

use hal::{ContextPtr, CpuOps};

mod gdt;
mod idt;
mod serial;

global_asm!(include_str!("switch.S"));
global_asm!(include_str!("trap.S"));

extern "C" {
    fn swtch(save: *mut ContextPtr, resume: ContextPtr);
    fn forkret();
    fn trapret();
}

pub use serial::{init_serial, serial_write_byte, serial_write_str};

// Trap frames, contexts and the TSS store kernel addresses in 32-bit fields.
const _: () = assert!(usize::BITS == 32);

/// Loads the GDT and IDT. The TSS descriptor is installed later by the scheduler.
pub fn init() {
    gdt::init();
    idt::init();
}

/// Busy-loop with the `hlt` instruction.
pub fn halt_loop() -> ! {
    loop {
        unsafe { x86::halt() };
    }
}

/// CPU operations backed by the i386 descriptor tables and `swtch`.
#[derive(Debug, Default)]
pub struct I386Cpu;

impl CpuOps for I386Cpu {
    fn install_tss(&mut self, descriptor: u64, selector: u16) {
        gdt::install_tss(descriptor, selector);
    }

    fn trampoline_entry(&self) -> u32 {
        forkret as usize as u32
    }

    fn trap_return(&self) -> u32 {
        trapret as usize as u32
    }

    unsafe fn switch_context(save: *mut ContextPtr, resume: ContextPtr) {
        // SAFETY: forwarded from the caller.
        unsafe { swtch(save, resume) };
    }
}
