use alloc::boxed::Box;
use core::mem::size_of;

use bitflags::bitflags;

use crate::frame::{addr_word, KERNEL_DATA_SELECTOR};

/// i386 task-state segment.
///
/// Only `ss0`/`esp0` are consulted: software task switching is not used, the
/// CPU just reads the ring-0 stack from here when a ring-3 trap arrives.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStateSegment {
    pub prev_tss: u32,
    /// Stack pointer loaded on a transition to ring 0.
    pub esp0: u32,
    /// Stack segment loaded on a transition to ring 0.
    pub ss0: u32,
    pub esp1: u32,
    pub ss1: u32,
    pub esp2: u32,
    pub ss2: u32,
    pub cr3: u32,
    pub eip: u32,
    pub eflags: u32,
    pub eax: u32,
    pub ecx: u32,
    pub edx: u32,
    pub ebx: u32,
    pub esp: u32,
    pub ebp: u32,
    pub esi: u32,
    pub edi: u32,
    pub es: u32,
    pub cs: u32,
    pub ss: u32,
    pub ds: u32,
    pub fs: u32,
    pub gs: u32,
    pub ldt: u32,
    pub trap: u16,
    pub iomap_base: u16,
}

const _: () = assert!(size_of::<TaskStateSegment>() == 104);

bitflags! {
    /// Access byte of a GDT descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescriptorAccess: u8 {
        /// Set on a system descriptor, marks a TSS rather than an LDT.
        const ACCESSED = 1 << 0;
        /// Readable code / writable data; the busy bit on a TSS.
        const READ_WRITE = 1 << 1;
        const CONFORMING = 1 << 2;
        /// Executable segment; selects the 32-bit form of a TSS.
        const EXECUTABLE = 1 << 3;
        /// Code or data segment (clear for system descriptors).
        const SEGMENT = 1 << 4;
        const DPL_LOW = 1 << 5;
        const DPL_HIGH = 1 << 6;
        const PRESENT = 1 << 7;

        const RING3 = Self::DPL_LOW.bits() | Self::DPL_HIGH.bits();
    }
}

/// Access byte of an available 32-bit TSS reachable from ring 3.
pub const TSS_ACCESS: DescriptorAccess = DescriptorAccess::ACCESSED
    .union(DescriptorAccess::EXECUTABLE)
    .union(DescriptorAccess::RING3)
    .union(DescriptorAccess::PRESENT);

/// Encodes a byte-granular TSS descriptor for the GDT.
pub fn tss_descriptor(base: u32, limit: u32) -> u64 {
    let base = base as u64;
    let limit = limit as u64;
    (limit & 0xFFFF)
        | ((base & 0xFF_FFFF) << 16)
        | ((TSS_ACCESS.bits() as u64) << 40)
        | (((limit >> 16) & 0xF) << 48)
        | (((base >> 24) & 0xFF) << 56)
}

/// Privilege-transition state: the TSS the CPU reads the ring-0 stack from.
///
/// The record is boxed so its address, which the descriptor encodes, does
/// not change when the owner moves.
#[derive(Debug)]
pub struct PrivilegeTransition {
    tss: Box<TaskStateSegment>,
}

impl PrivilegeTransition {
    /// Creates a zeroed TSS with the kernel stack segment fixed.
    pub fn new() -> Self {
        let tss = TaskStateSegment {
            ss0: KERNEL_DATA_SELECTOR as u32,
            esp0: 0,
            ..TaskStateSegment::default()
        };
        Self { tss: Box::new(tss) }
    }

    /// Address of the TSS record.
    pub fn base(&self) -> u32 {
        addr_word(&*self.tss as *const TaskStateSegment as usize)
    }

    /// GDT descriptor for the TSS record.
    pub fn descriptor(&self) -> u64 {
        tss_descriptor(self.base(), size_of::<TaskStateSegment>() as u32)
    }

    /// Sets the stack the CPU switches to on the next ring-3 trap.
    pub fn set_kernel_stack(&mut self, top: u32) {
        self.tss.esp0 = top;
    }

    pub fn kernel_stack(&self) -> u32 {
        self.tss.esp0
    }

    pub fn record(&self) -> &TaskStateSegment {
        &self.tss
    }
}

impl Default for PrivilegeTransition {
    fn default() -> Self {
        Self::new()
    }
}
