use bitflags::bitflags;
use hal::PAGE_SIZE;

use crate::syscall::MAX_SYSCALL_ARGS;

/// Kernel code segment selector.
pub const KERNEL_CODE_SELECTOR: u16 = 0x08;
/// Kernel data/stack segment selector.
pub const KERNEL_DATA_SELECTOR: u16 = 0x10;
/// Ring-3 code segment selector (GDT index 3, RPL 3).
pub const USER_CODE_SELECTOR: u16 = 0x1B;
/// Ring-3 data segment selector (GDT index 4, RPL 3).
pub const USER_DATA_SELECTOR: u16 = 0x23;
/// Task-state segment selector (GDT index 5, RPL 3).
pub const TSS_SELECTOR: u16 = 0x2B;

/// Narrows a kernel address to a 32-bit register or TSS field.
///
/// Kernel addresses are 32 bits wide on the target; `arch_i386` asserts the
/// pointer width. Host builds keep the low half.
pub const fn addr_word(addr: usize) -> u32 {
    addr as u32
}

/// Entry address of the init program inside its address space.
pub const INIT_ENTRY: u32 = 0x10;
/// Initial user stack pointer of the init program: the top of its first page.
pub const INIT_USER_STACK: u32 = PAGE_SIZE as u32;

bitflags! {
    /// Bits of the EFLAGS register that the process core sets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EFlags: u32 {
        const INTERRUPT_ENABLE = 1 << 9;
    }
}

/// Register image saved on the kernel stack by a trap.
///
/// Field order is the order in memory, lowest address first: the `pushad`
/// block and segment registers pushed by `alltraps`, the vector number and
/// error code pushed by the vector stub, then the frame the CPU pushes on a
/// ring-3 to ring-0 transition.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapFrame {
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    /// `esp` as saved by `pushad`; ignored by `popad`.
    pub oesp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,

    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub trapno: u32,

    pub err: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,

    pub esp: u32,
    pub ss: u32,
}

impl TrapFrame {
    /// Register image that enters the init program in ring 3.
    pub fn init_image() -> Self {
        let user_data = USER_DATA_SELECTOR as u32;
        Self {
            cs: USER_CODE_SELECTOR as u32,
            ds: user_data,
            es: user_data,
            ss: user_data,
            eflags: EFlags::INTERRUPT_ENABLE.bits(),
            esp: INIT_USER_STACK,
            eip: INIT_ENTRY,
            ..Self::default()
        }
    }

    /// Syscall number the caller left in `eax`.
    pub fn syscall_number(&self) -> u32 {
        self.eax
    }

    /// Syscall arguments in register order.
    pub fn syscall_args(&self) -> [u32; MAX_SYSCALL_ARGS] {
        [self.ebx, self.ecx, self.edx, self.esi, self.edi]
    }

    pub fn set_return_value(&mut self, value: u32) {
        self.eax = value;
    }
}
