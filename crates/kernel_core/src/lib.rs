#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod frame;
pub mod kstack;
pub mod pmm;
pub mod process;
pub mod scheduler;
pub mod switch;
pub mod syscall;
pub mod table;
pub mod trap;
pub mod tss;
pub mod vmm;

#[cfg(test)]
pub(crate) mod testing;

pub use frame::{
    EFlags, TrapFrame, INIT_ENTRY, INIT_USER_STACK, KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR,
    TSS_SELECTOR, USER_CODE_SELECTOR, USER_DATA_SELECTOR,
};
pub use hal::{AddressSpaceOps, ContextPtr, CpuOps, Errno, PagingRoot, PAGE_SIZE};
pub use kstack::{KernelStack, StackPage, CONTEXT_OFFSET, RETURN_SLOT_OFFSET, TRAPFRAME_OFFSET};
pub use pmm::{HeapPages, PageAllocator};
pub use process::{AddressSpace, Embryo, Pid, Process, Slot, MAX_PROC};
pub use scheduler::{Phase, Scheduler};
pub use switch::{Context, Continuation, Trampoline};
pub use syscall::{encode_result, Syscall, SyscallHandler, SyscallTable};
pub use table::ProcessTable;
pub use trap::{DeviceHandlers, Trap, KEYBOARD_VECTOR, SYSCALL_VECTOR, UART_VECTOR};
pub use tss::{PrivilegeTransition, TaskStateSegment};
pub use vmm::Vmm;
