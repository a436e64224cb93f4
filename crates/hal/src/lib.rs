#![cfg_attr(not(test), no_std)]

/// Physical address type (32-bit protected mode).
pub type PhysAddr = u32;

/// Root page directory of an address space, as handed out by the memory subsystem.
pub type PagingRoot = PhysAddr;

/// Size of a page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Common error codes used by kernel interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    /// Every process slot is in use.
    NoFreeSlot,
    NoMem,
    NotFound,
    InvalidArg,
    /// No handler is registered for the requested syscall number.
    NoSys,
}

impl Errno {
    /// Returns the negative value reported to user space for this error.
    pub const fn code(self) -> i32 {
        match self {
            Errno::NoFreeSlot => -1,
            Errno::NoMem => -2,
            Errno::NotFound => -3,
            Errno::InvalidArg => -4,
            Errno::NoSys => -5,
        }
    }
}

/// Saved kernel stack pointer of a suspended execution context.
///
/// The switch primitive stores the stack pointer of the context it leaves
/// into one of these and loads the one it resumes from another, so the
/// representation must stay a single machine word.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextPtr(usize);

impl ContextPtr {
    pub const NULL: Self = Self(0);

    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn addr(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Address-space operations provided by the memory subsystem.
pub trait AddressSpaceOps {
    /// Build a fresh user address space and return its root.
    fn create_user_space(&mut self) -> Result<PagingRoot, Errno>;

    /// Copy the user contents of `src` into `dst`.
    fn copy_user_space(&mut self, src: PagingRoot, dst: PagingRoot) -> Result<(), Errno>;

    /// Make the given user address space active.
    fn activate_user_space(&self, root: PagingRoot);

    /// Go back to the kernel-only address space.
    fn activate_kernel_space(&self);
}

/// CPU-level operations the process core needs from the architecture layer.
pub trait CpuOps {
    /// Write the task-state descriptor into the GDT and load the task register.
    fn install_tss(&mut self, descriptor: u64, selector: u16);

    /// Address a never-run context resumes at (returns straight away).
    fn trampoline_entry(&self) -> u32;

    /// Address of the trap-return path that pops a trapframe and enters user mode.
    fn trap_return(&self) -> u32;

    /// Save the running context into `save` and resume `resume`.
    ///
    /// Returns only when some other context switches back into `save`. Takes
    /// no receiver: the context that runs in between may re-enter the owner
    /// of the CPU, so nothing may stay borrowed across the call.
    ///
    /// # Safety
    ///
    /// `save` must be valid for writes until the saved context is resumed and
    /// `resume` must point at a context built by the switch primitive or by
    /// trampoline installation.
    unsafe fn switch_context(save: *mut ContextPtr, resume: ContextPtr);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_codes_are_negative_and_distinct() {
        let all = [
            Errno::NoFreeSlot,
            Errno::NoMem,
            Errno::NotFound,
            Errno::InvalidArg,
            Errno::NoSys,
        ];
        for (i, a) in all.iter().enumerate() {
            assert!(a.code() < 0);
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
        assert_eq!(Errno::NoFreeSlot.code(), -1);
    }

    #[test]
    fn context_ptr_null() {
        assert!(ContextPtr::NULL.is_null());
        assert!(!ContextPtr::new(0x1000).is_null());
        assert_eq!(ContextPtr::new(0x1000).addr(), 0x1000);
    }
}
