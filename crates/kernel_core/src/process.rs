use core::fmt;

use hal::PagingRoot;

use crate::kstack::KernelStack;
use crate::switch::Continuation;

/// Maximum number of process slots.
pub const MAX_PROC: usize = 10;

/// Process identifier; always equal to the process's table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(usize);

impl Pid {
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }

    /// Value handed to user space in a register.
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address space metadata for a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpace {
    pub root: PagingRoot,
}

/// A claimed slot whose register image is not complete yet.
#[derive(Debug)]
pub struct Embryo {
    pub pid: Pid,
    pub kstack: KernelStack,
    pub continuation: Continuation,
}

impl Embryo {
    /// Finishes the slot with its address space, making it schedulable.
    pub fn into_runnable(self, space: AddressSpace) -> Process {
        Process {
            pid: self.pid,
            kstack: self.kstack,
            continuation: self.continuation,
            space,
        }
    }
}

/// Process control block of a schedulable process.
#[derive(Debug)]
pub struct Process {
    pub pid: Pid,
    pub kstack: KernelStack,
    pub continuation: Continuation,
    pub space: AddressSpace,
}

/// State of one process-table slot.
#[derive(Debug, Default)]
pub enum Slot {
    #[default]
    Free,
    /// Claimed by creation, never selected by the scheduler.
    Embryo(Embryo),
    Runnable(Process),
}

impl Slot {
    pub fn is_free(&self) -> bool {
        matches!(self, Slot::Free)
    }

    pub fn is_runnable(&self) -> bool {
        matches!(self, Slot::Runnable(_))
    }

    pub fn pid(&self) -> Option<Pid> {
        match self {
            Slot::Free => None,
            Slot::Embryo(embryo) => Some(embryo.pid),
            Slot::Runnable(process) => Some(process.pid),
        }
    }

    pub fn kstack(&self) -> Option<&KernelStack> {
        match self {
            Slot::Free => None,
            Slot::Embryo(embryo) => Some(&embryo.kstack),
            Slot::Runnable(process) => Some(&process.kstack),
        }
    }
}
