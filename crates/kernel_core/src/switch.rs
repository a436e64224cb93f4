use hal::ContextPtr;

/// Callee-saved registers and resume address kept on a suspended kernel stack.
///
/// Field order matches the pop order of the switch primitive: it pops
/// `edi`, `esi`, `ebx`, `ebp` and then returns to `eip`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    pub edi: u32,
    pub esi: u32,
    pub ebx: u32,
    pub ebp: u32,
    pub eip: u32,
}

impl Context {
    /// Context whose registers are all zero and which resumes at `eip`.
    pub const fn resuming_at(eip: u32) -> Self {
        Self {
            edi: 0,
            esi: 0,
            ebx: 0,
            ebp: 0,
            eip,
        }
    }
}

/// Code addresses used to fabricate the first resumption of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trampoline {
    /// Routine the fabricated context resumes at; it returns immediately.
    pub entry: u32,
    /// Trap-return path the entry routine returns into.
    pub trap_return: u32,
}

/// Where a process continues the next time the scheduler switches into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Never run. The stack holds a fabricated context that goes through the
    /// trampoline into the trap-return path.
    Bootstrap(ContextPtr),
    /// Suspended by a yield; resumes inside the trap dispatcher.
    Suspended(ContextPtr),
}

impl Continuation {
    /// Context the switch primitive restores to resume this process.
    pub fn context(&self) -> ContextPtr {
        match *self {
            Continuation::Bootstrap(ctx) | Continuation::Suspended(ctx) => ctx,
        }
    }

    /// Marks the process as suspended and returns the slot the switch
    /// primitive stores its stack pointer into.
    pub fn suspend_slot(&mut self) -> &mut ContextPtr {
        *self = Continuation::Suspended(self.context());
        match self {
            Continuation::Bootstrap(ctx) | Continuation::Suspended(ctx) => ctx,
        }
    }
}
