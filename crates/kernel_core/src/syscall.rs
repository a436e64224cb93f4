use hal::Errno;

/// Number of syscall numbers the table can hold.
pub const MAX_SYSCALLS: usize = 32;
/// Most arguments a syscall can take (`ebx`, `ecx`, `edx`, `esi`, `edi`).
pub const MAX_SYSCALL_ARGS: usize = 5;

/// Syscalls provided by the process core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Fork,
}

impl Syscall {
    pub const fn number(self) -> u32 {
        match self {
            Syscall::Fork => 5,
        }
    }

    pub const fn from_number(number: u32) -> Option<Self> {
        match number {
            5 => Some(Syscall::Fork),
            _ => None,
        }
    }
}

/// Syscall handler: gets the caller's context and the arguments gathered
/// from registers. The dispatcher writes the result back into `eax`.
pub type SyscallHandler<K> = fn(&mut K, &[u32]) -> Result<u32, Errno>;

/// One registered syscall.
pub struct SyscallEntry<K> {
    pub handler: SyscallHandler<K>,
    pub arg_count: usize,
}

impl<K> Clone for SyscallEntry<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for SyscallEntry<K> {}

impl<K> SyscallEntry<K> {
    /// Runs the handler with the first `arg_count` register arguments.
    pub fn call(&self, ctx: &mut K, args: &[u32; MAX_SYSCALL_ARGS]) -> Result<u32, Errno> {
        let count = self.arg_count.min(MAX_SYSCALL_ARGS);
        (self.handler)(ctx, &args[..count])
    }
}

/// Syscall number to handler table.
pub struct SyscallTable<K> {
    entries: [Option<SyscallEntry<K>>; MAX_SYSCALLS],
}

impl<K> SyscallTable<K> {
    pub fn new() -> Self {
        Self {
            entries: [None; MAX_SYSCALLS],
        }
    }

    /// Registers `handler` under `number`, replacing any previous entry.
    pub fn register(
        &mut self,
        number: u32,
        handler: SyscallHandler<K>,
        arg_count: usize,
    ) -> Result<(), Errno> {
        if arg_count > MAX_SYSCALL_ARGS {
            return Err(Errno::InvalidArg);
        }
        let entry = self
            .entries
            .get_mut(number as usize)
            .ok_or(Errno::InvalidArg)?;
        *entry = Some(SyscallEntry { handler, arg_count });
        Ok(())
    }

    pub fn lookup(&self, number: u32) -> Option<SyscallEntry<K>> {
        self.entries.get(number as usize).copied().flatten()
    }

    pub fn is_registered(&self, number: u32) -> bool {
        self.lookup(number).is_some()
    }

    /// Looks up the syscall registered under `number`.
    ///
    /// The entry is returned by value so the caller can run it against a
    /// context that owns this table.
    pub fn entry_for(&self, number: u32) -> Result<SyscallEntry<K>, Errno> {
        self.lookup(number).ok_or_else(|| {
            log::warn!("unknown syscall {}", number);
            Errno::NoSys
        })
    }
}

impl<K> Default for SyscallTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes a syscall result as the value left in `eax`.
pub fn encode_result(result: Result<u32, Errno>) -> u32 {
    match result {
        Ok(value) => value,
        Err(err) => err.code() as u32,
    }
}
