use core::ptr;

use hal::{AddressSpaceOps, ContextPtr, CpuOps, Errno};

use crate::frame::{addr_word, TSS_SELECTOR};
use crate::pmm::PageAllocator;
use crate::process::{AddressSpace, Pid, MAX_PROC};
use crate::switch::Trampoline;
use crate::syscall::{Syscall, SyscallHandler, SyscallTable};
use crate::table::ProcessTable;
use crate::trap::DeviceHandlers;
use crate::tss::PrivilegeTransition;
use crate::vmm::Vmm;

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Running,
}

/// Round-robin scheduler for a single CPU.
///
/// Control moves between the scheduler's own context and one process
/// context at a time. A process only gives the CPU back by yielding from
/// the trap dispatcher, which runs nested inside the loop's switch. The
/// loop, the trap path and the yield therefore take `*mut Self` and only
/// borrow the scheduler between switches.
pub struct Scheduler<A: AddressSpaceOps, C: CpuOps, P: PageAllocator> {
    pub(crate) table: ProcessTable<P>,
    pub(crate) vmm: Vmm<A>,
    pub(crate) cpu: C,
    pub(crate) tss: PrivilegeTransition,
    pub(crate) syscalls: SyscallTable<Scheduler<A, C, P>>,
    pub(crate) devices: DeviceHandlers,
    /// Process running on the CPU; only set between a switch-in and the
    /// matching return to the scheduler.
    pub(crate) current: Option<Pid>,
    /// Saved context of the scheduling loop while a process runs.
    pub(crate) scheduler_ctx: ContextPtr,
    pub(crate) phase: Phase,
}

impl<A: AddressSpaceOps, C: CpuOps, P: PageAllocator> Scheduler<A, C, P> {
    /// Creates a scheduler with an empty process table.
    pub fn new(memory: A, cpu: C, pages: P, devices: DeviceHandlers) -> Self {
        Self {
            table: ProcessTable::new(pages),
            vmm: Vmm::new(memory),
            cpu,
            tss: PrivilegeTransition::new(),
            syscalls: SyscallTable::new(),
            devices,
            current: None,
            scheduler_ctx: ContextPtr::NULL,
            phase: Phase::Init,
        }
    }

    /// Registers fork, loads the task register and starts the init process.
    ///
    /// An error here is fatal: there is nothing to schedule without init.
    pub fn init(&mut self) -> Result<Pid, Errno> {
        if self.phase != Phase::Init {
            return Err(Errno::InvalidArg);
        }
        self.syscalls
            .register(Syscall::Fork.number(), sys_fork::<A, C, P>, 0)?;
        self.cpu.install_tss(self.tss.descriptor(), TSS_SELECTOR);

        let pid = self.spawn_init().inspect_err(|err| {
            log::error!("cannot start the init process: {:?}", err);
        })?;
        self.phase = Phase::Running;
        log::info!("init process started as pid {}", pid);
        Ok(pid)
    }

    fn spawn_init(&mut self) -> Result<Pid, Errno> {
        let trampoline = self.trampoline();
        let pid = self.table.create_process(trampoline)?;
        let space = match self.vmm.create() {
            Ok(space) => space,
            Err(err) => {
                self.table.abandon(pid);
                return Err(err);
            }
        };
        self.table.finalize_as_init(pid, space)?;
        Ok(pid)
    }

    fn trampoline(&self) -> Trampoline {
        Trampoline {
            entry: self.cpu.trampoline_entry(),
            trap_return: self.cpu.trap_return(),
        }
    }

    /// Registers an additional syscall handler.
    pub fn register_syscall(
        &mut self,
        number: u32,
        handler: SyscallHandler<Self>,
        arg_count: usize,
    ) -> Result<(), Errno> {
        self.syscalls.register(number, handler, arg_count)
    }

    /// Runs the scheduling loop forever.
    ///
    /// # Safety
    ///
    /// `this` must point to a scheduler that outlives the loop, and no
    /// reference to it may be live while the loop runs: the process it
    /// switches into re-enters through [`Scheduler::trap`] with the same
    /// pointer. Single CPU only.
    pub unsafe fn run(this: *mut Self) -> ! {
        loop {
            // SAFETY: forwarded from the caller.
            unsafe { Self::run_pass(this) };
        }
    }

    /// Scans the table once in pid order, running every runnable process
    /// until it yields. Returns how many processes ran.
    ///
    /// # Safety
    ///
    /// Same contract as [`Scheduler::run`].
    pub unsafe fn run_pass(this: *mut Self) -> usize {
        // SAFETY: the read does not outlive the statement.
        if unsafe { (*this).phase } != Phase::Running {
            return 0;
        }
        let mut ran = 0;
        for index in 0..MAX_PROC {
            // SAFETY: forwarded from the caller.
            if unsafe { Self::run_process(this, Pid::from_index(index)) } {
                ran += 1;
            }
        }
        ran
    }

    unsafe fn run_process(this: *mut Self, pid: Pid) -> bool {
        // SAFETY: the borrow ends before the switch.
        let Some(resume) = (unsafe { &mut *this }).switch_in(pid) else {
            return false;
        };
        // SAFETY: `scheduler_ctx` lives as long as the scheduler and `resume`
        // came from trampoline installation or a yield. Nothing is borrowed
        // across the switch.
        unsafe {
            C::switch_context(ptr::addr_of_mut!((*this).scheduler_ctx), resume);
            (*this).switch_out();
        }
        true
    }

    /// Makes `pid` the current process: its kernel stack becomes the ring-0
    /// stack and its address space becomes active.
    pub(crate) fn switch_in(&mut self, pid: Pid) -> Option<ContextPtr> {
        let process = self.table.runnable(pid)?;
        let kstack_top = addr_word(process.kstack.top());
        let space = process.space;
        let resume = process.continuation.context();

        self.current = Some(pid);
        self.tss.set_kernel_stack(kstack_top);
        self.vmm.switch_as(&space);
        Some(resume)
    }

    pub(crate) fn switch_out(&mut self) {
        self.vmm.switch_kernel();
        self.current = None;
    }

    /// Gives the CPU back to the scheduler from the current process.
    ///
    /// Returns once the scheduler switches into this process again. Does
    /// nothing when no process is running.
    ///
    /// # Safety
    ///
    /// Same contract as [`Scheduler::run`]; called from the trap path of
    /// the current process.
    pub unsafe fn yield_cpu(this: *mut Self) {
        let (save, resume) = {
            // SAFETY: the borrow ends before the switch.
            let scheduler = unsafe { &mut *this };
            let Some(pid) = scheduler.current else {
                return;
            };
            let Some(save) = scheduler.table.suspend_slot(pid) else {
                return;
            };
            (save as *mut ContextPtr, scheduler.scheduler_ctx)
        };
        // SAFETY: the save slot lives in the process table for the life of
        // the process, and `resume` was stored by the scheduler's own switch.
        unsafe { C::switch_context(save, resume) };
    }

    /// Clones the current process.
    ///
    /// The child gets a copy of the parent's address space and of the
    /// trapframe on the parent's kernel stack, with 0 as the syscall result.
    /// Returns the child's pid, which the syscall path hands to the parent.
    pub fn fork(&mut self) -> Result<Pid, Errno> {
        let parent = self.current.ok_or(Errno::NotFound)?;
        let process = self.table.runnable(parent).ok_or(Errno::NotFound)?;
        let parent_space = process.space;
        let parent_tf = *process.kstack.trapframe();

        let trampoline = self.trampoline();
        let child = self.table.create_process(trampoline)?;
        let space = match self.clone_space(&parent_space) {
            Ok(space) => space,
            Err(err) => {
                self.table.abandon(child);
                return Err(err);
            }
        };
        self.table.finalize_as_fork(child, &parent_tf, space)?;
        log::debug!("pid {} forked pid {}", parent, child);
        Ok(child)
    }

    fn clone_space(&mut self, parent: &AddressSpace) -> Result<AddressSpace, Errno> {
        let space = self.vmm.create()?;
        self.vmm.copy(parent, &space)?;
        Ok(space)
    }

    /// Returns the currently running process ID.
    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn table(&self) -> &ProcessTable<P> {
        &self.table
    }

    pub fn vmm(&self) -> &Vmm<A> {
        &self.vmm
    }

    pub fn vmm_mut(&mut self) -> &mut Vmm<A> {
        &mut self.vmm
    }

    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn tss(&self) -> &PrivilegeTransition {
        &self.tss
    }
}

fn sys_fork<A: AddressSpaceOps, C: CpuOps, P: PageAllocator>(
    scheduler: &mut Scheduler<A, C, P>,
    _args: &[u32],
) -> Result<u32, Errno> {
    scheduler.fork().map(Pid::as_u32)
}
