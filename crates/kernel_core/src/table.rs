use core::mem;

use hal::{ContextPtr, Errno};

use crate::frame::TrapFrame;
use crate::kstack::KernelStack;
use crate::pmm::PageAllocator;
use crate::process::{AddressSpace, Embryo, Pid, Process, Slot, MAX_PROC};
use crate::switch::Trampoline;

/// Fixed-capacity registry of process control blocks, indexed by pid.
pub struct ProcessTable<P: PageAllocator> {
    slots: [Slot; MAX_PROC],
    pages: P,
}

impl<P: PageAllocator> ProcessTable<P> {
    /// Creates a table with every slot free.
    pub fn new(pages: P) -> Self {
        Self {
            slots: Default::default(),
            pages,
        }
    }

    /// Returns the index of the first free slot.
    pub fn allocate_slot(&self) -> Option<usize> {
        self.slots.iter().position(Slot::is_free)
    }

    /// Claims a slot, gives it a kernel stack and fabricates its first resumption.
    ///
    /// The slot stays an embryo until it is finalized; the scheduler skips it.
    pub fn create_process(&mut self, trampoline: Trampoline) -> Result<Pid, Errno> {
        let Some(index) = self.allocate_slot() else {
            log::warn!("no free process slots");
            return Err(Errno::NoFreeSlot);
        };
        let Some(page) = self.pages.allocate_page() else {
            log::warn!("out of memory for the kernel stack of slot {}", index);
            return Err(Errno::NoMem);
        };

        let pid = Pid::from_index(index);
        let mut kstack = KernelStack::new(page);
        let continuation = kstack.install_trampoline(trampoline);
        self.slots[index] = Slot::Embryo(Embryo {
            pid,
            kstack,
            continuation,
        });
        Ok(pid)
    }

    /// Finishes an embryo as the first user process.
    pub fn finalize_as_init(&mut self, pid: Pid, space: AddressSpace) -> Result<(), Errno> {
        self.finalize(pid, space, |tf| *tf = TrapFrame::init_image())
    }

    /// Finishes an embryo as the child of a fork.
    ///
    /// The child resumes with the parent's registers and a return value of 0.
    pub fn finalize_as_fork(
        &mut self,
        pid: Pid,
        parent_tf: &TrapFrame,
        space: AddressSpace,
    ) -> Result<(), Errno> {
        self.finalize(pid, space, |tf| {
            *tf = *parent_tf;
            tf.set_return_value(0);
        })
    }

    fn finalize(
        &mut self,
        pid: Pid,
        space: AddressSpace,
        image: impl FnOnce(&mut TrapFrame),
    ) -> Result<(), Errno> {
        let slot = self.slots.get_mut(pid.index()).ok_or(Errno::NotFound)?;
        match mem::take(slot) {
            Slot::Embryo(mut embryo) => {
                image(embryo.kstack.trapframe_mut());
                *slot = Slot::Runnable(embryo.into_runnable(space));
                Ok(())
            }
            other => {
                *slot = other;
                Err(Errno::InvalidArg)
            }
        }
    }

    /// Releases an embryo that could not be finished. Runnable slots are kept.
    pub fn abandon(&mut self, pid: Pid) {
        if let Some(slot @ Slot::Embryo(_)) = self.slots.get_mut(pid.index()) {
            *slot = Slot::Free;
        }
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Returns the process in `pid`'s slot if it is runnable.
    pub fn runnable(&self, pid: Pid) -> Option<&Process> {
        match self.slots.get(pid.index()) {
            Some(Slot::Runnable(process)) => Some(process),
            _ => None,
        }
    }

    pub fn runnable_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        match self.slots.get_mut(pid.index()) {
            Some(Slot::Runnable(process)) => Some(process),
            _ => None,
        }
    }

    /// Returns the trapframe of a claimed slot.
    pub fn trapframe(&self, pid: Pid) -> Option<&TrapFrame> {
        self.slots
            .get(pid.index())
            .and_then(Slot::kstack)
            .map(KernelStack::trapframe)
    }

    /// Returns the trapframe of a runnable process for the trap path.
    ///
    /// This is the frame `alltraps` built on the process's kernel stack and
    /// the one `trapret` pops when the process resumes.
    pub fn trapframe_mut(&mut self, pid: Pid) -> Option<&mut TrapFrame> {
        self.runnable_mut(pid)
            .map(|process| process.kstack.trapframe_mut())
    }

    /// Marks a runnable process as suspended and returns the slot its saved
    /// stack pointer goes into.
    pub fn suspend_slot(&mut self, pid: Pid) -> Option<&mut ContextPtr> {
        self.runnable_mut(pid)
            .map(|process| process.continuation.suspend_slot())
    }

    pub fn runnable_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_runnable()).count()
    }

    pub fn used_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_free()).count()
    }

    pub fn pages(&self) -> &P {
        &self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::INIT_ENTRY;
    use crate::kstack::{CONTEXT_OFFSET, TRAPFRAME_OFFSET};
    use crate::pmm::HeapPages;
    use crate::switch::Continuation;
    use crate::testing::{simulate_first_entry, TRAMPOLINE};
    use core::mem::size_of;
    use hal::PAGE_SIZE;

    fn table() -> ProcessTable<HeapPages> {
        ProcessTable::new(HeapPages::new())
    }

    #[test]
    fn capacity_is_exactly_max_proc() {
        let mut table = table();
        for expected in 0..MAX_PROC {
            let pid = table.create_process(TRAMPOLINE).expect("slot should be free");
            assert_eq!(pid.index(), expected);
        }
        assert_eq!(table.pages().allocated(), MAX_PROC);

        assert_eq!(table.create_process(TRAMPOLINE), Err(Errno::NoFreeSlot));
        assert_eq!(table.pages().allocated(), MAX_PROC);
        assert_eq!(table.allocate_slot(), None);
    }

    #[test]
    fn out_of_memory_leaves_slot_free() {
        let mut table = ProcessTable::new(HeapPages::with_limit(1));
        table.create_process(TRAMPOLINE).expect("first page fits");
        assert_eq!(table.create_process(TRAMPOLINE), Err(Errno::NoMem));
        assert_eq!(table.allocate_slot(), Some(1));
        assert_eq!(table.used_count(), 1);
    }

    #[test]
    fn created_slot_layout_fits_its_page() {
        let mut table = table();
        for _ in 0..3 {
            let pid = table.create_process(TRAMPOLINE).expect("slot should be free");
            let kstack = table.slot(pid.index()).and_then(Slot::kstack).expect("claimed");
            let base = kstack.base();
            let ctx = kstack.context_addr();
            let tf = kstack.trapframe_addr();
            assert!(base <= ctx && ctx < tf && tf < base + PAGE_SIZE);
            assert!(tf + size_of::<TrapFrame>() <= base + PAGE_SIZE);
            assert_eq!(ctx - base, CONTEXT_OFFSET);
            assert_eq!(tf - base, TRAPFRAME_OFFSET);
        }
    }

    #[test]
    fn created_slot_is_not_runnable() {
        let mut table = table();
        let pid = table.create_process(TRAMPOLINE).expect("slot should be free");
        assert!(table.runnable(pid).is_none());
        assert_eq!(table.runnable_count(), 0);
        assert_eq!(table.used_count(), 1);
    }

    #[test]
    fn finalize_as_init_installs_user_image() {
        let mut table = table();
        let pid = table.create_process(TRAMPOLINE).expect("slot should be free");
        table
            .finalize_as_init(pid, AddressSpace { root: 0x9000 })
            .expect("embryo should finalize");

        let process = table.runnable(pid).expect("runnable");
        assert_eq!(process.pid, pid);
        assert_eq!(process.space.root, 0x9000);
        assert_eq!(process.kstack.trapframe(), &TrapFrame::init_image());
        assert!(matches!(process.continuation, Continuation::Bootstrap(_)));
    }

    #[test]
    fn init_process_first_entry_reaches_user_mode() {
        let mut table = table();
        let pid = table.create_process(TRAMPOLINE).expect("slot should be free");
        table
            .finalize_as_init(pid, AddressSpace { root: 0x9000 })
            .expect("embryo should finalize");
        let process = table.runnable(pid).expect("runnable");

        let entry = simulate_first_entry(&process.kstack, process.continuation.context());
        assert_eq!(entry.eip, INIT_ENTRY);
        assert_eq!(entry.cs, 0x1B);
        assert_eq!(entry.ss, 0x23);
        assert_eq!(entry.ds, 0x23);
        assert_eq!(entry.es, 0x23);
        assert_eq!(entry.eflags, 0x200);
        assert_eq!(entry.esp, PAGE_SIZE as u32);
    }

    #[test]
    fn finalize_as_fork_copies_parent_registers() {
        let mut table = table();
        let child = table.create_process(TRAMPOLINE).expect("slot should be free");
        let mut parent_tf = TrapFrame::init_image();
        parent_tf.eax = 5;
        parent_tf.ebx = 0x1234;
        parent_tf.eip = 0x40;

        table
            .finalize_as_fork(child, &parent_tf, AddressSpace { root: 0xA000 })
            .expect("embryo should finalize");

        let tf = table.trapframe(child).expect("claimed");
        assert_eq!(tf.eax, 0);
        assert_eq!(tf.ebx, 0x1234);
        assert_eq!(tf.eip, 0x40);
        assert_eq!(parent_tf.eax, 5);
    }

    #[test]
    fn trapframe_mut_writes_the_frame_on_the_kernel_stack() {
        let mut table = table();
        let pid = table.create_process(TRAMPOLINE).expect("slot should be free");
        assert!(table.trapframe_mut(pid).is_none());

        table
            .finalize_as_init(pid, AddressSpace { root: 0x1000 })
            .expect("embryo should finalize");
        table.trapframe_mut(pid).expect("runnable").set_return_value(7);

        let process = table.runnable(pid).expect("runnable");
        let entry = simulate_first_entry(&process.kstack, process.continuation.context());
        assert_eq!(entry.eax, 7);
        assert_eq!(table.trapframe(pid).map(|tf| tf.eax), Some(7));
    }

    #[test]
    fn finalize_rejects_non_embryo_slots() {
        let mut table = table();
        let free = Pid::from_index(4);
        assert_eq!(
            table.finalize_as_init(free, AddressSpace { root: 0 }),
            Err(Errno::InvalidArg)
        );
        assert!(table.slot(4).is_some_and(Slot::is_free));

        let pid = table.create_process(TRAMPOLINE).expect("slot should be free");
        table
            .finalize_as_init(pid, AddressSpace { root: 0x1000 })
            .expect("embryo should finalize");
        assert_eq!(
            table.finalize_as_init(pid, AddressSpace { root: 0x2000 }),
            Err(Errno::InvalidArg)
        );
        assert_eq!(table.runnable(pid).map(|p| p.space.root), Some(0x1000));

        let out_of_range = Pid::from_index(MAX_PROC);
        assert_eq!(
            table.finalize_as_init(out_of_range, AddressSpace { root: 0 }),
            Err(Errno::NotFound)
        );
    }

    #[test]
    fn abandon_frees_only_embryos() {
        let mut table = table();
        let embryo = table.create_process(TRAMPOLINE).expect("slot should be free");
        let runnable = table.create_process(TRAMPOLINE).expect("slot should be free");
        table
            .finalize_as_init(runnable, AddressSpace { root: 0x1000 })
            .expect("embryo should finalize");

        table.abandon(embryo);
        table.abandon(runnable);
        assert_eq!(table.allocate_slot(), Some(embryo.index()));
        assert!(table.runnable(runnable).is_some());
    }

    #[test]
    fn suspend_slot_only_for_runnable() {
        let mut table = table();
        let pid = table.create_process(TRAMPOLINE).expect("slot should be free");
        assert!(table.suspend_slot(pid).is_none());

        table
            .finalize_as_init(pid, AddressSpace { root: 0x1000 })
            .expect("embryo should finalize");
        *table.suspend_slot(pid).expect("runnable") = ContextPtr::new(0x77);
        assert_eq!(
            table.runnable(pid).map(|p| p.continuation),
            Some(Continuation::Suspended(ContextPtr::new(0x77)))
        );
    }
}
