//! Mocks of the `hal` seams shared by unit tests.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;

use hal::{AddressSpaceOps, ContextPtr, CpuOps, Errno, PagingRoot, PAGE_SIZE};

use crate::kstack::{KernelStack, TRAPFRAME_OFFSET};
use crate::switch::Trampoline;

pub(crate) const TRAMPOLINE: Trampoline = Trampoline {
    entry: 0xC010_0000,
    trap_return: 0xC010_0040,
};

const USER_BYTES: usize = 16;
const SAVED_SP_BASE: usize = 0x5EED_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Activation {
    User(PagingRoot),
    Kernel,
}

/// Memory subsystem keeping a few bytes of user memory per address space.
#[derive(Debug, Default)]
pub(crate) struct MockMemory {
    spaces: BTreeMap<PagingRoot, Vec<u8>>,
    last_root: PagingRoot,
    activations: RefCell<Vec<Activation>>,
    pub fail_create: bool,
    pub fail_copy: bool,
}

impl MockMemory {
    pub fn write(&mut self, root: PagingRoot, offset: usize, byte: u8) {
        if let Some(bytes) = self.spaces.get_mut(&root) {
            bytes[offset] = byte;
        }
    }

    pub fn read(&self, root: PagingRoot, offset: usize) -> Option<u8> {
        self.spaces.get(&root).and_then(|bytes| bytes.get(offset).copied())
    }

    pub fn space_count(&self) -> usize {
        self.spaces.len()
    }

    pub fn activations(&self) -> Vec<Activation> {
        self.activations.borrow().clone()
    }
}

impl AddressSpaceOps for MockMemory {
    fn create_user_space(&mut self) -> Result<PagingRoot, Errno> {
        if self.fail_create {
            return Err(Errno::NoMem);
        }
        self.last_root += PAGE_SIZE as PagingRoot;
        self.spaces.insert(self.last_root, vec![0; USER_BYTES]);
        Ok(self.last_root)
    }

    fn copy_user_space(&mut self, src: PagingRoot, dst: PagingRoot) -> Result<(), Errno> {
        if self.fail_copy {
            return Err(Errno::NoMem);
        }
        let bytes = self.spaces.get(&src).cloned().ok_or(Errno::NotFound)?;
        let target = self.spaces.get_mut(&dst).ok_or(Errno::NotFound)?;
        *target = bytes;
        Ok(())
    }

    fn activate_user_space(&self, root: PagingRoot) {
        self.activations.borrow_mut().push(Activation::User(root));
    }

    fn activate_kernel_space(&self) {
        self.activations.borrow_mut().push(Activation::Kernel);
    }
}

/// One call of the switch primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Switch {
    /// Value stored into the save slot.
    pub saved: ContextPtr,
    pub resume: ContextPtr,
}

thread_local! {
    static SWITCHES: RefCell<Vec<Switch>> = const { RefCell::new(Vec::new()) };
    static ON_NEXT_SWITCH: RefCell<Option<Box<dyn FnOnce()>>> = const { RefCell::new(None) };
}

/// CPU whose switch primitive records the call and returns at once, as if
/// the resumed context had switched straight back.
///
/// The switch log is per test thread; creating a `MockCpu` clears it.
#[derive(Debug)]
pub(crate) struct MockCpu {
    pub tss: Option<(u64, u16)>,
}

impl Default for MockCpu {
    fn default() -> Self {
        SWITCHES.with(|switches| switches.borrow_mut().clear());
        ON_NEXT_SWITCH.with(|hook| hook.borrow_mut().take());
        Self { tss: None }
    }
}

impl MockCpu {
    pub fn switches() -> Vec<Switch> {
        SWITCHES.with(|switches| switches.borrow().clone())
    }

    /// Runs `body` inside the next switch, after its context is saved.
    ///
    /// Models the resumed context running and trapping back into the kernel
    /// before control returns to whoever switched. Switches made by `body`
    /// itself return at once.
    pub fn on_next_switch(body: impl FnOnce() + 'static) {
        ON_NEXT_SWITCH.with(|hook| *hook.borrow_mut() = Some(Box::new(body)));
    }
}

impl CpuOps for MockCpu {
    fn install_tss(&mut self, descriptor: u64, selector: u16) {
        self.tss = Some((descriptor, selector));
    }

    fn trampoline_entry(&self) -> u32 {
        TRAMPOLINE.entry
    }

    fn trap_return(&self) -> u32 {
        TRAMPOLINE.trap_return
    }

    unsafe fn switch_context(save: *mut ContextPtr, resume: ContextPtr) {
        let saved = SWITCHES.with(|switches| {
            let mut switches = switches.borrow_mut();
            let saved = ContextPtr::new(SAVED_SP_BASE + switches.len() * 0x10);
            switches.push(Switch { saved, resume });
            saved
        });
        // SAFETY: the caller guarantees `save` is valid for writes.
        unsafe { save.write(saved) };

        let body = ON_NEXT_SWITCH.with(|hook| hook.borrow_mut().take());
        if let Some(body) = body {
            body();
        }
    }
}

/// Registers and segments loaded by the `iret` that enters user mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UserEntry {
    pub eax: u32,
    pub ds: u32,
    pub es: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub esp: u32,
    pub ss: u32,
}

struct StackWalker<'a> {
    kstack: &'a KernelStack,
    sp: usize,
}

impl StackWalker<'_> {
    fn pop(&mut self) -> u32 {
        let word = self
            .kstack
            .word_at(self.sp)
            .expect("stack pointer left the kernel stack page");
        self.sp += 4;
        word
    }
}

/// Replays, word by word, what the CPU does on the first switch into a
/// never-run process: the switch primitive's pops and `ret`, the
/// trampoline's `ret`, then `trapret`'s `popad`, segment pops and `iret`.
pub(crate) fn simulate_first_entry(kstack: &KernelStack, ctx: ContextPtr) -> UserEntry {
    let mut walker = StackWalker {
        kstack,
        sp: ctx.addr() - kstack.base(),
    };

    for _ in 0..4 {
        walker.pop();
    }
    assert_eq!(walker.pop(), TRAMPOLINE.entry, "switch must return into the trampoline");
    assert_eq!(walker.pop(), TRAMPOLINE.trap_return, "trampoline must return into trapret");
    assert_eq!(walker.sp, TRAPFRAME_OFFSET, "trapret must start at the trapframe");

    let mut general = [0u32; 8];
    for reg in general.iter_mut() {
        *reg = walker.pop();
    }
    let _gs = walker.pop();
    let _fs = walker.pop();
    let es = walker.pop();
    let ds = walker.pop();
    let _trapno = walker.pop();
    let _err = walker.pop();
    let entry = UserEntry {
        eax: general[7],
        ds,
        es,
        eip: walker.pop(),
        cs: walker.pop(),
        eflags: walker.pop(),
        esp: walker.pop(),
        ss: walker.pop(),
    };
    assert_eq!(walker.sp, PAGE_SIZE, "iret must consume the rest of the page");
    entry
}
