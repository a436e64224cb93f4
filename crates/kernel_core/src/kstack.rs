use alloc::boxed::Box;
use core::mem::{align_of, size_of};

use hal::{ContextPtr, PAGE_SIZE};

use crate::frame::TrapFrame;
use crate::switch::{Context, Continuation, Trampoline};

/// Size of a saved stack word on the target.
const WORD: usize = size_of::<u32>();

/// Offset of the trapframe: directly below the top of the page.
pub const TRAPFRAME_OFFSET: usize = PAGE_SIZE - size_of::<TrapFrame>();
/// Offset of the return address popped after the bootstrap entry returns.
pub const RETURN_SLOT_OFFSET: usize = TRAPFRAME_OFFSET - WORD;
/// Offset of the fabricated context, directly below the return slot.
pub const CONTEXT_OFFSET: usize = RETURN_SLOT_OFFSET - size_of::<Context>();

const _: () = assert!(TRAPFRAME_OFFSET % align_of::<TrapFrame>() == 0);
const _: () = assert!(CONTEXT_OFFSET % align_of::<Context>() == 0);
const _: () = assert!(CONTEXT_OFFSET + size_of::<Context>() <= RETURN_SLOT_OFFSET);

/// One page of kernel stack memory.
#[repr(C, align(4096))]
pub struct StackPage {
    pub bytes: [u8; PAGE_SIZE],
}

impl StackPage {
    pub const fn zeroed() -> Self {
        Self {
            bytes: [0; PAGE_SIZE],
        }
    }
}

/// Kernel-mode stack owned by one process.
///
/// The top of the page holds the process's trapframe. A never-run process
/// also carries a fabricated context right below it.
pub struct KernelStack {
    page: Box<StackPage>,
}

impl KernelStack {
    pub fn new(page: Box<StackPage>) -> Self {
        Self { page }
    }

    /// Lowest address of the stack page.
    pub fn base(&self) -> usize {
        self.page.bytes.as_ptr() as usize
    }

    /// One past the highest address; the stack grows down from here.
    pub fn top(&self) -> usize {
        self.base() + PAGE_SIZE
    }

    /// Address of the trapframe inside the page.
    pub fn trapframe_addr(&self) -> usize {
        self.base() + TRAPFRAME_OFFSET
    }

    /// Address of the fabricated bootstrap context inside the page.
    pub fn context_addr(&self) -> usize {
        self.base() + CONTEXT_OFFSET
    }

    pub fn trapframe(&self) -> &TrapFrame {
        // SAFETY: the offset is in bounds and aligned (checked at compile time)
        // and every bit pattern is a valid `TrapFrame`.
        unsafe { &*self.page.bytes.as_ptr().add(TRAPFRAME_OFFSET).cast::<TrapFrame>() }
    }

    pub fn trapframe_mut(&mut self) -> &mut TrapFrame {
        // SAFETY: see `trapframe`; the page is exclusively borrowed.
        unsafe {
            &mut *self
                .page
                .bytes
                .as_mut_ptr()
                .add(TRAPFRAME_OFFSET)
                .cast::<TrapFrame>()
        }
    }

    fn context_mut(&mut self) -> &mut Context {
        // SAFETY: the offset is in bounds and aligned and every bit pattern
        // is a valid `Context`.
        unsafe {
            &mut *self
                .page
                .bytes
                .as_mut_ptr()
                .add(CONTEXT_OFFSET)
                .cast::<Context>()
        }
    }

    /// Reads the stack word at `offset` bytes from the base.
    pub fn word_at(&self, offset: usize) -> Option<u32> {
        let bytes = self.page.bytes.get(offset..offset + WORD)?;
        let mut word = [0u8; WORD];
        word.copy_from_slice(bytes);
        Some(u32::from_ne_bytes(word))
    }

    fn write_word(&mut self, offset: usize, value: u32) {
        self.page.bytes[offset..offset + WORD].copy_from_slice(&value.to_ne_bytes());
    }

    /// Fabricates the first resumption of a never-run process.
    ///
    /// The switch primitive pops the context, returns into `trampoline.entry`,
    /// and that routine returns into `trampoline.trap_return`, which pops the
    /// trapframe.
    pub fn install_trampoline(&mut self, trampoline: Trampoline) -> Continuation {
        self.write_word(RETURN_SLOT_OFFSET, trampoline.trap_return);
        *self.context_mut() = Context::resuming_at(trampoline.entry);
        Continuation::Bootstrap(ContextPtr::new(self.context_addr()))
    }
}

impl core::fmt::Debug for KernelStack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KernelStack")
            .field("base", &format_args!("{:#x}", self.base()))
            .finish()
    }
}
