use hal::{AddressSpaceOps, Errno};

use crate::process::AddressSpace;

/// Virtual memory manager facade over the memory subsystem.
#[derive(Debug)]
pub struct Vmm<A: AddressSpaceOps> {
    ops: A,
}

impl<A: AddressSpaceOps> Vmm<A> {
    /// Creates a new virtual memory manager.
    pub fn new(ops: A) -> Self {
        Self { ops }
    }

    /// Builds a fresh user address space.
    pub fn create(&mut self) -> Result<AddressSpace, Errno> {
        let root = self.ops.create_user_space()?;
        Ok(AddressSpace { root })
    }

    /// Copies the user contents of `src` into `dst`.
    pub fn copy(&mut self, src: &AddressSpace, dst: &AddressSpace) -> Result<(), Errno> {
        self.ops.copy_user_space(src.root, dst.root)
    }

    /// Switches to the provided user address space.
    pub fn switch_as(&self, space: &AddressSpace) {
        self.ops.activate_user_space(space.root);
    }

    /// Switches back to the kernel-only address space.
    pub fn switch_kernel(&self) {
        self.ops.activate_kernel_space();
    }

    pub fn ops(&self) -> &A {
        &self.ops
    }

    pub fn ops_mut(&mut self) -> &mut A {
        &mut self.ops
    }
}
