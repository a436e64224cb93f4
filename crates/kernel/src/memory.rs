//! Bindings to the virtual-memory subsystem linked into the kernel image.

use hal::{AddressSpaceOps, Errno, PagingRoot};

extern "C" {
    /// Builds a page directory with the user image mapped; 0 when out of memory.
    fn setup_user() -> PagingRoot;
    fn copy_user_space(src: PagingRoot, dst: PagingRoot);
    fn set_upgdir(root: PagingRoot);
    fn set_kpgdir();
}

/// Address spaces provided by the external paging code.
#[derive(Debug, Default)]
pub struct ExternalMemory;

impl AddressSpaceOps for ExternalMemory {
    fn create_user_space(&mut self) -> Result<PagingRoot, Errno> {
        match unsafe { setup_user() } {
            0 => Err(Errno::NoMem),
            root => Ok(root),
        }
    }

    fn copy_user_space(&mut self, src: PagingRoot, dst: PagingRoot) -> Result<(), Errno> {
        unsafe { copy_user_space(src, dst) };
        Ok(())
    }

    fn activate_user_space(&self, root: PagingRoot) {
        unsafe { set_upgdir(root) };
    }

    fn activate_kernel_space(&self) {
        unsafe { set_kpgdir() };
    }
}
