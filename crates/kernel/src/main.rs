#![no_std]
#![no_main]

use core::panic::PanicInfo;

use kernel::kprintln;

/// Jumped to by the boot code once paging and the kernel stack are up.
#[no_mangle]
pub extern "C" fn kernel_main() -> ! {
    kernel::entry()
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    kprintln!("panic: {}", info);
    arch_i386::halt_loop()
}
