use hal::{AddressSpaceOps, CpuOps};

use crate::pmm::PageAllocator;
use crate::scheduler::Scheduler;
use crate::syscall::{encode_result, Syscall};

pub const KEYBOARD_VECTOR: u32 = 0x21;
pub const UART_VECTOR: u32 = 0x24;
pub const SYSCALL_VECTOR: u32 = 0x80;

/// Kind of trap, decoded from the vector number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    Keyboard,
    Uart,
    Syscall,
    Other(u32),
}

impl Trap {
    pub const fn classify(trapno: u32) -> Self {
        match trapno {
            KEYBOARD_VECTOR => Trap::Keyboard,
            UART_VECTOR => Trap::Uart,
            SYSCALL_VECTOR => Trap::Syscall,
            other => Trap::Other(other),
        }
    }
}

/// Interrupt handlers owned by the device layer.
#[derive(Debug, Clone, Copy)]
pub struct DeviceHandlers {
    pub keyboard: fn(),
    pub uart: fn(),
}

impl DeviceHandlers {
    /// Handlers that ignore the interrupt.
    pub fn none() -> Self {
        fn ignore() {}
        Self {
            keyboard: ignore,
            uart: ignore,
        }
    }
}

impl<A: AddressSpaceOps, C: CpuOps, P: PageAllocator> Scheduler<A, C, P> {
    /// Handles trap `trapno` taken by the current process.
    ///
    /// The registers are the trapframe on the current process's kernel
    /// stack; a syscall result goes back into that frame's `eax`. Every trap
    /// ends with a yield, so the process gives up the CPU at each device
    /// interrupt and each syscall.
    ///
    /// # Safety
    ///
    /// Same contract as [`Scheduler::run`]: called with the loop's pointer
    /// from inside the switch that runs the current process.
    pub unsafe fn trap(this: *mut Self, trapno: u32) {
        {
            // SAFETY: the borrow ends before the yield.
            let scheduler = unsafe { &mut *this };
            match Trap::classify(trapno) {
                Trap::Keyboard => (scheduler.devices.keyboard)(),
                Trap::Uart => (scheduler.devices.uart)(),
                Trap::Syscall => scheduler.syscall(),
                Trap::Other(_) => {}
            }
        }
        // SAFETY: forwarded from the caller.
        unsafe { Self::yield_cpu(this) };
    }

    fn syscall(&mut self) {
        let Some(pid) = self.current else {
            log::warn!("syscall with no current process");
            return;
        };
        let Some(tf) = self.table.trapframe_mut(pid) else {
            return;
        };
        let (number, args) = (tf.syscall_number(), tf.syscall_args());
        log::debug!(
            "syscall {} {:?} from pid {}",
            number,
            Syscall::from_number(number),
            pid
        );

        let result = self
            .syscalls
            .entry_for(number)
            .and_then(|entry| entry.call(self, &args));
        if let Some(tf) = self.table.trapframe_mut(pid) {
            tf.set_return_value(encode_result(result));
        }
    }
}
