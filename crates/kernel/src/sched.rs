use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};

use arch_i386::I386Cpu;
use kernel_core::{HeapPages, Scheduler, TrapFrame};

use crate::memory::ExternalMemory;

pub type KernelScheduler = Scheduler<ExternalMemory, I386Cpu, HeapPages>;

/// Home of the one scheduler instance.
///
/// Uniprocessor only. The scheduling loop and the trap path share the raw
/// pointer handed out here and never hold a reference across `swtch`: a
/// trap arrives only while a process runs, with the loop parked inside the
/// switch.
struct SchedulerCell {
    inner: UnsafeCell<MaybeUninit<KernelScheduler>>,
    installed: AtomicBool,
}

unsafe impl Sync for SchedulerCell {}

static SCHEDULER: SchedulerCell = SchedulerCell {
    inner: UnsafeCell::new(MaybeUninit::uninit()),
    installed: AtomicBool::new(false),
};

/// Stores the scheduler and returns the pointer every later access goes
/// through. Returns `None` if a scheduler is already installed.
pub fn install(scheduler: KernelScheduler) -> Option<*mut KernelScheduler> {
    if SCHEDULER.installed.load(Ordering::Acquire) {
        return None;
    }
    let this = SCHEDULER.inner.get().cast::<KernelScheduler>();
    // SAFETY: the slot is empty and nothing else can reach it yet.
    unsafe { this.write(scheduler) };
    SCHEDULER.installed.store(true, Ordering::Release);
    Some(this)
}

fn installed() -> Option<*mut KernelScheduler> {
    SCHEDULER
        .installed
        .load(Ordering::Acquire)
        .then(|| SCHEDULER.inner.get().cast::<KernelScheduler>())
}

/// Enters the scheduling loop.
///
/// # Safety
///
/// `scheduler` must come from [`install`], and no reference to it may be
/// live.
pub unsafe fn run(scheduler: *mut KernelScheduler) -> ! {
    // SAFETY: forwarded from the caller.
    unsafe { KernelScheduler::run(scheduler) }
}

/// Entered from `alltraps` with the trapframe it built on the kernel stack.
///
/// Only the vector is read here. For a trap from user mode that frame sits
/// in the current process's kernel stack page, where the scheduler reaches
/// it through the process table.
#[no_mangle]
pub extern "C" fn trap_dispatch(tf: *const TrapFrame) {
    let Some(scheduler) = installed() else {
        return;
    };
    if tf.is_null() {
        return;
    }
    // SAFETY: `alltraps` passes the frame it just pushed.
    let trapno = unsafe { ptr::addr_of!((*tf).trapno).read() };
    // SAFETY: the loop holds no reference while a process runs.
    unsafe { KernelScheduler::trap(scheduler, trapno) };
}
