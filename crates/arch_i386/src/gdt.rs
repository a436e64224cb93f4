use core::arch::asm;

use kernel_core::tss::DescriptorAccess;
use kernel_core::{KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR};
use spin::Mutex;
use x86::dtables::{self, DescriptorTablePointer};
use x86::segmentation::{self, SegmentSelector};

const GDT_ENTRIES: usize = 6;
const FLAT_LIMIT: u64 = 0xF_FFFF;
/// 4 KiB granularity, 32-bit operand size.
const FLAT_FLAGS: u64 = 0xC;

const KERNEL_CODE: DescriptorAccess = DescriptorAccess::PRESENT
    .union(DescriptorAccess::SEGMENT)
    .union(DescriptorAccess::EXECUTABLE)
    .union(DescriptorAccess::READ_WRITE);
const KERNEL_DATA: DescriptorAccess = DescriptorAccess::PRESENT
    .union(DescriptorAccess::SEGMENT)
    .union(DescriptorAccess::READ_WRITE);
const USER_CODE: DescriptorAccess = KERNEL_CODE.union(DescriptorAccess::RING3);
const USER_DATA: DescriptorAccess = KERNEL_DATA.union(DescriptorAccess::RING3);

/// Null, kernel code, kernel data, user code, user data, TSS.
static GDT: Mutex<[u64; GDT_ENTRIES]> = Mutex::new([
    0,
    flat_segment(KERNEL_CODE),
    flat_segment(KERNEL_DATA),
    flat_segment(USER_CODE),
    flat_segment(USER_DATA),
    0,
]);

const fn flat_segment(access: DescriptorAccess) -> u64 {
    (FLAT_LIMIT & 0xFFFF)
        | ((access.bits() as u64) << 40)
        | (((FLAT_LIMIT >> 16) & 0xF) << 48)
        | (FLAT_FLAGS << 52)
}

pub(crate) fn init() {
    let gdt = GDT.lock();
    let pointer = DescriptorTablePointer::new_from_slice(&gdt[..]);
    unsafe {
        dtables::lgdt(&pointer);
        reload_segments();
    }
}

unsafe fn reload_segments() {
    let data = SegmentSelector::from_raw(KERNEL_DATA_SELECTOR);
    unsafe {
        segmentation::load_ds(data);
        segmentation::load_es(data);
        segmentation::load_fs(data);
        segmentation::load_gs(data);
        segmentation::load_ss(data);
        // Far return to reload CS.
        asm!(
            "push {code}",
            "lea {tmp}, [2f]",
            "push {tmp}",
            "retf",
            "2:",
            code = in(reg) KERNEL_CODE_SELECTOR as u32,
            tmp = out(reg) _,
        );
    }
}

/// Writes the TSS descriptor into its GDT slot and loads the task register.
pub(crate) fn install_tss(descriptor: u64, selector: u16) {
    let index = (selector >> 3) as usize;
    if let Some(entry) = GDT.lock().get_mut(index) {
        *entry = descriptor;
    }
    unsafe { x86::task::load_tr(SegmentSelector::from_raw(selector)) };
}
