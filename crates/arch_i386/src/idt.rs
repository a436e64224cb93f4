use kernel_core::{KERNEL_CODE_SELECTOR, KEYBOARD_VECTOR, SYSCALL_VECTOR, UART_VECTOR};
use spin::Mutex;
use x86::dtables::{self, DescriptorTablePointer};

const IDT_ENTRIES: usize = 256;
const GENERAL_PROTECTION_VECTOR: usize = 13;
const PAGE_FAULT_VECTOR: usize = 14;

/// Present 32-bit interrupt gate, ring 0 only.
const KERNEL_GATE: u8 = 0x8E;
/// Present 32-bit interrupt gate reachable with `int` from ring 3.
const USER_GATE: u8 = 0xEE;

static IDT: Mutex<[u64; IDT_ENTRIES]> = Mutex::new([0; IDT_ENTRIES]);

extern "C" {
    fn vector13();
    fn vector14();
    fn vector33();
    fn vector36();
    fn vector128();
}

fn gate(handler: unsafe extern "C" fn(), attributes: u8) -> u64 {
    let offset = handler as usize as u64;
    (offset & 0xFFFF)
        | ((KERNEL_CODE_SELECTOR as u64) << 16)
        | ((attributes as u64) << 40)
        | (((offset >> 16) & 0xFFFF) << 48)
}

pub(crate) fn init() {
    let mut idt = IDT.lock();
    idt[GENERAL_PROTECTION_VECTOR] = gate(vector13, KERNEL_GATE);
    idt[PAGE_FAULT_VECTOR] = gate(vector14, KERNEL_GATE);
    idt[KEYBOARD_VECTOR as usize] = gate(vector33, KERNEL_GATE);
    idt[UART_VECTOR as usize] = gate(vector36, KERNEL_GATE);
    idt[SYSCALL_VECTOR as usize] = gate(vector128, USER_GATE);

    let pointer = DescriptorTablePointer::new_from_slice(&idt[..]);
    unsafe { dtables::lidt(&pointer) };
}
