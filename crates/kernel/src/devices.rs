use kernel_core::DeviceHandlers;

extern "C" {
    fn keyboard_handler_main();
    fn uart_handler_main();
}

fn keyboard() {
    unsafe { keyboard_handler_main() };
}

fn uart() {
    unsafe { uart_handler_main() };
}

/// Interrupt handlers of the keyboard and UART drivers.
pub fn handlers() -> DeviceHandlers {
    DeviceHandlers { keyboard, uart }
}
