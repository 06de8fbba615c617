//! Serial port used as the allocator's diagnostic output sink.

#[cfg(not(test))]
use conquer_once::spin::Lazy;
#[cfg(not(test))]
use spin::Mutex;
#[cfg(not(test))]
use uart_16550::SerialPort;

/// Serial port for writing diagnostics to the host console.
///
/// Absent under `cfg(test)`: host test runs print through `std::println!`
/// instead of talking to a UART that doesn't exist on the test machine.
#[cfg(not(test))]
pub static SERIAL1: Lazy<Mutex<SerialPort>> = Lazy::new(|| {
    let mut serial_port = unsafe { SerialPort::new(0x3F8) };
    serial_port.init();
    Mutex::new(serial_port)
});

/// Writes to the serial interface, or to standard output under test.
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {{
        #[cfg(not(test))]
        {
            let _ = ::core::fmt::Write::write_fmt(
                &mut *$crate::serial::SERIAL1.lock(),
                format_args!($($arg)*)
            );
        }
        #[cfg(test)]
        {
            extern crate std;
            std::print!($($arg)*);
        }
    }};
}

/// Writes a line to the serial interface, or to standard output under test.
#[macro_export]
macro_rules! serial_println {
    () => {
        $crate::serial_print!("\n");
    };
    ($($arg:tt)*) => {
        $crate::serial_print!("{}\n", format_args!($($arg)*));
    };
}
