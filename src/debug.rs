//! Diagnostic output.
//!
//! Text goes to a [`DebugSink`] registered at startup, normally the
//! firmware's serial driver. Output is best-effort: the sink is taken with
//! `try_lock`, so an interrupt that logs while a thread is printing drops its
//! text instead of deadlocking.
//!
//! [`KernelLogger`] forwards `log` records to the same sink.

use core::fmt::{self, Write};

/// Byte-oriented output device.
pub trait DebugSink: Send {
    /// Transmit one byte, blocking until the device accepts it.
    fn write_byte(&mut self, byte: u8);

    fn write_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.write_byte(*byte);
        }
    }
}

static SINK: spin::Mutex<Option<&'static mut dyn DebugSink>> = spin::Mutex::new(None);

/// Route diagnostic output to `sink`, replacing any previous sink.
pub fn set_sink(sink: &'static mut dyn DebugSink) {
    *SINK.lock() = Some(sink);
}

/// Detach the current sink. Output is discarded until a new one is set.
pub fn take_sink() -> Option<&'static mut dyn DebugSink> {
    SINK.lock().take()
}

/// Write formatted text to the sink, if it is free.
pub fn print(args: fmt::Arguments<'_>) {
    if let Some(mut guard) = SINK.try_lock() {
        if let Some(sink) = guard.as_deref_mut() {
            let _ = SinkWriter(sink).write_fmt(args);
        }
    }
}

/// `fmt::Write` adapter over a sink; expands `\n` to `\r\n` for terminals.
struct SinkWriter<'a>(&'a mut dyn DebugSink);

impl Write for SinkWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.0.write_byte(b'\r');
            }
            self.0.write_byte(byte);
        }
        Ok(())
    }
}

/// Writer usable with `write!`; goes through [`print`].
pub struct DebugWriter;

impl Write for DebugWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        print(format_args!("{}", s));
        Ok(())
    }
}

/// Print a formatted string to the debug sink.
///
/// # Example
///
/// ```ignore
/// debug_print!("tick {}\n", now());
/// ```
#[macro_export]
macro_rules! debug_print {
    ($($arg:tt)*) => {
        $crate::debug::print(format_args!($($arg)*))
    };
}

/// Print a formatted string to the debug sink with a newline.
#[macro_export]
macro_rules! debug_println {
    () => {
        $crate::debug_print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::debug::print(format_args!("{}\n", format_args!($($arg)*)))
    };
}

/// `log` backend writing to the debug sink.
pub struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl log::Log for KernelLogger {
    // Records are already filtered against `log::max_level` by the macros.
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        print(format_args!(
            "[{:<5} {}] {}\n",
            record.level(),
            record.target(),
            record.args()
        ));
    }

    fn flush(&self) {}
}

/// Install `sink` and make [`KernelLogger`] the global logger at `level`.
pub fn init_logger(
    sink: &'static mut dyn DebugSink,
    level: log::LevelFilter,
) -> Result<(), log::SetLoggerError> {
    set_sink(sink);
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;
    use std::boxed::Box;
    use std::string::String;
    use std::sync::Mutex;
    use std::vec::Vec;

    static CAPTURED: Mutex<Vec<u8>> = Mutex::new(Vec::new());

    struct CaptureSink;

    impl DebugSink for CaptureSink {
        fn write_byte(&mut self, byte: u8) {
            CAPTURED.lock().unwrap().push(byte);
        }
    }

    struct BufferSink(Vec<u8>);

    impl DebugSink for BufferSink {
        fn write_byte(&mut self, byte: u8) {
            self.0.push(byte);
        }
    }

    #[test]
    fn test_newline_expansion() {
        let mut sink = BufferSink(Vec::new());
        write!(SinkWriter(&mut sink), "a\nb {}\n", 7).unwrap();
        assert_eq!(sink.0, b"a\r\nb 7\r\n");
    }

    // The sink is process-wide, so everything touching it lives in one test.
    #[test]
    fn test_global_sink() {
        crate::debug_print!("dropped {}", 1);
        set_sink(Box::leak(Box::new(CaptureSink)));

        crate::debug_println!("slot {} ready", 3);
        write!(DebugWriter, "x").unwrap();
        KernelLogger.log(
            &log::Record::builder()
                .level(log::Level::Error)
                .target("kernel")
                .args(format_args!("fatal"))
                .build(),
        );

        // Busy sink: output is dropped, not blocked on.
        let guard = SINK.lock();
        print(format_args!("lost"));
        drop(guard);

        assert!(take_sink().is_some());
        crate::debug_print!("dropped");

        let text = String::from_utf8(CAPTURED.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "slot 3 ready\r\nx[ERROR kernel] fatal\r\n");
    }
}
