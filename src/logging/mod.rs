//! `tracing` output routed to the browser console.

use std::io;
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConsoleMethod {
    Log,
    Warn,
    Error,
}

impl From<Level> for ConsoleMethod {
    fn from(level: Level) -> Self {
        if level == Level::ERROR {
            Self::Error
        } else if level == Level::WARN {
            Self::Warn
        } else {
            Self::Log
        }
    }
}

/// Buffers one formatted event and flushes it as a single console line on drop.
pub struct ConsoleWriter {
    method: ConsoleMethod,
    buf: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim_end();
        if !line.is_empty() {
            emit(self.method, line);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn emit(method: ConsoleMethod, line: &str) {
    let msg = wasm_bindgen::JsValue::from_str(line);
    match method {
        ConsoleMethod::Log => web_sys::console::log_1(&msg),
        ConsoleMethod::Warn => web_sys::console::warn_1(&msg),
        ConsoleMethod::Error => web_sys::console::error_1(&msg),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn emit(_method: ConsoleMethod, line: &str) {
    eprintln!("{line}");
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter {
            method: ConsoleMethod::Log,
            buf: Vec::new(),
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter {
            method: (*meta.level()).into(),
            buf: Vec::new(),
        }
    }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(level: Level) {
    let installed = tracing_subscriber::fmt()
        .without_time()
        .with_ansi(false)
        .with_target(false)
        .with_max_level(level)
        .with_writer(ConsoleMakeWriter)
        .try_init();

    if installed.is_ok() {
        tracing::debug!(%level, "logging initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_levels_map_to_console_methods() {
        assert_eq!(ConsoleMethod::from(Level::ERROR), ConsoleMethod::Error);
        assert_eq!(ConsoleMethod::from(Level::WARN), ConsoleMethod::Warn);
        assert_eq!(ConsoleMethod::from(Level::INFO), ConsoleMethod::Log);
        assert_eq!(ConsoleMethod::from(Level::TRACE), ConsoleMethod::Log);
    }

    #[test]
    fn test_writer_buffers_until_dropped() {
        let mut w = ConsoleMakeWriter.make_writer();
        w.write_all(b"fetched ").expect("write");
        w.write_all(b"3 bookmarks\n").expect("write");
        assert_eq!(w.buf, b"fetched 3 bookmarks\n");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(Level::DEBUG);
        init(Level::INFO);
        tracing::info!("still alive");
    }
}
