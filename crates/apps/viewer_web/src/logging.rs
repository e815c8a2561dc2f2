use std::io;

use tracing::{Level, Metadata};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use wasm_bindgen::JsValue;
use web_sys::console;

/// Installs a `tracing` subscriber that writes to the browser console.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(directives: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(directives))
        .without_time()
        .with_ansi(false)
        .with_writer(ConsoleMakeWriter)
        .try_init();
}

/// Falls back to `info` when the directives do not parse.
pub fn filter_for(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

pub struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::new(Level::INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter::new(*meta.level())
    }
}

/// Buffers one formatted event and emits it on drop.
pub struct ConsoleWriter {
    level: Level,
    buf: Vec<u8>,
}

impl ConsoleWriter {
    fn new(level: Level) -> Self {
        Self {
            level,
            buf: Vec::new(),
        }
    }
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
        if self.buf.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buf);
        let msg = JsValue::from_str(line.trim_end());
        if self.level == Level::ERROR {
            console::error_1(&msg);
        } else if self.level == Level::WARN {
            console::warn_1(&msg);
        } else if self.level == Level::INFO {
            console::log_1(&msg);
        } else {
            console::debug_1(&msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::filter_for;

    #[test]
    fn directives_pass_through() {
        assert_eq!(filter_for("debug").to_string(), "debug");
        assert!(filter_for("info,layers=debug").to_string().contains("layers=debug"));
    }
}
