//! Output sinks for received telemetry text.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Append-only destination for decoded telemetry chunks.
///
/// The reader only hands over chunks that contain something other than
/// whitespace; a sink writes them verbatim.
pub trait OutputSink: Send {
    /// Append one decoded chunk.
    fn emit(&mut self, chunk: &str) -> io::Result<()>;
}

/// Writes chunks to standard output and flushes after each one.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl StdoutSink {
    /// Create a sink bound to the process stdout.
    pub fn new() -> Self {
        Self
    }
}

impl OutputSink for StdoutSink {
    fn emit(&mut self, chunk: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(chunk.as_bytes())?;
        out.flush()
    }
}

/// In-memory sink; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    chunks: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every chunk emitted so far.
    #[must_use]
    pub fn chunks(&self) -> Vec<String> {
        self.lock().clone()
    }

    // A panic while holding the lock cannot leave the Vec half-written.
    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.chunks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All emitted text concatenated.
    #[must_use]
    pub fn contents(&self) -> String {
        self.chunks().concat()
    }
}

impl OutputSink for MemorySink {
    fn emit(&mut self, chunk: &str) -> io::Result<()> {
        self.lock().push(chunk.to_string());
        Ok(())
    }
}

/// Decode bytes as ASCII; anything above 0x7F becomes `?`.
#[must_use]
pub fn decode_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect()
}

/// True for empty or whitespace-only text.
#[must_use]
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ascii() {
        assert_eq!(decode_ascii(b"hello\n"), "hello\n");
        assert_eq!(decode_ascii(&[0x68, 0xC3, 0xA9, 0x21]), "h??!");
        assert_eq!(decode_ascii(&[]), "");
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank(" \r\n\t"));
        assert!(!is_blank(" x "));
    }

    #[test]
    fn test_memory_sink_shares_buffer() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.emit("a").unwrap();
        writer.emit("b\n").unwrap();
        assert_eq!(sink.chunks(), vec!["a".to_string(), "b\n".to_string()]);
        assert_eq!(sink.contents(), "ab\n");
    }

    #[test]
    fn test_memory_sink_survives_poisoned_lock() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.emit("before\n").unwrap();

        let poisoner = sink.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.chunks.lock().unwrap();
            panic!("poison the buffer");
        })
        .join();
        assert!(sink.chunks.is_poisoned());

        // Snapshot and append agree on a poisoned buffer.
        assert_eq!(sink.chunks(), vec!["before\n".to_string()]);
        writer.emit("after\n").unwrap();
        assert_eq!(sink.contents(), "before\nafter\n");
    }
}
