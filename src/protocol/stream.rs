//! Line framing and accumulation for streamed response bodies.

use super::{ProtocolError, WireProtocol};

/// Splits a byte stream into newline-terminated lines.
///
/// Bytes are buffered until a `\n` arrives, so multi-byte UTF-8 sequences
/// split across chunks decode intact. A trailing `\r` is stripped.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, returning every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // `pending` never holds a newline between calls, so only the new
        // chunk needs scanning.
        let Some(last) = chunk.iter().rposition(|b| *b == b'\n') else {
            self.pending.extend_from_slice(chunk);
            return Vec::new();
        };

        self.pending.extend_from_slice(&chunk[..last]);
        let lines = self
            .pending
            .split(|b| *b == b'\n')
            .map(decode_line)
            .collect();
        self.pending.clear();
        self.pending.extend_from_slice(&chunk[last + 1..]);
        lines
    }

    /// Flush an unterminated final line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_suffix('\r').unwrap_or(text.as_ref()).to_string()
}

/// Feeds streamed chunks through a dialect's line parser and keeps the
/// concatenated text.
pub struct StreamAccumulator<'p> {
    protocol: &'p dyn WireProtocol,
    splitter: LineSplitter,
    text: String,
    done: bool,
}

impl<'p> StreamAccumulator<'p> {
    pub fn new(protocol: &'p dyn WireProtocol) -> Self {
        Self {
            protocol,
            splitter: LineSplitter::new(),
            text: String::new(),
            done: false,
        }
    }

    /// Process one chunk, calling `on_delta` for every text fragment in order.
    ///
    /// Once a terminating line has been seen, later input is ignored.
    pub fn feed<F>(&mut self, chunk: &[u8], mut on_delta: F) -> Result<(), ProtocolError>
    where
        F: FnMut(&str),
    {
        if self.done {
            return Ok(());
        }
        for line in self.splitter.push(chunk) {
            self.handle_line(&line, &mut on_delta)?;
            if self.done {
                break;
            }
        }
        Ok(())
    }

    /// Process any unterminated trailing line after the body ends.
    pub fn finish<F>(&mut self, mut on_delta: F) -> Result<(), ProtocolError>
    where
        F: FnMut(&str),
    {
        if self.done {
            return Ok(());
        }
        if let Some(line) = self.splitter.finish() {
            self.handle_line(&line, &mut on_delta)?;
        }
        Ok(())
    }

    fn handle_line<F>(&mut self, line: &str, on_delta: &mut F) -> Result<(), ProtocolError>
    where
        F: FnMut(&str),
    {
        let outcome = self.protocol.parse_stream_line(line)?;
        if let Some(delta) = outcome.delta {
            on_delta(&delta);
            self.text.push_str(&delta);
        }
        if outcome.done {
            self.done = true;
        }
        Ok(())
    }

    /// A terminating line was seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
