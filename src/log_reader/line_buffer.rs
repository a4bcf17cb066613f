//! Stream-to-lines accumulation with bounded line length

use crate::error::Result;
use std::io::{ErrorKind, Read};

/// Default line capacity. OctoPrint lines longer than this are garbage anyway.
pub const DEFAULT_LINE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    DiscardingOverflow,
}

/// Accumulates bytes from a growing stream into newline-terminated lines.
///
/// Partial lines survive across calls, so the caller can drain the stream
/// until it reports nothing more, wait for the file to grow and resume.
/// Lines that reach `capacity` bytes without a newline are dropped in full.
#[derive(Debug)]
pub struct LineBuffer {
    capacity: usize,
    data: Vec<u8>,
    mode: Mode,
    consumed: u64,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_CAPACITY)
    }
}

impl LineBuffer {
    /// Create a buffer holding lines of at most `capacity - 1` bytes
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            capacity,
            data: Vec::with_capacity(capacity),
            mode: Mode::Normal,
            consumed: 0,
        }
    }

    /// Raw bytes read from the stream since the last call, discarded ones included
    pub fn take_consumed(&mut self) -> u64 {
        std::mem::take(&mut self.consumed)
    }

    /// Number of bytes of the pending partial line
    pub fn pending_len(&self) -> usize {
        self.data.len()
    }

    /// True when the buffer sits on a line boundary
    pub fn is_at_boundary(&self) -> bool {
        self.data.is_empty() && self.mode == Mode::Normal
    }

    /// Forget any partial line, e.g. after the underlying file was replaced
    pub fn reset(&mut self) {
        self.data.clear();
        self.mode = Mode::Normal;
        self.consumed = 0;
    }

    /// Try to extract the next complete line from `stream`.
    ///
    /// Returns `Ok(None)` once the stream has no more bytes for now.
    pub fn try_get_line<R: Read>(&mut self, stream: &mut R) -> Result<Option<String>> {
        let mut byte = [0u8; 1];
        loop {
            match stream.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => self.consumed += 1,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            match (self.mode, byte[0]) {
                (Mode::DiscardingOverflow, b'\n') => {
                    self.mode = Mode::Normal;
                }
                (Mode::DiscardingOverflow, _) => {}
                (Mode::Normal, b'\n') => {
                    let line = String::from_utf8_lossy(&self.data).into_owned();
                    self.data.clear();
                    return Ok(Some(line));
                }
                (Mode::Normal, b) => {
                    self.data.push(b);
                    if self.data.len() >= self.capacity {
                        tracing::debug!(
                            capacity = self.capacity,
                            "Line too long, discarding until next newline"
                        );
                        self.data.clear();
                        self.mode = Mode::DiscardingOverflow;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Feed `chunks` one after another, draining lines after each chunk
    fn lines_from_chunks(capacity: usize, chunks: &[&[u8]]) -> Vec<String> {
        let mut buffer = LineBuffer::new(capacity);
        let mut lines = Vec::new();
        for chunk in chunks {
            let mut stream = Cursor::new(chunk.to_vec());
            while let Some(line) = buffer.try_get_line(&mut stream).unwrap() {
                lines.push(line);
            }
        }
        lines
    }

    #[test]
    fn test_whole_and_partial_lines() {
        let lines = lines_from_chunks(256, &[b"first\nsec", b"ond\nthi", b"rd"]);
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn test_chunking_does_not_change_lines() {
        let input = b"Send: G90\n\nRecv: ok\nSend: G1 X12.5\n";
        let whole = lines_from_chunks(256, &[input]);

        let bytes: Vec<&[u8]> = input.chunks(1).collect();
        assert_eq!(lines_from_chunks(256, &bytes), whole);

        let uneven: Vec<&[u8]> = input.chunks(7).collect();
        assert_eq!(lines_from_chunks(256, &uneven), whole);

        assert_eq!(whole, vec!["Send: G90", "", "Recv: ok", "Send: G1 X12.5"]);
    }

    #[test]
    fn test_empty_line_is_returned() {
        assert_eq!(lines_from_chunks(16, &[b"\n\nx\n"]), vec!["", "", "x"]);
    }

    #[test]
    fn test_oversized_line_is_dropped() {
        let long = "y".repeat(40);
        let input = format!("short\n{long}\nafter\n");
        let lines = lines_from_chunks(16, &[input.as_bytes()]);
        assert_eq!(lines, vec!["short", "after"]);
    }

    #[test]
    fn test_oversized_line_split_across_chunks() {
        let lines = lines_from_chunks(8, &[b"abcdefghij", b"klmno", b"p\nok\n"]);
        assert_eq!(lines, vec!["ok"]);
    }

    #[test]
    fn test_line_at_capacity_boundary_is_overflow() {
        // Seven bytes fit into a capacity of eight, eight do not.
        let lines = lines_from_chunks(8, &[b"1234567\n12345678\nnext\n"]);
        assert_eq!(lines, vec!["1234567", "next"]);
    }

    #[test]
    fn test_reset_drops_partial_line() {
        let mut buffer = LineBuffer::new(32);
        let mut stream = Cursor::new(b"partial".to_vec());
        assert!(buffer.try_get_line(&mut stream).unwrap().is_none());
        assert_eq!(buffer.pending_len(), 7);
        assert!(!buffer.is_at_boundary());

        buffer.reset();
        let mut stream = Cursor::new(b"fresh\n".to_vec());
        assert_eq!(buffer.try_get_line(&mut stream).unwrap().as_deref(), Some("fresh"));
        assert!(buffer.is_at_boundary());
    }

    #[test]
    fn test_consumed_counts_discarded_and_raw_bytes() {
        let mut buffer = LineBuffer::new(8);
        let mut stream = Cursor::new(b"0123456789\n\xff\xfe\nab".to_vec());
        let line = buffer.try_get_line(&mut stream).unwrap();
        assert_eq!(line.as_deref(), Some("\u{fffd}\u{fffd}"));
        assert!(buffer.try_get_line(&mut stream).unwrap().is_none());
        assert_eq!(buffer.take_consumed(), 16);
        assert_eq!(buffer.take_consumed(), 0);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let lines = lines_from_chunks(32, &[b"Send: \xffG1\n"]);
        assert_eq!(lines, vec!["Send: \u{fffd}G1"]);
    }
}
