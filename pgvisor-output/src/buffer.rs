use bytes::{Bytes, BytesMut};

#[derive(Debug, Clone)]
pub struct LineBufferConfig {
    /// A partial line longer than this is emitted as-is.
    pub max_line: usize,
}

impl Default for LineBufferConfig {
    fn default() -> Self {
        Self {
            max_line: 65536, // 64KB
        }
    }
}

/// Reassembles a byte stream into lines.
///
/// Owned by a single reader, so no locking. Emitted lines carry no trailing
/// `\n`, and a `\r` before it (pty line discipline) is dropped too.
#[derive(Debug)]
pub struct LineBuffer {
    config: LineBufferConfig,
    incomplete: BytesMut,
    total_bytes: usize,
    total_lines: usize,
}

impl LineBuffer {
    pub fn new(config: LineBufferConfig) -> Self {
        Self {
            config,
            incomplete: BytesMut::with_capacity(4096),
            total_bytes: 0,
            total_lines: 0,
        }
    }

    /// Appends `data` and returns every line it completed.
    pub fn push(&mut self, data: &[u8]) -> Vec<Bytes> {
        if data.is_empty() {
            return Vec::new();
        }

        self.incomplete.extend_from_slice(data);
        self.total_bytes += data.len();

        let mut complete = Vec::new();
        while let Some(newline_pos) = self.incomplete.iter().position(|&b| b == b'\n') {
            let mut line = self.incomplete.split_to(newline_pos + 1);
            line.truncate(newline_pos);
            if line.last() == Some(&b'\r') {
                line.truncate(newline_pos - 1);
            }
            complete.push(line.freeze());
        }

        if self.incomplete.len() > self.config.max_line {
            complete.push(self.incomplete.split().freeze());
        }

        self.total_lines += complete.len();
        complete
    }

    /// Returns whatever partial line is left, e.g. once the stream hits EOF.
    pub fn finish(&mut self) -> Option<Bytes> {
        if self.incomplete.is_empty() {
            return None;
        }

        let mut line = self.incomplete.split();
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        self.total_lines += 1;
        Some(line.freeze())
    }

    pub fn is_empty(&self) -> bool {
        self.incomplete.is_empty()
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            incomplete_bytes: self.incomplete.len(),
            total_bytes_read: self.total_bytes,
            total_lines_emitted: self.total_lines,
        }
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(LineBufferConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    pub incomplete_bytes: usize,
    pub total_bytes_read: usize,
    pub total_lines_emitted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_basic() {
        let mut buffer = LineBuffer::default();

        let lines = buffer.push(b"Line 1\nLine 2\nIncomplete");
        assert_eq!(lines.len(), 2);
        assert_eq!(&lines[0][..], b"Line 1");
        assert_eq!(&lines[1][..], b"Line 2");

        let rest = buffer.finish();
        assert_eq!(rest.as_deref(), Some(&b"Incomplete"[..]));
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut buffer = LineBuffer::default();

        assert!(buffer.push(b"hel").is_empty());
        assert!(buffer.push(b"lo wo").is_empty());
        let lines = buffer.push(b"rld\nnext");
        assert_eq!(lines.len(), 1);
        assert_eq!(&lines[0][..], b"hello world");
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_crlf_stripped() {
        let mut buffer = LineBuffer::default();

        let lines = buffer.push(b"from a pty\r\n\r\nplain\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(&lines[0][..], b"from a pty");
        assert_eq!(&lines[1][..], b"");
        assert_eq!(&lines[2][..], b"plain");
    }

    #[test]
    fn test_line_buffer_overflow() {
        let mut buffer = LineBuffer::new(LineBufferConfig { max_line: 10 });

        let lines = buffer.push(b"This is a very long line without newline");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].len() > 10);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_stats() {
        let mut buffer = LineBuffer::default();
        buffer.push(b"a\nb\nc");

        let stats = buffer.stats();
        assert_eq!(stats.total_bytes_read, 5);
        assert_eq!(stats.total_lines_emitted, 2);
        assert_eq!(stats.incomplete_bytes, 1);
    }
}
