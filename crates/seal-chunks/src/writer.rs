//! Window writer

use std::io::{ErrorKind, Write};

use seal_core::{SealError, SealResult};

pub struct ChunkWriter<W> {
    inner: W,
    bound: usize,
    /// Set once a short window has been written; no window may follow it
    closed: bool,
    windows: u64,
    bytes: u64,
}

impl<W: Write> ChunkWriter<W> {
    pub fn new(inner: W, bound: usize) -> Self {
        Self {
            inner,
            bound,
            closed: false,
            windows: 0,
            bytes: 0,
        }
    }

    /// Total bytes written, preamble included
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Write bytes that precede the first window (e.g. a stream header).
    pub fn write_preamble(&mut self, bytes: &[u8]) -> SealResult<()> {
        if self.windows > 0 {
            return Err(invalid("preamble must be written before the first window"));
        }
        self.inner.write_all(bytes)?;
        self.bytes += bytes.len() as u64;
        Ok(())
    }

    pub fn write_window(&mut self, bytes: &[u8]) -> SealResult<()> {
        if bytes.len() > self.bound {
            return Err(invalid(&format!(
                "window of {} bytes exceeds bound {}",
                bytes.len(),
                self.bound
            )));
        }
        if self.closed {
            return Err(invalid("window written after a short final window"));
        }
        self.inner.write_all(bytes)?;
        if bytes.len() < self.bound {
            self.closed = true;
        }
        self.windows += 1;
        self.bytes += bytes.len() as u64;
        Ok(())
    }

    /// Flush and hand back the underlying sink.
    pub fn finish(mut self) -> SealResult<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn invalid(msg: &str) -> SealError {
    SealError::Io(std::io::Error::new(ErrorKind::InvalidInput, msg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_preamble_and_windows_in_order() {
        let mut writer = ChunkWriter::new(Vec::new(), 4);
        writer.write_preamble(b"H").unwrap();
        writer.write_window(b"abcd").unwrap();
        writer.write_window(b"ef").unwrap();

        assert_eq!(writer.bytes_written(), 7);
        assert_eq!(writer.finish().unwrap(), b"Habcdef");
    }

    #[test]
    fn rejects_oversized_window() {
        let mut writer = ChunkWriter::new(Vec::new(), 4);
        let err = writer.write_window(b"abcde").unwrap_err();
        assert!(matches!(err, SealError::Io(ref e) if e.kind() == ErrorKind::InvalidInput));
        assert!(writer.finish().unwrap().is_empty(), "nothing written on rejection");
    }

    #[test]
    fn rejects_window_after_short_window() {
        let mut writer = ChunkWriter::new(Vec::new(), 4);
        writer.write_window(b"ab").unwrap();
        assert!(writer.write_window(b"cd").is_err());
    }

    #[test]
    fn rejects_preamble_after_window() {
        let mut writer = ChunkWriter::new(Vec::new(), 4);
        writer.write_window(b"abcd").unwrap();
        assert!(writer.write_preamble(b"H").is_err());
    }

    #[test]
    fn empty_window_is_allowed_once() {
        let mut writer = ChunkWriter::new(Vec::new(), 4);
        writer.write_window(b"").unwrap();
        assert!(writer.write_window(b"").is_err());
    }
}
