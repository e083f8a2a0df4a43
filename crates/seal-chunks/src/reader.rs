//! Window reader with end-of-input lookahead
//!
//! A window is only known to be the last one once the source has reported
//! end-of-input. To tag the final window without emitting an extra empty one
//! when the input length is an exact multiple of `bound`, the reader pulls
//! `bound + 1` bytes: the extra byte proves more data follows and is carried
//! over to the front of the next window.

use std::io::{ErrorKind, Read};

use seal_core::{SealError, SealResult};
use zeroize::Zeroizing;

/// One window of input, borrowed from the reader's buffer.
#[derive(Debug)]
pub struct Window<'a> {
    /// Zero-based position of this window in the stream
    pub index: u64,
    /// Window contents (at most `bound` bytes)
    pub data: &'a [u8],
    /// True if the source is exhausted after this window
    pub is_last: bool,
}

pub struct ChunkReader<R> {
    inner: R,
    bound: usize,
    /// `bound + 1` bytes; zeroized on drop since it holds plaintext when encrypting
    buf: Zeroizing<Vec<u8>>,
    /// `buf[bound]` holds the first byte of the next window
    carry: bool,
    finished: bool,
    windows: u64,
    bytes: u64,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(inner: R, bound: usize) -> SealResult<Self> {
        if bound == 0 {
            return Err(SealError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                "window bound must be non-zero",
            )));
        }
        Ok(Self {
            inner,
            bound,
            buf: Zeroizing::new(vec![0u8; bound + 1]),
            carry: false,
            finished: false,
            windows: 0,
            bytes: 0,
        })
    }

    /// Window bytes returned so far (excludes the preamble)
    pub fn bytes_read(&self) -> u64 {
        self.bytes
    }

    /// Read up to `len` bytes that precede the first window (e.g. a stream
    /// header). Returns fewer than `len` bytes only if the source ran dry.
    pub fn read_preamble(&mut self, len: usize) -> SealResult<Vec<u8>> {
        if self.windows > 0 || self.carry {
            return Err(SealError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                "preamble must be read before the first window",
            )));
        }
        let mut out = vec![0u8; len];
        let filled = fill(&mut self.inner, &mut out)?;
        out.truncate(filled);
        Ok(out)
    }

    /// Next window, or `None` once the last window has been returned.
    ///
    /// Every window except the last is exactly `bound` bytes. The last may be
    /// shorter, and is empty only when the whole source was empty (or fully
    /// consumed by the preamble).
    pub fn next_window(&mut self) -> SealResult<Option<Window<'_>>> {
        if self.finished {
            return Ok(None);
        }

        let mut filled = 0;
        if self.carry {
            self.buf[0] = self.buf[self.bound];
            self.carry = false;
            filled = 1;
        }
        filled += fill(&mut self.inner, &mut self.buf[filled..])?;

        let is_last = filled <= self.bound;
        let len = if is_last {
            self.finished = true;
            filled
        } else {
            self.carry = true;
            self.bound
        };

        let index = self.windows;
        self.windows += 1;
        self.bytes += len as u64;
        tracing::trace!(index, len, is_last, "window");

        Ok(Some(Window {
            index,
            data: &self.buf[..len],
            is_last,
        }))
    }
}

/// Fill `buf` from `reader`, tolerating short reads. Returns bytes read;
/// less than `buf.len()` means end-of-input.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> SealResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
