//! Encrypt/decrypt drivers
//!
//! Data flow:
//!   - encrypt: source → `ChunkReader(CHUNK_SIZE)` → `SecretStream<Push>` → `ChunkWriter` → sink
//!   - decrypt: source → `ChunkReader(CHUNK_SIZE + AUTH_OVERHEAD)` → `SecretStream<Pull>` → `ChunkWriter` → sink
//!
//! The encryptor tags exactly the last window `Final`. The decryptor only
//! reports success after verifying a `Final` chunk that is also the last
//! window of the input; anything else is `TruncatedStream` or `TrailingData`.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use seal_chunks::{ChunkReader, ChunkWriter};
use seal_core::{SealError, SealResult, CHUNK_SIZE};
use seal_crypto::{Header, SecretStream, StreamKey, Tag, AUTH_OVERHEAD, HEADER_SIZE};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::cancel::CancelToken;

/// Progress callback type (bytes_done, bytes_total, message).
/// `bytes_total` is 0 when the input size is unknown.
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// Per-run knobs for the drivers
#[derive(Default)]
pub struct EngineOptions<'a> {
    pub progress: Option<&'a ProgressFn>,
    pub cancel: Option<&'a CancelToken>,
    /// File outputs only: write to a temporary file beside the destination
    /// and rename it into place on success
    pub atomic_output: bool,
}

impl EngineOptions<'_> {
    fn check_cancelled(&self) -> SealResult<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(SealError::Cancelled),
            _ => Ok(()),
        }
    }

    fn report(&self, done: u64, total: u64, msg: &str) {
        if let Some(progress) = self.progress {
            progress(done, total, msg);
        }
    }
}

/// Result of one encrypt or decrypt run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub chunks: u64,
    pub plaintext_bytes: u64,
    /// Header included
    pub ciphertext_bytes: u64,
}

// ── Streams ───────────────────────────────────────────────────────────────────

/// Encrypt everything `input` yields into `output` under `key`.
pub fn encrypt_stream<R: Read, W: Write>(
    key: &StreamKey,
    input: R,
    output: W,
    opts: &EngineOptions<'_>,
) -> SealResult<StreamSummary> {
    encrypt_inner(key, input, output, opts, 0)
}

/// Decrypt a stream produced by `encrypt_stream`.
///
/// Plaintext of each verified chunk is written as soon as it is verified, so
/// on failure `output` may already hold a verified prefix of the plaintext.
pub fn decrypt_stream<R: Read, W: Write>(
    key: &StreamKey,
    input: R,
    output: W,
    opts: &EngineOptions<'_>,
) -> SealResult<StreamSummary> {
    decrypt_inner(key, input, output, opts, 0)
}

fn encrypt_inner<R: Read, W: Write>(
    key: &StreamKey,
    input: R,
    output: W,
    opts: &EngineOptions<'_>,
    total: u64,
) -> SealResult<StreamSummary> {
    let mut reader = ChunkReader::new(input, CHUNK_SIZE)?;
    let mut writer = ChunkWriter::new(output, CHUNK_SIZE + AUTH_OVERHEAD);

    let (header, mut stream) = SecretStream::init_push(key)?;
    writer.write_preamble(header.as_bytes())?;

    while let Some(window) = reader.next_window()? {
        opts.check_cancelled()?;
        let tag = if window.is_last { Tag::Final } else { Tag::Message };
        let sealed = stream.push(window.data, tag)?;
        writer.write_window(&sealed)?;
        opts.report(reader.bytes_read(), total, "encrypting");
    }

    let summary = StreamSummary {
        chunks: stream.chunk_index(),
        plaintext_bytes: reader.bytes_read(),
        ciphertext_bytes: writer.bytes_written(),
    };
    writer.finish()?;

    debug!(
        chunks = summary.chunks,
        plaintext_bytes = summary.plaintext_bytes,
        ciphertext_bytes = summary.ciphertext_bytes,
        "stream encrypted"
    );
    Ok(summary)
}

fn decrypt_inner<R: Read, W: Write>(
    key: &StreamKey,
    input: R,
    output: W,
    opts: &EngineOptions<'_>,
    total: u64,
) -> SealResult<StreamSummary> {
    let mut reader = ChunkReader::new(input, CHUNK_SIZE + AUTH_OVERHEAD)?;
    let mut writer = ChunkWriter::new(output, CHUNK_SIZE);

    let header_bytes = reader.read_preamble(HEADER_SIZE)?;
    let header = Header::from_bytes(&header_bytes)?;
    let mut stream = SecretStream::init_pull(key, &header)?;

    let mut saw_final = false;
    while let Some(window) = reader.next_window()? {
        opts.check_cancelled()?;
        if window.data.is_empty() {
            // nothing after the header
            break;
        }
        let is_last = window.is_last;
        let (plain, tag) = stream.pull(window.data)?;

        match (tag, is_last) {
            (Tag::Message, false) => writer.write_window(&plain)?,
            (Tag::Final, true) => {
                writer.write_window(&plain)?;
                saw_final = true;
            }
            (Tag::Final, false) => {
                warn!(chunks = stream.chunk_index(), "data follows the final chunk");
                return Err(SealError::TrailingData {
                    chunks: stream.chunk_index(),
                });
            }
            (Tag::Message, true) => break,
        }
        opts.report(reader.bytes_read() + HEADER_SIZE as u64, total, "decrypting");
    }

    if !saw_final {
        warn!(chunks = stream.chunk_index(), "input ended before the final chunk");
        return Err(SealError::TruncatedStream {
            chunks: stream.chunk_index(),
        });
    }

    let summary = StreamSummary {
        chunks: stream.chunk_index(),
        plaintext_bytes: writer.bytes_written(),
        ciphertext_bytes: reader.bytes_read() + HEADER_SIZE as u64,
    };
    writer.finish()?;

    debug!(
        chunks = summary.chunks,
        plaintext_bytes = summary.plaintext_bytes,
        "stream decrypted"
    );
    Ok(summary)
}

// ── In-memory ─────────────────────────────────────────────────────────────────

/// Encrypt a byte slice into a complete ciphertext stream.
pub fn encrypt_bytes(key: &StreamKey, plaintext: &[u8]) -> SealResult<Vec<u8>> {
    let mut out = Vec::with_capacity(ciphertext_len(plaintext.len() as u64) as usize);
    encrypt_stream(key, plaintext, &mut out, &EngineOptions::default())?;
    Ok(out)
}

/// Decrypt a complete ciphertext stream held in memory.
pub fn decrypt_bytes(key: &StreamKey, ciphertext: &[u8]) -> SealResult<Zeroizing<Vec<u8>>> {
    let mut out = Zeroizing::new(Vec::with_capacity(ciphertext.len()));
    decrypt_stream(key, ciphertext, &mut *out, &EngineOptions::default())?;
    Ok(out)
}

/// Exact ciphertext size for a plaintext of `plaintext_len` bytes.
pub fn ciphertext_len(plaintext_len: u64) -> u64 {
    let chunk = CHUNK_SIZE as u64;
    let chunks = plaintext_len.div_ceil(chunk).max(1);
    HEADER_SIZE as u64 + plaintext_len + chunks * AUTH_OVERHEAD as u64
}

// ── Files ─────────────────────────────────────────────────────────────────────

/// Encrypt the file at `input` into `output`.
pub fn encrypt_file(
    key: &StreamKey,
    input: &Path,
    output: &Path,
    opts: &EngineOptions<'_>,
) -> SealResult<StreamSummary> {
    check_distinct(input, output)?;
    let file = File::open(input)?;
    let total = file.metadata()?.len();

    let summary = write_output(output, opts.atomic_output, |sink| {
        encrypt_inner(key, BufReader::new(file), sink, opts, total)
    })?;

    info!(
        input = %input.display(),
        output = %output.display(),
        chunks = summary.chunks,
        bytes = summary.plaintext_bytes,
        "encrypted"
    );
    Ok(summary)
}

/// Decrypt the file at `input` into `output`.
///
/// With `atomic_output`, `output` is only created once the whole stream has
/// been verified; otherwise a failed run can leave a verified prefix behind.
pub fn decrypt_file(
    key: &StreamKey,
    input: &Path,
    output: &Path,
    opts: &EngineOptions<'_>,
) -> SealResult<StreamSummary> {
    check_distinct(input, output)?;
    let file = File::open(input)?;
    let total = file.metadata()?.len();

    let summary = write_output(output, opts.atomic_output, |sink| {
        decrypt_inner(key, BufReader::new(file), sink, opts, total)
    })?;

    info!(
        input = %input.display(),
        output = %output.display(),
        chunks = summary.chunks,
        bytes = summary.plaintext_bytes,
        "decrypted"
    );
    Ok(summary)
}

fn write_output<F>(output: &Path, atomic: bool, run: F) -> SealResult<StreamSummary>
where
    F: FnOnce(&mut dyn Write) -> SealResult<StreamSummary>,
{
    if !atomic {
        let mut sink = BufWriter::new(File::create(output)?);
        let summary = run(&mut sink)?;
        sink.flush()?;
        return Ok(summary);
    }

    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::Builder::new()
        .prefix(".seal-")
        .suffix(".partial")
        .tempfile_in(dir)?;

    // On any error `tmp` is dropped here, which deletes it.
    let summary = {
        let mut sink = BufWriter::new(tmp.as_file());
        let summary = run(&mut sink)?;
        sink.flush()?;
        summary
    };
    tmp.as_file().sync_all()?;
    tmp.persist(output).map_err(|e| SealError::Io(e.error))?;
    debug!(output = %output.display(), "output renamed into place");
    Ok(summary)
}

/// Refuse to read and write the same file: the output would clobber the input.
fn check_distinct(input: &Path, output: &Path) -> SealResult<()> {
    let (Ok(a), Ok(b)) = (input.canonicalize(), output.canonicalize()) else {
        return Ok(());
    };
    if a == b {
        return Err(SealError::Io(std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("input and output are the same file: {}", a.display()),
        )));
    }
    Ok(())
}
