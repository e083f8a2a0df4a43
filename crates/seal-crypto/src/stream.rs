//! Chunked secret streams: push (encrypt) and pull (decrypt) directions
//!
//! Wire format (binary):
//! ```text
//! Header:  [4 bytes: "SLST"][1 byte: version][24 bytes: random salt]
//! Chunk i: XChaCha20-Poly1305(subkey, nonce = prefix || i_be64, AAD = caller AD)
//!          over [1 byte: tag][N bytes: data] → [1 + N bytes][16 bytes: Poly1305 tag]
//! ```
//!
//! A stream state is typed by direction and is neither `Clone` nor `Copy`:
//! once a chunk is pushed or pulled the state has moved on for good.

use std::marker::PhantomData;

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use seal_core::{SealError, SealResult};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::keys::StreamKey;
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

pub const HEADER_MAGIC: [u8; 4] = *b"SLST";
pub const HEADER_VERSION: u8 = 1;
const SALT_SIZE: usize = 24;

/// Header size in bytes: magic (4) + version (1) + salt (24)
pub const HEADER_SIZE: usize = HEADER_MAGIC.len() + 1 + SALT_SIZE;

/// Bytes added to every chunk: encrypted tag byte + Poly1305 tag
pub const AUTH_OVERHEAD: usize = 1 + TAG_SIZE;

const NONCE_PREFIX_SIZE: usize = NONCE_SIZE - 8;
const HKDF_INFO: &[u8] = b"sealstream v1 chunk key";

/// Per-chunk marker, encrypted and authenticated with the chunk data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Any chunk but the last
    Message,
    /// The last chunk of the stream
    Final,
}

impl Tag {
    const MESSAGE_BYTE: u8 = 0x00;
    const FINAL_BYTE: u8 = 0x03;

    fn to_byte(self) -> u8 {
        match self {
            Tag::Message => Self::MESSAGE_BYTE,
            Tag::Final => Self::FINAL_BYTE,
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            Self::MESSAGE_BYTE => Some(Tag::Message),
            Self::FINAL_BYTE => Some(Tag::Final),
            _ => None,
        }
    }
}

/// Public per-stream value written once before the first chunk.
#[derive(Clone, PartialEq, Eq)]
pub struct Header([u8; HEADER_SIZE]);

impl Header {
    fn generate() -> Self {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..HEADER_MAGIC.len()].copy_from_slice(&HEADER_MAGIC);
        bytes[HEADER_MAGIC.len()] = HEADER_VERSION;
        OsRng.fill_bytes(&mut bytes[HEADER_MAGIC.len() + 1..]);
        Self(bytes)
    }

    /// Parse a header read from a ciphertext stream.
    pub fn from_bytes(bytes: &[u8]) -> SealResult<Self> {
        if bytes.len() != HEADER_SIZE {
            return Err(SealError::Header(format!(
                "expected {HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[..HEADER_MAGIC.len()] != HEADER_MAGIC {
            return Err(SealError::Header("bad magic: not a sealstream file".into()));
        }
        let version = bytes[HEADER_MAGIC.len()];
        if version != HEADER_VERSION {
            return Err(SealError::Header(format!(
                "unsupported version {version} (expected {HEADER_VERSION})"
            )));
        }
        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; HEADER_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Header").field(&hex::encode(self.0)).finish()
    }
}

/// Encrypting direction
#[derive(Debug)]
pub struct Push(());

/// Decrypting direction
#[derive(Debug)]
pub struct Pull(());

/// Stream cipher state for one direction of one stream.
///
/// The chunk subkey lives inside the AEAD instance, which zeroizes it on drop.
pub struct SecretStream<D> {
    cipher: XChaCha20Poly1305,
    nonce_prefix: Zeroizing<[u8; NONCE_PREFIX_SIZE]>,
    counter: u64,
    /// Set after the final chunk or after any failure; no further chunks are accepted
    finished: bool,
    _direction: PhantomData<D>,
}

impl<D> SecretStream<D> {
    fn derive(key: &StreamKey, header: &Header) -> SealResult<Self> {
        let hk = Hkdf::<Sha256>::new(Some(&header.0[..]), key.as_bytes());
        let mut okm = Zeroizing::new([0u8; KEY_SIZE + NONCE_PREFIX_SIZE]);
        hk.expand(HKDF_INFO, &mut okm[..])
            .map_err(|e| SealError::Encryption(format!("HKDF expand failed: {e}")))?;

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&okm[..KEY_SIZE]));
        let mut nonce_prefix = Zeroizing::new([0u8; NONCE_PREFIX_SIZE]);
        nonce_prefix.copy_from_slice(&okm[KEY_SIZE..]);

        Ok(Self {
            cipher,
            nonce_prefix,
            counter: 0,
            finished: false,
            _direction: PhantomData,
        })
    }

    /// Index of the next chunk to be pushed or pulled
    pub fn chunk_index(&self) -> u64 {
        self.counter
    }

    /// True once the final chunk has been processed or the stream failed
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn nonce(&self) -> SealResult<XNonce> {
        if self.finished {
            return Err(SealError::StreamFinished);
        }
        if self.counter == u64::MAX {
            return Err(SealError::CounterExhausted);
        }
        let mut bytes = [0u8; NONCE_SIZE];
        bytes[..NONCE_PREFIX_SIZE].copy_from_slice(&self.nonce_prefix[..]);
        bytes[NONCE_PREFIX_SIZE..].copy_from_slice(&self.counter.to_be_bytes());
        Ok(*XNonce::from_slice(&bytes))
    }

    fn advance(&mut self, tag: Tag) {
        self.counter += 1;
        if tag == Tag::Final {
            self.finished = true;
        }
    }
}

impl SecretStream<Push> {
    /// Start a new stream under `key` with a freshly generated header.
    pub fn init_push(key: &StreamKey) -> SealResult<(Header, Self)> {
        let header = Header::generate();
        let stream = Self::derive(key, &header)?;
        tracing::debug!(header = ?header, "push stream initialised");
        Ok((header, stream))
    }

    /// Encrypt one chunk. Output is `chunk.len() + AUTH_OVERHEAD` bytes.
    ///
    /// `tag` must be `Final` for the last chunk and only for the last chunk;
    /// pushing after `Final` returns `StreamFinished`.
    pub fn push(&mut self, chunk: &[u8], tag: Tag) -> SealResult<Vec<u8>> {
        self.push_with_ad(chunk, &[], tag)
    }

    /// Like `push`, additionally authenticating `ad` (not included in the output).
    pub fn push_with_ad(&mut self, chunk: &[u8], ad: &[u8], tag: Tag) -> SealResult<Vec<u8>> {
        let nonce = self.nonce()?;

        let mut buf = Vec::with_capacity(chunk.len() + AUTH_OVERHEAD);
        buf.push(tag.to_byte());
        buf.extend_from_slice(chunk);

        if let Err(e) = self.cipher.encrypt_in_place(&nonce, ad, &mut buf) {
            buf.zeroize();
            self.finished = true;
            return Err(SealError::Encryption(format!(
                "chunk {} encryption failed: {e}",
                self.counter
            )));
        }

        self.advance(tag);
        Ok(buf)
    }
}

impl SecretStream<Pull> {
    /// Resume a stream from its header. Header problems surface here as
    /// `SealError::Header`; a wrong key only shows up on the first `pull`.
    pub fn init_pull(key: &StreamKey, header: &Header) -> SealResult<Self> {
        let stream = Self::derive(key, header)?;
        tracing::debug!(header = ?header, "pull stream initialised");
        Ok(stream)
    }

    /// Verify and decrypt one chunk.
    ///
    /// On failure nothing is returned and the stream is poisoned: every later
    /// call returns `StreamFinished`.
    pub fn pull(&mut self, cipher_chunk: &[u8]) -> SealResult<(Zeroizing<Vec<u8>>, Tag)> {
        self.pull_with_ad(cipher_chunk, &[])
    }

    /// Like `pull`, for chunks pushed with associated data `ad`.
    pub fn pull_with_ad(
        &mut self,
        cipher_chunk: &[u8],
        ad: &[u8],
    ) -> SealResult<(Zeroizing<Vec<u8>>, Tag)> {
        let nonce = self.nonce()?;
        let chunk = self.counter;

        if cipher_chunk.len() < AUTH_OVERHEAD {
            return Err(self.fail(chunk));
        }

        let mut buf = Zeroizing::new(cipher_chunk.to_vec());
        if self.cipher.decrypt_in_place(&nonce, ad, &mut *buf).is_err() {
            return Err(self.fail(chunk));
        }

        let Some(tag) = buf.first().copied().and_then(Tag::from_byte) else {
            return Err(self.fail(chunk));
        };
        buf.remove(0);

        self.advance(tag);
        Ok((buf, tag))
    }

    fn fail(&mut self, chunk: u64) -> SealError {
        self.finished = true;
        tracing::warn!(chunk, "chunk authentication failed");
        SealError::Authentication { chunk }
    }
}

impl<D> std::fmt::Debug for SecretStream<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStream")
            .field("direction", &std::any::type_name::<D>())
            .field("counter", &self.counter)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;
    use proptest::prelude::*;

    fn seal_chunks(key: &StreamKey, chunks: &[&[u8]]) -> (Header, Vec<Vec<u8>>) {
        let (header, mut push) = SecretStream::init_push(key).unwrap();
        let last = chunks.len() - 1;
        let sealed = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let tag = if i == last { Tag::Final } else { Tag::Message };
                push.push(c, tag).unwrap()
            })
            .collect();
        (header, sealed)
    }

    #[test]
    fn test_push_pull_roundtrip() {
        let key = generate_key();
        let (header, sealed) = seal_chunks(&key, &[b"first", b"second", b"third"]);

        let mut pull = SecretStream::init_pull(&key, &header).unwrap();
        let (p0, t0) = pull.pull(&sealed[0]).unwrap();
        let (p1, t1) = pull.pull(&sealed[1]).unwrap();
        let (p2, t2) = pull.pull(&sealed[2]).unwrap();

        assert_eq!(&p0[..], b"first");
        assert_eq!(&p1[..], b"second");
        assert_eq!(&p2[..], b"third");
        assert_eq!((t0, t1, t2), (Tag::Message, Tag::Message, Tag::Final));
        assert!(pull.is_finished());
    }

    #[test]
    fn test_cipher_chunk_size() {
        let key = generate_key();
        let (_, mut push) = SecretStream::init_push(&key).unwrap();
        let sealed = push.push(&[0u8; 1000], Tag::Final).unwrap();
        // tag byte (1) + plaintext (1000) + Poly1305 (16)
        assert_eq!(sealed.len(), 1000 + AUTH_OVERHEAD);
        assert_eq!(AUTH_OVERHEAD, 17);
    }

    #[test]
    fn test_empty_final_chunk() {
        let key = generate_key();
        let (header, sealed) = seal_chunks(&key, &[b""]);
        assert_eq!(sealed[0].len(), AUTH_OVERHEAD);

        let mut pull = SecretStream::init_pull(&key, &header).unwrap();
        let (plain, tag) = pull.pull(&sealed[0]).unwrap();
        assert!(plain.is_empty());
        assert_eq!(tag, Tag::Final);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = generate_key();
        let other = generate_key();
        let (header, sealed) = seal_chunks(&key, &[b"secret data"]);

        let mut pull = SecretStream::init_pull(&other, &header).unwrap();
        assert!(matches!(
            pull.pull(&sealed[0]),
            Err(SealError::Authentication { chunk: 0 })
        ));
    }

    #[test]
    fn test_reordered_chunks_fail() {
        let key = generate_key();
        let (header, sealed) = seal_chunks(&key, &[b"a", b"b", b"c"]);

        let mut pull = SecretStream::init_pull(&key, &header).unwrap();
        assert!(
            matches!(pull.pull(&sealed[1]), Err(SealError::Authentication { chunk: 0 })),
            "chunk 1 presented at position 0 must fail"
        );
    }

    #[test]
    fn test_failure_poisons_stream() {
        let key = generate_key();
        let (header, sealed) = seal_chunks(&key, &[b"a", b"b"]);

        let mut pull = SecretStream::init_pull(&key, &header).unwrap();
        let mut bad = sealed[0].clone();
        bad[0] ^= 0x01;
        assert!(pull.pull(&bad).is_err());
        assert!(matches!(pull.pull(&sealed[0]), Err(SealError::StreamFinished)));
    }

    #[test]
    fn test_push_after_final_is_refused() {
        let key = generate_key();
        let (_, mut push) = SecretStream::init_push(&key).unwrap();
        push.push(b"last", Tag::Final).unwrap();
        assert!(matches!(
            push.push(b"more", Tag::Message),
            Err(SealError::StreamFinished)
        ));
    }

    #[test]
    fn test_pull_after_final_is_refused() {
        let key = generate_key();
        let (header, sealed) = seal_chunks(&key, &[b"only"]);
        let mut pull = SecretStream::init_pull(&key, &header).unwrap();
        pull.pull(&sealed[0]).unwrap();
        assert!(matches!(pull.pull(&sealed[0]), Err(SealError::StreamFinished)));
    }

    #[test]
    fn test_short_cipher_chunk_fails() {
        let key = generate_key();
        let (header, _) = seal_chunks(&key, &[b"x"]);
        let mut pull = SecretStream::init_pull(&key, &header).unwrap();
        assert!(matches!(
            pull.pull(&[0u8; AUTH_OVERHEAD - 1]),
            Err(SealError::Authentication { chunk: 0 })
        ));
    }

    #[test]
    fn test_associated_data_is_bound() {
        let key = generate_key();
        let (header, mut push) = SecretStream::init_push(&key).unwrap();
        let sealed = push.push_with_ad(b"payload", b"file-a", Tag::Final).unwrap();

        let mut pull = SecretStream::init_pull(&key, &header).unwrap();
        assert!(pull.pull_with_ad(&sealed, b"file-b").is_err());

        let mut pull = SecretStream::init_pull(&key, &header).unwrap();
        let (plain, _) = pull.pull_with_ad(&sealed, b"file-a").unwrap();
        assert_eq!(&plain[..], b"payload");
    }

    #[test]
    fn test_headers_are_fresh() {
        let key = generate_key();
        let (h1, mut s1) = SecretStream::init_push(&key).unwrap();
        let (h2, mut s2) = SecretStream::init_push(&key).unwrap();
        assert_ne!(h1, h2);
        assert_ne!(
            s1.push(b"same", Tag::Final).unwrap(),
            s2.push(b"same", Tag::Final).unwrap()
        );
    }

    #[test]
    fn test_header_validation() {
        let key = generate_key();
        let (header, _) = SecretStream::init_push(&key).unwrap();
        let bytes = header.as_bytes();

        assert_eq!(Header::from_bytes(bytes).unwrap(), header);
        assert!(matches!(
            Header::from_bytes(&bytes[..HEADER_SIZE - 1]),
            Err(SealError::Header(_))
        ));

        let mut bad_magic = *bytes;
        bad_magic[0] ^= 0x20;
        assert!(matches!(Header::from_bytes(&bad_magic), Err(SealError::Header(_))));

        let mut bad_version = *bytes;
        bad_version[4] = 2;
        assert!(matches!(Header::from_bytes(&bad_version), Err(SealError::Header(_))));
    }

    #[test]
    fn test_salt_change_breaks_authentication() {
        let key = generate_key();
        let (header, sealed) = seal_chunks(&key, &[b"data"]);
        let mut bytes = *header.as_bytes();
        bytes[HEADER_SIZE - 1] ^= 0x80;
        let altered = Header::from_bytes(&bytes).unwrap();

        let mut pull = SecretStream::init_pull(&key, &altered).unwrap();
        assert!(pull.pull(&sealed[0]).is_err());
    }

    #[test]
    fn test_push_counter_exhaustion() {
        let key = generate_key();
        let (_, mut push) = SecretStream::init_push(&key).unwrap();
        push.counter = u64::MAX - 1;

        push.push(b"last usable nonce", Tag::Message).unwrap();
        assert_eq!(push.chunk_index(), u64::MAX);
        assert!(matches!(
            push.push(b"one too many", Tag::Message),
            Err(SealError::CounterExhausted)
        ));
    }

    #[test]
    fn test_pull_counter_exhaustion() {
        let key = generate_key();
        let (header, mut push) = SecretStream::init_push(&key).unwrap();
        push.counter = u64::MAX - 1;
        let sealed = push.push(b"last usable nonce", Tag::Message).unwrap();

        let mut pull = SecretStream::init_pull(&key, &header).unwrap();
        pull.counter = u64::MAX - 1;
        let (plain, tag) = pull.pull(&sealed).unwrap();
        assert_eq!(&plain[..], b"last usable nonce");
        assert_eq!(tag, Tag::Message);

        assert!(matches!(pull.pull(&sealed), Err(SealError::CounterExhausted)));
    }

    #[test]
    fn test_debug_hides_state() {
        let key = generate_key();
        let (_, push) = SecretStream::init_push(&key).unwrap();
        let debug = format!("{push:?}");
        assert!(debug.contains("counter"));
        assert!(!debug.contains("cipher"));
    }

    proptest! {
        /// Flipping any single bit of a sealed chunk must fail authentication
        #[test]
        fn bit_flip_detected(
            data in proptest::collection::vec(any::<u8>(), 0..=256),
            bit in any::<proptest::sample::Index>(),
        ) {
            let key = generate_key();
            let (header, mut push) = SecretStream::init_push(&key).unwrap();
            let mut sealed = push.push(&data, Tag::Final).unwrap();

            let bit = bit.index(sealed.len() * 8);
            sealed[bit / 8] ^= 1 << (bit % 8);

            let mut pull = SecretStream::init_pull(&key, &header).unwrap();
            let is_auth_failure = matches!(pull.pull(&sealed), Err(SealError::Authentication { .. }));
            prop_assert!(is_auth_failure);
        }
    }
}
