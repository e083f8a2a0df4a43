//! seal-crypto: key material and chunked authenticated encryption for sealstream
//!
//! Architecture: one-shot stream key → per-stream subkey → XChaCha20-Poly1305 per chunk
//!
//! ```text
//! Stream Key (256-bit random, handed to the decryptor out of band)
//!   └── Header (magic || version || 192-bit random salt), sent in clear
//!       └── HKDF-SHA256(ikm=key, salt=header) → chunk subkey (256-bit) || nonce prefix (128-bit)
//!           └── Chunk i: XChaCha20-Poly1305(nonce = prefix || i), plaintext = tag byte || data
//! ```
//!
//! The chunk counter in the nonce binds every chunk to its position and the
//! encrypted tag byte marks the final chunk, so reordering, dropping, or
//! truncating chunks is detected.

pub mod keys;
pub mod stream;

pub use keys::{decode_hex, encode_hex, generate_key, StreamKey};
pub use stream::{Header, Pull, Push, SecretStream, Tag, AUTH_OVERHEAD, HEADER_SIZE};

/// Size of a stream key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;
