//! Stream key generation, hex encoding, and release

use rand::rngs::OsRng;
use rand::RngCore;
use seal_core::{SealError, SealResult};
use zeroize::{Zeroize, Zeroizing};

use crate::KEY_SIZE;

/// Length of a hex-encoded key
pub const KEY_HEX_LEN: usize = KEY_SIZE * 2;

/// A 256-bit stream key. Zeroized on drop.
///
/// Deliberately not `Clone`: the only copy lives here, and the cipher state
/// derived from it zeroizes its own subkey.
pub struct StreamKey {
    bytes: [u8; KEY_SIZE],
}

impl StreamKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Zeroize and drop the key now rather than at end of scope.
    pub fn release(self) {
        drop(self);
    }

    fn wipe(&mut self) {
        self.bytes.zeroize();
    }
}

impl Drop for StreamKey {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl std::fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit stream key from the OS CSPRNG.
pub fn generate_key() -> StreamKey {
    let mut key = StreamKey::from_bytes([0u8; KEY_SIZE]);
    OsRng.fill_bytes(&mut key.bytes);
    key
}

/// Lowercase hex, exactly 64 characters. Zeroized on drop.
pub fn encode_hex(key: &StreamKey) -> Zeroizing<String> {
    Zeroizing::new(hex::encode(&key.bytes))
}

/// Parse a 64-character hex key. Decodes straight into the key buffer so no
/// other copy of the secret is left behind.
pub fn decode_hex(s: &str) -> SealResult<StreamKey> {
    if s.len() != KEY_HEX_LEN {
        return Err(SealError::KeyFormat(format!(
            "expected {KEY_HEX_LEN} hex characters, got {}",
            s.len()
        )));
    }
    let mut key = StreamKey::from_bytes([0u8; KEY_SIZE]);
    hex::decode_to_slice(s, &mut key.bytes)
        .map_err(|_| SealError::KeyFormat("key contains a non-hex character".into()))?;
    Ok(key)
}
