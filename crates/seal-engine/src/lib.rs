//! seal-engine: drives sealstream encryption and decryption
//!
//! - `engine`: `encrypt_stream` / `decrypt_stream` over any `Read`/`Write`,
//!   plus file and in-memory wrappers
//! - `cancel`: `CancelToken`, checked between chunks

pub mod cancel;
pub mod engine;

pub use cancel::CancelToken;
pub use engine::{
    ciphertext_len, decrypt_bytes, decrypt_file, decrypt_stream, encrypt_bytes, encrypt_file,
    encrypt_stream, EngineOptions, ProgressFn, StreamSummary,
};
