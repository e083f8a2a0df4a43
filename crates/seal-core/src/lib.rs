//! seal-core: types shared by every sealstream crate
//!
//! - `error`: the `SealError` taxonomy returned by the library crates
//! - `config`: config file schema (logging and output behaviour)

pub mod config;
pub mod error;

pub use config::SealConfig;
pub use error::{SealError, SealResult};

/// Plaintext bytes per chunk. Part of the wire format: every chunk except the
/// last carries exactly this many plaintext bytes.
pub const CHUNK_SIZE: usize = 16 * 1024;
