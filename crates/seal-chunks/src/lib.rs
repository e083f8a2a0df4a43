//! seal-chunks: fixed-size window framing for sealstream
//!
//! # Overview
//! - `reader`: `ChunkReader` splits a byte source into windows of at most
//!   `bound` bytes and knows which window is the last one
//! - `writer`: `ChunkWriter` writes windows to a sink, enforcing the same bound
//!
//! Neither side holds cryptographic state.

pub mod reader;
pub mod writer;

pub use reader::{ChunkReader, Window};
pub use writer::ChunkWriter;
