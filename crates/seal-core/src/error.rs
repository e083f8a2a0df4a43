use thiserror::Error;

pub type SealResult<T> = Result<T, SealError>;

/// Every failure is fatal to the stream it occurred in; there is no retry.
#[derive(Debug, Error)]
pub enum SealError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid key: {0}")]
    KeyFormat(String),

    #[error("invalid stream header: {0}")]
    Header(String),

    #[error("authentication failed at chunk {chunk}: ciphertext is corrupted, tampered, reordered, or the key is wrong")]
    Authentication { chunk: u64 },

    #[error("stream truncated: input ended after {chunks} chunk(s) without a final chunk")]
    TruncatedStream { chunks: u64 },

    #[error("unexpected data after final chunk {chunks}")]
    TrailingData { chunks: u64 },

    #[error("stream already finished")]
    StreamFinished,

    #[error("chunk counter exhausted")]
    CounterExhausted,

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),
}

impl SealError {
    /// True for failures that mean the ciphertext itself cannot be trusted,
    /// as opposed to I/O, configuration, or caller errors.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            SealError::Header(_)
                | SealError::Authentication { .. }
                | SealError::TruncatedStream { .. }
                | SealError::TrailingData { .. }
        )
    }
}
