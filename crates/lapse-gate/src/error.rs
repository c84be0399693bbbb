use lapse_crypto::CryptoError;

/// Reasons a request fails authorization.
///
/// These are for logs and diagnostics. Callers answering a client should use
/// [`Rejection::public_message`](crate::Rejection::public_message) instead so
/// the response never reveals which check failed.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// A required header is absent.
    #[error("missing header {0}")]
    MissingHeader(&'static str),

    /// A required header is present but empty.
    #[error("malformed header {0}")]
    MalformedHeader(&'static str),

    /// The timestamp header is not RFC 3339.
    #[error("malformed timestamp {0:?}")]
    MalformedTimestamp(String),

    /// The timestamp is outside the freshness window. Positive skew means
    /// the timestamp is in the past.
    #[error("timestamp skew {skew_secs}s exceeds tolerance of {tolerance_secs}s")]
    TimestampOutOfRange { skew_secs: i64, tolerance_secs: u64 },

    /// The signature does not match the canonical string.
    #[error("invalid signature")]
    InvalidSignature,

    /// Signature decoding failed or no key is loaded.
    #[error(transparent)]
    Crypto(CryptoError),
}

impl From<CryptoError> for GateError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidSignature => Self::InvalidSignature,
            other => Self::Crypto(other),
        }
    }
}

/// Result alias for gate operations.
pub type GateResult<T> = Result<T, GateError>;
