/// Errors from key handling, signing, and verification.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The signature is well-formed but does not verify.
    #[error("invalid signature")]
    InvalidSignature,

    /// The signature could not be decoded (bad base64, wrong length).
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// Public key material is missing or unparsable.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Private key material is unparsable.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// The key parses but uses an algorithm we do not verify with.
    #[error("unsupported key algorithm: {0}")]
    UnsupportedKeyAlgorithm(String),

    /// No public key has been loaded into the authenticator.
    #[error("no public key loaded")]
    MissingPublicKey,

    /// The signing operation itself failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Reading key material from disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// Returns `true` for errors caused by key material rather than by the
    /// signature or the data.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPublicKey(_)
                | Self::InvalidPrivateKey(_)
                | Self::UnsupportedKeyAlgorithm(_)
                | Self::MissingPublicKey
        )
    }
}

/// Result alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
