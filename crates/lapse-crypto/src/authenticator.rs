use std::path::Path;
use std::sync::{Arc, RwLock};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::info;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::PublicKey;

/// Verifies request signatures against a hot-swappable public key.
///
/// Any number of [`verify`](Self::verify) calls may run concurrently. A
/// reload parses the new key first and only then swaps it in under the write
/// lock, so a verifier sees either the old key or the new one, and a failed
/// reload leaves the old key in place.
pub struct SignatureAuthenticator {
    key: RwLock<Option<Arc<PublicKey>>>,
}

impl SignatureAuthenticator {
    /// Create an authenticator around an already-parsed key.
    pub fn new(key: PublicKey) -> Self {
        Self {
            key: RwLock::new(Some(Arc::new(key))),
        }
    }

    /// Create an authenticator with no key. Every verification fails with
    /// [`CryptoError::MissingPublicKey`] until a key is loaded.
    pub fn empty() -> Self {
        Self {
            key: RwLock::new(None),
        }
    }

    /// Create an authenticator from PEM text.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        PublicKey::from_pem(pem).map(Self::new)
    }

    /// Create an authenticator from a PEM file.
    pub fn from_file(path: &Path) -> CryptoResult<Self> {
        PublicKey::from_file(path).map(Self::new)
    }

    /// Verify a base64-encoded signature over `data`.
    pub fn verify(&self, data: &[u8], signature: &str) -> CryptoResult<()> {
        let key = self.current_key().ok_or(CryptoError::MissingPublicKey)?;

        let signature = signature.trim();
        if signature.is_empty() {
            return Err(CryptoError::MalformedSignature("empty signature".into()));
        }
        let raw = BASE64
            .decode(signature)
            .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;

        key.verify(data, &raw)
    }

    /// Verify a signature over a UTF-8 string.
    pub fn verify_str(&self, data: &str, signature: &str) -> CryptoResult<()> {
        self.verify(data.as_bytes(), signature)
    }

    /// Reload the public key from a PEM file.
    pub fn reload_public_key(&self, path: &Path) -> CryptoResult<()> {
        let key = PublicKey::from_file(path)?;
        self.replace_public_key(key);
        info!(path = %path.display(), "public key reloaded");
        Ok(())
    }

    /// Reload the public key from PEM text.
    pub fn reload_public_key_pem(&self, pem: &str) -> CryptoResult<()> {
        let key = PublicKey::from_pem(pem)?;
        self.replace_public_key(key);
        info!("public key reloaded");
        Ok(())
    }

    /// Swap in an already-parsed key.
    pub fn replace_public_key(&self, key: PublicKey) {
        let mut slot = self.key.write().expect("public key lock poisoned");
        *slot = Some(Arc::new(key));
    }

    /// The key currently used for verification.
    pub fn current_key(&self) -> Option<Arc<PublicKey>> {
        self.key.read().expect("public key lock poisoned").clone()
    }

    /// Returns `true` if a key is loaded.
    pub fn has_key(&self) -> bool {
        self.key.read().expect("public key lock poisoned").is_some()
    }
}

impl std::fmt::Debug for SignatureAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureAuthenticator")
            .field("key", &self.current_key())
            .finish()
    }
}
