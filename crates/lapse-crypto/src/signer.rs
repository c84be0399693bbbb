use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rsa::RsaPrivateKey;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::PrivateKey;

/// Modulus size used by `lapse keygen` unless told otherwise.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Sign `data` and return the standard-base64 signature.
///
/// Bit-compatible with [`SignatureAuthenticator::verify`](crate::SignatureAuthenticator::verify):
/// SHA-256 digest, PKCS#1 v1.5 padding.
pub fn sign(data: &[u8], key: &PrivateKey) -> CryptoResult<String> {
    let signature = key.sign_raw(data)?;
    Ok(BASE64.encode(signature))
}

/// Load a PEM private key from disk and sign `data` with it.
pub fn sign_with_key_file(data: &[u8], key_path: &Path) -> CryptoResult<String> {
    let key = PrivateKey::from_file(key_path)?;
    sign(data, &key)
}

/// Generate a fresh RSA keypair.
pub fn generate_keypair(bits: usize) -> CryptoResult<PrivateKey> {
    let mut rng = rand::rngs::OsRng;
    RsaPrivateKey::new(&mut rng, bits)
        .map(PrivateKey::Rsa)
        .map_err(|e| CryptoError::Signing(format!("key generation failed: {e}")))
}
