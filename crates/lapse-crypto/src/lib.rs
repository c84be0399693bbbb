//! Cryptographic primitives for Lapse.
//!
//! Mutating requests are authenticated with RSA PKCS#1 v1.5 signatures over a
//! SHA-256 digest, transported as standard base64. This crate provides:
//!
//! - [`keys`]: PEM key material loading into tagged key variants
//! - [`signer`]: signing ([`sign`]) and key generation
//! - [`authenticator`]: the verifying side, with a hot-swappable public key
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod authenticator;
pub mod error;
pub mod keys;
pub mod signer;

pub use authenticator::SignatureAuthenticator;
pub use error::{CryptoError, CryptoResult};
pub use keys::{KeyAlgorithm, PrivateKey, PublicKey};
pub use signer::{generate_keypair, sign, sign_with_key_file, DEFAULT_KEY_BITS};
