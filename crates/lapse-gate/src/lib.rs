//! Request authorization for Lapse.
//!
//! Mutating requests carry two headers: `X-Timestamp` (RFC 3339) and
//! `X-Signature` (base64 RSA signature over a canonical string built from the
//! method, path and timestamp). The gate walks a fixed state machine over
//! those headers and either authorizes the request or rejects it with the
//! precise internal reason; clients only ever see "unauthorized".
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! use lapse_crypto::{generate_keypair, SignatureAuthenticator};
//! use lapse_gate::{sign_request, AuthorizationGate, GateConfig, RequestParts};
//!
//! let key = generate_keypair(2048).unwrap();
//! let gate = AuthorizationGate::new(
//!     Arc::new(SignatureAuthenticator::new(key.public_key())),
//!     GateConfig::default(),
//! );
//!
//! let headers = sign_request("DELETE", "/api/v1/file/abc", &BTreeMap::new(), &key, chrono::Utc::now()).unwrap();
//! let request = RequestParts::new("DELETE", "/api/v1/file/abc")
//!     .with_auth(headers.signature, headers.timestamp);
//! assert!(gate.authorize(&request).is_ok());
//! ```

pub mod canonical;
pub mod config;
pub mod error;
pub mod gate;
pub mod signing;
pub mod state;

pub use canonical::CanonicalRequest;
pub use config::GateConfig;
pub use error::{GateError, GateResult};
pub use gate::AuthorizationGate;
pub use signing::{format_timestamp, sign_request, SignedHeaders};
pub use state::{
    AuthState, Authorization, Rejection, RequestParts, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, OnceLock};
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use lapse_crypto::{generate_keypair, sign, CryptoError, PrivateKey, SignatureAuthenticator};
    use lapse_types::ManualClock;

    use super::*;

    fn key() -> &'static PrivateKey {
        static KEY: OnceLock<PrivateKey> = OnceLock::new();
        KEY.get_or_init(|| generate_keypair(2048).unwrap())
    }

    fn other_key() -> &'static PrivateKey {
        static KEY: OnceLock<PrivateKey> = OnceLock::new();
        KEY.get_or_init(|| generate_keypair(2048).unwrap())
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    /// Helper: a gate whose clock is pinned at `now()`.
    fn gate() -> AuthorizationGate {
        AuthorizationGate::new(
            Arc::new(SignatureAuthenticator::new(key().public_key())),
            GateConfig::default(),
        )
        .with_clock(Arc::new(ManualClock::new(now())))
    }

    /// Helper: a request signed at `signed_at`.
    fn signed(method: &str, path: &str, signed_at: DateTime<Utc>) -> RequestParts {
        let headers = sign_request(method, path, &BTreeMap::new(), key(), signed_at).unwrap();
        RequestParts::new(method, path).with_auth(headers.signature, headers.timestamp)
    }

    // -----------------------------------------------------------------------
    // 1. A correctly signed, fresh request is authorized
    // -----------------------------------------------------------------------
    #[test]
    fn fresh_signed_request_is_authorized() {
        let auth = gate().authorize(&signed("POST", "/api/v1/upload", now())).unwrap();
        assert_eq!(
            auth.trail,
            vec![
                AuthState::Start,
                AuthState::HeaderPresent,
                AuthState::TimestampParsed,
                AuthState::TimestampFresh,
                AuthState::SignatureValid,
                AuthState::Authorized,
            ]
        );
        assert_eq!(auth.timestamp, now());
    }

    // -----------------------------------------------------------------------
    // 2. Missing headers stop at Start
    // -----------------------------------------------------------------------
    #[test]
    fn missing_headers_are_rejected_first() {
        let full = signed("POST", "/u", now());

        let mut no_sig = full.clone();
        no_sig.signature = None;
        let rejection = gate().authorize(&no_sig).unwrap_err();
        assert_eq!(rejection.state, AuthState::Start);
        assert!(matches!(rejection.error, GateError::MissingHeader("X-Signature")));

        let mut no_ts = full;
        no_ts.timestamp = None;
        let rejection = gate().authorize(&no_ts).unwrap_err();
        assert!(matches!(rejection.error, GateError::MissingHeader("X-Timestamp")));
        assert_eq!(rejection.public_message(), "unauthorized");
    }

    // -----------------------------------------------------------------------
    // 3. Blank header values are malformed
    // -----------------------------------------------------------------------
    #[test]
    fn blank_headers_are_malformed() {
        let request = RequestParts::new("POST", "/u").with_auth("  ", "2024-06-01T12:00:00Z");
        let rejection = gate().authorize(&request).unwrap_err();
        assert!(matches!(rejection.error, GateError::MalformedHeader("X-Signature")));
    }

    // -----------------------------------------------------------------------
    // 4. Unparsable timestamp stops at HeaderPresent
    // -----------------------------------------------------------------------
    #[test]
    fn malformed_timestamp() {
        for ts in ["yesterday", "1717243200", "2024-06-01 12:00:00"] {
            let request = RequestParts::new("POST", "/u").with_auth("c2ln", ts);
            let rejection = gate().authorize(&request).unwrap_err();
            assert_eq!(rejection.state, AuthState::HeaderPresent);
            assert!(matches!(rejection.error, GateError::MalformedTimestamp(_)), "{ts}");
        }
    }

    // -----------------------------------------------------------------------
    // 5. Freshness boundaries at 299s / 300s / 301s, both directions
    // -----------------------------------------------------------------------
    #[test]
    fn freshness_window_boundaries() {
        let gate = gate();
        for secs in [0, 299, 300, -299, -300] {
            let at = now() - chrono::Duration::seconds(secs);
            assert!(
                gate.authorize(&signed("POST", "/u", at)).is_ok(),
                "skew {secs}s should be accepted"
            );
        }
        for secs in [301, -301, 86_400] {
            let at = now() - chrono::Duration::seconds(secs);
            let rejection = gate.authorize(&signed("POST", "/u", at)).unwrap_err();
            assert_eq!(rejection.state, AuthState::TimestampParsed);
            match rejection.error {
                GateError::TimestampOutOfRange {
                    skew_secs,
                    tolerance_secs,
                } => {
                    assert_eq!(skew_secs, secs);
                    assert_eq!(tolerance_secs, 300);
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    // -----------------------------------------------------------------------
    // 6. Stale requests are rejected even with a garbage signature
    //    (freshness is checked before any crypto)
    // -----------------------------------------------------------------------
    #[test]
    fn stale_request_rejected_before_signature() {
        let request = RequestParts::new("POST", "/u").with_auth("!!!", "2020-01-01T00:00:00Z");
        let rejection = gate().authorize(&request).unwrap_err();
        assert!(matches!(rejection.error, GateError::TimestampOutOfRange { .. }));
    }

    // -----------------------------------------------------------------------
    // 7. Signature bound to method and path
    // -----------------------------------------------------------------------
    #[test]
    fn signature_bound_to_method_and_path() {
        let good = signed("DELETE", "/api/v1/file/aaaa", now());

        let mut other_path = good.clone();
        other_path.path = "/api/v1/file/bbbb".into();
        let rejection = gate().authorize(&other_path).unwrap_err();
        assert_eq!(rejection.state, AuthState::TimestampFresh);
        assert!(matches!(rejection.error, GateError::InvalidSignature));

        let mut other_method = good;
        other_method.method = "POST".into();
        assert!(matches!(
            gate().authorize(&other_method).unwrap_err().error,
            GateError::InvalidSignature
        ));
    }

    // -----------------------------------------------------------------------
    // 8. Re-rendered timestamp breaks the signature
    // -----------------------------------------------------------------------
    #[test]
    fn timestamp_is_signed_verbatim() {
        let mut request = signed("POST", "/u", now());
        // Same instant, different spelling.
        request.timestamp = Some("2024-06-01T12:00:00+00:00".into());
        assert!(matches!(
            gate().authorize(&request).unwrap_err().error,
            GateError::InvalidSignature
        ));
    }

    // -----------------------------------------------------------------------
    // 9. Other keypair is rejected
    // -----------------------------------------------------------------------
    #[test]
    fn other_keypair_is_rejected() {
        let headers = sign_request("POST", "/u", &BTreeMap::new(), other_key(), now()).unwrap();
        let request = RequestParts::new("POST", "/u").with_auth(headers.signature, headers.timestamp);
        assert!(matches!(
            gate().authorize(&request).unwrap_err().error,
            GateError::InvalidSignature
        ));
    }

    // -----------------------------------------------------------------------
    // 10. Non-base64 signature surfaces as a crypto error
    // -----------------------------------------------------------------------
    #[test]
    fn undecodable_signature() {
        let request = RequestParts::new("POST", "/u").with_auth("%%%", "2024-06-01T12:00:00Z");
        let rejection = gate().authorize(&request).unwrap_err();
        assert!(matches!(
            rejection.error,
            GateError::Crypto(CryptoError::MalformedSignature(_))
        ));
        assert_eq!(rejection.public_message(), "unauthorized");
    }

    // -----------------------------------------------------------------------
    // 11. No key loaded
    // -----------------------------------------------------------------------
    #[test]
    fn empty_authenticator_rejects() {
        let gate = AuthorizationGate::new(Arc::new(SignatureAuthenticator::empty()), GateConfig::default())
            .with_clock(Arc::new(ManualClock::new(now())));
        let rejection = gate.authorize(&signed("POST", "/u", now())).unwrap_err();
        assert!(matches!(rejection.error, GateError::Crypto(CryptoError::MissingPublicKey)));
    }

    // -----------------------------------------------------------------------
    // 12. Form fields are signed
    // -----------------------------------------------------------------------
    #[test]
    fn form_fields_are_covered() {
        let mut form = BTreeMap::new();
        form.insert("ttl".to_string(), "1h".to_string());
        form.insert("name".to_string(), "a.txt".to_string());
        let headers = sign_request("POST", "/u", &form, key(), now()).unwrap();

        let request = RequestParts::new("POST", "/u")
            .with_auth(headers.signature.clone(), headers.timestamp.clone())
            .with_field("name", "a.txt")
            .with_field("ttl", "1h");
        gate().authorize(&request).unwrap();

        let tampered = RequestParts::new("POST", "/u")
            .with_auth(headers.signature, headers.timestamp)
            .with_field("name", "a.txt")
            .with_field("ttl", "30d");
        assert!(gate().authorize(&tampered).is_err());
    }

    // -----------------------------------------------------------------------
    // 13. Hand-built canonical string matches sign_request
    // -----------------------------------------------------------------------
    #[test]
    fn manual_signature_over_canonical_string() {
        let ts = "2024-06-01T11:58:00Z";
        let sig = sign(format!("PUT:/x:{ts}").as_bytes(), key()).unwrap();
        let request = RequestParts::new("put", "/x").with_auth(sig, ts);
        gate().authorize(&request).unwrap();
    }

    // -----------------------------------------------------------------------
    // 14. Tolerance is configurable
    // -----------------------------------------------------------------------
    #[test]
    fn custom_tolerance() {
        let gate = AuthorizationGate::new(
            Arc::new(SignatureAuthenticator::new(key().public_key())),
            GateConfig::with_tolerance(Duration::from_secs(10)),
        )
        .with_clock(Arc::new(ManualClock::new(now())));
        assert!(gate.authorize(&signed("POST", "/u", now() - chrono::Duration::seconds(10))).is_ok());
        assert!(gate.authorize(&signed("POST", "/u", now() - chrono::Duration::seconds(11))).is_err());
    }

    // -----------------------------------------------------------------------
    // 15. Key reload takes effect for the next request
    // -----------------------------------------------------------------------
    #[test]
    fn reload_applies_to_gate() {
        let gate = gate();
        let headers = sign_request("POST", "/u", &BTreeMap::new(), other_key(), now()).unwrap();
        let request = RequestParts::new("POST", "/u").with_auth(headers.signature, headers.timestamp);
        assert!(gate.authorize(&request).is_err());

        gate.authenticator().replace_public_key(other_key().public_key());
        gate.authorize(&request).unwrap();
    }
}
