use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use lapse_crypto::{sign, CryptoResult, PrivateKey};

use crate::canonical::CanonicalRequest;

/// The two auth headers a client attaches to a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedHeaders {
    /// `X-Signature` value.
    pub signature: String,
    /// `X-Timestamp` value.
    pub timestamp: String,
}

/// Render `at` the way clients send it: RFC 3339, whole seconds, `Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Sign a request for sending at `now`.
pub fn sign_request(
    method: &str,
    path: &str,
    form: &BTreeMap<String, String>,
    key: &PrivateKey,
    now: DateTime<Utc>,
) -> CryptoResult<SignedHeaders> {
    let timestamp = format_timestamp(now);
    let canonical = CanonicalRequest::new(method, path, &timestamp).with_form(form.clone());
    let signature = sign(canonical.render().as_bytes(), key)?;
    Ok(SignedHeaders {
        signature,
        timestamp,
    })
}
