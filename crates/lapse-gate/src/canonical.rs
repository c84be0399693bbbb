use std::collections::BTreeMap;
use std::fmt;

/// Separator between the parts of a canonical string.
pub const DELIMITER: char = ':';

/// The exact string a request signature covers.
///
/// Renders as `METHOD:PATH:TIMESTAMP`, or `METHOD:PATH:TIMESTAMP:k1=v1&k2=v2`
/// when form fields are signed. The method is upper-cased, the path is taken
/// verbatim without its query string, and the timestamp is the literal
/// `X-Timestamp` header value, never a re-rendered time. Form fields are
/// ordered by key and are not escaped. Query parameters and the request body
/// are never part of the string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CanonicalRequest {
    pub method: String,
    pub path: String,
    pub timestamp: String,
    pub form: BTreeMap<String, String>,
}

impl CanonicalRequest {
    pub fn new(method: &str, path: &str, timestamp: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: strip_query(path).to_string(),
            timestamp: timestamp.to_string(),
            form: BTreeMap::new(),
        }
    }

    /// Sign these form fields too.
    pub fn with_form(mut self, form: BTreeMap<String, String>) -> Self {
        self.form = form;
        self
    }

    /// Sign one more form field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(key.into(), value.into());
        self
    }

    /// The canonical string.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(
            self.method.len() + self.path.len() + self.timestamp.len() + 2,
        );
        out.push_str(&self.method);
        out.push(DELIMITER);
        out.push_str(&self.path);
        out.push(DELIMITER);
        out.push_str(&self.timestamp);

        if !self.form.is_empty() {
            out.push(DELIMITER);
            for (i, (key, value)) in self.form.iter().enumerate() {
                if i > 0 {
                    out.push('&');
                }
                out.push_str(key);
                out.push('=');
                out.push_str(value);
            }
        }
        out
    }
}

impl fmt::Display for CanonicalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(p, _)| p)
}
