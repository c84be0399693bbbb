use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use lapse_gate::GateConfig;
use lapse_store::config::DEFAULT_TTL;
use lapse_store::StoreConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ServerError, ServerResult};

pub const ENV_BIND: &str = "LAPSE_BIND";
pub const ENV_STORAGE_DIR: &str = "LAPSE_STORAGE_DIR";
pub const ENV_DEFAULT_TTL: &str = "LAPSE_DEFAULT_TTL";
pub const ENV_PUBLIC_KEY: &str = "LAPSE_PUBLIC_KEY";

/// Server configuration.
///
/// Resolved in layers: built-in defaults, then an optional TOML file, then
/// `LAPSE_*` environment variables, then command-line flags (applied by the
/// binary).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// PEM public key used to verify signed requests. Re-read on `SIGHUP`.
    #[serde(default = "default_public_key_path")]
    pub public_key_path: PathBuf,
    /// Base for `download_url` in upload responses, e.g.
    /// `https://files.example.com`. Derived from the `Host` header when unset.
    #[serde(default)]
    pub public_base_url: Option<String>,
    /// Largest accepted request body.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_public_key_path() -> PathBuf {
    PathBuf::from("public.pem")
}

fn default_max_upload_bytes() -> usize {
    32 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_key_path: default_public_key_path(),
            public_base_url: None,
            max_upload_bytes: default_max_upload_bytes(),
            store: StoreConfig::default(),
            gate: GateConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Read a TOML file.
    pub fn from_file(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Defaults or `path`, with the process environment applied on top.
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `LAPSE_*` overrides read through `lookup`.
    ///
    /// An unparsable `LAPSE_DEFAULT_TTL` falls back to the built-in default
    /// TTL rather than failing; a bad `LAPSE_BIND` is an error.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ServerResult<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(bind) = get(ENV_BIND) {
            self.bind_addr = bind
                .trim()
                .parse()
                .map_err(|e| ServerError::Config(format!("{ENV_BIND}={bind:?}: {e}")))?;
        }
        if let Some(dir) = get(ENV_STORAGE_DIR) {
            self.store.root = PathBuf::from(dir);
        }
        if let Some(ttl) = get(ENV_DEFAULT_TTL) {
            self.store.default_ttl = match humantime::parse_duration(ttl.trim()) {
                Ok(d) if !d.is_zero() => d,
                _ => {
                    warn!(value = %ttl, "invalid {ENV_DEFAULT_TTL}, using default");
                    DEFAULT_TTL
                }
            };
        }
        if let Some(key) = get(ENV_PUBLIC_KEY) {
            self.public_key_path = PathBuf::from(key);
        }
        Ok(())
    }

    pub fn validate(&self) -> ServerResult<()> {
        self.store.validate()?;
        if self.max_upload_bytes == 0 {
            return Err(ServerError::Config("max_upload_bytes must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(c.public_key_path, PathBuf::from("public.pem"));
        assert!(c.public_base_url.is_none());
        assert_eq!(c.store.default_ttl, Duration::from_secs(3600));
        assert_eq!(c.gate.tolerance, Duration::from_secs(300));
        c.validate().unwrap();
    }

    #[test]
    fn toml_with_nested_sections() {
        let c = ServerConfig::from_toml(
            r#"
            bind_addr = "127.0.0.1:9000"
            public_key_path = "/etc/lapse/public.pem"
            public_base_url = "https://files.example.com"

            [store]
            root = "/var/lib/lapse"
            default_ttl = "2h"

            [gate]
            tolerance = "1m"
            "#,
        )
        .unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(c.store.root, PathBuf::from("/var/lib/lapse"));
        assert_eq!(c.store.default_ttl, Duration::from_secs(7200));
        assert_eq!(c.store.sweep_interval, Duration::from_secs(300));
        assert_eq!(c.gate.tolerance, Duration::from_secs(60));
        assert_eq!(c.public_base_url.as_deref(), Some("https://files.example.com"));
    }

    #[test]
    fn bad_toml_is_config_error() {
        assert!(matches!(
            ServerConfig::from_toml("bind_addr = 12"),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn env_overrides() {
        let mut c = ServerConfig::default();
        c.apply_env(env(&[
            (ENV_BIND, "127.0.0.1:7000"),
            (ENV_STORAGE_DIR, "/tmp/lapse"),
            (ENV_DEFAULT_TTL, "15m"),
            (ENV_PUBLIC_KEY, "/keys/pub.pem"),
        ]))
        .unwrap();
        assert_eq!(c.bind_addr.port(), 7000);
        assert_eq!(c.store.root, PathBuf::from("/tmp/lapse"));
        assert_eq!(c.store.default_ttl, Duration::from_secs(900));
        assert_eq!(c.public_key_path, PathBuf::from("/keys/pub.pem"));
    }

    #[test]
    fn invalid_env_ttl_falls_back_to_default() {
        let mut c = ServerConfig::default();
        c.store.default_ttl = Duration::from_secs(42);
        c.apply_env(env(&[(ENV_DEFAULT_TTL, "forever")])).unwrap();
        assert_eq!(c.store.default_ttl, DEFAULT_TTL);
    }

    #[test]
    fn invalid_env_bind_is_an_error() {
        let mut c = ServerConfig::default();
        assert!(c.apply_env(env(&[(ENV_BIND, "not-an-addr")])).is_err());
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut c = ServerConfig::default();
        c.apply_env(env(&[(ENV_STORAGE_DIR, "  ")])).unwrap();
        assert_eq!(c.store.root, PathBuf::from("./storage"));
    }
}
