use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lapse",
    about = "Lapse: self-expiring file storage with signed writes",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Generate an RSA key pair
    Keygen(KeygenArgs),
    /// Produce X-Signature / X-Timestamp headers for a request
    Sign(SignArgs),
    /// Check a signature the way the server would
    Verify(VerifyArgs),
    /// Run one reclamation pass over a storage directory
    Sweep(StorageArgs),
    /// List live objects in a storage directory
    Ls(StorageArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,
    /// Default time-to-live, e.g. `1h` or `30m`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub default_ttl: Option<Duration>,
    /// PEM public key used to verify signed requests
    #[arg(long)]
    pub public_key: Option<PathBuf>,
}

#[derive(Args)]
pub struct KeygenArgs {
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
    #[arg(long, default_value_t = lapse_crypto::DEFAULT_KEY_BITS)]
    pub bits: usize,
    /// Overwrite existing key files
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct SignArgs {
    /// PEM private key
    #[arg(long)]
    pub key: PathBuf,
    #[arg(long)]
    pub method: String,
    #[arg(long)]
    pub path: String,
    /// Timestamp to sign verbatim; defaults to now
    #[arg(long)]
    pub timestamp: Option<String>,
    /// Form field to include in the signature
    #[arg(long = "field", value_parser = parse_field)]
    pub fields: Vec<(String, String)>,
}

#[derive(Args)]
pub struct VerifyArgs {
    #[arg(long)]
    pub public_key: PathBuf,
    #[arg(long)]
    pub method: String,
    #[arg(long)]
    pub path: String,
    #[arg(long)]
    pub timestamp: String,
    #[arg(long)]
    pub signature: String,
    #[arg(long = "field", value_parser = parse_field)]
    pub fields: Vec<(String, String)>,
    /// Freshness window
    #[arg(long, default_value = "5m", value_parser = humantime::parse_duration)]
    pub tolerance: Duration,
}

#[derive(Args)]
pub struct StorageArgs {
    #[arg(long, default_value = lapse_store::config::DEFAULT_ROOT)]
    pub storage_dir: PathBuf,
}

/// Parse `key=value`. The value may itself contain `=`.
pub fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from([
            "lapse",
            "serve",
            "--bind",
            "127.0.0.1:9000",
            "--default-ttl",
            "30m",
            "--storage-dir",
            "/tmp/lapse",
        ])
        .unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind.unwrap().port(), 9000);
            assert_eq!(args.default_ttl, Some(Duration::from_secs(1800)));
            assert_eq!(args.storage_dir, Some(PathBuf::from("/tmp/lapse")));
            assert!(args.config.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_serve_rejects_bad_ttl() {
        assert!(Cli::try_parse_from(["lapse", "serve", "--default-ttl", "soon"]).is_err());
    }

    #[test]
    fn parse_keygen_defaults() {
        let cli = Cli::try_parse_from(["lapse", "keygen"]).unwrap();
        if let Command::Keygen(args) = cli.command {
            assert_eq!(args.out_dir, PathBuf::from("."));
            assert_eq!(args.bits, lapse_crypto::DEFAULT_KEY_BITS);
            assert!(!args.force);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_sign_with_fields() {
        let cli = Cli::try_parse_from([
            "lapse",
            "sign",
            "--key",
            "private.pem",
            "--method",
            "post",
            "--path",
            "/api/v1/upload",
            "--field",
            "ttl=30m",
            "--field",
            "note=a=b",
        ])
        .unwrap();
        if let Command::Sign(args) = cli.command {
            assert_eq!(args.method, "post");
            assert!(args.timestamp.is_none());
            assert_eq!(
                args.fields,
                vec![
                    ("ttl".to_string(), "30m".to_string()),
                    ("note".to_string(), "a=b".to_string())
                ]
            );
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_field_requires_key() {
        assert!(parse_field("=x").is_err());
        assert!(parse_field("novalue").is_err());
        assert_eq!(parse_field("k=").unwrap(), ("k".into(), String::new()));
    }

    #[test]
    fn parse_verify_requires_signature() {
        assert!(Cli::try_parse_from([
            "lapse",
            "verify",
            "--public-key",
            "public.pem",
            "--method",
            "DELETE",
            "--path",
            "/api/v1/file/x",
            "--timestamp",
            "2026-01-01T00:00:00Z",
        ])
        .is_err());
    }

    #[test]
    fn parse_sweep_and_ls() {
        let cli = Cli::try_parse_from(["lapse", "sweep", "--storage-dir", "/data"]).unwrap();
        assert!(matches!(cli.command, Command::Sweep(ref a) if a.storage_dir == PathBuf::from("/data")));
        let cli = Cli::try_parse_from(["lapse", "ls"]).unwrap();
        assert!(matches!(cli.command, Command::Ls(ref a) if a.storage_dir == PathBuf::from("./storage")));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["lapse", "--verbose", "ls"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["lapse", "--format", "json", "ls"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
