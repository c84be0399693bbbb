use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{SecondsFormat, Utc};
use colored::Colorize;
use lapse_crypto::{generate_keypair, sign, PrivateKey, SignatureAuthenticator};
use lapse_gate::{format_timestamp, AuthorizationGate, CanonicalRequest, GateConfig, RequestParts};
use lapse_server::{LapseServer, ServerConfig};
use lapse_store::{EphemeralStore, FsBackend};
use serde_json::json;
use tracing::info;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Keygen(args) => cmd_keygen(args, format),
        Command::Sign(args) => cmd_sign(args, format),
        Command::Verify(args) => cmd_verify(args, format),
        Command::Sweep(args) => cmd_sweep(args, format).await,
        Command::Ls(args) => cmd_ls(args, format).await,
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Resolve the server configuration: file and environment, then flags.
fn server_config(args: &ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(dir) = &args.storage_dir {
        config.store.root = dir.clone();
    }
    if let Some(ttl) = args.default_ttl {
        config.store.default_ttl = ttl;
    }
    if let Some(key) = &args.public_key {
        config.public_key_path = key.clone();
    }
    Ok(config)
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = server_config(&args)?;
    let server = LapseServer::new(config)
        .await
        .context("failed to start server")?;
    server.serve().await?;
    Ok(())
}

fn cmd_keygen(args: KeygenArgs, format: OutputFormat) -> anyhow::Result<()> {
    let private_path = args.out_dir.join("private.pem");
    let public_path = args.out_dir.join("public.pem");
    if !args.force {
        for path in [&private_path, &public_path] {
            if path.exists() {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
        }
    }

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;
    info!(bits = args.bits, "generating key pair");
    let key = generate_keypair(args.bits)?;
    write_private_key(&private_path, &key.to_pem()?)?;
    std::fs::write(&public_path, key.public_key().to_pem()?)
        .with_context(|| format!("writing {}", public_path.display()))?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "bits": args.bits,
            "private_key": private_path,
            "public_key": public_path,
        })),
        OutputFormat::Text => {
            println!("{} Generated {}-bit RSA key pair", "✓".green().bold(), args.bits);
            println!("  Private: {}", private_path.display().to_string().yellow());
            println!("  Public:  {}", public_path.display().to_string().cyan());
            Ok(())
        }
    }
}

#[cfg(unix)]
fn write_private_key(path: &Path, pem: &str) -> anyhow::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("writing {}", path.display()))?;
    file.write_all(pem.as_bytes())?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private_key(path: &Path, pem: &str) -> anyhow::Result<()> {
    std::fs::write(path, pem).with_context(|| format!("writing {}", path.display()))
}

fn cmd_sign(args: SignArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = PrivateKey::from_file(&args.key)
        .with_context(|| format!("loading {}", args.key.display()))?;
    let timestamp = args
        .timestamp
        .unwrap_or_else(|| format_timestamp(Utc::now()));
    let canonical = CanonicalRequest::new(&args.method, &args.path, &timestamp)
        .with_form(args.fields.into_iter().collect::<BTreeMap<_, _>>());
    let signature = sign(canonical.render().as_bytes(), &key)?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "canonical": canonical.render(),
            "x_signature": signature,
            "x_timestamp": timestamp,
        })),
        OutputFormat::Text => {
            println!("X-Signature: {signature}");
            println!("X-Timestamp: {timestamp}");
            Ok(())
        }
    }
}

fn cmd_verify(args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let authenticator = SignatureAuthenticator::from_file(&args.public_key)
        .with_context(|| format!("loading {}", args.public_key.display()))?;
    let gate = AuthorizationGate::new(
        Arc::new(authenticator),
        GateConfig::with_tolerance(args.tolerance),
    );

    let mut request =
        RequestParts::new(&args.method, &args.path).with_auth(&args.signature, &args.timestamp);
    for (key, value) in args.fields {
        request = request.with_field(key, value);
    }

    match gate.authorize(&request) {
        Ok(authorization) => match format {
            OutputFormat::Json => print_json(&json!({
                "authorized": true,
                "trail": authorization.trail.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            })),
            OutputFormat::Text => {
                println!("{} Signature valid", "✓".green().bold());
                Ok(())
            }
        },
        Err(rejection) => {
            match format {
                OutputFormat::Json => print_json(&json!({
                    "authorized": false,
                    "state": rejection.state.as_str(),
                    "reason": rejection.error.to_string(),
                }))?,
                OutputFormat::Text => println!(
                    "{} Rejected after {}: {}",
                    "✗".red().bold(),
                    rejection.state.to_string().yellow(),
                    rejection.error
                ),
            }
            bail!("request is not authorized")
        }
    }
}

/// Open a storage directory without background reclamation.
async fn open_store(root: &Path) -> anyhow::Result<EphemeralStore> {
    if !root.is_dir() {
        bail!("storage directory {} does not exist", root.display());
    }
    let backend = FsBackend::new(root)
        .await
        .with_context(|| format!("opening {}", root.display()))?;
    Ok(EphemeralStore::builder(Arc::new(backend)).build())
}

async fn cmd_sweep(args: StorageArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.storage_dir).await?;
    let report = store.sweep_once().await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(report)?),
        OutputFormat::Text => {
            println!(
                "{} Sweep: {} scanned, {} removed, {} skipped",
                "✓".green(),
                report.scanned,
                report.removed.to_string().bold(),
                report.skipped
            );
            Ok(())
        }
    }
}

async fn cmd_ls(args: StorageArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.storage_dir).await?;
    let records = store.list().await?;
    if let OutputFormat::Json = format {
        return print_json(&serde_json::to_value(&records)?);
    }

    if records.is_empty() {
        println!("No live objects.");
        return Ok(());
    }
    let now = store.now();
    for record in &records {
        let remaining =
            humantime::format_duration(record.remaining_ttl(now).to_std().unwrap_or_default());
        println!(
            "{}  {:>10}  {}  expires {} (in {})",
            record.id.to_string().yellow(),
            record.size,
            record.name.bold(),
            record
                .expires_at
                .to_rfc3339_opts(SecondsFormat::Secs, true)
                .dimmed(),
            remaining
        );
    }
    Ok(())
}
