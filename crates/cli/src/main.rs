//! Handle Issuer Command Line Interface
//!
//! Mints handles under the configured naming authority, one at a time or
//! from a batch file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hdl_issuer::{
    CreateOutcome, HandleCreationService, HandleItem, HandleTransformer, IssuerError,
    IssuerSettings, LogFormat, LogSettings, ServerMode,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit status when the requested suffix is already taken.
const EXIT_ALREADY_EXISTS: u8 = 3;

#[derive(Parser)]
#[command(name = "hdl-issue")]
#[command(about = "Mint handles under a naming authority", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML or JSON); HANDLE_* variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a single handle
    Create {
        /// Local name of the handle under the naming authority
        suffix: String,
        /// Public description stored on the handle
        description: String,
    },
    /// Create one handle per entry of a JSON array of {suffix, description}
    Batch {
        /// Path to the items file
        items: PathBuf,
    },
    /// Load and unlock the signing key without creating anything
    Check,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    init_logging(&settings.log);

    match cli.command {
        Commands::Create {
            suffix,
            description,
        } => create(settings, &suffix, &description).await,
        Commands::Batch { items } => batch(settings, &items).await,
        Commands::Check => check(settings).await,
    }
}

fn load_settings(path: Option<&Path>) -> Result<IssuerSettings> {
    match path {
        Some(path) => IssuerSettings::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            IssuerSettings::from_env().context("Failed to load configuration from environment")
        }
    }
}

fn init_logging(log: &LogSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    match log.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
    }
}

async fn create(settings: IssuerSettings, suffix: &str, description: &str) -> Result<ExitCode> {
    let service = HandleCreationService::new(settings);
    let outcome = service
        .create_handle(suffix, description)
        .await
        .context("Failed to create handle")?;
    let status = ExitCode::from(exit_status(&outcome));
    match outcome {
        CreateOutcome::Success(handle) => println!("{handle}"),
        CreateOutcome::AlreadyExists => {
            eprintln!("Handle suffix '{suffix}' is already in use; choose another suffix")
        }
        CreateOutcome::Failure(failure) => {
            return Err(IssuerError::Protocol(failure)).context("Failed to create handle")
        }
    }
    Ok(status)
}

async fn batch(settings: IssuerSettings, items_path: &Path) -> Result<ExitCode> {
    let raw = fs::read_to_string(items_path)
        .with_context(|| format!("Failed to read {}", items_path.display()))?;
    let items: Vec<HandleItem> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid items file {}", items_path.display()))?;

    let transformer = HandleTransformer::from_settings(settings)
        .await
        .context("Failed to initialize handle transformer")?;

    let summary = run_batch(&transformer, &items).await;
    transformer.shutdown().context("Failed to shut down storage")?;

    info!(
        created = summary.created,
        existing = summary.existing,
        failed = summary.failed,
        "batch complete"
    );
    println!(
        "created {}, already existing {}, failed {}",
        summary.created, summary.existing, summary.failed
    );
    Ok(if summary.failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[derive(Debug, Default, PartialEq, Eq)]
struct BatchSummary {
    created: usize,
    existing: usize,
    failed: usize,
}

async fn run_batch(transformer: &HandleTransformer, items: &[HandleItem]) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for item in items {
        match transformer.transform(item).await {
            Ok(CreateOutcome::Success(handle)) => {
                summary.created += 1;
                println!("{}\t{handle}", item.suffix);
            }
            Ok(CreateOutcome::AlreadyExists) => {
                summary.existing += 1;
                println!("{}\t(already exists)", item.suffix);
            }
            Ok(CreateOutcome::Failure(failure)) => {
                summary.failed += 1;
                error!(suffix = %item.suffix, reason = %failure, "handle creation failed");
            }
            Err(err) => {
                summary.failed += 1;
                error!(suffix = %item.suffix, error = %err, "handle creation failed");
            }
        }
    }
    summary
}

async fn check(settings: IssuerSettings) -> Result<ExitCode> {
    let service = HandleCreationService::new(settings);
    let auth = service
        .initialize()
        .await
        .context("Failed to initialize signing context")?;
    println!("Naming authority: {}", auth.authority());
    println!("Key index:        {}", auth.index());
    println!("Public key:       {}", hex::encode(auth.public_key()));
    if service.settings().server.mode == ServerMode::Stub {
        warn!("server mode is 'stub'; handles will not reach a real server");
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_status(outcome: &CreateOutcome) -> u8 {
    match outcome {
        CreateOutcome::Success(_) => 0,
        CreateOutcome::AlreadyExists => EXIT_ALREADY_EXISTS,
        CreateOutcome::Failure(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdl_issuer::{ProtocolFailure, StorageSettings};
    use hdl_keys::KeyFile;

    #[test]
    fn already_exists_has_its_own_exit_status() {
        assert_eq!(exit_status(&CreateOutcome::Success("1/a".into())), 0);
        assert_eq!(exit_status(&CreateOutcome::AlreadyExists), 3);
        assert_eq!(
            exit_status(&CreateOutcome::Failure(ProtocolFailure::malformed("x"))),
            1
        );
    }

    #[test]
    fn create_takes_suffix_and_description() {
        let cli = Cli::try_parse_from([
            "hdl-issue",
            "--config",
            "issuer.toml",
            "create",
            "abc",
            "An item",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("issuer.toml")));
        let Commands::Create {
            suffix,
            description,
        } = cli.command
        else {
            panic!("expected create");
        };
        assert_eq!(suffix, "abc");
        assert_eq!(description, "An item");
    }

    #[tokio::test]
    async fn batch_counts_each_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("admpriv.json");
        let (keyfile, _key) = KeyFile::generate(None, None, true).unwrap();
        keyfile.save(&key_path, false).unwrap();

        let mut settings = IssuerSettings::default();
        settings.naming_authority = Some("11234".into());
        settings.private_key_path = Some(key_path);
        settings.server.mode = ServerMode::Stub;
        settings.storage = StorageSettings {
            kind: Some("memory".into()),
            path: None,
        };

        let transformer = HandleTransformer::from_settings(settings).await.unwrap();
        let items = vec![
            HandleItem::new("a", "first"),
            HandleItem::new("b", "second"),
            HandleItem::new("a", "duplicate"),
            HandleItem::new("", "invalid suffix"),
        ];
        let summary = run_batch(&transformer, &items).await;
        assert_eq!(
            summary,
            BatchSummary {
                created: 2,
                existing: 1,
                failed: 1,
            }
        );
        transformer.shutdown().unwrap();
    }
}
