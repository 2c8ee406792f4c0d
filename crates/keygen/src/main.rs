//! Handle Naming Authority Key Tool
//!
//! Generates the Ed25519 key a naming authority signs create requests with,
//! and inspects or verifies existing key files.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use hdl_keys::{KeyFile, KeySecret};
use rpassword::prompt_password;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "hdl-keygen")]
#[command(about = "Key generation and inspection for handle naming authorities")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new Ed25519 key file
    Generate {
        /// Where to write the key file
        #[arg(short, long, default_value = "./admpriv.json")]
        output: PathBuf,

        /// Naming authority recorded in the key metadata
        #[arg(long)]
        authority: Option<String>,

        /// Store the private key unencrypted (requires explicit opt-in)
        #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["pass_phrase_env", "prompt"])]
        plaintext: bool,

        /// Overwrite the key file if it already exists
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,

        #[command(flatten)]
        pass_phrase: PassPhraseArgs,
    },

    /// Show the protection and public key of a key file
    Inspect {
        /// Path to the key file
        key: PathBuf,
    },

    /// Decrypt a key file and check it against its public key
    Verify {
        /// Path to the key file
        key: PathBuf,

        #[command(flatten)]
        pass_phrase: PassPhraseArgs,
    },
}

#[derive(Args, Debug, Default)]
struct PassPhraseArgs {
    /// Read the pass-phrase from this environment variable
    #[arg(long, value_name = "VAR")]
    pass_phrase_env: Option<String>,

    /// Prompt interactively (input is not echoed)
    #[arg(long, action = ArgAction::SetTrue)]
    prompt: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            output,
            authority,
            plaintext,
            force,
            pass_phrase,
        } => generate(&output, authority, plaintext, force, &pass_phrase)?,
        Commands::Inspect { key } => inspect(&key)?,
        Commands::Verify { key, pass_phrase } => verify(&key, &pass_phrase)?,
    }

    Ok(())
}

fn generate(
    output: &Path,
    authority: Option<String>,
    plaintext: bool,
    force: bool,
    args: &PassPhraseArgs,
) -> Result<()> {
    let pass_phrase = resolve_pass_phrase(args, true)?;
    if pass_phrase.is_none() && !plaintext {
        bail!("a pass-phrase is required; use --pass-phrase-env, --prompt, or --plaintext");
    }

    let (keyfile, key) = KeyFile::generate(
        pass_phrase.as_ref().map(|p| p.as_str()),
        authority,
        plaintext,
    )
    .context("Failed to generate key")?;
    keyfile
        .save(output, force)
        .with_context(|| format!("Failed to write key file {}", output.display()))?;

    info!(path = %output.display(), "key file written");
    println!("✓ Key file written to {}", output.display());
    println!("  Public key: {}", hex::encode(key.public_key()));
    if plaintext {
        warn!("private key stored without pass-phrase protection");
        println!("\n⚠️  The private key is NOT encrypted. Restrict access to this file.");
    }
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let keyfile = KeyFile::load(path)
        .with_context(|| format!("Failed to read key file {}", path.display()))?;

    let protection = match &keyfile.secret {
        KeySecret::Plain { .. } => "none (plaintext)".to_string(),
        KeySecret::PassPhrase { kdf, .. } => format!("pass-phrase ({kdf})"),
    };
    println!("Key file:    {}", path.display());
    println!("Version:     {}", keyfile.version);
    println!("Public key:  {}", keyfile.public_key_hex);
    println!("Protection:  {protection}");
    println!("Created:     {}", keyfile.metadata.created_at.to_rfc3339());
    if let Some(authority) = &keyfile.metadata.naming_authority {
        println!("Authority:   {authority}");
    }
    if let Some(warning) = &keyfile.metadata.warning {
        println!("Warning:     {warning}");
    }
    Ok(())
}

fn verify(path: &Path, args: &PassPhraseArgs) -> Result<()> {
    let keyfile = KeyFile::load(path)
        .with_context(|| format!("Failed to read key file {}", path.display()))?;

    let pass_phrase = if keyfile.requires_pass_phrase() {
        let pass_phrase = resolve_pass_phrase(args, false)?;
        if pass_phrase.is_none() {
            bail!("key file is pass-phrase protected; use --pass-phrase-env or --prompt");
        }
        pass_phrase
    } else {
        None
    };

    let key = keyfile
        .unlock(pass_phrase.as_ref().map(|p| p.as_str()))
        .context("Failed to unlock key")?;
    println!("✓ Key verified");
    println!("  Public key: {}", hex::encode(key.public_key()));
    Ok(())
}

fn resolve_pass_phrase(
    args: &PassPhraseArgs,
    confirm: bool,
) -> Result<Option<Zeroizing<String>>> {
    if let Some(var) = &args.pass_phrase_env {
        let value = std::env::var(var)
            .with_context(|| format!("environment variable {var} is not set"))?;
        if value.is_empty() {
            bail!("environment variable {var} is empty");
        }
        return Ok(Some(Zeroizing::new(value)));
    }
    if args.prompt {
        let first = Zeroizing::new(prompt_password("Pass-phrase: ")?);
        if confirm {
            let second = Zeroizing::new(prompt_password("Confirm pass-phrase: ")?);
            if *first != *second {
                bail!("pass-phrases do not match");
            }
        }
        return Ok(Some(first));
    }
    Ok(None)
}
