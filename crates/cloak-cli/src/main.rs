//! cloak: encrypt and decrypt strings with keychain-based key rotation.
//!
//! Commands:
//!   generate            - generate an AES-GCM key and updated keychain exports
//!   encrypt [KEY]       - encrypt stdin under a key, fingerprint, or CLOAK_CURRENT_KEY
//!   decrypt             - decrypt stdin lines using the environment keychain
//!   revoke <FP>         - remove a key from the environment keychain
//!   keychain            - list the environment keychain
//!   rotate-master-key   - re-encrypt the keychain under a new master key
//!
//! The keychain and master key travel in the CLOAK_KEYCHAIN and
//! CLOAK_MASTER_KEY environment variables; commands that change the keychain
//! print fresh `export` statements instead of writing anything to disk.

use std::io::Read;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{self, EnvFilter};

use cloak_core::keychain::now_ms;
use cloak_core::{decrypt_string, encrypt_string, CloakKey, Fingerprint, Keychain};

#[derive(Parser, Debug)]
#[command(
    name = "cloak",
    version,
    about = "Text-safe AES-256-GCM encryption with an encrypted keychain",
    long_about = "cloak: generate keys, encrypt/decrypt strings, and manage a keychain \
                  that lives encrypted in your environment"
)]
struct Cli {
    /// Master key protecting the environment keychain
    #[arg(long, env = "CLOAK_MASTER_KEY", hide_env_values = true, global = true)]
    master_key: Option<String>,

    /// Encrypted keychain blob
    #[arg(long, env = "CLOAK_KEYCHAIN", hide_env_values = true, global = true)]
    keychain: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an AES-GCM key
    Generate,

    /// Encrypt stdin
    Encrypt {
        /// Key text, or a fingerprint resolved from the environment keychain
        #[arg(env = "CLOAK_CURRENT_KEY")]
        key: Option<String>,

        /// Encrypt line-by-line
        #[arg(long, short = 'l')]
        line: bool,
    },

    /// Decrypt stdin using the environment keychain
    Decrypt,

    /// Remove a key from the environment keychain
    Revoke {
        /// Fingerprint of the key to remove (8 hex characters)
        fingerprint: String,
    },

    /// List the contents of the environment keychain
    Keychain {
        /// Show the full keys in clear text
        #[arg(long, short = 'f')]
        full: bool,
    },

    /// Generate a new master key & re-encrypt the keychain with it
    #[command(name = "rotate-master-key")]
    RotateMasterKey {
        /// New master key (generated when omitted)
        key: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Generate => generate(&cli),
        Commands::Encrypt { key, line } => encrypt(&cli, key.as_deref(), *line),
        Commands::Decrypt => decrypt(&cli),
        Commands::Revoke { fingerprint } => revoke(&cli, fingerprint),
        Commands::Keychain { full } => list_keychain(&cli, *full),
        Commands::RotateMasterKey { key } => rotate_master_key(&cli, key.as_deref()),
    }
}

/// The master key from the environment, parsed.
fn env_master_key(cli: &Cli) -> Result<Option<CloakKey>> {
    cli.master_key
        .as_deref()
        .map(|text| CloakKey::parse(text).context("invalid CLOAK_MASTER_KEY"))
        .transpose()
}

/// The keychain from the environment, or an empty one when either variable
/// is unset.
fn env_keychain(cli: &Cli) -> Result<Keychain> {
    match (&cli.keychain, env_master_key(cli)?) {
        (Some(blob), Some(master)) => {
            Keychain::import(blob, &master).context("could not import CLOAK_KEYCHAIN")
        }
        _ => Ok(Keychain::empty()),
    }
}

/// Print shell `export` statements carrying the updated keychain state.
fn print_exports(message: &str, keychain: &Keychain, master_key: &CloakKey) -> Result<()> {
    println!();
    println!("# {message}:");
    println!("export CLOAK_MASTER_KEY=\"{}\"", master_key.to_text());
    println!("export CLOAK_KEYCHAIN=\"{}\"", keychain.export(master_key)?);
    Ok(())
}

fn generate(cli: &Cli) -> Result<()> {
    let key = CloakKey::generate()?;
    println!("Key:         {}", key.to_text());
    println!("Fingerprint: {}", key.fingerprint());

    match env_master_key(cli)? {
        // No master key in the environment: the generated key becomes the
        // master key of a fresh, empty keychain.
        None => print_exports("Generated new empty keychain", &Keychain::empty(), &key),
        // Key rotation: add the new key to the existing keychain.
        Some(master) => {
            let keychain = env_keychain(cli)?.with_key(key.clone(), None);
            print_exports("Updated keychain", &keychain, &master)?;
            println!();
            println!("# To use this new key as default for encryption:");
            println!("export CLOAK_CURRENT_KEY=\"{}\"", key.fingerprint());
            Ok(())
        }
    }
}

/// Resolve the encryption key: full key text as-is, an 8-hex-char
/// fingerprint through the environment keychain.
fn resolve_encryption_key(cli: &Cli, key: &str) -> Result<CloakKey> {
    if let Ok(fingerprint) = key.parse::<Fingerprint>() {
        let keychain = env_keychain(cli)?;
        return match keychain.get(fingerprint) {
            Some(entry) => Ok(entry.key.clone()),
            None => bail!("missing key (not available in keychain)"),
        };
    }
    CloakKey::parse(key).context("invalid key")
}

fn encrypt(cli: &Cli, key: Option<&str>, line: bool) -> Result<()> {
    let Some(key) = key else {
        bail!("missing key (pass one, or set CLOAK_CURRENT_KEY)");
    };
    let key = resolve_encryption_key(cli, key)?;

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("could not read stdin")?;

    if line {
        for line in input.split('\n') {
            println!("{}", encrypt_string(line, &key)?);
        }
    } else {
        println!("{}", encrypt_string(&input, &key)?);
    }
    Ok(())
}

fn decrypt(cli: &Cli) -> Result<()> {
    let keychain = env_keychain(cli)?;

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("could not read stdin")?;

    for message in input.split('\n').filter(|line| !line.is_empty()) {
        // A bad line is reported and skipped; the rest still decrypts.
        let result = keychain
            .find_key_for_message(message)
            .and_then(|key| decrypt_string(message, key));
        match result {
            Ok(cleartext) => println!("{cleartext}"),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
    Ok(())
}

fn revoke(cli: &Cli, fingerprint: &str) -> Result<()> {
    let fingerprint: Fingerprint = fingerprint
        .parse()
        .context("fingerprint must be 8 hex characters")?;
    let Some(master) = env_master_key(cli)? else {
        bail!("master key is missing");
    };
    let keychain = env_keychain(cli)?
        .revoke(fingerprint)
        .context("no such key in env keychain")?;
    print_exports("Updated keychain", &keychain, &master)
}

fn list_keychain(cli: &Cli, full: bool) -> Result<()> {
    let keychain = env_keychain(cli)?;
    if keychain.is_empty() {
        println!("(empty keychain)");
        return Ok(());
    }

    let now = now_ms();
    println!("{:<12} {:<14} {:<16} key", "fingerprint", "created", "label");
    for (fingerprint, entry) in keychain.entries() {
        let age = keychain
            .age(fingerprint, now)
            .map(format_age)
            .unwrap_or_else(|_| "?".into());
        let label = entry.label.as_deref().unwrap_or("-");
        let key = if full {
            entry.key.to_text()
        } else {
            "[redacted]".into()
        };
        println!("{fingerprint:<12} {age:<14} {label:<16} {key}");
    }
    Ok(())
}

fn rotate_master_key(cli: &Cli, key: Option<&str>) -> Result<()> {
    let keychain = env_keychain(cli)?;
    let new_master = match key {
        Some(text) => CloakKey::parse(text).context("invalid master key")?,
        None => CloakKey::generate()?,
    };
    print_exports("Updated keychain", &keychain, &new_master)
}

fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        format!("{secs}s ago")
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86400)
    }
}
