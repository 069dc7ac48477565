//! Command implementations for the dotvault CLI.
//!
//! Main commands:
//! - init: create the vault layout and repository
//! - add / encrypt / decrypt: manage tracked files and secrets
//! - push / status / list: sync and inspect the vault

use crate::cli::Cli;
use age::secrecy::SecretString;
use anyhow::Result;
use colored::Colorize;
use dotvault::config::{self, Config};
use dotvault::crypto::{self, CryptoError, KeySource, Method, Recipient};
use dotvault::vault::{AddOutcome, InitOutcome, PushState, Vault};
use dotvault::vcs::CommitOutcome;
use std::io::{self, Write};
use std::path::Path;

/// Environment variable consulted before prompting for a passphrase.
const PASSPHRASE_ENV: &str = "DOTVAULT_PASSPHRASE";

/// Resolve the effective config from the CLI globals.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    Ok(config)
}

/// Prompt for a passphrase (input hidden).
fn prompt_passphrase(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let passphrase = rpassword::read_password().map_err(|err| {
        CryptoError::MissingPassphrase(format!("cannot read passphrase: {}", err))
    })?;
    Ok(passphrase)
}

/// Gather the gcm passphrase: file flag, then environment, then prompt.
fn gather_passphrase(file: Option<&Path>, confirm: bool) -> Result<SecretString> {
    if let Some(path) = file {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            CryptoError::MissingPassphrase(format!(
                "cannot read passphrase file {}: {}",
                path.display(),
                err
            ))
        })?;
        return Ok(SecretString::from(
            raw.trim_end_matches(['\r', '\n']).to_string(),
        ));
    }
    if let Ok(value) = std::env::var(PASSPHRASE_ENV) {
        return Ok(SecretString::from(value));
    }

    let passphrase = prompt_passphrase("Passphrase: ")?;
    if passphrase.is_empty() {
        return Err(
            CryptoError::MissingPassphrase("passphrase must not be empty".to_string()).into(),
        );
    }
    if confirm {
        let again = prompt_passphrase("Confirm passphrase: ")?;
        if passphrase != again {
            return Err(
                CryptoError::MissingPassphrase("passphrases do not match".to_string()).into(),
            );
        }
    }
    Ok(SecretString::from(passphrase))
}

/// Pick the age identity file: flag, then config, then the default path
/// if it exists.
fn age_key_source(config: &Config, identity: Option<&Path>) -> Result<KeySource> {
    let path = identity
        .map(Path::to_path_buf)
        .or_else(|| config.crypto.identity_file.clone())
        .or_else(|| {
            let fallback = config::default_identity_path();
            fallback.exists().then_some(fallback)
        });
    match path {
        Some(path) => Ok(KeySource::File(path)),
        None => Err(CryptoError::IdentityUnavailable(
            "no identity file; pass --identity or run 'dv keygen'".to_string(),
        )
        .into()),
    }
}

// ============ INIT COMMAND ============

/// Create the vault layout and repository.
pub fn init(config: Config, remote: Option<&str>) -> Result<()> {
    let vault = Vault::new(config);
    let outcome = vault.init(remote)?;
    let root = vault.config().root.display().to_string();

    match outcome {
        InitOutcome::Created => {
            println!("  {} Initialized vault at {}", "✓".green(), root.cyan());
        }
        InitOutcome::Existing => {
            println!(
                "  {} Vault already initialized at {}",
                "✓".green(),
                root.dimmed()
            );
        }
    }
    if let Some(url) = remote {
        println!("  {} Remote: {}", "✓".green(), url);
    }
    Ok(())
}

// ============ ADD COMMAND ============

/// Copy a file into the vault and commit it.
pub fn add(config: Config, source: &Path, dest: Option<&Path>) -> Result<()> {
    let vault = Vault::new(config);
    match vault.add(source, dest)? {
        AddOutcome::Added(rel) => {
            println!(
                "  {} Added {}",
                "✓".green(),
                rel.display().to_string().cyan()
            );
        }
        AddOutcome::Updated(rel) => {
            println!(
                "  {} Updated {}",
                "✓".green(),
                rel.display().to_string().cyan()
            );
        }
        AddOutcome::Unchanged(rel) => {
            println!(
                "  {} {} is already up to date",
                "✓".green(),
                rel.display().to_string().dimmed()
            );
        }
    }
    Ok(())
}

// ============ ENCRYPT COMMAND ============

/// Encrypt a file into secrets/ as a tagged artifact.
pub fn encrypt(
    config: Config,
    file: &Path,
    method: &str,
    recipient: Option<&str>,
    passphrase_file: Option<&Path>,
) -> Result<()> {
    let method = Method::from_tag(method)?;
    let recipient = match method {
        Method::Age => {
            let value = recipient
                .map(str::to_string)
                .or_else(|| config.crypto.recipient.clone())
                .ok_or(CryptoError::MissingRecipient)?;
            Recipient::new(value)
        }
        Method::Gcm => Recipient::from_secret(gather_passphrase(passphrase_file, true)?),
    };

    let vault = Vault::new(config);
    let out = vault.encrypt(file, method, &recipient)?;
    println!(
        "  {} Encrypted {} -> {} {}",
        "✓".green(),
        file.display(),
        out.display().to_string().cyan(),
        format!("[{}]", method).dimmed()
    );
    Ok(())
}

// ============ DECRYPT COMMAND ============

/// Decrypt an artifact, dispatching on its header.
pub fn decrypt(
    config: Config,
    artifact: &Path,
    dest: Option<&Path>,
    identity: Option<&Path>,
    passphrase_file: Option<&Path>,
) -> Result<()> {
    let vault = Vault::new(config);
    let method = vault.inspect(artifact)?;
    let key = match method {
        Method::Age => age_key_source(vault.config(), identity)?,
        Method::Gcm => match passphrase_file {
            Some(path) => KeySource::File(path.to_path_buf()),
            None => KeySource::Inline(gather_passphrase(None, false)?),
        },
    };

    let out = vault.decrypt(artifact, dest, &key)?;
    println!(
        "  {} Decrypted {} -> {} {}",
        "✓".green(),
        artifact.display(),
        out.display().to_string().cyan(),
        format!("[{}]", method).dimmed()
    );
    Ok(())
}

// ============ PUSH COMMAND ============

/// Commit outstanding changes and push to the remote, best-effort.
pub fn push(config: Config) -> Result<()> {
    let vault = Vault::new(config);
    let report = vault.push()?;

    match &report.commit {
        CommitOutcome::Committed(id) => {
            let short = if id.len() > 8 { &id[..8] } else { id.as_str() };
            println!("  {} Committed: {}", "✓".green(), short.cyan());
        }
        CommitOutcome::NothingToCommit => {
            println!("  {}", "Nothing to commit.".dimmed());
        }
    }

    match &report.push {
        PushState::Pushed => {
            println!("  {} Pushed to remote", "✓".green());
        }
        PushState::NoRemote => {
            println!("  {}", "No remote configured; changes stay local.".yellow());
        }
        PushState::Failed(reason) => {
            println!("  {} Push failed: {}", "!".yellow(), reason.dimmed());
            println!(
                "  {}",
                "Changes are committed locally; push again later.".yellow()
            );
        }
    }
    Ok(())
}

// ============ STATUS COMMAND ============

/// Show vault state.
pub fn status(config: Config) -> Result<()> {
    let vault = Vault::new(config);
    let status = vault.status()?;

    println!("{}", "Vault status".cyan().bold());
    println!("  Root:     {}", status.root.display());
    if !status.initialized {
        println!("  {}", "Not initialized (run 'dv init').".yellow());
        return Ok(());
    }

    if let Some(created_at) = &status.created_at {
        println!("  Created:  {}", created_at.dimmed());
    }
    println!(
        "  Tracked:  {} file(s)",
        status.tracked_files.to_string().cyan()
    );
    println!(
        "  Secrets:  {} artifact(s)",
        status.artifacts.to_string().cyan()
    );
    match &status.remote_url {
        Some(url) => println!("  Remote:   {}", url),
        None => println!("  Remote:   {}", "none".dimmed()),
    }
    if status.dirty {
        println!(
            "  {}",
            "Uncommitted changes present (run 'dv push').".yellow()
        );
    }
    Ok(())
}

// ============ LIST COMMAND ============

/// List tracked files and encrypted artifacts.
pub fn list(config: Config) -> Result<()> {
    let vault = Vault::new(config);
    let listing = vault.list()?;

    if listing.files.is_empty() && listing.artifacts.is_empty() {
        println!("{}", "Vault is empty.".yellow());
        return Ok(());
    }

    if !listing.files.is_empty() {
        println!("{}", "Tracked files".cyan().bold());
        for file in &listing.files {
            println!(
                "  {} {}",
                file.path.display(),
                format!("({} bytes)", file.size).dimmed()
            );
        }
    }

    if !listing.artifacts.is_empty() {
        println!("{}", "Encrypted artifacts".cyan().bold());
        for artifact in &listing.artifacts {
            let method = artifact
                .method
                .map(|m| m.to_string())
                .unwrap_or_else(|| "?".to_string());
            println!(
                "  {} {}",
                artifact.name,
                format!("[{}] ({} bytes)", method, artifact.size).dimmed()
            );
        }
    }
    Ok(())
}

// ============ KEYGEN COMMAND ============

/// Generate an age identity file and print the public key.
pub fn keygen(output: Option<&Path>) -> Result<()> {
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_identity_path);
    let public = crypto::generate_identity_file(&path)?;

    println!(
        "  {} Identity written to {}",
        "✓".green(),
        path.display().to_string().cyan()
    );
    println!("  {} Public key: {}", "✓".green(), public.bold());
    println!(
        "  {}",
        "Use it as --recipient, or set crypto.recipient in the config.".dimmed()
    );
    Ok(())
}
