//! CLI definitions and command implementations for dotvault.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dotvault - track your dotfiles, encrypt your secrets
#[derive(Parser)]
#[command(name = "dv")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the config file (default: ~/.config/dotvault/dotvault.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Vault root directory, overriding the config (default: ~/.dotfiles)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Verbose logging (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the vault layout and repository (safe to re-run)
    Init {
        /// URL of the remote repository to push to
        #[arg(short, long, value_name = "URL")]
        remote: Option<String>,
    },

    /// Copy a file into the vault and commit it
    Add {
        /// File to track
        source: PathBuf,

        /// Destination inside the vault, relative to dotfiles/
        /// (default: the source file name)
        dest: Option<PathBuf>,
    },

    /// Encrypt a file into secrets/ as a tagged artifact
    Encrypt {
        /// File to encrypt
        file: PathBuf,

        /// Encryption method: age or gcm
        #[arg(short, long, default_value = "age")]
        method: String,

        /// age recipient (public key), overriding the config
        #[arg(short, long, value_name = "RECIPIENT")]
        recipient: Option<String>,

        /// Read the gcm passphrase from this file instead of prompting
        #[arg(long, value_name = "PATH")]
        passphrase_file: Option<PathBuf>,
    },

    /// Decrypt an artifact (method read from its header)
    Decrypt {
        /// Artifact path, or a bare name looked up in secrets/
        artifact: PathBuf,

        /// Where to write the plaintext (default: artifact name with
        /// its suffix stripped)
        dest: Option<PathBuf>,

        /// age identity file, overriding the config
        #[arg(short, long, value_name = "PATH")]
        identity: Option<PathBuf>,

        /// Read the gcm passphrase from this file instead of prompting
        #[arg(long, value_name = "PATH")]
        passphrase_file: Option<PathBuf>,
    },

    /// Commit outstanding changes and push to the remote, best-effort
    Push,

    /// Show vault state: tracked files, artifacts, pending changes
    Status,

    /// List tracked files and encrypted artifacts
    List,

    /// Generate an age identity file and print the public key
    Keygen {
        /// Where to write the identity
        /// (default: ~/.config/dotvault/identity.txt)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}
