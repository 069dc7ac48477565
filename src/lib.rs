//! dotvault - dotfiles and secrets manager.
//!
//! Tracks configuration files in a git-backed vault and encrypts the
//! sensitive ones. Provides the following capabilities:
//! - Initialize a vault at a configurable root (default `~/.dotfiles`)
//! - Track dotfiles by copying them into the vault and committing
//! - Encrypt files into tagged artifacts (age X25519 or AES-256-GCM)
//! - Decrypt artifacts by dispatching on their header
//! - Best-effort sync: commit everything, push if a remote is set
//!
//! Version control and encryption are capabilities behind traits, so
//! operations can be exercised against fakes.

pub mod config;
pub mod crypto;
pub mod vault;
pub mod vcs;

// Re-export main types
pub use config::Config;
pub use crypto::{CipherSuite, CryptoError, Encryptor, KeySource, Method, Recipient};
pub use vault::{
    AddOutcome, InitOutcome, PushReport, PushState, Vault, VaultListing, VaultStatus,
};
pub use vcs::{CommitOutcome, GitVcs, PushOutcome, Vcs};
