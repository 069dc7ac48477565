//! Config module - manages dotvault configuration (dotvault.toml).
//!
//! Configuration file contains:
//! - Vault root path
//! - Git sync settings (remote, branch)
//! - Default encryption key material references
//!
//! Every vault operation receives a `Config`; nothing reads a fixed
//! home-relative path at operation time, so tests can point the whole
//! tool at a temporary directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Git sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Push target URL; registered as the git remote on `init --remote`
    pub remote_url: Option<String>,
    /// Remote name (default: "origin")
    #[serde(default = "default_remote_name")]
    pub remote_name: String,
    /// Branch to push (default: "main")
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_remote_name() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            remote_name: default_remote_name(),
            branch: default_branch(),
        }
    }
}

/// Default encryption key material.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CryptoConfig {
    /// Default age recipient (public key) for encrypt
    pub recipient: Option<String>,
    /// Default age identity file for decrypt
    pub identity_file: Option<PathBuf>,
}

/// Main dotvault configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Config version (for future migrations)
    #[serde(default = "default_version")]
    pub version: u32,

    /// Vault root directory
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Git sync configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Encryption defaults
    #[serde(default)]
    pub crypto: CryptoConfig,
}

fn default_version() -> u32 {
    1
}

/// Default vault root (~/.dotfiles).
pub fn default_root() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".dotfiles"))
        .unwrap_or_else(|| PathBuf::from(".dotfiles"))
}

/// Default config directory (~/.config/dotvault/).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("dotvault"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default config file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("dotvault.toml")
}

/// Default age identity file path (written by keygen).
pub fn default_identity_path() -> PathBuf {
    default_config_dir().join("identity.txt")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            root: default_root(),
            sync: SyncConfig::default(),
            crypto: CryptoConfig::default(),
        }
    }
}

impl Config {
    /// Create new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config rooted at a specific directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }

    /// Load config from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Cannot parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from the default path, falling back to defaults when
    /// no file exists.
    pub fn load_default() -> Result<Self> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file with owner-only permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).with_context(|| "Cannot serialize config to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Cannot write config file: {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Save config to the default path.
    pub fn save_default(&self) -> Result<PathBuf> {
        let path = default_config_path();
        self.save(&path)?;
        Ok(path)
    }

    /// Tracked dotfiles directory inside the vault.
    pub fn dotfiles_dir(&self) -> PathBuf {
        self.root.join("dotfiles")
    }

    /// Encrypted artifacts directory inside the vault.
    pub fn secrets_dir(&self) -> PathBuf {
        self.root.join("secrets")
    }

    /// Vault manifest path.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("vault.json")
    }
}
