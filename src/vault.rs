//! Vault management - layout, metadata and the core operations.
//!
//! A [`Vault`] owns the configuration plus two injected capabilities:
//! version control ([`Vcs`]) and encryption ([`Encryptor`]). Production
//! wiring uses git and the native cipher backends; tests inject fakes.
//!
//! Layout under the vault root:
//! - `dotfiles/` - tracked configuration files
//! - `secrets/`  - encrypted artifacts (`<name>.<method>.enc`)
//! - `vault.json` - manifest

use crate::config::Config;
use crate::crypto::{artifact, CipherSuite, Encryptor, KeySource, Method, Recipient};
use crate::vcs::{CommitOutcome, GitVcs, PushOutcome, Vcs};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

const MANIFEST_VERSION: u32 = 1;

/// Vault metadata stored in vault.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultManifest {
    /// Manifest format version
    pub version: u32,
    /// Vault creation timestamp
    pub created_at: String,
}

impl VaultManifest {
    /// Create new manifest with the current timestamp.
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Load the manifest from the vault root.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("vault.json");
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read manifest: {}", path.display()))?;
        let manifest: Self = serde_json::from_str(&content).context("Cannot parse vault.json")?;
        Ok(manifest)
    }

    /// Save the manifest to the vault root.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join("vault.json");
        let content = serde_json::to_string_pretty(self).context("Cannot serialize manifest")?;
        fs::write(&path, content)
            .with_context(|| format!("Cannot write manifest: {}", path.display()))?;
        Ok(())
    }
}

impl Default for VaultManifest {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of [`Vault::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The vault was created from scratch.
    Created,
    /// The vault already existed; nothing changed.
    Existing,
}

/// Result of [`Vault::add`], carrying the path relative to `dotfiles/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(PathBuf),
    Updated(PathBuf),
    /// The tracked copy already has identical contents.
    Unchanged(PathBuf),
}

/// How the push leg of [`Vault::push`] went. All three states are
/// successful outcomes; push is best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushState {
    Pushed,
    NoRemote,
    /// The push was attempted and failed; reported, not propagated.
    Failed(String),
}

/// Result of [`Vault::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub commit: CommitOutcome,
    pub push: PushState,
}

/// Snapshot of vault state for `dv status`.
#[derive(Debug, Clone)]
pub struct VaultStatus {
    pub root: PathBuf,
    pub initialized: bool,
    pub created_at: Option<String>,
    pub tracked_files: usize,
    pub artifacts: usize,
    pub dirty: bool,
    pub remote_url: Option<String>,
}

/// A tracked file, relative to `dotfiles/`.
#[derive(Debug, Clone)]
pub struct TrackedFile {
    pub path: PathBuf,
    pub size: u64,
}

/// An encrypted artifact in `secrets/`.
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub name: String,
    /// Method read from the artifact header; `None` when the header is
    /// unreadable.
    pub method: Option<Method>,
    pub size: u64,
}

/// Contents listing for `dv list`.
#[derive(Debug, Clone, Default)]
pub struct VaultListing {
    pub files: Vec<TrackedFile>,
    pub artifacts: Vec<ArtifactInfo>,
}

/// The vault: configuration plus injected version control and
/// encryption capabilities.
pub struct Vault {
    config: Config,
    vcs: Box<dyn Vcs>,
    encryptor: Box<dyn Encryptor>,
}

impl Vault {
    /// Vault with the production capabilities (git, native ciphers).
    pub fn new(config: Config) -> Self {
        Self::with_parts(config, Box::new(GitVcs), Box::new(CipherSuite))
    }

    /// Vault with explicit capabilities.
    pub fn with_parts(config: Config, vcs: Box<dyn Vcs>, encryptor: Box<dyn Encryptor>) -> Self {
        Self {
            config,
            vcs,
            encryptor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create the vault layout and repository. Idempotent: calling it on
    /// an existing vault changes nothing and succeeds.
    pub fn init(&self, remote: Option<&str>) -> Result<InitOutcome> {
        let root = &self.config.root;
        let fresh = !self.vcs.is_repo(root);

        fs::create_dir_all(root)
            .with_context(|| format!("Cannot create vault root: {}", root.display()))?;
        set_owner_only(root, 0o700)?;
        fs::create_dir_all(self.config.dotfiles_dir())?;
        fs::create_dir_all(self.config.secrets_dir())?;

        if fresh {
            self.vcs.init(root)?;

            let manifest_path = self.config.manifest_path();
            if !manifest_path.exists() {
                VaultManifest::new().save(root)?;
            }
            let readme_path = root.join("README.md");
            if !readme_path.exists() {
                fs::write(&readme_path, README_TEMPLATE)?;
            }

            self.vcs.stage_all(root)?;
            self.vcs.commit(root, "dotvault: initialize vault")?;
            debug!("created vault at {}", root.display());
        }

        if let Some(url) = remote.or(self.config.sync.remote_url.as_deref()) {
            self.vcs
                .set_remote(root, &self.config.sync.remote_name, url)?;
        }

        Ok(if fresh {
            InitOutcome::Created
        } else {
            InitOutcome::Existing
        })
    }

    /// Copy a file into the tracked tree and commit it.
    ///
    /// `dest` is relative to `dotfiles/` and defaults to the source file
    /// name. The source is copied, never moved or symlinked.
    pub fn add(&self, source: &Path, dest: Option<&Path>) -> Result<AddOutcome> {
        self.ensure_initialized()?;

        let meta = fs::metadata(source)
            .with_context(|| format!("Cannot read source file: {}", source.display()))?;
        if !meta.is_file() {
            bail!("not a regular file: {}", source.display());
        }

        let rel = match dest {
            Some(dest) => validate_dest(dest)?,
            None => PathBuf::from(
                source
                    .file_name()
                    .with_context(|| format!("Source has no file name: {}", source.display()))?,
            ),
        };

        let target = self.config.dotfiles_dir().join(&rel);
        let updating = target.exists();
        if updating && file_digest(&target)? == file_digest(source)? {
            debug!("{} is already up to date", rel.display());
            return Ok(AddOutcome::Unchanged(rel));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &target)
            .with_context(|| format!("Cannot copy to {}", target.display()))?;

        let staged = Path::new("dotfiles").join(&rel);
        self.vcs.stage(&self.config.root, &staged)?;
        let message = if updating {
            format!("dotvault: update {}", rel.display())
        } else {
            format!("dotvault: add {}", rel.display())
        };
        self.vcs.commit(&self.config.root, &message)?;

        Ok(if updating {
            AddOutcome::Updated(rel)
        } else {
            AddOutcome::Added(rel)
        })
    }

    /// Encrypt a file into `secrets/<name>.<method>.enc`.
    ///
    /// The plaintext is encrypted fully in memory before any byte is
    /// written, so a backend failure leaves no partial artifact. The
    /// artifact is not committed; `push` sweeps it up.
    pub fn encrypt(&self, file: &Path, method: Method, recipient: &Recipient) -> Result<PathBuf> {
        self.ensure_initialized()?;

        let plaintext = fs::read(file)
            .with_context(|| format!("Cannot read file: {}", file.display()))?;
        let name = file
            .file_name()
            .with_context(|| format!("Source has no file name: {}", file.display()))?
            .to_string_lossy()
            .into_owned();

        let payload = self.encryptor.encrypt(method, &plaintext, recipient)?;
        let sealed = artifact::seal(method, &payload);

        let secrets_dir = self.config.secrets_dir();
        fs::create_dir_all(&secrets_dir)?;
        let out = secrets_dir.join(artifact::artifact_name(&name, method));
        fs::write(&out, sealed)
            .with_context(|| format!("Cannot write artifact: {}", out.display()))?;
        set_owner_only(&out, 0o600)?;

        debug!("encrypted {} -> {} ({})", file.display(), out.display(), method);
        Ok(out)
    }

    /// Decrypt an artifact, dispatching on its header.
    ///
    /// `artifact` may be a path or a bare name to look up in `secrets/`.
    /// `dest` defaults to the artifact name with its `.<method>.enc`
    /// suffix stripped, in the current directory; a name without a
    /// recognized suffix requires an explicit `dest`.
    pub fn decrypt(&self, artifact: &Path, dest: Option<&Path>, key: &KeySource) -> Result<PathBuf> {
        let path = self.resolve_artifact(artifact)?;
        let bytes = fs::read(&path)
            .with_context(|| format!("Cannot read artifact: {}", path.display()))?;

        let (method, payload) = artifact::open(&bytes)
            .with_context(|| format!("Cannot decode artifact: {}", path.display()))?;
        let plaintext = self.encryptor.decrypt(method, payload, key)?;

        let out = match dest {
            Some(dest) => dest.to_path_buf(),
            None => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match artifact::plaintext_name(&name) {
                    Some(stem) => PathBuf::from(stem),
                    None => bail!(
                        "cannot derive an output name from '{}'; pass an explicit destination",
                        name
                    ),
                }
            }
        };

        if let Some(parent) = out.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&out, plaintext)
            .with_context(|| format!("Cannot write decrypted file: {}", out.display()))?;
        set_owner_only(&out, 0o600)?;

        debug!("decrypted {} -> {} ({})", path.display(), out.display(), method);
        Ok(out)
    }

    /// Read the method recorded in an artifact's header.
    pub fn inspect(&self, artifact: &Path) -> Result<Method> {
        let path = self.resolve_artifact(artifact)?;
        let bytes = fs::read(&path)
            .with_context(|| format!("Cannot read artifact: {}", path.display()))?;
        let (method, _) = artifact::open(&bytes)
            .with_context(|| format!("Cannot decode artifact: {}", path.display()))?;
        Ok(method)
    }

    /// Commit outstanding changes and push to the configured remote.
    ///
    /// "Nothing to commit", a missing remote and a failed push are all
    /// normal outcomes. Local stage or commit errors still propagate.
    pub fn push(&self) -> Result<PushReport> {
        self.ensure_initialized()?;
        let root = &self.config.root;

        self.vcs.stage_all(root)?;
        let commit = self.vcs.commit(root, "dotvault: sync")?;

        let remote_name = &self.config.sync.remote_name;
        let push = match self.vcs.remote_url(root, remote_name)? {
            None => PushState::NoRemote,
            Some(_) => match self.vcs.push(root, remote_name, &self.config.sync.branch) {
                Ok(PushOutcome::Pushed) => PushState::Pushed,
                Ok(PushOutcome::NoRemote) => PushState::NoRemote,
                Err(err) => {
                    warn!("push failed: {:#}", err);
                    PushState::Failed(format!("{:#}", err))
                }
            },
        };

        Ok(PushReport { commit, push })
    }

    /// Snapshot of vault state.
    pub fn status(&self) -> Result<VaultStatus> {
        let root = &self.config.root;
        let initialized = self.vcs.is_repo(root);
        if !initialized {
            return Ok(VaultStatus {
                root: root.clone(),
                initialized: false,
                created_at: None,
                tracked_files: 0,
                artifacts: 0,
                dirty: false,
                remote_url: None,
            });
        }

        let listing = self.list()?;
        Ok(VaultStatus {
            root: root.clone(),
            initialized: true,
            created_at: VaultManifest::load(root).ok().map(|m| m.created_at),
            tracked_files: listing.files.len(),
            artifacts: listing.artifacts.len(),
            dirty: self.vcs.has_changes(root)?,
            remote_url: self.vcs.remote_url(root, &self.config.sync.remote_name)?,
        })
    }

    /// List tracked files and encrypted artifacts, sorted by name.
    pub fn list(&self) -> Result<VaultListing> {
        let mut listing = VaultListing::default();

        let dotfiles_dir = self.config.dotfiles_dir();
        if dotfiles_dir.exists() {
            let mut paths = Vec::new();
            walk_files(&dotfiles_dir, &mut paths)?;
            for path in paths {
                let rel = path
                    .strip_prefix(&dotfiles_dir)
                    .unwrap_or(&path)
                    .to_path_buf();
                let size = fs::metadata(&path)?.len();
                listing.files.push(TrackedFile { path: rel, size });
            }
            listing.files.sort_by(|a, b| a.path.cmp(&b.path));
        }

        let secrets_dir = self.config.secrets_dir();
        if secrets_dir.exists() {
            for entry in fs::read_dir(&secrets_dir)? {
                let entry = entry?;
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                let size = fs::metadata(&path)?.len();
                let method = fs::read(&path)
                    .ok()
                    .and_then(|bytes| artifact::open(&bytes).ok().map(|(m, _)| m));
                listing.artifacts.push(ArtifactInfo { name, method, size });
            }
            listing.artifacts.sort_by(|a, b| a.name.cmp(&b.name));
        }

        Ok(listing)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if !self.vcs.is_repo(&self.config.root) {
            bail!(
                "vault is not initialized (run 'dv init' first): {}",
                self.config.root.display()
            );
        }
        Ok(())
    }

    fn resolve_artifact(&self, artifact: &Path) -> Result<PathBuf> {
        if artifact.exists() {
            return Ok(artifact.to_path_buf());
        }
        let in_secrets = self.config.secrets_dir().join(artifact);
        if in_secrets.exists() {
            return Ok(in_secrets);
        }
        bail!("artifact not found: {}", artifact.display());
    }
}

const README_TEMPLATE: &str = "\
# Dotfiles vault

Managed by dotvault.

- `dotfiles/` - tracked configuration files
- `secrets/` - encrypted artifacts (`<name>.<method>.enc`)
";

/// Normalize an add destination. Only plain relative paths are allowed;
/// anything that could escape the vault is rejected.
fn validate_dest(dest: &Path) -> Result<PathBuf> {
    if dest.is_absolute() {
        bail!("destination must be a relative path: {}", dest.display());
    }
    let mut clean = PathBuf::new();
    for component in dest.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => bail!("destination must stay inside the vault: {}", dest.display()),
        }
    }
    if clean.as_os_str().is_empty() {
        bail!("destination must not be empty");
    }
    Ok(clean)
}

fn file_digest(path: &Path) -> Result<[u8; 32]> {
    let bytes =
        fs::read(path).with_context(|| format!("Cannot read file: {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hasher.finalize().into())
}

fn walk_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(unix)]
fn set_owner_only(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
