//! Version control capability.
//!
//! The vault drives git through this narrow interface so tests can
//! substitute a fake. The libgit2 implementation lives in [`git`].

mod git;

pub use git::GitVcs;

use anyhow::Result;
use std::path::Path;

/// Result of a commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A commit was created with this id.
    Committed(String),
    /// The staged tree matches HEAD; there was nothing to record.
    NothingToCommit,
}

/// Result of a push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    /// The named remote is not configured.
    NoRemote,
}

/// Version control operations the vault needs.
pub trait Vcs {
    /// Create a repository at `root` (no-op when one already exists).
    fn init(&self, root: &Path) -> Result<()>;

    /// Whether `root` is a repository.
    fn is_repo(&self, root: &Path) -> bool;

    /// Stage a single path, given relative to `root`.
    fn stage(&self, root: &Path, rel: &Path) -> Result<()>;

    /// Stage all changes, including deletions.
    fn stage_all(&self, root: &Path) -> Result<()>;

    /// Commit the staged tree.
    fn commit(&self, root: &Path, message: &str) -> Result<CommitOutcome>;

    /// Whether the worktree or index differ from HEAD.
    fn has_changes(&self, root: &Path) -> Result<bool>;

    /// Push `branch` to the named remote.
    fn push(&self, root: &Path, remote: &str, branch: &str) -> Result<PushOutcome>;

    /// Create the named remote, or update its URL.
    fn set_remote(&self, root: &Path, name: &str, url: &str) -> Result<()>;

    /// URL of the named remote, if configured.
    fn remote_url(&self, root: &Path, name: &str) -> Result<Option<String>>;
}
