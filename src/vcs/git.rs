//! Git operations via libgit2 (git2 crate).
//!
//! - Init repository with `main` as the initial branch
//! - Stage and commit through the index
//! - Push through git credential helpers / SSH agent (auth-git2)

use super::{CommitOutcome, PushOutcome, Vcs};
use anyhow::{Context, Result};
use auth_git2::GitAuthenticator;
use git2::{
    IndexAddOption, PushOptions, RemoteCallbacks, Repository, RepositoryInitOptions, Signature,
    StatusOptions,
};
use std::path::Path;
use tracing::debug;

// Commit signature when git has no user.name/user.email configured.
const FALLBACK_NAME: &str = "dotvault";
const FALLBACK_EMAIL: &str = "dotvault@local";

/// Git-backed [`Vcs`]. Opens the repository fresh on every call.
pub struct GitVcs;

impl GitVcs {
    fn open(&self, root: &Path) -> Result<Repository> {
        Repository::open(root)
            .with_context(|| format!("Cannot open git repository: {}", root.display()))
    }
}

impl Vcs for GitVcs {
    fn init(&self, root: &Path) -> Result<()> {
        if Repository::open(root).is_ok() {
            return Ok(());
        }
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        Repository::init_opts(root, &opts)
            .with_context(|| format!("Cannot init git repository: {}", root.display()))?;
        debug!("initialized git repository at {}", root.display());
        Ok(())
    }

    fn is_repo(&self, root: &Path) -> bool {
        Repository::open(root).is_ok()
    }

    fn stage(&self, root: &Path, rel: &Path) -> Result<()> {
        let repo = self.open(root)?;
        let mut index = repo.index()?;
        index
            .add_path(rel)
            .with_context(|| format!("Cannot stage {}", rel.display()))?;
        index.write()?;
        Ok(())
    }

    fn stage_all(&self, root: &Path) -> Result<()> {
        let repo = self.open(root)?;
        let mut index = repo.index()?;
        index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"], None)?;
        index.write()?;
        Ok(())
    }

    fn commit(&self, root: &Path, message: &str) -> Result<CommitOutcome> {
        let repo = self.open(root)?;
        let sig = repo
            .signature()
            .or_else(|_| Signature::now(FALLBACK_NAME, FALLBACK_EMAIL))
            .context("Cannot create git signature")?;

        let mut index = repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;

        let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        match &parent {
            Some(head) if head.tree_id() == tree_id => return Ok(CommitOutcome::NothingToCommit),
            None if index.is_empty() => return Ok(CommitOutcome::NothingToCommit),
            _ => {}
        }

        let commit_id = match &parent {
            Some(head) => repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[head])?,
            None => repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[])?,
        };
        debug!("committed {} ({})", commit_id, message);
        Ok(CommitOutcome::Committed(commit_id.to_string()))
    }

    fn has_changes(&self, root: &Path) -> Result<bool> {
        let repo = self.open(root)?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let statuses = repo.statuses(Some(&mut opts))?;
        Ok(!statuses.is_empty())
    }

    fn push(&self, root: &Path, remote_name: &str, branch: &str) -> Result<PushOutcome> {
        let repo = self.open(root)?;
        let mut remote = match repo.find_remote(remote_name) {
            Ok(remote) => remote,
            Err(_) => return Ok(PushOutcome::NoRemote),
        };

        let auth = GitAuthenticator::default();
        let git_config = repo.config()?;
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(auth.credentials(&git_config));
        let mut opts = PushOptions::new();
        opts.remote_callbacks(callbacks);

        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        remote
            .push(&[refspec.as_str()], Some(&mut opts))
            .with_context(|| format!("Cannot push '{}' to remote '{}'", branch, remote_name))?;
        debug!("pushed {} to {}", branch, remote_name);
        Ok(PushOutcome::Pushed)
    }

    fn set_remote(&self, root: &Path, name: &str, url: &str) -> Result<()> {
        let repo = self.open(root)?;
        if repo.find_remote(name).is_ok() {
            repo.remote_set_url(name, url)?;
        } else {
            repo.remote(name, url)
                .with_context(|| format!("Cannot add remote '{}': {}", name, url))?;
        }
        Ok(())
    }

    fn remote_url(&self, root: &Path, name: &str) -> Result<Option<String>> {
        let repo = self.open(root)?;
        let url = match repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(_) => Ok(None),
        };
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_repository() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("vault");

        let vcs = GitVcs;
        assert!(!vcs.is_repo(&root));
        vcs.init(&root)?;
        assert!(vcs.is_repo(&root));
        assert!(root.join(".git").exists());

        // A second init is a no-op
        vcs.init(&root)?;
        assert!(vcs.is_repo(&root));
        Ok(())
    }

    #[test]
    fn test_commit_detects_nothing_to_commit() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();
        let vcs = GitVcs;
        vcs.init(&root)?;

        // Fresh repo, empty index
        assert_eq!(vcs.commit(&root, "empty")?, CommitOutcome::NothingToCommit);

        std::fs::write(root.join("config"), "set number\n")?;
        vcs.stage(&root, Path::new("config"))?;
        let outcome = vcs.commit(&root, "add config")?;
        assert!(matches!(outcome, CommitOutcome::Committed(_)));

        // Same tree again
        vcs.stage_all(&root)?;
        assert_eq!(vcs.commit(&root, "again")?, CommitOutcome::NothingToCommit);
        Ok(())
    }

    #[test]
    fn test_commit_message_recorded() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();
        let vcs = GitVcs;
        vcs.init(&root)?;

        std::fs::write(root.join("file"), "contents")?;
        vcs.stage(&root, Path::new("file"))?;
        vcs.commit(&root, "dotvault: add file")?;

        let repo = Repository::open(&root)?;
        let head = repo.head()?.peel_to_commit()?;
        assert_eq!(head.message().unwrap(), "dotvault: add file");
        Ok(())
    }

    #[test]
    fn test_has_changes() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();
        let vcs = GitVcs;
        vcs.init(&root)?;

        assert!(!vcs.has_changes(&root)?);

        std::fs::write(root.join("new.conf"), "x=1\n")?;
        assert!(vcs.has_changes(&root)?);

        vcs.stage_all(&root)?;
        vcs.commit(&root, "add new.conf")?;
        assert!(!vcs.has_changes(&root)?);
        Ok(())
    }

    #[test]
    fn test_push_to_local_remote() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("vault");
        let bare = temp_dir.path().join("remote.git");
        Repository::init_bare(&bare)?;

        let vcs = GitVcs;
        vcs.init(&root)?;
        std::fs::write(root.join("file"), "contents")?;
        vcs.stage_all(&root)?;
        vcs.commit(&root, "first")?;

        // No remote configured yet
        assert_eq!(vcs.push(&root, "origin", "main")?, PushOutcome::NoRemote);

        let url = bare.to_string_lossy().to_string();
        vcs.set_remote(&root, "origin", &url)?;
        assert_eq!(vcs.remote_url(&root, "origin")?, Some(url));
        assert_eq!(vcs.push(&root, "origin", "main")?, PushOutcome::Pushed);

        let mirror = Repository::open_bare(&bare)?;
        assert!(mirror.find_reference("refs/heads/main").is_ok());
        Ok(())
    }

    #[test]
    fn test_set_remote_updates_url() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();
        let vcs = GitVcs;
        vcs.init(&root)?;

        vcs.set_remote(&root, "origin", "https://example.com/one.git")?;
        vcs.set_remote(&root, "origin", "https://example.com/two.git")?;
        assert_eq!(
            vcs.remote_url(&root, "origin")?,
            Some("https://example.com/two.git".to_string())
        );
        assert_eq!(vcs.remote_url(&root, "upstream")?, None);
        Ok(())
    }
}
