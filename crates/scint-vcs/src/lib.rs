//! Git acquisition primitives: clone/fetch/rev-parse/checkout via the
//! system `git` binary, serialized per repo (the upstream VCS
//! cannot tolerate concurrent index-lock contention on the same repo).
//!
//! There's no VCS crate in the dependency stack, so this module follows
//! the rest of the workspace's subprocess idiom: a thin wrapper around
//! `std::process::Command` with typed errors, rather than pulling in a
//! third-party git binding.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};

use log::debug;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum Error {
    #[error("git {0} failed: {1}")]
    CommandFailed(&'static str, String),
    #[error("could not resolve revision {0}")]
    UnknownRevision(String),
    #[error("io")]
    Io(#[from] std::io::Error),
}

/// Process-scoped map of per-repo-directory mutexes. Acquired by every
/// git operation against the same bare repo so two workers never run
/// overlapping git subprocesses against it (two specs sharing
/// the same git repo).
#[derive(Debug, Clone, Default)]
pub struct RepoLocks(Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>);

impl RepoLocks {
    pub fn lock_for(&self, bare_path: &Path) -> Arc<Mutex<()>> {
        self.0
            .lock()
            .expect("repo lock map poisoned")
            .entry(bare_path.to_path_buf())
            .or_default()
            .clone()
    }
}

/// A bare-cloned repository living under the cache's `git/<uri-hash>/`.
pub struct GitRepo {
    bare_path: PathBuf,
}

impl GitRepo {
    pub fn new(bare_path: impl Into<PathBuf>) -> Self {
        Self {
            bare_path: bare_path.into(),
        }
    }

    pub fn exists(&self) -> bool {
        self.bare_path.join("HEAD").is_file()
    }

    /// Clones `uri` as a bare repo if the cached repo doesn't already exist.
    pub fn ensure_cloned(&self, uri: &Url) -> Result<(), Error> {
        if self.exists() {
            return Ok(());
        }

        if let Some(parent) = self.bare_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        debug!("cloning {uri} into {:?}", self.bare_path);
        run("clone", Command::new("git").args([
            "clone",
            "--bare",
            uri.as_str(),
            &self.bare_path.to_string_lossy(),
        ]))?;

        Ok(())
    }

    /// Fetches all refs with prune, for an already-cloned repo.
    pub fn fetch(&self) -> Result<(), Error> {
        debug!("fetching updates into {:?}", self.bare_path);
        run(
            "fetch",
            Command::new("git").args([
                "--git-dir",
                &self.bare_path.to_string_lossy(),
                "fetch",
                "--all",
                "--prune",
            ]),
        )?;
        Ok(())
    }

    /// Resolves `revision_spec` (a ref, branch, tag, "HEAD", or raw sha) to
    /// a commit hash via `rev-parse <rev>^{commit}`.
    pub fn resolve_commit(&self, revision_spec: &str) -> Result<String, Error> {
        let output = run(
            "rev-parse",
            Command::new("git").args([
                "--git-dir",
                &self.bare_path.to_string_lossy(),
                "rev-parse",
                &format!("{revision_spec}^{{commit}}"),
            ]),
        )
        .map_err(|_| Error::UnknownRevision(revision_spec.to_string()))?;

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Materializes the tree at `commit` into `dest` (which must not yet
    /// exist). When `submodules` is requested, performs a full local
    /// clone + checkout + recursive submodule update instead of a plain
    /// archive, since `git archive` cannot pull in submodule content.
    pub fn materialize(&self, commit: &str, dest: &Path, submodules: bool) -> Result<(), Error> {
        if submodules {
            self.materialize_with_submodules(commit, dest)
        } else {
            self.materialize_via_archive(commit, dest)
        }
    }

    fn materialize_via_archive(&self, commit: &str, dest: &Path) -> Result<(), Error> {
        std::fs::create_dir_all(dest)?;

        let output = run(
            "archive",
            Command::new("git").args([
                "--git-dir",
                &self.bare_path.to_string_lossy(),
                "archive",
                "--format=tar",
                commit,
            ]),
        )?;

        let mut archive = tar::Archive::new(std::io::Cursor::new(output.stdout));
        archive.unpack(dest)?;

        Ok(())
    }

    fn materialize_with_submodules(&self, commit: &str, dest: &Path) -> Result<(), Error> {
        let tmp = tempfile::tempdir()?;
        let work_tree = tmp.path();

        run(
            "clone",
            Command::new("git").args([
                "clone",
                "--no-checkout",
                &self.bare_path.to_string_lossy(),
                &work_tree.to_string_lossy(),
            ]),
        )?;

        run(
            "checkout",
            Command::new("git").args(["-C", &work_tree.to_string_lossy(), "checkout", commit]),
        )?;

        run(
            "submodule",
            Command::new("git").args([
                "-C",
                &work_tree.to_string_lossy(),
                "submodule",
                "update",
                "--init",
                "--recursive",
            ]),
        )?;

        copy_tree_excluding_git(work_tree, dest)?;

        Ok(())
    }
}

fn run(label: &'static str, command: &mut Command) -> Result<Output, Error> {
    let output = command.output()?;
    if !output.status.success() {
        return Err(Error::CommandFailed(label, String::from_utf8_lossy(&output.stderr).into_owned()));
    }
    Ok(output)
}

fn copy_tree_excluding_git(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree_excluding_git(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().map(|o| o.status.success()).unwrap_or(false)
    }

    fn init_fixture_repo(dir: &Path) {
        run("init", Command::new("git").args(["init", "--initial-branch=main", &dir.to_string_lossy()])).unwrap();
        run(
            "config",
            Command::new("git").args(["-C", &dir.to_string_lossy(), "config", "user.email", "t@example.com"]),
        )
        .unwrap();
        run(
            "config",
            Command::new("git").args(["-C", &dir.to_string_lossy(), "config", "user.name", "t"]),
        )
        .unwrap();
        std::fs::write(dir.join("a.gemspec"), "# gemspec").unwrap();
        run("add", Command::new("git").args(["-C", &dir.to_string_lossy(), "add", "."])).unwrap();
        run(
            "commit",
            Command::new("git").args(["-C", &dir.to_string_lossy(), "commit", "-m", "init"]),
        )
        .unwrap();
    }

    #[test]
    fn clone_resolve_and_materialize_round_trip() {
        if !git_available() {
            return;
        }

        let tmp = tempfile::tempdir().unwrap();
        let origin = tmp.path().join("origin");
        std::fs::create_dir_all(&origin).unwrap();
        init_fixture_repo(&origin);

        let bare = tmp.path().join("bare");
        let repo = GitRepo::new(&bare);
        let uri = Url::from_file_path(&origin).unwrap();
        repo.ensure_cloned(&uri).unwrap();
        assert!(repo.exists());

        let commit = repo.resolve_commit("HEAD").unwrap();
        assert_eq!(commit.len(), 40);

        let dest = tmp.path().join("materialized");
        repo.materialize(&commit, &dest, false).unwrap();
        assert!(dest.join("a.gemspec").exists());
    }
}
