//! Source acquirers: registry, git, path, and builtin, each implementing
//! the two-phase `download`/`extract` contract.
//!
//! Each acquirer follows a `fetch`/`unpack` split: download into a
//! stable path, then materialize the content through the cache's
//! assemble-then-promote protocol.

pub mod builtin;
pub mod git;
pub mod path;
pub mod registry;

use std::path::PathBuf;

use scint_cache::{CacheLayout, Promoter};
use scint_core::{ResolvedSpec, SourceKind};
use scint_net::DownloadPool;
use scint_vcs::RepoLocks;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("archive")]
    Archive(#[from] scint_archive::Error),
    #[error("git")]
    Git(#[from] scint_vcs::Error),
    #[error("cache")]
    Cache(#[from] scint_cache::Error),
    #[error("promote")]
    Promote(#[from] scint_cache::promote::Error),
    #[error("network")]
    Network(#[from] scint_net::PoolError),
    #[error("gemspec not found under {0:?}")]
    GemspecNotFound(PathBuf),
    #[error("acquirer for {expected} was handed a spec resolved against a different source kind")]
    WrongSourceKind { expected: &'static str },
    #[error("could not build a download url for this spec")]
    InvalidDownloadUrl,
    #[error("io")]
    Io(#[from] std::io::Error),
}

/// What `extract` produced: a stable tree ready to be linked, plus
/// whether the acquirer itself already promoted it into `cached/`
/// (registry/git acquirers with no native extension do; path/builtin
/// acquirers never touch the cache at all).
#[derive(Debug, Clone)]
pub struct ExtractOutcome {
    pub gem_path: PathBuf,
    pub promoted_to_cache: bool,
}

/// Two idempotent operations every source kind implements.
pub trait Acquirer {
    /// Makes a source-specific blob locally available. A no-op for
    /// `Path`/`Builtin` sources.
    fn download(&self, spec: &ResolvedSpec) -> Result<(), Error>;

    /// Materializes the tree this spec's package content lives at.
    fn extract(&self, spec: &ResolvedSpec) -> Result<ExtractOutcome, Error>;
}

/// Top-of-repo files gemspecs commonly reference across subdir
/// boundaries. Carried verbatim from Bundler's own git source handling
/// rather than invented.
pub const TOP_LEVEL_WHITELIST: &[&str] = &["VERSION", "RAILS_VERSION", "RUBY_VERSION"];

/// Locates the gem's subdirectory within an extracted git checkout:
/// prefer `<repo>/<name>.gemspec`, then a path matching `glob`, then any
/// `**/*.gemspec` whose basename matches.
pub fn locate_gemspec_dir(root: &std::path::Path, name: &str, glob_pattern: Option<&str>) -> Result<PathBuf, Error> {
    let exact = root.join(format!("{name}.gemspec"));
    if exact.is_file() {
        return Ok(root.to_path_buf());
    }

    if let Some(pattern) = glob_pattern {
        let full_pattern = root.join(pattern).to_string_lossy().into_owned();
        if let Some(found) = glob::glob(&full_pattern)
            .into_iter()
            .flatten()
            .filter_map(Result::ok)
            .find(|p| p.file_name().and_then(|n| n.to_str()) == Some(&format!("{name}.gemspec")))
        {
            return Ok(found.parent().unwrap_or(root).to_path_buf());
        }
    }

    let recursive_pattern = root.join("**").join(format!("{name}.gemspec")).to_string_lossy().into_owned();
    if let Some(found) = glob::glob(&recursive_pattern).into_iter().flatten().filter_map(Result::ok).next() {
        return Ok(found.parent().unwrap_or(root).to_path_buf());
    }

    Err(Error::GemspecNotFound(root.to_path_buf()))
}

/// Shared collaborators every acquirer is built from, bundled so the
/// install orchestrator can construct the right one per source kind
/// without repeating the wiring at each call site.
#[derive(Clone)]
pub struct Acquirers {
    layout: CacheLayout,
    promoter: Promoter,
    pool: DownloadPool,
    repo_locks: RepoLocks,
}

impl Acquirers {
    pub fn new(layout: CacheLayout, promoter: Promoter, pool: DownloadPool, repo_locks: RepoLocks) -> Self {
        Self {
            layout,
            promoter,
            pool,
            repo_locks,
        }
    }

    /// Picks the acquirer matching `kind` and boxes it behind the
    /// [`Acquirer`] trait so callers don't need to match on source kind
    /// themselves.
    pub fn for_kind(&self, kind: SourceKind) -> Box<dyn Acquirer + Send + Sync> {
        match kind {
            SourceKind::Registry => Box::new(registry::RegistryAcquirer::new(
                self.layout.clone(),
                self.promoter.clone(),
                self.pool.clone(),
            )),
            SourceKind::Git => Box::new(git::GitAcquirer::new(
                self.layout.clone(),
                self.promoter.clone(),
                self.repo_locks.clone(),
            )),
            SourceKind::Path => Box::new(path::PathAcquirer),
            SourceKind::Builtin => Box::new(builtin::BuiltinAcquirer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_exact_gemspec_at_root() {
        let tmp = tempfile::tempdir().unwrap();
        fs_err::write(tmp.path().join("rack.gemspec"), "# spec").unwrap();

        let found = locate_gemspec_dir(tmp.path(), "rack", None).unwrap();
        assert_eq!(found, tmp.path());
    }

    #[test]
    fn finds_gemspec_in_nested_subdir_via_recursive_scan() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("nested").join("pkg");
        fs_err::create_dir_all(&sub).unwrap();
        fs_err::write(sub.join("widget.gemspec"), "# spec").unwrap();

        let found = locate_gemspec_dir(tmp.path(), "widget", None).unwrap();
        assert_eq!(found, sub);
    }

    #[test]
    fn missing_gemspec_is_a_fatal_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(locate_gemspec_dir(tmp.path(), "nope", None).is_err());
    }
}
