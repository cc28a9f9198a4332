//! Git acquirer: clones/fetches a bare repo, resolves the pinned commit,
//! materializes the working tree, then promotes it into the cache like
//! any other source.

use std::path::{Path, PathBuf};

use scint_cache::{CacheLayout, Promoter};
use scint_core::{ResolvedSource, ResolvedSpec};
use scint_vcs::{GitRepo, RepoLocks};

use crate::{locate_gemspec_dir, Acquirer, Error, ExtractOutcome, TOP_LEVEL_WHITELIST};

pub struct GitAcquirer {
    layout: CacheLayout,
    promoter: Promoter,
    repo_locks: RepoLocks,
}

impl GitAcquirer {
    pub fn new(layout: CacheLayout, promoter: Promoter, repo_locks: RepoLocks) -> Self {
        Self {
            layout,
            promoter,
            repo_locks,
        }
    }

    fn uri_and_revision(spec: &ResolvedSpec) -> Result<(&url::Url, &str), Error> {
        match &spec.source {
            ResolvedSource::Git { uri, revision } => Ok((uri, revision.as_str())),
            _ => Err(Error::WrongSourceKind { expected: "git" }),
        }
    }

    /// `cached/<k>/` existing isn't enough on its own for a git source: the
    /// directory key is `name-version[-platform]`, which doesn't change
    /// when a branch-pinned dependency's tip moves. The revision marker
    /// sidecar is the actual freshness check; a missing marker (cache
    /// populated before this check existed, or by a build that doesn't
    /// write one) is tolerated as still valid, same as a missing `.spec`/
    /// `.manifest` sibling.
    fn cached_tree_is_at_revision(&self, marker_path: &Path, revision: &str) -> bool {
        match fs_err::read_to_string(marker_path) {
            Ok(stored) => stored == revision,
            Err(_) => true,
        }
    }
}

impl Acquirer for GitAcquirer {
    fn download(&self, spec: &ResolvedSpec) -> Result<(), Error> {
        let (uri, revision) = Self::uri_and_revision(spec)?;
        let bare = self.layout.git_path(uri);

        let lock = self.repo_locks.lock_for(&bare);
        let _guard = lock.lock().expect("repo lock poisoned");

        let repo = GitRepo::new(&bare);
        if !repo.exists() {
            repo.ensure_cloned(uri)?;
        }

        if repo.resolve_commit(revision).is_err() {
            repo.fetch()?;
            repo.resolve_commit(revision)?;
        }

        Ok(())
    }

    fn extract(&self, spec: &ResolvedSpec) -> Result<ExtractOutcome, Error> {
        let (uri, revision) = Self::uri_and_revision(spec)?;
        let cached = self.layout.cached_path(spec);
        let revision_marker = self.layout.git_revision_marker_path(spec);

        if cached.is_dir() {
            if self.cached_tree_is_at_revision(&revision_marker, revision) {
                return Ok(ExtractOutcome {
                    gem_path: cached,
                    promoted_to_cache: false,
                });
            }
            log::info!("{} moved to a new revision, re-materializing {cached:?}", spec.full_name());
            fs_err::remove_dir_all(&cached)?;
            let _ = fs_err::remove_file(self.layout.cached_spec_path(spec));
            let _ = fs_err::remove_file(self.layout.cached_manifest_path(spec));
            let _ = fs_err::remove_file(&revision_marker);
        }

        let bare = self.layout.git_path(uri);
        let repo = GitRepo::new(&bare);
        let commit = repo.resolve_commit(revision)?;

        let staging = self.layout.assembling_tmp_path(spec);
        repo.materialize(&commit, &staging, false)?;

        let gemspec_dir = locate_gemspec_dir(&staging, &spec.name, None)?;
        copy_whitelisted_top_level_files(&staging, &gemspec_dir)?;
        let content_root = relocate_to_own_staging(&gemspec_dir, &staging)?;

        let has_extensions = content_root.join("ext").is_dir();
        let manifest = scint_archive::ContentManifest::from_tree(&content_root)?;

        let lock_key = spec.full_name().to_string();
        let outcome = self.promoter.promote(&content_root, &cached, &lock_key)?;

        if outcome == scint_cache::PromoteOutcome::Promoted {
            manifest.write_to(&self.layout.cached_manifest_path(spec))?;
            let metadata = scint_archive::GemMetadata {
                name: spec.name.clone(),
                version: spec.version.clone(),
                require_paths: vec!["lib".to_string()],
                has_extensions,
                extension_entry: has_extensions.then(|| "ext/extconf.rb".to_string()),
            };
            metadata.write_to(&self.layout.cached_spec_path(spec))?;
            fs_err::write(&revision_marker, &commit)?;
        }

        Ok(ExtractOutcome {
            gem_path: cached,
            promoted_to_cache: outcome == scint_cache::PromoteOutcome::Promoted,
        })
    }
}

/// Copies top-of-repo files gemspecs commonly reference across a
/// monorepo's subdirectory boundary (`VERSION`, `RAILS_VERSION`, ...) into
/// the gem's own subdirectory, if present at the repo root and not already
/// shadowed by a same-named file inside the gemspec's own directory.
/// A no-op when the gemspec lives at the checkout root already.
fn copy_whitelisted_top_level_files(checkout_root: &Path, gemspec_dir: &Path) -> std::io::Result<()> {
    if checkout_root == gemspec_dir {
        return Ok(());
    }
    for name in TOP_LEVEL_WHITELIST {
        let src = checkout_root.join(name);
        let dest = gemspec_dir.join(name);
        if src.is_file() && !dest.exists() {
            fs_err::copy(&src, &dest)?;
        }
    }
    Ok(())
}

/// If the gemspec lives in a subdirectory of the materialized checkout
/// (a monorepo-style git source), moves that subdirectory out into its
/// own staging path so the promoted tree contains only the gem's
/// content, not unrelated sibling directories.
fn relocate_to_own_staging(content_root: &Path, staging_root: &Path) -> std::io::Result<PathBuf> {
    if content_root == staging_root {
        return Ok(staging_root.to_path_buf());
    }

    let relocated = staging_root.with_extension("content");
    fs_err::rename(content_root, &relocated)?;
    fs_err::remove_dir_all(staging_root)?;
    Ok(relocated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relocate_is_a_noop_when_gemspec_is_at_the_checkout_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("staging");
        fs_err::create_dir_all(&root).unwrap();

        let result = relocate_to_own_staging(&root, &root).unwrap();
        assert_eq!(result, root);
    }

    #[test]
    fn relocate_moves_nested_gemspec_dir_out_and_drops_siblings() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("staging");
        let nested = root.join("subdir");
        fs_err::create_dir_all(&nested).unwrap();
        fs_err::write(nested.join("widget.gemspec"), "# spec").unwrap();
        fs_err::write(root.join("unrelated.txt"), "noise").unwrap();

        let result = relocate_to_own_staging(&nested, &root).unwrap();
        assert!(result.join("widget.gemspec").exists());
        assert!(!root.exists());
    }

    #[test]
    fn whitelisted_top_level_files_are_copied_into_the_gemspec_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("staging");
        let nested = root.join("subdir");
        fs_err::create_dir_all(&nested).unwrap();
        fs_err::write(nested.join("widget.gemspec"), "# spec").unwrap();
        fs_err::write(root.join("VERSION"), "1.2.3").unwrap();
        fs_err::write(root.join("unrelated.txt"), "noise").unwrap();

        copy_whitelisted_top_level_files(&root, &nested).unwrap();

        assert_eq!(fs_err::read_to_string(nested.join("VERSION")).unwrap(), "1.2.3");
        assert!(!nested.join("unrelated.txt").exists());
    }

    #[test]
    fn whitelisted_top_level_files_never_overwrite_a_same_named_file_already_in_the_gemspec_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("staging");
        let nested = root.join("subdir");
        fs_err::create_dir_all(&nested).unwrap();
        fs_err::write(nested.join("widget.gemspec"), "# spec").unwrap();
        fs_err::write(root.join("VERSION"), "1.2.3").unwrap();
        fs_err::write(nested.join("VERSION"), "own-version").unwrap();

        copy_whitelisted_top_level_files(&root, &nested).unwrap();

        assert_eq!(fs_err::read_to_string(nested.join("VERSION")).unwrap(), "own-version");
    }

    #[test]
    fn cached_tree_is_stale_when_the_marker_records_a_different_revision() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(tmp.path());
        let acquirer = GitAcquirer::new(layout, Promoter::new(tmp.path()), RepoLocks::default());

        let marker = tmp.path().join("rack-2.2.8.revision");
        fs_err::write(&marker, "aaaa").unwrap();

        assert!(acquirer.cached_tree_is_at_revision(&marker, "aaaa"));
        assert!(!acquirer.cached_tree_is_at_revision(&marker, "bbbb"));
    }

    #[test]
    fn cached_tree_with_no_marker_is_tolerated_as_still_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(tmp.path());
        let acquirer = GitAcquirer::new(layout, Promoter::new(tmp.path()), RepoLocks::default());

        let marker = tmp.path().join("missing.revision");
        assert!(acquirer.cached_tree_is_at_revision(&marker, "anything"));
    }

    #[test]
    fn whitelisted_top_level_files_is_a_noop_when_gemspec_is_at_the_checkout_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("staging");
        fs_err::create_dir_all(&root).unwrap();
        fs_err::write(root.join("VERSION"), "1.2.3").unwrap();

        copy_whitelisted_top_level_files(&root, &root).unwrap();
    }
}
