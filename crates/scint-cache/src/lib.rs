//! Cache layout & promoter.
//!
//! Path computation is a handful of small `&self -> PathBuf` helpers
//! joined onto a root, plus an atomic-rename promotion guarded by a per-key
//! lock taken from [`promote::Promoter`].

pub mod layout;
pub mod promote;

pub use layout::{CacheLayout, Prefix};
pub use promote::{KeyedLocks, PromoteOutcome, Promoter};

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("path {path:?} escapes cache root {root:?}")]
    PathEscape { path: PathBuf, root: PathBuf },
    #[error("io")]
    Io(#[from] std::io::Error),
}

/// Canonicalizes `path` (or its closest existing ancestor, for
/// not-yet-created staging paths) and checks it lies under `root`. This is
/// the path-escape check every promotion performs.
pub fn validate_within_root(root: &Path, path: &Path) -> Result<(), Error> {
    let root_canon = canonicalize_best_effort(root);
    let path_canon = canonicalize_best_effort(path);

    if path_canon.starts_with(&root_canon) {
        Ok(())
    } else {
        Err(Error::PathEscape {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })
    }
}

/// Canonicalize as much of `path` as exists, then rejoin the remainder
/// lexically. Lets us validate staging paths that don't exist yet without
/// erroring on `fs::canonicalize`.
fn canonicalize_best_effort(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut tail = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut canon) => {
                for component in tail.into_iter().rev() {
                    canon.push(component);
                }
                return canon;
            }
            Err(_) => match existing.parent() {
                Some(parent) => {
                    if let Some(name) = existing.file_name() {
                        tail.push(name.to_owned());
                    }
                    existing = parent;
                }
                None => return path.to_path_buf(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_escape() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("cache");
        std::fs::create_dir_all(&root).unwrap();

        let escape = tmp.path().join("..").join("etc").join("passwd");
        assert!(validate_within_root(&root, &escape).is_err());
    }

    #[test]
    fn accepts_path_under_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("cache");
        std::fs::create_dir_all(&root).unwrap();

        let inside = root.join("inbound").join("ruby").join("rack-2.2.8.gem");
        assert!(validate_within_root(&root, &inside).is_ok());
    }
}
