//! Atomic rename-based promotion of a staging tree into its final cached
//! path, guarded by a per-key lock.
//!
//! The lock map generalizes the "is this asset path already being
//! written" check to "is this cache key already being promoted".

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fs_err as fs;
use log::{debug, warn};
use thiserror::Error;

use crate::validate_within_root;

#[derive(Debug, Error)]
pub enum Error {
    #[error("promotion target path escapes cache root")]
    PathEscape(#[from] crate::Error),
    #[error("io")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, PartialEq, Eq)]
pub enum PromoteOutcome {
    Promoted,
    AlreadyPresent,
}

/// Process-scoped container of per-key mutexes, tied to one install run
/// (collaborators are passed through explicitly rather than
/// storing them in process-wide singletons). Shared by the promoter (one
/// lock per cache key) and, via [`KeyedLocks::clone`], by source
/// acquirers serializing concurrent acquisition of the same
/// `(source-identity, revision)`.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks(Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>);

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.0
            .lock()
            .expect("keyed lock map poisoned")
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    pub fn with_lock<R>(&self, key: &str, f: impl FnOnce() -> R) -> R {
        let lock = self.lock_for(key);
        let _guard = lock.lock().expect("per-key lock poisoned");
        f()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Promoter {
    root: Option<PathBuf>,
    locks: KeyedLocks,
}

impl Promoter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            locks: KeyedLocks::new(),
        }
    }

    /// Promote `staging` to `target` under the named lock. If `target`
    /// already exists, the staging tree is removed and
    /// [`PromoteOutcome::AlreadyPresent`] is returned — another worker won
    /// the race. On any I/O failure, `staging` is removed before the error
    /// propagates (partial promotion never leaves half-installed
    /// cached state).
    pub fn promote(&self, staging: &Path, target: &Path, lock_key: &str) -> Result<PromoteOutcome, Error> {
        if let Some(root) = &self.root {
            validate_within_root(root, target)?;
        }

        self.locks.with_lock(lock_key, || {
            if target.exists() {
                debug!("cache key {lock_key} already promoted, discarding staging tree");
                let _ = fs::remove_dir_all(staging);
                return Ok(PromoteOutcome::AlreadyPresent);
            }

            let result = (|| -> std::io::Result<()> {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::rename(staging, target)?;
                Ok(())
            })();

            match result {
                Ok(()) => Ok(PromoteOutcome::Promoted),
                Err(err) => {
                    warn!("promotion of {lock_key} failed: {err}; cleaning up staging tree");
                    let _ = fs::remove_dir_all(staging);
                    Err(err.into())
                }
            }
        })
    }

    /// Exposes the underlying keyed-lock map so acquirers can serialize
    /// assembling-path creation on the same key used for promotion.
    pub fn locks(&self) -> &KeyedLocks {
        &self.locks
    }
}
