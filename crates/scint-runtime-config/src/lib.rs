//! Writes the install run's outcome as a binary load-path map at
//! `<prefix>/scint.lock.marshal`, read back by the Ruby-side runtime
//! shim to wire up `$LOAD_PATH` without touching `rubygems` at all.
//!
//! `bincode` over the wire here, not `serde_json` like
//! [`scint_archive::GemMetadata`]'s sidecars: this file is read on every
//! process boot the prefix is used from, not just during install, so it
//! favors decode speed and size over human-readability (DESIGN.md).

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use scint_archive::GemMetadata;
use scint_cache::Prefix;
use scint_core::ResolvedSpec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("encoding the runtime manifest")]
    Encode(#[from] bincode::Error),
    #[error("io")]
    Io(#[from] std::io::Error),
}

/// One installed gem's runtime-load entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEntry {
    pub version: String,
    pub load_paths: Vec<PathBuf>,
}

/// `name -> {version, load_paths}`, keyed by gem name (a `BTreeMap` so
/// encoding is deterministic across runs with the same inputs).
pub type RuntimeManifest = BTreeMap<String, RuntimeEntry>;

/// Builds the manifest from every spec the planner actually placed at
/// `prefix`. Specs with no gemspec on disk (never installed, or a
/// `Skip`/`Builtin` entry the orchestrator didn't get to) are left out
/// rather than guessed at.
pub fn build(resolved: &[ResolvedSpec], prefix: &Prefix) -> RuntimeManifest {
    let mut manifest = RuntimeManifest::new();

    for spec in resolved {
        let full_name = spec.full_name();
        if !prefix.is_gem_installed(&full_name) {
            continue;
        }

        let metadata = GemMetadata::read_from(&prefix.gemspec_path(&full_name)).unwrap_or_else(|_| GemMetadata {
            name: spec.name.clone(),
            version: spec.version.clone(),
            require_paths: vec!["lib".to_string()],
            has_extensions: spec.has_extensions,
            extension_entry: None,
        });

        let gem_dir = prefix.gem_dir(&full_name);
        let mut load_paths: Vec<PathBuf> = metadata.require_paths.iter().map(|rp| resolve_require_path(&gem_dir, rp)).collect();

        if load_paths.is_empty() {
            load_paths.push(gem_dir.join("lib"));
        }

        if spec.has_extensions {
            load_paths.push(prefix.ext_marker_dir(&full_name, spec.platform.abi_key()));
        }

        manifest.insert(
            spec.name.clone(),
            RuntimeEntry {
                version: spec.version.clone(),
                load_paths: dedupe_existing(load_paths),
            },
        );
    }

    manifest
}

fn resolve_require_path(gem_dir: &Path, require_path: &str) -> PathBuf {
    let candidate = PathBuf::from(require_path);
    if candidate.is_absolute() {
        candidate
    } else {
        gem_dir.join(candidate)
    }
}

/// Keeps only directories that exist on disk, preserving first
/// occurrence order and dropping later duplicates.
fn dedupe_existing(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths.into_iter().filter(|p| p.is_dir()).filter(|p| seen.insert(p.clone())).collect()
}

pub fn write(manifest: &RuntimeManifest, path: &Path) -> Result<(), Error> {
    let bytes = bincode::serialize(manifest)?;
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("marshal.tmp");
    fs_err::write(&tmp, &bytes)?;
    fs_err::rename(&tmp, path)?;
    Ok(())
}

pub fn read(path: &Path) -> Result<RuntimeManifest, Error> {
    let bytes = fs_err::read(path)?;
    Ok(bincode::deserialize(&bytes)?)
}
