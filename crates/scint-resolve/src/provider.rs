//! The `Provider` capability: the one boundary the resolver crosses to
//! learn what versions of a gem exist and what they depend on. Real
//! listings come from `scint-net`'s compact-index client (registry
//! names) or from a path/git gemspec read; the resolver itself never
//! knows which.

use scint_core::{Platform, ResolvedSource};
use thiserror::Error;

use crate::version::Version;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no versions available for {0:?}")]
    NoListing(String),
    #[error("{0}")]
    Other(String),
}

/// One version of one gem, as the provider can report it: enough for the
/// resolver to place it in the graph and recurse into its dependencies.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub version: Version,
    pub platform: Platform,
    /// `(name, requirement-string)` runtime dependency edges.
    pub dependencies: Vec<(String, String)>,
    pub source: ResolvedSource,
    pub has_extensions: bool,
    pub checksum: Option<String>,
}

/// Supplies every candidate version of a named gem. One resolve run
/// typically wires this to a `Provider` that fans out across the
/// registry's compact index, inline git/path sources, and the
/// lockfile-pinned path-gem map (the `Provider` construction is itself
/// the lockfile reconciler's job; `scint-resolve` only consumes it).
pub trait Provider {
    fn candidates(&self, name: &str) -> Result<Vec<Candidate>, Error>;
}

/// An in-memory `Provider` keyed by gem name, useful for tests and for
/// any caller (the reconciler's path-gem map, for instance) that already
/// has every candidate materialized rather than fetched lazily.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider(std::collections::HashMap<String, Vec<Candidate>>);

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, candidates: Vec<Candidate>) {
        self.0.insert(name.into(), candidates);
    }
}

impl Provider for StaticProvider {
    fn candidates(&self, name: &str) -> Result<Vec<Candidate>, Error> {
        self.0.get(name).cloned().ok_or_else(|| Error::NoListing(name.to_string()))
    }
}
