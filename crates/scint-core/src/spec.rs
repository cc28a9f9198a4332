use serde::{Deserialize, Serialize};

use crate::dependency::Platform;
use crate::source::{FullName, ResolvedSource};

/// A single dependency edge of a resolved spec, as recorded by the
/// resolver (name + the requirement string(s) that led to this edge,
/// used by the lockfile reconciler's self-consistency check).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    pub name: String,
    pub requirement: String,
}

/// The output of resolution (or lockfile projection): one entry per
/// package that must exist in the final graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSpec {
    pub name: String,
    pub version: String,
    pub platform: Platform,
    pub dependencies: Vec<DependencyRef>,
    pub source: ResolvedSource,
    pub has_extensions: bool,
    pub checksum: Option<String>,
}

impl ResolvedSpec {
    pub fn full_name(&self) -> FullName {
        FullName::new(&self.name, &self.version, &self.platform)
    }

    /// `(name, version, platform)`, the dedupe/uniqueness key
    /// uniqueness key.
    pub fn identity(&self) -> (&str, &str, &Platform) {
        (&self.name, &self.version, &self.platform)
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.source, ResolvedSource::Builtin)
    }
}
