//! Tagged source variants and the full-name / cache-key machinery
//! built on top of them.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::dependency::Platform;

/// Where a dependency's package content originates from.
///
/// This is the manifest-level declaration; once resolved it is paired with
/// a concrete version to become a [`ResolvedSource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Registry {
        remotes: Vec<Url>,
    },
    Git {
        uri: Url,
        revision: Option<String>,
        git_ref: Option<String>,
        branch: Option<String>,
        tag: Option<String>,
        submodules: bool,
        glob: Option<String>,
        name: Option<String>,
    },
    Path {
        path: std::path::PathBuf,
        name: Option<String>,
        glob: Option<String>,
    },
}

impl Source {
    /// The git revision-precedence rule: `revision > ref > branch > tag > "HEAD"`.
    pub fn git_revision_spec(&self) -> Option<&str> {
        match self {
            Source::Git {
                revision,
                git_ref,
                branch,
                tag,
                ..
            } => Some(
                revision
                    .as_deref()
                    .or(git_ref.as_deref())
                    .or(branch.as_deref())
                    .or(tag.as_deref())
                    .unwrap_or("HEAD"),
            ),
            _ => None,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Registry { .. } => SourceKind::Registry,
            Source::Git { .. } => SourceKind::Git,
            Source::Path { .. } => SourceKind::Path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Registry,
    Git,
    Path,
    Builtin,
}

/// The source of a [`crate::ResolvedSpec`], carrying whatever identity is
/// needed to re-derive the same acquisition on a subsequent run (a locked
/// git revision, the registry remote actually used, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedSource {
    Registry { remote: Url },
    Git { uri: Url, revision: String },
    Path { path: std::path::PathBuf },
    Builtin,
}

impl ResolvedSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            ResolvedSource::Registry { .. } => SourceKind::Registry,
            ResolvedSource::Git { .. } => SourceKind::Git,
            ResolvedSource::Path { .. } => SourceKind::Path,
            ResolvedSource::Builtin => SourceKind::Builtin,
        }
    }

    /// Normalized dedup key: lowercase host, strip scheme, strip trailing
    /// `.git`, strip trailing slash; absolute paths for local sources.
    pub fn normalized_key(&self) -> String {
        match self {
            ResolvedSource::Registry { remote } => normalize_uri(remote),
            ResolvedSource::Git { uri, .. } => normalize_uri(uri),
            ResolvedSource::Path { path } => path
                .canonicalize()
                .unwrap_or_else(|_| path.clone())
                .to_string_lossy()
                .into_owned(),
            ResolvedSource::Builtin => "builtin".to_string(),
        }
    }
}

fn normalize_uri(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let mut path = url.path().trim_end_matches('/').to_string();
    if let Some(stripped) = path.strip_suffix(".git") {
        path = stripped.to_string();
    }
    format!("{host}{path}")
}

/// `name-version[-platform]`, platform omitted iff platform is `ruby`
/// (platform is omitted for ordinary ruby-platform gems).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FullName(String);

impl FullName {
    pub fn new(name: &str, version: &str, platform: &Platform) -> Self {
        if platform.is_ruby() {
            Self(format!("{name}-{version}"))
        } else {
            Self(format!("{name}-{version}-{platform}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<std::path::Path> for FullName {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}
