use std::fmt;

use serde::{Deserialize, Serialize};

use crate::source::Source;

/// A normalized arch+language-runtime-version token, or the literal
/// platform-independent marker `"ruby"` (the GLOSSARY's "ABI key" is
/// derived from this for cache partitioning).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform(String);

impl Platform {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn ruby() -> Self {
        Self("ruby".to_string())
    }

    pub fn is_ruby(&self) -> bool {
        self.0 == "ruby"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The ABI key used to partition the cache (arch + runtime version);
    /// for the `ruby` pseudo-platform this is just `"ruby"`.
    pub fn abi_key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A dependency group (`:test`, `:development`, ...) a manifest dependency
/// may be scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group(String);

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn default_group() -> Self {
        Self("default".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The manifest-level source override a dependency line may carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceOpts {
    Registry(url::Url),
    Path(std::path::PathBuf),
    Git {
        uri: url::Url,
        branch: Option<String>,
        tag: Option<String>,
        git_ref: Option<String>,
        submodules: bool,
        glob: Option<String>,
    },
    /// No explicit `source:`/`path:`/`git:` option; use the manifest's
    /// default source.
    Default,
}

/// A top-level or transitive dependency as declared in (or derived from)
/// the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version_reqs: Vec<String>,
    pub source_opts: SourceOpts,
    pub groups: Vec<Group>,
    pub platforms: Vec<Platform>,
}

impl Dependency {
    /// Resolve `source_opts` against the manifest's declared default
    /// source, producing the concrete [`Source`] an acquirer can act on.
    pub fn resolve_source(&self, default: &Source) -> Source {
        match &self.source_opts {
            SourceOpts::Default => default.clone(),
            SourceOpts::Registry(remote) => Source::Registry {
                remotes: vec![remote.clone()],
            },
            SourceOpts::Path(path) => Source::Path {
                path: path.clone(),
                name: Some(self.name.clone()),
                glob: None,
            },
            SourceOpts::Git {
                uri,
                branch,
                tag,
                git_ref,
                submodules,
                glob,
            } => Source::Git {
                uri: uri.clone(),
                revision: None,
                git_ref: git_ref.clone(),
                branch: branch.clone(),
                tag: tag.clone(),
                submodules: *submodules,
                glob: glob.clone(),
                name: Some(self.name.clone()),
            },
        }
    }

    /// Is this dependency relevant on the given platform? Per the
    /// lock-reuse check #1, an empty `platforms` list means "all platforms".
    pub fn applies_to(&self, platform: &Platform) -> bool {
        self.platforms.is_empty() || self.platforms.contains(platform)
    }
}
