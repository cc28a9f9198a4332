use std::path::{Path, PathBuf};

use scint_core::{FullName, Platform, ResolvedSpec};
use sha2::{Digest, Sha256};

/// Deterministic on-disk paths under `$CACHE_ROOT`.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inbound_path(&self, spec: &ResolvedSpec) -> PathBuf {
        self.root
            .join("inbound")
            .join(spec.platform.abi_key())
            .join(format!("{}.gem", spec.full_name()))
    }

    pub fn assembling_path(&self, spec: &ResolvedSpec) -> PathBuf {
        self.root
            .join("assembling")
            .join(spec.platform.abi_key())
            .join(spec.full_name().as_str())
    }

    /// A process-unique temp path under `assembling/` used while a worker
    /// is still unpacking, before the atomic rename into the stable
    /// `assembling/<k>/` path.
    pub fn assembling_tmp_path(&self, spec: &ResolvedSpec) -> PathBuf {
        let pid = std::process::id();
        let tid = thread_id();
        self.root.join("assembling").join(spec.platform.abi_key()).join(format!(
            "{}.tmp.{}.{}",
            spec.full_name(),
            pid,
            tid
        ))
    }

    pub fn cached_path(&self, spec: &ResolvedSpec) -> PathBuf {
        self.root
            .join("cached")
            .join(spec.platform.abi_key())
            .join(spec.full_name().as_str())
    }

    pub fn cached_spec_path(&self, spec: &ResolvedSpec) -> PathBuf {
        self.root
            .join("cached")
            .join(spec.platform.abi_key())
            .join(format!("{}.spec", spec.full_name()))
    }

    pub fn cached_manifest_path(&self, spec: &ResolvedSpec) -> PathBuf {
        self.root
            .join("cached")
            .join(spec.platform.abi_key())
            .join(format!("{}.manifest", spec.full_name()))
    }

    pub fn git_path(&self, uri: &url::Url) -> PathBuf {
        self.root.join("git").join(hash_uri(uri))
    }

    pub fn ext_path(&self, spec: &ResolvedSpec, arch: &str, api: &str) -> PathBuf {
        self.root
            .join("extensions")
            .join(arch)
            .join(api)
            .join(spec.full_name().as_str())
    }

    /// The single-token shorthand of [`Self::ext_path`] used wherever only
    /// the spec's own ABI key (not a separately negotiated arch/api pair)
    /// is available, e.g. the planner's cached-build-artifact check.
    pub fn ext_marker_path(&self, spec: &ResolvedSpec) -> PathBuf {
        self.ext_path(spec, spec.platform.abi_key(), "current")
    }

    /// The revision marker file recorded alongside a git-sourced cached
    /// tree so a later run can tell whether the upstream tip moved
    /// (lets a later run tell whether the upstream tip moved).
    pub fn git_revision_marker_path(&self, spec: &ResolvedSpec) -> PathBuf {
        self.root
            .join("cached")
            .join(spec.platform.abi_key())
            .join(format!("{}.revision", spec.full_name()))
    }
}

fn hash_uri(uri: &url::Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uri.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

fn thread_id() -> u64 {
    // A stable, process-local numeric handle; `std::thread::ThreadId` has
    // no public integer accessor, so we hash its debug form.
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

/// The per-project install prefix: `<prefix>/ruby/<x.y.0>/{gems,specifications,extensions,bin}`.
#[derive(Debug, Clone)]
pub struct Prefix {
    root: PathBuf,
    ruby_version: String,
}

impl Prefix {
    pub fn new(root: impl Into<PathBuf>, ruby_version: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ruby_version: ruby_version.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ruby_root(&self) -> PathBuf {
        self.root.join("ruby").join(&self.ruby_version)
    }

    pub fn gems_dir(&self) -> PathBuf {
        self.ruby_root().join("gems")
    }

    pub fn gem_dir(&self, full_name: &FullName) -> PathBuf {
        self.gems_dir().join(full_name.as_str())
    }

    pub fn specifications_dir(&self) -> PathBuf {
        self.ruby_root().join("specifications")
    }

    pub fn gemspec_path(&self, full_name: &FullName) -> PathBuf {
        self.specifications_dir().join(format!("{full_name}.gemspec"))
    }

    pub fn extensions_dir(&self) -> PathBuf {
        self.ruby_root().join("extensions")
    }

    pub fn ext_dir(&self, full_name: &FullName, arch: &str, api: &str) -> PathBuf {
        self.extensions_dir().join(arch).join(api).join(full_name.as_str())
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.ruby_root().join("bin")
    }

    pub fn runtime_manifest_path(&self) -> PathBuf {
        self.root.join("scint.lock.marshal")
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.root.join("Gemfile.lock")
    }

    pub fn is_gem_installed(&self, full_name: &FullName) -> bool {
        self.gemspec_path(full_name).is_file()
    }

    /// The single-token shorthand of [`Self::ext_dir`] matching
    /// [`CacheLayout::ext_marker_path`].
    pub fn ext_marker_dir(&self, full_name: &FullName, abi_key: &str) -> PathBuf {
        self.ext_dir(full_name, abi_key, "current")
    }

    pub fn is_ext_built(&self, full_name: &FullName, abi_key: &str) -> bool {
        self.ext_marker_dir(full_name, abi_key).is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scint_core::ResolvedSource;

    fn spec() -> ResolvedSpec {
        ResolvedSpec {
            name: "rack".into(),
            version: "2.2.8".into(),
            platform: Platform::ruby(),
            dependencies: vec![],
            source: ResolvedSource::Registry {
                remote: "https://registry.example/".parse().unwrap(),
            },
            has_extensions: false,
            checksum: None,
        }
    }

    #[test]
    fn cached_spec_and_manifest_share_the_cached_directory_stem() {
        let layout = CacheLayout::new("/cache");
        let spec = spec();
        assert_eq!(
            layout.cached_spec_path(&spec),
            PathBuf::from("/cache/cached/ruby/rack-2.2.8.spec")
        );
        assert_eq!(
            layout.cached_manifest_path(&spec),
            PathBuf::from("/cache/cached/ruby/rack-2.2.8.manifest")
        );
        assert_eq!(
            layout.cached_path(&spec),
            PathBuf::from("/cache/cached/ruby/rack-2.2.8")
        );
    }

    #[test]
    fn git_path_is_stable_for_the_same_uri() {
        let layout = CacheLayout::new("/cache");
        let uri: url::Url = "https://github.com/rack/rack".parse().unwrap();
        assert_eq!(layout.git_path(&uri), layout.git_path(&uri));
    }

    #[test]
    fn prefix_gem_dir_is_ruby_version_scoped() {
        let prefix = Prefix::new("/app/.bundle", "3.3.0");
        let full_name = FullName::new("rack", "2.2.8", &Platform::ruby());
        assert_eq!(
            prefix.gem_dir(&full_name),
            PathBuf::from("/app/.bundle/ruby/3.3.0/gems/rack-2.2.8")
        );
    }
}
