//! Materializes an acquired gem tree into the install prefix: copies the
//! gem's files into `<prefix>/.../gems/<full-name>` and copies its cached
//! spec metadata alongside it into `<prefix>/.../specifications`.
//!
//! The copy itself follows `scint-vcs`'s `copy_tree_excluding_git`
//! pattern minus the `.git` exclusion (there's nothing to exclude from a
//! gem tree).

use std::path::Path;

use scint_archive::GemMetadata;
use scint_cache::{CacheLayout, Prefix};
use scint_core::ResolvedSpec;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io")]
    Io(#[from] std::io::Error),
}

/// Copies `gem_path`'s tree into the prefix (if not already linked) and
/// writes its gemspec metadata. `gem_path` is whatever the planner
/// pointed at (a cached tree for `link`/`build_ext`, a freshly extracted
/// one for `download`).
pub fn link(spec: &ResolvedSpec, gem_path: &Path, cache: &CacheLayout, prefix: &Prefix) -> Result<(), Error> {
    let full_name = spec.full_name();
    let dest = prefix.gem_dir(&full_name);
    if !dest.is_dir() {
        copy_tree(gem_path, &dest)?;
    }

    let metadata = GemMetadata::read_from(&cache.cached_spec_path(spec)).unwrap_or_else(|_| GemMetadata {
        name: spec.name.clone(),
        version: spec.version.clone(),
        require_paths: vec!["lib".to_string()],
        has_extensions: spec.has_extensions,
        extension_entry: None,
    });
    write_gemspec(prefix, &full_name, &metadata)?;

    Ok(())
}

/// The self-install/meta-gem case: writes a gemspec with no backing
/// `gems/` tree, matching `action=builtin`'s "payload performs the
/// builtin materialization" contract.
pub fn link_builtin(spec: &ResolvedSpec, prefix: &Prefix) -> Result<(), Error> {
    let metadata = GemMetadata {
        name: spec.name.clone(),
        version: spec.version.clone(),
        require_paths: vec![],
        has_extensions: false,
        extension_entry: None,
    };
    write_gemspec(prefix, &spec.full_name(), &metadata)?;
    Ok(())
}

fn write_gemspec(prefix: &Prefix, full_name: &scint_core::FullName, metadata: &GemMetadata) -> std::io::Result<()> {
    fs_err::create_dir_all(prefix.specifications_dir())?;
    metadata.write_to(&prefix.gemspec_path(full_name))
}

fn copy_tree(src: &Path, dest: &Path) -> std::io::Result<()> {
    fs_err::create_dir_all(dest)?;
    for entry in fs_err::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs_err::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scint_core::{Platform, ResolvedSource};

    fn spec() -> ResolvedSpec {
        ResolvedSpec {
            name: "rack".into(),
            version: "2.2.8".into(),
            platform: Platform::ruby(),
            dependencies: vec![],
            source: ResolvedSource::Registry {
                remote: "https://rubygems.org/".parse().unwrap(),
            },
            has_extensions: false,
            checksum: None,
        }
    }

    #[test]
    fn link_copies_the_tree_and_writes_a_gemspec() {
        let tmp = tempfile::tempdir().unwrap();
        let gem_path = tmp.path().join("extracted");
        fs_err::create_dir_all(gem_path.join("lib")).unwrap();
        fs_err::write(gem_path.join("lib").join("rack.rb"), "# rack").unwrap();

        let cache = CacheLayout::new(tmp.path().join("cache"));
        let prefix = Prefix::new(tmp.path().join("prefix"), "3.3.0");
        let s = spec();

        link(&s, &gem_path, &cache, &prefix).unwrap();

        assert!(prefix.gem_dir(&s.full_name()).join("lib").join("rack.rb").is_file());
        assert!(prefix.is_gem_installed(&s.full_name()));
    }

    #[test]
    fn link_falls_back_to_default_metadata_when_no_cached_spec_exists() {
        let tmp = tempfile::tempdir().unwrap();
        let gem_path = tmp.path().join("extracted");
        fs_err::create_dir_all(&gem_path).unwrap();

        let cache = CacheLayout::new(tmp.path().join("cache"));
        let prefix = Prefix::new(tmp.path().join("prefix"), "3.3.0");
        let s = spec();

        link(&s, &gem_path, &cache, &prefix).unwrap();

        let metadata = GemMetadata::read_from(&prefix.gemspec_path(&s.full_name())).unwrap();
        assert_eq!(metadata.require_paths, vec!["lib".to_string()]);
    }

    #[test]
    fn builtin_link_writes_a_gemspec_with_no_gem_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = Prefix::new(tmp.path(), "3.3.0");
        let s = spec();

        link_builtin(&s, &prefix).unwrap();

        assert!(prefix.is_gem_installed(&s.full_name()));
        assert!(!prefix.gem_dir(&s.full_name()).exists());
    }
}
