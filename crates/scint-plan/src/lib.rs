//! The planner: for each resolved spec, decides what work (if any) must
//! happen before the gem is usable at its install prefix. Never mutates
//! state; it only reads the prefix and cache and emits decisions.

use log::trace;
use scint_cache::{CacheLayout, Prefix};
use scint_core::{Action, PlanEntry, ResolvedSpec};

/// Is a set of self-install (`bundler`, `rubygems-update`, ...) names the
/// builtin case takes priority over everything else for.
pub fn plan(resolved: &[ResolvedSpec], prefix: &Prefix, cache: &CacheLayout, builtin_names: &[&str]) -> Vec<PlanEntry> {
    resolved.iter().map(|spec| plan_one(spec, prefix, cache, builtin_names)).collect()
}

fn plan_one(spec: &ResolvedSpec, prefix: &Prefix, cache: &CacheLayout, builtin_names: &[&str]) -> PlanEntry {
    let full_name = spec.full_name();

    if spec.is_builtin() || builtin_names.contains(&spec.name.as_str()) {
        return PlanEntry::new(spec.clone(), Action::Builtin);
    }

    let ext_ready = !spec.has_extensions || prefix.is_ext_built(&full_name, spec.platform.abi_key());

    if prefix.is_gem_installed(&full_name) && ext_ready {
        return PlanEntry::new(spec.clone(), Action::Skip);
    }

    let cached_path = cache.cached_path(spec);
    let cache_valid = cached_path.is_dir();

    if cache_valid && ext_ready {
        let mut entry = PlanEntry::new(spec.clone(), Action::Link);
        entry.cached_path = Some(cached_path);
        return entry;
    }

    if cache_valid {
        let mut entry = PlanEntry::new(spec.clone(), Action::BuildExt);
        entry.cached_path = Some(cached_path);
        return entry;
    }

    trace!("{full_name} needs a full download: not installed, not cached");
    PlanEntry::new(spec.clone(), Action::Download)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scint_core::{Platform, ResolvedSource};

    fn spec(name: &str, has_extensions: bool) -> ResolvedSpec {
        ResolvedSpec {
            name: name.to_string(),
            version: "1.0.0".into(),
            platform: Platform::ruby(),
            dependencies: vec![],
            source: ResolvedSource::Registry {
                remote: "https://rubygems.org/".parse().unwrap(),
            },
            has_extensions,
            checksum: None,
        }
    }

    #[test]
    fn builtin_name_always_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = Prefix::new(tmp.path(), "3.3.0");
        let cache = CacheLayout::new(tmp.path().join("cache"));

        let entries = plan(&[spec("bundler", false)], &prefix, &cache, &["bundler"]);
        assert_eq!(entries[0].action, Action::Builtin);
    }

    #[test]
    fn already_installed_gem_without_extensions_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = Prefix::new(tmp.path(), "3.3.0");
        let cache = CacheLayout::new(tmp.path().join("cache"));

        let s = spec("rack", false);
        std::fs::create_dir_all(prefix.specifications_dir()).unwrap();
        std::fs::write(prefix.gemspec_path(&s.full_name()), "# spec").unwrap();

        let entries = plan(&[s], &prefix, &cache, &[]);
        assert_eq!(entries[0].action, Action::Skip);
    }

    #[test]
    fn cached_tree_without_needed_extension_links() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = Prefix::new(tmp.path(), "3.3.0");
        let cache = CacheLayout::new(tmp.path().join("cache"));

        let s = spec("rack", false);
        std::fs::create_dir_all(cache.cached_path(&s)).unwrap();

        let entries = plan(&[s], &prefix, &cache, &[]);
        assert_eq!(entries[0].action, Action::Link);
        assert!(entries[0].cached_path.is_some());
    }

    #[test]
    fn cached_tree_missing_its_extension_build_queues_build_ext() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = Prefix::new(tmp.path(), "3.3.0");
        let cache = CacheLayout::new(tmp.path().join("cache"));

        let s = spec("nokogiri", true);
        std::fs::create_dir_all(cache.cached_path(&s)).unwrap();

        let entries = plan(&[s], &prefix, &cache, &[]);
        assert_eq!(entries[0].action, Action::BuildExt);
    }

    #[test]
    fn nothing_cached_or_installed_downloads() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = Prefix::new(tmp.path(), "3.3.0");
        let cache = CacheLayout::new(tmp.path().join("cache"));

        let entries = plan(&[spec("rack", false)], &prefix, &cache, &[]);
        assert_eq!(entries[0].action, Action::Download);
    }

    #[test]
    fn plan_preserves_input_order() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = Prefix::new(tmp.path(), "3.3.0");
        let cache = CacheLayout::new(tmp.path().join("cache"));

        let entries = plan(&[spec("b", false), spec("a", false)], &prefix, &cache, &[]);
        assert_eq!(entries[0].spec.name, "b");
        assert_eq!(entries[1].spec.name, "a");
    }
}
