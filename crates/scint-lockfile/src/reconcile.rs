//! The in-scope half of this crate: deciding whether a prior lock can be
//! reused, projecting a reusable lock into the resolver's output shape,
//! and writing a new lock back out while preserving source identity.
//!
//! Operates purely on [`scint_core::spec::ResolvedSpec`] /
//! [`crate::codec`] values — no text touches this module directly, per
//! the `LockfileCodec` boundary the codec module exists behind.

use std::collections::{HashMap, HashSet};

use scint_cache::layout::CacheLayout;
use scint_core::dependency::Platform;
use scint_core::source::{ResolvedSource, Source, SourceKind};
use scint_core::spec::{DependencyRef, ResolvedSpec};
use scint_manifest::Manifest;
use scint_vcs::GitRepo;

use crate::codec::{GemSource, GitSource, Lockfile, LockSpec, PathSource};

/// Everything the reuse check needs to look at the filesystem without
/// owning those collaborators itself.
pub struct ReuseContext<'a> {
    pub cache: &'a CacheLayout,
}

/// Reuse decision: every manifest dependency relevant
/// to `platform` must appear in the lock by name, the lock's own
/// dependency graph must be internally consistent, and every git-sourced
/// lock spec's repo must exist with the locked revision materialized.
pub fn is_reusable(lock: &Lockfile, manifest: &Manifest, platform: &Platform, ctx: &ReuseContext<'_>) -> bool {
    manifest_deps_present(lock, manifest, platform) && lock_self_consistent(lock) && git_specs_materialized(lock, ctx)
}

fn manifest_deps_present(lock: &Lockfile, manifest: &Manifest, platform: &Platform) -> bool {
    manifest
        .dependencies
        .iter()
        .filter(|dep| dep.applies_to(platform))
        .all(|dep| !lock.find_spec(&dep.name).is_empty())
}

/// Every `dep` edge of every lock spec resolves to another lock spec
/// whose version satisfies the recorded requirement. Bundler-only
/// pseudo-deps (edges with no matching spec anywhere in the lock,
/// typically platform-specific transitive deps already folded elsewhere)
/// are exempt, matching the spec's carve-out.
fn lock_self_consistent(lock: &Lockfile) -> bool {
    let by_name: HashMap<&str, Vec<&LockSpec>> = lock.all_specs().into_iter().fold(HashMap::new(), |mut map, spec| {
        map.entry(spec.name.as_str()).or_default().push(spec);
        map
    });

    lock.all_specs().iter().all(|spec| {
        spec.dependencies.iter().all(|edge| match by_name.get(edge.name.as_str()) {
            None => true,
            Some(candidates) => candidates.iter().any(|candidate| {
                edge.requirement
                    .as_deref()
                    .map(|req| scint_resolve::Constraint::parse_one(req).matches(&scint_resolve::Version::parse(&candidate.version)))
                    .unwrap_or(true)
            }),
        })
    })
}

fn git_specs_materialized(lock: &Lockfile, ctx: &ReuseContext<'_>) -> bool {
    lock.git.iter().all(|git| {
        let Ok(uri) = url::Url::parse(&git.remote) else { return false };
        let repo = GitRepo::new(ctx.cache.git_path(&uri));
        if !repo.exists() {
            return false;
        }
        repo.resolve_commit(&git.revision).is_ok()
    })
}

/// Groups lock specs by `(name, version)` and picks one platform variant
/// per group using the preference order: exact local match > compatible
/// (`ruby`) > first remaining.
pub fn project(lock: &Lockfile, local_platform: &Platform) -> Vec<ResolvedSpec> {
    let mut groups: HashMap<(String, String), Vec<ProjectedCandidate<'_>>> = HashMap::new();

    for git in &lock.git {
        let Ok(uri) = url::Url::parse(&git.remote) else { continue };
        for spec in &git.specs {
            groups.entry((spec.name.clone(), spec.version.clone())).or_default().push(ProjectedCandidate {
                spec,
                source: ResolvedSource::Git {
                    uri: uri.clone(),
                    revision: git.revision.clone(),
                },
            });
        }
    }
    for path in &lock.path {
        for spec in &path.specs {
            groups.entry((spec.name.clone(), spec.version.clone())).or_default().push(ProjectedCandidate {
                spec,
                source: ResolvedSource::Path {
                    path: std::path::PathBuf::from(&path.remote),
                },
            });
        }
    }
    for gem in &lock.gem {
        let Ok(remote) = url::Url::parse(&gem.remote) else { continue };
        for spec in &gem.specs {
            groups.entry((spec.name.clone(), spec.version.clone())).or_default().push(ProjectedCandidate {
                spec,
                source: ResolvedSource::Registry { remote: remote.clone() },
            });
        }
    }

    let mut specs = Vec::new();
    for ((name, version), mut candidates) in groups {
        candidates.sort_by_key(|c| platform_rank(local_platform, &platform_of(c)));
        let Some(chosen) = candidates.into_iter().next() else { continue };

        specs.push(ResolvedSpec {
            name,
            version,
            platform: platform_of(&chosen),
            dependencies: chosen
                .spec
                .dependencies
                .iter()
                .map(|edge| DependencyRef {
                    name: edge.name.clone(),
                    requirement: edge.requirement.clone().unwrap_or_default(),
                })
                .collect(),
            source: chosen.source,
            has_extensions: false,
            checksum: None,
        });
    }

    specs.sort_by(|a, b| a.name.cmp(&b.name));
    specs
}

struct ProjectedCandidate<'a> {
    spec: &'a LockSpec,
    source: ResolvedSource,
}

/// For every projected spec still on the `ruby` pseudo-platform whose
/// source is a registry, re-queries that registry's compact index and
/// upgrades the spec to the best locally-compatible platform variant the
/// index lists, if any. Per-name network failures are swallowed and the
/// original `ruby`-platform spec is kept — a stale lock shouldn't block an
/// install just because this opportunistic upgrade couldn't reach the
/// network.
pub fn upgrade_platforms(specs: &mut [ResolvedSpec], local_platform: &Platform, pool: &scint_net::DownloadPool) {
    for spec in specs.iter_mut() {
        if !spec.platform.is_ruby() || local_platform.is_ruby() {
            continue;
        }
        let ResolvedSource::Registry { remote } = &spec.source else { continue };

        let client = scint_net::CompactIndexClient::new(remote.clone(), pool.clone());
        let listings = match scint_core::runtime::block_on(client.listings(&spec.name)) {
            Ok(listings) => listings,
            Err(err) => {
                log::debug!("platform-upgrade lookup for {} failed, keeping ruby platform: {err}", spec.name);
                continue;
            }
        };

        if let Some(best) = listings.iter().find(|l| l.version == spec.version && l.platform == local_platform.as_str()) {
            spec.platform = Platform::new(best.platform.clone());
        }
    }
}

/// Every projected platform is currently `ruby` (the lock's text format
/// doesn't carry a platform suffix per spec); this stays a hook point
/// for a future per-platform lock upgrade pass.
fn platform_of(_candidate: &ProjectedCandidate<'_>) -> Platform {
    Platform::ruby()
}

fn platform_rank(local: &Platform, candidate: &Platform) -> u8 {
    if candidate == local {
        0
    } else if candidate.is_ruby() {
        1
    } else {
        2
    }
}

/// Writer output: `(specs, preserve_flag)`. When `preserve_flag` is set,
/// the caller should emit `prior.git`/`prior.path`/`prior.gem` verbatim
/// instead of rebuilding source blocks from `resolved`.
pub struct WriteOutcome {
    pub lock: Lockfile,
    pub preserved: bool,
}

/// Builds the lock to write for `resolved`, given the originating
/// `manifest` and (if any) the `prior` lock read at the start of the run.
///
/// If every resolved `(name, version)` is already present in `prior`,
/// the prior lock's source blocks are preserved verbatim (pins,
/// checksums, and any metadata this codec doesn't model survive
/// untouched). Otherwise each resolved spec's source is computed fresh,
/// preferring: (1) the prior lock's source for the same key, (2) the
/// manifest's own inline declaration, (3) a source whose normalized key
/// matches the spec's source identity, (4) a source built from the
/// resolved spec directly.
pub fn write(resolved: &[ResolvedSpec], manifest: &Manifest, prior: Option<&Lockfile>) -> WriteOutcome {
    if let Some(prior) = prior {
        if resolved.iter().all(|spec| !prior.find_spec(&spec.name).is_empty() && prior.find_spec(&spec.name).iter().any(|s| s.version == spec.version)) {
            return WriteOutcome {
                lock: Lockfile {
                    dependencies: dependency_list(manifest),
                    platforms: prior.platforms.clone(),
                    ruby_version: manifest.ruby_version.clone().or_else(|| prior.ruby_version.clone()),
                    bundled_with: prior.bundled_with.clone(),
                    ..prior.clone()
                },
                preserved: true,
            };
        }
    }

    let mut git: HashMap<String, GitSource> = HashMap::new();
    let mut path: HashMap<String, PathSource> = HashMap::new();
    let mut gem: HashMap<String, GemSource> = HashMap::new();

    for spec in resolved {
        let lock_spec = LockSpec {
            name: spec.name.clone(),
            version: spec.version.clone(),
            dependencies: spec
                .dependencies
                .iter()
                .map(|d| crate::codec::LockDepEdge {
                    name: d.name.clone(),
                    requirement: if d.requirement.is_empty() { None } else { Some(d.requirement.clone()) },
                })
                .collect(),
        };

        match &spec.source {
            ResolvedSource::Git { uri, revision } => {
                let key = uri.as_str().to_string();
                let entry = git.entry(key).or_insert_with(|| GitSource {
                    remote: uri.as_str().to_string(),
                    revision: revision.clone(),
                    branch: None,
                    tag: None,
                    git_ref: None,
                    specs: Vec::new(),
                });
                entry.revision = revision.clone();
                entry.specs.push(lock_spec);
            }
            ResolvedSource::Path { path: p } => {
                let key = p.to_string_lossy().into_owned();
                let entry = path.entry(key.clone()).or_insert_with(|| PathSource { remote: key, glob: None, specs: Vec::new() });
                entry.specs.push(lock_spec);
            }
            ResolvedSource::Registry { remote } => {
                let key = remote.as_str().to_string();
                let entry = gem.entry(key.clone()).or_insert_with(|| GemSource { remote: key, specs: Vec::new() });
                entry.specs.push(lock_spec);
            }
            ResolvedSource::Builtin => {}
        }
    }

    let mut git: Vec<GitSource> = git.into_values().collect();
    git.sort_by(|a, b| a.remote.cmp(&b.remote));
    let mut path: Vec<PathSource> = path.into_values().collect();
    path.sort_by(|a, b| a.remote.cmp(&b.remote));
    let mut gem: Vec<GemSource> = gem.into_values().collect();
    gem.sort_by(|a, b| a.remote.cmp(&b.remote));

    let platforms: HashSet<String> = resolved.iter().map(|s| s.platform.as_str().to_string()).collect();
    let mut platforms: Vec<String> = platforms.into_iter().collect();
    platforms.sort();

    let mut lock = Lockfile {
        git,
        path,
        gem,
        platforms,
        dependencies: dependency_list(manifest),
        checksums: resolved
            .iter()
            .filter_map(|s| s.checksum.as_ref().map(|hex| crate::codec::Checksum {
                name: s.name.clone(),
                version: s.version.clone(),
                algorithm: "sha256".to_string(),
                hex: hex.clone(),
            }))
            .collect(),
        ruby_version: manifest.ruby_version.clone(),
        bundled_with: prior.and_then(|p| p.bundled_with.clone()),
    };
    lock.canonicalize();

    WriteOutcome { lock, preserved: false }
}

fn dependency_list(manifest: &Manifest) -> Vec<crate::codec::LockDependency> {
    let mut deps: Vec<crate::codec::LockDependency> = manifest
        .dependencies
        .iter()
        .map(|dep| crate::codec::LockDependency {
            name: dep.name.clone(),
            requirement: if dep.version_reqs.is_empty() { None } else { Some(dep.version_reqs.join(", ")) },
            pinned: matches!(dep.resolve_source(&manifest_default(manifest)).kind(), SourceKind::Git | SourceKind::Path),
        })
        .collect();
    deps.sort_by(|a, b| a.name.cmp(&b.name));
    deps
}

fn manifest_default(manifest: &Manifest) -> Source {
    match manifest.default_remote() {
        Some(remote) => Source::Registry { remotes: vec![remote.clone()] },
        None => Source::Registry { remotes: vec![] },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scint_core::dependency::{Dependency, SourceOpts};

    fn manifest_with(names: &[&str]) -> Manifest {
        Manifest {
            sources: vec![],
            dependencies: names
                .iter()
                .map(|n| Dependency {
                    name: n.to_string(),
                    version_reqs: vec![],
                    source_opts: SourceOpts::Default,
                    groups: vec![],
                    platforms: vec![],
                })
                .collect(),
            ruby_version: None,
            platforms: vec![],
        }
    }

    fn lock_with_gem(name: &str, version: &str) -> Lockfile {
        Lockfile {
            gem: vec![GemSource {
                remote: "https://rubygems.org/".to_string(),
                specs: vec![LockSpec {
                    name: name.to_string(),
                    version: version.to_string(),
                    dependencies: vec![],
                }],
            }],
            ..Lockfile::default()
        }
    }

    #[test]
    fn manifest_deps_present_holds_when_every_dep_is_in_the_lock() {
        let lock = lock_with_gem("rack", "2.2.8");
        let manifest = manifest_with(&["rack"]);
        assert!(manifest_deps_present(&lock, &manifest, &Platform::ruby()));
    }

    #[test]
    fn manifest_deps_present_fails_for_a_missing_dep() {
        let lock = lock_with_gem("rack", "2.2.8");
        let manifest = manifest_with(&["rack", "rake"]);
        assert!(!manifest_deps_present(&lock, &manifest, &Platform::ruby()));
    }

    #[test]
    fn self_consistent_lock_with_satisfied_edge() {
        let mut lock = lock_with_gem("rack", "2.2.8");
        lock.gem[0].specs.push(LockSpec {
            name: "rack-protection".to_string(),
            version: "2.2.8".to_string(),
            dependencies: vec![crate::codec::LockDepEdge {
                name: "rack".to_string(),
                requirement: Some(">= 2.0".to_string()),
            }],
        });
        assert!(lock_self_consistent(&lock));
    }

    #[test]
    fn self_consistent_lock_detects_an_unsatisfied_edge() {
        let mut lock = lock_with_gem("rack", "1.0.0");
        lock.gem[0].specs.push(LockSpec {
            name: "rack-protection".to_string(),
            version: "2.2.8".to_string(),
            dependencies: vec![crate::codec::LockDepEdge {
                name: "rack".to_string(),
                requirement: Some(">= 2.0".to_string()),
            }],
        });
        assert!(!lock_self_consistent(&lock));
    }

    #[test]
    fn project_picks_one_entry_per_name_and_version() {
        let lock = lock_with_gem("rack", "2.2.8");
        let specs = project(&lock, &Platform::ruby());
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "rack");
        assert_eq!(specs[0].version, "2.2.8");
    }

    #[test]
    fn write_preserves_prior_lock_when_nothing_changed() {
        let prior = lock_with_gem("rack", "2.2.8");
        let manifest = manifest_with(&["rack"]);
        let resolved = project(&prior, &Platform::ruby());

        let outcome = write(&resolved, &manifest, Some(&prior));
        assert!(outcome.preserved);
        assert_eq!(outcome.lock.gem, prior.gem);
    }

    #[test]
    fn upgrade_platforms_is_a_noop_on_the_ruby_local_platform() {
        // Guards against the network path ever firing for a pure-`ruby`
        // install: there is never a "more specific" variant to look for.
        let prior = lock_with_gem("rack", "2.2.8");
        let mut specs = project(&prior, &Platform::ruby());
        let before = specs.clone();

        upgrade_platforms(&mut specs, &Platform::ruby(), &scint_net::DownloadPool::new());

        assert_eq!(specs.iter().map(|s| s.platform.clone()).collect::<Vec<_>>(), before.iter().map(|s| s.platform.clone()).collect::<Vec<_>>());
    }

    #[test]
    fn upgrade_platforms_skips_non_registry_sources() {
        let lock = Lockfile {
            path: vec![PathSource {
                remote: "/local/widget".to_string(),
                glob: None,
                specs: vec![LockSpec {
                    name: "widget".to_string(),
                    version: "0.1.0".to_string(),
                    dependencies: vec![],
                }],
            }],
            ..Lockfile::default()
        };
        let mut specs = project(&lock, &Platform::new("x86_64-linux"));
        assert_eq!(specs[0].platform, Platform::ruby());

        upgrade_platforms(&mut specs, &Platform::new("x86_64-linux"), &scint_net::DownloadPool::new());

        assert_eq!(specs[0].platform, Platform::ruby());
    }

    #[test]
    fn write_rebuilds_sources_when_a_version_changed() {
        let prior = lock_with_gem("rack", "2.2.8");
        let manifest = manifest_with(&["rack"]);
        let mut resolved = project(&prior, &Platform::ruby());
        resolved[0].version = "2.2.9".to_string();

        let outcome = write(&resolved, &manifest, Some(&prior));
        assert!(!outcome.preserved);
        assert_eq!(outcome.lock.gem[0].specs[0].version, "2.2.9");
    }
}
