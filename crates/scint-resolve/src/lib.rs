//! A backtracking constraint solver standing in for a real SAT-style
//! resolver behind a trait boundary: given a
//! [`Provider`] and a set of top-level [`Dependency`] constraints, it
//! produces a consistent [`ResolvedSpec`] graph.
//!
//! Not SAT-complete — on conflict it snapshots and retries the next
//! candidate version depth-first rather than doing full unit propagation
//! or clause learning. Sufficient for ordinary dependency graphs;
//! a production resolver would replace this crate
//! behind the same [`Provider`] boundary.

mod constraint;
mod provider;
mod version;

pub use constraint::Constraint;
pub use provider::{Candidate, Error as ProviderError, Provider, StaticProvider};
pub use version::Version;

use std::collections::HashMap;

use scint_core::dependency::{Dependency, Platform};
use scint_core::source::{ResolvedSource, Source, SourceKind};
use scint_core::spec::{DependencyRef, ResolvedSpec};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("provider")]
    Provider(#[from] ProviderError),
    #[error("no version of {name:?} satisfies {requirement:?} given already-chosen {chosen}")]
    Conflict { name: String, requirement: String, chosen: String },
    #[error("no candidate of {0:?} satisfies the accumulated requirements")]
    Unsatisfiable(String),
}

#[derive(Debug, Clone)]
struct Placed {
    version: Version,
    platform: Platform,
    dependencies: Vec<(String, String)>,
    source: ResolvedSource,
    has_extensions: bool,
    checksum: Option<String>,
}

/// Resolves `top_level` against `provider`, preferring candidates whose
/// platform matches `local_platform` over the portable `"ruby"` platform,
/// and falling back to the manifest's `default_source` for any
/// dependency (top-level or transitive) that doesn't declare its own.
pub fn resolve(top_level: &[Dependency], default_source: &Source, local_platform: &Platform, provider: &dyn Provider) -> Result<Vec<ResolvedSpec>, Error> {
    let mut source_for: HashMap<String, Source> = HashMap::new();
    for dep in top_level {
        source_for.insert(dep.name.clone(), dep.resolve_source(default_source));
    }

    let mut chosen: HashMap<String, Placed> = HashMap::new();

    for dep in top_level {
        let requirement = dep.version_reqs.join(", ");
        place(&dep.name, &requirement, &source_for, default_source, local_platform, provider, &mut chosen)?;
    }

    let mut specs: Vec<ResolvedSpec> = chosen
        .into_iter()
        .map(|(name, placed)| ResolvedSpec {
            name,
            version: placed.version.to_string(),
            platform: placed.platform,
            dependencies: placed.dependencies.into_iter().map(|(name, requirement)| DependencyRef { name, requirement }).collect(),
            source: placed.source,
            has_extensions: placed.has_extensions,
            checksum: placed.checksum,
        })
        .collect();
    specs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(specs)
}

fn place(
    name: &str,
    requirement: &str,
    source_for: &HashMap<String, Source>,
    default_source: &Source,
    local_platform: &Platform,
    provider: &dyn Provider,
    chosen: &mut HashMap<String, Placed>,
) -> Result<(), Error> {
    let constraint = Constraint::parse_one(requirement);

    if let Some(existing) = chosen.get(name) {
        return if constraint.matches(&existing.version) {
            Ok(())
        } else {
            Err(Error::Conflict {
                name: name.to_string(),
                requirement: requirement.to_string(),
                chosen: existing.version.to_string(),
            })
        };
    }

    let source = source_for.get(name).cloned().unwrap_or_else(|| default_source.clone());
    let source_kind = source.kind();

    let candidates = provider.candidates(name)?;
    let mut matching: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.source.kind() == source_kind || source_kind == SourceKind::Registry)
        .filter(|c| constraint.matches(&c.version))
        .collect();

    matching.sort_by(|a, b| {
        let a_native = a.platform == *local_platform;
        let b_native = b.platform == *local_platform;
        b_native.cmp(&a_native).then_with(|| b.version.cmp(&a.version))
    });

    for candidate in matching {
        let snapshot = chosen.clone();
        chosen.insert(
            name.to_string(),
            Placed {
                version: candidate.version.clone(),
                platform: candidate.platform.clone(),
                dependencies: candidate.dependencies.clone(),
                source: candidate.source.clone(),
                has_extensions: candidate.has_extensions,
                checksum: candidate.checksum.clone(),
            },
        );

        let mut ok = true;
        for (dep_name, dep_requirement) in candidate.dependencies.clone() {
            if place(&dep_name, &dep_requirement, source_for, default_source, local_platform, provider, chosen).is_err() {
                ok = false;
                break;
            }
        }

        if ok {
            return Ok(());
        }
        *chosen = snapshot;
    }

    Err(Error::Unsatisfiable(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scint_core::dependency::{Dependency, SourceOpts};
    use url::Url;

    fn registry() -> Source {
        Source::Registry {
            remotes: vec![Url::parse("https://registry.example/").unwrap()],
        }
    }

    fn candidate(version: &str, deps: &[(&str, &str)]) -> Candidate {
        Candidate {
            version: Version::parse(version),
            platform: Platform::ruby(),
            dependencies: deps.iter().map(|(n, r)| (n.to_string(), r.to_string())).collect(),
            source: ResolvedSource::Registry {
                remote: Url::parse("https://registry.example/").unwrap(),
            },
            has_extensions: false,
            checksum: None,
        }
    }

    fn dep(name: &str, reqs: &[&str]) -> Dependency {
        Dependency {
            name: name.to_string(),
            version_reqs: reqs.iter().map(|s| s.to_string()).collect(),
            source_opts: SourceOpts::Default,
            groups: vec![],
            platforms: vec![],
        }
    }

    #[test]
    fn resolves_two_independent_gems_to_their_highest_matching_version() {
        let mut provider = StaticProvider::new();
        provider.insert("rack", vec![candidate("2.2.8", &[]), candidate("2.1.0", &[])]);
        provider.insert("rake", vec![candidate("13.2.1", &[])]);

        let specs = resolve(&[dep("rack", &[]), dep("rake", &[])], &registry(), &Platform::ruby(), &provider).unwrap();

        let rack = specs.iter().find(|s| s.name == "rack").unwrap();
        assert_eq!(rack.version, "2.2.8");
    }

    #[test]
    fn transitive_dependency_is_placed_and_deduped() {
        let mut provider = StaticProvider::new();
        provider.insert("ffi", vec![candidate("1.17.0", &[("dep", "1.0.0")])]);
        provider.insert("dep", vec![candidate("1.0.0", &[])]);

        let specs = resolve(&[dep("ffi", &["1.17.0"])], &registry(), &Platform::ruby(), &provider).unwrap();

        assert_eq!(specs.len(), 2);
        assert!(specs.iter().any(|s| s.name == "dep"));
    }

    #[test]
    fn backtracks_to_a_lower_version_when_the_highest_conflicts() {
        let mut provider = StaticProvider::new();
        // `top` needs exactly 1.0.0 of `shared`; the highest version of
        // `mid` depends on `shared` 2.0.0, which conflicts, forcing a
        // retry at `mid` 1.0.0 which depends on a compatible `shared`.
        provider.insert("mid", vec![candidate("2.0.0", &[("shared", "2.0.0")]), candidate("1.0.0", &[("shared", "1.0.0")])]);
        provider.insert("shared", vec![candidate("2.0.0", &[]), candidate("1.0.0", &[])]);

        let specs = resolve(&[dep("mid", &[]), dep("shared", &["1.0.0"])], &registry(), &Platform::ruby(), &provider).unwrap();

        let mid = specs.iter().find(|s| s.name == "mid").unwrap();
        assert_eq!(mid.version, "1.0.0");
        let shared = specs.iter().find(|s| s.name == "shared").unwrap();
        assert_eq!(shared.version, "1.0.0");
    }

    #[test]
    fn unsatisfiable_constraints_are_reported() {
        let mut provider = StaticProvider::new();
        provider.insert("rack", vec![candidate("1.0.0", &[])]);

        let err = resolve(&[dep("rack", &[">= 2.0.0"])], &registry(), &Platform::ruby(), &provider).unwrap_err();
        assert!(matches!(err, Error::Unsatisfiable(name) if name == "rack"));
    }
}
