//! The lockfile text format: `GIT`/`PATH`/`GEM` source blocks, a
//! `PLATFORMS` list, a `DEPENDENCIES` list, and the optional
//! `CHECKSUMS`/`RUBY VERSION`/`BUNDLED WITH` trailers.
//!
//! Parsing is line-oriented, mirroring `scint-manifest`'s split: a manual
//! state machine tracks which section and sub-list is open, `nom`
//! (via [`crate::line`]) recognizes the shape of each individual line.
//! [`parse`] and [`serialize`] are exact inverses of each other for any
//! value `parse` can produce — the round-trip property the reconciler's
//! tests rely on.

use std::fmt::Write as _;

use thiserror::Error;

use crate::line;

#[derive(Debug, Error)]
pub enum Error {
    #[error("lockfile line {0}: {1:?} did not match the expected shape")]
    Malformed(usize, String),
    #[error("lockfile line {0}: spec entry outside any source block")]
    SpecOutsideSource(usize),
    #[error("lockfile line {0}: dependency edge outside any spec")]
    EdgeOutsideSpec(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockDepEdge {
    pub name: String,
    pub requirement: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSpec {
    pub name: String,
    pub version: String,
    pub dependencies: Vec<LockDepEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitSource {
    pub remote: String,
    pub revision: String,
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub git_ref: Option<String>,
    pub specs: Vec<LockSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSource {
    pub remote: String,
    pub glob: Option<String>,
    pub specs: Vec<LockSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GemSource {
    pub remote: String,
    pub specs: Vec<LockSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockDependency {
    pub name: String,
    pub requirement: Option<String>,
    pub pinned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    pub name: String,
    pub version: String,
    pub algorithm: String,
    pub hex: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lockfile {
    pub git: Vec<GitSource>,
    pub path: Vec<PathSource>,
    pub gem: Vec<GemSource>,
    pub platforms: Vec<String>,
    pub dependencies: Vec<LockDependency>,
    pub checksums: Vec<Checksum>,
    pub ruby_version: Option<String>,
    pub bundled_with: Option<String>,
}

impl Lockfile {
    /// Every spec across every source block, in file order.
    pub fn all_specs(&self) -> Vec<&LockSpec> {
        self.git
            .iter()
            .flat_map(|g| &g.specs)
            .chain(self.path.iter().flat_map(|p| &p.specs))
            .chain(self.gem.iter().flat_map(|g| &g.specs))
            .collect()
    }

    pub fn find_spec(&self, name: &str) -> Vec<&LockSpec> {
        self.all_specs().into_iter().filter(|s| s.name == name).collect()
    }

    /// Sorts every source block's spec list (and each spec's dependency
    /// edges) into the same order [`serialize`] always writes them in, so
    /// `parse(serialize(lock)) == lock` holds for a `Lockfile` built by any
    /// means, not only one that happens to already be in that order.
    /// [`parse`] and [`reconcile::write`](crate::reconcile::write) both
    /// call this before handing a `Lockfile` back to a caller.
    pub fn canonicalize(&mut self) {
        for git in &mut self.git {
            canonicalize_specs(&mut git.specs);
        }
        for path in &mut self.path {
            canonicalize_specs(&mut path.specs);
        }
        for gem in &mut self.gem {
            canonicalize_specs(&mut gem.specs);
        }
    }
}

fn canonicalize_specs(specs: &mut [LockSpec]) {
    specs.sort_by(|a, b| a.name.cmp(&b.name).then(a.version.cmp(&b.version)));
    for spec in specs.iter_mut() {
        spec.dependencies.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

const SECTION_KEYS_INDENT: usize = 2;
const SPEC_INDENT: usize = 2;
const EDGE_INDENT: usize = 4;
const TRAILER_VALUE_INDENT: usize = 3;

#[derive(Debug)]
enum Section {
    Git(GitSource),
    Path(PathSource),
    Gem(GemSource),
    Platforms,
    Dependencies,
    Checksums,
    RubyVersion,
    BundledWith,
}

pub fn parse(text: &str) -> Result<Lockfile, Error> {
    let mut lock = Lockfile::default();
    let mut section: Option<Section> = None;
    let mut in_specs = false;
    let mut current_spec: Option<LockSpec> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if raw_line.trim().is_empty() {
            continue;
        }
        let (indent, trimmed) = line::indent(raw_line);

        if indent == 0 {
            close_section(&mut lock, &mut section, &mut current_spec);
            in_specs = false;
            section = Some(match trimmed {
                "GIT" => Section::Git(GitSource::default()),
                "PATH" => Section::Path(PathSource::default()),
                "GEM" => Section::Gem(GemSource::default()),
                "PLATFORMS" => Section::Platforms,
                "DEPENDENCIES" => Section::Dependencies,
                "CHECKSUMS" => Section::Checksums,
                "RUBY VERSION" => Section::RubyVersion,
                "BUNDLED WITH" => Section::BundledWith,
                other => return Err(Error::Malformed(line_no, other.to_string())),
            });
            continue;
        }

        match section.as_mut() {
            Some(Section::Git(git)) => {
                if indent == EDGE_INDENT {
                    let spec = current_spec.as_mut().ok_or(Error::EdgeOutsideSpec(line_no))?;
                    spec.dependencies.push(parse_edge(line_no, trimmed)?);
                } else if in_specs && indent == SPEC_INDENT {
                    flush_one_spec(&mut current_spec, &mut git.specs);
                    current_spec = Some(parse_spec_header(line_no, trimmed)?);
                } else if indent == SECTION_KEYS_INDENT {
                    let (key, value) = line::key_value(trimmed).map_err(|_| Error::Malformed(line_no, trimmed.to_string()))?.1;
                    match key {
                        "remote" => git.remote = value.to_string(),
                        "revision" => git.revision = value.to_string(),
                        "branch" => git.branch = Some(value.to_string()),
                        "tag" => git.tag = Some(value.to_string()),
                        "ref" => git.git_ref = Some(value.to_string()),
                        "specs" => in_specs = true,
                        _ => {}
                    }
                } else {
                    return Err(Error::Malformed(line_no, raw_line.to_string()));
                }
            }
            Some(Section::Path(path)) => {
                if indent == EDGE_INDENT {
                    let spec = current_spec.as_mut().ok_or(Error::EdgeOutsideSpec(line_no))?;
                    spec.dependencies.push(parse_edge(line_no, trimmed)?);
                } else if in_specs && indent == SPEC_INDENT {
                    flush_one_spec(&mut current_spec, &mut path.specs);
                    current_spec = Some(parse_spec_header(line_no, trimmed)?);
                } else if indent == SECTION_KEYS_INDENT {
                    let (key, value) = line::key_value(trimmed).map_err(|_| Error::Malformed(line_no, trimmed.to_string()))?.1;
                    match key {
                        "remote" => path.remote = value.to_string(),
                        "glob" => path.glob = Some(value.to_string()),
                        "specs" => in_specs = true,
                        _ => {}
                    }
                } else {
                    return Err(Error::Malformed(line_no, raw_line.to_string()));
                }
            }
            Some(Section::Gem(gem)) => {
                if indent == EDGE_INDENT {
                    let spec = current_spec.as_mut().ok_or(Error::EdgeOutsideSpec(line_no))?;
                    spec.dependencies.push(parse_edge(line_no, trimmed)?);
                } else if in_specs && indent == SPEC_INDENT {
                    flush_one_spec(&mut current_spec, &mut gem.specs);
                    current_spec = Some(parse_spec_header(line_no, trimmed)?);
                } else if indent == SECTION_KEYS_INDENT {
                    let (key, value) = line::key_value(trimmed).map_err(|_| Error::Malformed(line_no, trimmed.to_string()))?.1;
                    match key {
                        "remote" => gem.remote = value.to_string(),
                        "specs" => in_specs = true,
                        _ => {}
                    }
                } else {
                    return Err(Error::Malformed(line_no, raw_line.to_string()));
                }
            }
            Some(Section::Platforms) => {
                if indent == SPEC_INDENT {
                    lock.platforms.push(trimmed.to_string());
                } else {
                    return Err(Error::Malformed(line_no, raw_line.to_string()));
                }
            }
            Some(Section::Dependencies) => {
                if indent == SPEC_INDENT {
                    let (_, (name, reqs, pinned)) =
                        line::dependency_entry(trimmed).map_err(|_| Error::Malformed(line_no, trimmed.to_string()))?;
                    lock.dependencies.push(LockDependency {
                        name: name.to_string(),
                        requirement: reqs.map(str::to_string),
                        pinned,
                    });
                } else {
                    return Err(Error::Malformed(line_no, raw_line.to_string()));
                }
            }
            Some(Section::Checksums) => {
                if indent == SPEC_INDENT {
                    let (_, (name, version, algorithm, hex)) =
                        line::checksum_entry(trimmed).map_err(|_| Error::Malformed(line_no, trimmed.to_string()))?;
                    lock.checksums.push(Checksum {
                        name: name.to_string(),
                        version: version.to_string(),
                        algorithm: algorithm.to_string(),
                        hex: hex.to_string(),
                    });
                } else {
                    return Err(Error::Malformed(line_no, raw_line.to_string()));
                }
            }
            Some(Section::RubyVersion) => {
                if indent == TRAILER_VALUE_INDENT {
                    let (_, version) =
                        line::ruby_version_value(trimmed).map_err(|_| Error::Malformed(line_no, trimmed.to_string()))?;
                    lock.ruby_version = Some(version.to_string());
                } else {
                    return Err(Error::Malformed(line_no, raw_line.to_string()));
                }
            }
            Some(Section::BundledWith) => {
                if indent == TRAILER_VALUE_INDENT {
                    lock.bundled_with = Some(trimmed.to_string());
                } else {
                    return Err(Error::Malformed(line_no, raw_line.to_string()));
                }
            }
            None => return Err(Error::Malformed(line_no, raw_line.to_string())),
        }
    }

    close_section(&mut lock, &mut section, &mut current_spec);
    lock.canonicalize();

    Ok(lock)
}

/// Flushes any in-progress spec into its section, then moves the
/// finished section (if any) into the lockfile's corresponding list.
fn close_section(lock: &mut Lockfile, section: &mut Option<Section>, current_spec: &mut Option<LockSpec>) {
    if let Some(spec) = current_spec.take() {
        match section {
            Some(Section::Git(g)) => g.specs.push(spec),
            Some(Section::Path(p)) => p.specs.push(spec),
            Some(Section::Gem(g)) => g.specs.push(spec),
            _ => {}
        }
    }

    match section.take() {
        Some(Section::Git(g)) => lock.git.push(g),
        Some(Section::Path(p)) => lock.path.push(p),
        Some(Section::Gem(g)) => lock.gem.push(g),
        _ => {}
    }
}

fn flush_one_spec(current: &mut Option<LockSpec>, into: &mut Vec<LockSpec>) {
    if let Some(spec) = current.take() {
        into.push(spec);
    }
}

fn parse_spec_header(line_no: usize, trimmed: &str) -> Result<LockSpec, Error> {
    let (_, (name, version)) = line::name_paren(trimmed).map_err(|_| Error::Malformed(line_no, trimmed.to_string()))?;
    Ok(LockSpec {
        name: name.to_string(),
        version: version.to_string(),
        dependencies: Vec::new(),
    })
}

fn parse_edge(line_no: usize, trimmed: &str) -> Result<LockDepEdge, Error> {
    if let Ok((_, (name, version))) = line::name_paren(trimmed) {
        Ok(LockDepEdge {
            name: name.to_string(),
            requirement: Some(version.to_string()),
        })
    } else if !trimmed.is_empty() {
        Ok(LockDepEdge {
            name: trimmed.to_string(),
            requirement: None,
        })
    } else {
        Err(Error::Malformed(line_no, trimmed.to_string()))
    }
}

pub fn serialize(lock: &Lockfile) -> String {
    let mut out = String::new();

    for git in &lock.git {
        writeln!(out, "GIT").unwrap();
        writeln!(out, "  remote: {}", git.remote).unwrap();
        writeln!(out, "  revision: {}", git.revision).unwrap();
        if let Some(branch) = &git.branch {
            writeln!(out, "  branch: {branch}").unwrap();
        }
        if let Some(tag) = &git.tag {
            writeln!(out, "  tag: {tag}").unwrap();
        }
        if let Some(git_ref) = &git.git_ref {
            writeln!(out, "  ref: {git_ref}").unwrap();
        }
        writeln!(out, "  specs:").unwrap();
        write_specs(&mut out, &git.specs);
        writeln!(out).unwrap();
    }

    for path in &lock.path {
        writeln!(out, "PATH").unwrap();
        writeln!(out, "  remote: {}", path.remote).unwrap();
        if let Some(glob) = &path.glob {
            writeln!(out, "  glob: {glob}").unwrap();
        }
        writeln!(out, "  specs:").unwrap();
        write_specs(&mut out, &path.specs);
        writeln!(out).unwrap();
    }

    for gem in &lock.gem {
        writeln!(out, "GEM").unwrap();
        writeln!(out, "  remote: {}", gem.remote).unwrap();
        writeln!(out, "  specs:").unwrap();
        write_specs(&mut out, &gem.specs);
        writeln!(out).unwrap();
    }

    if !lock.platforms.is_empty() {
        writeln!(out, "PLATFORMS").unwrap();
        let mut platforms = lock.platforms.clone();
        platforms.sort();
        for platform in platforms {
            writeln!(out, "  {platform}").unwrap();
        }
        writeln!(out).unwrap();
    }

    writeln!(out, "DEPENDENCIES").unwrap();
    for dep in &lock.dependencies {
        let mut line = dep.name.clone();
        if let Some(req) = &dep.requirement {
            write!(line, " ({req})").unwrap();
        }
        if dep.pinned {
            line.push('!');
        }
        writeln!(out, "  {line}").unwrap();
    }

    if !lock.checksums.is_empty() {
        writeln!(out).unwrap();
        writeln!(out, "CHECKSUMS").unwrap();
        for checksum in &lock.checksums {
            writeln!(out, "  {} ({}) {}={}", checksum.name, checksum.version, checksum.algorithm, checksum.hex).unwrap();
        }
    }

    if let Some(ruby_version) = &lock.ruby_version {
        writeln!(out).unwrap();
        writeln!(out, "RUBY VERSION").unwrap();
        writeln!(out, "   ruby {ruby_version}").unwrap();
    }

    if let Some(bundled_with) = &lock.bundled_with {
        writeln!(out).unwrap();
        writeln!(out, "BUNDLED WITH").unwrap();
        writeln!(out, "   {bundled_with}").unwrap();
    }

    out
}

fn write_specs(out: &mut String, specs: &[LockSpec]) {
    let mut sorted: Vec<&LockSpec> = specs.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name).then(a.version.cmp(&b.version)));
    for spec in sorted {
        writeln!(out, "  {} ({})", spec.name, spec.version).unwrap();
        let mut deps = spec.dependencies.clone();
        deps.sort_by(|a, b| a.name.cmp(&b.name));
        for dep in deps {
            match dep.requirement {
                Some(req) => writeln!(out, "    {} ({})", dep.name, req).unwrap(),
                None => writeln!(out, "    {}", dep.name).unwrap(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Lockfile {
        Lockfile {
            git: vec![GitSource {
                remote: "https://github.com/rack/rack".to_string(),
                revision: "abc123".to_string(),
                branch: Some("main".to_string()),
                tag: None,
                git_ref: None,
                specs: vec![LockSpec {
                    name: "rack".to_string(),
                    version: "2.2.8".to_string(),
                    dependencies: vec![],
                }],
            }],
            path: vec![],
            gem: vec![GemSource {
                remote: "https://rubygems.org/".to_string(),
                specs: vec![
                    LockSpec {
                        name: "ffi".to_string(),
                        version: "1.17.0".to_string(),
                        dependencies: vec![LockDepEdge {
                            name: "dep".to_string(),
                            requirement: Some(">= 1.0".to_string()),
                        }],
                    },
                    LockSpec {
                        name: "rake".to_string(),
                        version: "13.2.1".to_string(),
                        dependencies: vec![],
                    },
                ],
            }],
            platforms: vec!["ruby".to_string(), "x86_64-linux".to_string()],
            dependencies: vec![
                LockDependency {
                    name: "rack".to_string(),
                    requirement: None,
                    pinned: true,
                },
                LockDependency {
                    name: "rake".to_string(),
                    requirement: Some("~> 13.0".to_string()),
                    pinned: false,
                },
            ],
            checksums: vec![Checksum {
                name: "rake".to_string(),
                version: "13.2.1".to_string(),
                algorithm: "sha256".to_string(),
                hex: "deadbeef".to_string(),
            }],
            ruby_version: Some("3.3.0".to_string()),
            bundled_with: Some("2.5.9".to_string()),
        }
    }

    #[test]
    fn round_trips_a_full_lockfile() {
        let lock = sample();
        let text = serialize(&lock);
        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed, lock);
    }

    #[test]
    fn round_trip_is_byte_stable_on_a_second_pass() {
        let lock = sample();
        let first = serialize(&lock);
        let second = serialize(&parse(&first).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn empty_lockfile_round_trips() {
        let lock = Lockfile::default();
        let text = serialize(&lock);
        assert_eq!(parse(&text).unwrap(), lock);
    }

    #[test]
    fn rejects_an_unrecognized_section() {
        let err = parse("BOGUS\n  x\n").unwrap_err();
        assert!(matches!(err, Error::Malformed(1, _)));
    }

    #[test]
    fn canonicalize_sorts_specs_built_in_non_canonical_order() {
        let mut lock = Lockfile {
            gem: vec![GemSource {
                remote: "https://rubygems.org/".to_string(),
                specs: vec![
                    LockSpec {
                        name: "rake".to_string(),
                        version: "13.2.1".to_string(),
                        dependencies: vec![],
                    },
                    LockSpec {
                        name: "ffi".to_string(),
                        version: "1.17.0".to_string(),
                        dependencies: vec![],
                    },
                ],
            }],
            ..Lockfile::default()
        };

        lock.canonicalize();

        assert_eq!(lock.gem[0].specs[0].name, "ffi");
        assert_eq!(lock.gem[0].specs[1].name, "rake");
    }

    #[test]
    fn round_trips_a_lockfile_built_in_non_canonical_order() {
        let mut lock = sample();
        lock.gem[0].specs.reverse();
        lock.canonicalize();

        let text = serialize(&lock);
        assert_eq!(parse(&text).unwrap(), lock);
    }
}
