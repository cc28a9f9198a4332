//! Parses a `Gemfile`-style manifest into a typed record:
//! `{sources, dependencies, ruby_version?, platforms}`.
//!
//! A manifest is a tiny, line-oriented DSL (`source`, `gem`, `ruby`,
//! `platforms`, and `group ... do ... end` blocks); [`parser`] recognizes
//! one line at a time and this module folds the resulting stream into a
//! [`Manifest`], tracking the current group stack so gems declared inside
//! a `group :test do ... end` block pick up that group.

mod parser;
mod value;

use scint_core::dependency::{Dependency, Group, Platform, SourceOpts};
use thiserror::Error;
use url::Url;

use parser::{Line, LineError};
use value::Value;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Line(#[from] LineError),
    #[error("`group` block closed with `end` but none was open (line {0})")]
    UnmatchedEnd(usize),
    #[error("manifest ended with {0} unclosed `group` block(s)")]
    UnclosedGroup(usize),
    #[error("invalid source url {0:?}: {1}")]
    InvalidUrl(String, url::ParseError),
    #[error("`gem \"{0}\"` declares more than one of source:/path:/git:")]
    ConflictingSourceOpts(String),
}

/// A manifest-level `source "URL"` declaration; the first one present is
/// the default registry new dependencies resolve against absent an
/// explicit per-gem override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDecl {
    pub remote: Url,
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub sources: Vec<SourceDecl>,
    pub dependencies: Vec<Dependency>,
    pub ruby_version: Option<String>,
    pub platforms: Vec<Platform>,
}

impl Manifest {
    /// The `Source` a dependency with no explicit `source:`/`path:`/`git:`
    /// option resolves against: the first declared `source` line.
    pub fn default_remote(&self) -> Option<&Url> {
        self.sources.first().map(|s| &s.remote)
    }
}

pub fn parse(text: &str) -> Result<Manifest, Error> {
    let mut manifest = Manifest::default();
    let mut group_stack: Vec<Vec<Group>> = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        match parser::parse_line(line_no, raw_line)? {
            Line::Blank => {}
            Line::Source(url) => {
                let remote = Url::parse(&url).map_err(|e| Error::InvalidUrl(url, e))?;
                manifest.sources.push(SourceDecl { remote });
            }
            Line::Ruby(version) => manifest.ruby_version = Some(version),
            Line::Platforms(names) => manifest.platforms = names.into_iter().map(Platform::new).collect(),
            Line::GroupStart(names) => {
                let groups = if names.is_empty() {
                    vec![Group::default_group()]
                } else {
                    names.into_iter().map(Group::new).collect()
                };
                group_stack.push(groups);
            }
            Line::BlockEnd => {
                if group_stack.pop().is_none() {
                    return Err(Error::UnmatchedEnd(line_no));
                }
            }
            Line::Gem { name, args } => {
                let active_groups = group_stack.last().cloned().unwrap_or_else(|| vec![Group::default_group()]);
                manifest.dependencies.push(build_dependency(name, args, active_groups)?);
            }
        }
    }

    if !group_stack.is_empty() {
        return Err(Error::UnclosedGroup(group_stack.len()));
    }

    Ok(manifest)
}

fn build_dependency(name: String, args: Vec<Value>, default_groups: Vec<Group>) -> Result<Dependency, Error> {
    let mut version_reqs = Vec::new();
    let mut source: Option<&'static str> = None;
    let mut registry: Option<Url> = None;
    let mut path: Option<std::path::PathBuf> = None;
    let mut git_uri: Option<Url> = None;
    let mut branch = None;
    let mut tag = None;
    let mut git_ref = None;
    let mut submodules = false;
    let mut glob = None;
    let mut groups = default_groups;
    let mut platforms = Vec::new();

    let mut mark_source = |kind: &'static str| -> Result<(), Error> {
        match source {
            Some(existing) if existing != kind => Err(Error::ConflictingSourceOpts(name.clone())),
            _ => {
                source = Some(kind);
                Ok(())
            }
        }
    };

    for arg in args {
        match arg {
            Value::Str(req) => version_reqs.push(req),
            Value::Pair(key, boxed) => match key.as_str() {
                "source" => {
                    mark_source("registry")?;
                    if let Some(url) = boxed.as_str() {
                        registry = Url::parse(url).map_err(|e| Error::InvalidUrl(url.to_string(), e)).ok();
                    }
                }
                "path" => {
                    mark_source("path")?;
                    path = boxed.as_str().map(std::path::PathBuf::from);
                }
                "git" => {
                    mark_source("git")?;
                    if let Some(url) = boxed.as_str() {
                        git_uri = Url::parse(url).map_err(|e| Error::InvalidUrl(url.to_string(), e)).ok();
                    }
                }
                "branch" => branch = boxed.as_str().map(str::to_string),
                "tag" => tag = boxed.as_str().map(str::to_string),
                "ref" => git_ref = boxed.as_str().map(str::to_string),
                "submodules" => submodules = boxed.as_bool().unwrap_or(false),
                "glob" => glob = boxed.as_str().map(str::to_string),
                "group" => {
                    groups = match boxed.as_array() {
                        Some(items) => items.iter().filter_map(Value::as_sym).map(Group::new).collect(),
                        None => boxed.as_sym().map(|s| vec![Group::new(s)]).unwrap_or(groups),
                    };
                }
                "platforms" => {
                    platforms = match boxed.as_array() {
                        Some(items) => items.iter().filter_map(Value::as_sym).map(Platform::new).collect(),
                        None => boxed.as_sym().map(|s| vec![Platform::new(s)]).unwrap_or_default(),
                    };
                }
                // `require:` only controls the runtime `require` call, not acquisition or resolution.
                "require" => {}
                _ => {}
            },
            _ => {}
        }
    }

    let source_opts = match (registry, path, git_uri) {
        (Some(remote), None, None) => SourceOpts::Registry(remote),
        (None, Some(path), None) => SourceOpts::Path(path),
        (None, None, Some(uri)) => SourceOpts::Git {
            uri,
            branch,
            tag,
            git_ref,
            submodules,
            glob,
        },
        (None, None, None) => SourceOpts::Default,
        _ => return Err(Error::ConflictingSourceOpts(name)),
    };

    Ok(Dependency {
        name,
        version_reqs,
        source_opts,
        groups,
        platforms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_plain_registry_gems() {
        let manifest = parse(
            r#"
            source "https://rubygems.org"
            gem "rack"
            gem "rake", "~> 13.0"
            "#,
        )
        .unwrap();

        assert_eq!(manifest.default_remote().unwrap().as_str(), "https://rubygems.org/");
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(manifest.dependencies[1].version_reqs, vec!["~> 13.0".to_string()]);
    }

    #[test]
    fn gem_in_a_group_block_is_tagged_with_that_group() {
        let manifest = parse(
            r#"
            source "https://rubygems.org"
            gem "rack"
            group :test do
              gem "rspec"
            end
            "#,
        )
        .unwrap();

        let rspec = manifest.dependencies.iter().find(|d| d.name == "rspec").unwrap();
        assert_eq!(rspec.groups, vec![Group::new("test")]);

        let rack = manifest.dependencies.iter().find(|d| d.name == "rack").unwrap();
        assert_eq!(rack.groups, vec![Group::default_group()]);
    }

    #[test]
    fn git_gem_carries_its_branch_and_revision_options() {
        let manifest = parse(r#"gem "ffi", git: "https://github.com/ffi/ffi", branch: "main""#).unwrap();
        match &manifest.dependencies[0].source_opts {
            SourceOpts::Git { uri, branch, .. } => {
                assert_eq!(uri.as_str(), "https://github.com/ffi/ffi");
                assert_eq!(branch.as_deref(), Some("main"));
            }
            other => panic!("expected a git source, got {other:?}"),
        }
    }

    #[test]
    fn unclosed_group_block_is_an_error() {
        let err = parse("group :test do\ngem \"rspec\"").unwrap_err();
        assert!(matches!(err, Error::UnclosedGroup(1)));
    }

    #[test]
    fn conflicting_source_options_are_rejected() {
        let err = parse(r#"gem "x", path: "../x", git: "https://example/x""#).unwrap_err();
        assert!(matches!(err, Error::ConflictingSourceOpts(_)));
    }
}
