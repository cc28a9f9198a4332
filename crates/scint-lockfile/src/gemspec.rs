//! A conservative, non-executing reader of `.gemspec` files.
//!
//! Real gemspecs are Ruby and in principle require evaluation, but the
//! reconciler only needs a gem's name, version, and
//! runtime dependency edges — and virtually every gemspec in the wild
//! expresses those through one of a handful of literal forms
//! (`s.name = "..."`, `s.version = "..."`, `s.add_dependency "x", ">= 1"`).
//! Scanning for those forms line by line avoids executing arbitrary code
//! from a dependency's source tree.

use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GemspecFields {
    pub name: Option<String>,
    pub version: Option<String>,
    pub dependencies: Vec<(String, String)>,
    pub has_extensions: bool,
}

pub fn read(path: &Path) -> std::io::Result<GemspecFields> {
    let text = fs_err::read_to_string(path)?;
    Ok(scan(&text))
}

fn scan(text: &str) -> GemspecFields {
    let mut fields = GemspecFields::default();

    for line in text.lines() {
        let line = line.trim();
        if let Some(value) = assignment(line, "name") {
            fields.name = Some(value);
        } else if let Some(value) = assignment(line, "version") {
            fields.version = Some(value);
        } else if let Some(args) = call_args(line, "add_dependency").or_else(|| call_args(line, "add_runtime_dependency")) {
            if let Some(edge) = split_name_requirement(args) {
                fields.dependencies.push(edge);
            }
        } else if assignment(line, "extensions").is_some() {
            fields.has_extensions = true;
        }
    }

    fields
}

/// Matches `<recv>.<field> = <quoted>`, the form every gemspec in
/// practice uses for scalar assignments (`name`, `version`, ...).
fn assignment(line: &str, field: &str) -> Option<String> {
    let (_, rest) = line.split_once('.')?;
    let rest = rest.trim_start().strip_prefix(field)?;
    let rest = rest.trim_start().strip_prefix('=')?;
    quoted(rest.trim_start())
}

/// Matches `<recv>.<method> <args>` or `<recv>.<method>(<args>)`.
fn call_args<'a>(line: &'a str, method: &str) -> Option<&'a str> {
    let (_, rest) = line.split_once('.')?;
    let rest = rest.trim_start().strip_prefix(method)?;
    Some(rest.trim_start().trim_start_matches('(').trim_end_matches(')'))
}

fn split_name_requirement(args: &str) -> Option<(String, String)> {
    let mut parts = args.splitn(2, ',');
    let name = quoted(parts.next()?.trim())?;
    let requirement = parts.next().and_then(|p| quoted(p.trim())).unwrap_or_else(|| ">= 0".to_string());
    Some((name, requirement))
}

fn quoted(text: &str) -> Option<String> {
    let text = text.trim().trim_end_matches(',');
    let bytes = text.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') && bytes[bytes.len() - 1] == bytes[0] {
        Some(text[1..text.len() - 1].to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_name_and_version() {
        let fields = scan("Gem::Specification.new do |s|\n  s.name = \"rack\"\n  s.version = '2.2.8'\nend\n");
        assert_eq!(fields.name, Some("rack".to_string()));
        assert_eq!(fields.version, Some("2.2.8".to_string()));
    }

    #[test]
    fn reads_dependencies_with_and_without_a_requirement() {
        let fields = scan("s.add_dependency \"rack\", \">= 2.0\"\ns.add_runtime_dependency \"json\"\n");
        assert_eq!(fields.dependencies, vec![("rack".to_string(), ">= 2.0".to_string()), ("json".to_string(), ">= 0".to_string())]);
    }

    #[test]
    fn detects_extensions() {
        let fields = scan("s.extensions = [\"ext/extconf.rb\"]\n");
        assert!(fields.has_extensions);
    }

    #[test]
    fn ignores_unrelated_lines() {
        let fields = scan("# a comment\nputs 'hi'\n");
        assert_eq!(fields, GemspecFields::default());
    }
}
