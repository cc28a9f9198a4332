//! Per-line grammar for the lockfile's small textual sublanguage — the
//! same "nom handles one line, a manual state machine handles block
//! structure" split `scint-manifest`'s parser uses for the Gemfile DSL.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_until};
use nom::character::complete::{char, space0};
use nom::combinator::{map, rest};
use nom::sequence::{delimited, preceded, terminated};
use nom::IResult;

/// `<name> (<version>)`, e.g. `rack (2.2.8)` or `foo (>= 1.0, < 2.0)`.
pub fn name_paren(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, name) = take_until(" (")(input)?;
    let (input, version) = delimited(tag(" ("), take_until(")"), char(')'))(input)?;
    Ok((input, (name, version)))
}

/// `<name>` with an optional ` (<reqs>)` and an optional trailing `!`
/// pin marker (the marker sits after the closing paren when reqs are
/// present, and directly on the name otherwise), as used in the
/// `DEPENDENCIES` section.
pub fn dependency_entry(input: &str) -> IResult<&str, (&str, Option<&str>, bool)> {
    let (rest_input, (name, reqs)) = alt((name_paren_opt, map(rest, |r: &str| (r, None))))(input)?;

    let pinned_after_parens = rest_input.trim() == "!";
    let (name, pinned_on_name) = match name.strip_suffix('!') {
        Some(stripped) => (stripped, true),
        None => (name, false),
    };

    Ok((rest_input, (name, reqs, pinned_after_parens || pinned_on_name)))
}

fn name_paren_opt(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    let (input, (name, version)) = name_paren(input)?;
    Ok((input, (name, Some(version))))
}

/// `key: value`, tolerating an absent value (`specs:`).
pub fn key_value(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, key) = take_until(":")(input)?;
    let (input, value) = preceded(char(':'), preceded(space0, rest))(input)?;
    Ok((input, (key, value)))
}

/// `<name> (<version>) <algorithm>=<hex>`, a `CHECKSUMS` entry.
pub fn checksum_entry(input: &str) -> IResult<&str, (&str, &str, &str, &str)> {
    let (input, (name, version)) = name_paren(input)?;
    let (input, _) = space0(input)?;
    let (input, algorithm) = terminated(take_until("="), char('='))(input)?;
    let (input, hex) = rest(input)?;
    Ok((input, (name, version, algorithm, hex)))
}

/// Counts leading ASCII space characters, returning `(indent, rest)`.
pub fn indent(line: &str) -> (usize, &str) {
    let trimmed = line.trim_start_matches(' ');
    (line.len() - trimmed.len(), trimmed)
}

pub fn ruby_version_value(input: &str) -> IResult<&str, &str> {
    preceded(tag("ruby "), rest)(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spec_line() {
        let (_, (name, version)) = name_paren("rack (2.2.8)").unwrap();
        assert_eq!((name, version), ("rack", "2.2.8"));
    }

    #[test]
    fn parses_dependency_with_pin_and_requirement() {
        let (_, (name, reqs, pinned)) = dependency_entry("rack (>= 2.0)!").unwrap();
        assert_eq!(name, "rack");
        assert_eq!(reqs, Some(">= 2.0"));
        assert!(pinned);
    }

    #[test]
    fn parses_bare_dependency() {
        let (_, (name, reqs, pinned)) = dependency_entry("rake").unwrap();
        assert_eq!(name, "rake");
        assert_eq!(reqs, None);
        assert!(!pinned);
    }

    #[test]
    fn parses_key_value() {
        let (_, (key, value)) = key_value("remote: https://rubygems.org/").unwrap();
        assert_eq!(key, "remote");
        assert_eq!(value, "https://rubygems.org/");
    }

    #[test]
    fn parses_checksum_line() {
        let (_, (name, version, algo, hex)) = checksum_entry("rack (2.2.8) sha256=deadbeef").unwrap();
        assert_eq!((name, version, algo, hex), ("rack", "2.2.8", "sha256", "deadbeef"));
    }
}
