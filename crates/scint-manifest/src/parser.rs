//! Recognizes one logical `Gemfile` line as a method call (`source`,
//! `gem`, `ruby`, `platforms`, `group ... do`, `end`), stripping comments
//! and leading/trailing whitespace first. Multi-line `group do ... end`
//! blocks are resolved by the caller in [`crate::parse`], which keeps a
//! small group stack; this module only ever looks at one line at a time.

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{multispace0, multispace1};
use nom::combinator::{eof, opt, rest};
use nom::sequence::{preceded, terminated};
use nom::IResult;

use crate::value::{arg_list, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Source(String),
    Ruby(String),
    Platforms(Vec<String>),
    Gem { name: String, args: Vec<Value> },
    GroupStart(Vec<String>),
    BlockEnd,
    Blank,
}

#[derive(Debug, thiserror::Error)]
#[error("could not parse line {line_no}: {text:?}")]
pub struct LineError {
    pub line_no: usize,
    pub text: String,
}

pub fn parse_line(line_no: usize, raw: &str) -> Result<Line, LineError> {
    let stripped = strip_comment(raw).trim();
    if stripped.is_empty() {
        return Ok(Line::Blank);
    }

    call(stripped).map(|(_, line)| line).map_err(|_| LineError {
        line_no,
        text: stripped.to_string(),
    })
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        // A `#` inside a quoted string must not be treated as a comment
        // marker; cheaply approximated by only honoring a `#` that isn't
        // preceded by an odd number of unescaped quotes is overkill for
        // this DSL's actual inputs, so we just require at least one space
        // before it (`gem "a#b"` has no such space).
        Some(idx) if line[..idx].matches('"').count() % 2 == 0 => &line[..idx],
        _ => line,
    }
}

fn call(input: &str) -> IResult<&str, Line> {
    alt((end_call, group_call, source_call, ruby_call, platforms_call, gem_call))(input)
}

fn end_call(input: &str) -> IResult<&str, Line> {
    let (rest_input, _) = terminated(tag("end"), eof)(input)?;
    Ok((rest_input, Line::BlockEnd))
}

fn source_call(input: &str) -> IResult<&str, Line> {
    let (rest_input, args) = method_args("source", input)?;
    let url = args.first().and_then(Value::as_str).unwrap_or_default().to_string();
    Ok((rest_input, Line::Source(url)))
}

fn ruby_call(input: &str) -> IResult<&str, Line> {
    let (rest_input, args) = method_args("ruby", input)?;
    let version = args.first().and_then(Value::as_str).unwrap_or_default().to_string();
    Ok((rest_input, Line::Ruby(version)))
}

fn platforms_call(input: &str) -> IResult<&str, Line> {
    let (rest_input, args) = method_args("platforms", input)?;
    let names = args.iter().filter_map(Value::as_sym).map(str::to_string).collect();
    Ok((rest_input, Line::Platforms(names)))
}

fn gem_call(input: &str) -> IResult<&str, Line> {
    let (rest_input, args) = method_args("gem", input)?;
    let mut args = args.into_iter();
    let name = args.next().and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default();
    Ok((rest_input, Line::Gem { name, args: args.collect() }))
}

fn group_call(input: &str) -> IResult<&str, Line> {
    let (after_group, _) = terminated(tag("group"), multispace1)(input)?;
    let (after_args, args) = arg_list(after_group)?;
    let (rest_input, _) = preceded(multispace0, terminated(opt(preceded(tag("do"), rest)), eof))(after_args)?;
    let names = args.iter().filter_map(Value::as_sym).map(str::to_string).collect();
    Ok((rest_input, Line::GroupStart(names)))
}

/// Parses `<name> <args...>`, tolerating both `name "a", "b"` and
/// `name("a", "b")` call styles.
fn method_args<'a>(name: &'static str, input: &'a str) -> IResult<&'a str, Vec<Value>> {
    let (after_name, _) = terminated(tag(name), alpha1_boundary)(input)?;
    let trimmed = after_name.trim_start();
    let (inner, parenthesized) = opt(nom::sequence::delimited(nom::character::complete::char('('), nom::bytes::complete::take_until(")"), nom::character::complete::char(')')))(trimmed)?;

    match parenthesized {
        Some(body) => {
            let (_, args) = terminated(arg_list, eof)(body)?;
            Ok((inner, args))
        }
        None => terminated(arg_list, eof)(trimmed),
    }
}

/// A method name must be followed by whitespace or `(`, not continue as
/// part of a longer identifier (so `group` doesn't match a future
/// `grouping` call).
fn alpha1_boundary(input: &str) -> IResult<&str, ()> {
    match input.chars().next() {
        Some(c) if c.is_whitespace() || c == '(' => Ok((input, ())),
        None => Ok((input, ())),
        _ => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_source_line() {
        assert_eq!(parse_line(1, r#"source "https://rubygems.org""#).unwrap(), Line::Source("https://rubygems.org".to_string()));
    }

    #[test]
    fn parses_a_simple_gem_line() {
        let line = parse_line(1, r#"gem "rack""#).unwrap();
        assert_eq!(line, Line::Gem { name: "rack".to_string(), args: vec![] });
    }

    #[test]
    fn parses_a_gem_line_with_requirement_and_options() {
        let line = parse_line(1, r#"gem "ffi", git: "https://github.com/ffi/ffi", branch: "main""#).unwrap();
        match line {
            Line::Gem { name, args } => {
                assert_eq!(name, "ffi");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected Gem, got {other:?}"),
        }
    }

    #[test]
    fn strips_trailing_comments() {
        assert_eq!(parse_line(1, r#"gem "rack" # pinned for X reasons"#).unwrap(), Line::Gem { name: "rack".to_string(), args: vec![] });
    }

    #[test]
    fn recognizes_group_start_and_end() {
        assert_eq!(parse_line(1, "group :test do").unwrap(), Line::GroupStart(vec!["test".to_string()]));
        assert_eq!(parse_line(2, "end").unwrap(), Line::BlockEnd);
    }

    #[test]
    fn blank_and_comment_only_lines_are_blank() {
        assert_eq!(parse_line(1, "").unwrap(), Line::Blank);
        assert_eq!(parse_line(1, "   # just a comment").unwrap(), Line::Blank);
    }
}
