//! A tokenizer for the small slice of Ruby literal syntax a `Gemfile`
//! actually uses: quoted strings, `:symbols`, `true`/`false`, `[arrays]`
//! of the above, and `key: value` pairs. Small combinators composed with
//! `alt`/`delimited`/`separated_list0` rather than a generated grammar,
//! the same nom style the teacher's recipe-script parser used.

use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag};
use nom::character::complete::{alpha1, alphanumeric1, char, multispace0};
use nom::combinator::{map, opt, recognize, value as nom_value};
use nom::multi::{many0_count, separated_list0};
use nom::sequence::{delimited, pair, preceded, separated_pair};
use nom::IResult;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Sym(String),
    Bool(bool),
    Array(Vec<Value>),
    Pair(String, Box<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sym(&self) -> Option<&str> {
        match self {
            Value::Sym(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(alt((alpha1, tag("_"))), many0_count(alt((alphanumeric1, tag("_"))))))(input)
}

fn string_lit(input: &str) -> IResult<&str, Value> {
    let double = delimited(char('"'), opt(escaped_transform(is_not("\"\\"), '\\', alt((nom_value("\"", char('"')), nom_value("\\", char('\\')))))), char('"'));
    let single = delimited(char('\''), opt(recognize(many0_count(is_not("'")))), char('\''));

    alt((map(double, |s: Option<String>| Value::Str(s.unwrap_or_default())), map(single, |s: Option<&str>| Value::Str(s.unwrap_or_default().to_string()))))(input)
}

fn symbol_lit(input: &str) -> IResult<&str, Value> {
    map(preceded(char(':'), identifier), |s: &str| Value::Sym(s.to_string()))(input)
}

fn bool_lit(input: &str) -> IResult<&str, Value> {
    alt((nom_value(Value::Bool(true), tag("true")), nom_value(Value::Bool(false), tag("false"))))(input)
}

fn array_lit(input: &str) -> IResult<&str, Value> {
    map(
        delimited(char('['), separated_list0(delimited(multispace0, char(','), multispace0), value), preceded(multispace0, char(']'))),
        Value::Array,
    )(input)
}

fn key_value(input: &str) -> IResult<&str, Value> {
    map(separated_pair(identifier, pair(char(':'), multispace0), value), |(k, v)| Value::Pair(k.to_string(), Box::new(v)))(input)
}

/// One positional or keyword argument value: `key_value` must be tried
/// before the bare literals so `group:` isn't parsed as the identifier
/// `group` followed by a dangling colon.
pub fn arg(input: &str) -> IResult<&str, Value> {
    alt((key_value, value))(input)
}

fn value(input: &str) -> IResult<&str, Value> {
    alt((string_lit, symbol_lit, bool_lit, array_lit))(input)
}

/// A comma-separated argument list, e.g. the tail of `gem "rack", "~> 2.2", require: false`.
pub fn arg_list(input: &str) -> IResult<&str, Vec<Value>> {
    separated_list0(delimited(multispace0, char(','), multispace0), arg)(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_double_quoted_string() {
        assert_eq!(string_lit(r#""rack""#).unwrap().1, Value::Str("rack".to_string()));
    }

    #[test]
    fn parses_a_symbol() {
        assert_eq!(symbol_lit(":test").unwrap().1, Value::Sym("test".to_string()));
    }

    #[test]
    fn parses_an_array_of_symbols() {
        let (_, v) = array_lit("[:test, :development]").unwrap();
        let items = v.as_array().unwrap();
        assert_eq!(items[0].as_sym(), Some("test"));
        assert_eq!(items[1].as_sym(), Some("development"));
    }

    #[test]
    fn parses_a_key_value_pair() {
        let (_, v) = arg(r#"branch: "main""#).unwrap();
        match v {
            Value::Pair(k, boxed) => {
                assert_eq!(k, "branch");
                assert_eq!(boxed.as_str(), Some("main"));
            }
            other => panic!("expected a pair, got {other:?}"),
        }
    }

    #[test]
    fn parses_a_full_argument_list() {
        let (_, args) = arg_list(r#""rack", "~> 2.2", require: false"#).unwrap();
        assert_eq!(args.len(), 3);
        assert_eq!(args[0].as_str(), Some("rack"));
        assert_eq!(args[1].as_str(), Some("~> 2.2"));
    }
}
