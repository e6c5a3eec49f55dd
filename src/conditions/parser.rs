//! nom grammar shared by condition rules and match rules.
//!
//! ```text
//! rule     := key operator value
//! key      := [A-Za-z0-9_]+
//! operator := "!=" | "|<=" | "=" | "<" | ">"
//! ```
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::multispace0,
    combinator::{all_consuming, opt, rest, value},
    number::complete::double,
    sequence::{preceded, terminated},
    IResult, Parser,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RuleOperator {
    Equal,
    NotEqual,
    Less,
    Greater,
    /// `|<=`: absolute difference bounded by the operand
    Within,
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn parse_key(input: &str) -> IResult<&str, &str> {
    preceded(multispace0, take_while1(is_key_char)).parse(input)
}

pub(crate) fn parse_operator(input: &str) -> IResult<&str, RuleOperator> {
    preceded(
        multispace0,
        alt((
            value(RuleOperator::NotEqual, tag("!=")),
            value(RuleOperator::Within, tag("|<=")),
            value(RuleOperator::Equal, tag("=")),
            value(RuleOperator::Less, tag("<")),
            value(RuleOperator::Greater, tag(">")),
        )),
    )
    .parse(input)
}

/// Split `"<key><op><value>"` into its three parts; the value is returned untrimmed.
pub(crate) fn split_rule(input: &str) -> IResult<&str, (&str, RuleOperator, &str)> {
    (parse_key, parse_operator, rest).parse(input)
}

/// Parse an anchor-relative operand such as `=0`, `|<=1` or `<2.5`.
///
/// An empty operand means exact equality and is returned as `None`.
pub(crate) fn parse_relative(input: &str) -> IResult<&str, Option<(RuleOperator, f64)>> {
    all_consuming(terminated(
        opt((parse_operator, preceded(multispace0, double))),
        multispace0,
    ))
    .parse(input)
}
