//! # Frame-type conditions
//!
//! A profile describes each [`FrameType`](crate::frame_type::FrameType) by a small
//! conjunction of **literal** conditions on one exposure's canonical metadata, written in
//! a compact mini-syntax:
//!
//! | Rule                 | Meaning                                              |
//! |----------------------|------------------------------------------------------|
//! | `lamps=Off`          | `lamps` equals `Off`                                 |
//! | `lamps=Off\|None`    | `lamps` equals any of `Off`, `None`                  |
//! | `lamps!=W`           | `lamps` differs from `W`                             |
//! | `exptime<1`          | `exptime` parses as a number strictly below 1        |
//! | `exptime>1`          | `exptime` parses as a number strictly above 1        |
//! | `dispangle=4500\|<=1`| `\|dispangle - 4500\| <= 1`                          |
//!
//! Conditions always compare against the literal written in the rule. Comparisons
//! against another exposure (the anchor) live in [`match_criteria`](crate::match_criteria)
//! and use a separate type, so the two forms cannot be confused.
//!
//! ## Evaluation
//!
//! - Text equality trims whitespace on both sides; letter case follows the profile's
//!   [`CaseMode`]. When both sides parse as numbers they are compared numerically.
//! - A numeric comparison on a non-numeric value is **false** for that condition.
//! - A condition on a key the row does not carry is **false** and reported as missing.
//! - [`ConditionSet::Never`] (no rule registered) never matches; only an explicit
//!   [`ConditionSet::MatchAll`] matches every row.
pub(crate) mod parser;

use std::fmt;

use itertools::Itertools;

use crate::{
    calibkit_errors::CalibError,
    header_keys::{CanonicalKey, CanonicalRow, FieldValue},
};
use parser::{split_rule, RuleOperator};

/// Letter-case policy for text equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    Sensitive,
    Insensitive,
}

impl CaseMode {
    pub(crate) fn text_eq(self, lhs: &str, rhs: &str) -> bool {
        match self {
            CaseMode::Sensitive => lhs == rhs,
            CaseMode::Insensitive => lhs.eq_ignore_ascii_case(rhs),
        }
    }
}

/// Equality of a metadata value with a literal, numeric when both sides are numbers.
pub(crate) fn value_matches_literal(value: &FieldValue, literal: &str, case: CaseMode) -> bool {
    let literal = literal.trim();
    if let (Some(lhs), Ok(rhs)) = (value.as_number(), literal.parse::<f64>()) {
        return lhs == rhs;
    }
    value
        .as_text()
        .is_some_and(|text| case.text_eq(&text, literal))
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionOp {
    /// Equal to any of the alternatives
    Equals(Vec<String>),
    NotEquals(String),
    LessThan(f64),
    GreaterThan(f64),
    Within { target: f64, tolerance: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub key: CanonicalKey,
    pub op: ConditionOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOutcome {
    Pass,
    Fail,
    /// The row has no value for the condition's key
    Missing,
    /// A numeric comparison met a non-numeric value
    NotNumeric,
}

impl ConditionOutcome {
    pub fn passed(self) -> bool {
        self == ConditionOutcome::Pass
    }
}

fn malformed(rule: &str, reason: impl Into<String>) -> CalibError {
    CalibError::MalformedCondition {
        rule: rule.to_string(),
        reason: reason.into(),
    }
}

fn parse_literal_number(rule: &str, text: &str) -> Result<f64, CalibError> {
    text.trim()
        .parse()
        .map_err(|_| malformed(rule, format!("'{}' is not a number", text.trim())))
}

impl Condition {
    /// Parse one rule written in the condition mini-syntax.
    pub fn parse(rule: &str) -> Result<Self, CalibError> {
        let (_, (key, operator, operand)) =
            split_rule(rule).map_err(|_| malformed(rule, "expected <key><op><value>"))?;
        let key: CanonicalKey = key.parse()?;
        let operand = operand.trim();
        if operand.is_empty() {
            return Err(malformed(rule, "missing value"));
        }

        let op = match operator {
            RuleOperator::Equal => match operand.split_once("|<=") {
                Some((target, tolerance)) => {
                    let tolerance = parse_literal_number(rule, tolerance)?;
                    if tolerance < 0.0 {
                        return Err(malformed(rule, "negative tolerance"));
                    }
                    ConditionOp::Within {
                        target: parse_literal_number(rule, target)?,
                        tolerance,
                    }
                }
                None => {
                    let alternatives: Vec<String> =
                        operand.split('|').map(|alt| alt.trim().to_string()).collect();
                    if alternatives.iter().any(String::is_empty) {
                        return Err(malformed(rule, "empty alternative"));
                    }
                    ConditionOp::Equals(alternatives)
                }
            },
            RuleOperator::NotEqual => ConditionOp::NotEquals(operand.to_string()),
            RuleOperator::Less => ConditionOp::LessThan(parse_literal_number(rule, operand)?),
            RuleOperator::Greater => {
                ConditionOp::GreaterThan(parse_literal_number(rule, operand)?)
            }
            RuleOperator::Within => {
                return Err(malformed(
                    rule,
                    "a tolerance needs a reference value, write <key>=<value>|<=<tolerance>",
                ))
            }
        };

        Ok(Condition { key, op })
    }

    pub fn evaluate(&self, row: &CanonicalRow, case: CaseMode) -> ConditionOutcome {
        let value = row.get(self.key);
        if value.is_absent() {
            return ConditionOutcome::Missing;
        }

        let numeric = |check: &dyn Fn(f64) -> bool| match value.as_number() {
            Some(number) if check(number) => ConditionOutcome::Pass,
            Some(_) => ConditionOutcome::Fail,
            None => ConditionOutcome::NotNumeric,
        };

        match &self.op {
            ConditionOp::Equals(alternatives) => {
                if alternatives
                    .iter()
                    .any(|literal| value_matches_literal(value, literal, case))
                {
                    ConditionOutcome::Pass
                } else {
                    ConditionOutcome::Fail
                }
            }
            ConditionOp::NotEquals(literal) => {
                if value_matches_literal(value, literal, case) {
                    ConditionOutcome::Fail
                } else {
                    ConditionOutcome::Pass
                }
            }
            ConditionOp::LessThan(limit) => numeric(&|number: f64| number < *limit),
            ConditionOp::GreaterThan(limit) => numeric(&|number: f64| number > *limit),
            ConditionOp::Within { target, tolerance } => {
                numeric(&|number: f64| (number - target).abs() <= *tolerance)
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.op {
            ConditionOp::Equals(alternatives) => {
                write!(f, "{}={}", self.key, alternatives.iter().join("|"))
            }
            ConditionOp::NotEquals(literal) => write!(f, "{}!={literal}", self.key),
            ConditionOp::LessThan(limit) => write!(f, "{}<{limit}", self.key),
            ConditionOp::GreaterThan(limit) => write!(f, "{}>{limit}", self.key),
            ConditionOp::Within { target, tolerance } => {
                write!(f, "{}={target}|<={tolerance}", self.key)
            }
        }
    }
}

/// Rules registered for one frame type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConditionSet {
    /// No rule registered: never matches
    #[default]
    Never,
    /// Non-empty conjunction
    AllOf(Vec<Condition>),
    /// Explicit opt-in to match every row
    MatchAll,
}

/// Result of evaluating a [`ConditionSet`] against one row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetOutcome {
    pub matched: bool,
    /// Keys referenced by a condition but absent from the row
    pub missing: Vec<CanonicalKey>,
}

impl ConditionSet {
    /// Parse a conjunction. An empty list gives [`ConditionSet::Never`].
    pub fn parse_all<S: AsRef<str>>(rules: &[S]) -> Result<Self, CalibError> {
        if rules.is_empty() {
            return Ok(ConditionSet::Never);
        }
        rules
            .iter()
            .map(|rule| Condition::parse(rule.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(ConditionSet::AllOf)
    }

    /// Canonical keys the set reads.
    pub fn keys(&self) -> Vec<CanonicalKey> {
        match self {
            ConditionSet::AllOf(conditions) => conditions
                .iter()
                .map(|condition| condition.key)
                .unique()
                .collect(),
            ConditionSet::Never | ConditionSet::MatchAll => Vec::new(),
        }
    }

    /// Evaluate every condition of the conjunction, collecting missing keys along the way.
    pub fn evaluate(&self, row: &CanonicalRow, case: CaseMode) -> SetOutcome {
        match self {
            ConditionSet::Never => SetOutcome::default(),
            ConditionSet::MatchAll => SetOutcome {
                matched: true,
                missing: Vec::new(),
            },
            ConditionSet::AllOf(conditions) => {
                let mut outcome = SetOutcome {
                    matched: true,
                    missing: Vec::new(),
                };
                for condition in conditions {
                    match condition.evaluate(row, case) {
                        ConditionOutcome::Pass => {}
                        ConditionOutcome::Missing => {
                            outcome.matched = false;
                            outcome.missing.push(condition.key);
                        }
                        ConditionOutcome::Fail | ConditionOutcome::NotNumeric => {
                            outcome.matched = false
                        }
                    }
                }
                outcome
            }
        }
    }
}

#[cfg(test)]
mod conditions_test {
    use super::*;

    #[test]
    fn test_parse_conditions() {
        assert_eq!(
            Condition::parse("lamps=Off").unwrap(),
            Condition {
                key: CanonicalKey::Lamps,
                op: ConditionOp::Equals(vec!["Off".into()])
            }
        );
        assert_eq!(
            Condition::parse("lamps=CuNe+CuAr").unwrap().op,
            ConditionOp::Equals(vec!["CuNe+CuAr".into()])
        );
        assert_eq!(
            Condition::parse("lamps=Off|None").unwrap().op,
            ConditionOp::Equals(vec!["Off".into(), "None".into()])
        );
        assert_eq!(
            Condition::parse("exptime<1").unwrap().op,
            ConditionOp::LessThan(1.0)
        );
        assert_eq!(
            Condition::parse("exptime>99999999").unwrap().op,
            ConditionOp::GreaterThan(99999999.0)
        );
        assert_eq!(
            Condition::parse("dispangle=4500|<=1").unwrap().op,
            ConditionOp::Within {
                target: 4500.0,
                tolerance: 1.0
            }
        );
    }

    #[test]
    fn test_malformed_conditions() {
        assert!(matches!(
            Condition::parse("exptime<short"),
            Err(CalibError::MalformedCondition { .. })
        ));
        assert!(matches!(
            Condition::parse("lamps="),
            Err(CalibError::MalformedCondition { .. })
        ));
        assert!(matches!(
            Condition::parse("dispangle|<=1"),
            Err(CalibError::MalformedCondition { .. })
        ));
        assert!(matches!(
            Condition::parse("lamps Off"),
            Err(CalibError::MalformedCondition { .. })
        ));
        assert_eq!(
            Condition::parse("grating=R300B"),
            Err(CalibError::UnknownCanonicalKey("grating".into()))
        );
    }

    #[test]
    fn test_display_round_trip() {
        for rule in ["lamps=Off|W", "lamps!=W", "exptime<1", "exptime>120", "dispangle=4500|<=1"] {
            let condition = Condition::parse(rule).unwrap();
            assert_eq!(condition.to_string(), rule);
        }
    }

    #[test]
    fn test_evaluate_equality_and_case() {
        let row = CanonicalRow::new().with(CanonicalKey::Lamps, " off ");
        let condition = Condition::parse("lamps=Off").unwrap();

        assert_eq!(
            condition.evaluate(&row, CaseMode::Sensitive),
            ConditionOutcome::Fail
        );
        assert_eq!(
            condition.evaluate(&row, CaseMode::Insensitive),
            ConditionOutcome::Pass
        );

        let numeric_row = CanonicalRow::new().with(CanonicalKey::Exptime, 30.0);
        assert!(Condition::parse("exptime=30")
            .unwrap()
            .evaluate(&numeric_row, CaseMode::Sensitive)
            .passed());
    }

    #[test]
    fn test_evaluate_not_equals() {
        let not_arc = Condition::parse("lamps!=CuNe+CuAr").unwrap();
        assert_eq!(not_arc.op, ConditionOp::NotEquals("CuNe+CuAr".into()));

        let dark = CanonicalRow::new().with(CanonicalKey::Lamps, "Off");
        let arc = CanonicalRow::new().with(CanonicalKey::Lamps, " CuNe+CuAr ");
        let lower = CanonicalRow::new().with(CanonicalKey::Lamps, "cune+cuar");
        assert_eq!(not_arc.evaluate(&dark, CaseMode::Sensitive), ConditionOutcome::Pass);
        assert_eq!(not_arc.evaluate(&arc, CaseMode::Sensitive), ConditionOutcome::Fail);
        assert_eq!(not_arc.evaluate(&lower, CaseMode::Sensitive), ConditionOutcome::Pass);
        assert_eq!(not_arc.evaluate(&lower, CaseMode::Insensitive), ConditionOutcome::Fail);

        // absent is neither equal nor different
        assert_eq!(
            not_arc.evaluate(&CanonicalRow::new(), CaseMode::Sensitive),
            ConditionOutcome::Missing
        );

        let not_thirty = Condition::parse("exptime!=30").unwrap();
        let thirty = CanonicalRow::new().with(CanonicalKey::Exptime, "30.0");
        let sixty = CanonicalRow::new().with(CanonicalKey::Exptime, 60.0);
        assert_eq!(not_thirty.evaluate(&thirty, CaseMode::Sensitive), ConditionOutcome::Fail);
        assert_eq!(not_thirty.evaluate(&sixty, CaseMode::Sensitive), ConditionOutcome::Pass);

        let set = ConditionSet::parse_all(&["lamps!=W", "exptime>1"]).unwrap();
        let science = dark.clone().with(CanonicalKey::Exptime, 30.0);
        let flat = science.clone().with(CanonicalKey::Lamps, "W");
        assert!(set.evaluate(&science, CaseMode::Sensitive).matched);
        assert!(!set.evaluate(&flat, CaseMode::Sensitive).matched);
    }

    #[test]
    fn test_evaluate_numeric() {
        let row = CanonicalRow::new()
            .with(CanonicalKey::Exptime, 0.5)
            .with(CanonicalKey::Lamps, "Off");

        let below = Condition::parse("exptime<1").unwrap();
        let above = Condition::parse("exptime>1").unwrap();
        assert_eq!(below.evaluate(&row, CaseMode::Sensitive), ConditionOutcome::Pass);
        assert_eq!(above.evaluate(&row, CaseMode::Sensitive), ConditionOutcome::Fail);

        // comparing text numerically excludes the condition instead of failing the call
        let on_text = Condition::parse("lamps<1").unwrap();
        assert_eq!(
            on_text.evaluate(&row, CaseMode::Sensitive),
            ConditionOutcome::NotNumeric
        );

        let missing = Condition::parse("airmass<2").unwrap();
        assert_eq!(
            missing.evaluate(&row, CaseMode::Sensitive),
            ConditionOutcome::Missing
        );

        let near = Condition::parse("exptime=0.6|<=0.1").unwrap();
        assert!(near.evaluate(&row, CaseMode::Sensitive).passed());
    }

    #[test]
    fn test_condition_sets() {
        let row = CanonicalRow::new()
            .with(CanonicalKey::Lamps, "Off")
            .with(CanonicalKey::Exptime, 30.0);

        assert_eq!(ConditionSet::parse_all::<&str>(&[]).unwrap(), ConditionSet::Never);
        assert!(!ConditionSet::Never.evaluate(&row, CaseMode::Sensitive).matched);
        assert!(ConditionSet::MatchAll.evaluate(&row, CaseMode::Sensitive).matched);

        let science = ConditionSet::parse_all(&["lamps=Off", "exptime>1"]).unwrap();
        assert!(science.evaluate(&row, CaseMode::Sensitive).matched);
        assert_eq!(science.keys(), vec![CanonicalKey::Lamps, CanonicalKey::Exptime]);

        let with_missing = ConditionSet::parse_all(&["lamps=Off", "airmass<2"]).unwrap();
        let outcome = with_missing.evaluate(&row, CaseMode::Sensitive);
        assert!(!outcome.matched);
        assert_eq!(outcome.missing, vec![CanonicalKey::Airmass]);
    }
}
