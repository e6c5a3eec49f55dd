//! # Match criteria
//!
//! Calibration exposures are associated with an **anchor** exposure (a science or standard
//! frame) when they agree with it on a set of canonical keys. This module describes, per
//! frame type, which keys must agree and how.
//!
//! ## Rule syntax
//!
//! Every operand is **relative to the anchor's own value** for the same key:
//!
//! | Raw rule | [`MatchSpec`]          | Holds when                               |
//! |----------|------------------------|------------------------------------------|
//! | `''`     | [`MatchSpec::Exact`]   | candidate value equals anchor value      |
//! | `=n`     | [`MatchSpec::Offset`]  | `candidate - anchor == n` (`=0`: equal)  |
//! | `\|<=n`  | [`MatchSpec::Within`]  | `\|candidate - anchor\| <= n`            |
//! | `<n`     | [`MatchSpec::Below`]   | `candidate - anchor < n`                 |
//! | `>n`     | [`MatchSpec::Above`]   | `candidate - anchor > n`                 |
//!
//! `naxis0: '=0'` therefore reads "same `naxis0` as the anchor", never "`naxis0` is 0".
//! Literal comparisons belong to [`conditions`](crate::conditions).
//!
//! ## Derived frame types
//!
//! Frame types that calibrate the same configuration as another one (pixel flats, trace
//! flats and arcs follow the standard star) are declared with
//! [`MatchCriteriaBuilder::derive`]. A derived entry holds the **same** `Arc<MatchRule>` as
//! its base, so editing the base rule changes every derived type that does not carry an
//! explicit [`MatchOverride`].
use std::{borrow::Cow, collections::BTreeMap, fmt, sync::Arc};

use crate::{
    calibkit_errors::CalibError,
    conditions::{
        parser::{parse_relative, RuleOperator},
        value_matches_literal, CaseMode,
    },
    frame_type::FrameType,
    header_keys::{CanonicalKey, CanonicalRow, FieldValue},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchSpec {
    Exact,
    Offset(f64),
    Within(f64),
    Below(f64),
    Above(f64),
}

impl MatchSpec {
    pub fn parse(key: &str, rule: &str) -> Result<Self, CalibError> {
        let malformed = |reason: &str| CalibError::MalformedMatchRule {
            key: key.to_string(),
            rule: rule.to_string(),
            reason: reason.to_string(),
        };

        let (_, parsed) = parse_relative(rule)
            .map_err(|_| malformed("expected '', '=n', '|<=n', '<n' or '>n'"))?;

        match parsed {
            None => Ok(MatchSpec::Exact),
            Some((RuleOperator::Equal, offset)) => Ok(MatchSpec::Offset(offset)),
            Some((RuleOperator::Within, tolerance)) if tolerance >= 0.0 => {
                Ok(MatchSpec::Within(tolerance))
            }
            Some((RuleOperator::Within, _)) => Err(malformed("negative tolerance")),
            Some((RuleOperator::Less, bound)) => Ok(MatchSpec::Below(bound)),
            Some((RuleOperator::Greater, bound)) => Ok(MatchSpec::Above(bound)),
            Some((RuleOperator::NotEqual, _)) => Err(malformed("'!=' is not a match operator")),
        }
    }

    /// Compare a candidate value with the anchor's value for the same key.
    pub fn is_satisfied(&self, anchor: &FieldValue, candidate: &FieldValue, case: CaseMode) -> bool {
        if anchor.is_absent() || candidate.is_absent() {
            return false;
        }
        if *self == MatchSpec::Exact {
            return match (anchor.as_number(), candidate.as_number()) {
                (Some(lhs), Some(rhs)) => lhs == rhs,
                _ => anchor
                    .as_text()
                    .is_some_and(|text| value_matches_literal(candidate, &text, case)),
            };
        }

        let diff = || Some(candidate.as_number()? - anchor.as_number()?);
        match self {
            MatchSpec::Exact => false,
            MatchSpec::Offset(offset) => diff().is_some_and(|diff| diff == *offset),
            MatchSpec::Within(tolerance) => diff().is_some_and(|diff| diff.abs() <= *tolerance),
            MatchSpec::Below(bound) => diff().is_some_and(|diff| diff < *bound),
            MatchSpec::Above(bound) => diff().is_some_and(|diff| diff > *bound),
        }
    }
}

impl fmt::Display for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchSpec::Exact => Ok(()),
            MatchSpec::Offset(offset) => write!(f, "={offset}"),
            MatchSpec::Within(tolerance) => write!(f, "|<={tolerance}"),
            MatchSpec::Below(bound) => write!(f, "<{bound}"),
            MatchSpec::Above(bound) => write!(f, ">{bound}"),
        }
    }
}

/// Keys a candidate must share with its anchor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchRule {
    specs: BTreeMap<CanonicalKey, MatchSpec>,
}

impl MatchRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: CanonicalKey, spec: MatchSpec) -> Self {
        self.specs.insert(key, spec);
        self
    }

    /// Build a rule from `(key, raw rule)` pairs, e.g. `[("naxis0", "=0"), ("decker", "")]`.
    pub fn parse(entries: &[(&str, &str)]) -> Result<Self, CalibError> {
        entries
            .iter()
            .map(|(key, rule)| -> Result<(CanonicalKey, MatchSpec), CalibError> {
                Ok((key.parse()?, MatchSpec::parse(key, rule)?))
            })
            .collect::<Result<BTreeMap<_, _>, CalibError>>()
            .map(|specs| MatchRule { specs })
    }

    pub fn get(&self, key: CanonicalKey) -> Option<&MatchSpec> {
        self.specs.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalKey, &MatchSpec)> {
        self.specs.iter().map(|(key, spec)| (*key, spec))
    }

    pub fn keys(&self) -> impl Iterator<Item = CanonicalKey> + '_ {
        self.specs.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// True when `candidate` agrees with `anchor` on every key of the rule.
    pub fn is_satisfied_by(
        &self,
        anchor: &CanonicalRow,
        candidate: &CanonicalRow,
        case: CaseMode,
    ) -> bool {
        self.specs
            .iter()
            .all(|(key, spec)| spec.is_satisfied(anchor.get(*key), candidate.get(*key), case))
    }

    fn apply(&mut self, overrides: &[MatchOverride]) {
        for entry in overrides {
            match entry.spec {
                Some(spec) => self.specs.insert(entry.key, spec),
                None => self.specs.remove(&entry.key),
            };
        }
    }
}

/// Explicit, documented deviation of a derived frame type from its base rule.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOverride {
    pub key: CanonicalKey,
    /// `None` lifts the constraint on `key`
    pub spec: Option<MatchSpec>,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum FrameMatch {
    /// Not associated with anchors (e.g. the anchors themselves)
    #[default]
    Unconstrained,
    Rule(Arc<MatchRule>),
    Derived {
        from: FrameType,
        base: Arc<MatchRule>,
        overrides: Vec<MatchOverride>,
    },
}

impl FrameMatch {
    /// The rule a grouping component applies for this frame type.
    pub fn effective(&self) -> Option<Cow<'_, MatchRule>> {
        match self {
            FrameMatch::Unconstrained => None,
            FrameMatch::Rule(rule) => Some(Cow::Borrowed(rule.as_ref())),
            FrameMatch::Derived {
                base, overrides, ..
            } if overrides.is_empty() => Some(Cow::Borrowed(base.as_ref())),
            FrameMatch::Derived {
                base, overrides, ..
            } => {
                let mut rule = MatchRule::clone(base);
                rule.apply(overrides);
                Some(Cow::Owned(rule))
            }
        }
    }

    /// Shared rule object backing this entry.
    pub fn shared_rule(&self) -> Option<&Arc<MatchRule>> {
        match self {
            FrameMatch::Unconstrained => None,
            FrameMatch::Rule(rule) => Some(rule),
            FrameMatch::Derived { base, .. } => Some(base),
        }
    }
}

static UNCONSTRAINED: FrameMatch = FrameMatch::Unconstrained;

/// Match rules for every frame type of a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCriteria {
    entries: BTreeMap<FrameType, FrameMatch>,
}

impl MatchCriteria {
    pub fn builder() -> MatchCriteriaBuilder {
        MatchCriteriaBuilder::default()
    }

    pub fn entry(&self, frame_type: FrameType) -> &FrameMatch {
        // build() fills every frame type
        self.entries.get(&frame_type).unwrap_or(&UNCONSTRAINED)
    }

    pub fn rule_for(&self, frame_type: FrameType) -> Option<Cow<'_, MatchRule>> {
        self.entry(frame_type).effective()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrameType, &FrameMatch)> {
        self.entries.iter().map(|(ftype, entry)| (*ftype, entry))
    }

    /// Every canonical key read by any effective rule.
    pub fn keys(&self) -> Vec<CanonicalKey> {
        let mut keys: Vec<CanonicalKey> = FrameType::ALL
            .into_iter()
            .filter_map(|ftype| self.rule_for(ftype))
            .flat_map(|rule| rule.keys().collect::<Vec<_>>())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchCriteriaBuilder {
    rules: BTreeMap<FrameType, Arc<MatchRule>>,
    derived: BTreeMap<FrameType, (FrameType, Vec<MatchOverride>)>,
}

impl MatchCriteriaBuilder {
    pub fn rule(mut self, frame_type: FrameType, rule: MatchRule) -> Self {
        self.rules.insert(frame_type, Arc::new(rule));
        self
    }

    /// `frame_type` shares the rule of `from` as is.
    pub fn derive(self, frame_type: FrameType, from: FrameType) -> Self {
        self.derive_with(frame_type, from, Vec::new())
    }

    /// `frame_type` shares the rule of `from`, with explicit overrides.
    pub fn derive_with(
        mut self,
        frame_type: FrameType,
        from: FrameType,
        overrides: Vec<MatchOverride>,
    ) -> Self {
        self.derived.insert(frame_type, (from, overrides));
        self
    }

    pub fn build(self) -> Result<MatchCriteria, CalibError> {
        let mut entries: BTreeMap<FrameType, FrameMatch> = FrameType::ALL
            .into_iter()
            .map(|ftype| (ftype, FrameMatch::Unconstrained))
            .collect();

        for (ftype, rule) in &self.rules {
            entries.insert(*ftype, FrameMatch::Rule(Arc::clone(rule)));
        }

        for (ftype, (from, overrides)) in self.derived {
            if self.rules.contains_key(&ftype) {
                return Err(CalibError::InvalidProfile(format!(
                    "frame type '{ftype}' has both its own match rule and a derived one"
                )));
            }
            let base = self.rules.get(&from).ok_or_else(|| {
                CalibError::InvalidProfile(format!(
                    "frame type '{ftype}' derives its match rule from '{from}', which has no rule of its own"
                ))
            })?;
            entries.insert(
                ftype,
                FrameMatch::Derived {
                    from,
                    base: Arc::clone(base),
                    overrides,
                },
            );
        }

        Ok(MatchCriteria { entries })
    }
}
