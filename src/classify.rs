//! # Frame classification
//!
//! Assign candidate [`FrameType`]s to exposures by evaluating every condition set of an
//! [`InstrumentProfile`] against their canonical metadata.
//!
//! A row may satisfy zero, one or several frame types. The engine never picks one for
//! the caller: [`Classification`] carries the full match set, and
//! [`Classification::single`] is the explicit place where an ambiguous or empty result
//! becomes a [`CalibError::ClassificationAmbiguity`].
//!
//! Classification is a pure function of `(profile, row)`. [`classify_table`] evaluates a
//! whole table in parallel with `rayon`, sharing the profile read-only; the output keeps
//! the row order.
use std::collections::BTreeSet;

use itertools::Itertools;
use rayon::prelude::*;

use crate::{
    calibkit_errors::CalibError,
    frame_type::FrameType,
    header_keys::{CanonicalKey, CanonicalRow},
    spectrographs::InstrumentProfile,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    /// Every frame type whose conditions hold for the row
    pub frame_types: BTreeSet<FrameType>,
    /// Keys read by a condition but absent from the row
    pub missing_fields: BTreeSet<CanonicalKey>,
}

impl Classification {
    pub fn is_ambiguous(&self) -> bool {
        self.frame_types.len() > 1
    }

    pub fn is_unclassified(&self) -> bool {
        self.frame_types.is_empty()
    }

    pub fn contains(&self, frame_type: FrameType) -> bool {
        self.frame_types.contains(&frame_type)
    }

    /// The frame type of the row, when exactly one matched.
    pub fn single(&self) -> Result<FrameType, CalibError> {
        match self.frame_types.iter().exactly_one() {
            Ok(frame_type) => Ok(*frame_type),
            Err(_) => Err(CalibError::ClassificationAmbiguity {
                candidates: self.frame_types.iter().copied().collect(),
            }),
        }
    }
}

/// Classify one canonical row against `profile`.
pub fn classify(profile: &InstrumentProfile, row: &CanonicalRow) -> Classification {
    let case = profile.case_mode();
    let mut classification = Classification::default();

    for frame_type in FrameType::ALL {
        let outcome = profile.conditions(frame_type).evaluate(row, case);
        if outcome.matched {
            classification.frame_types.insert(frame_type);
        }
        classification.missing_fields.extend(outcome.missing);
    }

    log::debug!(
        "{}: row classified as {{{}}}",
        profile.id(),
        classification.frame_types.iter().join(", ")
    );
    if !classification.missing_fields.is_empty() {
        log::debug!(
            "{}: conditions on absent fields [{}] evaluated false",
            profile.id(),
            classification.missing_fields.iter().join(", ")
        );
    }
    if classification.is_ambiguous() {
        log::warn!(
            "{}: row matches several frame types {{{}}}",
            profile.id(),
            classification.frame_types.iter().join(", ")
        );
    } else if classification.is_unclassified() {
        log::warn!("{}: row matches no frame type", profile.id());
    }

    classification
}

/// Classify every row of a metadata table, in parallel. Output order follows `rows`.
pub fn classify_table(profile: &InstrumentProfile, rows: &[CanonicalRow]) -> Vec<Classification> {
    rows.par_iter().map(|row| classify(profile, row)).collect()
}
