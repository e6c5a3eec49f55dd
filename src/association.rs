//! # Calibration association
//!
//! Pair every anchor exposure (by default science and standard frames) with the
//! calibration exposures that may reduce it. A row is a candidate calibration of type `T`
//! for an anchor when
//!
//! 1. its classification contains `T`,
//! 2. the profile defines a match rule for `T`,
//! 3. the rule is satisfied comparing the row against the anchor's own values.
//!
//! Frame types without a match rule are never associated. The result only lists
//! candidates: choosing among several, or deciding what to do when a required type has
//! none, belongs to the caller. [`check_calibrations`] reports the gaps.
use std::collections::BTreeMap;

use itertools::Itertools;
use rayon::prelude::*;

use crate::{
    classify::Classification, frame_type::FrameType, header_keys::CanonicalRow,
    spectrographs::InstrumentProfile,
};

/// Candidate calibrations of one anchor row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CalibrationSet {
    /// Index of the anchor in the metadata table
    pub anchor: usize,
    /// Candidate row indices per calibration frame type, in table order
    pub frames: BTreeMap<FrameType, Vec<usize>>,
}

impl CalibrationSet {
    pub fn candidates(&self, frame_type: FrameType) -> &[usize] {
        self.frames
            .get(&frame_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Required frame types with no candidate.
    pub fn missing(&self, required: &[FrameType]) -> Vec<FrameType> {
        required
            .iter()
            .copied()
            .filter(|frame_type| self.candidates(*frame_type).is_empty())
            .unique()
            .collect()
    }
}

/// List, for each anchor row, the rows associated with it per calibration frame type.
///
/// Arguments
/// -----------------
/// * `profile`: the instrument profile providing the match criteria.
/// * `rows`: canonical metadata table.
/// * `classifications`: output of [`classify_table`](crate::classify::classify_table) on `rows`.
/// * `anchor_types`: frame types acting as anchors.
///
/// Return
/// ----------
/// * One [`CalibrationSet`] per anchor row, in table order. `rows` and
///   `classifications` are zipped, extra entries on either side are ignored.
pub fn associate(
    profile: &InstrumentProfile,
    rows: &[CanonicalRow],
    classifications: &[Classification],
    anchor_types: &[FrameType],
) -> Vec<CalibrationSet> {
    let case = profile.case_mode();
    let rules = FrameType::ALL
        .into_iter()
        .filter_map(|frame_type| {
            profile
                .match_criteria()
                .rule_for(frame_type)
                .map(|rule| (frame_type, rule))
        })
        .collect_vec();

    let table = rows.iter().zip(classifications).collect_vec();

    table
        .par_iter()
        .enumerate()
        .filter(|(_, (_, classification))| {
            anchor_types
                .iter()
                .any(|anchor_type| classification.contains(*anchor_type))
        })
        .map(|(anchor, (anchor_row, _))| {
            let mut set = CalibrationSet {
                anchor,
                frames: BTreeMap::new(),
            };
            for (frame_type, rule) in &rules {
                let candidates = table
                    .iter()
                    .enumerate()
                    .filter(|(index, (row, classification))| {
                        *index != anchor
                            && classification.contains(*frame_type)
                            && rule.is_satisfied_by(anchor_row, row, case)
                    })
                    .map(|(index, _)| index)
                    .collect_vec();
                if !candidates.is_empty() {
                    set.frames.insert(*frame_type, candidates);
                }
            }
            set
        })
        .collect()
}

/// Anchors lacking at least one required calibration type, with the missing types.
pub fn check_calibrations(
    profile: &InstrumentProfile,
    sets: &[CalibrationSet],
    required: &[FrameType],
) -> BTreeMap<usize, Vec<FrameType>> {
    sets.iter()
        .filter_map(|set| {
            let missing = set.missing(required);
            if missing.is_empty() {
                return None;
            }
            log::warn!(
                "{}: anchor row {} has no {} frame",
                profile.id(),
                set.anchor,
                missing.iter().join(" / ")
            );
            Some((set.anchor, missing))
        })
        .collect()
}

#[cfg(test)]
mod association_test {
    use super::*;
    use crate::{
        classify::classify_table, constants::DEFAULT_REQUIRED_CALIBRATIONS,
        constants::DEFAULT_ANCHOR_TYPES, header_keys::CanonicalKey, spectrographs::load_profile,
    };

    fn exposure(lamps: &str, exptime: f64, dispangle: f64, naxis0: i64) -> CanonicalRow {
        CanonicalRow::new()
            .with(CanonicalKey::Lamps, lamps)
            .with(CanonicalKey::Exptime, exptime)
            .with(CanonicalKey::Decker, "1.0 arcsec")
            .with(CanonicalKey::Dispangle, dispangle)
            .with(CanonicalKey::Naxis0, naxis0)
            .with(CanonicalKey::Naxis1, 1100_i64)
    }

    #[test]
    fn test_associate_science_with_calibrations() {
        let profile = load_profile("wht_isis_blue").unwrap();
        let rows = vec![
            exposure("Off", 600., 4500., 4200),       // 0 science
            exposure("Off", 0., 4500., 4200),         // 1 bias
            exposure("CuNe+CuAr", 30., 4500.5, 4200), // 2 arc
            exposure("CuNe+CuAr", 30., 4800., 4200),  // 3 arc, other setup
            exposure("Off", 0., 4500., 2100),         // 4 bias, binned
        ];
        let classifications = classify_table(&profile, &rows);
        let sets = associate(&profile, &rows, &classifications, &DEFAULT_ANCHOR_TYPES);

        assert_eq!(sets.len(), 1);
        let set = &sets[0];
        assert_eq!(set.anchor, 0);
        assert_eq!(set.candidates(FrameType::Bias), &[1]);
        assert_eq!(set.candidates(FrameType::Arc), &[2]);
        assert!(set.candidates(FrameType::PixelFlat).is_empty());

        assert_eq!(
            set.missing(&DEFAULT_REQUIRED_CALIBRATIONS),
            vec![FrameType::Trace, FrameType::PixelFlat]
        );

        let report = check_calibrations(&profile, &sets, &DEFAULT_REQUIRED_CALIBRATIONS);
        assert_eq!(
            report.get(&0),
            Some(&vec![FrameType::Trace, FrameType::PixelFlat])
        );
        assert!(check_calibrations(&profile, &sets, &[FrameType::Bias]).is_empty());
    }

    #[test]
    fn test_no_anchor_no_set() {
        let profile = load_profile("wht_isis_blue").unwrap();
        let rows = vec![exposure("Off", 0., 4500., 4200)];
        let classifications = classify_table(&profile, &rows);
        assert!(associate(&profile, &rows, &classifications, &DEFAULT_ANCHOR_TYPES).is_empty());
    }
}
