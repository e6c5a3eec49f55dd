//! # CalibKit: run-level façade
//!
//! [`CalibKit`] wires a validated [`InstrumentProfile`] to the run settings of a
//! [`ReductionConfig`] and exposes the whole engine through one handle:
//!
//! 1. **Header resolution**: raw header blocks → canonical rows,
//! 2. **Classification**: canonical rows → candidate frame types (batch version in parallel),
//! 3. **Association**: anchors ↔ calibration candidates through the profile's match rules,
//! 4. **Arc resolution**: arc rows → wavelength-solution seeds.
//!
//! The handle is immutable once built and can be shared across threads.
//!
//! ## Typical usage
//!
//! ```rust
//! use calibkit::calibkit::CalibKit;
//! use calibkit::header_keys::{CanonicalKey, CanonicalRow};
//! use calibkit::frame_type::FrameType;
//!
//! let kit = CalibKit::new("wht_isis_blue").unwrap();
//!
//! let row = CanonicalRow::new()
//!     .with(CanonicalKey::Lamps, "Off")
//!     .with(CanonicalKey::Exptime, 30.0);
//! assert_eq!(kit.classify(&row).single().unwrap(), FrameType::Science);
//!
//! let arc = CanonicalRow::new()
//!     .with(CanonicalKey::Dispname, "R300B")
//!     .with(CanonicalKey::Dichroic, "5300")
//!     .with(CanonicalKey::Naxis0, 4000_i64)
//!     .with(CanonicalKey::Naxis1, 1000_i64);
//! let params = kit.resolve_arc(&arc).unwrap();
//! assert_eq!(params.wave_max, 6000.0);
//! ```
//!
//! ## Errors
//!
//! Construction fails with a configuration error for an unknown profile id or detector
//! index. [`CalibKit::resolve_arc`] fails when the arc row lacks one of the fields the
//! decision table is keyed on, holds a value of the wrong type (a numeric disperser or
//! dichroic, a non-numeric or non-integral frame dimension), or names an unsupported
//! disperser or dichroic.
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    arc_params::{ArcFrameShape, ArcParameters},
    association::{associate, check_calibrations, CalibrationSet},
    calibkit_errors::CalibError,
    classify::{classify, classify_table, Classification},
    config::ReductionConfig,
    constants::DEFAULT_ANCHOR_TYPES,
    detector::Detector,
    frame_type::FrameType,
    header_keys::{CanonicalKey, CanonicalRow, FieldValue, RawHeaders},
    match_criteria::MatchCriteria,
    spectrographs::InstrumentProfile,
};

#[derive(Debug, Clone)]
pub struct CalibKit {
    profile: Arc<InstrumentProfile>,
    detector: Detector,
    arc_defaults: ArcParameters,
    required_calibrations: Vec<FrameType>,
}

impl CalibKit {
    /// Build a handle over a builtin profile with default run settings.
    pub fn new(profile_id: &str) -> Result<Self, CalibError> {
        Self::from_config(&ReductionConfig::new(profile_id))
    }

    /// Build a handle from a configuration, resolving its profile in the builtin registry.
    pub fn from_config(config: &ReductionConfig) -> Result<Self, CalibError> {
        let profile = config.load()?;
        Self::with_profile(profile, config)
    }

    /// Build a handle over an already resolved profile (e.g. from a custom registry).
    pub fn with_profile(
        profile: Arc<InstrumentProfile>,
        config: &ReductionConfig,
    ) -> Result<Self, CalibError> {
        let detector = profile.detector(config.detector)?.clone();
        let arc_defaults = config.arc_defaults_for(&profile);
        Ok(CalibKit {
            detector,
            arc_defaults,
            required_calibrations: config.required_calibrations(),
            profile,
        })
    }

    pub fn profile(&self) -> &InstrumentProfile {
        &self.profile
    }

    /// The detector selected for this run.
    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn arc_defaults(&self) -> &ArcParameters {
        &self.arc_defaults
    }

    pub fn required_calibrations(&self) -> &[FrameType] {
        &self.required_calibrations
    }

    pub fn match_criteria(&self) -> &MatchCriteria {
        self.profile.match_criteria()
    }

    pub fn canonical_row(&self, raw: &RawHeaders) -> CanonicalRow {
        self.profile.canonical_row(raw)
    }

    pub fn classify(&self, row: &CanonicalRow) -> Classification {
        classify(&self.profile, row)
    }

    /// Resolve raw headers, then classify the resulting row.
    pub fn classify_headers(&self, raw: &RawHeaders) -> Classification {
        self.classify(&self.canonical_row(raw))
    }

    pub fn classify_table(&self, rows: &[CanonicalRow]) -> Vec<Classification> {
        classify_table(&self.profile, rows)
    }

    /// Associate science and standard rows with their calibration candidates.
    pub fn associate(
        &self,
        rows: &[CanonicalRow],
        classifications: &[Classification],
    ) -> Vec<CalibrationSet> {
        associate(&self.profile, rows, classifications, &DEFAULT_ANCHOR_TYPES)
    }

    /// Anchors lacking one of the required calibration types.
    pub fn check_calibrations(&self, sets: &[CalibrationSet]) -> BTreeMap<usize, Vec<FrameType>> {
        check_calibrations(&self.profile, sets, &self.required_calibrations)
    }

    /// Derive wavelength-solution seeds for one arc frame.
    ///
    /// Arguments
    /// -----------------
    /// * `arc_row`: canonical row of the arc frame; `dispname`, `dichroic`, `naxis0`
    ///   and `naxis1` are read.
    ///
    /// Return
    /// ----------
    /// * A new [`ArcParameters`] seeded from this handle's defaults.
    pub fn resolve_arc(&self, arc_row: &CanonicalRow) -> Result<ArcParameters, CalibError> {
        let profile = self.profile.id();
        let missing = |key: CanonicalKey| CalibError::MissingArcField {
            profile: profile.to_string(),
            key: key.to_string(),
        };
        let malformed = |key: CanonicalKey, value: &str| CalibError::MalformedArcField {
            profile: profile.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        };
        // decision-table keys are matched on their written form
        let setting = |key: CanonicalKey| match arc_row.get(key) {
            FieldValue::Text(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            FieldValue::Number(value) => Err(malformed(key, &value.to_string())),
            _ => Err(missing(key)),
        };
        let dimension = |key: CanonicalKey| {
            let value = arc_row.get(key);
            match value.as_text() {
                Some(text) if !text.is_empty() => {
                    value.as_number().ok_or_else(|| malformed(key, &text))
                }
                _ => Err(missing(key)),
            }
        };
        // FITS NAXISn is a positive 32-bit integer
        let length = |value: f64| {
            (value.is_finite() && value.fract() == 0.0 && value >= 1.0 && value <= i32::MAX as f64)
                .then_some(value as usize)
        };

        let disperser = setting(CanonicalKey::Dispname)?;
        let dichroic = setting(CanonicalKey::Dichroic)?;
        let (naxis0, naxis1) = (
            dimension(CanonicalKey::Naxis0)?,
            dimension(CanonicalKey::Naxis1)?,
        );
        let shape = match (length(naxis0), length(naxis1)) {
            (Some(nspec), Some(nspat)) => ArcFrameShape { nspec, nspat },
            _ => {
                return Err(CalibError::InvalidArcFrameShape {
                    profile: profile.to_string(),
                    shape: (naxis0, naxis1),
                })
            }
        };

        self.profile
            .resolve_arc_params(&self.arc_defaults, &disperser, &dichroic, shape)
    }
}

#[cfg(test)]
mod calibkit_test {
    use super::*;
    use crate::metadata::read_metadata_csv;
    use approx::assert_relative_eq;

    fn arc_row() -> CanonicalRow {
        CanonicalRow::new()
            .with(CanonicalKey::Dispname, "R300B")
            .with(CanonicalKey::Dichroic, "5300  ")
            .with(CanonicalKey::Naxis0, 4000_i64)
            .with(CanonicalKey::Naxis1, 1000_i64)
    }

    #[test]
    fn test_resolve_arc_from_row() {
        let kit = CalibKit::new("wht_isis_blue").unwrap();
        let params = kit.resolve_arc(&arc_row()).unwrap();
        assert_eq!(params.disp, 0.80);
        assert_eq!(params.wave_max, 6000.0);
        assert_relative_eq!(params.b1, 1. / 0.80 / 4000., max_relative = 1e-12);

        // dimensions read from text cells
        let text_shape = arc_row()
            .with(CanonicalKey::Naxis0, "4000")
            .with(CanonicalKey::Naxis1, " 1000 ");
        assert_eq!(kit.resolve_arc(&text_shape).unwrap(), params);
    }

    #[test]
    fn test_dichroic_spelling_is_not_normalized() {
        let kit = CalibKit::new("wht_isis_blue").unwrap();
        let data = "dispname,dichroic,naxis0,naxis1\n\
                    R300B,5300,4000,1000\n\
                    R300B,05300,4000,1000\n\
                    R300B,5300.0,4000,1000\n";
        let results = read_metadata_csv(data.as_bytes())
            .unwrap()
            .iter()
            .map(|record| kit.resolve_arc(&record.row))
            .collect::<Vec<_>>();

        assert!(results[0].is_ok());
        assert_eq!(
            results[1],
            Err(CalibError::UnsupportedDichroic {
                profile: "wht_isis_blue".into(),
                dichroic: "05300".into()
            })
        );
        assert_eq!(
            results[2],
            Err(CalibError::UnsupportedDichroic {
                profile: "wht_isis_blue".into(),
                dichroic: "5300.0".into()
            })
        );

        let numeric = arc_row().with(CanonicalKey::Dichroic, 5300_i64);
        assert_eq!(
            kit.resolve_arc(&numeric),
            Err(CalibError::MalformedArcField {
                profile: "wht_isis_blue".into(),
                key: "dichroic".into(),
                value: "5300".into()
            })
        );
    }

    #[test]
    fn test_resolve_arc_missing_fields() {
        let kit = CalibKit::new("wht_isis_blue").unwrap();

        let mut row = arc_row();
        row.insert(CanonicalKey::Dispname, FieldValue::Absent);
        assert_eq!(
            kit.resolve_arc(&row),
            Err(CalibError::MissingArcField {
                profile: "wht_isis_blue".into(),
                key: "dispname".into()
            })
        );

        let row = arc_row().with(CanonicalKey::Naxis1, "   ");
        assert!(matches!(
            kit.resolve_arc(&row),
            Err(CalibError::MissingArcField { key, .. }) if key == "naxis1"
        ));
    }

    #[test]
    fn test_resolve_arc_rejects_bad_dimensions() {
        let kit = CalibKit::new("wht_isis_blue").unwrap();

        assert_eq!(
            kit.resolve_arc(&arc_row().with(CanonicalKey::Naxis0, "abc")),
            Err(CalibError::MalformedArcField {
                profile: "wht_isis_blue".into(),
                key: "naxis0".into(),
                value: "abc".into()
            })
        );

        for naxis0 in [4000.9, f64::INFINITY, f64::NAN, -4000., 0., 1e12] {
            let row = arc_row().with(CanonicalKey::Naxis0, naxis0);
            let result = kit.resolve_arc(&row);
            assert!(
                matches!(
                    &result,
                    Err(CalibError::InvalidArcFrameShape { shape, .. })
                        if shape.1 == 1000. && (shape.0 == naxis0 || naxis0.is_nan())
                ),
                "naxis0 = {naxis0}: {result:?}"
            );
        }
    }

    #[test]
    fn test_configured_handle() {
        let config = ReductionConfig::from_json_str(
            r#"{"spectrograph": "wht_isis_blue", "detector": 0, "arc_defaults": {"n_final": 6}, "required_calibrations": ["bias"]}"#,
        )
        .unwrap();
        let kit = CalibKit::from_config(&config).unwrap();
        assert_eq!(kit.profile().id(), "wht_isis_blue");
        assert_eq!(kit.detector().suffix, "_blue");
        assert_eq!(kit.required_calibrations(), &[FrameType::Bias]);

        let params = kit.resolve_arc(&arc_row()).unwrap();
        assert_eq!(params.n_final, 6);
        assert_eq!(params.wave_max, 6000.);
    }
}
