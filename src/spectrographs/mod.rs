//! # Instrument profiles
//!
//! An instrument profile bundles everything the engine needs to know about one
//! spectrograph arm:
//!
//! - its detectors and telescope,
//! - the [`HeaderKeyMap`] translating raw header fields into canonical keys,
//! - the [`ConditionSet`] of every [`FrameType`],
//! - the [`MatchCriteria`] used to associate calibrations with anchors,
//! - the [`ArcDecisionTable`] seeding wavelength solutions.
//!
//! ## Capability trait and snapshot
//!
//! Concrete instruments implement the [`Spectrograph`] trait, a flat capability set with
//! no inheritance chain between instruments. The trait is only read once:
//! [`InstrumentProfile::from_spectrograph`] parses and validates every capability into an
//! immutable snapshot, so that the rest of the engine can assume a fully resolved profile.
//! Any defect (malformed rule, key missing from the header map, inconsistent detector,
//! duplicated decision-table entry) surfaces as a
//! [`CalibError::ProfileDefinition`] naming the profile.
//!
//! ## Registry
//!
//! Profiles are selected by a flat string id through a [`ProfileRegistry`]. The builtin
//! registry is built once per process on first use ([`builtin_registry`]); an unknown id is
//! rejected with [`CalibError::UnknownProfile`] listing the known ids.
//!
//! ```rust
//! use calibkit::spectrographs::load_profile;
//!
//! let profile = load_profile("wht_isis_blue").unwrap();
//! assert_eq!(profile.camera(), "ISISb");
//! assert!(load_profile("keck_lris_blue").is_err());
//! ```
pub mod wht_isis;

use std::{collections::BTreeMap, fmt, sync::Arc};

use itertools::Itertools;
use once_cell::sync::OnceCell;

use crate::{
    arc_params::{ArcDecisionTable, ArcFrameShape, ArcParameters},
    calibkit_errors::CalibError,
    conditions::{CaseMode, ConditionSet},
    constants::ProfileId,
    detector::{Detector, Telescope},
    frame_type::FrameType,
    header_keys::{CanonicalRow, HeaderKeyMap, RawHeaders},
    match_criteria::MatchCriteria,
};
use wht_isis::WhtIsisBlue;

/// Condition rules a spectrograph declares for one frame type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionSource {
    /// Conjunction in the condition mini-syntax; empty means "never matches"
    Rules(Vec<&'static str>),
    MatchAll,
}

impl ConditionSource {
    pub fn never() -> Self {
        ConditionSource::Rules(Vec::new())
    }

    fn parse(&self) -> Result<ConditionSet, CalibError> {
        match self {
            ConditionSource::Rules(rules) => ConditionSet::parse_all(rules),
            ConditionSource::MatchAll => Ok(ConditionSet::MatchAll),
        }
    }
}

/// Capability set implemented by every supported instrument.
pub trait Spectrograph: Send + Sync + fmt::Debug {
    /// Registry identifier, e.g. `wht_isis_blue`
    fn name(&self) -> &str;

    fn camera(&self) -> &str;

    fn telescope(&self) -> Telescope;

    fn detectors(&self) -> Result<Vec<Detector>, CalibError>;

    /// Number of header blocks per raw file
    fn num_headers(&self) -> usize;

    /// Letter-case policy of text conditions and matches
    fn case_mode(&self) -> CaseMode {
        CaseMode::Sensitive
    }

    fn header_keys(&self) -> HeaderKeyMap;

    fn condition_rules(&self, frame_type: FrameType) -> ConditionSource;

    fn match_criteria(&self) -> Result<MatchCriteria, CalibError>;

    fn arc_table(&self) -> ArcDecisionTable;

    fn arc_defaults(&self) -> ArcParameters {
        ArcParameters::default()
    }
}

/// Validated, immutable snapshot of a [`Spectrograph`].
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentProfile {
    id: ProfileId,
    camera: String,
    telescope: Telescope,
    detectors: Vec<Detector>,
    num_headers: usize,
    case_mode: CaseMode,
    header_keys: HeaderKeyMap,
    conditions: BTreeMap<FrameType, ConditionSet>,
    match_criteria: MatchCriteria,
    arc_table: ArcDecisionTable,
    arc_defaults: ArcParameters,
}

impl InstrumentProfile {
    /// Parse and validate every capability of `spectrograph`.
    ///
    /// Return
    /// ----------
    /// * The profile snapshot, or a [`CalibError::ProfileDefinition`] wrapping the first
    ///   defect found.
    pub fn from_spectrograph(spectrograph: &dyn Spectrograph) -> Result<Self, CalibError> {
        let id = spectrograph.name().to_string();
        Self::build(spectrograph).map_err(|err| err.in_profile(&id))
    }

    fn build(spectrograph: &dyn Spectrograph) -> Result<Self, CalibError> {
        let detectors = spectrograph.detectors()?;
        if detectors.is_empty() {
            return Err(CalibError::InvalidProfile("no detector declared".into()));
        }
        for detector in &detectors {
            detector.validate()?;
        }

        let num_headers = spectrograph.num_headers();
        let header_keys = spectrograph.header_keys();
        if let Some(block) = header_keys.max_block().filter(|block| *block >= num_headers) {
            return Err(CalibError::InvalidProfile(format!(
                "header key map reads block {block} but files have {num_headers} header blocks"
            )));
        }
        if let Some(detector) = detectors.iter().find(|det| det.data_ext >= num_headers) {
            return Err(CalibError::InvalidProfile(format!(
                "detector '{}' reads pixel data from block {} but files have {num_headers} header blocks",
                detector.suffix, detector.data_ext
            )));
        }

        let conditions = FrameType::ALL
            .into_iter()
            .map(|frame_type| {
                spectrograph
                    .condition_rules(frame_type)
                    .parse()
                    .map(|set| (frame_type, set))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let match_criteria = spectrograph.match_criteria()?;

        let unmapped = conditions
            .values()
            .flat_map(ConditionSet::keys)
            .chain(match_criteria.keys())
            .filter(|key| !header_keys.contains(*key))
            .unique()
            .collect_vec();
        if !unmapped.is_empty() {
            return Err(CalibError::InvalidProfile(format!(
                "rules read canonical keys absent from the header key map: {}",
                unmapped.iter().join(", ")
            )));
        }

        let arc_table = spectrograph.arc_table();
        arc_table.validate()?;

        let profile = InstrumentProfile {
            id: spectrograph.name().to_string(),
            camera: spectrograph.camera().to_string(),
            telescope: spectrograph.telescope(),
            detectors,
            num_headers,
            case_mode: spectrograph.case_mode(),
            header_keys,
            conditions,
            match_criteria,
            arc_table,
            arc_defaults: spectrograph.arc_defaults(),
        };

        log::info!(
            "Loaded instrument profile {} (camera {}, {} detector(s), {} header block(s))",
            profile.id,
            profile.camera,
            profile.detectors.len(),
            profile.num_headers
        );
        Ok(profile)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn camera(&self) -> &str {
        &self.camera
    }

    pub fn telescope(&self) -> &Telescope {
        &self.telescope
    }

    pub fn detectors(&self) -> &[Detector] {
        &self.detectors
    }

    /// Detector by index, the first one when `index` is `None`.
    pub fn detector(&self, index: Option<usize>) -> Result<&Detector, CalibError> {
        let index = index.unwrap_or(0);
        self.detectors
            .get(index)
            .ok_or_else(|| CalibError::DetectorOutOfRange {
                profile: self.id.clone(),
                index,
                count: self.detectors.len(),
            })
    }

    pub fn num_headers(&self) -> usize {
        self.num_headers
    }

    pub fn case_mode(&self) -> CaseMode {
        self.case_mode
    }

    pub fn header_keys(&self) -> &HeaderKeyMap {
        &self.header_keys
    }

    /// Translate the raw header blocks of one exposure into a canonical row.
    pub fn canonical_row(&self, raw: &RawHeaders) -> CanonicalRow {
        self.header_keys.resolve(raw)
    }

    /// Condition set of `frame_type`; every member of the vocabulary has one.
    pub fn conditions(&self, frame_type: FrameType) -> &ConditionSet {
        static NEVER: ConditionSet = ConditionSet::Never;
        self.conditions.get(&frame_type).unwrap_or(&NEVER)
    }

    pub fn match_criteria(&self) -> &MatchCriteria {
        &self.match_criteria
    }

    pub fn arc_table(&self) -> &ArcDecisionTable {
        &self.arc_table
    }

    pub fn arc_defaults(&self) -> &ArcParameters {
        &self.arc_defaults
    }

    /// Arc seeds for one arc frame, starting from `defaults`.
    ///
    /// See [`ArcDecisionTable::resolve`].
    pub fn resolve_arc_params(
        &self,
        defaults: &ArcParameters,
        disperser: &str,
        dichroic: &str,
        shape: ArcFrameShape,
    ) -> Result<ArcParameters, CalibError> {
        self.arc_table
            .resolve(&self.id, defaults, disperser, dichroic, shape)
    }
}

/// Catalog of profiles selectable by id.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<ProfileId, Arc<InstrumentProfile>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every instrument shipped with the crate.
    pub fn builtin() -> Result<Self, CalibError> {
        let mut registry = ProfileRegistry::new();
        registry.register(&WhtIsisBlue)?;
        Ok(registry)
    }

    /// Validate `spectrograph` and add it under its name.
    pub fn register(
        &mut self,
        spectrograph: &dyn Spectrograph,
    ) -> Result<Arc<InstrumentProfile>, CalibError> {
        if self.profiles.contains_key(spectrograph.name()) {
            return Err(CalibError::DuplicateProfile(spectrograph.name().to_string()));
        }
        let profile = Arc::new(InstrumentProfile::from_spectrograph(spectrograph)?);
        self.profiles
            .insert(profile.id().to_string(), Arc::clone(&profile));
        Ok(profile)
    }

    pub fn get(&self, id: &str) -> Result<Arc<InstrumentProfile>, CalibError> {
        self.profiles
            .get(id)
            .cloned()
            .ok_or_else(|| CalibError::UnknownProfile {
                id: id.to_string(),
                known: self.ids().join(", "),
            })
    }

    pub fn ids(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

static BUILTIN_REGISTRY: OnceCell<ProfileRegistry> = OnceCell::new();

/// Process-wide registry of the builtin profiles, built on first use.
pub fn builtin_registry() -> Result<&'static ProfileRegistry, CalibError> {
    BUILTIN_REGISTRY.get_or_try_init(ProfileRegistry::builtin)
}

/// Select a builtin profile by id.
pub fn load_profile(id: &str) -> Result<Arc<InstrumentProfile>, CalibError> {
    builtin_registry()?.get(id)
}
