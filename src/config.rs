//! # Reduction configuration
//!
//! JSON description of one reduction run, parsed with `serde_json`:
//!
//! ```json
//! {
//!   "spectrograph": "wht_isis_blue",
//!   "detector": 0,
//!   "arc_defaults": { "n_final": 3, "match_toler": 2.5 },
//!   "required_calibrations": ["arc", "bias"]
//! }
//! ```
//!
//! Only `spectrograph` is required. `arc_defaults` is a partial [`ArcParameters`] record:
//! missing fields keep the crate-wide defaults. [`ReductionConfig::load`] resolves the
//! profile and checks the detector index, so a wrong id or index aborts the run at
//! configuration-load time, before any frame is read.
use std::{fs, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    arc_params::ArcParameters,
    calibkit_errors::CalibError,
    constants::{ProfileId, DEFAULT_REQUIRED_CALIBRATIONS},
    frame_type::FrameType,
    spectrographs::{builtin_registry, InstrumentProfile, ProfileRegistry},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReductionConfig {
    pub spectrograph: ProfileId,
    #[serde(default)]
    pub detector: Option<usize>,
    #[serde(default)]
    pub arc_defaults: Option<ArcParameters>,
    #[serde(default)]
    pub required_calibrations: Option<Vec<FrameType>>,
}

impl ReductionConfig {
    pub fn new(spectrograph: &str) -> Self {
        ReductionConfig {
            spectrograph: spectrograph.to_string(),
            detector: None,
            arc_defaults: None,
            required_calibrations: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, CalibError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CalibError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Resolve and validate the configured profile against the builtin registry.
    pub fn load(&self) -> Result<Arc<InstrumentProfile>, CalibError> {
        self.load_with(builtin_registry()?)
    }

    /// Same as [`ReductionConfig::load`] with a caller-provided registry.
    pub fn load_with(
        &self,
        registry: &ProfileRegistry,
    ) -> Result<Arc<InstrumentProfile>, CalibError> {
        let profile = registry.get(self.spectrograph.trim())?;
        profile.detector(self.detector)?;
        Ok(profile)
    }

    /// Seeds every arc resolution starts from: the configured record, or the profile's own.
    pub fn arc_defaults_for(&self, profile: &InstrumentProfile) -> ArcParameters {
        self.arc_defaults
            .clone()
            .unwrap_or_else(|| profile.arc_defaults().clone())
    }

    pub fn required_calibrations(&self) -> Vec<FrameType> {
        self.required_calibrations
            .clone()
            .unwrap_or_else(|| DEFAULT_REQUIRED_CALIBRATIONS.to_vec())
    }
}
