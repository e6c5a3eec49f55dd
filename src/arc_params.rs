//! # Arc parameter resolution
//!
//! Before a wavelength solution can be fitted on an arc frame, the line-identification step
//! needs seeds: which lamps were lit, the wavelength window to search, the dispersion per
//! pixel and the fit orders. Those seeds depend on the optical configuration recorded in
//! the arc frame's metadata, through a two-level decision table:
//!
//! 1. the **dichroic** adjusts the bounds of the wavelength window,
//! 2. the **disperser** sets the first fit order and the dispersion per unbinned pixel,
//!    from which the pixel scale `b1 = 1 / disp / nspec` is derived.
//!
//! An unknown dichroic or disperser is a fatal configuration error; no fallback value is
//! ever used.
//!
//! ## Ownership
//!
//! [`ArcDecisionTable::resolve`] never mutates its inputs. It clones the defaults and
//! returns a freshly owned [`ArcParameters`] for each call, so concurrent resolutions never
//! share a record.
//!
//! ## Lamp thresholds
//!
//! Line-list filtering thresholds (minimum intensity, wavelength and Einstein A
//! coefficient) have global values in [`ArcParameters::line_thresholds`]. A profile may
//! override some of them per lamp species; [`ArcParameters::thresholds_for`] returns the
//! merged values, fields without override keeping the global ones.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    calibkit_errors::CalibError,
    constants::{
        Angstrom, LampSpecies, DEFAULT_DISP_TOLER, DEFAULT_MATCH_TOLER, DEFAULT_NSIG_REJ,
        DEFAULT_NSIG_REJ_FINAL, DEFAULT_N_FINAL, DEFAULT_N_FIRST, DEFAULT_N_STRONG,
        DEFAULT_WAVE_MAX, DEFAULT_WAVE_MIN,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitFunction {
    #[default]
    Legendre,
    Polynomial,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LineThresholds {
    pub min_intensity: f64,
    pub min_wave: Angstrom,
    pub min_aki: f64,
}

/// Per-lamp replacement of some [`LineThresholds`] fields.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LampOverride {
    pub min_intensity: Option<f64>,
    pub min_wave: Option<Angstrom>,
    pub min_aki: Option<f64>,
}

impl LampOverride {
    pub fn apply_to(&self, base: LineThresholds) -> LineThresholds {
        LineThresholds {
            min_intensity: self.min_intensity.unwrap_or(base.min_intensity),
            min_wave: self.min_wave.unwrap_or(base.min_wave),
            min_aki: self.min_aki.unwrap_or(base.min_aki),
        }
    }

    /// Field-wise merge, `other` winning where it is set.
    fn merged_with(&self, other: &LampOverride) -> LampOverride {
        LampOverride {
            min_intensity: other.min_intensity.or(self.min_intensity),
            min_wave: other.min_wave.or(self.min_wave),
            min_aki: other.min_aki.or(self.min_aki),
        }
    }
}

/// Seeds consumed by the wavelength-solution step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcParameters {
    pub lamps: Vec<LampSpecies>,
    pub wave_min: Angstrom,
    pub wave_max: Angstrom,
    /// Å per unbinned pixel
    pub disp: f64,
    pub disp_toler: f64,
    pub match_toler: f64,
    pub func: FitFunction,
    pub n_first: u32,
    pub n_final: u32,
    pub nsig_rej: f64,
    pub nsig_rej_final: f64,
    pub n_strong: usize,
    /// Linear pixel-scale term, `1 / disp / nspec`
    pub b1: f64,
    pub b2: f64,
    pub line_thresholds: LineThresholds,
    pub lamp_overrides: BTreeMap<LampSpecies, LampOverride>,
}

impl Default for ArcParameters {
    fn default() -> Self {
        ArcParameters {
            lamps: Vec::new(),
            wave_min: DEFAULT_WAVE_MIN,
            wave_max: DEFAULT_WAVE_MAX,
            disp: 0.0,
            disp_toler: DEFAULT_DISP_TOLER,
            match_toler: DEFAULT_MATCH_TOLER,
            func: FitFunction::Legendre,
            n_first: DEFAULT_N_FIRST,
            n_final: DEFAULT_N_FINAL,
            nsig_rej: DEFAULT_NSIG_REJ,
            nsig_rej_final: DEFAULT_NSIG_REJ_FINAL,
            n_strong: DEFAULT_N_STRONG,
            b1: 0.0,
            b2: 0.0,
            line_thresholds: LineThresholds::default(),
            lamp_overrides: BTreeMap::new(),
        }
    }
}

impl ArcParameters {
    /// Line thresholds for one lamp species, per-lamp overrides applied over the globals.
    pub fn thresholds_for(&self, lamp: &str) -> LineThresholds {
        self.lamp_overrides
            .get(lamp)
            .map(|entry| entry.apply_to(self.line_thresholds))
            .unwrap_or(self.line_thresholds)
    }
}

/// Pixel-array shape of the arc frame, `(nspec, nspat)` as read from `(naxis0, naxis1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArcFrameShape {
    pub nspec: usize,
    pub nspat: usize,
}

impl From<(usize, usize)> for ArcFrameShape {
    fn from((nspec, nspat): (usize, usize)) -> Self {
        ArcFrameShape { nspec, nspat }
    }
}

/// Effect of one dichroic on the wavelength window.
#[derive(Debug, Clone, PartialEq)]
pub struct DichroicSetup {
    pub name: String,
    pub wave_min: Option<Angstrom>,
    pub wave_max: Option<Angstrom>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisperserSetup {
    pub name: String,
    pub n_first: u32,
    /// Å per unbinned pixel
    pub disp: f64,
}

/// Per-profile decision table keyed on dichroic, then disperser.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArcDecisionTable {
    lamps: Vec<LampSpecies>,
    dichroics: Vec<DichroicSetup>,
    dispersers: Vec<DisperserSetup>,
    lamp_overrides: BTreeMap<LampSpecies, LampOverride>,
}

impl ArcDecisionTable {
    pub fn new(lamps: &[&str]) -> Self {
        ArcDecisionTable {
            lamps: lamps.iter().map(|lamp| lamp.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn dichroic(
        mut self,
        name: &str,
        wave_min: Option<Angstrom>,
        wave_max: Option<Angstrom>,
    ) -> Self {
        self.dichroics.push(DichroicSetup {
            name: name.to_string(),
            wave_min,
            wave_max,
        });
        self
    }

    pub fn disperser(mut self, name: &str, n_first: u32, disp: f64) -> Self {
        self.dispersers.push(DisperserSetup {
            name: name.to_string(),
            n_first,
            disp,
        });
        self
    }

    pub fn lamp_override(mut self, lamp: &str, entry: LampOverride) -> Self {
        self.lamp_overrides.insert(lamp.to_string(), entry);
        self
    }

    pub fn lamps(&self) -> &[LampSpecies] {
        &self.lamps
    }

    pub fn dichroics(&self) -> &[DichroicSetup] {
        &self.dichroics
    }

    pub fn dispersers(&self) -> &[DisperserSetup] {
        &self.dispersers
    }

    /// Load-time checks: unique keys, positive dispersions, non-empty tables.
    pub fn validate(&self) -> Result<(), CalibError> {
        fn duplicate<'a>(names: Vec<&'a str>) -> Option<&'a str> {
            let mut seen = std::collections::BTreeSet::new();
            names.into_iter().find(|name| !seen.insert(*name))
        }

        if self.lamps.is_empty() {
            return Err(CalibError::InvalidProfile(
                "arc decision table lists no lamp".into(),
            ));
        }
        if self.dichroics.is_empty() || self.dispersers.is_empty() {
            return Err(CalibError::InvalidProfile(
                "arc decision table needs at least one dichroic and one disperser".into(),
            ));
        }
        if let Some(name) = duplicate(self.dichroics.iter().map(|d| d.name.as_str()).collect()) {
            return Err(CalibError::InvalidProfile(format!(
                "dichroic '{name}' appears twice in the arc decision table"
            )));
        }
        if let Some(name) = duplicate(self.dispersers.iter().map(|d| d.name.as_str()).collect()) {
            return Err(CalibError::InvalidProfile(format!(
                "disperser '{name}' appears twice in the arc decision table"
            )));
        }
        if let Some(setup) = self.dispersers.iter().find(|setup| setup.disp <= 0.0) {
            return Err(CalibError::InvalidProfile(format!(
                "disperser '{}' has a non-positive dispersion {}",
                setup.name, setup.disp
            )));
        }
        Ok(())
    }

    /// Derive arc seeds for one arc frame.
    ///
    /// Arguments
    /// -----------------
    /// * `profile`: identity of the calling profile, reported in errors.
    /// * `defaults`: profile-wide seeds the result starts from (left untouched).
    /// * `disperser`, `dichroic`: raw metadata values of the arc frame, whitespace-trimmed.
    /// * `shape`: pixel-array shape of the arc frame.
    ///
    /// Return
    /// ----------
    /// * A new [`ArcParameters`], or a configuration error naming the unsupported value.
    pub fn resolve(
        &self,
        profile: &str,
        defaults: &ArcParameters,
        disperser: &str,
        dichroic: &str,
        shape: ArcFrameShape,
    ) -> Result<ArcParameters, CalibError> {
        if shape.nspec == 0 || shape.nspat == 0 {
            return Err(CalibError::InvalidArcFrameShape {
                profile: profile.to_string(),
                shape: (shape.nspec as f64, shape.nspat as f64),
            });
        }

        let mut params = defaults.clone();
        params.lamps = self.lamps.clone();

        let dichroic_setup = self
            .dichroics
            .iter()
            .find(|setup| setup.name == dichroic.trim())
            .ok_or_else(|| CalibError::UnsupportedDichroic {
                profile: profile.to_string(),
                dichroic: dichroic.to_string(),
            })?;
        if let Some(wave_min) = dichroic_setup.wave_min {
            params.wave_min = wave_min;
        }
        if let Some(wave_max) = dichroic_setup.wave_max {
            params.wave_max = wave_max;
        }

        let disperser_setup = self
            .dispersers
            .iter()
            .find(|setup| setup.name == disperser.trim())
            .ok_or_else(|| CalibError::UnsupportedDisperser {
                profile: profile.to_string(),
                disperser: disperser.to_string(),
            })?;
        params.n_first = disperser_setup.n_first;
        params.disp = disperser_setup.disp;
        params.b1 = 1.0 / params.disp / shape.nspec as f64;

        for (lamp, entry) in &self.lamp_overrides {
            let merged = params
                .lamp_overrides
                .get(lamp)
                .map(|current| current.merged_with(entry))
                .unwrap_or(*entry);
            params.lamp_overrides.insert(lamp.clone(), merged);
        }

        log::info!(
            "{profile}: arc seeds for disperser {} / dichroic {}: window [{}, {}] Å, disp {} Å/pix, b1 {:.3e}",
            disperser_setup.name,
            dichroic_setup.name,
            params.wave_min,
            params.wave_max,
            params.disp,
            params.b1
        );

        Ok(params)
    }
}
