//! # Constants and type definitions for calibkit
//!
//! This module centralizes the **default calibration seeds** and the **common type aliases**
//! shared by the classification, matching and arc-resolution layers.
//!
//! ## Overview
//!
//! - Default wavelength-solution seeds used to initialise [`ArcParameters`](crate::arc_params::ArcParameters)
//! - Default set of calibration frame types expected around a science frame
//! - Type aliases for physical quantities and identifiers

use crate::frame_type::FrameType;

// -------------------------------------------------------------------------------------------------
// Wavelength-solution seeds
// -------------------------------------------------------------------------------------------------

/// Lower bound of the default wavelength window (Å)
pub const DEFAULT_WAVE_MIN: Angstrom = 2900.0;

/// Upper bound of the default wavelength window (Å)
pub const DEFAULT_WAVE_MAX: Angstrom = 12000.0;

/// Fractional tolerance on the dispersion during line identification
pub const DEFAULT_DISP_TOLER: f64 = 0.1;

/// Tolerance (pixels) used when matching arc lines to the line list
pub const DEFAULT_MATCH_TOLER: f64 = 3.0;

/// Order of the first wavelength fit
pub const DEFAULT_N_FIRST: u32 = 2;

/// Order of the final wavelength fit
pub const DEFAULT_N_FINAL: u32 = 4;

/// Rejection threshold (σ) during the first fit
pub const DEFAULT_NSIG_REJ: f64 = 2.0;

/// Rejection threshold (σ) during the final fit
pub const DEFAULT_NSIG_REJ_FINAL: f64 = 3.0;

/// Number of strong lines used to seed the identification
pub const DEFAULT_N_STRONG: usize = 13;

// -------------------------------------------------------------------------------------------------
// Calibration association
// -------------------------------------------------------------------------------------------------

/// Calibration frame types a science frame needs before it can be reduced.
pub const DEFAULT_REQUIRED_CALIBRATIONS: [FrameType; 4] = [
    FrameType::Arc,
    FrameType::Trace,
    FrameType::Bias,
    FrameType::PixelFlat,
];

/// Frame types that calibration frames are associated with.
pub const DEFAULT_ANCHOR_TYPES: [FrameType; 2] = [FrameType::Science, FrameType::Standard];

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Wavelength in Ångström
pub type Angstrom = f64;
/// Angle in degrees
pub type Degree = f64;
/// Distance in meters
pub type Meter = f64;
/// Identifier used to select an instrument profile from the registry (e.g. `"wht_isis_blue"`)
pub type ProfileId = String;
/// Name of an arc-lamp ion species (e.g. `"NeI"`)
pub type LampSpecies = String;
