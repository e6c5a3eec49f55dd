//! # Detector and telescope descriptors
//!
//! Immutable records of the physical constants of an instrument. They carry no logic
//! beyond validation and the parsing of FITS-style data sections.
//!
//! ## Data sections
//!
//! Active areas are written the way they appear in FITS headers, e.g. `[:,2:4030]`:
//! one slice per axis, **one-indexed** with an **inclusive** end. A missing bound means
//! "from the first pixel" / "up to the last pixel". [`DataSection::to_ranges`] converts
//! the section into zero-based half-open ranges for a given array shape.
use std::ops::Range;

use nom::{
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map_res, opt},
    sequence::{delimited, preceded, separated_pair, terminated},
    IResult, Parser,
};

use crate::{
    calibkit_errors::CalibError,
    constants::{Degree, Meter},
};

/// Bounds along one axis, one-indexed and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSlice {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl AxisSlice {
    fn to_range(self, len: usize) -> Option<Range<usize>> {
        let start = match self.start {
            Some(0) => return None,
            Some(first) => first - 1,
            None => 0,
        };
        let end = self.end.unwrap_or(len);
        (start < end && end <= len).then_some(start..end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSection {
    pub axis0: AxisSlice,
    pub axis1: AxisSlice,
}

fn parse_index(input: &str) -> IResult<&str, usize> {
    map_res(preceded(multispace0, digit1), |digits: &str| {
        digits.parse::<usize>()
    })
    .parse(input)
}

fn parse_axis(input: &str) -> IResult<&str, AxisSlice> {
    let (input, start) = opt(parse_index).parse(input)?;
    let (input, colon) = opt(preceded(multispace0, char(':'))).parse(input)?;

    if colon.is_none() {
        // a bare index selects a single pixel
        return match start {
            Some(index) => Ok((
                input,
                AxisSlice {
                    start: Some(index),
                    end: Some(index),
                },
            )),
            None => Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Digit,
            ))),
        };
    }

    let (input, end) = opt(parse_index).parse(input)?;
    Ok((input, AxisSlice { start, end }))
}

fn parse_section(input: &str) -> IResult<&str, DataSection> {
    all_consuming(delimited(
        preceded(multispace0, char('[')),
        separated_pair(
            parse_axis,
            preceded(multispace0, char(',')),
            terminated(parse_axis, multispace0),
        ),
        terminated(char(']'), multispace0),
    ))
    .map(|(axis0, axis1)| DataSection { axis0, axis1 })
    .parse(input)
}

impl DataSection {
    pub fn parse(section: &str) -> Result<Self, CalibError> {
        parse_section(section)
            .map(|(_, section)| section)
            .map_err(|_| CalibError::MalformedDataSection(section.to_string()))
    }

    /// Zero-based half-open ranges of this section for an array of `shape`.
    pub fn to_ranges(&self, shape: (usize, usize)) -> Result<(Range<usize>, Range<usize>), CalibError> {
        let out_of_bounds =
            || CalibError::MalformedDataSection(format!("{self:?} does not fit in {shape:?}"));
        let rows = self.axis0.to_range(shape.0).ok_or_else(out_of_bounds)?;
        let cols = self.axis1.to_range(shape.1).ok_or_else(out_of_bounds)?;
        Ok((rows, cols))
    }
}

/// Physical and geometric constants of one detector (chip).
#[derive(Debug, Clone, PartialEq)]
pub struct Detector {
    /// Header block holding the pixel data
    pub data_ext: usize,
    /// Axis along which the light is dispersed (0 = rows)
    pub disp_axis: usize,
    pub x_gap: f64,
    pub y_gap: f64,
    pub y_size: f64,
    /// arcsec per pixel
    pub platescale: f64,
    /// e⁻ / pixel / hour
    pub dark_current: f64,
    /// ADU
    pub saturation: f64,
    /// Fraction of the saturation level above which the response is non-linear
    pub nonlinear: f64,
    pub num_amplifiers: usize,
    /// e⁻ / ADU, one per amplifier
    pub gain: Vec<f64>,
    /// e⁻, one per amplifier
    pub read_noise: Vec<f64>,
    /// Active area, one per amplifier
    pub data_sections: Vec<DataSection>,
    /// Appended to output file names
    pub suffix: String,
}

impl Detector {
    /// Check per-amplifier lists against the amplifier count.
    pub fn validate(&self) -> Result<(), CalibError> {
        let per_amp = [
            ("gain", self.gain.len()),
            ("read_noise", self.read_noise.len()),
            ("data_sections", self.data_sections.len()),
        ];
        if self.num_amplifiers == 0 {
            return Err(CalibError::InvalidProfile(format!(
                "detector '{}' declares no amplifier",
                self.suffix
            )));
        }
        if let Some((name, len)) = per_amp
            .into_iter()
            .find(|(_, len)| *len != self.num_amplifiers)
        {
            return Err(CalibError::InvalidProfile(format!(
                "detector '{}': {name} has {len} entries for {} amplifiers",
                self.suffix, self.num_amplifiers
            )));
        }
        if !(0.0..=1.0).contains(&self.nonlinear) {
            return Err(CalibError::InvalidProfile(format!(
                "detector '{}': nonlinear fraction {} outside [0, 1]",
                self.suffix, self.nonlinear
            )));
        }
        Ok(())
    }

    /// Count level above which a pixel is considered non-linear.
    pub fn nonlinear_counts(&self) -> f64 {
        self.saturation * self.nonlinear
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Telescope {
    pub name: String,
    /// East-positive geodetic longitude
    pub longitude: Degree,
    pub latitude: Degree,
    pub elevation: Meter,
    /// Primary mirror diameter
    pub diameter: Meter,
}
