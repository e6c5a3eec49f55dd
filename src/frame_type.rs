//! Functional roles an exposure can play in a reduction.
//!
//! The vocabulary is closed: adding a role means adding a variant here, which
//! forces every exhaustive `match` in the crate to be revisited.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::calibkit_errors::CalibError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FrameType {
    Science,
    Standard,
    Bias,
    Dark,
    PixelFlat,
    IllumFlat,
    Pinhole,
    Trace,
    Arc,
    Tilt,
}

impl FrameType {
    /// Every member of the vocabulary, in declaration order.
    pub const ALL: [FrameType; 10] = [
        FrameType::Science,
        FrameType::Standard,
        FrameType::Bias,
        FrameType::Dark,
        FrameType::PixelFlat,
        FrameType::IllumFlat,
        FrameType::Pinhole,
        FrameType::Trace,
        FrameType::Arc,
        FrameType::Tilt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameType::Science => "science",
            FrameType::Standard => "standard",
            FrameType::Bias => "bias",
            FrameType::Dark => "dark",
            FrameType::PixelFlat => "pixelflat",
            FrameType::IllumFlat => "illumflat",
            FrameType::Pinhole => "pinhole",
            FrameType::Trace => "trace",
            FrameType::Arc => "arc",
            FrameType::Tilt => "tilt",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameType {
    type Err = CalibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FrameType::ALL
            .into_iter()
            .find(|ftype| ftype.as_str() == s.trim())
            .ok_or_else(|| CalibError::UnknownFrameType(s.to_string()))
    }
}

impl TryFrom<String> for FrameType {
    type Error = CalibError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FrameType> for String {
    fn from(value: FrameType) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod frame_type_test {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for ftype in FrameType::ALL {
            assert_eq!(ftype.as_str().parse::<FrameType>().unwrap(), ftype);
        }
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(
            "flat".parse::<FrameType>(),
            Err(CalibError::UnknownFrameType("flat".into()))
        );
    }
}
