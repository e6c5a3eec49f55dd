use thiserror::Error;

use crate::frame_type::FrameType;

#[derive(Error, Debug)]
pub enum CalibError {
    #[error("Unknown instrument profile '{id}' (known profiles: {known})")]
    UnknownProfile { id: String, known: String },

    #[error("Instrument profile '{0}' is already registered")]
    DuplicateProfile(String),

    #[error("Profile '{profile}': not ready for disperser '{disperser}'")]
    UnsupportedDisperser { profile: String, disperser: String },

    #[error("Profile '{profile}': not ready for dichroic '{dichroic}'")]
    UnsupportedDichroic { profile: String, dichroic: String },

    #[error("Malformed condition '{rule}': {reason}")]
    MalformedCondition { rule: String, reason: String },

    #[error("Malformed match rule '{rule}' for key '{key}': {reason}")]
    MalformedMatchRule {
        key: String,
        rule: String,
        reason: String,
    },

    #[error("Unknown canonical key: {0}")]
    UnknownCanonicalKey(String),

    #[error("Unknown frame type: {0}")]
    UnknownFrameType(String),

    #[error("Malformed data section '{0}'")]
    MalformedDataSection(String),

    #[error("Invalid definition for instrument profile '{profile}': {source}")]
    ProfileDefinition {
        profile: String,
        #[source]
        source: Box<CalibError>,
    },

    #[error("Invalid profile content: {0}")]
    InvalidProfile(String),

    #[error("Profile '{profile}': detector index {index} out of range ({count} detectors)")]
    DetectorOutOfRange {
        profile: String,
        index: usize,
        count: usize,
    },

    #[error("Profile '{profile}': invalid arc frame shape {shape:?}")]
    InvalidArcFrameShape {
        profile: String,
        shape: (f64, f64),
    },

    #[error("Profile '{profile}': arc frame has no value for '{key}'")]
    MissingArcField { profile: String, key: String },

    #[error("Profile '{profile}': arc frame value {value:?} for '{key}' has the wrong type")]
    MalformedArcField {
        profile: String,
        key: String,
        value: String,
    },

    #[error("Frame matches {} frame types: {candidates:?}", candidates.len())]
    ClassificationAmbiguity { candidates: Vec<FrameType> },

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV metadata error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration parsing error: {0}")]
    ConfigParseError(#[from] serde_json::Error),
}

impl CalibError {
    /// Wrap a load-time failure with the identity of the profile being built.
    pub(crate) fn in_profile(self, profile: &str) -> Self {
        match self {
            already @ CalibError::ProfileDefinition { .. } => already,
            other => CalibError::ProfileDefinition {
                profile: profile.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// True for the fatal configuration family: the run must abort rather than
    /// continue with a guessed parameter.
    pub fn is_configuration_error(&self) -> bool {
        use CalibError::*;
        match self {
            UnknownProfile { .. }
            | DuplicateProfile(_)
            | UnsupportedDisperser { .. }
            | UnsupportedDichroic { .. }
            | MalformedCondition { .. }
            | MalformedMatchRule { .. }
            | UnknownCanonicalKey(_)
            | UnknownFrameType(_)
            | MalformedDataSection(_)
            | ProfileDefinition { .. }
            | InvalidProfile(_)
            | DetectorOutOfRange { .. }
            | InvalidArcFrameShape { .. }
            | MissingArcField { .. }
            | MalformedArcField { .. }
            | ConfigParseError(_) => true,

            ClassificationAmbiguity { .. } | IoError(_) | CsvError(_) => false,
        }
    }
}

impl PartialEq for CalibError {
    fn eq(&self, other: &Self) -> bool {
        use CalibError::*;
        match (self, other) {
            (
                UnknownProfile { id: a, known: ka },
                UnknownProfile { id: b, known: kb },
            ) => a == b && ka == kb,
            (DuplicateProfile(a), DuplicateProfile(b)) => a == b,
            (
                UnsupportedDisperser {
                    profile: pa,
                    disperser: a,
                },
                UnsupportedDisperser {
                    profile: pb,
                    disperser: b,
                },
            ) => pa == pb && a == b,
            (
                UnsupportedDichroic {
                    profile: pa,
                    dichroic: a,
                },
                UnsupportedDichroic {
                    profile: pb,
                    dichroic: b,
                },
            ) => pa == pb && a == b,
            (
                MalformedCondition { rule: a, reason: ra },
                MalformedCondition { rule: b, reason: rb },
            ) => a == b && ra == rb,
            (
                MalformedMatchRule {
                    key: ka,
                    rule: a,
                    reason: ra,
                },
                MalformedMatchRule {
                    key: kb,
                    rule: b,
                    reason: rb,
                },
            ) => ka == kb && a == b && ra == rb,
            (UnknownCanonicalKey(a), UnknownCanonicalKey(b)) => a == b,
            (UnknownFrameType(a), UnknownFrameType(b)) => a == b,
            (MalformedDataSection(a), MalformedDataSection(b)) => a == b,
            (
                ProfileDefinition {
                    profile: pa,
                    source: a,
                },
                ProfileDefinition {
                    profile: pb,
                    source: b,
                },
            ) => pa == pb && a == b,
            (InvalidProfile(a), InvalidProfile(b)) => a == b,
            (
                DetectorOutOfRange {
                    profile: pa,
                    index: ia,
                    count: ca,
                },
                DetectorOutOfRange {
                    profile: pb,
                    index: ib,
                    count: cb,
                },
            ) => pa == pb && ia == ib && ca == cb,
            (
                InvalidArcFrameShape {
                    profile: pa,
                    shape: a,
                },
                InvalidArcFrameShape {
                    profile: pb,
                    shape: b,
                },
            ) => pa == pb && a == b,
            (
                MissingArcField { profile: pa, key: a },
                MissingArcField { profile: pb, key: b },
            ) => pa == pb && a == b,
            (
                MalformedArcField {
                    profile: pa,
                    key: ka,
                    value: a,
                },
                MalformedArcField {
                    profile: pb,
                    key: kb,
                    value: b,
                },
            ) => pa == pb && ka == kb && a == b,
            (
                ClassificationAmbiguity { candidates: a },
                ClassificationAmbiguity { candidates: b },
            ) => a == b,

            // foreign errors only compare by variant
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,
            (ConfigParseError(_), ConfigParseError(_)) => true,

            _ => false,
        }
    }
}
