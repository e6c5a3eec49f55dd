//! # Header key resolution
//!
//! Raw exposures carry instrument-specific header keywords spread over one or more
//! header blocks (primary HDU, extensions). The rest of the crate only speaks the
//! **canonical vocabulary** defined by [`CanonicalKey`]; this module translates
//! between the two.
//!
//! ## Structure
//!
//! ```text
//! RawHeaders  --(HeaderKeyMap::resolve)-->  CanonicalRow
//!  block 0: {"IMAGETYP": "arc", ...}          {idname: "arc", lamps: ..., naxis0: 4200, ...}
//!  block 1: {"NAXIS2": 4200, ...}
//! ```
//!
//! ## Invariants
//!
//! - Each canonical key maps to **exactly one** `(block, raw name)` pair.
//!   [`HeaderKeyMap::with`] adds, overrides or relocates a key; there is no way to remove one,
//!   so a profile built on top of [`HeaderKeyMap::base`] can never drop a base key.
//! - A mapped key whose raw field is missing resolves to [`FieldValue::Absent`], never to a
//!   default value.
use std::{borrow::Cow, collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::calibkit_errors::CalibError;

/// Instrument-independent metadata field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CanonicalKey {
    Target,
    Idname,
    Time,
    Date,
    Equinox,
    Ra,
    Dec,
    Airmass,
    Binning,
    Exptime,
    Decker,
    Slitwid,
    Slitlen,
    Dichroic,
    Dispname,
    Dispangle,
    Lamps,
    Filter1,
    Filter2,
    Naxis0,
    Naxis1,
}

impl CanonicalKey {
    pub const ALL: [CanonicalKey; 21] = [
        CanonicalKey::Target,
        CanonicalKey::Idname,
        CanonicalKey::Time,
        CanonicalKey::Date,
        CanonicalKey::Equinox,
        CanonicalKey::Ra,
        CanonicalKey::Dec,
        CanonicalKey::Airmass,
        CanonicalKey::Binning,
        CanonicalKey::Exptime,
        CanonicalKey::Decker,
        CanonicalKey::Slitwid,
        CanonicalKey::Slitlen,
        CanonicalKey::Dichroic,
        CanonicalKey::Dispname,
        CanonicalKey::Dispangle,
        CanonicalKey::Lamps,
        CanonicalKey::Filter1,
        CanonicalKey::Filter2,
        CanonicalKey::Naxis0,
        CanonicalKey::Naxis1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalKey::Target => "target",
            CanonicalKey::Idname => "idname",
            CanonicalKey::Time => "time",
            CanonicalKey::Date => "date",
            CanonicalKey::Equinox => "equinox",
            CanonicalKey::Ra => "ra",
            CanonicalKey::Dec => "dec",
            CanonicalKey::Airmass => "airmass",
            CanonicalKey::Binning => "binning",
            CanonicalKey::Exptime => "exptime",
            CanonicalKey::Decker => "decker",
            CanonicalKey::Slitwid => "slitwid",
            CanonicalKey::Slitlen => "slitlen",
            CanonicalKey::Dichroic => "dichroic",
            CanonicalKey::Dispname => "dispname",
            CanonicalKey::Dispangle => "dispangle",
            CanonicalKey::Lamps => "lamps",
            CanonicalKey::Filter1 => "filter1",
            CanonicalKey::Filter2 => "filter2",
            CanonicalKey::Naxis0 => "naxis0",
            CanonicalKey::Naxis1 => "naxis1",
        }
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalKey {
    type Err = CalibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        CanonicalKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| CalibError::UnknownCanonicalKey(s.to_string()))
    }
}

impl TryFrom<String> for CanonicalKey {
    type Error = CalibError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CanonicalKey> for String {
    fn from(value: CanonicalKey) -> Self {
        value.as_str().to_string()
    }
}

/// Scalar metadata value, either raw (header block entry) or canonical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// The raw field the canonical key points to does not exist for this exposure.
    Absent,
    Number(f64),
    Text(String),
}

static ABSENT: FieldValue = FieldValue::Absent;

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    /// Numeric view of the value; text is parsed after trimming.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Absent => None,
            FieldValue::Number(value) => Some(*value),
            FieldValue::Text(text) => text.trim().parse().ok(),
        }
    }

    /// Textual view of the value, whitespace-trimmed.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            FieldValue::Absent => None,
            FieldValue::Number(value) => Some(Cow::Owned(value.to_string())),
            FieldValue::Text(text) => Some(Cow::Borrowed(text.trim())),
        }
    }

    /// Build a value from a table cell: empty → absent, otherwise the text as written.
    ///
    /// Numeric cells stay text so that `05300` and `5300` remain distinct keys;
    /// [`FieldValue::as_number`] still reads them as numbers.
    pub fn from_cell(cell: &str) -> Self {
        if cell.trim().is_empty() {
            FieldValue::Absent
        } else {
            FieldValue::Text(cell.to_string())
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// One exposure's metadata keyed by the canonical vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    values: BTreeMap<CanonicalKey, FieldValue>,
}

impl CanonicalRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion, handy to write rows inline.
    pub fn with(mut self, key: CanonicalKey, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: CanonicalKey, value: impl Into<FieldValue>) {
        self.values.insert(key, value.into());
    }

    /// Value for `key`, or [`FieldValue::Absent`] when the row does not carry it.
    pub fn get(&self, key: CanonicalKey) -> &FieldValue {
        self.values.get(&key).unwrap_or(&ABSENT)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalKey, &FieldValue)> {
        self.values.iter().map(|(key, value)| (*key, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(CanonicalKey, FieldValue)> for CanonicalRow {
    fn from_iter<T: IntoIterator<Item = (CanonicalKey, FieldValue)>>(iter: T) -> Self {
        CanonicalRow {
            values: iter.into_iter().collect(),
        }
    }
}

/// Raw header keywords of one exposure, one map per header block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHeaders {
    blocks: Vec<BTreeMap<String, FieldValue>>,
}

impl RawHeaders {
    pub fn new(num_blocks: usize) -> Self {
        RawHeaders {
            blocks: vec![BTreeMap::new(); num_blocks],
        }
    }

    /// Set a raw keyword, growing the block list when needed.
    pub fn set(&mut self, block: usize, name: &str, value: impl Into<FieldValue>) {
        if self.blocks.len() <= block {
            self.blocks.resize_with(block + 1, BTreeMap::new);
        }
        self.blocks[block].insert(name.to_string(), value.into());
    }

    pub fn with(mut self, block: usize, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(block, name, value);
        self
    }

    pub fn get(&self, block: usize, name: &str) -> Option<&FieldValue> {
        self.blocks.get(block).and_then(|entries| entries.get(name))
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }
}

/// Where a canonical key is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    pub block: usize,
    pub name: String,
}

/// Mapping canonical key → raw header field, partitioned by header block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderKeyMap {
    fields: BTreeMap<CanonicalKey, RawField>,
}

impl HeaderKeyMap {
    /// Keys every profile inherits, all read from the primary block.
    pub fn base() -> Self {
        use CanonicalKey::*;
        [
            (Target, "OBJECT"),
            (Idname, "OBSTYPE"),
            (Time, "MJD-OBS"),
            (Date, "DATE"),
            (Equinox, "EQUINOX"),
            (Ra, "RA"),
            (Dec, "DEC"),
            (Airmass, "AIRMASS"),
            (Binning, "BINNING"),
            (Exptime, "EXPTIME"),
            (Decker, "SLITNAME"),
            (Dichroic, "DICHNAME"),
            (Dispname, "GRISNAME"),
            (Naxis0, "NAXIS2"),
            (Naxis1, "NAXIS1"),
        ]
        .into_iter()
        .fold(HeaderKeyMap::default(), |map, (key, raw)| {
            map.with(0, key, raw)
        })
    }

    /// Add or override the raw field for `key`. A key already mapped in another block is
    /// moved to `block`.
    pub fn with(mut self, block: usize, key: CanonicalKey, raw_name: &str) -> Self {
        self.fields.insert(
            key,
            RawField {
                block,
                name: raw_name.to_string(),
            },
        );
        self
    }

    pub fn get(&self, key: CanonicalKey) -> Option<&RawField> {
        self.fields.get(&key)
    }

    pub fn contains(&self, key: CanonicalKey) -> bool {
        self.fields.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = CanonicalKey> + '_ {
        self.fields.keys().copied()
    }

    /// Raw fields of one header block, keyed by canonical key.
    pub fn block(&self, block: usize) -> BTreeMap<CanonicalKey, &str> {
        self.fields
            .iter()
            .filter(|(_, field)| field.block == block)
            .map(|(key, field)| (*key, field.name.as_str()))
            .collect()
    }

    /// Highest block index referenced by the map.
    pub fn max_block(&self) -> Option<usize> {
        self.fields.values().map(|field| field.block).max()
    }

    /// Translate raw headers into a canonical row.
    ///
    /// Every mapped key appears in the output; raw fields missing from `raw` (or blocks the
    /// exposure does not have) produce [`FieldValue::Absent`].
    pub fn resolve(&self, raw: &RawHeaders) -> CanonicalRow {
        self.fields
            .iter()
            .map(|(key, field)| {
                let value = raw
                    .get(field.block, &field.name)
                    .cloned()
                    .unwrap_or(FieldValue::Absent);
                (*key, value)
            })
            .collect()
    }
}

#[cfg(test)]
mod header_keys_test {
    use super::*;

    #[test]
    fn test_canonical_key_names() {
        for key in CanonicalKey::ALL {
            assert_eq!(key.as_str().parse::<CanonicalKey>().unwrap(), key);
        }
        assert_eq!(
            "grating".parse::<CanonicalKey>(),
            Err(CalibError::UnknownCanonicalKey("grating".into()))
        );
    }

    #[test]
    fn test_field_value_views() {
        assert_eq!(FieldValue::from(" 30.0 ").as_number(), Some(30.0));
        assert_eq!(FieldValue::from("Off").as_number(), None);
        assert_eq!(FieldValue::from(" Off ").as_text().unwrap(), "Off");
        assert_eq!(FieldValue::Number(4.0).as_text().unwrap(), "4");
        assert_eq!(FieldValue::Absent.as_text(), None);

        assert_eq!(FieldValue::from_cell(""), FieldValue::Absent);
        assert_eq!(FieldValue::from_cell("12.5"), FieldValue::Text("12.5".into()));
        assert_eq!(FieldValue::from_cell("12.5").as_number(), Some(12.5));
        assert_eq!(FieldValue::from_cell("05300").as_text().unwrap(), "05300");
        assert_eq!(FieldValue::from_cell(" 5300.0 ").as_text().unwrap(), "5300.0");
        assert_eq!(FieldValue::from_cell("W"), FieldValue::Text("W".into()));
    }

    #[test]
    fn test_relocating_a_key_keeps_single_mapping() {
        let map = HeaderKeyMap::base().with(1, CanonicalKey::Naxis0, "NAXIS2");

        assert_eq!(
            map.get(CanonicalKey::Naxis0),
            Some(&RawField {
                block: 1,
                name: "NAXIS2".into()
            })
        );
        assert!(!map.block(0).contains_key(&CanonicalKey::Naxis0));
        assert_eq!(map.block(1).get(&CanonicalKey::Naxis0), Some(&"NAXIS2"));
        assert_eq!(map.max_block(), Some(1));
    }

    #[test]
    fn test_override_never_drops_base_keys() {
        let base = HeaderKeyMap::base();
        let derived = HeaderKeyMap::base()
            .with(0, CanonicalKey::Idname, "IMAGETYP")
            .with(0, CanonicalKey::Lamps, "CAGLAMPS");

        for key in base.keys() {
            assert!(derived.contains(key), "{key} dropped");
        }
        assert_eq!(derived.get(CanonicalKey::Idname).unwrap().name, "IMAGETYP");
    }

    #[test]
    fn test_resolve_marks_missing_fields_absent() {
        let map = HeaderKeyMap::base()
            .with(0, CanonicalKey::Lamps, "CAGLAMPS")
            .with(1, CanonicalKey::Naxis0, "NAXIS2");

        let raw = RawHeaders::new(1)
            .with(0, "EXPTIME", 30.0)
            .with(0, "CAGLAMPS", "Off");

        let row = map.resolve(&raw);
        assert_eq!(row.get(CanonicalKey::Exptime), &FieldValue::Number(30.0));
        assert_eq!(row.get(CanonicalKey::Lamps), &FieldValue::Text("Off".into()));
        // block 1 does not exist for this exposure
        assert!(row.get(CanonicalKey::Naxis0).is_absent());
        // mapped but not in the header
        assert!(row.get(CanonicalKey::Airmass).is_absent());
        // every mapped key is present in the output, absent or not
        assert_eq!(row.len(), map.keys().count());
    }
}
