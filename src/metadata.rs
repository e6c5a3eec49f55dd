//! Metadata table input.
//!
//! The external metadata-extraction step (a FITS reader) may dump its canonical table
//! as CSV: a header row with `filename` and canonical key names, one exposure per line.
//!
//! ```text
//! filename,lamps,exptime,dispname,dichroic,naxis0,naxis1
//! r1001.fit,Off,600,R300B,5300,4200,1100
//! r1002.fit,CuNe+CuAr,30,R300B,5300,4200,1100
//! ```
//!
//! Cells are kept as written, empty cells become [`FieldValue::Absent`]. A column whose
//! name is not a canonical key is rejected rather than silently dropped.
use std::{fs::File, io::Read, path::Path};

use crate::{
    calibkit_errors::CalibError,
    header_keys::{CanonicalKey, CanonicalRow, FieldValue},
};

const FILENAME_COLUMN: &str = "filename";

/// One exposure of a metadata table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataRecord {
    pub filename: Option<String>,
    pub row: CanonicalRow,
}

/// Column role, resolved once from the header row.
enum Column {
    Filename,
    Key(CanonicalKey),
}

/// Read a canonical metadata table from any CSV source.
pub fn read_metadata_csv<R: Read>(reader: R) -> Result<Vec<MetadataRecord>, CalibError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let columns = csv_reader
        .headers()?
        .iter()
        .map(|name| {
            if name.eq_ignore_ascii_case(FILENAME_COLUMN) {
                Ok(Column::Filename)
            } else {
                name.parse().map(Column::Key)
            }
        })
        .collect::<Result<Vec<_>, CalibError>>()?;

    let records = csv_reader
        .records()
        .map(|record| -> Result<MetadataRecord, CalibError> {
            let record = record?;
            let mut entry = MetadataRecord::default();
            for (column, cell) in columns.iter().zip(record.iter()) {
                match column {
                    Column::Filename => {
                        let name = cell.trim();
                        entry.filename = (!name.is_empty()).then(|| name.to_string());
                    }
                    Column::Key(key) => entry.row.insert(*key, FieldValue::from_cell(cell)),
                }
            }
            Ok(entry)
        })
        .collect::<Result<Vec<_>, CalibError>>()?;

    log::debug!(
        "Read {} metadata rows over {} columns",
        records.len(),
        columns.len()
    );
    Ok(records)
}

/// Read a canonical metadata table from a CSV file.
pub fn read_metadata_csv_path(path: impl AsRef<Path>) -> Result<Vec<MetadataRecord>, CalibError> {
    let file = File::open(path.as_ref())?;
    read_metadata_csv(file)
}
