use approx::assert_relative_eq;
use calibkit::{
    arc_params::ArcParameters,
    header_keys::{CanonicalKey, CanonicalRow},
    metadata::{read_metadata_csv_path, MetadataRecord},
};

pub const NIGHT_TABLE: &str = "tests/data/isis_blue_night.csv";

pub fn night_rows() -> Vec<CanonicalRow> {
    read_metadata_csv_path(NIGHT_TABLE)
        .unwrap()
        .into_iter()
        .map(|MetadataRecord { row, .. }| row)
        .collect()
}

pub fn row(pairs: &[(CanonicalKey, &str)]) -> CanonicalRow {
    pairs
        .iter()
        .map(|(key, value)| (*key, calibkit::header_keys::FieldValue::from_cell(value)))
        .collect()
}

pub fn assert_arc_params_close(actual: &ArcParameters, expected: &ArcParameters, epsilon: f64) {
    assert_eq!(actual.lamps, expected.lamps);
    assert_eq!(actual.n_first, expected.n_first);
    assert_eq!(actual.n_final, expected.n_final);
    assert_relative_eq!(actual.wave_min, expected.wave_min, epsilon = epsilon);
    assert_relative_eq!(actual.wave_max, expected.wave_max, epsilon = epsilon);
    assert_relative_eq!(actual.disp, expected.disp, epsilon = epsilon);
    assert_relative_eq!(actual.b1, expected.b1, epsilon = epsilon);
    assert_relative_eq!(actual.b2, expected.b2, epsilon = epsilon);
}
