mod common;

use calibkit::{
    calibkit::CalibKit,
    config::ReductionConfig,
    frame_type::FrameType,
    metadata::read_metadata_csv_path,
};
use common::{night_rows, NIGHT_TABLE};

#[test]
fn test_night_association() {
    let kit = CalibKit::new("wht_isis_blue").unwrap();
    let rows = night_rows();
    let classifications = kit.classify_table(&rows);
    let sets = kit.associate(&rows, &classifications);

    // both science exposures anchor a calibration set
    assert_eq!(sets.iter().map(|set| set.anchor).collect::<Vec<_>>(), vec![4, 6]);

    for set in &sets {
        assert_eq!(set.candidates(FrameType::Bias), &[0, 1]);
        assert_eq!(set.candidates(FrameType::PixelFlat), &[2]);
        assert_eq!(set.candidates(FrameType::Trace), &[2]);
        // r2006 was taken at another grating angle
        assert_eq!(set.candidates(FrameType::Arc), &[3]);
    }
    assert!(kit.check_calibrations(&sets).is_empty());
}

#[test]
fn test_missing_calibrations_are_reported() {
    let kit = CalibKit::new("wht_isis_blue").unwrap();
    let records = read_metadata_csv_path(NIGHT_TABLE).unwrap();
    // drop the flat
    let rows = records
        .into_iter()
        .filter(|record| record.filename.as_deref() != Some("r2003.fit"))
        .map(|record| record.row)
        .collect::<Vec<_>>();

    let classifications = kit.classify_table(&rows);
    let sets = kit.associate(&rows, &classifications);
    let report = kit.check_calibrations(&sets);

    assert_eq!(report.len(), 2);
    for missing in report.values() {
        assert_eq!(missing, &vec![FrameType::Trace, FrameType::PixelFlat]);
    }
}

#[test]
fn test_configured_requirements() {
    let config = ReductionConfig::from_json_str(
        r#"{"spectrograph": "wht_isis_blue", "required_calibrations": ["bias", "arc"]}"#,
    )
    .unwrap();
    let kit = CalibKit::from_config(&config).unwrap();

    let rows = night_rows()
        .into_iter()
        .enumerate()
        .filter(|(index, _)| *index != 2)
        .map(|(_, row)| row)
        .collect::<Vec<_>>();
    let classifications = kit.classify_table(&rows);
    let sets = kit.associate(&rows, &classifications);
    assert!(kit.check_calibrations(&sets).is_empty());
}
