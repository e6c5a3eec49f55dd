mod common;

use calibkit::{
    calibkit::CalibKit,
    calibkit_errors::CalibError,
    classify::classify_table,
    frame_type::FrameType,
    header_keys::{CanonicalKey, RawHeaders},
    spectrographs::load_profile,
};
use common::{night_rows, row};

#[test]
fn test_science_scenario() {
    let kit = CalibKit::new("wht_isis_blue").unwrap();
    let classification = kit.classify(&row(&[
        (CanonicalKey::Lamps, "Off"),
        (CanonicalKey::Exptime, "30"),
    ]));
    assert_eq!(
        classification.frame_types.into_iter().collect::<Vec<_>>(),
        vec![FrameType::Science]
    );
}

#[test]
fn test_bias_scenario() {
    let kit = CalibKit::new("wht_isis_blue").unwrap();
    let classification = kit.classify(&row(&[(CanonicalKey::Exptime, "0.5")]));
    assert_eq!(
        classification.frame_types.into_iter().collect::<Vec<_>>(),
        vec![FrameType::Bias]
    );
}

#[test]
fn test_classify_raw_headers() {
    let kit = CalibKit::new("wht_isis_blue").unwrap();
    let raw = RawHeaders::new(2)
        .with(0, "CAGLAMPS", "CuNe+CuAr")
        .with(0, "EXPTIME", 20.0)
        .with(0, "ISIGRAT", "R300B")
        .with(0, "ISIDICHR", "5300")
        .with(1, "NAXIS1", 1100_i64)
        .with(1, "NAXIS2", 4200_i64);

    let classification = kit.classify_headers(&raw);
    assert_eq!(classification.single(), Ok(FrameType::Arc));

    // lamps read from the wrong block: absent, not defaulted
    let misplaced = RawHeaders::new(2)
        .with(1, "CAGLAMPS", "Off")
        .with(0, "EXPTIME", 600.0);
    let classification = kit.classify_headers(&misplaced);
    assert!(classification.is_unclassified());
    assert!(classification.missing_fields.contains(&CanonicalKey::Lamps));
}

#[test]
fn test_night_table() {
    let profile = load_profile("wht_isis_blue").unwrap();
    let rows = night_rows();
    let classifications = classify_table(&profile, &rows);

    let singles = classifications
        .iter()
        .map(|classification| classification.single().ok())
        .collect::<Vec<_>>();
    assert_eq!(
        singles,
        vec![
            Some(FrameType::Bias),
            Some(FrameType::Bias),
            None,
            Some(FrameType::Arc),
            Some(FrameType::Science),
            Some(FrameType::Arc),
            Some(FrameType::Science),
            None,
        ]
    );

    assert!(classifications[2].contains(FrameType::PixelFlat));
    assert!(classifications[2].contains(FrameType::Trace));
    assert_eq!(
        classifications[7].single(),
        Err(CalibError::ClassificationAmbiguity { candidates: vec![] })
    );
}

#[test]
fn test_classification_is_deterministic() {
    let kit = CalibKit::new("wht_isis_blue").unwrap();
    let rows = std::iter::repeat_n(night_rows(), 50)
        .flatten()
        .collect::<Vec<_>>();

    let reference = kit.classify_table(&rows);
    for _ in 0..5 {
        assert_eq!(kit.classify_table(&rows), reference);
    }
    let reversed = rows.iter().rev().cloned().collect::<Vec<_>>();
    let mut reversed_out = kit.classify_table(&reversed);
    reversed_out.reverse();
    assert_eq!(reversed_out, reference);
}
