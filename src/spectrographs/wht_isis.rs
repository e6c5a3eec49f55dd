//! Blue arm of the ISIS double-arm spectrograph on the William Herschel Telescope (La Palma).
//!
//! Two header blocks: the instrument setup lives in the primary header, the pixel
//! geometry in the extension.
use crate::{
    arc_params::{ArcDecisionTable, LampOverride},
    calibkit_errors::CalibError,
    detector::{DataSection, Detector, Telescope},
    frame_type::FrameType,
    header_keys::{CanonicalKey, HeaderKeyMap},
    match_criteria::{MatchCriteria, MatchRule},
};

use super::{ConditionSource, Spectrograph};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhtIsisBlue;

impl Spectrograph for WhtIsisBlue {
    fn name(&self) -> &str {
        "wht_isis_blue"
    }

    fn camera(&self) -> &str {
        "ISISb"
    }

    fn telescope(&self) -> Telescope {
        Telescope {
            name: "WHT".into(),
            longitude: -17.8816,
            latitude: 28.7606,
            elevation: 2344.,
            diameter: 4.2,
        }
    }

    fn detectors(&self) -> Result<Vec<Detector>, CalibError> {
        Ok(vec![Detector {
            data_ext: 1,
            disp_axis: 0,
            x_gap: 0.,
            y_gap: 0.,
            y_size: 1.,
            platescale: 0.225,
            dark_current: 0.0,
            saturation: 65535.,
            nonlinear: 0.76,
            num_amplifiers: 1,
            gain: vec![1.2],
            read_noise: vec![5.0],
            data_sections: vec![DataSection::parse("[:,2:4030]")?],
            suffix: "_blue".into(),
        }])
    }

    fn num_headers(&self) -> usize {
        2
    }

    fn header_keys(&self) -> HeaderKeyMap {
        HeaderKeyMap::base()
            .with(0, CanonicalKey::Idname, "IMAGETYP")
            .with(0, CanonicalKey::Lamps, "CAGLAMPS")
            .with(0, CanonicalKey::Dichroic, "ISIDICHR")
            .with(0, CanonicalKey::Decker, "ISISLITU")
            .with(0, CanonicalKey::Slitwid, "ISISLITW")
            .with(0, CanonicalKey::Filter1, "ISIFILTA")
            .with(0, CanonicalKey::Filter2, "ISIFILTB")
            .with(0, CanonicalKey::Dispname, "ISIGRAT")
            .with(0, CanonicalKey::Dispangle, "CENWAVE")
            .with(1, CanonicalKey::Naxis1, "NAXIS1")
            .with(1, CanonicalKey::Naxis0, "NAXIS2")
    }

    fn condition_rules(&self, frame_type: FrameType) -> ConditionSource {
        let rules = match frame_type {
            FrameType::Science => vec!["lamps=Off", "exptime>1"],
            FrameType::Bias => vec!["exptime<1"],
            FrameType::PixelFlat | FrameType::Trace => vec!["lamps=W"],
            // never taken with this instrument
            FrameType::Pinhole => vec!["exptime>99999999"],
            FrameType::Arc => vec!["lamps=CuNe+CuAr", "exptime<120"],
            FrameType::Standard
            | FrameType::Dark
            | FrameType::IllumFlat
            | FrameType::Tilt => Vec::new(),
        };
        ConditionSource::Rules(rules)
    }

    fn match_criteria(&self) -> Result<MatchCriteria, CalibError> {
        let standard = MatchRule::parse(&[
            ("naxis0", "=0"),
            ("naxis1", "=0"),
            ("decker", ""),
            ("dispangle", "|<=1"),
        ])?;
        let bias = MatchRule::parse(&[("naxis0", "=0"), ("naxis1", "=0")])?;

        MatchCriteria::builder()
            .rule(FrameType::Standard, standard)
            .rule(FrameType::Bias, bias)
            .derive(FrameType::PixelFlat, FrameType::Standard)
            .derive(FrameType::Trace, FrameType::Standard)
            .derive(FrameType::Arc, FrameType::Standard)
            .build()
    }

    fn arc_table(&self) -> ArcDecisionTable {
        ArcDecisionTable::new(&["CuI", "NeI", "ArI"])
            .dichroic("5300", None, Some(6000.))
            .disperser("R300B", 1, 0.80)
            .lamp_override(
                "NeI",
                LampOverride {
                    min_intensity: Some(299.),
                    min_wave: Some(3000.),
                    min_aki: Some(0.),
                },
            )
            .lamp_override(
                "ArI",
                LampOverride {
                    min_intensity: Some(399.),
                    ..Default::default()
                },
            )
    }
}
