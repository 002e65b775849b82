use std::collections::BTreeMap;

use crate::shared::constants::{BIT_RATE, CODEC_OPTIONS, FRAME_RATE, OUTPUT_HEIGHT, OUTPUT_WIDTH};
use crate::shared::planar_frame::PlanarLayout;
use crate::shared::rational::Rational;

/// How the encoder is chosen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodecChoice {
    /// The output container's preferred video codec (H.264 for `.mp4`).
    ContainerDefault,
    /// A specific encoder by name, e.g. `mpeg4`.
    Named(String),
}

/// Encoding parameters fixed for the lifetime of one recording.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: Rational,
    pub codec: CodecChoice,
    pub pixel_format: PlanarLayout,
    /// 0 lets the codec pick (CRF driven for x264).
    pub bit_rate: u64,
    pub codec_options: BTreeMap<String, String>,
}

impl SessionConfig {
    /// One tick per frame.
    pub fn time_base(&self) -> Rational {
        self.frame_rate.invert()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: OUTPUT_WIDTH,
            height: OUTPUT_HEIGHT,
            frame_rate: Rational::new(FRAME_RATE.0, FRAME_RATE.1),
            codec: CodecChoice::ContainerDefault,
            pixel_format: PlanarLayout::Yuv420p,
            bit_rate: BIT_RATE,
            codec_options: CODEC_OPTIONS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}
