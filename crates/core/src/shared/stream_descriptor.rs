use crate::shared::planar_frame::PlanarLayout;
use crate::shared::rational::Rational;

/// Everything the container needs to describe the video stream in its
/// header. Produced by an opened encoder, consumed once by the writer.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamDescriptor {
    /// Encoder implementation, e.g. `libx264`.
    pub encoder_name: String,
    /// Bitstream format, e.g. `h264`.
    pub codec_name: String,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PlanarLayout,
    pub time_base: Rational,
    pub frame_rate: Rational,
    pub bit_rate: u64,
    /// Out-of-band codec headers (SPS/PPS for H.264) when the container
    /// stores them globally.
    pub extradata: Vec<u8>,
}
