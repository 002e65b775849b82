use crate::shared::encoded_packet::EncodedPacket;
use crate::shared::error::RecorderError;
use crate::shared::rational::Rational;
use crate::shared::stream_descriptor::StreamDescriptor;

/// Properties of the output container, known before anything is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerFormat {
    /// Short muxer name, e.g. `mp4`.
    pub name: String,
    pub long_name: String,
    /// Bitstream the container prefers for video, e.g. `h264`.
    pub video_codec: String,
    /// Encoder able to produce `video_codec`, if one is available.
    pub video_encoder: Option<String>,
    /// Codec headers live in the file header rather than in-band.
    pub global_header: bool,
}

/// Writes one video stream into a container file.
///
/// Call order: `begin` once, `write` any number of times, `finalize`.
pub trait ContainerWriter: Send {
    fn format(&self) -> &ContainerFormat;

    /// Opens the output and writes the file header for `descriptor`.
    fn begin(&mut self, descriptor: &StreamDescriptor) -> Result<(), RecorderError>;

    /// Time-base the muxer settled on for the stream. Available after
    /// `begin`.
    fn stream_time_base(&self) -> Option<Rational>;

    /// Appends one packet, rescaling its timestamps to the stream
    /// time-base. Decode timestamps must not go backwards.
    fn write(&mut self, packet: EncodedPacket) -> Result<(), RecorderError>;

    /// Writes the trailer and closes the file. Calling it again is a
    /// no-op.
    fn finalize(&mut self) -> Result<(), RecorderError>;
}
