use crate::shared::encoded_packet::EncodedPacket;
use crate::shared::error::RecorderError;
use crate::shared::planar_frame::PlanarFrame;
use crate::shared::stream_descriptor::StreamDescriptor;

/// Lifecycle of an encoder session.
///
/// `Open → Encoding → Flushing → Drained → Closed`. `close` is reachable
/// from every state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncoderState {
    /// Codec opened, nothing submitted yet.
    Open,
    /// At least one frame submitted.
    Encoding,
    /// Flush signal sent; buffered packets are still coming out.
    Flushing,
    /// The codec reported end of stream.
    Drained,
    Closed,
}

impl EncoderState {
    /// Whether `submit(Some(frame))` or `submit(None)` is legal.
    pub fn accepts_input(&self) -> bool {
        matches!(self, EncoderState::Open | EncoderState::Encoding)
    }
}

/// A configured, opened codec that turns planar frames into packets.
///
/// Codecs buffer internally: a submission may yield zero or several
/// packets, so callers must drain with `receive_packets` after every
/// `submit`, and after the flush signal until the sequence ends.
pub trait EncoderSession: Send {
    /// Stream parameters for the container header.
    fn descriptor(&self) -> &StreamDescriptor;

    fn state(&self) -> EncoderState;

    /// Submits a frame, or the flush signal when `frame` is `None`.
    ///
    /// Each frame gets the next presentation timestamp (0, 1, 2, ...).
    /// The flush signal may be sent once; any submission after it fails.
    fn submit(&mut self, frame: Option<&PlanarFrame>) -> Result<(), RecorderError>;

    /// Pulls one packet if the codec has one ready.
    ///
    /// `Ok(None)` means "nothing more right now" while encoding, and
    /// "end of stream" once flushing.
    fn receive_packet(&mut self) -> Result<Option<EncodedPacket>, RecorderError>;

    /// Releases codec resources. Further calls are no-ops.
    fn close(&mut self);
}

impl<'s> dyn EncoderSession + 's {
    /// Lazily drains every packet currently available.
    pub fn receive_packets(&mut self) -> PacketDrain<'_> {
        PacketDrain {
            session: self,
            done: false,
        }
    }
}

/// Iterator returned by `receive_packets`. Stops at the first "no output"
/// answer or after yielding an error.
pub struct PacketDrain<'a> {
    session: &'a mut (dyn EncoderSession + 'a),
    done: bool,
}

impl Iterator for PacketDrain<'_> {
    type Item = Result<EncodedPacket, RecorderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.session.receive_packet() {
            Ok(Some(packet)) => Some(Ok(packet)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
