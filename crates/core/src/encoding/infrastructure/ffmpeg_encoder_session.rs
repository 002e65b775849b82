use crate::container::domain::container_writer::ContainerFormat;
use crate::conversion::infrastructure::swscale_converter::planar_pixel;
use crate::encoding::domain::encoder_session::{EncoderSession, EncoderState};
use crate::ffmpeg_runtime::{from_av_rational, to_av_rational};
use crate::shared::encoded_packet::EncodedPacket;
use crate::shared::error::RecorderError;
use crate::shared::planar_frame::PlanarFrame;
use crate::shared::rational::Rational;
use crate::shared::session_config::{CodecChoice, SessionConfig};
use crate::shared::stream_descriptor::StreamDescriptor;

/// Video encoder backed by libavcodec via ffmpeg-next.
///
/// Owns the codec context and one reusable input frame. Planes submitted
/// through [`EncoderSession::submit`] are copied into that frame and
/// stamped with a frame counter as pts.
pub struct FfmpegEncoderSession {
    encoder: Option<ffmpeg_next::codec::encoder::video::Encoder>,
    frame: ffmpeg_next::util::frame::video::Video,
    descriptor: StreamDescriptor,
    time_base: Rational,
    state: EncoderState,
    next_pts: i64,
}

// Safety: FfmpegEncoderSession is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegEncoderSession {}

impl FfmpegEncoderSession {
    /// Locates, configures and opens the encoder for `container`.
    pub fn open(config: &SessionConfig, container: &ContainerFormat) -> Result<Self, RecorderError> {
        let codec = find_codec(&config.codec, container)?;
        let codec_name = codec.name().to_string();
        let open_error = |e: ffmpeg_next::Error| RecorderError::CodecOpen {
            codec: codec_name.clone(),
            reason: e.to_string(),
        };

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(open_error)?;

        let pixel = planar_pixel(config.pixel_format);
        encoder_ctx.set_width(config.width);
        encoder_ctx.set_height(config.height);
        encoder_ctx.set_format(pixel);
        encoder_ctx.set_time_base(to_av_rational(config.time_base()));
        encoder_ctx.set_frame_rate(Some(to_av_rational(config.frame_rate)));
        encoder_ctx.set_bit_rate(config.bit_rate as usize);

        if container.global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut options = ffmpeg_next::Dictionary::new();
        for (key, value) in &config.codec_options {
            options.set(key, value);
        }

        let encoder = encoder_ctx.open_with(options).map_err(open_error)?;

        // Some codecs adjust the time-base while opening.
        let av_time_base: ffmpeg_next::Rational = unsafe { (*encoder.as_ptr()).time_base.into() };
        let time_base = from_av_rational(av_time_base, config.time_base());

        let descriptor = StreamDescriptor {
            encoder_name: codec_name.clone(),
            codec_name: codec.id().name().to_string(),
            width: config.width,
            height: config.height,
            pixel_format: config.pixel_format,
            time_base,
            frame_rate: config.frame_rate,
            bit_rate: config.bit_rate,
            extradata: extradata(&encoder),
        };

        log::info!(
            "encoder {} opened: {}x{} {} @ {} fps, time-base {}, {} bytes extradata",
            codec_name,
            config.width,
            config.height,
            config.pixel_format.name(),
            config.frame_rate,
            time_base,
            descriptor.extradata.len()
        );

        Ok(Self {
            encoder: Some(encoder),
            frame: ffmpeg_next::util::frame::video::Video::new(pixel, config.width, config.height),
            descriptor,
            time_base,
            state: EncoderState::Open,
            next_pts: 0,
        })
    }

    /// Number of frames submitted so far.
    pub fn frames_submitted(&self) -> i64 {
        self.next_pts
    }
}

impl EncoderSession for FfmpegEncoderSession {
    fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    fn state(&self) -> EncoderState {
        self.state
    }

    fn submit(&mut self, frame: Option<&PlanarFrame>) -> Result<(), RecorderError> {
        if !self.state.accepts_input() {
            return Err(RecorderError::InvalidState(format!(
                "cannot submit to encoder in state {:?}",
                self.state
            )));
        }
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| RecorderError::InvalidState("encoder closed".into()))?;

        let Some(planar) = frame else {
            encoder
                .send_eof()
                .map_err(|e| RecorderError::Encoding(format!("flush: {e}")))?;
            self.state = EncoderState::Flushing;
            log::debug!("encoder flush signalled after {} frames", self.next_pts);
            return Ok(());
        };

        if planar.width() != self.frame.width() || planar.height() != self.frame.height() {
            return Err(RecorderError::Encoding(format!(
                "frame is {}x{}, encoder expects {}x{}",
                planar.width(),
                planar.height(),
                self.frame.width(),
                self.frame.height()
            )));
        }

        // The codec may still hold a reference to the previous buffer.
        let ret = unsafe { ffmpeg_next::ffi::av_frame_make_writable(self.frame.as_mut_ptr()) };
        if ret < 0 {
            return Err(RecorderError::Encoding(format!(
                "frame buffer not writable: {}",
                ffmpeg_next::Error::from(ret)
            )));
        }

        for i in 0..planar.plane_count() {
            let stride = self.frame.stride(i);
            planar.plane(i).copy_to(self.frame.data_mut(i), stride);
        }
        self.frame.set_pts(Some(self.next_pts));

        encoder
            .send_frame(&self.frame)
            .map_err(|e| RecorderError::Encoding(format!("send frame {}: {e}", self.next_pts)))?;

        self.next_pts += 1;
        self.state = EncoderState::Encoding;
        Ok(())
    }

    fn receive_packet(&mut self) -> Result<Option<EncodedPacket>, RecorderError> {
        let encoder = match self.state {
            EncoderState::Closed => {
                return Err(RecorderError::InvalidState("encoder closed".into()))
            }
            EncoderState::Drained => return Ok(None),
            _ => self
                .encoder
                .as_mut()
                .ok_or_else(|| RecorderError::InvalidState("encoder closed".into()))?,
        };

        let mut packet = ffmpeg_next::Packet::empty();
        match encoder.receive_packet(&mut packet) {
            Ok(()) => Ok(Some(EncodedPacket {
                data: packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
                pts: packet.pts(),
                dts: packet.dts(),
                duration: packet.duration(),
                is_key: packet.is_key(),
                time_base: self.time_base,
            })),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                Ok(None)
            }
            Err(ffmpeg_next::Error::Eof) => {
                self.state = EncoderState::Drained;
                log::debug!("encoder drained");
                Ok(None)
            }
            Err(e) => Err(RecorderError::Encoding(format!("receive packet: {e}"))),
        }
    }

    fn close(&mut self) {
        if self.encoder.take().is_some() {
            log::debug!("encoder closed after {} frames", self.next_pts);
        }
        self.state = EncoderState::Closed;
    }
}

fn find_codec(
    choice: &CodecChoice,
    container: &ContainerFormat,
) -> Result<ffmpeg_next::Codec, RecorderError> {
    let name = match choice {
        CodecChoice::ContainerDefault => container
            .video_encoder
            .as_deref()
            .ok_or_else(|| RecorderError::CodecUnavailable(container.video_codec.clone()))?,
        CodecChoice::Named(name) => name.as_str(),
    };
    ffmpeg_next::encoder::find_by_name(name)
        .filter(|codec| codec.is_encoder() && codec.medium() == ffmpeg_next::media::Type::Video)
        .ok_or_else(|| RecorderError::CodecUnavailable(name.to_string()))
}

fn extradata(encoder: &ffmpeg_next::codec::encoder::video::Encoder) -> Vec<u8> {
    unsafe {
        let ctx = encoder.as_ptr();
        if (*ctx).extradata.is_null() || (*ctx).extradata_size <= 0 {
            return Vec::new();
        }
        std::slice::from_raw_parts((*ctx).extradata, (*ctx).extradata_size as usize).to_vec()
    }
}
