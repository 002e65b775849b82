use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};

use crate::container::domain::container_writer::{ContainerFormat, ContainerWriter};
use crate::conversion::infrastructure::swscale_converter::planar_pixel;
use crate::ffmpeg_runtime::{from_av_rational, to_av_rational};
use crate::shared::encoded_packet::EncodedPacket;
use crate::shared::error::RecorderError;
use crate::shared::rational::Rational;
use crate::shared::stream_descriptor::StreamDescriptor;

const VIDEO_STREAM_INDEX: usize = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WriterState {
    /// Format probed, nothing on disk yet.
    Pending,
    /// Header written, accepting packets.
    Writing,
    Finalized,
}

/// Muxes a single video stream through libavformat.
///
/// The container format is guessed from the file name at construction
/// without touching the file system; the file itself is only created by
/// `begin`.
pub struct FfmpegContainerWriter {
    path: PathBuf,
    format: ContainerFormat,
    octx: Option<ffmpeg_next::format::context::Output>,
    state: WriterState,
    stream_time_base: Option<Rational>,
    last_dts: Option<i64>,
    packets_written: u64,
}

// Safety: FfmpegContainerWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegContainerWriter {}

impl FfmpegContainerWriter {
    pub fn new(path: &Path) -> Result<Self, RecorderError> {
        let format = probe_format(path)?;
        log::debug!(
            "container {} ({}) for {}: video codec {}, encoder {:?}, global header {}",
            format.name,
            format.long_name,
            path.display(),
            format.video_codec,
            format.video_encoder,
            format.global_header
        );
        Ok(Self {
            path: path.to_path_buf(),
            format,
            octx: None,
            state: WriterState::Pending,
            stream_time_base: None,
            last_dts: None,
            packets_written: 0,
        })
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    fn open_output(&self, descriptor: &StreamDescriptor) -> Result<ffmpeg_next::format::context::Output, RecorderError> {
        let codec = ffmpeg_next::encoder::find_by_name(&descriptor.encoder_name).ok_or_else(|| {
            RecorderError::initialization(
                "stream",
                format!("unknown encoder {}", descriptor.encoder_name),
            )
        })?;

        let mut octx = ffmpeg_next::format::output_as(&self.path, &self.format.name).map_err(|e| {
            RecorderError::OutputOpen {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut ost = octx
            .add_stream(Some(codec))
            .map_err(|e| RecorderError::initialization("stream", e))?;
        ost.set_time_base(to_av_rational(descriptor.time_base));
        ost.set_rate(to_av_rational(descriptor.frame_rate));
        ost.set_avg_frame_rate(to_av_rational(descriptor.frame_rate));
        unsafe { fill_parameters(ost.parameters().as_mut_ptr(), codec.id(), descriptor)? };

        Ok(octx)
    }
}

impl ContainerWriter for FfmpegContainerWriter {
    fn format(&self) -> &ContainerFormat {
        &self.format
    }

    fn begin(&mut self, descriptor: &StreamDescriptor) -> Result<(), RecorderError> {
        if self.state != WriterState::Pending {
            return Err(RecorderError::InvalidState(format!(
                "stream header already committed ({:?})",
                self.state
            )));
        }

        let mut octx = self.open_output(descriptor)?;

        if let Err(e) = octx.write_header() {
            // Leave nothing that looks like a recording behind.
            drop(octx);
            let _ = std::fs::remove_file(&self.path);
            return Err(RecorderError::initialization("container header", e));
        }

        let muxer_time_base = octx
            .stream(VIDEO_STREAM_INDEX)
            .map(|s| s.time_base())
            .unwrap_or_else(|| to_av_rational(descriptor.time_base));
        let stream_time_base = from_av_rational(muxer_time_base, descriptor.time_base);
        log::info!(
            "writing {} to {} (stream time-base {}, encoder time-base {})",
            self.format.name,
            self.path.display(),
            stream_time_base,
            descriptor.time_base
        );

        self.stream_time_base = Some(stream_time_base);
        self.octx = Some(octx);
        self.state = WriterState::Writing;
        Ok(())
    }

    fn stream_time_base(&self) -> Option<Rational> {
        self.stream_time_base
    }

    fn write(&mut self, mut packet: EncodedPacket) -> Result<(), RecorderError> {
        if self.state != WriterState::Writing {
            return Err(RecorderError::InvalidState(format!(
                "cannot write packets while {:?}",
                self.state
            )));
        }
        let octx = self
            .octx
            .as_mut()
            .ok_or_else(|| RecorderError::InvalidState("output not open".into()))?;

        if let Some(target) = self.stream_time_base {
            packet.rescale_to(target);
        }

        let dts = packet.decode_ts();
        if let (Some(last), Some(current)) = (self.last_dts, dts) {
            if current < last {
                return Err(RecorderError::Encoding(format!(
                    "decode timestamp went backwards ({current} after {last})"
                )));
            }
        }

        let mut av_packet = ffmpeg_next::Packet::copy(&packet.data);
        av_packet.set_pts(packet.pts);
        av_packet.set_dts(packet.dts);
        av_packet.set_duration(packet.duration);
        av_packet.set_stream(VIDEO_STREAM_INDEX);
        av_packet.set_position(-1);
        if packet.is_key {
            av_packet.set_flags(ffmpeg_next::codec::packet::Flags::KEY);
        }

        av_packet
            .write_interleaved(octx)
            .map_err(|e| RecorderError::Io(e.to_string()))?;

        if dts.is_some() {
            self.last_dts = dts;
        }
        self.packets_written += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), RecorderError> {
        match self.state {
            WriterState::Pending => {
                log::debug!("finalize before begin: nothing was written");
                self.state = WriterState::Finalized;
                Ok(())
            }
            WriterState::Finalized => {
                log::debug!("{} already finalized", self.path.display());
                Ok(())
            }
            WriterState::Writing => {
                // No retry of a failed trailer.
                self.state = WriterState::Finalized;
                let mut octx = self
                    .octx
                    .take()
                    .ok_or_else(|| RecorderError::InvalidState("output not open".into()))?;
                octx.write_trailer()
                    .map_err(|e| RecorderError::Io(format!("trailer: {e}")))?;
                log::info!(
                    "finalized {} ({} packets)",
                    self.path.display(),
                    self.packets_written
                );
                Ok(())
            }
        }
    }
}

impl Drop for FfmpegContainerWriter {
    fn drop(&mut self) {
        if self.state == WriterState::Writing {
            if let Err(e) = self.finalize() {
                log::warn!("finalizing {} on drop failed: {e}", self.path.display());
            }
        }
    }
}

/// Guesses the muxer from the file name, like `avformat_alloc_output_context2`
/// would, but without allocating a context or opening the file.
fn probe_format(path: &Path) -> Result<ContainerFormat, RecorderError> {
    let file_name = path
        .to_str()
        .ok_or_else(|| RecorderError::initialization("container", "path is not valid UTF-8"))?;
    let c_name = CString::new(file_name).map_err(|e| RecorderError::initialization("container", e))?;

    let ptr = unsafe {
        ffmpeg_next::ffi::av_guess_format(std::ptr::null(), c_name.as_ptr(), std::ptr::null())
    };
    if ptr.is_null() {
        return Err(RecorderError::initialization(
            "container",
            format!("no container format matches {}", path.display()),
        ));
    }

    let (name, long_name, codec_id, flags) = unsafe {
        let fmt = &*ptr;
        (
            c_str(fmt.name),
            c_str(fmt.long_name),
            ffmpeg_next::codec::Id::from(fmt.video_codec),
            fmt.flags,
        )
    };

    Ok(ContainerFormat {
        name,
        long_name,
        video_codec: codec_id.name().to_string(),
        video_encoder: ffmpeg_next::encoder::find(codec_id).map(|c| c.name().to_string()),
        global_header: (flags & ffmpeg_next::ffi::AVFMT_GLOBALHEADER as i32) != 0,
    })
}

unsafe fn c_str(ptr: *const std::os::raw::c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// Commits the descriptor into the stream's codec parameters.
unsafe fn fill_parameters(
    par: *mut ffmpeg_next::ffi::AVCodecParameters,
    codec_id: ffmpeg_next::codec::Id,
    descriptor: &StreamDescriptor,
) -> Result<(), RecorderError> {
    (*par).codec_type = ffmpeg_next::ffi::AVMediaType::AVMEDIA_TYPE_VIDEO;
    (*par).codec_id = codec_id.into();
    (*par).width = descriptor.width as i32;
    (*par).height = descriptor.height as i32;
    (*par).format = ffmpeg_next::ffi::AVPixelFormat::from(planar_pixel(descriptor.pixel_format)) as i32;
    (*par).bit_rate = descriptor.bit_rate as i64;

    if !descriptor.extradata.is_empty() {
        let len = descriptor.extradata.len();
        let padding = ffmpeg_next::ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize;
        let buf = ffmpeg_next::ffi::av_mallocz(len + padding) as *mut u8;
        if buf.is_null() {
            return Err(RecorderError::initialization("stream", "out of memory for extradata"));
        }
        std::ptr::copy_nonoverlapping(descriptor.extradata.as_ptr(), buf, len);
        (*par).extradata = buf;
        (*par).extradata_size = len as i32;
    }
    Ok(())
}
