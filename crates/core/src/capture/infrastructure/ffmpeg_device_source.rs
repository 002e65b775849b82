use std::ffi::CString;
use std::path::Path;

use crate::capture::domain::frame_source::FrameSource;
use crate::conversion::infrastructure::swscale_converter::packed_pixel;
use crate::shared::error::RecorderError;
use crate::shared::raw_frame::{PixelLayout, RawFrame};
use crate::shared::rational::Rational;

/// What to open and what to ask the device for.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceSpec {
    /// Device URL as understood by the input format, e.g. `/dev/video0`.
    pub url: String,
    /// libavdevice input format name (`v4l2`, `avfoundation`, `dshow`,
    /// `lavfi`). `None` lets libavformat probe.
    pub input_format: Option<String>,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Rational,
}

/// Captures frames from a camera through libavdevice.
///
/// Every decoded picture is scaled to the requested resolution and packed
/// into `layout`. The returned frame is reused between grabs.
pub struct FfmpegDeviceSource {
    spec: DeviceSpec,
    ictx: Option<ffmpeg_next::format::context::Input>,
    decoder: ffmpeg_next::decoder::Video,
    stream_index: usize,
    scaler: Option<ScalerKey>,
    decoded: ffmpeg_next::util::frame::video::Video,
    packed: ffmpeg_next::util::frame::video::Video,
    frame: RawFrame,
    next_index: u64,
    flushing: bool,
    done: bool,
}

/// Scaler plus the input geometry it was built for; devices may switch
/// formats mid-stream.
struct ScalerKey {
    context: ffmpeg_next::software::scaling::Context,
    format: ffmpeg_next::format::Pixel,
    width: u32,
    height: u32,
}

// Safety: FfmpegDeviceSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegDeviceSource {}

impl FfmpegDeviceSource {
    pub fn open(spec: DeviceSpec, layout: PixelLayout) -> Result<Self, RecorderError> {
        let device_error = |reason: String| RecorderError::Device {
            device: spec.url.clone(),
            reason,
        };

        let mut options = ffmpeg_next::Dictionary::new();
        options.set("video_size", &format!("{}x{}", spec.width, spec.height));
        options.set("framerate", &spec.frame_rate.to_string());

        let ictx = match spec.input_format.as_deref() {
            Some(name) => {
                let format = find_input_format(name).map_err(device_error)?;
                ffmpeg_next::format::open_with(
                    Path::new(&spec.url),
                    &ffmpeg_next::format::format::Format::Input(format),
                    options,
                )
                .map_err(|e| device_error(e.to_string()))?
                .input()
            }
            None => ffmpeg_next::format::input_with_dictionary(Path::new(&spec.url), options)
                .map_err(|e| device_error(e.to_string()))?,
        };

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| device_error("no video stream".to_string()))?;
        let stream_index = stream.index();
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| device_error(format!("decoder: {e}")))?;

        log::info!(
            "opened {} ({}): {}x{} {:?}, delivering {}x{} {}",
            spec.url,
            spec.input_format.as_deref().unwrap_or("probed"),
            decoder.width(),
            decoder.height(),
            decoder.format(),
            spec.width,
            spec.height,
            layout.name()
        );

        let packed = ffmpeg_next::util::frame::video::Video::new(
            packed_pixel(layout),
            spec.width,
            spec.height,
        );
        let frame = RawFrame::blank(spec.width, spec.height, layout);

        Ok(Self {
            spec,
            ictx: Some(ictx),
            decoder,
            stream_index,
            scaler: None,
            decoded: ffmpeg_next::util::frame::video::Video::empty(),
            packed,
            frame,
            next_index: 0,
            flushing: false,
            done: false,
        })
    }

    /// Pulls one decoded picture if the decoder has one ready.
    fn receive_decoded(&mut self) -> Result<bool, RecorderError> {
        match self.decoder.receive_frame(&mut self.decoded) {
            Ok(()) => {
                self.pack_decoded()?;
                Ok(true)
            }
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                Ok(false)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(false),
            Err(e) => Err(RecorderError::Capture(format!("decode: {e}"))),
        }
    }

    fn pack_decoded(&mut self) -> Result<(), RecorderError> {
        let (format, width, height) = (
            self.decoded.format(),
            self.decoded.width(),
            self.decoded.height(),
        );
        let stale = self
            .scaler
            .as_ref()
            .map_or(true, |s| (s.format, s.width, s.height) != (format, width, height));
        if stale {
            log::debug!("building capture scaler for {width}x{height} {format:?}");
            let context = ffmpeg_next::software::scaling::Context::get(
                format,
                width,
                height,
                packed_pixel(self.frame.layout()),
                self.spec.width,
                self.spec.height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )
            .map_err(|e| RecorderError::Capture(format!("scaler: {e}")))?;
            self.scaler = Some(ScalerKey {
                context,
                format,
                width,
                height,
            });
        }

        if let Some(scaler) = self.scaler.as_mut() {
            scaler
                .context
                .run(&self.decoded, &mut self.packed)
                .map_err(|e| RecorderError::Capture(format!("scale: {e}")))?;
        }

        self.frame
            .copy_from_rows(self.packed.data(0), self.packed.stride(0));
        self.frame.set_index(self.next_index);
        self.next_index += 1;
        Ok(())
    }
}

impl FrameSource for FfmpegDeviceSource {
    fn grab(&mut self) -> Result<Option<&RawFrame>, RecorderError> {
        if self.done {
            return Ok(None);
        }
        loop {
            if self.receive_decoded()? {
                return Ok(Some(&self.frame));
            }
            if self.flushing {
                self.done = true;
                return Ok(None);
            }

            let ictx = self
                .ictx
                .as_mut()
                .ok_or_else(|| RecorderError::InvalidState("capture device closed".into()))?;
            let mut packet = ffmpeg_next::Packet::empty();
            match classify_read(packet.read(ictx))? {
                PacketRead::Ready => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| RecorderError::Capture(format!("send_packet: {e}")))?;
                }
                PacketRead::Retry => continue,
                PacketRead::EndOfStream => {
                    log::info!("capture device {} reached end of stream", self.spec.url);
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                }
            }
        }
    }

    fn close(&mut self) {
        if self.ictx.take().is_some() {
            log::debug!("closed capture device {} after {} frames", self.spec.url, self.next_index);
        }
        self.done = true;
    }
}

/// Outcome of one demuxer read.
#[derive(Debug, PartialEq, Eq)]
enum PacketRead {
    Ready,
    Retry,
    EndOfStream,
}

/// Any read error other than EAGAIN or end of file is a capture failure,
/// so an unplugged camera ends the recording instead of spinning.
fn classify_read(result: Result<(), ffmpeg_next::Error>) -> Result<PacketRead, RecorderError> {
    match result {
        Ok(()) => Ok(PacketRead::Ready),
        Err(ffmpeg_next::Error::Eof) => Ok(PacketRead::EndOfStream),
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
            Ok(PacketRead::Retry)
        }
        Err(e) => Err(RecorderError::Capture(format!("read: {e}"))),
    }
}

/// Resolves an input format by name via `av_find_input_format`.
fn find_input_format(name: &str) -> Result<ffmpeg_next::format::format::Input, String> {
    let cname = CString::new(name).map_err(|e| format!("invalid input format {name:?}: {e}"))?;
    let ptr = unsafe { ffmpeg_next::ffi::av_find_input_format(cname.as_ptr()) };
    if ptr.is_null() {
        return Err(format!("input format not found: {name}"));
    }
    Ok(unsafe { ffmpeg_next::format::format::Input::wrap(ptr as *mut _) })
}
