use crate::shared::raw_frame::PixelLayout;

pub const OUTPUT_WIDTH: u32 = 1280;
pub const OUTPUT_HEIGHT: u32 = 720;

/// Frames per second as a `(numerator, denominator)` pair.
pub const FRAME_RATE: (i32, i32) = (24, 1);

/// 0 leaves rate control to the codec (CRF for x264).
pub const BIT_RATE: u64 = 0;

/// Equivalent of `-preset veryfast -crf 23 -profile:v high -level 4.1`.
pub const CODEC_OPTIONS: &[(&str, &str)] = &[
    ("preset", "veryfast"),
    ("crf", "23"),
    ("profile", "high"),
    ("level", "4.1"),
];

/// Layout the capture side hands to the converter.
pub const CAPTURE_LAYOUT: PixelLayout = PixelLayout::Bgr24;

/// Bounded queue depth between capture and encode in the threaded executor.
pub const FRAME_QUEUE_CAPACITY: usize = 8;

/// Row alignment for planar buffers, matching what SIMD paths in codec
/// libraries expect.
pub const PLANE_ALIGNMENT: usize = 32;

#[cfg(target_os = "linux")]
pub const DEFAULT_INPUT_FORMAT: &str = "v4l2";
#[cfg(target_os = "linux")]
pub const DEFAULT_DEVICE: &str = "/dev/video0";

#[cfg(target_os = "macos")]
pub const DEFAULT_INPUT_FORMAT: &str = "avfoundation";
#[cfg(target_os = "macos")]
pub const DEFAULT_DEVICE: &str = "0";

#[cfg(target_os = "windows")]
pub const DEFAULT_INPUT_FORMAT: &str = "dshow";
#[cfg(target_os = "windows")]
pub const DEFAULT_DEVICE: &str = "video=Integrated Camera";

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub const DEFAULT_INPUT_FORMAT: &str = "v4l2";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub const DEFAULT_DEVICE: &str = "/dev/video0";
