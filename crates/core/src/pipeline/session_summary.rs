use std::fmt;
use std::path::{Path, PathBuf};

use crate::container::domain::container_writer::ContainerFormat;
use crate::shared::stream_descriptor::StreamDescriptor;

/// Session parameters shown once before recording starts.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub output: PathBuf,
    pub format: String,
    pub encoder: String,
    pub bit_rate: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub pixel_format: &'static str,
}

impl SessionSummary {
    pub fn new(output: &Path, format: &ContainerFormat, descriptor: &StreamDescriptor) -> Self {
        Self {
            output: output.to_path_buf(),
            format: format.name.clone(),
            encoder: descriptor.encoder_name.clone(),
            bit_rate: descriptor.bit_rate,
            width: descriptor.width,
            height: descriptor.height,
            fps: descriptor.frame_rate.as_f64(),
            pixel_format: descriptor.pixel_format.name(),
        }
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "output file: {}", self.output.display())?;
        writeln!(f, "format:      {}", self.format)?;
        writeln!(f, "video_codec: {}", self.encoder)?;
        writeln!(f, "bitrate:     {}", self.bit_rate)?;
        writeln!(f, "size:        {}x{}", self.width, self.height)?;
        writeln!(f, "fps:         {}", self.fps)?;
        write!(f, "pixfmt:      {}", self.pixel_format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::descriptor;
    use crate::shared::rational::Rational;

    fn mp4() -> ContainerFormat {
        ContainerFormat {
            name: "mp4".into(),
            long_name: "MP4 (MPEG-4 Part 14)".into(),
            video_codec: "h264".into(),
            video_encoder: Some("libx264".into()),
            global_header: true,
        }
    }

    #[test]
    fn test_renders_aligned_block() {
        let mut descriptor = descriptor();
        descriptor.encoder_name = "libx264".into();
        descriptor.width = 1280;
        descriptor.height = 720;
        let summary = SessionSummary::new(Path::new("out.mp4"), &mp4(), &descriptor);

        assert_eq!(
            summary.to_string(),
            "output file: out.mp4\n\
             format:      mp4\n\
             video_codec: libx264\n\
             bitrate:     0\n\
             size:        1280x720\n\
             fps:         24\n\
             pixfmt:      yuv420p"
        );
    }

    #[test]
    fn test_fractional_frame_rate() {
        let mut descriptor = descriptor();
        descriptor.frame_rate = Rational::new(30000, 1001);
        let summary = SessionSummary::new(Path::new("out.mp4"), &mp4(), &descriptor);
        approx::assert_relative_eq!(summary.fps, 29.97, epsilon = 0.001);
    }
}
