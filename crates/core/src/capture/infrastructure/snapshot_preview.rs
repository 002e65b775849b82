use std::path::{Path, PathBuf};

use crate::capture::domain::frame_preview::FramePreview;
use crate::shared::error::RecorderError;
use crate::shared::raw_frame::RawFrame;

/// Headless preview: every `every` frames, the live frame is saved as an
/// image file that an external viewer can watch.
///
/// The file is written next to its final name and renamed into place, so
/// readers never see a half-written image.
pub struct SnapshotPreview {
    path: PathBuf,
    staging: PathBuf,
    format: image::ImageFormat,
    every: u64,
    shown: u64,
}

impl SnapshotPreview {
    pub fn new(path: &Path, every: u64) -> Result<Self, RecorderError> {
        let format = image::ImageFormat::from_path(path)
            .map_err(|e| RecorderError::initialization("preview", e))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| RecorderError::initialization("preview", e))?;
        }

        let mut staging = path.as_os_str().to_owned();
        staging.push(".part");
        Ok(Self {
            path: path.to_path_buf(),
            staging: PathBuf::from(staging),
            format,
            every: every.max(1),
            shown: 0,
        })
    }

    fn save(&self, frame: &RawFrame) -> Result<(), RecorderError> {
        let (r, g, b) = frame.layout().rgb_offsets();
        let pixels = frame.as_ndarray();
        let mut img = image::RgbImage::new(frame.width(), frame.height());
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let px = pixels.slice(ndarray::s![y as usize, x as usize, ..]);
            *pixel = image::Rgb([px[r], px[g], px[b]]);
        }

        img.save_with_format(&self.staging, self.format)
            .map_err(|e| RecorderError::Io(format!("preview snapshot: {e}")))?;
        std::fs::rename(&self.staging, &self.path)
            .map_err(|e| RecorderError::Io(format!("preview snapshot: {e}")))
    }
}

impl FramePreview for SnapshotPreview {
    fn show(&mut self, frame: &RawFrame) -> Result<(), RecorderError> {
        let due = self.shown % self.every == 0;
        self.shown += 1;
        if due {
            self.save(frame)?;
        }
        Ok(())
    }
}
