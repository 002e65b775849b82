use crate::conversion::domain::pixel_converter::{check_dimensions, PixelConverter};
use crate::shared::error::RecorderError;
use crate::shared::planar_frame::{PlanarFrame, PlanarLayout};
use crate::shared::raw_frame::{PixelLayout, RawFrame};

/// Colour conversion through libswscale.
///
/// The scaler context and both intermediate ffmpeg frames are allocated
/// once and reused for every frame.
pub struct SwscaleConverter {
    scaler: ffmpeg_next::software::scaling::Context,
    source_layout: PixelLayout,
    src: ffmpeg_next::util::frame::video::Video,
    dst: ffmpeg_next::util::frame::video::Video,
}

// Safety: SwscaleConverter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for SwscaleConverter {}

impl SwscaleConverter {
    pub fn new(
        source_layout: PixelLayout,
        target_layout: PlanarLayout,
        width: u32,
        height: u32,
    ) -> Result<Self, RecorderError> {
        let src_format = packed_pixel(source_layout);
        let dst_format = planar_pixel(target_layout);

        let scaler = ffmpeg_next::software::scaling::Context::get(
            src_format,
            width,
            height,
            dst_format,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BICUBIC,
        )
        .map_err(|e| {
            RecorderError::initialization(
                "converter",
                format!(
                    "{} -> {} at {width}x{height}: {e}",
                    source_layout.name(),
                    target_layout.name()
                ),
            )
        })?;

        Ok(Self {
            scaler,
            source_layout,
            src: ffmpeg_next::util::frame::video::Video::new(src_format, width, height),
            dst: ffmpeg_next::util::frame::video::Video::new(dst_format, width, height),
        })
    }
}

impl PixelConverter for SwscaleConverter {
    fn convert(&mut self, src: &RawFrame, dst: &mut PlanarFrame) -> Result<(), RecorderError> {
        check_dimensions(src, dst)?;
        if src.layout() != self.source_layout {
            return Err(RecorderError::Conversion(format!(
                "converter expects {} but frame is {}",
                self.source_layout.name(),
                src.layout().name()
            )));
        }

        // Copy pixel data, respecting both strides
        let stride = self.src.stride(0);
        let data = self.src.data_mut(0);
        for (y, row) in src.rows().enumerate() {
            let start = y * stride;
            data[start..start + row.len()].copy_from_slice(row);
        }

        self.scaler
            .run(&self.src, &mut self.dst)
            .map_err(|e| RecorderError::Conversion(e.to_string()))?;

        for i in 0..dst.plane_count() {
            let stride = self.dst.stride(i);
            dst.plane_mut(i).copy_from(self.dst.data(i), stride);
        }
        Ok(())
    }
}

pub(crate) fn packed_pixel(layout: PixelLayout) -> ffmpeg_next::format::Pixel {
    match layout {
        PixelLayout::Bgr24 => ffmpeg_next::format::Pixel::BGR24,
        PixelLayout::Bgra => ffmpeg_next::format::Pixel::BGRA,
        PixelLayout::Rgb24 => ffmpeg_next::format::Pixel::RGB24,
    }
}

pub(crate) fn planar_pixel(layout: PlanarLayout) -> ffmpeg_next::format::Pixel {
    match layout {
        PlanarLayout::Yuv420p => ffmpeg_next::format::Pixel::YUV420P,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter(w: u32, h: u32) -> SwscaleConverter {
        crate::ffmpeg_runtime::init(false).unwrap();
        SwscaleConverter::new(PixelLayout::Bgr24, PlanarLayout::Yuv420p, w, h).unwrap()
    }

    fn solid_bgr(w: u32, h: u32, bgr: [u8; 3]) -> RawFrame {
        let data = bgr.repeat((w * h) as usize);
        RawFrame::new(data, w, h, PixelLayout::Bgr24, 0)
    }

    fn average(frame: &PlanarFrame, plane: usize) -> f64 {
        let values: Vec<u8> = frame.plane(plane).rows().flatten().copied().collect();
        values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
    }

    #[test]
    fn test_white_maps_to_limited_range_white() {
        let mut conv = converter(64, 48);
        let mut dst = PlanarFrame::new(64, 48, PlanarLayout::Yuv420p);
        conv.convert(&solid_bgr(64, 48, [255, 255, 255]), &mut dst).unwrap();
        assert!((average(&dst, 0) - 235.0).abs() < 2.0);
        assert!((average(&dst, 1) - 128.0).abs() < 2.0);
        assert!((average(&dst, 2) - 128.0).abs() < 2.0);
    }

    #[test]
    fn test_blue_has_high_cb() {
        let mut conv = converter(64, 48);
        let mut dst = PlanarFrame::new(64, 48, PlanarLayout::Yuv420p);
        conv.convert(&solid_bgr(64, 48, [255, 0, 0]), &mut dst).unwrap();
        assert!(average(&dst, 1) > 200.0);
    }

    #[test]
    fn test_padded_source_rows() {
        let (w, h) = (64u32, 48u32);
        let stride = w as usize * 3 + 16;
        let mut data = vec![0u8; stride * h as usize];
        for y in 0..h as usize {
            data[y * stride..y * stride + w as usize * 3].fill(255);
        }
        let src = RawFrame::with_stride(data, w, h, stride, PixelLayout::Bgr24, 0);
        let mut conv = converter(w, h);
        let mut dst = PlanarFrame::new(w, h, PlanarLayout::Yuv420p);
        conv.convert(&src, &mut dst).unwrap();
        assert!((average(&dst, 0) - 235.0).abs() < 2.0);
    }

    #[test]
    fn test_reused_across_frames() {
        let mut conv = converter(32, 32);
        let mut dst = PlanarFrame::new(32, 32, PlanarLayout::Yuv420p);
        conv.convert(&solid_bgr(32, 32, [0, 0, 0]), &mut dst).unwrap();
        assert!((average(&dst, 0) - 16.0).abs() < 2.0);
        conv.convert(&solid_bgr(32, 32, [255, 255, 255]), &mut dst).unwrap();
        assert!((average(&dst, 0) - 235.0).abs() < 2.0);
    }

    #[test]
    fn test_wrong_layout_is_rejected() {
        let mut conv = converter(2, 2);
        let src = RawFrame::new(vec![0u8; 12], 2, 2, PixelLayout::Rgb24, 0);
        let mut dst = PlanarFrame::new(2, 2, PlanarLayout::Yuv420p);
        assert!(matches!(
            conv.convert(&src, &mut dst),
            Err(RecorderError::Conversion(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let mut conv = converter(4, 4);
        let mut dst = PlanarFrame::new(4, 4, PlanarLayout::Yuv420p);
        assert!(conv.convert(&solid_bgr(8, 4, [0, 0, 0]), &mut dst).is_err());
    }
}
