use crate::conversion::domain::pixel_converter::{check_dimensions, PixelConverter};
use crate::shared::error::RecorderError;
use crate::shared::planar_frame::{PlanarFrame, PlanarLayout};
use crate::shared::raw_frame::RawFrame;

/// Pure Rust BT.601 (limited range) packed RGB to YUV 4:2:0 conversion.
///
/// Chroma is computed from the average colour of each 2x2 block; blocks on
/// an odd right or bottom edge reuse the last column or row.
pub struct NativeConverter;

impl NativeConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelConverter for NativeConverter {
    fn convert(&mut self, src: &RawFrame, dst: &mut PlanarFrame) -> Result<(), RecorderError> {
        check_dimensions(src, dst)?;
        if dst.layout() != PlanarLayout::Yuv420p {
            return Err(RecorderError::Conversion(format!(
                "unsupported target layout {}",
                dst.layout().name()
            )));
        }

        let bpp = src.layout().bytes_per_pixel();
        let (ro, go, bo) = src.layout().rgb_offsets();
        let width = src.width() as usize;
        let height = src.height();
        let rgb_at = |row: &[u8], x: usize| -> (i32, i32, i32) {
            let p = &row[x * bpp..];
            (p[ro] as i32, p[go] as i32, p[bo] as i32)
        };

        let (y_plane, u_plane, v_plane) = dst.yuv_planes_mut();

        for y in 0..height {
            let row = src.row(y);
            let out = y_plane.row_mut(y);
            for (x, luma) in out.iter_mut().enumerate() {
                let (r, g, b) = rgb_at(row, x);
                *luma = luma_of(r, g, b);
            }
        }

        for cy in 0..u_plane.height() {
            let top = src.row(cy * 2);
            let bottom = src.row((cy * 2 + 1).min(height - 1));
            let u_row = u_plane.row_mut(cy);
            let v_row = v_plane.row_mut(cy);
            for cx in 0..u_row.len() {
                let x0 = cx * 2;
                let x1 = (x0 + 1).min(width - 1);
                let samples = [
                    rgb_at(top, x0),
                    rgb_at(top, x1),
                    rgb_at(bottom, x0),
                    rgb_at(bottom, x1),
                ];
                let (r, g, b) = samples.iter().fold((0, 0, 0), |acc, s| {
                    (acc.0 + s.0, acc.1 + s.1, acc.2 + s.2)
                });
                let (r, g, b) = ((r + 2) / 4, (g + 2) / 4, (b + 2) / 4);
                u_row[cx] = cb_of(r, g, b);
                v_row[cx] = cr_of(r, g, b);
            }
        }

        Ok(())
    }
}

fn luma_of(r: i32, g: i32, b: i32) -> u8 {
    (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16).clamp(0, 255) as u8
}

fn cb_of(r: i32, g: i32, b: i32) -> u8 {
    (((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128).clamp(0, 255) as u8
}

fn cr_of(r: i32, g: i32, b: i32) -> u8 {
    (((112 * r - 94 * g - 18 * b + 128) >> 8) + 128).clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::raw_frame::PixelLayout;
    use rstest::rstest;

    fn solid_bgr(width: u32, height: u32, (r, g, b): (u8, u8, u8)) -> RawFrame {
        let mut data = Vec::new();
        for _ in 0..width * height {
            data.extend_from_slice(&[b, g, r]);
        }
        RawFrame::new(data, width, height, PixelLayout::Bgr24, 0)
    }

    fn plane_values(frame: &PlanarFrame, plane: usize) -> Vec<u8> {
        frame.plane(plane).rows().flatten().copied().collect()
    }

    #[rstest]
    #[case::black((0, 0, 0), (16, 128, 128))]
    #[case::white((255, 255, 255), (235, 128, 128))]
    #[case::red((255, 0, 0), (82, 90, 240))]
    #[case::green((0, 255, 0), (144, 54, 34))]
    #[case::blue((0, 0, 255), (41, 240, 110))]
    fn test_solid_colours(#[case] rgb: (u8, u8, u8), #[case] yuv: (u8, u8, u8)) {
        let src = solid_bgr(4, 4, rgb);
        let mut dst = PlanarFrame::new(4, 4, PlanarLayout::Yuv420p);
        NativeConverter::new().convert(&src, &mut dst).unwrap();

        assert!(plane_values(&dst, 0).iter().all(|&v| v == yuv.0));
        assert!(plane_values(&dst, 1).iter().all(|&v| v == yuv.1));
        assert!(plane_values(&dst, 2).iter().all(|&v| v == yuv.2));
    }

    #[test]
    fn test_padding_is_not_read_as_pixels() {
        // 2x2 white frame, rows padded with red-looking garbage
        let row = [255u8, 255, 255, 255, 255, 255, 0, 0, 255];
        let data: Vec<u8> = row.iter().chain(row.iter()).copied().collect();
        let src = RawFrame::with_stride(data, 2, 2, 9, PixelLayout::Bgr24, 0);
        let mut dst = PlanarFrame::new(2, 2, PlanarLayout::Yuv420p);
        NativeConverter::new().convert(&src, &mut dst).unwrap();

        assert_eq!(plane_values(&dst, 0), vec![235; 4]);
        assert_eq!(plane_values(&dst, 1), vec![128]);
        assert_eq!(plane_values(&dst, 2), vec![128]);
    }

    #[test]
    fn test_odd_dimensions_clamp_edges() {
        let src = solid_bgr(3, 3, (255, 255, 255));
        let mut dst = PlanarFrame::new(3, 3, PlanarLayout::Yuv420p);
        NativeConverter::new().convert(&src, &mut dst).unwrap();
        assert_eq!(plane_values(&dst, 1), vec![128; 4]);
    }

    #[test]
    fn test_chroma_averages_block() {
        // Left column black, right column white: chroma stays neutral,
        // luma keeps both extremes.
        let data = vec![0, 0, 0, 255, 255, 255, 0, 0, 0, 255, 255, 255];
        let src = RawFrame::new(data, 2, 2, PixelLayout::Bgr24, 0);
        let mut dst = PlanarFrame::new(2, 2, PlanarLayout::Yuv420p);
        NativeConverter::new().convert(&src, &mut dst).unwrap();
        assert_eq!(plane_values(&dst, 0), vec![16, 235, 16, 235]);
        assert_eq!(plane_values(&dst, 1), vec![128]);
    }

    #[test]
    fn test_rgb_and_bgra_layouts_agree() {
        let rgb = RawFrame::new(vec![255, 0, 0, 255, 0, 0], 2, 1, PixelLayout::Rgb24, 0);
        let bgra = RawFrame::new(vec![0, 0, 255, 255, 0, 0, 255, 255], 2, 1, PixelLayout::Bgra, 0);
        let mut a = PlanarFrame::new(2, 1, PlanarLayout::Yuv420p);
        let mut b = PlanarFrame::new(2, 1, PlanarLayout::Yuv420p);
        NativeConverter::new().convert(&rgb, &mut a).unwrap();
        NativeConverter::new().convert(&bgra, &mut b).unwrap();
        assert_eq!(plane_values(&a, 0), plane_values(&b, 0));
        assert_eq!(plane_values(&a, 2), plane_values(&b, 2));
    }

    #[test]
    fn test_resolution_mismatch_is_an_error() {
        let src = solid_bgr(4, 4, (0, 0, 0));
        let mut dst = PlanarFrame::new(8, 4, PlanarLayout::Yuv420p);
        let err = NativeConverter::new().convert(&src, &mut dst).unwrap_err();
        assert!(matches!(err, RecorderError::Conversion(_)));
    }
}
