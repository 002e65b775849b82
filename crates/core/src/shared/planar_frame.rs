use crate::shared::constants::PLANE_ALIGNMENT;

/// Planar, chroma-subsampled layouts the encoder accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanarLayout {
    /// One full-resolution luma plane and two chroma planes at half
    /// resolution in both directions.
    Yuv420p,
}

impl PlanarLayout {
    pub fn name(&self) -> &'static str {
        match self {
            PlanarLayout::Yuv420p => "yuv420p",
        }
    }

    pub fn plane_count(&self) -> usize {
        match self {
            PlanarLayout::Yuv420p => 3,
        }
    }

    /// Width and height of plane `index` for a `width x height` picture.
    pub fn plane_dimensions(&self, index: usize, width: u32, height: u32) -> (u32, u32) {
        match (self, index) {
            (PlanarLayout::Yuv420p, 0) => (width, height),
            (PlanarLayout::Yuv420p, 1 | 2) => (width.div_ceil(2), height.div_ceil(2)),
            _ => panic!("plane {index} does not exist in {}", self.name()),
        }
    }
}

/// One plane of a [`PlanarFrame`].
#[derive(Clone, Debug)]
pub struct Plane {
    data: Vec<u8>,
    width: u32,
    height: u32,
    stride: usize,
}

impl Plane {
    fn new(width: u32, height: u32) -> Self {
        let stride = (width as usize).next_multiple_of(PLANE_ALIGNMENT);
        Self {
            data: vec![0u8; stride * height as usize],
            width,
            height,
            stride,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Visible bytes of row `y`.
    pub fn row(&self, y: u32) -> &[u8] {
        assert!(y < self.height, "row {y} out of bounds");
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        assert!(y < self.height, "row {y} out of bounds");
        let start = y as usize * self.stride;
        &mut self.data[start..start + self.width as usize]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.height).map(move |y| self.row(y))
    }

    /// Copies `src` rows (spaced `src_stride` apart) into this plane.
    pub fn copy_from(&mut self, src: &[u8], src_stride: usize) {
        let width = self.width as usize;
        for y in 0..self.height as usize {
            let s = y * src_stride;
            let d = y * self.stride;
            self.data[d..d + width].copy_from_slice(&src[s..s + width]);
        }
    }

    /// Copies this plane's visible rows into `dst` spaced `dst_stride` apart.
    pub fn copy_to(&self, dst: &mut [u8], dst_stride: usize) {
        let width = self.width as usize;
        for y in 0..self.height as usize {
            let s = y * self.stride;
            let d = y * dst_stride;
            dst[d..d + width].copy_from_slice(&self.data[s..s + width]);
        }
    }

    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }
}

/// Reusable planar picture handed to the encoder.
///
/// Allocated once per session and overwritten on every frame.
#[derive(Clone, Debug)]
pub struct PlanarFrame {
    planes: Vec<Plane>,
    width: u32,
    height: u32,
    layout: PlanarLayout,
}

impl PlanarFrame {
    pub fn new(width: u32, height: u32, layout: PlanarLayout) -> Self {
        let planes = (0..layout.plane_count())
            .map(|i| {
                let (w, h) = layout.plane_dimensions(i, width, height);
                Plane::new(w, h)
            })
            .collect();
        Self {
            planes,
            width,
            height,
            layout,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PlanarLayout {
        self.layout
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    pub fn plane(&self, index: usize) -> &Plane {
        &self.planes[index]
    }

    pub fn plane_mut(&mut self, index: usize) -> &mut Plane {
        &mut self.planes[index]
    }

    /// Luma and both chroma planes borrowed mutably at once.
    pub fn yuv_planes_mut(&mut self) -> (&mut Plane, &mut Plane, &mut Plane) {
        match self.planes.as_mut_slice() {
            [y, u, v] => (y, u, v),
            _ => unreachable!("yuv420p always has three planes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_yuv420p_geometry() {
        let frame = PlanarFrame::new(1280, 720, PlanarLayout::Yuv420p);
        assert_eq!(frame.plane_count(), 3);
        assert_eq!(frame.plane(0).width(), 1280);
        assert_eq!(frame.plane(0).height(), 720);
        assert_eq!(frame.plane(1).width(), 640);
        assert_eq!(frame.plane(2).height(), 360);
    }

    #[rstest]
    #[case::odd_width(5, 4, (3, 2))]
    #[case::odd_height(4, 5, (2, 3))]
    #[case::one_pixel(1, 1, (1, 1))]
    fn test_chroma_rounds_up(#[case] w: u32, #[case] h: u32, #[case] expected: (u32, u32)) {
        assert_eq!(PlanarLayout::Yuv420p.plane_dimensions(1, w, h), expected);
    }

    #[test]
    fn test_stride_is_aligned_and_rows_hide_padding() {
        let frame = PlanarFrame::new(10, 2, PlanarLayout::Yuv420p);
        let luma = frame.plane(0);
        assert_eq!(luma.stride(), PLANE_ALIGNMENT);
        assert_eq!(luma.row(1).len(), 10);
    }

    #[test]
    fn test_row_mut_writes_are_visible() {
        let mut frame = PlanarFrame::new(4, 4, PlanarLayout::Yuv420p);
        frame.plane_mut(2).row_mut(1).copy_from_slice(&[7, 8]);
        assert_eq!(frame.plane(2).row(1), &[7, 8]);
        assert_eq!(frame.plane(2).row(0), &[0, 0]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_row_out_of_bounds_panics() {
        let frame = PlanarFrame::new(4, 4, PlanarLayout::Yuv420p);
        frame.plane(1).row(2);
    }

    #[test]
    fn test_copy_to_and_from_foreign_stride() {
        let mut frame = PlanarFrame::new(2, 2, PlanarLayout::Yuv420p);
        let src = [1, 2, 0xEE, 3, 4, 0xEE];
        frame.plane_mut(0).copy_from(&src, 3);
        assert_eq!(frame.plane(0).row(1), &[3, 4]);

        let mut dst = [0u8; 8];
        frame.plane(0).copy_to(&mut dst, 4);
        assert_eq!(dst, [1, 2, 0, 0, 3, 4, 0, 0]);
    }

    #[test]
    fn test_yuv_planes_mut_splits_borrows() {
        let mut frame = PlanarFrame::new(2, 2, PlanarLayout::Yuv420p);
        let (y, u, v) = frame.yuv_planes_mut();
        y.fill(16);
        u.fill(128);
        v.fill(128);
        assert_eq!(frame.plane(0).row(0), &[16, 16]);
        assert_eq!(frame.plane(1).row(0), &[128]);
    }
}
