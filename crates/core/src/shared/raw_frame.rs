use ndarray::{ArrayView3, ShapeBuilder};

/// Interleaved (packed) pixel layouts a frame source may produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Bgr24,
    Bgra,
    Rgb24,
}

impl PixelLayout {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelLayout::Bgr24 | PixelLayout::Rgb24 => 3,
            PixelLayout::Bgra => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelLayout::Bgr24 => "bgr24",
            PixelLayout::Bgra => "bgra",
            PixelLayout::Rgb24 => "rgb24",
        }
    }

    /// Byte offsets of the red, green and blue channels within one pixel.
    pub fn rgb_offsets(&self) -> (usize, usize, usize) {
        match self {
            PixelLayout::Bgr24 | PixelLayout::Bgra => (2, 1, 0),
            PixelLayout::Rgb24 => (0, 1, 2),
        }
    }
}

/// A single captured image: interleaved pixels in row-major order.
///
/// Rows may be padded, so `stride` can exceed `width * bytes_per_pixel`.
/// Every accessor skips the padding.
#[derive(Clone, Debug)]
pub struct RawFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    stride: usize,
    layout: PixelLayout,
    index: u64,
}

impl RawFrame {
    /// Builds a frame with tightly packed rows.
    pub fn new(data: Vec<u8>, width: u32, height: u32, layout: PixelLayout, index: u64) -> Self {
        let stride = width as usize * layout.bytes_per_pixel();
        Self::with_stride(data, width, height, stride, layout, index)
    }

    /// Builds a frame whose rows are `stride` bytes apart.
    pub fn with_stride(
        data: Vec<u8>,
        width: u32,
        height: u32,
        stride: usize,
        layout: PixelLayout,
        index: u64,
    ) -> Self {
        let row_bytes = width as usize * layout.bytes_per_pixel();
        assert!(
            stride >= row_bytes,
            "stride must be at least width * bytes_per_pixel"
        );
        let required = if height == 0 {
            0
        } else {
            stride * (height as usize - 1) + row_bytes
        };
        assert!(
            data.len() >= required,
            "data length must cover height rows of stride bytes"
        );
        Self {
            data,
            width,
            height,
            stride,
            layout,
            index,
        }
    }

    /// A black frame, useful as an initial value for reusable buffers.
    pub fn blank(width: u32, height: u32, layout: PixelLayout) -> Self {
        let data = vec![0u8; width as usize * height as usize * layout.bytes_per_pixel()];
        Self::new(data, width, height, layout, 0)
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

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Capture sequence number assigned by the source.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn set_index(&mut self, index: u64) {
        self.index = index;
    }

    /// Bytes of one row with padding stripped.
    pub fn row(&self, y: u32) -> &[u8] {
        assert!(y < self.height, "row {y} out of bounds");
        let start = y as usize * self.stride;
        &self.data[start..start + self.row_bytes()]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.height).map(move |y| self.row(y))
    }

    /// Overwrites this frame with `src` rows, keeping the existing
    /// allocation when the geometry matches.
    pub fn copy_from_rows(&mut self, src: &[u8], src_stride: usize) {
        let row_bytes = self.row_bytes();
        for y in 0..self.height as usize {
            let s = y * src_stride;
            let d = y * self.stride;
            self.data[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
        }
    }

    /// Underlying buffer including any padding.
    pub fn padded_data(&self) -> &[u8] {
        &self.data
    }

    /// Strided `(height, width, channels)` view that never touches padding.
    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        let channels = self.layout.bytes_per_pixel();
        let shape = (self.height as usize, self.width as usize, channels)
            .strides((self.stride, channels, 1));
        ArrayView3::from_shape(shape, &self.data).expect("frame geometry validated at construction")
    }

    fn row_bytes(&self) -> usize {
        self.width as usize * self.layout.bytes_per_pixel()
    }
}
