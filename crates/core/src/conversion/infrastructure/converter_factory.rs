use crate::conversion::domain::pixel_converter::PixelConverter;
use crate::shared::error::RecorderError;
use crate::shared::raw_frame::PixelLayout;
use crate::shared::session_config::SessionConfig;

use super::native_converter::NativeConverter;
use super::swscale_converter::SwscaleConverter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConverterKind {
    /// libswscale, bicubic.
    Swscale,
    /// Pure Rust BT.601.
    Native,
}

/// Creates a converter from `source_layout` to the session's planar format.
pub fn create_converter(
    kind: ConverterKind,
    source_layout: PixelLayout,
    config: &SessionConfig,
) -> Result<Box<dyn PixelConverter>, RecorderError> {
    match kind {
        ConverterKind::Swscale => Ok(Box::new(SwscaleConverter::new(
            source_layout,
            config.pixel_format,
            config.width,
            config.height,
        )?)),
        ConverterKind::Native => Ok(Box::new(NativeConverter::new())),
    }
}
