use crate::shared::error::RecorderError;
use crate::shared::planar_frame::PlanarFrame;
use crate::shared::raw_frame::RawFrame;

/// Converts interleaved captured pixels into the encoder's planar layout.
pub trait PixelConverter: Send {
    /// Overwrites every plane of `dst` with the converted contents of
    /// `src`. Both frames must have the same resolution.
    fn convert(&mut self, src: &RawFrame, dst: &mut PlanarFrame) -> Result<(), RecorderError>;
}

/// Shared precondition check for converter implementations.
pub(crate) fn check_dimensions(src: &RawFrame, dst: &PlanarFrame) -> Result<(), RecorderError> {
    if src.width() != dst.width() || src.height() != dst.height() {
        return Err(RecorderError::Conversion(format!(
            "source is {}x{} but target buffer is {}x{}",
            src.width(),
            src.height(),
            dst.width(),
            dst.height()
        )));
    }
    Ok(())
}
