use crate::shared::error::RecorderError;
use crate::shared::raw_frame::RawFrame;

/// Shows the live frame to the user. Preview failures are never fatal to
/// the recording.
pub trait FramePreview: Send {
    fn show(&mut self, frame: &RawFrame) -> Result<(), RecorderError>;
}

/// Preview that discards every frame.
pub struct NullPreview;

impl FramePreview for NullPreview {
    fn show(&mut self, _frame: &RawFrame) -> Result<(), RecorderError> {
        Ok(())
    }
}
