use crate::shared::error::RecorderError;
use crate::shared::raw_frame::RawFrame;

/// Produces captured frames one request at a time.
///
/// Implementations own the returned frame; callers borrow it until the
/// next call to `grab`.
pub trait FrameSource: Send {
    /// Returns the next frame, or `None` once the source has no more.
    ///
    /// May block until the device delivers a frame.
    fn grab(&mut self) -> Result<Option<&RawFrame>, RecorderError>;

    /// Polled once per loop iteration; `true` asks the pipeline to stop
    /// capturing and flush.
    fn poll_exit(&mut self) -> bool {
        false
    }

    /// Releases the device. Called once, after the capture loop ends.
    fn close(&mut self) {}
}
