use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::capture::domain::frame_preview::FramePreview;
use crate::capture::domain::frame_source::FrameSource;
use crate::container::domain::container_writer::ContainerWriter;
use crate::conversion::domain::pixel_converter::PixelConverter;
use crate::encoding::domain::encoder_session::EncoderSession;
use crate::shared::error::RecorderError;

use super::pipeline_logger::PipelineLogger;

/// Every component of one recording, owned by the executor for its
/// duration.
pub struct PipelineStages {
    pub source: Box<dyn FrameSource>,
    pub preview: Box<dyn FramePreview>,
    pub converter: Box<dyn PixelConverter>,
    pub encoder: Box<dyn EncoderSession>,
    pub writer: Box<dyn ContainerWriter>,
}

/// Configuration for a recording run.
pub struct PipelineConfig {
    /// Stop after this many captured frames.
    pub max_frames: Option<u64>,
    /// Polled once per frame; set by the interrupt handler.
    pub cancelled: Arc<AtomicBool>,
}

impl PipelineConfig {
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            max_frames: None,
            cancelled,
        }
    }
}

/// Why the capture loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    /// The frame source asked to stop (`poll_exit`).
    ExitRequested,
    SourceEnded,
    FrameLimit,
    /// A per-frame step failed; see `RecordingReport::failure`.
    Failed,
}

/// Outcome of a recording whose output file was finalized.
#[derive(Debug)]
pub struct RecordingReport {
    pub frames_submitted: u64,
    pub packets_written: u64,
    pub stop_reason: StopReason,
    /// Mid-session failure that cut the recording short.
    pub failure: Option<RecorderError>,
}

impl RecordingReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Abstracts how the capture → convert → encode → write loop runs.
///
/// `Ok` means the container was finalized, even when a per-frame failure
/// ended the loop early. `Err` means the output could not be produced.
pub trait PipelineExecutor: Send {
    fn execute(
        &self,
        stages: PipelineStages,
        config: PipelineConfig,
        logger: &mut dyn PipelineLogger,
    ) -> Result<RecordingReport, RecorderError>;
}
