use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::capture::domain::frame_preview::FramePreview;
use crate::capture::domain::frame_source::FrameSource;
use crate::pipeline::encode_stage::{elapsed_ms, stop_requested, EncodeStage};
use crate::pipeline::pipeline_executor::{
    PipelineConfig, PipelineExecutor, PipelineStages, RecordingReport, StopReason,
};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::constants::FRAME_QUEUE_CAPACITY;
use crate::shared::error::RecorderError;
use crate::shared::raw_frame::RawFrame;

/// What the capture thread hands to the encoder.
enum Captured {
    Frame(RawFrame),
    Stopped(StopReason),
    Failed(RecorderError),
}

/// Executes the recording with capture on a dedicated thread.
///
/// Layout: `capture [+ preview] → bounded queue → main [convert/encode/write]`
///
/// The queue applies backpressure: when encoding falls behind, the capture
/// thread blocks instead of buffering without limit. Frames are encoded in
/// arrival order.
pub struct ThreadedPipelineExecutor {
    channel_capacity: usize,
}

impl ThreadedPipelineExecutor {
    pub fn new() -> Self {
        Self::with_capacity(FRAME_QUEUE_CAPACITY)
    }

    pub fn with_capacity(channel_capacity: usize) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
        }
    }
}

impl Default for ThreadedPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for ThreadedPipelineExecutor {
    fn execute(
        &self,
        stages: PipelineStages,
        config: PipelineConfig,
        logger: &mut dyn PipelineLogger,
    ) -> Result<RecordingReport, RecorderError> {
        let PipelineStages {
            mut source,
            preview,
            converter,
            encoder,
            writer,
        } = stages;
        let mut stage = EncodeStage::new(converter, encoder, writer);

        if let Err(e) = stage.begin() {
            source.close();
            return Err(e);
        }

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Captured>(self.channel_capacity);
        // Raised by the consumer when it gives up, so capture stops without
        // reporting an interrupt.
        let abandoned = Arc::new(AtomicBool::new(false));
        let capture_handle = spawn_capture(source, preview, frame_tx, config, abandoned.clone());

        let outcome = run_main_loop(&frame_rx, &mut stage, logger);

        abandoned.store(true, Ordering::Relaxed);
        drop(frame_rx);
        let outcome = match capture_handle.join() {
            Ok(()) => outcome,
            Err(_) => outcome.and(Err(RecorderError::InvalidState(
                "capture thread panicked".into(),
            ))),
        };

        stage.conclude(outcome, logger)
    }
}

fn spawn_capture(
    mut source: Box<dyn FrameSource>,
    mut preview: Box<dyn FramePreview>,
    frame_tx: crossbeam_channel::Sender<Captured>,
    config: PipelineConfig,
    abandoned: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut captured: u64 = 0;
        let last = loop {
            if abandoned.load(Ordering::Relaxed) {
                break None;
            }
            if let Some(reason) = stop_requested(&config, source.as_mut(), captured) {
                break Some(Captured::Stopped(reason));
            }

            let frame = match source.grab() {
                Ok(Some(frame)) => frame,
                Ok(None) => break Some(Captured::Stopped(StopReason::SourceEnded)),
                Err(e) => break Some(Captured::Failed(e)),
            };
            captured += 1;

            if let Err(e) = preview.show(frame) {
                log::warn!("preview failed: {e}");
            }
            if frame_tx.send(Captured::Frame(frame.clone())).is_err() {
                break None;
            }
        };

        source.close();
        if let Some(message) = last {
            let _ = frame_tx.send(message);
        }
    })
}

/// Encodes frames as they arrive until the capture thread reports why it
/// stopped, or a stage fails.
fn run_main_loop(
    frame_rx: &crossbeam_channel::Receiver<Captured>,
    stage: &mut EncodeStage,
    logger: &mut dyn PipelineLogger,
) -> Result<StopReason, RecorderError> {
    loop {
        let start = Instant::now();
        let message = match frame_rx.recv() {
            Ok(message) => message,
            // Capture thread ended without a final message: it panicked.
            Err(_) => {
                return Err(RecorderError::InvalidState(
                    "capture thread exited unexpectedly".into(),
                ))
            }
        };
        logger.timing("wait", elapsed_ms(start));
        logger.metric("queue_depth", frame_rx.len() as f64);

        match message {
            Captured::Frame(frame) => stage.push(&frame, logger)?,
            Captured::Stopped(reason) => return Ok(reason),
            Captured::Failed(e) => return Err(e),
        }
    }
}
