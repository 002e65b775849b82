use std::time::Instant;

use crate::capture::domain::frame_preview::FramePreview;
use crate::capture::domain::frame_source::FrameSource;
use crate::pipeline::encode_stage::{elapsed_ms, stop_requested, EncodeStage};
use crate::pipeline::pipeline_executor::{
    PipelineConfig, PipelineExecutor, PipelineStages, RecordingReport, StopReason,
};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::error::RecorderError;

/// Runs capture, conversion, encoding and writing on the calling thread.
pub struct SequentialPipelineExecutor;

impl SequentialPipelineExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SequentialPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for SequentialPipelineExecutor {
    fn execute(
        &self,
        stages: PipelineStages,
        config: PipelineConfig,
        logger: &mut dyn PipelineLogger,
    ) -> Result<RecordingReport, RecorderError> {
        let PipelineStages {
            mut source,
            mut preview,
            converter,
            encoder,
            writer,
        } = stages;
        let mut stage = EncodeStage::new(converter, encoder, writer);

        if let Err(e) = stage.begin() {
            source.close();
            return Err(e);
        }

        let outcome = run_loop(source.as_mut(), preview.as_mut(), &mut stage, &config, logger);
        source.close();
        stage.conclude(outcome, logger)
    }
}

fn run_loop(
    source: &mut dyn FrameSource,
    preview: &mut dyn FramePreview,
    stage: &mut EncodeStage,
    config: &PipelineConfig,
    logger: &mut dyn PipelineLogger,
) -> Result<StopReason, RecorderError> {
    let mut captured: u64 = 0;
    loop {
        if let Some(reason) = stop_requested(config, source, captured) {
            return Ok(reason);
        }

        let start = Instant::now();
        let Some(frame) = source.grab()? else {
            return Ok(StopReason::SourceEnded);
        };
        logger.timing("capture", elapsed_ms(start));
        captured += 1;

        if let Err(e) = preview.show(frame) {
            log::warn!("preview failed: {e}");
        }
        stage.push(frame, logger)?;
    }
}
