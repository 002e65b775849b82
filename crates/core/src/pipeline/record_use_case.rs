use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::shared::error::RecorderError;

use super::pipeline_executor::{PipelineConfig, PipelineExecutor, PipelineStages, RecordingReport};
use super::pipeline_logger::PipelineLogger;

/// Orchestrates one recording session.
///
/// Wires the stages together and delegates the loop to a
/// `PipelineExecutor`. This is a single-use struct: `execute` consumes the
/// owned stages, so calling it twice fails.
pub struct RecordUseCase {
    stages: Option<PipelineStages>,
    executor: Box<dyn PipelineExecutor>,
    max_frames: Option<u64>,
    cancelled: Arc<AtomicBool>,
}

impl RecordUseCase {
    pub fn new(
        stages: PipelineStages,
        executor: Box<dyn PipelineExecutor>,
        max_frames: Option<u64>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            stages: Some(stages),
            executor,
            max_frames,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn execute(
        &mut self,
        logger: &mut dyn PipelineLogger,
    ) -> Result<RecordingReport, RecorderError> {
        let stages = self
            .stages
            .take()
            .ok_or_else(|| RecorderError::InvalidState("Recording already executed".into()))?;
        let config = PipelineConfig {
            max_frames: self.max_frames,
            cancelled: self.cancelled.clone(),
        };

        let report = self.executor.execute(stages, config, logger)?;
        logger.summary();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::frame_preview::NullPreview;
    use crate::conversion::infrastructure::native_converter::NativeConverter;
    use crate::pipeline::infrastructure::sequential_pipeline_executor::SequentialPipelineExecutor;
    use crate::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::pipeline::test_support::*;
    use rstest::rstest;
    use std::sync::atomic::Ordering;

    fn stages(log: &EventLog, frames: Option<u64>) -> PipelineStages {
        PipelineStages {
            source: Box::new(StubSource::new(frames, log)),
            preview: Box::new(NullPreview),
            converter: Box::new(NativeConverter::new()),
            encoder: Box::new(StubEncoder::new(2, log)),
            writer: Box::new(StubWriter::new(log)),
        }
    }

    fn executor(threaded: bool) -> Box<dyn PipelineExecutor> {
        if threaded {
            Box::new(ThreadedPipelineExecutor::new())
        } else {
            Box::new(SequentialPipelineExecutor::new())
        }
    }

    #[rstest]
    #[case::sequential(false)]
    #[case::threaded(true)]
    fn test_execute_records_every_frame(#[case] threaded: bool) {
        let log = event_log();
        let mut use_case = RecordUseCase::new(stages(&log, Some(30)), executor(threaded), None, None);
        let report = use_case.execute(&mut NullPipelineLogger).unwrap();
        assert_eq!(report.frames_submitted, 30);
        assert_eq!(written_pts(&log), (0..30).collect::<Vec<_>>());
    }

    #[rstest]
    #[case::sequential(false)]
    #[case::threaded(true)]
    fn test_max_frames_is_forwarded(#[case] threaded: bool) {
        let log = event_log();
        let mut use_case = RecordUseCase::new(stages(&log, None), executor(threaded), Some(7), None);
        let report = use_case.execute(&mut NullPipelineLogger).unwrap();
        assert_eq!(report.frames_submitted, 7);
    }

    #[test]
    fn test_preset_cancel_flag_records_nothing() {
        let log = event_log();
        let cancelled = Arc::new(AtomicBool::new(true));
        let mut use_case = RecordUseCase::new(
            stages(&log, None),
            executor(false),
            None,
            Some(cancelled.clone()),
        );
        let report = use_case.execute(&mut NullPipelineLogger).unwrap();
        assert_eq!(report.frames_submitted, 0);
        assert!(cancelled.load(Ordering::SeqCst));
        assert_eq!(count(&log, &Event::Finalize), 1);
    }

    #[test]
    fn test_second_execute_fails() {
        let log = event_log();
        let mut use_case = RecordUseCase::new(stages(&log, Some(1)), executor(false), None, None);
        use_case.execute(&mut NullPipelineLogger).unwrap();
        assert!(matches!(
            use_case.execute(&mut NullPipelineLogger),
            Err(RecorderError::InvalidState(_))
        ));
    }
}
