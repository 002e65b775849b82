use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::capture::domain::frame_source::FrameSource;
use crate::container::domain::container_writer::ContainerWriter;
use crate::conversion::domain::pixel_converter::PixelConverter;
use crate::encoding::domain::encoder_session::EncoderSession;
use crate::shared::error::RecorderError;
use crate::shared::planar_frame::PlanarFrame;
use crate::shared::raw_frame::RawFrame;

use super::pipeline_executor::{PipelineConfig, RecordingReport, StopReason};
use super::pipeline_logger::PipelineLogger;

/// Consumer half of the recording loop: convert, submit, drain, write.
///
/// Owns the reusable planar buffer for the whole session. `finish` flushes
/// the encoder once, finalizes the container and closes the encoder, in
/// that order, whatever happened before.
pub struct EncodeStage {
    converter: Box<dyn PixelConverter>,
    encoder: Box<dyn EncoderSession>,
    writer: Box<dyn ContainerWriter>,
    planar: PlanarFrame,
    frames_submitted: u64,
    packets_written: u64,
    flushed: bool,
}

impl EncodeStage {
    pub fn new(
        converter: Box<dyn PixelConverter>,
        encoder: Box<dyn EncoderSession>,
        writer: Box<dyn ContainerWriter>,
    ) -> Self {
        let descriptor = encoder.descriptor();
        let planar = PlanarFrame::new(descriptor.width, descriptor.height, descriptor.pixel_format);
        Self {
            converter,
            encoder,
            writer,
            planar,
            frames_submitted: 0,
            packets_written: 0,
            flushed: false,
        }
    }

    /// Writes the container header from the encoder's stream descriptor.
    pub fn begin(&mut self) -> Result<(), RecorderError> {
        self.writer.begin(self.encoder.descriptor())
    }

    pub fn push(
        &mut self,
        frame: &RawFrame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<(), RecorderError> {
        let start = Instant::now();
        self.converter.convert(frame, &mut self.planar)?;
        logger.timing("convert", elapsed_ms(start));

        let start = Instant::now();
        self.encoder.submit(Some(&self.planar))?;
        self.frames_submitted += 1;
        self.drain(logger)?;
        logger.timing("encode", elapsed_ms(start));
        Ok(())
    }

    /// Forwards every packet the encoder has ready to the writer.
    fn drain(&mut self, logger: &mut dyn PipelineLogger) -> Result<(), RecorderError> {
        for packet in self.encoder.receive_packets() {
            self.writer.write(packet?)?;
            self.packets_written += 1;
            logger.progress(self.packets_written);
        }
        Ok(())
    }

    fn flush(&mut self, logger: &mut dyn PipelineLogger) -> Result<(), RecorderError> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;
        if self.encoder.state().accepts_input() {
            self.encoder.submit(None)?;
        }
        self.drain(logger)
    }

    /// Flush, finalize, close. A finalize failure takes precedence over a
    /// flush failure since it means the file is unusable.
    pub fn finish(&mut self, logger: &mut dyn PipelineLogger) -> Result<(), RecorderError> {
        let flushed = self.flush(logger);
        let finalized = self.writer.finalize();
        self.encoder.close();
        finalized.and(flushed)
    }

    /// Turns the capture loop outcome into the recording result, running
    /// `finish` on every path.
    pub fn conclude(
        mut self,
        outcome: Result<StopReason, RecorderError>,
        logger: &mut dyn PipelineLogger,
    ) -> Result<RecordingReport, RecorderError> {
        let (stop_reason, mut failure) = match outcome {
            Ok(reason) => (reason, None),
            Err(e) if e.is_recoverable_mid_session() => {
                log::warn!("recording cut short after {} frames: {e}", self.frames_submitted);
                (StopReason::Failed, Some(e))
            }
            Err(e) => {
                if let Err(cleanup) = self.finish(logger) {
                    log::warn!("cleanup after fatal error failed: {cleanup}");
                }
                return Err(e);
            }
        };

        match self.finish(logger) {
            Ok(()) => {}
            Err(e) if e.is_recoverable_mid_session() => {
                log::warn!("flush failed, container still finalized: {e}");
                failure.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }

        logger.info(&format!(
            "stopped ({stop_reason:?}): {} frames submitted, {} packets written",
            self.frames_submitted, self.packets_written
        ));
        Ok(RecordingReport {
            frames_submitted: self.frames_submitted,
            packets_written: self.packets_written,
            stop_reason,
            failure,
        })
    }
}

/// Checked before every grab.
pub(crate) fn stop_requested(
    config: &PipelineConfig,
    source: &mut dyn FrameSource,
    frames_captured: u64,
) -> Option<StopReason> {
    if config.cancelled.load(Ordering::Relaxed) {
        Some(StopReason::Interrupted)
    } else if source.poll_exit() {
        Some(StopReason::ExitRequested)
    } else if config.max_frames.is_some_and(|max| frames_captured >= max) {
        Some(StopReason::FrameLimit)
    } else {
        None
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::infrastructure::native_converter::NativeConverter;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::pipeline::test_support::*;
    use crate::shared::raw_frame::PixelLayout;

    fn stage(encoder: StubEncoder, writer: StubWriter) -> EncodeStage {
        EncodeStage::new(Box::new(NativeConverter::new()), Box::new(encoder), Box::new(writer))
    }

    fn frame() -> RawFrame {
        RawFrame::blank(WIDTH, HEIGHT, PixelLayout::Bgr24)
    }

    #[test]
    fn test_finish_flushes_once_then_finalizes_then_closes() {
        let log = event_log();
        let mut stage = stage(StubEncoder::new(2, &log), StubWriter::new(&log));
        let mut logger = NullPipelineLogger;
        stage.begin().unwrap();
        for _ in 0..4 {
            stage.push(&frame(), &mut logger).unwrap();
        }
        stage.finish(&mut logger).unwrap();
        stage.finish(&mut logger).unwrap();

        let tail: Vec<Event> = events(&log).into_iter().rev().take(5).rev().collect();
        assert_eq!(
            tail,
            vec![
                Event::Flush,
                Event::Write { pts: Some(2), dts: Some(2) },
                Event::Write { pts: Some(3), dts: Some(3) },
                Event::Finalize,
                Event::EncoderClosed,
            ]
        );
        assert_eq!(count(&log, &Event::Flush), 1);
    }

    #[test]
    fn test_latency_holds_packets_until_flush() {
        let log = event_log();
        let mut stage = stage(StubEncoder::new(3, &log), StubWriter::new(&log));
        let mut logger = NullPipelineLogger;
        stage.begin().unwrap();
        for _ in 0..3 {
            stage.push(&frame(), &mut logger).unwrap();
        }
        assert_eq!(stage.packets_written, 0);
        stage.push(&frame(), &mut logger).unwrap();
        assert_eq!(stage.packets_written, 1);
        stage.finish(&mut logger).unwrap();
        assert_eq!(stage.packets_written, 4);
    }

    #[test]
    fn test_conclude_keeps_mid_session_failure_and_finalizes() {
        let log = event_log();
        let mut stage = stage(StubEncoder::new(0, &log), StubWriter::new(&log));
        stage.begin().unwrap();
        let report = stage
            .conclude(
                Err(RecorderError::Encoding("boom".into())),
                &mut NullPipelineLogger,
            )
            .unwrap();
        assert_eq!(report.stop_reason, StopReason::Failed);
        assert!(!report.is_complete());
        assert_eq!(count(&log, &Event::Finalize), 1);
    }

    #[test]
    fn test_conclude_returns_fatal_error_after_cleanup() {
        let log = event_log();
        let mut stage = stage(StubEncoder::new(0, &log), StubWriter::new(&log));
        stage.begin().unwrap();
        let err = stage
            .conclude(Err(RecorderError::Io("disk full".into())), &mut NullPipelineLogger)
            .unwrap_err();
        assert!(matches!(err, RecorderError::Io(_)));
        assert_eq!(count(&log, &Event::Finalize), 1);
        assert_eq!(count(&log, &Event::EncoderClosed), 1);
    }

    #[test]
    fn test_stop_requested_order() {
        let log = event_log();
        let cancelled = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mut config = PipelineConfig::new(cancelled.clone());
        config.max_frames = Some(2);
        let mut source = StubSource::new(None, &log).exit_after(5);

        assert_eq!(stop_requested(&config, &mut source, 0), None);
        assert_eq!(stop_requested(&config, &mut source, 2), Some(StopReason::FrameLimit));
        cancelled.store(true, Ordering::SeqCst);
        assert_eq!(stop_requested(&config, &mut source, 2), Some(StopReason::Interrupted));
    }
}
