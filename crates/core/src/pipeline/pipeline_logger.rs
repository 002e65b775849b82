use std::collections::BTreeMap;
use std::io::Write;
use std::time::Instant;

/// Cross-cutting logger for recording loop events.
///
/// Keeps the executors free of output concerns: the CLI prints a live
/// packet counter, tests stay silent.
pub trait PipelineLogger: Send {
    /// Called after every packet handed to the container writer.
    fn progress(&mut self, packets_written: u64);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. queue depth).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-recording summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _packets_written: u64) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running aggregate for one stage or metric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Stats {
    pub count: u64,
    pub sum: f64,
    pub max: f64,
}

impl Stats {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// CLI logger: overwrites a packet counter in place on the terminal and
/// aggregates per-stage timings for a summary at the end.
pub struct StdoutPipelineLogger {
    out: Box<dyn Write + Send>,
    timings: BTreeMap<String, Stats>,
    metrics: BTreeMap<String, Stats>,
    started: Instant,
    packets_written: u64,
}

impl StdoutPipelineLogger {
    pub fn new() -> Self {
        Self::with_output(Box::new(std::io::stdout()))
    }

    pub fn with_output(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            packets_written: 0,
        }
    }

    pub fn timing_stats(&self, stage: &str) -> Option<Stats> {
        self.timings.get(stage).copied()
    }

    pub fn metric_stats(&self, name: &str) -> Option<Stats> {
        self.metrics.get(name).copied()
    }

    /// Multi-line report of where the time went, `None` before any
    /// timing or metric was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let wall_s = self.started.elapsed().as_secs_f64();
        let mut text = format!(
            "Recording summary ({} packets in {wall_s:.1}s):",
            self.packets_written
        );

        for (stage, stats) in &self.timings {
            let share = if wall_s > 0.0 {
                stats.sum / (wall_s * 1000.0) * 100.0
            } else {
                0.0
            };
            text.push_str(&format!(
                "\n  {stage:8} mean {:6.2}ms  max {:6.2}ms  ({share:4.1}% of wall time)",
                stats.mean(),
                stats.max
            ));
        }
        for (name, stats) in &self.metrics {
            text.push_str(&format!(
                "\n  {name}: mean {:.1}, max {:.0}",
                stats.mean(),
                stats.max
            ));
        }

        // Every captured frame goes through conversion exactly once.
        if let Some(converted) = self.timings.get("convert").filter(|s| s.count > 0) {
            if wall_s > 0.0 {
                text.push_str(&format!(
                    "\n  {:.1} frames/s",
                    converted.count as f64 / wall_s
                ));
            }
        }
        Some(text)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, packets_written: u64) {
        self.packets_written = packets_written;
        // The counter is cosmetic; a closed stdout must not stop the recording.
        let _ = write!(self.out, "{packets_written}\r");
        let _ = self.out.flush();
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings.entry(stage.to_owned()).or_default().record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_owned()).or_default().record(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        match self.summary_string() {
            Some(text) => log::info!("{text}"),
            None => log::debug!("no stage timings recorded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    /// Shared buffer standing in for stdout.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn logger() -> (StdoutPipelineLogger, Captured) {
        let out = Captured::default();
        (StdoutPipelineLogger::with_output(Box::new(out.clone())), out)
    }

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1);
        logger.timing("encode", 5.0);
        logger.metric("queue_depth", 3.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_progress_overwrites_counter_in_place() {
        let (mut logger, out) = logger();
        logger.progress(1);
        logger.progress(2);
        logger.progress(3);
        assert_eq!(out.text(), "1\r2\r3\r");
        assert_eq!(logger.packets_written, 3);
    }

    #[test]
    fn test_stats_track_count_mean_and_max() {
        let (mut logger, _) = logger();
        logger.timing("convert", 2.0);
        logger.timing("convert", 6.0);
        logger.timing("encode", 9.0);

        let convert = logger.timing_stats("convert").unwrap();
        assert_eq!(convert.count, 2);
        assert_relative_eq!(convert.mean(), 4.0);
        assert_relative_eq!(convert.max, 6.0);
        assert_eq!(logger.timing_stats("encode").unwrap().count, 1);
        assert!(logger.timing_stats("capture").is_none());
    }

    #[test]
    fn test_metric_stats() {
        let (mut logger, _) = logger();
        logger.metric("queue_depth", 3.0);
        logger.metric("queue_depth", 4.0);
        assert_relative_eq!(logger.metric_stats("queue_depth").unwrap().mean(), 3.5);
    }

    #[test]
    fn test_empty_stats_mean_is_zero() {
        assert_relative_eq!(Stats::default().mean(), 0.0);
    }

    #[test]
    fn test_summary_lists_stages_metrics_and_throughput() {
        let (mut logger, _) = logger();
        logger.progress(10);
        logger.timing("convert", 2.0);
        logger.timing("encode", 5.0);
        logger.metric("queue_depth", 3.0);
        logger.metric("queue_depth", 4.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.starts_with("Recording summary (10 packets"));
        assert!(summary.contains("convert"));
        assert!(summary.contains("encode"));
        assert!(summary.contains("queue_depth: mean 3.5, max 4"));
        assert!(summary.contains("frames/s"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        let (logger, _) = logger();
        assert!(logger.summary_string().is_none());
    }

    #[test]
    fn test_info_is_kept_off_the_counter_line() {
        let (mut logger, out) = logger();
        logger.info("hello world");
        assert!(out.text().is_empty());
    }
}
