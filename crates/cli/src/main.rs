use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};

use camrec_core::capture::domain::frame_preview::{FramePreview, NullPreview};
use camrec_core::capture::infrastructure::ffmpeg_device_source::{DeviceSpec, FfmpegDeviceSource};
use camrec_core::capture::infrastructure::snapshot_preview::SnapshotPreview;
use camrec_core::container::domain::container_writer::ContainerWriter;
use camrec_core::container::infrastructure::ffmpeg_container_writer::FfmpegContainerWriter;
use camrec_core::conversion::infrastructure::converter_factory::{create_converter, ConverterKind};
use camrec_core::encoding::domain::encoder_session::EncoderSession;
use camrec_core::encoding::infrastructure::ffmpeg_encoder_session::FfmpegEncoderSession;
use camrec_core::ffmpeg_runtime;
use camrec_core::pipeline::infrastructure::sequential_pipeline_executor::SequentialPipelineExecutor;
use camrec_core::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
use camrec_core::pipeline::pipeline_executor::{PipelineExecutor, PipelineStages};
use camrec_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use camrec_core::pipeline::record_use_case::RecordUseCase;
use camrec_core::pipeline::session_summary::SessionSummary;
use camrec_core::shared::constants::{CAPTURE_LAYOUT, DEFAULT_DEVICE, DEFAULT_INPUT_FORMAT};
use camrec_core::shared::error::RecorderError;
use camrec_core::shared::session_config::SessionConfig;

/// Record a camera to a compressed video file. Press Ctrl+C to stop.
#[derive(Parser)]
#[command(name = "camrec", version)]
struct Cli {
    /// Output file; the extension picks the container (e.g. output.mp4).
    output: PathBuf,

    /// Capture device URL.
    #[arg(long, default_value = DEFAULT_DEVICE)]
    device: String,

    /// libavdevice input format (v4l2, avfoundation, dshow, lavfi, ...).
    #[arg(long, default_value = DEFAULT_INPUT_FORMAT)]
    input_format: String,

    /// Colour converter.
    #[arg(long, value_enum, default_value_t = ConverterArg::Swscale)]
    converter: ConverterArg,

    /// Capture on a separate thread.
    #[arg(long)]
    threaded: bool,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Periodically save the live frame to this image file.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Save a preview snapshot every N frames.
    #[arg(long, default_value = "24")]
    preview_every: u64,

    /// Show codec library diagnostics.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ConverterArg {
    /// libswscale, bicubic.
    Swscale,
    /// Pure Rust BT.601.
    Native,
}

impl From<ConverterArg> for ConverterKind {
    fn from(arg: ConverterArg) -> Self {
        match arg {
            ConverterArg::Swscale => ConverterKind::Swscale,
            ConverterArg::Native => ConverterKind::Native,
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{}", e.render());
                process::exit(0);
            }
            _ => {
                print!("{}", e.render());
                process::exit(1);
            }
        },
    };

    env_logger::init();

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(e.exit_code());
        }
    }
}

/// Returns the exit code for a recording that produced a finalized file.
fn run(cli: Cli) -> Result<i32, RecorderError> {
    ffmpeg_runtime::init(cli.verbose)?;
    let cancelled = install_interrupt_handler();
    let config = SessionConfig::default();

    // Acquisition order: device, container, encoder, converter, preview.
    // Anything failing here leaves no output file behind.
    let source = FfmpegDeviceSource::open(
        DeviceSpec {
            url: cli.device.clone(),
            input_format: Some(cli.input_format.clone()),
            width: config.width,
            height: config.height,
            frame_rate: config.frame_rate,
        },
        CAPTURE_LAYOUT,
    )?;
    let writer = FfmpegContainerWriter::new(&cli.output)?;
    let encoder = FfmpegEncoderSession::open(&config, writer.format())?;
    let converter = create_converter(cli.converter.into(), CAPTURE_LAYOUT, &config)?;
    let preview: Box<dyn FramePreview> = match &cli.preview {
        Some(path) => Box::new(SnapshotPreview::new(path, cli.preview_every)?),
        None => Box::new(NullPreview),
    };

    println!(
        "{}",
        SessionSummary::new(&cli.output, writer.format(), encoder.descriptor())
    );

    let executor: Box<dyn PipelineExecutor> = if cli.threaded {
        Box::new(ThreadedPipelineExecutor::new())
    } else {
        Box::new(SequentialPipelineExecutor::new())
    };
    let stages = PipelineStages {
        source: Box::new(source),
        preview,
        converter,
        encoder: Box::new(encoder),
        writer: Box::new(writer),
    };

    let mut use_case = RecordUseCase::new(stages, executor, cli.max_frames, Some(cancelled));
    let mut logger = StdoutPipelineLogger::new();
    let report = use_case.execute(&mut logger)?;

    println!("{} frames have been encoded", report.packets_written);
    log::info!(
        "{} frames captured and submitted, stopped by {:?}",
        report.frames_submitted,
        report.stop_reason
    );

    match report.failure {
        Some(e) => {
            eprintln!("Error: {e}");
            Ok(e.exit_code())
        }
        None => Ok(0),
    }
}

/// Ctrl+C only raises the flag; the recording loop polls it, then flushes
/// and finalizes normally.
fn install_interrupt_handler() -> Arc<AtomicBool> {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if !flag.swap(true, Ordering::SeqCst) {
            log::info!("interrupt received, finishing recording");
        }
    }) {
        log::warn!("could not install Ctrl+C handler: {e}");
    }
    cancelled
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::ffi::OsString;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["camrec", "out.mp4"]).unwrap();
        assert_eq!(cli.output, PathBuf::from("out.mp4"));
        assert_eq!(cli.device, DEFAULT_DEVICE);
        assert_eq!(cli.input_format, DEFAULT_INPUT_FORMAT);
        assert_eq!(ConverterKind::from(cli.converter), ConverterKind::Swscale);
        assert_eq!(cli.preview_every, 24);
        assert!(!cli.threaded);
        assert!(cli.max_frames.is_none());
    }

    #[test]
    fn test_missing_output_is_usage_error() {
        let err = Cli::try_parse_from(["camrec"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(err.render().to_string().contains("Usage"));
    }

    #[test]
    fn test_unknown_converter_is_rejected() {
        let err = Cli::try_parse_from(["camrec", "out.mp4", "--converter", "opencv"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_full_option_set() {
        let cli = Cli::try_parse_from([
            "camrec",
            "clip.mkv",
            "--device",
            "testsrc",
            "--input-format",
            "lavfi",
            "--converter",
            "native",
            "--threaded",
            "--max-frames",
            "48",
            "--preview",
            "live.png",
            "--preview-every",
            "12",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.input_format, "lavfi");
        assert_eq!(ConverterKind::from(cli.converter), ConverterKind::Native);
        assert!(cli.threaded && cli.verbose);
        assert_eq!(cli.max_frames, Some(48));
        assert_eq!(cli.preview, Some(PathBuf::from("live.png")));
        assert_eq!(cli.preview_every, 12);
    }

    #[test]
    fn test_missing_camera_fails_with_device_error_and_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let args: Vec<OsString> = vec![
            "camrec".into(),
            output.clone().into_os_string(),
            "--input-format".into(),
            "v4l2".into(),
            "--device".into(),
            "/dev/definitely-not-a-camera".into(),
        ];
        let cli = Cli::try_parse_from(args).unwrap();

        let err = run(cli).unwrap_err();
        assert!(matches!(err, RecorderError::Device { .. }));
        assert_eq!(err.exit_code(), 2);
        assert!(!output.exists());
    }
}
