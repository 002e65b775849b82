pub mod ffmpeg_device_source;
pub mod snapshot_preview;
