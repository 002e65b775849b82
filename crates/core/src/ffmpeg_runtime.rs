use std::sync::Once;

use crate::shared::error::RecorderError;
use crate::shared::rational::Rational;

static DEVICES: Once = Once::new();

/// One-time, process-wide codec library setup.
///
/// Initializes libavformat/libavcodec, registers capture devices and sets
/// the library's own log level. Safe to call more than once; nothing
/// global is mutated after the first call except the log level.
pub fn init(verbose: bool) -> Result<(), RecorderError> {
    ffmpeg_next::init().map_err(|e| RecorderError::initialization("ffmpeg", e))?;
    DEVICES.call_once(ffmpeg_next::device::register_all);

    let level = library_log_level(verbose);
    ffmpeg_next::util::log::set_level(level);
    log::debug!("ffmpeg initialized (library log level {level:?})");
    Ok(())
}

/// Library diagnostics stay silent unless asked for: failures already
/// reach the user as a single `RecorderError` line.
fn library_log_level(verbose: bool) -> ffmpeg_next::util::log::Level {
    if verbose {
        ffmpeg_next::util::log::Level::Info
    } else {
        ffmpeg_next::util::log::Level::Quiet
    }
}

pub(crate) fn to_av_rational(r: Rational) -> ffmpeg_next::Rational {
    ffmpeg_next::Rational(r.numerator(), r.denominator())
}

/// Falls back to `fallback` when the library leaves the value unset.
pub(crate) fn from_av_rational(r: ffmpeg_next::Rational, fallback: Rational) -> Rational {
    if r.denominator() == 0 || r.numerator() == 0 {
        fallback
    } else {
        Rational::new(r.numerator(), r.denominator())
    }
}
