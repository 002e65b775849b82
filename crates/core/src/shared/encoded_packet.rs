use crate::shared::rational::Rational;

/// One compressed packet as produced by the encoder.
///
/// Timestamps are expressed in `time_base`; the container writer rescales
/// them to the stream's own time-base.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedPacket {
    pub data: Vec<u8>,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
    pub is_key: bool,
    pub time_base: Rational,
}

impl EncodedPacket {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Moves pts, dts and duration into `target` in place.
    pub fn rescale_to(&mut self, target: Rational) {
        let from = self.time_base;
        self.pts = self.pts.map(|ts| Rational::rescale(ts, from, target));
        self.dts = self.dts.map(|ts| Rational::rescale(ts, from, target));
        if self.duration > 0 {
            self.duration = Rational::rescale(self.duration, from, target);
        }
        self.time_base = target;
    }

    /// Ordering key used for monotonicity checks: dts, falling back to pts.
    pub fn decode_ts(&self) -> Option<i64> {
        self.dts.or(self.pts)
    }
}
