use std::fmt;

/// An exact rational number, used both for frame rates and for time-bases
/// (the duration of one timestamp tick).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i32,
    den: i32,
}

impl Rational {
    /// Creates a rational. The denominator must be non-zero.
    pub fn new(num: i32, den: i32) -> Self {
        assert!(den != 0, "rational denominator must be non-zero");
        Self { num, den }
    }

    pub fn numerator(&self) -> i32 {
        self.num
    }

    pub fn denominator(&self) -> i32 {
        self.den
    }

    /// Reciprocal: a frame rate of 24/1 becomes a time-base of 1/24.
    pub fn invert(&self) -> Self {
        Self::new(self.den, self.num)
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Converts `ts` from time-base `from` to time-base `to`.
    ///
    /// Computes `ts * from / to` in 128-bit arithmetic and rounds to the
    /// nearest integer with ties away from zero, the same rule container
    /// muxers use when rescaling packet timestamps.
    pub fn rescale(ts: i64, from: Rational, to: Rational) -> i64 {
        let b = from.num as i128 * to.den as i128;
        let c = from.den as i128 * to.num as i128;
        let (b, c) = if c < 0 { (-b, -c) } else { (b, c) };
        assert!(c != 0, "cannot rescale into a zero time-base");

        let product = ts as i128 * b;
        let half = c / 2;
        let rounded = if product < 0 {
            -((-product + half) / c)
        } else {
            (product + half) / c
        };
        rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}
