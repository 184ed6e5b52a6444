//! Signed fixed-point code space shared by estimator backends.
//!
//! A format with precision `p` and magnitude bound `M` has `p + 1` bits: codes
//! run over `[-2^p, 2^p)` and code `c` decodes to `c * M / 2^p`, so every
//! decoded value lies in `[-M, M)` at resolution `M / 2^p`.

/// Largest precision whose codes and resolution are still exact in an `f64`.
pub const MAX_PRECISION: u32 = 52;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedPointFormat {
    precision: u32,
    magnitude_bound: f64,
}

impl FixedPointFormat {
    /// Callers are expected to have checked `1 <= precision <= MAX_PRECISION`
    /// and a positive bound; see `EstimationRequest::new`.
    pub(crate) fn new(precision: u32, magnitude_bound: f64) -> Self {
        debug_assert!((1..=MAX_PRECISION).contains(&precision));
        debug_assert!(magnitude_bound > 0.0);
        Self {
            precision,
            magnitude_bound,
        }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn magnitude_bound(&self) -> f64 {
        self.magnitude_bound
    }

    /// Number of distinct codes, `2^(p+1)`.
    pub fn code_count(&self) -> u64 {
        1u64 << (self.precision + 1)
    }

    pub fn min_code(&self) -> i64 {
        -(1i64 << self.precision)
    }

    pub fn max_code(&self) -> i64 {
        (1i64 << self.precision) - 1
    }

    pub fn resolution(&self) -> f64 {
        self.magnitude_bound / (1u64 << self.precision) as f64
    }

    pub fn contains_code(&self, code: i64) -> bool {
        (self.min_code()..=self.max_code()).contains(&code)
    }

    /// Nearest code to `value`, saturating at the ends of the code range.
    pub fn encode(&self, value: f64) -> i64 {
        if value.is_nan() {
            return 0;
        }
        let scaled = (value / self.resolution()).round();
        scaled.clamp(self.min_code() as f64, self.max_code() as f64) as i64
    }

    /// Value of `code`, without range checking.
    pub fn decode(&self, code: i64) -> f64 {
        code as f64 * self.resolution()
    }

    /// Maps an unsigned register reading in `[0, 2^(p+1))` onto the signed
    /// code range, upper half negative.
    pub fn signed_from_register(&self, register: u64) -> i64 {
        let half = 1u64 << self.precision;
        let register = register % self.code_count();
        if register >= half {
            register as i64 - self.code_count() as i64
        } else {
            register as i64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn code_range_spans_p_plus_one_bits() {
        let format = FixedPointFormat::new(4, 100.0);
        assert_eq!(format.code_count(), 32);
        assert_eq!(format.min_code(), -16);
        assert_eq!(format.max_code(), 15);
        assert_abs_diff_eq!(format.resolution(), 6.25);
        assert_abs_diff_eq!(format.decode(format.min_code()), -100.0);
        assert!(format.decode(format.max_code()) < 100.0);
    }

    #[test]
    fn encode_decode_stays_within_one_resolution_step() {
        for precision in [1, 4, 7, 10, 16] {
            let format = FixedPointFormat::new(precision, 100.0);
            let mut value = -100.0;
            while value < 100.0 {
                let recovered = format.decode(format.encode(value));
                assert!(
                    (recovered - value).abs() <= format.resolution(),
                    "p={precision} v={value} recovered={recovered}"
                );
                value += 0.731;
            }
        }
    }

    #[test]
    fn encode_saturates_out_of_range_values() {
        let format = FixedPointFormat::new(3, 10.0);
        assert_eq!(format.encode(1e6), format.max_code());
        assert_eq!(format.encode(-1e6), format.min_code());
        assert_eq!(format.encode(9.99), format.max_code());
    }

    #[test]
    fn signed_register_mapping_is_twos_complement() {
        let format = FixedPointFormat::new(2, 1.0);
        let mapped: Vec<i64> = (0..8).map(|r| format.signed_from_register(r)).collect();
        assert_eq!(mapped, vec![0, 1, 2, 3, -4, -3, -2, -1]);
    }
}
