use crate::sma::Sma;
use crate::{Indicator, IndicatorError};
use rust_decimal::Decimal;

/// Bollinger Bands.
///
/// The middle band is the SMA of the window; the bands sit `num_std`
/// population standard deviations above and below it. Variance comes from
/// a running sum of squares, so each update is O(1).
///
/// [`Indicator::next`] returns the middle band. Use [`BollingerBands::next_output`]
/// for all three.
///
/// Inputs must not exceed [`BollingerBands::max_input`]; above it the sum of
/// squares leaves the `Decimal` range.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    len: usize,
    num_std: Decimal,
    max_input: Decimal,
    sma: Sma,
    sum_sq: Decimal,
    output: Option<BollingerOutput>,
}

/// Bollinger Bands output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BollingerOutput {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
    pub bandwidth: Decimal,
}

impl BollingerBands {
    pub fn new(period: usize, num_std_dev: Decimal) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::ZeroPeriod {
                indicator: "Bollinger Bands",
            });
        }
        if num_std_dev <= Decimal::ZERO {
            return Err(IndicatorError::NonPositiveMultiplier {
                indicator: "Bollinger Bands",
                value: num_std_dev,
            });
        }
        Ok(Self {
            len: period,
            num_std: num_std_dev,
            max_input: bands_max_input(period, num_std_dev),
            sma: Sma::new(period)?,
            sum_sq: Decimal::ZERO,
            output: None,
        })
    }

    /// Largest value the window arithmetic accepts without overflow.
    pub fn max_input(&self) -> Decimal {
        self.max_input
    }

    pub fn output(&self) -> Option<BollingerOutput> {
        self.output
    }

    pub fn next_output(&mut self, value: Decimal) -> Option<BollingerOutput> {
        self.sum_sq += value * value;
        if let Some(evicted) = self.sma.push(value) {
            self.sum_sq -= evicted * evicted;
        }

        if let Some(mid) = self.sma.value() {
            let variance = self.sum_sq / Decimal::from(self.len) - mid * mid;
            // Rounding can push a flat window slightly below zero.
            let sd = decimal_sqrt(variance.max(Decimal::ZERO));
            let upper = mid + self.num_std * sd;
            let lower = mid - self.num_std * sd;
            self.output = Some(BollingerOutput {
                upper,
                middle: mid,
                lower,
                bandwidth: upper - lower,
            });
        }

        self.output
    }
}

impl Indicator for BollingerBands {
    fn next(&mut self, value: Decimal) -> Option<Decimal> {
        self.next_output(value).map(|o| o.middle)
    }

    fn reset(&mut self) {
        self.sma.reset();
        self.sum_sq = Decimal::ZERO;
        self.output = None;
    }

    fn period(&self) -> usize {
        self.len
    }

    fn is_ready(&self) -> bool {
        self.output.is_some()
    }
}

// The window holds up to `period + 1` squares before eviction, and the band
// offset is at most `k` times the largest value. Half of each limit is kept
// as headroom for rounding.
fn bands_max_input(period: usize, num_std: Decimal) -> Decimal {
    let squares = Decimal::from(period.saturating_add(1));
    let by_squares = decimal_sqrt(Decimal::MAX / squares);
    let by_width = Decimal::MAX / num_std.checked_add(Decimal::ONE).unwrap_or(num_std);
    by_squares.min(by_width) / Decimal::TWO
}

/// Newton's method square root for Decimal.
pub fn decimal_sqrt(value: Decimal) -> Decimal {
    if value.is_zero() || value < Decimal::ZERO {
        return Decimal::ZERO;
    }
    let mut guess = value / Decimal::TWO;
    if guess.is_zero() {
        return Decimal::ZERO;
    }
    let epsilon = Decimal::new(1, 10); // 0.0000000001
    for _ in 0..100 {
        let next_guess = (guess + value / guess) / Decimal::TWO;
        let diff = (next_guess - guess).abs();
        guess = next_guess;
        if diff < epsilon {
            break;
        }
    }
    guess
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn close_to(a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < dec!(0.000001)
    }

    #[test]
    fn test_bollinger_basic() {
        let mut bb = BollingerBands::new(3, Decimal::TWO).unwrap();
        assert!(bb.next_output(dec!(10)).is_none());
        assert!(bb.next_output(dec!(11)).is_none());
        let out = bb.next_output(dec!(12)).unwrap();
        assert_eq!(out.middle, dec!(11));
        assert!(out.upper > out.middle);
        assert!(out.lower < out.middle);
    }

    #[test]
    fn test_bollinger_population_std_dev() {
        // mean = 4, variance = 1, σ = 1 → upper 6, lower 2
        let mut bb = BollingerBands::new(2, Decimal::TWO).unwrap();
        bb.next_output(dec!(3));
        let out = bb.next_output(dec!(5)).unwrap();
        assert_eq!(out.middle, dec!(4));
        assert!(close_to(out.upper, dec!(6)));
        assert!(close_to(out.lower, dec!(2)));
        assert!(close_to(out.bandwidth, dec!(4)));
    }

    #[test]
    fn test_bollinger_window_slides() {
        let mut bb = BollingerBands::new(2, Decimal::ONE).unwrap();
        bb.next_output(dec!(100));
        bb.next_output(dec!(3));
        // Window is now [3, 5] → mean 4, σ 1
        let out = bb.next_output(dec!(5)).unwrap();
        assert_eq!(out.middle, dec!(4));
        assert!(close_to(out.upper, dec!(5)));
        assert!(close_to(out.lower, dec!(3)));
    }

    #[test]
    fn test_bollinger_constant_input_zero_width() {
        let mut bb = BollingerBands::new(20, Decimal::TWO).unwrap();
        let mut out = None;
        for _ in 0..25 {
            out = bb.next_output(dec!(100));
        }
        let out = out.unwrap();
        assert_eq!(out.upper, dec!(100));
        assert_eq!(out.lower, dec!(100));
        assert_eq!(out.bandwidth, Decimal::ZERO);
    }

    #[test]
    fn test_bollinger_rejects_bad_params() {
        assert!(matches!(
            BollingerBands::new(0, Decimal::TWO),
            Err(IndicatorError::ZeroPeriod { .. })
        ));
        assert!(matches!(
            BollingerBands::new(20, Decimal::ZERO),
            Err(IndicatorError::NonPositiveMultiplier { .. })
        ));
        assert!(matches!(
            BollingerBands::new(20, dec!(-1)),
            Err(IndicatorError::NonPositiveMultiplier { .. })
        ));
    }

    #[test]
    fn test_bollinger_reset() {
        let mut bb = BollingerBands::new(2, Decimal::TWO).unwrap();
        bb.next_output(dec!(3));
        bb.next_output(dec!(5));
        bb.reset();
        assert!(!bb.is_ready());
        assert!(bb.next_output(dec!(7)).is_none());
        assert_eq!(bb.next(dec!(9)), Some(dec!(8)));
    }

    #[test]
    fn test_max_input_shrinks_with_window() {
        let default = BollingerBands::new(20, Decimal::TWO).unwrap();
        let wide = BollingerBands::new(20_000, Decimal::TWO).unwrap();
        assert!(wide.max_input() < default.max_input());
        // sqrt(Decimal::MAX / 21) / 2 is about 3.07e13
        assert!(default.max_input() > dec!(10000000000000));
        assert!(default.max_input() < dec!(100000000000000));
    }

    #[test]
    fn test_values_at_max_input_do_not_overflow() {
        let mut bb = BollingerBands::new(20, dec!(3)).unwrap();
        let top = bb.max_input();
        let mut out = None;
        for i in 0..45 {
            let value = if i % 2 == 0 { top } else { Decimal::ZERO };
            out = bb.next_output(value);
        }
        let out = out.unwrap();
        assert!(out.upper > out.middle);
        assert!(out.lower < out.middle);
    }

    #[test]
    fn test_decimal_sqrt() {
        let result = decimal_sqrt(dec!(4));
        assert!((result - dec!(2)).abs() < dec!(0.0001));

        let result = decimal_sqrt(dec!(9));
        assert!((result - dec!(3)).abs() < dec!(0.0001));

        assert_eq!(decimal_sqrt(dec!(-1)), Decimal::ZERO);
    }
}
