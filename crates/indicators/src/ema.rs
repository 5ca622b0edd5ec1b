use crate::{Indicator, IndicatorError};
use rust_decimal::Decimal;

/// Exponential Moving Average (EMA).
///
/// Seeded with the simple average of the first `period` values, then
/// `ema = value * α + prev * (1 - α)` with `α = 2 / (period + 1)`.
#[derive(Debug, Clone)]
pub struct Ema {
    len: usize,
    multiplier: Decimal,
    current: Option<Decimal>,
    count: usize,
    /// Accumulates values for the initial SMA seed.
    seed_sum: Decimal,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::ZeroPeriod { indicator: "EMA" });
        }
        let multiplier = Decimal::TWO / (Decimal::from(period) + Decimal::ONE);
        Ok(Self {
            len: period,
            multiplier,
            current: None,
            count: 0,
            seed_sum: Decimal::ZERO,
        })
    }

    pub fn value(&self) -> Option<Decimal> {
        self.current
    }

    /// Largest value the seed sum accepts without overflow, with 2x headroom.
    pub fn max_input(&self) -> Decimal {
        Decimal::MAX / Decimal::from(self.len.saturating_add(1)) / Decimal::TWO
    }
}

impl Indicator for Ema {
    fn next(&mut self, value: Decimal) -> Option<Decimal> {
        match self.current {
            None => {
                self.count += 1;
                self.seed_sum += value;
                if self.count >= self.len {
                    self.current = Some(self.seed_sum / Decimal::from(self.len));
                }
            }
            Some(prev) => {
                let ema = (value - prev) * self.multiplier + prev;
                self.current = Some(ema);
            }
        }

        self.current
    }

    fn reset(&mut self) {
        self.current = None;
        self.count = 0;
        self.seed_sum = Decimal::ZERO;
    }

    fn period(&self) -> usize {
        self.len
    }

    fn is_ready(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ema_rejects_zero_period() {
        assert_eq!(
            Ema::new(0).unwrap_err(),
            IndicatorError::ZeroPeriod { indicator: "EMA" }
        );
    }

    #[test]
    fn test_ema_seed() {
        let mut ema = Ema::new(3).unwrap();
        assert_eq!(ema.next(dec!(2)), None);
        assert_eq!(ema.next(dec!(4)), None);
        // Third value → SMA seed = (2+4+6)/3 = 4
        assert_eq!(ema.next(dec!(6)), Some(dec!(4)));
    }

    #[test]
    fn test_ema_after_seed() {
        let mut ema = Ema::new(3).unwrap();
        ema.next(dec!(2));
        ema.next(dec!(4));
        ema.next(dec!(6)); // seed = 4
        // EMA = (8 - 4) * 0.5 + 4 = 6
        assert_eq!(ema.next(dec!(8)), Some(dec!(6)));
        // EMA = (2 - 6) * 0.5 + 6 = 4
        assert_eq!(ema.next(dec!(2)), Some(dec!(4)));
    }

    #[test]
    fn test_ema_matches_recurrence() {
        let closes = [dec!(10), dec!(11), dec!(13), dec!(12), dec!(15), dec!(14), dec!(16)];
        let mut ema = Ema::new(4).unwrap();
        let alpha = dec!(2) / dec!(5);

        let mut expected = (closes[0] + closes[1] + closes[2] + closes[3]) / dec!(4);
        let mut last = None;
        for close in closes {
            last = ema.next(close);
        }
        for close in &closes[4..] {
            expected = *close * alpha + expected * (Decimal::ONE - alpha);
        }
        let diff = (last.unwrap() - expected).abs();
        assert!(diff < dec!(0.0000000001), "diff = {}", diff);
    }

    #[test]
    fn test_ema_constant_series_stays_constant() {
        let mut ema = Ema::new(20).unwrap();
        let mut last = None;
        for _ in 0..200 {
            last = ema.next(dec!(100));
        }
        assert_eq!(last, Some(dec!(100)));
    }

    #[test]
    fn test_ema_max_input_bounds_seed_sum() {
        let ema = Ema::new(50).unwrap();
        let top = ema.max_input();
        assert!(top * Decimal::from(50) < Decimal::MAX);
        assert!(Ema::new(5_000).unwrap().max_input() < top);
    }

    #[test]
    fn test_ema_reset() {
        let mut ema = Ema::new(2).unwrap();
        ema.next(dec!(1));
        ema.next(dec!(3));
        assert!(ema.is_ready());
        ema.reset();
        assert!(!ema.is_ready());
        assert_eq!(ema.next(dec!(5)), None);
        assert_eq!(ema.next(dec!(7)), Some(dec!(6)));
    }
}
