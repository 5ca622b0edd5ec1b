use crate::{Indicator, IndicatorError};
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Simple Moving Average over a fixed window, kept as a rolling sum.
///
/// The window itself is exposed through [`Sma::push`], which hands back the
/// value that fell out so other window statistics can be kept in step.
#[derive(Debug, Clone)]
pub struct Sma {
    len: usize,
    window: VecDeque<Decimal>,
    sum: Decimal,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::ZeroPeriod { indicator: "SMA" });
        }
        Ok(Self {
            len: period,
            window: VecDeque::with_capacity(period + 1),
            sum: Decimal::ZERO,
        })
    }

    /// Add a value to the window and return the one it evicted, if full.
    pub fn push(&mut self, value: Decimal) -> Option<Decimal> {
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() <= self.len {
            return None;
        }
        let evicted = self.window.pop_front()?;
        self.sum -= evicted;
        Some(evicted)
    }

    /// Mean of the current window, `None` until it is full.
    pub fn value(&self) -> Option<Decimal> {
        self.is_ready().then(|| self.sum / Decimal::from(self.len))
    }
}

impl Indicator for Sma {
    fn next(&mut self, value: Decimal) -> Option<Decimal> {
        self.push(value);
        self.value()
    }

    fn reset(&mut self) {
        self.window.clear();
        self.sum = Decimal::ZERO;
    }

    fn period(&self) -> usize {
        self.len
    }

    fn is_ready(&self) -> bool {
        self.window.len() == self.len
    }
}
