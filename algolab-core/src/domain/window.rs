//! PriceWindow: the trailing slice of bars visible at decision time.

use chrono::NaiveDateTime;

use super::bar::Bar;

/// Immutable view of the most recent bars up to and including "now".
///
/// The last bar is the current bar. Signal functions receive a window by value
/// (it is `Copy`) and cannot mutate the underlying series.
#[derive(Debug, Clone, Copy)]
pub struct PriceWindow<'a> {
    bars: &'a [Bar],
}

impl<'a> PriceWindow<'a> {
    pub fn new(bars: &'a [Bar]) -> Self {
        Self { bars }
    }

    /// Window over `bars[..=now]`, keeping at most `max_len` trailing bars.
    pub fn trailing(bars: &'a [Bar], now: usize, max_len: usize) -> Self {
        let end = (now + 1).min(bars.len());
        let start = end.saturating_sub(max_len.max(1));
        Self {
            bars: &bars[start..end],
        }
    }

    pub fn bars(&self) -> &'a [Bar] {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// The current bar.
    pub fn last(&self) -> Option<&'a Bar> {
        self.bars.last()
    }

    /// Bar `n` positions back from the current one (`ago(0)` is the current bar).
    pub fn ago(&self, n: usize) -> Option<&'a Bar> {
        self.bars.len().checked_sub(n + 1).map(|i| &self.bars[i])
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn trailing_window_clamps_to_history() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let w = PriceWindow::trailing(&bars, 1, 10);
        assert_eq!(w.len(), 2);
        assert_eq!(w.last().unwrap().close, 2.0);
    }

    #[test]
    fn trailing_window_keeps_most_recent() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let w = PriceWindow::trailing(&bars, 4, 3);
        assert_eq!(w.closes(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn ago_indexes_backwards() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        let w = PriceWindow::new(&bars);
        assert_eq!(w.ago(0).unwrap().close, 3.0);
        assert_eq!(w.ago(2).unwrap().close, 1.0);
        assert!(w.ago(3).is_none());
    }

    #[test]
    fn window_does_not_see_future_bars() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0]);
        let w = PriceWindow::trailing(&bars, 2, 100);
        assert!(w.bars().iter().all(|b| b.timestamp <= bars[2].timestamp));
    }
}
