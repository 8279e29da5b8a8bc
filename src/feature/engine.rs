//! Owns a [`RollingState`] for one instrument and emits raw snapshots.

use crate::feature::snapshot::FeatureInputSnapshot;
use crate::orderbook::OrderBook;
use crate::rolling::RollingState;

/// Per-instrument feature engine. Receives event/trade notifications from the
/// `OrderEngine` and, on demand, emits a [`FeatureInputSnapshot`] combining
/// order-book depth with its rolling aggregates.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    /// Instrument this engine tracks.
    pub instrument: String,
    /// Rolling deques and running sums.
    pub rolling: RollingState,
    /// Timestamp of the most recently processed event for this instrument.
    pub last_event_timestamp_ns: u64,
}

impl FeatureEngine {
    /// Construct an engine with empty rolling state bounded by
    /// `rolling_window`/`mid_history`.
    pub fn new(instrument: impl Into<String>, rolling_window: usize, mid_history: usize) -> Self {
        Self {
            instrument: instrument.into(),
            rolling: RollingState::new(rolling_window, mid_history),
            last_event_timestamp_ns: 0,
        }
    }

    /// Record a trade print.
    pub fn on_trade(&mut self, size: f64, direction: i8) {
        self.rolling.on_trade(size, direction);
    }

    /// Record the kind of the most recently applied book event.
    pub fn on_event(&mut self, kind: char) {
        self.rolling.on_event(kind);
    }

    /// Sample the mid-price/spread sub-clock.
    pub fn sample_mid_spread(&mut self, mid: f64, spread: f64) {
        self.rolling.sample_mid_spread(mid, spread);
    }

    /// Build a transient snapshot from the current book state and the
    /// rolling aggregates, then reset `adds_since_last_snapshot`.
    pub fn snapshot(&mut self, book: &mut OrderBook, timestamp_ns: u64) -> FeatureInputSnapshot<'_> {
        let best_bid = book.best_bid().unwrap_or(f64::NAN);
        let best_ask = book.best_ask().unwrap_or(f64::NAN);
        let top_n = book.top_n_snapshot();
        let depth_change = book.depth_change();
        let buy_volume = self.rolling.buy_volume;
        let sell_volume = self.rolling.sell_volume;
        let adds_since_last_snapshot = self.rolling.adds_since_last_snapshot;
        self.rolling.adds_since_last_snapshot = 0;

        FeatureInputSnapshot {
            instrument: self.instrument.clone(),
            timestamp_ns,
            best_bid,
            best_ask,
            top_n,
            depth_change,
            buy_volume,
            sell_volume,
            adds_since_last_snapshot,
            rolling: &self.rolling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Side;

    #[test]
    fn snapshot_resets_adds_counter() {
        let mut engine = FeatureEngine::new("ES", 100, 100);
        let mut book = OrderBook::new("ES", 10);
        book.apply_add(1, 100.0, 5, Side::Bid).unwrap();
        engine.on_event('A');
        engine.on_event('A');

        let snap = engine.snapshot(&mut book, 1_000);
        assert_eq!(snap.adds_since_last_snapshot, 2);
        assert_eq!(engine.rolling.adds_since_last_snapshot, 0);
    }
}
