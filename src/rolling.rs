//! Bounded rolling-window state shared by a [`crate::feature::FeatureEngine`].

use std::collections::VecDeque;

/// Per-instrument rolling deques with incrementally maintained running sums.
///
/// All deques are strictly bounded: `midprices`/`spreads` by `mid_history`,
/// everything else by `rolling_window`.
#[derive(Debug, Clone)]
pub struct RollingState {
    rolling_window: usize,
    mid_history: usize,

    /// Trailing mid-price samples, one per `sample_mid_spread` call.
    pub midprices: VecDeque<f64>,
    /// Trailing spread samples, one per `sample_mid_spread` call.
    pub spreads: VecDeque<f64>,
    /// Sign of consecutive mid-price changes, in {-1, 0, 1}.
    pub tick_directions: VecDeque<i8>,
    /// Aggressor direction of each trade print, in {-1, 1}.
    pub trade_directions: VecDeque<i8>,
    /// Event-kind log, most recent last.
    pub event_types: VecDeque<char>,
    /// `(direction, size)` pairs backing `buy_volume`/`sell_volume`.
    pub trade_volumes: VecDeque<(i8, f64)>,
    /// Running sum of sizes for buy-side (direction > 0) trades in `trade_volumes`.
    pub buy_volume: f64,
    /// Running sum of sizes for sell-side (direction < 0) trades in `trade_volumes`.
    pub sell_volume: f64,
    /// Number of `Add` events observed since the last snapshot reset this.
    pub adds_since_last_snapshot: u64,
}

impl RollingState {
    /// Construct an empty state bounded by `rolling_window`/`mid_history`.
    pub fn new(rolling_window: usize, mid_history: usize) -> Self {
        Self {
            rolling_window,
            mid_history,
            midprices: VecDeque::new(),
            spreads: VecDeque::new(),
            tick_directions: VecDeque::new(),
            trade_directions: VecDeque::new(),
            event_types: VecDeque::new(),
            trade_volumes: VecDeque::new(),
            buy_volume: 0.0,
            sell_volume: 0.0,
            adds_since_last_snapshot: 0,
        }
    }

    /// Record a trade print: `direction` is `+1` for an aggressing buyer,
    /// `-1` for an aggressing seller.
    pub fn on_trade(&mut self, size: f64, direction: i8) {
        if direction != 0 {
            self.trade_directions.push_back(direction);
            if self.trade_directions.len() > self.rolling_window {
                self.trade_directions.pop_front();
            }
        }

        self.trade_volumes.push_back((direction, size));
        if direction > 0 {
            self.buy_volume += size;
        } else if direction < 0 {
            self.sell_volume += size;
        }
        if self.trade_volumes.len() > self.rolling_window {
            if let Some((evicted_dir, evicted_size)) = self.trade_volumes.pop_front() {
                if evicted_dir > 0 {
                    self.buy_volume -= evicted_size;
                } else if evicted_dir < 0 {
                    self.sell_volume -= evicted_size;
                }
            }
        }
    }

    /// Record the kind of the most recently applied book event.
    pub fn on_event(&mut self, kind: char) {
        if kind == 'A' {
            self.adds_since_last_snapshot += 1;
        }
        self.event_types.push_back(kind);
        if self.event_types.len() > self.rolling_window {
            self.event_types.pop_front();
        }
    }

    /// Sample the mid-price/spread sub-clock. Invoked by the `Pipeline` at
    /// fixed event-time intervals, independent of event density.
    pub fn sample_mid_spread(&mut self, mid: f64, spread: f64) {
        self.midprices.push_back(mid);
        self.spreads.push_back(spread);

        if self.midprices.len() >= 2 {
            let last = self.midprices[self.midprices.len() - 1];
            let prev = self.midprices[self.midprices.len() - 2];
            let tick = (last - prev).partial_cmp(&0.0).map_or(0, |ord| match ord {
                std::cmp::Ordering::Greater => 1,
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
            });
            self.tick_directions.push_back(tick);
            if self.tick_directions.len() > self.rolling_window {
                self.tick_directions.pop_front();
            }
        }

        if self.midprices.len() > self.mid_history {
            self.midprices.pop_front();
        }
        if self.spreads.len() > self.mid_history {
            self.spreads.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_volume_running_sums_track_evictions() {
        let mut state = RollingState::new(2, 10);
        state.on_trade(5.0, 1);
        state.on_trade(3.0, -1);
        assert_eq!(state.buy_volume, 5.0);
        assert_eq!(state.sell_volume, 3.0);

        state.on_trade(2.0, 1);
        assert_eq!(state.trade_volumes.len(), 2);
        // the first trade (5.0, +1) was evicted.
        assert_eq!(state.buy_volume, 2.0);
        assert_eq!(state.sell_volume, 3.0);
    }

    #[test]
    fn mid_spread_sampling_bounds_and_tick_direction() {
        let mut state = RollingState::new(10, 3);
        state.sample_mid_spread(100.0, 1.0);
        assert!(state.tick_directions.is_empty());

        state.sample_mid_spread(101.0, 1.0);
        assert_eq!(state.tick_directions.back(), Some(&1));

        state.sample_mid_spread(101.0, 1.0);
        assert_eq!(state.tick_directions.back(), Some(&0));

        state.sample_mid_spread(99.0, 1.0);
        assert_eq!(state.tick_directions.back(), Some(&-1));
        assert_eq!(state.midprices.len(), 3);
    }

    #[test]
    fn adds_since_last_snapshot_counts_only_add_events() {
        let mut state = RollingState::new(10, 10);
        state.on_event('A');
        state.on_event('M');
        state.on_event('A');
        assert_eq!(state.adds_since_last_snapshot, 2);
        assert_eq!(state.event_types.len(), 3);
    }
}
