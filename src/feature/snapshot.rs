//! Transient, borrowed view fed into [`crate::feature::FeatureProcessor`].

use crate::orderbook::{DepthChange, TopNSnapshot};
use crate::rolling::RollingState;

/// A consistent, transient snapshot combining order-book depth, rolling
/// aggregates, and a depth-change delta. Produced and immediately consumed;
/// it never outlives a single `FeatureEngine::snapshot` call.
pub struct FeatureInputSnapshot<'a> {
    /// Instrument this snapshot belongs to.
    pub instrument: String,
    /// Event-time timestamp this snapshot was taken at.
    pub timestamp_ns: u64,
    /// Best bid price; `NaN` if the bid side is empty.
    pub best_bid: f64,
    /// Best ask price; `NaN` if the ask side is empty.
    pub best_ask: f64,
    /// Top-N bid/ask price/size arrays.
    pub top_n: TopNSnapshot,
    /// Per-level depth-change direction since the previous snapshot.
    pub depth_change: DepthChange,
    /// Running buy-side trade volume.
    pub buy_volume: f64,
    /// Running sell-side trade volume.
    pub sell_volume: f64,
    /// Number of `Add` events observed since the last snapshot.
    pub adds_since_last_snapshot: u64,
    /// Borrowed rolling deques backing the closed-form formulas.
    pub rolling: &'a RollingState,
}
