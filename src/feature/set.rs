//! The output feature vector and its numeric-field enumeration.

use serde::{Deserialize, Serialize};

/// Number of z-scored numeric fields in a [`FeatureSet`] (everything except
/// `timestamp_ns` and `instrument`).
pub const NUM_NUMERIC_FIELDS: usize = 19;

/// A single emitted feature vector: either the raw closed-form computation
/// ([`crate::feature::FeatureProcessor`]) or its rolling z-score
/// ([`crate::feature::FeatureNormalizer`]).
///
/// `timestamp_ns` and `instrument` pass through the normaliser unchanged;
/// every other field is one of the 19 z-scored numeric fields, always in the
/// order given by [`FeatureSet::numeric_fields`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Snapshot boundary this feature vector was computed at.
    pub timestamp_ns: u64,
    /// Midprice at snapshot time.
    pub midprice: f64,
    /// `ln(ask) - ln(bid)`.
    pub log_spread: f64,
    /// `ln(mid) - ln(mid_k)`, k snapshots in the past.
    pub log_return: f64,
    /// EWM volatility of the log-return series.
    pub ewm_volatility: f64,
    /// Mean squared log-return over the rolling mid-price series.
    pub realized_variance: f64,
    /// Signed asymmetry between up-move and down-move variance.
    pub directional_volatility: f64,
    /// Population standard deviation of the rolling spread series.
    pub spread_volatility: f64,
    /// Depth-decay-weighted, volume-normalised, EMA-smoothed order flow imbalance.
    pub ofi: f64,
    /// `(buy_volume - sell_volume) / (buy_volume + sell_volume)`.
    pub signed_volume_pressure: f64,
    /// Rate of `Add` events since the previous snapshot.
    pub order_arrival_rate: f64,
    /// `(bid_depth - ask_depth) / (bid_depth + ask_depth)`.
    pub depth_imbalance: f64,
    /// Total resting size across both sides' captured levels.
    pub market_depth: f64,
    /// Log-price-weighted book slope, both sides summed.
    pub lob_slope: f64,
    /// Volume-weighted level0-vs-level1 price gap, both sides summed.
    pub price_gap: f64,
    /// Shannon entropy (log2) of the 3-class tick-direction distribution.
    pub tick_direction_entropy: f64,
    /// Fraction of consecutive non-zero trade-direction pairs that flip sign.
    pub reversal_rate: f64,
    /// Mean of the trade-direction series.
    pub aggressor_bias: f64,
    /// Binary Shannon entropy over non-zero trade directions.
    pub shannon_entropy: f64,
    /// EMA-smoothed top-5-levels liquidity stress index.
    pub liquidity_stress: f64,
    /// Instrument this vector was computed for.
    pub instrument: String,
}

impl FeatureSet {
    /// The 19 numeric fields, in the fixed order the normaliser iterates
    /// them, replacing the original reference's string-keyed field lookup
    /// with a compile-time enumeration.
    pub fn numeric_fields(&self) -> [f64; NUM_NUMERIC_FIELDS] {
        [
            self.midprice,
            self.log_spread,
            self.log_return,
            self.ewm_volatility,
            self.realized_variance,
            self.directional_volatility,
            self.spread_volatility,
            self.ofi,
            self.signed_volume_pressure,
            self.order_arrival_rate,
            self.depth_imbalance,
            self.market_depth,
            self.lob_slope,
            self.price_gap,
            self.tick_direction_entropy,
            self.reversal_rate,
            self.aggressor_bias,
            self.shannon_entropy,
            self.liquidity_stress,
        ]
    }

    /// Return a copy of `self` with the 19 numeric fields replaced by
    /// `values` (same fixed order as [`FeatureSet::numeric_fields`]).
    /// `timestamp_ns` and `instrument` are preserved unchanged.
    pub fn with_numeric_fields(&self, values: [f64; NUM_NUMERIC_FIELDS]) -> FeatureSet {
        FeatureSet {
            timestamp_ns: self.timestamp_ns,
            instrument: self.instrument.clone(),
            midprice: values[0],
            log_spread: values[1],
            log_return: values[2],
            ewm_volatility: values[3],
            realized_variance: values[4],
            directional_volatility: values[5],
            spread_volatility: values[6],
            ofi: values[7],
            signed_volume_pressure: values[8],
            order_arrival_rate: values[9],
            depth_imbalance: values[10],
            market_depth: values[11],
            lob_slope: values[12],
            price_gap: values[13],
            tick_direction_entropy: values[14],
            reversal_rate: values[15],
            aggressor_bias: values[16],
            shannon_entropy: values[17],
            liquidity_stress: values[18],
        }
    }
}
