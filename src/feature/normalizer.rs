//! Rolling z-score normalisation of a trailing window of [`FeatureSet`]s.

use crate::feature::set::{FeatureSet, NUM_NUMERIC_FIELDS};
use std::collections::VecDeque;
use tracing::warn;

/// Maintains a trailing window of raw [`FeatureSet`]s plus incrementally
/// updated per-field running sum and sum-of-squares, and produces z-scored
/// copies on demand.
///
/// This is a single-window design: the original implementation this crate
/// was derived from kept a dual long/short window pair with a partial
/// field-passthrough; this normaliser instead z-scores all 19 numeric
/// fields over one trailing window, per the governing specification.
#[derive(Debug, Clone)]
pub struct FeatureNormalizer {
    window_size: usize,
    window: VecDeque<FeatureSet>,
    sum: [f64; NUM_NUMERIC_FIELDS],
    sum2: [f64; NUM_NUMERIC_FIELDS],
}

impl FeatureNormalizer {
    /// Construct an empty normaliser bounded by `window_size`.
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            window: VecDeque::new(),
            sum: [0.0; NUM_NUMERIC_FIELDS],
            sum2: [0.0; NUM_NUMERIC_FIELDS],
        }
    }

    /// Append `fs` to the window, updating the running sums; evicts the
    /// oldest entry (subtracting its contribution) if the bound is exceeded.
    pub fn add(&mut self, fs: FeatureSet) {
        let values = fs.numeric_fields();
        for i in 0..NUM_NUMERIC_FIELDS {
            self.sum[i] += values[i];
            self.sum2[i] += values[i] * values[i];
        }
        self.window.push_back(fs);

        if self.window.len() > self.window_size {
            if let Some(evicted) = self.window.pop_front() {
                let evicted_values = evicted.numeric_fields();
                for i in 0..NUM_NUMERIC_FIELDS {
                    self.sum[i] -= evicted_values[i];
                    self.sum2[i] -= evicted_values[i] * evicted_values[i];
                }
            }
        }
    }

    /// Z-score `fs` against the window's current statistics (which do *not*
    /// include `fs` itself unless it was already `add`ed). `timestamp_ns`
    /// and `instrument` pass through unchanged.
    pub fn normalize(&self, fs: &FeatureSet) -> FeatureSet {
        let n = self.window.len();
        let values = fs.numeric_fields();
        let mut z = [0.0; NUM_NUMERIC_FIELDS];

        if n > 0 {
            let n_f = n as f64;
            for i in 0..NUM_NUMERIC_FIELDS {
                let mean = self.sum[i] / n_f;
                let variance = self.sum2[i] / n_f - mean * mean;
                let sigma = if variance <= 0.0 {
                    warn!(field_index = i, "variance is non-positive, substituting sigma=1.0");
                    1.0
                } else {
                    variance.sqrt()
                };
                z[i] = (values[i] - mean) / sigma;
            }
        }

        fs.with_numeric_fields(z)
    }

    /// Midprice of the `index`-th most recent entry in the window, or `0.0`
    /// if `index` is out of range.
    pub fn old_midprice(&self, index: usize) -> f64 {
        if index >= self.window.len() {
            0.0
        } else {
            self.window[self.window.len() - index - 1].midprice
        }
    }

    /// Number of entries currently held in the window.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs(midprice: f64) -> FeatureSet {
        FeatureSet {
            timestamp_ns: 0,
            instrument: "TEST".into(),
            midprice,
            log_spread: 0.0,
            log_return: 0.0,
            ewm_volatility: 0.0,
            realized_variance: 0.0,
            directional_volatility: 0.0,
            spread_volatility: 0.0,
            ofi: 0.0,
            signed_volume_pressure: 0.0,
            order_arrival_rate: 0.0,
            depth_imbalance: 0.0,
            market_depth: 0.0,
            lob_slope: 0.0,
            price_gap: 0.0,
            tick_direction_entropy: 0.0,
            reversal_rate: 0.0,
            aggressor_bias: 0.0,
            shannon_entropy: 0.0,
            liquidity_stress: 0.0,
        }
    }

    #[test]
    fn z_score_worked_example() {
        let mut norm = FeatureNormalizer::new(30_000);
        for p in [10.0, 11.0, 12.0, 13.0, 14.0] {
            norm.add(fs(p));
        }
        let normalized = norm.normalize(&fs(15.0));
        assert!((normalized.midprice - 2.1213203).abs() < 1e-6);
    }

    #[test]
    fn old_midprice_out_of_range_is_zero() {
        let mut norm = FeatureNormalizer::new(10);
        norm.add(fs(10.0));
        assert_eq!(norm.old_midprice(5), 0.0);
        assert_eq!(norm.old_midprice(0), 10.0);
    }

    #[test]
    fn window_evicts_beyond_bound() {
        let mut norm = FeatureNormalizer::new(2);
        norm.add(fs(1.0));
        norm.add(fs(2.0));
        norm.add(fs(3.0));
        assert_eq!(norm.len(), 2);
        assert_eq!(norm.old_midprice(1), 2.0);
    }

    #[test]
    fn non_positive_variance_falls_back_to_sigma_one() {
        let mut norm = FeatureNormalizer::new(10);
        norm.add(fs(5.0));
        norm.add(fs(5.0));
        let normalized = norm.normalize(&fs(6.0));
        assert_eq!(normalized.midprice, 1.0);
    }
}
