//! Closed-form microstructure feature formulas.
//!
//! Transforms a [`FeatureInputSnapshot`] into a [`FeatureSet`]. A handful of
//! fields (`ofi`, `liquidity_stress`, `order_arrival_rate`) are EMA-smoothed
//! or delta'd against the *previous* emission, so the processor carries a
//! small amount of state across calls — everything else is a pure function
//! of the snapshot it's given.

use crate::feature::set::FeatureSet;
use crate::feature::snapshot::FeatureInputSnapshot;

const DEPTH_DECAY: f64 = 0.5;
const OFI_SMOOTH_ALPHA: f64 = 0.2;
const MIN_TOTAL_VOL: f64 = 1e-6;
const RETURN_LOOKBACK_NS: u64 = 10_000_000_000;
const LIQUIDITY_LEVELS: usize = 5;
const MIN_QUOTE_SIZE: f64 = 5.0;
const LIQUIDITY_DISTANCE_DECAY: f64 = 10.0;
const STRESS_SMOOTH_ALPHA: f64 = 0.1;

/// Stateful transformer from raw snapshots to closed-form feature vectors.
#[derive(Debug, Clone)]
pub struct FeatureProcessor {
    rolling_window: usize,
    snapshot_interval_ns: u64,
    prev_ofi: f64,
    prev_liquidity: f64,
    prev_liquidity_stress: f64,
    prev_snapshot_ts_ns: Option<u64>,
}

impl FeatureProcessor {
    /// Construct a processor for a book configured with `rolling_window` and
    /// `snapshot_interval_ns` (used for `spread_volatility`'s fixed
    /// denominator and `log_return`'s lookback index, respectively).
    pub fn new(rolling_window: usize, snapshot_interval_ns: u64) -> Self {
        Self {
            rolling_window,
            snapshot_interval_ns,
            prev_ofi: 0.0,
            prev_liquidity: 0.0,
            prev_liquidity_stress: 0.0,
            prev_snapshot_ts_ns: None,
        }
    }

    /// The lookback index (`k`) `log_return` uses to look up a historical
    /// midprice in the normaliser's window: `⌊10s / Δ⌋`.
    pub fn log_return_lookback(&self) -> usize {
        (RETURN_LOOKBACK_NS / self.snapshot_interval_ns) as usize
    }

    /// Compute the raw (unnormalised) [`FeatureSet`] for `snap`.
    ///
    /// `old_midprice` is the midprice `log_return_lookback()` snapshots in
    /// the past, as reported by the per-instrument `FeatureNormalizer` (0.0
    /// if unavailable).
    pub fn compute_raw(&mut self, snap: &FeatureInputSnapshot<'_>, old_midprice: f64) -> FeatureSet {
        let midprice = (snap.best_bid + snap.best_ask) / 2.0;
        let log_spread = snap.best_ask.ln() - snap.best_bid.ln();
        let log_return = if midprice > 0.0 && old_midprice > 0.0 {
            midprice.ln() - old_midprice.ln()
        } else {
            0.0
        };

        let returns = log_return_series(snap.rolling.midprices.iter().copied());
        let realized_variance = mean_of(returns.iter().map(|r| r * r));
        let ewm_volatility = ewm_volatility(&returns, self.rolling_window);
        let directional_volatility = directional_volatility(&returns);
        let spread_volatility = population_stddev_fixed_denom(
            snap.rolling.spreads.iter().copied(),
            self.rolling_window as f64,
        );

        let ofi = self.ofi(snap);
        let signed_volume_pressure = ratio_or_zero(
            snap.buy_volume - snap.sell_volume,
            snap.buy_volume + snap.sell_volume,
        );
        let order_arrival_rate = self.order_arrival_rate(snap);

        let bid_depth: f64 = snap.top_n.bids.iter().map(|l| l.size as f64).sum();
        let ask_depth: f64 = snap.top_n.asks.iter().map(|l| l.size as f64).sum();
        let market_depth = bid_depth + ask_depth;
        let depth_imbalance = ratio_or_zero(bid_depth - ask_depth, bid_depth + ask_depth);
        let lob_slope = side_slope(&snap.top_n.bids, midprice) + side_slope(&snap.top_n.asks, midprice);
        let price_gap = side_price_gap(&snap.top_n.bids) + side_price_gap(&snap.top_n.asks);

        let tick_direction_entropy = tick_direction_entropy(snap.rolling.tick_directions.iter().copied());
        let reversal_rate = reversal_rate(snap.rolling.trade_directions.iter().copied());
        let aggressor_bias = mean_of(snap.rolling.trade_directions.iter().map(|&d| d as f64));
        let shannon_entropy = binary_entropy(snap.rolling.trade_directions.iter().copied());
        let liquidity_stress = self.liquidity_stress(snap);

        FeatureSet {
            timestamp_ns: snap.timestamp_ns,
            instrument: snap.instrument.clone(),
            midprice,
            log_spread,
            log_return,
            ewm_volatility,
            realized_variance,
            directional_volatility,
            spread_volatility,
            ofi,
            signed_volume_pressure,
            order_arrival_rate,
            depth_imbalance,
            market_depth,
            lob_slope,
            price_gap,
            tick_direction_entropy,
            reversal_rate,
            aggressor_bias,
            shannon_entropy,
            liquidity_stress,
        }
    }

    fn ofi(&mut self, snap: &FeatureInputSnapshot<'_>) -> f64 {
        let mut raw_ofi = 0.0;
        let n = snap.depth_change.bid_dir.len().min(snap.top_n.bids.len());
        for i in 0..n {
            let decay = (-DEPTH_DECAY * i as f64).exp();
            let bid_term = snap.depth_change.bid_dir[i] as f64 * snap.top_n.bids[i].size as f64;
            let ask_term = snap.depth_change.ask_dir[i] as f64 * snap.top_n.asks[i].size as f64;
            raw_ofi += decay * (bid_term - ask_term);
        }
        let total_volume = snap.buy_volume + snap.sell_volume;
        let normalized_ofi = if total_volume > MIN_TOTAL_VOL {
            raw_ofi / total_volume
        } else {
            0.0
        };
        let ofi = OFI_SMOOTH_ALPHA * normalized_ofi + (1.0 - OFI_SMOOTH_ALPHA) * self.prev_ofi;
        self.prev_ofi = ofi;
        ofi
    }

    fn order_arrival_rate(&mut self, snap: &FeatureInputSnapshot<'_>) -> f64 {
        let rate = match self.prev_snapshot_ts_ns {
            Some(prev_ts) if snap.timestamp_ns > prev_ts => {
                let dt_seconds = (snap.timestamp_ns - prev_ts) as f64 / 1e9;
                snap.adds_since_last_snapshot as f64 / dt_seconds
            }
            _ => 0.0,
        };
        self.prev_snapshot_ts_ns = Some(snap.timestamp_ns);
        rate
    }

    fn liquidity_stress(&mut self, snap: &FeatureInputSnapshot<'_>) -> f64 {
        let mut total_weighted_liquidity = 0.0;
        for level in snap.top_n.bids.iter().take(LIQUIDITY_LEVELS) {
            let size = level.size as f64;
            if size >= MIN_QUOTE_SIZE {
                let distance = snap.best_bid - level.price;
                total_weighted_liquidity += size * (-distance * LIQUIDITY_DISTANCE_DECAY).exp();
            }
        }
        for level in snap.top_n.asks.iter().take(LIQUIDITY_LEVELS) {
            let size = level.size as f64;
            if size >= MIN_QUOTE_SIZE {
                let distance = level.price - snap.best_ask;
                total_weighted_liquidity += size * (-distance * LIQUIDITY_DISTANCE_DECAY).exp();
            }
        }

        let raw_stress = if self.prev_liquidity > 0.0 {
            -(total_weighted_liquidity - self.prev_liquidity) / self.prev_liquidity
        } else {
            0.0
        };
        let stress = STRESS_SMOOTH_ALPHA * raw_stress + (1.0 - STRESS_SMOOTH_ALPHA) * self.prev_liquidity_stress;
        self.prev_liquidity = total_weighted_liquidity;
        self.prev_liquidity_stress = stress;
        stress
    }
}

fn log_return_series(midprices: impl Iterator<Item = f64>) -> Vec<f64> {
    let prices: Vec<f64> = midprices.collect();
    let mut out = Vec::with_capacity(prices.len());
    for window in prices.windows(2) {
        let (prev, cur) = (window[0], window[1]);
        if prev > 0.0 && cur > 0.0 {
            out.push(cur.ln() - prev.ln());
        }
    }
    out
}

fn mean_of(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn ewm_volatility(returns: &[f64], rolling_window: usize) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let alpha = 2.0 / (rolling_window as f64 + 1.0);
    let mut ewm_var = returns[0] * returns[0];
    for r in &returns[1..] {
        ewm_var = (1.0 - alpha) * ewm_var + alpha * (r * r);
    }
    ewm_var.max(0.0).sqrt()
}

fn directional_volatility(returns: &[f64]) -> f64 {
    let u = mean_of(returns.iter().filter(|&&r| r > 0.0).map(|&r| r * r));
    let d = mean_of(returns.iter().filter(|&&r| r < 0.0).map(|&r| r * r));
    let sign = if u > d {
        1.0
    } else if u < d {
        -1.0
    } else {
        0.0
    };
    (u - d).abs().sqrt() * sign
}

// `denom` (ROLLING_WINDOW) only replaces the variance's divisor, not the
// mean's; the mean is still taken over `values.len()`. The two diverge
// while the spread deque hasn't filled yet, early in a run.
fn population_stddev_fixed_denom(values: impl Iterator<Item = f64>, denom: f64) -> f64 {
    let values: Vec<f64> = values.collect();
    if values.is_empty() || denom <= 0.0 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let sum_sq_dev: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq_dev / denom).max(0.0).sqrt()
}

fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn side_slope(levels: &[crate::orderbook::PriceLevel], midprice: f64) -> f64 {
    if midprice <= 0.0 {
        return 0.0;
    }
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for level in levels.iter().filter(|l| l.price > 0.0) {
        let w = level.size as f64;
        weighted_sum += w * (level.price.ln() - midprice.ln()).abs();
        weight_total += w;
    }
    ratio_or_zero(weighted_sum, weight_total)
}

fn side_price_gap(levels: &[crate::orderbook::PriceLevel]) -> f64 {
    if levels.len() < 2 || levels[0].price <= 0.0 || levels[1].price <= 0.0 {
        return 0.0;
    }
    let (p0, s0) = (levels[0].price, levels[0].size as f64);
    let (p1, s1) = (levels[1].price, levels[1].size as f64);
    ratio_or_zero(p0 * s0 - p1 * s1, s0 + s1)
}

fn tick_direction_entropy(ticks: impl Iterator<Item = i8>) -> f64 {
    let (mut up, mut flat, mut down, mut total) = (0u64, 0u64, 0u64, 0u64);
    for t in ticks {
        match t {
            1 => up += 1,
            -1 => down += 1,
            _ => flat += 1,
        }
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    [up, flat, down]
        .into_iter()
        .filter(|&c| c > 0)
        .map(|c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum()
}

fn reversal_rate(trade_directions: impl Iterator<Item = i8>) -> f64 {
    let dirs: Vec<i8> = trade_directions.collect();
    if dirs.is_empty() {
        return 0.0;
    }
    let reversals = dirs
        .windows(2)
        .filter(|pair| pair[0] != 0 && pair[1] != 0 && (pair[0] as i32 * pair[1] as i32) < 0)
        .count();
    reversals as f64 / dirs.len() as f64
}

fn binary_entropy(trade_directions: impl Iterator<Item = i8>) -> f64 {
    let (mut pos, mut neg) = (0u64, 0u64);
    for d in trade_directions {
        match d.cmp(&0) {
            std::cmp::Ordering::Greater => pos += 1,
            std::cmp::Ordering::Less => neg += 1,
            std::cmp::Ordering::Equal => {}
        }
    }
    let total = pos + neg;
    if total == 0 {
        return 0.0;
    }
    let p = pos as f64 / total as f64;
    let term = |x: f64| if x <= 0.0 { 0.0 } else { -x * x.log2() };
    term(p) + term(1.0 - p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Side;
    use crate::feature::engine::FeatureEngine;
    use crate::orderbook::OrderBook;

    #[test]
    fn single_add_then_cross_gives_expected_log_spread() {
        let mut book = OrderBook::new("TEST", 10);
        let mut engine = FeatureEngine::new("TEST", 100, 100);
        book.apply_add(1, 100.0, 5, Side::Bid).unwrap();
        book.apply_add(2, 101.0, 3, Side::Ask).unwrap();
        let snap = engine.snapshot(&mut book, 1_000);

        let mut processor = FeatureProcessor::new(1800, 500_000_000);
        let fs = processor.compute_raw(&snap, 0.0);
        assert_eq!(fs.midprice, 100.5);
        assert!((fs.log_spread - (101f64.ln() - 100f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn reversal_rate_divides_by_full_deque_length() {
        let rate = reversal_rate([1, -1, 1].into_iter());
        // two adjacent reversals out of three entries.
        assert!((rate - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn tick_entropy_is_zero_for_constant_series() {
        let entropy = tick_direction_entropy([0, 0, 0].into_iter());
        assert_eq!(entropy, 0.0);
    }

    #[test]
    fn order_arrival_rate_is_zero_on_first_call() {
        let mut book = OrderBook::new("TEST", 10);
        let mut engine = FeatureEngine::new("TEST", 100, 100);
        book.apply_add(1, 100.0, 5, Side::Bid).unwrap();
        let snap = engine.snapshot(&mut book, 1_000);
        let mut processor = FeatureProcessor::new(1800, 500_000_000);
        let fs = processor.compute_raw(&snap, 0.0);
        assert_eq!(fs.order_arrival_rate, 0.0);
    }

    #[test]
    fn ofi_is_zero_when_book_populated_but_no_recent_trades() {
        let mut book = OrderBook::new("TEST", 10);
        let mut engine = FeatureEngine::new("TEST", 100, 100);
        book.apply_add(1, 100.0, 5, Side::Bid).unwrap();
        book.apply_add(2, 101.0, 3, Side::Ask).unwrap();
        let snap = engine.snapshot(&mut book, 1_000);

        let mut processor = FeatureProcessor::new(1800, 500_000_000);
        let fs = processor.compute_raw(&snap, 0.0);
        // buy_volume/sell_volume are both zero (no trades), so the OFI
        // denominator floor kicks in regardless of book depth.
        assert_eq!(fs.ofi, 0.0);
    }

    #[test]
    fn liquidity_stress_weight_uses_price_distance_not_level_index() {
        let mut book = OrderBook::new("TEST", 10);
        let mut engine = FeatureEngine::new("TEST", 100, 100);
        book.apply_add(1, 100.0, 10, Side::Bid).unwrap();
        book.apply_add(2, 99.75, 10, Side::Bid).unwrap();
        book.apply_add(3, 100.25, 10, Side::Ask).unwrap();
        let snap = engine.snapshot(&mut book, 1_000);

        let mut processor = FeatureProcessor::new(1800, 500_000_000);
        // raw_stress is 0 on the first call (prev_liquidity starts at 0).
        let fs = processor.compute_raw(&snap, 0.0);
        assert_eq!(fs.liquidity_stress, 0.0);

        // Shrinking the second bid level (distance 0.25 from best, weight
        // exp(-2.5) when weighted by price distance) should register as
        // stress; weighting by level index instead would make this level's
        // contribution negligible (exp(-10)) and the drop barely visible.
        book.apply_modify(2, 99.75, 1).unwrap();
        let snap2 = engine.snapshot(&mut book, 2_000);
        let fs2 = processor.compute_raw(&snap2, 0.0);
        assert!(fs2.liquidity_stress > 0.0, "shrinking a near-touch level should register as stress");
    }
}
