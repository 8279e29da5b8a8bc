//! End-to-end scenario: sampling the mid/spread sub-clock at a fixed 50ms
//! period between two events 120ms apart appends exactly `floor(120/50) = 2`
//! entries, with two zero tick directions since mid/spread stay constant.

use microregime_rs::FeatureEngine;

const MID_SAMPLE_INTERVAL_NS: u64 = 50_000_000;

#[test]
fn two_events_120ms_apart_yield_two_samples() {
    let mut engine = FeatureEngine::new("ES", 1800, 1800);
    let mid = 100.0;
    let spread = 0.5;

    // A sample already taken before the 120ms gap under test, so each of the
    // two new samples has a predecessor to compare against.
    engine.sample_mid_spread(mid, spread);
    let midprices_before = engine.rolling.midprices.len();
    let spreads_before = engine.rolling.spreads.len();

    let t0 = 1_000_000_000u64;
    let t1 = t0 + 120_000_000;
    let intervals = (t1 - t0) / MID_SAMPLE_INTERVAL_NS;
    assert_eq!(intervals, 2);

    for _ in 0..intervals {
        engine.sample_mid_spread(mid, spread);
    }

    assert_eq!(engine.rolling.midprices.len() - midprices_before, 2);
    assert_eq!(engine.rolling.spreads.len() - spreads_before, 2);
    assert!(engine.rolling.midprices.iter().all(|&m| m == mid));
    assert!(engine.rolling.spreads.iter().all(|&s| s == spread));

    assert_eq!(engine.rolling.tick_directions.len(), 2);
    assert!(engine.rolling.tick_directions.iter().all(|&d| d == 0));
}
