//! End-to-end scenario: the merge loop never emits before the first
//! snapshot boundary, and once it does, boundaries land exactly on
//! `session_start + 100s + k*snapshot_interval_ns`.

use microregime_rs::{Action, Config, EventFlags, FeatureSet, MarketEvent, Pipeline, Side, Sink, SinkError, Source, SourceError};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

struct VecSource {
    events: VecDeque<MarketEvent>,
}

impl Source for VecSource {
    fn next(&mut self) -> Result<Option<MarketEvent>, SourceError> {
        Ok(self.events.pop_front())
    }
}

#[derive(Default, Clone)]
struct RecordingSink {
    timestamps: Rc<RefCell<Vec<u64>>>,
}

impl Sink for RecordingSink {
    fn ingest_feature_set(
        &mut self,
        _instrument: &str,
        timestamp_ns: u64,
        _raw: &FeatureSet,
        _normalised: &FeatureSet,
    ) -> Result<(), SinkError> {
        self.timestamps.borrow_mut().push(timestamp_ns);
        Ok(())
    }
}

fn mk(ts: u64, instrument: &str, action: Action, side: Side, id: u64, price: f64, size: u64) -> MarketEvent {
    MarketEvent {
        timestamp_ns: ts,
        instrument: instrument.to_string(),
        action,
        side,
        price,
        size,
        order_id: id,
        flags: EventFlags::empty(),
        instrument_id: 4916,
        channel_id: 0,
        sequence: 0,
    }
}

#[test]
fn no_snapshot_before_first_boundary_when_streams_end_early() {
    let config = Config::default();
    let base = VecDeque::from(vec![
        mk(100, "ES", Action::Add, Side::Bid, 1, 100.0, 5),
        mk(200, "ES", Action::Add, Side::Ask, 2, 101.0, 5),
        mk(10_000_000_001, "ES", Action::Fill, Side::None, 0, 0.0, 0),
    ]);
    let fut = VecDeque::from(vec![
        mk(150, "ESF", Action::Add, Side::Bid, 3, 100.0, 5),
        mk(300, "ESF", Action::Add, Side::Ask, 4, 101.0, 5),
        mk(10_000_000_002, "ESF", Action::Fill, Side::None, 0, 0.0, 0),
    ]);

    let base_sink = RecordingSink::default();
    let fut_sink = RecordingSink::default();
    let base_seen = base_sink.timestamps.clone();
    let fut_seen = fut_sink.timestamps.clone();

    let mut pipeline = Pipeline::new(
        config,
        0,
        300_000_000_000,
        "ES",
        "ESF",
        Box::new(VecSource { events: base }),
        Box::new(VecSource { events: fut }),
        Box::new(base_sink),
        Box::new(fut_sink),
    );

    let emitted = pipeline.run().unwrap();
    assert_eq!(emitted, 0);
    assert!(base_seen.borrow().is_empty());
    assert!(fut_seen.borrow().is_empty());
}

#[test]
fn emitted_boundaries_land_on_session_start_plus_100s_plus_k_delta() {
    let config = Config {
        mid_sample_interval_ns: 50_000_000_000,
        snapshot_interval_ns: 500_000_000,
        ..Config::default()
    };
    let base = VecDeque::from(vec![
        mk(10, "ES", Action::Add, Side::Bid, 1, 100.0, 5),
        mk(20, "ES", Action::Add, Side::Ask, 2, 101.0, 5),
        mk(100_000_000_000, "ES", Action::Add, Side::Bid, 3, 99.0, 1),
        mk(200_000_000_000, "ES", Action::Fill, Side::None, 0, 0.0, 0),
    ]);
    let fut = VecDeque::from(vec![
        mk(15, "ESF", Action::Add, Side::Bid, 4, 50.0, 5),
        mk(25, "ESF", Action::Add, Side::Ask, 5, 51.0, 5),
        mk(100_000_000_050, "ESF", Action::Add, Side::Ask, 6, 52.0, 1),
        mk(200_000_000_001, "ESF", Action::Fill, Side::None, 0, 0.0, 0),
    ]);

    let base_sink = RecordingSink::default();
    let fut_sink = RecordingSink::default();
    let base_seen = base_sink.timestamps.clone();
    let fut_seen = fut_sink.timestamps.clone();

    let mut pipeline = Pipeline::new(
        config,
        0,
        300_000_000_000,
        "ES",
        "ESF",
        Box::new(VecSource { events: base }),
        Box::new(VecSource { events: fut }),
        Box::new(base_sink),
        Box::new(fut_sink),
    );

    let emitted = pipeline.run().unwrap();
    assert_eq!(emitted, 2);

    let expected: Vec<u64> = vec![100_000_000_000, 100_500_000_000];
    assert_eq!(*base_seen.borrow(), expected);
    assert_eq!(*fut_seen.borrow(), expected);
}
