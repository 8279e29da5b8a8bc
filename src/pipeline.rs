//! Drives two event streams through a deterministic merge-and-schedule loop.

use crate::config::Config;
use crate::engine::OrderEngine;
use crate::error::{PipelineError, SinkError, SourceError};
use crate::event::MarketEvent;
use crate::feature::{FeatureEngine, FeatureNormalizer, FeatureProcessor, FeatureSet};
use crate::orderbook::OrderBook;
use tracing::{debug, info};

/// A finite source of timestamp-ordered [`MarketEvent`]s. Decode failures are
/// surfaced once and treated as fatal by the `Pipeline` — a `Source` that
/// wants to skip bad records should do so internally and return the next
/// good one instead.
pub trait Source {
    /// Return the next event, `Ok(None)` at end of stream, or an error.
    fn next(&mut self) -> Result<Option<MarketEvent>, SourceError>;
}

/// Receives emitted feature tuples, one call per (instrument, snapshot
/// boundary).
pub trait Sink {
    /// Deliver a raw/normalised feature vector pair for `instrument` at
    /// `timestamp_ns`.
    fn ingest_feature_set(
        &mut self,
        instrument: &str,
        timestamp_ns: u64,
        raw: &FeatureSet,
        normalised: &FeatureSet,
    ) -> Result<(), SinkError>;
}

const FIRST_SNAPSHOT_OFFSET_NS: u64 = 100_000_000_000;

/// Drives the base and futures `Source`s via a merge loop, dispatches events
/// to a shared [`OrderEngine`], samples the mid/spread sub-clock, and emits
/// (raw, normalised) feature pairs to two `Sink`s at fixed snapshot
/// boundaries.
pub struct Pipeline {
    config: Config,
    session_start_ns: u64,
    session_end_ns: u64,

    base_instrument: String,
    futures_instrument: String,

    base_source: Box<dyn Source>,
    futures_source: Box<dyn Source>,
    base_sink: Box<dyn Sink>,
    futures_sink: Box<dyn Sink>,

    engine: OrderEngine,
    base_feature_engine: FeatureEngine,
    futures_feature_engine: FeatureEngine,
    base_processor: FeatureProcessor,
    futures_processor: FeatureProcessor,
    base_normalizer: FeatureNormalizer,
    futures_normalizer: FeatureNormalizer,
}

impl Pipeline {
    /// Construct a pipeline for the `base`/`futures` instrument pair, bounded
    /// by the already-resolved `[session_start_ns, session_end_ns)` UTC
    /// session window.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        session_start_ns: u64,
        session_end_ns: u64,
        base_instrument: impl Into<String>,
        futures_instrument: impl Into<String>,
        base_source: Box<dyn Source>,
        futures_source: Box<dyn Source>,
        base_sink: Box<dyn Sink>,
        futures_sink: Box<dyn Sink>,
    ) -> Self {
        let base_instrument = base_instrument.into();
        let futures_instrument = futures_instrument.into();

        let mut engine = OrderEngine::new(config);
        engine.add_book(base_instrument.clone());
        engine.add_book(futures_instrument.clone());
        engine.set_futures_instrument(futures_instrument.clone());

        Self {
            base_feature_engine: FeatureEngine::new(
                base_instrument.clone(),
                config.rolling_window,
                config.mid_history,
            ),
            futures_feature_engine: FeatureEngine::new(
                futures_instrument.clone(),
                config.rolling_window,
                config.mid_history,
            ),
            base_processor: FeatureProcessor::new(config.rolling_window, config.snapshot_interval_ns),
            futures_processor: FeatureProcessor::new(config.rolling_window, config.snapshot_interval_ns),
            base_normalizer: FeatureNormalizer::new(config.window_size),
            futures_normalizer: FeatureNormalizer::new(config.window_size),
            config,
            session_start_ns,
            session_end_ns,
            base_instrument,
            futures_instrument,
            base_source,
            futures_source,
            base_sink,
            futures_sink,
            engine,
        }
    }

    /// Run the merge loop to completion. Returns the number of snapshot
    /// boundaries emitted.
    pub fn run(&mut self) -> Result<usize, PipelineError> {
        let Some(mut base_evt) = self.pull(Leg::Base)? else {
            info!("base source empty at start, nothing to do");
            return Ok(0);
        };
        let Some(mut futures_evt) = self.pull(Leg::Futures)? else {
            info!("futures source empty at start, nothing to do");
            return Ok(0);
        };

        let mut next_snapshot = self.session_start_ns + FIRST_SNAPSHOT_OFFSET_NS;
        let mut last_mid_sample = base_evt.timestamp_ns.min(futures_evt.timestamp_ns);
        let mid_interval = self.config.mid_sample_interval_ns;
        let mut emitted = 0usize;

        info!(
            session_start_ns = self.session_start_ns,
            session_end_ns = self.session_end_ns,
            "pipeline started"
        );

        loop {
            let t = base_evt.timestamp_ns.min(futures_evt.timestamp_ns);
            if t > last_mid_sample {
                let intervals = (t - last_mid_sample) / mid_interval;
                for _ in 0..intervals {
                    self.sample_mid_spread();
                }
                last_mid_sample += intervals * mid_interval;
            }

            if base_evt.timestamp_ns <= futures_evt.timestamp_ns {
                self.engine.process_event(&base_evt, &mut self.base_feature_engine)?;
                match self.pull(Leg::Base)? {
                    Some(e) => base_evt = e,
                    None => break,
                }
            } else {
                self.engine.process_event(&futures_evt, &mut self.futures_feature_engine)?;
                match self.pull(Leg::Futures)? {
                    Some(e) => futures_evt = e,
                    None => break,
                }
            }

            if next_snapshot > self.session_end_ns {
                debug!(next_snapshot, "session end reached, terminating");
                break;
            }

            if base_evt.timestamp_ns >= next_snapshot
                && futures_evt.timestamp_ns >= next_snapshot
                && next_snapshot > self.session_start_ns
            {
                self.emit_pair(next_snapshot)?;
                emitted += 1;
                next_snapshot += self.config.snapshot_interval_ns;
            }
        }

        info!(emitted, "pipeline finished");
        Ok(emitted)
    }

    fn pull(&mut self, leg: Leg) -> Result<Option<MarketEvent>, PipelineError> {
        let source = match leg {
            Leg::Base => &mut self.base_source,
            Leg::Futures => &mut self.futures_source,
        };
        source.next().map_err(PipelineError::Source)
    }

    fn sample_mid_spread(&mut self) {
        if let Some(book) = self.engine.book(&self.base_instrument) {
            self.base_feature_engine.sample_mid_spread(book.mid_price(), book.spread());
        }
        if let Some(book) = self.engine.book(&self.futures_instrument) {
            self.futures_feature_engine
                .sample_mid_spread(book.mid_price(), book.spread());
        }
    }

    fn emit_pair(&mut self, timestamp_ns: u64) -> Result<(), PipelineError> {
        emit_one(
            self.engine
                .book_mut(&self.base_instrument)
                .expect("base book registered in Pipeline::new"),
            &mut self.base_feature_engine,
            &mut self.base_processor,
            &mut self.base_normalizer,
            self.base_sink.as_mut(),
            timestamp_ns,
        )?;
        emit_one(
            self.engine
                .book_mut(&self.futures_instrument)
                .expect("futures book registered in Pipeline::new"),
            &mut self.futures_feature_engine,
            &mut self.futures_processor,
            &mut self.futures_normalizer,
            self.futures_sink.as_mut(),
            timestamp_ns,
        )
    }
}

#[derive(Clone, Copy)]
enum Leg {
    Base,
    Futures,
}

fn emit_one(
    book: &mut OrderBook,
    feature_engine: &mut FeatureEngine,
    processor: &mut FeatureProcessor,
    normalizer: &mut FeatureNormalizer,
    sink: &mut dyn Sink,
    timestamp_ns: u64,
) -> Result<(), PipelineError> {
    let old_midprice = normalizer.old_midprice(processor.log_return_lookback());
    let raw = {
        let snap = feature_engine.snapshot(book, timestamp_ns);
        processor.compute_raw(&snap, old_midprice)
    };
    let normalised = normalizer.normalize(&raw);
    sink.ingest_feature_set(&raw.instrument, timestamp_ns, &raw, &normalised)
        .map_err(PipelineError::Sink)?;
    normalizer.add(raw);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Action, EventFlags, Side};
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
        calls: Rc<RefCell<Vec<(String, u64)>>>,
    }

    impl Sink for RecordingSink {
        fn ingest_feature_set(
            &mut self,
            instrument: &str,
            timestamp_ns: u64,
            _raw: &FeatureSet,
            _normalised: &FeatureSet,
        ) -> Result<(), SinkError> {
            self.calls.borrow_mut().push((instrument.to_string(), timestamp_ns));
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
    fn no_snapshot_emitted_before_first_boundary() {
        let config = Config {
            snapshot_interval_ns: 500_000_000,
            ..Config::default()
        };
        let base_events = VecDeque::from(vec![
            mk(100, "ES", Action::Add, Side::Bid, 1, 100.0, 5),
            mk(200, "ES", Action::Add, Side::Ask, 2, 101.0, 5),
            mk(10_000_000_001, "ES", Action::Fill, Side::None, 0, 0.0, 0),
        ]);
        let futures_events = VecDeque::from(vec![
            mk(150, "ESF", Action::Add, Side::Bid, 3, 100.0, 5),
            mk(300, "ESF", Action::Add, Side::Ask, 4, 101.0, 5),
            mk(10_000_000_002, "ESF", Action::Fill, Side::None, 0, 0.0, 0),
        ]);

        let base_sink = RecordingSink::default();
        let futures_sink = RecordingSink::default();
        let base_calls = base_sink.calls.clone();

        let mut pipeline = Pipeline::new(
            config,
            0,
            1_000_000_000, // session ends at 1s, before the first boundary at 100s
            "ES",
            "ESF",
            Box::new(VecSource { events: base_events }),
            Box::new(VecSource { events: futures_events }),
            Box::new(base_sink),
            Box::new(futures_sink),
        );

        let emitted = pipeline.run().unwrap();
        assert_eq!(emitted, 0);
        assert!(base_calls.borrow().is_empty());
    }
}
