//! Dispatches a merged MBO event stream onto per-instrument order books.

use crate::config::Config;
use crate::error::PipelineError;
use crate::event::{Action, MarketEvent, Side};
use crate::feature::FeatureEngine;
use crate::orderbook::{OrderBook, OrderBookError};
use std::collections::HashMap;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
struct OrderInfo {
    instrument: String,
    side: Side,
    price: f64,
}

/// Owns every instrument's [`OrderBook`] plus a global `order_id →
/// (instrument, side, price)` lookup, and applies a merged event stream to
/// them while detecting out-of-order arrival and filtering stale futures
/// contracts.
pub struct OrderEngine {
    books: HashMap<String, OrderBook>,
    order_info: HashMap<u64, OrderInfo>,
    current_timestamp_ns: u64,
    config: Config,
    /// Instrument name treated as the futures leg for the front-month
    /// filter; `None` disables the filter.
    futures_instrument: Option<String>,
}

impl OrderEngine {
    /// Construct an engine with no registered books.
    pub fn new(config: Config) -> Self {
        Self {
            books: HashMap::new(),
            order_info: HashMap::new(),
            current_timestamp_ns: 0,
            config,
            futures_instrument: None,
        }
    }

    /// Register the instrument that should be subject to the front-month
    /// filter (see [`Config::front_month_id`]).
    pub fn set_futures_instrument(&mut self, instrument: impl Into<String>) {
        self.futures_instrument = Some(instrument.into());
    }

    /// Register an empty book for `instrument`.
    pub fn add_book(&mut self, instrument: impl Into<String>) {
        let instrument = instrument.into();
        self.books
            .insert(instrument.clone(), OrderBook::new(instrument, self.config.depth_levels));
    }

    /// Borrow the book for `instrument`, if registered.
    pub fn book(&self, instrument: &str) -> Option<&OrderBook> {
        self.books.get(instrument)
    }

    /// Mutably borrow the book for `instrument`, if registered.
    pub fn book_mut(&mut self, instrument: &str) -> Option<&mut OrderBook> {
        self.books.get_mut(instrument)
    }

    /// Apply `event` to the correct book and notify `feature_engine`.
    ///
    /// # Errors
    /// Returns [`PipelineError::OutOfOrderEvent`] if `event.timestamp_ns` is
    /// earlier than the engine's current event-time clock. This is the only
    /// fatal outcome; duplicate/unknown order ids are caught, logged, and
    /// the event is dropped.
    pub fn process_event(
        &mut self,
        event: &MarketEvent,
        feature_engine: &mut FeatureEngine,
    ) -> Result<(), PipelineError> {
        if event.timestamp_ns < self.current_timestamp_ns {
            error!(
                instrument = %event.instrument,
                event_ts = event.timestamp_ns,
                current_ts = self.current_timestamp_ns,
                "out-of-order event"
            );
            return Err(PipelineError::OutOfOrderEvent {
                instrument: event.instrument.clone(),
                event_ts: event.timestamp_ns,
                current_ts: self.current_timestamp_ns,
            });
        }

        if self.is_stale_futures_event(event) {
            warn!(
                instrument = %event.instrument,
                instrument_id = event.instrument_id,
                "dropping event for non-front-month futures contract"
            );
            return Ok(());
        }

        self.current_timestamp_ns = event.timestamp_ns;
        feature_engine.last_event_timestamp_ns = event.timestamp_ns;

        let Some(book) = self.books.get_mut(&event.instrument) else {
            error!(instrument = %event.instrument, "event for unregistered instrument");
            return Ok(());
        };

        match event.action {
            Action::Add => match book.apply_add(event.order_id, event.price, event.size, event.side) {
                Ok(()) => {
                    self.order_info.insert(
                        event.order_id,
                        OrderInfo {
                            instrument: event.instrument.clone(),
                            side: event.side,
                            price: event.price,
                        },
                    );
                    feature_engine.on_event('A');
                }
                Err(OrderBookError::DuplicateOrderId(id)) => {
                    warn!(order_id = id, "duplicate order id on Add, dropping event");
                }
                Err(other) => warn!(?other, "book error on Add, dropping event"),
            },
            Action::Modify => {
                let Some(info) = self.order_info.get(&event.order_id).cloned() else {
                    warn!(order_id = event.order_id, "Modify for unknown order id, skipping");
                    return Ok(());
                };
                let book = self.books.get_mut(&info.instrument).expect("tracked instrument has a book");
                match book.apply_modify(event.order_id, event.price, event.size) {
                    Ok(()) => {
                        self.order_info.insert(
                            event.order_id,
                            OrderInfo {
                                instrument: info.instrument,
                                side: info.side,
                                price: event.price,
                            },
                        );
                        feature_engine.on_event('M');
                    }
                    Err(OrderBookError::UnknownOrderId(id)) => {
                        warn!(order_id = id, "unknown order id on Modify, dropping event");
                    }
                    Err(other) => warn!(?other, "book error on Modify, dropping event"),
                }
            }
            Action::Cancel => {
                let Some(info) = self.order_info.remove(&event.order_id) else {
                    warn!(order_id = event.order_id, "Cancel for unknown order id, skipping");
                    return Ok(());
                };
                let book = self.books.get_mut(&info.instrument).expect("tracked instrument has a book");
                match book.apply_cancel(event.order_id, event.size) {
                    Ok(()) => feature_engine.on_event('C'),
                    Err(OrderBookError::UnknownOrderId(id)) => {
                        warn!(order_id = id, "unknown order id on Cancel, dropping event");
                    }
                    Err(other) => warn!(?other, "book error on Cancel, dropping event"),
                }
            }
            Action::Trade => {
                let direction = event.side.trade_direction();
                feature_engine.on_trade(event.size as f64, direction);
            }
            Action::Fill => {}
            Action::Clear | Action::Replace => {
                info!(instrument = %event.instrument, "Clear/Replace event received, treated as no-op");
            }
        }

        Ok(())
    }

    fn is_stale_futures_event(&self, event: &MarketEvent) -> bool {
        match &self.futures_instrument {
            Some(futures) => {
                event.instrument == *futures && event.instrument_id != self.config.front_month_id
            }
            None => false,
        }
    }
}
