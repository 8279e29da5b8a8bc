//! Event-driven market-by-order book reconstruction and microstructure
//! feature pipeline.
//!
//! A [`pipeline::Pipeline`] merges a base instrument's and a linked futures
//! contract's event streams in timestamp order, applies each event to an
//! [`orderbook::OrderBook`] via [`engine::OrderEngine`], feeds rolling
//! aggregates to a [`feature::FeatureEngine`], and at fixed snapshot
//! boundaries turns the current book/rolling state into a closed-form
//! feature vector ([`feature::FeatureProcessor`]) that is z-scored against a
//! trailing window ([`feature::FeatureNormalizer`]) before being handed to a
//! [`pipeline::Sink`].
//!
//! Everything here is single-threaded and synchronous: event time, not wall
//! clock time, drives every computation, so a run is fully deterministic
//! given its two input streams.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod feature;
pub mod orderbook;
pub mod pipeline;
pub mod rolling;

pub use config::Config;
pub use engine::OrderEngine;
pub use error::{PipelineError, SinkError, SourceError};
pub use event::{Action, EventFlags, MarketEvent, Side};
pub use feature::{FeatureEngine, FeatureInputSnapshot, FeatureNormalizer, FeatureProcessor, FeatureSet};
pub use orderbook::{DepthChange, OrderBook, OrderBookError, PriceLevel, TopNSnapshot};
pub use pipeline::{Pipeline, Sink, Source};
pub use rolling::RollingState;
