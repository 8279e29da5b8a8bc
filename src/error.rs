//! Crate-level error types, outside the order book itself.

use std::fmt;

/// Errors raised by a `Source` while decoding the on-disk/wire event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SourceError {
    /// A single record failed to decode; the pipeline skips it and continues.
    Decode {
        /// Human-readable cause.
        message: String,
    },
    /// The underlying transport (file, socket) failed.
    Io {
        /// Human-readable cause.
        message: String,
    },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Decode { message } => write!(f, "decode error: {message}"),
            SourceError::Io { message } => write!(f, "source io error: {message}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Errors raised by a `Sink` while persisting an emitted feature tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SinkError {
    /// The underlying transport (file, socket) failed.
    Io {
        /// Human-readable cause.
        message: String,
    },
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io { message } => write!(f, "sink io error: {message}"),
        }
    }
}

impl std::error::Error for SinkError {}

/// Fatal errors that terminate a `Pipeline` run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PipelineError {
    /// An event arrived with a timestamp earlier than the instrument's
    /// current event-time clock. Fatal; the engine does not attempt to
    /// reorder or buffer.
    OutOfOrderEvent {
        /// Instrument the event was addressed to.
        instrument: String,
        /// The offending event's timestamp.
        event_ts: u64,
        /// The engine's current event-time clock at the time of arrival.
        current_ts: u64,
    },
    /// A `Source` failed in a way the pipeline could not skip past.
    Source(SourceError),
    /// A `Sink` failed while persisting an emitted feature tuple.
    Sink(SinkError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::OutOfOrderEvent {
                instrument,
                event_ts,
                current_ts,
            } => write!(
                f,
                "out-of-order event for {instrument}: event ts {event_ts} < current ts {current_ts}"
            ),
            PipelineError::Source(e) => write!(f, "{e}"),
            PipelineError::Sink(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PipelineError {}
