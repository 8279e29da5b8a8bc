//! Wire-level event types consumed by the `OrderEngine`.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of book mutation (or notification) a [`MarketEvent`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// A new resting order enters the book.
    Add,
    /// An existing order changes price and/or size, losing FIFO priority.
    Modify,
    /// An existing order is fully removed.
    Cancel,
    /// A trade print; does not itself mutate the book.
    Trade,
    /// A partial or full fill notification; no-op for the book.
    Fill,
    /// Clears book state for the instrument (see design notes: treated as a
    /// logged no-op, matching the reference implementation's behaviour).
    Clear,
    /// Alias observed on the wire for [`Action::Clear`].
    Replace,
}

/// Which side of the book an event or order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Resting buy orders / the buy side of a trade.
    Bid,
    /// Resting sell orders / the sell side of a trade.
    Ask,
    /// No side — used by event kinds that don't touch book side (e.g. `Clear`).
    None,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "Bid"),
            Side::Ask => write!(f, "Ask"),
            Side::None => write!(f, "None"),
        }
    }
}

impl Side {
    /// Sign convention used for trade direction: `+1` when `self == Bid`,
    /// `-1` for any other side (including `None`, which MBO trade prints
    /// frequently carry in place of a resolved aggressor side).
    pub fn trade_direction(self) -> i8 {
        if self == Side::Bid {
            1
        } else {
            -1
        }
    }
}

bitflags! {
    /// Venue-specific per-event flags, carried through unchanged.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EventFlags: u8 {
        /// Event originates from an implied/synthetic order.
        const IMPLIED = 0b0000_0001;
        /// Event is a snapshot/replay record rather than a live update.
        const SNAPSHOT = 0b0000_0010;
        /// Event crosses the opposite side of the book as submitted.
        const MAYBE_CROSSED = 0b0000_0100;
    }
}

/// A single market-by-order event, as produced by a `Source`.
///
/// Created once per record, consumed by [`crate::engine::OrderEngine`], and
/// never retained after processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    /// Nanoseconds since epoch; monotonic non-decreasing within one stream.
    pub timestamp_ns: u64,
    /// Instrument symbol this event applies to.
    pub instrument: String,
    /// What kind of mutation/notification this event represents.
    pub action: Action,
    /// Which side of the book the event concerns.
    pub side: Side,
    /// Price in quote units.
    pub price: f64,
    /// Order/trade size; non-negative.
    pub size: u64,
    /// Order identifier, unique within an instrument/session.
    pub order_id: u64,
    /// Venue-specific flags.
    pub flags: EventFlags,
    /// Numeric instrument identifier (used by the front-month filter).
    pub instrument_id: u32,
    /// Channel the event arrived on.
    pub channel_id: u8,
    /// Monotonic per-channel sequence number.
    pub sequence: u32,
}
