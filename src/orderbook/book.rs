//! Single-instrument limit order book.
//!
//! Bid and ask price levels are kept in a [`BTreeMap`] keyed by price; each
//! level owns a [`LevelQueue`], an intrusive doubly-linked arena of order
//! slots that gives O(1) append, O(1) removal by slot index, and slot-index
//! reuse on eviction (see design notes on the two portable back-reference
//! strategies — this combines both: an arena with intrusive links, and
//! index reuse).

use super::error::OrderBookError;
use crate::event::Side;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// A price level as observed from outside the book: its price and the sum of
/// its resting order sizes. Always derived on demand, never cached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    /// Price of this level.
    pub price: f64,
    /// Sum of all order sizes resting at this level.
    pub size: u64,
}

impl PriceLevel {
    const ZERO: PriceLevel = PriceLevel { price: 0.0, size: 0 };
}

/// Top-N snapshot of both sides of the book, zero-filled past the depth
/// actually present.
#[derive(Debug, Clone, PartialEq)]
pub struct TopNSnapshot {
    /// Bid levels, best (highest price) first.
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best (lowest price) first.
    pub asks: Vec<PriceLevel>,
}

impl TopNSnapshot {
    fn empty(n: usize) -> Self {
        Self {
            bids: vec![PriceLevel::ZERO; n],
            asks: vec![PriceLevel::ZERO; n],
        }
    }
}

/// Per-level depth-change direction, one entry per captured level.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthChange {
    /// `+1`/`0`/`-1` per bid level, see [`OrderBook::depth_change`].
    pub bid_dir: Vec<i8>,
    /// `+1`/`0`/`-1` per ask level.
    pub ask_dir: Vec<i8>,
}

/// Total-order wrapper around `f64` price keys. Prices arriving from a
/// well-formed `Source` are always finite, so `total_cmp` gives a strict
/// total order usable as a `BTreeMap` key.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PriceKey(f64);

impl Eq for PriceKey {}

impl PartialOrd for PriceKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriceKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    order_id: u64,
    size: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Intrusive FIFO queue of orders resting at one price level.
#[derive(Debug, Default)]
struct LevelQueue {
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    count: usize,
}

impl LevelQueue {
    fn push_back(&mut self, order_id: u64, size: u64) -> usize {
        let slot = Slot {
            order_id,
            size,
            prev: self.tail,
            next: None,
        };
        let idx = if let Some(reused) = self.free.pop() {
            self.slots[reused] = slot;
            reused
        } else {
            self.slots.push(slot);
            self.slots.len() - 1
        };
        match self.tail {
            Some(t) => self.slots[t].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.count += 1;
        idx
    }

    fn remove(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
        self.free.push(idx);
        self.count -= 1;
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn aggregate_size(&self) -> u64 {
        self.iter().map(|(_, size)| size).sum()
    }

    fn iter(&self) -> LevelIter<'_> {
        LevelIter {
            queue: self,
            cur: self.head,
        }
    }
}

struct LevelIter<'a> {
    queue: &'a LevelQueue,
    cur: Option<usize>,
}

impl Iterator for LevelIter<'_> {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.cur?;
        let slot = &self.queue.slots[i];
        self.cur = slot.next;
        Some((slot.order_id, slot.size))
    }
}

#[derive(Debug, Clone, Copy)]
struct Locator {
    price: PriceKey,
    side: Side,
    slot: usize,
}

/// A single-instrument limit order book maintained from an MBO event stream.
#[derive(Debug)]
pub struct OrderBook {
    symbol: String,
    bids: BTreeMap<PriceKey, LevelQueue>,
    asks: BTreeMap<PriceKey, LevelQueue>,
    order_index: HashMap<u64, Locator>,
    last_snapshot: Option<TopNSnapshot>,
    depth_levels: usize,
}

impl OrderBook {
    /// Create an empty book for `symbol`, capturing up to `depth_levels`
    /// price levels per side in snapshots.
    pub fn new(symbol: impl Into<String>, depth_levels: usize) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            order_index: HashMap::new(),
            last_snapshot: None,
            depth_levels,
        }
    }

    /// Instrument symbol this book is maintained for.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    fn side_map(&mut self, side: Side) -> &mut BTreeMap<PriceKey, LevelQueue> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
            Side::None => unreachable!("apply_add/apply_modify never called with Side::None"),
        }
    }

    /// Append a new order to the end of the FIFO queue at `price` on `side`.
    ///
    /// # Errors
    /// Returns [`OrderBookError::DuplicateOrderId`] if `order_id` is already
    /// indexed.
    pub fn apply_add(
        &mut self,
        order_id: u64,
        price: f64,
        size: u64,
        side: Side,
    ) -> Result<(), OrderBookError> {
        trace!(order_id, price, size, ?side, "apply_add");
        if self.order_index.contains_key(&order_id) {
            return Err(OrderBookError::DuplicateOrderId(order_id));
        }
        let key = PriceKey(price);
        let slot = self.side_map(side).entry(key).or_default().push_back(order_id, size);
        self.order_index.insert(order_id, Locator { price: key, side, slot });
        Ok(())
    }

    /// Remove the order from its current queue and append a new entry with
    /// `new_size` at `new_price` on the same side. The order loses FIFO
    /// priority — a deliberate design decision, matching some venues'
    /// cancel-then-append semantics but not others.
    ///
    /// # Errors
    /// Returns [`OrderBookError::UnknownOrderId`] if `order_id` is not
    /// present.
    pub fn apply_modify(
        &mut self,
        order_id: u64,
        new_price: f64,
        new_size: u64,
    ) -> Result<(), OrderBookError> {
        trace!(order_id, new_price, new_size, "apply_modify");
        let locator = *self
            .order_index
            .get(&order_id)
            .ok_or(OrderBookError::UnknownOrderId(order_id))?;
        self.remove_locator(order_id, locator);
        self.apply_add(order_id, new_price, new_size, locator.side)
    }

    /// Remove the located order and its index entry, dropping the price
    /// level if it becomes empty. `_canceled_size` is informational and
    /// ignored — the order is always fully removed.
    ///
    /// # Errors
    /// Returns [`OrderBookError::UnknownOrderId`] if `order_id` is not
    /// present.
    pub fn apply_cancel(&mut self, order_id: u64, _canceled_size: u64) -> Result<(), OrderBookError> {
        trace!(order_id, "apply_cancel");
        let locator = *self
            .order_index
            .get(&order_id)
            .ok_or(OrderBookError::UnknownOrderId(order_id))?;
        self.remove_locator(order_id, locator);
        Ok(())
    }

    fn remove_locator(&mut self, order_id: u64, locator: Locator) {
        let map = self.side_map(locator.side);
        if let Some(level) = map.get_mut(&locator.price) {
            level.remove(locator.slot);
            if level.is_empty() {
                map.remove(&locator.price);
            }
        }
        self.order_index.remove(&order_id);
    }

    /// Empty both maps, the order index, and the cached snapshot used for
    /// delta computation.
    pub fn apply_clear(&mut self) {
        trace!(symbol = %self.symbol, "apply_clear");
        self.bids.clear();
        self.asks.clear();
        self.order_index.clear();
        self.last_snapshot = None;
    }

    /// Best (highest) bid price, or `None` if the bid side is empty.
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.keys().next_back().map(|k| k.0)
    }

    /// Best (lowest) ask price, or `None` if the ask side is empty.
    pub fn best_ask(&self) -> Option<f64> {
        self.asks.keys().next().map(|k| k.0)
    }

    /// Arithmetic mean of best bid and best ask; `NaN` if either side is
    /// empty.
    pub fn mid_price(&self) -> f64 {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => (a + b) / 2.0,
            _ => f64::NAN,
        }
    }

    /// Best ask minus best bid; `NaN` if either side is empty.
    pub fn spread(&self) -> f64 {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => a - b,
            _ => f64::NAN,
        }
    }

    /// Write the top-N bid and ask price levels (highest bid / lowest ask
    /// first); levels beyond what's present are zero-filled.
    pub fn top_n_snapshot(&self) -> TopNSnapshot {
        let n = self.depth_levels;
        let mut out = TopNSnapshot::empty(n);
        for (slot, (key, level)) in out.bids.iter_mut().zip(self.bids.iter().rev()) {
            *slot = PriceLevel {
                price: key.0,
                size: level.aggregate_size(),
            };
        }
        for (slot, (key, level)) in out.asks.iter_mut().zip(self.asks.iter()) {
            *slot = PriceLevel {
                price: key.0,
                size: level.aggregate_size(),
            };
        }
        out
    }

    /// Compare the current top-N snapshot against the previously cached one
    /// (under a `1e-10` price-equality tolerance) and return a per-level
    /// direction vector, then replace the cache with the new snapshot. Two
    /// successive calls with no intervening book mutation return all zeros.
    pub fn depth_change(&mut self) -> DepthChange {
        const EPS: f64 = 1e-10;
        let current = self.top_n_snapshot();
        let previous = self
            .last_snapshot
            .clone()
            .unwrap_or_else(|| TopNSnapshot::empty(self.depth_levels));

        let dir = |old: &PriceLevel, new: &PriceLevel| -> i8 {
            if (new.price - old.price).abs() <= EPS {
                match new.size.cmp(&old.size) {
                    std::cmp::Ordering::Greater => 1,
                    std::cmp::Ordering::Less => -1,
                    std::cmp::Ordering::Equal => 0,
                }
            } else if new.size == old.size {
                0
            } else if new.size > old.size {
                1
            } else {
                -1
            }
        };

        let bid_dir = previous
            .bids
            .iter()
            .zip(current.bids.iter())
            .map(|(o, n)| dir(o, n))
            .collect();
        let ask_dir = previous
            .asks
            .iter()
            .zip(current.asks.iter())
            .map(|(o, n)| dir(o, n))
            .collect();

        self.last_snapshot = Some(current);
        DepthChange { bid_dir, ask_dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_add_top_of_book() {
        let mut book = OrderBook::new("TEST", 10);
        book.apply_add(1, 100.0, 5, Side::Bid).unwrap();
        let snap = book.top_n_snapshot();
        assert_eq!(snap.bids[0], PriceLevel { price: 100.0, size: 5 });
        assert!(book.mid_price().is_nan());
        assert!(book.spread().is_nan());

        book.apply_add(2, 101.0, 3, Side::Ask).unwrap();
        assert_eq!(book.mid_price(), 100.5);
        assert_eq!(book.spread(), 1.0);
    }

    #[test]
    fn cancel_removes_level() {
        let mut book = OrderBook::new("TEST", 10);
        book.apply_add(1, 100.0, 5, Side::Bid).unwrap();
        book.apply_add(2, 101.0, 3, Side::Ask).unwrap();
        book.apply_cancel(1, 0).unwrap();
        let snap = book.top_n_snapshot();
        assert_eq!(snap.bids[0], PriceLevel::ZERO);
        assert!(book.mid_price().is_nan());
    }

    #[test]
    fn duplicate_add_errors() {
        let mut book = OrderBook::new("TEST", 10);
        book.apply_add(1, 100.0, 5, Side::Bid).unwrap();
        let err = book.apply_add(1, 100.0, 1, Side::Bid).unwrap_err();
        assert_eq!(err, OrderBookError::DuplicateOrderId(1));
    }

    #[test]
    fn unknown_cancel_errors() {
        let mut book = OrderBook::new("TEST", 10);
        let err = book.apply_cancel(42, 0).unwrap_err();
        assert_eq!(err, OrderBookError::UnknownOrderId(42));
    }

    #[test]
    fn depth_change_direction_then_quiescent() {
        let mut book = OrderBook::new("TEST", 10);
        book.apply_add(1, 100.0, 5, Side::Bid).unwrap();
        // Prime the cache so the first delta reflects only the next mutation.
        book.depth_change();
        book.apply_add(3, 100.0, 2, Side::Bid).unwrap();
        let change = book.depth_change();
        assert_eq!(change.bid_dir[0], 1);

        let quiescent = book.depth_change();
        assert!(quiescent.bid_dir.iter().all(|&d| d == 0));
        assert!(quiescent.ask_dir.iter().all(|&d| d == 0));
    }

    #[test]
    fn modify_loses_fifo_priority() {
        let mut book = OrderBook::new("TEST", 10);
        book.apply_add(1, 100.0, 5, Side::Bid).unwrap();
        book.apply_add(2, 100.0, 3, Side::Bid).unwrap();
        book.apply_modify(1, 100.0, 5).unwrap();
        // order 1 re-appended after order 2 at the same price/size.
        let level = book.bids.get(&PriceKey(100.0)).unwrap();
        let ids: Vec<u64> = level.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn modify_unknown_order_errors() {
        let mut book = OrderBook::new("TEST", 10);
        let err = book.apply_modify(7, 1.0, 1).unwrap_err();
        assert_eq!(err, OrderBookError::UnknownOrderId(7));
    }

    #[test]
    fn add_cancel_roundtrip_is_empty() {
        let mut book = OrderBook::new("TEST", 10);
        book.apply_add(1, 100.0, 5, Side::Bid).unwrap();
        book.apply_cancel(1, 0).unwrap();
        assert!(book.bids.is_empty());
        assert!(book.order_index.is_empty());
    }

    #[test]
    fn clear_empties_everything() {
        let mut book = OrderBook::new("TEST", 10);
        book.apply_add(1, 100.0, 5, Side::Bid).unwrap();
        book.apply_add(2, 101.0, 3, Side::Ask).unwrap();
        book.depth_change();
        book.apply_clear();
        assert!(book.bids.is_empty());
        assert!(book.asks.is_empty());
        assert!(book.order_index.is_empty());
        assert!(book.last_snapshot.is_none());
    }
}
