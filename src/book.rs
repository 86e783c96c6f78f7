//! Order book snapshot model.
//!
//! A snapshot is one observation of a book at an instant: a bid side with best
//! price at index 0 (descending) and an ask side with best price at index 0
//! (ascending). Sides are selected with [`Side`] rather than a raw integer so
//! that the encoder and decoder can address either container directly.
use serde::{Deserialize, Serialize};

use crate::error::{DepthError, Result};
use crate::record::{PRICE_MAX, PRICE_MIN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price in integer ticks.
    pub price: i64,
    /// Resting volume at that price.
    pub volume: i64,
    /// Number of orders behind the level, when the feed reports it.
    pub orders_count: Option<u32>,
}

impl PriceLevel {
    pub fn new(price: i64, volume: i64) -> Self {
        Self { price, volume, orders_count: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBookSnapshot {
    /// Opaque instrument identifier, carried through unchanged.
    pub instrument: String,
    /// Exchange timestamp, Unix nanoseconds.
    pub server_time: i64,
    /// Local receive timestamp, Unix nanoseconds.
    pub local_time: i64,
    /// Buy side, best price at index 0.
    pub bids: Vec<PriceLevel>,
    /// Sell side, best price at index 0.
    pub asks: Vec<PriceLevel>,
    /// Both sides are known to be best-first. Informational only: the encoder
    /// orders each side itself, and decoded snapshots always carry `true`.
    pub is_sorted: bool,
}

impl OrderBookSnapshot {
    /// Empty book at the given instant.
    pub fn new(instrument: impl Into<String>, server_time: i64, local_time: i64) -> Self {
        Self {
            instrument: instrument.into(),
            server_time,
            local_time,
            bids: Vec::new(),
            asks: Vec::new(),
            is_sorted: true,
        }
    }

    pub fn with_bids(mut self, bids: Vec<PriceLevel>) -> Self {
        self.bids = bids;
        self
    }

    pub fn with_asks(mut self, asks: Vec<PriceLevel>) -> Self {
        self.asks = asks;
        self
    }

    pub fn levels(&self, side: Side) -> &[PriceLevel] {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    pub fn levels_mut(&mut self, side: Side) -> &mut Vec<PriceLevel> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// True when neither side holds a level.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Reject levels priced at one of the reserved sentinels; such a level
    /// would be dropped as "empty side" on the way back.
    pub fn check_prices(&self) -> Result<()> {
        for side in [Side::Bid, Side::Ask] {
            if let Some(level) = self
                .levels(side)
                .iter()
                .find(|l| l.price == PRICE_MIN || l.price == PRICE_MAX)
            {
                return Err(DepthError::InvalidArgument(format!(
                    "{side:?} level at reserved price {} in snapshot {}@{}",
                    level.price, self.instrument, self.server_time
                )));
            }
        }
        Ok(())
    }
}
