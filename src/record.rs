//! Durable on-disk schema: file header and flat quote rows.
use serde::{Deserialize, Serialize};

use crate::book::{OrderBookSnapshot, PriceLevel, Side};

/// Bid-side placeholder: "this group has no bid levels".
pub const PRICE_MIN: i64 = i64::MIN;
/// Ask-side placeholder: "this group has no ask levels".
pub const PRICE_MAX: i64 = i64::MAX;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub version: u16,
    pub created_unix_ns: u128,
    pub instrument: String,
}

/// One persisted quote. A run of these with equal `server_time`, bids before
/// asks, describes one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatQuoteRecord {
    pub side: Side,
    pub price: i64,
    pub volume: i64,
    pub orders_count: Option<u32>,
    pub server_time: i64,
    pub local_time: i64,
}

impl FlatQuoteRecord {
    pub fn from_level(side: Side, level: &PriceLevel, snapshot: &OrderBookSnapshot) -> Self {
        Self {
            side,
            price: level.price,
            volume: level.volume,
            orders_count: level.orders_count,
            server_time: snapshot.server_time,
            local_time: snapshot.local_time,
        }
    }

    /// Placeholder row standing in for an empty side.
    pub fn empty_side(side: Side, snapshot: &OrderBookSnapshot) -> Self {
        let price = match side {
            Side::Bid => PRICE_MIN,
            Side::Ask => PRICE_MAX,
        };
        Self {
            side,
            price,
            volume: 0,
            orders_count: None,
            server_time: snapshot.server_time,
            local_time: snapshot.local_time,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.price == PRICE_MIN || self.price == PRICE_MAX
    }

    pub fn level(&self) -> PriceLevel {
        PriceLevel { price: self.price, volume: self.volume, orders_count: self.orders_count }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecordFrame {
    Header(FileHeader),
    Quote(FlatQuoteRecord),
}
