//! Snapshot → flat row encoder.
//!
//! Each snapshot becomes one contiguous run: bid rows best-first, then ask rows
//! best-first. An empty side is written as a single placeholder row
//! ([`PRICE_MIN`](crate::record::PRICE_MIN) for bids,
//! [`PRICE_MAX`](crate::record::PRICE_MAX) for asks) so the run always holds at
//! least one bid-side and one ask-side row. That guarantees an ask → bid
//! transition between any two consecutive runs, which is what lets the decoder
//! split snapshots sharing a timestamp.
use std::borrow::Borrow;

use crate::book::{OrderBookSnapshot, PriceLevel, Side};
use crate::record::FlatQuoteRecord;

/// Flatten a single snapshot into its row run.
pub fn flatten_snapshot(snapshot: &OrderBookSnapshot) -> Vec<FlatQuoteRecord> {
    let mut rows = Vec::with_capacity(snapshot.bids.len() + snapshot.asks.len() + 2);

    push_side(&mut rows, snapshot, Side::Bid);
    if rows.is_empty() {
        rows.push(FlatQuoteRecord::empty_side(Side::Bid, snapshot));
    }

    let bid_rows = rows.len();
    push_side(&mut rows, snapshot, Side::Ask);
    if rows.len() == bid_rows {
        rows.push(FlatQuoteRecord::empty_side(Side::Ask, snapshot));
    }

    rows
}

/// Bids are written descending and asks ascending whatever order the caller
/// supplied them in; `is_sorted` is not consulted.
fn push_side(rows: &mut Vec<FlatQuoteRecord>, snapshot: &OrderBookSnapshot, side: Side) {
    let mut ordered: Vec<&PriceLevel> = snapshot.levels(side).iter().collect();
    match side {
        Side::Bid => ordered.sort_by(|a, b| b.price.cmp(&a.price)),
        Side::Ask => ordered.sort_by_key(|l| l.price),
    }
    rows.extend(ordered.into_iter().map(|l| FlatQuoteRecord::from_level(side, l, snapshot)));
}

/// Lazy row stream over a sequence of snapshots, produced by [`flatten`].
///
/// Rows of one snapshot are built when its first row is pulled; nothing is
/// buffered across snapshots.
#[derive(Debug)]
pub struct Flatten<I> {
    snapshots: I,
    run: std::vec::IntoIter<FlatQuoteRecord>,
}

impl<I> Iterator for Flatten<I>
where
    I: Iterator,
    I::Item: Borrow<OrderBookSnapshot>,
{
    type Item = FlatQuoteRecord;

    fn next(&mut self) -> Option<FlatQuoteRecord> {
        loop {
            if let Some(row) = self.run.next() {
                return Some(row);
            }
            let snapshot = self.snapshots.next()?;
            self.run = flatten_snapshot(snapshot.borrow()).into_iter();
        }
    }
}

/// Concatenate the row runs of `snapshots` in the order given.
pub fn flatten<I>(snapshots: I) -> Flatten<I::IntoIter>
where
    I: IntoIterator,
    I::Item: Borrow<OrderBookSnapshot>,
{
    Flatten { snapshots: snapshots.into_iter(), run: Vec::new().into_iter() }
}
