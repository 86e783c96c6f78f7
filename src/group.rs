//! Flat row → snapshot decoder.
//!
//! Rows carry no explicit snapshot delimiter. A group ends when the next row
//! either has a different `server_time` or is a bid following an ask: every
//! encoded run places bids before asks, so ask → bid at an unchanged timestamp
//! can only mean a new snapshot. Confirming a boundary needs the first row of
//! the next group, which is held back as a one-row look-ahead.
//!
//! Ordering inside a side is trusted, not checked. A stream that breaks the
//! bids-descending / asks-ascending contract is regrouped silently and may
//! produce malformed snapshots.
use std::convert::Infallible;

use tracing::debug;

use crate::book::{OrderBookSnapshot, Side};
use crate::record::FlatQuoteRecord;

/// Re-acquirable source of flat rows.
///
/// `rows` may be called more than once; each call starts over from the first
/// row. Dropping the returned iterator releases whatever it holds.
pub trait RowSource {
    type Error;
    type Rows: Iterator<Item = Result<FlatQuoteRecord, Self::Error>>;

    fn rows(&self) -> Result<Self::Rows, Self::Error>;
}

impl RowSource for Vec<FlatQuoteRecord> {
    type Error = Infallible;
    type Rows = std::iter::Map<
        std::vec::IntoIter<FlatQuoteRecord>,
        fn(FlatQuoteRecord) -> Result<FlatQuoteRecord, Infallible>,
    >;

    fn rows(&self) -> Result<Self::Rows, Infallible> {
        Ok(self
            .clone()
            .into_iter()
            .map(Ok as fn(FlatQuoteRecord) -> Result<FlatQuoteRecord, Infallible>))
    }
}

/// Streaming decoder from rows back to snapshots.
///
/// Use either [`advance`](Self::advance) + [`current`](Self::current) or the
/// [`Iterator`] impl, which hands each snapshot out by value. Errors from the
/// underlying rows are returned unchanged; the open group is kept, so a
/// source that recovers can be advanced again.
pub struct GroupedSnapshots<S: RowSource> {
    source: S,
    instrument: String,
    rows: Option<S::Rows>,
    /// Group under construction.
    open: Option<OrderBookSnapshot>,
    /// Side of the last row accepted into `open`.
    last_side: Option<Side>,
    /// Row already read that starts the next group.
    pending: Option<FlatQuoteRecord>,
    current: Option<OrderBookSnapshot>,
}

impl<S: RowSource> GroupedSnapshots<S> {
    /// Acquire the rows of `source`. Every snapshot produced is stamped with `instrument`.
    pub fn new(source: S, instrument: impl Into<String>) -> Result<Self, S::Error> {
        let rows = source.rows()?;
        Ok(Self {
            source,
            instrument: instrument.into(),
            rows: Some(rows),
            open: None,
            last_side: None,
            pending: None,
            current: None,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Snapshot produced by the last successful [`advance`](Self::advance).
    pub fn current(&self) -> Option<&OrderBookSnapshot> {
        self.current.as_ref()
    }

    /// Decode the next snapshot. Returns `Ok(false)` once the rows are exhausted
    /// and no group is open.
    pub fn advance(&mut self) -> Result<bool, S::Error> {
        self.current = None;

        while let Some(row) = self.next_row() {
            let row = row?;

            if let Some(open) = &self.open {
                if starts_new_group(open, self.last_side, &row) {
                    self.pending = Some(row);
                    return Ok(self.close_group());
                }
            }

            let open = self.open.get_or_insert_with(|| {
                OrderBookSnapshot::new(self.instrument.clone(), row.server_time, row.local_time)
            });
            if !row.is_sentinel() {
                open.levels_mut(row.side).push(row.level());
            }
            self.last_side = Some(row.side);
        }

        // Source exhausted: a partially read group is still handed out.
        Ok(self.close_group())
    }

    /// Start over from the first row, dropping all decoder state.
    pub fn reset(&mut self) -> Result<(), S::Error> {
        self.release();
        self.rows = Some(self.source.rows()?);
        debug!(instrument = %self.instrument, "row source re-acquired");
        Ok(())
    }

    /// Release the underlying rows now. Further advances report the end.
    pub fn release(&mut self) {
        if self.rows.take().is_some() {
            debug!(instrument = %self.instrument, "row source released");
        }
        self.open = None;
        self.last_side = None;
        self.pending = None;
        self.current = None;
    }

    fn next_row(&mut self) -> Option<Result<FlatQuoteRecord, S::Error>> {
        if let Some(row) = self.pending.take() {
            return Some(Ok(row));
        }
        let next = self.rows.as_mut()?.next();
        if next.is_none() {
            self.rows = None;
        }
        next
    }

    fn close_group(&mut self) -> bool {
        self.last_side = None;
        self.current = self.open.take();
        self.current.is_some()
    }
}

fn starts_new_group(open: &OrderBookSnapshot, last_side: Option<Side>, row: &FlatQuoteRecord) -> bool {
    row.server_time != open.server_time || (last_side == Some(Side::Ask) && row.side == Side::Bid)
}

impl<S: RowSource> Iterator for GroupedSnapshots<S> {
    type Item = Result<OrderBookSnapshot, S::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(true) => self.current.take().map(Ok),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
