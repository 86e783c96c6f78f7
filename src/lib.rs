//! Market depth storage library.
//!
//! Full order-book snapshots are stored as a flat, time-ordered stream of
//! single-quote rows and regrouped losslessly on the way back:
//!
//! - `book`: snapshot model (`OrderBookSnapshot`, `PriceLevel`, `Side`)
//! - `record`: durable row schema and the two reserved placeholder prices
//! - `flatten`: snapshot → row encoder
//! - `group`: row → snapshot decoder with one row of look-ahead
//! - `codec`: length + CRC framed bincode rows
//! - `store`: depth files and the background recorder
//!
//! The `player` binary uses these modules to replay a depth file.
pub mod book;
pub mod codec;
pub mod error;
pub mod flatten;
pub mod group;
pub mod record;
pub mod store;

pub use book::{OrderBookSnapshot, PriceLevel, Side};
pub use error::{DepthError, Result};
pub use flatten::{flatten, flatten_snapshot};
pub use group::{GroupedSnapshots, RowSource};
pub use record::{FlatQuoteRecord, PRICE_MAX, PRICE_MIN};
pub use store::{DepthCodec, DepthFile, DepthSummary, Recorder};
