//! Depth files: snapshots stored as flat quote rows.
//!
//! - [`DepthCodec`] writes snapshots through the flattening encoder and reads
//!   them back through the grouping decoder.
//! - [`DepthFile`] is a re-openable row source over a file on disk.
//! - [`Recorder`] does the writing on a background thread fed by a bounded
//!   channel, for live capture.
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::book::OrderBookSnapshot;
use crate::codec::{read_header, write_header, write_rows, QuoteCodec, RowCodec, RowReader, FORMAT_VERSION};
use crate::error::{DepthError, Result};
use crate::flatten::flatten;
use crate::group::{GroupedSnapshots, RowSource};
use crate::record::FileHeader;

const WRITE_BUFFER: usize = 1 << 20; // 1 MiB

fn now_unix_ns() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).write(true).truncate(true).open(path)?)
}

/// Totals for one written stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DepthSummary {
    pub snapshots: u64,
    pub rows: u64,
    pub first_server_time: Option<i64>,
    pub last_server_time: Option<i64>,
}

impl DepthSummary {
    fn observe(&mut self, snapshot: &OrderBookSnapshot) {
        self.snapshots += 1;
        self.first_server_time.get_or_insert(snapshot.server_time);
        self.last_server_time = Some(snapshot.server_time);
    }
}

/// Snapshot-level serializer for one instrument.
#[derive(Debug, Clone)]
pub struct DepthCodec {
    instrument: String,
}

impl DepthCodec {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self { instrument: instrument.into() }
    }

    fn header(&self) -> FileHeader {
        FileHeader {
            version: FORMAT_VERSION,
            created_unix_ns: now_unix_ns(),
            instrument: self.instrument.clone(),
        }
    }

    /// Write a header and the flattened rows of `snapshots`, in the order given.
    ///
    /// A snapshot holding a level at a reserved price is rejected before any of
    /// its rows are written; earlier snapshots stay written.
    pub fn serialize<W, I>(&self, mut w: W, snapshots: I) -> Result<DepthSummary>
    where
        W: Write,
        I: IntoIterator<Item = OrderBookSnapshot>,
    {
        write_header(&mut w, &self.header())?;
        let mut summary = DepthSummary::default();
        let mut rejected = None;
        let checked = snapshots.into_iter().map_while(|s| match s.check_prices() {
            Ok(()) => Some(s),
            Err(e) => {
                rejected = Some(e);
                None
            }
        });
        let rows = write_rows(&QuoteCodec, &mut w, flatten(checked.inspect(|s| summary.observe(s))))?;
        if let Some(e) = rejected {
            return Err(e);
        }
        w.flush()?;
        summary.rows = rows;
        Ok(summary)
    }

    /// [`serialize`](Self::serialize) into a new file, creating parent directories.
    pub fn write_file<I>(&self, path: impl AsRef<Path>, snapshots: I) -> Result<DepthSummary>
    where
        I: IntoIterator<Item = OrderBookSnapshot>,
    {
        let file = create_file(path.as_ref())?;
        let summary = self.serialize(BufWriter::with_capacity(WRITE_BUFFER, file), snapshots)?;
        debug!(path = %path.as_ref().display(), snapshots = summary.snapshots, rows = summary.rows, "depth file written");
        Ok(summary)
    }

    /// Open a depth file and regroup its rows into snapshots.
    pub fn deserialize(&self, path: impl AsRef<Path>) -> Result<GroupedSnapshots<DepthFile>> {
        let file = DepthFile::open(path)?;
        if file.header.instrument != self.instrument {
            return Err(DepthError::InstrumentMismatch {
                expected: self.instrument.clone(),
                found: file.header.instrument.clone(),
            });
        }
        GroupedSnapshots::new(file, self.instrument.clone())
    }
}

/// Snapshots never go through the row path; they must be flattened first.
impl RowCodec for DepthCodec {
    type Row = OrderBookSnapshot;

    fn write_row<W: Write>(&self, _w: &mut W, _row: &OrderBookSnapshot) -> Result<()> {
        Err(DepthError::Unsupported("snapshots are written through DepthCodec::serialize"))
    }

    fn read_row<R: Read>(&self, _r: &mut R) -> Result<Option<OrderBookSnapshot>> {
        Err(DepthError::Unsupported("snapshots are read through DepthCodec::deserialize"))
    }
}

/// Depth file on disk. Every call to [`RowSource::rows`] reopens it.
#[derive(Debug, Clone)]
pub struct DepthFile {
    path: PathBuf,
    header: FileHeader,
}

impl DepthFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut rdr = BufReader::new(File::open(&path)?);
        let header = read_header(&mut rdr)?;
        debug!(path = %path.display(), instrument = %header.instrument, "depth file opened");
        Ok(Self { path, header })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Regroup using the instrument recorded in the header.
    pub fn into_snapshots(self) -> Result<GroupedSnapshots<Self>> {
        let instrument = self.header.instrument.clone();
        GroupedSnapshots::new(self, instrument)
    }
}

impl RowSource for DepthFile {
    type Error = DepthError;
    type Rows = RowReader<QuoteCodec, BufReader<File>>;

    fn rows(&self) -> Result<Self::Rows> {
        let mut rdr = BufReader::new(File::open(&self.path)?);
        read_header(&mut rdr)?;
        Ok(RowReader::new(QuoteCodec, rdr))
    }
}

/// Background depth writer.
///
/// Snapshots sent with [`record`](Self::record) are flattened and written by a
/// dedicated thread. [`finish`](Self::finish) closes the channel and waits for
/// the file to be flushed.
pub struct Recorder {
    tx: Option<Sender<OrderBookSnapshot>>,
    handle: Option<JoinHandle<Result<DepthSummary>>>,
}

impl Recorder {
    /// Create the file, write its header and start the writer thread.
    pub fn spawn(path: impl AsRef<Path>, instrument: impl Into<String>, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let codec = DepthCodec::new(instrument);
        let mut w = BufWriter::with_capacity(WRITE_BUFFER, create_file(&path)?);
        write_header(&mut w, &codec.header())?;

        let (tx, rx) = bounded::<OrderBookSnapshot>(capacity);
        let handle = std::thread::spawn(move || {
            let res = writer_thread(w, rx);
            match &res {
                Ok(s) => info!(path = %path.display(), snapshots = s.snapshots, rows = s.rows, "recorder finished"),
                Err(e) => warn!(path = %path.display(), "recorder thread error: {e:#}"),
            }
            res
        });
        Ok(Self { tx: Some(tx), handle: Some(handle) })
    }

    pub fn record(&self, snapshot: OrderBookSnapshot) -> Result<()> {
        snapshot.check_prices()?;
        let tx = self.tx.as_ref().ok_or(DepthError::RecorderClosed)?;
        tx.send(snapshot).map_err(|_| DepthError::RecorderClosed)
    }

    /// Stop accepting snapshots and wait for the writer to flush.
    pub fn finish(mut self) -> Result<DepthSummary> {
        self.tx.take();
        match self.handle.take() {
            Some(h) => h.join().map_err(|_| DepthError::RecorderPanicked)?,
            None => Err(DepthError::RecorderClosed),
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn writer_thread<W: Write>(mut w: W, rx: Receiver<OrderBookSnapshot>) -> Result<DepthSummary> {
    let mut summary = DepthSummary::default();
    let rows = write_rows(&QuoteCodec, &mut w, flatten(rx.iter().inspect(|s| summary.observe(s))))?;
    w.flush()?;
    summary.rows = rows;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::PriceLevel;
    use crate::flatten::flatten_snapshot;
    use std::io::Cursor;

    #[test]
    fn snapshot_row_path_is_unsupported() {
        let codec = DepthCodec::new("TST");
        let snap = OrderBookSnapshot::new("TST", 1, 1);
        let err = codec.write_row(&mut Vec::new(), &snap).unwrap_err();
        assert!(matches!(err, DepthError::Unsupported(_)));
        let err = codec.read_row(&mut Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, DepthError::Unsupported(_)));
    }

    #[test]
    fn serialize_counts_rows_and_times() {
        let snaps = vec![
            OrderBookSnapshot::new("TST", 10, 10)
                .with_bids(vec![PriceLevel::new(100, 1), PriceLevel::new(99, 1)])
                .with_asks(vec![PriceLevel::new(101, 1)]),
            OrderBookSnapshot::new("TST", 20, 20),
        ];
        let mut buf = Vec::new();
        let summary = DepthCodec::new("TST").serialize(&mut buf, snaps).unwrap();
        assert_eq!(
            summary,
            DepthSummary { snapshots: 2, rows: 5, first_server_time: Some(10), last_server_time: Some(20) }
        );

        let mut cur = Cursor::new(buf);
        assert_eq!(read_header(&mut cur).unwrap().instrument, "TST");
        assert_eq!(RowReader::new(QuoteCodec, cur).count(), 5);
    }

    #[test]
    fn reserved_price_stops_serialize() {
        let snaps = vec![
            OrderBookSnapshot::new("TST", 1, 1).with_bids(vec![PriceLevel::new(5, 1)]),
            OrderBookSnapshot::new("TST", 2, 2).with_asks(vec![PriceLevel::new(i64::MAX, 1)]),
        ];
        let mut buf = Vec::new();
        let err = DepthCodec::new("TST").serialize(&mut buf, snaps).unwrap_err();
        assert!(matches!(err, DepthError::InvalidArgument(_)));

        // the first snapshot's run went out through the row codec; the rejected one did not
        let mut cur = Cursor::new(buf);
        read_header(&mut cur).unwrap();
        let rows: Vec<_> = RowReader::new(QuoteCodec, cur).map(|r| r.unwrap()).collect();
        assert_eq!(rows, flatten_snapshot(&OrderBookSnapshot::new("TST", 1, 1).with_bids(vec![PriceLevel::new(5, 1)])));
    }
}
