//! Row codec: length + CRC framed bincode records.
//!
//! Every frame is `[len:u32 LE][crc32:u32 LE][payload]` where the payload is a
//! bincode-encoded [`RecordFrame`]. A file holds one `Header` frame followed by
//! `Quote` frames. End of input exactly at a frame boundary is a clean end of
//! stream; a torn frame surfaces as an I/O error.
use std::io::{ErrorKind, Read, Write};

use crc32fast::Hasher as Crc32;

use crate::error::{DepthError, Result};
use crate::record::{FileHeader, FlatQuoteRecord, RecordFrame};

pub const FORMAT_VERSION: u16 = 1;

/// Upper bound on a frame payload. Quote frames are well under 64 bytes; the
/// header carries only a short instrument name.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

pub fn write_frame<W: Write>(w: &mut W, frame: &RecordFrame) -> Result<()> {
    let payload = bincode::serialize(frame)?;
    let mut hasher = Crc32::new();
    hasher.update(&payload);
    let crc = hasher.finalize();

    let len = payload.len() as u32;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&crc.to_le_bytes())?;
    w.write_all(&payload)?;
    Ok(())
}

fn read_u32<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Length prefix of the next frame. `None` only when the input ends before its
/// first byte; a prefix cut short is a torn frame.
fn read_len<R: Read>(r: &mut R) -> std::io::Result<Option<usize>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    match filled {
        0 => Ok(None),
        4 => Ok(Some(u32::from_le_bytes(buf) as usize)),
        n => Err(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            format!("torn frame: {n} of 4 length bytes"),
        )),
    }
}

/// Read the next frame, or `None` at end of input.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Option<RecordFrame>> {
    let Some(len) = read_len(r)? else {
        return Ok(None);
    };
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            ErrorKind::InvalidData,
            format!("frame length {len} exceeds {MAX_FRAME_LEN}"),
        )
        .into());
    }
    let expected = read_u32(r)?;
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;

    let mut hasher = Crc32::new();
    hasher.update(&payload);
    let actual = hasher.finalize();
    if actual != expected {
        return Err(DepthError::CrcMismatch { expected, actual });
    }
    Ok(Some(bincode::deserialize(&payload)?))
}

pub fn write_header<W: Write>(w: &mut W, header: &FileHeader) -> Result<()> {
    write_frame(w, &RecordFrame::Header(header.clone()))
}

/// Read the leading header frame and check its version.
pub fn read_header<R: Read>(r: &mut R) -> Result<FileHeader> {
    match read_frame(r)? {
        Some(RecordFrame::Header(h)) if h.version == FORMAT_VERSION => Ok(h),
        Some(RecordFrame::Header(h)) => Err(DepthError::UnsupportedVersion(h.version)),
        _ => Err(DepthError::MissingHeader),
    }
}

/// Row-at-a-time serializer for one record type.
pub trait RowCodec {
    type Row;

    fn write_row<W: Write>(&self, w: &mut W, row: &Self::Row) -> Result<()>;

    /// `None` at end of input.
    fn read_row<R: Read>(&self, r: &mut R) -> Result<Option<Self::Row>>;
}

/// Codec for flat quote rows.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuoteCodec;

impl RowCodec for QuoteCodec {
    type Row = FlatQuoteRecord;

    fn write_row<W: Write>(&self, w: &mut W, row: &FlatQuoteRecord) -> Result<()> {
        write_frame(w, &RecordFrame::Quote(*row))
    }

    fn read_row<R: Read>(&self, r: &mut R) -> Result<Option<FlatQuoteRecord>> {
        match read_frame(r)? {
            Some(RecordFrame::Quote(q)) => Ok(Some(q)),
            Some(RecordFrame::Header(_)) => Err(DepthError::UnexpectedHeader),
            None => Ok(None),
        }
    }
}

/// Write every row in order. Returns the number of rows written.
pub fn write_rows<C, W, I>(codec: &C, w: &mut W, rows: I) -> Result<u64>
where
    C: RowCodec,
    W: Write,
    I: IntoIterator<Item = C::Row>,
{
    let mut n = 0u64;
    for row in rows {
        codec.write_row(w, &row)?;
        n += 1;
    }
    Ok(n)
}

/// Lazy row stream over a reader. Stops after the first error.
#[derive(Debug)]
pub struct RowReader<C, R> {
    codec: C,
    reader: R,
    done: bool,
}

impl<C: RowCodec, R: Read> RowReader<C, R> {
    pub fn new(codec: C, reader: R) -> Self {
        Self { codec, reader, done: false }
    }
}

impl<C: RowCodec, R: Read> Iterator for RowReader<C, R> {
    type Item = Result<C::Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.codec.read_row(&mut self.reader) {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
