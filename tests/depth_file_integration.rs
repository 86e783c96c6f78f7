use market_depth::codec::{read_header, write_frame, RowReader, QuoteCodec};
use market_depth::record::RecordFrame;
use market_depth::{
    flatten, DepthCodec, DepthError, DepthFile, FlatQuoteRecord, OrderBookSnapshot, PriceLevel, Recorder, Side,
    PRICE_MAX, PRICE_MIN,
};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};

fn lv(price: i64, volume: i64) -> PriceLevel {
    PriceLevel::new(price, volume)
}

fn session() -> Vec<OrderBookSnapshot> {
    vec![
        OrderBookSnapshot::new("TST", 1_000, 1_005)
            .with_bids(vec![lv(100, 2), lv(99, 1), lv(95, 4)])
            .with_asks(vec![lv(101, 3), lv(103, 1)]),
        // same instant, asks only then bids only: must stay two snapshots
        OrderBookSnapshot::new("TST", 2_000, 2_001).with_asks(vec![lv(102, 1)]),
        OrderBookSnapshot::new("TST", 2_000, 2_001).with_bids(vec![lv(100, 1)]),
        OrderBookSnapshot::new("TST", 3_000, 3_002),
        OrderBookSnapshot::new("TST", 4_000, 4_004)
            .with_bids(vec![PriceLevel { price: 98, volume: 7, orders_count: Some(3) }])
            .with_asks(vec![lv(104, 2)]),
    ]
}

#[test]
fn end_to_end_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("TST.depth");
    let codec = DepthCodec::new("TST");

    let summary = codec.write_file(&path, session()).unwrap();
    assert_eq!(summary.snapshots, 5);
    assert_eq!(summary.first_server_time, Some(1_000));
    assert_eq!(summary.last_server_time, Some(4_000));

    let out: Vec<_> = codec.deserialize(&path).unwrap().map(|s| s.unwrap()).collect();
    assert_eq!(out, session());
}

#[test]
fn file_rows_follow_format_contract() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.depth");
    DepthCodec::new("TST").write_file(&path, session()).unwrap();

    let mut rdr = BufReader::new(File::open(&path).unwrap());
    let header = read_header(&mut rdr).unwrap();
    assert_eq!(header.instrument, "TST");
    let rows: Vec<FlatQuoteRecord> = RowReader::new(QuoteCodec, rdr).map(|r| r.unwrap()).collect();
    let expected: Vec<FlatQuoteRecord> = flatten(session()).collect();
    assert_eq!(rows, expected);

    // empty book at t=3000 is exactly two placeholder rows
    let empty: Vec<_> = rows.iter().filter(|r| r.server_time == 3_000).map(|r| (r.side, r.price)).collect();
    assert_eq!(empty, vec![(Side::Bid, PRICE_MIN), (Side::Ask, PRICE_MAX)]);
    assert_eq!(rows.len(), 5 + 2 + 2 + 2 + 2);
}

#[test]
fn reset_rereads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reset.depth");
    DepthCodec::new("TST").write_file(&path, session()).unwrap();

    let mut groups = DepthFile::open(&path).unwrap().into_snapshots().unwrap();
    assert!(groups.advance().unwrap());
    assert!(groups.advance().unwrap());
    assert!(groups.advance().unwrap());
    groups.reset().unwrap();
    let out: Vec<_> = groups.map(|s| s.unwrap()).collect();
    assert_eq!(out, session());
}

#[test]
fn truncated_file_returns_partial_last_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.depth");
    let mut w = BufWriter::new(File::create(&path).unwrap());
    DepthCodec::new("TST").serialize(&mut w, Vec::<OrderBookSnapshot>::new()).unwrap();
    let rows: Vec<_> = flatten(session()).collect();
    // drop the final ask row of the last snapshot
    for row in &rows[..rows.len() - 1] {
        write_frame(&mut w, &RecordFrame::Quote(*row)).unwrap();
    }
    w.flush().unwrap();
    drop(w);

    let out: Vec<_> = DepthCodec::new("TST").deserialize(&path).unwrap().map(|s| s.unwrap()).collect();
    assert_eq!(out.len(), 5);
    assert_eq!(&out[..4], &session()[..4]);
    assert_eq!(out[4].bids, session()[4].bids);
    assert!(out[4].asks.is_empty());
}

#[test]
fn corrupted_row_surfaces_crc_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.depth");
    DepthCodec::new("TST").write_file(&path, session()).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x5a;
    fs::write(&path, bytes).unwrap();

    // the bad frame is the last ask row; the rows before it still regroup
    let results: Vec<_> = DepthCodec::new("TST").deserialize(&path).unwrap().collect();
    assert_eq!(results.len(), 6);
    assert!(results[..4].iter().all(|r| r.is_ok()));
    assert!(matches!(results[4], Err(DepthError::CrcMismatch { .. })));
    let partial = results[5].as_ref().unwrap();
    assert_eq!(partial.bids, session()[4].bids);
    assert!(partial.asks.is_empty());
}

#[test]
fn instrument_mismatch_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tst.depth");
    DepthCodec::new("TST").write_file(&path, session()).unwrap();
    let err = DepthCodec::new("OTHER").deserialize(&path).err().unwrap();
    assert!(matches!(err, DepthError::InstrumentMismatch { .. }));
}

#[test]
fn recorder_writes_from_background_thread() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("live").join("TST.depth");

    let rec = Recorder::spawn(&path, "TST", 4).unwrap();
    for snap in session() {
        rec.record(snap).unwrap();
    }
    let bad = OrderBookSnapshot::new("TST", 9_000, 9_000).with_bids(vec![lv(PRICE_MIN, 1)]);
    assert!(matches!(rec.record(bad), Err(DepthError::InvalidArgument(_))));
    let summary = rec.finish().unwrap();
    assert_eq!(summary.snapshots, 5);
    assert_eq!(summary.rows, 13);

    let out: Vec<_> = DepthFile::open(&path).unwrap().into_snapshots().unwrap().map(|s| s.unwrap()).collect();
    assert_eq!(out, session());
}

#[test]
fn header_only_file_has_no_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.depth");
    let summary = DepthCodec::new("TST").write_file(&path, Vec::<OrderBookSnapshot>::new()).unwrap();
    assert_eq!(summary.rows, 0);
    let mut groups = DepthCodec::new("TST").deserialize(&path).unwrap();
    assert!(!groups.advance().unwrap());
    assert!(groups.current().is_none());
}
