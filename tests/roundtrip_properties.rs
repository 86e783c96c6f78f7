use market_depth::{flatten, GroupedSnapshots, OrderBookSnapshot, PriceLevel};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn side() -> impl Strategy<Value = BTreeMap<i64, i64>> {
    prop::collection::btree_map(-1_000i64..1_000, 1i64..500, 0..6)
}

fn snapshot() -> impl Strategy<Value = OrderBookSnapshot> {
    // a narrow time range forces many equal timestamps in a row
    (0i64..4, side(), side()).prop_map(|(ts, bids, asks)| {
        OrderBookSnapshot::new("PROP", ts, ts * 10)
            .with_bids(bids.into_iter().rev().map(|(p, v)| PriceLevel::new(p, v)).collect())
            .with_asks(asks.into_iter().map(|(p, v)| PriceLevel::new(p, v)).collect())
    })
}

proptest! {
    #[test]
    fn prop_decode_inverts_encode(snaps in prop::collection::vec(snapshot(), 0..12)) {
        let rows: Vec<_> = flatten(&snaps).collect();
        let out: Vec<_> = GroupedSnapshots::new(rows, "PROP").unwrap().map(|s| s.unwrap()).collect();
        prop_assert_eq!(out, snaps);
    }

    #[test]
    fn prop_reset_is_idempotent(snaps in prop::collection::vec(snapshot(), 1..8), skip in 0usize..8) {
        let rows: Vec<_> = flatten(&snaps).collect();
        let mut groups = GroupedSnapshots::new(rows, "PROP").unwrap();
        for _ in 0..skip {
            groups.advance().unwrap();
        }
        groups.reset().unwrap();
        let out: Vec<_> = groups.map(|s| s.unwrap()).collect();
        prop_assert_eq!(out, snaps);
    }
}
