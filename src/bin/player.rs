use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use market_depth::{DepthCodec, DepthFile, GroupedSnapshots, OrderBookSnapshot, PriceLevel};
use std::path::PathBuf;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Replay a recorded depth file and regroup its snapshots")]
struct Args {
    /// Depth file to read
    #[arg(long, short = 'i', env = "DEPTH_FILE")]
    input: PathBuf,

    /// Expected instrument; defaults to the one in the file header
    #[arg(long, env = "INSTRUMENT")]
    instrument: Option<String>,

    /// Print top-of-book for every snapshot
    #[arg(long, default_value_t = false)]
    dump: bool,

    /// Number of levels to print when dumping
    #[arg(long, default_value_t = 5)]
    top: usize,

    /// Stop after this many snapshots
    #[arg(long)]
    limit: Option<usize>,
}

fn fmt_ns(ns: i64) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]");
    OffsetDateTime::from_unix_timestamp_nanos(ns as i128)
        .ok()
        .and_then(|t| t.format(&fmt).ok())
        .unwrap_or_else(|| ns.to_string())
}

fn dump(n: usize, snap: &OrderBookSnapshot, top: usize) {
    let best = |l: Option<&PriceLevel>| l.map(|l| l.price.to_string()).unwrap_or_else(|| "-".to_string());
    println!(
        "#{} server={} local={} | {} bids / {} asks | best {} / {}:",
        n,
        fmt_ns(snap.server_time),
        fmt_ns(snap.local_time),
        snap.bids.len(),
        snap.asks.len(),
        best(snap.best_bid()),
        best(snap.best_ask())
    );
    let tb = snap.bids.iter().take(top).collect::<Vec<_>>();
    let ta = snap.asks.iter().take(top).collect::<Vec<_>>();
    for i in 0..tb.len().max(ta.len()) {
        let b = tb.get(i).map(|l| format!("{:>3}: {:>12} x {:>8}", i, l.price, l.volume)).unwrap_or_else(|| format!("{:>3}: -", i));
        let a = ta.get(i).map(|l| format!("{:>12} x {:>8}", l.price, l.volume)).unwrap_or_else(|| "-".to_string());
        println!("{} | {}", b, a);
    }
    println!("---");
}

fn main() -> Result<()> {
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("market_depth=info,player=info")))
        .with_target(false)
        .init();
    let args = Args::parse();

    let groups: GroupedSnapshots<DepthFile> = match &args.instrument {
        Some(instrument) => DepthCodec::new(instrument.clone()).deserialize(&args.input),
        None => DepthFile::open(&args.input).and_then(|file| {
            let header = file.header();
            info!(version = header.version, instrument = %header.instrument, "depth file header");
            file.into_snapshots()
        }),
    }
    .with_context(|| format!("open {:?}", args.input))?;
    let instrument = groups.instrument().to_string();

    let (mut snapshots, mut empty, mut levels) = (0usize, 0usize, 0usize);
    let (mut first, mut last) = (None, None);
    for snap in groups.take(args.limit.unwrap_or(usize::MAX)) {
        let snap = snap.with_context(|| format!("snapshot {}", snapshots))?;
        if args.dump {
            dump(snapshots, &snap, args.top);
        }
        snapshots += 1;
        levels += snap.bids.len() + snap.asks.len();
        if snap.is_empty() {
            empty += 1;
        }
        first.get_or_insert(snap.server_time);
        last = Some(snap.server_time);
    }

    info!(
        %instrument,
        snapshots,
        empty,
        levels,
        first = %first.map(fmt_ns).unwrap_or_default(),
        last = %last.map(fmt_ns).unwrap_or_default(),
        "replay complete"
    );
    Ok(())
}
