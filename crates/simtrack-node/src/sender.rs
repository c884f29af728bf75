//! `simtrack-node inject`: stamp tracking records into an elementary stream.
//!
//! Simulates the live sender offline. A record producer feeds the shared
//! queue at the configured inference rate while the encoder-output path
//! walks the stream one access unit at a time and runs the injector.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::Args;
use simtrack_sei::config::SimtrackConfig;
use simtrack_sei::{inject_frame, EncodedFrame, FrameCounter, InjectStats, RecordQueue, TrackingRecord};

use crate::access_unit::split_access_units;

#[derive(Args, Debug)]
pub struct InjectArgs {
    /// Annex B H.264 elementary stream to read.
    #[arg(long, short)]
    pub input: PathBuf,

    /// Where to write the stream with SEI units spliced in.
    #[arg(long, short)]
    pub output: PathBuf,

    /// JSON Lines file of records (`{"frame":..,"objects":..,"timestamp":..}`).
    /// Records are stamped from a frame counter when omitted.
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// Frame rate used to derive presentation timestamps.
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Override `sender.record_interval`.
    #[arg(long)]
    pub record_interval: Option<u32>,

    /// Override `sender.objects`.
    #[arg(long)]
    pub objects: Option<u32>,
}

/// Where inference results come from.
enum RecordFeed {
    Replay(std::vec::IntoIter<TrackingRecord>),
    Synthetic { counter: FrameCounter, objects: u32 },
}

impl RecordFeed {
    fn next(&mut self) -> Option<TrackingRecord> {
        match self {
            RecordFeed::Replay(records) => records.next(),
            RecordFeed::Synthetic { counter, objects } => Some(counter.stamp(*objects)),
        }
    }
}

fn load_records(path: &Path) -> Result<Vec<TrackingRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading records from {}", path.display()))?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            TrackingRecord::from_json(line.trim())
                .with_context(|| format!("{}:{}: invalid record", path.display(), n + 1))
        })
        .collect()
}

pub fn run(args: InjectArgs, config: &SimtrackConfig) -> Result<()> {
    if args.fps == 0 {
        bail!("--fps must be at least 1");
    }
    let record_interval = args
        .record_interval
        .unwrap_or(config.sender.record_interval)
        .max(1) as usize;
    let objects = args.objects.unwrap_or(config.sender.objects);

    let stream = fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let units = split_access_units(&stream);
    if units.is_empty() {
        bail!("{}: no Annex B start code found", args.input.display());
    }

    let mut feed = match &args.records {
        Some(path) => {
            let records = load_records(path)?;
            tracing::info!(count = records.len(), path = %path.display(), "loaded records");
            RecordFeed::Replay(records.into_iter())
        }
        None => RecordFeed::Synthetic {
            counter: FrameCounter::new(),
            objects,
        },
    };

    let out_file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut out = BufWriter::new(out_file);

    let queue = RecordQueue::with_capacity(config.sender.queue_capacity);
    let mut stats = InjectStats::new();
    let frame_ns = 1_000_000_000 / u64::from(args.fps);
    let mut dropped = 0u64;

    tracing::info!(
        input = %args.input.display(),
        access_units = units.len(),
        record_interval,
        queue_capacity = queue.capacity(),
        "injecting"
    );

    for (n, au) in units.iter().enumerate() {
        if n % record_interval == 0 {
            if let Some(record) = feed.next() {
                if let Some(evicted) = queue.push(record) {
                    dropped += 1;
                    tracing::debug!(frame = evicted.frame, "queue full, dropped oldest record");
                }
            }
        }

        let pts = n as u64 * frame_ns;
        let frame = EncodedFrame::new(Bytes::copy_from_slice(au)).with_timing(
            Some(pts),
            Some(pts),
            Some(frame_ns),
        );
        let frame = inject_frame(frame, &queue, &mut stats);
        out.write_all(&frame.data)
            .with_context(|| format!("writing {}", args.output.display()))?;
    }
    out.flush()
        .with_context(|| format!("writing {}", args.output.display()))?;

    tracing::info!(
        access_units = stats.access_units,
        keyframes = stats.keyframes,
        injections = stats.injections,
        keyframes_without_record = stats.keyframes_without_record,
        unencodable_records = stats.unencodable_records,
        bytes_added = stats.bytes_added,
        coverage = %format!("{:.1}%", stats.coverage() * 100.0),
        records_dropped = dropped,
        records_pending = queue.len(),
        output = %args.output.display(),
        "injection complete"
    );
    Ok(())
}
