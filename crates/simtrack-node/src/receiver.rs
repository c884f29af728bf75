//! `simtrack-node extract`: recover tracking records from a captured stream.
//!
//! Byte-stream input is split into access units and fed to the extractor one
//! buffer at a time, the way a depayloader would deliver it. Length-prefixed
//! input carries no access-unit boundaries of its own and is handed over as a
//! single buffer.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use simtrack_sei::config::SimtrackConfig;
use simtrack_sei::nal::hex_preview;
use simtrack_sei::{
    extract_records, ExtractStats, Framing, FramingMode, StreamHealth,
    TrackingRecord,
};

use crate::access_unit::split_access_units;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Captured H.264 stream (Annex B or 4-byte length-prefixed).
    #[arg(long, short)]
    pub input: PathBuf,

    /// Override `receiver.framing` (auto, byte-stream, length-prefixed).
    #[arg(long)]
    pub framing: Option<FramingMode>,

    /// Print records and the final report as JSON Lines.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    runtime_secs: f64,
    success_rate: f64,
    health: StreamHealth,
    #[serde(flatten)]
    stats: &'a ExtractStats,
}

/// Cut the capture into the buffers the extractor will see.
fn buffers(data: &[u8], mode: FramingMode) -> Vec<&[u8]> {
    if mode.resolve(data) == Framing::ByteStream {
        let units = split_access_units(data);
        if !units.is_empty() {
            return units;
        }
    }
    vec![data]
}

/// Human-readable line for the `index`-th record (1-based), with the object
/// total up to and including it.
fn record_line(record: &TrackingRecord, index: u64, total_objects: u64, elapsed: f64) -> String {
    format!(
        "record #{:04}  frame {:>6}  objects {:>3}  timestamp {:.3}  total objects {}  t+{:.1}s",
        index, record.frame, record.objects, record.timestamp, total_objects, elapsed
    )
}

pub fn run(args: ExtractArgs, config: &SimtrackConfig) -> Result<()> {
    let mode = args.framing.unwrap_or(config.receiver.framing);
    let data = fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let buffers = buffers(&data, mode);

    tracing::info!(
        input = %args.input.display(),
        bytes = data.len(),
        buffers = buffers.len(),
        framing = ?mode,
        head = %hex_preview(&data, 16),
        "extracting"
    );

    let started = Instant::now();
    let mut stats = ExtractStats::new();
    let mut since_record = 0u64;

    for buffer in buffers {
        let mut index = stats.records;
        let mut total_objects = stats.total_objects;
        let records = extract_records(buffer, mode, &mut stats);
        if records.is_empty() {
            since_record += 1;
        } else {
            since_record = 0;
        }
        for record in &records {
            if args.json {
                println!("{}", serde_json::to_string(record)?);
            } else {
                index += 1;
                total_objects += u64::from(record.objects);
                let elapsed = started.elapsed().as_secs_f64();
                println!("{}", record_line(record, index, total_objects, elapsed));
            }
        }

        let watchdog = config.receiver.watchdog_buffers;
        if watchdog > 0 && since_record == watchdog {
            tracing::warn!(
                buffers = stats.buffers,
                health = ?stats.health(),
                "no tracking record in {watchdog} buffers"
            );
            since_record = 0;
        }
    }

    let report = Report {
        runtime_secs: started.elapsed().as_secs_f64(),
        success_rate: stats.success_rate(),
        health: stats.health(),
        stats: &stats,
    };
    if args.json {
        println!("{}", serde_json::to_string(&report)?);
    }
    tracing::info!(
        buffers = stats.buffers,
        buffers_with_records = stats.buffers_with_records,
        sei_units = stats.sei_units,
        sei_messages = stats.sei_messages,
        malformed_sei = stats.malformed_sei,
        records = stats.records,
        last_frame = stats.last_frame,
        total_objects = stats.total_objects,
        tag_mismatches = stats.tag_mismatches,
        decode_failures = stats.decode_failures,
        success_rate = %format!("{:.1}%", report.success_rate * 100.0),
        health = ?report.health,
        runtime_secs = %format!("{:.3}", report.runtime_secs),
        "extraction complete"
    );
    Ok(())
}
