//! Access-unit splitting for Annex B elementary streams.
//!
//! Encoders hand the injector one access unit at a time. When working from a
//! raw `.h264` file we recover those boundaries from the NAL sequence: a new
//! access unit begins at an access unit delimiter, or at any parameter set,
//! SEI or slice that follows picture data. Streams with multiple slices per
//! picture are split per slice.

use simtrack_sei::nal::{scan, Framing, NalType};

/// Split `stream` into access units. Bytes before the first start code are
/// dropped; concatenating the result reproduces the rest of the stream.
pub fn split_access_units(stream: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    let mut start: Option<usize> = None;
    let mut has_picture = false;

    for nal in scan(stream, Framing::ByteStream) {
        let begins_unit = match nal.nal_type {
            NalType::Aud => true,
            NalType::Sps | NalType::Pps | NalType::Sei => has_picture,
            t => t.is_vcl() && has_picture,
        };

        match start {
            None => start = Some(nal.offset),
            Some(s) if begins_unit && nal.offset > s => {
                units.push(&stream[s..nal.offset]);
                start = Some(nal.offset);
                has_picture = false;
            }
            Some(_) => {}
        }

        if nal.nal_type.is_vcl() {
            has_picture = true;
        }
    }

    if let Some(s) = start {
        units.push(&stream[s..]);
    }
    units
}
