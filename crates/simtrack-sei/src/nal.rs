//! # NAL Unit Scanner
//!
//! Splits an H.264 buffer into NAL (Network Abstraction Layer) units.
//!
//! Two framings are understood:
//!
//! - **Byte-stream** (Annex B): each unit is preceded by `00 00 01` or
//!   `00 00 00 01`. This is what encoders emit with
//!   `stream-format=byte-stream`.
//! - **Length-prefixed** (AVC): each unit is preceded by a 4-byte big-endian
//!   length, as produced by `stream-format=avc` and MP4 samples.
//!
//! Framing is resolved once per buffer with [`detect_framing`]. Scanning is a
//! lazy, restartable iterator over borrowed slices; nothing is copied and no
//! unit is ever carried over between buffers.

use std::fmt;
use std::str::FromStr;

use bytes::Buf;
use serde::{Deserialize, Serialize};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Buffers shorter than this are never classified.
pub const MIN_DETECT_LEN: usize = 8;

/// 4-byte Annex B start code. The 3-byte form is `START_CODE[1..]`.
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Size of the big-endian length field in AVC framing.
pub const LENGTH_PREFIX_SIZE: usize = 4;

// ─── NAL Type ────────────────────────────────────────────────────────────────

/// H.264 `nal_unit_type`, the low 5 bits of the NAL header.
///
/// Only the types this crate acts on get their own variant; everything else
/// passes through as [`NalType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalType {
    /// Coded slice of a non-IDR picture (1).
    Slice,
    /// Coded slice of an IDR picture (5).
    Idr,
    /// Supplemental enhancement information (6).
    Sei,
    /// Sequence parameter set (7).
    Sps,
    /// Picture parameter set (8).
    Pps,
    /// Access unit delimiter (9).
    Aud,
    /// Any other type, unexamined.
    Other(u8),
}

impl NalType {
    /// Decode from a NAL header byte: `forbidden(1) | nal_ref_idc(2) | nal_type(5)`.
    #[inline]
    pub fn from_header(header: u8) -> Self {
        match header & 0x1F {
            1 => NalType::Slice,
            5 => NalType::Idr,
            6 => NalType::Sei,
            7 => NalType::Sps,
            8 => NalType::Pps,
            9 => NalType::Aud,
            other => NalType::Other(other),
        }
    }

    /// The raw 5-bit type number.
    pub fn as_u8(self) -> u8 {
        match self {
            NalType::Slice => 1,
            NalType::Idr => 5,
            NalType::Sei => 6,
            NalType::Sps => 7,
            NalType::Pps => 8,
            NalType::Aud => 9,
            NalType::Other(n) => n,
        }
    }

    /// Whether the unit carries coded picture data (types 1-5).
    pub fn is_vcl(self) -> bool {
        matches!(self.as_u8(), 1..=5)
    }
}

impl fmt::Display for NalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NalType::Slice => f.write_str("P-slice"),
            NalType::Idr => f.write_str("IDR"),
            NalType::Sei => f.write_str("SEI"),
            NalType::Sps => f.write_str("SPS"),
            NalType::Pps => f.write_str("PPS"),
            NalType::Aud => f.write_str("AUD"),
            NalType::Other(n) => write!(f, "Type-{n}"),
        }
    }
}

// ─── Framing ─────────────────────────────────────────────────────────────────

/// How NAL units are delimited inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Framing {
    /// Annex B start codes.
    ByteStream,
    /// 4-byte big-endian length prefixes (AVC).
    LengthPrefixed,
    /// Not recognisable from the buffer head. [`scan`] tries byte-stream
    /// first and falls back to length-prefixed.
    Unknown,
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Framing::ByteStream => "byte-stream",
            Framing::LengthPrefixed => "length-prefixed",
            Framing::Unknown => "unknown",
        })
    }
}

/// Classify a buffer's framing from its first bytes.
///
/// - shorter than [`MIN_DETECT_LEN`] → `Unknown`
/// - starts with a 3- or 4-byte start code → `ByteStream`
/// - first 4 bytes are a big-endian length that fits the buffer → `LengthPrefixed`
/// - otherwise `Unknown`
pub fn detect_framing(data: &[u8]) -> Framing {
    if data.len() < MIN_DETECT_LEN {
        return Framing::Unknown;
    }

    if data.starts_with(&START_CODE) || data.starts_with(&START_CODE[1..]) {
        return Framing::ByteStream;
    }

    let len = (&data[..LENGTH_PREFIX_SIZE]).get_u32() as usize;
    if len > 0 && len + LENGTH_PREFIX_SIZE <= data.len() {
        Framing::LengthPrefixed
    } else {
        Framing::Unknown
    }
}

/// Framing policy for a stream: detect per buffer, or force one framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FramingMode {
    #[default]
    Auto,
    ByteStream,
    LengthPrefixed,
}

impl FramingMode {
    /// The framing to scan `data` with under this policy.
    pub fn resolve(self, data: &[u8]) -> Framing {
        match self {
            FramingMode::Auto => detect_framing(data),
            FramingMode::ByteStream => Framing::ByteStream,
            FramingMode::LengthPrefixed => Framing::LengthPrefixed,
        }
    }
}

impl FromStr for FramingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(FramingMode::Auto),
            "byte-stream" | "annexb" => Ok(FramingMode::ByteStream),
            "length-prefixed" | "avc" => Ok(FramingMode::LengthPrefixed),
            other => Err(format!(
                "unknown framing '{other}' (expected auto, byte-stream or length-prefixed)"
            )),
        }
    }
}

// ─── NAL Unit ────────────────────────────────────────────────────────────────

/// One NAL unit borrowed from a scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    /// Byte offset of the unit's framing (start code or length field) in the buffer.
    pub offset: usize,
    /// Type decoded from the header byte.
    pub nal_type: NalType,
    /// Header byte followed by the unit body. Never empty.
    pub payload: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// The 1-byte NAL header.
    pub fn header(&self) -> u8 {
        self.payload[0]
    }

    /// `nal_ref_idc` field of the header (0-3).
    pub fn ref_idc(&self) -> u8 {
        (self.header() >> 5) & 0x03
    }

    /// Unit body after the header byte.
    pub fn rbsp(&self) -> &'a [u8] {
        &self.payload[1..]
    }
}

// ─── Scanning ────────────────────────────────────────────────────────────────

/// Scan `data` as `framing`.
///
/// `Framing::Unknown` is resolved here: byte-stream if that yields at least
/// one unit, length-prefixed otherwise.
pub fn scan(data: &[u8], framing: Framing) -> NalUnits<'_> {
    let resolved = match framing {
        Framing::Unknown => {
            if NalUnits::new(data, Framing::ByteStream).next().is_some() {
                Framing::ByteStream
            } else {
                Framing::LengthPrefixed
            }
        }
        known => known,
    };
    NalUnits::new(data, resolved)
}

/// Detect the framing of `data` and scan it.
pub fn scan_auto(data: &[u8]) -> NalUnits<'_> {
    scan(data, detect_framing(data))
}

/// Lazy iterator over the NAL units of one buffer.
///
/// Cloning restarts nothing: a clone continues from the same position, and a
/// fresh [`scan`] always starts from offset 0.
#[derive(Debug, Clone)]
pub struct NalUnits<'a> {
    data: &'a [u8],
    pos: usize,
    framing: Framing,
}

impl<'a> NalUnits<'a> {
    fn new(data: &'a [u8], framing: Framing) -> Self {
        NalUnits {
            data,
            pos: 0,
            framing,
        }
    }

    /// The framing actually used, after resolving `Unknown`.
    pub fn framing(&self) -> Framing {
        self.framing
    }

    fn next_byte_stream(&mut self) -> Option<NalUnit<'a>> {
        let data = self.data;
        while self.pos < data.len() {
            let Some(sc_len) = start_code_at(data, self.pos) else {
                self.pos += 1;
                continue;
            };

            let offset = self.pos;
            let begin = offset + sc_len;
            if begin >= data.len() {
                // Start code with nothing after it.
                self.pos = data.len();
                return None;
            }

            let end = find_start_code(data, begin + 1).unwrap_or(data.len());
            self.pos = end;
            return Some(NalUnit {
                offset,
                nal_type: NalType::from_header(data[begin]),
                payload: &data[begin..end],
            });
        }
        None
    }

    fn next_length_prefixed(&mut self) -> Option<NalUnit<'a>> {
        let rest = &self.data[self.pos..];
        if rest.len() < LENGTH_PREFIX_SIZE {
            return None;
        }

        let len = (&rest[..LENGTH_PREFIX_SIZE]).get_u32() as usize;
        if len == 0 || len > rest.len() - LENGTH_PREFIX_SIZE {
            // Truncated or bogus length: drop the tail silently.
            self.pos = self.data.len();
            return None;
        }

        let offset = self.pos;
        let payload = &rest[LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + len];
        self.pos += LENGTH_PREFIX_SIZE + len;
        Some(NalUnit {
            offset,
            nal_type: NalType::from_header(payload[0]),
            payload,
        })
    }
}

impl<'a> Iterator for NalUnits<'a> {
    type Item = NalUnit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.framing {
            Framing::ByteStream => self.next_byte_stream(),
            Framing::LengthPrefixed => self.next_length_prefixed(),
            Framing::Unknown => None,
        }
    }
}

/// Length of the start code beginning at `i`, if any.
#[inline]
fn start_code_at(data: &[u8], i: usize) -> Option<usize> {
    let rest = &data[i..];
    if rest.starts_with(&START_CODE) {
        Some(4)
    } else if rest.starts_with(&START_CODE[1..]) {
        Some(3)
    } else {
        None
    }
}

fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    (from..data.len()).find(|&j| start_code_at(data, j).is_some())
}

/// Lowercase hex of at most `max` leading bytes, for diagnostics.
pub fn hex_preview(data: &[u8], max: usize) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(max.min(data.len()) * 2);
    for b in data.iter().take(max) {
        let _ = write!(out, "{b:02x}");
    }
    out
}
