//! # SEI Message Codec
//!
//! An SEI NAL unit body is a sequence of messages followed by RBSP trailing
//! bits:
//!
//! ```text
//! +------------------+------------------+-------------------+-----+------+
//! | payload_type     | payload_size     | payload           | ... | 0x80 |
//! | (ff-escape)      | (ff-escape)      | (payload_size B)  |     |      |
//! +------------------+------------------+-------------------+-----+------+
//! ```
//!
//! ff-escape coding: every `0xFF` byte adds 255, the first non-`0xFF` byte
//! adds its value and ends the field. 254 → `FE`, 255 → `FF 00`,
//! 510 → `FF FF 00`.
//!
//! Parsing is tolerant: truncated or inconsistent fields end the message loop
//! and whatever was already parsed is kept.

use bytes::{BufMut, Bytes, BytesMut};

use crate::nal::START_CODE;
use crate::payload::{self, UUID_LEN};
use crate::record::TrackingRecord;

// ─── Constants ───────────────────────────────────────────────────────────────

/// SEI payload type for application-defined data tagged with a UUID.
pub const USER_DATA_UNREGISTERED: u32 = 5;

/// RBSP stop bit plus alignment zeros.
pub const RBSP_STOP_BIT: u8 = 0x80;

/// NAL header for an SEI unit: forbidden=0, nal_ref_idc=0, type=6.
pub const SEI_NAL_HEADER: u8 = 0x06;

// ─── ff-escape Integers ──────────────────────────────────────────────────────

/// Append `value` in ff-escape coding.
pub fn put_ff_escaped(buf: &mut impl BufMut, mut value: u64) {
    while value >= 255 {
        buf.put_u8(0xFF);
        value -= 255;
    }
    buf.put_u8(value as u8);
}

/// Number of bytes `value` occupies in ff-escape coding.
pub fn ff_escaped_len(value: u64) -> usize {
    (value / 255) as usize + 1
}

/// Read one ff-escape field at `*pos`, advancing past it.
///
/// Returns `None` if the field runs past the end of `data`.
pub fn read_ff_escaped(data: &[u8], pos: &mut usize) -> Option<u64> {
    let mut value = 0u64;
    loop {
        let b = *data.get(*pos)?;
        *pos += 1;
        value = value.saturating_add(u64::from(b));
        if b != 0xFF {
            return Some(value);
        }
    }
}

// ─── SEI Message ─────────────────────────────────────────────────────────────

/// One message inside an SEI NAL unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeiMessage<'a> {
    pub payload_type: u32,
    pub payload_size: usize,
    pub payload: &'a [u8],
}

impl<'a> SeiMessage<'a> {
    pub fn is_user_data_unregistered(&self) -> bool {
        self.payload_type == USER_DATA_UNREGISTERED
    }

    /// The tracking record carried by this message, if it is ours.
    pub fn tracking_record(&self) -> Option<TrackingRecord> {
        if self.is_user_data_unregistered() {
            payload::try_extract(self.payload)
        } else {
            None
        }
    }
}

/// Iterate the messages of an SEI RBSP (the NAL body after its header byte).
pub fn parse_sei_messages(rbsp: &[u8]) -> SeiMessages<'_> {
    SeiMessages {
        data: rbsp,
        pos: 0,
        truncated: false,
    }
}

/// Lazy iterator over SEI messages. Stops at the trailing stop byte or at
/// the first malformed field.
#[derive(Debug, Clone)]
pub struct SeiMessages<'a> {
    data: &'a [u8],
    pos: usize,
    truncated: bool,
}

impl<'a> SeiMessages<'a> {
    /// Whether iteration ended on a malformed or truncated message.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn stop_malformed(&mut self, what: &'static str) -> Option<SeiMessage<'a>> {
        tracing::debug!(offset = self.pos, len = self.data.len(), what, "malformed SEI message");
        self.truncated = true;
        self.pos = self.data.len();
        None
    }
}

impl<'a> Iterator for SeiMessages<'a> {
    type Item = SeiMessage<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        // A lone trailing byte is the stop bit, not a message.
        if self.pos + 1 >= self.data.len() {
            return None;
        }

        let Some(payload_type) = read_ff_escaped(self.data, &mut self.pos) else {
            return self.stop_malformed("payload_type past end");
        };
        let Some(payload_size) = read_ff_escaped(self.data, &mut self.pos) else {
            return self.stop_malformed("payload_size past end");
        };

        let remaining = self.data.len() - self.pos;
        let payload_size = match usize::try_from(payload_size) {
            Ok(size) if size <= remaining => size,
            _ => return self.stop_malformed("payload past end"),
        };

        let start = self.pos;
        self.pos += payload_size;
        Some(SeiMessage {
            payload_type: u32::try_from(payload_type).unwrap_or(u32::MAX),
            payload_size,
            payload: &self.data[start..start + payload_size],
        })
    }
}

// ─── Encoding ────────────────────────────────────────────────────────────────

/// Append one SEI message (type, size, payload).
pub fn encode_sei_message(buf: &mut impl BufMut, payload_type: u32, payload: &[u8]) {
    put_ff_escaped(buf, u64::from(payload_type));
    put_ff_escaped(buf, payload.len() as u64);
    buf.put_slice(payload);
}

/// Build a complete SEI NAL unit carrying `record`:
///
/// `00 00 00 01 | 06 | 05 | size | TRACKING_UUID | JSON | 80`
///
/// The unit is self-contained and ready to splice into an Annex B stream.
pub fn build_sei_nal(record: &TrackingRecord) -> Bytes {
    let body = payload::encode_tagged(record);
    debug_assert!(body.len() >= UUID_LEN);

    let capacity = START_CODE.len() + 1 + 1 + ff_escaped_len(body.len() as u64) + body.len() + 1;
    let mut buf = BytesMut::with_capacity(capacity);
    buf.put_slice(&START_CODE);
    buf.put_u8(SEI_NAL_HEADER);
    encode_sei_message(&mut buf, USER_DATA_UNREGISTERED, &body);
    buf.put_u8(RBSP_STOP_BIT);
    buf.freeze()
}
