//! # Tagged User-Data Payload
//!
//! Body of a `user_data_unregistered` SEI message as written by simtrack:
//!
//! ```text
//! +----------------------------------+---------------------+-----------------+
//! | UUID tag (16 bytes)              | JSON body (UTF-8)   | 0x00/0x80 pad   |
//! | "SIMTRACK" 00 00 00 00 00 00 00 00 | {"frame":..}      | (optional)      |
//! +----------------------------------+---------------------+-----------------+
//! ```
//!
//! The tag is a convention for telling our messages apart from other
//! producers' user data, not an authentication mechanism.

use std::str::Utf8Error;

use thiserror::Error;

use crate::record::TrackingRecord;

/// Size of the UUID tag.
pub const UUID_LEN: usize = 16;

/// `"SIMTRACK"` followed by eight zero bytes.
pub const TRACKING_UUID: [u8; UUID_LEN] = [
    0x53, 0x49, 0x4D, 0x54, 0x52, 0x41, 0x43, 0x4B, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

// ── Errors ──────────────────────────────────────────────────────────

/// Why a user-data payload did not yield a record.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload too short for UUID tag: {0} bytes")]
    TooShort(usize),
    #[error("UUID tag mismatch")]
    TagMismatch,
    #[error("JSON body is not UTF-8: {0}")]
    Utf8(#[from] Utf8Error),
    #[error("JSON body does not describe a tracking record: {0}")]
    Json(#[from] serde_json::Error),
}

impl PayloadError {
    /// The payload was ours but its body was unreadable.
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, PayloadError::Utf8(_) | PayloadError::Json(_))
    }
}

// ── Tagged Payload ──────────────────────────────────────────────────

/// A user-data payload split into tag and body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedPayload<'a> {
    pub uuid: [u8; UUID_LEN],
    pub body: &'a [u8],
}

impl<'a> TaggedPayload<'a> {
    /// Split `payload` into its 16-byte tag and the rest.
    pub fn split(payload: &'a [u8]) -> Result<Self, PayloadError> {
        if payload.len() < UUID_LEN {
            return Err(PayloadError::TooShort(payload.len()));
        }
        let (head, body) = payload.split_at(UUID_LEN);
        let mut uuid = [0u8; UUID_LEN];
        uuid.copy_from_slice(head);
        Ok(TaggedPayload { uuid, body })
    }

    /// Whether the tag is [`TRACKING_UUID`].
    pub fn is_tracking(&self) -> bool {
        self.uuid == TRACKING_UUID
    }

    /// Body with trailing `0x00` / `0x80` padding removed.
    pub fn trimmed_body(&self) -> &'a [u8] {
        let end = self
            .body
            .iter()
            .rposition(|&b| b != 0x00 && b != 0x80)
            .map_or(0, |i| i + 1);
        &self.body[..end]
    }
}

/// Decode a tracking record from a `user_data_unregistered` payload.
pub fn decode_tagged(payload: &[u8]) -> Result<TrackingRecord, PayloadError> {
    let tagged = TaggedPayload::split(payload)?;
    if !tagged.is_tracking() {
        return Err(PayloadError::TagMismatch);
    }
    let text = std::str::from_utf8(tagged.trimmed_body())?;
    Ok(TrackingRecord::from_json(text)?)
}

/// Recognise and decode a tracking record, or `None` if this payload is not
/// ours or cannot be read. Decode failures are logged.
pub fn try_extract(payload: &[u8]) -> Option<TrackingRecord> {
    match decode_tagged(payload) {
        Ok(record) => Some(record),
        Err(e) if e.is_decode_failure() => {
            tracing::warn!(error = %e, len = payload.len(), "dropping unreadable tracking payload");
            None
        }
        Err(_) => None,
    }
}

/// Write `TRACKING_UUID ‖ json` for `record`.
pub fn encode_tagged(record: &TrackingRecord) -> Vec<u8> {
    let json = record.to_json();
    let mut out = Vec::with_capacity(UUID_LEN + json.len());
    out.extend_from_slice(&TRACKING_UUID);
    out.extend_from_slice(&json);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(body: &[u8]) -> Vec<u8> {
        let mut v = TRACKING_UUID.to_vec();
        v.extend_from_slice(body);
        v
    }

    #[test]
    fn tag_is_simtrack_ascii() {
        assert_eq!(&TRACKING_UUID[..8], b"SIMTRACK");
        assert!(TRACKING_UUID[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn extracts_record() {
        let payload = tagged(br#"{"frame":5,"objects":1,"timestamp":2.5}"#);
        assert_eq!(try_extract(&payload), Some(TrackingRecord::new(5, 1, 2.5)));
    }

    #[test]
    fn strips_trailing_padding() {
        let payload = tagged(b"{\"frame\":5,\"objects\":1,\"timestamp\":2.5}\x00\x80\x00");
        assert_eq!(try_extract(&payload), Some(TrackingRecord::new(5, 1, 2.5)));
    }

    #[test]
    fn short_payload_is_rejected() {
        assert!(matches!(
            decode_tagged(b"SIMTRACK"),
            Err(PayloadError::TooShort(8))
        ));
        assert_eq!(try_extract(b"SIMTRACK"), None);
    }

    #[test]
    fn single_bit_flip_is_a_mismatch() {
        let mut payload = tagged(br#"{"frame":5,"objects":1,"timestamp":2.5}"#);
        payload[15] ^= 0x01;
        let err = decode_tagged(&payload).unwrap_err();
        assert!(matches!(err, PayloadError::TagMismatch));
        assert!(!err.is_decode_failure());
    }

    #[test]
    fn invalid_utf8_is_a_decode_failure() {
        let payload = tagged(&[0x7B, 0xFF, 0xFE, 0x7D]);
        let err = decode_tagged(&payload).unwrap_err();
        assert!(matches!(err, PayloadError::Utf8(_)));
        assert!(err.is_decode_failure());
        assert_eq!(try_extract(&payload), None);
    }

    #[test]
    fn invalid_json_is_a_decode_failure() {
        let payload = tagged(b"{\"frame\":");
        assert!(matches!(decode_tagged(&payload), Err(PayloadError::Json(_))));
    }

    #[test]
    fn encode_then_split() {
        let record = TrackingRecord::new(42, 3, 1000.25);
        let bytes = encode_tagged(&record);
        let tagged = TaggedPayload::split(&bytes).unwrap();
        assert!(tagged.is_tracking());
        assert_eq!(tagged.body, record.to_json().as_slice());
    }

    #[test]
    fn trimmed_body_of_all_padding_is_empty() {
        let payload = tagged(&[0x80, 0x00]);
        let tagged = TaggedPayload::split(&payload).unwrap();
        assert!(tagged.trimmed_body().is_empty());
    }
}
