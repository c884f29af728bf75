//! # Keyframe Injector
//!
//! Runs once per encoded access unit on the sender. When the unit is a
//! keyframe and a record is pending, a freshly built SEI NAL is spliced in
//! directly before the first IDR slice:
//!
//! ```text
//! before:  [AUD] [SPS] [PPS]       [IDR ...]
//! after:   [AUD] [SPS] [PPS] [SEI] [IDR ...]
//! ```
//!
//! Nothing else in the access unit is touched. Non-keyframes and keyframes
//! that find the queue empty pass through unchanged (same `Bytes`, no copy).

use bytes::{BufMut, Bytes, BytesMut};

use crate::nal::{scan, Framing, NalType};
use crate::queue::RecordSource;
use crate::sei::build_sei_nal;
use crate::stats::InjectStats;

/// Byte offset of the first IDR unit's start code, if the access unit is a keyframe.
///
/// Access units come straight from the encoder, so they are always scanned as
/// byte-stream.
pub fn first_idr_offset(access_unit: &[u8]) -> Option<usize> {
    scan(access_unit, Framing::ByteStream)
        .find(|nal| nal.nal_type == NalType::Idr)
        .map(|nal| nal.offset)
}

/// Whether the access unit contains an IDR slice.
pub fn is_keyframe(access_unit: &[u8]) -> bool {
    first_idr_offset(access_unit).is_some()
}

/// `access_unit[..at] ‖ insert ‖ access_unit[at..]`.
pub fn splice(access_unit: &[u8], at: usize, insert: &[u8]) -> Bytes {
    let at = at.min(access_unit.len());
    let mut out = BytesMut::with_capacity(access_unit.len() + insert.len());
    out.put_slice(&access_unit[..at]);
    out.put_slice(insert);
    out.put_slice(&access_unit[at..]);
    out.freeze()
}

/// Inject at most one pending record into `access_unit`.
pub fn inject<S>(access_unit: Bytes, source: &S, stats: &mut InjectStats) -> Bytes
where
    S: RecordSource + ?Sized,
{
    stats.access_units += 1;

    let Some(idr_offset) = first_idr_offset(&access_unit) else {
        return access_unit;
    };
    stats.keyframes += 1;

    let Some(record) = source.try_pop() else {
        stats.keyframes_without_record += 1;
        tracing::warn!(
            size = access_unit.len(),
            "keyframe without pending tracking record"
        );
        return access_unit;
    };
    if !record.is_encodable() {
        stats.unencodable_records += 1;
        tracing::warn!(
            frame = record.frame,
            timestamp = record.timestamp,
            "dropping tracking record with non-finite timestamp"
        );
        return access_unit;
    }

    let sei = build_sei_nal(&record);
    let out = splice(&access_unit, idr_offset, &sei);

    stats.injections += 1;
    stats.bytes_added += sei.len() as u64;
    tracing::debug!(
        frame = record.frame,
        objects = record.objects,
        offset = idr_offset,
        sei_len = sei.len(),
        size = out.len(),
        injections = stats.injections,
        "injected tracking SEI before IDR"
    );

    out
}

// ─── Encoded Frame ──────────────────────────────────────────────────────────

/// An access unit plus the transport attributes that travel with it.
///
/// Times are in nanoseconds; `None` means unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub data: Bytes,
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    pub duration: Option<u64>,
    /// Opaque transport flags, carried verbatim.
    pub flags: u32,
}

impl EncodedFrame {
    /// A frame with no timing attributes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        EncodedFrame {
            data: data.into(),
            pts: None,
            dts: None,
            duration: None,
            flags: 0,
        }
    }

    pub fn with_timing(mut self, pts: Option<u64>, dts: Option<u64>, duration: Option<u64>) -> Self {
        self.pts = pts;
        self.dts = dts;
        self.duration = duration;
        self
    }
}

/// [`inject`] on an [`EncodedFrame`], carrying its timing and flags forward.
pub fn inject_frame<S>(frame: EncodedFrame, source: &S, stats: &mut InjectStats) -> EncodedFrame
where
    S: RecordSource + ?Sized,
{
    let EncodedFrame {
        data,
        pts,
        dts,
        duration,
        flags,
    } = frame;
    EncodedFrame {
        data: inject(data, source, stats),
        pts,
        dts,
        duration,
        flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nal::scan_auto;
    use crate::queue::RecordQueue;
    use crate::record::TrackingRecord;

    const SPS: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1F];
    const PPS: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C, 0x80];
    const IDR: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x21];
    const P_SLICE: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x41, 0x9A, 0x02, 0x04];

    fn keyframe() -> Bytes {
        [SPS, PPS, IDR].concat().into()
    }

    fn queue_with(frame: u32) -> RecordQueue {
        let q = RecordQueue::new();
        q.push(TrackingRecord::new(frame, 2, 1000.5));
        q
    }

    #[test]
    fn keyframe_detection() {
        assert!(is_keyframe(&keyframe()));
        assert!(!is_keyframe(P_SLICE));
        assert_eq!(first_idr_offset(&keyframe()), Some(SPS.len() + PPS.len()));
    }

    #[test]
    fn non_keyframe_passes_through() {
        let q = queue_with(1);
        let mut stats = InjectStats::new();
        let au = Bytes::from_static(P_SLICE);
        let out = inject(au.clone(), &q, &mut stats);
        assert_eq!(out, au);
        assert_eq!(q.len(), 1, "record must stay queued for the next keyframe");
        assert_eq!(stats.access_units, 1);
        assert_eq!(stats.keyframes, 0);
    }

    #[test]
    fn keyframe_with_empty_queue_passes_through() {
        let q = RecordQueue::new();
        let mut stats = InjectStats::new();
        let out = inject(keyframe(), &q, &mut stats);
        assert_eq!(out, keyframe());
        assert_eq!(stats.keyframes_without_record, 1);
        assert_eq!(stats.injections, 0);
    }

    #[test]
    fn sei_lands_directly_before_idr() {
        let q = queue_with(42);
        let mut stats = InjectStats::new();
        let out = inject(keyframe(), &q, &mut stats);

        let sei = build_sei_nal(&TrackingRecord::new(42, 2, 1000.5));
        let expected = [SPS, PPS, &sei[..], IDR].concat();
        assert_eq!(&out[..], expected.as_slice());

        let types: Vec<NalType> = scan_auto(&out).map(|n| n.nal_type).collect();
        assert_eq!(
            types,
            vec![NalType::Sps, NalType::Pps, NalType::Sei, NalType::Idr]
        );
        assert_eq!(stats.injections, 1);
        assert_eq!(stats.bytes_added, sei.len() as u64);
        assert!(q.is_empty());
    }

    #[test]
    fn bare_idr_gets_sei_prepended() {
        let q = queue_with(3);
        let mut stats = InjectStats::new();
        let out = inject(Bytes::from_static(IDR), &q, &mut stats);
        assert!(out.ends_with(IDR));
        assert_eq!(scan_auto(&out).next().map(|n| n.nal_type), Some(NalType::Sei));
    }

    #[test]
    fn non_finite_timestamp_is_not_injected() {
        let q = RecordQueue::new();
        q.push(TrackingRecord::new(4, 1, f64::NAN));
        let mut stats = InjectStats::new();
        let out = inject(keyframe(), &q, &mut stats);
        assert_eq!(out, keyframe());
        assert!(q.is_empty(), "the bad record is consumed");
        assert_eq!(stats.unencodable_records, 1);
        assert_eq!(stats.injections, 0);
    }

    #[test]
    fn one_record_per_access_unit() {
        let q = RecordQueue::new();
        q.push(TrackingRecord::new(1, 0, 0.0));
        q.push(TrackingRecord::new(2, 0, 0.0));
        let mut stats = InjectStats::new();
        let out = inject(keyframe(), &q, &mut stats);
        let seis = scan_auto(&out).filter(|n| n.nal_type == NalType::Sei).count();
        assert_eq!(seis, 1);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn frame_timing_is_preserved() {
        let q = queue_with(9);
        let mut stats = InjectStats::new();
        let mut frame = EncodedFrame::new(keyframe()).with_timing(
            Some(1_000_000_000),
            Some(966_666_667),
            Some(33_333_333),
        );
        frame.flags = 0x40;

        let out = inject_frame(frame.clone(), &q, &mut stats);
        assert_ne!(out.data, frame.data);
        assert_eq!(out.pts, frame.pts);
        assert_eq!(out.dts, frame.dts);
        assert_eq!(out.duration, frame.duration);
        assert_eq!(out.flags, 0x40);
    }

    #[test]
    fn splice_clamps_offset() {
        assert_eq!(&splice(&[1, 2], 10, &[9])[..], &[1, 2, 9]);
        assert_eq!(&splice(&[1, 2], 0, &[9])[..], &[9, 1, 2]);
    }
}
