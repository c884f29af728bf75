//! Property-based tests for the SEI metadata codec.
//!
//! These tests verify record roundtrips through the SEI/NAL layers, framing
//! symmetry between Annex B and length-prefixed scanning, and the byte-exact
//! behaviour of keyframe injection.

use bytes::Bytes;
use proptest::prelude::*;
use simtrack_sei::nal::{scan, Framing, NalType};
use simtrack_sei::payload::TRACKING_UUID;
use simtrack_sei::sei::*;
use simtrack_sei::{inject, InjectStats, RecordQueue, TrackingRecord};

// ─── Strategies ──────────────────────────────────────────────────────────────

fn record_strategy() -> impl Strategy<Value = TrackingRecord> {
    (any::<u32>(), any::<u32>(), -1.0e12f64..1.0e12f64)
        .prop_map(|(frame, objects, timestamp)| TrackingRecord::new(frame, objects, timestamp))
}

/// A NAL unit (header + body) with no zero bytes, so it can never contain a
/// start code. `types` restricts the header's type field.
fn nal_strategy(types: impl Strategy<Value = u8>) -> impl Strategy<Value = Vec<u8>> {
    (types, 0u8..4, prop::collection::vec(1u8..=255, 0..48)).prop_map(|(ty, ref_idc, body)| {
        let mut nal = vec![(ref_idc << 5) | ty];
        nal.extend(body);
        nal
    })
}

fn non_idr_type() -> impl Strategy<Value = u8> {
    (1u8..32).prop_filter("not IDR", |t| *t != 5)
}

fn byte_stream(nals: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        out.extend_from_slice(nal);
    }
    out
}

fn length_prefixed(nals: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        out.extend_from_slice(nal);
    }
    out
}

// ─── Record Roundtrip ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn record_roundtrips_through_sei_nal(record in record_strategy()) {
        let nal = build_sei_nal(&record);

        // Strip start code and NAL header.
        let msgs: Vec<_> = parse_sei_messages(&nal[5..]).collect();
        prop_assert_eq!(msgs.len(), 1);
        prop_assert_eq!(msgs[0].payload_type, USER_DATA_UNREGISTERED);

        let decoded = msgs[0].tracking_record().unwrap();
        prop_assert_eq!(decoded.frame, record.frame);
        prop_assert_eq!(decoded.objects, record.objects);
        prop_assert_eq!(decoded.timestamp, record.timestamp);
    }

    #[test]
    fn ff_escape_roundtrip(value in 0u64..200_000) {
        let mut buf = Vec::new();
        put_ff_escaped(&mut buf, value);
        prop_assert_eq!(buf.len(), ff_escaped_len(value));
        prop_assert!(buf[..buf.len() - 1].iter().all(|&b| b == 0xFF));

        let mut pos = 0;
        prop_assert_eq!(read_ff_escaped(&buf, &mut pos), Some(value));
        prop_assert_eq!(pos, buf.len());
    }

    #[test]
    fn tag_bit_flip_is_skipped_and_parsing_continues(
        record in record_strategy(),
        bit in 0usize..128,
    ) {
        let mut ours = TRACKING_UUID.to_vec();
        ours.extend_from_slice(&record.to_json());
        let mut flipped = ours.clone();
        flipped[bit / 8] ^= 1 << (bit % 8);

        let mut rbsp = Vec::new();
        encode_sei_message(&mut rbsp, USER_DATA_UNREGISTERED, &flipped);
        encode_sei_message(&mut rbsp, USER_DATA_UNREGISTERED, &ours);
        rbsp.push(RBSP_STOP_BIT);

        let found: Vec<_> = parse_sei_messages(&rbsp)
            .filter_map(|m| m.tracking_record())
            .collect();
        prop_assert_eq!(found, vec![record]);
    }

    #[test]
    fn truncation_never_panics(record in record_strategy(), cut in 0usize..64) {
        let nal = build_sei_nal(&record);
        let rbsp = &nal[5..];
        let cut = cut.min(rbsp.len());
        let _ = parse_sei_messages(&rbsp[..rbsp.len() - cut]).count();
    }
}

// ─── Framing Symmetry ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn byte_stream_and_length_prefixed_agree(
        nals in prop::collection::vec(nal_strategy(1u8..32), 1..12)
    ) {
        let bs = byte_stream(&nals);
        let lp = length_prefixed(&nals);

        let from_bs: Vec<_> = scan(&bs, Framing::ByteStream)
            .map(|n| (n.nal_type, n.payload.to_vec()))
            .collect();
        let from_lp: Vec<_> = scan(&lp, Framing::LengthPrefixed)
            .map(|n| (n.nal_type, n.payload.to_vec()))
            .collect();

        prop_assert_eq!(from_bs.len(), nals.len());
        prop_assert_eq!(from_bs, from_lp);
    }
}

// ─── Injection ───────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn non_keyframes_are_untouched(
        nals in prop::collection::vec(nal_strategy(non_idr_type()), 1..8),
        pending in 0usize..3,
    ) {
        let queue = RecordQueue::new();
        for frame in 0..pending {
            queue.push(TrackingRecord::new(frame as u32, 0, 0.0));
        }
        let au = Bytes::from(byte_stream(&nals));

        let mut stats = InjectStats::new();
        let out = inject(au.clone(), &queue, &mut stats);
        prop_assert_eq!(out, au);
        prop_assert_eq!(queue.len(), pending);
    }

    #[test]
    fn sei_is_spliced_at_the_first_idr(
        before in prop::collection::vec(nal_strategy(non_idr_type()), 0..5),
        idr in nal_strategy(Just(5u8)),
        after in prop::collection::vec(nal_strategy(1u8..32), 0..5),
        record in record_strategy(),
    ) {
        let mut nals = before.clone();
        nals.push(idr);
        nals.extend(after);
        let au = byte_stream(&nals);
        let p = byte_stream(&before).len();

        let queue = RecordQueue::new();
        queue.push(record);
        let mut stats = InjectStats::new();
        let out = inject(Bytes::from(au.clone()), &queue, &mut stats);

        let expected = [&au[..p], &build_sei_nal(&record)[..], &au[p..]].concat();
        prop_assert_eq!(&out[..], expected.as_slice());
        prop_assert_eq!(stats.injections, 1);

        let types: Vec<_> = scan(&out, Framing::ByteStream).map(|n| n.nal_type).collect();
        prop_assert_eq!(types[before.len()], NalType::Sei);
        prop_assert_eq!(types[before.len() + 1], NalType::Idr);
    }
}

// ─── ff-escape Boundaries ────────────────────────────────────────────────────

#[test]
fn payload_size_boundaries() {
    for (size, expected) in [
        (254u64, vec![0xFE]),
        (255, vec![0xFF, 0x00]),
        (510, vec![0xFF, 0xFF, 0x00]),
    ] {
        let mut buf = Vec::new();
        put_ff_escaped(&mut buf, size);
        assert_eq!(buf, expected, "size {size}");
    }
}
