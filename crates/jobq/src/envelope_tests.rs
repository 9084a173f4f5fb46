//! Tests for the envelope codec.

use super::*;

#[test]
fn test_encode_unclaimed() {
    let envelope = Envelope::unclaimed(Bytes::from("hi"));
    assert_eq!(envelope.encode(), Bytes::from("2:hi:"));
}

#[test]
fn test_encode_claimed() {
    let envelope = Envelope::claimed(Bytes::from("hi"), 1_700_000_000);
    assert_eq!(envelope.encode(), Bytes::from("2:hi:1700000000"));
}

#[test]
fn test_decode_tracks_claim_state() {
    let unclaimed = Envelope::decode(b"2:hi:").unwrap();
    assert_eq!(unclaimed.payload(), &Bytes::from("hi"));
    assert_eq!(unclaimed.claimed_at(), None);
    assert!(!unclaimed.is_claimed());

    let claimed = Envelope::decode(b"2:hi:1700000000").unwrap();
    assert_eq!(claimed.claimed_at(), Some(1_700_000_000));
    assert!(claimed.is_claimed());
}

#[test]
fn test_decode_empty_payload() {
    let envelope = Envelope::decode(b"0::").unwrap();
    assert!(envelope.payload().is_empty());
    assert!(!envelope.is_claimed());
}

#[test]
fn test_payload_may_contain_delimiters_and_digits() {
    // The length prefix pins the payload boundary even when the payload
    // itself reads like more envelope fields.
    let payload = Bytes::from("7:seven:1234");
    let raw = Envelope::claimed(payload.clone(), 42).encode();

    let decoded = Envelope::decode(&raw).unwrap();
    assert_eq!(decoded.payload(), &payload);
    assert_eq!(decoded.claimed_at(), Some(42));
}

#[test]
fn test_binary_payload_round_trip() {
    let payload = Bytes::from_static(&[0x00, 0xff, b':', 0x7f, b'9']);
    let raw = Envelope::unclaimed(payload.clone()).encode();

    let decoded = Envelope::decode(&raw).unwrap();
    assert_eq!(decoded.payload(), &payload);
    assert!(!decoded.is_claimed());
}

#[test]
fn test_decode_rejects_missing_length() {
    assert_eq!(
        Envelope::decode(b"no delimiter at all"),
        Err(CodecError::MissingLength)
    );
}

#[test]
fn test_decode_rejects_bad_length_prefix() {
    assert_eq!(
        Envelope::decode(b"x2:hi:"),
        Err(CodecError::InvalidLength {
            text: "x2".to_string()
        })
    );
    assert_eq!(
        Envelope::decode(b":hi:"),
        Err(CodecError::InvalidLength {
            text: String::new()
        })
    );
    assert_eq!(
        Envelope::decode(b"-2:hi:"),
        Err(CodecError::InvalidLength {
            text: "-2".to_string()
        })
    );
}

#[test]
fn test_decode_rejects_truncated_payload() {
    assert_eq!(
        Envelope::decode(b"5:hi:"),
        Err(CodecError::TruncatedPayload { declared: 5 })
    );
}

#[test]
fn test_decode_rejects_missing_payload_delimiter() {
    assert_eq!(Envelope::decode(b"2:hix"), Err(CodecError::MissingDelimiter));
}

#[test]
fn test_decode_rejects_bad_stamp() {
    assert_eq!(
        Envelope::decode(b"2:hi:soon"),
        Err(CodecError::InvalidTimestamp {
            text: "soon".to_string()
        })
    );
}

#[test]
fn test_parse_stamp_empty_means_unclaimed() {
    assert_eq!(parse_stamp(b""), Ok(None));
    assert_eq!(parse_stamp(b"1700000000"), Ok(Some(1_700_000_000)));
}

#[test]
fn test_stale_claims() {
    let old = Envelope::claimed(Bytes::from("hi"), 1_000_000);
    assert!(old.is_stale(Duration::seconds(60)));

    let fresh = Envelope::claimed(Bytes::from("hi"), Utc::now().timestamp());
    assert!(!fresh.is_stale(Duration::seconds(60)));

    let unclaimed = Envelope::unclaimed(Bytes::from("hi"));
    assert!(!unclaimed.is_stale(Duration::zero()));
}
