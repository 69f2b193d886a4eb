use teler_rt_rs::Error;
use teler_rt_rs::protocol::codec::{decode_audio, encode_audio};

#[test]
fn round_trip_preserves_bytes() {
    let raw: Vec<u8> = (0..=255).collect();
    let text = encode_audio(&raw).expect("encode failed");
    assert_eq!(decode_audio(&text).expect("decode failed"), raw);
}

#[test]
fn round_trip_large_chunk() {
    // A one-second 8kHz 16-bit mono slice.
    let raw = vec![0xA5u8; 16_000];
    let text = encode_audio(&raw).expect("encode failed");
    let back = decode_audio(&text).expect("decode failed");
    assert_eq!(back.len(), raw.len());
    assert_eq!(back, raw);
}

#[test]
fn encode_rejects_empty_chunk() {
    match encode_audio(&[]) {
        Err(Error::MalformedPayload(_)) => {}
        other => panic!("Expected MalformedPayload, got {other:?}"),
    }
}

#[test]
fn decode_rejects_non_base64_text() {
    match decode_audio("this is not base64 at all!") {
        Err(Error::MalformedPayload(_)) => {}
        other => panic!("Expected MalformedPayload, got {other:?}"),
    }
}

#[test]
fn encoded_text_is_plain_ascii() {
    let text = encode_audio(&[0xFF, 0x00, 0x80]).expect("encode failed");
    assert!(text.is_ascii());
}
