//! Dictionary stage: picker, LCP transform, and block tokenization.

mod common;

use common::synthetic_text;
use roxide::dict::{lcp_decode, lcp_encode, pick_dictionary, Dictionary};

/// Trains on `data` and returns the encoder-side and decoder-side loads of
/// the same blob.
fn trained_pair(data: &[u8]) -> (Dictionary, Dictionary) {
    let mut cursor = std::io::Cursor::new(data.to_vec());
    let blob = pick_dictionary(&mut cursor).unwrap();
    let encoder = Dictionary::load(&blob, true).unwrap();
    let decoder = Dictionary::load(&blob, false).unwrap();
    (encoder, decoder)
}

#[test]
fn picker_finds_frequent_words() {
    let data = synthetic_text(400_000, 1);
    let mut cursor = std::io::Cursor::new(data);
    let blob = pick_dictionary(&mut cursor).unwrap();

    assert_eq!(blob.last(), Some(&0));
    let text = &blob[..blob.len() - 1];
    let words: Vec<&[u8]> = text.split(|&b| b == b'\n').filter(|w| !w.is_empty()).collect();
    // the two reserved entries lead the list
    assert_eq!(words[0], b"  ");
    assert_eq!(words[1], b"http://www.");
    assert!(words.iter().any(|w| *w == b"compression"));
    assert!(words.iter().any(|w| *w == b"the"));
}

#[test]
fn picker_on_binary_yields_reserved_only() {
    let data = common::random_bytes(100_000, 2);
    let mut cursor = std::io::Cursor::new(data);
    let blob = pick_dictionary(&mut cursor).unwrap();
    let words: Vec<&[u8]> = blob[..blob.len() - 1]
        .split(|&b| b == b'\n')
        .filter(|w| !w.is_empty())
        .collect();
    assert_eq!(words.len(), 2);
}

#[test]
fn lcp_roundtrip() {
    let mut blob = Vec::new();
    let words = [
        "  ",
        "http://www.",
        "aardvark",
        "abandon",
        "abandoned",
        "abandonment",
        "abbey",
        "abbot",
        "abbots",
        "zebra",
    ];
    for word in words {
        blob.extend_from_slice(word.as_bytes());
        blob.push(b'\n');
    }
    blob.push(0);

    let original = blob.clone();
    lcp_encode(&mut blob);
    assert!(blob.len() < original.len());
    assert_eq!(blob.last(), Some(&255));
    lcp_decode(&mut blob).unwrap();
    assert_eq!(blob, original);
}

#[test]
fn lcp_roundtrip_trained() {
    let data = synthetic_text(200_000, 3);
    let mut cursor = std::io::Cursor::new(data);
    let mut blob = pick_dictionary(&mut cursor).unwrap();
    let original = blob.clone();
    lcp_encode(&mut blob);
    lcp_decode(&mut blob).unwrap();
    assert_eq!(blob, original);
}

#[test]
fn block_roundtrip_text() {
    let data = synthetic_text(150_000, 4);
    let (encoder, decoder) = trained_pair(&data);

    let mut encoded = Vec::new();
    encoder.encode_block(&data, &mut encoded);
    assert!(encoded.len() < data.len());

    let mut decoded = Vec::new();
    decoder.decode_block(&encoded, &mut decoded).unwrap();
    assert!(decoded == data);
}

#[test]
fn block_roundtrip_with_escape_literals() {
    let text = synthetic_text(60_000, 5);
    // splice every byte value into the text so the ten escape slots all
    // collide with real literals somewhere
    let mut data = text;
    for byte in 0..=255u8 {
        let at = (byte as usize + 1) * 200;
        data.insert(at, byte);
    }
    let (encoder, decoder) = trained_pair(&data);

    let mut encoded = Vec::new();
    encoder.encode_block(&data, &mut encoded);
    let mut decoded = Vec::new();
    decoder.decode_block(&encoded, &mut decoded).unwrap();
    assert!(decoded == data);
}

#[test]
fn block_raw_fallback() {
    let data = common::random_bytes(4096, 6);
    let (encoder, decoder) = trained_pair(&data);

    let mut encoded = Vec::new();
    encoder.encode_block(&data, &mut encoded);
    assert_eq!(encoded.last(), Some(&0));
    assert_eq!(encoded.len(), data.len() + 1);

    let mut decoded = Vec::new();
    decoder.decode_block(&encoded, &mut decoded).unwrap();
    assert!(decoded == data);
}

#[test]
fn sentence_case_transform() {
    // sentence starts exercise the deferred case-reversal path
    let sample = b"the model works. The model works.  The model works, the end. ";
    let mut data = Vec::new();
    for _ in 0..2000 {
        data.extend_from_slice(sample);
    }
    let (encoder, decoder) = trained_pair(&data);

    let mut encoded = Vec::new();
    encoder.encode_block(&data, &mut encoded);
    let mut decoded = Vec::new();
    decoder.decode_block(&encoded, &mut decoded).unwrap();
    assert!(decoded == data);
}
