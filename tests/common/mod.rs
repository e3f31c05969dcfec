//! Shared helpers for the integration tests: deterministic synthetic
//! corpora and a full-container round-trip driver.
#![allow(dead_code)]

use std::io::Cursor;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use roxide::{decode_stream, encode_stream, EncodeOptions};

/// Deterministic English-like text: words from a fixed vocabulary with
/// sentence punctuation and occasional capitalization, so the dictionary
/// stage has something to chew on.
pub fn synthetic_text(len: usize, seed: u64) -> Vec<u8> {
    const VOCAB: &[&str] = &[
        "the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog",
        "compression", "dictionary", "model", "context", "stream", "window",
        "block", "range", "coder", "match", "finder", "entropy", "symbol",
        "probability", "frequency", "escape", "literal", "position", "length",
    ];
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(len + 32);
    let mut sentence_start = true;
    while out.len() < len {
        let word = VOCAB[rng.gen_range(0..VOCAB.len())];
        if sentence_start {
            let mut chars = word.as_bytes().to_vec();
            chars[0] = chars[0].to_ascii_uppercase();
            out.extend_from_slice(&chars);
        } else {
            out.extend_from_slice(word.as_bytes());
        }
        sentence_start = false;
        match rng.gen_range(0..12) {
            0 => {
                out.extend_from_slice(b". ");
                sentence_start = true;
            }
            1 => out.extend_from_slice(b", "),
            2 => out.extend_from_slice(b"; "),
            _ => out.push(b' '),
        }
    }
    out.truncate(len);
    out
}

/// Uniform random bytes; effectively incompressible.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = vec![0u8; len];
    rng.fill(&mut out[..]);
    out
}

/// Encodes and decodes through the full container; returns the compressed
/// size after asserting the round trip.
pub fn roundtrip(data: &[u8], opts: &EncodeOptions) -> usize {
    roxide::display::set_display_level(0);
    let mut src = Cursor::new(data.to_vec());
    let mut compressed = Vec::new();
    encode_stream(&mut src, &mut compressed, opts).expect("encode failed");

    let mut restored = Vec::new();
    decode_stream(&mut Cursor::new(compressed.clone()), &mut restored).expect("decode failed");
    assert_eq!(restored.len(), data.len(), "length mismatch after round trip");
    assert!(restored == data, "content mismatch after round trip");
    compressed.len()
}
