//! Range coder and PPM model laws.

mod common;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use roxide::ppm::PpmModel;
use roxide::rangecoder::{RangeDecoder, RangeEncoder};

/// For any valid `(cum, frq, sum)` sequence the decoder recovers every
/// cumulative value inside the encoded symbol's span.
#[test]
fn range_coder_law() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut triples = Vec::new();
    for _ in 0..20_000 {
        let sum: u32 = rng.gen_range(2..=65536);
        let frq: u32 = rng.gen_range(1..=sum);
        let cum: u32 = rng.gen_range(0..=sum - frq);
        triples.push((cum, frq, sum));
    }

    let mut enc = RangeEncoder::new();
    let mut out = Vec::new();
    for &(cum, frq, sum) in &triples {
        enc.encode(cum, frq, sum, &mut out);
    }
    enc.flush(&mut out);

    let mut dec = RangeDecoder::new(&out).unwrap();
    for &(cum, frq, sum) in &triples {
        let got = dec.decode_cum(sum);
        assert!(
            got >= cum && got < cum + frq,
            "decoded cum {} outside [{}, {})",
            got,
            cum,
            cum + frq
        );
        dec.decode(cum, frq).unwrap();
    }
}

#[test]
fn range_coder_empty_stream() {
    let mut enc = RangeEncoder::new();
    let mut out = Vec::new();
    enc.flush(&mut out);
    assert_eq!(out.len(), 5);
    RangeDecoder::new(&out).unwrap();
}

#[test]
fn range_coder_single_symbol() {
    let mut enc = RangeEncoder::new();
    let mut out = Vec::new();
    enc.encode(10, 5, 100, &mut out);
    enc.flush(&mut out);

    let mut dec = RangeDecoder::new(&out).unwrap();
    let got = dec.decode_cum(100);
    assert!((10..15).contains(&got));
    dec.decode(10, 5).unwrap();
}

#[test]
fn range_decoder_rejects_short_input() {
    assert!(RangeDecoder::new(&[0, 0, 0]).is_err());
}

/// The PPM stack alone (no LZ stage) must reproduce any byte sequence.
#[test]
fn ppm_roundtrip_text() {
    let data = common::synthetic_text(40_000, 11);
    ppm_roundtrip(&data);
}

#[test]
fn ppm_roundtrip_binary() {
    let data = common::random_bytes(10_000, 13);
    ppm_roundtrip(&data);
}

#[test]
fn ppm_roundtrip_repetitive() {
    let mut data = Vec::new();
    for i in 0..30_000u32 {
        data.push((i % 7) as u8);
    }
    ppm_roundtrip(&data);
}

fn ppm_roundtrip(data: &[u8]) {
    let mut model = PpmModel::new();
    let mut enc = RangeEncoder::new();
    let mut out = Vec::new();
    for &byte in data {
        model.encode(&mut enc, byte, &mut out);
        model.update_context(byte);
    }
    enc.flush(&mut out);

    let mut model = PpmModel::new();
    let mut dec = RangeDecoder::new(&out).unwrap();
    let mut restored = Vec::with_capacity(data.len());
    for _ in 0..data.len() {
        let byte = model.decode(&mut dec).unwrap();
        model.update_context(byte);
        restored.push(byte);
    }
    assert!(restored == data);
}
