//! Full-container round trips across the three variants.

mod common;

use common::{random_bytes, roundtrip, synthetic_text};
use roxide::{EncodeOptions, Variant};

fn opts(variant: Variant) -> EncodeOptions {
    EncodeOptions {
        variant,
        ..EncodeOptions::default()
    }
}

const VARIANTS: [Variant; 3] = [Variant::Rolz, Variant::Lz77, Variant::Lzp];

#[test]
fn empty_input() {
    for variant in VARIANTS {
        let compressed = roundtrip(b"", &opts(variant));
        // magic + dictionary stream, no blocks
        assert!(compressed > 0);
    }
}

#[test]
fn single_byte() {
    for variant in VARIANTS {
        roundtrip(b"A", &opts(variant));
    }
}

#[test]
fn tiny_inputs() {
    for variant in VARIANTS {
        for len in [2usize, 3, 9, 15, 16, 17, 40, 41, 42, 100] {
            let data = synthetic_text(len, len as u64);
            roundtrip(&data, &opts(variant));
        }
    }
}

#[test]
fn zeros_compress_tightly() {
    let data = vec![0u8; 1 << 20];
    for variant in [Variant::Rolz, Variant::Lz77] {
        let compressed = roundtrip(&data, &opts(variant));
        assert!(
            compressed < 4096,
            "{:?}: 1 MiB of zeros took {} bytes",
            variant,
            compressed
        );
    }
    roundtrip(&data, &opts(Variant::Lzp));
}

#[test]
fn text_all_variants() {
    let data = synthetic_text(300_000, 42);
    for variant in VARIANTS {
        let compressed = roundtrip(&data, &opts(variant));
        assert!(
            compressed < data.len(),
            "{:?} failed to compress text",
            variant
        );
    }
}

#[test]
fn text_flexible_parsing() {
    let data = synthetic_text(120_000, 43);
    for variant in [Variant::Rolz, Variant::Lz77] {
        let mut options = opts(variant);
        options.coder.flexible_parsing = true;
        roundtrip(&data, &options);
    }
}

/// Incompressible blocks take the raw fallback; a compressible block after
/// a raw one still decodes (models resynchronize via the reset-on-raw rule).
#[test]
fn raw_fallback_then_compressible() {
    let mut data = random_bytes(64 * 1024, 5);
    data.extend_from_slice(&synthetic_text(64 * 1024, 6));
    for variant in VARIANTS {
        let mut options = opts(variant);
        options.block_size = 64 * 1024;
        roundtrip(&data, &options);
    }
}

/// Every byte value equally frequent: the escape byte then appears in the
/// data, exercising the zero-length marker path.
#[test]
fn escape_byte_collisions() {
    let mut data = Vec::new();
    for round in 0..40u32 {
        for byte in 0..=255u8 {
            data.push(byte.wrapping_add(round as u8));
        }
    }
    for variant in VARIANTS {
        roundtrip(&data, &opts(variant));
    }
}

#[test]
fn multi_block_stream() {
    let data = synthetic_text(300_000, 44);
    for variant in VARIANTS {
        let mut options = opts(variant);
        options.block_size = 64 * 1024;
        roundtrip(&data, &options);
    }
}

#[test]
fn precompress_only() {
    let data = synthetic_text(100_000, 45);
    for variant in VARIANTS {
        let mut options = opts(variant);
        options.precompress_only = true;
        let compressed = roundtrip(&data, &options);
        assert!(compressed < data.len());
    }
}

/// Match-finding parallelism never changes the output bytes.
#[test]
fn threaded_output_identical() {
    let data = synthetic_text(150_000, 46);
    for variant in VARIANTS {
        let mut threaded = opts(variant);
        threaded.coder.threaded = true;
        let mut inline = opts(variant);
        inline.coder.threaded = false;

        let mut out_threaded = Vec::new();
        let mut out_inline = Vec::new();
        roxide::display::set_display_level(0);
        roxide::encode_stream(
            &mut std::io::Cursor::new(data.clone()),
            &mut out_threaded,
            &threaded,
        )
        .unwrap();
        roxide::encode_stream(
            &mut std::io::Cursor::new(data.clone()),
            &mut out_inline,
            &inline,
        )
        .unwrap();
        assert!(out_threaded == out_inline, "{:?} output differs", variant);
    }
}

#[test]
fn truncated_stream_is_rejected() {
    let data = synthetic_text(50_000, 47);
    roxide::display::set_display_level(0);
    let mut compressed = Vec::new();
    roxide::encode_stream(
        &mut std::io::Cursor::new(data),
        &mut compressed,
        &opts(Variant::Lz77),
    )
    .unwrap();

    compressed.truncate(compressed.len() / 2);
    let mut out = Vec::new();
    assert!(roxide::decode_stream(&mut std::io::Cursor::new(compressed), &mut out).is_err());
}

#[test]
fn garbage_magic_is_rejected() {
    let mut out = Vec::new();
    let err = roxide::decode_stream(&mut std::io::Cursor::new(vec![0u8; 64]), &mut out);
    assert!(err.is_err());
}
