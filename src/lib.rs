//! roxide: a general-purpose lossless byte-stream compressor.
//!
//! Three interoperable pipeline variants share one statistical back-end:
//!
//! - [`rolz`]: reduced-offset LZ, matches addressed by per-context ring slot;
//! - [`lz77`]: long-range LZ over a block-wide hash-chain index;
//! - [`lzp`]: single-prediction LZ, lengths only.
//!
//! All three feed a PPM context model ([`ppm`]) into a carry-propagating
//! range coder ([`rangecoder`]), behind a static dictionary substitution
//! stage ([`dict`]) and optional executable/bitmap content filters
//! ([`filter`]). [`frame`] ties the stages into the container format.
//!
//! The usual entry points are [`encode_stream`] and [`decode_stream`]:
//!
//! ```no_run
//! use std::io::Cursor;
//!
//! let mut src = Cursor::new(b"example data".to_vec());
//! let mut dst = Vec::new();
//! roxide::encode_stream(&mut src, &mut dst, &roxide::EncodeOptions::default())?;
//!
//! let mut round = Vec::new();
//! roxide::decode_stream(&mut Cursor::new(dst), &mut round)?;
//! # Ok::<(), roxide::StreamError>(())
//! ```

pub mod dict;
pub mod display;
pub mod error;
pub mod filter;
pub mod frame;
pub mod lz77;
pub mod lzp;
pub mod model;
pub mod pool;
pub mod ppm;
pub mod rangecoder;
pub mod rolz;
pub mod util;

pub use error::{FormatError, StreamError};
pub use frame::{decode_stream, encode_stream, EncodeOptions, Stats, Variant};

/// Knobs shared by all three block coders.
#[derive(Debug, Clone, Copy)]
pub struct CoderConfig {
    /// Look-ahead match selection instead of the cheaper lazy heuristic.
    pub flexible_parsing: bool,
    /// Run match finding / symbol prefetch on a background worker. Output
    /// bytes are identical either way.
    pub threaded: bool,
}

impl Default for CoderConfig {
    fn default() -> Self {
        CoderConfig {
            flexible_parsing: false,
            threaded: num_cpus::get() > 1,
        }
    }
}
