//! LZP pipeline variant: single-prediction LZ over the shared PPM back-end.
//!
//! The matcher proposes exactly one candidate position per context, so only
//! the match length is coded; the decoder re-derives the position from its
//! own reconstructed output. Everything travels through the one PPM main
//! stream, which keeps this variant small and memory-light next to ROLZ and
//! LZ77.

mod coder;
mod matcher;

pub use coder::LzpCodec;
pub use matcher::LzpMatcher;

/// Shortest codable match.
pub const MATCH_MIN: usize = 4;
/// Longest codable match.
pub const MATCH_MAX: usize = 255;

/// Match lengths per encoder pool.
pub(crate) const MATCH_POOL: usize = 32000;
/// The matcher never looks this close to the end of the block.
pub(crate) const TAIL_GUARD: usize = 1024;
