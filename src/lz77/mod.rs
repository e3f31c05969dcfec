//! LZ77 pipeline variant: long-range matching over a block-wide hash-chain
//! index, with distances range-coded in skewed digit models.
//!
//! The index is built up front in two bucket passes over the whole block, so
//! match search is a bounded chain walk with no insertion cost on the coder
//! path. Distances travel in their own substream next to separate length
//! and short-distance substreams; the PPM main stream carries literals and
//! the match marker.

mod coder;
mod matcher;

pub use coder::Lz77Codec;
pub use matcher::{Lz77Matcher, MatchRet, NO_POS};

/// Longest codable match.
pub const MATCH_MAX: usize = 255;
/// Matches shorter than this use the short-distance substream.
pub const MATCH_MIN_NEAR: usize = 6;
/// Chain nodes examined per lookup.
pub const MATCH_LIMIT: usize = 40;
/// Top-level bucket count for the index build.
pub const BUCKET1_SIZE: usize = 20;

/// Blocks above this size use `match_min` 11 instead of 10.
pub const BIG_BLOCK: usize = 16 * 1024 * 1024;

/// Match tuples per encoder pool.
pub(crate) const MATCH_POOL: usize = 32000;
/// Prefetched short distances per decoder pool.
pub(crate) const SPOS_QUEUE: usize = 24000;
/// Prefetched distances per decoder pool.
pub(crate) const POS_QUEUE: usize = 12000;
/// Prefetched lengths per decoder pool.
pub(crate) const LEN_QUEUE: usize = 24000;
/// The matcher never looks this close to the end of the block.
pub(crate) const TAIL_GUARD: usize = 1024;
