//! ROLZ pipeline variant: reduced-offset LZ over the shared PPM back-end.
//!
//! Matches are coded as (length, ring-slot) pairs in a dedicated
//! range-coded index stream, while literals and the match marker go through
//! the PPM main stream. The decoder maintains the same context rings over
//! its reconstructed output, so a 4-bit-sized slot index is all it needs to
//! find the match position.

mod coder;
mod matcher;

pub use coder::RolzCodec;
pub use matcher::{MatchRet, RolzMatcher, NO_MATCH};

/// Long-table bucket count.
pub const ROLZ_BUCKETS: usize = 1 << 18;
/// Ring entries per long-table bucket.
pub const IDX_COUNT: usize = 16;
/// Entries per short-table bucket.
pub const IDX_COUNT_SHORT: usize = 4;
/// Shortest codable match.
pub const MATCH_MIN: usize = 4;
/// Longest codable match.
pub const MATCH_MAX: usize = 255;

/// Blocks at least this large hash four context bytes instead of three.
pub const CTX4_THRESHOLD: usize = 4 * 1024 * 1024;

/// Match tuples per encoder pool.
pub(crate) const MATCH_POOL: usize = 32000;
/// Prefetched (length, slot) pairs per decoder pool.
pub(crate) const IDX_QUEUE: usize = 10000;
/// The matcher never looks this close to the end of the block.
pub(crate) const TAIL_GUARD: usize = 1024;
