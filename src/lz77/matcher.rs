//! Hash-chain match finder over a whole block.
//!
//! Index construction is a two-pass bucket sort. Pass one threads every
//! position with a full lookahead window through a handful of top-level
//! buckets keyed by a 2-byte hash, inserting from the end of the block so
//! each chain comes out oldest-to-newest. Pass two re-threads each
//! top-level chain through a second-level bucket array keyed by a
//! `match_min`-byte hash; two workers split the top-level buckets by
//! parity. The final `next[]` array is what lookups walk, newest first.
//!
//! A 64 Ki-entry short cache (one position per 6-byte hash) backs the
//! short-match fallback for distances under 256 bytes.

use super::{BUCKET1_SIZE, MATCH_LIMIT, MATCH_MAX, MATCH_MIN_NEAR, TAIL_GUARD};

/// Literal marker in [`MatchRet::pos`].
pub const NO_POS: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRet {
    pub pos: u32,
    pub len: u32,
}

impl MatchRet {
    #[inline]
    pub fn literal() -> Self {
        MatchRet { pos: NO_POS, len: 1 }
    }
}

#[inline]
fn hash1(data: &[u8], pos: usize) -> usize {
    (data[pos] as usize + data[pos + 1] as usize) % BUCKET1_SIZE
}

#[inline]
fn hash2(data: &[u8], pos: usize, match_min: usize) -> u32 {
    let mut hash = 0u32;
    for &b in &data[pos..pos + match_min] {
        hash = hash.wrapping_mul(123_456_791) ^ u32::from(b);
    }
    hash
}

#[inline]
fn short_hash(data: &[u8], pos: usize) -> usize {
    let mut hash = 0u32;
    for &b in &data[pos..pos + MATCH_MIN_NEAR] {
        hash = hash.wrapping_mul(123_456_791) ^ u32::from(b);
    }
    hash as usize % 65536
}

/// `floor(log2(x))`, with -1 for zero; feeds the distance price.
#[inline]
fn fast_log2(x: u32) -> i64 {
    if x == 0 {
        -1
    } else {
        i64::from(31 - x.leading_zeros() as i32)
    }
}

/// Shared handle for the pass-two workers: each position is written by
/// exactly one worker because it belongs to exactly one top-level bucket.
struct NextTable(*mut u32);
// SAFETY: disjoint index sets per worker; see `build_chains`.
unsafe impl Send for NextTable {}
unsafe impl Sync for NextTable {}

pub struct Lz77Matcher {
    next: Vec<u32>,
    short_cache: Vec<u32>,
    last_match: u32,
    ret_cache: Vec<MatchRet>,
    ret_start: usize,
    ret_end: usize,
    match_min: usize,
    flexible: bool,
}

impl Lz77Matcher {
    /// Builds the full index for `data`; the dominant setup cost of the
    /// LZ77 encoder.
    pub fn new(data: &[u8], match_min: usize, flexible: bool) -> Self {
        let len = data.len();
        let mut matcher = Lz77Matcher {
            next: vec![NO_POS; len],
            short_cache: vec![0; 65536],
            last_match: 0,
            ret_cache: vec![MatchRet { pos: 0, len: 0 }; MATCH_MAX + 5],
            ret_start: 0,
            ret_end: 0,
            match_min,
            flexible,
        };
        matcher.build_chains(data);
        matcher
    }

    fn build_chains(&mut self, data: &[u8]) {
        let len = data.len();
        let bucket2_size = BUCKET1_SIZE + len / 25;
        let mut bucket1 = [NO_POS; BUCKET1_SIZE];

        // pass one: newest positions end up deepest so that pass two can
        // walk each chain oldest-to-newest
        for pos in (0..len.saturating_sub(MATCH_MAX)).rev() {
            let h = hash1(data, pos);
            self.next[pos] = bucket1[h];
            bucket1[h] = pos as u32;
        }

        // pass two: re-thread through the second-level buckets, splitting
        // top-level buckets across two workers by parity
        let next = NextTable(self.next.as_mut_ptr());
        let match_min = self.match_min;
        let rethread = |parity: usize| {
            let next = &next;
            let mut bucket2 = vec![NO_POS; bucket2_size];
            for b in (parity..BUCKET1_SIZE).step_by(2) {
                for slot in bucket2.iter_mut() {
                    *slot = NO_POS;
                }
                let mut pos = bucket1[b];
                while pos != NO_POS {
                    let p = pos as usize;
                    let h = (hash2(data, p, match_min) as usize) % bucket2_size;
                    // SAFETY: `p` is in a chain of top-level bucket `b`,
                    // and no position appears in two top-level buckets, so
                    // the parity split makes these accesses disjoint.
                    let following = unsafe { *next.0.add(p) };
                    unsafe { *next.0.add(p) = bucket2[h] };
                    bucket2[h] = pos;
                    pos = following;
                }
            }
        };
        rayon::join(|| rethread(0), || rethread(1));
    }

    /// Records a consumed position in the short cache.
    #[inline]
    pub fn update_cache(&mut self, data: &[u8], pos: usize) {
        self.short_cache[short_hash(data, pos)] = pos as u32;
    }

    /// Walks the chain at `pos` for the longest match. Longer distances
    /// must beat the incumbent by a small price margin, and a candidate is
    /// confirmed by re-comparing the incumbent-length prefix. In lazy mode
    /// the walk stops at the first improvement.
    fn chain_match(
        &self,
        data: &[u8],
        pos: usize,
        min_len: usize,
        limit: usize,
        lazy: bool,
    ) -> MatchRet {
        let mut ret = MatchRet {
            pos: 0,
            len: (min_len - 1) as u32,
        };
        let mut node = self.next[pos];
        let mut walked = 0;
        while walked < limit && node != NO_POS {
            let n = node as usize;
            let mut new_len = ret.len as usize;
            while new_len < MATCH_MAX && data[n + new_len] == data[pos + new_len] {
                new_len += 1;
            }

            let best_dist = pos - ret.pos as usize;
            let mut price = 0usize;
            price += usize::from((pos - n) / 1_048_576 > best_dist);
            price += usize::from((pos - n) / 4096 > best_dist);
            price += usize::from((pos - n) / 64 > best_dist);

            let keep = ret.len as usize;
            if new_len > keep + price && data[pos..pos + keep] == data[n..n + keep] {
                ret.pos = node;
                ret.len = new_len as u32;
                if (lazy && ret.pos > 1) || new_len == MATCH_MAX {
                    return ret;
                }
            }
            node = self.next[n];
            walked += 1;
        }
        if (ret.len as usize) < min_len {
            return MatchRet::literal();
        }
        ret
    }

    /// Full lookup at `pos`. The caller guarantees `TAIL_GUARD` bytes of
    /// lookahead past `pos`.
    pub fn lookup(&mut self, data: &[u8], pos: usize) -> MatchRet {
        debug_assert!(pos + TAIL_GUARD < data.len());

        // repeat-offset probe first: re-using the previous distance saves
        // several distance bytes over a fresh one
        let mut repeat = MatchRet { pos: 0, len: 0 };
        let lm = self.last_match as usize;
        if lm > 0 && lm <= pos {
            let rp = pos - lm;
            repeat.pos = rp as u32;
            let mut i = 0;
            while i < MATCH_MAX && data[pos + i] == data[rp + i] {
                i += 1;
            }
            repeat.len = i as u32;
        }

        let match_min = self.match_min;
        let mut ret;
        if self.flexible {
            ret = self.flexible_lookup(data, pos);
        } else {
            ret = self.chain_match(data, pos, match_min, MATCH_LIMIT, false);
            if ret.len as usize >= match_min {
                let probe = self.chain_match(data, pos + 1, ret.len as usize + 1, MATCH_LIMIT / 4, true);
                let better_at_next =
                    probe.len > ret.len + u32::from(probe.pos < ret.pos);
                if better_at_next
                    || self.chain_match(data, pos + 2, ret.len as usize + 1, MATCH_LIMIT / 8, true).len > 1
                    || self.chain_match(data, pos + 3, ret.len as usize + 2, MATCH_LIMIT / 8, true).len > 1
                    || self.chain_match(data, pos + 4, ret.len as usize + 2, MATCH_LIMIT / 8, true).len > 1
                    || self.chain_match(data, pos + 5, ret.len as usize + 2, MATCH_LIMIT / 8, true).len > 1
                    || self.chain_match(data, pos + 6, ret.len as usize + 3, MATCH_LIMIT / 8, true).len > 1
                {
                    ret = MatchRet::literal();
                }
            }
        }

        if ret.pos != NO_POS {
            let bonus = u32::from((ret.pos as usize) + 64 < pos)
                + u32::from((ret.pos as usize) + 4096 < pos)
                + u32::from((ret.pos as usize) + 1_048_576 < pos);
            if ret.len < repeat.len + 3 + bonus {
                ret = repeat;
            }
        }

        // short-match fallback: a nearby position from the 6-byte cache
        if (ret.len as usize) < MATCH_MIN_NEAR {
            let cached = self.short_cache[short_hash(data, pos)];
            ret.pos = cached;
            ret.len = 0;
            let c = cached as usize;
            if c < pos && c + 256 > pos {
                let mut i = 0;
                while i < MATCH_MAX && data[c + i] == data[pos + i] {
                    i += 1;
                }
                ret.len = i as u32;
            }
        }

        if (ret.len as usize) < MATCH_MIN_NEAR
            || ((ret.len as usize) < match_min && ret.pos as usize + 256 <= pos)
        {
            return MatchRet::literal();
        }
        self.last_match = (pos - ret.pos as usize) as u32;
        ret
    }

    /// Look-ahead parse: pick the split of "match now, match after" with the
    /// best combined bit price. Results for upcoming positions are kept in a
    /// sliding cache so each position is searched once.
    fn flexible_lookup(&mut self, data: &[u8], pos: usize) -> MatchRet {
        let match_min = self.match_min;
        if self.ret_end <= pos {
            self.ret_cache[0] = self.chain_match(data, pos, match_min, MATCH_LIMIT, false);
            self.ret_start = pos;
            self.ret_end = pos + 1;
        } else {
            let shift = pos - self.ret_start;
            let live = self.ret_end - pos;
            self.ret_cache.copy_within(shift..shift + live, 0);
            self.ret_start = pos;
        }

        let first = self.ret_cache[0];
        let mut ret = first;
        if (first.len as usize) < match_min {
            return ret;
        }

        let price = |p: u32, l: u32| -> i64 {
            if l as usize >= match_min {
                3 * (i64::from(l) - 1) - fast_log2((pos as u32).wrapping_sub(p)) * 4 / 5
            } else {
                9
            }
        };

        for i in 1..=first.len as usize {
            if self.ret_end <= pos + i {
                self.ret_cache[i] = self.chain_match(data, pos + i, match_min, MATCH_LIMIT, false);
                self.ret_end += 1;
            }
        }

        let tail = self.ret_cache[first.len as usize];
        let mut best = price(first.pos, first.len) + price(tail.pos, tail.len);
        for i in (1..first.len).rev() {
            let after = self.ret_cache[i as usize];
            let split = price(ret.pos, i) + price(after.pos, after.len);
            if best < split {
                ret.len = i;
                best = split;
            }
        }
        if (ret.len as usize) < match_min {
            return MatchRet::literal();
        }
        ret
    }
}
