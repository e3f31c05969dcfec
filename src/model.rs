//! Adaptive frequency models for the range coder.
//!
//! Two table shapes share the same summary-table discipline: a 256-symbol
//! order-0 model ([`Model`]) used for lengths, indices and positions, and a
//! 258-symbol order-2 model ([`O2Model`]) whose two extra slots carry the
//! order-3 "predictor hit" and the order-2 escape. Both keep a 9-entry
//! cumulative summary (one entry per 32-symbol stride plus the running
//! total) so symbol resolution is a stride search plus a short linear scan.

use crate::error::FormatError;
use crate::rangecoder::{RangeDecoder, RangeEncoder};

/// Virtual order-2 symbol: the order-3 predictor matched.
pub const SYM_HIT: usize = 256;
/// Virtual order-2 symbol: escape to the order-1 model.
pub const SYM_ESCAPE: usize = 257;

// ─────────────────────────────────────────────────────────────────────────────
// Order-0 model
// ─────────────────────────────────────────────────────────────────────────────

/// 256-symbol adaptive model with 16-bit counters.
///
/// Invariants: `cum_table[i] == Σ frq_table[0..32*i]` for `i` in `0..=8`;
/// `cum_table[8]` is the total. When the total exceeds 32000 every counter is
/// halved as `(f + 1) / 2`, so non-zero frequencies stay non-zero.
pub struct Model {
    frq_table: [u16; 256],
    cum_table: [u16; 9],
}

impl Model {
    /// Uniform start: every symbol at frequency 1.
    pub fn new() -> Self {
        Self::with_frq(|_| 1)
    }

    /// Builds a model with per-symbol initial frequencies. Symbols mapped to
    /// zero can never be coded until something updates them.
    pub fn with_frq(init: impl Fn(usize) -> u16) -> Self {
        let mut m = Model {
            frq_table: [0; 256],
            cum_table: [0; 9],
        };
        for (sym, f) in m.frq_table.iter_mut().enumerate() {
            *f = init(sym);
        }
        m.recalc_cum();
        m
    }

    fn recalc_cum(&mut self) {
        let mut cum = 0u16;
        for sym in 0..256 {
            if sym % 32 == 0 {
                self.cum_table[sym / 32] = cum;
            }
            cum += self.frq_table[sym];
        }
        self.cum_table[8] = cum;
    }

    #[inline]
    pub fn frq(&self, sym: usize) -> u32 {
        u32::from(self.frq_table[sym])
    }

    /// Cumulative frequency up to but excluding `sym`.
    pub fn cum(&self, sym: usize) -> u32 {
        let base = sym / 32;
        let mut cum = u32::from(self.cum_table[base]);
        for s in base * 32..sym {
            cum += u32::from(self.frq_table[s]);
        }
        cum
    }

    #[inline]
    pub fn sum(&self) -> u32 {
        u32::from(self.cum_table[8])
    }

    /// Adds `inc` to `sym`; returns whether the table was rescaled.
    pub fn update(&mut self, sym: usize, inc: u16) -> bool {
        self.frq_table[sym] += inc;
        for i in sym / 32 + 1..=8 {
            self.cum_table[i] += inc;
        }
        if self.sum() > 32000 {
            for f in self.frq_table.iter_mut() {
                *f = (*f + 1) / 2;
            }
            self.recalc_cum();
            return true;
        }
        false
    }

    /// Resolves the symbol spanning the cumulative value `target`.
    /// Returns `None` when `target` is at or past the total.
    pub fn decode_symbol(&self, target: u32) -> Option<(usize, u32)> {
        if target >= self.sum() {
            return None;
        }
        let mut stride = 0;
        for i in (0..8).rev() {
            if u32::from(self.cum_table[i]) <= target {
                stride = i;
                break;
            }
        }
        let mut sym = stride * 32;
        let mut cum = u32::from(self.cum_table[stride]);
        while cum + self.frq(sym) <= target {
            cum += self.frq(sym);
            sym += 1;
        }
        Some((sym, cum))
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes `sym` under `model` and applies the adaptive increment.
#[inline]
pub fn encode_with(
    enc: &mut RangeEncoder,
    out: &mut Vec<u8>,
    model: &mut Model,
    sym: usize,
    inc: u16,
) {
    enc.encode(model.cum(sym), model.frq(sym), model.sum(), out);
    model.update(sym, inc);
}

/// Decodes one symbol under `model` and applies the adaptive increment.
pub fn decode_with(
    dec: &mut RangeDecoder<'_>,
    model: &mut Model,
    inc: u16,
) -> Result<usize, FormatError> {
    let target = dec.decode_cum(model.sum());
    let (sym, cum) = model
        .decode_symbol(target)
        .ok_or(FormatError::InvalidSymbol)?;
    dec.decode(cum, model.frq(sym))?;
    model.update(sym, inc);
    Ok(sym)
}

// ─────────────────────────────────────────────────────────────────────────────
// Order-2 model
// ─────────────────────────────────────────────────────────────────────────────

/// 258-symbol model with byte-wide counters: slots 0..=255 are literals,
/// slot 256 the predictor hit, slot 257 the escape.
///
/// Literal slots start at zero (`frq(c) > 0` means "seen in this context");
/// the two virtual slots start at one so an empty context can still code.
/// `cum_table[8]` covers the 256 literal slots only; [`O2Model::sum`] adds
/// the virtual slots on top. Rescale triggers when a counter saturates or
/// the sum passes 16000 and keeps non-zero frequencies non-zero.
pub struct O2Model {
    frq_table: [u8; 258],
    cum_table: [u16; 9],
}

impl O2Model {
    pub fn new() -> Self {
        let mut m = O2Model {
            frq_table: [0; 258],
            cum_table: [0; 9],
        };
        m.frq_table[SYM_HIT] = 1;
        m.frq_table[SYM_ESCAPE] = 1;
        m
    }

    #[inline]
    pub fn frq(&self, sym: usize) -> u32 {
        u32::from(self.frq_table[sym])
    }

    /// Cumulative frequency up to but excluding `sym`; the virtual slots
    /// follow the full literal range.
    pub fn cum(&self, sym: usize) -> u32 {
        if sym >= 256 {
            let mut cum = u32::from(self.cum_table[8]);
            if sym == SYM_ESCAPE {
                cum += self.frq(SYM_HIT);
            }
            return cum;
        }
        let base = sym / 32;
        let mut cum = u32::from(self.cum_table[base]);
        for s in base * 32..sym {
            cum += u32::from(self.frq_table[s]);
        }
        cum
    }

    #[inline]
    pub fn sum(&self) -> u32 {
        u32::from(self.cum_table[8]) + self.frq(SYM_HIT) + self.frq(SYM_ESCAPE)
    }

    /// Adds `inc` (+1 or the escape estimator's -1) to `sym`; returns whether
    /// the table was rescaled. The escape slot never drops below 1, and a
    /// decrement never triggers a rescale.
    pub fn update(&mut self, sym: usize, inc: i32) -> bool {
        if inc < 0 {
            if self.frq_table[sym] <= 1 {
                return false;
            }
            self.frq_table[sym] -= 1;
            if sym < 256 {
                for i in sym / 32 + 1..=8 {
                    self.cum_table[i] -= 1;
                }
            }
            return false;
        }
        self.frq_table[sym] += inc as u8;
        if sym < 256 {
            for i in sym / 32 + 1..=8 {
                self.cum_table[i] += inc as u16;
            }
        }
        if self.frq_table[sym] >= 255 || self.sum() > 16000 {
            self.rescale();
            return true;
        }
        false
    }

    fn rescale(&mut self) {
        for f in self.frq_table.iter_mut() {
            *f = ((u16::from(*f) + 1) / 2) as u8;
        }
        let mut cum = 0u16;
        for sym in 0..256 {
            if sym % 32 == 0 {
                self.cum_table[sym / 32] = cum;
            }
            cum += u16::from(self.frq_table[sym]);
        }
        self.cum_table[8] = cum;
    }

    /// Resolves the symbol spanning `target` in the reduced alphabet that
    /// omits `exclude` (always a literal slot). The returned cumulative value
    /// is in the reduced coordinate system, matching what the encoder emits
    /// when it subtracts the excluded frequency.
    pub fn decode_symbol_excluding(
        &self,
        target: u32,
        exclude: usize,
    ) -> Option<(usize, u32)> {
        let exf = self.frq(exclude);
        let eff = |i: usize| -> u32 {
            let c = u32::from(self.cum_table[i]);
            if exclude < i * 32 {
                c - exf
            } else {
                c
            }
        };
        let mut stride = 0;
        for i in (0..8).rev() {
            if eff(i) <= target {
                stride = i;
                break;
            }
        }
        let mut sym = stride * 32;
        let mut cum = eff(stride);
        while sym < 258 {
            if sym != exclude {
                let f = self.frq(sym);
                if cum + f > target {
                    return Some((sym, cum));
                }
                cum += f;
            }
            sym += 1;
        }
        None
    }
}

impl Default for O2Model {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_summary(m: &Model) {
        let mut cum = 0u32;
        for sym in 0..256 {
            if sym % 32 == 0 {
                assert_eq!(u32::from(m.cum_table[sym / 32]), cum);
            }
            cum += m.frq(sym);
        }
        assert_eq!(m.sum(), cum);
    }

    #[test]
    fn summary_tracks_updates() {
        let mut m = Model::new();
        for i in 0..2000 {
            m.update((i * 37) % 256, 17);
            assert_summary(&m);
        }
    }

    #[test]
    fn rescale_preserves_nonzero() {
        let mut m = Model::with_frq(|s| u16::from(s % 3 == 0));
        for _ in 0..400 {
            m.update(0, 100);
        }
        for sym in 0..256 {
            assert_eq!(m.frq(sym) > 0, sym % 3 == 0, "symbol {}", sym);
        }
        assert_summary(&m);
    }

    #[test]
    fn decode_symbol_inverts_cum() {
        let mut m = Model::new();
        for i in 0..500 {
            m.update((i * 11) % 256, 4);
        }
        for sym in (0..256).step_by(7) {
            let (got, cum) = m.decode_symbol(m.cum(sym)).unwrap();
            assert_eq!(got, sym);
            assert_eq!(cum, m.cum(sym));
        }
        assert!(m.decode_symbol(m.sum()).is_none());
    }

    #[test]
    fn o2_exclusion_skips_symbol() {
        let mut m = O2Model::new();
        for sym in [10usize, 10, 10, 40, 40, 70, 255] {
            m.update(sym, 1);
        }
        let exclude = 40;
        let reduced_sum = m.sum() - m.frq(exclude);
        let mut expect = Vec::new();
        for sym in (0..258).filter(|&s| s != exclude) {
            for _ in 0..m.frq(sym) {
                expect.push(sym);
            }
        }
        for (target, &want) in expect.iter().enumerate() {
            let (sym, cum) = m
                .decode_symbol_excluding(target as u32, exclude)
                .unwrap();
            assert_eq!(sym, want);
            assert!(cum as usize <= target);
        }
        assert!(m
            .decode_symbol_excluding(reduced_sum, exclude)
            .is_none());
    }
}
