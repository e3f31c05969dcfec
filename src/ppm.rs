//! PPM composite model over 8-bit symbols.
//!
//! Three cooperating predictors feed the range coder:
//!
//! - an order-2 model per 2-byte context (lazily allocated in an arena),
//!   holding literal frequencies plus the hit/escape virtual slots;
//! - an order-1 fallback, one byte-counter row per 1-byte context, used when
//!   the order-2 context has never seen the byte;
//! - an order-3 single-byte predictor: a packed table keyed by a folded
//!   22-bit context, guessing one byte with a 4-bit confidence counter.
//!
//! Every byte is coded through the order-2 context with the predicted byte
//! excluded from the alphabet. A predictor hit costs one virtual symbol;
//! an unseen byte escapes to order-1 with all order-2-known bytes excluded,
//! and its order-2 slot is seeded afterwards so the escape is paid only
//! once per byte per context. Encoder and decoder that have consumed the
//! same prefix hold bit-identical state.

use crate::error::FormatError;
use crate::model::{O2Model, SYM_ESCAPE, SYM_HIT};
use crate::rangecoder::{RangeDecoder, RangeEncoder};

/// Packed order-3 table: 1.5 bytes per folded 22-bit context.
const O3_TABLE_SIZE: usize = 6_291_456;

/// No order-2 model allocated for this context yet.
const O2_NONE: u32 = u32::MAX;

/// Effective order-1 frequency: counters are byte-wide, stretched so a
/// fresh context still separates seen from unseen bytes.
#[inline]
fn freq_o1(counter: u8) -> u32 {
    u32::from(counter) * 8 - 7
}

pub struct PpmModel {
    /// 256 rows of 256 byte counters, all starting at 1.
    o1: Vec<u8>,
    /// Arena slot per 2-byte context, `O2_NONE` until first use.
    o2_slots: Vec<u32>,
    o2_arena: Vec<O2Model>,
    /// Packed predicted-byte + confidence-nibble records.
    o3: Vec<u8>,
    /// Rolling context register; low 16 bits key o2, low 8 bits key o1.
    context: u32,
}

impl PpmModel {
    pub fn new() -> Self {
        PpmModel {
            o1: vec![1u8; 256 * 256],
            o2_slots: vec![O2_NONE; 65536],
            o2_arena: Vec::new(),
            o3: vec![0u8; O3_TABLE_SIZE],
            context: 0,
        }
    }

    /// Shifts one consumed byte into the context register.
    #[inline]
    pub fn update_context(&mut self, c: u8) {
        self.context = (self.context << 8) | u32::from(c);
    }

    /// Number of order-2 contexts materialized so far.
    pub fn o2_contexts(&self) -> usize {
        self.o2_arena.len()
    }

    #[inline]
    fn ctx3(&self) -> usize {
        ((self.context ^ (self.context >> 2)) & 0x3f_ffff) as usize
    }

    #[inline]
    fn predicted(&self) -> u8 {
        let ctx3 = self.ctx3();
        self.o3[ctx3 + ctx3 / 2]
    }

    /// Confidence bookkeeping for the order-3 predictor. `None` marks a hit;
    /// a miss downgrades the counter stepwise and replaces the predicted
    /// byte once confidence is exhausted.
    fn update_o3(&mut self, miss: Option<u8>) {
        let ctx3 = self.ctx3();
        let base = ctx3 + ctx3 / 2;
        let tn = (!ctx3) & 1;
        let shift = 4 * tn as u8;
        let pn = base + 1 + tn;
        let mut freq = (self.o3[pn] >> shift) & 0x0f;
        match miss {
            Some(c) => {
                freq = u8::from(freq > 1)
                    + u8::from(freq > 2)
                    + u8::from(freq > 4)
                    + u8::from(freq > 8);
                if freq == 0 {
                    self.o3[base] = c;
                    freq = 1;
                }
            }
            None => freq += u8::from(freq < 15),
        }
        self.o3[pn] &= 0xf0u8 >> shift;
        self.o3[pn] |= freq << shift;
    }

    fn o2_index(&mut self, ctx2: usize) -> usize {
        let slot = self.o2_slots[ctx2];
        if slot != O2_NONE {
            return slot as usize;
        }
        self.o2_arena.push(O2Model::new());
        let idx = self.o2_arena.len() - 1;
        self.o2_slots[ctx2] = idx as u32;
        idx
    }

    fn bump_o1(&mut self, ctx1: usize, c: usize) {
        let row = &mut self.o1[ctx1 * 256..ctx1 * 256 + 256];
        row[c] += 1;
        if row[c] >= 255 {
            for f in row.iter_mut() {
                *f -= *f / 2;
            }
        }
    }

    /// Codes one byte. The context register is not advanced here; the caller
    /// feeds every consumed byte through [`Self::update_context`].
    pub fn encode(&mut self, enc: &mut RangeEncoder, c: u8, out: &mut Vec<u8>) {
        let ctx2 = (self.context & 0xffff) as usize;
        let ctx1 = (self.context & 0xff) as usize;
        let oi = self.o2_index(ctx2);
        let p = self.predicted();
        let pu = p as usize;
        let cu = c as usize;
        let fp = self.o2_arena[oi].frq(pu);

        if c == p {
            let o2 = &mut self.o2_arena[oi];
            enc.encode(o2.cum(SYM_HIT) - fp, o2.frq(SYM_HIT), o2.sum() - fp, out);
            o2.update(SYM_HIT, 1);
            self.update_o3(None);
            return;
        }

        if self.o2_arena[oi].frq(cu) > 0 {
            let o2 = &mut self.o2_arena[oi];
            let cum = o2.cum(cu) - if cu >= pu { fp } else { 0 };
            enc.encode(cum, o2.frq(cu), o2.sum() - fp, out);
            let rescaled = o2.update(cu, 1);
            if !rescaled && o2.frq(cu) == 2 {
                // ppmx escape estimator: the byte escaped once and came back
                o2.update(SYM_ESCAPE, -1);
            }
        } else {
            let rescaled = {
                let o2 = &mut self.o2_arena[oi];
                enc.encode(o2.cum(SYM_ESCAPE) - fp, o2.frq(SYM_ESCAPE), o2.sum() - fp, out);
                o2.update(SYM_ESCAPE, 1)
            };

            // order-1 fallback, excluding the predicted byte and every byte
            // the order-2 context already knows
            let mut cum = 0u32;
            let mut sum = 0u32;
            {
                let o2 = &self.o2_arena[oi];
                let row = &self.o1[ctx1 * 256..ctx1 * 256 + 256];
                for i in 0..256 {
                    if o2.frq(i) == 0 && i != pu {
                        let f = freq_o1(row[i]);
                        if i < cu {
                            cum += f;
                        }
                        sum += f;
                    }
                }
            }
            let fc = freq_o1(self.o1[ctx1 * 256 + cu]);
            enc.encode(cum, fc, sum, out);
            self.bump_o1(ctx1, cu);
            if !rescaled {
                self.o2_arena[oi].update(cu, 1);
            }
        }
        self.update_o3(Some(c));
    }

    /// Decodes one byte; the mirror image of [`Self::encode`].
    pub fn decode(&mut self, dec: &mut RangeDecoder<'_>) -> Result<u8, FormatError> {
        let ctx2 = (self.context & 0xffff) as usize;
        let ctx1 = (self.context & 0xff) as usize;
        let oi = self.o2_index(ctx2);
        let p = self.predicted();
        let pu = p as usize;
        let fp = self.o2_arena[oi].frq(pu);

        let (sym, rescaled) = {
            let o2 = &mut self.o2_arena[oi];
            let target = dec.decode_cum(o2.sum() - fp);
            let (sym, cum) = o2
                .decode_symbol_excluding(target, pu)
                .ok_or(FormatError::InvalidSymbol)?;
            dec.decode(cum, o2.frq(sym))?;
            let rescaled = o2.update(sym, 1);
            (sym, rescaled)
        };

        if sym == SYM_HIT {
            self.update_o3(None);
            return Ok(p);
        }

        if sym < 256 {
            let o2 = &mut self.o2_arena[oi];
            if !rescaled && o2.frq(sym) == 2 {
                o2.update(SYM_ESCAPE, -1);
            }
            self.update_o3(Some(sym as u8));
            return Ok(sym as u8);
        }

        // escape: decode under order-1 with the same exclusion set
        let mut sum = 0u32;
        {
            let o2 = &self.o2_arena[oi];
            let row = &self.o1[ctx1 * 256..ctx1 * 256 + 256];
            for i in 0..256 {
                if o2.frq(i) == 0 && i != pu {
                    sum += freq_o1(row[i]);
                }
            }
        }
        if sum == 0 {
            return Err(FormatError::InvalidSymbol);
        }
        let target = dec.decode_cum(sum);
        let (byte, cum, frq) = {
            let o2 = &self.o2_arena[oi];
            let row = &self.o1[ctx1 * 256..ctx1 * 256 + 256];
            let mut cum = 0u32;
            let mut found = None;
            for i in 0..256 {
                if o2.frq(i) == 0 && i != pu {
                    let f = freq_o1(row[i]);
                    if cum + f > target {
                        found = Some((i, cum, f));
                        break;
                    }
                    cum += f;
                }
            }
            found.ok_or(FormatError::InvalidSymbol)?
        };
        dec.decode(cum, frq)?;
        self.bump_o1(ctx1, byte);
        if !rescaled {
            self.o2_arena[oi].update(byte, 1);
        }
        self.update_o3(Some(byte as u8));
        Ok(byte as u8)
    }
}

impl Default for PpmModel {
    fn default() -> Self {
        Self::new()
    }
}
