//! Byte-granular carry-propagating range coder.
//!
//! The coder works on a `[low, low + range)` interval over 32-bit unsigned
//! integers and renormalizes one byte at a time. Carries that would
//! propagate through pending `0xFF` output bytes are deferred with a
//! `follow` counter instead of rewriting emitted bytes, so the output block
//! is strictly append-only.
//!
//! Contract: for any sequence of `(cum, frq, sum)` triples with `frq >= 1`
//! and `cum + frq <= sum`, feeding the encoder's output to the decoder
//! reproduces the same cumulative-frequency values, provided `range` never
//! falls below `sum` between renormalizations (all model sums in this crate
//! stay far below 2^24, which guarantees it).

use crate::error::FormatError;

const TOP: u32 = 1 << 24;
const THRESHOLD: u32 = 255u32 << 24;

/// Encoder half of the range coder. Output goes to a caller-owned block.
pub struct RangeEncoder {
    low: u32,
    range: u32,
    follow: u32,
    cache: u32,
    carry: u32,
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeEncoder {
    pub fn new() -> Self {
        RangeEncoder {
            low: 0,
            range: u32::MAX,
            follow: 0,
            cache: 0,
            carry: 0,
        }
    }

    /// Narrows the interval to the symbol spanning `[cum, cum + frq)` out of
    /// `sum` and renormalizes.
    pub fn encode(&mut self, cum: u32, frq: u32, sum: u32, out: &mut Vec<u8>) {
        self.range /= sum;
        let add = cum.wrapping_mul(self.range);
        self.carry += u32::from(self.low.wrapping_add(add) < self.low);
        self.low = self.low.wrapping_add(add);
        self.range = self.range.wrapping_mul(frq);
        while self.range < TOP {
            self.range = self.range.wrapping_mul(256);
            self.renormalize(out);
        }
    }

    fn renormalize(&mut self, out: &mut Vec<u8>) {
        if self.low < THRESHOLD || self.carry != 0 {
            out.push(self.cache.wrapping_add(self.carry) as u8);
            while self.follow > 0 {
                out.push(self.carry.wrapping_sub(1) as u8);
                self.follow -= 1;
            }
            self.cache = self.low >> 24;
            self.carry = 0;
        } else {
            self.follow += 1;
        }
        self.low = self.low.wrapping_mul(256);
    }

    /// Drains the interval state; exactly five renormalizations.
    pub fn flush(&mut self, out: &mut Vec<u8>) {
        for _ in 0..5 {
            self.renormalize(out);
        }
    }
}

/// Decoder half of the range coder, reading from a borrowed byte slice.
pub struct RangeDecoder<'a> {
    range: u32,
    cache: u32,
    input: &'a [u8],
    pos: usize,
}

impl<'a> RangeDecoder<'a> {
    /// Primes the decoder with five input bytes.
    pub fn new(input: &'a [u8]) -> Result<Self, FormatError> {
        let mut dec = RangeDecoder {
            range: u32::MAX,
            cache: 0,
            input,
            pos: 0,
        };
        for _ in 0..5 {
            let byte = dec.next_byte()?;
            dec.cache = dec.cache.wrapping_mul(256).wrapping_add(byte);
        }
        Ok(dec)
    }

    #[inline]
    fn next_byte(&mut self) -> Result<u32, FormatError> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or(FormatError::InsufficientInput)?;
        self.pos += 1;
        Ok(u32::from(byte))
    }

    /// Divides the interval by `sum` and returns the cumulative-frequency
    /// value the next symbol must span.
    #[inline]
    pub fn decode_cum(&mut self, sum: u32) -> u32 {
        self.range /= sum;
        self.cache / self.range
    }

    /// Consumes the symbol identified after [`Self::decode_cum`] and
    /// renormalizes from the input stream.
    pub fn decode(&mut self, cum: u32, frq: u32) -> Result<(), FormatError> {
        self.cache = self.cache.wrapping_sub(cum.wrapping_mul(self.range));
        self.range = self.range.wrapping_mul(frq);
        while self.range < TOP {
            let byte = self.next_byte()?;
            self.cache = self.cache.wrapping_mul(256).wrapping_add(byte);
            self.range = self.range.wrapping_mul(256);
        }
        Ok(())
    }
}
