//! LZ77 block encoder/decoder.
//!
//! Block layout: `header || main || spos || pos || len`, with the offsets
//! and element counts of the three side streams in the header. The main
//! stream is PPM-coded; the side streams are range-coded under their own
//! models. Distances are pre-scaled by 8 and cut into base-128 then base-64
//! digits over a ladder of increasingly flat models; distance 0 is the
//! repeat-offset sentinel and short-match distances (< 256) go through a
//! single flat model instead.
//!
//! Model state persists across the blocks of a stream; raw-fallback blocks
//! reset it on both sides.

use std::thread;

use crate::display::Progress;
use crate::error::FormatError;
use crate::model::{decode_with, encode_with, Model};
use crate::pool::{PoolSource, Prefetcher};
use crate::ppm::PpmModel;
use crate::rangecoder::{RangeDecoder, RangeEncoder};
use crate::util::{find_escape, read_u32_le, write_u32_le};
use crate::CoderConfig;

use super::matcher::{Lz77Matcher, MatchRet, NO_POS};
use super::{BIG_BLOCK, LEN_QUEUE, MATCH_MAX, MATCH_MIN_NEAR, MATCH_POOL, POS_QUEUE, SPOS_QUEUE,
            TAIL_GUARD};

const HEADER_SIZE: usize = 31;

/// Update increment for the distance-digit model ladder: flatter (larger)
/// steps for the rarer high-order digits.
#[inline]
fn inc_factor(tier: usize) -> u16 {
    1 << (2 * tier)
}

#[derive(Default)]
struct BlockHeader {
    compressed: u8,
    match_min: u8,
    esc: u8,
    original_size: u32,
    num_spos: u32,
    num_pos: u32,
    num_len: u32,
    offset_spos: u32,
    offset_pos: u32,
    offset_len: u32,
}

impl BlockHeader {
    fn write(&self, buf: &mut [u8]) {
        buf[0] = self.compressed;
        buf[1] = self.match_min;
        buf[2] = self.esc;
        write_u32_le(buf, 3, self.original_size);
        write_u32_le(buf, 7, self.num_spos);
        write_u32_le(buf, 11, self.num_pos);
        write_u32_le(buf, 15, self.num_len);
        write_u32_le(buf, 19, self.offset_spos);
        write_u32_le(buf, 23, self.offset_pos);
        write_u32_le(buf, 27, self.offset_len);
    }

    fn parse(buf: &[u8]) -> Result<Self, FormatError> {
        if buf.len() < HEADER_SIZE {
            return Err(FormatError::TruncatedHeader);
        }
        Ok(BlockHeader {
            compressed: buf[0],
            match_min: buf[1],
            esc: buf[2],
            original_size: read_u32_le(buf, 3),
            num_spos: read_u32_le(buf, 7),
            num_pos: read_u32_le(buf, 11),
            num_len: read_u32_le(buf, 15),
            offset_spos: read_u32_le(buf, 19),
            offset_pos: read_u32_le(buf, 23),
            offset_len: read_u32_le(buf, 27),
        })
    }
}

/// Background producer of match decisions for the encoder.
struct MatchSource<'a> {
    matcher: Lz77Matcher,
    data: &'a [u8],
    pos: usize,
}

impl PoolSource for MatchSource<'_> {
    type Item = MatchRet;

    fn refill(&mut self, pool: &mut Vec<MatchRet>, limit: usize) -> Result<bool, FormatError> {
        while self.pos < self.data.len() && pool.len() < limit {
            let ret = if self.pos + TAIL_GUARD < self.data.len() {
                let ret = self.matcher.lookup(self.data, self.pos);
                for i in 0..ret.len as usize {
                    self.matcher.update_cache(self.data, self.pos + i);
                }
                ret
            } else {
                MatchRet::literal()
            };
            self.pos += ret.len as usize;
            pool.push(ret);
        }
        Ok(self.pos < self.data.len())
    }
}

/// Prefetches short distances (decoder side).
struct SposSource<'a> {
    dec: RangeDecoder<'a>,
    model: Model,
    remaining: u32,
}

impl PoolSource for SposSource<'_> {
    type Item = u32;

    fn refill(&mut self, pool: &mut Vec<u32>, limit: usize) -> Result<bool, FormatError> {
        while self.remaining > 0 && pool.len() < limit {
            self.remaining -= 1;
            pool.push(decode_with(&mut self.dec, &mut self.model, 1)? as u32);
        }
        Ok(self.remaining > 0)
    }
}

/// Prefetches full distances through the digit-model ladder (decoder side).
struct PosSource<'a> {
    dec: RangeDecoder<'a>,
    models: [Model; 6],
    remaining: u32,
}

impl PoolSource for PosSource<'_> {
    type Item = u32;

    fn refill(&mut self, pool: &mut Vec<u32>, limit: usize) -> Result<bool, FormatError> {
        while self.remaining > 0 && pool.len() < limit {
            self.remaining -= 1;

            let mut tier = 0usize;
            let mut value = 0u32;
            let mut digit = 0u32;
            while tier < 2 {
                digit = decode_with(&mut self.dec, &mut self.models[tier], inc_factor(tier))? as u32;
                if digit < 128 {
                    break;
                }
                value += (digit - 128) << (7 * tier);
                tier += 1;
            }
            if tier < 2 {
                pool.push((value + (digit << (7 * tier))) / 8);
                continue;
            }
            while tier < 5 {
                digit = decode_with(&mut self.dec, &mut self.models[tier], inc_factor(tier))? as u32;
                if digit < 64 {
                    break;
                }
                value += (digit - 64) << (6 * tier + 2);
                tier += 1;
            }
            // tier reaches 5 only on corrupt streams; the shift must stay defined
            pool.push(value.wrapping_add(digit.wrapping_shl((6 * tier + 2) as u32)) / 8);
        }
        Ok(self.remaining > 0)
    }
}

/// Prefetches match lengths (decoder side).
struct LenSource<'a> {
    dec: RangeDecoder<'a>,
    model: Model,
    remaining: u32,
}

impl PoolSource for LenSource<'_> {
    type Item = u32;

    fn refill(&mut self, pool: &mut Vec<u32>, limit: usize) -> Result<bool, FormatError> {
        while self.remaining > 0 && pool.len() < limit {
            self.remaining -= 1;
            pool.push(decode_with(&mut self.dec, &mut self.model, 30)? as u32);
        }
        Ok(self.remaining > 0)
    }
}

pub struct Lz77Codec {
    ppm: PpmModel,
    len_model: Model,
    pos_models: [Model; 6],
    spos_model: Model,
    config: CoderConfig,
}

impl Lz77Codec {
    pub fn new(config: CoderConfig) -> Self {
        Lz77Codec {
            ppm: PpmModel::new(),
            len_model: Self::fresh_len_model(),
            pos_models: Self::fresh_pos_models(),
            spos_model: Model::new(),
            config,
        }
    }

    fn fresh_len_model() -> Model {
        Model::with_frq(|sym| u16::from(sym == 0 || (MATCH_MIN_NEAR..=MATCH_MAX).contains(&sym)))
    }

    /// Digit models: tier 0 sees only multiples of 8 (distances are scaled
    /// by 8), tier 1 any byte, tiers 2..5 base-64 digits, tier 5 flat.
    fn fresh_pos_models() -> [Model; 6] {
        [
            Model::with_frq(|sym| u16::from(sym % 8 == 0)),
            Model::with_frq(|_| 1),
            Model::with_frq(|sym| u16::from(sym < 128)),
            Model::with_frq(|sym| u16::from(sym < 128)),
            Model::with_frq(|sym| u16::from(sym < 128)),
            Model::new(),
        ]
    }

    fn reset_models(&mut self) {
        self.ppm = PpmModel::new();
        self.len_model = Self::fresh_len_model();
        self.pos_models = Self::fresh_pos_models();
        self.spos_model = Model::new();
    }

    /// Encodes one non-empty block into `ob`.
    pub fn encode_block(&mut self, ib: &[u8], ob: &mut Vec<u8>) {
        ob.clear();
        ob.resize(HEADER_SIZE, 0);

        let esc = find_escape(ib);
        let match_min = 10 + usize::from(ib.len() > BIG_BLOCK);
        let mut header = BlockHeader {
            compressed: 1,
            match_min: match_min as u8,
            esc,
            original_size: ib.len() as u32,
            ..BlockHeader::default()
        };

        crate::displaylevel!(3, "-> building match index...\n");
        let matcher = Lz77Matcher::new(ib, match_min, self.config.flexible_parsing);

        crate::displaylevel!(3, "-> running LZ77 encoding...\n");
        let mut coder = RangeEncoder::new();
        let mut spos_coder = RangeEncoder::new();
        let mut pos_coder = RangeEncoder::new();
        let mut len_coder = RangeEncoder::new();
        let mut spos_block: Vec<u8> = Vec::new();
        let mut pos_block: Vec<u8> = Vec::new();
        let mut len_block: Vec<u8> = Vec::new();

        let mut progress = Progress::new(ib.len() as u64);
        let mut last_match = 0u32;
        let mut pos = 0usize;

        let aborted = thread::scope(|s| {
            let source = MatchSource {
                matcher,
                data: ib,
                pos: 0,
            };
            let mut pool = Prefetcher::start(s, source, MATCH_POOL, self.config.threaded);

            while pos < ib.len() {
                progress.update(pos as u64);
                let ret = pool.next().expect("match pool underrun");

                if ret.pos != NO_POS {
                    self.ppm.encode(&mut coder, esc, ob);

                    let actual = (pos - ret.pos as usize) as u32;
                    let coded = if actual == last_match { 0 } else { actual };
                    encode_with(&mut len_coder, &mut len_block, &mut self.len_model, ret.len as usize, 30);
                    header.num_len += 1;

                    if (ret.len as usize) < match_min {
                        encode_with(&mut spos_coder, &mut spos_block, &mut self.spos_model, coded as usize, 1);
                        header.num_spos += 1;
                    } else {
                        let mut j = coded * 8;
                        let mut tier = 0usize;
                        while j >= 128 && tier < 2 {
                            encode_with(
                                &mut pos_coder,
                                &mut pos_block,
                                &mut self.pos_models[tier],
                                (j % 128 + 128) as usize,
                                inc_factor(tier),
                            );
                            tier += 1;
                            j /= 128;
                        }
                        if tier >= 2 {
                            while j >= 64 && tier < 5 {
                                encode_with(
                                    &mut pos_coder,
                                    &mut pos_block,
                                    &mut self.pos_models[tier],
                                    (j % 64 + 64) as usize,
                                    inc_factor(tier),
                                );
                                tier += 1;
                                j /= 64;
                            }
                        }
                        encode_with(
                            &mut pos_coder,
                            &mut pos_block,
                            &mut self.pos_models[tier],
                            j as usize,
                            inc_factor(tier),
                        );
                        header.num_pos += 1;
                    }
                    last_match = coded;
                } else {
                    self.ppm.encode(&mut coder, ib[pos], ob);
                    if ib[pos] == esc {
                        encode_with(&mut len_coder, &mut len_block, &mut self.len_model, 0, 30);
                        header.num_len += 1;
                    }
                }

                for _ in 0..ret.len {
                    self.ppm.update_context(ib[pos]);
                    pos += 1;
                }
                if ob.len() >= ib.len() {
                    return true;
                }
            }
            false
        });
        progress.done();

        if aborted {
            store_raw(ib, ob);
            self.reset_models();
            return;
        }

        coder.flush(ob);
        spos_coder.flush(&mut spos_block);
        pos_coder.flush(&mut pos_block);
        len_coder.flush(&mut len_block);

        header.offset_spos = ob.len() as u32;
        header.offset_pos = (ob.len() + spos_block.len()) as u32;
        header.offset_len = (ob.len() + spos_block.len() + pos_block.len()) as u32;
        header.write(&mut ob[..HEADER_SIZE]);
        ob.extend_from_slice(&spos_block);
        ob.extend_from_slice(&pos_block);
        ob.extend_from_slice(&len_block);
    }

    /// Decodes one block into `ob` (cleared first).
    pub fn decode_block(&mut self, ib: &[u8], ob: &mut Vec<u8>) -> Result<(), FormatError> {
        ob.clear();
        let header = BlockHeader::parse(ib)?;
        if header.compressed == 0 {
            ob.extend_from_slice(&ib[HEADER_SIZE..]);
            self.reset_models();
            return Ok(());
        }

        let original_size = header.original_size as usize;
        let match_min = header.match_min as usize;
        let offset_spos = header.offset_spos as usize;
        let offset_pos = header.offset_pos as usize;
        let offset_len = header.offset_len as usize;
        if offset_spos < HEADER_SIZE
            || offset_spos > offset_pos
            || offset_pos > offset_len
            || offset_len > ib.len()
        {
            return Err(FormatError::BadSubstreamLayout);
        }

        crate::displaylevel!(3, "-> running LZ77 decoding...\n");
        ob.reserve(original_size);
        let mut dec = RangeDecoder::new(&ib[HEADER_SIZE..offset_spos])?;
        let mut progress = Progress::new(original_size as u64);

        let result = thread::scope(|s| {
            let spos_source = SposSource {
                dec: match RangeDecoder::new(&ib[offset_spos..offset_pos]) {
                    Ok(dec) => dec,
                    Err(err) => return Err(err),
                },
                model: std::mem::take(&mut self.spos_model),
                remaining: header.num_spos,
            };
            let pos_source = PosSource {
                dec: match RangeDecoder::new(&ib[offset_pos..offset_len]) {
                    Ok(dec) => dec,
                    Err(err) => {
                        self.spos_model = spos_source.model;
                        return Err(err);
                    }
                },
                models: std::mem::take(&mut self.pos_models),
                remaining: header.num_pos,
            };
            let len_source = LenSource {
                dec: match RangeDecoder::new(&ib[offset_len..]) {
                    Ok(dec) => dec,
                    Err(err) => {
                        self.spos_model = spos_source.model;
                        self.pos_models = pos_source.models;
                        return Err(err);
                    }
                },
                model: std::mem::take(&mut self.len_model),
                remaining: header.num_len,
            };

            let threaded = self.config.threaded;
            let mut spos_pool = Prefetcher::start(s, spos_source, SPOS_QUEUE, threaded);
            let mut pos_pool = Prefetcher::start(s, pos_source, POS_QUEUE, threaded);
            let mut len_pool = Prefetcher::start(s, len_source, LEN_QUEUE, threaded);

            let mut last_match = 0u32;
            let mut status = Ok(());
            'decode: while ob.len() < original_size {
                progress.update(ob.len() as u64);
                let sym = match self.ppm.decode(&mut dec) {
                    Ok(sym) => sym,
                    Err(err) => {
                        status = Err(err);
                        break;
                    }
                };

                let step;
                if sym != header.esc {
                    ob.push(sym);
                    step = 1;
                } else {
                    let len = match len_pool.next() {
                        Ok(len) => len,
                        Err(err) => {
                            status = Err(err);
                            break;
                        }
                    };
                    if len == 0 {
                        ob.push(header.esc);
                        step = 1;
                    } else {
                        let dist = if (len as usize) < match_min {
                            spos_pool.next()
                        } else {
                            pos_pool.next()
                        };
                        let dist = match dist {
                            Ok(dist) => dist,
                            Err(err) => {
                                status = Err(err);
                                break;
                            }
                        };
                        let dist = if dist > 0 { dist } else { last_match };
                        if dist == 0 || dist as usize > ob.len() {
                            status = Err(FormatError::BadMatchPosition);
                            break 'decode;
                        }
                        last_match = dist;
                        let from = ob.len() - dist as usize;
                        for i in 0..len as usize {
                            let byte = ob[from + i];
                            ob.push(byte);
                        }
                        step = len as usize;
                    }
                }

                for p in ob.len() - step..ob.len() {
                    self.ppm.update_context(ob[p]);
                }
            }

            let spos_source = spos_pool.finish();
            let pos_source = pos_pool.finish();
            let len_source = len_pool.finish();
            self.spos_model = spos_source.model;
            self.pos_models = pos_source.models;
            self.len_model = len_source.model;
            status
        });
        progress.done();
        result?;

        if ob.len() != original_size {
            return Err(FormatError::SizeMismatch);
        }
        Ok(())
    }
}

/// Emits a block that did not compress: zeroed header plus the raw bytes.
fn store_raw(ib: &[u8], ob: &mut Vec<u8>) {
    ob.clear();
    ob.resize(HEADER_SIZE, 0);
    ob.extend_from_slice(ib);
}
