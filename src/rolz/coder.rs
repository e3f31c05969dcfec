//! ROLZ block encoder/decoder.
//!
//! Block layout: `header || main stream || index stream`, the index stream
//! offset and pair count recorded in the header. The main stream carries
//! PPM-coded literals and match markers (the block's rarest byte); the index
//! stream carries range-coded (length, slot) pairs. A literal that happens
//! to equal the marker byte is disambiguated by a zero-length pair.
//!
//! Model state persists across the blocks of a stream. A raw-fallback block
//! resets it on both sides, since the models never see that block's bytes.

use std::thread;

use crate::display::Progress;
use crate::error::FormatError;
use crate::model::{decode_with, encode_with, Model};
use crate::pool::{PoolSource, Prefetcher};
use crate::ppm::PpmModel;
use crate::rangecoder::{RangeDecoder, RangeEncoder};
use crate::util::{find_escape, read_u32_le, write_u32_le};
use crate::CoderConfig;

use super::matcher::{MatchRet, RolzMatcher, NO_MATCH};
use super::{CTX4_THRESHOLD, IDX_COUNT, IDX_COUNT_SHORT, IDX_QUEUE, MATCH_MAX, MATCH_MIN,
            MATCH_POOL, TAIL_GUARD};

const HEADER_SIZE: usize = 15;

#[derive(Default)]
struct BlockHeader {
    first_byte: u8,
    compressed: u8,
    esc: u8,
    original_size: u32,
    num_idx: u32,
    offset_idx: u32,
}

impl BlockHeader {
    fn write(&self, buf: &mut [u8]) {
        buf[0] = self.first_byte;
        buf[1] = self.compressed;
        buf[2] = self.esc;
        write_u32_le(buf, 3, self.original_size);
        write_u32_le(buf, 7, self.num_idx);
        write_u32_le(buf, 11, self.offset_idx);
    }

    fn parse(buf: &[u8]) -> Result<Self, FormatError> {
        if buf.len() < HEADER_SIZE {
            return Err(FormatError::TruncatedHeader);
        }
        Ok(BlockHeader {
            first_byte: buf[0],
            compressed: buf[1],
            esc: buf[2],
            original_size: read_u32_le(buf, 3),
            num_idx: read_u32_le(buf, 7),
            offset_idx: read_u32_le(buf, 11),
        })
    }
}

/// Background producer of match decisions for the encoder.
struct MatchSource<'a> {
    matcher: RolzMatcher,
    data: &'a [u8],
    pos: usize,
}

impl PoolSource for MatchSource<'_> {
    type Item = MatchRet;

    fn refill(&mut self, pool: &mut Vec<MatchRet>, limit: usize) -> Result<bool, FormatError> {
        while self.pos < self.data.len() && pool.len() < limit {
            let ret = if self.pos + TAIL_GUARD < self.data.len() {
                self.matcher.lookup(self.data, self.pos)
            } else {
                MatchRet::literal()
            };
            for i in 0..ret.len as usize {
                self.matcher.update(self.data, self.pos + i, true);
            }
            self.pos += ret.len as usize;
            pool.push(ret);
        }
        Ok(self.pos < self.data.len())
    }
}

/// Background producer of prefetched (length, slot) pairs for the decoder.
/// Owns the index-stream models while a block is in flight.
struct IdxSource<'a> {
    dec: RangeDecoder<'a>,
    len_model: Model,
    idx_model: Model,
    remaining: u32,
}

impl PoolSource for IdxSource<'_> {
    type Item = (u32, u32);

    fn refill(&mut self, pool: &mut Vec<(u32, u32)>, limit: usize) -> Result<bool, FormatError> {
        while self.remaining > 0 && pool.len() < limit {
            self.remaining -= 1;
            let len = decode_with(&mut self.dec, &mut self.len_model, 4)? as u32;
            let idx = if len > 0 {
                decode_with(&mut self.dec, &mut self.idx_model, 4)? as u32
            } else {
                0
            };
            pool.push((len, idx));
        }
        Ok(self.remaining > 0)
    }
}

pub struct RolzCodec {
    ppm: PpmModel,
    idx_model: Model,
    len_model: Model,
    config: CoderConfig,
}

impl RolzCodec {
    pub fn new(config: CoderConfig) -> Self {
        RolzCodec {
            ppm: PpmModel::new(),
            idx_model: Self::fresh_idx_model(),
            len_model: Self::fresh_len_model(),
            config,
        }
    }

    fn fresh_idx_model() -> Model {
        Model::with_frq(|sym| u16::from(sym < IDX_COUNT + IDX_COUNT_SHORT))
    }

    fn fresh_len_model() -> Model {
        Model::with_frq(|sym| u16::from(sym == 0 || (MATCH_MIN..=MATCH_MAX).contains(&sym)))
    }

    /// Raw-fallback blocks bypass the models entirely; both sides restart
    /// from the initial state so they stay synchronized.
    fn reset_models(&mut self) {
        self.ppm = PpmModel::new();
        self.idx_model = Self::fresh_idx_model();
        self.len_model = Self::fresh_len_model();
    }

    /// Encodes one non-empty block into `ob`.
    pub fn encode_block(&mut self, ib: &[u8], ob: &mut Vec<u8>) {
        ob.clear();
        ob.resize(HEADER_SIZE, 0);

        let esc = find_escape(ib);
        let mut header = BlockHeader {
            first_byte: ib[0],
            compressed: 1,
            esc,
            original_size: ib.len() as u32,
            num_idx: 0,
            offset_idx: 0,
        };

        crate::displaylevel!(3, "-> running ROLZ encoding...\n");
        let matcher = RolzMatcher::new(ib.len() >= CTX4_THRESHOLD, self.config.flexible_parsing);
        let mut coder = RangeEncoder::new();
        let mut idx_coder = RangeEncoder::new();
        let mut idx_block: Vec<u8> = Vec::new();
        let mut progress = Progress::new(ib.len() as u64);
        let mut pos = 1usize;

        let aborted = thread::scope(|s| {
            let source = MatchSource {
                matcher,
                data: ib,
                pos: 1,
            };
            let mut pool = Prefetcher::start(s, source, MATCH_POOL, self.config.threaded);

            while pos < ib.len() {
                progress.update(pos as u64);
                let ret = pool.next().expect("match pool underrun");

                if ret.idx != NO_MATCH {
                    self.ppm.encode(&mut coder, esc, ob);
                    encode_with(&mut idx_coder, &mut idx_block, &mut self.len_model, ret.len as usize, 4);
                    encode_with(&mut idx_coder, &mut idx_block, &mut self.idx_model, ret.idx as usize, 4);
                    header.num_idx += 1;
                } else {
                    self.ppm.encode(&mut coder, ib[pos], ob);
                    if ib[pos] == esc {
                        encode_with(&mut idx_coder, &mut idx_block, &mut self.len_model, 0, 4);
                        header.num_idx += 1;
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
        idx_coder.flush(&mut idx_block);
        header.offset_idx = ob.len() as u32;
        header.write(&mut ob[..HEADER_SIZE]);
        ob.extend_from_slice(&idx_block);
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
        let offset_idx = header.offset_idx as usize;
        if original_size == 0 {
            return Err(FormatError::SizeMismatch);
        }
        if offset_idx < HEADER_SIZE || offset_idx > ib.len() {
            return Err(FormatError::BadSubstreamLayout);
        }

        crate::displaylevel!(3, "-> running ROLZ decoding...\n");
        ob.reserve(original_size);
        ob.push(header.first_byte);

        let mut matcher = RolzMatcher::new(original_size >= CTX4_THRESHOLD, false);
        let mut dec = RangeDecoder::new(&ib[HEADER_SIZE..offset_idx])?;
        let mut progress = Progress::new(original_size as u64);

        let result = thread::scope(|s| {
            let source = IdxSource {
                dec: match RangeDecoder::new(&ib[offset_idx..]) {
                    Ok(dec) => dec,
                    Err(err) => return Err(err),
                },
                len_model: std::mem::take(&mut self.len_model),
                idx_model: std::mem::take(&mut self.idx_model),
                remaining: header.num_idx,
            };
            let mut pool = Prefetcher::start(s, source, IDX_QUEUE, self.config.threaded);

            let mut status = Ok(());
            while ob.len() < original_size {
                progress.update(ob.len() as u64);
                let sym = match self.ppm.decode(&mut dec) {
                    Ok(sym) => sym,
                    Err(err) => {
                        status = Err(err);
                        break;
                    }
                };

                let step;
                if sym == header.esc {
                    let (len, idx) = match pool.next() {
                        Ok(pair) => pair,
                        Err(err) => {
                            status = Err(err);
                            break;
                        }
                    };
                    if len == 0 {
                        ob.push(header.esc);
                        step = 1;
                    } else {
                        let mpos = matcher.get_pos(idx);
                        if mpos == NO_MATCH || mpos as usize >= ob.len() {
                            status = Err(FormatError::BadMatchPosition);
                            break;
                        }
                        let mpos = mpos as usize;
                        for i in 0..len as usize {
                            let byte = ob[mpos + i];
                            ob.push(byte);
                        }
                        step = len as usize;
                    }
                } else {
                    ob.push(sym);
                    step = 1;
                }

                for p in ob.len() - step..ob.len() {
                    matcher.update(ob, p, false);
                    self.ppm.update_context(ob[p]);
                }
            }

            let source = pool.finish();
            self.len_model = source.len_model;
            self.idx_model = source.idx_model;
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
