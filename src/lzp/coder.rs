//! LZP block encoder/decoder.
//!
//! Single-stream layout: `header || main`. A match is coded as the marker
//! byte followed by its length, both through PPM; the marker itself enters
//! the context register so the length is coded under a distinct context.
//! A literal equal to the marker is followed by length zero. Blocks under
//! 16 bytes have no room for the 9-byte raw prefix plus context and are
//! stored raw.
//!
//! Model state persists across the blocks of a stream; raw-fallback blocks
//! reset it on both sides.

use std::thread;

use crate::display::Progress;
use crate::error::FormatError;
use crate::pool::{PoolSource, Prefetcher};
use crate::ppm::PpmModel;
use crate::rangecoder::{RangeDecoder, RangeEncoder};
use crate::util::{find_escape, read_u32_le, write_u32_le};
use crate::CoderConfig;

use super::matcher::LzpMatcher;
use super::{MATCH_POOL, TAIL_GUARD};

const HEADER_SIZE: usize = 15;
const FIRST_BYTES: usize = 9;

#[derive(Default)]
struct BlockHeader {
    compressed: u8,
    original_size: u32,
    esc: u8,
    first_bytes: [u8; FIRST_BYTES],
}

impl BlockHeader {
    fn write(&self, buf: &mut [u8]) {
        buf[0] = self.compressed;
        write_u32_le(buf, 1, self.original_size);
        buf[5] = self.esc;
        buf[6..6 + FIRST_BYTES].copy_from_slice(&self.first_bytes);
    }

    fn parse(buf: &[u8]) -> Result<Self, FormatError> {
        if buf.len() < HEADER_SIZE {
            return Err(FormatError::TruncatedHeader);
        }
        let mut first_bytes = [0u8; FIRST_BYTES];
        first_bytes.copy_from_slice(&buf[6..6 + FIRST_BYTES]);
        Ok(BlockHeader {
            compressed: buf[0],
            original_size: read_u32_le(buf, 1),
            esc: buf[5],
            first_bytes,
        })
    }
}

/// Background producer of match lengths for the encoder.
struct MatchSource<'a> {
    matcher: LzpMatcher,
    data: &'a [u8],
    pos: usize,
}

impl PoolSource for MatchSource<'_> {
    type Item = u32;

    fn refill(&mut self, pool: &mut Vec<u32>, limit: usize) -> Result<bool, FormatError> {
        while self.pos < self.data.len() && pool.len() < limit {
            let len = if self.pos + TAIL_GUARD < self.data.len() {
                let len = self.matcher.lookup(self.data, self.pos);
                for i in 0..len as usize {
                    self.matcher.update(self.data, self.pos + i);
                }
                len
            } else {
                1
            };
            self.pos += len as usize;
            pool.push(len);
        }
        Ok(self.pos < self.data.len())
    }
}

pub struct LzpCodec {
    ppm: PpmModel,
    config: CoderConfig,
}

impl LzpCodec {
    pub fn new(config: CoderConfig) -> Self {
        LzpCodec {
            ppm: PpmModel::new(),
            config,
        }
    }

    fn reset_models(&mut self) {
        self.ppm = PpmModel::new();
    }

    /// Encodes one non-empty block into `ob`.
    pub fn encode_block(&mut self, ib: &[u8], ob: &mut Vec<u8>) {
        ob.clear();
        ob.resize(HEADER_SIZE, 0);
        if ib.len() < 16 {
            store_raw(ib, ob);
            self.reset_models();
            return;
        }

        crate::displaylevel!(3, "-> running LZP/ARI encoding...\n");
        let esc = find_escape(ib);
        let mut header = BlockHeader {
            compressed: 1,
            original_size: ib.len() as u32,
            esc,
            first_bytes: [0; FIRST_BYTES],
        };
        header.first_bytes.copy_from_slice(&ib[..FIRST_BYTES]);

        let matcher = LzpMatcher::new();
        let mut coder = RangeEncoder::new();
        let mut progress = Progress::new(ib.len() as u64);
        let mut pos = FIRST_BYTES;

        let aborted = thread::scope(|s| {
            let source = MatchSource {
                matcher,
                data: ib,
                pos: FIRST_BYTES,
            };
            let mut pool = Prefetcher::start(s, source, MATCH_POOL, self.config.threaded);

            while pos < ib.len() {
                progress.update(pos as u64);
                let len = pool.next().expect("match pool underrun");

                if len > 1 {
                    self.ppm.encode(&mut coder, esc, ob);
                    self.ppm.update_context(esc);
                    self.ppm.encode(&mut coder, len as u8, ob);
                } else {
                    self.ppm.encode(&mut coder, ib[pos], ob);
                    if ib[pos] == esc {
                        self.ppm.update_context(esc);
                        self.ppm.encode(&mut coder, 0, ob);
                    }
                }
                for _ in 0..len {
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
        header.write(&mut ob[..HEADER_SIZE]);
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

        crate::displaylevel!(3, "-> running LZP/ARI decoding...\n");
        let original_size = header.original_size as usize;
        if original_size < 16 {
            return Err(FormatError::SizeMismatch);
        }
        ob.reserve(original_size);
        ob.extend_from_slice(&header.first_bytes);

        let mut matcher = LzpMatcher::new();
        let mut dec = RangeDecoder::new(&ib[HEADER_SIZE..])?;
        let mut progress = Progress::new(original_size as u64);

        while ob.len() < original_size {
            progress.update(ob.len() as u64);
            let sym = self.ppm.decode(&mut dec)?;

            let step;
            if sym != header.esc {
                ob.push(sym);
                step = 1;
            } else {
                self.ppm.update_context(header.esc);
                let len = self.ppm.decode(&mut dec)? as usize;
                if len == 0 {
                    ob.push(header.esc);
                    step = 1;
                } else {
                    let mpos = matcher.get_pos(ob, ob.len()) as usize;
                    if mpos >= ob.len() {
                        return Err(FormatError::BadMatchPosition);
                    }
                    for i in 0..len {
                        let byte = ob[mpos + i];
                        ob.push(byte);
                    }
                    step = len;
                }
            }

            for p in ob.len() - step..ob.len() {
                self.ppm.update_context(ob[p]);
                matcher.update(ob, p);
            }
        }
        progress.done();

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
