//! Dictionary block encoder/decoder.
//!
//! Blocks are processed as pairs of 1 MiB chunks on two workers. Each
//! encoded chunk ends with its original size as a 4-byte tail, and the
//! block frames every pair as `[size1][size2][chunk1][chunk2]`. The ten
//! escape bytes (the block's rarest) and a compressible flag close the
//! block; a block that did not shrink is stored raw with flag zero.
//!
//! The decoder runs backward over each chunk: the final byte of every code
//! is an escape byte, and plain literals are never escape bytes, so the
//! reverse parse is unambiguous. The sentence-start case heuristic needs
//! left context the backward pass has not produced yet, so its application
//! is deferred until the context bytes exist.

use crate::error::FormatError;
use crate::util::{read_u32_le, write_u32_le};

use super::{level1_word_num, Dictionary, WORD_MAXLEN};

/// Chunk length fed to each worker.
const CHUNK: usize = 1_000_000;
/// Escape slots per block.
const NUM_ESC: usize = 10;

/// Sentence-start test: byte `i` follows `". "` or `".  "`.
#[inline]
fn check_reverse_case(data: &[u8], i: usize) -> bool {
    i >= 3
        && data[i - 1] == b' '
        && (data[i - 2] == b'.' || (data[i - 2] == b' ' && data[i - 3] == b'.'))
}

/// The ten rarest bytes of the block, rarest first, lowest value on ties.
fn find_escape_slots(data: &[u8]) -> [u8; NUM_ESC] {
    let mut counter = [0u32; 256];
    for &b in data {
        counter[b as usize] += 1;
    }
    let mut esc = [0u8; NUM_ESC];
    for slot in esc.iter_mut() {
        let mut best = 0usize;
        for (value, &count) in counter.iter().enumerate() {
            if count < counter[best] {
                best = value;
            }
        }
        *slot = best as u8;
        counter[best] = u32::MAX;
    }
    esc
}

fn escape_map(esc: &[u8; NUM_ESC]) -> [u8; 256] {
    let mut map = [0u8; 256];
    for (i, &e) in esc.iter().enumerate() {
        map[e as usize] = (i + 1) as u8;
    }
    map
}

impl Dictionary {
    /// Tokenizes one block. Never fails; incompressible input falls back to
    /// a raw copy with flag zero.
    pub fn encode_block(&self, ib: &[u8], ob: &mut Vec<u8>) {
        ob.clear();
        let esc = find_escape_slots(ib);
        let escmap = escape_map(&esc);

        let mut pos = 0usize;
        while pos < ib.len() {
            let size1 = CHUNK.min(ib.len() - pos);
            pos += size1;
            let size2 = CHUNK.min(ib.len() - pos);
            pos += size2;

            let chunk1 = &ib[pos - size2 - size1..pos - size2];
            let chunk2 = &ib[pos - size2..pos];
            let (ob1, ob2) = rayon::join(
                || self.encode_chunk(chunk1, &esc, &escmap),
                || self.encode_chunk(chunk2, &esc, &escmap),
            );

            let base = ob.len();
            ob.resize(base + 8, 0);
            write_u32_le(ob, base, ob1.len() as u32);
            write_u32_le(ob, base + 4, ob2.len() as u32);
            ob.extend_from_slice(&ob1);
            ob.extend_from_slice(&ob2);
        }
        ob.extend_from_slice(&esc);
        ob.push(1);

        if ob.len() >= ib.len() {
            ob.clear();
            ob.extend_from_slice(ib);
            ob.push(0);
        }
    }

    fn encode_chunk(&self, data: &[u8], esc: &[u8; NUM_ESC], escmap: &[u8; 256]) -> Vec<u8> {
        let level1 = level1_word_num(self.len());
        let marker = self.len();
        let mut ob = Vec::with_capacity(data.len() / 2 + 16);

        let mut i = 0usize;
        while i + WORD_MAXLEN * 2 < data.len() {
            let hit = if i > 0
                && data[i].is_ascii_alphabetic()
                && !data[i - 1].is_ascii_alphabetic()
            {
                self.trie().walk(data, i)
            } else {
                None
            };

            match hit {
                Some((j, id)) => {
                    let reverse = data[i].is_ascii_uppercase() != check_reverse_case(data, i);
                    let term = match data[j] {
                        b':' => 4,
                        b';' => 3,
                        b',' => 2,
                        b'.' => 1,
                        _ => 0,
                    };
                    let escchar = esc[usize::from(reverse) * 5 + term];

                    let id = id as usize;
                    if id < level1 {
                        ob.push(id as u8);
                    } else {
                        ob.push((id / (256 - level1)) as u8);
                        ob.push((id % (256 - level1) + level1) as u8);
                    }
                    ob.push(escchar);
                    i = j + 1;
                }
                None => {
                    push_literal(&mut ob, data[i], escmap, marker, level1);
                    i += 1;
                }
            }
        }
        while i < data.len() {
            push_literal(&mut ob, data[i], escmap, marker, level1);
            i += 1;
        }

        let base = ob.len();
        ob.resize(base + 4, 0);
        write_u32_le(&mut ob, base, data.len() as u32);
        ob
    }

    /// Reverses [`Self::encode_block`].
    pub fn decode_block(&self, ib: &[u8], ob: &mut Vec<u8>) -> Result<(), FormatError> {
        ob.clear();
        if ib.is_empty() {
            return Err(FormatError::TruncatedStream);
        }
        if ib[ib.len() - 1] == 0 {
            ob.extend_from_slice(&ib[..ib.len() - 1]);
            return Ok(());
        }
        if ib.len() < NUM_ESC + 1 {
            return Err(FormatError::TruncatedStream);
        }

        let mut esc = [0u8; NUM_ESC];
        esc.copy_from_slice(&ib[ib.len() - (NUM_ESC + 1)..ib.len() - 1]);
        let escmap = escape_map(&esc);

        let mut pos = 0usize;
        while pos + NUM_ESC + 1 < ib.len() {
            if pos + 8 > ib.len() {
                return Err(FormatError::TruncatedStream);
            }
            let size1 = read_u32_le(ib, pos) as usize;
            let size2 = read_u32_le(ib, pos + 4) as usize;
            if ib.len() - (pos + 8) < size1 + size2 {
                return Err(FormatError::TruncatedStream);
            }
            pos += 8 + size1 + size2;

            let chunk1 = &ib[pos - size2 - size1..pos - size2];
            let chunk2 = &ib[pos - size2..pos];
            let (out1, out2) = rayon::join(
                || self.decode_chunk(chunk1, &escmap),
                || self.decode_chunk(chunk2, &escmap),
            );
            ob.extend_from_slice(&out1?);
            ob.extend_from_slice(&out2?);
        }
        Ok(())
    }

    fn decode_chunk(&self, data: &[u8], escmap: &[u8; 256]) -> Result<Vec<u8>, FormatError> {
        let level1 = level1_word_num(self.len());
        let marker = self.len();
        if data.len() < 4 {
            return Err(FormatError::TruncatedStream);
        }
        let out_size = read_u32_le(data, data.len() - 4) as usize;
        if out_size > CHUNK {
            return Err(FormatError::SizeMismatch);
        }
        let mut out = vec![0u8; out_size];
        let mut src = data.len() - 4;
        let mut dst = out_size;
        let mut reverse_pos: Option<usize> = None;

        while dst > 0 {
            if src == 0 {
                return Err(FormatError::TruncatedStream);
            }
            src -= 1;
            let ch = data[src];
            if escmap[ch as usize] == 0 {
                dst -= 1;
                out[dst] = ch;
                continue;
            }

            if src == 0 {
                return Err(FormatError::TruncatedStream);
            }
            src -= 1;
            let mut id = data[src] as usize;
            if id >= level1 {
                if src == 0 {
                    return Err(FormatError::TruncatedStream);
                }
                src -= 1;
                id = data[src] as usize * (256 - level1) + (id - level1);
                if id == marker {
                    // escaped literal: the trailing byte is the raw value
                    dst -= 1;
                    out[dst] = ch;
                    continue;
                }
            }
            if id >= self.len() {
                return Err(FormatError::BadWordId);
            }

            let word = self.word(id);
            if word.len() > dst {
                return Err(FormatError::SizeMismatch);
            }
            dst -= word.len();
            out[dst..dst + word.len()].copy_from_slice(word);

            let tag = escmap[ch as usize];
            let last = dst + word.len() - 1;
            match tag {
                2 | 7 => out[last] = b'.',
                3 | 8 => out[last] = b',',
                4 | 9 => out[last] = b';',
                5 | 10 => out[last] = b':',
                _ => {}
            }
            if tag >= 6 {
                out[dst] ^= 0x20;
            }

            if let Some(rp) = reverse_pos {
                if check_reverse_case(&out, rp) {
                    out[rp] ^= 0x20;
                }
            }
            reverse_pos = Some(dst);
        }

        if let Some(rp) = reverse_pos {
            if check_reverse_case(&out, rp) {
                out[rp] ^= 0x20;
            }
        }
        Ok(out)
    }
}

fn push_literal(ob: &mut Vec<u8>, byte: u8, escmap: &[u8; 256], marker: usize, level1: usize) {
    if escmap[byte as usize] == 0 {
        ob.push(byte);
    } else {
        ob.push((marker / (256 - level1)) as u8);
        ob.push((marker % (256 - level1) + level1) as u8);
        ob.push(byte);
    }
}
