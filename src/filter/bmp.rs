//! BMP delta filter for uncompressed 24/32-bit bitmaps.
//!
//! Pixel rows get three reversible byte transforms: a color rotation
//! (`R -= G`, `B -= G`), a horizontal neighbor delta, and a vertical
//! neighbor delta. Each call transforms only the whole rows it can see;
//! a row broken by a block boundary is skipped on both sides.

use super::{Direction, Filter};
use crate::util::read_u32_le;

const BMP_MAGIC: u16 = 0x4D42; // "BM"
const HEADER_SIZE: usize = 54;

pub(super) struct BmpFilter {
    active: bool,
    width: usize,
    row_size: usize,
    bpp: usize,
    remaining: usize,
}

impl BmpFilter {
    pub(super) fn new() -> Self {
        BmpFilter {
            active: false,
            width: 0,
            row_size: 0,
            bpp: 0,
            remaining: 0,
        }
    }

    /// Claims the header on a successful detect and primes the pixel-data
    /// continuation.
    fn detect(&mut self, buf: &[u8]) -> usize {
        if buf.len() < HEADER_SIZE {
            return 0;
        }
        if u16::from_le_bytes([buf[0], buf[1]]) != BMP_MAGIC {
            return 0;
        }
        let file_size = read_u32_le(buf, 2);
        let image_offset = read_u32_le(buf, 10) as usize;
        let width = (read_u32_le(buf, 18) as i32).unsigned_abs() as usize;
        let height = (read_u32_le(buf, 22) as i32).unsigned_abs() as usize;
        let planes = u16::from_le_bytes([buf[26], buf[27]]);
        let bpp = u16::from_le_bytes([buf[28], buf[29]]) as usize;
        let compression = read_u32_le(buf, 30);
        let image_size = read_u32_le(buf, 34);

        if planes != 1
            || compression != 0
            || (image_size != 0 && image_offset as u32 + image_size != file_size)
            || (bpp != 24 && bpp != 32)
        {
            return 0;
        }
        if !(4..1 << 20).contains(&width) || !(4..1 << 20).contains(&height) {
            return 0;
        }
        if image_offset < HEADER_SIZE || image_offset > buf.len() {
            return 0;
        }

        self.width = width;
        self.row_size = (bpp * width + 31) / 32 * 4;
        self.bpp = bpp;
        self.remaining = height * self.row_size;
        self.active = true;
        image_offset
    }
}

impl Filter for BmpFilter {
    fn transform(&mut self, buf: &mut [u8], dir: Direction) -> usize {
        if !self.active {
            return self.detect(buf);
        }
        let avail = self.remaining.min(buf.len());
        let rows = avail / self.row_size;
        column_rgb_delta(
            &mut buf[..rows * self.row_size],
            self.width,
            self.row_size,
            self.bpp,
            dir,
        );
        // a trailing partial row is claimed but left untransformed
        self.remaining -= avail;
        self.active = self.remaining > 0;
        avail
    }
}

fn column_rgb_delta(buf: &mut [u8], width: usize, row_size: usize, bpp: usize, dir: Direction) {
    let rows = buf.len() / row_size.max(1);
    let px = bpp / 8;
    let at = |y: usize, x: usize, c: usize| y * row_size + x * px + c;

    match dir {
        Direction::Encode => {
            for y in 0..rows {
                for x in 0..width {
                    buf[at(y, x, 0)] = buf[at(y, x, 0)].wrapping_sub(buf[at(y, x, 1)]);
                    buf[at(y, x, 2)] = buf[at(y, x, 2)].wrapping_sub(buf[at(y, x, 1)]);
                }
            }
            for y in 0..rows {
                for x in (1..width).rev() {
                    for c in 0..px {
                        buf[at(y, x, c)] = buf[at(y, x, c)].wrapping_sub(buf[at(y, x - 1, c)]);
                    }
                }
            }
            for y in (1..rows).rev() {
                for x in 0..width {
                    for c in 0..px {
                        buf[at(y, x, c)] = buf[at(y, x, c)].wrapping_sub(buf[at(y - 1, x, c)]);
                    }
                }
            }
        }
        Direction::Decode => {
            for y in 0..rows {
                for x in 1..width {
                    for c in 0..px {
                        buf[at(y, x, c)] = buf[at(y, x, c)].wrapping_add(buf[at(y, x - 1, c)]);
                    }
                }
            }
            for y in 1..rows {
                for x in 0..width {
                    for c in 0..px {
                        buf[at(y, x, c)] = buf[at(y, x, c)].wrapping_add(buf[at(y - 1, x, c)]);
                    }
                }
            }
            for y in 0..rows {
                for x in 0..width {
                    buf[at(y, x, 0)] = buf[at(y, x, 0)].wrapping_add(buf[at(y, x, 1)]);
                    buf[at(y, x, 2)] = buf[at(y, x, 2)].wrapping_add(buf[at(y, x, 1)]);
                }
            }
        }
    }
}
