//! Content filters: bytewise in-place pre/post passes that make executable
//! and bitmap payloads more compressible.
//!
//! Each filter is a resumable state machine so an image larger than one
//! pipeline block continues where it left off. Dispatch scans the block,
//! retrying the last successful filter first; a filter claims a span of
//! bytes and transforms it in place. Headers are never modified, so
//! detection makes identical decisions on the encoding and decoding side.

mod bmp;
mod exe;

use bmp::BmpFilter;
use exe::{ElfFilter, PeFilter};

/// Transform direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encode,
    Decode,
}

trait Filter {
    /// Inspects (or continues) at the start of `buf`; transforms in place
    /// and returns the number of bytes claimed, 0 when not recognized.
    fn transform(&mut self, buf: &mut [u8], dir: Direction) -> usize;
}

/// All content filters plus the last-matched memo, persisted across the
/// blocks of a stream.
pub struct FilterSet {
    pe: PeFilter,
    elf: ElfFilter,
    bmp: BmpFilter,
    last: Option<usize>,
}

impl FilterSet {
    pub fn new() -> Self {
        FilterSet {
            pe: PeFilter::new(),
            elf: ElfFilter::new(),
            bmp: BmpFilter::new(),
            last: None,
        }
    }

    fn nth(&mut self, index: usize) -> &mut dyn Filter {
        match index {
            0 => &mut self.pe,
            1 => &mut self.elf,
            _ => &mut self.bmp,
        }
    }

    /// Runs the filters over one block; returns whether anything matched.
    pub fn apply(&mut self, buf: &mut [u8], dir: Direction) -> bool {
        let mut filtered = false;
        let mut pos = 0usize;
        while pos < buf.len() {
            if let Some(last) = self.last {
                let claimed = self.nth(last).transform(&mut buf[pos..], dir);
                if claimed > 0 {
                    filtered = true;
                    pos += claimed;
                    continue;
                }
                self.last = None;
            }

            let mut claimed = 0;
            for index in 0..3 {
                let n = self.nth(index).transform(&mut buf[pos..], dir);
                if n > 0 {
                    filtered = true;
                    self.last = Some(index);
                    claimed = n;
                    break;
                }
            }
            pos += claimed.max(1);
        }
        filtered
    }
}

impl Default for FilterSet {
    fn default() -> Self {
        Self::new()
    }
}
