//! x86 executable filters (PE and ELF, i386).
//!
//! Both locate the executable body from the container header and run the
//! call/jump offset transform over it: every `E8`/`E9` opcode's 4-byte
//! little-endian relative operand is rebased to an absolute body offset on
//! encode and restored on decode. Absolute targets repeat when the same
//! function is called from many sites, which the match finders reward.

use super::{Direction, Filter};
use crate::util::read_u32_le;

/// Rebases call/jump operands inside `buf`, which starts `origin` bytes
/// into the executable body. Operand bytes are skipped, so a scan never
/// reinterprets a transformed operand as an opcode.
fn e8e9(buf: &mut [u8], dir: Direction, origin: u32) {
    let mut i = 0usize;
    while i + 5 <= buf.len() {
        if buf[i] == 0xE8 || buf[i] == 0xE9 {
            let rel = i32::from_le_bytes([buf[i + 1], buf[i + 2], buf[i + 3], buf[i + 4]]);
            let site = origin.wrapping_add(i as u32).wrapping_add(5) as i32;
            let mapped = match dir {
                Direction::Encode => rel.wrapping_add(site),
                Direction::Decode => rel.wrapping_sub(site),
            };
            buf[i + 1..i + 5].copy_from_slice(&mapped.to_le_bytes());
            i += 5;
        } else {
            i += 1;
        }
    }
}

/// Common continuation state: how much of a detected body remains.
struct BodyState {
    curr: u32,
    total: u32,
    active: bool,
}

impl BodyState {
    fn new() -> Self {
        BodyState {
            curr: 0,
            total: 0,
            active: false,
        }
    }

    fn continue_body(&mut self, buf: &mut [u8], dir: Direction) -> usize {
        let span = ((self.total - self.curr) as usize).min(buf.len());
        e8e9(&mut buf[..span], dir, self.curr);
        self.curr += span as u32;
        self.active = self.curr < self.total;
        span
    }

    fn start_body(&mut self, buf: &mut [u8], dir: Direction, header: usize, body: u32) -> usize {
        self.curr = 0;
        self.total = body;
        let span = (body as usize).min(buf.len() - header);
        e8e9(&mut buf[header..header + span], dir, 0);
        self.curr = span as u32;
        self.active = self.curr < self.total;
        header + span
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PE (i386)
// ─────────────────────────────────────────────────────────────────────────────

const DOS_MAGIC: u16 = 0x5A4D; // "MZ"
const NT_MAGIC: u32 = 0x0000_4550; // "PE\0\0"
const DOS_LFANEW_OFFSET: usize = 0x3C;
const MACHINE_I386: u16 = 0x14C;
const COFF_HEADER_SIZE: usize = 24;
const SECTION_HEADER_SIZE: usize = 40;
const MAX_IMAGE_SIZE: u32 = 1 << 28;

pub(super) struct PeFilter {
    state: BodyState,
}

impl PeFilter {
    pub(super) fn new() -> Self {
        PeFilter {
            state: BodyState::new(),
        }
    }

    /// Header span and body size estimated from the section table.
    fn analyze(buf: &[u8]) -> Option<(usize, u32)> {
        if buf.len() < DOS_LFANEW_OFFSET + 4 {
            return None;
        }
        if u16::from_le_bytes([buf[0], buf[1]]) != DOS_MAGIC {
            return None;
        }
        let hdr_off = read_u32_le(buf, DOS_LFANEW_OFFSET) as usize;
        if hdr_off >= buf.len() || buf.len() - hdr_off < COFF_HEADER_SIZE {
            return None;
        }
        if read_u32_le(buf, hdr_off) != NT_MAGIC {
            return None;
        }
        let machine = u16::from_le_bytes([buf[hdr_off + 4], buf[hdr_off + 5]]);
        if machine != MACHINE_I386 {
            return None;
        }
        let num_sections = u16::from_le_bytes([buf[hdr_off + 6], buf[hdr_off + 7]]) as usize;
        let opt_size = u16::from_le_bytes([buf[hdr_off + 20], buf[hdr_off + 21]]) as usize;

        let table_off = COFF_HEADER_SIZE + opt_size;
        let header_size = hdr_off + table_off + num_sections * SECTION_HEADER_SIZE;
        if header_size > buf.len() {
            return None;
        }
        let mut body = 0u32;
        for section in 0..num_sections {
            let entry = hdr_off + table_off + section * SECTION_HEADER_SIZE;
            body = body.wrapping_add(read_u32_le(buf, entry + 16));
        }
        if body == 0 || body > MAX_IMAGE_SIZE {
            return None;
        }
        Some((header_size, body))
    }
}

impl Filter for PeFilter {
    fn transform(&mut self, buf: &mut [u8], dir: Direction) -> usize {
        if self.state.active {
            return self.state.continue_body(buf, dir);
        }
        match Self::analyze(buf) {
            Some((header, body)) => self.state.start_body(buf, dir, header, body),
            None => 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ELF (i386)
// ─────────────────────────────────────────────────────────────────────────────

const ELF_MAGIC: u32 = 0x464C_457F; // 0x7F "ELF"
const EM_386: u16 = 3;
const ELF32_HEADER_SIZE: usize = 52;
const E_MACHINE_OFFSET: usize = 18;
const E_SHOFF_OFFSET: usize = 32;

pub(super) struct ElfFilter {
    state: BodyState,
}

impl ElfFilter {
    pub(super) fn new() -> Self {
        ElfFilter {
            state: BodyState::new(),
        }
    }

    /// Body spans from the ELF header end to the section header table.
    fn analyze(buf: &[u8]) -> Option<(usize, u32)> {
        if buf.len() < ELF32_HEADER_SIZE {
            return None;
        }
        if read_u32_le(buf, 0) != ELF_MAGIC {
            return None;
        }
        let machine = u16::from_le_bytes([buf[E_MACHINE_OFFSET], buf[E_MACHINE_OFFSET + 1]]);
        if machine != EM_386 {
            return None;
        }
        let shoff = read_u32_le(buf, E_SHOFF_OFFSET);
        if (shoff as usize) < ELF32_HEADER_SIZE || shoff >= 1 << 30 {
            return None;
        }
        Some((ELF32_HEADER_SIZE, shoff - ELF32_HEADER_SIZE as u32))
    }
}

impl Filter for ElfFilter {
    fn transform(&mut self, buf: &mut [u8], dir: Direction) -> usize {
        if self.state.active {
            return self.state.continue_body(buf, dir);
        }
        match Self::analyze(buf) {
            Some((header, body)) if body > 0 => self.state.start_body(buf, dir, header, body),
            _ => 0,
        }
    }
}
