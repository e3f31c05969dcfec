//! Small shared helpers: little-endian field access for the packed block
//! headers, and escape-byte selection.

/// Reads a little-endian `u32` at byte `offset`.
#[inline]
pub fn read_u32_le(src: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        src[offset],
        src[offset + 1],
        src[offset + 2],
        src[offset + 3],
    ])
}

/// Writes a little-endian `u32` at byte `offset`.
#[inline]
pub fn write_u32_le(dst: &mut [u8], offset: usize, value: u32) {
    dst[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// The rarest byte of the block, ties broken toward the lowest value. The
/// coders repurpose it as the match-token marker in the main stream.
pub fn find_escape(data: &[u8]) -> u8 {
    let mut counter = [0u32; 256];
    for &b in data {
        counter[b as usize] += 1;
    }
    let mut esc = 0usize;
    for i in 1..256 {
        if counter[esc] > counter[i] {
            esc = i;
        }
    }
    esc as u8
}
