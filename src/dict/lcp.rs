//! Common-prefix compression of the dictionary word list.
//!
//! The level-2 portion of the list is sorted, so consecutive words share
//! long prefixes. Every word after the first is replaced by a 1-byte
//! longest-common-prefix count against its predecessor plus the differing
//! tail. A 255 byte terminates the stream; an LCP value can never reach it
//! because words are bounded well below 255 bytes. The transform is
//! bijective on any NUL-terminated, newline-separated word list.

use crate::error::FormatError;

const TERMINATOR: u8 = 255;

/// Replaces the word blob with its LCP-compressed form.
pub fn lcp_encode(block: &mut Vec<u8>) {
    let data = &block[..];
    let mut out: Vec<u8> = Vec::with_capacity(data.len());
    let mut prev = 0usize;
    let mut cur = 0usize;

    while data[cur] != b'\n' {
        out.push(data[cur]);
        cur += 1;
    }
    cur += 1;
    out.push(b'\n');

    while data[cur] != 0 {
        let mut lcp = 0usize;
        while data[prev + lcp] == data[cur + lcp] {
            lcp += 1;
        }
        out.push(lcp as u8);
        prev = cur;
        cur += lcp;
        while data[cur] != b'\n' {
            out.push(data[cur]);
            cur += 1;
        }
        cur += 1;
        out.push(b'\n');
    }
    out.push(TERMINATOR);
    *block = out;
}

/// Inverse of [`lcp_encode`]; restores the NUL-terminated word blob.
pub fn lcp_decode(block: &mut Vec<u8>) -> Result<(), FormatError> {
    let data = &block[..];
    let mut out: Vec<u8> = Vec::with_capacity(data.len() * 2);
    let mut pos = 0usize;

    let next = |data: &[u8], pos: usize| -> Result<u8, FormatError> {
        data.get(pos).copied().ok_or(FormatError::TruncatedStream)
    };

    loop {
        let b = next(data, pos)?;
        pos += 1;
        out.push(b);
        if b == b'\n' {
            break;
        }
    }

    let mut prev = 0usize;
    while next(data, pos)? != TERMINATOR {
        let lcp = next(data, pos)? as usize;
        pos += 1;
        for _ in 0..lcp {
            if prev >= out.len() {
                return Err(FormatError::TruncatedStream);
            }
            let b = out[prev];
            out.push(b);
            prev += 1;
        }
        loop {
            let b = next(data, pos)?;
            pos += 1;
            out.push(b);
            if b == b'\n' {
                break;
            }
        }
        // advance to the start of the word just written
        while out[prev] != b'\n' {
            prev += 1;
        }
        prev += 1;
    }
    out.push(0);
    *block = out;
    Ok(())
}
