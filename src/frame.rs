//! Container framing and the block pipeline.
//!
//! Stream layout:
//!
//! ```text
//! magic                      variant-identifying ASCII bytes
//! dict_size: u32 LE
//! dict_stream                picker output, LCP- then LZ-coded
//! repeat:
//!     size: u32 LE, filt: u8, prec: u8
//!     payload: size bytes    variant inner block
//! until EOF
//! ```
//!
//! Encoding takes two passes over the source (dictionary training, then
//! coding), so the encoder needs a seekable reader. The dictionary stream
//! is coded with a throwaway codec; the data blocks share one codec whose
//! model state persists from block to block.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::dict::{lcp_decode, lcp_encode, pick_dictionary, Dictionary};
use crate::error::{FormatError, StreamError};
use crate::filter::{Direction, FilterSet};
use crate::lz77::Lz77Codec;
use crate::lzp::LzpCodec;
use crate::rolz::RolzCodec;
use crate::util::write_u32_le;
use crate::CoderConfig;

const MAGIC_PREFIX: &[u8] = b"\x1f\x9d\x01\x01::0.1.0-roxide-";

/// Outer wrapper: payload size, filter flag, precompress flag.
const WRAPPER_SIZE: usize = 6;

/// Pipeline variant; the container magic records which one wrote a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Rolz,
    Lz77,
    Lzp,
}

impl Variant {
    fn tag(self) -> &'static [u8; 4] {
        match self {
            Variant::Rolz => b"rolz",
            Variant::Lz77 => b"lz77",
            Variant::Lzp => b"lzpa",
        }
    }

    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"rolz" => Some(Variant::Rolz),
            b"lz77" => Some(Variant::Lz77),
            b"lzpa" => Some(Variant::Lzp),
            _ => None,
        }
    }
}

/// Encoder knobs; decoding needs none (the stream is self-describing).
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub variant: Variant,
    /// Block size in bytes; a block is coded as one unit.
    pub block_size: usize,
    /// Stop after the dictionary stage (no LZ stage).
    pub precompress_only: bool,
    /// Run the PE/ELF/BMP content filters.
    pub filters: bool,
    pub coder: CoderConfig,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            variant: Variant::Lz77,
            block_size: 16 * 1024 * 1024,
            precompress_only: false,
            filters: false,
            coder: CoderConfig::default(),
        }
    }
}

/// Byte counts of one finished stream operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub read: u64,
    pub written: u64,
}

enum Codec {
    Rolz(Box<RolzCodec>),
    Lz77(Box<Lz77Codec>),
    Lzp(Box<LzpCodec>),
}

impl Codec {
    fn new(variant: Variant, config: CoderConfig) -> Self {
        match variant {
            Variant::Rolz => Codec::Rolz(Box::new(RolzCodec::new(config))),
            Variant::Lz77 => Codec::Lz77(Box::new(Lz77Codec::new(config))),
            Variant::Lzp => Codec::Lzp(Box::new(LzpCodec::new(config))),
        }
    }

    fn encode_block(&mut self, ib: &[u8], ob: &mut Vec<u8>) {
        match self {
            Codec::Rolz(codec) => codec.encode_block(ib, ob),
            Codec::Lz77(codec) => codec.encode_block(ib, ob),
            Codec::Lzp(codec) => codec.encode_block(ib, ob),
        }
    }

    fn decode_block(&mut self, ib: &[u8], ob: &mut Vec<u8>) -> Result<(), FormatError> {
        match self {
            Codec::Rolz(codec) => codec.decode_block(ib, ob),
            Codec::Lz77(codec) => codec.decode_block(ib, ob),
            Codec::Lzp(codec) => codec.decode_block(ib, ob),
        }
    }
}

/// Compresses `src` to `dst`. The reader is consumed twice: once by the
/// dictionary trainer and once by the coding loop.
pub fn encode_stream<R, W>(
    src: &mut R,
    dst: &mut W,
    opts: &EncodeOptions,
) -> Result<Stats, StreamError>
where
    R: Read + Seek,
    W: Write,
{
    let mut stats = Stats::default();

    dst.write_all(MAGIC_PREFIX)?;
    dst.write_all(opts.variant.tag())?;
    stats.written += (MAGIC_PREFIX.len() + 4) as u64;

    // pass one: train the dictionary
    crate::displaylevel!(2, "-> building static dictionary...\n");
    let mut blob = pick_dictionary(src)?;
    src.seek(SeekFrom::Start(0))?;
    let dict = Dictionary::load(&blob, true)?;

    // the dictionary itself rides in front of the first block
    lcp_encode(&mut blob);
    let mut dict_stream = Vec::new();
    Codec::new(opts.variant, opts.coder).encode_block(&blob, &mut dict_stream);
    crate::displaylevel!(
        2,
        "added {} words to dictionary, compressed size = {} bytes\n",
        dict.len(),
        dict_stream.len()
    );
    dst.write_all(&(dict_stream.len() as u32).to_le_bytes())?;
    dst.write_all(&dict_stream)?;
    stats.written += 4 + dict_stream.len() as u64;

    // pass two: the block loop
    let mut codec = Codec::new(opts.variant, opts.coder);
    let mut filters = FilterSet::new();
    let mut ib: Vec<u8> = Vec::new();
    let mut ob: Vec<u8> = Vec::new();

    loop {
        ib.resize(opts.block_size, 0);
        let filled = fill_block(src, &mut ib)?;
        ib.truncate(filled);
        if filled == 0 {
            break;
        }
        stats.read += filled as u64;

        let filt = opts.filters && filters.apply(&mut ib, Direction::Encode);

        dict.encode_block(&ib, &mut ob);
        if !opts.precompress_only {
            std::mem::swap(&mut ib, &mut ob);
            codec.encode_block(&ib, &mut ob);
        }

        let mut wrapper = [0u8; WRAPPER_SIZE];
        write_u32_le(&mut wrapper, 0, ob.len() as u32);
        wrapper[4] = u8::from(filt);
        wrapper[5] = u8::from(opts.precompress_only);
        dst.write_all(&wrapper)?;
        dst.write_all(&ob)?;
        stats.written += (WRAPPER_SIZE + ob.len()) as u64;
    }
    dst.flush()?;
    Ok(stats)
}

/// Decompresses `src` to `dst`; the variant comes from the magic.
pub fn decode_stream<R, W>(src: &mut R, dst: &mut W) -> Result<Stats, StreamError>
where
    R: Read,
    W: Write,
{
    let mut stats = Stats::default();

    let mut magic = vec![0u8; MAGIC_PREFIX.len() + 4];
    src.read_exact(&mut magic)
        .map_err(|_| FormatError::BadMagic)?;
    if &magic[..MAGIC_PREFIX.len()] != MAGIC_PREFIX {
        return Err(FormatError::BadMagic.into());
    }
    let variant = Variant::from_tag(&magic[MAGIC_PREFIX.len()..])
        .ok_or(FormatError::BadMagic)?;
    stats.read += magic.len() as u64;

    // the dictionary stream precedes the first block
    crate::displaylevel!(2, "-> decoding static dictionary...\n");
    let mut size_buf = [0u8; 4];
    src.read_exact(&mut size_buf)
        .map_err(|_| FormatError::TruncatedHeader)?;
    let dict_size = u32::from_le_bytes(size_buf) as usize;
    let mut dict_stream = vec![0u8; dict_size];
    src.read_exact(&mut dict_stream)
        .map_err(|_| FormatError::TruncatedStream)?;
    stats.read += 4 + dict_size as u64;

    let config = CoderConfig::default();
    let mut blob = Vec::new();
    Codec::new(variant, config).decode_block(&dict_stream, &mut blob)?;
    lcp_decode(&mut blob)?;
    let dict = Dictionary::load(&blob, false)?;

    let mut codec = Codec::new(variant, config);
    let mut filters = FilterSet::new();
    let mut payload: Vec<u8> = Vec::new();
    let mut work: Vec<u8> = Vec::new();
    let mut out: Vec<u8> = Vec::new();

    loop {
        let mut wrapper = [0u8; WRAPPER_SIZE];
        if !read_wrapper(src, &mut wrapper)? {
            break;
        }
        let size = u32::from_le_bytes([wrapper[0], wrapper[1], wrapper[2], wrapper[3]]) as usize;
        let filt = wrapper[4] != 0;
        let prec = wrapper[5] != 0;

        payload.resize(size, 0);
        src.read_exact(&mut payload)
            .map_err(|_| FormatError::TruncatedStream)?;
        stats.read += (WRAPPER_SIZE + size) as u64;

        let tokens = if prec {
            &payload
        } else {
            codec.decode_block(&payload, &mut work)?;
            &work
        };
        dict.decode_block(tokens, &mut out)?;
        if filt {
            filters.apply(&mut out, Direction::Decode);
        }
        dst.write_all(&out)?;
        stats.written += out.len() as u64;
    }
    dst.flush()?;
    Ok(stats)
}

fn fill_block<R: Read>(src: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Reads one block wrapper; `Ok(false)` on clean end of stream.
fn read_wrapper<R: Read>(src: &mut R, wrapper: &mut [u8]) -> Result<bool, StreamError> {
    let mut filled = 0;
    while filled < wrapper.len() {
        match src.read(&mut wrapper[filled..])? {
            0 if filled == 0 => return Ok(false),
            0 => return Err(FormatError::TruncatedHeader.into()),
            n => filled += n,
        }
    }
    Ok(true)
}
