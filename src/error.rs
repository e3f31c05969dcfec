//! Error types shared by the decoders and the container layer.
//!
//! Decoding is block-level atomic: any of these errors aborts the current
//! block before a single byte of it is committed downstream.

use core::fmt;

/// Errors raised while decoding a compressed stream.
///
/// A mis-coded input produces garbage rather than memory unsafety; every
/// index decoded from the wire is bounds-checked and rejected with one of
/// these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// The container does not start with a known magic sequence.
    BadMagic,
    /// A block or stream header ended before all of its fields.
    TruncatedHeader,
    /// The payload ended before the declared number of bytes.
    TruncatedStream,
    /// The range decoder ran out of input mid-symbol.
    InsufficientInput,
    /// A decoded cumulative frequency does not select any model symbol.
    InvalidSymbol,
    /// A decoded match references data outside the reconstructed block.
    BadMatchPosition,
    /// A decoded dictionary word id exceeds the loaded dictionary.
    BadWordId,
    /// A substream offset or count in a block header is inconsistent.
    BadSubstreamLayout,
    /// The reconstructed size disagrees with the header.
    SizeMismatch,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FormatError::BadMagic => "unrecognized magic header",
            FormatError::TruncatedHeader => "truncated header",
            FormatError::TruncatedStream => "truncated stream",
            FormatError::InsufficientInput => "range coder input exhausted",
            FormatError::InvalidSymbol => "decoded symbol out of range",
            FormatError::BadMatchPosition => "match position out of range",
            FormatError::BadWordId => "dictionary word id out of range",
            FormatError::BadSubstreamLayout => "inconsistent substream layout",
            FormatError::SizeMismatch => "decoded size mismatch",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for FormatError {}

/// Stream-level error: either the container bytes are malformed or the
/// underlying reader/writer failed.
#[derive(Debug)]
pub enum StreamError {
    Io(std::io::Error),
    Format(FormatError),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Io(err) => write!(f, "i/o error: {}", err),
            StreamError::Format(err) => write!(f, "format error: {}", err),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Io(err) => Some(err),
            StreamError::Format(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Io(err)
    }
}

impl From<FormatError> for StreamError {
    fn from(err: FormatError) -> Self {
        StreamError::Format(err)
    }
}
