//! Static dictionary substitution stage.
//!
//! A pre-trained word list (see [`picker`]) maps English-like words to 1- or
//! 2-byte codes. The first `L` words get 1-byte codes; the rest 2-byte
//! codes whose low byte is `>= L`, which keeps the backward decoder
//! unambiguous. Each word code is followed by one of ten escape bytes that
//! packs the case-reversal flag and the terminator choice, so a single code
//! carries `"word "`, `"word."`, `"Word,"` and friends.
//!
//! The word list itself travels in the container, LCP-compressed (see
//! [`lcp`]) and then LZ-coded like any block.

mod codec;
mod lcp;
mod picker;
mod trie;

pub use lcp::{lcp_decode, lcp_encode};
pub use picker::pick_dictionary;
use trie::Trie;

use crate::error::FormatError;

/// Upper bound on trained words.
pub const TOTAL_WORD_NUM: usize = 25000;
/// Shortest and longest trainable word (letters only, before terminator).
pub const WORD_MINLEN: usize = 2;
pub const WORD_MAXLEN: usize = 20;

/// Number of 1-byte codes for a dictionary of `n` words.
#[inline]
pub fn level1_word_num(n: usize) -> usize {
    (65535 - n) / 255 - 1
}

/// A loaded dictionary: the word list shared by both sides, plus the
/// matching trie on the encoder side.
pub struct Dictionary {
    words: Vec<Vec<u8>>,
    trie: Option<Trie>,
}

impl Dictionary {
    /// Parses the newline-separated, NUL-terminated word blob. Words ending
    /// in a letter get a `' '` terminator appended. With `build_trie` the
    /// encoder-side trie is constructed as well.
    pub fn load(blob: &[u8], build_trie: bool) -> Result<Self, FormatError> {
        let end = blob.iter().position(|&b| b == 0).unwrap_or(blob.len());
        let mut words: Vec<Vec<u8>> = Vec::new();
        let mut cur: Vec<u8> = Vec::new();
        for &b in &blob[..end] {
            if b == b'\n' {
                if cur.last().is_some_and(|c| c.is_ascii_alphabetic()) {
                    cur.push(b' ');
                }
                if cur.is_empty() || cur.len() > WORD_MAXLEN + 2 {
                    return Err(FormatError::BadWordId);
                }
                words.push(std::mem::take(&mut cur));
            } else {
                cur.push(b);
            }
        }
        if !cur.is_empty() || words.is_empty() || words.len() > TOTAL_WORD_NUM {
            return Err(FormatError::BadWordId);
        }

        let trie = if build_trie {
            let mut trie = Trie::new();
            for (id, word) in words.iter().enumerate() {
                trie.add_word(word, id as i32);
            }
            trie.link_case_aliases();
            trie.link_punctuation_aliases();
            Some(trie)
        } else {
            None
        };
        Ok(Dictionary { words, trie })
    }

    /// Number of words; the id one past the end doubles as the
    /// literal-escape marker code.
    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn word(&self, id: usize) -> &[u8] {
        &self.words[id]
    }

    fn trie(&self) -> &Trie {
        self.trie.as_ref().expect("encoder-side dictionary without trie")
    }
}
