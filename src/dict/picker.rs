//! Dictionary trainer: a streaming frequency analysis of the source.
//!
//! The source is read in 200 KiB windows. Candidate words (a letter after a
//! non-letter, then a lowercase run of 2..=20 letters, followed by a space
//! or sentence punctuation) are lowercased and counted in a linear-probing
//! hash table. When the table fills up it compacts itself by discarding
//! everything close to the minimum count, which approximately preserves the
//! frequency ranking. Scanning and insertion alternate between the caller
//! and one worker thread, window by window.
//!
//! The final list keeps words seen more than five times, ranked by count;
//! the tail that will receive 2-byte codes is re-sorted alphabetically so
//! the LCP transform has prefixes to share. Two reserved strings lead the
//! list.

use std::io::Read;
use std::thread;

use super::{level1_word_num, TOTAL_WORD_NUM, WORD_MAXLEN, WORD_MINLEN};

const HASHMAP_MAXSIZE: usize = TOTAL_WORD_NUM * 13 + 1;
const HASHMAP_CAPACITY: usize = TOTAL_WORD_NUM * 23 + 3;
const WORD_MIN_FREQ: u32 = 5;
const WINDOW: usize = 200_000;

const RESERVED_WORDS: [&[u8]; 2] = [b"  ", b"http://www."];

#[derive(Clone, Copy)]
struct Word {
    bytes: [u8; WORD_MAXLEN],
    len: u8,
}

impl Word {
    fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

#[derive(Clone, Copy)]
struct Entry {
    word: Word,
    count: u32,
}

struct WordMap {
    entries: Vec<Entry>,
    live: usize,
}

impl WordMap {
    fn new() -> Self {
        WordMap {
            entries: vec![
                Entry {
                    word: Word {
                        bytes: [0; WORD_MAXLEN],
                        len: 0,
                    },
                    count: 0,
                };
                HASHMAP_CAPACITY
            ],
            live: 0,
        }
    }

    fn hash(word: &[u8]) -> usize {
        let mut hash = 0u32;
        for &b in word {
            hash = hash.wrapping_mul(131_313_131).wrapping_add(u32::from(b));
        }
        (hash & 0x7fff_ffff) as usize % HASHMAP_CAPACITY
    }

    fn slot_of(&self, word: &[u8]) -> usize {
        let mut pos = Self::hash(word);
        while self.entries[pos].count > 0 && self.entries[pos].word.as_slice() != word {
            pos = (pos + 1) % HASHMAP_CAPACITY;
        }
        pos
    }

    fn add(&mut self, word: Word) {
        let pos = self.slot_of(word.as_slice());
        if self.entries[pos].count > 0 {
            self.entries[pos].count += 1;
            return;
        }
        self.entries[pos] = Entry { word, count: 1 };
        self.live += 1;
        if self.live == HASHMAP_MAXSIZE {
            self.compact();
        }
    }

    /// Drops every word whose count is within 5 of the minimum, then
    /// re-inserts the rest.
    fn compact(&mut self) {
        let survivors: Vec<Entry> = self
            .entries
            .iter()
            .filter(|e| e.count > 0)
            .copied()
            .collect();
        let min_count = survivors.iter().map(|e| e.count).min().unwrap_or(0);

        for entry in self.entries.iter_mut() {
            entry.count = 0;
        }
        self.live = 0;
        for entry in survivors {
            if entry.count > min_count + 5 {
                let pos = self.slot_of(entry.word.as_slice());
                self.entries[pos] = entry;
                self.live += 1;
            }
        }
    }
}

/// Candidate words of one window, lowercased.
fn extract_words(buf: &[u8]) -> Vec<Word> {
    let mut words = Vec::new();
    let mut x = 1usize;
    while x < buf.len() {
        if buf[x].is_ascii_alphabetic() && !buf[x - 1].is_ascii_alphabetic() {
            let mut y = x + 1;
            while y < buf.len() && buf[y].is_ascii_lowercase() {
                y += 1;
            }
            if y >= x + WORD_MINLEN
                && y <= x + WORD_MAXLEN
                && y < buf.len()
                && matches!(buf[y], b' ' | b'.' | b',' | b':' | b';')
            {
                let mut word = Word {
                    bytes: [0; WORD_MAXLEN],
                    len: (y - x) as u8,
                };
                for (dst, &src) in word.bytes.iter_mut().zip(&buf[x..y]) {
                    *dst = src.to_ascii_lowercase();
                }
                words.push(word);
            }
            x = y;
        }
        x += 1;
    }
    words
}

/// Scans `src` and produces the newline-separated, NUL-terminated word
/// blob for [`super::Dictionary::load`].
pub fn pick_dictionary<R: Read>(src: &mut R) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; WINDOW];
    let mut map = WordMap::new();
    let mut io_error: Option<std::io::Error> = None;

    thread::scope(|s| {
        let mut pending: Option<thread::ScopedJoinHandle<'_, WordMap>> = None;
        loop {
            let filled = match fill_window(src, &mut buf) {
                Ok(n) => n,
                Err(err) => {
                    io_error = Some(err);
                    break;
                }
            };
            if filled == 0 {
                break;
            }
            buf[filled - 1] = 0;
            let words = extract_words(&buf[..filled]);

            if let Some(handle) = pending.take() {
                map = handle.join().expect("picker worker panicked");
            }
            let mut worker_map = std::mem::replace(&mut map, WordMap::new());
            pending = Some(s.spawn(move || {
                for word in words {
                    worker_map.add(word);
                }
                worker_map
            }));
        }
        if let Some(handle) = pending.take() {
            map = handle.join().expect("picker worker panicked");
        }
    });
    if let Some(err) = io_error {
        return Err(err);
    }

    // rank by count, ties broken by reverse word order
    let mut list: Vec<Entry> = map
        .entries
        .iter()
        .filter(|e| e.count > WORD_MIN_FREQ)
        .copied()
        .collect();
    list.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| b.word.as_slice().cmp(a.word.as_slice()))
    });

    let reserved = RESERVED_WORDS.len();
    let kept = list.len().min(TOTAL_WORD_NUM - reserved);
    list.truncate(kept);

    // the 2-byte-coded tail must sort alphabetically for LCP sharing
    if kept > level1_word_num(kept).saturating_sub(reserved) {
        let split = level1_word_num(kept).saturating_sub(reserved);
        list[split..].sort_by(|a, b| a.word.as_slice().cmp(b.word.as_slice()));
    }

    let mut blob = Vec::with_capacity((kept + reserved) * (WORD_MAXLEN + 1) + 1);
    for word in RESERVED_WORDS {
        blob.extend_from_slice(word);
        blob.push(b'\n');
    }
    for (i, entry) in list.iter().enumerate() {
        // 2-byte codes plus an escape byte cannot pay for two-letter words
        if i < level1_word_num(kept) || entry.word.len as usize >= WORD_MINLEN + 1 {
            blob.extend_from_slice(entry.word.as_slice());
            blob.push(b'\n');
        }
    }
    blob.push(0);
    Ok(blob)
}

fn fill_window<R: Read>(src: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
