//! 128-branch trie over the dictionary words (encoder side only).
//!
//! Node 0 is the root; a zero child index means "no child", which works
//! because the root is never anyone's child. Terminal nodes carry the word
//! id. Two alias passes make the trie case- and punctuation-tolerant:
//! uppercase first letters share the lowercase subtree, and `. , : ;`
//! after a word share the `' '` terminator transition (the escape byte
//! emitted with each code records which terminator was actually present).

struct TrieNode {
    id: i32,
    next: [u32; 128],
}

impl TrieNode {
    fn new() -> Self {
        TrieNode {
            id: -1,
            next: [0; 128],
        }
    }
}

pub(super) struct Trie {
    nodes: Vec<TrieNode>,
}

impl Trie {
    pub(super) fn new() -> Self {
        Trie {
            nodes: vec![TrieNode::new()],
        }
    }

    pub(super) fn add_word(&mut self, word: &[u8], id: i32) {
        let mut node = 0usize;
        for &ch in word {
            if ch >= 128 {
                return;
            }
            let ch = ch as usize;
            if self.nodes[node].next[ch] == 0 {
                self.nodes.push(TrieNode::new());
                let fresh = (self.nodes.len() - 1) as u32;
                self.nodes[node].next[ch] = fresh;
            }
            node = self.nodes[node].next[ch] as usize;
        }
        self.nodes[node].id = id;
    }

    /// Root-level aliases so `The` walks the `the` subtree.
    pub(super) fn link_case_aliases(&mut self) {
        for upper in b'A'..=b'Z' {
            let lower = self.nodes[0].next[(upper + 32) as usize];
            self.nodes[0].next[upper as usize] = lower;
        }
    }

    /// Wherever a `' '` transition exists and the punctuation byte has no
    /// real child, alias it to the space transition.
    pub(super) fn link_punctuation_aliases(&mut self) {
        for i in 0..self.nodes.len() {
            let space = self.nodes[i].next[b' ' as usize];
            if space > 0 {
                for p in [b'.', b',', b':', b';'] {
                    if self.nodes[i].next[p as usize] == 0 {
                        self.nodes[i].next[p as usize] = space;
                    }
                }
            }
        }
    }

    /// Walks from the root along `data[start..]`. On reaching a terminal,
    /// returns the index of the byte that led into it (the terminator
    /// position) and the word id. The walk depth is bounded by the longest
    /// word, so the caller's lookahead guard keeps all reads in range.
    pub(super) fn walk(&self, data: &[u8], start: usize) -> Option<(usize, u32)> {
        let mut node = 0usize;
        let mut j = start;
        loop {
            let ch = data[j];
            if ch >= 128 {
                return None;
            }
            let next = self.nodes[node].next[ch as usize];
            if next == 0 {
                return None;
            }
            let next = next as usize;
            if self.nodes[next].id >= 0 {
                return Some((j, self.nodes[next].id as u32));
            }
            node = next;
            j += 1;
        }
    }
}
