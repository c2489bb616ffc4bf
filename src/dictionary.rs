//! In-memory Patricia trie.
//!
//! Nodes and node arrays live in two arenas owned by [`Dictionary`] and refer
//! to each other by index. A node owns at most one child array and every
//! array except the root is owned by exactly one node, so splitting a node is
//! a matter of rewriting indices rather than moving subtrees around.
//!
//! Within an array, nodes are kept strictly ordered by their first code
//! point, which lets lookups binary-search each level.

use std::cmp::Ordering;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::char_codec;
use crate::config::DictionaryOptions;
use crate::error::{DictError, Result};
use crate::format::{MAX_TERMINAL_FREQUENCY, MAX_WORD_LENGTH};
use crate::word::Word;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(pub(crate) usize);

/// A string with a weight, used for shortcut and bigram targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeightedString {
    pub word: String,
    pub frequency: u32,
}

impl WeightedString {
    pub fn new(word: impl Into<String>, frequency: u32) -> Self {
        Self {
            word: word.into(),
            frequency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) chars: Vec<u32>,
    /// `Some` when a word ends here.
    pub(crate) frequency: Option<u8>,
    pub(crate) shortcuts: Vec<WeightedString>,
    pub(crate) bigrams: Vec<WeightedString>,
    pub(crate) not_a_word: bool,
    pub(crate) blacklisted: bool,
    pub(crate) children: Option<ArrayId>,
}

impl Node {
    fn new(chars: Vec<u32>) -> Self {
        Self {
            chars,
            frequency: None,
            shortcuts: Vec::new(),
            bigrams: Vec::new(),
            not_a_word: false,
            blacklisted: false,
            children: None,
        }
    }

    pub fn chars(&self) -> &[u32] {
        &self.chars
    }

    pub fn frequency(&self) -> Option<u8> {
        self.frequency
    }

    pub fn is_terminal(&self) -> bool {
        self.frequency.is_some()
    }

    pub fn shortcuts(&self) -> &[WeightedString] {
        &self.shortcuts
    }

    pub fn bigrams(&self) -> &[WeightedString] {
        &self.bigrams
    }

    pub fn is_not_a_word(&self) -> bool {
        self.not_a_word
    }

    pub fn is_blacklisted(&self) -> bool {
        self.blacklisted
    }

    pub fn children(&self) -> Option<ArrayId> {
        self.children
    }

    fn first_char(&self) -> u32 {
        self.chars.first().copied().unwrap_or(0)
    }

    /// Merge new terminal data into this node. The higher frequency wins and
    /// attribute lists are unioned, keeping the stronger weight per target.
    fn update(
        &mut self,
        frequency: u8,
        shortcuts: &[WeightedString],
        bigrams: &[WeightedString],
        not_a_word: bool,
        blacklisted: bool,
    ) {
        if self.frequency.map_or(true, |f| frequency > f) {
            self.frequency = Some(frequency);
        }
        merge_weighted(&mut self.shortcuts, shortcuts);
        merge_weighted(&mut self.bigrams, bigrams);
        self.not_a_word = not_a_word;
        self.blacklisted = blacklisted;
    }
}

fn merge_weighted(into: &mut Vec<WeightedString>, from: &[WeightedString]) {
    for target in from {
        match into.iter_mut().find(|w| w.word == target.word) {
            Some(existing) => {
                if existing.frequency < target.frequency {
                    existing.frequency = target.frequency;
                }
            }
            None => into.push(target.clone()),
        }
    }
}

/// Ordered, non-empty group of sibling nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeArray {
    pub(crate) nodes: Vec<NodeId>,
}

impl NodeArray {
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Terminal data for one insertion.
#[derive(Debug, Clone, Default)]
pub struct Entry<'a> {
    pub frequency: u32,
    pub shortcuts: &'a [WeightedString],
    pub bigrams: &'a [WeightedString],
    pub not_a_word: bool,
    pub blacklisted: bool,
}

#[derive(Debug, Clone)]
pub struct Dictionary {
    nodes: Vec<Node>,
    arrays: Vec<NodeArray>,
    root: ArrayId,
    pub options: DictionaryOptions,
}

impl Dictionary {
    pub fn new(options: DictionaryOptions) -> Self {
        Self {
            nodes: Vec::new(),
            arrays: vec![NodeArray::default()],
            root: ArrayId(0),
            options,
        }
    }

    pub fn root(&self) -> ArrayId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn array(&self, id: ArrayId) -> &NodeArray {
        &self.arrays[id.0]
    }

    fn alloc_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn alloc_array(&mut self, nodes: Vec<NodeId>) -> ArrayId {
        self.arrays.push(NodeArray { nodes });
        ArrayId(self.arrays.len() - 1)
    }

    /// Append a fully formed node to `array`. Used by the decoder, which
    /// reads siblings in on-disk order and sorts afterwards.
    pub(crate) fn push_decoded_node(&mut self, array: ArrayId, node: Node) -> NodeId {
        let id = self.alloc_node(node);
        self.arrays[array.0].nodes.push(id);
        id
    }

    pub(crate) fn new_decoded_array(&mut self) -> ArrayId {
        self.alloc_array(Vec::new())
    }

    pub(crate) fn set_children(&mut self, node: NodeId, children: Option<ArrayId>) {
        self.nodes[node.0].children = children;
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Restore first-character order in an array read from disk. Arrays
    /// extended in place are stored out of order.
    pub(crate) fn sort_array(&mut self, array: ArrayId) {
        let mut ids = std::mem::take(&mut self.arrays[array.0].nodes);
        ids.sort_by_key(|id| self.nodes[id.0].first_char());
        self.arrays[array.0].nodes = ids;
    }

    pub(crate) fn decoded_node(chars: Vec<u32>) -> Node {
        Node::new(chars)
    }

    // ---------------------------------------------------------------------
    // Insertion

    /// Insert a word with its frequency and optional shortcut targets.
    pub fn add(
        &mut self,
        word: &str,
        frequency: u32,
        shortcuts: &[WeightedString],
        not_a_word: bool,
    ) -> Result<()> {
        self.insert(
            word,
            Entry {
                frequency,
                shortcuts,
                bigrams: &[],
                not_a_word,
                blacklisted: false,
            },
        )
    }

    /// Insert a word that must never be suggested. It is stored with
    /// frequency zero.
    pub fn add_blacklist_entry(
        &mut self,
        word: &str,
        shortcuts: &[WeightedString],
        not_a_word: bool,
    ) -> Result<()> {
        self.insert(
            word,
            Entry {
                frequency: 0,
                shortcuts,
                bigrams: &[],
                not_a_word,
                blacklisted: true,
            },
        )
    }

    /// Insert or merge a word. Words of [`MAX_WORD_LENGTH`] code points or
    /// more are dropped with a warning.
    pub fn insert(&mut self, word: &str, entry: Entry<'_>) -> Result<()> {
        if word.is_empty() {
            return Err(DictError::InvalidInput("cannot insert an empty word".into()));
        }
        if entry.frequency > MAX_TERMINAL_FREQUENCY {
            return Err(DictError::InvalidInput(format!(
                "frequency {} of \"{word}\" exceeds {MAX_TERMINAL_FREQUENCY}",
                entry.frequency
            )));
        }
        let word_chars = char_codec::code_points(word);
        if word_chars.len() >= MAX_WORD_LENGTH {
            warn!(
                "ignoring \"{word}\": {} code points, limit is {}",
                word_chars.len(),
                MAX_WORD_LENGTH - 1
            );
            return Ok(());
        }
        let frequency = entry.frequency as u8;

        let mut array = self.root;
        let mut char_index = 0;
        loop {
            let Some(pos) = self.find_index_of_char(array, word_chars[char_index]) else {
                // Nothing here accepts the word: a fresh leaf in this array.
                let mut node = Node::new(word_chars[char_index..].to_vec());
                node.update(
                    frequency,
                    entry.shortcuts,
                    entry.bigrams,
                    entry.not_a_word,
                    entry.blacklisted,
                );
                let id = self.alloc_node(node);
                let at = self.find_insertion_index(array, word_chars[char_index]);
                self.arrays[array.0].nodes.insert(at, id);
                return Ok(());
            };
            let node_id = self.arrays[array.0].nodes[pos];
            let node_chars = &self.nodes[node_id.0].chars;
            let diff = compare_char_arrays(node_chars, &word_chars, char_index);
            match diff {
                CharMatch::Equal => {
                    self.nodes[node_id.0].update(
                        frequency,
                        entry.shortcuts,
                        entry.bigrams,
                        entry.not_a_word,
                        entry.blacklisted,
                    );
                    return Ok(());
                }
                CharMatch::NodeIsPrefix => {
                    char_index += self.nodes[node_id.0].chars.len();
                    match self.nodes[node_id.0].children {
                        Some(children) => array = children,
                        None => {
                            let mut leaf = Node::new(word_chars[char_index..].to_vec());
                            leaf.update(
                                frequency,
                                entry.shortcuts,
                                entry.bigrams,
                                entry.not_a_word,
                                entry.blacklisted,
                            );
                            let leaf_id = self.alloc_node(leaf);
                            let children = self.alloc_array(vec![leaf_id]);
                            self.nodes[node_id.0].children = Some(children);
                            return Ok(());
                        }
                    }
                }
                CharMatch::DiffersAt(split) => {
                    self.split_node(node_id, split, &word_chars[char_index..], &entry, frequency);
                    return Ok(());
                }
            }
        }
    }

    /// Split `node_id` after `split` characters. The old tail keeps the
    /// node's terminal data and children; the node itself becomes the shared
    /// prefix, terminal only if the new word ends exactly there.
    fn split_node(
        &mut self,
        node_id: NodeId,
        split: usize,
        rest: &[u32],
        entry: &Entry<'_>,
        frequency: u8,
    ) {
        let old = &mut self.nodes[node_id.0];
        let tail = Node {
            chars: old.chars.split_off(split),
            frequency: old.frequency.take(),
            shortcuts: std::mem::take(&mut old.shortcuts),
            bigrams: std::mem::take(&mut old.bigrams),
            not_a_word: std::mem::replace(&mut old.not_a_word, false),
            blacklisted: std::mem::replace(&mut old.blacklisted, false),
            children: old.children.take(),
        };
        let tail_first = tail.first_char();
        let tail_id = self.alloc_node(tail);

        let children = if rest.len() == split {
            self.nodes[node_id.0].update(
                frequency,
                entry.shortcuts,
                entry.bigrams,
                entry.not_a_word,
                entry.blacklisted,
            );
            vec![tail_id]
        } else {
            let mut leaf = Node::new(rest[split..].to_vec());
            leaf.update(
                frequency,
                entry.shortcuts,
                entry.bigrams,
                entry.not_a_word,
                entry.blacklisted,
            );
            let leaf_first = leaf.first_char();
            let leaf_id = self.alloc_node(leaf);
            if leaf_first > tail_first {
                vec![tail_id, leaf_id]
            } else {
                vec![leaf_id, tail_id]
            }
        };
        let array = self.alloc_array(children);
        self.nodes[node_id.0].children = Some(array);
    }

    /// Record that `word1` is often followed by `word2`. A missing `word2` is
    /// added with frequency zero.
    pub fn set_bigram(&mut self, word1: &str, word2: &str, frequency: u32) -> Result<()> {
        if self.find_word(word1).is_none() {
            return Err(DictError::InvalidInput(format!(
                "first word of bigram \"{word1}\" -> \"{word2}\" is not in the dictionary"
            )));
        }
        if frequency > MAX_TERMINAL_FREQUENCY {
            return Err(DictError::InvalidInput(format!(
                "bigram frequency {frequency} exceeds {MAX_TERMINAL_FREQUENCY}"
            )));
        }
        if self.find_word(word2).is_none() {
            self.add(word2, 0, &[], false)?;
        }
        // Adding word2 may have split the node word1 ended on.
        let Some(node) = self.find_word(word1) else {
            return Err(DictError::InvalidInput(format!(
                "\"{word1}\" disappeared while adding \"{word2}\""
            )));
        };
        let bigrams = &mut self.nodes[node.0].bigrams;
        match bigrams.iter_mut().find(|b| b.word == word2) {
            Some(existing) => existing.frequency = frequency,
            None => bigrams.push(WeightedString::new(word2, frequency)),
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Lookup

    fn find_index_of_char(&self, array: ArrayId, c: u32) -> Option<usize> {
        self.arrays[array.0]
            .nodes
            .binary_search_by(|id| self.nodes[id.0].first_char().cmp(&c))
            .ok()
    }

    fn find_insertion_index(&self, array: ArrayId, c: u32) -> usize {
        let nodes = &self.arrays[array.0].nodes;
        nodes.partition_point(|id| self.nodes[id.0].first_char() < c)
    }

    /// Terminal node for `word`, if the word is stored.
    pub fn find_word(&self, word: &str) -> Option<NodeId> {
        let chars = char_codec::code_points(word);
        if chars.is_empty() {
            return None;
        }
        let mut array = self.root;
        let mut index = 0;
        loop {
            let pos = self.find_index_of_char(array, chars[index])?;
            let node_id = self.arrays[array.0].nodes[pos];
            let node = &self.nodes[node_id.0];
            let end = index + node.chars.len();
            if end > chars.len() || chars[index..end] != node.chars[..] {
                return None;
            }
            index = end;
            if index == chars.len() {
                return node.is_terminal().then_some(node_id);
            }
            array = node.children?;
        }
    }

    pub fn has_word(&self, word: &str) -> bool {
        self.find_word(word).is_some()
    }

    /// Frequency of a stored word.
    pub fn frequency_of(&self, word: &str) -> Option<u8> {
        self.find_word(word).and_then(|id| self.node(id).frequency)
    }

    pub fn count_nodes(&self) -> usize {
        self.arrays_in_order()
            .iter()
            .map(|&a| self.arrays[a.0].nodes.len())
            .sum()
    }

    pub fn count_node_arrays(&self) -> usize {
        self.arrays_in_order().len()
    }

    pub fn has_bigrams(&self) -> bool {
        self.arrays_in_order().iter().any(|&a| {
            self.arrays[a.0]
                .nodes
                .iter()
                .any(|id| !self.nodes[id.0].bigrams.is_empty())
        })
    }

    pub fn is_empty(&self) -> bool {
        self.arrays[self.root.0].nodes.is_empty()
    }

    /// Reachable arrays in pre-order: an array, then the subtrees of each of
    /// its nodes in sibling order.
    pub fn arrays_in_order(&self) -> Vec<ArrayId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(array) = stack.pop() {
            out.push(array);
            for id in self.arrays[array.0].nodes.iter().rev() {
                if let Some(children) = self.nodes[id.0].children {
                    stack.push(children);
                }
            }
        }
        out
    }

    /// Every stored word, in trie order.
    pub fn words(&self) -> Words<'_> {
        Words {
            dict: self,
            stack: vec![Frame {
                array: self.root,
                next: 0,
                prefix_len: 0,
            }],
            prefix: Vec::new(),
        }
    }

    /// Check the first-character ordering of every reachable array.
    pub fn check_ordering(&self) -> bool {
        self.arrays_in_order().iter().all(|&a| {
            self.arrays[a.0].nodes.windows(2).all(|pair| {
                self.nodes[pair[0].0].first_char().cmp(&self.nodes[pair[1].0].first_char())
                    == Ordering::Less
            })
        })
    }
}

/// Outcome of matching a node's characters against the rest of a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharMatch {
    /// The node spells exactly the rest of the word.
    Equal,
    /// The node is a strict prefix of the rest of the word.
    NodeIsPrefix,
    /// Node and word diverge, or the word ends, at this index into the node.
    DiffersAt(usize),
}

/// The first characters are already known to match.
fn compare_char_arrays(node: &[u32], word: &[u32], start: usize) -> CharMatch {
    for i in 1..node.len() {
        if start + i >= word.len() || node[i] != word[start + i] {
            return CharMatch::DiffersAt(i);
        }
    }
    if node.len() == word.len() - start {
        CharMatch::Equal
    } else {
        CharMatch::NodeIsPrefix
    }
}

struct Frame {
    array: ArrayId,
    next: usize,
    prefix_len: usize,
}

/// Pre-order iterator over the terminal nodes of a [`Dictionary`].
pub struct Words<'a> {
    dict: &'a Dictionary,
    stack: Vec<Frame>,
    prefix: Vec<u32>,
}

impl<'a> Iterator for Words<'a> {
    type Item = Word;

    fn next(&mut self) -> Option<Word> {
        loop {
            let frame = self.stack.last_mut()?;
            let nodes = &self.dict.arrays[frame.array.0].nodes;
            if frame.next >= nodes.len() {
                self.stack.pop();
                continue;
            }
            let id = nodes[frame.next];
            frame.next += 1;
            let prefix_len = frame.prefix_len;
            let node = &self.dict.nodes[id.0];
            self.prefix.truncate(prefix_len);
            self.prefix.extend_from_slice(&node.chars);
            if let Some(children) = node.children {
                self.stack.push(Frame {
                    array: children,
                    next: 0,
                    prefix_len: self.prefix.len(),
                });
            }
            if let Some(frequency) = node.frequency {
                // Chars came from `&str` input or were validated on decode.
                let word: String = self.prefix.iter().filter_map(|&c| char::from_u32(c)).collect();
                return Some(Word {
                    word,
                    frequency,
                    shortcuts: node.shortcuts.clone(),
                    bigrams: node.bigrams.clone(),
                    not_a_word: node.not_a_word,
                    blacklisted: node.blacklisted,
                });
            }
        }
    }
}
