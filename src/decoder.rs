//! Binary reader.
//!
//! All positions handled here are absolute offsets into the file buffer,
//! i.e. the header size plus the body address the encoder assigned.
//!
//! Decoding walks node arrays depth first. Each finished array is recorded
//! by position so a second reference reuses it instead of re-reading, and
//! arrays still being read are tracked so a children pointer back into the
//! current path is reported instead of followed. Bigram targets are kept as
//! positions until the whole trie is built, then resolved to words through a
//! cache that lives only as long as the call.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::path::Path;

use log::{debug, warn};
use memmap2::Mmap;

use crate::bigram;
use crate::buffer::{offset_position, ByteReader};
use crate::char_codec;
use crate::config::{ContainerKind, FormatOptions};
use crate::container::SideTables;
use crate::dictionary::{ArrayId, Dictionary, NodeId, WeightedString};
use crate::error::{DictError, Result};
use crate::format::{
    FLAG_ATTRIBUTE_HAS_NEXT, FLAG_ATTRIBUTE_OFFSET_NEGATIVE, FLAG_HAS_BIGRAMS,
    FLAG_HAS_MULTIPLE_CHARS, FLAG_HAS_SHORTCUT_TARGETS, FLAG_IS_BLACKLISTED, FLAG_IS_DELETED,
    FLAG_IS_MOVED, FLAG_IS_NOT_A_WORD, FLAG_IS_NOT_MOVED, FLAG_IS_TERMINAL,
    MASK_ATTRIBUTE_ADDRESS_TYPE, MASK_ATTRIBUTE_FREQUENCY, MASK_CHILDREN_ADDRESS_TYPE,
    MASK_MOVE_AND_DELETE_FLAG, MAX_BIGRAMS_IN_A_PTNODE, MAX_JUMPS, MAX_WORD_LENGTH,
    NO_FORWARD_LINK_ADDRESS, NO_PARENT_ADDRESS,
};
use crate::header::{self, FileHeader};

/// A bigram whose target has not been turned into a word yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAttribute {
    /// Quantized nibble as stored.
    pub frequency: u8,
    /// Absolute position of the target node.
    pub address: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Live,
    /// Tombstone; the live copy sits at the given position.
    Moved(usize),
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Frequency(u8),
    Id(u32),
}

/// One node exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNode {
    pub position: usize,
    pub flags: u8,
    pub state: NodeState,
    pub parent: Option<usize>,
    pub chars: Vec<u32>,
    pub terminal: Option<Terminal>,
    /// Position of the signed children field, dynamic files only.
    pub children_field: usize,
    pub children: Option<usize>,
    pub shortcuts: Vec<WeightedString>,
    pub bigrams: Vec<PendingAttribute>,
    /// First byte after the node.
    pub end: usize,
}

impl RawNode {
    pub fn is_not_a_word(&self) -> bool {
        self.flags & FLAG_IS_NOT_A_WORD != 0
    }

    pub fn is_blacklisted(&self) -> bool {
        self.flags & FLAG_IS_BLACKLISTED != 0
    }
}

/// Where terminal data lives.
#[derive(Clone, Copy)]
pub(crate) enum TerminalSource<'a> {
    Inline,
    Split(&'a SideTables),
}

pub(crate) fn read_count(reader: &mut ByteReader<'_>) -> Result<usize> {
    let first = reader.read_u8()?;
    if first & 0x80 == 0 {
        return Ok(usize::from(first));
    }
    let second = reader.read_u8()?;
    Ok((usize::from(first & 0x7F) << 8) | usize::from(second))
}

/// Reading context for one buffer.
pub(crate) struct Reader<'a> {
    pub data: &'a [u8],
    pub header_size: usize,
    pub options: FormatOptions,
    source: TerminalSource<'a>,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8], header: &FileHeader, source: TerminalSource<'a>) -> Self {
        Self {
            data,
            header_size: header.header_size,
            options: header.format_options,
            source,
        }
    }

    pub fn root(&self) -> usize {
        self.header_size
    }

    pub fn read_node(&self, position: usize) -> Result<RawNode> {
        let len = self.data.len();
        let mut r = ByteReader::at(self.data, position);
        let flags = r.read_u8()?;

        let mut state = NodeState::Live;
        let mut parent = None;
        if self.options.supports_dynamic_update {
            let offset = r.read_signed24()?;
            match flags & MASK_MOVE_AND_DELETE_FLAG {
                FLAG_IS_NOT_MOVED => {}
                FLAG_IS_MOVED => state = NodeState::Moved(offset_position(position, offset, len)?),
                FLAG_IS_DELETED => state = NodeState::Deleted,
                _ => {
                    return Err(DictError::Malformed(format!(
                        "node at {position} has no move state"
                    )))
                }
            }
            if offset != NO_PARENT_ADDRESS && !matches!(state, NodeState::Moved(_)) {
                parent = Some(offset_position(position, offset, len)?);
            }
        }

        let chars = char_codec::read_run(&mut r, flags & FLAG_HAS_MULTIPLE_CHARS != 0, MAX_WORD_LENGTH)?;
        let terminal = if flags & FLAG_IS_TERMINAL == 0 {
            None
        } else if self.options.has_terminal_id {
            Some(Terminal::Id(r.read_u32()?))
        } else {
            Some(Terminal::Frequency(r.read_u8()?))
        };

        let children_field = r.position();
        let children = if self.options.supports_dynamic_update {
            match r.read_signed24()? {
                0 => None,
                offset => Some(offset_position(children_field, offset, len)?),
            }
        } else {
            let size = usize::from((flags & MASK_CHILDREN_ADDRESS_TYPE) >> 6);
            if size == 0 {
                None
            } else {
                let offset = r.read_uint(size)? as i32;
                Some(offset_position(children_field, offset, len)?)
            }
        };

        let mut shortcuts = Vec::new();
        let mut bigrams = Vec::new();
        if self.options.inline_attributes() {
            if flags & FLAG_HAS_SHORTCUT_TARGETS != 0 {
                shortcuts = read_shortcut_list(&mut r)?;
            }
            if flags & FLAG_HAS_BIGRAMS != 0 {
                bigrams = read_bigram_list(&mut r)?;
            }
        }

        Ok(RawNode {
            position,
            flags,
            state,
            parent,
            chars,
            terminal,
            children_field,
            children,
            shortcuts,
            bigrams,
            end: r.position(),
        })
    }

    /// Forward link stored after `count` nodes ending at `end`, dynamic
    /// files only.
    pub fn read_forward_link(&self, end: usize) -> Result<Option<usize>> {
        if !self.options.supports_dynamic_update {
            return Ok(None);
        }
        let link = ByteReader::at(self.data, end).read_u24()? as i32;
        if link == NO_FORWARD_LINK_ADDRESS {
            return Ok(None);
        }
        Ok(Some(offset_position(0, link, self.data.len())?))
    }

    /// Frequency of a live terminal, looking through to side tables.
    fn frequency(&self, terminal: Terminal) -> Result<u8> {
        match (terminal, self.source) {
            (Terminal::Frequency(f), _) => Ok(f),
            (Terminal::Id(id), TerminalSource::Split(tables)) => tables.frequency(id),
            (Terminal::Id(_), TerminalSource::Inline) => Err(DictError::UnsupportedFormat(
                "terminal ids need the frequency side table".into(),
            )),
        }
    }

    /// Shortcuts and pending bigrams of a live terminal.
    fn attributes(&self, node: &RawNode) -> Result<(Vec<WeightedString>, Vec<PendingAttribute>)> {
        match (node.terminal, self.source) {
            (Some(Terminal::Id(id)), TerminalSource::Split(tables)) => {
                let mut bigrams = Vec::new();
                for (frequency, target) in tables.bigrams(id)? {
                    bigrams.push(PendingAttribute {
                        frequency,
                        address: self.header_size + tables.terminal_address(target)?,
                    });
                }
                Ok((tables.shortcuts(id)?, bigrams))
            }
            _ => Ok((node.shortcuts.clone(), node.bigrams.clone())),
        }
    }

    /// Follow moved tombstones to the live node.
    pub fn read_live_node(&self, position: usize) -> Result<RawNode> {
        let mut node = self.read_node(position)?;
        let mut jumps = 0;
        while let NodeState::Moved(to) = node.state {
            jumps += 1;
            if jumps > MAX_JUMPS {
                return Err(DictError::Malformed(format!(
                    "more than {MAX_JUMPS} moved hops from {position}"
                )));
            }
            node = self.read_node(to)?;
        }
        Ok(node)
    }
}

fn read_shortcut_list(r: &mut ByteReader<'_>) -> Result<Vec<WeightedString>> {
    let start = r.position();
    let size = usize::from(r.read_u16()?);
    let mut shortcuts = Vec::new();
    loop {
        let flags = r.read_u8()?;
        let word = char_codec::read_string(r)?;
        shortcuts.push(WeightedString::new(word, u32::from(flags & MASK_ATTRIBUTE_FREQUENCY)));
        if flags & FLAG_ATTRIBUTE_HAS_NEXT == 0 {
            break;
        }
    }
    if r.position() != start + size {
        return Err(DictError::Malformed(format!(
            "shortcut list at {start} declares {size} bytes but spans {}",
            r.position() - start
        )));
    }
    Ok(shortcuts)
}

fn read_bigram_list(r: &mut ByteReader<'_>) -> Result<Vec<PendingAttribute>> {
    let mut bigrams = Vec::new();
    for _ in 0..MAX_BIGRAMS_IN_A_PTNODE {
        let flags = r.read_u8()?;
        let base = r.position();
        let size = usize::from((flags & MASK_ATTRIBUTE_ADDRESS_TYPE) >> 4);
        if size == 0 {
            return Err(DictError::Malformed(format!("bigram at {} has no address", base - 1)));
        }
        let magnitude = r.read_uint(size)? as i32;
        let offset = if flags & FLAG_ATTRIBUTE_OFFSET_NEGATIVE != 0 {
            -magnitude
        } else {
            magnitude
        };
        bigrams.push(PendingAttribute {
            frequency: flags & MASK_ATTRIBUTE_FREQUENCY,
            address: offset_position(base, offset, r.len())?,
        });
        if flags & FLAG_ATTRIBUTE_HAS_NEXT == 0 {
            return Ok(bigrams);
        }
    }
    Err(DictError::Malformed(format!(
        "bigram list at {} has no last entry within {MAX_BIGRAMS_IN_A_PTNODE}",
        r.position()
    )))
}

// ---------------------------------------------------------------------------
// Word at address

/// Resolves node positions to words. The cache is owned by one decode call.
pub(crate) struct WordResolver<'r, 'a> {
    reader: &'r Reader<'a>,
    cache: HashMap<usize, (String, Option<u8>)>,
}

impl<'r, 'a> WordResolver<'r, 'a> {
    pub fn new(reader: &'r Reader<'a>) -> Self {
        Self {
            reader,
            cache: HashMap::new(),
        }
    }

    /// Word ending at `position` and its frequency when it is a live terminal.
    pub fn word_at(&mut self, position: usize) -> Result<(String, Option<u8>)> {
        if let Some(hit) = self.cache.get(&position) {
            return Ok(hit.clone());
        }
        let (chars, frequency) = if self.reader.options.supports_dynamic_update {
            self.walk_up(position)?
        } else {
            self.descend(position)?
        };
        let resolved = (char_codec::code_points_to_string(&chars)?, frequency);
        self.cache.insert(position, resolved.clone());
        Ok(resolved)
    }

    fn live_frequency(&self, node: &RawNode) -> Result<Option<u8>> {
        match (node.state, node.terminal) {
            (NodeState::Live, Some(t)) => self.reader.frequency(t).map(Some),
            _ => Ok(None),
        }
    }

    /// Prepend runs while following parent pointers to the root.
    fn walk_up(&self, position: usize) -> Result<(Vec<u32>, Option<u8>)> {
        let node = self.reader.read_live_node(position)?;
        let frequency = self.live_frequency(&node)?;
        let mut runs = vec![node.chars];
        let mut total = runs[0].len();
        let mut parent = node.parent;
        while let Some(p) = parent {
            let node = self.reader.read_live_node(p)?;
            total += node.chars.len();
            if total > MAX_WORD_LENGTH {
                return Err(DictError::Malformed(format!(
                    "word at {position} is longer than {MAX_WORD_LENGTH}"
                )));
            }
            runs.push(node.chars);
            parent = node.parent;
        }
        Ok((runs.into_iter().rev().flatten().collect(), frequency))
    }

    /// Without parent pointers, find the path from the root. In pre-order a
    /// node's subtree starts at its children array and ends where the next
    /// sibling's children begin, so at each level the last node whose
    /// children start at or before the target owns it.
    fn descend(&self, target: usize) -> Result<(Vec<u32>, Option<u8>)> {
        let mut word = Vec::new();
        let mut array = self.reader.root();
        for _ in 0..=MAX_WORD_LENGTH {
            let mut r = ByteReader::at(self.reader.data, array);
            let count = read_count(&mut r)?;
            let mut position = r.position();
            let mut candidate = None;
            for _ in 0..count {
                let node = self.reader.read_node(position)?;
                position = node.end;
                if node.position == target {
                    let frequency = self.live_frequency(&node)?;
                    word.extend_from_slice(&node.chars);
                    return Ok((word, frequency));
                }
                if matches!(node.children, Some(c) if c <= target) {
                    candidate = Some(node);
                }
            }
            let Some(owner) = candidate else {
                break;
            };
            word.extend_from_slice(&owner.chars);
            array = owner.children.unwrap_or(array);
        }
        Err(DictError::Malformed(format!("no node starts at {target}")))
    }
}

// ---------------------------------------------------------------------------
// Whole-dictionary decode

#[derive(Default)]
struct DecodeState {
    /// array position -> decoded array
    arrays: HashMap<usize, ArrayId>,
    /// node position -> decoded node
    nodes: HashMap<usize, NodeId>,
    in_progress: HashSet<usize>,
    pending: Vec<(NodeId, Vec<PendingAttribute>)>,
}

/// Decode a version 2 or 3 dictionary from one buffer.
pub fn decode(data: &[u8]) -> Result<Dictionary> {
    let header = header::read_header(data)?;
    if header.format_options.container() == ContainerKind::Split {
        return Err(DictError::UnsupportedFormat(format!(
            "version {} dictionaries are split, read them with container::read_dir",
            header.format_options.version
        )));
    }
    decode_with(data, &header, TerminalSource::Inline)
}

pub(crate) fn decode_with(data: &[u8], header: &FileHeader, source: TerminalSource<'_>) -> Result<Dictionary> {
    let reader = Reader::new(data, header, source);
    let mut dict = Dictionary::new(header.dictionary_options.clone());
    let mut state = DecodeState::default();
    let root = dict.root();
    read_array_chain(&reader, reader.root(), root, 0, &mut dict, &mut state)?;
    debug!(
        "decoded {} node arrays, {} nodes",
        state.arrays.len() + 1,
        state.nodes.len()
    );

    let mut resolver = WordResolver::new(&reader);
    for (id, pending) in std::mem::take(&mut state.pending) {
        let mut bigrams = Vec::with_capacity(pending.len());
        for attribute in pending {
            let (word, frequency) = resolver.word_at(attribute.address)?;
            let Some(unigram) = frequency else {
                warn!("dropping bigram to \"{word}\", which is no longer a word");
                continue;
            };
            let frequency = bigram::reconstruct(u32::from(unigram), attribute.frequency);
            bigrams.push(WeightedString::new(word, frequency));
        }
        dict.node_mut(id).bigrams = bigrams;
    }
    Ok(dict)
}

fn read_array_chain(
    reader: &Reader<'_>,
    start: usize,
    target: ArrayId,
    depth: usize,
    dict: &mut Dictionary,
    state: &mut DecodeState,
) -> Result<()> {
    if depth > MAX_WORD_LENGTH {
        return Err(DictError::Malformed(format!(
            "node arrays nest deeper than {MAX_WORD_LENGTH} at {start}"
        )));
    }
    state.in_progress.insert(start);
    let mut visited = HashSet::new();
    let mut position = start;
    loop {
        if !visited.insert(position) || visited.len() > MAX_JUMPS {
            return Err(DictError::Malformed(format!(
                "forward link chain from {start} loops or exceeds {MAX_JUMPS} jumps"
            )));
        }
        let mut r = ByteReader::at(reader.data, position);
        let count = read_count(&mut r)?;
        let mut node_position = r.position();
        for _ in 0..count {
            let raw = reader.read_node(node_position)?;
            node_position = raw.end;
            if matches!(raw.state, NodeState::Moved(_)) {
                continue;
            }
            read_node_into(reader, raw, target, depth, dict, state)?;
        }
        match reader.read_forward_link(node_position)? {
            Some(next) => position = next,
            None => break,
        }
    }
    state.in_progress.remove(&start);
    dict.sort_array(target);
    Ok(())
}

fn read_node_into(
    reader: &Reader<'_>,
    raw: RawNode,
    target: ArrayId,
    depth: usize,
    dict: &mut Dictionary,
    state: &mut DecodeState,
) -> Result<()> {
    let children = match raw.children {
        None => None,
        Some(c) if state.in_progress.contains(&c) => {
            return Err(DictError::Malformed(format!(
                "node at {} points back to enclosing array {c}",
                raw.position
            )))
        }
        Some(c) => match state.arrays.get(&c) {
            Some(&existing) => Some(existing),
            None => {
                let child = dict.new_decoded_array();
                read_array_chain(reader, c, child, depth + 1, dict, state)?;
                state.arrays.insert(c, child);
                Some(child)
            }
        },
    }
    .filter(|&a| !dict.array(a).is_empty());

    let live_terminal = match (raw.state, raw.terminal) {
        (NodeState::Live, Some(t)) => Some(t),
        _ => None,
    };
    // Branch points without words below them carry nothing.
    if live_terminal.is_none() && children.is_none() {
        return Ok(());
    }

    let mut node = Dictionary::decoded_node(raw.chars.clone());
    let mut pending = Vec::new();
    if let Some(terminal) = live_terminal {
        node.frequency = Some(reader.frequency(terminal)?);
        node.not_a_word = raw.is_not_a_word();
        node.blacklisted = raw.is_blacklisted();
        let (shortcuts, bigrams) = reader.attributes(&raw)?;
        node.shortcuts = shortcuts;
        pending = bigrams;
    }
    let id = dict.push_decoded_node(target, node);
    dict.set_children(id, children);
    state.nodes.insert(raw.position, id);
    if !pending.is_empty() {
        state.pending.push((id, pending));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Streaming reads

/// Flat view of every word, keyed by the absolute position of its terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnigramsAndBigrams {
    pub words: BTreeMap<usize, String>,
    pub frequencies: BTreeMap<usize, u8>,
    pub bigrams: BTreeMap<usize, Vec<PendingAttribute>>,
}

struct Cursor {
    position: usize,
    remaining: Option<usize>,
    prefix_len: usize,
    jumps: usize,
}

/// Read all words without building a trie. Uses an explicit stack, so depth
/// is bounded by [`MAX_WORD_LENGTH`] rather than by the call stack.
pub fn read_unigrams_and_bigrams(data: &[u8]) -> Result<UnigramsAndBigrams> {
    let header = header::read_header(data)?;
    if header.format_options.container() == ContainerKind::Split {
        return Err(DictError::UnsupportedFormat(
            "split dictionaries keep frequencies in side tables".into(),
        ));
    }
    let reader = Reader::new(data, &header, TerminalSource::Inline);
    let mut out = UnigramsAndBigrams::default();
    let mut prefix: Vec<u32> = Vec::new();
    let mut seen = HashSet::from([reader.root()]);
    let mut stack = vec![Cursor {
        position: reader.root(),
        remaining: None,
        prefix_len: 0,
        jumps: 0,
    }];

    while let Some(top) = stack.last_mut() {
        let remaining = match top.remaining {
            Some(n) => n,
            None => {
                let mut r = ByteReader::at(data, top.position);
                let count = read_count(&mut r)?;
                top.position = r.position();
                top.remaining = Some(count);
                count
            }
        };
        if remaining == 0 {
            match reader.read_forward_link(top.position)? {
                Some(next) => {
                    top.jumps += 1;
                    if top.jumps > MAX_JUMPS {
                        return Err(DictError::Malformed(format!(
                            "more than {MAX_JUMPS} forward links at {next}"
                        )));
                    }
                    top.position = next;
                    top.remaining = None;
                }
                None => {
                    stack.pop();
                }
            }
            continue;
        }

        let node = reader.read_node(top.position)?;
        top.position = node.end;
        top.remaining = Some(remaining - 1);
        let prefix_len = top.prefix_len;
        if matches!(node.state, NodeState::Moved(_)) {
            continue;
        }
        prefix.truncate(prefix_len);
        prefix.extend_from_slice(&node.chars);
        if prefix.len() > MAX_WORD_LENGTH {
            return Err(DictError::Malformed(format!(
                "word through {} is longer than {MAX_WORD_LENGTH}",
                node.position
            )));
        }
        if let (NodeState::Live, Some(Terminal::Frequency(f))) = (node.state, node.terminal) {
            out.words
                .insert(node.position, char_codec::code_points_to_string(&prefix)?);
            out.frequencies.insert(node.position, f);
            if !node.bigrams.is_empty() {
                out.bigrams.insert(node.position, node.bigrams);
            }
        }
        if let Some(children) = node.children {
            if !seen.insert(children) {
                return Err(DictError::Malformed(format!(
                    "node array at {children} is reached twice"
                )));
            }
            stack.push(Cursor {
                position: children,
                remaining: None,
                prefix_len: prefix.len(),
                jumps: 0,
            });
        }
    }
    Ok(out)
}

/// Absolute position of the terminal node for `word`, following forward
/// links and skipping moved nodes. Deleted and non-terminal matches are
/// `None`.
pub fn terminal_position(data: &[u8], word: &str) -> Result<Option<usize>> {
    let header = header::read_header(data)?;
    let reader = Reader::new(data, &header, TerminalSource::Inline);
    find_terminal(&reader, word).map(|found| found.map(|node| node.position))
}

/// Live node spelling exactly `word`, terminal or not, with `None` when the
/// path does not exist.
pub(crate) fn find_node(reader: &Reader<'_>, word: &str) -> Result<Option<RawNode>> {
    let chars = char_codec::code_points(word);
    if chars.is_empty() {
        return Ok(None);
    }
    let mut array = reader.root();
    let mut index = 0;
    'levels: for _ in 0..=MAX_WORD_LENGTH {
        let mut position = array;
        let mut jumps = 0;
        loop {
            let mut r = ByteReader::at(reader.data, position);
            let count = read_count(&mut r)?;
            let mut node_position = r.position();
            for _ in 0..count {
                let node = reader.read_node(node_position)?;
                node_position = node.end;
                if matches!(node.state, NodeState::Moved(_)) || node.chars.first() != Some(&chars[index]) {
                    continue;
                }
                let end = index + node.chars.len();
                if end > chars.len() || chars[index..end] != node.chars[..] {
                    return Ok(None);
                }
                index = end;
                if index == chars.len() {
                    return Ok(Some(node));
                }
                match node.children {
                    Some(c) => {
                        array = c;
                        continue 'levels;
                    }
                    None => return Ok(None),
                }
            }
            match reader.read_forward_link(node_position)? {
                Some(next) => {
                    jumps += 1;
                    if jumps > MAX_JUMPS {
                        return Err(DictError::Malformed(format!(
                            "more than {MAX_JUMPS} forward links from {array}"
                        )));
                    }
                    position = next;
                }
                None => return Ok(None),
            }
        }
    }
    Ok(None)
}

pub(crate) fn find_terminal(reader: &Reader<'_>, word: &str) -> Result<Option<RawNode>> {
    Ok(find_node(reader, word)?
        .filter(|node| node.state == NodeState::Live && node.terminal.is_some()))
}

// ---------------------------------------------------------------------------
// Files

/// Memory-map `path` and decode it.
pub fn load_file(path: &Path) -> Result<Dictionary> {
    let file = File::open(path)?;
    // SAFETY: the map is read only and dropped before this function returns;
    // callers must not truncate the file concurrently.
    let mmap = unsafe { Mmap::map(&file)? };
    decode(&mmap)
}

/// Decode `path`; when it turns out to be corrupt and `delete_on_corrupt` is
/// set, remove it so the next load does not fail the same way. The decode
/// error is returned either way.
pub fn decode_file_or_delete(path: &Path, delete_on_corrupt: bool) -> Result<Dictionary> {
    match load_file(path) {
        Err(e @ (DictError::Malformed(_) | DictError::UnsupportedFormat(_))) if delete_on_corrupt => {
            warn!("deleting unreadable dictionary {}: {e}", path.display());
            fs::remove_file(path)?;
            Err(e)
        }
        other => other,
    }
}

/// Magic and version check on the first bytes of `path`.
pub fn is_valid_file(path: &Path) -> Result<bool> {
    use std::io::Read;
    let mut prefix = Vec::with_capacity(6);
    File::open(path)?.take(6).read_to_end(&mut prefix)?;
    Ok(header::is_valid_format(&prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DictionaryOptions;
    use crate::encoder::encode;
    use crate::word::same_words;

    fn sample() -> Dictionary {
        let mut d = Dictionary::new(DictionaryOptions::new("d", "en"));
        for (w, f) in [("the", 200), ("quick", 90), ("brown", 80), ("fox", 70), ("there", 60)] {
            d.add(w, f, &[], false).unwrap();
        }
        d.add("thx", 5, &[WeightedString::new("thanks", 12)], true)
            .unwrap();
        d.set_bigram("the", "quick", 210).unwrap();
        d.set_bigram("quick", "brown", 120).unwrap();
        d.set_bigram("fox", "the", 230).unwrap();
        d
    }

    #[test]
    fn decodes_every_blob_version() {
        let d = sample();
        for (version, dynamic) in [(2, false), (3, false), (3, true)] {
            let opts = FormatOptions::new(version, dynamic).unwrap();
            let back = decode(&encode(&d, &opts).unwrap()).unwrap();
            let words: Vec<_> = back.words().map(|w| (w.word, w.frequency)).collect();
            let expected: Vec<_> = d.words().map(|w| (w.word, w.frequency)).collect();
            assert_eq!(words, expected, "v{version} dynamic {dynamic}");
            let thx = back.node(back.find_word("thx").unwrap());
            assert!(thx.is_not_a_word());
            assert_eq!(thx.shortcuts(), &[WeightedString::new("thanks", 12)]);
        }
    }

    #[test]
    fn bigrams_resolve_with_and_without_parents() {
        let d = sample();
        for dynamic in [false, true] {
            let opts = FormatOptions::new(3, dynamic).unwrap();
            let back = decode(&encode(&d, &opts).unwrap()).unwrap();
            let the = back.node(back.find_word("the").unwrap());
            assert_eq!(the.bigrams().len(), 1);
            assert_eq!(the.bigrams()[0].word, "quick");
            let fox = back.node(back.find_word("fox").unwrap());
            assert_eq!(fox.bigrams()[0].word, "the");
            let expected = bigram::reconstruct(200, bigram::quantize(200, 230, "the"));
            assert_eq!(fox.bigrams()[0].frequency, expected);
        }
    }

    #[test]
    fn terminal_position_finds_words_only() {
        let d = sample();
        let bytes = encode(&d, &FormatOptions::default()).unwrap();
        let the = terminal_position(&bytes, "the").unwrap().unwrap();
        let reader_header = header::read_header(&bytes).unwrap();
        assert!(the > reader_header.header_size);
        assert!(terminal_position(&bytes, "th").unwrap().is_none());
        assert!(terminal_position(&bytes, "thereafter").unwrap().is_none());
        assert!(terminal_position(&bytes, "zebra").unwrap().is_none());
    }

    #[test]
    fn streaming_read_matches_decode() {
        let d = sample();
        let bytes = encode(&d, &FormatOptions::new(3, true).unwrap()).unwrap();
        let flat = read_unigrams_and_bigrams(&bytes).unwrap();
        assert_eq!(flat.words.len(), 6);
        for (position, word) in &flat.words {
            assert_eq!(terminal_position(&bytes, word).unwrap(), Some(*position));
            assert_eq!(Some(flat.frequencies[position]), d.frequency_of(word));
        }
        let the = terminal_position(&bytes, "the").unwrap().unwrap();
        let quick = terminal_position(&bytes, "quick").unwrap().unwrap();
        assert_eq!(flat.bigrams[&the][0].address, quick);
    }

    #[test]
    fn word_resolver_agrees_in_both_modes() {
        let d = sample();
        for dynamic in [false, true] {
            let bytes = encode(&d, &FormatOptions::new(3, dynamic).unwrap()).unwrap();
            let header = header::read_header(&bytes).unwrap();
            let reader = Reader::new(&bytes, &header, TerminalSource::Inline);
            let mut resolver = WordResolver::new(&reader);
            for w in d.words() {
                let position = terminal_position(&bytes, &w.word).unwrap().unwrap();
                assert_eq!(resolver.word_at(position).unwrap(), (w.word.clone(), Some(w.frequency)));
            }
        }
    }

    #[test]
    fn decoded_dictionary_reencodes_identically() {
        let mut d = Dictionary::new(DictionaryOptions::new("r", "en"));
        for (w, f) in [("alpha", 10), ("alps", 20), ("beta", 30), ("al", 40)] {
            d.add(w, f, &[WeightedString::new("x", 3)], false).unwrap();
        }
        let opts = FormatOptions::new(2, false).unwrap();
        let bytes = encode(&d, &opts).unwrap();
        let back = decode(&bytes).unwrap();
        assert!(same_words(&d, &back));
        assert_eq!(encode(&back, &opts).unwrap(), bytes);
    }

    #[test]
    fn truncated_input_is_malformed() {
        let bytes = encode(&sample(), &FormatOptions::default()).unwrap();
        for cut in [bytes.len() - 1, bytes.len() - 5, 20] {
            assert!(decode(&bytes[..cut]).is_err());
        }
    }

    #[test]
    fn children_cycle_is_rejected() {
        let mut d = Dictionary::new(DictionaryOptions::new("c", "en"));
        d.add("ab", 1, &[], false).unwrap();
        d.add("a", 1, &[], false).unwrap();
        let mut bytes = encode(&d, &FormatOptions::new(3, true).unwrap()).unwrap();
        let header = header::read_header(&bytes).unwrap();
        // root: [count]["a": flags, parent(3), 'a', freq, children(3)]
        let field = header.header_size + 7;
        let mut patches = crate::buffer::Patches::new(bytes.len());
        patches.signed24(field, -7).unwrap();
        patches.apply(&mut bytes);
        assert!(matches!(decode(&bytes), Err(DictError::Malformed(_))));
    }

    #[test]
    fn split_trie_needs_side_tables() {
        let mut d = Dictionary::new(DictionaryOptions::new("c", "en"));
        d.add("a", 1, &[], false).unwrap();
        let header = header::write_header(&d.options, &FormatOptions::new(4, false).unwrap(), false).unwrap();
        assert!(matches!(decode(&header), Err(DictError::UnsupportedFormat(_))));
    }

    #[test]
    fn file_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.dict");
        fs::write(&good, encode(&sample(), &FormatOptions::default()).unwrap()).unwrap();
        assert!(is_valid_file(&good).unwrap());
        assert_eq!(load_file(&good).unwrap().words().count(), 6);

        let bad = dir.path().join("bad.dict");
        fs::write(&bad, b"not a dictionary at all").unwrap();
        assert!(!is_valid_file(&bad).unwrap());
        assert!(decode_file_or_delete(&bad, false).is_err());
        assert!(bad.exists());
        assert!(decode_file_or_delete(&bad, true).is_err());
        assert!(!bad.exists());
    }
}
