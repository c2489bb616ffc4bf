//! In-place updates of a dynamic (version 3) dictionary buffer.
//!
//! Nothing is ever rewritten where it stands except single fields: flags,
//! parent, children and forward-link addresses. New and changed nodes are
//! appended to the tail as one- or two-node arrays. A node that gets
//! replaced is turned into a tombstone whose parent field points at its
//! replacement, and the replacement is linked into the sibling chain through
//! the chain's last forward link.
//!
//! Appended nodes always use three-byte bigram addresses so their size does
//! not depend on where they land.

use log::{debug, warn};

use crate::address;
use crate::bigram;
use crate::buffer::{ByteReader, Patches};
use crate::char_codec;
use crate::compress;
use crate::decoder::{self, NodeState, PendingAttribute, RawNode, Reader, Terminal, TerminalSource};
use crate::dictionary::{Entry, WeightedString};
use crate::encoder;
use crate::error::{DictError, InvariantViolation, Result};
use crate::format::{
    FLAG_ATTRIBUTE_ADDRESS_TYPE_THREEBYTES, FLAG_ATTRIBUTE_HAS_NEXT, FLAG_ATTRIBUTE_OFFSET_NEGATIVE,
    FLAG_HAS_BIGRAMS, FLAG_HAS_MULTIPLE_CHARS, FLAG_HAS_SHORTCUT_TARGETS, FLAG_IS_BLACKLISTED,
    FLAG_IS_DELETED, FLAG_IS_MOVED, FLAG_IS_NOT_A_WORD, FLAG_IS_NOT_MOVED, FLAG_IS_TERMINAL,
    FORWARD_LINK_ADDRESS_SIZE, MASK_MOVE_AND_DELETE_FLAG, MAX_JUMPS, MAX_TERMINAL_FREQUENCY,
    MAX_WORD_LENGTH, NODE_ATTRIBUTE_FLAGS_SIZE, NODE_ATTRIBUTE_MAX_ADDRESS_SIZE, NODE_FLAGS_SIZE,
    NODE_FREQUENCY_SIZE, NO_PARENT_ADDRESS, PARENT_ADDRESS_SIZE, SIGNED_CHILDREN_ADDRESS_SIZE,
};
use crate::header::{self, FileHeader};

/// A node about to be appended.
#[derive(Debug, Clone, Default)]
struct AppendedNode {
    chars: Vec<u32>,
    frequency: Option<u8>,
    not_a_word: bool,
    blacklisted: bool,
    parent: Option<usize>,
    children: Option<usize>,
    shortcuts: Vec<WeightedString>,
    bigrams: Vec<PendingAttribute>,
}

impl AppendedNode {
    /// Copy of a stored node with a new run. Dead terminals stay dead.
    fn from_raw(raw: &RawNode, chars: Vec<u32>) -> Self {
        let frequency = match (raw.state, raw.terminal) {
            (NodeState::Live, Some(Terminal::Frequency(f))) => Some(f),
            _ => None,
        };
        let live = frequency.is_some();
        Self {
            chars,
            frequency,
            not_a_word: live && raw.is_not_a_word(),
            blacklisted: live && raw.is_blacklisted(),
            parent: None,
            children: raw.children,
            shortcuts: if live { raw.shortcuts.clone() } else { Vec::new() },
            bigrams: if live { raw.bigrams.clone() } else { Vec::new() },
        }
    }

    fn size(&self) -> usize {
        NODE_FLAGS_SIZE
            + PARENT_ADDRESS_SIZE
            + char_codec::run_size(&self.chars)
            + if self.frequency.is_some() { NODE_FREQUENCY_SIZE } else { 0 }
            + SIGNED_CHILDREN_ADDRESS_SIZE
            + compress::shortcut_list_size(&self.shortcuts)
            + self.bigrams.len() * (NODE_ATTRIBUTE_FLAGS_SIZE + NODE_ATTRIBUTE_MAX_ADDRESS_SIZE)
    }

    fn flags(&self) -> u8 {
        let mut flags = FLAG_IS_NOT_MOVED;
        if self.chars.len() > 1 {
            flags |= FLAG_HAS_MULTIPLE_CHARS;
        }
        if self.frequency.is_some() {
            flags |= FLAG_IS_TERMINAL;
        }
        if !self.shortcuts.is_empty() {
            flags |= FLAG_HAS_SHORTCUT_TARGETS;
        }
        if !self.bigrams.is_empty() {
            flags |= FLAG_HAS_BIGRAMS;
        }
        if self.not_a_word {
            flags |= FLAG_IS_NOT_A_WORD;
        }
        if self.blacklisted {
            flags |= FLAG_IS_BLACKLISTED;
        }
        flags
    }

    /// Append at the end of `out`; relative fields are computed from there.
    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let position = out.len();
        out.push(self.flags());
        let parent = match self.parent {
            Some(p) => relative(p, position)?,
            None => NO_PARENT_ADDRESS,
        };
        address::write_signed24(out, parent)?;
        char_codec::write_run(out, &self.chars);
        if let Some(f) = self.frequency {
            out.push(f);
        }
        let field = out.len();
        let children = match self.children {
            Some(c) => relative(c, field)?,
            None => 0,
        };
        address::write_signed24(out, children)?;
        encoder::write_shortcut_list(out, &self.shortcuts)?;
        for (i, b) in self.bigrams.iter().enumerate() {
            let offset = relative(b.address, out.len() + 1)?;
            address::checked_byte_size(offset)?;
            let mut flags = FLAG_ATTRIBUTE_ADDRESS_TYPE_THREEBYTES | b.frequency;
            if offset < 0 {
                flags |= FLAG_ATTRIBUTE_OFFSET_NEGATIVE;
            }
            if i + 1 < self.bigrams.len() {
                flags |= FLAG_ATTRIBUTE_HAS_NEXT;
            }
            out.push(flags);
            address::write_uint(out, offset.unsigned_abs(), NODE_ATTRIBUTE_MAX_ADDRESS_SIZE);
        }
        debug_assert_eq!(out.len() - position, self.size());
        Ok(())
    }
}

fn array_size(nodes: &[AppendedNode]) -> usize {
    1 + nodes.iter().map(AppendedNode::size).sum::<usize>() + FORWARD_LINK_ADDRESS_SIZE
}

/// Append a one- or two-node array with no forward link.
fn append_array(buf: &mut Vec<u8>, nodes: &[AppendedNode]) -> Result<()> {
    encoder::write_count(buf, nodes.len())?;
    for node in nodes {
        node.write(buf)?;
    }
    address::write_uint(buf, 0, FORWARD_LINK_ADDRESS_SIZE);
    Ok(())
}

fn dynamic_header(buf: &[u8]) -> Result<FileHeader> {
    let header = header::read_header(buf)?;
    let options = header.format_options;
    if !options.supports_dynamic_update || options.has_terminal_id {
        return Err(DictError::UnsupportedFormat(format!(
            "version {} {}dictionaries cannot be updated in place",
            options.version,
            if options.supports_dynamic_update { "" } else { "static " }
        )));
    }
    Ok(header)
}

/// Position of the zero forward link that ends the chain starting at
/// `origin`.
fn chain_end(reader: &Reader<'_>, origin: usize) -> Result<usize> {
    let mut position = origin;
    for _ in 0..MAX_JUMPS {
        let mut r = ByteReader::at(reader.data, position);
        let count = decoder::read_count(&mut r)?;
        let mut end = r.position();
        for _ in 0..count {
            end = reader.read_node(end)?.end;
        }
        match reader.read_forward_link(end)? {
            Some(next) => position = next,
            None => return Ok(end),
        }
    }
    Err(DictError::Malformed(format!(
        "more than {MAX_JUMPS} forward links from {origin}"
    )))
}

/// Live node positions of the chain starting at `origin`.
fn chain_nodes(reader: &Reader<'_>, origin: usize) -> Result<Vec<usize>> {
    let mut nodes = Vec::new();
    let mut position = origin;
    for _ in 0..MAX_JUMPS {
        let mut r = ByteReader::at(reader.data, position);
        let count = decoder::read_count(&mut r)?;
        let mut at = r.position();
        for _ in 0..count {
            let node = reader.read_node(at)?;
            if !matches!(node.state, NodeState::Moved(_)) {
                nodes.push(at);
            }
            at = node.end;
        }
        match reader.read_forward_link(at)? {
            Some(next) => position = next,
            None => return Ok(nodes),
        }
    }
    Err(DictError::Malformed(format!(
        "more than {MAX_JUMPS} forward links from {origin}"
    )))
}

/// Where the word goes and what has to change.
enum Plan {
    /// The word ends inside the node, after `split` characters.
    SplitAsPrefix { node: RawNode, origin: usize, parent: Option<usize>, split: usize },
    /// The word leaves the node after `split` characters.
    SplitAtDivergence { node: RawNode, origin: usize, parent: Option<usize>, split: usize, rest: usize },
    /// The node spells the word.
    Replace { node: RawNode, origin: usize, parent: Option<usize> },
    /// The node is a prefix of the word and has no children.
    AddChildren { node: RawNode, rest: usize },
    /// No sibling in the chain starts with the next character.
    Link { link_field: usize, parent: Option<usize>, rest: usize },
}

fn plan_insert(reader: &Reader<'_>, chars: &[u32]) -> Result<Plan> {
    let mut word_pos = 0;
    let mut origin = reader.root();
    let mut position = origin;
    let mut parent = None;
    let mut jumps = 0;
    for _ in 0..=MAX_WORD_LENGTH * 2 + MAX_JUMPS {
        let mut r = ByteReader::at(reader.data, position);
        let count = decoder::read_count(&mut r)?;
        let mut at = r.position();
        let mut descend = None;
        for _ in 0..count {
            let node = reader.read_node(at)?;
            at = node.end;
            if matches!(node.state, NodeState::Moved(_)) || node.chars.first() != Some(&chars[word_pos]) {
                continue;
            }
            for p in 1..node.chars.len() {
                if word_pos + p >= chars.len() {
                    return Ok(Plan::SplitAsPrefix { node, origin, parent, split: p });
                }
                if chars[word_pos + p] != node.chars[p] {
                    return Ok(Plan::SplitAtDivergence { node, origin, parent, split: p, rest: word_pos + p });
                }
            }
            if word_pos + node.chars.len() == chars.len() {
                return Ok(Plan::Replace { node, origin, parent });
            }
            word_pos += node.chars.len();
            match node.children {
                None => return Ok(Plan::AddChildren { node, rest: word_pos }),
                Some(children) => {
                    descend = Some((children, node.position));
                    break;
                }
            }
        }
        if let Some((children, owner)) = descend {
            origin = children;
            position = children;
            parent = Some(owner);
            continue;
        }
        match reader.read_forward_link(at)? {
            Some(next) => {
                jumps += 1;
                if jumps > MAX_JUMPS {
                    break;
                }
                position = next;
            }
            None => return Ok(Plan::Link { link_field: at, parent, rest: word_pos }),
        }
    }
    Err(DictError::Malformed("no insertion point within the jump ceiling".into()))
}

fn validate(word: &str, frequency: u32) -> Result<Vec<u32>> {
    let chars = char_codec::code_points(word);
    if chars.is_empty() {
        return Err(DictError::InvalidInput("cannot insert an empty word".into()));
    }
    if chars.len() >= MAX_WORD_LENGTH {
        return Err(DictError::InvalidInput(format!(
            "\"{word}\" has {} code points, limit is {}",
            chars.len(),
            MAX_WORD_LENGTH - 1
        )));
    }
    if frequency > MAX_TERMINAL_FREQUENCY {
        return Err(DictError::InvalidInput(format!(
            "frequency {frequency} of \"{word}\" exceeds {MAX_TERMINAL_FREQUENCY}"
        )));
    }
    Ok(chars)
}

/// Insert or replace `word` in a dynamic dictionary buffer.
///
/// Bigram targets must already be words of the dictionary; missing ones are
/// skipped with a warning.
pub fn insert_word(buf: &mut Vec<u8>, word: &str, entry: Entry<'_>) -> Result<()> {
    let chars = validate(word, entry.frequency)?;
    let header = dynamic_header(buf)?;

    let (plan, bigrams, chain_end_field) = {
        let reader = Reader::new(buf, &header, TerminalSource::Inline);
        let mut bigrams = Vec::new();
        for b in entry.bigrams {
            match decoder::find_terminal(&reader, &b.word)? {
                Some(target) => {
                    let unigram = match target.terminal {
                        Some(Terminal::Frequency(f)) => u32::from(f),
                        _ => 0,
                    };
                    bigrams.push(PendingAttribute {
                        frequency: bigram::quantize(unigram, b.frequency, &b.word),
                        address: target.position,
                    });
                }
                None => warn!("bigram target \"{}\" of \"{word}\" is not in the dictionary", b.word),
            }
        }
        let plan = plan_insert(&reader, &chars)?;
        let end = match &plan {
            Plan::SplitAsPrefix { origin, .. }
            | Plan::SplitAtDivergence { origin, .. }
            | Plan::Replace { origin, .. } => Some(chain_end(&reader, *origin)?),
            _ => None,
        };
        (plan, bigrams, end)
    };

    let fresh = |chars: &[u32], parent: Option<usize>| AppendedNode {
        chars: chars.to_vec(),
        frequency: Some(entry.frequency as u8),
        not_a_word: entry.not_a_word,
        blacklisted: entry.blacklisted,
        parent,
        children: None,
        shortcuts: entry.shortcuts.to_vec(),
        bigrams: bigrams.clone(),
    };

    // Existing bytes are only patched once the whole tail has been appended.
    let tail = buf.len();
    let mut patches = Patches::new(tail);
    let mut arrays: Vec<Vec<AppendedNode>> = Vec::new();
    match plan {
        Plan::SplitAsPrefix { node, parent, split, .. } => {
            debug!("\"{word}\" splits the node at {} after {split} chars", node.position);
            let mut prefix = fresh(&node.chars[..split], parent);
            let prefix_array = array_size(std::slice::from_ref(&prefix));
            let suffix_position = tail + prefix_array + 1;
            prefix.children = Some(tail + prefix_array);
            let mut suffix = AppendedNode::from_raw(&node, node.chars[split..].to_vec());
            suffix.parent = Some(tail + 1);

            tombstone(&mut patches, &node, suffix_position)?;
            link(&mut patches, chain_end_field, tail)?;
            if let Some(children) = node.children {
                update_parent_addresses(&mut patches, buf.as_slice(), &header, children, suffix_position)?;
            }
            arrays.push(vec![prefix]);
            arrays.push(vec![suffix]);
        }
        Plan::SplitAtDivergence { node, parent, split, rest, .. } => {
            debug!("\"{word}\" diverges from the node at {} after {split} chars", node.position);
            let mut prefix = AppendedNode {
                chars: node.chars[..split].to_vec(),
                parent,
                ..AppendedNode::default()
            };
            let prefix_array = array_size(std::slice::from_ref(&prefix));
            prefix.children = Some(tail + prefix_array);
            let mut suffix = AppendedNode::from_raw(&node, node.chars[split..].to_vec());
            suffix.parent = Some(tail + 1);
            let added = fresh(&chars[rest..], Some(tail + 1));
            let pair_start = tail + prefix_array + 1;
            let (pair, suffix_position) = if added.chars[0] < suffix.chars[0] {
                let after = pair_start + added.size();
                (vec![added, suffix], after)
            } else {
                (vec![suffix, added], pair_start)
            };

            tombstone(&mut patches, &node, suffix_position)?;
            link(&mut patches, chain_end_field, tail)?;
            if let Some(children) = node.children {
                update_parent_addresses(&mut patches, buf.as_slice(), &header, children, suffix_position)?;
            }
            arrays.push(vec![prefix]);
            arrays.push(pair);
        }
        Plan::Replace { node, parent, .. } => {
            debug!("replacing \"{word}\" at {}", node.position);
            let mut copy = fresh(&node.chars, parent);
            copy.children = node.children;
            tombstone(&mut patches, &node, tail + 1)?;
            link(&mut patches, chain_end_field, tail)?;
            if let Some(children) = node.children {
                update_parent_addresses(&mut patches, buf.as_slice(), &header, children, tail + 1)?;
            }
            arrays.push(vec![copy]);
        }
        Plan::AddChildren { node, rest } => {
            debug!("adding children under the node at {}", node.position);
            patches.signed24(node.children_field, relative(tail, node.children_field)?)?;
            arrays.push(vec![fresh(&chars[rest..], Some(node.position))]);
        }
        Plan::Link { link_field, parent, rest } => {
            debug!("linking a new array from {link_field}");
            link(&mut patches, Some(link_field), tail)?;
            arrays.push(vec![fresh(&chars[rest..], parent)]);
        }
    }

    let appended = arrays.iter().try_for_each(|nodes| append_array(buf, nodes));
    if let Err(e) = appended {
        buf.truncate(tail);
        return Err(e);
    }
    patches.apply(buf);
    Ok(())
}

/// `to - from` as a field value.
fn relative(to: usize, from: usize) -> Result<i32> {
    let offset = to as i64 - from as i64;
    i32::try_from(offset).map_err(|_| InvariantViolation::AddressSize(offset).into())
}

/// Mark `node` moved to `to`. A split node moves to its suffix half, which
/// still spells the old word, so bigrams aimed at it keep their target.
fn tombstone(patches: &mut Patches, node: &RawNode, to: usize) -> Result<()> {
    patches.signed24(node.position + 1, relative(to, node.position)?)?;
    patches.flag(node.position, FLAG_IS_MOVED | (node.flags & !MASK_MOVE_AND_DELETE_FLAG))
}

/// Point the forward link at `field` to the array at `to`. Links are
/// absolute unsigned addresses.
fn link(patches: &mut Patches, field: Option<usize>, to: usize) -> Result<()> {
    let field = field.ok_or_else(|| DictError::Malformed("sibling chain has no end".into()))?;
    patches.uint24(field, to)
}

fn update_parent_addresses(
    patches: &mut Patches,
    buf: &[u8],
    header: &FileHeader,
    origin: usize,
    parent: usize,
) -> Result<()> {
    let reader = Reader::new(buf, header, TerminalSource::Inline);
    for position in chain_nodes(&reader, origin)? {
        patches.signed24(position + 1, relative(parent, position)?)?;
    }
    Ok(())
}

/// Mark `word` deleted. Returns whether it was present.
pub fn delete_word(buf: &mut [u8], word: &str) -> Result<bool> {
    let header = dynamic_header(buf)?;
    let found = {
        let reader = Reader::new(buf, &header, TerminalSource::Inline);
        decoder::find_terminal(&reader, word)?
    };
    match found {
        Some(node) => {
            buf[node.position] = FLAG_IS_DELETED | (node.flags & !MASK_MOVE_AND_DELETE_FLAG);
            debug!("deleted \"{word}\" at {}", node.position);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Frequency of `word` in any blob dictionary, `None` when absent.
pub fn lookup(buf: &[u8], word: &str) -> Result<Option<u8>> {
    let header = header::read_header(buf)?;
    if header.format_options.has_terminal_id {
        return Err(DictError::UnsupportedFormat(
            "split dictionaries keep frequencies in side tables".into(),
        ));
    }
    let reader = Reader::new(buf, &header, TerminalSource::Inline);
    Ok(decoder::find_terminal(&reader, word)?.and_then(|node| match node.terminal {
        Some(Terminal::Frequency(f)) => Some(f),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DictionaryOptions, FormatOptions};
    use crate::decoder::decode;
    use crate::dictionary::Dictionary;
    use crate::encoder::encode;

    fn base() -> Dictionary {
        let mut d = Dictionary::new(DictionaryOptions::new("u", "en"));
        for (w, f) in [("abcd", 10), ("abcdef", 20), ("xyz", 30)] {
            d.add(w, f, &[], false).unwrap();
        }
        d
    }

    fn dynamic(d: &Dictionary) -> Vec<u8> {
        encode(d, &FormatOptions::new(3, true).unwrap()).unwrap()
    }

    fn entry(frequency: u32) -> Entry<'static> {
        Entry {
            frequency,
            ..Entry::default()
        }
    }

    fn words(buf: &[u8]) -> Vec<(String, u8)> {
        decode(buf)
            .unwrap()
            .words()
            .map(|w| (w.word, w.frequency))
            .collect()
    }

    fn expect(pairs: &[(&str, u8)]) -> Vec<(String, u8)> {
        pairs.iter().map(|&(w, f)| (w.to_string(), f)).collect()
    }

    #[test]
    fn word_ending_inside_a_node() {
        let mut buf = dynamic(&base());
        insert_word(&mut buf, "abc", entry(5)).unwrap();
        assert_eq!(
            words(&buf),
            expect(&[("abc", 5), ("abcd", 10), ("abcdef", 20), ("xyz", 30)])
        );
        assert_eq!(lookup(&buf, "abcdef").unwrap(), Some(20));
    }

    #[test]
    fn word_diverging_inside_a_node() {
        let mut buf = dynamic(&base());
        insert_word(&mut buf, "abx", entry(7)).unwrap();
        insert_word(&mut buf, "aa", entry(8)).unwrap();
        assert_eq!(
            words(&buf),
            expect(&[("aa", 8), ("abcd", 10), ("abcdef", 20), ("abx", 7), ("xyz", 30)])
        );
        let d = decode(&buf).unwrap();
        assert!(d.check_ordering());
    }

    #[test]
    fn replacing_an_existing_word() {
        let mut buf = dynamic(&base());
        insert_word(&mut buf, "abcd", entry(99)).unwrap();
        assert_eq!(lookup(&buf, "abcd").unwrap(), Some(99));
        assert_eq!(
            words(&buf),
            expect(&[("abcd", 99), ("abcdef", 20), ("xyz", 30)])
        );
    }

    #[test]
    fn extending_a_leaf() {
        let mut buf = dynamic(&base());
        insert_word(&mut buf, "xyzzy", entry(3)).unwrap();
        assert_eq!(lookup(&buf, "xyzzy").unwrap(), Some(3));
        assert_eq!(lookup(&buf, "xyz").unwrap(), Some(30));
    }

    #[test]
    fn linking_a_new_sibling() {
        let mut buf = dynamic(&base());
        insert_word(&mut buf, "m", entry(1)).unwrap();
        insert_word(&mut buf, "abcdz", entry(2)).unwrap();
        assert_eq!(
            words(&buf),
            expect(&[("abcd", 10), ("abcdef", 20), ("abcdz", 2), ("m", 1), ("xyz", 30)])
        );
    }

    #[test]
    fn delete_then_reinsert() {
        let mut buf = dynamic(&base());
        assert!(delete_word(&mut buf, "abcd").unwrap());
        assert!(!delete_word(&mut buf, "abcd").unwrap());
        assert_eq!(lookup(&buf, "abcd").unwrap(), None);
        assert_eq!(words(&buf), expect(&[("abcdef", 20), ("xyz", 30)]));
        insert_word(&mut buf, "abcd", entry(11)).unwrap();
        assert_eq!(lookup(&buf, "abcd").unwrap(), Some(11));
    }

    #[test]
    fn bigrams_survive_moves() {
        let mut buf = dynamic(&base());
        let bigrams = [WeightedString::new("xyz", 200)];
        insert_word(
            &mut buf,
            "hello",
            Entry {
                frequency: 40,
                bigrams: &bigrams,
                ..Entry::default()
            },
        )
        .unwrap();
        // Moves "xyz" and splits "hello".
        insert_word(&mut buf, "xyz", entry(31)).unwrap();
        insert_word(&mut buf, "hell", entry(12)).unwrap();
        let d = decode(&buf).unwrap();
        let hello = d.node(d.find_word("hello").unwrap());
        assert_eq!(hello.bigrams().len(), 1);
        assert_eq!(hello.bigrams()[0].word, "xyz");
        assert_eq!(d.frequency_of("hell"), Some(12));
    }

    #[test]
    fn bigram_targets_survive_splits() {
        let mut buf = dynamic(&base());
        let bigrams = [WeightedString::new("abcd", 100), WeightedString::new("xyz", 100)];
        insert_word(
            &mut buf,
            "q",
            Entry {
                frequency: 1,
                bigrams: &bigrams,
                ..Entry::default()
            },
        )
        .unwrap();
        insert_word(&mut buf, "ab", entry(4)).unwrap();
        insert_word(&mut buf, "xa", entry(5)).unwrap();
        let d = decode(&buf).unwrap();
        let targets: Vec<&str> = d
            .node(d.find_word("q").unwrap())
            .bigrams()
            .iter()
            .map(|b| b.word.as_str())
            .collect();
        assert_eq!(targets, ["abcd", "xyz"]);
    }

    #[test]
    fn missing_bigram_target_is_skipped() {
        let mut buf = dynamic(&base());
        let bigrams = [WeightedString::new("nowhere", 100)];
        insert_word(
            &mut buf,
            "q",
            Entry {
                frequency: 1,
                bigrams: &bigrams,
                ..Entry::default()
            },
        )
        .unwrap();
        let d = decode(&buf).unwrap();
        assert!(d.node(d.find_word("q").unwrap()).bigrams().is_empty());
    }

    #[test]
    fn forward_links_reach_past_eight_mebibytes() {
        let mut buf = dynamic(&base());
        buf.resize(0x80_0100, 0);
        insert_word(&mut buf, "m", entry(6)).unwrap();
        assert_eq!(lookup(&buf, "m").unwrap(), Some(6));
        assert_eq!(lookup(&buf, "xyz").unwrap(), Some(30));

        let header = header::read_header(&buf).unwrap();
        let reader = Reader::new(&buf, &header, TerminalSource::Inline);
        let end = chain_end(&reader, reader.root()).unwrap();
        assert_eq!(chain_nodes(&reader, reader.root()).unwrap().len(), 3);
        assert!(end >= 0x80_0100);
    }

    #[test]
    fn static_dictionaries_are_refused() {
        let mut buf = encode(&base(), &FormatOptions::new(3, false).unwrap()).unwrap();
        assert!(matches!(
            insert_word(&mut buf, "q", entry(1)),
            Err(DictError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            delete_word(&mut buf, "xyz"),
            Err(DictError::UnsupportedFormat(_))
        ));
        assert_eq!(lookup(&buf, "xyz").unwrap(), Some(30));
    }

    #[test]
    fn invalid_words_are_rejected() {
        let mut buf = dynamic(&base());
        assert!(insert_word(&mut buf, "", entry(1)).is_err());
        assert!(insert_word(&mut buf, "w", entry(300)).is_err());
        let long: String = std::iter::repeat('a').take(MAX_WORD_LENGTH).collect();
        assert!(insert_word(&mut buf, &long, entry(1)).is_err());
    }
}
