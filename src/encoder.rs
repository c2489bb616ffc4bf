//! Binary writer.
//!
//! Runs address compression, then walks the flattened arrays and emits each
//! node at exactly the offset the layout assigned it. Any disagreement
//! between the cursor and the layout aborts the encode.
//!
//! Node layout:
//!
//! ```text
//! [flags][parent s24]?[chars][freq u8 | terminal id u32]?[children]?
//! [shortcut list]?[bigram list]?
//! ```

use log::info;

use crate::address;
use crate::bigram;
use crate::char_codec;
use crate::compress::{self, Layout};
use crate::config::{ContainerKind, FormatOptions};
use crate::dictionary::{Dictionary, Node, NodeId, WeightedString};
use crate::error::{DictError, InvariantViolation, Result};
use crate::format::{
    FLAG_ATTRIBUTE_ADDRESS_TYPE_ONEBYTE, FLAG_ATTRIBUTE_ADDRESS_TYPE_THREEBYTES,
    FLAG_ATTRIBUTE_ADDRESS_TYPE_TWOBYTES, FLAG_ATTRIBUTE_HAS_NEXT, FLAG_ATTRIBUTE_OFFSET_NEGATIVE,
    FLAG_CHILDREN_ADDRESS_TYPE_ONEBYTE, FLAG_CHILDREN_ADDRESS_TYPE_THREEBYTES,
    FLAG_CHILDREN_ADDRESS_TYPE_TWOBYTES, FLAG_HAS_BIGRAMS, FLAG_HAS_MULTIPLE_CHARS,
    FLAG_HAS_SHORTCUT_TARGETS, FLAG_IS_BLACKLISTED, FLAG_IS_NOT_A_WORD, FLAG_IS_NOT_MOVED,
    FLAG_IS_TERMINAL, MASK_ATTRIBUTE_FREQUENCY, MAX_BIGRAMS_IN_A_PTNODE,
    MAX_SHORTCUT_LIST_SIZE_IN_A_PTNODE, NO_PARENT_ADDRESS,
    SHORTCUT_WHITELIST_FREQUENCY,
};
use crate::header;
use crate::stats::LayoutStats;

/// Encode a version 2 or 3 dictionary into a single buffer.
///
/// Version 4 dictionaries are split over several files and are produced by
/// [`crate::container::encode`].
pub fn encode(dict: &Dictionary, options: &FormatOptions) -> Result<Vec<u8>> {
    if options.container() == ContainerKind::Split {
        return Err(DictError::InvalidInput(format!(
            "version {} is a split container, encode it with container::encode",
            options.version
        )));
    }
    let mut out = header::write_header(&dict.options, options, dict.has_bigrams())?;
    let (body, _) = encode_body(dict, options)?;
    out.extend_from_slice(&body);
    Ok(out)
}

/// Compress and write the trie body. The layout is returned for callers
/// that need terminal ids or addresses afterwards.
pub(crate) fn encode_body(dict: &Dictionary, options: &FormatOptions) -> Result<(Vec<u8>, Layout)> {
    let layout = Layout::compute(dict, options)?;
    LayoutStats::new(dict, &layout).report();
    let body = write_body(dict, options, &layout)?;
    info!("wrote {} body bytes", body.len());
    Ok((body, layout))
}

pub(crate) fn write_body(dict: &Dictionary, options: &FormatOptions, layout: &Layout) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(layout.total_size());
    for (rank, &array_id) in layout.order().iter().enumerate() {
        let placement = *layout.array_placement(rank);
        let start = placement.address_after_update;
        if out.len() != start {
            return Err(InvariantViolation::WriteCursorMismatch {
                expected: start,
                actual: out.len(),
            }
            .into());
        }
        let array = dict.array(array_id);
        write_count(&mut out, array.len())?;
        let parent_position = if placement.parent_offset == NO_PARENT_ADDRESS {
            None
        } else {
            Some(start as i32 + placement.parent_offset)
        };
        for &id in array.nodes() {
            let expected = layout.node_placement(id).address_after_update;
            if out.len() != expected {
                return Err(InvariantViolation::WriteCursorMismatch {
                    expected,
                    actual: out.len(),
                }
                .into());
            }
            write_node(&mut out, dict, options, layout, id, parent_position)?;
        }
        if options.supports_dynamic_update {
            address::write_uint(&mut out, 0, crate::format::FORWARD_LINK_ADDRESS_SIZE);
        }
        if out.len() - start != placement.size {
            return Err(InvariantViolation::ArraySizeMismatch {
                address: start,
                written: out.len() - start,
                expected: placement.size,
            }
            .into());
        }
    }
    Ok(out)
}

pub(crate) fn write_count(out: &mut Vec<u8>, count: usize) -> Result<()> {
    match compress::count_size(count)? {
        1 => out.push(count as u8),
        _ => out.extend_from_slice(&((count as u16) | 0x8000).to_be_bytes()),
    }
    Ok(())
}

fn children_flags(offset: Option<i32>) -> Result<u8, InvariantViolation> {
    let Some(offset) = offset else {
        return Ok(0);
    };
    Ok(match compress::present_address_size(offset)? {
        1 => FLAG_CHILDREN_ADDRESS_TYPE_ONEBYTE,
        2 => FLAG_CHILDREN_ADDRESS_TYPE_TWOBYTES,
        _ => FLAG_CHILDREN_ADDRESS_TYPE_THREEBYTES,
    })
}

fn attribute_address_flags(size: usize) -> u8 {
    match size {
        1 => FLAG_ATTRIBUTE_ADDRESS_TYPE_ONEBYTE,
        2 => FLAG_ATTRIBUTE_ADDRESS_TYPE_TWOBYTES,
        _ => FLAG_ATTRIBUTE_ADDRESS_TYPE_THREEBYTES,
    }
}

/// Flags byte of a freshly written node. Dynamic files mark every node as
/// not moved and keep the children width out of the flags.
pub(crate) fn node_flags(
    node: &Node,
    children_offset: Option<i32>,
    options: &FormatOptions,
) -> Result<u8> {
    let mut flags = 0;
    if node.chars().len() > 1 {
        flags |= FLAG_HAS_MULTIPLE_CHARS;
    }
    if node.is_terminal() {
        flags |= FLAG_IS_TERMINAL;
    }
    if options.supports_dynamic_update {
        flags |= FLAG_IS_NOT_MOVED;
    } else {
        flags |= children_flags(children_offset)?;
    }
    if !node.shortcuts().is_empty() {
        flags |= FLAG_HAS_SHORTCUT_TARGETS;
    }
    if !node.bigrams().is_empty() {
        flags |= FLAG_HAS_BIGRAMS;
    }
    if node.is_not_a_word() {
        flags |= FLAG_IS_NOT_A_WORD;
    }
    if node.is_blacklisted() {
        flags |= FLAG_IS_BLACKLISTED;
    }
    Ok(flags)
}

fn write_node(
    out: &mut Vec<u8>,
    dict: &Dictionary,
    options: &FormatOptions,
    layout: &Layout,
    id: NodeId,
    parent_position: Option<i32>,
) -> Result<()> {
    let node = dict.node(id);
    let address = out.len() as i32;
    let children_offset = layout.children_offset(dict, id, options)?;
    out.push(node_flags(node, children_offset, options)?);

    if options.supports_dynamic_update {
        let parent = parent_position.map_or(NO_PARENT_ADDRESS, |p| p - address);
        address::write_signed24(out, parent)?;
    }
    char_codec::write_run(out, node.chars());

    if let Some(frequency) = node.frequency() {
        if options.has_terminal_id {
            let terminal_id = layout
                .terminal_id(id)
                .ok_or(InvariantViolation::MissingTerminalId(id.0))?;
            out.extend_from_slice(&terminal_id.to_be_bytes());
        } else {
            out.push(frequency);
        }
    }

    if options.supports_dynamic_update {
        address::write_signed24(out, children_offset.unwrap_or(0))?;
    } else if let Some(offset) = children_offset {
        let size = compress::present_address_size(offset)?;
        address::write_uint(out, offset.unsigned_abs(), size);
    }

    if options.inline_attributes() {
        write_shortcut_list(out, node.shortcuts())?;
        write_bigram_list(out, dict, layout, id)?;
    }
    Ok(())
}

pub(crate) fn write_shortcut_list(out: &mut Vec<u8>, shortcuts: &[WeightedString]) -> Result<()> {
    if shortcuts.is_empty() {
        return Ok(());
    }
    let size = compress::shortcut_list_size(shortcuts);
    if size > MAX_SHORTCUT_LIST_SIZE_IN_A_PTNODE {
        return Err(DictError::InvalidInput(format!(
            "shortcut list of {size} bytes exceeds {MAX_SHORTCUT_LIST_SIZE_IN_A_PTNODE}"
        )));
    }
    out.extend_from_slice(&(size as u16).to_be_bytes());
    for (i, shortcut) in shortcuts.iter().enumerate() {
        let mut flags = shortcut_frequency(shortcut.frequency);
        if i + 1 < shortcuts.len() {
            flags |= FLAG_ATTRIBUTE_HAS_NEXT;
        }
        out.push(flags);
        char_codec::write_string(out, &shortcut.word);
    }
    Ok(())
}

/// Shortcut weights live in four bits; anything above is a whitelist entry.
pub(crate) fn shortcut_frequency(frequency: u32) -> u8 {
    frequency.min(SHORTCUT_WHITELIST_FREQUENCY) as u8 & MASK_ATTRIBUTE_FREQUENCY
}

fn write_bigram_list(out: &mut Vec<u8>, dict: &Dictionary, layout: &Layout, id: NodeId) -> Result<()> {
    let bigrams = dict.node(id).bigrams();
    if bigrams.len() > MAX_BIGRAMS_IN_A_PTNODE {
        return Err(DictError::InvalidInput(format!(
            "{} bigrams on one word, limit is {MAX_BIGRAMS_IN_A_PTNODE}",
            bigrams.len()
        )));
    }
    let targets = layout.bigram_targets(id);
    for (i, (bigram, &target)) in bigrams.iter().zip(targets).enumerate() {
        let target_address = layout.node_placement(target).address_after_update as i32;
        // Relative to the byte right after this entry's flags.
        let offset = target_address - (out.len() as i32 + 1);
        let size = compress::present_address_size(offset)?;
        let unigram = dict.node(target).frequency().map_or(0, u32::from);

        let mut flags = attribute_address_flags(size)
            | bigram::quantize(unigram, bigram.frequency, &bigram.word);
        if offset < 0 {
            flags |= FLAG_ATTRIBUTE_OFFSET_NEGATIVE;
        }
        if i + 1 < bigrams.len() {
            flags |= FLAG_ATTRIBUTE_HAS_NEXT;
        }
        out.push(flags);
        address::write_uint(out, offset.unsigned_abs(), size);
    }
    Ok(())
}
