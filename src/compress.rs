//! Address compression.
//!
//! The trie is flattened into a list of node arrays in pre-order, then every
//! array and node is given a byte offset. Offsets decide how many bytes each
//! children and bigram address needs, which in turn moves the offsets, so
//! sizes are recomputed until nothing changes:
//!
//! 1. assume three-byte addresses everywhere and place arrays back to back;
//! 2. recompute every node's size from the current tentative addresses and
//!    re-place the arrays;
//! 3. repeat 2 until a pass changes nothing.
//!
//! Sizes only ever shrink. A pass that grows an array, or a layout that has
//! not settled after [`MAX_PASSES`] passes, is reported as an
//! [`InvariantViolation`].

use log::{debug, info};

use crate::address;
use crate::char_codec;
use crate::config::FormatOptions;
use crate::dictionary::{ArrayId, Dictionary, Node, NodeId, WeightedString};
use crate::error::{DictError, InvariantViolation, Result};
use crate::format::{
    FORWARD_LINK_ADDRESS_SIZE, MAX_PASSES, MAX_PTNODES_FOR_ONE_BYTE_PTNODE_COUNT,
    MAX_PTNODES_IN_A_PT_NODE_ARRAY, NODE_ATTRIBUTE_FLAGS_SIZE, NODE_ATTRIBUTE_MAX_ADDRESS_SIZE,
    NODE_FLAGS_SIZE, NODE_FREQUENCY_SIZE, NODE_MAX_ADDRESS_SIZE, NODE_TERMINAL_ID_SIZE,
    NO_PARENT_ADDRESS, PARENT_ADDRESS_SIZE, SHORTCUT_LIST_SIZE_SIZE,
    SIGNED_CHILDREN_ADDRESS_SIZE,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrayPlacement {
    pub size: usize,
    pub address_before_update: usize,
    pub address_after_update: usize,
    /// Offset from this array to the node owning it, dynamic format only.
    pub parent_offset: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodePlacement {
    pub size: usize,
    pub address_before_update: usize,
    pub address_after_update: usize,
}

/// Placement of every node and node array of a dictionary, relative to the
/// first byte of the body.
#[derive(Debug, Clone)]
pub struct Layout {
    order: Vec<ArrayId>,
    /// Index into `order` for each arena array slot.
    array_rank: Vec<Option<usize>>,
    arrays: Vec<ArrayPlacement>,
    nodes: Vec<NodePlacement>,
    /// Resolved bigram targets per node, in list order.
    bigram_targets: Vec<Vec<NodeId>>,
    terminal_ids: Vec<Option<u32>>,
    passes: usize,
}

// ---------------------------------------------------------------------------
// Size helpers

/// Bytes needed for the node count prefix of an array.
pub fn count_size(count: usize) -> Result<usize> {
    if count <= MAX_PTNODES_FOR_ONE_BYTE_PTNODE_COUNT {
        Ok(1)
    } else if count <= MAX_PTNODES_IN_A_PT_NODE_ARRAY {
        Ok(2)
    } else {
        Err(DictError::InvalidInput(format!(
            "{count} siblings in one node array, limit is {MAX_PTNODES_IN_A_PT_NODE_ARRAY}"
        )))
    }
}

/// Flags, optional parent field and the character run.
pub fn node_header_size(chars: &[u32], options: &FormatOptions) -> usize {
    let parent = if options.supports_dynamic_update {
        PARENT_ADDRESS_SIZE
    } else {
        0
    };
    NODE_FLAGS_SIZE + parent + char_codec::run_size(chars)
}

pub fn terminal_field_size(is_terminal: bool, options: &FormatOptions) -> usize {
    match (is_terminal, options.has_terminal_id) {
        (false, _) => 0,
        (true, true) => NODE_TERMINAL_ID_SIZE,
        (true, false) => NODE_FREQUENCY_SIZE,
    }
}

/// Whole shortcut list including its two-byte size prefix, or 0 when empty.
pub fn shortcut_list_size(shortcuts: &[WeightedString]) -> usize {
    if shortcuts.is_empty() {
        return 0;
    }
    SHORTCUT_LIST_SIZE_SIZE
        + shortcuts
            .iter()
            .map(|s| NODE_ATTRIBUTE_FLAGS_SIZE + char_codec::string_size(&s.word))
            .sum::<usize>()
}

/// Width of a present address. Never zero: a width of zero means "absent".
pub fn present_address_size(offset: i32) -> Result<usize, InvariantViolation> {
    Ok(address::checked_byte_size(offset)?.max(1))
}

fn node_maximum_size(node: &Node, options: &FormatOptions) -> usize {
    let mut size = node_header_size(&node.chars, options)
        + terminal_field_size(node.is_terminal(), options)
        + NODE_MAX_ADDRESS_SIZE;
    if options.inline_attributes() {
        size += shortcut_list_size(&node.shortcuts);
        size += (NODE_ATTRIBUTE_FLAGS_SIZE + NODE_ATTRIBUTE_MAX_ADDRESS_SIZE) * node.bigrams.len();
    }
    size
}

impl Layout {
    /// Flatten `dict` and run compression to its fixed point.
    pub fn compute(dict: &Dictionary, options: &FormatOptions) -> Result<Self> {
        Self::compute_with_ceiling(dict, options, MAX_PASSES)
    }

    pub(crate) fn compute_with_ceiling(
        dict: &Dictionary,
        options: &FormatOptions,
        max_passes: usize,
    ) -> Result<Self> {
        let mut layout = Self::flatten(dict, options)?;
        let initial = layout.initialize_addresses(dict, options)?;
        info!("compressing node array addresses, original size {initial}");

        loop {
            let changed = layout.refine(dict, options)?;
            layout.passes += 1;
            if layout.passes > max_passes {
                return Err(InvariantViolation::TooManyPasses(layout.passes).into());
            }
            if !changed {
                break;
            }
        }
        if options.supports_dynamic_update {
            layout.compute_parent_offsets(dict);
        }
        info!(
            "compression complete in {} passes, size {}",
            layout.passes,
            layout.total_size()
        );
        Ok(layout)
    }

    fn flatten(dict: &Dictionary, options: &FormatOptions) -> Result<Self> {
        let order = dict.arrays_in_order();
        let array_slots = order.iter().map(|a| a.0 + 1).max().unwrap_or(0);
        let mut array_rank = vec![None; array_slots];
        let mut node_slots = 0;
        for (rank, &array) in order.iter().enumerate() {
            array_rank[array.0] = Some(rank);
            for id in dict.array(array).nodes() {
                node_slots = node_slots.max(id.0 + 1);
            }
        }
        debug!("flattened {} node arrays", order.len());

        let mut bigram_targets = vec![Vec::new(); node_slots];
        let mut terminal_ids = vec![None; node_slots];
        let mut next_terminal_id = 0u32;
        for &array in &order {
            for &id in dict.array(array).nodes() {
                let node = dict.node(id);
                if node.is_terminal() {
                    terminal_ids[id.0] = Some(next_terminal_id);
                    next_terminal_id += 1;
                }
                if options.inline_attributes() {
                    bigram_targets[id.0] = resolve_bigrams(dict, node)?;
                }
            }
        }

        Ok(Self {
            arrays: vec![ArrayPlacement::default(); order.len()],
            nodes: vec![NodePlacement::default(); node_slots],
            order,
            array_rank,
            bigram_targets,
            terminal_ids,
            passes: 0,
        })
    }

    /// Worst-case sizes, placed back to back.
    fn initialize_addresses(&mut self, dict: &Dictionary, options: &FormatOptions) -> Result<usize> {
        let mut offset = 0;
        for rank in 0..self.order.len() {
            let array = dict.array(self.order[rank]);
            let count_size = count_size(array.len())?;
            let mut size = count_size;
            for &id in array.nodes() {
                let node_size = node_maximum_size(dict.node(id), options);
                self.nodes[id.0] = NodePlacement {
                    size: node_size,
                    address_before_update: offset + size,
                    address_after_update: offset + size,
                };
                size += node_size;
            }
            if options.supports_dynamic_update {
                size += FORWARD_LINK_ADDRESS_SIZE;
            }
            self.arrays[rank] = ArrayPlacement {
                size,
                address_before_update: offset,
                address_after_update: offset,
                parent_offset: NO_PARENT_ADDRESS,
            };
            offset += size;
        }
        Ok(offset)
    }

    /// One compression pass. Returns whether any size or address moved.
    pub fn refine(&mut self, dict: &Dictionary, options: &FormatOptions) -> Result<bool> {
        let mut changes = false;
        let mut start = 0;
        for rank in 0..self.order.len() {
            self.arrays[rank].address_after_update = start;
            let before = self.arrays[rank].size;
            changes |= self.compute_actual_array_size(rank, dict, options)?;
            let after = self.arrays[rank].size;
            if after > before {
                return Err(InvariantViolation::SizeIncreased {
                    array: rank,
                    before,
                    after,
                }
                .into());
            }
            start += after;
        }
        for rank in 0..self.order.len() {
            let placement = &mut self.arrays[rank];
            placement.address_before_update = placement.address_after_update;
            for &id in dict.array(self.order[rank]).nodes() {
                let node = &mut self.nodes[id.0];
                node.address_before_update = node.address_after_update;
            }
        }
        debug!("compression pass {} ends at {start} bytes", self.passes + 1);
        Ok(changes)
    }

    fn compute_actual_array_size(
        &mut self,
        rank: usize,
        dict: &Dictionary,
        options: &FormatOptions,
    ) -> Result<bool> {
        let array = dict.array(self.order[rank]);
        let mut changed = false;
        let mut size = count_size(array.len())?;
        for &id in array.nodes() {
            let node = dict.node(id);
            let address = self.arrays[rank].address_after_update + size;
            self.nodes[id.0].address_after_update = address;
            if address != self.nodes[id.0].address_before_update {
                changed = true;
            }

            let mut node_size = node_header_size(&node.chars, options)
                + terminal_field_size(node.is_terminal(), options);
            if options.supports_dynamic_update {
                node_size += SIGNED_CHILDREN_ADDRESS_SIZE;
            } else if let Some(children) = node.children {
                let target = self.rank_of(children)?;
                let offset = self.offset_to_array_during_update(rank, node_size + size, target);
                node_size += present_address_size(offset)?;
            }
            if options.inline_attributes() {
                node_size += shortcut_list_size(&node.shortcuts);
                for i in 0..self.bigram_targets[id.0].len() {
                    let target = self.bigram_targets[id.0][i];
                    let offset = self.offset_to_node_during_update(
                        rank,
                        node_size + size + NODE_ATTRIBUTE_FLAGS_SIZE,
                        target,
                    );
                    node_size += NODE_ATTRIBUTE_FLAGS_SIZE + present_address_size(offset)?;
                }
            }
            let before = self.nodes[id.0].size;
            if node_size > before {
                return Err(InvariantViolation::NodeSizeIncreased {
                    node: id.0,
                    before,
                    after: node_size,
                }
                .into());
            }
            self.nodes[id.0].size = node_size;
            size += node_size;
        }
        if options.supports_dynamic_update {
            size += FORWARD_LINK_ADDRESS_SIZE;
        }
        if self.arrays[rank].size != size {
            self.arrays[rank].size = size;
            changed = true;
        }
        Ok(changed)
    }

    // Arrays before the current one in this pass already carry their new
    // address; arrays after it still carry the old one. Both ends of an
    // offset must come from the same generation.
    fn offset_to_array_during_update(&self, current: usize, offset_in_array: usize, target: usize) -> i32 {
        let cur = &self.arrays[current];
        let tgt = &self.arrays[target];
        if tgt.address_before_update < cur.address_before_update {
            tgt.address_after_update as i32 - (cur.address_after_update + offset_in_array) as i32
        } else {
            tgt.address_before_update as i32 - (cur.address_before_update + offset_in_array) as i32
        }
    }

    fn offset_to_node_during_update(&self, current: usize, offset_in_array: usize, target: NodeId) -> i32 {
        let cur = &self.arrays[current];
        let tgt = &self.nodes[target.0];
        let old_base = cur.address_before_update + offset_in_array;
        if tgt.address_before_update < old_base {
            tgt.address_after_update as i32 - (cur.address_after_update + offset_in_array) as i32
        } else {
            tgt.address_before_update as i32 - old_base as i32
        }
    }

    fn compute_parent_offsets(&mut self, dict: &Dictionary) {
        for rank in 0..self.order.len() {
            for &id in dict.array(self.order[rank]).nodes() {
                if let Some(children) = dict.node(id).children {
                    if let Some(child_rank) = self.array_rank.get(children.0).copied().flatten() {
                        self.arrays[child_rank].parent_offset = self.nodes[id.0].address_after_update
                            as i32
                            - self.arrays[child_rank].address_after_update as i32;
                    }
                }
            }
        }
    }

    fn rank_of(&self, array: ArrayId) -> Result<usize> {
        self.array_rank
            .get(array.0)
            .copied()
            .flatten()
            .ok_or_else(|| DictError::Malformed(format!("array {} is not reachable", array.0)))
    }

    // -----------------------------------------------------------------------
    // Accessors used by the writer

    pub fn order(&self) -> &[ArrayId] {
        &self.order
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn array_placement(&self, rank: usize) -> &ArrayPlacement {
        &self.arrays[rank]
    }

    pub fn array_address(&self, array: ArrayId) -> Result<usize> {
        Ok(self.arrays[self.rank_of(array)?].address_after_update)
    }

    pub fn node_placement(&self, node: NodeId) -> &NodePlacement {
        &self.nodes[node.0]
    }

    pub fn bigram_targets(&self, node: NodeId) -> &[NodeId] {
        &self.bigram_targets[node.0]
    }

    pub fn terminal_id(&self, node: NodeId) -> Option<u32> {
        self.terminal_ids.get(node.0).copied().flatten()
    }

    pub fn terminal_count(&self) -> usize {
        self.terminal_ids.iter().flatten().count()
    }

    /// End of the last array, i.e. the body size.
    pub fn total_size(&self) -> usize {
        self.arrays
            .last()
            .map_or(0, |a| a.address_after_update + a.size)
    }

    /// Offset from a node's children field to its children array, or `None`
    /// for a leaf.
    pub fn children_offset(
        &self,
        dict: &Dictionary,
        node: NodeId,
        options: &FormatOptions,
    ) -> Result<Option<i32>> {
        let n = dict.node(node);
        let Some(children) = n.children else {
            return Ok(None);
        };
        let field = self.nodes[node.0].address_after_update
            + node_header_size(&n.chars, options)
            + terminal_field_size(n.is_terminal(), options);
        Ok(Some(self.array_address(children)? as i32 - field as i32))
    }

    /// Check that arrays sit back to back in flattened order.
    pub fn check_contiguous(&self) -> Result<()> {
        let mut offset = 0;
        for placement in &self.arrays {
            if placement.address_after_update != offset {
                return Err(InvariantViolation::WriteCursorMismatch {
                    expected: offset,
                    actual: placement.address_after_update,
                }
                .into());
            }
            offset += placement.size;
        }
        Ok(())
    }
}

fn resolve_bigrams(dict: &Dictionary, node: &Node) -> Result<Vec<NodeId>> {
    node.bigrams
        .iter()
        .map(|b| {
            dict.find_word(&b.word)
                .ok_or_else(|| InvariantViolation::UnplacedBigramTarget(b.word.clone()).into())
        })
        .collect()
}
