//! Layout statistics.
//!
//! `LayoutStats` is filled from a finished [`Layout`] and reported through
//! the logger after encoding. The CLI prints it for `info --json`.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::Serialize;

use crate::compress::Layout;
use crate::dictionary::Dictionary;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayoutStats {
    pub body_size: usize,
    pub passes: usize,
    pub node_arrays: usize,
    pub nodes: usize,
    pub terminals: usize,
    /// Body address of the first array holding a terminal.
    pub first_terminal_address: Option<usize>,
    pub last_terminal_address: Option<usize>,
    pub max_nodes_per_array: usize,
    /// array size in nodes -> number of arrays
    pub nodes_per_array: BTreeMap<usize, usize>,
    /// run length in code points -> number of nodes
    pub chars_per_node: BTreeMap<usize, usize>,
}

impl LayoutStats {
    pub fn new(dict: &Dictionary, layout: &Layout) -> Self {
        let mut stats = Self {
            body_size: layout.total_size(),
            passes: layout.passes(),
            node_arrays: layout.order().len(),
            ..Self::default()
        };
        for (rank, &array) in layout.order().iter().enumerate() {
            let nodes = dict.array(array).nodes();
            stats.nodes += nodes.len();
            stats.max_nodes_per_array = stats.max_nodes_per_array.max(nodes.len());
            *stats.nodes_per_array.entry(nodes.len()).or_default() += 1;

            let address = layout.array_placement(rank).address_after_update;
            let mut has_terminal = false;
            for &id in nodes {
                let node = dict.node(id);
                *stats.chars_per_node.entry(node.chars().len()).or_default() += 1;
                if node.is_terminal() {
                    stats.terminals += 1;
                    has_terminal = true;
                }
            }
            if has_terminal {
                stats.first_terminal_address.get_or_insert(address);
                stats.last_terminal_address = Some(address);
            }
        }
        stats
    }

    pub fn report(&self) {
        info!(
            "{} bytes, {} node arrays, {} nodes, {} words, {} passes",
            self.body_size, self.node_arrays, self.nodes, self.terminals, self.passes
        );
        if let (Some(first), Some(last)) = (self.first_terminal_address, self.last_terminal_address) {
            debug!("terminal arrays between {first} and {last}");
        }
        debug!("max nodes per array: {}", self.max_nodes_per_array);
        for (size, count) in &self.nodes_per_array {
            debug!("  arrays of {size:>5} nodes: {count}");
        }
        for (len, count) in &self.chars_per_node {
            debug!("  nodes of {len:>3} chars: {count}");
        }
    }
}
