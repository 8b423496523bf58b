// SPDX-License-Identifier: MPL-2.0

use alloc::{string::String, sync::Arc, vec::Vec};

use super::{
    Property,
    node::{DeviceTree, NodeData},
};

/// The identifier of a node under construction in a [`DeviceTreeBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

/// Assembles a [`DeviceTree`].
///
/// # Example
///
/// ```
/// use of_tree::DeviceTreeBuilder;
///
/// let mut builder = DeviceTreeBuilder::new();
/// let root = builder.root();
/// let dmac = builder.add_node(root, "dma-controller@40104000");
/// builder.set_str_list(dmac, "compatible", &["renesas,r9a06g032-dma", "renesas,rzn1-dma"]);
/// builder.set_u32(dmac, "dma-requests", 16);
/// let mux = builder.add_node(root, "dma-router@a0");
/// builder.set_phandles(mux, "dma-masters", &[dmac]);
/// let tree = builder.build();
///
/// let mux = tree.find_node_by_path("/dma-router@a0").unwrap();
/// let master = mux.parse_phandle("dma-masters", 0).unwrap();
/// assert_eq!(master.read_u32("dma-requests"), Some(16));
/// ```
#[derive(Debug)]
pub struct DeviceTreeBuilder {
    nodes: Vec<NodeData>,
    next_phandle: u32,
}

impl DeviceTreeBuilder {
    pub fn new() -> Self {
        let root = NodeData {
            full_name: String::new(),
            parent: None,
            children: Vec::new(),
            properties: Vec::new(),
        };
        Self {
            nodes: alloc::vec![root],
            next_phandle: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Adds a child named `full_name` (e.g., `serial@1000`) under `parent`.
    pub fn add_node(&mut self, parent: NodeId, full_name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            full_name: String::from(full_name),
            parent: Some(parent.0),
            children: Vec::new(),
            properties: Vec::new(),
        });
        self.nodes[parent.0].children.push(id.0);
        id
    }

    /// Sets a property to a raw value, replacing any previous value.
    pub fn set_property(&mut self, node: NodeId, name: &str, value: Vec<u8>) -> &mut Self {
        if name == "phandle" {
            let explicit = Property::new(name, value.clone()).as_u32();
            if let Some(phandle) = explicit {
                self.next_phandle = self.next_phandle.max(phandle.saturating_add(1));
            }
        }

        let properties = &mut self.nodes[node.0].properties;
        match properties.iter_mut().find(|prop| prop.name() == name) {
            Some(prop) => *prop = Property::new(name, value),
            None => properties.push(Property::new(name, value)),
        }
        self
    }

    pub fn set_str(&mut self, node: NodeId, name: &str, value: &str) -> &mut Self {
        self.set_str_list(node, name, &[value])
    }

    pub fn set_str_list(&mut self, node: NodeId, name: &str, values: &[&str]) -> &mut Self {
        let mut encoded = Vec::new();
        for value in values {
            encoded.extend_from_slice(value.as_bytes());
            encoded.push(0);
        }
        self.set_property(node, name, encoded)
    }

    pub fn set_u32(&mut self, node: NodeId, name: &str, value: u32) -> &mut Self {
        self.set_u32_list(node, name, &[value])
    }

    pub fn set_u32_list(&mut self, node: NodeId, name: &str, values: &[u32]) -> &mut Self {
        let encoded = values.iter().flat_map(|value| value.to_be_bytes()).collect();
        self.set_property(node, name, encoded)
    }

    /// Sets a phandle-list property pointing at `targets`.
    ///
    /// Targets without a phandle get one assigned.
    pub fn set_phandles(&mut self, node: NodeId, name: &str, targets: &[NodeId]) -> &mut Self {
        let phandles: Vec<u32> = targets
            .iter()
            .map(|&target| self.phandle_of(target))
            .collect();
        self.set_u32_list(node, name, &phandles)
    }

    /// Returns the phandle of `node`, assigning a fresh one if needed.
    ///
    /// Fresh phandles count up from the highest one seen so far. Once that
    /// reaches `0xFFFF_FFFF`, which is not a valid phandle, the lowest unused
    /// value is handed out instead.
    pub fn phandle_of(&mut self, node: NodeId) -> u32 {
        if let Some(phandle) = self.phandle_at(node.0) {
            return phandle;
        }

        let phandle = if self.next_phandle < u32::MAX {
            let phandle = self.next_phandle;
            self.next_phandle += 1;
            phandle
        } else {
            self.lowest_free_phandle()
        };
        self.set_u32(node, "phandle", phandle);
        phandle
    }

    fn phandle_at(&self, index: usize) -> Option<u32> {
        self.nodes[index]
            .properties
            .iter()
            .find(|prop| prop.name() == "phandle")
            .and_then(Property::as_u32)
    }

    fn lowest_free_phandle(&self) -> u32 {
        let mut used: Vec<u32> = (0..self.nodes.len())
            .filter_map(|index| self.phandle_at(index))
            .collect();
        used.sort_unstable();
        used.dedup();

        // There are fewer phandles than nodes, so the walk ends well before
        // the top of the range.
        let mut candidate = 1;
        for phandle in used {
            if phandle > candidate {
                break;
            }
            if phandle == candidate {
                candidate += 1;
            }
        }
        candidate
    }

    pub fn build(self) -> Arc<DeviceTree> {
        DeviceTree::from_nodes(self.nodes)
    }
}

impl Default for DeviceTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
