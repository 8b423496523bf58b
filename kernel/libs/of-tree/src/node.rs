// SPDX-License-Identifier: MPL-2.0

use alloc::{string::String, sync::Arc, vec::Vec};
use core::fmt::{self, Debug};

use super::{Property, StringList};

/// The per-node storage of a [`DeviceTree`].
#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) full_name: String,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) properties: Vec<Property>,
}

/// An immutable firmware tree.
///
/// Node 0 is the root. The nodes are reached through [`DeviceNode`] handles,
/// which keep the tree alive.
#[derive(Debug)]
pub struct DeviceTree {
    nodes: Vec<NodeData>,
}

impl DeviceTree {
    pub(crate) fn from_nodes(nodes: Vec<NodeData>) -> Arc<Self> {
        debug_assert!(!nodes.is_empty());
        Arc::new(Self { nodes })
    }

    /// Returns the root node.
    pub fn root(self: &Arc<Self>) -> DeviceNode {
        self.node(0)
    }

    fn node(self: &Arc<Self>, index: usize) -> DeviceNode {
        DeviceNode {
            tree: self.clone(),
            index,
        }
    }

    /// Iterates over all nodes in creation order, starting with the root.
    pub fn all_nodes(self: &Arc<Self>) -> impl Iterator<Item = DeviceNode> + '_ {
        (0..self.nodes.len()).map(|index| self.node(index))
    }

    /// Finds a node by its absolute path, e.g., `/soc/dma-router@40104000`.
    ///
    /// Each path component must match the full name (including the unit
    /// address) of a child.
    pub fn find_node_by_path(self: &Arc<Self>, path: &str) -> Option<DeviceNode> {
        let relative = path.strip_prefix('/')?;

        let mut index = 0;
        for component in relative.split('/').filter(|c| !c.is_empty()) {
            index = *self.nodes[index]
                .children
                .iter()
                .find(|&&child| self.nodes[child].full_name == component)?;
        }
        Some(self.node(index))
    }

    /// Finds the node that owns the given phandle.
    pub fn find_node_by_phandle(self: &Arc<Self>, phandle: u32) -> Option<DeviceNode> {
        self.all_nodes()
            .find(|node| node.phandle() == Some(phandle))
    }

    /// Finds the first node compatible with any of the given strings.
    pub fn find_compatible(self: &Arc<Self>, with: &[&str]) -> Option<DeviceNode> {
        self.all_nodes()
            .find(|node| with.iter().any(|compat| node.is_compatible(compat)))
    }
}

/// A handle to one node of a [`DeviceTree`].
///
/// Two handles are equal if they point to the same node of the same tree.
#[derive(Clone)]
pub struct DeviceNode {
    tree: Arc<DeviceTree>,
    index: usize,
}

impl DeviceNode {
    fn data(&self) -> &NodeData {
        &self.tree.nodes[self.index]
    }

    /// Returns the tree that owns this node.
    pub fn tree(&self) -> &Arc<DeviceTree> {
        &self.tree
    }

    /// Returns the node name.
    ///
    /// This is the value of the `name` property if there is one, and otherwise
    /// the full name with the unit address stripped (`serial` for `serial@1000`).
    pub fn name(&self) -> &str {
        if let Some(name) = self.property("name").and_then(Property::as_str) {
            return name;
        }
        let full_name = self.full_name();
        full_name.split('@').next().unwrap_or(full_name)
    }

    /// Returns the full name, including the unit address.
    ///
    /// The root node has an empty full name.
    pub fn full_name(&self) -> &str {
        &self.data().full_name
    }

    /// Returns the absolute path of the node.
    pub fn path(&self) -> String {
        let mut components = Vec::new();
        let mut current = Some(self.index);
        while let Some(index) = current {
            let data = &self.tree.nodes[index];
            if data.parent.is_some() {
                components.push(data.full_name.as_str());
            }
            current = data.parent;
        }

        if components.is_empty() {
            return String::from("/");
        }

        let mut path = String::new();
        for component in components.iter().rev() {
            path.push('/');
            path.push_str(component);
        }
        path
    }

    /// Returns the `device_type` property, if any.
    pub fn device_type(&self) -> Option<&str> {
        self.property("device_type").and_then(Property::as_str)
    }

    /// Iterates over the entries of the `compatible` property, in order.
    ///
    /// Entries are raw bytes; see [`StringList`].
    pub fn compatible(&self) -> StringList<'_> {
        self.property("compatible")
            .map(Property::strings)
            .unwrap_or_default()
    }

    /// Checks whether any `compatible` string equals `compat`, ignoring ASCII case.
    pub fn is_compatible(&self, compat: &str) -> bool {
        self.compatible_index(compat).is_some()
    }

    /// Returns the position of `compat` in the `compatible` list.
    pub(crate) fn compatible_index(&self, compat: &str) -> Option<usize> {
        self.compatible()
            .position(|entry| entry.eq_ignore_ascii_case(compat.as_bytes()))
    }

    pub fn properties(&self) -> &[Property] {
        &self.data().properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties().iter().find(|prop| prop.name() == name)
    }

    /// Reads the first cell of a property.
    pub fn read_u32(&self, name: &str) -> Option<u32> {
        self.property(name).and_then(Property::as_u32)
    }

    /// Returns the phandle of this node, if it has one.
    pub fn phandle(&self) -> Option<u32> {
        self.read_u32("phandle")
            .or_else(|| self.read_u32("linux,phandle"))
    }

    /// Resolves the `index`-th phandle of a phandle-list property.
    pub fn parse_phandle(&self, name: &str, index: usize) -> Option<DeviceNode> {
        let phandle = self.property(name)?.u32_at(index)?;
        self.tree.find_node_by_phandle(phandle)
    }

    /// Returns the number of phandles in a phandle-list property.
    pub fn count_phandles(&self, name: &str) -> usize {
        self.property(name).map_or(0, Property::cell_count)
    }

    pub fn parent(&self) -> Option<DeviceNode> {
        self.data().parent.map(|index| self.tree.node(index))
    }

    pub fn children(&self) -> impl Iterator<Item = DeviceNode> + '_ {
        self.data()
            .children
            .iter()
            .map(|&index| self.tree.node(index))
    }
}

impl PartialEq for DeviceNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree) && self.index == other.index
    }
}

impl Eq for DeviceNode {}

impl Debug for DeviceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceNode").field(&self.path()).finish()
    }
}
