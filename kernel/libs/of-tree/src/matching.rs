// SPDX-License-Identifier: MPL-2.0

use super::DeviceNode;

/// An entry of a driver's match table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfDeviceId {
    pub compatible: &'static str,
}

impl OfDeviceId {
    pub const fn new(compatible: &'static str) -> Self {
        Self { compatible }
    }
}

/// Finds the entry of `matches` that best describes `node`.
///
/// A node lists its `compatible` strings from the most to the least specific,
/// so the entry matching the earliest string wins. Among entries matching the
/// same string, the first one in the table wins.
pub fn match_node<'a>(matches: &'a [OfDeviceId], node: &DeviceNode) -> Option<&'a OfDeviceId> {
    matches
        .iter()
        .filter_map(|id| node.compatible_index(id.compatible).map(|index| (index, id)))
        .min_by_key(|(index, _)| *index)
        .map(|(_, id)| id)
}
