// SPDX-License-Identifier: MPL-2.0

//! The firmware tree as seen by device drivers.
//!
//! A [`DeviceTree`] is an immutable set of nodes, each carrying a list of
//! properties stored the same way a flattened device tree stores them: raw
//! bytes, with integers in big-endian cells and strings NUL-terminated.
//! Nodes refer to each other through phandles.
//!
//! Trees are assembled with a [`DeviceTreeBuilder`]. Parsing a flattened blob
//! is left to the boot code, which feeds the builder.
//!
//! Besides the tree itself, this crate provides compatible-string match
//! tables ([`OfDeviceId`]) and the registry of `/aliases` entries
//! ([`OfAliases`]).

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

mod alias;
mod builder;
mod matching;
mod node;
mod property;

pub use self::{
    alias::{AliasProp, OfAliases},
    builder::{DeviceTreeBuilder, NodeId},
    matching::{OfDeviceId, match_node},
    node::{DeviceNode, DeviceTree},
    property::{Property, StringList},
};
