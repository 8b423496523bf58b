// SPDX-License-Identifier: MPL-2.0

//! The registry of `/aliases` entries.
//!
//! An alias such as `serial0 = "/soc/serial@40060000"` gives a node a stable
//! name made of a stem (`serial`) and an ID (`0`). Drivers use the ID to
//! number their devices, and the uevent code reports every alias of a node.
//!
//! Reference: <https://elixir.bootlin.com/linux/v6.0.9/source/drivers/of/base.c#L1961>.

use alloc::{
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};

use kernel_error::{Errno, Error, Result, return_errno_with_message};
use log::debug;
use spin::Mutex;

use super::{DeviceNode, DeviceTree};

/// One alias of a node.
#[derive(Debug, Clone)]
pub struct AliasProp {
    alias: String,
    stem: String,
    id: u32,
    node: DeviceNode,
}

impl AliasProp {
    /// Splits `alias` into its stem and ID.
    ///
    /// Fails if the alias does not end with a decimal ID.
    fn new(alias: &str, node: DeviceNode) -> Result<Self> {
        let stem = alias.trim_end_matches(|c: char| c.is_ascii_digit());
        let id = alias[stem.len()..]
            .parse::<u32>()
            .map_err(|_| Error::with_message(Errno::EINVAL, "the alias has no valid ID"))?;

        Ok(Self {
            alias: alias.to_string(),
            stem: stem.to_string(),
            id,
            node,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn node(&self) -> &DeviceNode {
        &self.node
    }
}

/// The alias registry.
///
/// The registry is owned by whoever sets up the firmware tree and is handed
/// explicitly to the code that needs it. All entries live behind one lock.
#[derive(Debug, Default)]
pub struct OfAliases {
    lookup: Mutex<Vec<AliasProp>>,
}

impl OfAliases {
    pub const fn new() -> Self {
        Self {
            lookup: Mutex::new(Vec::new()),
        }
    }

    /// Registers every usable entry of the `/aliases` node of `tree`.
    ///
    /// Entries whose path does not resolve or whose name carries no ID are
    /// skipped. Returns the number of registered aliases.
    pub fn scan(&self, tree: &Arc<DeviceTree>) -> usize {
        let Some(aliases) = tree.find_node_by_path("/aliases") else {
            return 0;
        };

        let mut added = 0;
        for prop in aliases.properties() {
            if matches!(prop.name(), "name" | "phandle" | "linux,phandle") {
                continue;
            }

            let Some(node) = prop.as_str().and_then(|path| tree.find_node_by_path(path)) else {
                continue;
            };

            if self.add(prop.name(), node).is_ok() {
                added += 1;
            }
        }
        added
    }

    /// Registers `alias` as a name of `node`.
    pub fn add(&self, alias: &str, node: DeviceNode) -> Result<()> {
        let prop = AliasProp::new(alias, node)?;
        debug!(
            "[OF]: Adding DT alias {}: stem={} id={} node={}",
            prop.alias,
            prop.stem,
            prop.id,
            prop.node.path()
        );
        self.lookup.lock().push(prop);
        Ok(())
    }

    /// Returns the ID of the alias of `node` with the given stem.
    pub fn alias_id(&self, node: &DeviceNode, stem: &str) -> Result<u32> {
        let lookup = self.lookup.lock();
        match lookup
            .iter()
            .find(|prop| prop.stem == stem && &prop.node == node)
        {
            Some(prop) => Ok(prop.id),
            None => return_errno_with_message!(Errno::ENODEV, "the node has no such alias"),
        }
    }

    /// Returns the highest ID registered for the given stem.
    pub fn highest_id(&self, stem: &str) -> Option<u32> {
        self.lookup
            .lock()
            .iter()
            .filter(|prop| prop.stem == stem)
            .map(|prop| prop.id)
            .max()
    }

    /// Visits the aliases of `node` in registration order.
    ///
    /// # Deadlock
    ///
    /// The registry lock is held while `f` runs, so `f` must not call back
    /// into this registry.
    pub fn for_each_alias_of<F>(&self, node: &DeviceNode, mut f: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        let lookup = self.lookup.lock();
        for prop in lookup.iter().filter(|prop| &prop.node == node) {
            f(&prop.alias)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lookup.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.lock().is_empty()
    }
}
