// SPDX-License-Identifier: MPL-2.0

//! The DMA request multiplexer (DMAMUX) of the Renesas RZ/N1 SoC.
//!
//! The SoC has two DMA controllers (DMACs) with the same number of request
//! lines each. Peripherals are wired to the inputs of the DMAMUX instead,
//! whose virtual request lines are grouped in bands of one DMAC's size: the
//! first band feeds the first DMAC, the following lines the second one, and
//! the position of a line inside its band is the DMAC request line it lands
//! on. One bit per virtual line in a system-controller register selects
//! which of the two peripherals sharing that line is routed.
//!
//! A DMA consumer refers to the DMAMUX with six cells:
//!
//! ```text
//! dmas = <&dmamux chan 0 0 0 req_idx val>;
//! ```
//!
//! where `chan` is the DMAC request line, the three middle cells belong to the
//! DMAC, `req_idx` is the virtual line and `val` the value of its mux bit.
//!
//! Reference: <https://elixir.bootlin.com/linux/v6.0.9/source/drivers/dma/dw/rzn1-dmamux.c>.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

mod dmamux;

use alloc::{sync::Arc, vec::Vec};
use core::fmt::Debug;

use kernel_error::{Errno, Result, return_errno_with_message};
use log::{error, info};
use of_dma::DmaRouterRegistry;
use of_tree::{DeviceNode, DeviceTree, OfDeviceId, match_node};

pub use self::dmamux::{RouteMapping, Rzn1Dmamux};

/// The maximum number of virtual request lines of the DMAMUX.
pub const RZN1_DMAMUX_LINES: u32 = 64;

/// The DMA controllers the DMAMUX can sit in front of.
pub static RZN1_DMAC_MATCH: [OfDeviceId; 1] = [OfDeviceId::new("renesas,rzn1-dma")];

/// The match table of the DMAMUX driver.
pub static RZN1_DMAMUX_MATCH: [OfDeviceId; 1] = [OfDeviceId::new("renesas,rzn1-dmamux")];

/// Access to the DMAMUX register of the system controller.
pub trait DmamuxControl: Send + Sync + Debug {
    /// Sets the bits of the DMAMUX register selected by `mask` to those of `val`.
    ///
    /// Bits outside of `mask` are left unchanged.
    fn set_dmamux(&self, mask: u64, val: u64) -> Result<()>;
}

/// The platform driver of the DMAMUX.
#[derive(Debug)]
pub struct Rzn1DmamuxDriver {
    control: Arc<dyn DmamuxControl>,
    routers: Arc<DmaRouterRegistry>,
}

impl Rzn1DmamuxDriver {
    pub const NAME: &'static str = "renesas,rzn1-dmamux";

    pub fn new(control: Arc<dyn DmamuxControl>, routers: Arc<DmaRouterRegistry>) -> Self {
        Self { control, routers }
    }

    pub fn of_match_table(&self) -> &'static [OfDeviceId] {
        &RZN1_DMAMUX_MATCH
    }

    /// Binds the driver to `node`.
    pub fn probe(&self, node: &DeviceNode) -> Result<Arc<Rzn1Dmamux>> {
        if match_node(self.of_match_table(), node).is_none() {
            return_errno_with_message!(Errno::ENODEV, "the node is not a DMAMUX");
        }
        Rzn1Dmamux::probe(node, self.control.clone(), &self.routers)
    }

    /// Binds the driver to every matching node of `tree`.
    ///
    /// Nodes that fail to probe are reported and skipped.
    pub fn probe_all(&self, tree: &Arc<DeviceTree>) -> Vec<Arc<Rzn1Dmamux>> {
        let mut devices = Vec::new();
        for node in tree.all_nodes() {
            if match_node(self.of_match_table(), &node).is_none() {
                continue;
            }
            match self.probe(&node) {
                Ok(device) => devices.push(device),
                Err(err) => error!("[DMAMUX]: Failed to probe {}: {}", node.path(), err),
            }
        }
        info!("[DMAMUX]: {} probed {} device(s)", Self::NAME, devices.len());
        devices
    }
}
