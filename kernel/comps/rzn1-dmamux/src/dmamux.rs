// SPDX-License-Identifier: MPL-2.0

use alloc::{
    boxed::Box,
    sync::{Arc, Weak},
};
use core::{
    any::Any,
    fmt::{self, Debug},
};

use kernel_error::{Errno, Error, Result, return_errno_with_message};
use log::{debug, error, info};
use of_dma::{DmaRoute, DmaRouter, DmaRouterRegistry, DmaSpec};
use of_tree::{DeviceNode, match_node};
use spin::Mutex;

use super::{DmamuxControl, RZN1_DMAC_MATCH, RZN1_DMAMUX_LINES};

/// The number of cells a DMA consumer passes to the DMAMUX.
const DMAMUX_CELLS: usize = 6;

/// The number of cells the DMAMUX keeps for the DMAC.
const DMAC_CELLS: usize = DMAMUX_CELLS - 2;

/// A DMAMUX instance.
#[derive(Debug)]
pub struct Rzn1Dmamux {
    node: DeviceNode,
    /// The number of request lines of one DMAC.
    dmac_requests: u32,
    /// The number of virtual request lines.
    dmamux_requests: u32,
    /// One bit per allocated virtual line.
    ///
    /// The lock also serializes the writes to the DMAMUX register.
    used_chans: Mutex<u64>,
    control: Arc<dyn DmamuxControl>,
    weak_self: Weak<Self>,
}

impl Rzn1Dmamux {
    /// Creates a DMAMUX described by `node`.
    ///
    /// `dmac_requests` must not be zero and `dmamux_requests` must not exceed
    /// [`RZN1_DMAMUX_LINES`].
    pub fn new(
        node: DeviceNode,
        dmac_requests: u32,
        dmamux_requests: u32,
        control: Arc<dyn DmamuxControl>,
    ) -> Result<Arc<Self>> {
        if dmac_requests == 0 {
            return_errno_with_message!(Errno::EINVAL, "the DMAC has no request lines");
        }
        if dmamux_requests > RZN1_DMAMUX_LINES {
            return_errno_with_message!(Errno::EINVAL, "too many mux request lines");
        }

        Ok(Arc::new_cyclic(|weak_self| Self {
            node,
            dmac_requests,
            dmamux_requests,
            used_chans: Mutex::new(0),
            control,
            weak_self: weak_self.clone(),
        }))
    }

    /// Creates the DMAMUX described by `mux_node` and registers it as the DMA
    /// router of that node.
    ///
    /// The line counts come from the `dma-requests` properties of the DMAMUX
    /// and of its first DMA master, which must be an RZ/N1 DMAC.
    pub fn probe(
        mux_node: &DeviceNode,
        control: Arc<dyn DmamuxControl>,
        routers: &DmaRouterRegistry,
    ) -> Result<Arc<Self>> {
        let Some(dmac_node) = mux_node.parse_phandle("dma-masters", 0) else {
            error!("[DMAMUX]: Can't get DMA master node");
            return_errno_with_message!(Errno::ENODEV, "the DMA master node is missing");
        };

        if match_node(&RZN1_DMAC_MATCH, &dmac_node).is_none() {
            error!("[DMAMUX]: DMA master is not supported");
            return_errno_with_message!(Errno::EINVAL, "the DMA master is not supported");
        }

        let Some(dmac_requests) = dmac_node.read_u32("dma-requests") else {
            error!("[DMAMUX]: Missing DMAC requests information");
            return_errno_with_message!(Errno::EINVAL, "the DMAC request count is missing");
        };

        let Some(dmamux_requests) = mux_node.read_u32("dma-requests") else {
            error!("[DMAMUX]: Missing mux requests information");
            return_errno_with_message!(Errno::EINVAL, "the mux request count is missing");
        };

        let dmamux = Self::new(mux_node.clone(), dmac_requests, dmamux_requests, control)?;
        routers.register(mux_node.clone(), dmamux.clone())?;

        info!(
            "[DMAMUX]: {} routes {} request lines to DMACs with {} lines each",
            mux_node.path(),
            dmamux_requests,
            dmac_requests
        );
        Ok(dmamux)
    }

    /// Allocates the virtual line requested by `dma_spec` and programs its
    /// mux bit.
    ///
    /// On success, `dma_spec` addresses the DMAC serving the line and only
    /// keeps the four DMAC cells.
    pub fn allocate_route(&self, dma_spec: &mut DmaSpec) -> Result<RouteMapping> {
        if dma_spec.args.len() != DMAMUX_CELLS {
            return_errno_with_message!(Errno::EINVAL, "the DMA request must have six cells");
        }

        let chan = dma_spec.args[0];
        let req_idx = dma_spec.args[4];
        let val = dma_spec.args[5];

        if chan >= self.dmac_requests {
            error!("[DMAMUX]: Invalid DMA request line: {}", chan);
            return_errno_with_message!(Errno::EINVAL, "invalid DMA request line");
        }

        if req_idx >= self.dmamux_requests || req_idx % self.dmac_requests != chan {
            error!("[DMAMUX]: Invalid MUX request line: {}", req_idx);
            return_errno_with_message!(Errno::EINVAL, "invalid MUX request line");
        }

        let master = if req_idx >= self.dmac_requests { 1 } else { 0 };
        let Some(master_node) = self.node.parse_phandle("dma-masters", master) else {
            error!("[DMAMUX]: Can't get DMA master");
            return_errno_with_message!(Errno::EINVAL, "the DMA master is missing");
        };

        let dmamux = self
            .weak_self
            .upgrade()
            .ok_or_else(|| Error::with_message(Errno::ENODEV, "the DMAMUX is gone"))?;

        debug!(
            "[DMAMUX]: Mapping DMAMUX request {} to DMAC{} request {}",
            req_idx, master, chan
        );

        let mask = 1u64 << req_idx;
        {
            let mut used_chans = self.used_chans.lock();
            // A line that is already in use is handed out again. Its
            // mappings share the bit, and the first one released clears it.
            if *used_chans & mask != 0 {
                debug!("[DMAMUX]: DMAMUX request {} is already in use", req_idx);
            }
            *used_chans |= mask;
            if let Err(err) = self
                .control
                .set_dmamux(mask, if val != 0 { mask } else { 0 })
            {
                *used_chans &= !mask;
                return Err(err);
            }
        }

        dma_spec.node = master_node;
        dma_spec.args.truncate(DMAC_CELLS);

        Ok(RouteMapping { req_idx, dmamux })
    }

    /// Releases the virtual line of `map`.
    ///
    /// The mux bit of the line is left as it is.
    pub fn free_route(&self, map: RouteMapping) {
        debug_assert!(core::ptr::eq(Arc::as_ptr(&map.dmamux), self));
        drop(map);
    }

    fn release(&self, req_idx: u32) {
        debug!("[DMAMUX]: Unmapping DMAMUX request {}", req_idx);
        *self.used_chans.lock() &= !(1u64 << req_idx);
    }

    /// Returns the mask of allocated virtual lines.
    pub fn used_chans(&self) -> u64 {
        *self.used_chans.lock()
    }

    pub fn dmac_requests(&self) -> u32 {
        self.dmac_requests
    }

    pub fn dmamux_requests(&self) -> u32 {
        self.dmamux_requests
    }

    pub fn node(&self) -> &DeviceNode {
        &self.node
    }
}

impl DmaRouter for Rzn1Dmamux {
    fn route_allocate(&self, dma_spec: &mut DmaSpec) -> Result<Box<dyn DmaRoute>> {
        let map = self.allocate_route(dma_spec)?;
        Ok(Box::new(map))
    }
}

/// An allocated virtual request line.
///
/// The line is released when the mapping is dropped or handed to
/// [`Rzn1Dmamux::free_route`].
pub struct RouteMapping {
    req_idx: u32,
    dmamux: Arc<Rzn1Dmamux>,
}

impl RouteMapping {
    /// Returns the virtual request line.
    pub fn req_idx(&self) -> u32 {
        self.req_idx
    }
}

impl Drop for RouteMapping {
    fn drop(&mut self) {
        self.dmamux.release(self.req_idx);
    }
}

impl DmaRoute for RouteMapping {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Debug for RouteMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMapping")
            .field("req_idx", &self.req_idx)
            .field("dmamux", &self.dmamux.node().path())
            .finish()
    }
}
