// SPDX-License-Identifier: MPL-2.0

//! The registration point of DMA request routers.
//!
//! A DMA consumer names its DMA provider with a phandle followed by a number
//! of argument cells. When the provider is a router (a multiplexer sitting in
//! front of one or more DMA controllers), the router rewrites the request so
//! that it points at the actual DMA controller, and keeps some per-route
//! state alive for as long as the channel is in use.
//!
//! Reference: <https://elixir.bootlin.com/linux/v6.0.9/source/drivers/dma/of-dma.c#L205>.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::{any::Any, fmt::Debug};

use kernel_error::{Errno, Result, return_errno_with_message};
use log::debug;
use of_tree::DeviceNode;
use spin::Mutex;

/// A DMA request as described by the firmware: the provider node and the
/// argument cells that follow its phandle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmaSpec {
    pub node: DeviceNode,
    pub args: Vec<u32>,
}

impl DmaSpec {
    pub fn new(node: DeviceNode, args: Vec<u32>) -> Self {
        Self { node, args }
    }
}

/// The state a router keeps for one allocated route.
///
/// Dropping the route releases it.
pub trait DmaRoute: Any + Send + Sync + Debug {
    fn as_any(&self) -> &dyn Any;
}

/// A DMA request router.
pub trait DmaRouter: Send + Sync + Debug {
    /// Allocates a route for `dma_spec`.
    ///
    /// On success, `dma_spec` has been rewritten to address the DMA
    /// controller that serves the route.
    fn route_allocate(&self, dma_spec: &mut DmaSpec) -> Result<Box<dyn DmaRoute>>;
}

/// A DMA request after routing.
#[derive(Debug)]
pub struct RoutedDmaSpec {
    spec: DmaSpec,
    route: Option<Box<dyn DmaRoute>>,
}

impl RoutedDmaSpec {
    /// Returns the request as the DMA controller should see it.
    pub fn spec(&self) -> &DmaSpec {
        &self.spec
    }

    /// Returns the route state, if a router was involved.
    pub fn route(&self) -> Option<&dyn DmaRoute> {
        self.route.as_deref()
    }

    pub fn into_parts(self) -> (DmaSpec, Option<Box<dyn DmaRoute>>) {
        (self.spec, self.route)
    }
}

/// The table of registered routers, keyed by their firmware node.
#[derive(Debug, Default)]
pub struct DmaRouterRegistry {
    routers: Mutex<Vec<(DeviceNode, Arc<dyn DmaRouter>)>>,
}

impl DmaRouterRegistry {
    pub const fn new() -> Self {
        Self {
            routers: Mutex::new(Vec::new()),
        }
    }

    /// Registers `router` as the DMA provider described by `node`.
    pub fn register(&self, node: DeviceNode, router: Arc<dyn DmaRouter>) -> Result<()> {
        let mut routers = self.routers.lock();
        if routers.iter().any(|(registered, _)| *registered == node) {
            return_errno_with_message!(Errno::EEXIST, "the DMA router already exists");
        }
        debug!("[OF-DMA]: Registered a DMA router for {}", node.path());
        routers.push((node, router));
        Ok(())
    }

    /// Unregisters the router of `node`, returning it if found.
    pub fn unregister(&self, node: &DeviceNode) -> Result<Arc<dyn DmaRouter>> {
        let mut routers = self.routers.lock();
        let Some(pos) = routers.iter().position(|(registered, _)| registered == node) else {
            return_errno_with_message!(Errno::ENOENT, "the DMA router does not exist");
        };
        Ok(routers.remove(pos).1)
    }

    /// Looks up the router of `node`.
    pub fn lookup(&self, node: &DeviceNode) -> Option<Arc<dyn DmaRouter>> {
        self.routers
            .lock()
            .iter()
            .find(|(registered, _)| registered == node)
            .map(|(_, router)| router.clone())
    }

    /// Routes a DMA request.
    ///
    /// Requests whose provider is not a registered router are returned
    /// unchanged. Otherwise the router rewrites the request and the returned
    /// value keeps the route alive.
    pub fn route(&self, mut spec: DmaSpec) -> Result<RoutedDmaSpec> {
        // The registry lock must not be held while the router runs.
        let Some(router) = self.lookup(&spec.node) else {
            return Ok(RoutedDmaSpec { spec, route: None });
        };

        let route = router.route_allocate(&mut spec).map_err(|err| {
            debug!("[OF-DMA]: Routing through {:?} failed: {}", router, err);
            err
        })?;

        Ok(RoutedDmaSpec {
            spec,
            route: Some(route),
        })
    }
}
