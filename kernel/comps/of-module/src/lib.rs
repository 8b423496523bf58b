// SPDX-License-Identifier: MPL-2.0

//! Module helpers for device-tree nodes.
//!
//! A node is described to the module subsystem by its module alias (see
//! [`modalias`]) and to user space, on hotplug, by a set of uevent variables
//! (see [`uevent`] and [`uevent_modalias`]).

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

mod modalias;
#[cfg(test)]
mod test;
mod uevent;
mod writer;

use alloc::vec::Vec;
use core::ffi::CStr;

use kernel_error::{Errno, Error, Result, return_errno};
use log::debug;
use of_tree::DeviceNode;

pub use self::{
    modalias::{modalias, modalias_into, modalias_len, printable_modalias},
    uevent::{UEVENT_BUFFER_SIZE, UEVENT_NUM_ENVP, UeventEnv, uevent, uevent_modalias},
};

/// The module subsystem, as seen by device-tree code.
pub trait ModuleLoader: Send + Sync {
    /// Locates and loads the module matching `name`.
    fn request_module(&self, name: &CStr) -> Result<()>;
}

/// Asks `loader` to load the driver module for `node`.
///
/// The result of the loader is passed back unchanged.
pub fn request_module(node: Option<&DeviceNode>, loader: &dyn ModuleLoader) -> Result<()> {
    let Some(node) = node else {
        return_errno!(Errno::ENODEV);
    };

    // One more byte for the terminator.
    let size = modalias_len(node) + 1;

    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| Error::with_message(Errno::ENOMEM, "cannot allocate the modalias"))?;
    buf.resize(size, 0);

    modalias_into(node, &mut buf[..size - 1]);
    buf[size - 1] = 0;

    let name = CStr::from_bytes_with_nul(&buf)?;
    debug!("[OF]: Requesting module {:?} for {}", name, node.path());
    loader.request_module(name)
}
