// SPDX-License-Identifier: MPL-2.0

//! The module alias of a device-tree node.
//!
//! The alias has the form `of:N<name>T<type>C<compatible>C<compatible>...`,
//! where the type is empty if the node has no `device_type` and every space
//! of a compatible string is turned into an underscore. Module tooling
//! matches it against the `of:` aliases that drivers export.

use alloc::{string::String, vec};
use core::fmt::Write;

use kernel_error::{Errno, Result, return_errno, return_errno_with_message};
use log::warn;
use of_tree::DeviceNode;

use crate::writer::SliceWriter;

/// Formats the module alias of `node` into `buf`.
///
/// Returns the size of the complete alias, which may exceed `buf.len()`. In
/// that case the output is incomplete: the fixed `of:N<name>T<type>` prefix
/// is truncated to the buffer, and a compatible entry that does not fit in
/// the remaining space is left out while later, shorter entries may still be
/// written. Passing an empty buffer only measures the alias.
///
/// Nothing is terminated; the caller owns the bytes after the returned size.
pub fn modalias_into(node: &DeviceNode, buf: &mut [u8]) -> usize {
    let (mut total, mut offset) = {
        let mut writer = SliceWriter::new(buf);
        // `SliceWriter` never fails.
        let _ = write!(
            writer,
            "of:N{}T{}",
            node.name(),
            node.device_type().unwrap_or("")
        );
        (writer.total(), writer.written())
    };

    for compat in node.compatible() {
        let size = compat.len() + 1;
        total += size;
        if size > buf.len() - offset {
            continue;
        }

        let entry = &mut buf[offset..offset + size];
        entry[0] = b'C';
        for (dst, &src) in entry[1..].iter_mut().zip(compat) {
            *dst = if src == b' ' { b'_' } else { src };
        }
        offset += size;
    }

    total
}

/// Returns the size of the module alias of `node`.
pub fn modalias_len(node: &DeviceNode) -> usize {
    modalias_into(node, &mut [])
}

/// Returns the module alias of `node`.
///
/// Compatible entries that are not valid UTF-8 have their invalid bytes
/// replaced with U+FFFD; use [`modalias_into`] to get the exact bytes.
pub fn modalias(node: &DeviceNode) -> String {
    let mut buf = vec![0u8; modalias_len(node)];
    modalias_into(node, &mut buf);

    String::from_utf8(buf).unwrap_or_else(|err| {
        warn!("[OF]: The modalias of {} is not valid UTF-8", node.path());
        String::from_utf8_lossy(err.as_bytes()).into_owned()
    })
}

/// Formats the module alias of `node` as a line of text, as read from a
/// sysfs `modalias` attribute.
///
/// The output is the alias, a newline and a NUL byte. Returns the length of
/// the line, including the newline but not the NUL byte.
pub fn printable_modalias(node: Option<&DeviceNode>, buf: &mut [u8]) -> Result<usize> {
    let Some(node) = node else {
        return_errno!(Errno::ENODEV);
    };

    let Some(limit) = buf.len().checked_sub(2) else {
        return_errno_with_message!(Errno::ENOMEM, "the buffer cannot hold a modalias line");
    };

    let len = modalias_into(node, &mut buf[..limit]);
    if len > limit {
        return_errno_with_message!(Errno::ENOMEM, "the modalias does not fit in the buffer");
    }

    buf[len] = b'\n';
    buf[len + 1] = 0;
    Ok(len + 1)
}
