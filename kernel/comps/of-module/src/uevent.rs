// SPDX-License-Identifier: MPL-2.0

//! Uevent environment variables of device-tree nodes.
//!
//! Reference: <https://elixir.bootlin.com/linux/v6.0.9/source/drivers/of/device.c#L262>.

use alloc::{boxed::Box, string::String, vec, vec::Vec};
use core::fmt::{self, Write};

use kernel_error::{Errno, Result, return_errno, return_errno_with_message};
use log::warn;
use of_tree::{DeviceNode, OfAliases};

use crate::{modalias::modalias_into, writer::SliceWriter};

/// The maximum number of variables in a [`UeventEnv`].
pub const UEVENT_NUM_ENVP: usize = 64;

/// The capacity of the buffer behind a [`UeventEnv`], in bytes.
pub const UEVENT_BUFFER_SIZE: usize = 2048;

/// The environment sent along with a uevent.
///
/// Variables are packed into a fixed-size buffer as `KEY=VALUE` strings, each
/// followed by a NUL byte. Adding a variable fails with `ENOMEM` when either
/// the buffer or the variable table is full.
pub struct UeventEnv {
    envp: Vec<usize>,
    buf: Box<[u8]>,
    buflen: usize,
}

impl UeventEnv {
    pub fn new() -> Self {
        Self {
            envp: Vec::with_capacity(UEVENT_NUM_ENVP),
            buf: vec![0u8; UEVENT_BUFFER_SIZE].into_boxed_slice(),
            buflen: 0,
        }
    }

    /// Adds a variable. See also [`add_uevent_var`].
    ///
    /// [`add_uevent_var`]: crate::add_uevent_var
    pub fn add_var(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        self.add_var_bytes(args, &[])
    }

    /// Adds a variable whose value is taken byte for byte.
    ///
    /// `key` is formatted first (e.g., `OF_COMPATIBLE_0=`) and `value` follows
    /// it unchanged, so firmware strings need not be valid UTF-8.
    pub fn add_var_bytes(&mut self, key: fmt::Arguments<'_>, value: &[u8]) -> Result<()> {
        if self.envp.len() >= UEVENT_NUM_ENVP {
            warn!("[UEVENT]: Too many keys");
            return_errno_with_message!(Errno::ENOMEM, "too many uevent variables");
        }

        let start = self.buflen;
        let space = self.buf.len() - start;
        let key_len = {
            let mut writer = SliceWriter::new(&mut self.buf[start..]);
            // `SliceWriter` never fails.
            let _ = writer.write_fmt(key);
            writer.total()
        };
        let len = key_len + value.len();
        // One byte is reserved for the terminator.
        if len >= space {
            warn!("[UEVENT]: Buffer size too small");
            return_errno_with_message!(Errno::ENOMEM, "the uevent buffer is full");
        }

        self.buf[start + key_len..start + len].copy_from_slice(value);
        self.buf[start + len] = 0;
        self.envp.push(start);
        self.buflen += len + 1;
        Ok(())
    }

    /// Iterates over the variables as raw `KEY=VALUE` bytes.
    pub fn raw_vars(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.envp.iter().map(|&start| {
            let rest = &self.buf[start..self.buflen];
            let end = rest.iter().position(|&byte| byte == 0).unwrap_or(rest.len());
            &rest[..end]
        })
    }

    /// Iterates over the variables as `KEY=VALUE` strings.
    ///
    /// Variables that are not valid UTF-8 are only visible through
    /// [`raw_vars`](Self::raw_vars).
    pub fn vars(&self) -> impl Iterator<Item = &str> + '_ {
        self.raw_vars()
            .filter_map(|var| core::str::from_utf8(var).ok())
    }

    /// Returns the raw value of the first variable named `key`.
    pub fn get_raw(&self, key: &str) -> Option<&[u8]> {
        self.raw_vars().find_map(|var| {
            var.strip_prefix(key.as_bytes())
                .and_then(|rest| rest.strip_prefix(b"="))
        })
    }

    /// Returns the value of the first variable named `key`.
    ///
    /// Returns `None` if there is no such variable or its value is not valid
    /// UTF-8.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_raw(key)
            .and_then(|value| core::str::from_utf8(value).ok())
    }

    /// Returns the number of variables.
    pub fn len(&self) -> usize {
        self.envp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envp.is_empty()
    }

    /// Returns the number of buffer bytes in use, terminators included.
    pub fn buflen(&self) -> usize {
        self.buflen
    }
}

impl Default for UeventEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UeventEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.raw_vars().map(String::from_utf8_lossy))
            .finish()
    }
}

/// Adds a formatted variable to a [`UeventEnv`].
///
/// # Example
///
/// ```
/// use of_module::{UeventEnv, add_uevent_var};
///
/// let mut env = UeventEnv::new();
/// add_uevent_var!(env, "OF_COMPATIBLE_{}={}", 0, "ns16550a").unwrap();
/// assert_eq!(env.get("OF_COMPATIBLE_0"), Some("ns16550a"));
/// ```
#[macro_export]
macro_rules! add_uevent_var {
    ($env: expr, $($arg: tt)*) => {
        $env.add_var(format_args!($($arg)*))
    };
}

/// Adds the `OF_*` variables describing `node` to `env`.
///
/// These are `OF_NAME`, `OF_FULLNAME`, `OF_TYPE` if the node has a type,
/// `OF_COMPATIBLE_<i>` for every compatible string, `OF_COMPATIBLE_N`, and
/// `OF_ALIAS_<i>` for every alias of the node registered in `aliases`.
pub fn uevent(node: Option<&DeviceNode>, env: &mut UeventEnv, aliases: &OfAliases) -> Result<()> {
    let Some(node) = node else {
        return_errno!(Errno::ENODEV);
    };

    add_uevent_var!(env, "OF_NAME={}", node.name())?;
    add_uevent_var!(env, "OF_FULLNAME={}", node.path())?;
    if let Some(device_type) = node.device_type() {
        add_uevent_var!(env, "OF_TYPE={}", device_type)?;
    }

    // A compatible string can contain anything, commas included, so each one
    // gets its own variable instead of being joined into a list.
    let mut seen = 0;
    for compat in node.compatible() {
        env.add_var_bytes(format_args!("OF_COMPATIBLE_{}=", seen), compat)?;
        seen += 1;
    }
    add_uevent_var!(env, "OF_COMPATIBLE_N={}", seen)?;

    // The registry stays locked while the aliases are copied into `env`.
    let mut seen = 0;
    aliases.for_each_alias_of(node, |alias| {
        add_uevent_var!(env, "OF_ALIAS_{}={}", seen, alias)?;
        seen += 1;
        Ok(())
    })
}

/// Adds the `MODALIAS` variable of `node` to `env`.
///
/// The alias is formatted straight into the free space of the buffer. If it
/// does not fit, the call fails with `ENOMEM` and leaves an empty `MODALIAS=`
/// behind; it does not retry with a larger buffer.
pub fn uevent_modalias(node: Option<&DeviceNode>, env: &mut UeventEnv) -> Result<()> {
    let Some(node) = node else {
        return_errno!(Errno::ENODEV);
    };

    add_uevent_var!(env, "MODALIAS=")?;

    // Start on the terminator of `MODALIAS=` and keep one byte for the new one.
    let start = env.buflen - 1;
    let space = env.buf.len() - env.buflen;
    let len = modalias_into(node, &mut env.buf[start..start + space]);
    if len >= space {
        env.buf[start] = 0;
        return_errno_with_message!(
            Errno::ENOMEM,
            "the modalias does not fit in the uevent buffer"
        );
    }

    env.buf[start + len] = 0;
    env.buflen += len;
    Ok(())
}
