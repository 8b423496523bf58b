// SPDX-License-Identifier: MPL-2.0

//! Error numbers and the error type shared by the OF and DMA crates.
//!
//! The numbering follows Linux so that an [`Error`] can be handed back to the
//! generic kernel layers without translation.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

use core::fmt;

/// Error number.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Errno {
    ENOENT = 2,  /* No such file or directory */
    EIO = 5,     /* I/O error */
    E2BIG = 7,   /* Argument list too long */
    ENOMEM = 12, /* Out of memory */
    EEXIST = 17, /* File exists */
    ENODEV = 19, /* No such device */
    EINVAL = 22, /* Invalid argument */
}

/// The error type used by the crates of this workspace.
#[derive(Debug, Clone, Copy)]
pub struct Error {
    errno: Errno,
    msg: Option<&'static str>,
}

impl Error {
    pub const fn new(errno: Errno) -> Self {
        Error { errno, msg: None }
    }

    pub const fn with_message(errno: Errno, msg: &'static str) -> Self {
        Error {
            errno,
            msg: Some(msg),
        }
    }

    pub const fn error(&self) -> Errno {
        self.errno
    }

    pub const fn message(&self) -> Option<&'static str> {
        self.msg
    }
}

impl PartialEq for Error {
    /// Two errors are equal if they carry the same error number.
    ///
    /// The message is diagnostic only and takes no part in the comparison.
    fn eq(&self, other: &Self) -> bool {
        self.errno == other.errno
    }
}

impl Eq for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.msg {
            Some(msg) => write!(f, "{:?}: {}", self.errno, msg),
            None => write!(f, "{:?}", self.errno),
        }
    }
}

impl From<Errno> for Error {
    fn from(errno: Errno) -> Self {
        Error::new(errno)
    }
}

impl From<core::ffi::FromBytesWithNulError> for Error {
    fn from(_: core::ffi::FromBytesWithNulError) -> Self {
        Error::with_message(Errno::E2BIG, "Cannot find null in cstring")
    }
}

pub type Result<T> = core::result::Result<T, Error>;

#[macro_export]
macro_rules! return_errno {
    ($errno: expr) => {
        return Err($crate::Error::new($errno))
    };
}

#[macro_export]
macro_rules! return_errno_with_message {
    ($errno: expr, $message: expr) => {
        return Err($crate::Error::with_message($errno, $message))
    };
}
