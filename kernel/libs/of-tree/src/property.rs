// SPDX-License-Identifier: MPL-2.0

use alloc::{string::String, vec::Vec};
use core::iter::FusedIterator;

/// A named property of a firmware node.
///
/// The value is kept in its firmware encoding. Integer cells are 32-bit
/// big-endian values and strings are NUL-terminated; a string list is a
/// concatenation of such strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    name: String,
    value: Vec<u8>,
}

impl Property {
    pub fn new(name: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Returns the first cell of the property.
    ///
    /// Returns `None` if the value is shorter than one cell.
    pub fn as_u32(&self) -> Option<u32> {
        self.u32_at(0)
    }

    /// Returns the cell at `index`.
    pub fn u32_at(&self, index: usize) -> Option<u32> {
        let start = index.checked_mul(4)?;
        let bytes = self.value.get(start..start.checked_add(4)?)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Returns the number of whole cells in the value.
    pub fn cell_count(&self) -> usize {
        self.value.len() / 4
    }

    /// Returns the first string of the property.
    ///
    /// Returns `None` if the string is not valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.strings().next()?).ok()
    }

    /// Iterates over the entries of a string-list property.
    pub fn strings(&self) -> StringList<'_> {
        StringList::new(&self.value)
    }
}

/// An iterator over the NUL-separated strings of a property value.
///
/// Entries are yielded as raw bytes, without their terminator. Firmware does
/// not promise any encoding, so every entry is kept whether it is valid UTF-8
/// or not. A missing terminator on the last entry is tolerated.
#[derive(Debug, Clone, Default)]
pub struct StringList<'a> {
    rest: &'a [u8],
}

impl<'a> StringList<'a> {
    fn new(value: &'a [u8]) -> Self {
        Self { rest: value }
    }
}

impl<'a> Iterator for StringList<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.rest.is_empty() {
            return None;
        }

        let (entry, rest) = match self.rest.iter().position(|&byte| byte == 0) {
            Some(nul) => (&self.rest[..nul], &self.rest[nul + 1..]),
            None => (self.rest, &self.rest[self.rest.len()..]),
        };
        self.rest = rest;
        Some(entry)
    }
}

impl FusedIterator for StringList<'_> {}
