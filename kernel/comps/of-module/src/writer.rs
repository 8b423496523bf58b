// SPDX-License-Identifier: MPL-2.0

use core::fmt;

/// A [`fmt::Write`] sink over a fixed byte slice.
///
/// Output that does not fit is dropped, but still counted, so that the caller
/// can learn how large the buffer should have been. No terminator is written.
pub(crate) struct SliceWriter<'a> {
    buf: &'a mut [u8],
    written: usize,
    total: usize,
}

impl<'a> SliceWriter<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            written: 0,
            total: 0,
        }
    }

    /// Returns the number of bytes stored in the buffer.
    pub(crate) fn written(&self) -> usize {
        self.written
    }

    /// Returns the number of bytes the output needs.
    pub(crate) fn total(&self) -> usize {
        self.total
    }
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let len = bytes.len().min(self.buf.len() - self.written);
        self.buf[self.written..self.written + len].copy_from_slice(&bytes[..len]);
        self.written += len;
        self.total += bytes.len();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use core::fmt::Write;

    use super::*;

    #[test]
    fn truncates_but_counts() {
        let mut buf = [0u8; 8];
        let mut writer = SliceWriter::new(&mut buf);
        write!(writer, "OF_NAME={}", "serial").unwrap();
        assert_eq!(writer.total(), 14);
        assert_eq!(writer.written(), 8);
        assert_eq!(&buf, b"OF_NAME=");
    }

    #[test]
    fn empty_buffer_only_counts() {
        let mut writer = SliceWriter::new(&mut []);
        write!(writer, "of:N{}T{}", "uart", "").unwrap();
        assert_eq!(writer.total(), 9);
        assert_eq!(writer.written(), 0);
    }
}
