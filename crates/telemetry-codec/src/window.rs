// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Bounds-checked views over an in-memory telemetry log buffer.
// Author: Lukas Bower

//! Bounds-checked byte windows.
//!
//! Every decoder reads the log through a [`ByteWindow`]. Offsets handed to a
//! window are absolute offsets into the full log buffer; a window only
//! narrows which of those offsets may be read.

use core::fmt;

use crate::DecodeError;

/// Half-open byte range `[start, end)` expressed as absolute log offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteRange {
    /// First byte covered by the range.
    pub start: u64,
    /// First byte past the end of the range.
    pub end: u64,
}

impl ByteRange {
    /// Build a range from its two bounds. `end` is clamped up to `start`.
    #[must_use]
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Build a range from a start offset and a length, saturating at `u64::MAX`.
    #[must_use]
    pub fn from_len(start: u64, len: u64) -> Self {
        Self::new(start, start.saturating_add(len))
    }

    /// Number of bytes covered.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the range covers no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `other` lies entirely within this range.
    #[must_use]
    pub fn contains_range(&self, other: &ByteRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Whether the two ranges share at least one byte.
    #[must_use]
    pub fn overlaps(&self, other: &ByteRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}..0x{:x}", self.start, self.end)
    }
}

/// Read-only view of a subrange of the log buffer.
#[derive(Debug, Clone, Copy)]
pub struct ByteWindow<'a> {
    buffer: &'a [u8],
    range: ByteRange,
}

impl<'a> ByteWindow<'a> {
    /// Create a window spanning the whole buffer.
    #[must_use]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            range: ByteRange::new(0, buffer.len() as u64),
        }
    }

    /// Absolute range visible through this window.
    #[must_use]
    pub fn range(&self) -> ByteRange {
        self.range
    }

    /// First absolute offset visible through this window.
    #[must_use]
    pub fn start(&self) -> u64 {
        self.range.start
    }

    /// First absolute offset past the end of this window.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.range.end
    }

    /// Number of bytes visible through this window.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.range.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Read `len` bytes starting at the absolute `offset`.
    pub fn read(&self, offset: u64, len: usize) -> Result<&'a [u8], DecodeError> {
        let requested = ByteRange::from_len(offset, len as u64);
        if offset < self.range.start || requested.end > self.range.end {
            return Err(DecodeError::Truncated {
                offset,
                len: len as u64,
                limit: self.range.end,
            });
        }
        // Window ranges are always derived from `buffer.len()`, so both
        // bounds fit in usize once they are inside the window.
        Ok(&self.buffer[requested.start as usize..requested.end as usize])
    }

    /// Narrow the window to `len` bytes starting at the absolute `offset`.
    pub fn slice(&self, offset: u64, len: u64) -> Result<ByteWindow<'a>, DecodeError> {
        let requested = ByteRange::from_len(offset, len);
        if offset < self.range.start || requested.end > self.range.end {
            return Err(DecodeError::OutOfRange {
                offset,
                len,
                limit: self.range.end,
            });
        }
        Ok(Self {
            buffer: self.buffer,
            range: requested,
        })
    }

    /// Narrow the window to an absolute range.
    pub fn slice_range(&self, range: ByteRange) -> Result<ByteWindow<'a>, DecodeError> {
        self.slice(range.start, range.len())
    }

    /// All bytes visible through the window.
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        &self.buffer[self.range.start as usize..self.range.end as usize]
    }

    /// Read a fixed-size array at the absolute `offset`.
    pub fn array<const N: usize>(&self, offset: u64) -> Result<[u8; N], DecodeError> {
        let bytes = self.read(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Read a byte at the absolute `offset`.
    pub fn u8_at(&self, offset: u64) -> Result<u8, DecodeError> {
        Ok(self.array::<1>(offset)?[0])
    }

    /// Read a little-endian `u16` at the absolute `offset`.
    pub fn u16_le(&self, offset: u64) -> Result<u16, DecodeError> {
        self.array(offset).map(u16::from_le_bytes)
    }

    /// Read a little-endian `u32` at the absolute `offset`.
    pub fn u32_le(&self, offset: u64) -> Result<u32, DecodeError> {
        self.array(offset).map(u32::from_le_bytes)
    }

    /// Read a little-endian `u64` at the absolute `offset`.
    pub fn u64_le(&self, offset: u64) -> Result<u64, DecodeError> {
        self.array(offset).map(u64::from_le_bytes)
    }
}

/// Decode a fixed-width ASCII field: stop at the first NUL, trim trailing spaces.
pub(crate) fn ascii_field(bytes: &[u8]) -> String {
    let text = bytes.split(|b| *b == 0).next().unwrap_or_default();
    text.iter()
        .map(|b| if b.is_ascii_graphic() || *b == b' ' { *b as char } else { '?' })
        .collect::<String>()
        .trim_end()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_absolute_and_bounded() {
        let data: Vec<u8> = (0u8..32).collect();
        let window = ByteWindow::new(&data);
        let inner = window.slice(8, 8).expect("slice");
        assert_eq!(inner.u8_at(8).expect("first byte"), 8);
        assert_eq!(inner.u16_le(14).expect("last word"), u16::from_le_bytes([14, 15]));
        assert!(matches!(
            inner.u16_le(15),
            Err(DecodeError::Truncated { offset: 15, len: 2, limit: 16 })
        ));
        assert!(matches!(inner.u8_at(7), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn slices_cannot_escape_parent() {
        let data = [0u8; 16];
        let window = ByteWindow::new(&data).slice(4, 8).expect("slice");
        assert!(matches!(
            window.slice(10, 4),
            Err(DecodeError::OutOfRange { offset: 10, len: 4, limit: 12 })
        ));
        assert!(window.slice(4, 8).is_ok());
        assert!(window.slice(u64::MAX - 1, 4).is_err());
    }

    #[test]
    fn range_helpers() {
        let outer = ByteRange::new(512, 1024);
        assert!(outer.contains_range(&ByteRange::new(512, 600)));
        assert!(!outer.contains_range(&ByteRange::new(500, 600)));
        assert!(ByteRange::new(0, 10).overlaps(&ByteRange::new(9, 20)));
        assert!(!ByteRange::new(0, 10).overlaps(&ByteRange::new(10, 20)));
        assert_eq!(ByteRange::new(10, 4).len(), 0);
        assert_eq!(format!("{}", ByteRange::new(16, 32)), "0x10..0x20");
    }

    #[test]
    fn ascii_fields_stop_at_nul() {
        assert_eq!(ascii_field(b"bis\0\0junk"), "bis");
        assert_eq!(ascii_field(b"FW12  "), "FW12");
        assert_eq!(ascii_field(b"\0\0"), "");
    }
}
