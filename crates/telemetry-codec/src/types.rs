// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Define the decoded telemetry log data model.
// Author: Lukas Bower
#![allow(clippy::module_name_repetitions)]

//! Decoded telemetry log data model.

use crate::header::InterfaceHeader;
use crate::window::{ByteRange, ByteWindow};
use crate::DecodeError;

/// Drive interface the log was pulled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Interface {
    /// NVMe telemetry log page.
    Nvme,
    /// SATA telemetry log.
    Sata,
}

/// Side of the link that triggered the telemetry snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Initiator {
    /// Host-initiated capture.
    Host,
    /// Controller-initiated capture.
    Controller,
}

/// Log page selected by an (interface, initiator) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogPage {
    /// Drive interface.
    pub interface: Interface,
    /// Capture initiator.
    pub initiator: Initiator,
}

impl LogPage {
    /// Build a log page descriptor.
    #[must_use]
    pub const fn new(interface: Interface, initiator: Initiator) -> Self {
        Self {
            interface,
            initiator,
        }
    }

    /// Log identifier byte expected at offset 0 of the interface header.
    #[must_use]
    pub const fn identifier(&self) -> u8 {
        match (self.interface, self.initiator) {
            (Interface::Nvme, Initiator::Host) => 0x07,
            (Interface::Nvme, Initiator::Controller) => 0x08,
            (Interface::Sata, Initiator::Host) => 0x24,
            (Interface::Sata, Initiator::Controller) => 0x25,
        }
    }

    /// Identify the log page a log identifier byte belongs to.
    #[must_use]
    pub const fn from_identifier(id: u8) -> Option<Self> {
        match id {
            0x07 => Some(Self::new(Interface::Nvme, Initiator::Host)),
            0x08 => Some(Self::new(Interface::Nvme, Initiator::Controller)),
            0x24 => Some(Self::new(Interface::Sata, Initiator::Host)),
            0x25 => Some(Self::new(Interface::Sata, Initiator::Controller)),
            _ => None,
        }
    }
}

/// Size of the region reserved for the interface header before data area 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HeaderRegion {
    /// 512-byte header used by SATA logs and NVMe telemetry format 2 and later.
    Standard,
    /// 4096-byte header used by NVMe telemetry format 1.
    Legacy,
}

impl HeaderRegion {
    /// Region length in bytes.
    #[must_use]
    pub const fn len(self) -> u64 {
        match self {
            Self::Standard => 512,
            Self::Legacy => 4096,
        }
    }
}

/// Wire variant of a data area's table of contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TocFormat {
    /// Fixed 127-slot block-granular array.
    V1,
    /// Counted byte-granular array.
    V2,
}

/// Object header sub-format, selected by the owning TOC version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectHeaderFormat {
    /// Legacy 4096-byte header with numeric identity block.
    V1,
    /// Legacy 4096-byte header with a 32-byte name.
    V1_4,
    /// 12-byte header keyed by EUID.
    V2,
}

/// One normalized TOC entry in absolute log offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TocEntry {
    /// Absolute offset of the object header.
    pub start: u64,
    /// Object size in bytes, header included.
    pub size: u64,
}

impl TocEntry {
    /// Absolute byte range described by the entry.
    #[must_use]
    pub fn range(&self) -> ByteRange {
        ByteRange::from_len(self.start, self.size)
    }
}

/// Decoded table of contents of one data area.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableOfContents {
    /// Wire variant.
    pub format: TocFormat,
    /// Format major version.
    pub format_major: u8,
    /// Format minor version.
    pub format_minor: u8,
    /// Declared data-area size for V2 tables.
    pub area_size: Option<u32>,
    /// Bytes occupied by the table itself.
    pub range: ByteRange,
    /// Entries in table order.
    pub entries: Vec<TocEntry>,
}

/// Typed record decoded from one TOC entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TelemetryObject {
    /// Object identifier (legacy id or EUID).
    pub id: u32,
    /// Object major version.
    pub version_major: u16,
    /// Object minor version.
    pub version_minor: u16,
    /// Core number for V1 headers, media bank for V2, -1 when unknown.
    pub owner_id: i32,
    /// Human-readable object name.
    pub human_name: String,
    /// Header sub-format the object was decoded with.
    pub format: ObjectHeaderFormat,
    /// Absolute range of the object header.
    pub header_range: ByteRange,
    /// Absolute range of the payload, when derivable.
    pub payload_range: Option<ByteRange>,
    /// Owning data area.
    pub data_area: u32,
    /// Index of the TOC entry the object was decoded from.
    pub entry: u32,
    /// False when the header failed validation; the payload must not be trusted.
    pub usable: bool,
}

impl TelemetryObject {
    /// Payload length in bytes, zero when underivable.
    #[must_use]
    pub fn payload_len(&self) -> u64 {
        self.payload_range.map_or(0, |range| range.len())
    }
}

/// One decoded data area.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataArea {
    /// Data area number, 1 through 3.
    pub index: u32,
    /// Absolute range of the data area.
    pub range: ByteRange,
    /// Table of contents.
    pub toc: TableOfContents,
    /// Objects in TOC order.
    pub objects: Vec<TelemetryObject>,
    /// Data following the last TOC-referenced object.
    pub trailing: Option<ByteRange>,
}

/// Decoded telemetry log. Built once by the decoder, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TelemetryLog {
    /// Drive serial number from the reason record.
    pub serial_number: String,
    /// Reason record major version.
    pub version_major: u16,
    /// Reason record minor version.
    pub version_minor: u16,
    /// Capture initiator.
    pub initiator: Initiator,
    /// Drive interface.
    pub interface: Interface,
    /// Whether controller-initiated data is available.
    pub controller_initiated_available: bool,
    /// Controller-initiated data generation number.
    pub controller_initiated_generation: u8,
    /// Header region size used to place data area 1.
    pub header_region: HeaderRegion,
    /// Raw interface header fields.
    pub header: InterfaceHeader,
    /// Decoded data areas in ascending index order.
    pub data_areas: Vec<DataArea>,
}

impl TelemetryLog {
    /// Look up a data area by its number.
    #[must_use]
    pub fn data_area(&self, index: u32) -> Option<&DataArea> {
        self.data_areas.iter().find(|area| area.index == index)
    }

    /// Every object of every data area, in decode order.
    pub fn objects(&self) -> impl Iterator<Item = &TelemetryObject> {
        self.data_areas.iter().flat_map(|area| area.objects.iter())
    }

    /// Payload bytes of every usable object, in decode order.
    ///
    /// `bytes` must be the buffer the log was decoded from.
    pub fn payloads<'a>(
        &'a self,
        bytes: &'a [u8],
    ) -> Result<Vec<(&'a TelemetryObject, &'a [u8])>, DecodeError> {
        let window = ByteWindow::new(bytes);
        self.objects()
            .filter(|object| object.usable)
            .filter_map(|object| object.payload_range.map(|range| (object, range)))
            .map(|(object, range)| {
                let payload = window.slice_range(range)?.bytes();
                Ok((object, payload))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_page_identifiers_round_trip() {
        for page in [
            LogPage::new(Interface::Nvme, Initiator::Host),
            LogPage::new(Interface::Nvme, Initiator::Controller),
            LogPage::new(Interface::Sata, Initiator::Host),
            LogPage::new(Interface::Sata, Initiator::Controller),
        ] {
            assert_eq!(LogPage::from_identifier(page.identifier()), Some(page));
        }
        assert_eq!(LogPage::from_identifier(9), None);
    }

    #[test]
    fn header_region_sizes() {
        assert_eq!(HeaderRegion::Standard.len(), 512);
        assert_eq!(HeaderRegion::Legacy.len(), 4096);
    }
}
