// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Decode per-object headers for the V1, V1.4 and V2 object formats.
// Author: Lukas Bower

//! Object header decoding.

use log::debug;

use crate::catalog::{ObjectCatalog, UNKNOWN_OBJECT_NAME, VALIDATION_MAGIC};
use crate::finding::{FindingKind, Findings, Scope, Stage};
use crate::types::{ObjectHeaderFormat, TableOfContents, TelemetryObject, TocFormat};
use crate::window::{ascii_field, ByteRange, ByteWindow};
use crate::{DecodeError, TELEMETRY_BLOCK_SIZE};

/// Human name given to objects whose header failed validation.
pub const INVALID_OBJECT_NAME: &str = "INVALID";

const V1_HEADER_BLOCK: u64 = 4096;
const V1_FIELDS_LEN: usize = 38;
const V1_MAX_OBJECT_ID: u8 = 5;
const V1_4_MIN_TOC_MINOR: u8 = 4;
const V2_HEADER_LEN: u64 = 12;

/// Raw object header, one variant per wire sub-format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectHeader {
    /// Legacy header with a numeric identity block.
    V1 {
        /// Legacy object identifier.
        id: u8,
        /// One-based CPU number.
        cpu: u8,
        /// Object flags.
        flags: u8,
        /// Object size in 512-byte blocks, header included.
        size_blocks: u16,
        /// Object enumeration copied into the identity block.
        object_enum: u32,
        /// Low test-command identifier.
        test_cmd_low: u32,
        /// Object name.
        name: String,
    },
    /// Legacy header with a 32-byte name.
    V1_4 {
        /// Legacy object identifier.
        id: u8,
        /// One-based CPU number.
        cpu: u8,
        /// Object flags.
        flags: u8,
        /// Object size in 512-byte blocks, header included.
        size_blocks: u16,
        /// Object name.
        name: String,
    },
    /// 12-byte header keyed by EUID.
    V2 {
        /// Object major version.
        major: u16,
        /// Object minor version.
        minor: u16,
        /// Extended unique object identifier.
        euid: u32,
        /// Media bank the object belongs to.
        media: u8,
    },
}

impl ObjectHeader {
    /// Header sub-format used by objects listed in `toc`.
    #[must_use]
    pub fn format_for(toc: &TableOfContents) -> ObjectHeaderFormat {
        match toc.format {
            TocFormat::V1 if toc.format_minor >= V1_4_MIN_TOC_MINOR => ObjectHeaderFormat::V1_4,
            TocFormat::V1 => ObjectHeaderFormat::V1,
            TocFormat::V2 => ObjectHeaderFormat::V2,
        }
    }

    /// Bytes reserved for the header ahead of the payload.
    #[must_use]
    pub const fn block_len(format: ObjectHeaderFormat) -> u64 {
        match format {
            ObjectHeaderFormat::V1 | ObjectHeaderFormat::V1_4 => V1_HEADER_BLOCK,
            ObjectHeaderFormat::V2 => V2_HEADER_LEN,
        }
    }

    /// Parse the header at the start of `window` without validating it.
    pub fn parse(window: &ByteWindow<'_>, format: ObjectHeaderFormat) -> Result<Self, DecodeError> {
        let base = window.start();
        match format {
            ObjectHeaderFormat::V2 => {
                let raw = window.read(base, V2_HEADER_LEN as usize)?;
                Ok(Self::V2 {
                    major: u16::from_le_bytes([raw[0], raw[1]]),
                    minor: u16::from_le_bytes([raw[2], raw[3]]),
                    euid: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
                    media: raw[8],
                })
            }
            ObjectHeaderFormat::V1 => {
                let raw = window.read(base, V1_FIELDS_LEN)?;
                Ok(Self::V1 {
                    id: raw[0],
                    cpu: raw[1],
                    flags: raw[2],
                    size_blocks: u16::from_le_bytes([raw[4], raw[5]]),
                    object_enum: u32::from_le_bytes([raw[6], raw[7], raw[8], raw[9]]),
                    test_cmd_low: u32::from_le_bytes([raw[10], raw[11], raw[12], raw[13]]),
                    name: ascii_field(&raw[14..38]),
                })
            }
            ObjectHeaderFormat::V1_4 => {
                let raw = window.read(base, V1_FIELDS_LEN)?;
                Ok(Self::V1_4 {
                    id: raw[0],
                    cpu: raw[1],
                    flags: raw[2],
                    size_blocks: u16::from_le_bytes([raw[4], raw[5]]),
                    name: ascii_field(&raw[6..38]),
                })
            }
        }
    }

    /// Object identifier (legacy id or EUID).
    #[must_use]
    pub fn id(&self) -> u32 {
        match self {
            Self::V1 { id, .. } | Self::V1_4 { id, .. } => u32::from(*id),
            Self::V2 { euid, .. } => *euid,
        }
    }

    /// Object (major, minor) version; legacy headers report 0.0.
    #[must_use]
    pub fn version(&self) -> (u16, u16) {
        match self {
            Self::V2 { major, minor, .. } => (*major, *minor),
            _ => (0, 0),
        }
    }

    /// Zero-based core number for legacy headers, media bank for V2.
    #[must_use]
    pub fn owner_id(&self) -> i32 {
        match self {
            Self::V1 { cpu, .. } | Self::V1_4 { cpu, .. } => i32::from(*cpu) - 1,
            Self::V2 { media, .. } => i32::from(*media),
        }
    }

    fn embedded_name(&self) -> Option<&str> {
        match self {
            Self::V1 { name, .. } | Self::V1_4 { name, .. } if !name.is_empty() => {
                Some(name.as_str())
            }
            _ => None,
        }
    }
}

/// Decode the object listed by one TOC entry.
///
/// `window` must cover exactly the entry's byte range. Header problems are
/// recorded in `findings` and the object is still returned; the caller
/// decides whether it stays usable.
pub fn decode_object_header(
    window: &ByteWindow<'_>,
    toc: &TableOfContents,
    data_area: u32,
    entry: u32,
    catalog: &dyn ObjectCatalog,
    findings: &mut Findings,
) -> Result<TelemetryObject, DecodeError> {
    let format = ObjectHeader::format_for(toc);
    let header = ObjectHeader::parse(window, format)?;
    let scope = Scope::entry(data_area, entry);
    debug!("data area {data_area} entry {entry}: {header:?} at {}", window.range());

    let (major, minor) = header.version();
    let id = header.id();
    let header_range = ByteRange::from_len(window.start(), ObjectHeader::block_len(format));
    let payload_range = match &header {
        ObjectHeader::V1 {
            id: legacy_id,
            object_enum,
            size_blocks,
            ..
        } => {
            check_legacy_id(*legacy_id, scope, findings);
            if u32::from(*legacy_id) != *object_enum {
                findings.error(
                    Stage::ObjectHeader,
                    FindingKind::ObjectHeaderInvalid,
                    scope,
                    format!("object id {legacy_id} does not match identity enum {object_enum}"),
                );
            }
            legacy_payload(window, *size_blocks, scope, findings)
        }
        ObjectHeader::V1_4 {
            id: legacy_id,
            size_blocks,
            ..
        } => {
            check_legacy_id(*legacy_id, scope, findings);
            legacy_payload(window, *size_blocks, scope, findings)
        }
        ObjectHeader::V2 { .. } => {
            if major == 0 {
                findings.error(
                    Stage::ObjectHeader,
                    FindingKind::ObjectHeaderInvalid,
                    scope,
                    format!("object 0x{id:08x} reports major version 0"),
                );
            }
            let payload = ByteRange::new(header_range.end, window.end());
            let size_matches = match catalog.expected_payload_size(id, major, minor) {
                Some(expected) if expected != payload.len() => {
                    findings.warning(
                        Stage::ObjectHeader,
                        FindingKind::ObjectSizeMismatch,
                        scope,
                        format!(
                            "object 0x{id:08x} v{major}.{minor} payload is {} bytes, \
                             catalog expects {expected}",
                            payload.len()
                        ),
                    );
                    false
                }
                _ => true,
            };
            // Marker check runs only when the catalog size check passed.
            if size_matches && catalog.is_validation_object(id) {
                check_validation_marker(window, payload, scope, findings);
            }
            Some(payload)
        }
    };

    let human_name = header
        .embedded_name()
        .map(str::to_owned)
        .or_else(|| catalog.human_name(id, major, minor))
        .unwrap_or_else(|| UNKNOWN_OBJECT_NAME.to_owned());

    Ok(TelemetryObject {
        id,
        version_major: major,
        version_minor: minor,
        owner_id: header.owner_id(),
        human_name,
        format,
        header_range,
        payload_range,
        data_area,
        entry,
        usable: true,
    })
}

fn check_legacy_id(id: u8, scope: Scope, findings: &mut Findings) {
    if id >= V1_MAX_OBJECT_ID {
        findings.error(
            Stage::ObjectHeader,
            FindingKind::ObjectHeaderInvalid,
            scope,
            format!("legacy object id {id} outside 0..{V1_MAX_OBJECT_ID}"),
        );
    }
}

fn legacy_payload(
    window: &ByteWindow<'_>,
    size_blocks: u16,
    scope: Scope,
    findings: &mut Findings,
) -> Option<ByteRange> {
    let declared = u64::from(size_blocks) * TELEMETRY_BLOCK_SIZE;
    let listed = window.len();
    if declared != listed {
        findings.warning(
            Stage::ObjectHeader,
            FindingKind::ObjectSizeMismatch,
            scope,
            format!("object header declares {declared} bytes, TOC lists {listed}"),
        );
    }
    let usable = declared.min(listed);
    if usable < V1_HEADER_BLOCK {
        findings.error(
            Stage::ObjectHeader,
            FindingKind::ObjectHeaderInvalid,
            scope,
            format!("object size {usable} leaves no room for the {V1_HEADER_BLOCK}-byte header"),
        );
        return None;
    }
    let start = window.start();
    Some(ByteRange::new(start + V1_HEADER_BLOCK, start + usable))
}

fn check_validation_marker(
    window: &ByteWindow<'_>,
    payload: ByteRange,
    scope: Scope,
    findings: &mut Findings,
) {
    match window.u64_le(payload.start) {
        Ok(VALIDATION_MAGIC) => {}
        Ok(found) => findings.warning(
            Stage::ValidationMarker,
            FindingKind::ValidationMarkerMismatch,
            scope,
            format!("validation marker 0x{found:016x}, expected 0x{VALIDATION_MAGIC:016x}"),
        ),
        Err(_) => findings.warning(
            Stage::ValidationMarker,
            FindingKind::ValidationMarkerMismatch,
            scope,
            format!("validation payload of {} bytes too short for marker", payload.len()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NoCatalog, VALIDATION_OBJECT_ID};
    use crate::finding::Severity;

    struct Names;

    impl ObjectCatalog for Names {
        fn human_name(&self, id: u32, major: u16, _minor: u16) -> Option<String> {
            (id == 0x1234 && major == 1).then(|| "mediaCounters".to_owned())
        }

        fn expected_payload_size(&self, id: u32, _major: u16, _minor: u16) -> Option<u64> {
            (id == 0x1234).then_some(20)
        }
    }

    struct SizedMarker;

    impl ObjectCatalog for SizedMarker {
        fn human_name(&self, _id: u32, _major: u16, _minor: u16) -> Option<String> {
            None
        }

        fn is_validation_object(&self, id: u32) -> bool {
            id == 0x77
        }

        fn expected_payload_size(&self, id: u32, _major: u16, _minor: u16) -> Option<u64> {
            (id == 0x77).then_some(8)
        }
    }

    fn toc(format: TocFormat, minor: u8) -> TableOfContents {
        TableOfContents {
            format,
            format_major: if format == TocFormat::V1 { 1 } else { 2 },
            format_minor: minor,
            area_size: None,
            range: ByteRange::new(0, 16),
            entries: Vec::new(),
        }
    }

    fn decode(
        raw: &[u8],
        toc: &TableOfContents,
        data_area: u32,
        entry: u32,
        catalog: &dyn ObjectCatalog,
        findings: &mut Findings,
    ) -> TelemetryObject {
        decode_object_header(&ByteWindow::new(raw), toc, data_area, entry, catalog, findings)
            .expect("object")
    }

    fn kinds(findings: &Findings) -> Vec<(Severity, FindingKind)> {
        findings.as_slice().iter().map(|f| (f.severity, f.kind)).collect()
    }

    fn v2_object(major: u16, euid: u32, media: u8, payload: &[u8]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&major.to_le_bytes());
        raw.extend_from_slice(&3u16.to_le_bytes());
        raw.extend_from_slice(&euid.to_le_bytes());
        raw.extend_from_slice(&[media, 0, 0, 0]);
        raw.extend_from_slice(payload);
        raw
    }

    fn v1_object(
        id: u8,
        cpu: u8,
        size_blocks: u16,
        object_enum: u32,
        name: &[u8],
        len: usize,
    ) -> Vec<u8> {
        let mut raw = vec![0u8; len];
        raw[0] = id;
        raw[1] = cpu;
        raw[4..6].copy_from_slice(&size_blocks.to_le_bytes());
        raw[6..10].copy_from_slice(&object_enum.to_le_bytes());
        raw[14..14 + name.len()].copy_from_slice(name);
        raw
    }

    #[test]
    fn v2_header_uses_catalog_names() {
        let raw = v2_object(1, 0x1234, 2, &[0xAB; 20]);
        let mut findings = Findings::new();
        let object = decode(&raw, &toc(TocFormat::V2, 0), 1, 0, &Names, &mut findings);
        assert!(findings.is_empty(), "{:?}", findings.as_slice());
        assert_eq!(object.id, 0x1234);
        assert_eq!((object.version_major, object.version_minor), (1, 3));
        assert_eq!(object.owner_id, 2);
        assert_eq!(object.human_name, "mediaCounters");
        assert_eq!(object.header_range, ByteRange::new(0, 12));
        assert_eq!(object.payload_range, Some(ByteRange::new(12, 32)));
        assert_eq!(object.format, ObjectHeaderFormat::V2);
    }

    #[test]
    fn v2_zero_major_and_size_mismatch_are_reported() {
        let raw = v2_object(0, 0x1234, 0, &[0; 16]);
        let mut findings = Findings::new();
        let object = decode(&raw, &toc(TocFormat::V2, 0), 1, 4, &Names, &mut findings);
        assert_eq!(
            kinds(&findings),
            vec![
                (Severity::Error, FindingKind::ObjectHeaderInvalid),
                (Severity::Warning, FindingKind::ObjectSizeMismatch),
            ]
        );
        assert_eq!(object.human_name, UNKNOWN_OBJECT_NAME);
        assert_eq!(object.payload_len(), 16);
    }

    #[test]
    fn validation_marker_is_checked() {
        let v2 = toc(TocFormat::V2, 0);
        let good = v2_object(1, VALIDATION_OBJECT_ID, 0, &VALIDATION_MAGIC.to_le_bytes());
        let mut findings = Findings::new();
        decode(&good, &v2, 1, 0, &NoCatalog, &mut findings);
        assert!(findings.is_empty());

        let bad = v2_object(1, VALIDATION_OBJECT_ID, 0, &[0u8; 8]);
        decode(&bad, &v2, 1, 0, &NoCatalog, &mut findings);
        let short = v2_object(1, VALIDATION_OBJECT_ID, 0, &[0x99, 0xFC]);
        decode(&short, &v2, 1, 0, &NoCatalog, &mut findings);
        assert_eq!(findings.len(), 2);
        assert!(findings
            .as_slice()
            .iter()
            .all(|f| f.stage == Stage::ValidationMarker && f.severity == Severity::Warning));
    }

    #[test]
    fn size_mismatch_skips_the_marker_check() {
        let v2 = toc(TocFormat::V2, 0);
        let mut findings = Findings::new();
        decode(&v2_object(1, 0x77, 0, &[0u8; 4]), &v2, 1, 0, &SizedMarker, &mut findings);
        assert_eq!(
            kinds(&findings),
            vec![(Severity::Warning, FindingKind::ObjectSizeMismatch)]
        );

        let mut findings = Findings::new();
        decode(&v2_object(1, 0x77, 0, &[0u8; 8]), &v2, 1, 0, &SizedMarker, &mut findings);
        assert_eq!(
            kinds(&findings),
            vec![(Severity::Warning, FindingKind::ValidationMarkerMismatch)]
        );
    }

    #[test]
    fn v1_header_carries_identity_block() {
        let raw = v1_object(2, 3, 9, 2, b"eventDump", 9 * 512);
        let mut findings = Findings::new();
        let object = decode(&raw, &toc(TocFormat::V1, 0), 1, 2, &NoCatalog, &mut findings);
        assert!(findings.is_empty(), "{:?}", findings.as_slice());
        assert_eq!(object.id, 2);
        assert_eq!(object.owner_id, 2);
        assert_eq!(object.human_name, "eventDump");
        assert_eq!((object.version_major, object.version_minor), (0, 0));
        assert_eq!(object.header_range, ByteRange::new(0, 4096));
        assert_eq!(object.payload_range, Some(ByteRange::new(4096, 4608)));
    }

    #[test]
    fn v1_identity_and_size_checks() {
        let v1 = toc(TocFormat::V1, 0);
        let raw = v1_object(6, 1, 10, 1, b"", 9 * 512);
        let mut findings = Findings::new();
        let object = decode(&raw, &v1, 1, 0, &NoCatalog, &mut findings);
        assert_eq!(
            kinds(&findings),
            vec![
                (Severity::Error, FindingKind::ObjectHeaderInvalid),
                (Severity::Error, FindingKind::ObjectHeaderInvalid),
                (Severity::Warning, FindingKind::ObjectSizeMismatch),
            ]
        );
        assert_eq!(object.payload_range, Some(ByteRange::new(4096, 4608)));
        assert_eq!(object.human_name, UNKNOWN_OBJECT_NAME);
        assert_eq!(object.owner_id, 0);

        let raw = v1_object(1, 1, 4, 1, b"tiny", 9 * 512);
        let mut findings = Findings::new();
        let object = decode(&raw, &v1, 1, 0, &NoCatalog, &mut findings);
        assert_eq!(object.payload_range, None);
        assert_eq!(
            findings.as_slice().last().map(|f| f.kind),
            Some(FindingKind::ObjectHeaderInvalid)
        );
    }

    #[test]
    fn v1_4_header_reads_long_name() {
        let mut raw = vec![0u8; 9 * 512];
        raw[0] = 4;
        raw[1] = 2;
        raw[4..6].copy_from_slice(&9u16.to_le_bytes());
        raw[6..6 + 30].copy_from_slice(b"aVeryLongObjectNameThatFits_30");
        let mut findings = Findings::new();
        let object = decode(&raw, &toc(TocFormat::V1, 4), 2, 0, &NoCatalog, &mut findings);
        assert!(findings.is_empty(), "{:?}", findings.as_slice());
        assert_eq!(object.format, ObjectHeaderFormat::V1_4);
        assert_eq!(object.human_name, "aVeryLongObjectNameThatFits_30");
        assert_eq!(object.owner_id, 1);
    }
}
