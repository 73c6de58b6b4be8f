// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Decode V1 and V2 data-area tables of contents.
// Author: Lukas Bower

//! Table of contents decoding.

use log::{debug, trace};

use crate::finding::{FindingKind, Findings, Scope, Stage};
use crate::types::{TableOfContents, TocEntry, TocFormat};
use crate::window::{ByteRange, ByteWindow};
use crate::{DecodeError, TELEMETRY_BLOCK_SIZE};

const V1_TOC_LEN: u64 = 512;
const V1_ENTRY_SLOTS: u64 = 127;
const V1_ENTRIES: u64 = 4;
const V1_MIN_START_BLOCK: u16 = 16;
const V1_MIN_BLOCK_COUNT: u16 = 8;

const V2_HEADER_LEN: u64 = 16;
const V2_ENTRY_LEN: u64 = 8;
const V2_MIN_OFFSET: u32 = 24;
const V2_MIN_SIZE: u32 = 12;

/// Decode the table of contents at the start of the data-area `window`.
///
/// Entry floor violations are recorded as warnings and the entry is kept
/// with its literal offset and size. An unknown major version is returned as
/// [`DecodeError::UnsupportedTocVersion`].
pub fn decode_toc(
    window: &ByteWindow<'_>,
    data_area: u32,
    findings: &mut Findings,
) -> Result<TableOfContents, DecodeError> {
    let base = window.start();
    let major = window.u8_at(base)?;
    let minor = window.u8_at(base + 1)?;
    debug!("data area {data_area}: TOC version {major}.{minor} at 0x{base:x}");
    match major {
        0 => Err(DecodeError::UnsupportedTocVersion { major, minor }),
        1 => decode_v1(window, data_area, minor, findings),
        _ => decode_v2(window, data_area, major, minor, findings),
    }
}

fn decode_v1(
    window: &ByteWindow<'_>,
    data_area: u32,
    minor: u8,
    findings: &mut Findings,
) -> Result<TableOfContents, DecodeError> {
    let base = window.start();
    window.read(base, V1_TOC_LEN as usize)?;
    let mut entries = Vec::new();
    for slot in 0..V1_ENTRY_SLOTS {
        let at = base + V1_ENTRIES + slot * 4;
        let start_block = window.u16_le(at)?;
        if start_block == 0 {
            break;
        }
        let block_count = window.u16_le(at + 2)?;
        trace!(
            "data area {data_area} entry {slot}: start block {start_block}, {block_count} blocks"
        );
        let scope = Scope::entry(data_area, slot as u32);
        if start_block < V1_MIN_START_BLOCK {
            findings.warning(
                Stage::Toc,
                FindingKind::TocEntryMalformed,
                scope,
                format!("TOC entry start block {start_block} below minimum {V1_MIN_START_BLOCK}"),
            );
        } else if block_count < V1_MIN_BLOCK_COUNT {
            findings.warning(
                Stage::Toc,
                FindingKind::TocEntryMalformed,
                scope,
                format!("TOC entry block count {block_count} below minimum {V1_MIN_BLOCK_COUNT}"),
            );
        }
        entries.push(TocEntry {
            start: u64::from(start_block) * TELEMETRY_BLOCK_SIZE,
            size: u64::from(block_count) * TELEMETRY_BLOCK_SIZE,
        });
    }
    Ok(TableOfContents {
        format: TocFormat::V1,
        format_major: 1,
        format_minor: minor,
        area_size: None,
        range: ByteRange::from_len(base, V1_TOC_LEN),
        entries,
    })
}

fn decode_v2(
    window: &ByteWindow<'_>,
    data_area: u32,
    major: u8,
    minor: u8,
    findings: &mut Findings,
) -> Result<TableOfContents, DecodeError> {
    let base = window.start();
    let count = window.u16_le(base + 2)?;
    let area_size = window.u32_le(base + 4)?;
    let toc_len = V2_HEADER_LEN + u64::from(count) * V2_ENTRY_LEN;
    window.read(base, toc_len as usize)?;

    let mut entries = Vec::with_capacity(usize::from(count));
    for index in 0..u64::from(count) {
        let at = base + V2_HEADER_LEN + index * V2_ENTRY_LEN;
        let offset = window.u32_le(at)?;
        let size = window.u32_le(at + 4)?;
        trace!("data area {data_area} entry {index}: offset 0x{offset:x}, {size} bytes");
        let scope = Scope::entry(data_area, index as u32);
        if offset < V2_MIN_OFFSET {
            findings.warning(
                Stage::Toc,
                FindingKind::TocEntryMalformed,
                scope,
                format!("TOC entry offset {offset} below minimum {V2_MIN_OFFSET}"),
            );
        } else if size <= V2_MIN_SIZE {
            findings.warning(
                Stage::Toc,
                FindingKind::TocEntryMalformed,
                scope,
                format!("TOC entry size {size} not above minimum {V2_MIN_SIZE}"),
            );
        }
        entries.push(TocEntry {
            start: base + u64::from(offset),
            size: u64::from(size),
        });
    }
    Ok(TableOfContents {
        format: TocFormat::V2,
        format_major: major,
        format_minor: minor,
        area_size: Some(area_size),
        range: ByteRange::from_len(base, toc_len),
        entries,
    })
}

/// Data in `area` following the last TOC-referenced object, if any.
///
/// Accounting starts at the first entry and adds every entry's size, so gaps
/// between objects are not reported. V2 tables additionally cap the area at
/// their declared size. A table without entries yields the whole area.
#[must_use]
pub fn trailing_region(toc: &TableOfContents, area: ByteRange) -> Option<ByteRange> {
    let accounted = toc.entries.first().map_or(area.start, |first| {
        toc.entries
            .iter()
            .fold(first.start, |end, entry| end.saturating_add(entry.size))
    });
    let limit = match toc.area_size {
        Some(declared) => area.end.min(area.start.saturating_add(u64::from(declared))),
        None => area.end,
    };
    if accounted >= limit {
        return None;
    }
    let region = ByteRange::new(accounted.max(area.start), area.end);
    (!region.is_empty()).then_some(region)
}
