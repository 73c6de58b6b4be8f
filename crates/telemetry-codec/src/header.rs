// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Decode and validate the telemetry interface header and reason record.
// Author: Lukas Bower

//! Interface header decoding.
//!
//! The first 512 bytes of every telemetry log carry the log identifier, the
//! last block of each data area and a 128-byte vendor reason record.

use bitflags::bitflags;
use log::debug;

use crate::finding::{FindingKind, Findings, Scope, Stage};
use crate::types::{HeaderRegion, Initiator, LogPage};
use crate::window::{ascii_field, ByteRange, ByteWindow};
use crate::{DecodeError, TELEMETRY_BLOCK_SIZE};

/// Serial number reported when the reason record is absent.
pub const NO_SERIAL_NUMBER: &str = "NoSerialNumber1.x";

const HEADER_LEN: usize = 512;
const LOG_ID: usize = 0;
const RESERVED: core::ops::Range<usize> = 1..5;
const OUI: core::ops::Range<usize> = 5..8;
const DATA_AREA_LAST_BLOCK: usize = 8;
const RESERVED2: core::ops::Range<usize> = 14..382;
const CI_AVAILABLE: usize = 382;
const CI_GENERATION: usize = 383;
const REASON: usize = 384;

const REASON_MAJOR: usize = 0;
const REASON_MINOR: usize = 2;
const REASON_WORD: usize = 4;
const FAILURE_MODE: core::ops::Range<usize> = 8..28;
const FW_REVISION: core::ops::Range<usize> = 28..40;
const BL_REVISION: core::ops::Range<usize> = 40..52;
const SERIAL: core::ops::Range<usize> = 52..72;

bitflags! {
    /// Flag bits of the reason word above the 16-bit reason code.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ReasonFlags: u32 {
        /// Capture was triggered by the controller.
        const CONTROLLER_INITIATED = 1 << 16;
        /// An excursion-level event was detected.
        const EXCURSION_DETECTED = 1 << 17;
        /// A warning-level event was detected.
        const WARNING_DETECTED = 1 << 18;
        /// An error-level event was detected.
        const ERROR_DETECTED = 1 << 19;
    }
}

/// Vendor reason record embedded at offset 384 of the interface header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReasonRecord {
    /// Record major version; zero means the record is absent.
    pub major: u16,
    /// Record minor version.
    pub minor: u16,
    /// Low 16 bits of the reason word.
    pub reason_code: u16,
    /// Flag bits of the reason word.
    pub flags: ReasonFlags,
    /// Failure-mode string.
    pub failure_mode: String,
    /// Main firmware revision string.
    pub fw_revision: String,
    /// Bootloader revision string.
    pub bl_revision: String,
    /// Raw serial number field.
    pub serial: [u8; 20],
}

impl ReasonRecord {
    /// Whether the drive populated the record.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.major != 0
    }

    /// Serial number with padding removed, or [`NO_SERIAL_NUMBER`].
    #[must_use]
    pub fn serial_number(&self) -> String {
        if !self.is_present() {
            return NO_SERIAL_NUMBER.to_owned();
        }
        self.serial
            .iter()
            .filter(|b| **b != b' ' && **b != 0)
            .map(|b| if b.is_ascii_graphic() { *b as char } else { '?' })
            .collect()
    }
}

/// Absolute byte range of one configured data area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataAreaBounds {
    /// Data area number, 1 through 3.
    pub index: u32,
    /// Absolute range of the data area.
    pub range: ByteRange,
}

/// Decoded interface header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterfaceHeader {
    /// Log identifier byte.
    pub log_identifier: u8,
    /// IEEE organization unique identifier of the vendor.
    pub oui: [u8; 3],
    /// Last block of data areas 1 through 3.
    pub data_area_last_blocks: [u16; 3],
    /// Raw controller-initiated-data-available byte.
    pub controller_initiated_available: u8,
    /// Controller-initiated data generation number.
    pub controller_initiated_generation: u8,
    /// Embedded reason record.
    pub reason: ReasonRecord,
}

impl InterfaceHeader {
    /// Header region implied by the reason record: legacy logs carry none.
    #[must_use]
    pub fn header_region(&self) -> HeaderRegion {
        if self.reason.is_present() {
            HeaderRegion::Standard
        } else {
            HeaderRegion::Legacy
        }
    }

    /// Serial number of the drive.
    #[must_use]
    pub fn serial_number(&self) -> String {
        self.reason.serial_number()
    }

    /// Ranges of the configured data areas.
    ///
    /// An area is configured when its last-block field moves past the
    /// previous area's. Areas are contiguous and the first one begins right
    /// after the header region. Ranges whose end precedes their start come
    /// back empty.
    #[must_use]
    pub fn data_area_bounds(&self, region: HeaderRegion) -> Vec<DataAreaBounds> {
        let mut bounds = Vec::with_capacity(3);
        let mut previous_last = 0u16;
        let mut start = region.len();
        for (slot, last) in self.data_area_last_blocks.iter().copied().enumerate() {
            if last <= previous_last {
                continue;
            }
            let end = (u64::from(last) + 1) * TELEMETRY_BLOCK_SIZE;
            bounds.push(DataAreaBounds {
                index: slot as u32 + 1,
                range: ByteRange::new(start, end),
            });
            start = end.max(start);
            previous_last = last;
        }
        bounds
    }
}

/// Decode the interface header at the start of `window`.
///
/// Validation results go to `findings`; only a truncated header is returned
/// as an error.
pub fn decode_interface_header(
    window: &ByteWindow<'_>,
    page: LogPage,
    findings: &mut Findings,
) -> Result<InterfaceHeader, DecodeError> {
    let raw = window.read(window.start(), HEADER_LEN)?;
    let le16 = |at: usize| u16::from_le_bytes([raw[at], raw[at + 1]]);

    let reason_raw = &raw[REASON..];
    let word = u32::from_le_bytes([
        reason_raw[REASON_WORD],
        reason_raw[REASON_WORD + 1],
        reason_raw[REASON_WORD + 2],
        reason_raw[REASON_WORD + 3],
    ]);
    let mut serial = [0u8; 20];
    serial.copy_from_slice(&reason_raw[SERIAL]);
    let reason = ReasonRecord {
        major: u16::from_le_bytes([reason_raw[REASON_MAJOR], reason_raw[REASON_MAJOR + 1]]),
        minor: u16::from_le_bytes([reason_raw[REASON_MINOR], reason_raw[REASON_MINOR + 1]]),
        reason_code: (word & 0xFFFF) as u16,
        flags: ReasonFlags::from_bits_truncate(word),
        failure_mode: ascii_field(&reason_raw[FAILURE_MODE]),
        fw_revision: ascii_field(&reason_raw[FW_REVISION]),
        bl_revision: ascii_field(&reason_raw[BL_REVISION]),
        serial,
    };

    let header = InterfaceHeader {
        log_identifier: raw[LOG_ID],
        oui: [raw[OUI.start], raw[OUI.start + 1], raw[OUI.start + 2]],
        data_area_last_blocks: [
            le16(DATA_AREA_LAST_BLOCK),
            le16(DATA_AREA_LAST_BLOCK + 2),
            le16(DATA_AREA_LAST_BLOCK + 4),
        ],
        controller_initiated_available: raw[CI_AVAILABLE],
        controller_initiated_generation: raw[CI_GENERATION],
        reason,
    };
    debug!(
        "interface header: log id 0x{:02x}, last blocks {:?}, reason v{}.{}",
        header.log_identifier,
        header.data_area_last_blocks,
        header.reason.major,
        header.reason.minor
    );

    validate_log_identifier(&header, page, findings);
    validate_last_blocks(&header, findings);
    validate_reserved(raw, findings);
    validate_reason(&header.reason, page, findings);
    Ok(header)
}

fn validate_log_identifier(header: &InterfaceHeader, page: LogPage, findings: &mut Findings) {
    let expected = page.identifier();
    if header.log_identifier == expected {
        return;
    }
    let mut message = format!(
        "log identifier 0x{:02x}, expected 0x{:02x} for {:?} {:?}-initiated log",
        header.log_identifier, expected, page.interface, page.initiator
    );
    if let Some(actual) = LogPage::from_identifier(header.log_identifier) {
        message.push_str(&format!(
            "; identifier belongs to a {:?} {:?}-initiated log",
            actual.interface, actual.initiator
        ));
    }
    findings.error(Stage::Header, FindingKind::HeaderInvalid, Scope::LOG, message);
}

fn validate_last_blocks(header: &InterfaceHeader, findings: &mut Findings) {
    let [da1, da2, da3] = header.data_area_last_blocks;
    if da2 < da1 {
        findings.error(
            Stage::Header,
            FindingKind::HeaderInvalid,
            Scope::LOG,
            format!("data area 2 last block ({da2}) less than data area 1 last block ({da1})"),
        );
    }
    if da3 < da2 {
        findings.error(
            Stage::Header,
            FindingKind::HeaderInvalid,
            Scope::LOG,
            format!("data area 3 last block ({da3}) less than data area 2 last block ({da2})"),
        );
    }
}

fn validate_reserved(raw: &[u8], findings: &mut Findings) {
    for field in [RESERVED, RESERVED2] {
        let non_zero = raw[field.clone()].iter().filter(|b| **b != 0).count();
        if non_zero != 0 {
            findings.warning(
                Stage::Header,
                FindingKind::ReservedNonZero,
                Scope::LOG,
                format!(
                    "reserved header bytes {}..{} hold {non_zero} non-zero byte(s)",
                    field.start, field.end
                ),
            );
        }
    }
}

fn validate_reason(reason: &ReasonRecord, page: LogPage, findings: &mut Findings) {
    if !reason.is_present() {
        return;
    }
    if reason.major != 1 {
        findings.error(
            Stage::Header,
            FindingKind::ReasonInvalid,
            Scope::LOG,
            format!("reason record version {}.{:02}, expected 1.x", reason.major, reason.minor),
        );
    }
    if page.initiator == Initiator::Host
        && reason.flags.contains(ReasonFlags::CONTROLLER_INITIATED)
    {
        findings.error(
            Stage::Header,
            FindingKind::ReasonInvalid,
            Scope::LOG,
            "reason record flags a controller-initiated capture in a host-initiated log",
        );
    }
}
