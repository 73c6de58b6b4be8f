// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Drive header, TOC and object decoding over a full telemetry log.
// Author: Lukas Bower

//! Telemetry log orchestrator.
//!
//! Decoding runs header first, then every configured data area in ascending
//! order: TOC, each listed object, and finally the trailing region. Decoders
//! only record findings; [`disposition`] is the single place that turns a
//! finding into control flow.

use log::{debug, info};

use crate::catalog::{NoCatalog, ObjectCatalog};
use crate::finding::{FindingKind, Findings, Scope, Severity, Stage, ValidationFinding};
use crate::header::{decode_interface_header, DataAreaBounds, InterfaceHeader};
use crate::object::{decode_object_header, ObjectHeader, INVALID_OBJECT_NAME};
use crate::toc::{decode_toc, trailing_region};
use crate::types::{
    DataArea, HeaderRegion, Initiator, Interface, LogPage, TableOfContents, TelemetryLog,
    TelemetryObject,
};
use crate::window::ByteWindow;

/// Caller-supplied context for one decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Interface the log was pulled over.
    pub interface: Interface,
    /// Initiator of the requested log page.
    pub initiator: Initiator,
    /// Header region override; auto-detected from the reason record when `None`.
    pub header_region: Option<HeaderRegion>,
}

impl DecodeOptions {
    /// Options for a log page with an auto-detected header region.
    #[must_use]
    pub const fn new(interface: Interface, initiator: Initiator) -> Self {
        Self {
            interface,
            initiator,
            header_region: None,
        }
    }

    /// Force the header region instead of detecting it.
    #[must_use]
    pub const fn with_header_region(mut self, region: HeaderRegion) -> Self {
        self.header_region = Some(region);
        self
    }

    /// Log page these options describe.
    #[must_use]
    pub const fn log_page(&self) -> LogPage {
        LogPage::new(self.interface, self.initiator)
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::new(Interface::Nvme, Initiator::Host)
    }
}

/// What the orchestrator does after a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Disposition {
    /// Keep decoding.
    Continue,
    /// Keep the object but flag it unusable for payload extraction.
    MarkUnusable,
    /// Omit the current data area and move to the next one.
    SkipDataArea,
    /// Stop and report the log as undecodable.
    Abort,
}

/// Map a finding to the orchestrator's reaction.
#[must_use]
pub fn disposition(stage: Stage, kind: FindingKind, severity: Severity) -> Disposition {
    match (severity, stage, kind) {
        (Severity::Warning, _, _) => Disposition::Continue,
        (Severity::Error, Stage::Header, FindingKind::ReasonInvalid) => Disposition::Continue,
        (Severity::Error, Stage::Header, _) => Disposition::Abort,
        (Severity::Error, Stage::Toc, _) => Disposition::SkipDataArea,
        (Severity::Error, Stage::ObjectHeader, _) => Disposition::MarkUnusable,
        (Severity::Error, Stage::ValidationMarker, _) => Disposition::Continue,
    }
}

fn strongest(findings: &[ValidationFinding]) -> Disposition {
    findings
        .iter()
        .map(|finding| disposition(finding.stage, finding.kind, finding.severity))
        .max()
        .unwrap_or(Disposition::Continue)
}

/// Terminal state of a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// A log was produced, possibly with findings.
    Done,
    /// The interface header was unusable.
    Failed,
}

/// How strictly a caller judges a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityPolicy {
    /// Treat warnings as failures too.
    pub fail_on_warnings: bool,
}

impl ValidityPolicy {
    /// Any finding fails the log.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            fail_on_warnings: true,
        }
    }

    /// Only error findings fail the log.
    #[must_use]
    pub const fn lenient() -> Self {
        Self {
            fail_on_warnings: false,
        }
    }

    fn rejects(&self, finding: &ValidationFinding) -> bool {
        finding.severity == Severity::Error || self.fail_on_warnings
    }
}

/// Result of decoding one log buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// The log decoded, possibly partially.
    Done {
        /// Decoded log.
        log: TelemetryLog,
        /// Every finding in recording order.
        findings: Vec<ValidationFinding>,
    },
    /// The interface header was unusable; no log was produced.
    Failed {
        /// Every finding in recording order.
        findings: Vec<ValidationFinding>,
    },
}

impl DecodeOutcome {
    /// Terminal state.
    #[must_use]
    pub fn status(&self) -> DecodeStatus {
        match self {
            Self::Done { .. } => DecodeStatus::Done,
            Self::Failed { .. } => DecodeStatus::Failed,
        }
    }

    /// Decoded log, if any.
    #[must_use]
    pub fn log(&self) -> Option<&TelemetryLog> {
        match self {
            Self::Done { log, .. } => Some(log),
            Self::Failed { .. } => None,
        }
    }

    /// Findings recorded during the decode.
    #[must_use]
    pub fn findings(&self) -> &[ValidationFinding] {
        match self {
            Self::Done { findings, .. } | Self::Failed { findings } => findings,
        }
    }

    /// Split into the optional log and the findings.
    #[must_use]
    pub fn into_parts(self) -> (Option<TelemetryLog>, Vec<ValidationFinding>) {
        match self {
            Self::Done { log, findings } => (Some(log), findings),
            Self::Failed { findings } => (None, findings),
        }
    }

    /// Whether the decode satisfies `policy`.
    #[must_use]
    pub fn passes(&self, policy: ValidityPolicy) -> bool {
        self.status() == DecodeStatus::Done
            && !self.findings().iter().any(|finding| policy.rejects(finding))
    }
}

/// Decoder for telemetry logs of one log page.
pub struct TelemetryLogDecoder<'c> {
    options: DecodeOptions,
    catalog: &'c dyn ObjectCatalog,
}

impl TelemetryLogDecoder<'static> {
    /// Decoder without an object catalog.
    #[must_use]
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            options,
            catalog: &NoCatalog,
        }
    }
}

impl<'c> TelemetryLogDecoder<'c> {
    /// Use `catalog` to name objects and check payload sizes.
    #[must_use]
    pub fn with_catalog<'n>(self, catalog: &'n dyn ObjectCatalog) -> TelemetryLogDecoder<'n> {
        TelemetryLogDecoder {
            options: self.options,
            catalog,
        }
    }

    /// Options this decoder runs with.
    #[must_use]
    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Decode a complete in-memory log.
    #[must_use]
    pub fn decode(&self, bytes: &[u8]) -> DecodeOutcome {
        let window = ByteWindow::new(bytes);
        let mut findings = Findings::new();

        let page = self.options.log_page();
        let header = match decode_interface_header(&window, page, &mut findings) {
            Ok(header) => header,
            Err(err) => {
                findings.decode_error(Stage::Header, FindingKind::HeaderInvalid, Scope::LOG, &err);
                return self.failed(findings);
            }
        };
        if strongest(findings.as_slice()) == Disposition::Abort {
            return self.failed(findings);
        }

        let region = self
            .options
            .header_region
            .unwrap_or_else(|| header.header_region());
        debug!(
            "header decoded: {} byte header region, {} bytes of log",
            region.len(),
            window.len()
        );

        let data_areas: Vec<DataArea> = header
            .data_area_bounds(region)
            .into_iter()
            .filter_map(|bounds| self.decode_data_area(&window, bounds, &mut findings))
            .collect();

        let log = self.assemble(header, region, data_areas);
        info!(
            "decoded telemetry log {}: {} data area(s), {} object(s), {} finding(s)",
            log.serial_number,
            log.data_areas.len(),
            log.objects().count(),
            findings.len()
        );
        DecodeOutcome::Done {
            log,
            findings: findings.into_vec(),
        }
    }

    fn failed(&self, findings: Findings) -> DecodeOutcome {
        info!(
            "telemetry log header unusable for {:?} {:?}-initiated page: {} finding(s)",
            self.options.interface,
            self.options.initiator,
            findings.len()
        );
        DecodeOutcome::Failed {
            findings: findings.into_vec(),
        }
    }

    fn decode_data_area(
        &self,
        window: &ByteWindow<'_>,
        bounds: DataAreaBounds,
        findings: &mut Findings,
    ) -> Option<DataArea> {
        let index = bounds.index;
        let scope = Scope::area(index);
        if bounds.range.is_empty() {
            findings.error(
                Stage::Toc,
                FindingKind::DataAreaInvalid,
                scope,
                format!("data area ends at 0x{:x}, inside the header region", bounds.range.end),
            );
            return None;
        }
        let area = match window.slice_range(bounds.range) {
            Ok(area) => area,
            Err(err) => {
                findings.decode_error(Stage::Toc, FindingKind::DataAreaInvalid, scope, &err);
                return None;
            }
        };

        let mark = findings.mark();
        let toc = match decode_toc(&area, index, findings) {
            Ok(toc) => toc,
            Err(err) => {
                findings.decode_error(Stage::Toc, FindingKind::TocInvalid, scope, &err);
                return None;
            }
        };
        if strongest(findings.since(mark)) >= Disposition::SkipDataArea {
            return None;
        }
        debug!(
            "data area {index} at {}: TOC {}.{} with {} entries",
            area.range(),
            toc.format_major,
            toc.format_minor,
            toc.entries.len()
        );

        let objects = self.decode_objects(&area, &toc, index, findings);
        let trailing = trailing_region(&toc, area.range());
        if let Some(trailing) = trailing {
            debug!("data area {index}: {} trailing bytes at {trailing}", trailing.len());
        }
        Some(DataArea {
            index,
            range: area.range(),
            toc,
            objects,
            trailing,
        })
    }

    fn decode_objects(
        &self,
        area: &ByteWindow<'_>,
        toc: &TableOfContents,
        index: u32,
        findings: &mut Findings,
    ) -> Vec<TelemetryObject> {
        let header_len = ObjectHeader::block_len(ObjectHeader::format_for(toc));
        let mut objects = Vec::with_capacity(toc.entries.len());
        let mut previous_end = toc.range.end;
        for (slot, entry) in toc.entries.iter().enumerate() {
            let slot = slot as u32;
            let scope = Scope::entry(index, slot);
            let range = entry.range();
            let skip = if !area.range().contains_range(&range) {
                Some(format!("entry {range} lies outside data area {}", area.range()))
            } else if range.start < toc.range.end {
                Some(format!("entry {range} starts inside the TOC ending at 0x{:x}", toc.range.end))
            } else if entry.size <= header_len {
                Some(format!(
                    "entry of {} bytes cannot hold a {header_len}-byte object header",
                    entry.size
                ))
            } else if range.start < previous_end {
                Some(format!("entry {range} overlaps the object ending at 0x{previous_end:x}"))
            } else {
                None
            };
            if let Some(reason) = skip {
                findings.warning(Stage::ObjectHeader, FindingKind::EntrySkipped, scope, reason);
                continue;
            }

            let object_window = match area.slice_range(range) {
                Ok(object_window) => object_window,
                Err(err) => {
                    findings.decode_error(
                        Stage::ObjectHeader,
                        FindingKind::ObjectHeaderInvalid,
                        scope,
                        &err,
                    );
                    continue;
                }
            };
            let mark = findings.mark();
            match decode_object_header(&object_window, toc, index, slot, self.catalog, findings) {
                Ok(mut object) => {
                    if strongest(findings.since(mark)) != Disposition::Continue {
                        object.usable = false;
                        object.human_name = INVALID_OBJECT_NAME.to_owned();
                    }
                    previous_end = range.end;
                    objects.push(object);
                }
                Err(err) => {
                    findings.decode_error(
                        Stage::ObjectHeader,
                        FindingKind::ObjectHeaderInvalid,
                        scope,
                        &err,
                    );
                }
            }
        }
        objects
    }

    fn assemble(
        &self,
        header: InterfaceHeader,
        region: HeaderRegion,
        data_areas: Vec<DataArea>,
    ) -> TelemetryLog {
        TelemetryLog {
            serial_number: header.serial_number(),
            version_major: header.reason.major,
            version_minor: header.reason.minor,
            initiator: self.options.initiator,
            interface: self.options.interface,
            controller_initiated_available: header.controller_initiated_available != 0,
            controller_initiated_generation: header.controller_initiated_generation,
            header_region: region,
            header,
            data_areas,
        }
    }
}

/// Decode `bytes` without an object catalog.
#[must_use]
pub fn decode(bytes: &[u8], options: DecodeOptions) -> DecodeOutcome {
    TelemetryLogDecoder::new(options).decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> ValidationFinding {
        ValidationFinding {
            severity,
            stage: Stage::ObjectHeader,
            kind: FindingKind::ObjectSizeMismatch,
            data_area: Some(1),
            entry: Some(0),
            message: "size".to_owned(),
        }
    }

    #[test]
    fn disposition_table() {
        use FindingKind::*;
        use Severity::{Error, Warning};
        let table = [
            (Stage::Header, HeaderInvalid, Error, Disposition::Abort),
            (Stage::Header, Truncated, Error, Disposition::Abort),
            (Stage::Header, ReasonInvalid, Error, Disposition::Continue),
            (Stage::Header, ReservedNonZero, Warning, Disposition::Continue),
            (Stage::Toc, TocInvalid, Error, Disposition::SkipDataArea),
            (Stage::Toc, DataAreaInvalid, Error, Disposition::SkipDataArea),
            (Stage::Toc, TocEntryMalformed, Warning, Disposition::Continue),
            (Stage::ObjectHeader, ObjectHeaderInvalid, Error, Disposition::MarkUnusable),
            (Stage::ObjectHeader, EntrySkipped, Warning, Disposition::Continue),
            (Stage::ValidationMarker, ValidationMarkerMismatch, Warning, Disposition::Continue),
            (Stage::ValidationMarker, ValidationMarkerMismatch, Error, Disposition::Continue),
        ];
        for (stage, kind, severity, expected) in table {
            assert_eq!(disposition(stage, kind, severity), expected, "{stage:?} {kind:?}");
        }
    }

    #[test]
    fn validity_policies() {
        let warned = DecodeOutcome::Failed {
            findings: vec![finding(Severity::Warning)],
        };
        assert!(!warned.passes(ValidityPolicy::lenient()));
        assert!(ValidityPolicy::strict().rejects(&finding(Severity::Warning)));
        assert!(!ValidityPolicy::lenient().rejects(&finding(Severity::Warning)));
        assert!(ValidityPolicy::lenient().rejects(&finding(Severity::Error)));
        assert_eq!(warned.status(), DecodeStatus::Failed);
        assert!(warned.log().is_none());
    }

    #[test]
    fn short_buffer_fails_at_header() {
        let outcome = decode(&[7u8; 64], DecodeOptions::default());
        assert_eq!(outcome.status(), DecodeStatus::Failed);
        assert_eq!(outcome.findings().len(), 1);
        assert_eq!(outcome.findings()[0].kind, FindingKind::Truncated);
        assert_eq!(outcome.findings()[0].stage, Stage::Header);
    }

    #[test]
    fn options_carry_log_page_and_override() {
        let options = DecodeOptions::new(Interface::Sata, Initiator::Controller)
            .with_header_region(HeaderRegion::Legacy);
        assert_eq!(options.log_page().identifier(), 0x25);
        assert_eq!(options.header_region, Some(HeaderRegion::Legacy));
        let decoder = TelemetryLogDecoder::new(options).with_catalog(&NoCatalog);
        assert_eq!(decoder.options().interface, Interface::Sata);
    }
}
