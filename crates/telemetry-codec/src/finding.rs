// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Accumulate validation findings produced while decoding a telemetry log.
// Author: Lukas Bower

//! Validation findings shared by every decode stage.

use core::fmt;

use log::{error, warn};

use crate::DecodeError;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// Structural oddity that does not prevent decoding.
    Warning,
    /// Structural failure scoped by the orchestrator's disposition table.
    Error,
}

/// Decode stage that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stage {
    /// Interface header and reason record.
    Header,
    /// Data-area segmentation and table of contents.
    Toc,
    /// Per-entry object header.
    ObjectHeader,
    /// Validation-object magic check.
    ValidationMarker,
}

/// What went wrong, independent of where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FindingKind {
    /// Log identifier or data-area boundaries are unusable.
    HeaderInvalid,
    /// Embedded reason record is malformed.
    ReasonInvalid,
    /// A reserved field carries non-zero bytes.
    ReservedNonZero,
    /// A data area's byte range cannot be decoded.
    DataAreaInvalid,
    /// TOC version is unknown or the TOC cannot be read.
    TocInvalid,
    /// A TOC entry is below the offset or size floor.
    TocEntryMalformed,
    /// A TOC entry could not be handed to the object header decoder.
    EntrySkipped,
    /// Object identifier or version is invalid.
    ObjectHeaderInvalid,
    /// Object size disagrees with the TOC or the object catalog.
    ObjectSizeMismatch,
    /// Validation object payload does not hold the expected magic.
    ValidationMarkerMismatch,
    /// A read ran past the end of its window.
    Truncated,
}

/// One structural check that did not pass.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationFinding {
    /// Finding severity.
    pub severity: Severity,
    /// Stage that recorded the finding.
    pub stage: Stage,
    /// Finding classification.
    pub kind: FindingKind,
    /// Data area the finding belongs to, if any.
    pub data_area: Option<u32>,
    /// TOC entry the finding belongs to, if any.
    pub entry: Option<u32>,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.severity, self.stage)?;
        if let Some(area) = self.data_area {
            write!(f, " data area {area}")?;
        }
        if let Some(entry) = self.entry {
            write!(f, " entry {entry}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Where a finding is attached: data area and TOC entry, both optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scope {
    /// Owning data area.
    pub data_area: Option<u32>,
    /// Owning TOC entry.
    pub entry: Option<u32>,
}

impl Scope {
    /// Scope covering the whole log.
    pub const LOG: Scope = Scope {
        data_area: None,
        entry: None,
    };

    /// Scope covering one data area.
    #[must_use]
    pub fn area(data_area: u32) -> Self {
        Self {
            data_area: Some(data_area),
            entry: None,
        }
    }

    /// Scope covering one TOC entry of a data area.
    #[must_use]
    pub fn entry(data_area: u32, entry: u32) -> Self {
        Self {
            data_area: Some(data_area),
            entry: Some(entry),
        }
    }
}

/// Ordered accumulator owned by the orchestrator for one decode.
#[derive(Debug, Clone, Default)]
pub struct Findings {
    items: Vec<ValidationFinding>,
}

impl Findings {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn warning(
        &mut self,
        stage: Stage,
        kind: FindingKind,
        scope: Scope,
        message: impl Into<String>,
    ) {
        self.push(Severity::Warning, stage, kind, scope, message.into());
    }

    /// Record an error.
    pub fn error(
        &mut self,
        stage: Stage,
        kind: FindingKind,
        scope: Scope,
        message: impl Into<String>,
    ) {
        self.push(Severity::Error, stage, kind, scope, message.into());
    }

    /// Downgrade a decode error into an error finding.
    pub fn decode_error(
        &mut self,
        stage: Stage,
        kind: FindingKind,
        scope: Scope,
        err: &DecodeError,
    ) {
        let kind = match err {
            DecodeError::Truncated { .. } | DecodeError::OutOfRange { .. } => {
                FindingKind::Truncated
            }
            DecodeError::UnsupportedTocVersion { .. } => kind,
        };
        self.push(Severity::Error, stage, kind, scope, err.to_string());
    }

    fn push(
        &mut self,
        severity: Severity,
        stage: Stage,
        kind: FindingKind,
        scope: Scope,
        message: String,
    ) {
        let finding = ValidationFinding {
            severity,
            stage,
            kind,
            data_area: scope.data_area,
            entry: scope.entry,
            message,
        };
        match severity {
            Severity::Warning => warn!("{finding}"),
            Severity::Error => error!("{finding}"),
        }
        self.items.push(finding);
    }

    /// Position marker used to inspect findings recorded after it.
    #[must_use]
    pub fn mark(&self) -> usize {
        self.items.len()
    }

    /// Findings recorded since `mark`.
    #[must_use]
    pub fn since(&self, mark: usize) -> &[ValidationFinding] {
        self.items.get(mark..).unwrap_or_default()
    }

    /// All findings in recording order.
    #[must_use]
    pub fn as_slice(&self) -> &[ValidationFinding] {
        &self.items
    }

    /// Number of findings recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consume the accumulator.
    #[must_use]
    pub fn into_vec(self) -> Vec<ValidationFinding> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_isolate_stage_findings() {
        let mut findings = Findings::new();
        findings.warning(Stage::Header, FindingKind::ReservedNonZero, Scope::LOG, "reserved");
        let mark = findings.mark();
        findings.error(Stage::Toc, FindingKind::TocInvalid, Scope::area(2), "bad toc");
        assert_eq!(findings.since(mark).len(), 1);
        assert_eq!(findings.since(mark)[0].data_area, Some(2));
        assert_eq!(findings.len(), 2);
        assert!(findings.since(10).is_empty());
    }

    #[test]
    fn decode_errors_become_truncation_findings() {
        let mut findings = Findings::new();
        let err = DecodeError::Truncated {
            offset: 10,
            len: 4,
            limit: 12,
        };
        let scope = Scope::entry(1, 3);
        findings.decode_error(Stage::ObjectHeader, FindingKind::ObjectHeaderInvalid, scope, &err);
        let finding = &findings.as_slice()[0];
        assert_eq!(finding.kind, FindingKind::Truncated);
        assert_eq!(finding.severity, Severity::Error);
        assert_eq!(finding.entry, Some(3));
        assert_eq!(
            finding.to_string(),
            "Error/ObjectHeader data area 1 entry 3: truncated read of 4 bytes at 0xa (limit 0xc)"
        );
    }
}
