// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Build and write the JSON findings report for a decoded telemetry log.
// Author: Lukas Bower

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use telemetry_codec::{
    ByteRange, DecodeOutcome, DecodeStatus, HeaderRegion, Initiator, Interface, ValidationFinding,
};

/// Summary of the interface header.
#[derive(Debug, Clone, Serialize)]
pub struct HeaderSummary {
    /// Drive serial number.
    pub serial_number: String,
    /// Vendor OUI as lowercase hex.
    pub oui: String,
    /// Log identifier byte.
    pub log_identifier: u8,
    /// Reason record version as `major.minor`.
    pub version: String,
    /// Capture initiator.
    pub initiator: Initiator,
    /// Drive interface.
    pub interface: Interface,
    /// Header region used to place data area 1.
    pub header_region: HeaderRegion,
    /// Reason code from the reason record.
    pub reason_code: u16,
    /// Firmware revision from the reason record.
    pub fw_revision: String,
}

/// Summary of one decoded data area.
#[derive(Debug, Clone, Serialize)]
pub struct AreaSummary {
    /// Data area number.
    pub index: u32,
    /// Absolute byte range.
    pub range: ByteRange,
    /// TOC version as `major.minor`.
    pub toc_version: String,
    /// Number of TOC entries.
    pub entries: usize,
    /// Number of decoded objects.
    pub objects: usize,
    /// Number of objects flagged unusable.
    pub unusable: usize,
    /// Trailing region, if any.
    pub trailing: Option<ByteRange>,
}

/// Content of `{prefix}.findings.json`.
#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    /// Input log path.
    pub input: PathBuf,
    /// Terminal decode state.
    pub status: &'static str,
    /// Header summary, absent when the header was unusable.
    pub header: Option<HeaderSummary>,
    /// Decoded data areas.
    pub data_areas: Vec<AreaSummary>,
    /// Files written by the emitter.
    pub files: Vec<PathBuf>,
    /// Every finding in recording order.
    pub findings: Vec<ValidationFinding>,
}

impl SplitReport {
    /// Summarize a decode outcome.
    pub fn new(input: &Path, outcome: &DecodeOutcome, files: Vec<PathBuf>) -> Self {
        let status = match outcome.status() {
            DecodeStatus::Done => "done",
            DecodeStatus::Failed => "failed",
        };
        let header = outcome.log().map(|log| HeaderSummary {
            serial_number: log.serial_number.clone(),
            oui: hex::encode(log.header.oui),
            log_identifier: log.header.log_identifier,
            version: format!("{}.{}", log.version_major, log.version_minor),
            initiator: log.initiator,
            interface: log.interface,
            header_region: log.header_region,
            reason_code: log.header.reason.reason_code,
            fw_revision: log.header.reason.fw_revision.clone(),
        });
        let data_areas = outcome
            .log()
            .map(|log| {
                log.data_areas
                    .iter()
                    .map(|area| AreaSummary {
                        index: area.index,
                        range: area.range,
                        toc_version: format!("{}.{}", area.toc.format_major, area.toc.format_minor),
                        entries: area.toc.entries.len(),
                        objects: area.objects.len(),
                        unusable: area.objects.iter().filter(|object| !object.usable).count(),
                        trailing: area.trailing,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            input: input.to_path_buf(),
            status,
            header,
            data_areas,
            files,
            findings: outcome.findings().to_vec(),
        }
    }

    /// Write the report as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).context("serialize findings report")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write findings report {}", path.display()))
    }
}
