// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Split telemetry logs into per-object files for host tooling.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Host-side driver for the telemetry log decoder.
//!
//! Reads a log from disk, decodes it with a TOML-configured object catalog,
//! writes every object payload to its own file and records the findings in a
//! JSON report.

mod config;
mod emitter;
mod report;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use telemetry_codec::{
    DecodeOptions, DecodeOutcome, DecodeStatus, Severity, TelemetryLogDecoder, ValidityPolicy,
};

pub use config::{config_path, load_config, parse_config, CatalogEntry, SplitConfig, CONFIG_ENV};
pub use emitter::{file_component, NameStyle, ObjectFileName, SplitEmitter, SplitOptions};
pub use report::{AreaSummary, HeaderSummary, SplitReport};

/// One invocation of the split tool.
#[derive(Debug, Clone)]
pub struct SplitJob {
    /// Telemetry log to decode.
    pub input: PathBuf,
    /// Directory receiving output files.
    pub out_dir: PathBuf,
    /// Prefix override; beats the configured prefix and the serial number.
    pub prefix: Option<String>,
    /// Log page context.
    pub options: DecodeOptions,
    /// Object file naming scheme.
    pub name_style: NameStyle,
    /// Decode and judge only; write nothing.
    pub check_only: bool,
    /// Policy deciding whether the run passed.
    pub policy: ValidityPolicy,
}

/// What a split run produced.
#[derive(Debug, Clone)]
pub struct SplitSummary {
    /// Terminal decode state.
    pub status: DecodeStatus,
    /// Whether the decode satisfied the job's policy.
    pub passed: bool,
    /// Warning findings recorded.
    pub warnings: usize,
    /// Error findings recorded.
    pub errors: usize,
    /// Files written, report included.
    pub files: Vec<PathBuf>,
}

/// Read, decode and split the job's input.
pub fn run(job: &SplitJob, config: &SplitConfig) -> Result<SplitSummary> {
    let bytes = fs::read(&job.input)
        .with_context(|| format!("failed to read telemetry log {}", job.input.display()))?;
    info!("decoding {} ({} bytes)", job.input.display(), bytes.len());
    let outcome = TelemetryLogDecoder::new(job.options)
        .with_catalog(config)
        .decode(&bytes);

    let passed = outcome.passes(job.policy);
    let (warnings, errors) = count_findings(&outcome);
    let mut summary = SplitSummary {
        status: outcome.status(),
        passed,
        warnings,
        errors,
        files: Vec::new(),
    };
    if job.check_only {
        return Ok(summary);
    }

    let prefix = output_prefix(job, config, &outcome);
    if let Some(log) = outcome.log() {
        let emitter = SplitEmitter::new(
            &bytes,
            SplitOptions {
                out_dir: job.out_dir.clone(),
                prefix: prefix.clone(),
                name_style: job.name_style,
                data_area_dumps: config.data_area_dumps,
            },
        );
        summary.files = emitter.emit(log)?;
    } else {
        warn!("{}: header unusable, no objects written", job.input.display());
    }

    if config.findings_report {
        fs::create_dir_all(&job.out_dir).with_context(|| {
            format!("failed to create output directory {}", job.out_dir.display())
        })?;
        let path = job.out_dir.join(format!("{prefix}.findings.json"));
        SplitReport::new(&job.input, &outcome, summary.files.clone()).write(&path)?;
        summary.files.push(path);
    }
    Ok(summary)
}

fn count_findings(outcome: &DecodeOutcome) -> (usize, usize) {
    outcome
        .findings()
        .iter()
        .fold((0, 0), |(warnings, errors), finding| match finding.severity {
            Severity::Warning => (warnings + 1, errors),
            Severity::Error => (warnings, errors + 1),
        })
}

fn output_prefix(job: &SplitJob, config: &SplitConfig, outcome: &DecodeOutcome) -> String {
    let chosen = job
        .prefix
        .clone()
        .or_else(|| config.prefix.clone())
        .or_else(|| outcome.log().map(|log| log.serial_number.clone()));
    let Some(chosen) = chosen else {
        return file_stem(&job.input);
    };
    let prefix = file_component(&chosen);
    if prefix.is_empty() {
        return file_stem(&job.input);
    }
    if prefix != chosen {
        warn!("output prefix {chosen:?} is not a safe file name, using {prefix:?}");
    }
    prefix
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| file_component(&stem.to_string_lossy()))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "telemetry".to_owned())
}
