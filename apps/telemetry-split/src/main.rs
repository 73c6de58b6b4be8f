// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: CLI entry point for splitting and checking telemetry logs.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! CLI entry point for the telemetry split tool.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use env_logger::Env;
use log::{error, info, LevelFilter};
use telemetry_codec::{
    DecodeOptions, DecodeStatus, HeaderRegion, Initiator, Interface, ValidityPolicy,
};
use telemetry_split::{config_path, load_config, NameStyle, SplitJob};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum InterfaceArg {
    Nvme,
    Sata,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum HeaderArg {
    Auto,
    Standard,
    Legacy,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Split vendor SSD telemetry logs into per-object files")]
struct Cli {
    /// Telemetry log file to decode.
    input: PathBuf,

    /// Output directory for object files.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Output file prefix (defaults to the drive serial number).
    #[arg(long)]
    prefix: Option<String>,

    /// Interface the log was pulled over.
    #[arg(long, value_enum, default_value_t = InterfaceArg::Nvme)]
    interface: InterfaceArg,

    /// The log is the controller-initiated page.
    #[arg(long, default_value_t = false)]
    controller: bool,

    /// Header region size ahead of data area 1.
    #[arg(long, value_enum, default_value_t = HeaderArg::Auto)]
    header: HeaderArg,

    /// TOML configuration file (falls back to TELEMETRY_SPLIT_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only check validity; write nothing and exit non-zero on any finding.
    #[arg(long, default_value_t = false)]
    check: bool,

    /// With --check, fail only on error findings.
    #[arg(long, default_value_t = false, requires = "check")]
    lenient: bool,

    /// Label every field in object file names.
    #[arg(long, default_value_t = false)]
    long_names: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

impl Cli {
    fn job(&self) -> SplitJob {
        let interface = match self.interface {
            InterfaceArg::Nvme => Interface::Nvme,
            InterfaceArg::Sata => Interface::Sata,
        };
        let initiator = if self.controller {
            Initiator::Controller
        } else {
            Initiator::Host
        };
        let mut options = DecodeOptions::new(interface, initiator);
        options.header_region = match self.header {
            HeaderArg::Auto => None,
            HeaderArg::Standard => Some(HeaderRegion::Standard),
            HeaderArg::Legacy => Some(HeaderRegion::Legacy),
        };
        SplitJob {
            input: self.input.clone(),
            out_dir: self.out_dir.clone(),
            prefix: self.prefix.clone(),
            options,
            name_style: if self.long_names {
                NameStyle::Long
            } else {
                NameStyle::Short
            },
            check_only: self.check,
            policy: if self.check && !self.lenient {
                ValidityPolicy::strict()
            } else {
                ValidityPolicy::lenient()
            },
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = load_config(config_path(cli.config.as_deref()).as_deref())?;
    let summary = telemetry_split::run(&cli.job(), &config)?;
    info!(
        "{}: {:?}, {} warning(s), {} error(s), {} file(s)",
        cli.input.display(),
        summary.status,
        summary.warnings,
        summary.errors,
        summary.files.len()
    );
    if summary.status == DecodeStatus::Failed {
        error!("{}: telemetry header unusable", cli.input.display());
        return Ok(ExitCode::FAILURE);
    }
    if cli.check && !summary.passed {
        error!("{}: validity check failed", cli.input.display());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(&cli)
}
