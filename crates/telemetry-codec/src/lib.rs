// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Decode vendor SSD telemetry logs into typed data areas and objects.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Telemetry log decoder.
//!
//! A telemetry log is a self-describing blob pulled from an NVMe or SATA
//! drive: a fixed interface header, up to three data areas, a table of
//! contents per data area and a sequence of length-prefixed objects. This
//! crate turns an in-memory copy of that blob into a [`TelemetryLog`] plus
//! the list of [`ValidationFinding`]s collected on the way. It never performs
//! I/O.

mod catalog;
mod decoder;
mod finding;
mod header;
mod object;
mod toc;
mod types;
mod window;

pub use catalog::{
    NoCatalog, ObjectCatalog, APL_OBJECT_ID, UNKNOWN_OBJECT_NAME, VALIDATION_MAGIC,
    VALIDATION_OBJECT_ID,
};
pub use decoder::{
    decode, disposition, DecodeOptions, DecodeOutcome, DecodeStatus, Disposition,
    TelemetryLogDecoder, ValidityPolicy,
};
pub use finding::{FindingKind, Findings, Scope, Severity, Stage, ValidationFinding};
pub use header::{
    decode_interface_header, DataAreaBounds, InterfaceHeader, ReasonFlags, ReasonRecord,
    NO_SERIAL_NUMBER,
};
pub use object::{decode_object_header, ObjectHeader, INVALID_OBJECT_NAME};
pub use toc::{decode_toc, trailing_region};
pub use types::*;
pub use window::{ByteRange, ByteWindow};

/// Size of a telemetry log block in bytes.
pub const TELEMETRY_BLOCK_SIZE: u64 = 512;

/// Errors raised by bounded reads and version dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A read requested bytes past the end of its window.
    #[error("truncated read of {len} bytes at 0x{offset:x} (limit 0x{limit:x})")]
    Truncated {
        /// Absolute offset of the read.
        offset: u64,
        /// Requested length.
        len: u64,
        /// End of the window the read went through.
        limit: u64,
    },
    /// A sub-window was requested outside its parent window.
    #[error("range of {len} bytes at 0x{offset:x} exceeds window end 0x{limit:x}")]
    OutOfRange {
        /// Absolute offset of the requested window.
        offset: u64,
        /// Requested window length.
        len: u64,
        /// End of the parent window.
        limit: u64,
    },
    /// The TOC major version is neither 1 nor at least 2.
    #[error("unsupported TOC version {major}.{minor}")]
    UnsupportedTocVersion {
        /// TOC major version read from the data area.
        major: u8,
        /// TOC minor version read from the data area.
        minor: u8,
    },
}
