// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Write decoded telemetry objects, trailing regions and data areas to files.
// Author: Lukas Bower

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use telemetry_codec::{
    ByteRange, ByteWindow, TelemetryLog, TelemetryObject, APL_OBJECT_ID, UNKNOWN_OBJECT_NAME,
};

/// Make `value` safe to use as one dot-separated file name field.
///
/// Serial numbers and embedded object names come straight from the log, so
/// anything other than ASCII letters, digits, `-` and `_` becomes `_`. Path
/// separators and `.` can therefore never reach a joined path.
pub fn file_component(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Output file naming scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NameStyle {
    /// `{prefix}.{id}.{major}.{minor}.{name}.{size}.{area}.{owner}.bin`.
    #[default]
    Short,
    /// Short layout with a label ahead of each field. The owner carries the
    /// `Core` label only when it is unknown (-1).
    Long,
}

/// Fields that make up an object file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFileName {
    /// Object identifier.
    pub id: u32,
    /// Object major version.
    pub major: u16,
    /// Object minor version.
    pub minor: u16,
    /// Human-readable name.
    pub name: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Owning data area.
    pub data_area: u32,
    /// Core or media bank, -1 when unknown.
    pub owner: i32,
}

impl ObjectFileName {
    /// Name fields of a decoded object.
    pub fn for_object(object: &TelemetryObject) -> Self {
        Self {
            id: object.id,
            major: object.version_major,
            minor: object.version_minor,
            name: object.human_name.clone(),
            size: object.payload_len(),
            data_area: object.data_area,
            owner: object.owner_id,
        }
    }

    /// Name fields of a data area's trailing region.
    pub fn for_trailing(data_area: u32, region: ByteRange) -> Self {
        Self {
            id: APL_OBJECT_ID,
            major: 1,
            minor: 0,
            name: format!("APL_DA{data_area}"),
            size: region.len(),
            data_area,
            owner: -1,
        }
    }

    /// Render the file name under `prefix`.
    ///
    /// The prefix and name are passed through [`file_component`]; an empty
    /// name renders as `UNKNOWN`.
    pub fn render(&self, prefix: &str, style: NameStyle) -> String {
        let mut name = file_component(&self.name);
        if name.is_empty() {
            name = UNKNOWN_OBJECT_NAME.to_owned();
        }
        let mut out = file_component(prefix);
        let labelled = style == NameStyle::Long;
        let mut field = |label: Option<&str>, value: &dyn std::fmt::Display| {
            if let Some(label) = label.filter(|_| labelled) {
                let _ = write!(out, ".{label}");
            }
            let _ = write!(out, ".{value}");
        };
        field(Some("eUID"), &self.id);
        field(Some("Major"), &self.major);
        field(Some("Minor"), &self.minor);
        field(Some("FirmwareName"), &name);
        field(Some("ByteSize"), &self.size);
        field(Some("DataArea"), &self.data_area);
        field((self.owner == -1).then_some("Core"), &self.owner);
        out.push_str(".bin");
        out
    }
}

/// Per-run emitter settings.
#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// Directory receiving the files.
    pub out_dir: PathBuf,
    /// File name prefix.
    pub prefix: String,
    /// Object file naming scheme.
    pub name_style: NameStyle,
    /// Also dump each data area as a whole.
    pub data_area_dumps: bool,
}

/// Writes the byte ranges of a decoded log to individual files.
pub struct SplitEmitter<'a> {
    window: ByteWindow<'a>,
    options: SplitOptions,
}

impl<'a> SplitEmitter<'a> {
    /// Emitter over the buffer `log` was decoded from.
    ///
    /// The prefix is passed through [`file_component`].
    pub fn new(bytes: &'a [u8], mut options: SplitOptions) -> Self {
        options.prefix = file_component(&options.prefix);
        Self {
            window: ByteWindow::new(bytes),
            options,
        }
    }

    /// Write every data area, object payload and trailing region of `log`.
    ///
    /// Objects without a derivable payload are skipped, as is any single
    /// file that fails to write. Only a missing output directory is fatal.
    /// Returns the paths written, in data-area then TOC order.
    pub fn emit(&self, log: &TelemetryLog) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.options.out_dir).with_context(|| {
            format!(
                "failed to create output directory {}",
                self.options.out_dir.display()
            )
        })?;
        let mut written = Vec::new();
        for area in &log.data_areas {
            if self.options.data_area_dumps {
                let name = format!("{}.DataArea{}.bin", self.options.prefix, area.index);
                self.write_or_skip(&name, area.range, &mut written);
            }
            for object in &area.objects {
                let Some(payload) = object.payload_range else {
                    warn!(
                        "data area {} entry {}: object {} has no payload, not written",
                        area.index, object.entry, object.id
                    );
                    continue;
                };
                let name = ObjectFileName::for_object(object)
                    .render(&self.options.prefix, self.options.name_style);
                self.write_or_skip(&name, payload, &mut written);
            }
            if let Some(trailing) = area.trailing {
                let name = ObjectFileName::for_trailing(area.index, trailing)
                    .render(&self.options.prefix, self.options.name_style);
                self.write_or_skip(&name, trailing, &mut written);
            }
        }
        info!(
            "wrote {} file(s) to {}",
            written.len(),
            self.options.out_dir.display()
        );
        Ok(written)
    }

    fn write_or_skip(&self, name: &str, range: ByteRange, written: &mut Vec<PathBuf>) {
        match self.write_range(name, range) {
            Ok(path) => written.push(path),
            Err(err) => warn!("skipping {name}: {err:#}"),
        }
    }

    fn write_range(&self, name: &str, range: ByteRange) -> Result<PathBuf> {
        if Path::new(name).file_name().map_or(true, |file| file != name) {
            bail!("{name:?} is not a plain file name");
        }
        let bytes = self
            .window
            .slice_range(range)
            .with_context(|| format!("range {range} for {name}"))?
            .bytes();
        let path = self.options.out_dir.join(name);
        write_file(&path, bytes)?;
        debug!("wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}
