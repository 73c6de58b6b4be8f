// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Load split tool configuration and the object catalog from TOML.
// Author: Lukas Bower

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use telemetry_codec::{ObjectCatalog, VALIDATION_OBJECT_ID};

use crate::emitter::file_component;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "TELEMETRY_SPLIT_CONFIG";

/// Split tool settings read from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SplitConfig {
    /// Output file prefix; the drive serial number when unset.
    pub prefix: Option<String>,
    /// Write `{prefix}.DataArea{n}.bin` for every decoded data area.
    pub data_area_dumps: bool,
    /// Write `{prefix}.findings.json`.
    pub findings_report: bool,
    /// EUIDs whose payload carries the validation marker.
    pub validation_objects: Vec<u32>,
    /// Known objects.
    #[serde(rename = "object")]
    pub objects: Vec<CatalogEntry>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            data_area_dumps: true,
            findings_report: true,
            validation_objects: vec![VALIDATION_OBJECT_ID],
            objects: Vec::new(),
        }
    }
}

/// One `[[object]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogEntry {
    /// Object identifier.
    pub id: u32,
    /// Major version this entry applies to; any when unset.
    pub major: Option<u16>,
    /// Minor version this entry applies to; any when unset.
    pub minor: Option<u16>,
    /// Human-readable name used in output file names.
    pub name: String,
    /// Expected payload size in bytes.
    pub size: Option<u64>,
}

impl CatalogEntry {
    fn matches(&self, id: u32, major: u16, minor: u16) -> bool {
        self.id == id
            && self.major.map_or(true, |want| want == major)
            && self.minor.map_or(true, |want| want == minor)
    }

    fn specificity(&self) -> u8 {
        u8::from(self.major.is_some()) + u8::from(self.minor.is_some())
    }
}

impl SplitConfig {
    fn lookup(&self, id: u32, major: u16, minor: u16) -> Option<&CatalogEntry> {
        self.objects
            .iter()
            .filter(|entry| entry.matches(id, major, minor))
            .max_by_key(|entry| entry.specificity())
    }

    fn validate(&self) -> Result<()> {
        if let Some(prefix) = &self.prefix {
            check_component("prefix", prefix)?;
        }
        for entry in &self.objects {
            check_component(&format!("object {} name", entry.id), &entry.name)?;
        }
        Ok(())
    }
}

impl ObjectCatalog for SplitConfig {
    fn human_name(&self, id: u32, major: u16, minor: u16) -> Option<String> {
        self.lookup(id, major, minor).map(|entry| entry.name.clone())
    }

    fn is_validation_object(&self, id: u32) -> bool {
        self.validation_objects.contains(&id)
    }

    fn expected_payload_size(&self, id: u32, major: u16, minor: u16) -> Option<u64> {
        self.lookup(id, major, minor).and_then(|entry| entry.size)
    }
}

fn check_component(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || file_component(value) != value {
        return Err(anyhow!(
            "{what} {value:?} must be non-empty ASCII letters, digits, '-' or '_'"
        ));
    }
    Ok(())
}

/// Configuration path from the command line, falling back to [`CONFIG_ENV`].
pub fn config_path(cli: Option<&Path>) -> Option<PathBuf> {
    cli.map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
}

/// Parse configuration from TOML text.
pub fn parse_config(text: &str) -> Result<SplitConfig> {
    let config: SplitConfig = toml::from_str(text).context("invalid split configuration TOML")?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `path`; a missing file yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<SplitConfig> {
    let Some(path) = path else {
        return Ok(SplitConfig::default());
    };
    if !path.exists() {
        warn!("split configuration {} not found, using defaults", path.display());
        return Ok(SplitConfig::default());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read split configuration {}", path.display()))?;
    let config = parse_config(&text)
        .with_context(|| format!("invalid split configuration in {}", path.display()))?;
    debug!(
        "loaded {} catalog entries from {}",
        config.objects.len(),
        path.display()
    );
    Ok(config)
}
