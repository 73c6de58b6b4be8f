// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Object catalog seam used to name objects and check their sizes.
// Author: Lukas Bower

//! Object catalog seam.

/// Object identifier of the validation object.
pub const VALIDATION_OBJECT_ID: u32 = 0xFFFF_FFFE;

/// Object identifier given to trailing data-area regions.
pub const APL_OBJECT_ID: u32 = 0xFFFF_FFFD;

/// Magic value carried by the first eight payload bytes of a validation object.
pub const VALIDATION_MAGIC: u64 = 0x07FF_FFFF_FFFF_FC99;

/// Name used when neither the header nor the catalog can name an object.
pub const UNKNOWN_OBJECT_NAME: &str = "UNKNOWN";

/// Lookup of vendor object metadata keyed by identifier and version.
///
/// The decoder only consults the catalog; it never requires an entry to
/// exist.
pub trait ObjectCatalog {
    /// Human-readable name for an object, if known.
    fn human_name(&self, id: u32, major: u16, minor: u16) -> Option<String>;

    /// Whether `id` names the validation object.
    fn is_validation_object(&self, id: u32) -> bool {
        id == VALIDATION_OBJECT_ID
    }

    /// Expected payload size for a version, if known.
    fn expected_payload_size(&self, _id: u32, _major: u16, _minor: u16) -> Option<u64> {
        None
    }
}

/// Catalog that knows nothing beyond the validation object identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoCatalog;

impl ObjectCatalog for NoCatalog {
    fn human_name(&self, _id: u32, _major: u16, _minor: u16) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_catalog_only_knows_validation_id() {
        let catalog = NoCatalog;
        assert!(catalog.is_validation_object(VALIDATION_OBJECT_ID));
        assert!(!catalog.is_validation_object(APL_OBJECT_ID));
        assert_eq!(catalog.human_name(1, 1, 0), None);
        assert_eq!(catalog.expected_payload_size(1, 1, 0), None);
    }
}
