//! Jam identifier tables
//!
//! A jam is known by three equivalent names:
//! - **COSMID**: the short sequential name used by server operators (`jam_001`)
//! - **CouchID**: the suffix of the jam's own database (`band2f1f1597b0`)
//! - **LongID**: the obfuscated form handed out in invite and listen links
//!
//! There is no way to compute one from another, so the mapping is a static,
//! pre-collected table loaded once at boot and read-only afterwards.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

mod export_id;

pub use export_id::{derive_export_id, is_public_jam, EXPORT_ID_LENGTH, PUBLIC_JAM_PREFIX};

#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    #[error("unresolved identifier: {0}")]
    Unresolved(String),
    #[error("export id {id:?} is {len} characters long, expected {expected}")]
    SchemaMismatch {
        id: String,
        len: usize,
        expected: usize,
    },
    #[error("duplicate {field} in identifier table: {value}")]
    Duplicate { field: &'static str, value: String },
    #[error("jam identifier cannot be empty")]
    Empty,
    #[error("identifier table i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("identifier table parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Three equivalent names for one jam
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    pub cosmid: String,
    pub couch_id: String,
    pub long_id: String,
}

/// On-disk format of the identifier table
#[derive(Debug, Deserialize)]
struct IdentifierTable {
    entries: HashMap<String, IdentifierTableEntry>,
}

#[derive(Debug, Deserialize)]
struct IdentifierTableEntry {
    couch: String,
    encrypted: String,
}

/// Where a jam export reads from and what it is called once exported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    /// the identifier the caller asked for
    pub jam: String,
    /// suffix of the jam database to read from
    pub store_id: String,
    /// identifier assigned to the export for the importer
    pub export_id: String,
    /// display name, when it is implied by the identifier itself.
    ///  `None` means it has to be read from the jam's profile
    pub display_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct IdentifierResolver {
    by_cosmid: HashMap<String, IdentifierRecord>,
    couch_to_long: HashMap<String, String>,
    couch_to_cosmid: HashMap<String, String>,
    long_to_couch: HashMap<String, String>,
}

impl IdentifierResolver {
    /// Build the lookups, rejecting any identifier that appears twice
    pub fn from_records(
        records: impl IntoIterator<Item = IdentifierRecord>,
    ) -> Result<Self, IdentifierError> {
        let mut resolver = Self::default();

        for record in records {
            insert_unique(
                &mut resolver.couch_to_long,
                "couch id",
                &record.couch_id,
                &record.long_id,
            )?;
            insert_unique(
                &mut resolver.couch_to_cosmid,
                "couch id",
                &record.couch_id,
                &record.cosmid,
            )?;
            insert_unique(
                &mut resolver.long_to_couch,
                "long id",
                &record.long_id,
                &record.couch_id,
            )?;
            match resolver.by_cosmid.entry(record.cosmid.clone()) {
                Entry::Occupied(_) => {
                    return Err(IdentifierError::Duplicate {
                        field: "cosmid",
                        value: record.cosmid,
                    })
                }
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }

        Ok(resolver)
    }

    pub fn from_json(data: &[u8]) -> Result<Self, IdentifierError> {
        let table: IdentifierTable = serde_json::from_slice(data)?;
        Self::from_records(
            table
                .entries
                .into_iter()
                .map(|(cosmid, entry)| IdentifierRecord {
                    cosmid,
                    couch_id: entry.couch,
                    long_id: entry.encrypted,
                }),
        )
    }

    pub fn load(path: &Path) -> Result<Self, IdentifierError> {
        let data = std::fs::read(path)?;
        let resolver = Self::from_json(&data)?;
        tracing::info!(
            path = %path.display(),
            count = resolver.len(),
            "loaded jam identifier table"
        );
        Ok(resolver)
    }

    pub fn len(&self) -> usize {
        self.by_cosmid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_cosmid.is_empty()
    }

    pub fn record(&self, cosmid: &str) -> Option<&IdentifierRecord> {
        self.by_cosmid.get(cosmid)
    }

    pub fn couch_from_long(&self, long_id: &str) -> Option<&str> {
        self.long_to_couch.get(long_id).map(String::as_str)
    }

    pub fn long_from_couch(&self, couch_id: &str) -> Option<&str> {
        self.couch_to_long.get(couch_id).map(String::as_str)
    }

    pub fn cosmid_from_couch(&self, couch_id: &str) -> Option<&str> {
        self.couch_to_cosmid.get(couch_id).map(String::as_str)
    }

    /// Work out where to read a jam from and what to call its export.
    ///  Public jams go through the table; anything else is a personal
    ///  jam, named after (and stored under) its owner.
    pub fn resolve_export_target(
        &self,
        jam: &str,
        server_code: &str,
    ) -> Result<ExportTarget, IdentifierError> {
        if is_public_jam(jam) {
            let record = self
                .record(jam)
                .ok_or_else(|| IdentifierError::Unresolved(jam.to_string()))?;
            Ok(ExportTarget {
                jam: jam.to_string(),
                store_id: record.couch_id.clone(),
                export_id: derive_export_id(jam, server_code)?,
                display_name: None,
            })
        } else {
            Ok(ExportTarget {
                jam: jam.to_string(),
                store_id: jam.to_string(),
                export_id: derive_export_id(jam, server_code)?,
                display_name: Some(jam.to_string()),
            })
        }
    }
}

fn insert_unique(
    map: &mut HashMap<String, String>,
    field: &'static str,
    key: &str,
    value: &str,
) -> Result<(), IdentifierError> {
    match map.entry(key.to_string()) {
        Entry::Occupied(_) => Err(IdentifierError::Duplicate {
            field,
            value: key.to_string(),
        }),
        Entry::Vacant(slot) => {
            slot.insert(value.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"{
        "entries": {
            "jam_001": { "couch": "band2f1f1597b0", "encrypted": "5a157ceaf13a7fc6" },
            "jam_007": { "couch": "band606301f6f2", "encrypted": "4ff9a55ab372aa8c" }
        }
    }"#;

    fn record(cosmid: &str, couch: &str, long: &str) -> IdentifierRecord {
        IdentifierRecord {
            cosmid: cosmid.to_string(),
            couch_id: couch.to_string(),
            long_id: long.to_string(),
        }
    }

    #[test]
    fn test_lookups_from_json() {
        let ids = IdentifierResolver::from_json(TABLE.as_bytes()).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids.couch_from_long("5a157ceaf13a7fc6"), Some("band2f1f1597b0"));
        assert_eq!(ids.long_from_couch("band606301f6f2"), Some("4ff9a55ab372aa8c"));
        assert_eq!(ids.cosmid_from_couch("band606301f6f2"), Some("jam_007"));
        assert_eq!(ids.record("jam_001").unwrap().couch_id, "band2f1f1597b0");
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let ids = IdentifierResolver::from_json(TABLE.as_bytes()).unwrap();
        assert_eq!(ids.couch_from_long("nope"), None);
        assert_eq!(ids.long_from_couch("nope"), None);
        assert_eq!(ids.cosmid_from_couch("nope"), None);
        assert!(ids.record("jam_999").is_none());
    }

    #[test]
    fn test_duplicate_couch_id_rejected() {
        let result = IdentifierResolver::from_records(vec![
            record("jam_001", "band0000000001", "aaaa"),
            record("jam_002", "band0000000001", "bbbb"),
        ]);
        assert!(matches!(
            result,
            Err(IdentifierError::Duplicate { field: "couch id", .. })
        ));
    }

    #[test]
    fn test_duplicate_long_id_rejected() {
        let result = IdentifierResolver::from_records(vec![
            record("jam_001", "band0000000001", "aaaa"),
            record("jam_002", "band0000000002", "aaaa"),
        ]);
        assert!(matches!(
            result,
            Err(IdentifierError::Duplicate { field: "long id", .. })
        ));
    }

    #[test]
    fn test_resolve_public_target() {
        let ids = IdentifierResolver::from_json(TABLE.as_bytes()).unwrap();
        let target = ids.resolve_export_target("jam_007", "CSMX").unwrap();
        assert_eq!(target.store_id, "band606301f6f2");
        assert_eq!(target.export_id, "bandcsmxjam007");
        assert_eq!(target.display_name, None);
    }

    #[test]
    fn test_resolve_unknown_public_target() {
        let ids = IdentifierResolver::from_json(TABLE.as_bytes()).unwrap();
        let err = ids.resolve_export_target("jam_123", "CSMX").unwrap_err();
        assert!(matches!(err, IdentifierError::Unresolved(jam) if jam == "jam_123"));

        // unknown ids are unresolved even when their export id would be malformed
        let err = ids.resolve_export_target("jam_1234", "CSMX").unwrap_err();
        assert!(matches!(err, IdentifierError::Unresolved(jam) if jam == "jam_1234"));
    }

    #[test]
    fn test_resolve_personal_target() {
        let ids = IdentifierResolver::default();
        let target = ids.resolve_export_target("DaveBrubeck", "CSMX").unwrap();
        assert_eq!(target.store_id, "DaveBrubeck");
        assert_eq!(target.export_id, "csmx_davebrubeck");
        assert_eq!(target.display_name.as_deref(), Some("DaveBrubeck"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idbank.json");
        std::fs::write(&path, TABLE).unwrap();
        let ids = IdentifierResolver::load(&path).unwrap();
        assert!(!ids.is_empty());
    }
}
