// TransformStore - persisted transform definitions
//
// Definitions live in a JSON array of `{id, body}` records. Writes go to a
// temp file in the target directory which is then renamed over the target,
// so a failed write never leaves a truncated file behind.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{ErrorCode, RegistryError};

use super::definition::TransformDefinition;

/// File-backed storage for the registry's definitions
#[derive(Debug, Clone)]
pub struct TransformStore {
    path: PathBuf,
}

impl TransformStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the stored definitions
    ///
    /// # Errors
    /// `RegistryError::Load` when the file is missing, unreadable, not valid
    /// JSON, or contains duplicate ids.
    pub fn read(&self) -> Result<Vec<TransformDefinition>, RegistryError> {
        let text = fs::read_to_string(&self.path).map_err(|err| RegistryError::Load {
            reason: format!("{}: {}", self.path.display(), err),
        })?;
        parse_definitions(&text).map_err(|err| match err {
            RegistryError::Load { reason } => RegistryError::Load {
                reason: format!("{}: {}", self.path.display(), reason),
            },
            other => other,
        })
    }

    /// Atomically replace the stored definitions
    ///
    /// # Errors
    /// `RegistryError::Io` when the temp file cannot be created, written,
    /// synced or renamed. The previous file is untouched in every case.
    pub fn write(&self, definitions: &[TransformDefinition]) -> Result<(), RegistryError> {
        let json = serialize_definitions(definitions)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| RegistryError::Io {
            reason: format!("{}: {}", self.path.display(), err.error),
        })?;

        log::info!(
            "[TransformStore] Wrote {} definitions to {}",
            definitions.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Parse a JSON document of `{id, body}` records
pub fn parse_definitions(text: &str) -> Result<Vec<TransformDefinition>, RegistryError> {
    let definitions: Vec<TransformDefinition> =
        serde_json::from_str(text).map_err(|err| RegistryError::Load {
            reason: err.to_string(),
        })?;
    ensure_unique_ids(&definitions).map_err(|err| RegistryError::Load {
        reason: err.message(),
    })?;
    Ok(definitions)
}

/// Serialize definitions as pretty JSON, ids and bodies only
pub fn serialize_definitions(definitions: &[TransformDefinition]) -> Result<String, RegistryError> {
    serde_json::to_string_pretty(definitions).map_err(|err| RegistryError::Io {
        reason: err.to_string(),
    })
}

/// `DuplicateId` for the first repeated id
pub fn ensure_unique_ids(definitions: &[TransformDefinition]) -> Result<(), RegistryError> {
    let mut seen = HashSet::with_capacity(definitions.len());
    for def in definitions {
        if !seen.insert(def.id) {
            return Err(RegistryError::DuplicateId { id: def.id });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_definitions() -> Vec<TransformDefinition> {
        vec![
            TransformDefinition::new(0, "segment\npick 0"),
            TransformDefinition::new(4, "none"),
            TransformDefinition::new(2, "segment min_len=10\nlowest"),
        ]
    }

    #[test]
    fn test_write_then_read_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = TransformStore::new(dir.path().join("transforms.json"));

        store.write(&sample_definitions()).unwrap();
        let loaded = store.read().unwrap();

        let records: Vec<_> = loaded.iter().map(|d| d.record()).collect();
        assert_eq!(
            records,
            vec![
                (0, "segment\npick 0"),
                (4, "none"),
                (2, "segment min_len=10\nlowest")
            ]
        );
    }

    #[test]
    fn test_read_missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = TransformStore::new(dir.path().join("missing.json"));
        assert!(matches!(store.read(), Err(RegistryError::Load { .. })));
    }

    #[test]
    fn test_read_corrupt_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transforms.json");
        fs::write(&path, "[{\"id\": 0, \"body\": ").unwrap();

        let err = TransformStore::new(&path).read().unwrap_err();
        assert!(matches!(err, RegistryError::Load { .. }));
    }

    #[test]
    fn test_duplicate_ids_rejected_on_parse() {
        let err = parse_definitions(r#"[{"id":1,"body":"none"},{"id":1,"body":"none"}]"#)
            .unwrap_err();
        match err {
            RegistryError::Load { reason } => assert!(reason.contains("Duplicate task id 1")),
            other => panic!("Expected Load, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transforms.json");
        let store = TransformStore::new(&path);
        store.write(&sample_definitions()).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        // Temp files go next to the target, so a missing directory fails early
        let broken = TransformStore::new(dir.path().join("gone").join("transforms.json"));
        assert!(matches!(
            broken.write(&sample_definitions()),
            Err(RegistryError::Io { .. })
        ));

        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = TransformStore::new(dir.path().join("transforms.json"));
        store.write(&sample_definitions()).unwrap();
        store.write(&sample_definitions()[..1]).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
