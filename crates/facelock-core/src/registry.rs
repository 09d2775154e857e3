//! Persistent registry of enrolled identities.
//!
//! Each identity is a single JSON file named after the normalized
//! identifier. Writes go through a temp file in the target directory and
//! are persisted without clobbering, so two concurrent enrollments of the
//! same identifier cannot both succeed.

use std::env;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

const DEFAULT_REGISTRY_DIR: &str = "/var/lib/facelock/registry";
const REGISTRY_DIR_ENV: &str = "FACELOCK_REGISTRY_DIR";
const RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityRecord {
    pub version: u32,
    #[serde(rename = "id")]
    pub record_id: String,
    pub identifier: String,
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(rename = "descriptor")]
    pub signature: Vec<f64>,
    pub sample_count: usize,
    #[serde(rename = "enrolled_at")]
    pub created_at: String,
}

/// Display profile attached to an identity at enrollment. Immutable once
/// the record is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
}

impl Profile {
    /// Trims both fields and rejects empty ones.
    pub fn new(first_name: &str, last_name: &str) -> AppResult<Self> {
        let first_name = first_name.trim();
        let last_name = last_name.trim();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(AppError::InvalidInput(
                "profile first and last name must not be empty".into(),
            ));
        }
        Ok(Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl IdentityRecord {
    pub fn new(
        identifier: String,
        profile: Profile,
        signature: Vec<f64>,
        sample_count: usize,
        created_at: String,
    ) -> Self {
        Self {
            version: RECORD_VERSION,
            record_id: Uuid::new_v4().to_string(),
            identifier,
            profile,
            signature,
            sample_count,
            created_at,
        }
    }
}

/// Storage seam for enrolled identities. `insert` must refuse to overwrite
/// an existing record for the same identifier.
pub trait IdentityRegistry {
    fn load(&self, identifier: &str) -> AppResult<Option<IdentityRecord>>;
    fn load_all(&self) -> AppResult<Vec<IdentityRecord>>;
    fn exists(&self, identifier: &str) -> AppResult<bool>;
    fn insert(&self, record: &IdentityRecord) -> AppResult<()>;
    fn remove(&self, identifier: &str) -> AppResult<bool>;
}

pub trait RegistryDirResolver {
    fn resolve(&self, override_dir: Option<&Path>) -> PathBuf;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvRegistryDirResolver;

impl RegistryDirResolver for EnvRegistryDirResolver {
    fn resolve(&self, override_dir: Option<&Path>) -> PathBuf {
        if let Some(dir) = override_dir {
            dir.to_path_buf()
        } else if let Ok(env_value) = env::var(REGISTRY_DIR_ENV) {
            PathBuf::from(env_value)
        } else {
            PathBuf::from(DEFAULT_REGISTRY_DIR)
        }
    }
}

/// Trims surrounding whitespace and lower-cases the identifier so lookups
/// and duplicate checks are case-insensitive. Returns `InvalidInput` when
/// nothing remains or a character unsafe for a file name is present.
pub fn normalize_identifier(raw: &str) -> AppResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(
            "identifier must not be empty".into(),
        ));
    }
    let normalized = trimmed.to_ascii_lowercase();
    if !normalized
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '+' | '-'))
    {
        return Err(AppError::InvalidInput(format!(
            "identifier '{trimmed}' contains unsupported characters"
        )));
    }
    Ok(normalized)
}

#[derive(Debug, Clone)]
pub struct FilesystemRegistry {
    dir: PathBuf,
}

impl FilesystemRegistry {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn resolve(override_dir: Option<&Path>) -> Self {
        Self::new(EnvRegistryDirResolver.resolve(override_dir))
    }

    fn record_path(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{identifier}.json"))
    }
}

impl IdentityRegistry for FilesystemRegistry {
    fn load(&self, identifier: &str) -> AppResult<Option<IdentityRecord>> {
        let path = self.record_path(identifier);
        if !path.exists() {
            return Ok(None);
        }
        read_record(&path).map(Some)
    }

    fn load_all(&self) -> AppResult<Vec<IdentityRecord>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|source| AppError::RegistryRead {
            path: self.dir.clone(),
            source,
        })?;
        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| AppError::RegistryRead {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            records.push(read_record(&path)?);
        }
        records.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(records)
    }

    fn exists(&self, identifier: &str) -> AppResult<bool> {
        Ok(self.record_path(identifier).exists())
    }

    fn insert(&self, record: &IdentityRecord) -> AppResult<()> {
        let path = self.record_path(&record.identifier);
        write_record_noclobber(&path, record)
    }

    fn remove(&self, identifier: &str) -> AppResult<bool> {
        let path = self.record_path(identifier);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|source| AppError::RegistryWrite { path, source })?;
        Ok(true)
    }
}

/// Registry held entirely in memory. Used by tests and by hosts that
/// embed the workflows without a durable store. `insert` honors the same
/// no-overwrite contract as the filesystem adapter.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    records: Mutex<Vec<IdentityRecord>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<IdentityRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    fn records(&self) -> MutexGuard<'_, Vec<IdentityRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IdentityRegistry for InMemoryRegistry {
    fn load(&self, identifier: &str) -> AppResult<Option<IdentityRecord>> {
        Ok(self
            .records()
            .iter()
            .find(|record| record.identifier == identifier)
            .cloned())
    }

    fn load_all(&self) -> AppResult<Vec<IdentityRecord>> {
        let mut records = self.records().clone();
        records.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(records)
    }

    fn exists(&self, identifier: &str) -> AppResult<bool> {
        Ok(self
            .records()
            .iter()
            .any(|record| record.identifier == identifier))
    }

    fn insert(&self, record: &IdentityRecord) -> AppResult<()> {
        let mut records = self.records();
        if records
            .iter()
            .any(|existing| existing.identifier == record.identifier)
        {
            return Err(AppError::DuplicateIdentifier {
                identifier: record.identifier.clone(),
            });
        }
        records.push(record.clone());
        Ok(())
    }

    fn remove(&self, identifier: &str) -> AppResult<bool> {
        let mut records = self.records();
        let before = records.len();
        records.retain(|record| record.identifier != identifier);
        Ok(records.len() < before)
    }
}

fn read_record(path: &Path) -> AppResult<IdentityRecord> {
    let data = fs::read(path).map_err(|source| AppError::RegistryRead {
        path: path.to_path_buf(),
        source,
    })?;
    let record: IdentityRecord =
        serde_json::from_slice(&data).map_err(|err| AppError::InvalidRecord {
            path: path.to_path_buf(),
            message: format!("invalid identity record contents: {err}"),
        })?;
    if record.version != RECORD_VERSION {
        return Err(AppError::InvalidRecord {
            path: path.to_path_buf(),
            message: format!("unsupported identity record version {}", record.version),
        });
    }
    Ok(record)
}

fn write_record_noclobber(path: &Path, record: &IdentityRecord) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| AppError::RegistryWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(parent).map_err(|source| AppError::RegistryWrite {
        path: path.to_path_buf(),
        source,
    })?;

    {
        let file = tmp.as_file_mut();
        {
            let mut writer = BufWriter::new(&mut *file);
            let serialized = serde_json::to_vec_pretty(record)?;
            writer
                .write_all(&serialized)
                .map_err(|source| AppError::RegistryWrite {
                    path: path.to_path_buf(),
                    source,
                })?;
            writer.write_all(b"\n").ok();
            writer.flush().map_err(|source| AppError::RegistryWrite {
                path: path.to_path_buf(),
                source,
            })?;
        }
        file.sync_all().map_err(|source| AppError::RegistryWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let file = tmp.persist_noclobber(path).map_err(|err| {
        if err.error.kind() == ErrorKind::AlreadyExists {
            AppError::DuplicateIdentifier {
                identifier: record.identifier.clone(),
            }
        } else {
            AppError::RegistryWrite {
                path: path.to_path_buf(),
                source: err.error,
            }
        }
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file
            .metadata()
            .map_err(|source| AppError::RegistryWrite {
                path: path.to_path_buf(),
                source,
            })?
            .permissions();
        perms.set_mode(0o600);
        file.set_permissions(perms)
            .map_err(|source| AppError::RegistryWrite {
                path: path.to_path_buf(),
                source,
            })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{SecondsFormat, Utc};
    use tempfile::TempDir;

    fn record(identifier: &str) -> IdentityRecord {
        IdentityRecord::new(
            identifier.to_string(),
            Profile::new("Test", "Person").unwrap(),
            vec![0.1, 0.2, 0.3],
            3,
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }

    #[test]
    fn insert_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let registry = FilesystemRegistry::new(tmp.path().to_path_buf());
        let stored = record("alice@example.com");
        registry.insert(&stored).unwrap();

        let loaded = registry.load("alice@example.com").unwrap().unwrap();
        assert_eq!(loaded, stored);
        assert!(registry.exists("alice@example.com").unwrap());
    }

    #[test]
    fn load_missing_identifier_is_none() {
        let tmp = TempDir::new().unwrap();
        let registry = FilesystemRegistry::new(tmp.path().to_path_buf());
        assert!(registry.load("nobody").unwrap().is_none());
        assert!(!registry.exists("nobody").unwrap());
    }

    #[test]
    fn second_insert_for_same_identifier_is_refused() {
        let tmp = TempDir::new().unwrap();
        let registry = FilesystemRegistry::new(tmp.path().to_path_buf());
        registry.insert(&record("bob")).unwrap();

        let err = registry.insert(&record("bob")).unwrap_err();
        assert!(matches!(
            err,
            AppError::DuplicateIdentifier { identifier } if identifier == "bob"
        ));
    }

    #[test]
    fn load_all_returns_records_sorted_by_identifier() {
        let tmp = TempDir::new().unwrap();
        let registry = FilesystemRegistry::new(tmp.path().to_path_buf());
        registry.insert(&record("carol")).unwrap();
        registry.insert(&record("alice")).unwrap();
        registry.insert(&record("bob")).unwrap();

        let all = registry.load_all().unwrap();
        let identifiers: Vec<_> = all.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(identifiers, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn load_all_on_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let registry = FilesystemRegistry::new(tmp.path().join("does-not-exist"));
        assert!(registry.load_all().unwrap().is_empty());
    }

    #[test]
    fn remove_deletes_record() {
        let tmp = TempDir::new().unwrap();
        let registry = FilesystemRegistry::new(tmp.path().to_path_buf());
        registry.insert(&record("dave")).unwrap();
        assert!(registry.remove("dave").unwrap());
        assert!(!registry.remove("dave").unwrap());
        assert!(registry.load("dave").unwrap().is_none());
    }

    #[test]
    fn corrupt_record_is_reported_with_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mallory.json");
        fs::write(&path, b"not json").unwrap();
        let registry = FilesystemRegistry::new(tmp.path().to_path_buf());
        let err = registry.load("mallory").unwrap_err();
        assert!(matches!(err, AppError::InvalidRecord { .. }));
    }

    #[test]
    fn in_memory_registry_refuses_duplicate_inserts() {
        let registry = InMemoryRegistry::new();
        registry.insert(&record("alice")).unwrap();
        let err = registry.insert(&record("alice")).unwrap_err();
        assert!(matches!(
            err,
            AppError::DuplicateIdentifier { identifier } if identifier == "alice"
        ));
        assert_eq!(registry.load_all().unwrap().len(), 1);
    }

    #[test]
    fn in_memory_registry_matches_filesystem_semantics() {
        let registry = InMemoryRegistry::with_records(vec![record("carol"), record("alice")]);
        assert!(registry.exists("carol").unwrap());
        assert!(registry.load("nobody").unwrap().is_none());

        let identifiers: Vec<_> = registry
            .load_all()
            .unwrap()
            .into_iter()
            .map(|r| r.identifier)
            .collect();
        assert_eq!(identifiers, vec!["alice", "carol"]);

        assert!(registry.remove("carol").unwrap());
        assert!(!registry.remove("carol").unwrap());
    }

    #[test]
    fn persisted_json_uses_the_registry_field_names() {
        let value = serde_json::to_value(record("erin")).unwrap();
        assert!(value.get("descriptor").is_some());
        assert!(value.get("first_name").is_some());
        assert!(value.get("last_name").is_some());
        assert!(value.get("enrolled_at").is_some());
        assert!(value.get("signature").is_none());
    }

    #[test]
    fn profile_trims_names_and_rejects_blanks() {
        let profile = Profile::new(" Ada ", " Lovelace ").unwrap();
        assert_eq!(profile.display_name(), "Ada Lovelace");
        assert!(matches!(
            Profile::new("", "Lovelace"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            Profile::new("Ada", "   "),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(
            normalize_identifier("  Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
    }

    #[test]
    fn normalize_rejects_empty_and_unsafe_identifiers() {
        assert!(matches!(
            normalize_identifier("   "),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            normalize_identifier("../escape"),
            Err(AppError::InvalidInput(_))
        ));
    }
}
