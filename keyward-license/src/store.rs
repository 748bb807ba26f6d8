//! Storage for the persisted license record.

use crate::error::{LicenseError, LicenseResult};
use crate::record::LicenseRecord;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Storage adapter for the license record.
pub trait RecordStore: Send + Sync {
    /// Loads the last saved record.
    ///
    /// Returns `None` when nothing is stored or the stored data is unreadable;
    /// a damaged store must never prevent startup.
    fn load(&self) -> Option<LicenseRecord>;

    /// Replaces the stored record.
    fn save(&self, record: &LicenseRecord) -> LicenseResult<()>;

    /// Removes the stored record. Succeeds when nothing is stored.
    fn clear(&self) -> LicenseResult<()>;
}

/// JSON file storage.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so an interrupted save leaves the previous file intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a store backed by the file at `path`. The file need not exist.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the license file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "license.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Reads and parses the file, reporting why it could not be used.
    pub fn try_load(&self) -> LicenseResult<Option<LicenseRecord>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: LicenseRecord = serde_json::from_str(&contents)?;
        Ok(Some(record))
    }
}

impl RecordStore for FileStore {
    fn load(&self) -> Option<LicenseRecord> {
        match self.try_load() {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %self.path.display(), "ignoring unreadable license file: {e}");
                None
            }
        }
    }

    fn save(&self, record: &LicenseRecord) -> LicenseResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(record)?;
        let tmp = self.temp_path();
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            LicenseError::Storage(format!("replace {}: {e}", self.path.display()))
        })?;

        debug!(
            path = %self.path.display(),
            status = record.status().as_str().unwrap_or("none"),
            "saved license file"
        );
        Ok(())
    }

    fn clear(&self) -> LicenseResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed license file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process storage for hosts without a writable disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: RwLock<Option<LicenseRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `record`.
    #[must_use]
    pub fn with_record(record: LicenseRecord) -> Self {
        Self {
            record: RwLock::new(Some(record)),
        }
    }
}

impl RecordStore for MemoryStore {
    fn load(&self) -> Option<LicenseRecord> {
        self.record.read().ok()?.clone()
    }

    fn save(&self, record: &LicenseRecord) -> LicenseResult<()> {
        let mut slot = self
            .record
            .write()
            .map_err(|_| LicenseError::Storage("memory store poisoned".to_string()))?;
        *slot = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> LicenseResult<()> {
        let mut slot = self
            .record
            .write()
            .map_err(|_| LicenseError::Storage("memory store poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}
