//! The persisted license record and its lifecycle.
//!
//! A record moves `None -> Active` on a successful exchange with the
//! authority, `Active -> Invalid` when the authority rejects a validation,
//! and back to `None` only when cleared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-supplied license metadata (plan, expiry, seats...), kept opaque.
pub type LicenseInfo = serde_json::Map<String, serde_json::Value>;

/// The last known state of the license on this machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LicenseStatus {
    /// No license has been activated.
    #[default]
    None,
    /// The authority last accepted this key for this machine.
    Active,
    /// The authority last rejected this key.
    Invalid,
}

impl LicenseStatus {
    /// Returns the persisted name of the status, or `None` for no license.
    #[must_use]
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Active => Some("active"),
            Self::Invalid => Some("invalid"),
        }
    }
}

/// The unit of persisted license state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredRecord", into = "StoredRecord")]
pub struct LicenseRecord {
    key: Option<String>,
    status: LicenseStatus,
    info: Option<LicenseInfo>,
    last_online: Option<DateTime<Utc>>,
}

impl LicenseRecord {
    /// A record with no license.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// A freshly activated key, without metadata yet.
    #[must_use]
    pub fn activated(key: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            key: Some(key.into()),
            status: LicenseStatus::Active,
            info: None,
            last_online: Some(at),
        }
    }

    /// A key the authority has just confirmed, with whatever metadata it sent.
    #[must_use]
    pub fn validated(
        key: impl Into<String>,
        info: Option<LicenseInfo>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: Some(key.into()),
            status: LicenseStatus::Active,
            info,
            last_online: Some(at),
        }
    }

    /// A key the authority has rejected.
    ///
    /// The last-online stamp is kept for diagnostics; it no longer grants
    /// anything once the status is invalid.
    #[must_use]
    pub fn invalidated(key: impl Into<String>, last_online: Option<DateTime<Utc>>) -> Self {
        Self {
            key: Some(key.into()),
            status: LicenseStatus::Invalid,
            info: None,
            last_online,
        }
    }

    /// Returns the license key, if one was ever activated.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Returns the license status.
    #[must_use]
    pub fn status(&self) -> LicenseStatus {
        self.status
    }

    /// Returns the server metadata. Only present while active.
    #[must_use]
    pub fn info(&self) -> Option<&LicenseInfo> {
        self.info.as_ref()
    }

    /// Returns when the authority last answered positively.
    #[must_use]
    pub fn last_online(&self) -> Option<DateTime<Utc>> {
        self.last_online
    }

    /// Returns true if this record can back an offline authorization:
    /// active, with non-empty metadata from a previous validation.
    #[must_use]
    pub fn has_offline_snapshot(&self) -> bool {
        self.status == LicenseStatus::Active && self.info.as_ref().is_some_and(|i| !i.is_empty())
    }

    /// Restores the record invariants after reading untrusted input.
    fn normalized(mut self) -> Self {
        if self.key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Self::none();
        }
        if self.status != LicenseStatus::Active {
            self.info = None;
        }
        self
    }
}

/// Persisted status names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoredStatus {
    Active,
    Invalid,
}

/// On-disk layout of a license file.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    license_key: Option<String>,
    license_info: Option<LicenseInfo>,
    license_status: Option<StoredStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_online: Option<DateTime<Utc>>,
}

impl From<StoredRecord> for LicenseRecord {
    fn from(stored: StoredRecord) -> Self {
        let status = match stored.license_status {
            None => LicenseStatus::None,
            Some(StoredStatus::Active) => LicenseStatus::Active,
            Some(StoredStatus::Invalid) => LicenseStatus::Invalid,
        };
        Self {
            key: stored.license_key,
            status,
            info: stored.license_info,
            last_online: stored.last_online,
        }
        .normalized()
    }
}

impl From<LicenseRecord> for StoredRecord {
    fn from(record: LicenseRecord) -> Self {
        let license_status = match record.status {
            LicenseStatus::None => None,
            LicenseStatus::Active => Some(StoredStatus::Active),
            LicenseStatus::Invalid => Some(StoredStatus::Invalid),
        };
        Self {
            license_key: record.key,
            license_info: record.info,
            license_status,
            last_online: record.last_online,
        }
    }
}
