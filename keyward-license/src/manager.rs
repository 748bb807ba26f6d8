//! License state reconciliation.
//!
//! [`LicenseManager`] owns the in-memory record and decides, for each run,
//! whether the license is usable: online answers from the authority always
//! win, and a transport failure falls back to the last persisted active
//! record while it is inside the offline grace window.

use crate::authority::LicenseAuthority;
use crate::device::FingerprintProvider;
use crate::error::LicenseError;
use crate::record::{LicenseInfo, LicenseRecord, LicenseStatus};
use crate::store::RecordStore;
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tracing::{info, warn};

/// Message returned when activation succeeds.
pub const MSG_ACTIVATED: &str = "license activated successfully";
/// Message returned when the authority confirms the license.
pub const MSG_VALID: &str = "license is valid";
/// Message returned when a cached license is honored without the authority.
pub const MSG_OFFLINE: &str = "using offline license (temporary)";
/// Message returned when the authority is unreachable and nothing is cached.
pub const MSG_UNREACHABLE: &str = "unable to connect to the license server";
/// Message returned when activation is attempted with a blank key.
pub const MSG_EMPTY_KEY: &str = "license key is empty";

/// Result of [`LicenseManager::activate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationOutcome {
    /// Whether the key is now active on this machine.
    pub ok: bool,
    /// Human-readable explanation.
    pub message: String,
}

/// Result of [`LicenseManager::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    /// Whether this run is authorized.
    pub ok: bool,
    /// Human-readable explanation.
    pub message: String,
    /// License metadata when authorized.
    pub info: Option<LicenseInfo>,
    /// Whether the decision was made from the cached record because the
    /// authority could not be reached.
    pub offline: bool,
}

impl ValidationOutcome {
    fn online(info: Option<LicenseInfo>) -> Self {
        Self {
            ok: true,
            message: MSG_VALID.to_string(),
            info,
            offline: false,
        }
    }

    fn denied(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            info: None,
            offline: false,
        }
    }
}

/// Activates and validates the license for this machine.
///
/// Every operation is total: failures come back as outcomes with a message,
/// never as errors or panics. Calls block for up to the authority's request
/// timeout; a multi-threaded host must serialize access, e.g. behind a
/// `Mutex`.
pub struct LicenseManager {
    authority: Box<dyn LicenseAuthority>,
    store: Box<dyn RecordStore>,
    fingerprint: Box<dyn FingerprintProvider>,
    max_offline: Option<Duration>,
    record: LicenseRecord,
}

impl LicenseManager {
    /// Creates a manager talking to the configured authority over HTTP and
    /// persisting to the configured license file.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] if the configuration is invalid.
    #[cfg(feature = "online")]
    pub fn new(config: &crate::config::LicenseConfig) -> crate::error::LicenseResult<Self> {
        let authority = crate::http::HttpAuthority::from_config(config)?;
        Ok(Self::with_parts(
            Box::new(authority),
            Box::new(crate::store::FileStore::new(&config.license_file)),
            Box::new(crate::device::HostFingerprint),
            config.max_offline,
        ))
    }

    /// Creates a manager from explicit collaborators and loads the stored record.
    #[must_use]
    pub fn with_parts(
        authority: Box<dyn LicenseAuthority>,
        store: Box<dyn RecordStore>,
        fingerprint: Box<dyn FingerprintProvider>,
        max_offline: Option<Duration>,
    ) -> Self {
        let record = store.load().unwrap_or_default();
        Self {
            authority,
            store,
            fingerprint,
            max_offline,
            record,
        }
    }

    /// Returns the current record.
    #[must_use]
    pub fn record(&self) -> &LicenseRecord {
        &self.record
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> LicenseStatus {
        self.record.status()
    }

    /// Returns the metadata from the last successful validation, if any.
    #[must_use]
    pub fn license_info(&self) -> Option<&LicenseInfo> {
        self.record.info()
    }

    /// Activates `key` on this machine. Always requires the authority.
    ///
    /// Surrounding whitespace is trimmed from the key before it is sent and
    /// stored, so a pasted key with a trailing newline still activates.
    /// On failure the record, in memory and on disk, is left untouched.
    pub fn activate(&mut self, key: &str) -> ActivationOutcome {
        let key = key.trim();
        if key.is_empty() {
            return ActivationOutcome {
                ok: false,
                message: MSG_EMPTY_KEY.to_string(),
            };
        }

        let fingerprint = self.fingerprint.fingerprint();
        match self.authority.activate(key, &fingerprint) {
            Ok(()) => {
                info!("license activated");
                self.replace(LicenseRecord::activated(key, Utc::now()));
                ActivationOutcome {
                    ok: true,
                    message: MSG_ACTIVATED.to_string(),
                }
            }
            Err(e) => {
                warn!(transport = e.is_transport(), "license activation failed: {e}");
                ActivationOutcome {
                    ok: false,
                    message: e.user_message(),
                }
            }
        }
    }

    /// Checks the activated key with the authority.
    ///
    /// A rejection downgrades the record to invalid. If the authority cannot
    /// be reached, the last persisted active record is honored while it is
    /// inside the offline window; the record is not rewritten in that case.
    pub fn validate(&mut self) -> ValidationOutcome {
        let Some(key) = self.record.key().map(str::to_string) else {
            return ValidationOutcome::denied(LicenseError::NoLicenseKey.to_string());
        };

        let fingerprint = self.fingerprint.fingerprint();
        match self.authority.validate(&key, &fingerprint) {
            Ok(info) => {
                info!("license validated");
                self.replace(LicenseRecord::validated(key, info.clone(), Utc::now()));
                ValidationOutcome::online(info)
            }
            Err(e) if e.is_transport() => {
                warn!("license server unreachable: {e}");
                self.offline_decision(Utc::now())
            }
            Err(e) => {
                warn!("license rejected: {e}");
                let last_online = self.record.last_online();
                self.replace(LicenseRecord::invalidated(key, last_online));
                ValidationOutcome::denied(e.user_message())
            }
        }
    }

    /// Forgets the license, in memory and on disk. Safe to call repeatedly.
    pub fn clear(&mut self) {
        self.record = LicenseRecord::none();
        if let Err(e) = self.store.clear() {
            warn!("failed to remove license file: {e}");
        }
    }

    /// Decides an offline run from the last persisted record.
    fn offline_decision(&self, now: DateTime<Utc>) -> ValidationOutcome {
        if !self.record.has_offline_snapshot() {
            return ValidationOutcome::denied(MSG_UNREACHABLE);
        }
        if !within_grace(self.record.last_online(), self.max_offline, now) {
            warn!(
                last_online = ?self.record.last_online(),
                "offline grace period exhausted"
            );
            return ValidationOutcome::denied(MSG_UNREACHABLE);
        }

        info!("honoring cached license while offline");
        ValidationOutcome {
            ok: true,
            message: MSG_OFFLINE.to_string(),
            info: self.record.info().cloned(),
            offline: true,
        }
    }

    /// Installs a new record and persists it. A failed save is logged only.
    fn replace(&mut self, record: LicenseRecord) {
        if let Err(e) = self.store.save(&record) {
            warn!("failed to save license file: {e}");
        }
        self.record = record;
    }
}

impl std::fmt::Debug for LicenseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseManager")
            .field("record", &self.record)
            .field("max_offline", &self.max_offline)
            .finish_non_exhaustive()
    }
}

/// Whether an offline run at `now` is still covered by the last online stamp.
///
/// Records without a stamp predate stamping and are honored. A stamp in the
/// future counts as fresh.
#[must_use]
pub fn within_grace(
    last_online: Option<DateTime<Utc>>,
    max_offline: Option<Duration>,
    now: DateTime<Utc>,
) -> bool {
    let (Some(last_online), Some(max_offline)) = (last_online, max_offline) else {
        return true;
    };
    let window = TimeDelta::from_std(max_offline).unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(last_online) <= window
}
