//! Hardware-bound licensing agent.
//!
//! This crate handles:
//! - Hardware fingerprinting for device binding
//! - Activation and validation of license keys against a licensing authority
//! - Persisting the last known license state between runs
//! - Offline use of a previously validated license within a grace window
//!
//! # Design Principles
//!
//! - **Server is the source of truth**: an explicit rejection always downgrades
//!   the local record to invalid
//! - **Bounded offline trust**: when the server is unreachable, the last
//!   validated state is honored for at most the configured window
//! - **Never fatal**: a corrupt license file or a failing hardware lookup
//!   degrades gracefully instead of aborting the host application
//! - **Deterrent, not DRM**: fingerprinting discourages key sharing; it does
//!   not stop a determined reverse-engineer
//!
//! # Example
//!
//! ```no_run
//! use keyward_license::{LicenseConfig, LicenseManager};
//!
//! let config = LicenseConfig::new("https://licenses.example.com");
//! let mut manager = LicenseManager::new(&config)?;
//!
//! if manager.record().key().is_none() {
//!     let outcome = manager.activate("KEY-1234");
//!     println!("{}", outcome.message);
//! }
//!
//! let outcome = manager.validate();
//! if outcome.ok {
//!     println!("licensed (offline: {}): {:?}", outcome.offline, outcome.info);
//! }
//! # Ok::<(), keyward_license::LicenseError>(())
//! ```

mod authority;
mod config;
mod device;
mod error;
#[cfg(feature = "online")]
mod http;
mod manager;
mod record;
mod store;

pub use authority::{
    interpret_activate, interpret_validate, LicenseAuthority, LicenseRequest, ACTIVATE_PATH,
    VALIDATE_PATH,
};
pub use config::{
    default_license_file, LicenseConfig, DEFAULT_API_URL, DEFAULT_MAX_OFFLINE,
    DEFAULT_REQUEST_TIMEOUT, LICENSE_FILE_NAME,
};
pub use device::{
    FingerprintComponents, FingerprintProvider, HardwareFingerprint, HostFingerprint,
    StaticFingerprint,
};
pub use error::{LicenseError, LicenseResult};
pub use manager::{
    within_grace, ActivationOutcome, LicenseManager, ValidationOutcome, MSG_ACTIVATED,
    MSG_EMPTY_KEY, MSG_OFFLINE, MSG_UNREACHABLE, MSG_VALID,
};
pub use record::{LicenseInfo, LicenseRecord, LicenseStatus};
pub use store::{FileStore, MemoryStore, RecordStore};

#[cfg(feature = "online")]
pub use http::HttpAuthority;
