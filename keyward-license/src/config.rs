//! Agent configuration.

use crate::error::{LicenseError, LicenseResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default authority base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// File name of the license file in the user's home directory.
pub const LICENSE_FILE_NAME: &str = ".keyward_license.json";

/// Default bound on a single authority request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default longest stretch the agent trusts a cached license while offline (30 days).
pub const DEFAULT_MAX_OFFLINE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Configuration for a [`LicenseManager`](crate::LicenseManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// Base URL of the licensing authority.
    pub api_url: String,
    /// Location of the persisted license record.
    pub license_file: PathBuf,
    /// Timeout applied to each authority request.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// How long after the last successful validation an offline run is
    /// still honored. `None` disables the cap.
    #[serde(with = "opt_duration_secs")]
    pub max_offline: Option<Duration>,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            license_file: default_license_file(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_offline: Some(DEFAULT_MAX_OFFLINE),
        }
    }
}

impl LicenseConfig {
    /// Default configuration pointing at the given authority.
    #[must_use]
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    /// Builds a configuration from defaults overridden by environment variables:
    ///
    /// - `KEYWARD_API_URL`
    /// - `KEYWARD_LICENSE_FILE`
    /// - `KEYWARD_REQUEST_TIMEOUT_SECS`
    /// - `KEYWARD_MAX_OFFLINE_DAYS` (`0` disables the cap)
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] if a numeric variable does not parse
    /// or the offline window does not fit in a duration.
    pub fn from_env() -> LicenseResult<Self> {
        let mut config = Self::default();

        if let Ok(url) = env::var("KEYWARD_API_URL") {
            config.api_url = url;
        }
        if let Ok(path) = env::var("KEYWARD_LICENSE_FILE") {
            config.license_file = PathBuf::from(path);
        }
        if let Some(secs) = parse_var("KEYWARD_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(days) = parse_var("KEYWARD_MAX_OFFLINE_DAYS")? {
            config.max_offline = match days {
                0 => None,
                days => {
                    let secs = days.checked_mul(SECS_PER_DAY).ok_or_else(|| {
                        LicenseError::Config(format!(
                            "KEYWARD_MAX_OFFLINE_DAYS is too large: {days}"
                        ))
                    })?;
                    Some(Duration::from_secs(secs))
                }
            };
        }

        Ok(config)
    }

    /// Sets the license file location.
    #[must_use]
    pub fn with_license_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.license_file = path.into();
        self
    }

    /// Sets the offline grace cap.
    #[must_use]
    pub fn with_max_offline(mut self, max_offline: Option<Duration>) -> Self {
        self.max_offline = max_offline;
        self
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] for an empty or non-HTTP URL or a zero timeout.
    pub fn validate(&self) -> LicenseResult<()> {
        let url = self.api_url.trim();
        if url.is_empty() {
            return Err(LicenseError::Config("api_url is empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(LicenseError::Config(format!(
                "api_url must be http(s): {url}"
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(LicenseError::Config(
                "request_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// The per-user license file location: `~/.keyward_license.json`.
#[must_use]
pub fn default_license_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(LICENSE_FILE_NAME)
}

fn parse_var(name: &str) -> LicenseResult<Option<u64>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| LicenseError::Config(format!("{name} is not a number: {raw}"))),
        Err(_) => Ok(None),
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod opt_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|o| o.map(Duration::from_secs))
    }
}
