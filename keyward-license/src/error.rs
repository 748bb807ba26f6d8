//! Error types for the licensing agent.

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// No response was obtained from the authority (DNS, connect, timeout, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The authority answered and refused the request.
    #[error("rejected by license server: {0}")]
    Rejected(String),

    /// Validation was requested but no key has been activated.
    #[error("no license key")]
    NoLicenseKey,

    /// Reading or writing the license file failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid agent configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LicenseError {
    /// Returns true if the authority could not be reached at all.
    ///
    /// Only these failures are eligible for the offline grace path.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Short message suitable for showing to the user.
    ///
    /// Rejections carry the server's own wording verbatim.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for LicenseError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
