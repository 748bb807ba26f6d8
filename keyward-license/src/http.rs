//! Blocking HTTP client for the licensing authority.

use crate::authority::{
    interpret_activate, interpret_validate, LicenseAuthority, LicenseRequest, ACTIVATE_PATH,
    VALIDATE_PATH,
};
use crate::config::LicenseConfig;
use crate::device::HardwareFingerprint;
use crate::error::{LicenseError, LicenseResult};
use crate::record::LicenseInfo;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("keyward-license/", env!("CARGO_PKG_VERSION"));

/// Talks to the authority over HTTP(S) with a bounded request timeout.
#[derive(Debug, Clone)]
pub struct HttpAuthority {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpAuthority {
    /// Creates a client for the authority at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> LicenseResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LicenseError::Config(format!("http client: {e}")))?;

        let base_url: String = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Creates a client from the agent configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] if the configuration is invalid.
    pub fn from_config(config: &LicenseConfig) -> LicenseResult<Self> {
        config.validate()?;
        Self::new(config.api_url.trim(), config.request_timeout)
    }

    /// Returns the authority base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POSTs the request and returns the status and raw body.
    ///
    /// Any failure before the full body is read counts as a transport error.
    fn post(&self, path: &str, request: &LicenseRequest<'_>) -> LicenseResult<(u16, Vec<u8>)> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .map_err(|e| LicenseError::Network(format!("request to {url} failed: {e}")))?;

        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .map_err(|e| LicenseError::Network(format!("read body: {e}")))?;

        debug!(%url, status, "license server responded");
        Ok((status, body.to_vec()))
    }
}

impl LicenseAuthority for HttpAuthority {
    fn activate(&self, key: &str, fingerprint: &HardwareFingerprint) -> LicenseResult<()> {
        let (status, body) = self.post(ACTIVATE_PATH, &LicenseRequest::new(key, fingerprint))?;
        interpret_activate(status, &body)
    }

    fn validate(
        &self,
        key: &str,
        fingerprint: &HardwareFingerprint,
    ) -> LicenseResult<Option<LicenseInfo>> {
        let (status, body) = self.post(VALIDATE_PATH, &LicenseRequest::new(key, fingerprint))?;
        interpret_validate(status, &body)
    }
}
