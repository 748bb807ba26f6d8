//! The licensing authority contract.
//!
//! Both endpoints take `{key, hardwareId}` and answer with a JSON body whose
//! `success` flag, together with HTTP 200, decides the outcome. Failures are
//! split into transport errors ([`LicenseError::Network`], nothing came back)
//! and rejections ([`LicenseError::Rejected`], the server said no).

use crate::device::HardwareFingerprint;
use crate::error::{LicenseError, LicenseResult};
use crate::record::LicenseInfo;
use serde::{Deserialize, Serialize};

/// Path of the activation endpoint.
pub const ACTIVATE_PATH: &str = "/api/licenses/activate";

/// Path of the validation endpoint.
pub const VALIDATE_PATH: &str = "/api/licenses/validate";

const ACTIVATE_FAILED: &str = "unable to activate license";
const VALIDATE_FAILED: &str = "license is not valid";

/// Remote service that activates and validates license keys.
pub trait LicenseAuthority: Send + Sync {
    /// Binds `key` to `fingerprint`.
    fn activate(&self, key: &str, fingerprint: &HardwareFingerprint) -> LicenseResult<()>;

    /// Confirms `key` for `fingerprint` and returns the license metadata,
    /// if the authority sent any.
    fn validate(
        &self,
        key: &str,
        fingerprint: &HardwareFingerprint,
    ) -> LicenseResult<Option<LicenseInfo>>;
}

/// Request body shared by both endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRequest<'a> {
    /// The license key.
    pub key: &'a str,
    /// The caller's fingerprint.
    pub hardware_id: &'a str,
}

impl<'a> LicenseRequest<'a> {
    /// Builds the body for `key` on this machine.
    #[must_use]
    pub fn new(key: &'a str, fingerprint: &'a HardwareFingerprint) -> Self {
        Self {
            key,
            hardware_id: fingerprint.as_str(),
        }
    }
}

/// Response body shared by both endpoints.
#[derive(Debug, Default, Deserialize)]
struct AuthorityResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn parse_body(body: &[u8]) -> Option<AuthorityResponse> {
    serde_json::from_slice(body).ok()
}

/// Interprets an activation response.
///
/// # Errors
///
/// Returns [`LicenseError::Rejected`] unless the status is 200 and `success` is true.
/// The message prefers the body's `error`, then `message`.
pub fn interpret_activate(status: u16, body: &[u8]) -> LicenseResult<()> {
    match parse_body(body) {
        Some(resp) if status == 200 && resp.success => Ok(()),
        Some(resp) => Err(LicenseError::Rejected(
            resp.error
                .or(resp.message)
                .unwrap_or_else(|| ACTIVATE_FAILED.to_string()),
        )),
        None => Err(LicenseError::Rejected(ACTIVATE_FAILED.to_string())),
    }
}

/// Interprets a validation response, returning the `data` payload.
///
/// A success body without an object `data` yields no metadata.
///
/// # Errors
///
/// Returns [`LicenseError::Rejected`] unless the status is 200 and `success` is true.
/// The message prefers the body's `message`, then `error`.
pub fn interpret_validate(status: u16, body: &[u8]) -> LicenseResult<Option<LicenseInfo>> {
    match parse_body(body) {
        Some(resp) if status == 200 && resp.success => Ok(match resp.data {
            Some(serde_json::Value::Object(info)) => Some(info),
            _ => None,
        }),
        Some(resp) => Err(LicenseError::Rejected(
            resp.message
                .or(resp.error)
                .unwrap_or_else(|| VALIDATE_FAILED.to_string()),
        )),
        None => Err(LicenseError::Rejected(VALIDATE_FAILED.to_string())),
    }
}
