//! Shared test helpers for license tests.

#![allow(dead_code)]

use keyward_license::{
    FingerprintProvider, FileStore, HardwareFingerprint, LicenseAuthority, LicenseError,
    LicenseInfo, LicenseManager, LicenseResult, StaticFingerprint,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Installs a test log subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fixed fingerprint used by manager tests.
pub const TEST_FINGERPRINT: &str = "f00dfeed";

/// How the stub authority answers the next call.
#[derive(Debug, Clone)]
pub enum Reply {
    /// `{success: true}`, with `data` for validate.
    Accept(LicenseInfo),
    /// `{success: true}` without a `data` object.
    AcceptWithoutData,
    /// A response arrived and said no.
    Reject(String),
    /// No response at all.
    Unreachable,
}

#[derive(Debug)]
struct StubState {
    reply: Mutex<Reply>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, String)>>,
}

/// In-process authority whose answers can be changed between calls.
#[derive(Debug, Clone)]
pub struct StubAuthority(Arc<StubState>);

impl StubAuthority {
    pub fn new(reply: Reply) -> Self {
        Self(Arc::new(StubState {
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }))
    }

    pub fn set(&self, reply: Reply) {
        *self.0.reply.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> usize {
        self.0.calls.load(Ordering::SeqCst)
    }

    /// `(key, hardwareId)` pairs received so far.
    pub fn seen(&self) -> Vec<(String, String)> {
        self.0.seen.lock().unwrap().clone()
    }

    fn answer(
        &self,
        key: &str,
        fingerprint: &HardwareFingerprint,
    ) -> LicenseResult<Option<LicenseInfo>> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        self.0
            .seen
            .lock()
            .unwrap()
            .push((key.to_string(), fingerprint.as_str().to_string()));
        match self.0.reply.lock().unwrap().clone() {
            Reply::Accept(info) => Ok(Some(info)),
            Reply::AcceptWithoutData => Ok(None),
            Reply::Reject(msg) => Err(LicenseError::Rejected(msg)),
            Reply::Unreachable => Err(LicenseError::Network("connection refused".into())),
        }
    }
}

impl LicenseAuthority for StubAuthority {
    fn activate(&self, key: &str, fingerprint: &HardwareFingerprint) -> LicenseResult<()> {
        self.answer(key, fingerprint).map(|_| ())
    }

    fn validate(
        &self,
        key: &str,
        fingerprint: &HardwareFingerprint,
    ) -> LicenseResult<Option<LicenseInfo>> {
        self.answer(key, fingerprint)
    }
}

/// Builds a metadata map from a JSON object literal.
pub fn info(value: serde_json::Value) -> LicenseInfo {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// `{"plan": "pro"}`
pub fn pro_info() -> LicenseInfo {
    info(serde_json::json!({ "plan": "pro" }))
}

/// A temp directory holding the license file for one test.
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn license_file(&self) -> PathBuf {
        self.dir.path().join("license.json")
    }

    pub fn store(&self) -> FileStore {
        FileStore::new(self.license_file())
    }

    /// Raw bytes of the license file, or `None` if absent.
    pub fn file_bytes(&self) -> Option<Vec<u8>> {
        std::fs::read(self.license_file()).ok()
    }

    /// A manager over this sandbox's file with the given authority.
    pub fn manager(&self, authority: &StubAuthority, max_offline: Option<Duration>) -> LicenseManager {
        LicenseManager::with_parts(
            Box::new(authority.clone()),
            Box::new(self.store()),
            Box::new(StaticFingerprint::new(TEST_FINGERPRINT)),
            max_offline,
        )
    }
}

/// Asserts the fingerprint provider output is 64 lowercase hex chars.
pub fn assert_hex_fingerprint(provider: &dyn FingerprintProvider) {
    let fp = provider.fingerprint();
    assert_eq!(fp.as_str().len(), 64);
    assert!(fp
        .as_str()
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}
