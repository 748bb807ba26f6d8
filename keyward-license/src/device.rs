//! Device fingerprinting for license binding.
//!
//! Generates a stable hardware fingerprint that identifies this device.
//! The authority binds each activated key to one fingerprint, which keeps
//! a key from being trivially shared between machines.
//!
//! Every source is best-effort: a missing or failing source degrades to a
//! fallback value so that a fingerprint is always produced.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

/// Separator between fingerprint components before hashing.
const COMPONENT_DELIMITER: &str = "|";

/// Source of the hardware identifier sent to the authority.
pub trait FingerprintProvider: Send + Sync {
    /// Returns the fingerprint of the current machine. Never fails.
    fn fingerprint(&self) -> HardwareFingerprint;
}

/// A stable fingerprint that identifies this device.
///
/// Lowercase hex of a SHA-256 digest, always 64 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HardwareFingerprint(String);

impl HardwareFingerprint {
    /// Hashes a set of collected components into a fingerprint.
    #[must_use]
    pub fn from_components(components: &FingerprintComponents) -> Self {
        let combined = components.joined();

        let mut hasher = Sha256::new();
        hasher.update(combined.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Returns the fingerprint as a hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HardwareFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The raw identifiers a fingerprint is derived from, in hashing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintComponents {
    /// Operating system name.
    pub platform: String,
    /// CPU architecture.
    pub arch: String,
    /// CPU model string.
    pub cpu_model: String,
    /// Hardware address of the primary network interface.
    pub network_id: String,
    /// OS installation identifier (machine-id, platform UUID or volume serial).
    pub install_id: String,
}

impl FingerprintComponents {
    /// Collects identifiers for the current device.
    #[must_use]
    pub fn collect() -> Self {
        Self {
            platform: guarded("platform", || env::consts::OS.to_string()),
            arch: guarded("arch", || env::consts::ARCH.to_string()),
            cpu_model: guarded("cpu_model", || or_empty("cpu_model", cpu_model())),
            network_id: guarded("network_id", || or_empty("network_id", network_id())),
            install_id: guarded("install_id", || {
                install_id().unwrap_or_else(|| {
                    let fallback = install_id_fallback();
                    debug!(fallback = %fallback, "install id unavailable, using fallback");
                    fallback
                })
            }),
        }
    }

    fn joined(&self) -> String {
        [
            self.platform.as_str(),
            self.arch.as_str(),
            self.cpu_model.as_str(),
            self.network_id.as_str(),
            self.install_id.as_str(),
        ]
        .join(COMPONENT_DELIMITER)
    }
}

/// Fingerprints the machine the process is running on.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFingerprint;

impl FingerprintProvider for HostFingerprint {
    fn fingerprint(&self) -> HardwareFingerprint {
        HardwareFingerprint::from_components(&FingerprintComponents::collect())
    }
}

/// A fingerprint supplied by the embedding application.
#[derive(Debug, Clone)]
pub struct StaticFingerprint(HardwareFingerprint);

impl StaticFingerprint {
    /// Wraps a precomputed fingerprint value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(HardwareFingerprint(id.into()))
    }
}

impl FingerprintProvider for StaticFingerprint {
    fn fingerprint(&self) -> HardwareFingerprint {
        self.0.clone()
    }
}

/// Runs one collector, substituting an empty string if it panics.
pub(crate) fn guarded<F>(field: &'static str, collect: F) -> String
where
    F: FnOnce() -> String,
{
    panic::catch_unwind(AssertUnwindSafe(collect)).unwrap_or_else(|_| {
        debug!(field, "fingerprint source panicked, using empty value");
        String::new()
    })
}

fn or_empty(field: &'static str, value: Option<String>) -> String {
    value.unwrap_or_else(|| {
        debug!(field, "fingerprint source unavailable, using empty value");
        String::new()
    })
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    std::process::Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).into_owned())
}

/// Gets the CPU model string.
fn cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").ok()?;
        ["model name", "Hardware", "Processor"].iter().find_map(|label| {
            cpuinfo.lines().find_map(|line| {
                let (name, value) = line.split_once(':')?;
                (name.trim() == *label).then(|| non_empty(value)).flatten()
            })
        })
    }

    #[cfg(target_os = "macos")]
    {
        command_output("sysctl", &["-n", "machdep.cpu.brand_string"])
            .and_then(|s| non_empty(&s))
    }

    #[cfg(target_os = "windows")]
    {
        env::var("PROCESSOR_IDENTIFIER").ok().and_then(|s| non_empty(&s))
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}

/// Gets the hardware address of the primary network interface.
fn network_id() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let interfaces: Vec<NetInterface> = std::fs::read_dir("/sys/class/net")
            .ok()?
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name != "lo")
            .filter_map(|name| {
                let address = std::fs::read_to_string(format!("/sys/class/net/{name}/address"))
                    .ok()
                    .and_then(|addr| normalize_mac(&addr))?;
                let is_physical =
                    std::path::Path::new(&format!("/sys/class/net/{name}/device")).exists();
                Some(NetInterface {
                    name,
                    address,
                    is_physical,
                })
            })
            .collect();

        select_interface(&interfaces)
    }

    #[cfg(target_os = "macos")]
    {
        command_output("ifconfig", &["en0"]).and_then(|output| {
            output.lines().find_map(|line| {
                line.trim()
                    .strip_prefix("ether ")
                    .and_then(normalize_mac)
            })
        })
    }

    #[cfg(target_os = "windows")]
    {
        // CSV rows: "AA-BB-CC-DD-EE-FF","\Device\Tcpip_{...}"
        command_output("getmac", &["/fo", "csv", "/nh"]).and_then(|output| {
            output.lines().find_map(|line| {
                line.split(',')
                    .next()
                    .and_then(|field| normalize_mac(field.trim_matches('"')))
            })
        })
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}

/// A network interface seen while fingerprinting.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NetInterface {
    pub(crate) name: String,
    /// Normalized MAC address.
    pub(crate) address: String,
    /// Backed by a hardware device rather than created in software.
    pub(crate) is_physical: bool,
}

/// Name prefixes of interfaces created by bridges, containers, VPNs and hypervisors.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
const VIRTUAL_PREFIXES: &[&str] = &[
    "br-", "bond", "cni", "docker", "flannel", "podman", "tap", "tun", "veth", "virbr", "vmnet",
    "vxlan", "wg", "zt",
];

/// Picks the interface whose address identifies the machine.
///
/// Preference, each tier ordered by name: physical adapters with a globally
/// unique address, other physical adapters, software interfaces not named
/// like bridges or tunnels, then anything. Interfaces appearing and
/// disappearing in a lower tier never change the pick of a higher one.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn select_interface(interfaces: &[NetInterface]) -> Option<String> {
    let rank = |iface: &NetInterface| -> u8 {
        if iface.is_physical && !is_locally_administered(&iface.address) {
            0
        } else if iface.is_physical {
            1
        } else if !VIRTUAL_PREFIXES.iter().any(|p| iface.name.starts_with(p)) {
            2
        } else {
            3
        }
    };

    interfaces
        .iter()
        .min_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name)))
        .map(|iface| iface.address.clone())
}

/// Whether the locally-administered bit is set in a normalized MAC address.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn is_locally_administered(mac: &str) -> bool {
    mac.get(..2)
        .and_then(|octet| u8::from_str_radix(octet, 16).ok())
        .is_some_and(|octet| octet & 0x02 != 0)
}

/// Normalizes a MAC address to lowercase colon form, rejecting all-zero addresses.
pub(crate) fn normalize_mac(raw: &str) -> Option<String> {
    let octets: Vec<&str> = raw.trim().split([':', '-']).collect();
    if octets.len() != 6
        || !octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
    {
        return None;
    }
    if octets.iter().all(|o| *o == "00") {
        return None;
    }
    Some(octets.join(":").to_lowercase())
}

/// Gets the OS installation identifier.
fn install_id() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        // Try /etc/machine-id first, then /var/lib/dbus/machine-id
        ["/etc/machine-id", "/var/lib/dbus/machine-id"]
            .iter()
            .find_map(|path| std::fs::read_to_string(path).ok().and_then(|s| non_empty(&s)))
    }

    #[cfg(target_os = "macos")]
    {
        command_output("ioreg", &["-rd1", "-c", "IOPlatformExpertDevice"]).and_then(|output| {
            output
                .lines()
                .find(|l| l.contains("IOPlatformUUID"))
                .and_then(|l| l.split('"').nth(3))
                .and_then(non_empty)
        })
    }

    #[cfg(target_os = "windows")]
    {
        // "Volume Serial Number is 1234-ABCD"
        let drive = system_drive();
        command_output("cmd", &["/C", "vol", &drive]).and_then(|output| {
            output
                .lines()
                .find_map(|l| l.trim().rsplit_once(' ').filter(|_| l.contains("Serial")))
                .and_then(|(_, serial)| non_empty(serial))
        })
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}

#[cfg(target_os = "windows")]
fn system_drive() -> String {
    env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string())
}

/// Value used when no installation identifier can be read.
fn install_id_fallback() -> String {
    #[cfg(target_os = "windows")]
    {
        system_drive()
    }

    #[cfg(not(target_os = "windows"))]
    {
        dirs::home_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .or_else(|| env::var("HOME").ok())
            .unwrap_or_default()
    }
}
