//! Compiled-in device configuration
//!
//! Secrets are baked in at build time from the environment of the build
//! (`ZONE_WIFI_SSID`, `ZONE_WIFI_PASS`, `ZONE_BROKER`, `ZONE_DEVICE_ID`,
//! `ZONE_DEVICE_PASSWORD`, `ZONE_SECURE_ELEMENT_DIR`, `ZONE_BROKER_CA`,
//! `ZONE_RECONNECT_MAX_DELAY_MS`, `ZONE_CONNECT_ATTEMPTS`).
//! Unset values fall back to development defaults.

use crate::connection::{Backoff, RetryPolicy};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use zonelight_shared::{mqtt_username, protocol};

const WIFI_SSID: &str = match option_env!("ZONE_WIFI_SSID") {
    Some(v) => v,
    None => "zone-lab",
};
const WIFI_PASS: &str = match option_env!("ZONE_WIFI_PASS") {
    Some(v) => v,
    None => "",
};
const BROKER: &str = match option_env!("ZONE_BROKER") {
    Some(v) => v,
    None => "localhost",
};
const DEVICE_ID: &str = match option_env!("ZONE_DEVICE_ID") {
    Some(v) => v,
    None => "zone-controller-001",
};
const DEVICE_PASSWORD: &str = match option_env!("ZONE_DEVICE_PASSWORD") {
    Some(v) => v,
    None => "",
};
const SECURE_ELEMENT_DIR: &str = match option_env!("ZONE_SECURE_ELEMENT_DIR") {
    Some(v) => v,
    None => "secure-element",
};

/// Reconnect policy. Fixed delay forever unless the build sets a backoff cap
/// (`ZONE_RECONNECT_MAX_DELAY_MS`) or an attempt ceiling
/// (`ZONE_CONNECT_ATTEMPTS`).
fn retry_policy(max_delay_ms: Option<&str>, max_attempts: Option<&str>) -> RetryPolicy {
    let delay = Duration::from_millis(protocol::RECONNECT_DELAY_MS);
    let mut policy = RetryPolicy::forever(delay);

    if let Some(max) = max_delay_ms.and_then(|v| v.parse::<u64>().ok()) {
        policy.backoff = Backoff::Exponential {
            initial: delay,
            max: Duration::from_millis(max).max(delay),
        };
    }
    policy.max_attempts = max_attempts
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|n| *n > 0);
    policy
}

/// Device identity used for MQTT authentication
#[derive(Clone)]
pub struct Identity {
    pub device_id: String,
    pub credential: String,
}

// Keeps the credential out of logs
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("device_id", &self.device_id)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Broker address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn secure(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: protocol::SECURE_PORT,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Radio credentials
#[derive(Clone)]
pub struct WifiCredentials {
    pub ssid: String,
    pub passphrase: String,
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .finish_non_exhaustive()
    }
}

/// Parameters for rebuilding the self-signed device certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    /// Secure element slot holding the private key
    pub key_slot: u8,
    /// Slot holding the stored certificate
    pub storage_slot: u8,
    /// Validity window in years, starting at issue time
    pub validity_years: u8,
}

impl Default for CertificateRequest {
    fn default() -> Self {
        Self {
            key_slot: 0,
            storage_slot: 8,
            validity_years: 31,
        }
    }
}

/// Configuration for the whole device
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub identity: Identity,
    pub endpoint: Endpoint,
    pub wifi: WifiCredentials,
    /// Directory standing in for the hardware crypto element
    pub secure_element_dir: PathBuf,
    /// Extra trust anchor for brokers outside the webpki root set
    pub broker_ca: Option<PathBuf>,
    pub certificate: CertificateRequest,
    /// Policy for both network and session connection attempts
    pub retry: RetryPolicy,
    /// Inbound payload capacity in bytes
    pub buffer_capacity: usize,
    /// Upper bound for one messaging-layer poll
    pub poll_interval: Duration,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    /// Delay before touching hardware at boot
    pub boot_delay: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            identity: Identity {
                device_id: DEVICE_ID.into(),
                credential: DEVICE_PASSWORD.into(),
            },
            endpoint: Endpoint::secure(BROKER),
            wifi: WifiCredentials {
                ssid: WIFI_SSID.into(),
                passphrase: WIFI_PASS.into(),
            },
            secure_element_dir: PathBuf::from(SECURE_ELEMENT_DIR),
            broker_ca: option_env!("ZONE_BROKER_CA").map(PathBuf::from),
            certificate: CertificateRequest::default(),
            retry: retry_policy(
                option_env!("ZONE_RECONNECT_MAX_DELAY_MS"),
                option_env!("ZONE_CONNECT_ATTEMPTS"),
            ),
            buffer_capacity: protocol::DEFAULT_BUFFER_CAPACITY,
            poll_interval: Duration::from_millis(100),
            keep_alive: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            boot_delay: if cfg!(debug_assertions) {
                Duration::ZERO
            } else {
                Duration::from_secs(5)
            },
        }
    }
}

impl DeviceConfig {
    /// MQTT username for this device
    pub fn username(&self) -> String {
        mqtt_username(&self.endpoint.host, &self.identity.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.endpoint.port, 8883);
        assert_eq!(config.buffer_capacity, 256);
        assert_eq!(config.retry.max_attempts, None);
        assert_eq!(config.certificate.key_slot, 0);
        assert_eq!(config.certificate.storage_slot, 8);
    }

    #[test]
    fn test_retry_policy_from_build_env() {
        let fixed = retry_policy(None, None);
        assert_eq!(fixed.backoff, Backoff::Fixed(Duration::from_secs(5)));
        assert_eq!(fixed.max_attempts, None);

        let tuned = retry_policy(Some("60000"), Some("3"));
        assert_eq!(
            tuned.backoff,
            Backoff::Exponential {
                initial: Duration::from_secs(5),
                max: Duration::from_secs(60),
            }
        );
        assert_eq!(tuned.max_attempts, Some(3));

        let garbage = retry_policy(Some("soon"), Some("0"));
        assert_eq!(garbage, fixed);
    }

    #[test]
    fn test_username_format() {
        let mut config = DeviceConfig::default();
        config.endpoint = Endpoint::secure("hub.example.net");
        config.identity.device_id = "zone-7".into();
        assert_eq!(config.username(), "hub.example.net/zone-7/api-version=2018-06-30");
    }

    #[test]
    fn test_credential_redacted() {
        let identity = Identity {
            device_id: "zone-7".into(),
            credential: "hunter2".into(),
        };
        let rendered = format!("{:?}", identity);
        assert!(rendered.contains("zone-7"));
        assert!(!rendered.contains("hunter2"));
    }
}
