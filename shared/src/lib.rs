//! Zone Lighting Shared Protocol Types
//!
//! This crate provides the topic layout, reply format, zone vocabulary and the
//! bounded inbound buffer shared by the zone controller and its tests.

pub mod buffer;
pub mod state_machine;

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub use buffer::{BufferError, CommandString, InboundBuffer};
pub use state_machine::{ConnectionState, LinkStatus};

/// Get current timestamp in seconds since Unix epoch
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Protocol parameters for the broker link
pub mod protocol {
    /// Secure MQTT port on the broker
    pub const SECURE_PORT: u16 = 8883;

    /// API version suffix appended to the MQTT username
    pub const API_VERSION: &str = "2018-06-30";

    /// Default inbound buffer capacity in bytes
    pub const DEFAULT_BUFFER_CAPACITY: usize = 256;

    /// Fixed delay between connection attempts
    pub const RECONNECT_DELAY_MS: u64 = 5000;

    /// Reply preamble, followed by the verbatim command
    pub const REPLY_PREAMBLE: &str = "the command string <";

    /// Text between the command and the verdict
    pub const REPLY_INFIX: &str = "> was ";

    pub const VERDICT_SUCCESS: &str = "processed successfully";
    pub const VERDICT_FAILURE: &str = "processed unsuccessfully";
}

/// Per-device MQTT topic names
pub mod topics {
    /// Wildcard subscription for cloud-to-device commands
    pub fn inbound(device_id: &str) -> String {
        format!("devices/{}/messages/devicebound/#", device_id)
    }

    /// Device-to-cloud event topic used for replies
    pub fn outbound(device_id: &str) -> String {
        format!("devices/{}/messages/events/", device_id)
    }
}

/// Build the MQTT username `{broker}/{device}/api-version=...`
pub fn mqtt_username(broker_host: &str, device_id: &str) -> String {
    format!(
        "{}/{}/api-version={}",
        broker_host,
        device_id,
        protocol::API_VERSION
    )
}

/// A physical lighting zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneSelector {
    Zone1,
    Zone2,
    Zone3,
    Zone4,
}

impl ZoneSelector {
    /// Every known zone, in table order
    pub const ALL: [ZoneSelector; 4] = [
        ZoneSelector::Zone1,
        ZoneSelector::Zone2,
        ZoneSelector::Zone3,
        ZoneSelector::Zone4,
    ];

    /// Command word that selects this zone
    pub fn command(&self) -> &'static str {
        match self {
            ZoneSelector::Zone1 => "Zone1",
            ZoneSelector::Zone2 => "Zone2",
            ZoneSelector::Zone3 => "Zone3",
            ZoneSelector::Zone4 => "Zone4",
        }
    }
}

impl fmt::Display for ZoneSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// Human-readable verdict text
pub fn verdict_text(understood: bool) -> &'static str {
    if understood {
        protocol::VERDICT_SUCCESS
    } else {
        protocol::VERDICT_FAILURE
    }
}

/// Build the reply payload for a processed command.
///
/// The command bytes are copied verbatim, so payloads that are not valid
/// UTF-8 are echoed back unchanged.
pub fn reply_payload(command: &[u8], understood: bool) -> Bytes {
    let verdict = verdict_text(understood);
    let mut buf = BytesMut::with_capacity(
        protocol::REPLY_PREAMBLE.len() + command.len() + protocol::REPLY_INFIX.len() + verdict.len(),
    );
    buf.put_slice(protocol::REPLY_PREAMBLE.as_bytes());
    buf.put_slice(command);
    buf.put_slice(protocol::REPLY_INFIX.as_bytes());
    buf.put_slice(verdict.as_bytes());
    buf.freeze()
}
