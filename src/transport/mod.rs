pub mod inbound;
pub mod mqtt;
pub mod network;
pub mod tls;
pub mod traits;

pub use inbound::InboundMessage;
pub use mqtt::{MqttSession, MqttSettings};
pub use network::{HostNetworkLink, SystemClock};
pub use traits::{MessagingSession, NetworkLink, TimeSource};
