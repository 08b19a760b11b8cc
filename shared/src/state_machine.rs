//! Connection State Machine
//!
//! The connection state is never stored. It is derived from the two
//! independently observable layers:
//!
//! ```text
//! Disconnected --radio associated--> NetworkUp --handshake+connect+subscribe--> SessionUp
//!      ^                                 |  ^                                      |
//!      +----------- network lost --------+  +------------- session lost -----------+
//! ```

/// Derived connectivity state of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    NetworkUp,
    SessionUp,
}

/// Snapshot of both layer flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub network_up: bool,
    pub session_up: bool,
}

impl LinkStatus {
    pub fn new(network_up: bool, session_up: bool) -> Self {
        Self {
            network_up,
            session_up,
        }
    }

    /// Derive the connection state.
    ///
    /// A session reported up while the network is down counts as
    /// `Disconnected`: the session cannot outlive its transport.
    pub fn state(&self) -> ConnectionState {
        match (self.network_up, self.session_up) {
            (false, _) => ConnectionState::Disconnected,
            (true, false) => ConnectionState::NetworkUp,
            (true, true) => ConnectionState::SessionUp,
        }
    }
}

impl ConnectionState {
    /// Whether inbound messages may be dispatched in this state
    pub fn can_dispatch(&self) -> bool {
        matches!(self, ConnectionState::SessionUp)
    }
}

/// Check if a transition between two derived states is valid
pub fn is_valid_transition(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;

    match (from, to) {
        (a, b) if a == b => true,

        // Forward, one layer at a time
        (Disconnected, NetworkUp) => true,
        (NetworkUp, SessionUp) => true,

        // Layer drops
        (SessionUp, NetworkUp) => true,
        (SessionUp | NetworkUp, Disconnected) => true,

        _ => false,
    }
}
