//! Command router - maps command strings to zone selections

use crate::actuation::ActuationLayer;
use zonelight_shared::{CommandString, ZoneSelector};

/// Recognized commands. Matching is exact and case-sensitive.
const COMMAND_TABLE: &[(&str, ZoneSelector)] = &[
    ("Zone1", ZoneSelector::Zone1),
    ("Zone2", ZoneSelector::Zone2),
    ("Zone3", ZoneSelector::Zone3),
    ("Zone4", ZoneSelector::Zone4),
];

/// Routes commands to the actuation layer
pub struct CommandRouter<A> {
    actuator: A,
}

impl<A: ActuationLayer> CommandRouter<A> {
    pub fn new(actuator: A) -> Self {
        Self { actuator }
    }

    #[cfg(test)]
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Resolve a command to a zone without acting on it.
    ///
    /// Trailing whitespace, control bytes and NULs are ignored: transport
    /// payloads may carry a newline or a terminator. Anything else must match
    /// a table entry exactly.
    pub fn resolve(command: CommandString<'_>) -> Option<ZoneSelector> {
        let text = trim_transport_tail(command.as_bytes());
        if text.is_empty() {
            return None;
        }

        COMMAND_TABLE
            .iter()
            .find(|(word, _)| word.as_bytes() == text)
            .map(|(_, zone)| *zone)
    }

    /// Act on a command. Returns whether it was understood and acted on.
    pub fn route(&mut self, command: CommandString<'_>) -> bool {
        match Self::resolve(command) {
            Some(zone) => self.actuator.highlight_zone(zone),
            None => false,
        }
    }
}

fn trim_transport_tail(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !(b.is_ascii_whitespace() || b.is_ascii_control()))
        .map_or(0, |i| i + 1);
    &bytes[..end]
}
