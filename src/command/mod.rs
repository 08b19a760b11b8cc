//! Command handling for inbound broker messages
//!
//! This module handles:
//! - Bounding inbound payloads to the fixed buffer
//! - Resolving command strings to lighting zones
//! - Publishing a verdict reply for every processed command

mod dispatcher;
mod router;

pub use dispatcher::{Dispatch, MessageDispatcher};
pub use router::CommandRouter;
