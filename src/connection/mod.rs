//! Connection management for the network and messaging layers
//!
//! This module handles:
//! - Associating the network link, retrying until it comes up
//! - Establishing the authenticated messaging session
//! - Resubscribing to the command topic after every new session
//! - Pluggable retry policies with an optional attempt ceiling

mod manager;
mod retry;

pub use manager::SessionManager;
pub use retry::{Backoff, RetryPolicy};
