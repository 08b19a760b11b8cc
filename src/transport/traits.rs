//! Trait seams for the network radio, the clock and the secure messaging layer

use crate::transport::InboundMessage;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// The network layer (radio association)
#[async_trait]
pub trait NetworkLink: Send {
    /// Attempt one association, returning once connected or failed
    async fn associate(&mut self) -> Result<()>;

    /// Whether the link is currently associated
    fn is_connected(&self) -> bool;

    /// Check that an associated link still works, dropping the association
    /// if it does not
    async fn recheck(&mut self) -> Result<()> {
        Ok(())
    }

    /// Drop the association
    async fn disconnect(&mut self);

    /// Human-readable name for this link
    fn name(&self) -> &'static str;
}

/// Wall-clock source used to check server certificate validity
pub trait TimeSource: Send + Sync + std::fmt::Debug {
    /// Current time in seconds since the Unix epoch, if known
    fn now_unix_secs(&self) -> Option<u64>;
}

/// An authenticated messaging-layer session over the secure channel
#[async_trait]
pub trait MessagingSession: Send {
    /// Perform the handshake and authenticated connect
    async fn connect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    async fn subscribe(&mut self, topic: &str) -> Result<()>;

    /// Poll once for inbound activity and keep-alives.
    ///
    /// Returns `Ok(None)` when nothing arrived within the poll window. An
    /// error means the session dropped.
    async fn poll(&mut self) -> Result<Option<InboundMessage>>;

    /// Queue one message for publishing, without retry
    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<()>;

    async fn disconnect(&mut self);
}
