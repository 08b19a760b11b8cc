//! Message dispatcher - bounds, routes and answers inbound messages

use super::router::CommandRouter;
use crate::actuation::ActuationLayer;
use crate::transport::{InboundMessage, MessagingSession};
use tracing::{debug, info, warn};
use zonelight_shared::{reply_payload, verdict_text, BufferError, InboundBuffer};

/// Outcome of handling one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing left to read (already drained duplicate notification)
    Empty,
    /// Payload exceeded the buffer; drained and dropped without reply
    Oversized { len: usize },
    /// Command routed and reply published
    Processed { understood: bool },
}

/// Owns the inbound buffer and the router; handles one message at a time
pub struct MessageDispatcher<A> {
    buffer: InboundBuffer,
    router: CommandRouter<A>,
    outbound_topic: String,
}

impl<A: ActuationLayer> MessageDispatcher<A> {
    pub fn new(capacity: usize, router: CommandRouter<A>, outbound_topic: String) -> Self {
        Self {
            buffer: InboundBuffer::with_capacity(capacity),
            router,
            outbound_topic,
        }
    }

    #[cfg(test)]
    pub fn buffer(&self) -> &InboundBuffer {
        &self.buffer
    }

    #[cfg(test)]
    pub fn router(&self) -> &CommandRouter<A> {
        &self.router
    }

    /// Handle one inbound message and publish the reply.
    ///
    /// The reply is fire-and-forget: a failed publish is logged and only
    /// surfaces as a dropped session on the next connectivity check.
    pub async fn on_message<S: MessagingSession>(
        &mut self,
        message: &mut InboundMessage,
        session: &mut S,
    ) -> Dispatch {
        let len = message.available();
        info!("Received a message with topic '{}', length {}", message.topic(), len);

        if len == 0 {
            debug!("Nothing in message buffer");
            return Dispatch::Empty;
        }

        match self.buffer.fill_from(message.payload_mut(), len) {
            Ok(_) => {}
            Err(e @ BufferError::Overflow { .. }) => {
                let drained = message.drain();
                warn!("Incoming message too large, dropped: {} ({} bytes drained)", e, drained);
                return Dispatch::Oversized { len };
            }
            Err(e) => {
                let drained = message.drain();
                warn!("Incoming message unreadable, dropped: {} ({} bytes drained)", e, drained);
                return Dispatch::Empty;
            }
        }

        let command = self.buffer.command();
        let understood = self.router.route(command);

        if understood {
            info!("Command <{}> {}", command, verdict_text(understood));
        } else {
            warn!("the command string <{}> did not equate to any known operation", command);
        }

        let reply = reply_payload(command.as_bytes(), understood);
        if let Err(e) = session.publish(&self.outbound_topic, reply).await {
            warn!("Failed to publish reply: {:#}", e);
        }

        Dispatch::Processed { understood }
    }
}
