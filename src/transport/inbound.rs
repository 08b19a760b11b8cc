//! Inbound message as delivered by the messaging layer

use bytes::{Buf, Bytes};

/// A received message whose payload is consumed like a stream
#[derive(Debug, Clone)]
pub struct InboundMessage {
    topic: String,
    payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Payload bytes not yet consumed
    pub fn available(&self) -> usize {
        self.payload.remaining()
    }

    /// Readable payload, advanced by whoever copies out of it
    pub fn payload_mut(&mut self) -> &mut Bytes {
        &mut self.payload
    }

    /// Discard the rest of the payload, returning how many bytes were dropped
    pub fn drain(&mut self) -> usize {
        let dropped = self.payload.remaining();
        self.payload.advance(dropped);
        dropped
    }
}
