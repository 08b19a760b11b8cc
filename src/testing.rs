//! Recording test doubles for the external collaborators

use crate::actuation::ActuationLayer;
use crate::transport::{InboundMessage, MessagingSession, NetworkLink};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use zonelight_shared::ZoneSelector;

/// Network link that fails a set number of times before associating
#[derive(Debug, Default)]
pub struct MockNetwork {
    pub fail_next: u32,
    pub associate_calls: u32,
    pub recheck_calls: u32,
    /// Next recheck reports the link gone
    pub lose_on_recheck: bool,
    pub connected: bool,
}

impl MockNetwork {
    pub fn failing(times: u32) -> Self {
        Self {
            fail_next: times,
            ..Default::default()
        }
    }
}

#[async_trait]
impl NetworkLink for MockNetwork {
    async fn associate(&mut self) -> Result<()> {
        self.associate_calls += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            bail!("radio not associated");
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn recheck(&mut self) -> Result<()> {
        self.recheck_calls += 1;
        if self.lose_on_recheck {
            self.lose_on_recheck = false;
            self.connected = false;
            bail!("link lost");
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Messaging session that records subscriptions and publishes
#[derive(Debug, Default)]
pub struct MockSession {
    pub fail_next: u32,
    /// Subscribe failures to report before subscribing succeeds
    pub fail_subscribe: u32,
    pub connect_calls: u32,
    pub disconnect_calls: u32,
    pub connected: bool,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Bytes)>,
    pub inbound: VecDeque<InboundMessage>,
    /// Next poll reports a dropped session
    pub drop_on_poll: bool,
}

impl MockSession {
    pub fn failing(times: u32) -> Self {
        Self {
            fail_next: times,
            ..Default::default()
        }
    }

    pub fn push_inbound(&mut self, payload: impl Into<Bytes>) {
        self.inbound.push_back(InboundMessage::new(
            "devices/zone-test/messages/devicebound/cmd",
            payload,
        ));
    }
}

#[async_trait]
impl MessagingSession for MockSession {
    async fn connect(&mut self) -> Result<()> {
        self.connect_calls += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            bail!("handshake failed");
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        if !self.connected {
            bail!("not connected");
        }
        if self.fail_subscribe > 0 {
            self.fail_subscribe -= 1;
            bail!("subscribe rejected");
        }
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    async fn poll(&mut self) -> Result<Option<InboundMessage>> {
        if self.drop_on_poll {
            self.drop_on_poll = false;
            self.connected = false;
            return Err(anyhow!("connection reset"));
        }
        Ok(self.inbound.pop_front())
    }

    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<()> {
        if !self.connected {
            bail!("not connected");
        }
        self.published.push((topic.to_string(), payload));
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.disconnect_calls += 1;
        self.connected = false;
    }
}

/// Actuation layer that records every highlight call
#[derive(Debug, Default)]
pub struct RecordingActuator {
    pub initialized: bool,
    pub fail_init: bool,
    pub highlighted: Vec<ZoneSelector>,
}

impl ActuationLayer for RecordingActuator {
    fn initialize(&mut self) -> Result<()> {
        if self.fail_init {
            bail!("driver missing");
        }
        self.initialized = true;
        Ok(())
    }

    fn highlight_zone(&mut self, zone: ZoneSelector) -> bool {
        self.highlighted.push(zone);
        true
    }
}
