//! MQTT session over the secure channel

use crate::transport::traits::MessagingSession;
use crate::transport::InboundMessage;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::tokio_rustls::rustls::ClientConfig;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration,
    Transport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Request channel capacity between client handle and event loop
const REQUEST_CAPACITY: usize = 10;

/// Everything needed to open an authenticated session
#[derive(Clone)]
pub struct MqttSettings {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub keep_alive: Duration,
    /// Upper bound for one poll of the event loop
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub tls: Arc<ClientConfig>,
}

impl MqttSettings {
    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options
            .set_credentials(self.username.clone(), self.password.clone())
            .set_keep_alive(self.keep_alive)
            .set_clean_session(true)
            .set_transport(Transport::tls_with_config(TlsConfiguration::Rustls(
                self.tls.clone(),
            )));
        options
    }
}

/// rumqttc-backed messaging session.
///
/// A fresh client and event loop are created on every `connect`; a dropped
/// session is only noticed by the next `poll`.
pub struct MqttSession {
    settings: MqttSettings,
    client: Option<AsyncClient>,
    eventloop: Option<EventLoop>,
    connected: bool,
}

impl MqttSession {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            client: None,
            eventloop: None,
            connected: false,
        }
    }

    fn mark_down(&mut self) {
        self.connected = false;
        self.client = None;
        self.eventloop = None;
    }
}

#[async_trait]
impl MessagingSession for MqttSession {
    async fn connect(&mut self) -> Result<()> {
        self.mark_down();
        info!(
            "Attempting MQTT broker: {}:{}",
            self.settings.host, self.settings.port
        );

        let (client, mut eventloop) = AsyncClient::new(self.settings.options(), REQUEST_CAPACITY);

        loop {
            match timeout(self.settings.connect_timeout, eventloop.poll()).await {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    if ack.code != ConnectReturnCode::Success {
                        bail!("Broker refused connection: {:?}", ack.code);
                    }
                    break;
                }
                Ok(Ok(event)) => {
                    debug!("Connect handshake event: {:?}", event);
                }
                Ok(Err(e)) => {
                    return Err(anyhow!(e).context("MQTT connect failed"));
                }
                Err(_) => {
                    bail!(
                        "MQTT connect timed out after {:?}",
                        self.settings.connect_timeout
                    );
                }
            }
        }

        self.client = Some(client);
        self.eventloop = Some(eventloop);
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| anyhow!("Subscribe without a session"))?;
        client.subscribe(topic, QoS::AtMostOnce).await?;
        Ok(())
    }

    async fn poll(&mut self) -> Result<Option<InboundMessage>> {
        let Some(eventloop) = self.eventloop.as_mut() else {
            return Ok(None);
        };

        match timeout(self.settings.poll_interval, eventloop.poll()).await {
            // Nothing within the poll window
            Err(_) => Ok(None),
            Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                Ok(Some(InboundMessage::new(publish.topic, publish.payload)))
            }
            Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                self.mark_down();
                bail!("Broker closed the session")
            }
            Ok(Ok(_)) => Ok(None),
            Ok(Err(e)) => {
                self.mark_down();
                Err(anyhow!(e).context("MQTT session dropped"))
            }
        }
    }

    /// Never waits on the request queue. The event loop only drains it
    /// during `poll`, on this same task, so a full queue drops the message.
    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<()> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| anyhow!("Publish without a session"))?;
        client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| anyhow!("Message dropped, request queue full or closed: {}", e))
    }

    async fn disconnect(&mut self) {
        if let Some(client) = self.client.as_ref() {
            if let Err(e) = client.try_disconnect() {
                warn!("MQTT disconnect request failed: {}", e);
            }
        }
        self.mark_down();
    }
}
