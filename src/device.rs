//! Device loop and boot sequence

use crate::actuation::{ActuationLayer, ZoneLightingController};
use crate::command::{CommandRouter, Dispatch, MessageDispatcher};
use crate::config::{CertificateRequest, DeviceConfig};
use crate::connection::SessionManager;
use crate::security::{DeviceCertificate, FileSecureElement, SecureElement};
use crate::transport::{
    tls, HostNetworkLink, MessagingSession, MqttSession, MqttSettings, NetworkLink, SystemClock,
    TimeSource,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use zonelight_shared::topics;

/// The host build of the device
pub type HostDevice = Device<HostNetworkLink, MqttSession, ZoneLightingController>;

/// One connectivity manager plus one dispatcher, driven strictly in sequence
pub struct Device<N, S, A> {
    manager: SessionManager<N, S>,
    dispatcher: MessageDispatcher<A>,
    /// Pause after a bounded retry policy gives up
    give_up_pause: Duration,
}

impl<N, S, A> Device<N, S, A>
where
    N: NetworkLink,
    S: MessagingSession,
    A: ActuationLayer,
{
    pub fn new(
        manager: SessionManager<N, S>,
        dispatcher: MessageDispatcher<A>,
        give_up_pause: Duration,
    ) -> Self {
        Self {
            manager,
            dispatcher,
            give_up_pause,
        }
    }

    #[cfg(test)]
    pub fn manager(&self) -> &SessionManager<N, S> {
        &self.manager
    }

    #[cfg(test)]
    pub fn dispatcher(&self) -> &MessageDispatcher<A> {
        &self.dispatcher
    }

    /// One scheduling tick: connect if needed, poll, dispatch.
    ///
    /// Returns the dispatch outcome when a message was handled.
    pub async fn tick(&mut self) -> Option<Dispatch> {
        if let Err(e) = self.manager.ensure_connected().await {
            warn!("{}", e);
            tokio::time::sleep(self.give_up_pause).await;
            return None;
        }

        let mut message = self.manager.poll().await?;
        let outcome = self
            .dispatcher
            .on_message(&mut message, self.manager.session_mut())
            .await;
        Some(outcome)
    }

    /// Run forever
    pub async fn run(&mut self) {
        loop {
            self.tick().await;
        }
    }
}

/// Initialize the lights and read the identity out of the secure element.
///
/// Any error here is boot-fatal.
pub fn prepare_hardware<A, E>(
    actuator: &mut A,
    element: &mut E,
    request: &CertificateRequest,
) -> Result<DeviceCertificate>
where
    A: ActuationLayer,
    E: SecureElement,
{
    actuator
        .initialize()
        .context("Zone lighting failed to initialize")?;
    element.begin().context("No secure element present")?;

    let cert = element
        .reconstruct_certificate(request)
        .context("Failed to reconstruct device certificate")?;
    info!(
        "Device certificate ready: CN={} (key slot {}, storage slot {}, {} years, chain of {})",
        cert.common_name(),
        request.key_slot,
        request.storage_slot,
        cert.validity_years(),
        cert.chain_len()
    );
    Ok(cert)
}

/// Bring up the host device from its configuration
pub async fn boot(config: &DeviceConfig) -> Result<HostDevice> {
    // Leaves a window to reflash before hardware is touched
    tokio::time::sleep(config.boot_delay).await;

    let mut lights = ZoneLightingController::new();
    let mut element = FileSecureElement::new(&config.secure_element_dir);
    let device_cert = prepare_hardware(&mut lights, &mut element, &config.certificate)?;

    let clock: Arc<dyn TimeSource> = Arc::new(SystemClock);
    let roots = tls::root_store(config.broker_ca.as_deref())?;
    let tls_config = tls::client_config(roots, device_cert, clock)?;

    let username = config.username();
    info!("Client id: {}", config.identity.device_id);
    info!("Username: {}", username);

    let session = MqttSession::new(MqttSettings {
        client_id: config.identity.device_id.clone(),
        host: config.endpoint.host.clone(),
        port: config.endpoint.port,
        username,
        password: config.identity.credential.clone(),
        keep_alive: config.keep_alive,
        poll_interval: config.poll_interval,
        connect_timeout: config.connect_timeout,
        tls: tls_config,
    });
    let network = HostNetworkLink::new(config.wifi.clone(), config.endpoint.clone());

    let manager = SessionManager::new(
        network,
        session,
        config.retry.clone(),
        topics::inbound(&config.identity.device_id),
    );
    let dispatcher = MessageDispatcher::new(
        config.buffer_capacity,
        CommandRouter::new(lights),
        topics::outbound(&config.identity.device_id),
    );

    Ok(Device::new(manager, dispatcher, config.retry.backoff.delay(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Backoff, RetryPolicy};
    use crate::testing::{MockNetwork, MockSession, RecordingActuator};
    use zonelight_shared::{ConnectionState, ZoneSelector};

    const DEVICE_ID: &str = "zone-test";

    fn device(session: MockSession) -> Device<MockNetwork, MockSession, RecordingActuator> {
        let manager = SessionManager::new(
            MockNetwork::failing(1),
            session,
            RetryPolicy::forever(Duration::from_millis(1)),
            topics::inbound(DEVICE_ID),
        );
        let dispatcher = MessageDispatcher::new(
            256,
            CommandRouter::new(RecordingActuator::default()),
            topics::outbound(DEVICE_ID),
        );
        Device::new(manager, dispatcher, Duration::from_millis(1))
    }

    fn replies(device: &Device<MockNetwork, MockSession, RecordingActuator>) -> Vec<String> {
        device
            .manager()
            .session()
            .published
            .iter()
            .map(|(_, payload)| String::from_utf8_lossy(payload).into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_scenario_known_zone() {
        let mut session = MockSession::failing(1);
        session.push_inbound("Zone1");
        let mut device = device(session);

        let outcome = device.tick().await;

        assert_eq!(outcome, Some(Dispatch::Processed { understood: true }));
        assert_eq!(device.manager().state(), ConnectionState::SessionUp);
        assert_eq!(
            device.manager().session().subscriptions,
            vec!["devices/zone-test/messages/devicebound/#".to_string()]
        );
        assert_eq!(
            device.dispatcher().router().actuator().highlighted,
            vec![ZoneSelector::Zone1]
        );
        assert_eq!(
            replies(&device),
            vec!["the command string <Zone1> was processed successfully"]
        );
        assert_eq!(
            device.manager().session().published[0].0,
            "devices/zone-test/messages/events/"
        );
    }

    #[tokio::test]
    async fn test_scenario_unknown_zone() {
        let mut session = MockSession::default();
        session.push_inbound("Zone9");
        let mut device = device(session);

        assert_eq!(
            device.tick().await,
            Some(Dispatch::Processed { understood: false })
        );
        assert!(device.dispatcher().router().actuator().highlighted.is_empty());
        assert_eq!(
            replies(&device),
            vec!["the command string <Zone9> was processed unsuccessfully"]
        );
    }

    #[tokio::test]
    async fn test_scenario_oversized() {
        let mut session = MockSession::default();
        session.push_inbound(vec![b'A'; 300]);
        let mut device = device(session);

        assert_eq!(device.tick().await, Some(Dispatch::Oversized { len: 300 }));
        assert!(device.dispatcher().buffer().is_empty());
        assert!(replies(&device).is_empty());
    }

    #[tokio::test]
    async fn test_scenario_empty_payload() {
        let mut session = MockSession::default();
        session.push_inbound(Vec::new());
        let mut device = device(session);

        assert_eq!(device.tick().await, Some(Dispatch::Empty));
        assert!(device.dispatcher().buffer().is_empty());
        assert!(replies(&device).is_empty());
    }

    #[tokio::test]
    async fn test_messages_processed_in_order_across_reconnect() {
        let mut session = MockSession::default();
        session.push_inbound("Zone2");
        session.push_inbound("Zone3");
        let mut device = device(session);

        device.tick().await;
        device.manager.session_mut().drop_on_poll = true;
        assert_eq!(device.tick().await, None);
        device.tick().await;

        assert_eq!(device.manager().sessions_established(), 2);
        assert_eq!(
            device.dispatcher().router().actuator().highlighted,
            vec![ZoneSelector::Zone2, ZoneSelector::Zone3]
        );
        assert_eq!(device.manager().session().subscriptions.len(), 2);
    }

    #[tokio::test]
    async fn test_bounded_policy_gives_up_and_tries_again() {
        let manager = SessionManager::new(
            MockNetwork::failing(3),
            MockSession::default(),
            RetryPolicy {
                backoff: Backoff::Fixed(Duration::from_millis(1)),
                max_attempts: Some(2),
            },
            topics::inbound(DEVICE_ID),
        );
        let dispatcher = MessageDispatcher::new(
            256,
            CommandRouter::new(RecordingActuator::default()),
            topics::outbound(DEVICE_ID),
        );
        let mut device = Device::new(manager, dispatcher, Duration::from_millis(1));

        assert_eq!(device.tick().await, None);
        assert_eq!(device.manager().state(), ConnectionState::Disconnected);

        device.tick().await;
        assert_eq!(device.manager().state(), ConnectionState::SessionUp);
    }

    #[test]
    fn test_boot_fails_without_secure_element() {
        let mut actuator = RecordingActuator::default();
        let mut element = FileSecureElement::new("/nonexistent/zone-element");

        let result = prepare_hardware(&mut actuator, &mut element, &CertificateRequest::default());

        assert!(result.is_err());
        assert!(actuator.initialized);
    }

    #[test]
    fn test_boot_fails_when_lights_do_not_initialize() {
        let mut actuator = RecordingActuator {
            fail_init: true,
            ..Default::default()
        };
        let mut element = FileSecureElement::new("/nonexistent/zone-element");

        let err = prepare_hardware(&mut actuator, &mut element, &CertificateRequest::default())
            .expect_err("init failure is fatal");
        assert!(err.to_string().contains("Zone lighting"));
    }
}
