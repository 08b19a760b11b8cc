//! Session manager: keeps the network link and the messaging session up

use super::retry::{ConnectError, Layer, RetryPolicy};
use crate::transport::{InboundMessage, MessagingSession, NetworkLink};
use tracing::{debug, error, info, warn};
use zonelight_shared::state_machine::is_valid_transition;
use zonelight_shared::{ConnectionState, LinkStatus};

/// Drives reconnection of both layers and resubscription on every new session
pub struct SessionManager<N, S> {
    network: N,
    session: S,
    policy: RetryPolicy,
    inbound_topic: String,
    last_state: ConnectionState,
    sessions_established: u64,
}

impl<N: NetworkLink, S: MessagingSession> SessionManager<N, S> {
    pub fn new(network: N, session: S, policy: RetryPolicy, inbound_topic: String) -> Self {
        Self {
            network,
            session,
            policy,
            inbound_topic,
            last_state: ConnectionState::Disconnected,
            sessions_established: 0,
        }
    }

    /// Derived connection state
    pub fn state(&self) -> ConnectionState {
        LinkStatus::new(self.network.is_connected(), self.session.is_connected()).state()
    }

    /// Number of sessions established (and subscribed) so far
    #[cfg(test)]
    pub fn sessions_established(&self) -> u64 {
        self.sessions_established
    }

    #[cfg(test)]
    pub fn network(&self) -> &N {
        &self.network
    }

    #[cfg(test)]
    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Make sure both layers are up.
    ///
    /// Returns immediately without any network action when already fully
    /// connected. With an unbounded policy this only returns once the session
    /// is up and subscribed.
    pub async fn ensure_connected(&mut self) -> Result<(), ConnectError> {
        self.observe_state();

        if !self.network.is_connected() {
            self.connect_network().await?;

            // A session from before the link drop cannot be trusted
            if self.session.is_connected() {
                debug!("Discarding session left over from previous link");
                self.session.disconnect().await;
            }
            self.observe_state();
        }

        if !self.session.is_connected() {
            self.connect_session().await?;
            self.observe_state();
        }

        Ok(())
    }

    /// Poll the messaging layer once.
    ///
    /// A poll failure marks the session down; it is re-established by the
    /// next `ensure_connected`.
    pub async fn poll(&mut self) -> Option<InboundMessage> {
        if !self.state().can_dispatch() {
            return None;
        }

        match self.session.poll().await {
            Ok(message) => message,
            Err(e) => {
                warn!("Messaging session lost: {:#}", e);
                self.observe_state();
                None
            }
        }
    }

    async fn connect_network(&mut self) -> Result<(), ConnectError> {
        let mut attempts = self.policy.attempts();

        loop {
            match self.network.associate().await {
                Ok(()) => {
                    info!("Connected to the network via {} link", self.network.name());
                    return Ok(());
                }
                Err(e) => {
                    warn!("Network connect attempt failed: {:#}", e);
                    match attempts.record_failure() {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => {
                            return Err(ConnectError::AttemptsExhausted {
                                layer: Layer::Network,
                                attempts: attempts.made(),
                            })
                        }
                    }
                }
            }
        }
    }

    async fn connect_session(&mut self) -> Result<(), ConnectError> {
        let mut attempts = self.policy.attempts();

        loop {
            match self.establish_session().await {
                Ok(()) => {
                    self.sessions_established += 1;
                    info!(
                        "Connected to the broker (session #{}), subscribed to {}",
                        self.sessions_established, self.inbound_topic
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!("Connecting to broker failed: {:#}", e);
                    let delay = attempts.record_failure();

                    // A failed session is the first sign of a lost link
                    if let Err(e) = self.network.recheck().await {
                        warn!("Network link lost: {:#}", e);
                        self.observe_state();
                        self.connect_network().await?;
                        self.observe_state();
                    }

                    match delay {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => {
                            return Err(ConnectError::AttemptsExhausted {
                                layer: Layer::Session,
                                attempts: attempts.made(),
                            })
                        }
                    }
                }
            }
        }
    }

    /// Handshake, authenticated connect and subscribe, as one unit
    async fn establish_session(&mut self) -> anyhow::Result<()> {
        self.session.connect().await?;
        if let Err(e) = self.session.subscribe(&self.inbound_topic).await {
            self.session.disconnect().await;
            return Err(e.context("subscribe to command topic"));
        }
        Ok(())
    }

    fn observe_state(&mut self) {
        let state = self.state();
        if state == self.last_state {
            return;
        }
        if is_valid_transition(self.last_state, state) {
            info!("Connection state: {:?} -> {:?}", self.last_state, state);
        } else {
            error!(
                "Unexpected connection state change: {:?} -> {:?}",
                self.last_state, state
            );
        }
        self.last_state = state;
    }
}
