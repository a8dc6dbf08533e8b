// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge controller.
//!
//! Wires the bus to the cloud: inbound topics are resolved against the
//! registry and fed to the update coalescer, coalesced flushes become cloud
//! calls, and every cloud response is pushed back out through the state
//! publisher. A throttled poll keeps the published state fresh even without
//! commands.
//!
//! The controller holds no connection state of its own; it reacts to
//! [`BusEvent::Connected`] (also fired on every reconnect) by re-publishing
//! availability and re-subscribing, and treats everything else as traffic.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::api::BlindsService;
use crate::bus::{BusEvent, MessageBus, QoS};
use crate::coalesce::{UPDATE_QUEUE_DELAY, UpdateBatch, UpdateCoalescer};
use crate::error::{Error, Result};
use crate::publisher::StatePublisher;
use crate::registry::BlindRegistry;
use crate::throttle::{Decision, Throttle};
use crate::types::TiltPosition;

/// Minimum interval between two state polls.
pub const UPDATE_STATE_INTERVAL: Duration = Duration::from_secs(10);

/// Payload of the availability topic while the bridge is up.
const ONLINE_PAYLOAD: &[u8] = b"online";

/// Bridges blinds on a MySmartBlinds account onto the message bus.
pub struct BridgeController<S, B> {
    api: Arc<S>,
    bus: Arc<B>,
    prefix: String,
    registry: Arc<RwLock<BlindRegistry>>,
    coalescer: UpdateCoalescer,
    publisher: StatePublisher<B>,
    poll_throttle: Arc<Throttle>,
}

impl<S, B> Clone for BridgeController<S, B> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            bus: Arc::clone(&self.bus),
            prefix: self.prefix.clone(),
            registry: Arc::clone(&self.registry),
            coalescer: self.coalescer.clone(),
            publisher: self.publisher.clone(),
            poll_throttle: Arc::clone(&self.poll_throttle),
        }
    }
}

impl<S, B> BridgeController<S, B>
where
    S: BlindsService + 'static,
    B: MessageBus + 'static,
{
    /// Creates a controller publishing under `prefix`.
    ///
    /// Returns the controller and the receiver carrying coalesced update
    /// flushes; pass the receiver back into [`Self::run`].
    #[must_use]
    pub fn new(
        api: Arc<S>,
        bus: Arc<B>,
        prefix: impl Into<String>,
    ) -> (Self, mpsc::Receiver<Vec<UpdateBatch>>) {
        let prefix = prefix.into();
        let registry = Arc::new(RwLock::new(BlindRegistry::new()));
        let (flush_tx, flush_rx) = mpsc::channel(16);

        let controller = Self {
            api,
            bus: Arc::clone(&bus),
            publisher: StatePublisher::new(bus, prefix.clone(), Arc::clone(&registry)),
            prefix,
            registry,
            coalescer: UpdateCoalescer::new(UPDATE_QUEUE_DELAY, flush_tx),
            poll_throttle: Arc::new(Throttle::new(UPDATE_STATE_INTERVAL)),
        };

        (controller, flush_rx)
    }

    /// Discovers the account's blinds and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoBlindsFound`] if the listing fails or comes back
    /// empty; the bridge cannot route anything without at least one blind
    /// and must not proceed to subscribe to command topics.
    pub async fn initialize(&self) -> Result<()> {
        self.update_available_blinds().await
    }

    /// Requests all available blinds from the hub and rebuilds the registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoBlindsFound`] on a failed or empty listing.
    pub async fn update_available_blinds(&self) -> Result<()> {
        let blinds = self.api.find_blinds().await.unwrap_or_default();
        if blinds.is_empty() {
            tracing::error!("Did not find any blinds; exiting");
            return Err(Error::NoBlindsFound);
        }

        let rebuilt = BlindRegistry::rebuild(blinds);
        tracing::info!(topics = ?rebuilt.topics(&self.prefix), "Registering topics");

        // Swap both indices in at once; readers never see a partial rebuild
        *self.registry.write() = rebuilt;
        Ok(())
    }

    /// Drives the controller until the bus event stream ends.
    pub async fn run(
        self,
        mut bus_events: mpsc::Receiver<BusEvent>,
        mut flush_rx: mpsc::Receiver<Vec<UpdateBatch>>,
    ) {
        loop {
            tokio::select! {
                event = bus_events.recv() => match event {
                    Some(BusEvent::Connected) => self.on_connect().await,
                    Some(BusEvent::Message { topic, payload }) => {
                        self.on_message(&topic, &payload).await;
                    }
                    None => break,
                },
                Some(batches) = flush_rx.recv() => self.apply_updates(batches).await,
            }
        }
        tracing::debug!("Controller event loop stopped");
    }

    /// Announces the bridge and subscribes to its command topics.
    async fn on_connect(&self) {
        let prefix = &self.prefix;

        let availability = format!("{prefix}/availability");
        if let Err(error) = self
            .bus
            .publish(&availability, QoS::AtLeastOnce, true, ONLINE_PAYLOAD)
            .await
        {
            tracing::warn!(%error, "Failed to publish availability");
        }

        if let Err(error) = self
            .bus
            .subscribe(&format!("{prefix}/refresh"), QoS::AtMostOnce)
            .await
        {
            tracing::warn!(%error, "Failed to subscribe to refresh topic");
        }

        // matches "prefix/room_name/blind_name/set"
        if let Err(error) = self
            .bus
            .subscribe(&format!("{prefix}/+/+/set"), QoS::ExactlyOnce)
            .await
        {
            tracing::warn!(%error, "Failed to subscribe to command topics");
        }

        self.update_blinds_state();
    }

    /// Routes one inbound bus message.
    async fn on_message(&self, topic: &str, payload: &[u8]) {
        if topic == format!("{}/refresh", self.prefix) {
            self.update_blinds_state();
            return;
        }

        if let Some(command) = CommandTopic::parse(&self.prefix, topic)
            && command.action == "set"
        {
            let blind_id = {
                let registry = self.registry.read();
                registry
                    .lookup(command.room, command.name)
                    .map(|blind| blind.id.clone())
            };

            if let Some(id) = blind_id {
                let Some(position) = parse_position(payload) else {
                    tracing::warn!(topic = %topic, "Received invalid position; ignoring");
                    return;
                };
                self.coalescer.enqueue(vec![id], position);
                return;
            }
        }

        tracing::warn!(topic = %topic, "No handler for topic");
    }

    /// Triggers a state poll, throttled to [`UPDATE_STATE_INTERVAL`].
    ///
    /// The first trigger in an idle period polls immediately; triggers
    /// inside the window collapse into one trailing poll at the boundary.
    pub fn update_blinds_state(&self) {
        match self.poll_throttle.decide() {
            Decision::Run => {
                let controller = self.clone();
                tokio::spawn(async move {
                    controller.poll_blinds_state().await;
                });
            }
            Decision::Scheduled(delay) => {
                let controller = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    controller.poll_throttle.complete_trailing();
                    controller.poll_blinds_state().await;
                });
            }
            Decision::Pending => {}
        }
    }

    /// Polls the cloud for every known blind and publishes the result.
    async fn poll_blinds_state(&self) {
        tracing::info!("Processing request to get blinds status");

        let blind_ids = { self.registry.read().ids() };
        if let Some(states) = self.api.get_blinds_state(&blind_ids).await {
            self.publisher.publish_states(&states).await;
        }
    }

    /// Issues one cloud call per coalesced batch and publishes the results.
    ///
    /// A failed call is logged by the service and simply yields no publish
    /// for that batch; nothing is re-queued.
    async fn apply_updates(&self, batches: Vec<UpdateBatch>) {
        for batch in batches {
            let position = TiltPosition::clamped(batch.position);
            tracing::info!(
                position = %position,
                blinds = %batch.blind_ids.join(", "),
                "Changing position"
            );

            if let Some(states) = self
                .api
                .update_tilt_position(&batch.blind_ids, position)
                .await
            {
                self.publisher.publish_states(&states).await;
            }
        }
    }
}

/// Command topic split into its segments, prefix already stripped.
#[derive(Debug, PartialEq, Eq)]
struct CommandTopic<'a> {
    room: &'a str,
    name: &'a str,
    action: &'a str,
}

impl<'a> CommandTopic<'a> {
    /// Parses `prefix/room/name/action`; anything else is `None`.
    fn parse(prefix: &str, topic: &'a str) -> Option<Self> {
        let rest = topic.strip_prefix(prefix)?.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let room = parts.next()?;
        let name = parts.next()?;
        let action = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { room, name, action })
    }
}

/// Parses a set-command payload into a raw position.
fn parse_position(payload: &[u8]) -> Option<i64> {
    std::str::from_utf8(payload).ok()?.trim().parse().ok()
}
