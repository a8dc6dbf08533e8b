// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Message-bus transport over MQTT.
//!
//! One persistent broker connection carries everything the bridge publishes
//! and subscribes to. Connection lifecycle is pushed to the controller as
//! [`BusEvent`]s: the controller reacts to `Connected` (publish availability,
//! re-subscribe, poll) and otherwise just consumes messages.
//!
//! Reconnection is handled here by simply continuing to poll the rumqttc
//! event loop after a fixed delay; the broker sees the registered last will
//! and marks the bridge offline while it is gone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet};
use tokio::sync::mpsc;

pub use rumqttc::QoS;

use crate::error::ProtocolError;

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Delay before re-polling the event loop after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Payload of the availability last will.
pub const OFFLINE_PAYLOAD: &str = "offline";

/// Connection lifecycle and inbound traffic, in delivery order.
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// The broker acknowledged the connection (initial connect or reconnect).
    Connected,
    /// A message arrived on a subscribed topic.
    Message {
        /// Full topic the message was published on.
        topic: String,
        /// Raw message payload.
        payload: Vec<u8>,
    },
}

/// Publish/subscribe surface the bridge core programs against.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes a payload to a topic.
    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: &[u8],
    ) -> Result<(), ProtocolError>;

    /// Subscribes to a topic filter.
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), ProtocolError>;
}

/// MQTT bus connection backed by rumqttc.
#[derive(Debug, Clone)]
pub struct MqttBus {
    client: AsyncClient,
}

impl MqttBus {
    /// Opens the broker connection and starts its event loop.
    ///
    /// Registers a retained last will of [`OFFLINE_PAYLOAD`] on
    /// `{prefix}/availability` so consumers see the bridge go offline even
    /// on an unclean disconnect. Returns immediately; the first
    /// [`BusEvent::Connected`] on the returned receiver signals that the
    /// broker accepted the session.
    #[must_use]
    pub fn connect(host: &str, port: u16, prefix: &str) -> (Self, mpsc::Receiver<BusEvent>) {
        let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let client_id = format!("msb_bridge_{}_{}", std::process::id(), counter);

        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_session(true);
        options.set_last_will(LastWill::new(
            format!("{prefix}/availability"),
            OFFLINE_PAYLOAD,
            QoS::AtLeastOnce,
            true,
        ));

        let (client, event_loop) = AsyncClient::new(options, 10);
        let (event_tx, event_rx) = mpsc::channel(64);

        tokio::spawn(async move {
            drive_event_loop(event_loop, event_tx).await;
        });

        (Self { client }, event_rx)
    }
}

#[async_trait]
impl MessageBus for MqttBus {
    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: &[u8],
    ) -> Result<(), ProtocolError> {
        tracing::debug!(topic = %topic, retain, "Publishing bus message");
        self.client
            .publish(topic, qos, retain, payload)
            .await
            .map_err(ProtocolError::Mqtt)
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), ProtocolError> {
        tracing::debug!(topic = %topic, "Subscribing to bus topic");
        self.client
            .subscribe(topic, qos)
            .await
            .map_err(ProtocolError::Mqtt)
    }
}

/// Polls the rumqttc event loop forever, forwarding what the bridge cares
/// about and riding out connection errors.
async fn drive_event_loop(mut event_loop: EventLoop, event_tx: mpsc::Sender<BusEvent>) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("Connected to home automation mqtt broker");
                if event_tx.send(BusEvent::Connected).await.is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let event = BusEvent::Message {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(error) => {
                tracing::error!(%error, "MQTT connection error; reconnecting");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
    tracing::debug!("Bus event loop stopped");
}
