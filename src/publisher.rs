// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Publishing blind state to the bus.
//!
//! Every state reported by the cloud is normalized (position snapping,
//! battery default) and emitted twice per blind: the full state as retained
//! JSON on `{prefix}/{room}/{name}/state`, and the bare position as a
//! retained integer string on `{prefix}/{room}/{name}/position`. Retention
//! means a late subscriber immediately sees the last known state.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::api::BlindState;
use crate::bus::{MessageBus, QoS};
use crate::registry::{BlindRegistry, normalize_segment};
use crate::types::{BlindTilt, TiltPosition};

/// Battery level substituted for a reported 0.
///
/// The hub does not always report a battery level; a literal 0 is
/// indistinguishable from "not reported" and would trip low-battery alarms
/// in downstream consumers such as Home Assistant.
pub const DEFAULT_BATTERY_LEVEL: u8 = 20;

/// Replaces an unreported battery level with [`DEFAULT_BATTERY_LEVEL`].
#[must_use]
pub const fn normalize_battery(level: u8) -> u8 {
    if level == 0 { DEFAULT_BATTERY_LEVEL } else { level }
}

/// JSON payload of the per-blind state topic.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatePayload<'a> {
    id: &'a str,
    battery_level: u8,
    signal_strength: i32,
    position: TiltPosition,
    state: BlindTilt,
}

/// Publishes normalized blind states through the registry's topic mapping.
#[derive(Debug)]
pub struct StatePublisher<B> {
    bus: Arc<B>,
    prefix: String,
    registry: Arc<RwLock<BlindRegistry>>,
}

impl<B> Clone for StatePublisher<B> {
    fn clone(&self) -> Self {
        Self {
            bus: Arc::clone(&self.bus),
            prefix: self.prefix.clone(),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<B: MessageBus> StatePublisher<B> {
    /// Creates a publisher emitting under `prefix`.
    #[must_use]
    pub fn new(bus: Arc<B>, prefix: impl Into<String>, registry: Arc<RwLock<BlindRegistry>>) -> Self {
        Self {
            bus,
            prefix: prefix.into(),
            registry,
        }
    }

    /// Publishes state and position messages for every resolvable blind.
    ///
    /// States whose id is not in the registry are logged and skipped; one
    /// unknown blind never aborts the rest of the batch. Publish failures
    /// are best-effort: logged, then on to the next blind.
    pub async fn publish_states(&self, states: &[BlindState]) {
        for state in states {
            // Resolve under the read guard, then publish without holding it
            let segments = {
                let registry = self.registry.read();
                registry
                    .lookup_by_id(&state.id)
                    .map(|blind| (normalize_segment(&blind.room), normalize_segment(&blind.name)))
            };

            let Some((room, name)) = segments else {
                tracing::error!(id = %state.id, "Ignoring update received for an unknown blind");
                continue;
            };

            let position = TiltPosition::normalized(state.position);
            let payload = StatePayload {
                id: &state.id,
                battery_level: normalize_battery(state.battery_level),
                signal_strength: state.signal_strength,
                position,
                state: position.tilt(),
            };

            let body = match serde_json::to_vec(&payload) {
                Ok(body) => body,
                Err(error) => {
                    tracing::error!(%error, id = %state.id, "Failed to encode state payload");
                    continue;
                }
            };

            let prefix = &self.prefix;
            let state_topic = format!("{prefix}/{room}/{name}/state");
            if let Err(error) = self.bus.publish(&state_topic, QoS::AtMostOnce, true, &body).await {
                tracing::warn!(%error, topic = %state_topic, "Failed to publish state");
            }

            let position_topic = format!("{prefix}/{room}/{name}/position");
            if let Err(error) = self
                .bus
                .publish(
                    &position_topic,
                    QoS::AtMostOnce,
                    true,
                    position.to_string().as_bytes(),
                )
                .await
            {
                tracing::warn!(%error, topic = %position_topic, "Failed to publish position");
            }
        }
    }
}
