// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end controller tests against an in-memory cloud and bus.
//!
//! Timers (the coalescing window, the poll throttle) run on tokio's paused
//! clock and are driven explicitly with `tokio::time::advance`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use msb_bridge::api::{BlindState, BlindsService};
use msb_bridge::bus::{BusEvent, MessageBus, QoS};
use msb_bridge::coalesce::UPDATE_QUEUE_DELAY;
use msb_bridge::controller::{BridgeController, UPDATE_STATE_INTERVAL};
use msb_bridge::error::{Error, ProtocolError};
use msb_bridge::registry::BlindInfo;
use msb_bridge::types::TiltPosition;

const PREFIX: &str = "prefix";
const MAC_1: &str = "XX:XX:XX:XX";
const MAC_2: &str = "YY:YY:YY:YY";

/// In-memory stand-in for the MySmartBlinds cloud.
#[derive(Default)]
struct MockApi {
    blinds: Vec<BlindInfo>,
    state_calls: Mutex<Vec<Vec<String>>>,
    update_calls: Mutex<Vec<(Vec<String>, u16)>>,
}

impl MockApi {
    fn with_office_blinds() -> Self {
        let blind = |id: &str, name: &str| BlindInfo {
            id: id.to_string(),
            name: name.to_string(),
            room: "Office".to_string(),
            battery_level: 99,
        };
        Self {
            blinds: vec![blind(MAC_1, "One"), blind(MAC_2, "Two")],
            ..Self::default()
        }
    }

    fn state_for(id: &str, position: i64) -> BlindState {
        BlindState {
            id: id.to_string(),
            battery_level: 99,
            signal_strength: -75,
            position,
        }
    }
}

#[async_trait]
impl BlindsService for MockApi {
    async fn find_blinds(&self) -> Option<Vec<BlindInfo>> {
        Some(self.blinds.clone())
    }

    async fn get_blinds_state(&self, blinds: &[String]) -> Option<Vec<BlindState>> {
        self.state_calls.lock().push(blinds.to_vec());
        Some(
            blinds
                .iter()
                .map(|id| Self::state_for(id, 120))
                .collect(),
        )
    }

    async fn update_tilt_position(
        &self,
        blinds: &[String],
        position: TiltPosition,
    ) -> Option<Vec<BlindState>> {
        self.update_calls
            .lock()
            .push((blinds.to_vec(), position.value()));
        Some(
            blinds
                .iter()
                .map(|id| Self::state_for(id, i64::from(position.value())))
                .collect(),
        )
    }
}

/// Records bus traffic instead of talking to a broker.
#[derive(Default)]
struct MockBus {
    published: Mutex<Vec<(String, Vec<u8>, bool)>>,
    subscriptions: Mutex<Vec<String>>,
}

impl MockBus {
    fn published(&self) -> Vec<(String, Vec<u8>, bool)> {
        self.published.lock().clone()
    }

    fn clear_published(&self) {
        self.published.lock().clear();
    }
}

#[async_trait]
impl MessageBus for MockBus {
    async fn publish(
        &self,
        topic: &str,
        _qos: QoS,
        retain: bool,
        payload: &[u8],
    ) -> Result<(), ProtocolError> {
        self.published
            .lock()
            .push((topic.to_string(), payload.to_vec(), retain));
        Ok(())
    }

    async fn subscribe(&self, topic: &str, _qos: QoS) -> Result<(), ProtocolError> {
        self.subscriptions.lock().push(topic.to_string());
        Ok(())
    }
}

struct Harness {
    api: Arc<MockApi>,
    bus: Arc<MockBus>,
    events: mpsc::Sender<BusEvent>,
}

impl Harness {
    /// Initializes a controller over the given cloud mock and starts its
    /// event loop.
    async fn start(api: MockApi) -> Self {
        let api = Arc::new(api);
        let bus = Arc::new(MockBus::default());

        let (controller, flush_rx) =
            BridgeController::new(Arc::clone(&api), Arc::clone(&bus), PREFIX);
        controller.initialize().await.unwrap();

        let (events, event_rx) = mpsc::channel(16);
        tokio::spawn(controller.run(event_rx, flush_rx));

        Self { api, bus, events }
    }

    async fn send(&self, topic: &str, payload: &[u8]) {
        self.events
            .send(BusEvent::Message {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            })
            .await
            .unwrap();
    }

    async fn connect(&self) {
        self.events.send(BusEvent::Connected).await.unwrap();
    }
}

/// Lets all ready tasks run without letting the paused clock move.
async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn initialize_fails_with_zero_blinds() {
    let api = Arc::new(MockApi::default());
    let bus = Arc::new(MockBus::default());

    let (controller, _flush_rx) =
        BridgeController::new(Arc::clone(&api), Arc::clone(&bus), PREFIX);

    let err = controller.initialize().await.unwrap_err();
    assert!(matches!(err, Error::NoBlindsFound));

    // Command topics were never subscribed
    assert!(bus.subscriptions.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn connect_announces_subscribes_and_polls() {
    let harness = Harness::start(MockApi::with_office_blinds()).await;

    harness.connect().await;
    settle().await;

    let published = harness.bus.published();
    let availability = published
        .iter()
        .find(|(topic, _, _)| topic == "prefix/availability")
        .unwrap();
    assert_eq!(availability.1, b"online");
    assert!(availability.2, "availability must be retained");

    let subscriptions = harness.bus.subscriptions.lock().clone();
    assert!(subscriptions.contains(&"prefix/refresh".to_string()));
    assert!(subscriptions.contains(&"prefix/+/+/set".to_string()));

    // Connecting triggers an immediate state poll for every known blind
    let state_calls = harness.api.state_calls.lock().clone();
    assert_eq!(state_calls.len(), 1);
    let mut polled = state_calls[0].clone();
    polled.sort();
    assert_eq!(polled, vec![MAC_1.to_string(), MAC_2.to_string()]);

    // The poll result lands as retained state/position per blind
    assert!(
        published
            .iter()
            .any(|(topic, _, retain)| topic == "prefix/office/one/state" && *retain)
    );
    assert!(
        published
            .iter()
            .any(|(topic, _, retain)| topic == "prefix/office/two/position" && *retain)
    );
}

#[tokio::test(start_paused = true)]
async fn refresh_is_throttled_with_trailing_run() {
    let harness = Harness::start(MockApi::with_office_blinds()).await;

    harness.connect().await;
    settle().await;
    assert_eq!(harness.api.state_calls.lock().len(), 1);

    // A burst of refreshes inside the window collapses into one trailing poll
    for _ in 0..3 {
        harness.send("prefix/refresh", b"").await;
    }
    settle().await;
    assert_eq!(harness.api.state_calls.lock().len(), 1);

    tokio::time::advance(UPDATE_STATE_INTERVAL).await;
    settle().await;
    assert_eq!(harness.api.state_calls.lock().len(), 2);

    // After a full idle window the next refresh polls immediately
    tokio::time::advance(UPDATE_STATE_INTERVAL + Duration::from_secs(1)).await;
    harness.send("prefix/refresh", b"").await;
    settle().await;
    assert_eq!(harness.api.state_calls.lock().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn set_command_is_queued_then_flushed() {
    let harness = Harness::start(MockApi::with_office_blinds()).await;

    harness.send("prefix/office/one/set", b"99").await;
    settle().await;

    // Nothing goes out before the coalescing window closes
    assert!(harness.api.update_calls.lock().is_empty());

    tokio::time::advance(UPDATE_QUEUE_DELAY).await;
    settle().await;

    let update_calls = harness.api.update_calls.lock().clone();
    assert_eq!(update_calls, vec![(vec![MAC_1.to_string()], 99)]);

    // The cloud response is mirrored back out, retained
    let published = harness.bus.published();
    let position = published
        .iter()
        .find(|(topic, _, _)| topic == "prefix/office/one/position")
        .unwrap();
    assert_eq!(position.1, b"99");
    assert!(position.2);
}

#[tokio::test(start_paused = true)]
async fn burst_commands_coalesce_with_last_write_wins() {
    let harness = Harness::start(MockApi::with_office_blinds()).await;

    harness.send("prefix/office/one/set", b"99").await;
    harness.send("prefix/office/one/set", b"100").await;
    harness.send("prefix/office/two/set", b"100").await;
    settle().await;

    tokio::time::advance(UPDATE_QUEUE_DELAY).await;
    settle().await;

    let update_calls = harness.api.update_calls.lock().clone();
    assert_eq!(
        update_calls,
        vec![(vec![MAC_1.to_string(), MAC_2.to_string()], 100)]
    );
}

#[tokio::test(start_paused = true)]
async fn same_position_commands_merge_into_one_call() {
    let harness = Harness::start(MockApi::with_office_blinds()).await;

    harness.send("prefix/office/one/set", b"50").await;
    harness.send("prefix/office/two/set", b"50").await;
    settle().await;

    tokio::time::advance(UPDATE_QUEUE_DELAY).await;
    settle().await;

    let update_calls = harness.api.update_calls.lock().clone();
    assert_eq!(
        update_calls,
        vec![(vec![MAC_1.to_string(), MAC_2.to_string()], 50)]
    );

    // Two retained publishes per blind, both reporting an open position
    let published = harness.bus.published();
    for blind in ["one", "two"] {
        let state = published
            .iter()
            .find(|(topic, _, _)| *topic == format!("prefix/office/{blind}/state"))
            .unwrap();
        assert!(state.2);
        let json: serde_json::Value = serde_json::from_slice(&state.1).unwrap();
        assert_eq!(json["position"], 50);
        assert_eq!(json["state"], "open");

        let position = published
            .iter()
            .find(|(topic, _, _)| *topic == format!("prefix/office/{blind}/position"))
            .unwrap();
        assert_eq!(position.1, b"50");
        assert!(position.2);
    }
}

#[tokio::test(start_paused = true)]
async fn commands_in_separate_windows_flush_separately() {
    let harness = Harness::start(MockApi::with_office_blinds()).await;

    harness.send("prefix/office/one/set", b"10").await;
    settle().await;
    tokio::time::advance(UPDATE_QUEUE_DELAY).await;
    settle().await;

    harness.send("prefix/office/one/set", b"20").await;
    settle().await;
    tokio::time::advance(UPDATE_QUEUE_DELAY).await;
    settle().await;

    let update_calls = harness.api.update_calls.lock().clone();
    assert_eq!(
        update_calls,
        vec![
            (vec![MAC_1.to_string()], 10),
            (vec![MAC_1.to_string()], 20),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_position_is_rejected_before_queuing() {
    let harness = Harness::start(MockApi::with_office_blinds()).await;

    harness.send("prefix/office/one/set", b"INVALID_POSITION").await;
    settle().await;
    tokio::time::advance(UPDATE_QUEUE_DELAY).await;
    settle().await;

    assert!(harness.api.update_calls.lock().is_empty());

    // The queue stays usable for the next valid command
    harness.send("prefix/office/one/set", b"42").await;
    settle().await;
    tokio::time::advance(UPDATE_QUEUE_DELAY).await;
    settle().await;

    let update_calls = harness.api.update_calls.lock().clone();
    assert_eq!(update_calls, vec![(vec![MAC_1.to_string()], 42)]);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_position_is_clamped() {
    let harness = Harness::start(MockApi::with_office_blinds()).await;

    harness.send("prefix/office/one/set", b"200").await;
    settle().await;
    tokio::time::advance(UPDATE_QUEUE_DELAY).await;
    settle().await;

    let update_calls = harness.api.update_calls.lock().clone();
    assert_eq!(update_calls, vec![(vec![MAC_1.to_string()], 180)]);
}

#[tokio::test(start_paused = true)]
async fn unroutable_topics_are_ignored() {
    let harness = Harness::start(MockApi::with_office_blinds()).await;
    harness.bus.clear_published();

    harness.send("prefix/garage/one/set", b"50").await;
    harness.send("prefix/office/one/open", b"50").await;
    harness.send("", b"").await;
    settle().await;
    tokio::time::advance(UPDATE_QUEUE_DELAY).await;
    settle().await;

    assert!(harness.api.update_calls.lock().is_empty());
    assert!(harness.bus.published().is_empty());
}
