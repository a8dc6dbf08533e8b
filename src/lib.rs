// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge exposing MySmartBlinds window blinds over MQTT.
//!
//! The MySmartBlinds cloud only speaks a vendor API; this crate mirrors each
//! blind onto a topic tree so home-automation platforms can observe and
//! control them with plain pub/sub:
//!
//! | Topic                        | Direction  | Payload                    |
//! |------------------------------|------------|----------------------------|
//! | `{prefix}/availability`      | published  | `online` / `offline`       |
//! | `{prefix}/refresh`           | subscribed | ignored                    |
//! | `{prefix}/{room}/{name}/set` | subscribed | target position `0`-`180`  |
//! | `{prefix}/{room}/{name}/state` | published | JSON blind state, retained |
//! | `{prefix}/{room}/{name}/position` | published | position, retained     |
//!
//! Rapid position commands are coalesced for a short window before the cloud
//! is called: the latest command per blind wins, and blinds heading to the
//! same position share one call. State polls are throttled to once per ten
//! seconds no matter how often a refresh is requested.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use msb_bridge::{BridgeConfig, BridgeController, MqttBus, SmartBlindsApi};
//!
//! #[tokio::main]
//! async fn main() -> msb_bridge::Result<()> {
//!     let config = BridgeConfig::from_env()?;
//!
//!     let api = Arc::new(SmartBlindsApi::new(&config.username, &config.password)?);
//!     let (bus, bus_events) = MqttBus::connect(
//!         &config.mqtt_host,
//!         config.mqtt_port,
//!         &config.mqtt_prefix,
//!     );
//!
//!     let (controller, flush_rx) =
//!         BridgeController::new(api, Arc::new(bus), config.mqtt_prefix);
//!     controller.initialize().await?;
//!     controller.run(bus_events, flush_rx).await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bus;
pub mod coalesce;
pub mod config;
pub mod controller;
pub mod error;
pub mod publisher;
pub mod registry;
pub mod throttle;
pub mod types;

pub use api::{BlindState, BlindsService, SmartBlindsApi};
pub use bus::{BusEvent, MessageBus, MqttBus};
pub use coalesce::{UPDATE_QUEUE_DELAY, UpdateBatch, UpdateCoalescer};
pub use config::BridgeConfig;
pub use controller::{BridgeController, UPDATE_STATE_INTERVAL};
pub use error::{ConfigError, Error, ProtocolError, Result};
pub use publisher::StatePublisher;
pub use registry::{BlindInfo, BlindRegistry};
pub use types::{BlindTilt, TiltPosition};
