// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge daemon entry point.
//!
//! Exit codes: 1 for invalid configuration or a failed startup (including an
//! account with zero blinds), 2 for a user-requested interrupt.

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use msb_bridge::{BridgeConfig, BridgeController, MqttBus, SmartBlindsApi};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "Invalid configuration");
            return ExitCode::from(1);
        }
    };

    let api = match SmartBlindsApi::new(&config.username, &config.password) {
        Ok(api) => Arc::new(api),
        Err(error) => {
            tracing::error!(%error, "Failed to create cloud client");
            return ExitCode::from(1);
        }
    };

    let (bus, bus_events) = MqttBus::connect(
        &config.mqtt_host,
        config.mqtt_port,
        &config.mqtt_prefix,
    );

    let (controller, flush_rx) = BridgeController::new(api, Arc::new(bus), config.mqtt_prefix);

    if let Err(error) = controller.initialize().await {
        tracing::error!(%error, "Startup failed");
        return ExitCode::from(1);
    }

    tokio::select! {
        () = controller.run(bus_events, flush_rx) => ExitCode::SUCCESS,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted; shutting down");
            ExitCode::from(2)
        }
    }
}
