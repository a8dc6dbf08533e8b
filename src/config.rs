// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process configuration.
//!
//! The bridge is configured entirely through environment variables:
//!
//! | Variable      | Required | Meaning                                    |
//! |---------------|----------|--------------------------------------------|
//! | `MSB_USER`    | yes      | MySmartBlinds account username             |
//! | `MSB_PASS`    | yes      | MySmartBlinds account password             |
//! | `MQTT_HOST`   | yes      | Broker address (`mqtt://host[:port]`)      |
//! | `MQTT_PREFIX` | no       | Topic prefix (default `mysmartblinds`)     |
//!
//! Any missing required variable or invalid value is a fatal startup error.

use std::env;

use crate::error::ConfigError;

/// Validated bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// MySmartBlinds account username.
    pub username: String,
    /// MySmartBlinds account password.
    pub password: String,
    /// MQTT broker hostname or IP address.
    pub mqtt_host: String,
    /// MQTT broker port.
    pub mqtt_port: u16,
    /// Topic prefix under which all bridge topics live.
    pub mqtt_prefix: String,
}

impl BridgeConfig {
    /// Default topic prefix.
    pub const DEFAULT_PREFIX: &'static str = "mysmartblinds";

    /// Builds a configuration from explicit values.
    ///
    /// `mqtt_host` accepts `mqtt://host:port`, `tcp://host:port`, or a bare
    /// host (default port 1883). An empty `prefix` falls back to
    /// [`Self::DEFAULT_PREFIX`].
    ///
    /// # Errors
    ///
    /// Returns error if credentials or host are empty, the host cannot be
    /// parsed, or the prefix contains a topic separator.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        mqtt_host: &str,
        prefix: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() || password.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }

        if mqtt_host.is_empty() {
            return Err(ConfigError::MissingMqttHost);
        }
        let (mqtt_host, mqtt_port) = parse_mqtt_url(mqtt_host)?;

        let mut prefix = prefix.into();
        if prefix.is_empty() {
            prefix = Self::DEFAULT_PREFIX.to_string();
        }
        if prefix.contains('/') {
            return Err(ConfigError::InvalidPrefix(prefix));
        }

        Ok(Self {
            username,
            password,
            mqtt_host,
            mqtt_port,
            mqtt_prefix: prefix,
        })
    }

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns error if a required variable is missing or a value fails
    /// validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let username = env::var("MSB_USER").unwrap_or_default();
        let password = env::var("MSB_PASS").unwrap_or_default();
        let mqtt_host = env::var("MQTT_HOST").unwrap_or_default();
        let prefix = env::var("MQTT_PREFIX").unwrap_or_default();

        Self::new(username, password, &mqtt_host, prefix)
    }
}

/// Parses an MQTT URL into host and port.
fn parse_mqtt_url(url: &str) -> Result<(String, u16), ConfigError> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    if stripped.is_empty() {
        return Err(ConfigError::InvalidMqttHost(url.to_string()));
    }

    let (host, port) = if let Some((h, p)) = stripped.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| ConfigError::InvalidMqttHost(url.to_string()))?;
        (h.to_string(), port)
    } else {
        (stripped.to_string(), 1883)
    };

    Ok((host, port))
}
