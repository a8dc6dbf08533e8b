// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the bridge.
//!
//! Fatal conditions (configuration problems, an empty blind discovery) are
//! surfaced through [`Error`] and terminate startup. Per-call protocol
//! failures are handled inside the collaborators and never reach the core
//! as errors; see [`crate::api::BlindsService`].

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing process configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error occurred during protocol communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The account reported no blinds; the bridge cannot route without any.
    #[error("did not find any blinds")]
    NoBlindsFound,
}

/// Errors raised while reading the process configuration.
///
/// All of these are fatal before any connection is attempted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Account username and/or password are not set.
    #[error("missing required username and/or password properties")]
    MissingCredentials,

    /// MQTT broker host is not set.
    #[error("missing required mqtt host property")]
    MissingMqttHost,

    /// MQTT broker address could not be parsed.
    #[error("invalid mqtt host {0:?}")]
    InvalidMqttHost(String),

    /// The topic prefix contains a topic separator.
    #[error("invalid topic prefix {0:?}: must not contain '/'")]
    InvalidPrefix(String),
}

/// Errors related to protocol communication (HTTP/MQTT).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// MQTT connection or communication failed.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The sign-in endpoint did not return a usable token.
    #[error("authentication failed")]
    AuthenticationFailed,
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
