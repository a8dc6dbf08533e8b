// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MySmartBlinds cloud client.
//!
//! The cloud offers three operations: list the account's blinds, read live
//! blind state, and set a tilt position. All three ride on one GraphQL
//! endpoint authenticated with an Auth0 password-grant token that this client
//! caches until shortly before it expires.
//!
//! The [`BlindsService`] trait is the seam the bridge core programs against:
//! every call either yields a result or `None` ("service unavailable").
//! Failures are logged here and never propagate upward — the calling flow
//! simply skips its publish for that cycle.

pub mod wire;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, USER_AGENT};

use crate::error::ProtocolError;
use crate::registry::BlindInfo;
use crate::types::TiltPosition;

/// OAuth client id of the MySmartBlinds mobile app.
pub const APP_CLIENT_ID: &str = "1d1c3vuqWtpUt1U577QX5gzCJZzm8WOB";

/// User agent the cloud expects; requests without it are rejected.
const APP_USER_AGENT: &str = "MySmartBlinds/5 CFNetwork/1121.2.2 Darwin/19.3.0";

/// Production sign-in endpoint.
const DEFAULT_AUTH_URL: &str = "https://mysmartblinds.auth0.com/oauth/ro";

/// Production GraphQL endpoint.
const DEFAULT_GRAPHQL_URL: &str = "https://api.mysmartblinds.com/v1/graphql";

/// Token lifetime granted by the sign-in endpoint.
const TOKEN_TTL_HOURS: i64 = 10;

/// Live state of a single blind, as reported by the hub.
///
/// Transient: produced per poll or update response, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlindState {
    /// Unique blind identifier (encoded mac address).
    pub id: String,
    /// Battery percentage, 0-100.
    pub battery_level: u8,
    /// RSSI value.
    pub signal_strength: i32,
    /// Raw tilt position as reported, before normalization.
    pub position: i64,
}

/// Remote blind-control service.
///
/// Calls never fail into the caller: a network, authentication, or response
/// problem is reported as `None` after being logged by the implementation.
#[async_trait]
pub trait BlindsService: Send + Sync {
    /// Finds all available blinds on the account.
    async fn find_blinds(&self) -> Option<Vec<BlindInfo>>;

    /// Gets the current state of the requested blinds.
    async fn get_blinds_state(&self, blinds: &[String]) -> Option<Vec<BlindState>>;

    /// Sets the tilt position of the provided blinds.
    async fn update_tilt_position(
        &self,
        blinds: &[String],
        position: TiltPosition,
    ) -> Option<Vec<BlindState>>;
}

/// Cached sign-in token with its expiry.
#[derive(Debug, Clone)]
struct StoredToken {
    id: String,
    expiry: DateTime<Utc>,
}

/// MySmartBlinds hub connection.
#[derive(Debug)]
pub struct SmartBlindsApi {
    client: reqwest::Client,
    auth_url: String,
    graphql_url: String,
    username: String,
    password: String,
    stored_token: Mutex<Option<StoredToken>>,
}

impl SmartBlindsApi {
    /// Creates a client for the production cloud endpoints.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ProtocolError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(Self {
            client,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            username: username.into(),
            password: password.into(),
            stored_token: Mutex::new(None),
        })
    }

    /// Overrides the cloud endpoints. Intended for tests.
    #[must_use]
    pub fn with_endpoints(
        mut self,
        auth_url: impl Into<String>,
        graphql_url: impl Into<String>,
    ) -> Self {
        self.auth_url = auth_url.into();
        self.graphql_url = graphql_url.into();
        self
    }

    /// Returns the cached token, fetching a fresh one if missing or expired.
    async fn token(&self) -> Result<String, ProtocolError> {
        let now = Utc::now();

        if let Some(token) = self.stored_token.lock().as_ref()
            && token.expiry > now
        {
            tracing::debug!("Using existing auth token");
            return Ok(token.id.clone());
        }

        tracing::info!("Fetching new auth token");
        let token = self.request_token().await?;
        tracing::info!(valid_until = %token.expiry.to_rfc3339(), "Received new token");

        let id = token.id.clone();
        *self.stored_token.lock() = Some(token);
        Ok(id)
    }

    /// Performs the Auth0 password-grant sign-in.
    async fn request_token(&self) -> Result<StoredToken, ProtocolError> {
        let body = serde_json::json!({
            "scope": "openid offline_access",
            "grant_type": "password",
            "client_id": APP_CLIENT_ID,
            "connection": "Username-Password-Authentication",
            "device": "MySmartBlinds MQTT",
            "username": self.username,
            "password": self.password,
        });

        let response = self
            .client
            .post(&self.auth_url)
            .header(USER_AGENT, APP_USER_AGENT)
            .json(&body)
            .send()
            .await
            .map_err(ProtocolError::Http)?
            .error_for_status()
            .map_err(ProtocolError::Http)?
            .json::<wire::SignInResponse>()
            .await
            .map_err(ProtocolError::Http)?;

        let id = response
            .id_token
            .ok_or(ProtocolError::AuthenticationFailed)?;

        Ok(StoredToken {
            id,
            expiry: Utc::now() + Duration::hours(TOKEN_TTL_HOURS),
        })
    }

    /// Sends one GraphQL operation and parses the typed response envelope.
    async fn graphql<T: serde::de::DeserializeOwned>(
        &self,
        query: &'static str,
        variables: serde_json::Value,
    ) -> Result<T, ProtocolError> {
        let token = self.token().await?;

        self.client
            .post(&self.graphql_url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header("auth0-client-id", APP_CLIENT_ID)
            .header(USER_AGENT, APP_USER_AGENT)
            .json(&wire::GraphQlRequest { query, variables })
            .send()
            .await
            .map_err(ProtocolError::Http)?
            .error_for_status()
            .map_err(ProtocolError::Http)?
            .json::<T>()
            .await
            .map_err(ProtocolError::Http)
    }

    async fn request_blinds(&self) -> Result<Vec<BlindInfo>, ProtocolError> {
        tracing::debug!("Searching for blinds");

        let response: wire::GetUserInfoResponse = self
            .graphql(wire::QUERY_GET_USER_INFO, serde_json::Value::Null)
            .await?;

        Ok(wire::blinds_from_user_info(response.data.user))
    }

    async fn request_blinds_state(
        &self,
        blinds: &[String],
    ) -> Result<Vec<BlindState>, ProtocolError> {
        tracing::debug!(count = blinds.len(), "Requesting blinds status");

        let response: wire::GetBlindsStateResponse = self
            .graphql(
                wire::QUERY_GET_BLINDS_STATE,
                serde_json::json!({ "blinds": blinds }),
            )
            .await?;

        Ok(response
            .data
            .blinds_state
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn request_position_update(
        &self,
        blinds: &[String],
        position: TiltPosition,
    ) -> Result<Vec<BlindState>, ProtocolError> {
        let response: wire::UpdateBlindsPositionResponse = self
            .graphql(
                wire::MUTATION_UPDATE_BLINDS_POSITION,
                serde_json::json!({ "position": position.value(), "blinds": blinds }),
            )
            .await?;

        Ok(response
            .data
            .update_blinds_position
            .into_iter()
            .map(Into::into)
            .collect())
    }
}

#[async_trait]
impl BlindsService for SmartBlindsApi {
    async fn find_blinds(&self) -> Option<Vec<BlindInfo>> {
        match self.request_blinds().await {
            Ok(blinds) => Some(blinds),
            Err(error) => {
                tracing::error!(%error, "Failed finding available blinds");
                None
            }
        }
    }

    async fn get_blinds_state(&self, blinds: &[String]) -> Option<Vec<BlindState>> {
        match self.request_blinds_state(blinds).await {
            Ok(states) => Some(states),
            Err(error) => {
                tracing::error!(%error, "Failed getting blinds status");
                None
            }
        }
    }

    async fn update_tilt_position(
        &self,
        blinds: &[String],
        position: TiltPosition,
    ) -> Option<Vec<BlindState>> {
        match self.request_position_update(blinds, position).await {
            Ok(states) => Some(states),
            Err(error) => {
                tracing::error!(%error, "Failed updating blinds position");
                None
            }
        }
    }
}
