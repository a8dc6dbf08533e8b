// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire format of the MySmartBlinds cloud API.
//!
//! The cloud exposes a single GraphQL endpoint; the three operations the
//! bridge uses are fixed query strings sent as JSON POST bodies. Responses
//! are converted into the crate's domain types here so nothing GraphQL-shaped
//! leaks past this module.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::api::BlindState;
use crate::registry::BlindInfo;

/// GraphQL mutation setting the tilt position of a set of blinds.
pub const MUTATION_UPDATE_BLINDS_POSITION: &str = "\
mutation UpdateBlindsPosition($blinds: [String], $position: Int!) {
    updateBlindsPosition(encodedMacAddresses: $blinds, position: $position) {
        __typename
        encodedMacAddress
        position
        rssi
        batteryLevel
    }
}";

/// GraphQL query fetching the live state of a set of blinds.
pub const QUERY_GET_BLINDS_STATE: &str = "\
query GetBlindsState($blinds: [String]) {
    blindsState(encodedMacAddresses: $blinds) {
        __typename
        encodedMacAddress
        position
        rssi
        batteryLevel
    }
}";

/// GraphQL query fetching the account's rooms and blinds.
pub const QUERY_GET_USER_INFO: &str = "\
query GetUserInfo {
    user {
        rooms {
            id
            name
            deleted
        }
        blinds {
            name
            encodedMacAddress
            roomId
            deleted
            batteryPercent
        }
    }
}";

/// Request body for the GraphQL endpoint.
#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a> {
    /// The fixed query string.
    pub query: &'a str,
    /// Operation variables; `Value::Null` for variable-free queries.
    pub variables: serde_json::Value,
}

/// Response body of the Auth0 password-grant sign-in.
#[derive(Debug, Deserialize)]
pub struct SignInResponse {
    /// The JWT used as bearer token; absent on a rejected sign-in.
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Response envelope of the `GetUserInfo` query.
#[derive(Debug, Deserialize)]
pub struct GetUserInfoResponse {
    pub data: GetUserInfoData,
}

#[derive(Debug, Deserialize)]
pub struct GetUserInfoData {
    pub user: UserInfo,
}

/// Rooms and blinds configured on the account.
#[derive(Debug, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub rooms: Vec<WireRoom>,
    #[serde(default)]
    pub blinds: Vec<WireBlind>,
}

#[derive(Debug, Deserialize)]
pub struct WireRoom {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBlind {
    pub name: String,
    pub encoded_mac_address: String,
    pub room_id: i64,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub battery_percent: u8,
}

/// Response envelope of the `GetBlindsState` query.
#[derive(Debug, Deserialize)]
pub struct GetBlindsStateResponse {
    pub data: GetBlindsStateData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBlindsStateData {
    #[serde(default)]
    pub blinds_state: Vec<WireBlindState>,
}

/// Response envelope of the `UpdateBlindsPosition` mutation.
#[derive(Debug, Deserialize)]
pub struct UpdateBlindsPositionResponse {
    pub data: UpdateBlindsPositionData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlindsPositionData {
    #[serde(default)]
    pub update_blinds_position: Vec<WireBlindState>,
}

/// Per-blind state as reported by the hub.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBlindState {
    pub encoded_mac_address: String,
    #[serde(default)]
    pub battery_level: u8,
    #[serde(default)]
    pub rssi: i32,
    #[serde(default)]
    pub position: i64,
}

impl From<WireBlindState> for BlindState {
    fn from(wire: WireBlindState) -> Self {
        Self {
            id: wire.encoded_mac_address,
            battery_level: wire.battery_level,
            signal_strength: wire.rssi,
            position: wire.position,
        }
    }
}

/// Flattens a `GetUserInfo` payload into blind snapshots.
///
/// Deleted rooms and blinds are dropped; a blind referencing an unknown room
/// is kept with the room name `unknown`.
#[must_use]
pub fn blinds_from_user_info(user: UserInfo) -> Vec<BlindInfo> {
    let rooms_by_id: HashMap<i64, String> = user
        .rooms
        .into_iter()
        .filter(|room| !room.deleted)
        .map(|room| (room.id, room.name))
        .collect();

    user.blinds
        .into_iter()
        .filter(|blind| !blind.deleted)
        .map(|blind| BlindInfo {
            id: blind.encoded_mac_address,
            name: blind.name,
            room: rooms_by_id
                .get(&blind.room_id)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string()),
            battery_level: blind.battery_percent,
        })
        .collect()
}
