// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory registry of discovered blinds.
//!
//! The registry indexes every known blind twice: by its unique id and by its
//! normalized (room, name) pair, which doubles as the blind's topic address.
//! Both indices are built together from one discovery result and swapped in
//! wholesale; nothing is ever patched incrementally, so a removed or renamed
//! blind can never linger as a stale entry.

use std::collections::HashMap;

/// A single blind as configured on the account.
///
/// Immutable snapshot; replaced wholesale on each discovery refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlindInfo {
    /// Unique blind identifier (encoded mac address).
    pub id: String,
    /// Blind name configured in the app.
    pub name: String,
    /// Name of the room where the blind resides.
    pub room: String,
    /// Battery percentage, 0-100.
    pub battery_level: u8,
}

/// Normalizes a room or blind name into a topic segment.
///
/// Lower-cases the name and turns every run of whitespace into a single `_`.
/// The topic separator `/` is treated like whitespace so a segment can never
/// split a topic level.
#[must_use]
pub fn normalize_segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_sep = false;
    for ch in name.chars() {
        if ch.is_whitespace() || ch == '/' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.extend(ch.to_lowercase());
            prev_sep = false;
        }
    }
    out
}

/// Registry of known blinds, indexed by id and by (room, name).
#[derive(Debug, Default)]
pub struct BlindRegistry {
    by_id: HashMap<String, BlindInfo>,
    by_room: HashMap<String, HashMap<String, BlindInfo>>,
}

impl BlindRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds both indices from a discovery result.
    ///
    /// The caller swaps the returned registry in whole, so readers never see
    /// a half-rebuilt index.
    #[must_use]
    pub fn rebuild(blinds: Vec<BlindInfo>) -> Self {
        let mut registry = Self::new();
        for blind in blinds {
            let room = normalize_segment(&blind.room);
            let name = normalize_segment(&blind.name);
            registry
                .by_room
                .entry(room)
                .or_default()
                .insert(name, blind.clone());
            registry.by_id.insert(blind.id.clone(), blind);
        }
        registry
    }

    /// Looks up a blind by normalized room and name segments.
    #[must_use]
    pub fn lookup(&self, room: &str, name: &str) -> Option<&BlindInfo> {
        self.by_room.get(room)?.get(name)
    }

    /// Looks up a blind by its unique id.
    #[must_use]
    pub fn lookup_by_id(&self, id: &str) -> Option<&BlindInfo> {
        self.by_id.get(id)
    }

    /// Returns the ids of all known blinds.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.by_id.keys().cloned().collect()
    }

    /// Returns the command topic of every known blind under `prefix`.
    #[must_use]
    pub fn topics(&self, prefix: &str) -> Vec<String> {
        self.by_id
            .values()
            .map(|blind| {
                format!(
                    "{prefix}/{}/{}/",
                    normalize_segment(&blind.room),
                    normalize_segment(&blind.name)
                )
            })
            .collect()
    }

    /// Returns the number of known blinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns whether the registry holds no blinds.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
