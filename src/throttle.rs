// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Leading+trailing throttle for the state poll.
//!
//! The first trigger in an idle period runs immediately; any further
//! triggers inside the window collapse into exactly one trailing run at the
//! window boundary. This is a throttle, not a debounce: a steady stream of
//! triggers still executes once per window.
//!
//! The caller drives the trailing run itself: [`Throttle::decide`] says what
//! to do with a trigger, and after sleeping out a [`Decision::Scheduled`]
//! delay the caller runs the work and reports it via
//! [`Throttle::complete_trailing`].

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// What to do with a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Outside the window: run now.
    Run,
    /// Inside the window, no trailing run armed yet: sleep this long, then
    /// run and call [`Throttle::complete_trailing`].
    Scheduled(Duration),
    /// A trailing run is already armed; this trigger is absorbed by it.
    Pending,
}

#[derive(Debug)]
struct ThrottleState {
    last_run: Option<Instant>,
    trailing: bool,
}

/// Rate limiter with standard leading+trailing throttle semantics.
#[derive(Debug)]
pub struct Throttle {
    window: Duration,
    state: Mutex<ThrottleState>,
}

impl Throttle {
    /// Creates a throttle allowing one execution per `window`.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(ThrottleState {
                last_run: None,
                trailing: false,
            }),
        }
    }

    /// Classifies a trigger.
    ///
    /// On [`Decision::Run`] the execution is accounted immediately; on
    /// [`Decision::Scheduled`] the trailing flag is set and stays set until
    /// [`Throttle::complete_trailing`].
    pub fn decide(&self) -> Decision {
        let mut state = self.state.lock();
        if state.trailing {
            return Decision::Pending;
        }

        let now = Instant::now();
        match state.last_run {
            Some(last) if now.duration_since(last) < self.window => {
                state.trailing = true;
                Decision::Scheduled(self.window - now.duration_since(last))
            }
            _ => {
                state.last_run = Some(now);
                Decision::Run
            }
        }
    }

    /// Records that the trailing run executed and re-opens the throttle.
    pub fn complete_trailing(&self) {
        let mut state = self.state.lock();
        state.trailing = false;
        state.last_run = Some(Instant::now());
    }
}
