// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Update coalescing for position commands.
//!
//! Set-position commands can arrive from the bus much faster than the cloud
//! should be called. The [`UpdateCoalescer`] buffers them for a short window
//! and merges the burst into the fewest possible outbound calls:
//!
//! - multiple requests for the same blind collapse to the latest one
//!   (last write wins within the window);
//! - blinds whose final target is the same position are combined into a
//!   single call.
//!
//! The merged batches are handed to the consumer over a channel; issuing the
//! actual cloud calls (and dealing with their failures) is the consumer's
//! job. A failed flush is never re-queued.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Delay between the first queued update and the flush.
pub const UPDATE_QUEUE_DELAY: Duration = Duration::from_millis(750);

/// One buffered set-position request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    /// Ids of the blinds addressed by the request.
    pub blind_ids: Vec<String>,
    /// Requested tilt position, not yet clamped.
    pub position: i64,
}

/// One merged outbound call: all blinds that ended up on the same position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateBatch {
    /// Ids of the blinds to move, in first-arrival order.
    pub blind_ids: Vec<String>,
    /// Their shared target position.
    pub position: i64,
}

/// Buffers position requests and flushes them merged after a fixed delay.
///
/// At most one flush timer is armed at a time; a timer is armed only when a
/// request lands in an empty buffer, so a burst never extends the window it
/// started.
#[derive(Debug, Clone)]
pub struct UpdateCoalescer {
    delay: Duration,
    queue: Arc<Mutex<Vec<PendingUpdate>>>,
    flush_tx: mpsc::Sender<Vec<UpdateBatch>>,
}

impl UpdateCoalescer {
    /// Creates a coalescer flushing merged batches into `flush_tx`.
    #[must_use]
    pub fn new(delay: Duration, flush_tx: mpsc::Sender<Vec<UpdateBatch>>) -> Self {
        Self {
            delay,
            queue: Arc::new(Mutex::new(Vec::new())),
            flush_tx,
        }
    }

    /// Queues a set-position request.
    ///
    /// Arms the flush timer when the buffer transitions from empty to
    /// non-empty; otherwise the request just joins the in-flight window.
    pub fn enqueue(&self, blind_ids: Vec<String>, position: i64) {
        let was_empty = {
            let mut queue = self.queue.lock();
            let was_empty = queue.is_empty();
            queue.push(PendingUpdate {
                blind_ids,
                position,
            });
            was_empty
        };

        if was_empty {
            self.arm_timer();
        }
    }

    /// Spawns the one-shot flush task for the window just opened.
    fn arm_timer(&self) {
        let queue = Arc::clone(&self.queue);
        let flush_tx = self.flush_tx.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let drained = std::mem::take(&mut *queue.lock());
            let batches = merge_updates(&drained);
            if batches.is_empty() {
                return;
            }

            tracing::debug!(
                requests = drained.len(),
                batches = batches.len(),
                "Flushing queued blind updates"
            );

            if flush_tx.send(batches).await.is_err() {
                tracing::warn!("Flush channel closed; dropping queued blind updates");
            }
        });
    }

    /// Returns the number of requests currently buffered.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

/// Merges a drained window into one batch per distinct target position.
///
/// Two passes over the requests in arrival order: the first resolves each
/// blind's final position (a later request always overrides an earlier one),
/// the second inverts that map into position groups while keeping ids in
/// first-arrival order.
#[must_use]
pub fn merge_updates(requests: &[PendingUpdate]) -> Vec<UpdateBatch> {
    let mut final_positions: HashMap<&str, i64> = HashMap::new();
    for request in requests {
        for id in &request.blind_ids {
            final_positions.insert(id, request.position);
        }
    }

    let mut grouped: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for request in requests {
        for id in &request.blind_ids {
            if seen.insert(id) {
                let position = final_positions[id.as_str()];
                grouped.entry(position).or_default().push(id.clone());
            }
        }
    }

    grouped
        .into_iter()
        .map(|(position, blind_ids)| UpdateBatch {
            blind_ids,
            position,
        })
        .collect()
}
