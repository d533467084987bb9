//! Expiry Scheduler - one-shot timer per poll
//!
//! Each armed poll gets a tokio task that sleeps for the poll's remaining
//! open time and then runs the closure task it was given. A fired timer
//! disarms itself before running, so the closure it starts can never be
//! aborted by its own `cancel`. Timers use tokio time, which tests pause and
//! advance instead of sleeping.

use ballot_core::PollId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Pending expiry timers keyed by poll
#[derive(Default, Clone)]
pub struct ExpiryScheduler {
    timers: Arc<Mutex<HashMap<PollId, JoinHandle<()>>>>,
}

impl ExpiryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once `delay` has elapsed. Re-arming a poll replaces its
    /// previous timer.
    pub fn arm<F>(&self, id: PollId, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let timers = Arc::clone(&self.timers);
        let mut map = self.timers.lock().unwrap_or_else(PoisonError::into_inner);

        // Hold the map lock across spawn so the entry exists before the
        // timer can try to disarm it.
        let key = id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            timers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
            tracing::debug!(poll_id = %key, "expiry timer fired");
            task.await;
        });

        if let Some(previous) = map.insert(id, handle) {
            previous.abort();
        }
    }

    /// Abort a pending timer. Returns false when nothing was armed.
    pub fn cancel(&self, id: &PollId) -> bool {
        let removed = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match removed {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, id: &PollId) -> bool {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Polls with a pending timer, sorted
    pub fn pending(&self) -> Vec<PollId> {
        let mut ids: Vec<PollId> = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Abort every pending timer
    pub fn shutdown(&self) {
        let drained: Vec<JoinHandle<()>> = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        for handle in drained {
            handle.abort();
        }
    }
}
