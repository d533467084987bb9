//! Poll Registry and Expiry Scheduler
//!
//! ```text
//! ┌──────────────────────── PollRegistry ────────────────────────┐
//! │  RwLock<HashMap<PollId, PollHandle>>                         │
//! │        │                                                     │
//! │        ├── poll-1 ──► Arc<PollSlot>   (one lock per poll)    │
//! │        ├── poll-2 ──► Arc<PollSlot>                          │
//! │        └── ...                                               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The map lock is only held to look up, insert or remove a handle. All
//! reads and writes of a poll's tallies happen under that poll's own mutex,
//! so votes on different polls never wait on each other.
//!
//! Each slot also carries a push gate: the revision of the last view sent to
//! the poll's message. Surface edits for one poll go through the gate one at
//! a time and a view older than the last one sent is dropped, so a slow vote
//! update can never land on top of the final results.

pub mod scheduler;

pub use scheduler::ExpiryScheduler;

use ballot_core::{Poll, PollError, PollId, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// One registered poll with its lock and push gate
#[derive(Debug)]
pub struct PollSlot {
    poll: Mutex<Poll>,
    pushed: Mutex<u64>,
}

impl PollSlot {
    pub fn new(poll: Poll) -> Self {
        let revision = poll.revision();
        Self {
            poll: Mutex::new(poll),
            pushed: Mutex::new(revision),
        }
    }

    /// Exclusive access to the poll state
    pub async fn lock(&self) -> MutexGuard<'_, Poll> {
        self.poll.lock().await
    }

    /// Exclusive right to edit the poll's message. Holds the revision of the
    /// last view sent.
    pub async fn push_gate(&self) -> MutexGuard<'_, u64> {
        self.pushed.lock().await
    }
}

/// Shared, individually locked poll
pub type PollHandle = Arc<PollSlot>;

/// Store of active polls keyed by ID
#[derive(Default)]
pub struct PollRegistry {
    polls: RwLock<HashMap<PollId, PollHandle>>,
}

impl PollRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a poll. Fails if the ID is already taken.
    pub async fn create(&self, poll: Poll) -> Result<PollHandle> {
        let id = poll.id().clone();
        let mut polls = self.polls.write().await;
        if polls.contains_key(&id) {
            tracing::error!(poll_id = %id, "duplicate poll id");
            return Err(PollError::DuplicatePoll(id));
        }
        let handle = Arc::new(PollSlot::new(poll));
        polls.insert(id, handle.clone());
        Ok(handle)
    }

    pub async fn get(&self, id: &PollId) -> Option<PollHandle> {
        self.polls.read().await.get(id).cloned()
    }

    /// Remove a poll. Absent IDs are a no-op; only one caller ever gets the
    /// handle back.
    pub async fn remove(&self, id: &PollId) -> Option<PollHandle> {
        self.polls.write().await.remove(id)
    }

    pub async fn contains(&self, id: &PollId) -> bool {
        self.polls.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.polls.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.polls.read().await.is_empty()
    }

    /// IDs of all registered polls, sorted
    pub async fn ids(&self) -> Vec<PollId> {
        let mut ids: Vec<PollId> = self.polls.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_core::{apply_vote, PollDraft, PollRequest, UserId};
    use chrono::{DateTime, Utc};

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn poll(id: &str) -> Poll {
        let draft = PollDraft::parse(&PollRequest::new("Q", "a,b,c"), None).unwrap();
        Poll::new(PollId::new(id), UserId::new("creator"), draft, now()).unwrap()
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let registry = PollRegistry::new();
        assert!(registry.is_empty().await);

        registry.create(poll("poll-1")).await.unwrap();
        let id = PollId::new("poll-1");
        assert!(registry.contains(&id).await);
        assert!(registry.get(&id).await.is_some());
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove(&id).await.is_some());
        assert!(registry.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let registry = PollRegistry::new();
        registry.create(poll("poll-1")).await.unwrap();

        let err = registry.create(poll("poll-1")).await.unwrap_err();
        assert_eq!(err, PollError::DuplicatePoll(PollId::new("poll-1")));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = PollRegistry::new();
        registry.create(poll("poll-1")).await.unwrap();
        let id = PollId::new("poll-1");

        assert!(registry.remove(&id).await.is_some());
        assert!(registry.remove(&id).await.is_none());
        assert!(registry.remove(&PollId::new("never")).await.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let registry = PollRegistry::new();
        assert!(registry.get(&PollId::new("nope")).await.is_none());
        assert!(registry.ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_push_gate_starts_at_poll_revision() {
        let registry = PollRegistry::new();
        let handle = registry.create(poll("poll-1")).await.unwrap();
        assert_eq!(*handle.push_gate().await, 0);

        let mut gate = handle.push_gate().await;
        *gate = 3;
        drop(gate);
        assert_eq!(*handle.push_gate().await, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_votes_on_one_poll_are_serialized() {
        let registry = Arc::new(PollRegistry::new());
        let handle = registry.create(poll("poll-1")).await.unwrap();

        let mut tasks = Vec::new();
        for n in 0..64 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                let user = UserId::new(format!("user-{}", n));
                let mut poll = handle.lock().await;
                apply_vote(&mut poll, &user, n % 3, now()).unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let poll = handle.lock().await;
        assert_eq!(poll.total_votes(), 64);
        assert!(poll.check_invariants());
    }
}
