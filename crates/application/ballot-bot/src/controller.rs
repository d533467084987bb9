//! Lifecycle Controller
//!
//! ```text
//!   create_poll ──► [Open] ──vote/unvote──► [Open]
//!                     │
//!        expiry timer │ end_poll (admin/creator) │ vote after expiry
//!                     ▼
//!                  close() ──► [Closed]  (removed from the registry)
//! ```
//!
//! Every path into Closed goes through [`LifecycleController::close`]. It
//! claims the poll by removing it from the registry, so whichever caller
//! removes it first does the work and everyone else gets `None`.
//!
//! Message edits are sent after the poll lock is released, through the
//! slot's push gate. Views carry the poll revision they were rendered at and
//! a view older than the last one sent is dropped, so the final results are
//! always the last thing written to a closed poll's message.

use crate::access::AccessPolicy;
use crate::surface::RenderSurface;
use ballot_config::BotConfig;
use ballot_core::{
    apply_vote, render, render_results, Clock, MessageRef, Poll, PollDraft, PollError, PollId,
    PollRequest, Result, SystemClock, Toggle, UserId, ViewPayload, Viewer, VoteButtonId,
};
use ballot_registry::{ExpiryScheduler, PollRegistry, PollSlot};
use std::sync::Arc;
use std::time::Duration;

/// A freshly published poll
#[derive(Debug, Clone)]
pub struct PollCreated {
    pub id: PollId,
    pub message: MessageRef,
    pub view: ViewPayload,
    pub expires_in: Option<Duration>,
}

/// Result of one vote click, for the voter's private reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteReceipt {
    pub poll_id: PollId,
    pub option: usize,
    pub label: String,
    pub toggle: Toggle,
}

impl VoteReceipt {
    pub fn message(&self) -> String {
        match self.toggle {
            Toggle::On => format!("You voted for: {}", self.label),
            Toggle::Off => format!("You unvoted for: {}", self.label),
        }
    }
}

/// What an end-poll request achieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOutcome {
    Closed(ViewPayload),
    /// Another path (usually the expiry timer) closed it first
    AlreadyClosed,
}

/// Coordinates registry, scheduler, renderer and surface
#[derive(Clone)]
pub struct LifecycleController {
    registry: Arc<PollRegistry>,
    scheduler: ExpiryScheduler,
    surface: Arc<dyn RenderSurface>,
    access: Arc<dyn AccessPolicy>,
    clock: Arc<dyn Clock>,
    default_max_votes: Option<u8>,
}

impl LifecycleController {
    pub fn new(surface: Arc<dyn RenderSurface>, access: Arc<dyn AccessPolicy>) -> Self {
        Self {
            registry: Arc::new(PollRegistry::new()),
            scheduler: ExpiryScheduler::new(),
            surface,
            access,
            clock: Arc::new(SystemClock),
            default_max_votes: None,
        }
    }

    /// Build from configuration, using its admin list as the access policy
    pub fn from_config(config: &BotConfig, surface: Arc<dyn RenderSurface>) -> Self {
        let access = Arc::new(crate::access::AdminList::from_config(config));
        Self::new(surface, access).with_default_max_votes(config.default_max_votes)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_default_max_votes(mut self, default_max_votes: Option<u8>) -> Self {
        self.default_max_votes = default_max_votes;
        self
    }

    pub fn registry(&self) -> &Arc<PollRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &ExpiryScheduler {
        &self.scheduler
    }

    /// Validate, register, publish and (if timed) arm expiry.
    ///
    /// The poll is registered before publishing so a duplicate ID fails
    /// without posting anything; a failed publish unregisters it again.
    pub async fn create_poll(
        &self,
        creator: &UserId,
        request_id: &str,
        request: &PollRequest,
    ) -> Result<PollCreated> {
        let draft = PollDraft::parse(request, self.default_max_votes)?;
        let id = PollId::from_request(request_id);

        let now = self.clock.now();
        let poll = Poll::new(id.clone(), creator.clone(), draft, now)?;
        let view = render(&poll, Viewer::Public, now);
        let expires_in = poll.remaining(now);
        let options = poll.options().len();

        let handle = self.registry.create(poll).await?;

        let message = match self.surface.publish(&view).await {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(poll_id = %id, error = %e, "failed to publish poll");
                self.registry.remove(&id).await;
                return Err(PollError::Surface(e.to_string()));
            }
        };
        handle.lock().await.set_message(message.clone());

        if let Some(delay) = expires_in {
            self.arm_expiry(id.clone(), delay);
        }

        tracing::info!(
            poll_id = %id,
            creator = %creator,
            options,
            expires_in_secs = expires_in.map(|d| d.as_secs()),
            "poll created"
        );

        Ok(PollCreated {
            id,
            message,
            view,
            expires_in,
        })
    }

    /// Toggle one vote and push the refreshed public view
    pub async fn vote(&self, user: &UserId, button: &VoteButtonId) -> Result<VoteReceipt> {
        let handle = self
            .registry
            .get(&button.poll_id)
            .await
            .ok_or(PollError::PollNotFound)?;
        let now = self.clock.now();

        let applied = {
            let mut poll = handle.lock().await;
            apply_vote(&mut poll, user, button.option, now).map(|toggle| {
                let label = poll.option_label(button.option).unwrap_or_default().to_string();
                let view = render(&poll, Viewer::Public, now);
                (toggle, label, view, poll.message().cloned(), poll.revision())
            })
        };

        match applied {
            Ok((toggle, label, view, message, revision)) => {
                tracing::debug!(
                    poll_id = %button.poll_id,
                    user = %user,
                    option = button.option,
                    ?toggle,
                    "vote applied"
                );
                self.push(&handle, &button.poll_id, message.as_ref(), &view, revision)
                    .await;
                Ok(VoteReceipt {
                    poll_id: button.poll_id.clone(),
                    option: button.option,
                    label,
                    toggle,
                })
            }
            Err(PollError::PollExpired) => {
                tracing::warn!(poll_id = %button.poll_id, "vote after expiry, closing poll");
                self.close(&button.poll_id).await;
                Err(PollError::PollExpired)
            }
            Err(e) => {
                tracing::debug!(poll_id = %button.poll_id, user = %user, error = %e, "vote rejected");
                Err(e)
            }
        }
    }

    /// Full counts and voters, for an administrator only
    pub async fn admin_results(&self, actor: &UserId, id: &PollId) -> Result<ViewPayload> {
        if !self.access.is_admin(actor) {
            return Err(PollError::Forbidden);
        }
        let handle = self.registry.get(id).await.ok_or(PollError::PollNotFound)?;
        let poll = handle.lock().await;
        if poll.is_closed() {
            return Err(PollError::PollNotFound);
        }
        Ok(render(&poll, Viewer::Admin, self.clock.now()))
    }

    /// Close a poll early, for an administrator or the poll's creator
    pub async fn end_poll(&self, actor: &UserId, id: &PollId) -> Result<EndOutcome> {
        let handle = self.registry.get(id).await.ok_or(PollError::PollNotFound)?;
        let creator = handle.lock().await.creator().clone();
        if &creator != actor && !self.access.is_admin(actor) {
            return Err(PollError::Forbidden);
        }

        Ok(match self.close(id).await {
            Some(view) => EndOutcome::Closed(view),
            None => EndOutcome::AlreadyClosed,
        })
    }

    /// Finalize a poll: remove it, render results, push them.
    ///
    /// Returns `None` when the poll is not registered (already closed or
    /// never existed).
    pub async fn close(&self, id: &PollId) -> Option<ViewPayload> {
        let handle = self.registry.remove(id).await?;
        self.scheduler.cancel(id);

        let (view, message, revision, total, open_secs) = {
            let mut poll = handle.lock().await;
            poll.close();
            (
                render_results(&poll),
                poll.message().cloned(),
                poll.revision(),
                poll.total_votes(),
                (self.clock.now() - poll.created_at()).num_seconds(),
            )
        };

        tracing::info!(poll_id = %id, total_votes = total, open_secs, "poll closed");
        self.push(&handle, id, message.as_ref(), &view, revision).await;
        Some(view)
    }

    /// IDs of open polls
    pub async fn active_polls(&self) -> Vec<PollId> {
        self.registry.ids().await
    }

    /// Drop all pending expiry timers (polls stay registered)
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    fn arm_expiry(&self, id: PollId, delay: Duration) {
        let controller = self.clone();
        let key = id.clone();
        self.scheduler.arm(id, delay, async move {
            controller.close(&key).await;
        });
    }

    /// Send `view` (rendered at `revision`) to the poll's message unless a
    /// newer view already went out
    async fn push(
        &self,
        slot: &PollSlot,
        id: &PollId,
        message: Option<&MessageRef>,
        view: &ViewPayload,
        revision: u64,
    ) {
        let Some(message) = message else {
            return;
        };
        let mut pushed = slot.push_gate().await;
        if revision <= *pushed {
            tracing::debug!(poll_id = %id, revision, latest = *pushed, "dropping stale view");
            return;
        }
        *pushed = revision;
        if let Err(e) = self.surface.update(message, view).await {
            tracing::warn!(poll_id = %id, error = %e, "failed to update poll message");
        }
    }
}
