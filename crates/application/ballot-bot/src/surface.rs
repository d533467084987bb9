//! Render surfaces - where poll views get drawn.
//!
//! The `RenderSurface` trait is the seam to the chat platform's message API.
//! `publish` posts a new poll message and hands back a reference to it;
//! `update` edits that message later. Updates are fire-and-forget from the
//! controller's point of view: a failed edit is logged, never rolled back.
//!
//! `NullSurface` discards everything. `MemorySurface` records every call for
//! inspection in tests and dry runs.

use async_trait::async_trait;
use ballot_core::{MessageRef, ViewPayload};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("message not found: {0}")]
    UnknownMessage(String),

    #[error("surface rejected the view: {0}")]
    Rejected(String),

    #[error("surface unavailable: {0}")]
    Unavailable(String),
}

/// Destination for rendered poll views
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Post a new poll message
    async fn publish(&self, view: &ViewPayload) -> Result<MessageRef, SurfaceError>;

    /// Replace the content of a previously published message
    async fn update(&self, message: &MessageRef, view: &ViewPayload) -> Result<(), SurfaceError>;
}

/// Accepts and discards every view
pub struct NullSurface;

#[async_trait]
impl RenderSurface for NullSurface {
    async fn publish(&self, _view: &ViewPayload) -> Result<MessageRef, SurfaceError> {
        Ok(MessageRef::new(Uuid::new_v4().to_string()))
    }

    async fn update(&self, _message: &MessageRef, _view: &ViewPayload) -> Result<(), SurfaceError> {
        Ok(())
    }
}

/// One recorded surface call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Published { message: MessageRef, view: ViewPayload },
    Updated { message: MessageRef, view: ViewPayload },
}

impl SurfaceEvent {
    pub fn view(&self) -> &ViewPayload {
        match self {
            Self::Published { view, .. } | Self::Updated { view, .. } => view,
        }
    }

    pub fn message(&self) -> &MessageRef {
        match self {
            Self::Published { message, .. } | Self::Updated { message, .. } => message,
        }
    }
}

/// Records every publish and update
#[derive(Default)]
pub struct MemorySurface {
    events: Mutex<Vec<SurfaceEvent>>,
    fail_publish: AtomicBool,
    fail_updates: AtomicBool,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `publish` calls fail
    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `update` calls fail
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.lock().clone()
    }

    /// Most recent view drawn for a message
    pub fn latest(&self, message: &MessageRef) -> Option<ViewPayload> {
        self.lock()
            .iter()
            .rev()
            .find(|event| event.message() == message)
            .map(|event| event.view().clone())
    }

    pub fn update_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|event| matches!(event, SurfaceEvent::Updated { .. }))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SurfaceEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RenderSurface for MemorySurface {
    async fn publish(&self, view: &ViewPayload) -> Result<MessageRef, SurfaceError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(SurfaceError::Unavailable("publish disabled".into()));
        }
        let message = MessageRef::new(Uuid::new_v4().to_string());
        self.lock().push(SurfaceEvent::Published {
            message: message.clone(),
            view: view.clone(),
        });
        Ok(message)
    }

    async fn update(&self, message: &MessageRef, view: &ViewPayload) -> Result<(), SurfaceError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(SurfaceError::Unavailable("updates disabled".into()));
        }
        let mut events = self.lock();
        if !events.iter().any(|event| event.message() == message) {
            return Err(SurfaceError::UnknownMessage(message.as_str().to_string()));
        }
        events.push(SurfaceEvent::Updated {
            message: message.clone(),
            view: view.clone(),
        });
        Ok(())
    }
}
