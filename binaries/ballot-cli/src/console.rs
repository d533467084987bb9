//! Console render surface
//!
//! Writes every published or updated view to stdout as one JSON line, next
//! to the interaction responses.

use async_trait::async_trait;
use ballot_bot::{RenderSurface, SurfaceError};
use ballot_core::{MessageRef, ViewPayload};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
struct ConsoleEvent<'a> {
    event: &'a str,
    message: &'a MessageRef,
    view: &'a ViewPayload,
}

pub struct ConsoleSurface;

impl ConsoleSurface {
    fn emit(&self, event: &str, message: &MessageRef, view: &ViewPayload) -> Result<(), SurfaceError> {
        let line = serde_json::to_string(&ConsoleEvent {
            event,
            message,
            view,
        })
        .map_err(|e| SurfaceError::Rejected(e.to_string()))?;
        println!("{}", line);
        Ok(())
    }
}

#[async_trait]
impl RenderSurface for ConsoleSurface {
    async fn publish(&self, view: &ViewPayload) -> Result<MessageRef, SurfaceError> {
        let message = MessageRef::new(Uuid::new_v4().to_string());
        self.emit("published", &message, view)?;
        Ok(message)
    }

    async fn update(&self, message: &MessageRef, view: &ViewPayload) -> Result<(), SurfaceError> {
        self.emit("updated", message, view)
    }
}
