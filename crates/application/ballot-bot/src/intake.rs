//! Interaction intake
//!
//! Platform events arrive as [`Interaction`] values and leave as
//! [`Response`]s. Every `PollError` is turned into a private reply here, so a
//! bad click never reaches anyone but the user who made it.

use crate::controller::{EndOutcome, LifecycleController};
use ballot_core::{PollError, PollId, PollRequest, UserId, ViewPayload, VoteButtonId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An inbound user action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interaction {
    CreatePoll {
        user: UserId,
        /// Platform interaction ID; a fresh one is generated when absent
        #[serde(default)]
        request_id: Option<String>,
        #[serde(flatten)]
        poll: PollRequest,
    },
    Vote {
        user: UserId,
        custom_id: String,
    },
    PollResults {
        user: UserId,
        poll_id: PollId,
    },
    EndPoll {
        user: UserId,
        poll_id: PollId,
    },
}

impl Interaction {
    pub fn user(&self) -> &UserId {
        match self {
            Self::CreatePoll { user, .. }
            | Self::Vote { user, .. }
            | Self::PollResults { user, .. }
            | Self::EndPoll { user, .. } => user,
        }
    }
}

/// Reply to the acting user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    /// Text only the actor sees
    Private { text: String },
    /// A view only the actor sees
    PrivateView { view: ViewPayload },
    /// A poll message was posted for everyone
    Published { poll_id: PollId, view: ViewPayload },
}

impl Response {
    pub fn private(text: impl Into<String>) -> Self {
        Self::Private { text: text.into() }
    }
}

impl From<PollError> for Response {
    fn from(err: PollError) -> Self {
        Self::private(err.to_string())
    }
}

/// Run one interaction through the controller
pub async fn dispatch(controller: &LifecycleController, interaction: Interaction) -> Response {
    let user = interaction.user().clone();
    let result = match interaction {
        Interaction::CreatePoll {
            user,
            request_id,
            poll,
        } => {
            let request_id = request_id.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
            controller
                .create_poll(&user, &request_id, &poll)
                .await
                .map(|created| Response::Published {
                    poll_id: created.id,
                    view: created.view,
                })
        }
        Interaction::Vote { user, custom_id } => match custom_id.parse::<VoteButtonId>() {
            Ok(button) => controller
                .vote(&user, &button)
                .await
                .map(|receipt| Response::private(receipt.message())),
            Err(e) => Err(e),
        },
        Interaction::PollResults { user, poll_id } => controller
            .admin_results(&user, &poll_id)
            .await
            .map(|view| Response::PrivateView { view }),
        Interaction::EndPoll { user, poll_id } => {
            controller
                .end_poll(&user, &poll_id)
                .await
                .map(|outcome| match outcome {
                    EndOutcome::Closed(_) => Response::private(format!("Poll {} has ended", poll_id)),
                    EndOutcome::AlreadyClosed => {
                        Response::private(format!("Poll {} was already closed", poll_id))
                    }
                })
        }
    };

    result.unwrap_or_else(|err| {
        tracing::debug!(user = %user, error = %err, "interaction rejected");
        Response::from(err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AdminList;
    use crate::surface::MemorySurface;
    use std::sync::Arc;

    fn controller() -> LifecycleController {
        LifecycleController::new(Arc::new(MemorySurface::new()), Arc::new(AdminList::new(["42"])))
    }

    fn interaction(json: &str) -> Interaction {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_decode_create_poll() {
        let parsed = interaction(
            r#"{"kind":"create_poll","user":"7","request_id":"abc","question":"Lunch?","options":"Pizza,Sushi","multiple":true,"maxvotes":2}"#,
        );
        match parsed {
            Interaction::CreatePoll {
                user,
                request_id,
                poll,
            } => {
                assert_eq!(user, UserId::new("7"));
                assert_eq!(request_id.as_deref(), Some("abc"));
                assert_eq!(poll.question, "Lunch?");
                assert_eq!(poll.multiple, Some(true));
                assert_eq!(poll.maxvotes, Some(2));
                assert_eq!(poll.duration, None);
            }
            other => panic!("decoded as {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_vote_end_flow() {
        let controller = controller();
        let response = dispatch(
            &controller,
            interaction(r#"{"kind":"create_poll","user":"7","request_id":"abc","question":"Lunch?","options":"Pizza,Sushi"}"#),
        )
        .await;
        match &response {
            Response::Published { poll_id, view } => {
                assert_eq!(poll_id.as_str(), "poll-abc");
                assert_eq!(view.title, "Lunch?");
            }
            other => panic!("expected a published poll, got {:?}", other),
        }

        let response = dispatch(
            &controller,
            interaction(r#"{"kind":"vote","user":"8","custom_id":"poll-abc:1"}"#),
        )
        .await;
        assert_eq!(response, Response::private("You voted for: Sushi"));

        let response = dispatch(
            &controller,
            interaction(r#"{"kind":"end_poll","user":"8","poll_id":"poll-abc"}"#),
        )
        .await;
        assert_eq!(response, Response::private("You don't have permission to do that"));

        let response = dispatch(
            &controller,
            interaction(r#"{"kind":"end_poll","user":"7","poll_id":"poll-abc"}"#),
        )
        .await;
        assert_eq!(response, Response::private("Poll poll-abc has ended"));

        let response = dispatch(
            &controller,
            interaction(r#"{"kind":"vote","user":"8","custom_id":"poll-abc:0"}"#),
        )
        .await;
        assert_eq!(response, Response::private("This poll has expired or doesn't exist"));
    }

    #[tokio::test]
    async fn test_errors_become_private_text() {
        let controller = controller();

        let response = dispatch(
            &controller,
            interaction(r#"{"kind":"create_poll","user":"7","question":"  ","options":"a"}"#),
        )
        .await;
        assert_eq!(response, Response::private("The poll question cannot be empty"));

        let response = dispatch(
            &controller,
            interaction(r#"{"kind":"vote","user":"8","custom_id":"garbage"}"#),
        )
        .await;
        assert_eq!(response, Response::private("Unrecognised button: garbage"));

        let response = dispatch(
            &controller,
            interaction(r#"{"kind":"poll_results","user":"8","poll_id":"poll-x"}"#),
        )
        .await;
        assert_eq!(response, Response::private("You don't have permission to do that"));

        let response = dispatch(
            &controller,
            interaction(r#"{"kind":"poll_results","user":"42","poll_id":"poll-x"}"#),
        )
        .await;
        assert_eq!(response, Response::private("This poll has expired or doesn't exist"));
    }

    #[tokio::test]
    async fn test_generated_request_id() {
        let controller = controller();
        let response = dispatch(
            &controller,
            interaction(r#"{"kind":"create_poll","user":"7","question":"Q","options":"a,b"}"#),
        )
        .await;
        match response {
            Response::Published { poll_id, .. } => {
                assert!(poll_id.as_str().starts_with("poll-"));
                assert!(controller.registry().contains(&poll_id).await);
            }
            other => panic!("expected a published poll, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_admin_results_view() {
        let controller = controller();
        dispatch(
            &controller,
            interaction(r#"{"kind":"create_poll","user":"7","request_id":"r","question":"Q","options":"a,b","anonymous":true}"#),
        )
        .await;
        dispatch(
            &controller,
            interaction(r#"{"kind":"vote","user":"9","custom_id":"poll-r:0"}"#),
        )
        .await;

        let response = dispatch(
            &controller,
            interaction(r#"{"kind":"poll_results","user":"42","poll_id":"poll-r"}"#),
        )
        .await;
        match response {
            Response::PrivateView { view } => {
                assert_eq!(view.title, "[ADMIN] Q");
                assert_eq!(view.lines[1], "↳ Voters: <@9>");
            }
            other => panic!("expected a private view, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_end_poll_after_racing_close() {
        let controller = controller();
        dispatch(
            &controller,
            interaction(r#"{"kind":"create_poll","user":"7","request_id":"late","question":"Q","options":"a,b"}"#),
        )
        .await;
        let id = PollId::new("poll-late");

        // Hold the poll so end_poll finds it, then let another close claim it.
        let handle = controller.registry().get(&id).await.unwrap();
        let guard = handle.lock().await;

        let ending = {
            let controller = controller.clone();
            tokio::spawn(async move {
                dispatch(
                    &controller,
                    interaction(r#"{"kind":"end_poll","user":"42","poll_id":"poll-late"}"#),
                )
                .await
            })
        };
        tokio::task::yield_now().await;

        let closing = {
            let controller = controller.clone();
            let id = id.clone();
            tokio::spawn(async move { controller.close(&id).await })
        };
        tokio::task::yield_now().await;

        drop(guard);
        assert_eq!(
            ending.await.unwrap(),
            Response::private("Poll poll-late was already closed")
        );
        assert!(closing.await.unwrap().is_some());
    }

    #[test]
    fn test_response_json_shape() {
        let json = serde_json::to_value(Response::private("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "private", "text": "hi"}));
    }
}
