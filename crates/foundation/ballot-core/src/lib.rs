//! # Ballot Core
//!
//! Poll records, the toggle-vote ledger and the role-dependent view renderer.
//!
//! ```text
//!   PollRequest ──► PollDraft ──► Poll ◄── ledger::apply_vote(user, option)
//!                                  │
//!                                  ▼
//!                 view::render(poll, Viewer) ──► ViewPayload
//!                 view::render_results(poll) ──► ViewPayload (closed)
//! ```
//!
//! Nothing in this crate performs I/O or holds locks. Callers serialize
//! access to a single [`Poll`] and decide where the rendered payloads go.

pub mod clock;
pub mod duration;
pub mod ledger;
pub mod poll;
pub mod view;

pub use clock::{Clock, ManualClock, SystemClock};
pub use duration::{humanize, parse_duration};
pub use ledger::{apply_vote, Toggle};
pub use poll::{
    percent, MessageRef, Poll, PollDraft, PollId, PollMode, PollRequest, UserId, VoteButtonId,
};
pub use view::{render, render_results, ColorHint, Layout, ViewField, ViewPayload, Viewer, VoteButton};

/// Most options a poll may carry (also the most buttons a message can hold)
pub const MAX_OPTIONS: usize = 25;

/// Longest option label, in characters
pub const MAX_OPTION_LEN: usize = 100;

/// Longest title, in characters, before truncation
pub const MAX_TITLE_LEN: usize = 256;

/// Upper bound for the per-user vote cap
pub const MAX_VOTES_CAP: usize = 25;

/// Result type for poll operations
pub type Result<T> = std::result::Result<T, PollError>;

/// Errors surfaced by poll operations.
///
/// The `Display` text is what the requesting user gets back as a private
/// reply, so keep it short and free of internal detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("{0}")]
    Validation(String),

    #[error("This poll has expired or doesn't exist")]
    PollNotFound,

    #[error("This poll has ended")]
    PollExpired,

    #[error("{}", vote_limit_message(.limit, .multiple))]
    VoteLimitExceeded { limit: usize, multiple: bool },

    #[error("That option doesn't exist in this poll")]
    InvalidOption { index: usize, options: usize },

    #[error("You don't have permission to do that")]
    Forbidden,

    #[error("A poll with this ID already exists")]
    DuplicatePoll(PollId),

    #[error("Couldn't post the poll: {0}")]
    Surface(String),
}

impl PollError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

fn vote_limit_message(limit: &usize, multiple: &bool) -> String {
    if *multiple {
        format!("You can only vote {} times in this poll!", limit)
    } else {
        "This poll only allows one vote per user!".to_string()
    }
}
