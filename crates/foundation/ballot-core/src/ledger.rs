//! Vote Ledger - toggle votes under the per-user cap
//!
//! A click on an option the user already voted for removes that vote;
//! anything else adds one, provided the user's vote set has room. Checks run
//! in a fixed order: closed, expired, option bounds, then toggle/limit.
//!
//! The caller must hold the poll exclusively for the whole call.

use crate::{Poll, PollError, Result, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a vote action did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Toggle {
    On,
    Off,
}

/// Apply one click from `user` on option `option`.
///
/// `PollExpired` leaves the poll untouched; closing it is up to the caller.
pub fn apply_vote(
    poll: &mut Poll,
    user: &UserId,
    option: usize,
    now: DateTime<Utc>,
) -> Result<Toggle> {
    if poll.closed {
        return Err(PollError::PollNotFound);
    }
    if poll.is_expired(now) {
        return Err(PollError::PollExpired);
    }
    if option >= poll.options.len() {
        return Err(PollError::InvalidOption {
            index: option,
            options: poll.options.len(),
        });
    }

    let held = poll
        .ballots
        .get(user)
        .map_or(false, |set| set.contains(&option));

    if held {
        retract(poll, user, option);
        poll.revision += 1;
        return Ok(Toggle::Off);
    }

    let used = poll.ballots.get(user).map_or(0, |set| set.len());
    if used >= poll.max_votes_per_user {
        return Err(PollError::VoteLimitExceeded {
            limit: poll.max_votes_per_user,
            multiple: poll.mode.allow_multiple,
        });
    }

    poll.tallies[option] += 1;
    poll.voters[option].push(user.clone());
    poll.ballots.entry(user.clone()).or_default().insert(option);
    poll.revision += 1;

    debug_assert!(poll.check_invariants());
    Ok(Toggle::On)
}

fn retract(poll: &mut Poll, user: &UserId, option: usize) {
    poll.tallies[option] = poll.tallies[option].saturating_sub(1);
    poll.voters[option].retain(|voter| voter != user);

    if let Some(set) = poll.ballots.get_mut(user) {
        set.remove(&option);
        if set.is_empty() {
            poll.ballots.remove(user);
        }
    }

    debug_assert!(poll.check_invariants());
}
