//! Poll records
//!
//! A [`Poll`] owns its tallies, the per-option voter lists and the per-user
//! vote sets. Voter lists exist from creation (empty), and are kept for
//! anonymous polls too: the admin view and un-voting both need them.

use crate::{
    duration::parse_duration, PollError, Result, MAX_OPTIONS, MAX_OPTION_LEN, MAX_TITLE_LEN,
    MAX_VOTES_CAP,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Separator between poll ID and option index in a button's custom ID
const BUTTON_SEPARATOR: char = ':';

/// Poll identity, derived from the request that created the poll
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollId(String);

impl PollId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `poll-<request id>`
    pub fn from_request(request_id: &str) -> Self {
        Self(format!("poll-{}", request_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform user identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Mention markup understood by the chat platform
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to the message a surface rendered for a poll
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(String);

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier carried by a vote button: which poll, which option
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoteButtonId {
    pub poll_id: PollId,
    pub option: usize,
}

impl VoteButtonId {
    pub fn new(poll_id: PollId, option: usize) -> Self {
        Self { poll_id, option }
    }

    /// Wire form, `<poll id>:<option index>`
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.poll_id, BUTTON_SEPARATOR, self.option)
    }
}

impl FromStr for VoteButtonId {
    type Err = PollError;

    // Split on the last separator so IDs containing it still decode.
    fn from_str(s: &str) -> Result<Self> {
        let malformed = || PollError::validation(format!("Unrecognised button: {}", s));
        let (poll, option) = s.rsplit_once(BUTTON_SEPARATOR).ok_or_else(malformed)?;
        if poll.is_empty() {
            return Err(malformed());
        }
        let option = option.parse::<usize>().map_err(|_| malformed())?;
        Ok(Self::new(PollId::new(poll), option))
    }
}

impl fmt::Display for VoteButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Voting mode flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollMode {
    pub allow_multiple: bool,
    pub anonymous: bool,
}

/// Raw create-poll input, as delivered by the command layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollRequest {
    pub question: String,
    /// Comma-separated option labels
    pub options: String,
    #[serde(default)]
    pub multiple: Option<bool>,
    #[serde(default)]
    pub anonymous: Option<bool>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub maxvotes: Option<i64>,
}

impl PollRequest {
    pub fn new(question: impl Into<String>, options: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            options: options.into(),
            ..Default::default()
        }
    }

    pub fn multiple(mut self, max_votes: Option<i64>) -> Self {
        self.multiple = Some(true);
        self.maxvotes = max_votes;
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.anonymous = Some(true);
        self
    }

    pub fn duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }
}

/// Validated poll settings, ready to become a [`Poll`]
#[derive(Debug, Clone, PartialEq)]
pub struct PollDraft {
    pub title: String,
    pub options: Vec<String>,
    pub mode: PollMode,
    pub max_votes_per_user: usize,
    pub duration: Option<Duration>,
}

impl PollDraft {
    /// Validate raw input.
    ///
    /// `default_max_votes` applies to multi-vote polls that did not name a
    /// cap; without it the cap is 1.
    pub fn parse(request: &PollRequest, default_max_votes: Option<u8>) -> Result<Self> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(PollError::validation("The poll question cannot be empty"));
        }
        let title = clip_title(question);

        let options: Vec<String> = request
            .options
            .split(',')
            .map(|opt| opt.trim().to_string())
            .collect();

        if options.len() > MAX_OPTIONS {
            return Err(PollError::validation(format!(
                "You can only have up to {} options in a poll!",
                MAX_OPTIONS
            )));
        }
        if options.iter().any(|opt| opt.is_empty()) {
            return Err(PollError::validation("Poll options cannot be empty"));
        }
        if let Some(long) = options.iter().find(|opt| opt.chars().count() > MAX_OPTION_LEN) {
            return Err(PollError::validation(format!(
                "Option \"{}\" is longer than {} characters",
                long.chars().take(20).collect::<String>(),
                MAX_OPTION_LEN
            )));
        }

        let mode = PollMode {
            allow_multiple: request.multiple.unwrap_or(false),
            anonymous: request.anonymous.unwrap_or(false),
        };

        let max_votes_per_user = if mode.allow_multiple {
            match request.maxvotes {
                Some(n) if (1..=MAX_VOTES_CAP as i64).contains(&n) => n as usize,
                Some(_) => {
                    return Err(PollError::validation(format!(
                        "Max votes must be between 1 and {}",
                        MAX_VOTES_CAP
                    )))
                }
                None => default_max_votes
                    .map(usize::from)
                    .unwrap_or(1)
                    .clamp(1, MAX_VOTES_CAP),
            }
        } else {
            1
        };

        let duration = request
            .duration
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(parse_duration)
            .transpose()?;

        Ok(Self {
            title,
            options,
            mode,
            max_votes_per_user,
            duration,
        })
    }
}

fn clip_title(question: &str) -> String {
    if question.chars().count() <= MAX_TITLE_LEN {
        return question.to_string();
    }
    let mut title: String = question.chars().take(MAX_TITLE_LEN - 1).collect();
    title.push('…');
    title
}

/// Nearest whole percent of `count` in `total`, halves rounding up.
/// Zero when there are no votes at all.
pub fn percent(count: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (count, total) = (u64::from(count), u64::from(total));
    ((200 * count + total) / (2 * total)) as u32
}

/// One poll and its evolving tally
#[derive(Debug, Clone)]
pub struct Poll {
    pub(crate) id: PollId,
    pub(crate) title: String,
    pub(crate) options: Vec<String>,
    pub(crate) tallies: Vec<u32>,
    pub(crate) voters: Vec<Vec<UserId>>,
    pub(crate) ballots: BTreeMap<UserId, BTreeSet<usize>>,
    pub(crate) mode: PollMode,
    pub(crate) max_votes_per_user: usize,
    pub(crate) creator: UserId,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) expires_at: Option<DateTime<Utc>>,
    pub(crate) message: Option<MessageRef>,
    pub(crate) closed: bool,
    pub(crate) revision: u64,
}

impl Poll {
    pub fn new(id: PollId, creator: UserId, draft: PollDraft, now: DateTime<Utc>) -> Result<Self> {
        let expires_at = match draft.duration {
            Some(d) => {
                let delta = chrono::Duration::from_std(d)
                    .map_err(|_| PollError::validation("Duration is too long"))?;
                Some(
                    now.checked_add_signed(delta)
                        .ok_or_else(|| PollError::validation("Duration is too long"))?,
                )
            }
            None => None,
        };

        let count = draft.options.len();
        Ok(Self {
            id,
            title: draft.title,
            options: draft.options,
            tallies: vec![0; count],
            voters: vec![Vec::new(); count],
            ballots: BTreeMap::new(),
            mode: draft.mode,
            max_votes_per_user: draft.max_votes_per_user,
            creator,
            created_at: now,
            expires_at,
            message: None,
            closed: false,
            revision: 0,
        })
    }

    pub fn id(&self) -> &PollId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn option_label(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(String::as_str)
    }

    pub fn tallies(&self) -> &[u32] {
        &self.tallies
    }

    /// Voters of one option, in the order they voted
    pub fn voters(&self, index: usize) -> &[UserId] {
        self.voters.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn mode(&self) -> PollMode {
        self.mode
    }

    pub fn max_votes_per_user(&self) -> usize {
        self.max_votes_per_user
    }

    pub fn creator(&self) -> &UserId {
        &self.creator
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn message(&self) -> Option<&MessageRef> {
        self.message.as_ref()
    }

    pub fn set_message(&mut self, message: MessageRef) {
        self.message = Some(message);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Enter the terminal state. Returns false if already closed.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.revision += 1;
        true
    }

    /// Bumped on every applied vote and on closure; newer views carry a
    /// higher revision
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn total_votes(&self) -> u32 {
        self.tallies.iter().sum()
    }

    /// Option indices the user currently holds a vote on
    pub fn votes_of(&self, user: &UserId) -> Vec<usize> {
        self.ballots
            .get(user)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| now >= at)
    }

    /// Time left before expiry, zero once passed. `None` for open-ended polls.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at
            .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Per-option share of the total, in whole percent
    pub fn percentages(&self) -> Vec<u32> {
        let total = self.total_votes();
        self.tallies.iter().map(|&n| percent(n, total)).collect()
    }

    /// Whether tallies, voter lists and vote sets agree
    pub fn check_invariants(&self) -> bool {
        let aligned = self.tallies.len() == self.options.len()
            && self.voters.len() == self.options.len();
        let counts_match = self
            .tallies
            .iter()
            .zip(&self.voters)
            .all(|(&n, list)| n as usize == list.len());
        let no_duplicates = self.voters.iter().all(|list| {
            let unique: BTreeSet<&UserId> = list.iter().collect();
            unique.len() == list.len()
        });
        let sets_bounded = self
            .ballots
            .values()
            .all(|set| !set.is_empty() && set.len() <= self.max_votes_per_user);
        let sets_match = self.ballots.iter().all(|(user, set)| {
            set.iter()
                .all(|&i| self.voters.get(i).map_or(false, |list| list.contains(user)))
        });
        let lists_match = self.voters.iter().enumerate().all(|(i, list)| {
            list.iter()
                .all(|user| self.ballots.get(user).map_or(false, |set| set.contains(&i)))
        });

        aligned && counts_match && no_duplicates && sets_bounded && sets_match && lists_match
    }
}
