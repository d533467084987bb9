//! View Renderer
//!
//! Pure mapping from poll state and viewer role to a display payload:
//!
//! | Poll      | Viewer | Shows                                      |
//! |-----------|--------|--------------------------------------------|
//! | anonymous | public | title + options only, "Private Poll" footer |
//! | any       | admin  | counts + voter mentions, `[ADMIN]` title    |
//! | public    | public | counts + voter mentions, total in footer    |
//!
//! The shared poll message is only ever rendered with [`Viewer::Public`].

use crate::duration::humanize;
use crate::{Poll, VoteButtonId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Buttons per row on the rendered message
const BUTTONS_PER_ROW: usize = 5;

/// Who the view is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Public,
    Admin,
}

/// Colour intent; the surface picks the actual colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorHint {
    /// Open poll with no votes yet
    Idle,
    /// Open poll with votes
    Active,
    /// Private admin detail
    Admin,
    /// Closed poll results
    Final,
}

/// A vote button on an open poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteButton {
    pub custom_id: String,
    pub label: String,
}

/// Open layout carries vote buttons, closed layout carries none
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Layout {
    Open { controls: Vec<Vec<VoteButton>> },
    Closed,
}

/// Named value shown beside the description (used by results)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewField {
    pub name: String,
    pub value: String,
}

/// Everything a surface needs to draw a poll message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPayload {
    pub title: String,
    pub lines: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<ViewField>,
    pub footer: String,
    pub color: ColorHint,
    pub layout: Layout,
}

impl ViewPayload {
    pub fn is_closed(&self) -> bool {
        matches!(self.layout, Layout::Closed)
    }

    /// Description lines joined for plain-text surfaces
    pub fn description(&self) -> String {
        self.lines.join("\n")
    }
}

/// Render the live view of an open poll
pub fn render(poll: &Poll, viewer: Viewer, now: DateTime<Utc>) -> ViewPayload {
    match (viewer, poll.mode.anonymous) {
        (Viewer::Admin, _) => render_admin(poll),
        (Viewer::Public, true) => render_private(poll, now),
        (Viewer::Public, false) => render_public(poll, now),
    }
}

/// Render the final results of a closed poll
pub fn render_results(poll: &Poll) -> ViewPayload {
    let total = poll.total_votes();
    let fields = poll
        .options
        .iter()
        .zip(&poll.tallies)
        .zip(poll.percentages())
        .map(|((option, &count), share)| ViewField {
            name: option.clone(),
            value: format!("{} ({}%)", votes(count), share),
        })
        .collect();

    ViewPayload {
        title: "Poll Results".to_string(),
        lines: vec![format!("**{}**", poll.title)],
        fields,
        footer: format!("Poll ID: {} | Total votes: {}", poll.id, total),
        color: ColorHint::Final,
        layout: Layout::Closed,
    }
}

fn render_private(poll: &Poll, now: DateTime<Utc>) -> ViewPayload {
    let footer = join_footer([
        ends_in(poll, now),
        Some(
            if poll.mode.allow_multiple {
                "Multiple votes allowed"
            } else {
                "Single vote only"
            }
            .to_string(),
        ),
        Some("Private Poll - Votes are confidential".to_string()),
        Some(format!("Poll ID: {}", poll.id)),
    ]);

    ViewPayload {
        title: poll.title.clone(),
        lines: numbered_options(poll),
        fields: Vec::new(),
        footer,
        color: ColorHint::Idle,
        layout: open_layout(poll),
    }
}

fn render_public(poll: &Poll, now: DateTime<Utc>) -> ViewPayload {
    let footer = join_footer([
        ends_in(poll, now),
        Some(
            if poll.mode.allow_multiple {
                "Multiple votes"
            } else {
                "Single vote"
            }
            .to_string(),
        ),
        Some("Public Poll".to_string()),
        Some(format!("Poll ID: {}", poll.id)),
        Some(format!("Total votes: {}", poll.total_votes())),
    ]);

    let color = if poll.tallies.iter().any(|&n| n > 0) {
        ColorHint::Active
    } else {
        ColorHint::Idle
    };

    ViewPayload {
        title: poll.title.clone(),
        lines: tally_lines(poll),
        fields: Vec::new(),
        footer,
        color,
        layout: open_layout(poll),
    }
}

fn render_admin(poll: &Poll) -> ViewPayload {
    ViewPayload {
        title: format!("[ADMIN] {}", poll.title),
        lines: tally_lines(poll),
        fields: Vec::new(),
        footer: format!("Poll ID: {} | Total votes: {}", poll.id, poll.total_votes()),
        color: ColorHint::Admin,
        layout: Layout::Closed,
    }
}

fn numbered_options(poll: &Poll) -> Vec<String> {
    poll.options
        .iter()
        .enumerate()
        .map(|(i, opt)| format!("{}. {}", i + 1, opt))
        .collect()
}

fn tally_lines(poll: &Poll) -> Vec<String> {
    let mut lines = Vec::with_capacity(poll.options.len());
    for (i, opt) in poll.options.iter().enumerate() {
        lines.push(format!("{}. {} - {}", i + 1, opt, votes(poll.tallies[i])));
        let voters = &poll.voters[i];
        if !voters.is_empty() {
            let mentions: Vec<String> = voters.iter().map(|v| v.mention()).collect();
            lines.push(format!("↳ Voters: {}", mentions.join(", ")));
        }
    }
    lines
}

fn open_layout(poll: &Poll) -> Layout {
    let buttons: Vec<VoteButton> = (0..poll.options.len())
        .map(|i| VoteButton {
            custom_id: VoteButtonId::new(poll.id.clone(), i).encode(),
            label: (i + 1).to_string(),
        })
        .collect();

    Layout::Open {
        controls: buttons.chunks(BUTTONS_PER_ROW).map(<[_]>::to_vec).collect(),
    }
}

fn ends_in(poll: &Poll, now: DateTime<Utc>) -> Option<String> {
    poll.remaining(now)
        .map(|left| format!("Ends in {}", humanize(left)))
}

fn join_footer<const N: usize>(parts: [Option<String>; N]) -> String {
    parts.into_iter().flatten().collect::<Vec<_>>().join(" | ")
}

fn votes(count: u32) -> String {
    if count == 1 {
        "1 vote".to_string()
    } else {
        format!("{} votes", count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{apply_vote, PollDraft, PollId, PollRequest, UserId};

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn poll(request: PollRequest) -> Poll {
        let draft = PollDraft::parse(&request, None).unwrap();
        Poll::new(PollId::new("poll-9"), UserId::new("creator"), draft, now()).unwrap()
    }

    #[test]
    fn test_public_view_shows_counts_and_voters() {
        let mut poll = poll(PollRequest::new("Colour?", "Red,Green,Blue"));
        apply_vote(&mut poll, &UserId::new("111"), 1, now()).unwrap();
        apply_vote(&mut poll, &UserId::new("222"), 1, now()).unwrap();

        let view = render(&poll, Viewer::Public, now());
        assert_eq!(view.title, "Colour?");
        assert_eq!(
            view.lines,
            vec![
                "1. Red - 0 votes",
                "2. Green - 2 votes",
                "↳ Voters: <@111>, <@222>",
                "3. Blue - 0 votes",
            ]
        );
        assert_eq!(
            view.footer,
            "Single vote | Public Poll | Poll ID: poll-9 | Total votes: 2"
        );
        assert_eq!(view.color, ColorHint::Active);
        assert!(!view.is_closed());
    }

    #[test]
    fn test_idle_colour_without_votes() {
        let poll = poll(PollRequest::new("Q", "a"));
        assert_eq!(render(&poll, Viewer::Public, now()).color, ColorHint::Idle);
    }

    #[test]
    fn test_anonymous_public_view_hides_everything() {
        let mut poll = poll(PollRequest::new("Secret?", "Yes,No").anonymous().duration("1d"));
        for i in 0..10 {
            apply_vote(&mut poll, &UserId::new(format!("voter{}", i)), i % 2, now()).unwrap();
        }

        let view = render(&poll, Viewer::Public, now());
        assert_eq!(view.lines, vec!["1. Yes", "2. No"]);
        assert_eq!(
            view.footer,
            "Ends in 1 day | Single vote only | Private Poll - Votes are confidential | Poll ID: poll-9"
        );

        let text = serde_json::to_string(&view).unwrap();
        assert!(!text.contains("voter"));
        assert!(!text.contains("vote -"));
        assert!(!text.contains("Total votes"));
    }

    #[test]
    fn test_admin_view_reveals_anonymous_votes() {
        let mut poll = poll(PollRequest::new("Secret?", "Yes,No").anonymous());
        apply_vote(&mut poll, &UserId::new("alice"), 0, now()).unwrap();

        let view = render(&poll, Viewer::Admin, now());
        assert_eq!(view.title, "[ADMIN] Secret?");
        assert_eq!(view.lines, vec!["1. Yes - 1 vote", "↳ Voters: <@alice>", "2. No - 0 votes"]);
        assert_eq!(view.footer, "Poll ID: poll-9 | Total votes: 1");
        assert_eq!(view.color, ColorHint::Admin);
        assert!(view.is_closed());
    }

    #[test]
    fn test_buttons_wrap_at_five_per_row() {
        let options = (1..=12).map(|i| i.to_string()).collect::<Vec<_>>().join(",");
        let poll = poll(PollRequest::new("Q", options));

        match render(&poll, Viewer::Public, now()).layout {
            Layout::Open { controls } => {
                let sizes: Vec<usize> = controls.iter().map(Vec::len).collect();
                assert_eq!(sizes, vec![5, 5, 2]);
                assert_eq!(controls[2][1].custom_id, "poll-9:11");
                assert_eq!(controls[2][1].label, "12");
            }
            Layout::Closed => panic!("open poll rendered without controls"),
        }
    }

    #[test]
    fn test_results_percentages() {
        let mut poll = poll(PollRequest::new("Colour?", "Red,Green").multiple(Some(2)));
        apply_vote(&mut poll, &UserId::new("a"), 0, now()).unwrap();
        apply_vote(&mut poll, &UserId::new("b"), 1, now()).unwrap();
        apply_vote(&mut poll, &UserId::new("c"), 1, now()).unwrap();

        let view = render_results(&poll);
        assert_eq!(view.title, "Poll Results");
        assert_eq!(view.lines, vec!["**Colour?**"]);
        assert_eq!(view.fields[0].value, "1 vote (33%)");
        assert_eq!(view.fields[1].value, "2 votes (67%)");
        assert_eq!(view.footer, "Poll ID: poll-9 | Total votes: 3");
        assert!(view.is_closed());
    }

    #[test]
    fn test_results_without_votes_are_zero_percent() {
        let poll = poll(PollRequest::new("Q", "a,b"));
        let view = render_results(&poll);
        assert!(view.fields.iter().all(|f| f.value == "0 votes (0%)"));
    }
}
