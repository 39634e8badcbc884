//! Alert text rendering.
//!
//! All timestamps render in UTC as `YYYY-MM-DD HH:MM`.

use super::AlertKind;
use crate::config::{AlertConfig, TruncateBy};
use crate::proposal::Proposal;
use chrono::Duration;

const ELLIPSIS: &str = "...";
const UNKNOWN: &str = "unknown";
/// Explorer URL value that suppresses the link.
pub const NO_LINK: &str = "-";

/// A rendered alert ready for any transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub kind: AlertKind,
    pub chain: String,
    pub proposal_id: String,
    pub text: String,
}

impl AlertMessage {
    pub fn render(
        kind: AlertKind,
        chain: &str,
        proposal: &Proposal,
        detail_url: &str,
        time_left: Option<Duration>,
        alerts: &AlertConfig,
    ) -> Self {
        let description = truncate(
            &proposal.description,
            alerts.description_max_chars,
            alerts.truncate_by,
        );
        let vote_start = proposal
            .voting_start()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| UNKNOWN.to_string());
        let time_left = time_left
            .map(format_time_left)
            .unwrap_or_else(|| UNKNOWN.to_string());

        let text = format!(
            "**{} {}**: {}\n\n**Proposal title:** {}\n\n**Short text description:** {}\n\n**Vote start:** {}\n\n**Time left: {}**\n\n**Read full proposal details:**\n{}",
            kind.label(),
            chain,
            proposal.id,
            proposal.title,
            description,
            vote_start,
            time_left,
            detail_url,
        );

        Self {
            kind,
            chain: chain.to_string(),
            proposal_id: proposal.id.clone(),
            text,
        }
    }
}

/// Cut `text` to at most `max` units; when cut, the last three are "...".
///
/// `Bytes` never splits a UTF-8 sequence: it backs off to the previous char
/// boundary, so the result may be a few bytes shorter than `max`.
pub fn truncate(text: &str, max: usize, by: TruncateBy) -> String {
    let keep = max.saturating_sub(ELLIPSIS.len());
    match by {
        TruncateBy::Chars => {
            if text.chars().count() <= max {
                return text.to_string();
            }
            let mut out: String = text.chars().take(keep).collect();
            out.push_str(ELLIPSIS);
            out
        }
        TruncateBy::Bytes => {
            if text.len() <= max {
                return text.to_string();
            }
            let mut cut = keep;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}{}", &text[..cut], ELLIPSIS)
        }
    }
}

/// `"{days} days {hours:02} hours"` from whole hours; negative clamps to zero.
pub fn format_time_left(left: Duration) -> String {
    let total_hours = left.num_hours().max(0);
    let days = total_hours / 24;
    let hours = total_hours % 24;
    format!("{} days {:02} hours", days, hours)
}

/// Proposal link: explorer URL when configured ("-" = none), else the
/// generated `{domain}/{chain}/proposals/{id}`.
pub fn detail_url(domain: &str, chain: &str, explorer_url: &str, proposal_id: &str) -> String {
    match explorer_url {
        NO_LINK => NO_LINK.to_string(),
        "" => format!(
            "{}/{}/proposals/{}",
            domain.trim_end_matches('/'),
            chain.to_lowercase(),
            proposal_id
        ),
        explorer => format!("{}/{}", explorer.trim_end_matches('/'), proposal_id),
    }
}
