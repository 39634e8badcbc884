//! Governance proposals as the engine sees them.
//!
//! Every upstream shape is normalized into [`Proposal`] by a
//! [`ProposalSource`]; the engine never touches raw API responses.

pub mod fetch;
pub mod vote;

use crate::config::ChainConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fetch::{FetchError, HttpProposalSource, SampleProposalSource};
pub use vote::{HttpVoteChecker, VoteCheckError, VoteChecker};

pub const NO_TITLE: &str = "No Title";
pub const NO_DESCRIPTION: &str = "No Description";

/// A normalized governance proposal. Identity is (source, id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Integer-valued, kept as the upstream string until classified.
    pub id: String,
    pub status: ProposalStatus,
    pub title: String,
    pub description: String,
    pub voting_start_time: String,
    pub voting_end_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum ProposalStatus {
    /// Deposit period.
    Pending,
    Voting,
    Passed,
    Rejected,
    Failed,
    Unspecified,
}

impl ProposalStatus {
    /// Parse a Cosmos status name, a short name, or the numeric enum value.
    /// Anything unrecognized is `Unspecified`.
    pub fn parse(raw: &str) -> Self {
        Self::from_name(raw).unwrap_or(ProposalStatus::Unspecified)
    }

    /// Strict form of [`parse`](Self::parse): `None` for names it does not know.
    pub fn from_name(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("PROPOSAL_STATUS_").unwrap_or(&upper);
        match name {
            "DEPOSIT_PERIOD" | "PENDING" | "1" => Some(ProposalStatus::Pending),
            "VOTING_PERIOD" | "VOTING" | "2" => Some(ProposalStatus::Voting),
            "PASSED" | "3" => Some(ProposalStatus::Passed),
            "REJECTED" | "4" => Some(ProposalStatus::Rejected),
            "FAILED" | "5" => Some(ProposalStatus::Failed),
            "UNSPECIFIED" | "0" => Some(ProposalStatus::Unspecified),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "PENDING",
            ProposalStatus::Voting => "VOTING",
            ProposalStatus::Passed => "PASSED",
            ProposalStatus::Rejected => "REJECTED",
            ProposalStatus::Failed => "FAILED",
            ProposalStatus::Unspecified => "UNSPECIFIED",
        }
    }
}

impl From<String> for ProposalStatus {
    fn from(raw: String) -> Self {
        ProposalStatus::parse(&raw)
    }
}

impl From<ProposalStatus> for &'static str {
    fn from(status: ProposalStatus) -> Self {
        status.as_str()
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("invalid proposal id {0:?}")]
    InvalidId(String),
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidTimestamp {
        field: &'static str,
        value: String,
        reason: String,
    },
}

impl Proposal {
    /// Numeric id. Ordering must be numeric, never lexical ("10" > "9").
    pub fn numeric_id(&self) -> Result<u64, ParseError> {
        self.id
            .trim()
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidId(self.id.clone()))
    }

    pub fn voting_start(&self) -> Result<DateTime<Utc>, ParseError> {
        parse_timestamp("voting_start_time", &self.voting_start_time)
    }

    pub fn voting_end(&self) -> Result<DateTime<Utc>, ParseError> {
        parse_timestamp("voting_end_time", &self.voting_end_time)
    }
}

/// RFC 3339 with optional fractional seconds (Cosmos emits nanoseconds).
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ParseError::InvalidTimestamp {
            field,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Fetches the current proposal list of one chain.
#[async_trait]
pub trait ProposalSource: Send + Sync {
    async fn fetch(&self, source: &str, chain: &ChainConfig) -> Result<Vec<Proposal>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(id: &str) -> Proposal {
        Proposal {
            id: id.to_string(),
            status: ProposalStatus::Voting,
            title: "t".to_string(),
            description: "d".to_string(),
            voting_start_time: "2024-05-15T00:00:00.725539835Z".to_string(),
            voting_end_time: "2024-05-18T12:30:00Z".to_string(),
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            ProposalStatus::parse("PROPOSAL_STATUS_VOTING_PERIOD"),
            ProposalStatus::Voting
        );
        assert_eq!(
            ProposalStatus::parse("PROPOSAL_STATUS_DEPOSIT_PERIOD"),
            ProposalStatus::Pending
        );
        assert_eq!(ProposalStatus::parse("passed"), ProposalStatus::Passed);
        assert_eq!(ProposalStatus::parse("4"), ProposalStatus::Rejected);
        assert_eq!(
            ProposalStatus::parse("PROPOSAL_STATUS_FAILED"),
            ProposalStatus::Failed
        );
        assert_eq!(
            ProposalStatus::parse("PROPOSAL_STATUS_SOMETHING_NEW"),
            ProposalStatus::Unspecified
        );
        assert_eq!(ProposalStatus::parse(""), ProposalStatus::Unspecified);

        assert_eq!(ProposalStatus::from_name("PASED"), None);
        assert_eq!(
            ProposalStatus::from_name("PROPOSAL_STATUS_UNSPECIFIED"),
            Some(ProposalStatus::Unspecified)
        );
    }

    #[test]
    fn test_status_serde() {
        let status: ProposalStatus = serde_json::from_str("\"PROPOSAL_STATUS_PASSED\"").unwrap();
        assert_eq!(status, ProposalStatus::Passed);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"PASSED\"");
    }

    #[test]
    fn test_numeric_id() {
        assert_eq!(proposal("44").numeric_id(), Ok(44));
        assert_eq!(
            proposal("abc").numeric_id(),
            Err(ParseError::InvalidId("abc".to_string()))
        );
        assert!(proposal("-1").numeric_id().is_err());
    }

    #[test]
    fn test_timestamps() {
        let p = proposal("1");
        assert_eq!(
            p.voting_start().unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2024-05-15 00:00"
        );
        assert_eq!(
            p.voting_end().unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2024-05-18 12:30"
        );

        let mut bad = proposal("1");
        bad.voting_end_time = "soon".to_string();
        assert!(matches!(
            bad.voting_end(),
            Err(ParseError::InvalidTimestamp {
                field: "voting_end_time",
                ..
            })
        ));
    }
}
