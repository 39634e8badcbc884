use crate::config::ChainConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum VoteCheckError {
    #[error("vote lookup failed for proposal {proposal_id}: {source}")]
    Request {
        proposal_id: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode vote for proposal {proposal_id}: {reason}")]
    Decode { proposal_id: String, reason: String },
    #[error("unsupported api version: {0}")]
    UnsupportedVersion(String),
}

/// Answers "has this voter already voted on this proposal?".
#[async_trait]
pub trait VoteChecker: Send + Sync {
    async fn has_voted(
        &self,
        chain: &ChainConfig,
        proposal_id: &str,
        voter: &str,
    ) -> Result<bool, VoteCheckError>;
}

/// Both gov/v1 and gov/v1beta1 wrap the vote the same way for our purposes.
#[derive(Debug, Deserialize)]
struct VoteResponse {
    vote: Vote,
}

#[derive(Debug, Deserialize)]
struct Vote {
    #[serde(default)]
    voter: String,
}

pub fn vote_url(chain: &ChainConfig, proposal_id: &str, voter: &str) -> String {
    format!(
        "{}/cosmos/gov/{}/proposals/{}/votes/{}",
        chain.api_endpoint.trim_end_matches('/'),
        chain.api_version,
        proposal_id,
        voter
    )
}

/// True when the body is a vote cast by `voter`.
pub fn parse_vote(body: &str, proposal_id: &str, voter: &str) -> Result<bool, VoteCheckError> {
    let resp: VoteResponse = serde_json::from_str(body).map_err(|e| VoteCheckError::Decode {
        proposal_id: proposal_id.to_string(),
        reason: e.to_string(),
    })?;
    Ok(resp.vote.voter == voter)
}

pub struct HttpVoteChecker {
    client: reqwest::Client,
}

impl HttpVoteChecker {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl VoteChecker for HttpVoteChecker {
    async fn has_voted(
        &self,
        chain: &ChainConfig,
        proposal_id: &str,
        voter: &str,
    ) -> Result<bool, VoteCheckError> {
        if !matches!(chain.api_version.as_str(), "v1" | "v1beta1") {
            return Err(VoteCheckError::UnsupportedVersion(chain.api_version.clone()));
        }

        let url = vote_url(chain, proposal_id, voter);
        let request_err = |source| VoteCheckError::Request {
            proposal_id: proposal_id.to_string(),
            source,
        };

        let resp = self.client.get(&url).send().await.map_err(request_err)?;

        // The LCD answers 404/400 when no vote exists
        if resp.status().as_u16() != 200 {
            debug!(
                proposal_id,
                voter,
                status = resp.status().as_u16(),
                "no vote found"
            );
            return Ok(false);
        }

        let body = resp.text().await.map_err(request_err)?;
        parse_vote(&body, proposal_id, voter)
    }
}
