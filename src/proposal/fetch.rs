//! Cosmos gov REST fetcher.
//!
//! Two response shapes are in the wild:
//!   gov/v1       → `{id, messages[0].content.{title,description}, ...}`
//!   gov/v1beta1  → `{proposal_id, content.{title,description}, ...}`
//! Both are normalized into [`Proposal`].

use super::{Proposal, ProposalSource, ProposalStatus, NO_DESCRIPTION, NO_TITLE};
use crate::config::ChainConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to decode proposals: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unsupported api version: {0}")]
    UnsupportedVersion(String),
}

#[derive(Debug, Deserialize)]
struct ProposalList<T> {
    #[serde(default = "Vec::new")]
    proposals: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageContent {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProposalMessage {
    #[serde(default)]
    content: Option<MessageContent>,
}

/// gov/v1 proposal (subset of fields we need).
#[derive(Debug, Deserialize)]
struct ProposalV1 {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    messages: Vec<ProposalMessage>,
    /// Newer SDKs also carry these at the top level.
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    voting_start_time: Option<String>,
    #[serde(default)]
    voting_end_time: Option<String>,
}

/// gov/v1beta1 proposal (subset of fields we need).
#[derive(Debug, Deserialize)]
struct ProposalV1Beta1 {
    proposal_id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    content: Option<MessageContent>,
    #[serde(default)]
    voting_start_time: Option<String>,
    #[serde(default)]
    voting_end_time: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl From<ProposalV1> for Proposal {
    fn from(p: ProposalV1) -> Self {
        let content = p
            .messages
            .into_iter()
            .next()
            .and_then(|m| m.content)
            .unwrap_or_default();

        Proposal {
            id: p.id,
            status: ProposalStatus::parse(&p.status),
            title: non_empty(content.title)
                .or_else(|| non_empty(p.title))
                .unwrap_or_else(|| NO_TITLE.to_string()),
            description: non_empty(content.description)
                .or_else(|| non_empty(p.summary))
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            voting_start_time: p.voting_start_time.unwrap_or_default(),
            voting_end_time: p.voting_end_time.unwrap_or_default(),
        }
    }
}

impl From<ProposalV1Beta1> for Proposal {
    fn from(p: ProposalV1Beta1) -> Self {
        let content = p.content.unwrap_or_default();
        Proposal {
            id: p.proposal_id,
            status: ProposalStatus::parse(&p.status),
            title: non_empty(content.title).unwrap_or_else(|| NO_TITLE.to_string()),
            description: non_empty(content.description)
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            voting_start_time: p.voting_start_time.unwrap_or_default(),
            voting_end_time: p.voting_end_time.unwrap_or_default(),
        }
    }
}

/// Decode a proposal list body for the given gov module version.
pub fn parse_proposals(api_version: &str, body: &str) -> Result<Vec<Proposal>, FetchError> {
    match api_version {
        "v1" => {
            let list: ProposalList<ProposalV1> = serde_json::from_str(body)?;
            Ok(list.proposals.into_iter().map(Proposal::from).collect())
        }
        "v1beta1" => {
            let list: ProposalList<ProposalV1Beta1> = serde_json::from_str(body)?;
            Ok(list.proposals.into_iter().map(Proposal::from).collect())
        }
        other => Err(FetchError::UnsupportedVersion(other.to_string())),
    }
}

pub fn proposals_url(chain: &ChainConfig) -> String {
    format!(
        "{}/cosmos/gov/{}/proposals?pagination.reverse=true",
        chain.api_endpoint.trim_end_matches('/'),
        chain.api_version
    )
}

pub struct HttpProposalSource {
    client: reqwest::Client,
}

impl HttpProposalSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProposalSource for HttpProposalSource {
    async fn fetch(&self, source: &str, chain: &ChainConfig) -> Result<Vec<Proposal>, FetchError> {
        if !matches!(chain.api_version.as_str(), "v1" | "v1beta1") {
            return Err(FetchError::UnsupportedVersion(chain.api_version.clone()));
        }

        let url = proposals_url(chain);
        debug!(chain = source, url = %url, "fetching proposals");

        let resp = self.client.get(&url).send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::ApiError { status, body });
        }

        let body = resp.text().await?;
        let proposals = parse_proposals(&chain.api_version, &body)?;
        info!(chain = source, count = proposals.len(), "fetched proposals");
        Ok(proposals)
    }
}

/// Canned proposals for mock runs. Same list for every chain.
#[derive(Debug, Clone)]
pub struct SampleProposalSource {
    proposals: Vec<Proposal>,
}

impl SampleProposalSource {
    pub fn new(proposals: Vec<Proposal>) -> Self {
        Self { proposals }
    }
}

impl Default for SampleProposalSource {
    fn default() -> Self {
        Self::new(vec![Proposal {
            id: "44".to_string(),
            status: ProposalStatus::Voting,
            title: "Governance Community Spend Guardrails".to_string(),
            description: "Introduction: As a community, it is important to ensure that we have a way to control community.".to_string(),
            voting_start_time: "2024-05-15T00:00:00.725539835Z".to_string(),
            voting_end_time: "2024-05-18T00:00:00.725539835Z".to_string(),
        }])
    }
}

#[async_trait]
impl ProposalSource for SampleProposalSource {
    async fn fetch(&self, source: &str, _chain: &ChainConfig) -> Result<Vec<Proposal>, FetchError> {
        debug!(chain = source, count = self.proposals.len(), "serving sample proposals");
        Ok(self.proposals.clone())
    }
}
