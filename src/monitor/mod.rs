//! One monitoring pass over every configured chain.
//!
//! LOAD_STATE → per chain (sorted by name): FETCH → per proposal: CLASSIFY_ACT → DONE
//!
//! Only a state-load failure aborts the run. A chain that cannot be fetched is
//! logged and skipped; the others still run.

pub mod gate;
pub mod schedule;

use crate::config::Config;
use crate::engine::{CheckOutcome, DecisionEngine, EngineState, ProposalOutcome, StateDiff};
use crate::notify::{DiscordNotifier, Notifier};
use crate::proposal::{
    HttpProposalSource, HttpVoteChecker, Proposal, ProposalSource, SampleProposalSource,
    VoteChecker,
};
use crate::store::{self, StateError, StateStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub use gate::{RunGate, RunPermit};
pub use schedule::spawn_scheduler;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("failed to load alert state: {0}")]
    StateLoad(#[source] StateError),
    #[error("failed to open state store: {0}")]
    StateConnect(#[source] StateError),
    #[error("failed to build {client} client: {reason}")]
    Client { client: &'static str, reason: String },
}

/// External collaborators of a run.
#[derive(Clone)]
pub struct Services {
    pub source: Arc<dyn ProposalSource>,
    pub votes: Arc<dyn VoteChecker>,
    pub store: Arc<dyn StateStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl Services {
    /// Production wiring: LCD REST for proposals and votes, Discord webhooks,
    /// and the configured state backend.
    pub async fn from_config(config: &Config) -> Result<Self, MonitorError> {
        let timeout = config.http.timeout();
        let source = HttpProposalSource::new(timeout).map_err(|e| client_error("proposal", e))?;
        let votes = HttpVoteChecker::new(timeout).map_err(|e| client_error("vote", e))?;
        let notifier = DiscordNotifier::new(timeout).map_err(|e| client_error("discord", e))?;
        let store = store::connect(&config.storage)
            .await
            .map_err(MonitorError::StateConnect)?;

        info!(backend = ?config.storage.backend, "state store ready");

        Ok(Self {
            source: Arc::new(source),
            votes: Arc::new(votes),
            store,
            notifier: Arc::new(notifier),
        })
    }
}

fn client_error(client: &'static str, e: impl std::fmt::Display) -> MonitorError {
    MonitorError::Client {
        client,
        reason: e.to_string(),
    }
}

/// Counters for one run, returned to whoever triggered it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub mock: bool,
    pub chains: usize,
    pub chains_failed: Vec<String>,
    pub proposals_seen: usize,
    pub terminal_skipped: usize,
    pub invalid_ids: usize,
    pub new_proposal_alerts: usize,
    pub voting_end_alerts: usize,
    pub already_voted: usize,
    pub checks_skipped: usize,
    pub deliveries_failed: usize,
    pub persist_failures: usize,
    /// State added by this run.
    pub changes: StateDiff,
}

impl RunReport {
    fn new(started_at: DateTime<Utc>, mock: bool) -> Self {
        Self {
            started_at,
            mock,
            chains: 0,
            chains_failed: Vec::new(),
            proposals_seen: 0,
            terminal_skipped: 0,
            invalid_ids: 0,
            new_proposal_alerts: 0,
            voting_end_alerts: 0,
            already_voted: 0,
            checks_skipped: 0,
            deliveries_failed: 0,
            persist_failures: 0,
            changes: StateDiff::default(),
        }
    }

    fn record(&mut self, outcome: &ProposalOutcome) {
        self.proposals_seen += 1;
        match outcome {
            ProposalOutcome::Terminal(_) => self.terminal_skipped += 1,
            ProposalOutcome::InvalidId(_) => self.invalid_ids += 1,
            ProposalOutcome::Checked {
                new_proposal,
                voting_nearing,
            } => {
                if new_proposal.delivered() {
                    self.new_proposal_alerts += 1;
                }
                if voting_nearing.delivered() {
                    self.voting_end_alerts += 1;
                }
                for check in [new_proposal, voting_nearing] {
                    match check {
                        CheckOutcome::AlreadyVoted => self.already_voted += 1,
                        CheckOutcome::Skipped => self.checks_skipped += 1,
                        CheckOutcome::DeliveryFailed => self.deliveries_failed += 1,
                        CheckOutcome::DeliveredUnpersisted => self.persist_failures += 1,
                        CheckOutcome::Quiet | CheckOutcome::Delivered => {}
                    }
                }
            }
        }
    }

    pub fn alerts_sent(&self) -> usize {
        self.new_proposal_alerts + self.voting_end_alerts
    }
}

pub struct Monitor {
    config: Arc<Config>,
    services: Services,
    sample: SampleProposalSource,
}

impl Monitor {
    pub fn new(config: Arc<Config>, services: Services) -> Self {
        Self {
            config,
            services,
            sample: SampleProposalSource::default(),
        }
    }

    /// Run one pass. `mock` swaps the upstream API for canned proposals;
    /// state and delivery stay real.
    pub async fn run(&self, mock: bool, now: DateTime<Utc>) -> Result<RunReport, MonitorError> {
        if mock {
            self.run_with(&self.sample, true, now).await
        } else {
            self.run_with(self.services.source.as_ref(), false, now).await
        }
    }

    pub async fn run_with(
        &self,
        source: &dyn ProposalSource,
        mock: bool,
        now: DateTime<Utc>,
    ) -> Result<RunReport, MonitorError> {
        let store = self.services.store.as_ref();
        let mut state = EngineState::load(store)
            .await
            .map_err(MonitorError::StateLoad)?;
        let before = state.clone();

        let engine = DecisionEngine::new(
            &self.config,
            self.services.votes.as_ref(),
            store,
            self.services.notifier.as_ref(),
        );
        let mut report = RunReport::new(now, mock);

        for (name, chain) in &self.config.chains {
            report.chains += 1;

            let mut proposals = match source.fetch(name, chain).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(chain = %name, error = %e, "Error fetching proposals");
                    report.chains_failed.push(name.clone());
                    continue;
                }
            };
            sort_for_classification(&mut proposals);

            for proposal in &proposals {
                let outcome = engine
                    .classify_and_act(name, chain, proposal, &mut state, now)
                    .await;
                report.record(&outcome);
            }
        }

        report.changes = state.diff(&before);
        info!(
            chains = report.chains,
            failed = report.chains_failed.len(),
            proposals = report.proposals_seen,
            alerts = report.alerts_sent(),
            mock,
            "monitoring run complete"
        );
        Ok(report)
    }

    /// Persisted state as it stands, without running anything.
    pub async fn snapshot(&self) -> Result<EngineState, StateError> {
        EngineState::load(self.services.store.as_ref()).await
    }
}

/// Ascending numeric id; unparsable ids last, in fetch order.
fn sort_for_classification(proposals: &mut [Proposal]) {
    proposals.sort_by_key(|p| match p.numeric_id() {
        Ok(id) => (false, id),
        Err(_) => (true, 0),
    });
}
