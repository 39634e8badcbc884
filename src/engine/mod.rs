//! Notification decisions.
//!
//! For every fetched proposal the engine runs two independent checks:
//! - new proposal: numeric id above the chain's watermark
//! - voting nearing end: VOTING status, not yet reminded, end within the window
//!
//! A check only mutates [`EngineState`] after its notification was delivered,
//! and the touched documents are written back before the next proposal is
//! looked at. Nothing delivered → nothing recorded → retried next run.

pub mod message;
pub mod state;

use crate::config::{ChainConfig, Config, VotingAlertBehavior};
use crate::notify::{Notifier, NotifierError};
use crate::proposal::{ParseError, Proposal, ProposalStatus, VoteChecker};
use crate::store::StateStore;
use chrono::{DateTime, Duration, Utc};
use message::AlertMessage;
use tracing::{debug, error, info, warn};

pub use state::{EngineState, StateDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    NewProposal,
    VotingNearing,
}

impl AlertKind {
    /// Heading used in the rendered message.
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::NewProposal => "📝 New proposal on",
            AlertKind::VotingNearing => "🕒 Voting period is nearing its end",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::NewProposal => write!(f, "new_proposal"),
            AlertKind::VotingNearing => write!(f, "voting_nearing"),
        }
    }
}

/// Result of one check on one proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Nothing to send: not new, not voting, already reminded, or outside the window.
    Quiet,
    /// Validator already voted (`only_if_not_voted`).
    AlreadyVoted,
    /// Unparsable end time or failed vote lookup. Retried next run.
    Skipped,
    Delivered,
    /// Delivered, but writing the state back failed.
    DeliveredUnpersisted,
    /// Not delivered. Retried next run.
    DeliveryFailed,
}

impl CheckOutcome {
    pub fn delivered(&self) -> bool {
        matches!(self, CheckOutcome::Delivered | CheckOutcome::DeliveredUnpersisted)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProposalOutcome {
    /// Status in the terminal set; never alerted.
    Terminal(ProposalStatus),
    /// Id is not an integer; the whole proposal is skipped.
    InvalidId(ParseError),
    Checked {
        new_proposal: CheckOutcome,
        voting_nearing: CheckOutcome,
    },
}

pub struct DecisionEngine<'a> {
    config: &'a Config,
    votes: &'a dyn VoteChecker,
    store: &'a dyn StateStore,
    notifier: &'a dyn Notifier,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(
        config: &'a Config,
        votes: &'a dyn VoteChecker,
        store: &'a dyn StateStore,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            config,
            votes,
            store,
            notifier,
        }
    }

    /// Classify one proposal of `chain_name` and send whatever is due.
    pub async fn classify_and_act(
        &self,
        chain_name: &str,
        chain: &ChainConfig,
        proposal: &Proposal,
        state: &mut EngineState,
        now: DateTime<Utc>,
    ) -> ProposalOutcome {
        if self.config.alerts.is_terminal(proposal.status) {
            debug!(chain = chain_name, id = %proposal.id, status = %proposal.status, "skipping terminal proposal");
            return ProposalOutcome::Terminal(proposal.status);
        }

        let id = match proposal.numeric_id() {
            Ok(id) => id,
            Err(e) => {
                warn!(chain = chain_name, error = %e, "Invalid proposal ID");
                return ProposalOutcome::InvalidId(e);
            }
        };

        // Independent checks: a failure in one never blocks the other
        let new_proposal = self
            .check_new_proposal(chain_name, chain, proposal, id, state, now)
            .await;
        let voting_nearing = self
            .check_voting_nearing(chain_name, chain, proposal, id, state, now)
            .await;

        ProposalOutcome::Checked {
            new_proposal,
            voting_nearing,
        }
    }

    async fn check_new_proposal(
        &self,
        chain_name: &str,
        chain: &ChainConfig,
        proposal: &Proposal,
        id: u64,
        state: &mut EngineState,
        now: DateTime<Utc>,
    ) -> CheckOutcome {
        if !state.is_new(chain_name, id) {
            return CheckOutcome::Quiet;
        }

        let time_left = proposal.voting_end().ok().map(|end| end - now);
        if let Err(e) = self
            .deliver(AlertKind::NewProposal, chain_name, chain, proposal, time_left)
            .await
        {
            warn!(chain = chain_name, id, error = %e, "Error sending alert for new proposal");
            return CheckOutcome::DeliveryFailed;
        }

        let previous = state.watermark(chain_name);
        state.record(AlertKind::NewProposal, chain_name, id);
        info!(chain = chain_name, id, previous, "new proposal alerted");

        self.commit(AlertKind::NewProposal, chain_name, id, state).await
    }

    async fn check_voting_nearing(
        &self,
        chain_name: &str,
        chain: &ChainConfig,
        proposal: &Proposal,
        id: u64,
        state: &mut EngineState,
        now: DateTime<Utc>,
    ) -> CheckOutcome {
        if proposal.status != ProposalStatus::Voting {
            return CheckOutcome::Quiet;
        }

        let end = match proposal.voting_end() {
            Ok(end) => end,
            Err(e) => {
                warn!(chain = chain_name, id, error = %e, "Error parsing voting end time");
                return CheckOutcome::Skipped;
            }
        };

        if state.was_alerted(AlertKind::VotingNearing, chain_name, id) {
            return CheckOutcome::Quiet;
        }

        let time_left = end - now;
        if time_left > self.config.alerts.voting_window() {
            return CheckOutcome::Quiet;
        }

        if self.config.voting_alert_behavior_nearing == VotingAlertBehavior::OnlyIfNotVoted {
            match self
                .votes
                .has_voted(chain, &proposal.id, &chain.validator_address)
                .await
            {
                Ok(true) => {
                    debug!(chain = chain_name, id, "validator already voted, no reminder");
                    return CheckOutcome::AlreadyVoted;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(chain = chain_name, id, error = %e, "vote check failed");
                    return CheckOutcome::Skipped;
                }
            }
        }

        if let Err(e) = self
            .deliver(AlertKind::VotingNearing, chain_name, chain, proposal, Some(time_left))
            .await
        {
            warn!(chain = chain_name, id, error = %e, "Error sending alert for voting nearing end");
            return CheckOutcome::DeliveryFailed;
        }

        state.record(AlertKind::VotingNearing, chain_name, id);
        info!(chain = chain_name, id, hours_left = time_left.num_hours(), "voting end reminder sent");

        self.commit(AlertKind::VotingNearing, chain_name, id, state).await
    }

    async fn deliver(
        &self,
        kind: AlertKind,
        chain_name: &str,
        chain: &ChainConfig,
        proposal: &Proposal,
        time_left: Option<Duration>,
    ) -> Result<(), NotifierError> {
        let destination = chain
            .webhook(&self.config.discord)
            .ok_or_else(|| NotifierError::NoDestination(chain_name.to_string()))?;

        let url = message::detail_url(
            &self.config.proposal_detail_domain,
            chain_name,
            &chain.explorer_url,
            &proposal.id,
        );
        let message = AlertMessage::render(
            kind,
            chain_name,
            proposal,
            &url,
            time_left,
            &self.config.alerts,
        );

        self.notifier.send(destination, &message).await
    }

    /// Persist after a delivery. A failed write keeps the in-memory record so
    /// this run does not alert twice; the next run may repeat the alert once.
    async fn commit(
        &self,
        kind: AlertKind,
        chain_name: &str,
        id: u64,
        state: &EngineState,
    ) -> CheckOutcome {
        match state.persist(kind, self.store).await {
            Ok(()) => CheckOutcome::Delivered,
            Err(e) => {
                error!(chain = chain_name, id, kind = %kind, error = %e, "error saving state");
                CheckOutcome::DeliveredUnpersisted
            }
        }
    }
}
