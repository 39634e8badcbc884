//! In-memory alert state for one run.

use super::AlertKind;
use crate::store::{AlertedMap, StateError, StateStore, Watermarks};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Watermarks plus both alerted sets. Loaded at the start of a run, mutated
/// as alerts are delivered, written back after every change, then dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineState {
    pub watermarks: Watermarks,
    pub new_alerted: AlertedMap,
    pub voting_end_alerted: AlertedMap,
}

/// What a run changed, per chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateDiff {
    /// chain → (before, after)
    pub watermarks: BTreeMap<String, (u64, u64)>,
    pub new_alerted: AlertedMap,
    pub voting_end_alerted: AlertedMap,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        self.watermarks.is_empty() && self.new_alerted.is_empty() && self.voting_end_alerted.is_empty()
    }
}

impl EngineState {
    /// Load all three documents. Any failure is fatal for the run.
    pub async fn load(store: &dyn StateStore) -> Result<Self, StateError> {
        let watermarks = store.load_watermarks().await?;
        let new_alerted = store.load_alerted(AlertKind::NewProposal).await?;
        let voting_end_alerted = store.load_alerted(AlertKind::VotingNearing).await?;
        debug!(
            chains = watermarks.len(),
            new_alerted = count(&new_alerted),
            voting_end_alerted = count(&voting_end_alerted),
            "loaded alert state"
        );
        Ok(Self {
            watermarks,
            new_alerted,
            voting_end_alerted,
        })
    }

    /// Highest id alerted as new for `chain`; 0 when never alerted.
    pub fn watermark(&self, chain: &str) -> u64 {
        self.watermarks.get(chain).copied().unwrap_or(0)
    }

    pub fn is_new(&self, chain: &str, id: u64) -> bool {
        id > self.watermark(chain)
    }

    pub fn alerted(&self, kind: AlertKind) -> &AlertedMap {
        match kind {
            AlertKind::NewProposal => &self.new_alerted,
            AlertKind::VotingNearing => &self.voting_end_alerted,
        }
    }

    fn alerted_mut(&mut self, kind: AlertKind) -> &mut AlertedMap {
        match kind {
            AlertKind::NewProposal => &mut self.new_alerted,
            AlertKind::VotingNearing => &mut self.voting_end_alerted,
        }
    }

    pub fn was_alerted(&self, kind: AlertKind, chain: &str, id: u64) -> bool {
        self.alerted(kind)
            .get(chain)
            .is_some_and(|ids| ids.contains(&id))
    }

    /// Record a delivered alert. For new proposals the watermark moves up to
    /// `id` (never down). Returns false when nothing changed.
    pub fn record(&mut self, kind: AlertKind, chain: &str, id: u64) -> bool {
        let mut changed = false;
        if kind == AlertKind::NewProposal {
            let watermark = self.watermarks.entry(chain.to_string()).or_insert(0);
            if id > *watermark {
                *watermark = id;
                changed = true;
            }
        }
        let inserted = self
            .alerted_mut(kind)
            .entry(chain.to_string())
            .or_default()
            .insert(id);
        changed || inserted
    }

    /// Write back the documents touched by an alert of `kind`.
    pub async fn persist(&self, kind: AlertKind, store: &dyn StateStore) -> Result<(), StateError> {
        if kind == AlertKind::NewProposal {
            store.save_watermarks(&self.watermarks).await?;
        }
        store.save_alerted(kind, self.alerted(kind)).await
    }

    /// Everything in `self` that is not in `before`.
    pub fn diff(&self, before: &EngineState) -> StateDiff {
        let watermarks = self
            .watermarks
            .iter()
            .filter_map(|(chain, &after)| {
                let prior = before.watermark(chain);
                (after > prior).then(|| (chain.clone(), (prior, after)))
            })
            .collect();

        StateDiff {
            watermarks,
            new_alerted: added(&self.new_alerted, &before.new_alerted),
            voting_end_alerted: added(&self.voting_end_alerted, &before.voting_end_alerted),
        }
    }
}

fn added(after: &AlertedMap, before: &AlertedMap) -> AlertedMap {
    after
        .iter()
        .filter_map(|(chain, ids)| {
            let fresh: std::collections::BTreeSet<u64> = match before.get(chain) {
                Some(prior) => ids.difference(prior).copied().collect(),
                None => ids.clone(),
            };
            (!fresh.is_empty()).then(|| (chain.clone(), fresh))
        })
        .collect()
}

fn count(map: &AlertedMap) -> usize {
    map.values().map(|ids| ids.len()).sum()
}
