//! In-process fakes for the engine seams, plus a loopback HTTP server for
//! exercising the real REST and webhook clients.

use crate::config::ChainConfig;
use crate::engine::message::AlertMessage;
use crate::engine::AlertKind;
use crate::notify::{Notifier, NotifierError};
use crate::proposal::{FetchError, Proposal, ProposalSource, VoteCheckError, VoteChecker};
use crate::store::{AlertedMap, MemoryStateStore, StateError, StateStore, Watermarks};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Records every delivery; fails on demand.
#[derive(Debug, Default)]
pub struct FakeNotifier {
    sent: Mutex<Vec<(String, AlertMessage)>>,
    attempts: AtomicUsize,
    fail_ids: Mutex<HashSet<String>>,
    fail_kinds: Mutex<HashSet<AlertKind>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every alert for proposal `id`.
    pub fn fail_for(&self, id: &str) {
        self.fail_ids.lock().unwrap().insert(id.to_string());
    }

    /// Reject every alert of `kind`.
    pub fn fail_kind(&self, kind: AlertKind) {
        self.fail_kinds.lock().unwrap().insert(kind);
    }

    pub fn heal(&self) {
        self.fail_ids.lock().unwrap().clear();
        self.fail_kinds.lock().unwrap().clear();
    }

    /// Successful deliveries as (destination, message), in order.
    pub fn sent(&self) -> Vec<(String, AlertMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send(&self, destination: &str, message: &AlertMessage) -> Result<(), NotifierError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let rejected = self.fail_ids.lock().unwrap().contains(&message.proposal_id)
            || self.fail_kinds.lock().unwrap().contains(&message.kind);
        if rejected {
            return Err(NotifierError::Rejected {
                status: 500,
                body: "fake failure".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), message.clone()));
        Ok(())
    }
}

/// Vote lookups answered from a table. Unknown ids are "not voted".
#[derive(Debug, Default)]
pub struct FakeVotes {
    voted: Mutex<HashMap<String, bool>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeVotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_voted(&self, id: &str, voted: bool) {
        self.voted.lock().unwrap().insert(id.to_string(), voted);
    }

    pub fn fail_for(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    /// Lookups made, as (proposal id, voter).
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoteChecker for FakeVotes {
    async fn has_voted(
        &self,
        _chain: &ChainConfig,
        proposal_id: &str,
        voter: &str,
    ) -> Result<bool, VoteCheckError> {
        self.calls
            .lock()
            .unwrap()
            .push((proposal_id.to_string(), voter.to_string()));
        if self.failing.lock().unwrap().contains(proposal_id) {
            return Err(VoteCheckError::Decode {
                proposal_id: proposal_id.to_string(),
                reason: "fake failure".to_string(),
            });
        }
        Ok(self
            .voted
            .lock()
            .unwrap()
            .get(proposal_id)
            .copied()
            .unwrap_or(false))
    }
}

/// Memory store that counts writes and can refuse loads or saves.
#[derive(Debug, Default)]
pub struct FakeStore {
    inner: MemoryStateStore,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Successful document writes.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn check_load(&self) -> Result<(), StateError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StateError::Unavailable("fake load failure".to_string()));
        }
        Ok(())
    }

    fn check_save(&self) -> Result<(), StateError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StateError::Unavailable("fake save failure".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl StateStore for FakeStore {
    async fn load_watermarks(&self) -> Result<Watermarks, StateError> {
        self.check_load()?;
        self.inner.load_watermarks().await
    }

    async fn save_watermarks(&self, watermarks: &Watermarks) -> Result<(), StateError> {
        self.check_save()?;
        self.inner.save_watermarks(watermarks).await
    }

    async fn load_alerted(&self, kind: AlertKind) -> Result<AlertedMap, StateError> {
        self.check_load()?;
        self.inner.load_alerted(kind).await
    }

    async fn save_alerted(&self, kind: AlertKind, alerted: &AlertedMap) -> Result<(), StateError> {
        self.check_save()?;
        self.inner.save_alerted(kind, alerted).await
    }
}

/// Per-chain proposal lists. Chains without an entry fail to fetch.
#[derive(Debug, Default)]
pub struct FakeSource {
    proposals: Mutex<HashMap<String, Vec<Proposal>>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, chain: &str, proposals: Vec<Proposal>) {
        self.proposals
            .lock()
            .unwrap()
            .insert(chain.to_string(), proposals);
    }
}

#[async_trait]
impl ProposalSource for FakeSource {
    async fn fetch(&self, source: &str, _chain: &ChainConfig) -> Result<Vec<Proposal>, FetchError> {
        self.proposals
            .lock()
            .unwrap()
            .get(source)
            .cloned()
            .ok_or_else(|| FetchError::ApiError {
                status: 503,
                body: format!("{source} unavailable"),
            })
    }
}

/// Serve `router` on an ephemeral loopback port for the rest of the test.
/// Returns the base URL, e.g. `http://127.0.0.1:41234`.
pub async fn serve_local(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
