use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Allows at most one monitoring run at a time. Shared by the HTTP trigger
/// and the scheduler; a caller that cannot get in is turned away, not queued.
#[derive(Debug, Clone, Default)]
pub struct RunGate {
    inner: Arc<Mutex<()>>,
}

/// Held for the duration of a run.
pub type RunPermit = OwnedMutexGuard<()>;

impl RunGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another run holds the gate.
    pub fn try_enter(&self) -> Option<RunPermit> {
        self.inner.clone().try_lock_owned().ok()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_entry() {
        let gate = RunGate::new();
        let permit = gate.try_enter();
        assert!(permit.is_some());
        assert!(gate.is_busy());
        assert!(gate.clone().try_enter().is_none());

        drop(permit);
        assert!(!gate.is_busy());
        assert!(gate.try_enter().is_some());
    }
}
