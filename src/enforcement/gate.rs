use std::sync::Arc;
use tokio::sync::watch;

use super::policy::LockState;
use crate::budget::BudgetState;

/// Process-wide lock mode.
///
/// The reporter is the only writer; route guards and status surfaces read
/// the current value or `subscribe` to changes.
#[derive(Clone)]
pub struct LockGate {
    tx: Arc<watch::Sender<LockState>>,
}

impl LockGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LockState::Unlocked);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> LockState {
        *self.tx.borrow()
    }

    pub fn is_locked(&self) -> bool {
        self.current().is_locked()
    }

    pub fn subscribe(&self) -> watch::Receiver<LockState> {
        self.tx.subscribe()
    }

    /// Returns true if the state changed
    pub(crate) fn publish(&self, state: LockState) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            tracing::info!("Lock state is now {:?}", state);
        }
        changed
    }
}

impl Default for LockGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Latest budget fetched from the service, replaced wholesale on every
/// successful fetch and never edited locally
#[derive(Clone)]
pub struct BudgetView {
    tx: Arc<watch::Sender<Option<BudgetState>>>,
}

impl BudgetView {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// `None` until the first successful fetch
    pub fn latest(&self) -> Option<BudgetState> {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<BudgetState>> {
        self.tx.subscribe()
    }

    pub(crate) fn replace(&self, state: BudgetState) {
        self.tx.send_replace(Some(state));
    }
}

impl Default for BudgetView {
    fn default() -> Self {
        Self::new()
    }
}
