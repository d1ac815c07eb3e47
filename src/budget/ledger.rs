use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{BudgetError, BudgetResult, BudgetService, BudgetState, UserId};

type Clock = Box<dyn Fn() -> NaiveDate + Send + Sync>;

/// Usage recorded for one user on one day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayRecord {
    pub used_seconds: u64,
}

#[derive(Default)]
struct LedgerInner {
    /// Daily allowance per user; absent means unlimited
    allowances: HashMap<UserId, u64>,
    records: HashMap<(UserId, NaiveDate), DayRecord>,
}

/// In-memory, authoritative budget store.
///
/// Days are taken from the injected clock, so the first `open_session` after
/// midnight starts a fresh record.
pub struct BudgetLedger {
    inner: Mutex<LedgerInner>,
    today: Clock,
}

impl BudgetLedger {
    /// Create a ledger keyed by the local calendar date
    pub fn new() -> Self {
        Self::with_clock(|| Local::now().date_naive())
    }

    /// Create a ledger with a custom notion of "today"
    pub fn with_clock<F>(today: F) -> Self
    where
        F: Fn() -> NaiveDate + Send + Sync + 'static,
    {
        Self {
            inner: Mutex::new(LedgerInner::default()),
            today: Box::new(today),
        }
    }

    /// Configure the daily allowance for a user. `None` removes the limit.
    pub fn set_allowance(&self, user: &UserId, daily_seconds: Option<u64>) {
        let mut inner = self.lock();
        match daily_seconds {
            Some(seconds) => {
                inner.allowances.insert(user.clone(), seconds);
            }
            None => {
                inner.allowances.remove(user);
            }
        }
    }

    /// Today's record for a user, if a session was opened
    pub fn today_record(&self, user: &UserId) -> Option<DayRecord> {
        let day = (self.today)();
        self.lock().records.get(&(user.clone(), day)).copied()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        // Every update is a single insert or add; poisoned data is still whole
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for BudgetLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BudgetService for BudgetLedger {
    async fn open_session(&self, user: &UserId) -> BudgetResult<()> {
        let day = (self.today)();
        let mut inner = self.lock();

        if inner.records.contains_key(&(user.clone(), day)) {
            tracing::debug!("Usage session for {} on {} already exists", user, day);
        } else {
            inner.records.insert((user.clone(), day), DayRecord::default());
            tracing::info!("Usage session created for {} on {}", user, day);
        }
        Ok(())
    }

    async fn accumulate_usage(&self, user: &UserId, seconds: u64) -> BudgetResult<()> {
        let day = (self.today)();
        let mut inner = self.lock();

        let record = inner
            .records
            .get_mut(&(user.clone(), day))
            .ok_or_else(|| BudgetError::SessionNotFound(user.clone()))?;
        record.used_seconds = record.used_seconds.saturating_add(seconds);

        tracing::debug!("{} has used {}s on {}", user, record.used_seconds, day);
        Ok(())
    }

    async fn get_status(&self, user: &UserId) -> BudgetResult<BudgetState> {
        let day = (self.today)();
        let inner = self.lock();

        let Some(&allowance) = inner.allowances.get(user) else {
            return Ok(BudgetState::unlimited());
        };

        let used = inner
            .records
            .get(&(user.clone(), day))
            .map(|r| r.used_seconds)
            .unwrap_or(0);

        Ok(BudgetState::limited(allowance.saturating_sub(used)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn ledger_with(user: &UserId, allowance: u64) -> BudgetLedger {
        let ledger = BudgetLedger::new();
        ledger.set_allowance(user, Some(allowance));
        ledger
    }

    #[tokio::test]
    async fn open_session_is_idempotent() {
        let user = UserId::new("kid-1");
        let ledger = ledger_with(&user, 600);

        ledger.open_session(&user).await.unwrap();
        ledger.accumulate_usage(&user, 60).await.unwrap();
        let once = ledger.get_status(&user).await.unwrap();

        ledger.open_session(&user).await.unwrap();
        let twice = ledger.get_status(&user).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice, BudgetState::limited(540));
    }

    #[tokio::test]
    async fn accumulation_is_conserved_and_clamped() {
        let user = UserId::new("kid-1");
        let ledger = ledger_with(&user, 1000);
        ledger.open_session(&user).await.unwrap();

        for secs in [60, 5, 300, 35] {
            ledger.accumulate_usage(&user, secs).await.unwrap();
        }
        assert_eq!(ledger.get_status(&user).await.unwrap(), BudgetState::limited(600));

        ledger.accumulate_usage(&user, 5000).await.unwrap();
        assert_eq!(ledger.get_status(&user).await.unwrap(), BudgetState::limited(0));
        assert_eq!(ledger.today_record(&user).unwrap().used_seconds, 5400);
    }

    #[tokio::test]
    async fn accumulation_order_does_not_matter() {
        let user = UserId::new("kid-1");
        let a = ledger_with(&user, 900);
        let b = ledger_with(&user, 900);
        a.open_session(&user).await.unwrap();
        b.open_session(&user).await.unwrap();

        for secs in [10, 200, 30] {
            a.accumulate_usage(&user, secs).await.unwrap();
        }
        for secs in [30, 10, 200] {
            b.accumulate_usage(&user, secs).await.unwrap();
        }

        assert_eq!(a.get_status(&user).await.unwrap(), b.get_status(&user).await.unwrap());
    }

    #[tokio::test]
    async fn accumulate_requires_open_session() {
        let user = UserId::new("kid-1");
        let ledger = ledger_with(&user, 600);

        let err = ledger.accumulate_usage(&user, 60).await.unwrap_err();
        assert!(matches!(err, BudgetError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn status_without_allowance_is_unlimited() {
        let user = UserId::new("kid-1");
        let ledger = BudgetLedger::new();
        ledger.open_session(&user).await.unwrap();
        ledger.accumulate_usage(&user, 60).await.unwrap();

        assert_eq!(ledger.get_status(&user).await.unwrap(), BudgetState::unlimited());
    }

    #[tokio::test]
    async fn new_day_starts_a_new_record() {
        let offset = Arc::new(AtomicI64::new(0));
        let clock_offset = offset.clone();
        let base = NaiveDate::from_ymd_opt(2025, 11, 16).unwrap();
        let ledger = BudgetLedger::with_clock(move || {
            base + chrono::Duration::days(clock_offset.load(Ordering::SeqCst))
        });

        let user = UserId::new("kid-1");
        ledger.set_allowance(&user, Some(600));
        ledger.open_session(&user).await.unwrap();
        ledger.accumulate_usage(&user, 600).await.unwrap();
        assert_eq!(ledger.get_status(&user).await.unwrap(), BudgetState::limited(0));

        offset.store(1, Ordering::SeqCst);
        assert_eq!(ledger.get_status(&user).await.unwrap(), BudgetState::limited(600));
        assert!(ledger.accumulate_usage(&user, 60).await.is_err());

        ledger.open_session(&user).await.unwrap();
        ledger.accumulate_usage(&user, 60).await.unwrap();
        assert_eq!(ledger.get_status(&user).await.unwrap(), BudgetState::limited(540));
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let ledger = ledger_with(&alice, 600);
        ledger.set_allowance(&bob, Some(600));

        ledger.open_session(&alice).await.unwrap();
        ledger.open_session(&bob).await.unwrap();
        ledger.accumulate_usage(&alice, 300).await.unwrap();

        assert_eq!(ledger.get_status(&alice).await.unwrap(), BudgetState::limited(300));
        assert_eq!(ledger.get_status(&bob).await.unwrap(), BudgetState::limited(600));
    }
}
