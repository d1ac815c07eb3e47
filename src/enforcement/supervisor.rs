use std::collections::HashMap;

use super::reporter::{Reporter, ReporterHandle};
use crate::budget::UserId;

/// Keeps at most one running reporter per user.
///
/// Screens come and go; the supervisor is owned by the session lifetime
/// object instead, so mounting again from another screen reuses the loop
/// that is already running.
pub struct Supervisor {
    reporter: Reporter,
    running: HashMap<UserId, ReporterHandle>,
}

impl Supervisor {
    pub fn new(reporter: Reporter) -> Self {
        Self {
            reporter,
            running: HashMap::new(),
        }
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Ensure a loop runs for the current user and for nobody else. Returns
    /// the user, or `None` when nobody is signed in.
    pub async fn mount(&mut self) -> Option<UserId> {
        let resolved = self.reporter.resolve_user().await;
        self.stop_others(resolved.as_ref()).await;
        let user = resolved?;

        if self.is_mounted(&user) {
            tracing::debug!("Reporter for {} already running", user);
            return Some(user);
        }

        // A finished handle may still be in the map
        self.running.remove(&user);
        let handle = self.reporter.spawn(user.clone());
        self.running.insert(user.clone(), handle);
        Some(user)
    }

    pub fn is_mounted(&self, user: &UserId) -> bool {
        self.running.get(user).is_some_and(ReporterHandle::is_running)
    }

    /// Stop the loop for `user` and wait for it to exit
    pub async fn unmount(&mut self, user: &UserId) {
        if let Some(handle) = self.running.remove(user) {
            handle.shutdown().await;
        }
    }

    async fn stop_others(&mut self, current: Option<&UserId>) {
        let stale: Vec<UserId> = self
            .running
            .keys()
            .filter(|user| Some(*user) != current)
            .cloned()
            .collect();

        for user in stale {
            tracing::info!("{} is no longer signed in, stopping their reporter", user);
            self.unmount(&user).await;
        }
    }

    /// Stop every loop
    pub async fn shutdown(&mut self) {
        for (_, handle) in self.running.drain() {
            handle.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{BudgetLedger, BudgetService};
    use crate::enforcement::effects::{LogNotifier, OverrideStore, RouteNavigator};
    use crate::enforcement::gate::{BudgetView, LockGate};
    use crate::enforcement::reporter::{Collaborators, ReporterSettings};
    use crate::identity::{IdentityProvider, StaticIdentity};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct NeverUnlocked;

    impl OverrideStore for NeverUnlocked {
        fn is_unlocked(&self) -> anyhow::Result<bool> {
            Ok(false)
        }
    }

    /// Identity that can change between mounts
    struct SwitchingIdentity(Mutex<Option<UserId>>);

    impl SwitchingIdentity {
        fn new(user: &str) -> Arc<Self> {
            Arc::new(Self(Mutex::new(Some(UserId::new(user)))))
        }

        fn switch_to(&self, user: Option<&str>) {
            *self.0.lock().unwrap() = user.map(UserId::from);
        }
    }

    #[async_trait]
    impl IdentityProvider for SwitchingIdentity {
        async fn current_user(&self) -> anyhow::Result<Option<UserId>> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    fn supervisor(ledger: Arc<BudgetLedger>, user: Option<&str>) -> Supervisor {
        supervisor_with(ledger, Arc::new(StaticIdentity::new(user.map(UserId::from))))
    }

    fn supervisor_with(ledger: Arc<BudgetLedger>, identity: Arc<dyn IdentityProvider>) -> Supervisor {
        let reporter = Reporter::new(
            Collaborators {
                service: ledger,
                identity,
                overrides: Arc::new(NeverUnlocked),
                notifier: Arc::new(LogNotifier),
                navigator: Arc::new(RouteNavigator::new("/main")),
            },
            LockGate::new(),
            BudgetView::new(),
            ReporterSettings::default(),
        );
        Supervisor::new(reporter)
    }

    #[tokio::test(start_paused = true)]
    async fn second_mount_reuses_running_loop() {
        let ledger = Arc::new(BudgetLedger::new());
        let user = UserId::new("kid-1");
        ledger.set_allowance(&user, Some(600));
        let mut supervisor = supervisor(ledger.clone(), Some("kid-1"));

        assert_eq!(supervisor.mount().await, Some(user.clone()));
        assert_eq!(supervisor.mount().await, Some(user.clone()));
        assert!(supervisor.is_mounted(&user));

        tokio::time::sleep(Duration::from_secs(2 * 60 + 1)).await;
        // One loop: two ticks of 60s, not four
        assert_eq!(ledger.today_record(&user).unwrap().used_seconds, 120);
        assert_eq!(
            ledger.get_status(&user).await.unwrap().remaining_seconds,
            Some(480)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_then_mount_starts_fresh() {
        let ledger = Arc::new(BudgetLedger::new());
        let user = UserId::new("kid-1");
        let mut supervisor = supervisor(ledger.clone(), Some("kid-1"));

        supervisor.mount().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        supervisor.unmount(&user).await;
        assert!(!supervisor.is_mounted(&user));

        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        assert_eq!(ledger.today_record(&user).unwrap().used_seconds, 0);

        supervisor.mount().await;
        assert!(supervisor.is_mounted(&user));
        supervisor.shutdown().await;
        assert!(!supervisor.is_mounted(&user));
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_mount_is_a_noop() {
        let ledger = Arc::new(BudgetLedger::new());
        let mut supervisor = supervisor(ledger.clone(), None);

        assert_eq!(supervisor.mount().await, None);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(ledger.today_record(&UserId::new("kid-1")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn switching_users_stops_the_previous_loop() {
        let ledger = Arc::new(BudgetLedger::new());
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let identity = SwitchingIdentity::new("alice");
        let mut supervisor = supervisor_with(ledger.clone(), identity.clone());

        assert_eq!(supervisor.mount().await, Some(alice.clone()));
        tokio::time::sleep(Duration::from_secs(61)).await;

        identity.switch_to(Some("bob"));
        assert_eq!(supervisor.mount().await, Some(bob.clone()));
        assert!(!supervisor.is_mounted(&alice));
        assert!(supervisor.is_mounted(&bob));

        tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;
        assert_eq!(ledger.today_record(&alice).unwrap().used_seconds, 60);
        assert_eq!(ledger.today_record(&bob).unwrap().used_seconds, 300);
    }

    #[tokio::test(start_paused = true)]
    async fn signing_out_stops_every_loop() {
        let ledger = Arc::new(BudgetLedger::new());
        let alice = UserId::new("alice");
        let identity = SwitchingIdentity::new("alice");
        let mut supervisor = supervisor_with(ledger.clone(), identity.clone());

        supervisor.mount().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        identity.switch_to(None);
        assert_eq!(supervisor.mount().await, None);
        assert!(!supervisor.is_mounted(&alice));

        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        assert_eq!(ledger.today_record(&alice).unwrap().used_seconds, 0);
    }
}
