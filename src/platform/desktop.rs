use anyhow::Result;
use std::sync::Arc;

use crate::config::LockAction;
use crate::enforcement::effects::{WARNING_MESSAGE, WARNING_TITLE, same_route};
use crate::enforcement::{Navigator, Notifier, RouteNavigator};

/// Shows the low-time warning as a desktop notification
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn warn_time_low(&self, remaining_seconds: u64) -> Result<()> {
        tracing::info!(remaining_seconds, "Showing low-time warning");
        super::send_notification(WARNING_TITLE, WARNING_MESSAGE)
    }
}

/// The OS session a desktop agent locks. Both calls may block.
pub trait DesktopSession: Send + Sync {
    fn lock(&self, action: LockAction) -> Result<()>;

    /// `Some(true)` while the OS shows its lock screen, `None` when unknown
    fn is_locked(&self) -> Option<bool>;
}

/// The session this process runs in
pub struct SystemSession;

impl DesktopSession for SystemSession {
    fn lock(&self, action: LockAction) -> Result<()> {
        super::lock_computer(action)
    }

    fn is_locked(&self) -> Option<bool> {
        super::session_locked()
    }
}

/// Navigator for a headless desktop agent: routes are tracked in memory and
/// entering the locked route locks the session.
///
/// The locked route only counts as shown while the OS reports the session
/// locked. Once the user unlocks it (or the OS cannot say), the navigator
/// reports the home route, so the next locked evaluation locks again.
pub struct DesktopNavigator {
    routes: RouteNavigator,
    home_route: String,
    locked_route: String,
    action: LockAction,
    session: Arc<dyn DesktopSession>,
}

impl DesktopNavigator {
    pub fn new(home_route: &str, locked_route: &str, action: LockAction) -> Self {
        Self::with_session(home_route, locked_route, action, Arc::new(SystemSession))
    }

    pub fn with_session(
        home_route: &str,
        locked_route: &str,
        action: LockAction,
        session: Arc<dyn DesktopSession>,
    ) -> Self {
        Self {
            routes: RouteNavigator::new(home_route),
            home_route: home_route.to_string(),
            locked_route: locked_route.to_string(),
            action,
            session,
        }
    }
}

impl Navigator for DesktopNavigator {
    fn current_route(&self) -> String {
        let route = self.routes.current_route();
        if !same_route(&route, &self.locked_route) {
            return route;
        }

        match self.session.is_locked() {
            Some(true) => route,
            Some(false) => {
                tracing::info!("Session was unlocked while time is up");
                self.home_route.clone()
            }
            None => self.home_route.clone(),
        }
    }

    fn replace(&self, route: &str) -> Result<()> {
        self.routes.replace(route)?;

        if same_route(route, &self.locked_route) {
            tracing::warn!("Time is up, applying {:?}", self.action);
            self.session.lock(self.action)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{BudgetLedger, UserId};
    use crate::enforcement::effects::{LogNotifier, OverrideStore};
    use crate::enforcement::{BudgetView, Collaborators, LockGate, Reporter, ReporterSettings};
    use crate::identity::StaticIdentity;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Session that records lock calls and reports a fixed lock state
    struct RecordingSession {
        locks: Mutex<Vec<LockAction>>,
        locked: Option<bool>,
        fail: bool,
    }

    impl RecordingSession {
        fn new(locked: Option<bool>) -> Arc<Self> {
            Arc::new(Self {
                locks: Mutex::new(Vec::new()),
                locked,
                fail: false,
            })
        }

        fn locks(&self) -> Vec<LockAction> {
            self.locks.lock().unwrap().clone()
        }
    }

    impl DesktopSession for RecordingSession {
        fn lock(&self, action: LockAction) -> Result<()> {
            self.locks.lock().unwrap().push(action);
            if self.fail {
                anyhow::bail!("no locker");
            }
            Ok(())
        }

        fn is_locked(&self) -> Option<bool> {
            self.locked
        }
    }

    fn navigator(session: Arc<RecordingSession>) -> DesktopNavigator {
        DesktopNavigator::with_session("/main", "/(parent)/locked", LockAction::Logout, session)
    }

    #[test]
    fn entering_locked_route_locks_session() {
        let session = RecordingSession::new(Some(true));
        let nav = navigator(session.clone());

        nav.replace("/(parent)/locked").unwrap();
        assert_eq!(session.locks(), vec![LockAction::Logout]);
        assert!(nav.is_showing("/(parent)/locked"));
    }

    #[test]
    fn other_routes_do_not_lock() {
        let session = RecordingSession::new(Some(true));
        let nav = navigator(session.clone());

        nav.replace("/settings").unwrap();
        nav.replace("/main").unwrap();
        assert!(session.locks().is_empty());
    }

    #[test]
    fn unlocked_session_is_not_on_the_locked_route() {
        let session = RecordingSession::new(Some(false));
        let nav = navigator(session);

        nav.replace("/(parent)/locked").unwrap();
        assert!(!nav.is_showing("/(parent)/locked"));
        assert_eq!(nav.current_route(), "/main");
    }

    #[test]
    fn lock_failure_is_reported() {
        let session = Arc::new(RecordingSession {
            locks: Mutex::new(Vec::new()),
            locked: None,
            fail: true,
        });
        let nav = navigator(session.clone());

        assert!(nav.replace("/(parent)/locked").is_err());
        // Still not locked, so the next attempt tries again
        assert!(!nav.is_showing("/(parent)/locked"));
        assert!(nav.replace("/(parent)/locked").is_err());
        assert_eq!(session.locks().len(), 2);
    }

    struct NeverUnlocked;

    impl OverrideStore for NeverUnlocked {
        fn is_unlocked(&self) -> Result<bool> {
            Ok(false)
        }
    }

    /// Run a reporter with no time left for 30 minutes and return the
    /// number of lock calls
    async fn locks_over_half_an_hour(session: Arc<RecordingSession>) -> usize {
        let ledger = Arc::new(BudgetLedger::new());
        let user = UserId::new("kid-1");
        ledger.set_allowance(&user, Some(0));

        let reporter = Reporter::new(
            Collaborators {
                service: ledger,
                identity: Arc::new(StaticIdentity::new(Some(user))),
                overrides: Arc::new(NeverUnlocked),
                notifier: Arc::new(LogNotifier),
                navigator: Arc::new(navigator(session.clone())),
            },
            LockGate::new(),
            BudgetView::new(),
            ReporterSettings::default(),
        );

        let handle = reporter.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30 * 60 + 1)).await;
        assert!(reporter.gate().is_locked());
        handle.shutdown().await;

        session.locks().len()
    }

    #[tokio::test(start_paused = true)]
    async fn lock_is_reapplied_after_the_user_unlocks() {
        // Mount check plus one per tick
        assert_eq!(locks_over_half_an_hour(RecordingSession::new(Some(false))).await, 31);
    }

    #[tokio::test(start_paused = true)]
    async fn lock_is_reapplied_when_session_state_is_unknown() {
        assert_eq!(locks_over_half_an_hour(RecordingSession::new(None)).await, 31);
    }

    #[tokio::test(start_paused = true)]
    async fn locked_session_is_not_locked_again() {
        assert_eq!(locks_over_half_an_hour(RecordingSession::new(Some(true))).await, 1);
    }
}
