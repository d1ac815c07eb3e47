use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::effects::{Navigator, Notifier, OverrideStore};
use super::gate::{BudgetView, LockGate};
use super::policy::{self, LockState, WarningLatch};
use super::scheduler::{Accounting, TickScheduler};
use crate::budget::{BudgetError, BudgetResult, BudgetService, BudgetState, UserId};
use crate::identity::IdentityProvider;

/// Default tick period
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Default low-time warning threshold in seconds
pub const DEFAULT_WARNING_THRESHOLD_SECS: u64 = 300;

/// Default route shown while locked
pub const DEFAULT_LOCKED_ROUTE: &str = "/(parent)/locked";

/// Tunables for one reporter
#[derive(Debug, Clone)]
pub struct ReporterSettings {
    pub interval: Duration,
    pub warning_threshold_secs: u64,
    pub accounting: Accounting,
    /// Add seconds from failed reports to the next report instead of
    /// dropping them
    pub carry_unreported: bool,
    pub locked_route: String,
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            warning_threshold_secs: DEFAULT_WARNING_THRESHOLD_SECS,
            accounting: Accounting::Fixed,
            carry_unreported: false,
            locked_route: DEFAULT_LOCKED_ROUTE.to_string(),
        }
    }
}

/// Where a reporter is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterPhase {
    Idle,
    Initializing,
    Polling,
    Stopped,
}

/// External capabilities the reporter drives
#[derive(Clone)]
pub struct Collaborators {
    pub service: Arc<dyn BudgetService>,
    pub identity: Arc<dyn IdentityProvider>,
    pub overrides: Arc<dyn OverrideStore>,
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
}

/// Usage reporter: reports elapsed time to the budget service, warns once
/// when time runs low and locks the application when it runs out.
///
/// A `Reporter` is a template; every `start`/`spawn` mounts a fresh loop
/// with its own warning latch.
#[derive(Clone)]
pub struct Reporter {
    collaborators: Collaborators,
    gate: LockGate,
    budget: BudgetView,
    settings: ReporterSettings,
}

impl Reporter {
    pub fn new(
        collaborators: Collaborators,
        gate: LockGate,
        budget: BudgetView,
        settings: ReporterSettings,
    ) -> Self {
        Self {
            collaborators,
            gate,
            budget,
            settings,
        }
    }

    pub fn gate(&self) -> &LockGate {
        &self.gate
    }

    pub fn budget(&self) -> &BudgetView {
        &self.budget
    }

    pub fn settings(&self) -> &ReporterSettings {
        &self.settings
    }

    /// Resolve who is using the application. Failures and anonymous use both
    /// yield `None`; unauthenticated usage is not tracked.
    pub async fn resolve_user(&self) -> Option<UserId> {
        match self.collaborators.identity.current_user().await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                debug!("No signed-in user, usage is not tracked");
                None
            }
            Err(e) => {
                warn!("Could not resolve current user: {:#}", e);
                None
            }
        }
    }

    /// Resolve the user and mount a loop for them. Returns `None` (and makes
    /// no network calls) when nobody is signed in.
    pub async fn start(&self) -> Option<ReporterHandle> {
        let user = self.resolve_user().await?;
        Some(self.spawn(user))
    }

    /// Mount a loop for an already-resolved user
    pub fn spawn(&self, user: UserId) -> ReporterHandle {
        let cancel = CancellationToken::new();
        let (phase_tx, phase_rx) = watch::channel(ReporterPhase::Idle);

        let mount = Mount {
            reporter: self.clone(),
            user: user.clone(),
            cancel: cancel.clone(),
            phase: phase_tx,
            latch: WarningLatch::new(),
            unreported: 0,
        };
        let task = tokio::spawn(mount.run());

        ReporterHandle {
            user,
            cancel,
            phase: phase_rx,
            task: Some(task),
        }
    }
}

/// Owner of one running loop. Dropping the handle stops the loop.
pub struct ReporterHandle {
    user: UserId,
    cancel: CancellationToken,
    phase: watch::Receiver<ReporterPhase>,
    task: Option<JoinHandle<()>>,
}

impl ReporterHandle {
    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn phase(&self) -> ReporterPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<ReporterPhase> {
        self.phase.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancel the loop. Takes effect immediately: the pending timer is
    /// dropped and no side effect happens after this returns.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Cancel the loop and wait for its task to exit
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Reporter task for {} ended abnormally: {}", self.user, e);
            }
        }
    }
}

impl Drop for ReporterHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State owned by one mounted loop
struct Mount {
    reporter: Reporter,
    user: UserId,
    cancel: CancellationToken,
    phase: watch::Sender<ReporterPhase>,
    latch: WarningLatch,
    unreported: u64,
}

impl Mount {
    async fn run(mut self) {
        let settings = self.reporter.settings.clone();
        info!(
            "Starting usage reporter for {} (every {}s, warn at {}s)",
            self.user,
            settings.interval.as_secs(),
            settings.warning_threshold_secs
        );

        self.set_phase(ReporterPhase::Initializing);
        let service = self.reporter.collaborators.service.clone();
        let opened = self.guarded(service.open_session(&self.user)).await;
        match opened {
            None => return self.finish(),
            Some(Ok(())) => debug!("Usage session open for {}", self.user),
            // Opening is idempotent; a failure here must not block enforcement
            Some(Err(e)) => self.log_failure("open usage session", &e),
        }

        self.set_phase(ReporterPhase::Polling);
        self.check_status().await;

        let mut ticks = TickScheduler::new(settings.interval, settings.accounting);
        loop {
            let quantum = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                quantum = ticks.next_tick() => quantum,
            };
            self.tick(quantum).await;
        }

        self.finish();
    }

    /// Report, then fetch and evaluate
    async fn tick(&mut self, quantum: u64) {
        let seconds = quantum.saturating_add(self.unreported);

        match self.report(seconds).await {
            None => return,
            Some(Ok(())) => {
                debug!("Reported {}s of usage for {}", seconds, self.user);
                self.unreported = 0;
            }
            Some(Err(e)) => {
                self.log_failure(&format!("report {}s of usage", seconds), &e);
                if self.reporter.settings.carry_unreported {
                    self.unreported = seconds;
                }
            }
        }

        self.check_status().await;
    }

    /// Accumulate `seconds`. When the service no longer has a session (its
    /// day rolled over or it restarted), reopen it and retry once.
    async fn report(&self, seconds: u64) -> Option<BudgetResult<()>> {
        let service = self.reporter.collaborators.service.clone();

        match self.guarded(service.accumulate_usage(&self.user, seconds)).await? {
            Err(e) if e.is_session_missing() => {
                info!("Usage session for {} is gone ({}), reopening", self.user, e);
                if let Err(e) = self.guarded(service.open_session(&self.user)).await? {
                    return Some(Err(e));
                }
                self.guarded(service.accumulate_usage(&self.user, seconds)).await
            }
            result => Some(result),
        }
    }

    /// Fetch the budget and apply the warning and lock rules
    async fn check_status(&mut self) {
        let service = self.reporter.collaborators.service.clone();
        let state = match self.guarded(service.get_status(&self.user)).await {
            None => return,
            Some(Ok(state)) => state,
            Some(Err(e)) => {
                self.log_failure("fetch usage status", &e);
                return;
            }
        };

        if !self.alive() {
            return;
        }
        debug!("Budget for {}: {:?}", self.user, state.remaining_seconds);
        self.reporter.budget.replace(state);

        self.evaluate_warning(state).await;
        self.evaluate_lock(state).await;
    }

    async fn evaluate_warning(&mut self, state: BudgetState) {
        let threshold = self.reporter.settings.warning_threshold_secs;
        if !self.latch.should_warn(&state, threshold) {
            return;
        }

        let remaining = state.remaining_seconds.unwrap_or_default();
        info!("{} has {}s left, showing warning", self.user, remaining);
        let notifier = self.reporter.collaborators.notifier.clone();
        if let Some(Err(e)) = self.blocking(move || notifier.warn_time_low(remaining)).await {
            warn!("Failed to show low-time warning: {:#}", e);
        }
    }

    async fn evaluate_lock(&self, state: BudgetState) {
        let collaborators = &self.reporter.collaborators;

        // Enforcement wins when the override cannot be read
        let overrides = collaborators.overrides.clone();
        let override_set = match self.blocking(move || overrides.is_unlocked()).await {
            None => return,
            Some(Ok(set)) => set,
            Some(Err(e)) => {
                warn!("Failed to read unlock override: {:#}", e);
                false
            }
        };

        let decision = policy::lock_decision(&state, override_set);
        self.reporter.gate.publish(decision);

        if decision != LockState::Locked {
            if state.is_exhausted() {
                debug!("Time is up for {} but a parent override is set", self.user);
            }
            return;
        }

        let navigator = collaborators.navigator.clone();
        let locked_route = self.reporter.settings.locked_route.clone();
        let target = locked_route.clone();
        let navigated = self
            .blocking(move || {
                if navigator.is_showing(&target) {
                    return Ok(false);
                }
                navigator.replace(&target).map(|()| true)
            })
            .await;

        match navigated {
            None => {}
            Some(Ok(true)) => info!("Time is up for {}, showing {}", self.user, locked_route),
            Some(Ok(false)) => debug!("Already on {}", locked_route),
            Some(Err(e)) => warn!("Failed to navigate to {}: {:#}", locked_route, e),
        }
    }

    fn log_failure(&self, action: &str, e: &BudgetError) {
        if e.is_transient() {
            warn!("Failed to {} for {}: {}", action, self.user, e);
        } else {
            error!("Failed to {} for {} (not transient): {}", action, self.user, e);
        }
    }

    /// Run a synchronous collaborator call on the blocking pool, guarded
    /// like any other await
    async fn blocking<T, F>(&self, call: F) -> Option<anyhow::Result<T>>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let joined = self.guarded(tokio::task::spawn_blocking(call)).await?;
        Some(joined.map_err(anyhow::Error::from).and_then(|output| output))
    }

    /// Await `fut` unless the loop is cancelled first. `None` means
    /// cancelled; the caller must not touch any state afterwards.
    async fn guarded<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            output = fut => self.alive().then_some(output),
        }
    }

    fn alive(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    fn set_phase(&self, phase: ReporterPhase) {
        self.phase.send_replace(phase);
    }

    fn finish(self) {
        self.set_phase(ReporterPhase::Stopped);
        info!("Usage reporter for {} stopped", self.user);
    }
}
