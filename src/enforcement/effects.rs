use anyhow::Result;
use std::sync::Mutex;

use super::gate::LockGate;
use super::policy::LockState;

/// Title and body of the one-time low-time alert
pub const WARNING_TITLE: &str = "Time Reminder";
pub const WARNING_MESSAGE: &str =
    "You're almost out of time! Please finish up soon, or ask your parent if you need more time.";

/// Surfaces the one-time low-time warning to the user
pub trait Notifier: Send + Sync {
    fn warn_time_low(&self, remaining_seconds: u64) -> Result<()>;
}

/// Moves the application between screens
pub trait Navigator: Send + Sync {
    /// Route currently shown
    fn current_route(&self) -> String;

    /// Replace the current route
    fn replace(&self, route: &str) -> Result<()>;

    fn is_showing(&self, route: &str) -> bool {
        same_route(&self.current_route(), route)
    }
}

/// Read side of the parent-granted unlock override
pub trait OverrideStore: Send + Sync {
    fn is_unlocked(&self) -> Result<bool>;
}

/// Route equality ignoring a trailing `/`
pub(crate) fn same_route(a: &str, b: &str) -> bool {
    let trim = |r: &str| r.trim_end_matches('/').to_string();
    trim(a) == trim(b)
}

/// Notifier that only writes to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn warn_time_low(&self, remaining_seconds: u64) -> Result<()> {
        tracing::warn!(
            remaining_seconds,
            "{}: {}",
            WARNING_TITLE,
            WARNING_MESSAGE
        );
        Ok(())
    }
}

/// Navigator that keeps the current route in memory
pub struct RouteNavigator {
    current: Mutex<String>,
}

impl RouteNavigator {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(initial.into()),
        }
    }
}

impl Navigator for RouteNavigator {
    fn current_route(&self) -> String {
        self.current
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn replace(&self, route: &str) -> Result<()> {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tracing::info!("Navigating from {} to {}", current, route);
        *current = route.to_string();
        Ok(())
    }
}

/// Route guard reading the lock gate: once the lock is lifted (for example a
/// parent override was set), leave the locked route for `home_route`.
///
/// Runs until the gate is dropped.
pub async fn release_locked_route(
    gate: LockGate,
    navigator: std::sync::Arc<dyn Navigator>,
    locked_route: String,
    home_route: String,
) {
    let mut rx = gate.subscribe();
    while rx.changed().await.is_ok() {
        if *rx.borrow_and_update() != LockState::Unlocked {
            continue;
        }

        // Navigators may touch the OS
        let navigator = navigator.clone();
        let (locked_route, home_route) = (locked_route.clone(), home_route.clone());
        let left = tokio::task::spawn_blocking(move || {
            if navigator.is_showing(&locked_route) {
                navigator.replace(&home_route)?;
            }
            Ok::<_, anyhow::Error>(())
        })
        .await;

        match left {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to leave locked route: {:#}", e),
            Err(e) => tracing::warn!("Route guard call did not complete: {}", e),
        }
    }
}
