use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use family_screentime::budget::{BudgetService, HttpBudgetClient};
use family_screentime::config::AppConfig;
use family_screentime::enforcement::effects::release_locked_route;
use family_screentime::enforcement::{BudgetView, Collaborators, LockGate, Reporter, Supervisor};
use family_screentime::identity::configured_identity;
use family_screentime::platform::{DesktopNavigator, DesktopNotifier};
use family_screentime::state::{LocalStore, UnlockOverride};

use super::utils::{init_logging, require_user, runtime};

/// Report usage and enforce the budget until Ctrl-C
pub fn run(config_path: Option<&Path>, user: Option<&str>, verbose: bool) -> Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    init_logging(&config.logging.level, verbose);

    runtime()?.block_on(run_reporter(config, user))
}

async fn run_reporter(config: AppConfig, user: Option<&str>) -> Result<()> {
    let client = HttpBudgetClient::new(&config.service.base_url, config.service.timeout())
        .context("Failed to create budget service client")?;
    let store = LocalStore::open(config.storage.state_path.as_deref())?;
    let reporter_config = &config.reporter;
    let navigator = Arc::new(DesktopNavigator::new(
        &reporter_config.home_route,
        &reporter_config.locked_route,
        reporter_config.lock_action,
    ));

    let reporter = Reporter::new(
        Collaborators {
            service: Arc::new(client),
            identity: Arc::new(configured_identity(user, config.identity.user_id.as_deref())),
            overrides: Arc::new(UnlockOverride::new(store.clone())),
            notifier: Arc::new(DesktopNotifier),
            navigator: navigator.clone(),
        },
        LockGate::new(),
        BudgetView::new(),
        reporter_config.to_settings(),
    );

    let mut supervisor = Supervisor::new(reporter.clone());
    let Some(user) = supervisor.mount().await else {
        anyhow::bail!(
            "No user configured. Pass --user, set {} or set identity.user_id",
            family_screentime::identity::USER_ENV_VAR
        );
    };

    info!(
        "Tracking screen time for {} against {} (override file: {})",
        user,
        config.service.base_url,
        store.path().display()
    );
    println!("Tracking screen time for {}. Press Ctrl+C to stop.", user);

    let guard = tokio::spawn(release_locked_route(
        reporter.gate().clone(),
        navigator,
        reporter_config.locked_route.clone(),
        reporter_config.home_route.clone(),
    ));
    let budget_log = tokio::spawn(log_budget_changes(reporter.budget().clone()));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("Stopping reporter");
    supervisor.shutdown().await;
    guard.abort();
    budget_log.abort();

    Ok(())
}

async fn log_budget_changes(budget: BudgetView) {
    let mut rx = budget.subscribe();
    while rx.changed().await.is_ok() {
        if let Some(state) = *rx.borrow_and_update() {
            info!("{}", state);
        }
    }
}

/// Print today's remaining time
pub fn status(config_path: Option<&Path>, user: Option<&str>, verbose: bool) -> Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    init_logging(&config.logging.level, verbose);

    runtime()?.block_on(async {
        let user = require_user(user, config.identity.user_id.as_deref()).await?;
        let client = HttpBudgetClient::new(&config.service.base_url, config.service.timeout())
            .context("Failed to create budget service client")?;

        let state = client
            .get_status(&user)
            .await
            .with_context(|| format!("Failed to fetch usage status for {}", user))?;

        println!("{}", state);
        Ok::<_, anyhow::Error>(())
    })
}
