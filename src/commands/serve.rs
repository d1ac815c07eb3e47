use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use family_screentime::budget::UserId;
use family_screentime::budget::ledger::BudgetLedger;
use family_screentime::budget::server::{ServerState, router};
use family_screentime::config::{AppConfig, ServerConfig};

use super::utils::{init_logging, runtime};

/// Run the reference budget service until Ctrl-C
pub fn serve(config_path: Option<&Path>, listen: Option<String>, verbose: bool) -> Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    init_logging(&config.logging.level, verbose);

    runtime()?.block_on(serve_budget(config.server, listen))
}

async fn serve_budget(server: ServerConfig, listen: Option<String>) -> Result<()> {
    let ledger = Arc::new(BudgetLedger::new());
    for allowance in &server.allowances {
        ledger.set_allowance(&UserId::new(&allowance.user_id), Some(allowance.daily_seconds));
    }
    info!("Loaded {} allowance(s)", server.allowances.len());

    let app = router(&server.base_path, ServerState::new(ledger, server.pins()));

    let addr = listen.unwrap_or(server.listen);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        "Budget service listening on {} under {}",
        listener.local_addr()?,
        server.base_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Budget service failed")?;

    info!("Budget service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
