use anyhow::{Context, Result};

use family_screentime::budget::UserId;
use family_screentime::identity::{IdentityProvider, USER_ENV_VAR, configured_identity};

/// Initialize logging. `--verbose` wins over the configured level and
/// `RUST_LOG` wins over both.
pub fn init_logging(level: &str, verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if verbose { "debug" } else { level };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

/// Build a single-use runtime for a command
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to start async runtime")
}

/// User from `--user`, the environment or the config, or an error naming
/// all three
pub async fn require_user(cli: Option<&str>, configured: Option<&str>) -> Result<UserId> {
    configured_identity(cli, configured)
        .current_user()
        .await?
        .with_context(|| {
            format!(
                "No user configured. Pass --user, set {} or set identity.user_id",
                USER_ENV_VAR
            )
        })
}
