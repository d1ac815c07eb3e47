use anyhow::{Context, Result};
use std::path::Path;

use family_screentime::budget::HttpBudgetClient;
use family_screentime::config::AppConfig;
use family_screentime::state::{LocalStore, UnlockOverride};

use super::utils::{init_logging, require_user, runtime};

/// Verify the parent PIN with the budget service and grant the override
pub fn unlock(config_path: Option<&Path>, pin: &str, user: Option<&str>, verbose: bool) -> Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    init_logging(&config.logging.level, verbose);

    let user = runtime()?.block_on(async {
        let user = require_user(user, config.identity.user_id.as_deref()).await?;
        let client = HttpBudgetClient::new(&config.service.base_url, config.service.timeout())
            .context("Failed to create budget service client")?;

        let expected = client
            .fetch_pin_code(&user)
            .await
            .with_context(|| format!("Failed to fetch PIN for {}", user))?;
        check_pin(expected.as_deref(), pin)?;
        Ok::<_, anyhow::Error>(user)
    })?;

    let store = LocalStore::open(config.storage.state_path.as_deref())?;
    UnlockOverride::new(store)
        .grant()
        .context("Failed to save unlock override")?;

    println!("✓ Unlocked for {}", user);
    Ok(())
}

/// Remove the override so the budget is enforced again
pub fn relock(config_path: Option<&Path>, verbose: bool) -> Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    init_logging(&config.logging.level, verbose);

    let store = LocalStore::open(config.storage.state_path.as_deref())?;
    if UnlockOverride::new(store).clear()? {
        println!("✓ Unlock override removed");
    } else {
        println!("No unlock override was set");
    }
    Ok(())
}

fn check_pin(expected: Option<&str>, given: &str) -> Result<()> {
    let given = given.trim();
    if given.len() != 4 || !given.chars().all(|c| c.is_ascii_digit()) {
        anyhow::bail!("PIN must be exactly 4 digits");
    }

    match expected {
        None => anyhow::bail!("No parent PIN is set for this user"),
        Some(expected) if expected == given => Ok(()),
        Some(_) => anyhow::bail!("Incorrect PIN"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_pin_is_accepted() {
        assert!(check_pin(Some("1234"), "1234").is_ok());
        assert!(check_pin(Some("1234"), " 1234\n").is_ok());
    }

    #[test]
    fn wrong_or_missing_pin_is_rejected() {
        assert!(check_pin(Some("1234"), "4321").is_err());
        assert!(check_pin(None, "1234").is_err());
    }

    #[test]
    fn malformed_pin_is_rejected_before_comparing() {
        let err = check_pin(Some("12a4"), "12a4").unwrap_err();
        assert!(err.to_string().contains("4 digits"));
    }
}
