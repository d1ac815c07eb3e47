use anyhow::{Context, Result};
use std::path::PathBuf;

use family_screentime::config::{EXAMPLE_CONFIG, get_config_path};
use family_screentime::platform::atomic_write;

/// Write the example configuration
pub fn init(output: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match output {
        Some(path) => path,
        None => get_config_path()?,
    };

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        );
    }

    atomic_write(&path, EXAMPLE_CONFIG.as_bytes())
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    println!("✓ Example configuration written to: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set identity.user_id and service.base_url");
    println!("  2. Start tracking:");
    println!("     family-screentime run");

    Ok(())
}
