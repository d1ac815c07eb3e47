use anyhow::{Context, Result};
use std::process::Command;

use crate::config::LockAction;

pub fn lock_session(action: LockAction) -> Result<()> {
    let (program, args): (&str, &[&str]) = match action {
        LockAction::Lock => ("rundll32.exe", &["user32.dll,LockWorkStation"]),
        LockAction::Logout => ("shutdown.exe", &["/l"]),
        LockAction::Shutdown => ("shutdown.exe", &["/s", "/t", "0"]),
    };

    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run {}", program))?;

    if !status.success() {
        anyhow::bail!("{} exited with {}", program, status);
    }
    Ok(())
}

/// Toast notifications need WinRT; log the warning instead
pub fn send_notification(title: &str, message: &str) -> Result<()> {
    tracing::warn!("Notification: {} - {}", title, message);
    Ok(())
}
