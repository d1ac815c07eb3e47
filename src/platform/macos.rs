use anyhow::{Context, Result};
use std::process::Command;

use crate::config::LockAction;

pub fn lock_session(action: LockAction) -> Result<()> {
    let script = match action {
        LockAction::Lock => {
            "tell application \"System Events\" to keystroke \"q\" using {command down, control down}"
        }
        LockAction::Logout => "tell application \"System Events\" to log out",
        LockAction::Shutdown => "tell application \"System Events\" to shut down",
    };
    run_osascript(script)
}

pub fn send_notification(title: &str, message: &str) -> Result<()> {
    let script = format!(
        "display notification \"{}\" with title \"{}\" sound name \"Glass\"",
        applescript_escape(message),
        applescript_escape(title)
    );
    run_osascript(&script)
}

fn run_osascript(script: &str) -> Result<()> {
    let output = Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .context("Failed to run osascript")?;

    if !output.status.success() {
        anyhow::bail!(
            "osascript failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

fn applescript_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(applescript_escape(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
        assert_eq!(applescript_escape("You're"), "You're");
    }
}
