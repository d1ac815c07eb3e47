use anyhow::Result;
use std::process::Command;

use crate::config::LockAction;

/// Lockers tried in order until one succeeds
const SCREEN_LOCKERS: &[(&str, &[&str])] = &[
    ("loginctl", &["lock-session"]),
    ("xdg-screensaver", &["lock"]),
    ("gnome-screensaver-command", &["--lock"]),
    ("cinnamon-screensaver-command", &["--lock"]),
    ("mate-screensaver-command", &["--lock"]),
    ("xscreensaver-command", &["-lock"]),
    ("light-locker-command", &["--lock"]),
];

const LOGOUT_COMMANDS: &[(&str, &[&str])] = &[
    ("gnome-session-quit", &["--logout", "--no-prompt"]),
    ("qdbus", &["org.kde.ksmserver", "/KSMServer", "logout", "0", "0", "0"]),
    ("xfce4-session-logout", &["--logout"]),
];

const SHUTDOWN_COMMANDS: &[(&str, &[&str])] = &[
    ("systemctl", &["poweroff"]),
    ("shutdown", &["-h", "now"]),
];

pub fn lock_session(action: LockAction) -> Result<()> {
    let (candidates, what) = match action {
        LockAction::Lock => (SCREEN_LOCKERS, "screen lock"),
        LockAction::Logout => (LOGOUT_COMMANDS, "logout"),
        LockAction::Shutdown => (SHUTDOWN_COMMANDS, "shutdown"),
    };

    for (cmd, args) in candidates {
        match try_command(cmd, args) {
            Ok(()) => {
                tracing::debug!("{} via {}", what, cmd);
                return Ok(());
            }
            Err(e) => tracing::debug!("{} unavailable: {:#}", cmd, e),
        }
    }

    anyhow::bail!("No supported {} mechanism found on this Linux system", what)
}

pub fn send_notification(title: &str, message: &str) -> Result<()> {
    try_command(
        "notify-send",
        &[
            "--urgency=critical",
            "--icon=dialog-warning",
            "--app-name=family-screentime",
            title,
            message,
        ],
    )
}

/// `LockedHint` of the current logind session
pub fn session_locked() -> Option<bool> {
    let session = std::env::var("XDG_SESSION_ID").unwrap_or_else(|_| "auto".to_string());
    let output = Command::new("loginctl")
        .args(["show-session", &session, "--property=LockedHint", "--value"])
        .output()
        .ok()?;

    if !output.status.success() {
        tracing::debug!("loginctl could not report LockedHint for session {}", session);
        return None;
    }
    parse_locked_hint(&String::from_utf8_lossy(&output.stdout))
}

fn parse_locked_hint(value: &str) -> Option<bool> {
    match value.trim() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

fn try_command(cmd: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(cmd).args(args).output()?;

    if output.status.success() {
        Ok(())
    } else {
        anyhow::bail!(
            "{} exited with {}: {}",
            cmd,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_command_is_an_error() {
        assert!(try_command("family-screentime-no-such-command", &[]).is_err());
    }

    #[test]
    fn locked_hint_values() {
        assert_eq!(parse_locked_hint("yes\n"), Some(true));
        assert_eq!(parse_locked_hint("no"), Some(false));
        assert_eq!(parse_locked_hint(""), None);
    }

    #[test]
    fn every_action_has_candidates() {
        assert!(!SCREEN_LOCKERS.is_empty());
        assert!(!LOGOUT_COMMANDS.is_empty());
        assert!(!SHUTDOWN_COMMANDS.is_empty());
    }
}
