//! Platform-specific functionality

pub mod common;
pub mod desktop;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

use anyhow::Result;

use crate::config::LockAction;

pub use common::{atomic_write, ensure_directory_exists};
pub use desktop::{DesktopNavigator, DesktopNotifier, DesktopSession, SystemSession};

/// Lock, log out or shut down the current desktop session
pub fn lock_computer(action: LockAction) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        linux::lock_session(action)
    }

    #[cfg(target_os = "macos")]
    {
        macos::lock_session(action)
    }

    #[cfg(target_os = "windows")]
    {
        windows::lock_session(action)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        let _ = action;
        anyhow::bail!("Unsupported operating system for session locking")
    }
}

/// Whether the OS reports the desktop session as locked. `None` when this
/// platform cannot tell.
pub fn session_locked() -> Option<bool> {
    #[cfg(target_os = "linux")]
    {
        linux::session_locked()
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Show a desktop notification
pub fn send_notification(title: &str, message: &str) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        linux::send_notification(title, message)
    }

    #[cfg(target_os = "macos")]
    {
        macos::send_notification(title, message)
    }

    #[cfg(target_os = "windows")]
    {
        windows::send_notification(title, message)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        tracing::warn!("Notification: {} - {}", title, message);
        Ok(())
    }
}
