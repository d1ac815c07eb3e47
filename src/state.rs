use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::enforcement::OverrideStore;
use crate::platform::common::atomic_write;

/// Current local state version
const STATE_VERSION: &str = "1.0";

/// Key holding the parent-granted unlock override
pub const APP_UNLOCKED_KEY: &str = "appUnlocked";

/// Small key/value state kept on the device
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalState {
    pub version: String,
    #[serde(default)]
    pub entries: BTreeMap<String, String>,
}

impl LocalState {
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            entries: BTreeMap::new(),
        }
    }
}

impl Default for LocalState {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the platform-specific local state path
pub fn get_state_path() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let system_path = PathBuf::from("/var/lib/family-screentime/local-state.json");
        if system_path.parent().is_some_and(Path::exists) {
            return Ok(system_path);
        }
    }

    if let Some(dirs) = directories::ProjectDirs::from("", "", "family-screentime") {
        return Ok(dirs.data_local_dir().join("local-state.json"));
    }

    anyhow::bail!("Could not determine local state location");
}

/// File-backed key/value store. Every call goes to disk so that changes made
/// by another process (the `unlock` command) are seen immediately.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the configured path, or the platform default
    pub fn open(configured: Option<&Path>) -> Result<Self> {
        let path = match configured {
            Some(path) => path.to_path_buf(),
            None => get_state_path()?,
        };
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<LocalState> {
        if !self.path.exists() {
            return Ok(LocalState::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read local state: {}", self.path.display()))?;

        let state: LocalState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse local state: {}", self.path.display()))?;

        if state.version != STATE_VERSION {
            tracing::warn!(
                "Local state version mismatch (expected {}, got {}). Starting fresh.",
                STATE_VERSION,
                state.version
            );
            return Ok(LocalState::new());
        }

        Ok(state)
    }

    pub fn save(&self, state: &LocalState) -> Result<()> {
        let content =
            serde_json::to_string_pretty(state).context("Failed to serialize local state")?;

        atomic_write(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to write local state: {}", self.path.display()))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.entries.remove(key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.load()?;
        state.entries.insert(key.to_string(), value.to_string());
        self.save(&state)
    }

    /// Returns whether the key was present
    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut state = self.load()?;
        if state.entries.remove(key).is_none() {
            return Ok(false);
        }
        self.save(&state)?;
        Ok(true)
    }
}

/// The `appUnlocked` override. Only the exact value `"true"` counts.
#[derive(Debug, Clone)]
pub struct UnlockOverride {
    store: LocalStore,
}

impl UnlockOverride {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn grant(&self) -> Result<()> {
        self.store.set(APP_UNLOCKED_KEY, "true")?;
        tracing::info!("Unlock override granted");
        Ok(())
    }

    pub fn clear(&self) -> Result<bool> {
        let removed = self.store.remove(APP_UNLOCKED_KEY)?;
        if removed {
            tracing::info!("Unlock override cleared");
        }
        Ok(removed)
    }
}

impl OverrideStore for UnlockOverride {
    fn is_unlocked(&self) -> Result<bool> {
        Ok(self.store.get(APP_UNLOCKED_KEY)?.as_deref() == Some("true"))
    }
}
