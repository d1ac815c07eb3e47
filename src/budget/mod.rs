// Budget service module
//
// The budget service is the authority on how many seconds of screen time a
// user has left today. The reporter only ever talks to it through the
// `BudgetService` trait; `http` speaks the wire contract, `ledger` is an
// in-memory implementation of the same semantics and `server` exposes a
// ledger over HTTP.

pub mod http;
pub mod ledger;
pub mod server;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use http::HttpBudgetClient;
pub use ledger::BudgetLedger;

/// Opaque identifier of the child profile a budget is billed against
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Server's view of the remaining allowance for today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct BudgetState {
    /// `None` means no limit is configured for the user
    pub remaining_seconds: Option<u64>,
}

impl BudgetState {
    pub fn limited(remaining_seconds: u64) -> Self {
        Self {
            remaining_seconds: Some(remaining_seconds),
        }
    }

    pub fn unlimited() -> Self {
        Self {
            remaining_seconds: None,
        }
    }

    /// True when a limit is configured and nothing is left of it
    pub fn is_exhausted(&self) -> bool {
        self.remaining_seconds == Some(0)
    }

    /// Whole minutes left, rounded down
    pub fn remaining_minutes(&self) -> Option<u64> {
        self.remaining_seconds.map(|secs| secs / 60)
    }
}

impl fmt::Display for BudgetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.remaining_minutes() {
            Some(minutes) => write!(f, "Remaining time: {} min", minutes),
            None => f.write_str("No time limit"),
        }
    }
}

/// Errors surfaced by a budget service implementation
#[derive(Debug, thiserror::Error)]
pub enum BudgetError {
    #[error("request to budget service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("budget service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed budget service response: {0}")]
    Malformed(String),

    #[error("no usage session for user {0} today")]
    SessionNotFound(UserId),

    #[error("budget service unavailable: {0}")]
    Unavailable(String),
}

impl BudgetError {
    /// Whether retrying on a later tick could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            BudgetError::Transport(_) | BudgetError::Unavailable(_) => true,
            BudgetError::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            BudgetError::Malformed(_) | BudgetError::SessionNotFound(_) => false,
        }
    }

    /// The service has no session to charge; opening one again fixes it
    pub fn is_session_missing(&self) -> bool {
        match self {
            BudgetError::SessionNotFound(_) => true,
            BudgetError::Status { status, .. } => *status == reqwest::StatusCode::NOT_FOUND,
            _ => false,
        }
    }
}

pub type BudgetResult<T> = Result<T, BudgetError>;

/// The three operations the reporter depends on.
///
/// Implementations must keep `open_session` idempotent per user and day,
/// make `accumulate_usage` order-independent, and make `get_status` observe
/// every acknowledged accumulation from the same client.
#[async_trait]
pub trait BudgetService: Send + Sync {
    /// Open today's usage session. Opening an open session is a no-op.
    async fn open_session(&self, user: &UserId) -> BudgetResult<()>;

    /// Add `seconds` of usage to today's session
    async fn accumulate_usage(&self, user: &UserId, seconds: u64) -> BudgetResult<()>;

    /// Read the remaining allowance for today
    async fn get_status(&self, user: &UserId) -> BudgetResult<BudgetState>;
}
