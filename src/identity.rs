use anyhow::Result;
use async_trait::async_trait;

use crate::budget::UserId;

/// Environment variable consulted when no user is given on the command line
pub const USER_ENV_VAR: &str = "FAMILY_SCREENTIME_USER";

/// Answers "who is using the application right now"
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when nobody is signed in
    async fn current_user(&self) -> Result<Option<UserId>>;
}

/// Identity fixed at construction time
pub struct StaticIdentity {
    user: Option<UserId>,
}

impl StaticIdentity {
    pub fn new(user: Option<UserId>) -> Self {
        Self { user }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Result<Option<UserId>> {
        Ok(self.user.clone())
    }
}

/// Pick the user id: command line first, then environment, then config.
/// Blank values count as absent.
pub fn resolve_user_id(
    cli: Option<&str>,
    env: Option<&str>,
    configured: Option<&str>,
) -> Option<UserId> {
    [cli, env, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|id| !id.is_empty())
        .map(UserId::from)
}

/// Identity from the command line, `FAMILY_SCREENTIME_USER` or the config file
pub fn configured_identity(cli: Option<&str>, configured: Option<&str>) -> StaticIdentity {
    let env = std::env::var(USER_ENV_VAR).ok();
    StaticIdentity::new(resolve_user_id(cli, env.as_deref(), configured))
}
