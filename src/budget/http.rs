use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use std::time::Duration;
use url::Url;

use super::{BudgetError, BudgetResult, BudgetService, BudgetState, UserId};

#[derive(Serialize)]
struct StartUsage<'a> {
    user_id: &'a UserId,
}

#[derive(Serialize)]
struct UpdateUsage<'a> {
    user_id: &'a UserId,
    additional_seconds: u64,
}

/// Budget service client speaking the parental-control HTTP contract
pub struct HttpBudgetClient {
    client: Client,
    base: Url,
}

impl HttpBudgetClient {
    /// Create a client for the service rooted at `base_url`
    ///
    /// # Arguments
    /// * `base_url` - e.g. `https://host/api/parental-control`
    /// * `timeout` - per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base = parse_base_url(base_url)?;

        let client = Client::builder()
            .user_agent(format!("family-screentime/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Fetch the parent PIN for a user, `None` when the service has none
    pub async fn fetch_pin_code(&self, user: &UserId) -> BudgetResult<Option<String>> {
        let url = self.endpoint(&["users", user.as_str(), "pin-code"])?;
        tracing::debug!("Fetching PIN code from: {}", url);

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BudgetError::Malformed(e.to_string()))?;

        match body.get("pin_code") {
            Some(serde_json::Value::String(pin)) => Ok(Some(pin.clone())),
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(other) => Err(BudgetError::Malformed(format!(
                "pin_code is not a string: {}",
                other
            ))),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> BudgetResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BudgetError::Unavailable(format!("base URL cannot take a path: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl BudgetService for HttpBudgetClient {
    async fn open_session(&self, user: &UserId) -> BudgetResult<()> {
        let url = self.endpoint(&["start-usage"])?;
        tracing::debug!("Opening usage session for {} at {}", user, url);

        let response = self
            .client
            .post(url)
            .json(&StartUsage { user_id: user })
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn accumulate_usage(&self, user: &UserId, seconds: u64) -> BudgetResult<()> {
        let url = self.endpoint(&["update-usage"])?;
        tracing::debug!("Reporting {}s of usage for {}", seconds, user);

        let response = self
            .client
            .post(url)
            .json(&UpdateUsage {
                user_id: user,
                additional_seconds: seconds,
            })
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn get_status(&self, user: &UserId) -> BudgetResult<BudgetState> {
        let url = self.endpoint(&["users", user.as_str(), "usage-status"])?;

        let response = self.client.get(url).send().await?;
        let response = ensure_success(response).await?;
        let body = response.text().await?;

        parse_status_body(&body)
    }
}

/// Validate and normalize the configured base URL
pub fn parse_base_url(base_url: &str) -> anyhow::Result<Url> {
    let url = Url::parse(base_url)
        .map_err(|e| anyhow::anyhow!("Invalid budget service URL '{}': {}", base_url, e))?;

    match url.scheme() {
        "https" => {}
        "http" => {
            let loopback = match url.host() {
                Some(url::Host::Domain(host)) => host == "localhost",
                Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
                Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
                None => false,
            };
            if !loopback {
                tracing::warn!("Budget service URL uses plain HTTP: {}", url);
            }
        }
        scheme => anyhow::bail!("Budget service URL must use http or https (got: {})", scheme),
    }

    if url.cannot_be_a_base() {
        anyhow::bail!("Budget service URL cannot be used as a base: {}", url);
    }

    Ok(url)
}

/// Parse a usage-status body. `remaining_seconds` must be present and be
/// either null or an integer; negative values are clamped to zero.
pub fn parse_status_body(body: &str) -> BudgetResult<BudgetState> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| BudgetError::Malformed(e.to_string()))?;

    let remaining = value
        .get("remaining_seconds")
        .ok_or_else(|| BudgetError::Malformed("missing remaining_seconds".to_string()))?;

    match remaining {
        serde_json::Value::Null => Ok(BudgetState::unlimited()),
        serde_json::Value::Number(n) => {
            if let Some(secs) = n.as_u64() {
                Ok(BudgetState::limited(secs))
            } else if n.as_i64().is_some() {
                Ok(BudgetState::limited(0))
            } else {
                Err(BudgetError::Malformed(format!(
                    "remaining_seconds is not an integer: {}",
                    n
                )))
            }
        }
        other => Err(BudgetError::Malformed(format!(
            "remaining_seconds has unexpected type: {}",
            other
        ))),
    }
}

async fn ensure_success(response: Response) -> BudgetResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(BudgetError::Status { status, body })
}
