use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use super::{BudgetError, BudgetLedger, BudgetService, UserId};

/// Shared state behind the budget service routes
#[derive(Clone)]
pub struct ServerState {
    ledger: Arc<BudgetLedger>,
    pins: Arc<HashMap<UserId, String>>,
}

impl ServerState {
    pub fn new(ledger: Arc<BudgetLedger>, pins: HashMap<UserId, String>) -> Self {
        Self {
            ledger,
            pins: Arc::new(pins),
        }
    }
}

#[derive(Deserialize)]
struct StartUsageBody {
    user_id: UserId,
}

#[derive(Deserialize)]
struct UpdateUsageBody {
    user_id: UserId,
    additional_seconds: u64,
}

struct ApiError(BudgetError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BudgetError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!("Request failed with {}: {}", status, self.0);
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

impl From<BudgetError> for ApiError {
    fn from(e: BudgetError) -> Self {
        Self(e)
    }
}

/// Build the budget service routes mounted under `base_path`
pub fn router(base_path: &str, state: ServerState) -> Router {
    let api = Router::new()
        .route("/start-usage", post(start_usage))
        .route("/update-usage", post(update_usage))
        .route("/users/{user_id}/usage-status", get(usage_status))
        .route("/users/{user_id}/pin-code", get(pin_code))
        .with_state(state);

    let base_path = base_path.trim_end_matches('/');
    if base_path.is_empty() {
        api
    } else {
        Router::new().nest(base_path, api)
    }
}

async fn start_usage(
    State(state): State<ServerState>,
    Json(body): Json<StartUsageBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.ledger.open_session(&body.user_id).await?;
    Ok(Json(json!({ "status": "session ready" })))
}

async fn update_usage(
    State(state): State<ServerState>,
    Json(body): Json<UpdateUsageBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .ledger
        .accumulate_usage(&body.user_id, body.additional_seconds)
        .await?;

    let used = state
        .ledger
        .today_record(&body.user_id)
        .map(|r| r.used_seconds)
        .unwrap_or(0);
    Ok(Json(json!({ "status": "updated", "new_used_seconds": used })))
}

async fn usage_status(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = UserId::new(user_id);
    let status = state.ledger.get_status(&user).await?;

    let used = state
        .ledger
        .today_record(&user)
        .map(|r| r.used_seconds)
        .unwrap_or(0);

    Ok(Json(json!({
        "allowed": status.remaining_seconds.is_none_or(|r| r > 0),
        "remaining_seconds": status.remaining_seconds,
        "used_seconds": used,
    })))
}

async fn pin_code(State(state): State<ServerState>, Path(user_id): Path<String>) -> Response {
    match state.pins.get(&UserId::new(user_id)) {
        Some(pin) => Json(json!({ "pin_code": pin })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "No user found or pin not set." })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn router_mounts_at_root_and_nested() {
        let state = ServerState::new(Arc::new(BudgetLedger::new()), HashMap::new());
        // Both shapes must build without panicking
        let _root = router("/", state.clone());
        let _nested = router("/api/parental-control/", state);
    }

    #[tokio::test]
    async fn status_reports_used_and_remaining() {
        let ledger = Arc::new(BudgetLedger::new());
        let user = UserId::new("kid-1");
        ledger.set_allowance(&user, Some(300));
        ledger.open_session(&user).await.unwrap();
        ledger.accumulate_usage(&user, 120).await.unwrap();

        let state = ServerState::new(ledger, HashMap::new());
        let Json(body) = usage_status(State(state), Path("kid-1".to_string()))
            .await
            .unwrap_or_else(|_| panic!("status failed"));

        assert_eq!(body["remaining_seconds"], 180);
        assert_eq!(body["used_seconds"], 120);
        assert_eq!(body["allowed"], true);
    }

    #[tokio::test]
    async fn update_without_session_maps_to_not_found() {
        let state = ServerState::new(Arc::new(BudgetLedger::new()), HashMap::new());
        let result = update_usage(
            State(state),
            Json(UpdateUsageBody {
                user_id: UserId::new("kid-1"),
                additional_seconds: 60,
            }),
        )
        .await;

        let response = match result {
            Ok(_) => panic!("update should fail"),
            Err(e) => e.into_response(),
        };
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
