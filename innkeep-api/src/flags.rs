use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use innkeep_core::flags::{EvaluationRequest, APPROVAL_TIER_FLAG};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_ENTITY_ID: &str = "admin";

#[derive(Debug, Deserialize)]
pub struct FlagsQuery {
    pub entity_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SwitchStatus {
    pub enabled: bool,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct TierStatus {
    pub variant: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct FlagStatusResponse {
    pub auto_approval: SwitchStatus,
    pub approval_tier: TierStatus,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/flags", get(flag_status))
}

/// Current value of both flags. The switch is evaluated the way the worker
/// sees it; the tier for an arbitrary entity with no booking context.
async fn flag_status(
    State(state): State<AppState>,
    query: Result<Query<FlagsQuery>, QueryRejection>,
) -> Result<Json<FlagStatusResponse>, AppError> {
    let Query(query) = query?;
    let entity_id = query
        .entity_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_ENTITY_ID.to_string());

    let switch = state.approvals.automation_status().await;
    let tier = state
        .approvals
        .flags()
        .evaluate_variant(&EvaluationRequest::new(APPROVAL_TIER_FLAG, &entity_id))
        .await?;

    Ok(Json(FlagStatusResponse {
        auto_approval: SwitchStatus {
            enabled: switch.enabled,
            reason: switch.reason,
        },
        approval_tier: TierStatus {
            variant: tier.variant_key,
            reason: tier.reason,
        },
    }))
}
