use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use innkeep_approval::ApprovalError;
use innkeep_core::EvaluationError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    AutomationActiveError(String),
    UpstreamError(String),
    FlagEvaluationError(String),
    InternalServerError(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::NotFoundError(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::ConflictError(_) => (StatusCode::CONFLICT, "not_pending"),
            AppError::AutomationActiveError(_) => (StatusCode::LOCKED, "automation_active"),
            AppError::UpstreamError(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            AppError::FlagEvaluationError(_) => (StatusCode::SERVICE_UNAVAILABLE, "flag_evaluation_failed"),
            AppError::InternalServerError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let error_message = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::UpstreamError(msg) | AppError::FlagEvaluationError(msg) => {
                tracing::warn!(code, "{}", msg);
                msg
            }
            AppError::ValidationError(msg)
            | AppError::NotFoundError(msg)
            | AppError::ConflictError(msg)
            | AppError::AutomationActiveError(msg) => msg,
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<ApprovalError> for AppError {
    fn from(err: ApprovalError) -> Self {
        let message = err.to_string();
        match err {
            ApprovalError::NotFound(_) => AppError::NotFoundError(message),
            ApprovalError::AutomationActive => AppError::AutomationActiveError(message),
            ApprovalError::InvalidState { .. } => AppError::ConflictError(message),
            ApprovalError::Evaluation(_) => AppError::FlagEvaluationError(message),
            ApprovalError::Upstream(_) => AppError::UpstreamError(message),
        }
    }
}

impl From<EvaluationError> for AppError {
    fn from(err: EvaluationError) -> Self {
        AppError::FlagEvaluationError(format!("Flag evaluation failed: {}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}
