use async_trait::async_trait;
use innkeep_shared::models::events::FlagEvaluatedEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::EvaluationResult;

/// Global automation switch. When on, the worker decides and manual
/// decisions are refused.
pub const AUTO_APPROVAL_FLAG: &str = "auto-approval";
/// Variant flag naming the approval tier of a booking.
pub const APPROVAL_TIER_FLAG: &str = "approval-tier";
/// Fixed entity identity used for the automation switch.
pub const WORKER_ENTITY_ID: &str = "worker";

pub type EvaluationContext = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EvaluationRequest {
    pub flag_key: String,
    pub entity_id: String,
    pub context: EvaluationContext,
}

impl EvaluationRequest {
    pub fn new(flag_key: &str, entity_id: &str) -> Self {
        Self {
            flag_key: flag_key.to_string(),
            entity_id: entity_id.to_string(),
            context: EvaluationContext::new(),
        }
    }

    pub fn with_context(mut self, key: &str, value: impl Into<String>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BooleanEvaluation {
    pub enabled: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantEvaluation {
    pub variant_key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagType {
    Boolean,
    Variant,
}

impl FlagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagType::Boolean => "boolean",
            FlagType::Variant => "variant",
        }
    }
}

/// Client for the external flag decision service.
#[async_trait]
pub trait FlagEvaluator: Send + Sync {
    async fn evaluate_boolean(&self, request: &EvaluationRequest)
        -> EvaluationResult<BooleanEvaluation>;

    async fn evaluate_variant(&self, request: &EvaluationRequest)
        -> EvaluationResult<VariantEvaluation>;
}

/// Best-effort analytics side channel around flag evaluations.
/// Implementations must not block and cannot influence the result.
pub trait EvaluationHook: Send + Sync {
    fn before(&self, request: &EvaluationRequest, flag_type: FlagType);
    fn after(&self, request: &EvaluationRequest, result: &FlagEvaluatedEvent);
}

/// Decorates any evaluator with before/after hooks.
pub struct HookedEvaluator {
    inner: Arc<dyn FlagEvaluator>,
    hooks: Vec<Arc<dyn EvaluationHook>>,
}

impl HookedEvaluator {
    pub fn new(inner: Arc<dyn FlagEvaluator>) -> Self {
        Self {
            inner,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn EvaluationHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    fn before(&self, request: &EvaluationRequest, flag_type: FlagType) {
        for hook in &self.hooks {
            hook.before(request, flag_type);
        }
    }

    fn after(&self, request: &EvaluationRequest, flag_type: FlagType, value: String, reason: &str) {
        if self.hooks.is_empty() {
            return;
        }
        let event = FlagEvaluatedEvent {
            flag_key: request.flag_key.clone(),
            flag_type: flag_type.as_str().to_string(),
            value,
            reason: reason.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        };
        for hook in &self.hooks {
            hook.after(request, &event);
        }
    }
}

#[async_trait]
impl FlagEvaluator for HookedEvaluator {
    async fn evaluate_boolean(
        &self,
        request: &EvaluationRequest,
    ) -> EvaluationResult<BooleanEvaluation> {
        self.before(request, FlagType::Boolean);
        let result = self.inner.evaluate_boolean(request).await;
        match &result {
            Ok(eval) => self.after(request, FlagType::Boolean, eval.enabled.to_string(), &eval.reason),
            Err(e) => tracing::warn!(flag = %request.flag_key, error = %e, "Boolean flag evaluation failed"),
        }
        result
    }

    async fn evaluate_variant(
        &self,
        request: &EvaluationRequest,
    ) -> EvaluationResult<VariantEvaluation> {
        self.before(request, FlagType::Variant);
        let result = self.inner.evaluate_variant(request).await;
        match &result {
            Ok(eval) => self.after(request, FlagType::Variant, eval.variant_key.clone(), &eval.reason),
            Err(e) => tracing::warn!(flag = %request.flag_key, error = %e, "Variant flag evaluation failed"),
        }
        result
    }
}
