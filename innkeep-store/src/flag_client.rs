use async_trait::async_trait;
use innkeep_core::flags::{
    BooleanEvaluation, EvaluationContext, EvaluationRequest, FlagEvaluator, VariantEvaluation,
};
use innkeep_core::{EvaluationError, EvaluationResult};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app_config::FlagsConfig;

pub const ENVIRONMENT_HEADER: &str = "X-Flipt-Environment";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    namespace_key: &'a str,
    flag_key: &'a str,
    entity_id: &'a str,
    context: &'a EvaluationContext,
}

#[derive(Debug, Deserialize)]
struct WireBooleanResponse {
    enabled: bool,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVariantResponse {
    #[serde(default, rename = "match")]
    matched: bool,
    #[serde(default)]
    variant_key: String,
    #[serde(default)]
    reason: String,
}

/// Evaluates flags against a Flipt-compatible REST evaluation API.
#[derive(Clone)]
pub struct FliptClient {
    base_url: String,
    namespace: String,
    environment: String,
    http: Client,
}

impl FliptClient {
    pub fn new(config: &FlagsConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self::with_client(config, http))
    }

    pub fn with_client(config: &FlagsConfig, http: Client) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            environment: config.environment.clone(),
            http,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    async fn evaluate<T: DeserializeOwned>(
        &self,
        kind: &str,
        request: &EvaluationRequest,
    ) -> EvaluationResult<T> {
        let url = format!("{}/evaluate/v1/{}", self.base_url, kind);
        let body = WireRequest {
            namespace_key: &self.namespace,
            flag_key: &request.flag_key,
            entity_id: &request.entity_id,
            context: &request.context,
        };
        debug!(flag = %request.flag_key, entity_id = %request.entity_id, "Evaluating {} flag", kind);

        let response = self
            .http
            .post(&url)
            .header(ENVIRONMENT_HEADER, &self.environment)
            .json(&body)
            .send()
            .await
            .map_err(|e| EvaluationError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(EvaluationError::Malformed(format!(
                "{} evaluation of {} returned status {}",
                kind,
                request.flag_key,
                status.as_u16()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| EvaluationError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl FlagEvaluator for FliptClient {
    async fn evaluate_boolean(
        &self,
        request: &EvaluationRequest,
    ) -> EvaluationResult<BooleanEvaluation> {
        let wire: WireBooleanResponse = self.evaluate("boolean", request).await?;
        Ok(BooleanEvaluation {
            enabled: wire.enabled,
            reason: wire.reason,
        })
    }

    async fn evaluate_variant(
        &self,
        request: &EvaluationRequest,
    ) -> EvaluationResult<VariantEvaluation> {
        let wire: WireVariantResponse = self.evaluate("variant", request).await?;
        if !wire.matched && !wire.variant_key.is_empty() {
            debug!(flag = %request.flag_key, "Variant returned without a match flag");
        }
        Ok(VariantEvaluation {
            variant_key: wire.variant_key,
            reason: wire.reason,
        })
    }
}
