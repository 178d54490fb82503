use crate::config::{DashboardConfig, GenerationSettings};
use crate::error::{Nl2SqlError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// A single text-completion call: prompt in, generated text out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub stop: Vec<String>,
    pub temperature: f64,
}

impl CompletionRequest {
    pub fn new(prompt: String, settings: &GenerationSettings) -> Self {
        Self {
            prompt,
            max_tokens: settings.max_tokens,
            stop: vec![settings.stop.clone()],
            temperature: settings.temperature,
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Raw generated text, untrimmed.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    fn name(&self) -> &str;
}

/// Client for a local OpenAI-compatible completion server hosting the model
/// artifact (llama.cpp `server`, llama-cpp-python, vLLM, ...).
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn new(base_url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(
            config.llm_base_url.clone(),
            config.model_path.display().to_string(),
            config.api_key.clone(),
        )
    }

    pub fn endpoint(&self) -> String {
        format!("{}/completions", self.base_url)
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": request.prompt,
            "max_tokens": request.max_tokens,
            "stop": request.stop,
            "temperature": request.temperature,
        });

        let mut call = self
            .http
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            call = call.header("Authorization", format!("Bearer {}", key));
        }

        let response = call
            .send()
            .await
            .map_err(|e| Nl2SqlError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Nl2SqlError::Llm(format!(
                "LLM API error ({}): {}",
                status, error_text
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Nl2SqlError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        let text = extract_completion_text(&response_json)?;
        debug!(model = %self.model, chars = text.len(), "completion received");
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Pull `choices[0].text` out of a completion response.
pub fn extract_completion_text(response_json: &serde_json::Value) -> Result<String> {
    if let Some(error) = response_json.get("error") {
        return Err(Nl2SqlError::Llm(format!("LLM API error: {}", error)));
    }

    let first = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .ok_or_else(|| {
            Nl2SqlError::Llm(format!("No choices in LLM response: {}", response_json))
        })?;

    if first.get("finish_reason").and_then(|r| r.as_str()) == Some("length") {
        warn!("LLM response was truncated at the max_tokens limit");
    }

    first
        .get("text")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| Nl2SqlError::Llm(format!("No text in LLM response: {}", response_json)))
}

/// Model that answers every prompt with the same text. Used for demos
/// without a model server, and in tests.
#[derive(Debug, Clone)]
pub struct FixedResponseModel {
    response: String,
}

impl FixedResponseModel {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for FixedResponseModel {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        Ok(self.response.clone())
    }

    fn name(&self) -> &str {
        "fixed-response"
    }
}

/// The model handle for a process: a fixed responder when one is given,
/// otherwise the completion server from `config`.
pub fn model_from_config(
    config: &DashboardConfig,
    fixed_response: Option<String>,
) -> Arc<dyn LanguageModel> {
    match fixed_response {
        Some(response) => Arc::new(FixedResponseModel::new(response)),
        None => Arc::new(LlmClient::from_config(config)),
    }
}
