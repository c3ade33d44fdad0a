//! Gemini API client
//!
//! Calls `models/{model}:generateContent` with the full conversation on every
//! request. Uses a long-lived reqwest::Client for connection pooling.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::model::{Content, GenerateRequest, GenerativeModel, ModelTurn, Tool, ROLE_MODEL};
use crate::Result;

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
}

impl GeminiClient {
    pub fn new(config: &PlannerConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(PlannerError::Configuration(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PlannerError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<ModelTurn> {
        let body = GeminiRequest::from_request(request, self.temperature);

        info!(
            model = %self.model,
            turns = request.contents.len(),
            search = request.uses_search(),
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                PlannerError::Transport(format!("Gemini API request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(PlannerError::Transport(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            PlannerError::Transport(format!("Gemini response was not valid JSON: {}", e))
        })?;

        into_turn(gemini_response)
    }
}

fn into_turn(response: GeminiResponse) -> Result<ModelTurn> {
    if let Some(usage) = &response.usage_metadata {
        info!(
            prompt_tokens = usage.prompt_token_count,
            output_tokens = usage.candidates_token_count,
            "Gemini response received"
        );
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        warn!(%reason, "Gemini returned no candidates");
        return Err(PlannerError::EmptyResponse(format!(
            "No response from Gemini ({})",
            reason
        )));
    };

    let mut content = candidate.content.unwrap_or(Content {
        role: None,
        parts: Vec::new(),
    });
    if content.role.is_none() {
        content.role = Some(ROLE_MODEL.to_string());
    }

    if content.parts.is_empty() {
        return Err(PlannerError::EmptyResponse(format!(
            "Empty response from Gemini (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(ModelTurn {
        content,
        finish_reason: candidate.finish_reason,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [Tool],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

fn no_tools(tools: &&[Tool]) -> bool {
    tools.is_empty()
}

impl<'a> GeminiRequest<'a> {
    fn from_request(request: &'a GenerateRequest, temperature: Option<f32>) -> Self {
        Self {
            contents: &request.contents,
            system_instruction: request
                .system_instruction
                .as_ref()
                .map(|text| Content::instruction(text.clone())),
            tools: &request.tools,
            generation_config: temperature.map(|t| GenerationConfig { temperature: t }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i32,
    #[serde(default)]
    candidates_token_count: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}
