//! Azure OpenAI chat completions provider.

use super::{ChatMessage, Completion, CompletionRequest, Provider, ProviderError, TokenUsage};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use teambot_common::config::AzureOpenAiConfig;

const PROVIDER_NAME: &str = "azure-openai";

/// API version used by the deployments listing endpoint.
const DEPLOYMENTS_API_VERSION: &str = "2023-05-15";

/// Azure OpenAI provider bound to one deployment.
pub struct AzureOpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    deployment: String,
    api_version: String,
}

impl AzureOpenAiProvider {
    /// Create a provider from configuration with the given per-request timeout.
    pub fn new(config: &AzureOpenAiConfig, timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match HeaderValue::from_str(&config.api_key) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert("api-key", value);
            }
            Err(_) => tracing::warn!("AZURE_OPENAI_API_KEY is not a valid header value"),
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            deployment: config.deployment_name.clone(),
            api_version: config.api_version.clone(),
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, self.deployment
        )
    }

    fn error(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::new(PROVIDER_NAME, &self.deployment, message)
    }

    /// List the deployments available on the resource.
    ///
    /// Used as a connectivity and credential probe.
    pub async fn list_deployments(&self) -> Result<Vec<Deployment>, ProviderError> {
        let url = format!("{}/openai/deployments", self.endpoint);

        let response = self
            .client
            .get(&url)
            .query(&[("api-version", DEPLOYMENTS_API_VERSION)])
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| self.error(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self
                .error(format!("API error: {body}"))
                .with_status(status.as_u16()));
        }

        let listing: DeploymentList = response
            .json()
            .await
            .map_err(|e| self.error(format!("Failed to parse deployments: {e}")))?;

        Ok(listing.data)
    }
}

#[async_trait]
impl Provider for AzureOpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.deployment
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let start = Instant::now();

        let body = AzureRequest {
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: 0.9,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };

        let response = self
            .client
            .post(self.completions_url())
            .query(&[("api-version", self.api_version.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.error(format!("Request failed: {e}")))?;

        let status = response.status();
        let latency_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self
                .error(format!("API error: {body}"))
                .with_status(status.as_u16()));
        }

        let parsed: AzureResponse = response
            .json()
            .await
            .map_err(|e| self.error(format!("Failed to parse response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| self.error("Response contained no choices"))?;

        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| self.error("Response message was empty"))?;

        tracing::debug!(
            deployment = %self.deployment,
            latency_ms,
            total_tokens = parsed.usage.as_ref().map(|u| u.total_tokens),
            "Azure OpenAI completion received"
        );

        Ok(Completion {
            content,
            finish_reason: choice.finish_reason,
            usage: parsed.usage,
            latency_ms,
        })
    }
}

// ============================================================================
// Azure OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AzureRequest<'a> {
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    frequency_penalty: f64,
    presence_penalty: f64,
}

#[derive(Debug, Deserialize)]
struct AzureResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeploymentList {
    #[serde(default)]
    data: Vec<Deployment>,
}

/// A model deployment on an Azure OpenAI resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
