//! Concrete [`ModelClient`]s and backend resolution.
//!
//! [`AzureChatClient`] talks to an Azure OpenAI chat deployment directly over
//! `reqwest`; [`ProviderClient`] adapts any `edgequake-llm` provider. Both
//! hold configuration only and are shared by every concurrent run.

use crate::config::{AzureSettings, ModelBackend, PipelineConfig};
use crate::error::{InferenceError, ModelError};
use crate::pipeline::llm::{ModelClient, SamplingParams};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Longest API error body kept in [`ModelError::Api`].
const MAX_ERROR_BODY: usize = 500;

// ── Azure OpenAI ─────────────────────────────────────────────────────────

pub struct AzureChatClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl fmt::Debug for AzureChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureChatClient")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AzureChatClient {
    pub fn new(settings: &AzureSettings, timeout: Duration) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: settings.chat_completions_url(),
            api_key: settings.api_key.clone(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Serialize)]
struct ChatTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: [ChatTurn<'a>; 2],
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

impl<'a> ChatRequest<'a> {
    fn new(system: &'a str, user: &'a str, sampling: &SamplingParams) -> Self {
        Self {
            messages: [
                ChatTurn {
                    role: "system",
                    content: system,
                },
                ChatTurn {
                    role: "user",
                    content: user,
                },
            ],
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            frequency_penalty: sampling.frequency_penalty,
            presence_penalty: sampling.presence_penalty,
            max_tokens: sampling.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// The `error.message` of an API error body, else the (truncated) body.
fn api_error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        return parsed.error.message;
    }
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}

/// Text of the first choice; a missing or null content is empty text.
fn first_choice_text(response: ChatResponse) -> Result<String, ModelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(ModelError::EmptyResponse)?;
    Ok(choice
        .message
        .and_then(|m| m.content)
        .unwrap_or_default()
        .trim()
        .to_string())
}

#[async_trait]
impl ModelClient for AzureChatClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        sampling: &SamplingParams,
    ) -> Result<String, ModelError> {
        let request = ChatRequest::new(system, user, sampling);
        let response = self
            .http
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout {
                        secs: self.timeout.as_secs(),
                    }
                } else {
                    ModelError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        first_choice_text(parsed)
    }
}

// ── edgequake-llm providers ──────────────────────────────────────────────

pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    timeout: Duration,
}

impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient")
            .field("provider", &"<dyn LLMProvider>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Build a named provider; its API key comes from the provider's usual
    /// environment variable (`OPENAI_API_KEY`, …).
    pub fn from_name(name: &str, model: &str, timeout: Duration) -> Result<Self, InferenceError> {
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            InferenceError::ProviderNotConfigured {
                hint: format!("provider '{name}': {e}"),
            }
        })?;
        Ok(Self::new(provider, timeout))
    }
}

#[async_trait]
impl ModelClient for ProviderClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        sampling: &SamplingParams,
    ) -> Result<String, ModelError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let options = completion_options(sampling);
        match tokio::time::timeout(self.timeout, self.provider.chat(&messages, Some(&options)))
            .await
        {
            Err(_) => Err(ModelError::Timeout {
                secs: self.timeout.as_secs(),
            }),
            Ok(Err(e)) => Err(ModelError::Provider(e.to_string())),
            Ok(Ok(response)) => {
                debug!(
                    "Provider reply: {} input tokens, {} output tokens",
                    response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content.trim().to_string())
            }
        }
    }
}

/// Every sampling setting, carried over to the provider call.
fn completion_options(sampling: &SamplingParams) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(sampling.temperature),
        top_p: Some(sampling.top_p),
        frequency_penalty: Some(sampling.frequency_penalty),
        presence_penalty: Some(sampling.presence_penalty),
        max_tokens: sampling.max_tokens,
        ..Default::default()
    }
}

// ── Resolution ───────────────────────────────────────────────────────────

/// Resolve the model client, from most-specific to least-specific:
///
/// 1. **Pre-built client** (`config.client`), used as is. Tests inject a
///    scripted client here.
/// 2. **Configured backend** (`config.backend`): Azure settings or a named
///    provider + model.
/// 3. **Azure environment** (`AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_API_KEY`,
///    `AZURE_OPENAI_DEPLOYMENT`).
/// 4. **Provider pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **Auto-detection** via `ProviderFactory::from_env()`.
pub fn resolve_client(config: &PipelineConfig) -> Result<Arc<dyn ModelClient>, InferenceError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }
    let timeout = config.api_timeout();

    match config.backend {
        Some(ModelBackend::Azure(ref settings)) => return azure_client(settings, timeout),
        Some(ModelBackend::Provider {
            ref name,
            ref model,
        }) => return Ok(Arc::new(ProviderClient::from_name(name, model, timeout)?)),
        None => {}
    }

    if let Some(settings) = AzureSettings::from_env() {
        return azure_client(&settings, timeout);
    }

    if let (Ok(name), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !name.is_empty() && !model.is_empty() {
            return Ok(Arc::new(ProviderClient::from_name(&name, &model, timeout)?));
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| InferenceError::ProviderNotConfigured {
            hint: format!(
                "No model backend could be found.\n\
                Set AZURE_OPENAI_ENDPOINT, AZURE_OPENAI_API_KEY and AZURE_OPENAI_DEPLOYMENT,\n\
                or EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL, or a provider key such as OPENAI_API_KEY.\n\
                Error: {e}"
            ),
        })?;
    info!("Using auto-detected model provider");
    Ok(Arc::new(ProviderClient::new(provider, timeout)))
}

fn azure_client(
    settings: &AzureSettings,
    timeout: Duration,
) -> Result<Arc<dyn ModelClient>, InferenceError> {
    let client = AzureChatClient::new(settings, timeout).map_err(|e| {
        InferenceError::ProviderNotConfigured {
            hint: format!("could not build the Azure HTTP client: {e}"),
        }
    })?;
    info!("Using Azure OpenAI deployment '{}'", settings.deployment);
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::PROFILE_SAMPLING;
    use serde_json::{json, Value};

    #[test]
    fn request_body_shape() {
        let req = ChatRequest::new("SYS", "USER", &PROFILE_SAMPLING);
        let v: Value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v["messages"],
            json!([
                {"role": "system", "content": "SYS"},
                {"role": "user", "content": "USER"}
            ])
        );
        assert_eq!(v["top_p"], json!(1.0));
        assert_eq!(v["presence_penalty"], json!(0.0));
        assert!(v.get("max_tokens").is_none());

        let capped = SamplingParams {
            max_tokens: Some(100),
            ..PROFILE_SAMPLING
        };
        let v = serde_json::to_value(ChatRequest::new("s", "u", &capped)).unwrap();
        assert_eq!(v["max_tokens"], json!(100));
    }

    #[test]
    fn provider_options_carry_all_sampling_settings() {
        let options = completion_options(&PROFILE_SAMPLING);
        assert_eq!(options.temperature, Some(PROFILE_SAMPLING.temperature));
        assert_eq!(options.top_p, Some(1.0));
        assert_eq!(options.frequency_penalty, Some(0.0));
        assert_eq!(options.presence_penalty, Some(0.0));
        assert_eq!(options.max_tokens, None);
        assert!(options.response_format.is_none());

        let capped = SamplingParams {
            max_tokens: Some(2048),
            ..PROFILE_SAMPLING
        };
        assert_eq!(completion_options(&capped).max_tokens, Some(2048));
    }

    #[test]
    fn first_choice_content_is_trimmed() {
        let r: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "  {\"a\":1}\n"}}]
        }))
        .unwrap();
        assert_eq!(first_choice_text(r).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn null_content_is_empty_and_no_choices_is_error() {
        let r: ChatResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": null}}]})).unwrap();
        assert_eq!(first_choice_text(r).unwrap(), "");

        let r: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(first_choice_text(r), Err(ModelError::EmptyResponse)));
    }

    #[test]
    fn api_error_message_prefers_structured_body() {
        assert_eq!(
            api_error_message(r#"{"error": {"code": "429", "message": "Rate limit"}}"#),
            "Rate limit"
        );
        assert_eq!(api_error_message(" plain text "), "plain text");
        let long = "x".repeat(MAX_ERROR_BODY + 10);
        assert_eq!(api_error_message(&long).chars().count(), MAX_ERROR_BODY + 1);
    }

    #[test]
    fn prebuilt_client_wins() {
        struct Fixed;
        #[async_trait]
        impl ModelClient for Fixed {
            async fn complete(
                &self,
                _: &str,
                _: &str,
                _: &SamplingParams,
            ) -> Result<String, ModelError> {
                Ok("{}".into())
            }
        }
        let fixed: Arc<dyn ModelClient> = Arc::new(Fixed);
        let config = PipelineConfig::builder()
            .client(Arc::clone(&fixed))
            .provider("no-such-provider", "m")
            .build()
            .unwrap();
        let resolved = resolve_client(&config).unwrap();
        assert!(Arc::ptr_eq(&resolved, &fixed));
    }

    #[test]
    fn azure_backend_builds_client_with_deployment_url() {
        let settings = AzureSettings::new("https://r.openai.azure.com", "k", "dep");
        let client = AzureChatClient::new(&settings, Duration::from_secs(5)).unwrap();
        assert!(client.url().contains("/openai/deployments/dep/chat/completions"));
        assert!(!format!("{client:?}").contains("\"k\""));
    }
}
