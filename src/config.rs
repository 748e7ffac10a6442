//! Configuration for the resume → profile pipeline.
//!
//! Everything a run needs is in [`PipelineConfig`], built via
//! [`PipelineConfigBuilder`]. The config is cheap to clone and shared
//! read-only by concurrent runs; nothing in it is mutated per call.
//!
//! # Model backend resolution
//! A pre-built [`ModelClient`] wins; otherwise the configured
//! [`ModelBackend`] is used; otherwise the environment is consulted (see
//! [`crate::pipeline::client::resolve_client`]).

use crate::error::PipelineError;
use crate::pipeline::extract::ExtractOptions;
use crate::pipeline::llm::{ModelClient, RetryPolicy, SamplingParams, PROFILE_SAMPLING};
use crate::progress::ProgressCallback;
use crate::render::RenderMode;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_API_VERSION: &str = "2024-12-01-preview";

/// Connection settings for an Azure OpenAI chat deployment.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureSettings {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub deployment: String,
}

impl fmt::Debug for AzureSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureSettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("deployment", &self.deployment)
            .finish()
    }
}

impl AzureSettings {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            deployment: deployment.into(),
        }
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Read `AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_API_KEY`,
    /// `AZURE_OPENAI_API_VERSION` and `AZURE_OPENAI_DEPLOYMENT` (or the older
    /// `DEPLOYMENT`). `None` unless endpoint, key and deployment are all set.
    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let endpoint = var("AZURE_OPENAI_ENDPOINT")?;
        let api_key = var("AZURE_OPENAI_API_KEY")?;
        let deployment = var("AZURE_OPENAI_DEPLOYMENT").or_else(|| var("DEPLOYMENT"))?;
        let api_version =
            var("AZURE_OPENAI_API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
        Some(Self {
            endpoint,
            api_key,
            api_version,
            deployment,
        })
    }

    /// Full chat-completions URL. An endpoint that already points at
    /// `/chat/completions` is used as given, with `api-version` appended
    /// when it is missing.
    pub fn chat_completions_url(&self) -> String {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        let path = endpoint.split('?').next().unwrap_or(endpoint);
        if path.ends_with("/chat/completions") {
            if endpoint.contains("api-version=") {
                endpoint.to_string()
            } else {
                let sep = if endpoint.contains('?') { '&' } else { '?' };
                format!("{endpoint}{sep}api-version={}", self.api_version)
            }
        } else {
            format!(
                "{endpoint}/openai/deployments/{}/chat/completions?api-version={}",
                self.deployment, self.api_version
            )
        }
    }
}

/// Where model calls go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelBackend {
    /// Direct Azure OpenAI chat-completions calls.
    Azure(AzureSettings),
    /// Any `edgequake-llm` provider by name (`"openai"`, `"anthropic"`, …).
    Provider { name: String, model: String },
}

/// Configuration for a profile pipeline.
///
/// # Example
/// ```rust
/// use resume_profile::{AzureSettings, ModelBackend, PipelineConfig, RenderMode};
///
/// let config = PipelineConfig::builder()
///     .backend(ModelBackend::Azure(AzureSettings::new(
///         "https://example.openai.azure.com",
///         "key",
///         "gpt-4o",
///     )))
///     .render_mode(RenderMode::Generate)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_attempts, 5);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Model backend. `None` means resolve from the environment.
    pub backend: Option<ModelBackend>,

    /// Pre-constructed model client. Takes precedence over `backend`.
    pub client: Option<Arc<dyn ModelClient>>,

    /// Instruction payload sent as the system turn. `None` uses
    /// [`crate::prompts::DEFAULT_PROFILE_PROMPT`].
    pub system_prompt: Option<String>,

    /// Completion-token cap. `None` leaves it to the endpoint.
    pub max_tokens: Option<usize>,

    /// Total model attempts per document, first included. Default: 5.
    pub max_attempts: u32,

    /// Unit of the exponential backoff. Default: 1 s.
    pub backoff_unit: Duration,

    /// Per-call request timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Output layout. Default: [`RenderMode::Generate`].
    pub render_mode: RenderMode,

    /// Template document, required in [`RenderMode::Template`].
    pub template_path: Option<PathBuf>,

    /// Optional logo. A path that does not exist is skipped at render time.
    pub logo_path: Option<PathBuf>,

    /// pdfium shared library (file or directory). Falls back to
    /// `PDFIUM_LIB_PATH`, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Documents processed at once by `run_batch`. Default: 4.
    pub concurrency: usize,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: None,
            client: None,
            system_prompt: None,
            max_tokens: None,
            max_attempts: 5,
            backoff_unit: Duration::from_secs(1),
            api_timeout_secs: 120,
            render_mode: RenderMode::default(),
            template_path: None,
            logo_path: None,
            pdfium_lib_path: None,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("backend", &self.backend)
            .field("client", &self.client.as_ref().map(|_| "<dyn ModelClient>"))
            .field(
                "system_prompt",
                &self.system_prompt.as_ref().map(|p| format!("<{} chars>", p.len())),
            )
            .field("max_tokens", &self.max_tokens)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_unit", &self.backoff_unit)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("render_mode", &self.render_mode)
            .field("template_path", &self.template_path)
            .field("logo_path", &self.logo_path)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_unit: self.backoff_unit,
            ..RetryPolicy::default()
        }
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            max_tokens: self.max_tokens,
            ..PROFILE_SAMPLING
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            pdfium_lib_path: self.pdfium_lib_path.clone(),
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn backend(mut self, backend: ModelBackend) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn azure(self, settings: AzureSettings) -> Self {
        self.backend(ModelBackend::Azure(settings))
    }

    pub fn provider(self, name: impl Into<String>, model: impl Into<String>) -> Self {
        self.backend(ModelBackend::Provider {
            name: name.into(),
            model: model.into(),
        })
    }

    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn backoff_unit(mut self, unit: Duration) -> Self {
        self.config.backoff_unit = unit;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn render_mode(mut self, mode: RenderMode) -> Self {
        self.config.render_mode = mode;
        self
    }

    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.template_path = Some(path.into());
        self
    }

    pub fn logo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.logo_path = Some(path.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.max_attempts == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.render_mode == RenderMode::Template && c.template_path.is_none() {
            return Err(PipelineError::InvalidConfig(
                "template mode requires a template path".into(),
            ));
        }
        match c.backend {
            Some(ModelBackend::Azure(ref azure)) => {
                if azure.endpoint.trim().is_empty() || azure.deployment.trim().is_empty() {
                    return Err(PipelineError::InvalidConfig(
                        "Azure backend needs an endpoint and a deployment".into(),
                    ));
                }
            }
            Some(ModelBackend::Provider { ref name, .. }) if name.trim().is_empty() => {
                return Err(PipelineError::InvalidConfig(
                    "provider name must not be empty".into(),
                ));
            }
            _ => {}
        }
        Ok(self.config)
    }
}
