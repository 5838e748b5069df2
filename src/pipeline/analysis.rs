//! Analysis Client: one prompt + one transcript in, analysis text out.
//!
//! The client looks up the stage prompt in [`crate::prompts`] and hands the
//! `(content, type, prompt)` triple to an [`AnalysisBackend`]. Two backends
//! exist because the product was deployed two ways: through an HTTP relay
//! that holds (or is handed) the vendor key, and server-side with the key
//! in the environment. Both sit behind the same trait, so the orchestrator
//! never knows which one it is talking to.
//!
//! There is no retry here. One call, one answer or one error; re-running a
//! failed stage is the user's decision, made through the orchestrator.

use crate::config::{AnalysisConfig, BackendChoice, DEFAULT_MODEL};
use crate::error::SidekickError;
use crate::prompts;
use crate::remote::{self, Prefer};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const RELAY_SERVICE: &str = "analysis relay";
const PROVIDER_SERVICE: &str = "LLM provider";
const RELAY_FALLBACK: &str = "Failed to analyze content";

/// Everything a backend needs for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub content: String,
    pub stage_id: String,
    pub prompt: String,
}

impl AnalysisRequest {
    /// The single message a model receives: prompt, blank line, content.
    pub fn user_message(&self) -> String {
        format!("{}\n\n{}", self.prompt, self.content)
    }
}

/// A place analysis requests can be sent.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Run one analysis. Any failure is a [`SidekickError::RemoteService`].
    async fn complete(&self, request: &AnalysisRequest) -> Result<String, SidekickError>;
}

/// The Analysis Client.
#[derive(Clone)]
pub struct AnalysisClient {
    backend: Arc<dyn AnalysisBackend>,
}

impl AnalysisClient {
    pub fn new(backend: Arc<dyn AnalysisBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Build the request for a stage, failing for ids outside the catalog.
    pub fn request_for(content: &str, stage_id: &str) -> Result<AnalysisRequest, SidekickError> {
        let prompt = prompts::prompt_for(stage_id).ok_or_else(|| SidekickError::UnknownStage {
            id: stage_id.to_string(),
        })?;
        Ok(AnalysisRequest {
            content: content.to_string(),
            stage_id: stage_id.to_string(),
            prompt: prompt.to_string(),
        })
    }

    /// `analyze(content, type) -> text`.
    pub async fn analyze(&self, content: &str, stage_id: &str) -> Result<String, SidekickError> {
        let request = Self::request_for(content, stage_id)?;
        let start = Instant::now();
        debug!(
            "{}: sending {} chars of content via {}",
            stage_id,
            content.len(),
            self.backend.name()
        );
        let text = self.backend.complete(&request).await?;
        debug!("{}: {} chars back in {:?}", stage_id, text.len(), start.elapsed());
        Ok(text)
    }
}

// ── Relay backend ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RelayBody<'a> {
    content: &'a str,
    #[serde(rename = "type")]
    stage_id: &'a str,
    prompt: &'a str,
    #[serde(rename = "apiKey", skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RelayReply {
    analysis: Option<String>,
}

/// `POST {content, type, prompt}` → `{analysis}`.
pub struct RelayBackend {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl RelayBackend {
    pub fn new(http: reqwest::Client, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            url: url.into(),
            api_key,
        }
    }

    fn body<'a>(&'a self, request: &'a AnalysisRequest) -> RelayBody<'a> {
        RelayBody {
            content: &request.content,
            stage_id: &request.stage_id,
            prompt: &request.prompt,
            api_key: self.api_key.as_deref(),
        }
    }
}

#[async_trait]
impl AnalysisBackend for RelayBackend {
    fn name(&self) -> &str {
        RELAY_SERVICE
    }

    async fn complete(&self, request: &AnalysisRequest) -> Result<String, SidekickError> {
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| remote::unreachable(RELAY_SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(remote::failure(RELAY_SERVICE, response, Prefer::Error, RELAY_FALLBACK).await);
        }

        let reply: RelayReply = response.json().await.map_err(|e| {
            SidekickError::remote(RELAY_SERVICE, Some(status.as_u16()), format!("malformed response: {e}"))
        })?;

        reply.analysis.ok_or_else(|| {
            SidekickError::remote(
                RELAY_SERVICE,
                Some(status.as_u16()),
                "response has no 'analysis' field",
            )
        })
    }
}

// ── Direct provider backend ──────────────────────────────────────────────

/// Calls the LLM directly through edgequake-llm.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, max_tokens: usize, temperature: Option<f32>) -> Self {
        Self {
            provider,
            max_tokens,
            temperature,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl AnalysisBackend for ProviderBackend {
    fn name(&self) -> &str {
        PROVIDER_SERVICE
    }

    async fn complete(&self, request: &AnalysisRequest) -> Result<String, SidekickError> {
        let message = request.user_message();
        let messages = vec![ChatMessage::user(&message)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options()))
            .await
            .map_err(|e| SidekickError::remote(PROVIDER_SERVICE, None, format!("{e}")))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            request.stage_id, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, SidekickError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        SidekickError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the direct LLM provider, most specific first:
///
/// 1. `config.provider`, used as-is
/// 2. `config.provider_name` + `config.model`
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 4. Anthropic, when `ANTHROPIC_API_KEY` is present
/// 5. `ProviderFactory::from_env()` auto-detection
pub fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn LLMProvider>, SidekickError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        if !key.is_empty() {
            return create_provider("anthropic", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| SidekickError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set ANTHROPIC_API_KEY or OPENAI_API_KEY, or configure a relay URL.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Build the backend named by the configuration.
pub fn backend_from_config(
    config: &AnalysisConfig,
    http: &reqwest::Client,
) -> Result<Arc<dyn AnalysisBackend>, SidekickError> {
    match config.effective_backend() {
        BackendChoice::Relay => {
            let url = config.relay_url.clone().ok_or_else(|| {
                SidekickError::InvalidConfig("relay backend selected but no relay_url set".into())
            })?;
            let api_key = config.credentials.resolve()?;
            info!("Analysis backend: relay at {}", url);
            Ok(Arc::new(RelayBackend::new(http.clone(), url, api_key)))
        }
        BackendChoice::Provider | BackendChoice::Auto => {
            let provider = resolve_provider(config)?;
            info!("Analysis backend: direct LLM provider");
            Ok(Arc::new(ProviderBackend::new(
                provider,
                config.max_tokens,
                config.temperature,
            )))
        }
    }
}
