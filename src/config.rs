//! Configuration types for an analysis run.
//!
//! Every endpoint, limit, and pacing knob lives in [`AnalysisConfig`], built
//! via [`AnalysisConfigBuilder`]. The config is read once when
//! [`crate::services::Services`] are constructed; nothing re-reads the
//! environment later.

use crate::error::SidekickError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Audio uploads above this size are rejected before transcription.
pub const DEFAULT_MAX_AUDIO_BYTES: u64 = 25 * 1024 * 1024;
/// Video uploads above this size are rejected before transcription.
pub const DEFAULT_MAX_VIDEO_BYTES: u64 = 100 * 1024 * 1024;
/// PDF uploads above this size are rejected before extraction.
pub const DEFAULT_MAX_PDF_BYTES: u64 = 5 * 1024 * 1024;

pub const DEFAULT_REPORT_TITLE: &str = "Customer Analyst Side Kick";
pub const DEFAULT_SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Configuration for an analysis session and its collaborators.
///
/// # Example
/// ```rust
/// use research_sidekick::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .relay_url("https://relay.example.com/api/analyze")
///     .render_url("https://relay.example.com/api/convert-to-pdf")
///     .stage_pause_ms(500)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Which analysis backend to use. Default: [`BackendChoice::Auto`].
    pub backend: BackendChoice,

    /// LLM relay endpoint (`POST {content, type, prompt}` → `{analysis}`).
    pub relay_url: Option<String>,

    /// How the relay request obtains an API key. Default: server-held.
    pub credentials: Credentials,

    /// Pre-constructed LLM provider for the direct backend.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// LLM provider name (e.g. "anthropic", "openai") for the direct backend.
    pub provider_name: Option<String>,

    /// Model identifier for the direct backend. Default: [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Maximum tokens generated per stage. Default: 4000.
    pub max_tokens: usize,

    /// Sampling temperature; `None` leaves the provider default.
    pub temperature: Option<f32>,

    /// What each stage receives besides its prompt. Default: source only.
    pub context_mode: ContextMode,

    /// PDF text-extraction endpoint. When unset, pdfium is used locally
    /// (requires the `pdfium` feature).
    pub pdf_extract_url: Option<String>,

    /// Explicit libpdfium path for local extraction; falls back to
    /// `PDFIUM_LIB_PATH`, then the system library.
    pub pdfium_library: Option<PathBuf>,

    /// Media transcription endpoint.
    pub transcribe_url: Option<String>,

    /// HTML → PDF render endpoint (`{htmlContent, fileName}` → PDF bytes).
    pub render_url: Option<String>,

    /// Share endpoint (`{htmlContent, fileName, recipientEmail}` → `{message}`).
    pub share_url: Option<String>,

    /// Which email transport to use. Default: [`MailerChoice::Relay`].
    pub mailer: MailerChoice,

    pub sendgrid_api_key: Option<String>,
    pub sendgrid_from: Option<String>,
    pub sendgrid_url: String,

    /// Byte ceiling for PDF sources. Default: 5 MiB.
    pub max_pdf_bytes: u64,
    /// Byte ceiling for `audio/*` sources. Default: 25 MiB.
    pub max_audio_bytes: u64,
    /// Byte ceiling for `video/*` sources. Default: 100 MiB.
    pub max_video_bytes: u64,

    /// Pause after each stage invocation inside a sequence. Default: 1000 ms.
    ///
    /// Keeps ten back-to-back prompts from tripping the endpoint's rate
    /// limiter. Does not apply to single-stage runs or retries.
    pub stage_pause_ms: u64,

    /// Interval between estimated-progress ticks. Default: 1000 ms; 0 is
    /// treated as 1 ms.
    pub progress_tick_ms: u64,

    /// Title used in the report heading. Default: [`DEFAULT_REPORT_TITLE`].
    pub report_title: String,

    /// Optional progress callback for stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::default(),
            relay_url: None,
            credentials: Credentials::default(),
            provider: None,
            provider_name: None,
            model: None,
            max_tokens: 4000,
            temperature: None,
            context_mode: ContextMode::default(),
            pdf_extract_url: None,
            pdfium_library: None,
            transcribe_url: None,
            render_url: None,
            share_url: None,
            mailer: MailerChoice::default(),
            sendgrid_api_key: None,
            sendgrid_from: None,
            sendgrid_url: DEFAULT_SENDGRID_URL.to_string(),
            max_pdf_bytes: DEFAULT_MAX_PDF_BYTES,
            max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES,
            max_video_bytes: DEFAULT_MAX_VIDEO_BYTES,
            stage_pause_ms: 1000,
            progress_tick_ms: 1000,
            report_title: DEFAULT_REPORT_TITLE.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("backend", &self.backend)
            .field("relay_url", &self.relay_url)
            .field("credentials", &self.credentials)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("context_mode", &self.context_mode)
            .field("pdf_extract_url", &self.pdf_extract_url)
            .field("transcribe_url", &self.transcribe_url)
            .field("render_url", &self.render_url)
            .field("share_url", &self.share_url)
            .field("mailer", &self.mailer)
            .field("sendgrid_api_key", &self.sendgrid_api_key.as_ref().map(|_| "<redacted>"))
            .field("sendgrid_from", &self.sendgrid_from)
            .field("stage_pause_ms", &self.stage_pause_ms)
            .field("progress_tick_ms", &self.progress_tick_ms)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// The backend actually used once `Auto` is resolved.
    pub fn effective_backend(&self) -> BackendChoice {
        match self.backend {
            BackendChoice::Auto if self.relay_url.is_some() => BackendChoice::Relay,
            BackendChoice::Auto => BackendChoice::Provider,
            other => other,
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn backend(mut self, backend: BackendChoice) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn relay_url(mut self, url: impl Into<String>) -> Self {
        self.config.relay_url = Some(url.into());
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = credentials;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn context_mode(mut self, mode: ContextMode) -> Self {
        self.config.context_mode = mode;
        self
    }

    pub fn pdf_extract_url(mut self, url: impl Into<String>) -> Self {
        self.config.pdf_extract_url = Some(url.into());
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn transcribe_url(mut self, url: impl Into<String>) -> Self {
        self.config.transcribe_url = Some(url.into());
        self
    }

    pub fn render_url(mut self, url: impl Into<String>) -> Self {
        self.config.render_url = Some(url.into());
        self
    }

    pub fn share_url(mut self, url: impl Into<String>) -> Self {
        self.config.share_url = Some(url.into());
        self
    }

    pub fn mailer(mut self, mailer: MailerChoice) -> Self {
        self.config.mailer = mailer;
        self
    }

    pub fn sendgrid(mut self, api_key: impl Into<String>, from: impl Into<String>) -> Self {
        self.config.sendgrid_api_key = Some(api_key.into());
        self.config.sendgrid_from = Some(from.into());
        self
    }

    pub fn sendgrid_url(mut self, url: impl Into<String>) -> Self {
        self.config.sendgrid_url = url.into();
        self
    }

    pub fn max_pdf_bytes(mut self, n: u64) -> Self {
        self.config.max_pdf_bytes = n;
        self
    }

    pub fn max_audio_bytes(mut self, n: u64) -> Self {
        self.config.max_audio_bytes = n;
        self
    }

    pub fn max_video_bytes(mut self, n: u64) -> Self {
        self.config.max_video_bytes = n;
        self
    }

    pub fn stage_pause_ms(mut self, ms: u64) -> Self {
        self.config.stage_pause_ms = ms;
        self
    }

    pub fn progress_tick_ms(mut self, ms: u64) -> Self {
        self.config.progress_tick_ms = ms;
        self
    }

    pub fn report_title(mut self, title: impl Into<String>) -> Self {
        self.config.report_title = title.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, SidekickError> {
        let c = &self.config;

        let endpoints = [
            ("relay_url", c.relay_url.as_deref()),
            ("pdf_extract_url", c.pdf_extract_url.as_deref()),
            ("transcribe_url", c.transcribe_url.as_deref()),
            ("render_url", c.render_url.as_deref()),
            ("share_url", c.share_url.as_deref()),
            ("sendgrid_url", Some(c.sendgrid_url.as_str())),
        ];
        for (name, url) in endpoints {
            if let Some(url) = url {
                if !is_http_url(url) {
                    return Err(SidekickError::InvalidConfig(format!(
                        "{name} must be an http:// or https:// URL, got '{url}'"
                    )));
                }
            }
        }

        if c.backend == BackendChoice::Relay && c.relay_url.is_none() {
            return Err(SidekickError::InvalidConfig(
                "relay backend selected but no relay_url set".into(),
            ));
        }
        if c.max_pdf_bytes == 0 || c.max_audio_bytes == 0 || c.max_video_bytes == 0 {
            return Err(SidekickError::InvalidConfig(
                "size limits must be greater than zero".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(SidekickError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

/// True for `http://` and `https://` URLs.
pub fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Where analysis requests go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendChoice {
    /// Relay when `relay_url` is set, otherwise the direct provider. (default)
    #[default]
    Auto,
    /// HTTP relay that holds (or is handed) the vendor key.
    Relay,
    /// Direct LLM call through edgequake-llm with a server-side key.
    Provider,
}

/// How each stage's content is assembled.
///
/// Stages are written as if later ones build on earlier ones, but the
/// product has always sent every stage the raw source alone. `Cumulative`
/// is an explicit opt-in that appends completed earlier results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextMode {
    /// Every stage sees only the source text. (default)
    #[default]
    SourceOnly,
    /// Later stages also see the output of completed earlier stages.
    Cumulative,
}

/// Email transport used by the share path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MailerChoice {
    /// POST the report HTML to `share_url`; the endpoint renders and mails. (default)
    #[default]
    Relay,
    /// Render through `render_url`, then send with the SendGrid v3 API.
    SendGrid,
}

/// How a relay request acquires its API key.
#[derive(Clone, Default)]
pub enum Credentials {
    /// The relay holds the key; no key is sent. (default)
    #[default]
    ServerHeld,
    /// Send this key with every request.
    Static(String),
    /// Read the key from this environment variable when services are built.
    Env(String),
}

impl Credentials {
    /// Resolve to the key that should accompany relay requests, if any.
    pub fn resolve(&self) -> Result<Option<String>, SidekickError> {
        match self {
            Credentials::ServerHeld => Ok(None),
            Credentials::Static(key) => Ok(Some(key.clone())),
            Credentials::Env(var) => match std::env::var(var) {
                Ok(key) if !key.is_empty() => Ok(Some(key)),
                _ => Err(SidekickError::ProviderNotConfigured {
                    provider: "relay".into(),
                    hint: format!("Set {var} or switch to server-held credentials."),
                }),
            },
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ServerHeld => f.write_str("ServerHeld"),
            Credentials::Static(_) => f.write_str("Static(<redacted>)"),
            Credentials::Env(var) => f.debug_tuple("Env").field(var).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_product_limits() {
        let c = AnalysisConfig::default();
        assert_eq!(c.max_audio_bytes, 25 * 1024 * 1024);
        assert_eq!(c.max_video_bytes, 100 * 1024 * 1024);
        assert_eq!(c.stage_pause_ms, 1000);
        assert_eq!(c.context_mode, ContextMode::SourceOnly);
        assert_eq!(c.report_title, "Customer Analyst Side Kick");
    }

    #[test]
    fn auto_backend_prefers_relay_when_configured() {
        let c = AnalysisConfig::builder()
            .relay_url("http://localhost:3000/api/analyze")
            .build()
            .unwrap();
        assert_eq!(c.effective_backend(), BackendChoice::Relay);
        assert_eq!(AnalysisConfig::default().effective_backend(), BackendChoice::Provider);
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let err = AnalysisConfig::builder()
            .render_url("ftp://example.com/render")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("render_url"), "got: {err}");
    }

    #[test]
    fn relay_backend_requires_url() {
        let err = AnalysisConfig::builder()
            .backend(BackendChoice::Relay)
            .build()
            .unwrap_err();
        assert!(matches!(err, SidekickError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_limits() {
        assert!(AnalysisConfig::builder().max_audio_bytes(0).build().is_err());
        assert!(AnalysisConfig::builder().max_tokens(0).build().is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = AnalysisConfig::builder()
            .credentials(Credentials::Static("sk-live-123".into()))
            .sendgrid("SG.secret", "reports@example.com")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-live-123"));
        assert!(!dbg.contains("SG.secret"));
    }

    #[test]
    fn env_credentials_missing_var_is_reported() {
        let creds = Credentials::Env("SIDEKICK_TEST_DEFINITELY_UNSET_KEY".into());
        let err = creds.resolve().unwrap_err();
        assert!(err.to_string().contains("SIDEKICK_TEST_DEFINITELY_UNSET_KEY"));
        assert_eq!(Credentials::ServerHeld.resolve().unwrap(), None);
    }
}
