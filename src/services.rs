//! Service objects built once from an [`AnalysisConfig`].
//!
//! One `reqwest::Client` is shared by every HTTP collaborator. Nothing here
//! is global; hosts construct [`Services`] and pass it where needed.

use crate::config::{AnalysisConfig, MailerChoice};
use crate::delivery::{
    self, DownloadedReport, Mailer, PdfRenderer, RelayMailer, RemotePdfRenderer, SendGridMailer,
};
use crate::error::SidekickError;
use crate::pipeline::analysis::{self, AnalysisBackend, AnalysisClient};
use crate::pipeline::extract::{RemotePdfExtractor, RemoteTranscriber};
use crate::pipeline::orchestrator::StageOrchestrator;
use crate::pipeline::source::{
    ContentResolver, ContentSource, PdfTextExtractor, SourceLimits, Transcriber,
};
use crate::report::ReportDocument;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a session needs to talk to the outside world.
#[derive(Clone)]
pub struct Services {
    pub config: AnalysisConfig,
    pub client: AnalysisClient,
    pub resolver: ContentResolver,
    pub renderer: Option<Arc<dyn PdfRenderer>>,
    pub mailer: Option<Arc<dyn Mailer>>,
}

impl Services {
    /// Build the collaborators named by `config`.
    ///
    /// Fails when the analysis backend cannot be constructed. Delivery
    /// collaborators are optional; using a missing one fails at call time.
    pub fn from_config(config: AnalysisConfig) -> Result<Self, SidekickError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("research-sidekick/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SidekickError::Internal(format!("Failed to build HTTP client: {e}")))?;

        let backend = analysis::backend_from_config(&config, &http)?;
        let resolver = ContentResolver::new(
            pdf_extractor(&config, &http),
            config
                .transcribe_url
                .as_ref()
                .map(|url| Arc::new(RemoteTranscriber::new(http.clone(), url)) as Arc<dyn Transcriber>),
            SourceLimits::from(&config),
        );

        let renderer = config
            .render_url
            .as_ref()
            .map(|url| Arc::new(RemotePdfRenderer::new(http.clone(), url)) as Arc<dyn PdfRenderer>);
        let mailer = build_mailer(&config, &http, renderer.clone())?;

        debug!("Services built: {:?}", config);
        Ok(Self {
            client: AnalysisClient::new(backend),
            resolver,
            renderer,
            mailer,
            config,
        })
    }

    /// Assemble services from already-built parts (tests, embedding hosts).
    pub fn from_parts(
        config: AnalysisConfig,
        backend: Arc<dyn AnalysisBackend>,
        resolver: ContentResolver,
        renderer: Option<Arc<dyn PdfRenderer>>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        Self {
            config,
            client: AnalysisClient::new(backend),
            resolver,
            renderer,
            mailer,
        }
    }

    /// Resolve `source` and open a session over it.
    pub async fn start_session(&self, source: &ContentSource) -> Result<Arc<StageOrchestrator>, SidekickError> {
        let resolved = self.resolver.resolve(source).await?;
        info!("Session opened for '{}'", resolved.name);
        Ok(Arc::new(StageOrchestrator::new(
            self.client.clone(),
            resolved,
            &self.config,
        )))
    }

    pub async fn download(&self, report: &ReportDocument) -> Result<DownloadedReport, SidekickError> {
        let renderer = self.renderer.as_deref().ok_or_else(|| {
            SidekickError::InvalidConfig("no render_url configured for PDF download".into())
        })?;
        delivery::download_report(report, renderer).await
    }

    pub async fn share(&self, report: &ReportDocument, recipient: &str) -> Result<String, SidekickError> {
        let mailer = self.mailer.as_deref().ok_or_else(|| {
            SidekickError::InvalidConfig("no email transport configured".into())
        })?;
        delivery::share_report(report, mailer, recipient).await
    }
}

fn pdf_extractor(config: &AnalysisConfig, http: &reqwest::Client) -> Option<Arc<dyn PdfTextExtractor>> {
    if let Some(ref url) = config.pdf_extract_url {
        return Some(Arc::new(RemotePdfExtractor::new(http.clone(), url)));
    }
    local_pdf_extractor(config)
}

#[cfg(feature = "pdfium")]
fn local_pdf_extractor(config: &AnalysisConfig) -> Option<Arc<dyn PdfTextExtractor>> {
    Some(Arc::new(crate::pipeline::extract::PdfiumExtractor::new(
        config.pdfium_library.clone(),
    )))
}

#[cfg(not(feature = "pdfium"))]
fn local_pdf_extractor(_config: &AnalysisConfig) -> Option<Arc<dyn PdfTextExtractor>> {
    None
}

fn build_mailer(
    config: &AnalysisConfig,
    http: &reqwest::Client,
    renderer: Option<Arc<dyn PdfRenderer>>,
) -> Result<Option<Arc<dyn Mailer>>, SidekickError> {
    match config.mailer {
        MailerChoice::Relay => Ok(config
            .share_url
            .as_ref()
            .map(|url| Arc::new(RelayMailer::new(http.clone(), url)) as Arc<dyn Mailer>)),
        MailerChoice::SendGrid => {
            let (Some(key), Some(from)) = (&config.sendgrid_api_key, &config.sendgrid_from) else {
                return Err(SidekickError::InvalidConfig(
                    "SendGrid mailer needs both an API key and a from address".into(),
                ));
            };
            let renderer = renderer.ok_or_else(|| {
                SidekickError::InvalidConfig("SendGrid mailer needs render_url to build the PDF".into())
            })?;
            Ok(Some(Arc::new(SendGridMailer::new(
                http.clone(),
                &config.sendgrid_url,
                key,
                from,
                renderer,
            ))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    fn relay_config() -> crate::config::AnalysisConfigBuilder {
        AnalysisConfig::builder()
            .relay_url("http://localhost:9/api/analyze")
            .credentials(Credentials::ServerHeld)
    }

    #[test]
    fn relay_services_build_without_network() {
        let services = Services::from_config(relay_config().build().unwrap()).unwrap();
        assert_eq!(services.client.backend_name(), "analysis relay");
        assert!(services.renderer.is_none());
        assert!(services.mailer.is_none());
    }

    #[test]
    fn sendgrid_requires_renderer_and_credentials() {
        let c = relay_config().mailer(MailerChoice::SendGrid).build().unwrap();
        assert!(matches!(Services::from_config(c), Err(SidekickError::InvalidConfig(_))));

        let c = relay_config()
            .mailer(MailerChoice::SendGrid)
            .sendgrid("SG.x", "reports@example.com")
            .build()
            .unwrap();
        assert!(Services::from_config(c).is_err(), "render_url is still missing");

        let c = relay_config()
            .mailer(MailerChoice::SendGrid)
            .sendgrid("SG.x", "reports@example.com")
            .render_url("http://localhost:9/api/convert-to-pdf")
            .build()
            .unwrap();
        assert!(Services::from_config(c).unwrap().mailer.is_some());
    }

    #[tokio::test]
    async fn download_without_renderer_is_config_error() {
        let services = Services::from_config(relay_config().build().unwrap()).unwrap();
        let report = ReportDocument {
            title: "t".into(),
            source_name: "s".into(),
            sections: vec![],
        };
        let err = services.download(&report).await.unwrap_err();
        assert!(matches!(err, SidekickError::InvalidConfig(_)));
    }
}
