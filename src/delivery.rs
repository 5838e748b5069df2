//! Delivery collaborators: PDF rendering and email.
//!
//! Both paths take the same [`ReportDocument`] and refuse an empty one with
//! [`SidekickError::NothingCompleted`] before any network call. Delivery
//! failures are returned to the caller and never touch stage state.

use crate::error::SidekickError;
use crate::remote::{self, Prefer};
use crate::report::{self, ReportDocument};
use async_trait::async_trait;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

const RENDER_SERVICE: &str = "PDF render";
const SHARE_SERVICE: &str = "email share";
const SENDGRID_SERVICE: &str = "SendGrid";

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Turns report HTML into PDF bytes.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html: &str, file_name: &str) -> Result<Vec<u8>, SidekickError>;
}

/// Sends a report to one recipient; returns the service's confirmation text.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, report: &ReportDocument, recipient: &str) -> Result<String, SidekickError>;
}

/// A rendered report ready to be saved.
#[derive(Debug, Clone)]
pub struct DownloadedReport {
    /// Suggested file name, stamped with local time.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Check a recipient address before anything is sent.
pub fn validate_recipient(address: &str) -> Result<String, SidekickError> {
    let trimmed = address.trim();
    if EMAIL.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(SidekickError::InvalidRecipient {
            address: address.to_string(),
        })
    }
}

/// Render the report to PDF.
pub async fn download_report(
    report: &ReportDocument,
    renderer: &dyn PdfRenderer,
) -> Result<DownloadedReport, SidekickError> {
    report.ensure_not_empty()?;
    let bytes = renderer
        .render(&report.to_html(), &report.render_file_name())
        .await?;
    let file_name = report::download_file_name(chrono::Local::now());
    info!("Rendered report: {} ({} bytes)", file_name, bytes.len());
    Ok(DownloadedReport { file_name, bytes })
}

/// Email the report to `recipient`.
pub async fn share_report(
    report: &ReportDocument,
    mailer: &dyn Mailer,
    recipient: &str,
) -> Result<String, SidekickError> {
    report.ensure_not_empty()?;
    let recipient = validate_recipient(recipient)?;
    let message = mailer.send(report, &recipient).await?;
    info!("Report sent to {}", recipient);
    Ok(message)
}

// ── Render endpoint ──────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderBody<'a> {
    html_content: &'a str,
    file_name: &'a str,
}

/// `POST {htmlContent, fileName}` → PDF bytes.
pub struct RemotePdfRenderer {
    http: reqwest::Client,
    url: String,
}

impl RemotePdfRenderer {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PdfRenderer for RemotePdfRenderer {
    async fn render(&self, html: &str, file_name: &str) -> Result<Vec<u8>, SidekickError> {
        debug!("Rendering {} ({} chars of HTML)", file_name, html.len());
        let response = self
            .http
            .post(&self.url)
            .json(&RenderBody {
                html_content: html,
                file_name,
            })
            .send()
            .await
            .map_err(|e| remote::unreachable(RENDER_SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                remote::failure(RENDER_SERVICE, response, Prefer::Details, "Failed to generate PDF")
                    .await,
            );
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| remote::unreachable(RENDER_SERVICE, e))?;
        if bytes.is_empty() {
            return Err(SidekickError::remote(
                RENDER_SERVICE,
                Some(status.as_u16()),
                "Generated PDF is empty",
            ));
        }
        Ok(bytes.to_vec())
    }
}

// ── Share endpoint ───────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShareBody<'a> {
    html_content: &'a str,
    file_name: &'a str,
    recipient_email: &'a str,
}

#[derive(Deserialize)]
struct ShareReply {
    message: Option<String>,
}

/// `POST {htmlContent, fileName, recipientEmail}`; the endpoint renders and mails.
pub struct RelayMailer {
    http: reqwest::Client,
    url: String,
}

impl RelayMailer {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, report: &ReportDocument, recipient: &str) -> Result<String, SidekickError> {
        let html = report.to_html();
        let file_name = report.render_file_name();
        let response = self
            .http
            .post(&self.url)
            .json(&ShareBody {
                html_content: &html,
                file_name: &file_name,
                recipient_email: recipient,
            })
            .send()
            .await
            .map_err(|e| remote::unreachable(SHARE_SERVICE, e))?;

        if !response.status().is_success() {
            return Err(
                remote::failure(SHARE_SERVICE, response, Prefer::Details, "Failed to send email")
                    .await,
            );
        }

        let reply: ShareReply = response.json().await.unwrap_or(ShareReply { message: None });
        Ok(reply
            .message
            .unwrap_or_else(|| "Email sent successfully".to_string()))
    }
}

// ── SendGrid ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct Attachment<'a> {
    content: String,
    filename: String,
    #[serde(rename = "type")]
    kind: &'a str,
    disposition: &'a str,
}

#[derive(Serialize)]
struct SendGridMail<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: String,
    content: Vec<Content<'a>>,
    attachments: Vec<Attachment<'a>>,
}

#[derive(Deserialize, Default)]
struct SendGridErrors {
    #[serde(default)]
    errors: Vec<SendGridErrorItem>,
}

#[derive(Deserialize)]
struct SendGridErrorItem {
    message: String,
}

/// Renders through a [`PdfRenderer`], then mails the PDF with the SendGrid v3 API.
pub struct SendGridMailer {
    http: reqwest::Client,
    url: String,
    api_key: String,
    from: String,
    renderer: Arc<dyn PdfRenderer>,
}

impl SendGridMailer {
    pub fn new(
        http: reqwest::Client,
        url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
        renderer: Arc<dyn PdfRenderer>,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            api_key: api_key.into(),
            from: from.into(),
            renderer,
        }
    }

    fn mail<'a>(&'a self, recipient: &'a str, file_name: &str, pdf: &[u8]) -> SendGridMail<'a> {
        SendGridMail {
            personalizations: vec![Personalization {
                to: vec![Address { email: recipient }],
            }],
            from: Address { email: &self.from },
            subject: format!("{} - {}", report::DOWNLOAD_PREFIX, file_name),
            content: vec![Content {
                kind: "text/plain",
                value: "Please find attached your customer research analysis report.",
            }],
            attachments: vec![Attachment {
                content: base64::engine::general_purpose::STANDARD.encode(pdf),
                filename: format!("{file_name}.pdf"),
                kind: "application/pdf",
                disposition: "attachment",
            }],
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, report: &ReportDocument, recipient: &str) -> Result<String, SidekickError> {
        let file_name = report.render_file_name();
        let pdf = self.renderer.render(&report.to_html(), &file_name).await?;

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.mail(recipient, &file_name, &pdf))
            .send()
            .await
            .map_err(|e| remote::unreachable(SENDGRID_SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed: SendGridErrors = serde_json::from_str(&body).unwrap_or_default();
            let message = if parsed.errors.is_empty() {
                "Failed to send email".to_string()
            } else {
                parsed
                    .errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            return Err(SidekickError::remote(SENDGRID_SERVICE, Some(status.as_u16()), message));
        }
        Ok("Email sent successfully".to_string())
    }
}
