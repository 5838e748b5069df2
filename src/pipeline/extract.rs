//! Text-extraction and transcription collaborators.
//!
//! The remote variants upload the file as a multipart `file` field and
//! expect `{text}` back (or `{error}` on failure). [`PdfiumExtractor`] reads
//! the text layer locally instead and is used when no extraction endpoint
//! is configured.

use crate::error::SidekickError;
use crate::pipeline::source::{guess_mime, PdfTextExtractor, Transcriber};
use crate::remote::{self, Prefer};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

const PDF_SERVICE: &str = "PDF extraction";
const TRANSCRIBE_SERVICE: &str = "transcription";

#[derive(Debug, Deserialize)]
struct TextReply {
    text: Option<String>,
}

async fn upload_for_text(
    http: &reqwest::Client,
    url: &str,
    service: &str,
    path: &Path,
    mime: &str,
    fallback: &str,
) -> Result<String, SidekickError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|_| SidekickError::FileNotFound {
            path: path.to_path_buf(),
        })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    debug!("Uploading {} bytes to {} ({})", bytes.len(), service, mime);
    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime)
        .map_err(|e| SidekickError::Internal(format!("invalid MIME type '{mime}': {e}")))?;
    let form = Form::new().part("file", part);

    let response = http
        .post(url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| remote::unreachable(service, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(remote::failure(service, response, Prefer::Error, fallback).await);
    }

    let reply: TextReply = response.json().await.map_err(|e| {
        SidekickError::remote(service, Some(status.as_u16()), format!("malformed response: {e}"))
    })?;
    reply.text.ok_or_else(|| {
        SidekickError::remote(service, Some(status.as_u16()), "response has no 'text' field")
    })
}

/// Uploads the PDF to an extraction endpoint.
pub struct RemotePdfExtractor {
    http: reqwest::Client,
    url: String,
}

impl RemotePdfExtractor {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PdfTextExtractor for RemotePdfExtractor {
    async fn extract(&self, path: &Path) -> Result<String, SidekickError> {
        upload_for_text(
            &self.http,
            &self.url,
            PDF_SERVICE,
            path,
            "application/pdf",
            "Failed to extract text from PDF",
        )
        .await
    }
}

/// Uploads audio or video to a transcription endpoint.
pub struct RemoteTranscriber {
    http: reqwest::Client,
    url: String,
}

impl RemoteTranscriber {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Transcriber for RemoteTranscriber {
    async fn transcribe(&self, path: &Path, mime: &str) -> Result<String, SidekickError> {
        let mime = if mime.is_empty() {
            guess_mime(path)
        } else {
            mime.to_string()
        };
        upload_for_text(
            &self.http,
            &self.url,
            TRANSCRIBE_SERVICE,
            path,
            &mime,
            "Failed to transcribe media",
        )
        .await
    }
}

// ── Local pdfium extraction ──────────────────────────────────────────────

#[cfg(feature = "pdfium")]
pub use local::PdfiumExtractor;

#[cfg(feature = "pdfium")]
mod local {
    use super::*;
    use pdfium_render::prelude::*;
    use std::path::PathBuf;

    /// Reads the PDF text layer with pdfium.
    ///
    /// pdfium is not async-safe, so the work runs under `spawn_blocking`.
    /// Scanned PDFs without a text layer come back empty and are rejected by
    /// the resolver.
    pub struct PdfiumExtractor {
        library: Option<PathBuf>,
    }

    impl PdfiumExtractor {
        /// `library` is an explicit libpdfium path; `None` tries
        /// `PDFIUM_LIB_PATH` and then the system library.
        pub fn new(library: Option<PathBuf>) -> Self {
            Self { library }
        }
    }

    #[async_trait]
    impl PdfTextExtractor for PdfiumExtractor {
        async fn extract(&self, path: &Path) -> Result<String, SidekickError> {
            let path = path.to_path_buf();
            let library = self
                .library
                .clone()
                .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

            tokio::task::spawn_blocking(move || extract_blocking(&path, library.as_deref()))
                .await
                .map_err(|e| SidekickError::Internal(format!("Extraction task panicked: {}", e)))?
        }
    }

    fn bind(library: Option<&Path>) -> Result<Pdfium, SidekickError> {
        let bindings = match library {
            Some(lib) => Pdfium::bind_to_library(lib),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| {
            SidekickError::InvalidConfig(format!(
                "pdfium library could not be loaded ({e:?}). \
                 Set PDFIUM_LIB_PATH or configure pdf_extract_url."
            ))
        })?;
        Ok(Pdfium::new(bindings))
    }

    fn extract_blocking(pdf_path: &Path, library: Option<&Path>) -> Result<String, SidekickError> {
        let pdfium = bind(library)?;
        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| SidekickError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let mut pages_text = Vec::new();
        for page in document.pages().iter() {
            let text = page.text().map_err(|e| SidekickError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;
            pages_text.push(text.all());
        }
        debug!(
            "Extracted text from {} pages of {}",
            pages_text.len(),
            pdf_path.display()
        );
        Ok(pages_text.join("\n\n"))
    }
}
