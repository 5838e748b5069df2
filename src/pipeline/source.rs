//! Content Source Resolver: one of {text, PDF, media} → plain text.
//!
//! Limits are checked from file metadata before anything leaves the
//! process, so an oversized recording never costs an upload. PDFs are also
//! checked for the `%PDF` magic bytes so callers get a meaningful error
//! rather than an extractor failure.

use crate::config::AnalysisConfig;
use crate::error::SidekickError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Display name used when the source is typed text.
pub const TEXT_SOURCE_NAME: &str = "Text Analysis";

/// Turns a PDF file into text.
#[async_trait]
pub trait PdfTextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String, SidekickError>;
}

/// Turns an audio or video file into a transcript.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, path: &Path, mime: &str) -> Result<String, SidekickError>;
}

/// The single active input for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Text(String),
    Pdf(PathBuf),
    Media {
        path: PathBuf,
        /// Overrides the MIME type guessed from the extension.
        mime: Option<String>,
    },
}

/// Raw user choices, before the exactly-one rule is applied.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    pub text: Option<String>,
    pub pdf: Option<PathBuf>,
    pub media: Option<PathBuf>,
    pub media_mime: Option<String>,
}

impl ContentSource {
    /// Pick the one active source. Whitespace-only text counts as absent.
    pub fn from_options(opts: SourceOptions) -> Result<Self, SidekickError> {
        let text = opts.text.filter(|t| !t.trim().is_empty());

        let mut active = Vec::new();
        if text.is_some() {
            active.push("text".to_string());
        }
        if let Some(ref p) = opts.pdf {
            active.push(format!("pdf '{}'", p.display()));
        }
        if let Some(ref p) = opts.media {
            active.push(format!("media '{}'", p.display()));
        }
        if active.len() > 1 {
            return Err(SidekickError::MultipleSources { sources: active });
        }

        if let Some(text) = text {
            Ok(ContentSource::Text(text))
        } else if let Some(path) = opts.pdf {
            Ok(ContentSource::Pdf(path))
        } else if let Some(path) = opts.media {
            Ok(ContentSource::Media {
                path,
                mime: opts.media_mime,
            })
        } else {
            Err(SidekickError::NoContent)
        }
    }

    /// File name for file sources, [`TEXT_SOURCE_NAME`] for text.
    pub fn display_name(&self) -> String {
        match self {
            ContentSource::Text(_) => TEXT_SOURCE_NAME.to_string(),
            ContentSource::Pdf(path) | ContentSource::Media { path, .. } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }
}

/// A source reduced to text, with the name shown in the report title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub name: String,
    pub text: String,
}

/// Size ceilings applied before extraction or transcription.
#[derive(Debug, Clone, Copy)]
pub struct SourceLimits {
    pub pdf: u64,
    pub audio: u64,
    pub video: u64,
}

impl From<&AnalysisConfig> for SourceLimits {
    fn from(c: &AnalysisConfig) -> Self {
        Self {
            pdf: c.max_pdf_bytes,
            audio: c.max_audio_bytes,
            video: c.max_video_bytes,
        }
    }
}

/// Resolves a [`ContentSource`] using the configured collaborators.
#[derive(Clone)]
pub struct ContentResolver {
    pdf: Option<Arc<dyn PdfTextExtractor>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    limits: SourceLimits,
}

impl ContentResolver {
    pub fn new(
        pdf: Option<Arc<dyn PdfTextExtractor>>,
        transcriber: Option<Arc<dyn Transcriber>>,
        limits: SourceLimits,
    ) -> Self {
        Self {
            pdf,
            transcriber,
            limits,
        }
    }

    pub async fn resolve(&self, source: &ContentSource) -> Result<ResolvedSource, SidekickError> {
        let name = source.display_name();
        let text = match source {
            ContentSource::Text(text) => text.clone(),
            ContentSource::Pdf(path) => self.resolve_pdf(path).await?,
            ContentSource::Media { path, mime } => {
                self.resolve_media(path, mime.as_deref()).await?
            }
        };

        if text.trim().is_empty() {
            return Err(SidekickError::EmptyExtraction { name });
        }
        info!("Resolved source '{}' ({} chars)", name, text.len());
        Ok(ResolvedSource { name, text })
    }

    async fn resolve_pdf(&self, path: &Path) -> Result<String, SidekickError> {
        let size = file_size(path).await?;
        check_limit("PDF", path, size, self.limits.pdf)?;
        check_pdf_magic(path).await?;

        let extractor = self.pdf.as_ref().ok_or_else(|| {
            SidekickError::InvalidConfig(
                "no PDF extractor available: set pdf_extract_url or enable the `pdfium` feature"
                    .into(),
            )
        })?;
        debug!("Extracting text from {} ({} bytes)", path.display(), size);
        extractor.extract(path).await
    }

    async fn resolve_media(&self, path: &Path, mime: Option<&str>) -> Result<String, SidekickError> {
        let size = file_size(path).await?;
        let mime = match mime {
            Some(m) => m.to_string(),
            None => guess_mime(path),
        };
        let (kind, limit) = media_limit(path, &mime, &self.limits)?;
        check_limit(kind, path, size, limit)?;

        let transcriber = self.transcriber.as_ref().ok_or_else(|| {
            SidekickError::InvalidConfig("no transcription endpoint configured".into())
        })?;
        debug!("Transcribing {} ({}, {} bytes)", path.display(), mime, size);
        transcriber.transcribe(path, &mime).await
    }
}

/// MIME type from the file extension; `application/octet-stream` if unknown.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn media_limit(
    path: &Path,
    mime: &str,
    limits: &SourceLimits,
) -> Result<(&'static str, u64), SidekickError> {
    if mime.starts_with("audio/") {
        Ok(("Audio", limits.audio))
    } else if mime.starts_with("video/") {
        Ok(("Video", limits.video))
    } else {
        Err(SidekickError::UnsupportedMedia {
            path: path.to_path_buf(),
            mime: mime.to_string(),
        })
    }
}

fn check_limit(kind: &'static str, path: &Path, size: u64, limit: u64) -> Result<(), SidekickError> {
    if size > limit {
        return Err(SidekickError::ResourceLimit {
            kind,
            path: path.to_path_buf(),
            size,
            limit,
        });
    }
    Ok(())
}

async fn file_size(path: &Path) -> Result<u64, SidekickError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        Ok(_) => Err(SidekickError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(SidekickError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(SidekickError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

async fn check_pdf_magic(path: &Path) -> Result<(), SidekickError> {
    let mut file = tokio::fs::File::open(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            SidekickError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            SidekickError::FileNotFound {
                path: path.to_path_buf(),
            }
        }
    })?;

    let mut magic = [0u8; 4];
    let mut filled = 0;
    while filled < magic.len() {
        let n = file
            .read(&mut magic[filled..])
            .await
            .map_err(|e| SidekickError::Internal(format!("Failed to read '{}': {e}", path.display())))?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if &magic != b"%PDF" {
        return Err(SidekickError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}
