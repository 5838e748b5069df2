//! Error types for the research-sidekick library.
//!
//! Two error types reflect two failure modes:
//!
//! * [`SidekickError`]: **fatal** for the operation that returned it (no
//!   usable source, a delivery call failed, bad configuration). Returned as
//!   `Err(SidekickError)` from resolver, client, and delivery functions.
//!
//! * [`StageError`]: **non-fatal** for the session. A single analysis stage
//!   failed; the text is stored in that stage's slot of the
//!   [`crate::pipeline::orchestrator::AnalysisSession`] so the user can read
//!   it and retry. It never escapes the sequence runner.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used by callers that only care about the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// No or invalid source content, bad recipient address.
    Input,
    /// An LLM or delivery endpoint failed or could not be reached.
    RemoteService,
    /// Unknown stage id, malformed catalog lookup, stage already running.
    Contract,
    /// A file exceeded its size ceiling.
    ResourceLimit,
    /// Nothing has completed yet, so there is nothing to deliver.
    Delivery,
    Config,
    Io,
    Internal,
}

/// All fatal errors returned by the research-sidekick library.
#[derive(Debug, Error)]
pub enum SidekickError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No text, PDF, or media source was supplied.
    #[error("No content provided.\nUpload a file or enter text to analyze.")]
    NoContent,

    /// More than one source was supplied; exactly one must be active.
    #[error("Exactly one content source may be active, got: {}", .sources.join(", "))]
    MultipleSources { sources: Vec<String> },

    /// Source file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// pdfium could not open or read the PDF.
    #[error("PDF '{path}' could not be read: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Media file MIME type is neither `audio/*` nor `video/*`.
    #[error("Unsupported media type '{mime}' for '{path}'\nExpected an audio/* or video/* file.")]
    UnsupportedMedia { path: PathBuf, mime: String },

    /// Extraction or transcription succeeded but produced no text.
    #[error("No text could be extracted from '{name}'")]
    EmptyExtraction { name: String },

    /// Email recipient is empty or not an address.
    #[error("Invalid recipient email address: '{address}'")]
    InvalidRecipient { address: String },

    // ── Resource limits ───────────────────────────────────────────────────
    /// File is larger than the ceiling for its kind.
    #[error("{kind} file size must be less than {}MB ('{path}' is {size} bytes)", .limit / (1024 * 1024))]
    ResourceLimit {
        kind: &'static str,
        path: PathBuf,
        size: u64,
        limit: u64,
    },

    // ── Remote service errors ─────────────────────────────────────────────
    /// An upstream endpoint answered non-2xx, sent a malformed body, or
    /// could not be reached (`status` is `None` in that case).
    #[error("{service} error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    RemoteService {
        service: String,
        status: Option<u16>,
        message: String,
    },

    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Contract errors ───────────────────────────────────────────────────
    /// The stage id is not in the prompt catalog.
    #[error("Unknown analysis stage '{id}'")]
    UnknownStage { id: String },

    /// Another stage is running; stages never overlap.
    #[error("Cannot start '{requested}' while '{running}' is running")]
    StageBusy { requested: String, running: String },

    // ── Delivery errors ───────────────────────────────────────────────────
    /// The report has no completed sections.
    #[error("Nothing completed yet.\nWait for at least one analysis to finish before generating a report.")]
    NothingCompleted,

    // ── Config / I/O ──────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SidekickError {
    /// Shorthand for a [`SidekickError::RemoteService`] value.
    pub fn remote(service: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        SidekickError::RemoteService {
            service: service.into(),
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        use SidekickError::*;
        match self {
            NoContent
            | MultipleSources { .. }
            | FileNotFound { .. }
            | PermissionDenied { .. }
            | NotAPdf { .. }
            | CorruptPdf { .. }
            | UnsupportedMedia { .. }
            | EmptyExtraction { .. }
            | InvalidRecipient { .. } => ErrorKind::Input,
            ResourceLimit { .. } => ErrorKind::ResourceLimit,
            RemoteService { .. } | ProviderNotConfigured { .. } => ErrorKind::RemoteService,
            UnknownStage { .. } | StageBusy { .. } => ErrorKind::Contract,
            NothingCompleted => ErrorKind::Delivery,
            InvalidConfig(_) => ErrorKind::Config,
            OutputWriteFailed { .. } => ErrorKind::Io,
            Internal(_) => ErrorKind::Internal,
        }
    }
}

/// A non-fatal error recorded against a single stage.
///
/// `message` is what the user sees next to the retry action. For remote
/// failures it is the upstream message as received, not a wrapped string.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct StageError {
    pub stage: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl StageError {
    pub fn from_error(stage: &str, err: &SidekickError) -> Self {
        let message = match err {
            SidekickError::RemoteService { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            stage: stage.to_string(),
            kind: err.kind(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_display_with_status() {
        let e = SidekickError::remote("analysis relay", Some(502), "upstream overloaded");
        let msg = e.to_string();
        assert!(msg.contains("HTTP 502"), "got: {msg}");
        assert!(msg.contains("upstream overloaded"));
    }

    #[test]
    fn remote_display_unreachable() {
        let e = SidekickError::remote("analysis relay", None, "connection refused");
        assert!(!e.to_string().contains("HTTP"));
        assert_eq!(e.kind(), ErrorKind::RemoteService);
    }

    #[test]
    fn resource_limit_mentions_megabytes() {
        let e = SidekickError::ResourceLimit {
            kind: "Audio",
            path: PathBuf::from("call.mp3"),
            size: 30 * 1024 * 1024,
            limit: 25 * 1024 * 1024,
        };
        assert!(e.to_string().starts_with("Audio file size must be less than 25MB"));
        assert_eq!(e.kind(), ErrorKind::ResourceLimit);
    }

    #[test]
    fn stage_error_keeps_upstream_text() {
        let e = SidekickError::remote("analysis relay", Some(500), "Anthropic API key not configured");
        let se = StageError::from_error("needs", &e);
        assert_eq!(se.to_string(), "Anthropic API key not configured");
        assert_eq!(se.kind, ErrorKind::RemoteService);
    }

    #[test]
    fn unknown_stage_is_contract() {
        let e = SidekickError::UnknownStage { id: "vibes".into() };
        assert_eq!(e.kind(), ErrorKind::Contract);
        assert_eq!(StageError::from_error("vibes", &e).message, "Unknown analysis stage 'vibes'");
    }
}
