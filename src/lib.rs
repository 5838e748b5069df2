//! # research-sidekick
//!
//! Run ten Jobs-to-be-Done style analyses over a customer interview and
//! deliver the results as one report.
//!
//! A transcript comes in as typed text, a PDF, or an audio/video recording.
//! Each analysis stage sends the transcript and a fixed prompt to an LLM,
//! one stage at a time. Per-stage results and errors are kept in a session;
//! a failed stage halts the sequence and can be retried by hand. Completed
//! stages are folded into a report that can be rendered to PDF or emailed.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text | PDF | media
//!  │
//!  ├─ 1. Source   exactly one input → plain text (extraction / transcription)
//!  ├─ 2. Stages   10 prompts, sequential, halt on first failure
//!  ├─ 3. Report   completed stages in catalog order → HTML / Markdown
//!  └─ 4. Deliver  HTML → PDF download, or email
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use research_sidekick::{AnalysisConfig, ContentSource, SequenceOutcome, Services};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalysisConfig::builder()
//!         .relay_url("http://localhost:3000/api/analyze")
//!         .render_url("http://localhost:3000/api/convert-to-pdf")
//!         .build()?;
//!     let services = Services::from_config(config)?;
//!
//!     let source = ContentSource::Text("Customer said: I need a faster export".into());
//!     let session = services.start_session(&source).await?;
//!
//!     if let SequenceOutcome::Halted { stage, error } = session.run_sequence().await {
//!         eprintln!("{stage} failed: {error}");
//!     }
//!     println!("{}", session.report().to_markdown());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `sidekick` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `pdfium` | on      | Local PDF text extraction when no extraction endpoint is configured |
//!
//! ```toml
//! research-sidekick = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod delivery;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod remote;
pub mod report;
pub mod services;
pub mod stages;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    AnalysisConfig, AnalysisConfigBuilder, BackendChoice, ContextMode, Credentials, MailerChoice,
};
pub use delivery::{DownloadedReport, Mailer, PdfRenderer};
pub use error::{ErrorKind, SidekickError, StageError};
pub use pipeline::analysis::{AnalysisBackend, AnalysisClient, AnalysisRequest};
pub use pipeline::orchestrator::{
    AnalysisSession, SequenceOutcome, SessionSnapshot, StageOrchestrator, StageRun, StageState,
};
pub use pipeline::source::{ContentSource, ResolvedSource, SourceOptions};
pub use progress::{NoopProgressCallback, ProgressCallback, StageProgressCallback};
pub use report::{ReportDocument, ReportSection};
pub use services::Services;
pub use stages::{AnalysisStage, STAGES};
pub use stream::{event_channel, StageEvent};
