//! CLI binary for research-sidekick.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig`, runs the stage sequence with a live progress bar, and
//! writes or sends the report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use research_sidekick::{
    report, stages, AnalysisConfig, BackendChoice, ContentSource, ContextMode, Credentials,
    MailerChoice, ProgressCallback, SequenceOutcome, Services, SourceOptions, StageOrchestrator,
    StageProgressCallback, StageRun, STAGES,
};
use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

static TITLE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(\s*)(Title:)(.*)$").unwrap());

/// Make `Title:` lines stand out in analysis text.
fn highlight(text: &str) -> String {
    TITLE_LINE
        .replace_all(text, |caps: &regex::Captures| {
            format!("{}{}", &caps[1], bold(&cyan(&format!("{}{}", &caps[2], &caps[3]))))
        })
        .into_owned()
}

fn label_of(stage_id: &str) -> &str {
    stages::find(stage_id).map(|s| s.label).unwrap_or(stage_id)
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a bar over the ten stages plus one log line
/// per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:30.green/238}] {pos:>2}/{len} stages  {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(STAGES.len() as u64);
        bar.set_style(style);
        bar.set_prefix("Analyzing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self, stage_id: &str) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(stage_id)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl StageProgressCallback for CliProgressCallback {
    fn on_sequence_start(&self, total_stages: usize) {
        self.bar.set_length(total_stages as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Running {total_stages} analyses…"))
        ));
    }

    fn on_stage_start(&self, stage_id: &str, ordinal: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(stage_id.to_string(), Instant::now());
        self.bar.set_position(ordinal as u64);
        self.bar.set_message(label_of(stage_id).to_string());
    }

    fn on_stage_progress(&self, stage_id: &str, percent: u8) {
        self.bar
            .set_message(format!("{} {}", label_of(stage_id), dim(&format!("{percent}%"))));
    }

    fn on_stage_complete(&self, stage_id: &str, content_len: usize) {
        let secs = self.elapsed(stage_id);
        self.bar.println(format!(
            "  {} {:<36}  {:<8}  {}",
            green("✓"),
            label_of(stage_id),
            dim(&format!("{content_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_stage_error(&self, stage_id: &str, error: &str) {
        let secs = self.elapsed(stage_id);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<36}  {}  {}",
            red("✗"),
            label_of(stage_id),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
    }

    fn on_sequence_complete(&self, total_stages: usize, completed: usize) {
        self.bar.set_position(completed as u64);
        if completed == total_stages {
            self.bar.println(format!(
                "{} {} analyses completed",
                green("✔"),
                bold(&completed.to_string())
            ));
        } else {
            self.bar.println(format!(
                "{} {}/{} analyses completed  ({} failed attempts)",
                cyan("⚠"),
                bold(&completed.to_string()),
                total_stages,
                red(&self.errors.load(Ordering::SeqCst).to_string()),
            ));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyze typed text through a relay, print the report
  sidekick --relay-url http://localhost:3000/api/analyze --text "Customer said: ..."

  # Analyze a PDF transcript, save HTML and a rendered PDF
  sidekick --pdf call.pdf -o report.html \
           --render-url http://localhost:3000/api/convert-to-pdf --download .

  # Transcribe a recording, then email the report
  sidekick --media call.mp3 --transcribe-url http://localhost:3000/api/transcribe \
           --share-url http://localhost:3000/api/share-pdf --email pm@example.com

  # Run a single stage directly against Anthropic
  ANTHROPIC_API_KEY=sk-... sidekick --backend provider --stage curse --text-file call.txt

  # Offer to retry a failed stage
  sidekick --interactive --pdf call.pdf

  # List the analysis stages
  sidekick --list-stages

LIMITS:
  PDF 5 MB, audio 25 MB, video 100 MB (checked before upload).

ENVIRONMENT VARIABLES:
  SIDEKICK_RELAY_URL         Analysis relay endpoint
  SIDEKICK_API_KEY           Key sent to the relay with every request
  SIDEKICK_PDF_EXTRACT_URL   PDF text-extraction endpoint (else local pdfium)
  SIDEKICK_TRANSCRIBE_URL    Media transcription endpoint
  SIDEKICK_RENDER_URL        HTML → PDF render endpoint
  SIDEKICK_SHARE_URL         Email share endpoint
  SENDGRID_API_KEY           SendGrid key for --mailer sendgrid
  SENDGRID_FROM_EMAIL        Sender address for --mailer sendgrid
  ANTHROPIC_API_KEY          Direct provider key (also OPENAI_API_KEY, …)
  EDGEQUAKE_LLM_PROVIDER     Override provider for the direct backend
  EDGEQUAKE_MODEL            Override model ID
  PDFIUM_LIB_PATH            Path to libpdfium for local PDF extraction

A .env file in the working directory is loaded first.
"#;

/// Run customer-interview analyses and deliver the report.
#[derive(Parser, Debug)]
#[command(
    name = "sidekick",
    version,
    about = "Run Jobs-to-be-Done analyses over a customer interview",
    long_about = "Run ten sequential LLM analyses (JTBD goals, gains, needs, pains, friction, \
severity, CURSE, demand, opportunity, final report) over a transcript supplied as text, a PDF, \
or an audio/video file, then print, save, render, or email the report.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Transcript text to analyze.
    #[arg(long, conflicts_with = "text_file")]
    text: Option<String>,

    /// Read the transcript text from this file.
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// PDF transcript.
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Audio or video recording to transcribe.
    #[arg(long)]
    media: Option<PathBuf>,

    /// MIME type of --media when the extension is misleading.
    #[arg(long, requires = "media")]
    media_type: Option<String>,

    /// Which analysis backend to use.
    #[arg(long, env = "SIDEKICK_BACKEND", value_enum, default_value = "auto")]
    backend: BackendArg,

    /// Analysis relay endpoint.
    #[arg(long, env = "SIDEKICK_RELAY_URL")]
    relay_url: Option<String>,

    /// API key to send to the relay.
    #[arg(long, env = "SIDEKICK_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Read the relay API key from this environment variable instead.
    #[arg(long, conflicts_with = "api_key")]
    api_key_env: Option<String>,

    /// LLM provider for the direct backend: anthropic, openai, gemini, ollama, …
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Model ID for the direct backend.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Max tokens generated per stage.
    #[arg(long, env = "SIDEKICK_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "SIDEKICK_TEMPERATURE")]
    temperature: Option<f32>,

    /// What each stage sees besides its prompt.
    #[arg(long, env = "SIDEKICK_CONTEXT", value_enum, default_value = "source-only")]
    context: ContextArg,

    /// PDF text-extraction endpoint (local pdfium when unset).
    #[arg(long, env = "SIDEKICK_PDF_EXTRACT_URL")]
    pdf_extract_url: Option<String>,

    /// Path to libpdfium for local extraction.
    #[arg(long)]
    pdfium_lib: Option<PathBuf>,

    /// Media transcription endpoint.
    #[arg(long, env = "SIDEKICK_TRANSCRIBE_URL")]
    transcribe_url: Option<String>,

    /// HTML → PDF render endpoint.
    #[arg(long, env = "SIDEKICK_RENDER_URL")]
    render_url: Option<String>,

    /// Email share endpoint.
    #[arg(long, env = "SIDEKICK_SHARE_URL")]
    share_url: Option<String>,

    /// Email transport.
    #[arg(long, env = "SIDEKICK_MAILER", value_enum, default_value = "relay")]
    mailer: MailerArg,

    #[arg(long, env = "SENDGRID_API_KEY", hide_env_values = true)]
    sendgrid_key: Option<String>,

    #[arg(long, env = "SENDGRID_FROM_EMAIL")]
    sendgrid_from: Option<String>,

    /// Pause between stages in milliseconds.
    #[arg(long, env = "SIDEKICK_STAGE_PAUSE_MS", default_value_t = 1000)]
    pause_ms: u64,

    /// Run only this stage (see --list-stages).
    #[arg(long)]
    stage: Option<String>,

    /// Print the stage catalog and exit.
    #[arg(long)]
    list_stages: bool,

    /// Write the report to this file (.md → Markdown, otherwise HTML).
    #[arg(short, long, env = "SIDEKICK_OUTPUT")]
    output: Option<PathBuf>,

    /// Report format for --output, overriding the extension.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Render the report to PDF and save it here (file or directory).
    #[arg(long)]
    download: Option<PathBuf>,

    /// Email the rendered report to this address.
    #[arg(long)]
    email: Option<String>,

    /// Offer to retry a failed stage.
    #[arg(short, long)]
    interactive: bool,

    /// Print the session snapshot as JSON instead of the report.
    #[arg(long, env = "SIDEKICK_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SIDEKICK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SIDEKICK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SIDEKICK_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Auto,
    Relay,
    Provider,
}

impl From<BackendArg> for BackendChoice {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Auto => BackendChoice::Auto,
            BackendArg::Relay => BackendChoice::Relay,
            BackendArg::Provider => BackendChoice::Provider,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ContextArg {
    SourceOnly,
    Cumulative,
}

impl From<ContextArg> for ContextMode {
    fn from(v: ContextArg) -> Self {
        match v {
            ContextArg::SourceOnly => ContextMode::SourceOnly,
            ContextArg::Cumulative => ContextMode::Cumulative,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum MailerArg {
    Relay,
    Sendgrid,
}

impl From<MailerArg> for MailerChoice {
    fn from(v: MailerArg) -> Self {
        match v {
            MailerArg::Relay => MailerChoice::Relay,
            MailerArg::Sendgrid => MailerChoice::SendGrid,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Html,
    Markdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is normal.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters, so library
    // INFO logs are suppressed while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.list_stages {
        print_stages(cli.json)?;
        return Ok(());
    }

    // ── Source ───────────────────────────────────────────────────────────
    let text = match cli.text_file {
        Some(ref path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read transcript from {:?}", path))?,
        ),
        None => cli.text.clone(),
    };
    let source = ContentSource::from_options(SourceOptions {
        text,
        pdf: cli.pdf.clone(),
        media: cli.media.clone(),
        media_mime: cli.media_type.clone(),
    })
    .context("No usable content source")?;

    // ── Build services ───────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as ProgressCallback),
    )?;
    let services = Services::from_config(config).context("Failed to set up services")?;

    if !cli.quiet && !cli.json {
        eprintln!("{} Reading {}", cyan("◆"), bold(&source.display_name()));
    }
    let session = services
        .start_session(&source)
        .await
        .context("Failed to read the source")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let halted = match cli.stage {
        Some(ref id) => run_single(&session, id, cli.interactive).await?,
        None => run_all(&session, cli.interactive).await?,
    };
    if let Some(ref cb) = progress {
        cb.finish();
    }

    // ── Output ───────────────────────────────────────────────────────────
    let report = session.report();

    if cli.json {
        let json = serde_json::to_string_pretty(&session.snapshot())
            .context("Failed to serialise session")?;
        println!("{json}");
    } else if cli.output.is_none() && !cli.quiet {
        print_results(&session, cli.stage.as_deref())?;
    }

    if let Some(ref path) = cli.output {
        let format = cli.format.unwrap_or_else(|| format_for(path));
        let body = match format {
            FormatArg::Html => report.to_html(),
            FormatArg::Markdown => report.to_markdown(),
        };
        report::write_atomic(path, body.as_bytes())
            .await
            .context("Failed to write report")?;
        if !cli.quiet {
            eprintln!("{} Report  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    if let Some(ref target) = cli.download {
        let pdf = services
            .download(&report)
            .await
            .context("PDF download failed")?;
        let path = if target.is_dir() {
            target.join(&pdf.file_name)
        } else {
            target.clone()
        };
        report::write_atomic(&path, &pdf.bytes)
            .await
            .context("Failed to save PDF")?;
        if !cli.quiet {
            eprintln!("{} PDF     →  {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    if let Some(ref recipient) = cli.email {
        let message = services
            .share(&report, recipient)
            .await
            .context("Email failed")?;
        if !cli.quiet {
            eprintln!("{} {}  →  {}", green("✔"), message, bold(recipient));
        }
    }

    if let Some((stage, error)) = halted {
        eprintln!("{} {} failed: {}", red("✘"), bold(label_of(&stage)), red(&error));
        std::process::exit(2);
    }
    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let credentials = match (&cli.api_key, &cli.api_key_env) {
        (Some(key), _) => Credentials::Static(key.clone()),
        (None, Some(var)) => Credentials::Env(var.clone()),
        (None, None) => Credentials::ServerHeld,
    };

    let mut builder = AnalysisConfig::builder()
        .backend(cli.backend.into())
        .credentials(credentials)
        .max_tokens(cli.max_tokens)
        .context_mode(cli.context.into())
        .mailer(cli.mailer.into())
        .stage_pause_ms(cli.pause_ms);

    if let Some(ref url) = cli.relay_url {
        builder = builder.relay_url(url);
    }
    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p);
    }
    if let Some(ref m) = cli.model {
        builder = builder.model(m);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(ref url) = cli.pdf_extract_url {
        builder = builder.pdf_extract_url(url);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library(lib);
    }
    if let Some(ref url) = cli.transcribe_url {
        builder = builder.transcribe_url(url);
    }
    if let Some(ref url) = cli.render_url {
        builder = builder.render_url(url);
    }
    if let Some(ref url) = cli.share_url {
        builder = builder.share_url(url);
    }
    if let (Some(key), Some(from)) = (&cli.sendgrid_key, &cli.sendgrid_from) {
        builder = builder.sendgrid(key, from);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Run the sequence; with `interactive`, offer to retry the failed stage
/// and resume. Returns the stage that is still failed, if any.
async fn run_all(session: &StageOrchestrator, interactive: bool) -> Result<Option<(String, String)>> {
    let mut outcome = session.run_sequence().await;
    loop {
        match outcome {
            SequenceOutcome::Completed { .. } => return Ok(None),
            SequenceOutcome::AlreadyRunning => anyhow::bail!("a sequence is already running"),
            SequenceOutcome::Halted { stage, error } => {
                if !interactive || !confirm_retry(&stage, &error.message).await? {
                    return Ok(Some((stage, error.message)));
                }
                match session.retry_stage(&stage).await? {
                    StageRun::Failed(error) => {
                        outcome = SequenceOutcome::Halted { stage, error };
                    }
                    StageRun::Completed | StageRun::AlreadyCompleted => {
                        outcome = session.run_sequence().await;
                    }
                }
            }
        }
    }
}

async fn run_single(
    session: &StageOrchestrator,
    stage_id: &str,
    interactive: bool,
) -> Result<Option<(String, String)>> {
    let mut run = session.run_stage(stage_id).await?;
    loop {
        match run {
            StageRun::Completed | StageRun::AlreadyCompleted => return Ok(None),
            StageRun::Failed(error) => {
                if !interactive || !confirm_retry(stage_id, &error.message).await? {
                    return Ok(Some((stage_id.to_string(), error.message)));
                }
                run = session.retry_stage(stage_id).await?;
            }
        }
    }
}

async fn confirm_retry(stage_id: &str, error: &str) -> Result<bool> {
    eprintln!("{} {}: {}", red("✗"), bold(label_of(stage_id)), error);
    eprint!("Retry {}? [y/N] ", label_of(stage_id));
    io::stderr().flush().ok();

    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .context("stdin task failed")?
    .context("Failed to read answer")?;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_results(session: &StageOrchestrator, only: Option<&str>) -> Result<()> {
    let snapshot = session.snapshot();
    let colour = io::stdout().is_terminal();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for stage in &snapshot.stages {
        if only.is_some_and(|id| id != stage.id) {
            continue;
        }
        let Some(ref content) = stage.content else {
            continue;
        };
        let heading = format!("## {}", stage.label);
        let body = if colour { highlight(content) } else { content.clone() };
        writeln!(
            out,
            "{}\n\n{}\n",
            if colour { bold(&heading) } else { heading },
            body.trim_end()
        )
        .context("Failed to write to stdout")?;
    }
    Ok(())
}

fn print_stages(json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&STAGES).context("Failed to serialise stages")?
        );
        return Ok(());
    }
    for stage in STAGES.iter() {
        println!("{:>2}. {:<16} {}", stage.ordinal + 1, stage.id, bold(stage.label));
        println!("    {}", dim(stage.description));
    }
    Ok(())
}

fn format_for(path: &Path) -> FormatArg {
    match path.extension().and_then(|e| e.to_str()) {
        Some("md") | Some("markdown") => FormatArg::Markdown,
        _ => FormatArg::Html,
    }
}
