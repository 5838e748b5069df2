//! Stage Orchestrator: runs the ten stages one at a time over one source.
//!
//! ## Locking
//!
//! The orchestrator is shared behind an `Arc` so a retry can be issued from
//! another task while the caller watches progress. Session state lives in a
//! `std::sync::Mutex` that is only held for bookkeeping, never across an
//! `.await`. Two rules are enforced under that lock:
//!
//! * at most one stage is `Running` at a time (a second request gets
//!   [`SidekickError::StageBusy`]);
//! * a `Completed` stage is only re-run through [`StageOrchestrator::retry_stage`].
//!
//! `run_sequence` is single-flight through an `AtomicBool`; a concurrent call
//! returns [`SequenceOutcome::AlreadyRunning`] without touching anything.
//! When a manual retry holds the running slot as the sequence reaches its
//! next stage, the sequence waits for that stage to settle and carries on.
//!
//! Failures are stored as [`StageError`] in the session and never retried
//! here. The sequence halts at the first one.

use crate::config::{AnalysisConfig, ContextMode};
use crate::error::{SidekickError, StageError};
use crate::pipeline::analysis::AnalysisClient;
use crate::pipeline::source::ResolvedSource;
use crate::progress::{next_estimate, NoopProgressCallback, ProgressCallback};
use crate::prompts;
use crate::report::{self, ReportDocument};
use crate::stages::{self, AnalysisStage, STAGES};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// State of one stage. Absent from the session means "not yet run".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum StageState {
    Running,
    Completed { content: String },
    Failed { error: StageError },
}

/// In-memory aggregate for one submission.
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    source_name: String,
    source_text: String,
    results: HashMap<&'static str, StageState>,
    selected: &'static AnalysisStage,
}

impl AnalysisSession {
    pub fn new(source: ResolvedSource) -> Self {
        Self {
            source_name: source.name,
            source_text: source.text,
            results: HashMap::new(),
            selected: stages::first(),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn state(&self, stage_id: &str) -> Option<&StageState> {
        self.results.get(stage_id)
    }

    /// Stored analysis text for a completed stage.
    pub fn content(&self, stage_id: &str) -> Option<&str> {
        match self.results.get(stage_id) {
            Some(StageState::Completed { content }) => Some(content),
            _ => None,
        }
    }

    pub fn error(&self, stage_id: &str) -> Option<&StageError> {
        match self.results.get(stage_id) {
            Some(StageState::Failed { error }) => Some(error),
            _ => None,
        }
    }

    pub fn is_completed(&self, stage_id: &str) -> bool {
        self.content(stage_id).is_some()
    }

    pub fn completed_count(&self) -> usize {
        self.results
            .values()
            .filter(|s| matches!(s, StageState::Completed { .. }))
            .count()
    }

    /// The stage currently marked running, if any.
    pub fn running_stage(&self) -> Option<&'static str> {
        STAGES
            .iter()
            .find(|s| matches!(self.results.get(s.id), Some(StageState::Running)))
            .map(|s| s.id)
    }

    pub fn selected(&self) -> &'static AnalysisStage {
        self.selected
    }

    /// What the analysis client receives for `stage`.
    fn content_for(&self, stage: &AnalysisStage, mode: ContextMode) -> String {
        match mode {
            ContextMode::SourceOnly => self.source_text.clone(),
            ContextMode::Cumulative => {
                let prior: Vec<(&str, &str)> = STAGES[..stage.ordinal]
                    .iter()
                    .filter_map(|s| self.content(s.id).map(|c| (s.label, c)))
                    .collect();
                prompts::with_prior_analyses(&self.source_text, &prior)
            }
        }
    }
}

/// Serialisable view of one stage for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSnapshot {
    pub id: &'static str,
    pub label: &'static str,
    pub ordinal: usize,
    /// `idle`, `running`, `completed`, or `failed`.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
}

/// Serialisable copy of a session, in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub source_name: String,
    pub selected: &'static str,
    pub sequence_running: bool,
    pub completed: usize,
    pub stages: Vec<StageSnapshot>,
}

impl SessionSnapshot {
    pub fn stage(&self, id: &str) -> Option<&StageSnapshot> {
        self.stages.iter().find(|s| s.id == id)
    }
}

/// Result of a single stage request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageRun {
    /// The stage was already completed; nothing was sent.
    AlreadyCompleted,
    Completed,
    Failed(StageError),
}

/// How a `run_sequence` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// Every stage is completed.
    Completed { completed: usize },
    /// Stopped at `stage`; later stages were not attempted.
    Halted { stage: String, error: StageError },
    /// Another sequence was already active; nothing was done.
    AlreadyRunning,
}

/// Drives the stage sequence for one session.
pub struct StageOrchestrator {
    client: AnalysisClient,
    session: Mutex<AnalysisSession>,
    sequence_running: AtomicBool,
    /// Signalled whenever a running stage settles.
    settled: Notify,
    callback: ProgressCallback,
    context_mode: ContextMode,
    stage_pause: Duration,
    progress_tick: Duration,
    report_title: String,
}

impl StageOrchestrator {
    pub fn new(client: AnalysisClient, source: ResolvedSource, config: &AnalysisConfig) -> Self {
        Self {
            client,
            session: Mutex::new(AnalysisSession::new(source)),
            sequence_running: AtomicBool::new(false),
            settled: Notify::new(),
            callback: config
                .progress_callback
                .clone()
                .unwrap_or_else(|| Arc::new(NoopProgressCallback)),
            context_mode: config.context_mode,
            stage_pause: Duration::from_millis(config.stage_pause_ms),
            // A zero period would panic in `interval_at`.
            progress_tick: Duration::from_millis(config.progress_tick_ms.max(1)),
            report_title: config.report_title.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AnalysisSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one stage unless it is already completed.
    pub async fn run_stage(&self, stage_id: &str) -> Result<StageRun, SidekickError> {
        let stage = stages::lookup(stage_id)?;
        self.invoke(stage, false).await
    }

    /// Re-run one stage, clearing any recorded error first.
    pub async fn retry_stage(&self, stage_id: &str) -> Result<StageRun, SidekickError> {
        let stage = stages::lookup(stage_id)?;
        info!("Retrying stage {}", stage.id);
        self.invoke(stage, true).await
    }

    /// Run every not-yet-completed stage in ordinal order, halting at the
    /// first failure.
    pub async fn run_sequence(&self) -> SequenceOutcome {
        if self
            .sequence_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("run_sequence called while a sequence is active; ignoring");
            return SequenceOutcome::AlreadyRunning;
        }
        let _flag = FlagGuard(&self.sequence_running);

        let total = STAGES.len();
        self.callback.on_sequence_start(total);
        info!("Starting analysis sequence ({} stages)", total);

        let mut halted = None;
        for stage in STAGES.iter() {
            if self.lock().is_completed(stage.id) {
                debug!("{}: already completed, skipping", stage.id);
                continue;
            }

            let run = loop {
                match self.invoke(stage, false).await {
                    Err(SidekickError::StageBusy { running, .. }) => {
                        debug!("{}: waiting for {} to settle", stage.id, running);
                        self.wait_until_idle().await;
                    }
                    other => break other,
                }
            };

            match run {
                Ok(StageRun::Completed) | Ok(StageRun::AlreadyCompleted) => {}
                Ok(StageRun::Failed(error)) => {
                    halted = Some((stage.id.to_string(), error));
                    break;
                }
                Err(e) => {
                    warn!("{}: could not start: {}", stage.id, e);
                    halted = Some((stage.id.to_string(), StageError::from_error(stage.id, &e)));
                    break;
                }
            }

            if stage.ordinal + 1 < total && !self.stage_pause.is_zero() {
                tokio::time::sleep(self.stage_pause).await;
            }
        }

        let completed = self.lock().completed_count();
        self.callback.on_sequence_complete(total, completed);

        match halted {
            Some((stage, error)) => {
                warn!("Sequence halted at {}: {}", stage, error);
                SequenceOutcome::Halted { stage, error }
            }
            None => {
                info!("Sequence complete: {}/{} stages", completed, total);
                SequenceOutcome::Completed { completed }
            }
        }
    }

    /// Change the stage shown by the host.
    pub fn select_stage(&self, stage_id: &str) -> Result<(), SidekickError> {
        let stage = stages::lookup(stage_id)?;
        self.lock().selected = stage;
        Ok(())
    }

    pub fn selected(&self) -> &'static AnalysisStage {
        self.lock().selected
    }

    pub fn is_sequence_running(&self) -> bool {
        self.sequence_running.load(Ordering::SeqCst)
    }

    /// Copy of the session for display or serialisation.
    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.lock();
        let stages = STAGES
            .iter()
            .map(|s| {
                let (status, content, error) = match session.state(s.id) {
                    None => ("idle", None, None),
                    Some(StageState::Running) => ("running", None, None),
                    Some(StageState::Completed { content }) => {
                        ("completed", Some(content.clone()), None)
                    }
                    Some(StageState::Failed { error }) => ("failed", None, Some(error.clone())),
                };
                StageSnapshot {
                    id: s.id,
                    label: s.label,
                    ordinal: s.ordinal,
                    status,
                    content,
                    error,
                }
            })
            .collect();

        SessionSnapshot {
            source_name: session.source_name.clone(),
            selected: session.selected.id,
            sequence_running: self.is_sequence_running(),
            completed: session.completed_count(),
            stages,
        }
    }

    /// Clone of the session aggregate.
    pub fn session(&self) -> AnalysisSession {
        self.lock().clone()
    }

    /// Report over whatever has completed so far.
    pub fn report(&self) -> ReportDocument {
        report::assemble(&self.lock(), &self.report_title)
    }

    /// Resolve once no stage is marked running.
    async fn wait_until_idle(&self) {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            // Register before checking so a settle in between is not missed.
            notified.as_mut().enable();
            if self.lock().running_stage().is_none() {
                return;
            }
            notified.await;
        }
    }

    async fn invoke(&self, stage: &'static AnalysisStage, force: bool) -> Result<StageRun, SidekickError> {
        let content = {
            let mut session = self.lock();
            if !force && session.is_completed(stage.id) {
                debug!("{}: already completed, not re-running", stage.id);
                return Ok(StageRun::AlreadyCompleted);
            }
            if let Some(running) = session.running_stage() {
                return Err(SidekickError::StageBusy {
                    requested: stage.id.to_string(),
                    running: running.to_string(),
                });
            }
            session.results.insert(stage.id, StageState::Running);
            session.content_for(stage, self.context_mode)
        };
        let mut slot = RunningSlot {
            orchestrator: self,
            stage_id: stage.id,
            settled: false,
        };

        self.callback.on_stage_start(stage.id, stage.ordinal, STAGES.len());
        info!("[{}/{}] {}", stage.ordinal + 1, STAGES.len(), stage.label);

        let result = self.call_with_progress(stage.id, &content).await;

        let run = {
            let mut session = self.lock();
            let (state, run) = match result {
                Ok(text) => (StageState::Completed { content: text }, StageRun::Completed),
                Err(e) => {
                    let error = StageError::from_error(stage.id, &e);
                    (StageState::Failed { error: error.clone() }, StageRun::Failed(error))
                }
            };
            session.results.insert(stage.id, state);
            slot.settled = true;
            run
        };
        self.settled.notify_waiters();

        match &run {
            StageRun::Completed => {
                let len = self.lock().content(stage.id).map(str::len).unwrap_or(0);
                debug!("{}: completed ({} chars)", stage.id, len);
                self.callback.on_stage_complete(stage.id, len);
            }
            StageRun::Failed(error) => {
                warn!("{}: failed: {}", stage.id, error);
                self.callback.on_stage_error(stage.id, &error.message);
            }
            StageRun::AlreadyCompleted => {}
        }
        Ok(run)
    }

    async fn call_with_progress(&self, stage_id: &str, content: &str) -> Result<String, SidekickError> {
        self.callback.on_stage_progress(stage_id, 0);

        let call = self.client.analyze(content, stage_id);
        tokio::pin!(call);
        let start = tokio::time::Instant::now() + self.progress_tick;
        let mut ticker = tokio::time::interval_at(start, self.progress_tick);
        let mut pct = 0u8;

        let result = loop {
            tokio::select! {
                res = &mut call => break res,
                _ = ticker.tick() => {
                    pct = next_estimate(pct);
                    self.callback.on_stage_progress(stage_id, pct);
                }
            }
        };

        self.callback.on_stage_progress(stage_id, 100);
        result
    }
}

/// Clears the single-flight flag when the sequence ends, however it ends.
struct FlagGuard<'a>(&'a AtomicBool);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Marks a stage failed if its future is dropped while the call is out.
struct RunningSlot<'a> {
    orchestrator: &'a StageOrchestrator,
    stage_id: &'static str,
    settled: bool,
}

impl Drop for RunningSlot<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        {
            let mut session = self.orchestrator.lock();
            if matches!(session.results.get(self.stage_id), Some(StageState::Running)) {
                let err = SidekickError::Internal("analysis was interrupted".into());
                session.results.insert(
                    self.stage_id,
                    StageState::Failed {
                        error: StageError::from_error(self.stage_id, &err),
                    },
                );
            }
        }
        self.orchestrator.settled.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analysis::{AnalysisBackend, AnalysisRequest};
    use async_trait::async_trait;

    struct EchoBackend;

    #[async_trait]
    impl AnalysisBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &AnalysisRequest) -> Result<String, SidekickError> {
            Ok(format!("{} on {}", request.stage_id, request.content.len()))
        }
    }

    fn orchestrator(mode: ContextMode) -> StageOrchestrator {
        let config = AnalysisConfig::builder()
            .stage_pause_ms(0)
            .context_mode(mode)
            .build()
            .unwrap();
        StageOrchestrator::new(
            AnalysisClient::new(Arc::new(EchoBackend)),
            ResolvedSource {
                name: "Text Analysis".into(),
                text: "transcript".into(),
            },
            &config,
        )
    }

    #[test]
    fn new_session_selects_first_stage() {
        let orch = orchestrator(ContextMode::SourceOnly);
        assert_eq!(orch.selected().id, "jtbd-analysis");
        let snap = orch.snapshot();
        assert_eq!(snap.stages.len(), 10);
        assert!(snap.stages.iter().all(|s| s.status == "idle"));
        assert!(!snap.sequence_running);
    }

    #[test]
    fn select_unknown_stage_is_rejected() {
        let orch = orchestrator(ContextMode::SourceOnly);
        assert!(orch.select_stage("nope").is_err());
        orch.select_stage("curse").unwrap();
        assert_eq!(orch.selected().id, "curse");
    }

    #[tokio::test]
    async fn unknown_stage_is_contract_error() {
        let orch = orchestrator(ContextMode::SourceOnly);
        let err = orch.run_stage("astrology").await.unwrap_err();
        assert!(matches!(err, SidekickError::UnknownStage { .. }));
    }

    #[test]
    fn cumulative_context_includes_completed_prior_stages() {
        let mut session = AnalysisSession::new(ResolvedSource {
            name: "x".into(),
            text: "transcript".into(),
        });
        session.results.insert(
            "jtbd-analysis",
            StageState::Completed {
                content: "goals here".into(),
            },
        );
        session.results.insert(
            "needs",
            StageState::Completed {
                content: "needs here".into(),
            },
        );
        let gains = stages::find("gain-extractor").unwrap();
        let final_report = stages::find("final-report").unwrap();

        let c = session.content_for(gains, ContextMode::Cumulative);
        assert!(c.contains("goals here"));
        assert!(!c.contains("needs here"), "later stages must not leak backwards");

        let c = session.content_for(final_report, ContextMode::Cumulative);
        assert!(c.find("goals here").unwrap() < c.find("needs here").unwrap());

        assert_eq!(session.content_for(final_report, ContextMode::SourceOnly), "transcript");
    }

    #[tokio::test]
    async fn zero_tick_config_built_by_hand_still_runs() {
        let config = AnalysisConfig {
            progress_tick_ms: 0,
            stage_pause_ms: 0,
            ..AnalysisConfig::default()
        };
        let orch = StageOrchestrator::new(
            AnalysisClient::new(Arc::new(EchoBackend)),
            ResolvedSource {
                name: "Text Analysis".into(),
                text: "transcript".into(),
            },
            &config,
        );
        assert_eq!(orch.run_stage("needs").await.unwrap(), StageRun::Completed);
    }

    #[tokio::test]
    async fn completed_stage_is_a_noop_even_while_another_runs() {
        let orch = orchestrator(ContextMode::SourceOnly);
        orch.run_stage("curse").await.unwrap();
        orch.lock().results.insert("needs", StageState::Running);
        assert_eq!(orch.run_stage("curse").await.unwrap(), StageRun::AlreadyCompleted);
        assert!(matches!(
            orch.retry_stage("curse").await,
            Err(SidekickError::StageBusy { .. })
        ));
    }

    #[tokio::test]
    async fn busy_when_another_stage_is_running() {
        let orch = orchestrator(ContextMode::SourceOnly);
        orch.lock().results.insert("needs", StageState::Running);
        let err = orch.run_stage("curse").await.unwrap_err();
        match err {
            SidekickError::StageBusy { requested, running } => {
                assert_eq!(requested, "curse");
                assert_eq!(running, "needs");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
