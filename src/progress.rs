//! Progress-callback trait for stage events.
//!
//! Inject an [`Arc<dyn StageProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through the sequence.
//!
//! Percentages passed to [`StageProgressCallback::on_stage_progress`] are an
//! estimate for display only. The remote call reports nothing while it runs,
//! so the orchestrator ticks `0, 10, 20, …` up to
//! [`PROGRESS_CEILING`] and sends `100` only once the call has resolved.
//! Stage state itself is binary (running, then completed or failed).
//!
//! # Example
//!
//! ```rust
//! use research_sidekick::{AnalysisConfig, StageProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl StageProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, stage_id: &str, content_len: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{stage_id} done ({content_len} chars), {done} so far");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = AnalysisConfig::builder()
//!     .relay_url("https://relay.example.com/api/analyze")
//!     .progress_callback(counter as Arc<dyn StageProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Highest estimated percentage shown while a call is outstanding.
pub const PROGRESS_CEILING: u8 = 90;

/// Step added on every progress tick.
pub const PROGRESS_STEP: u8 = 10;

/// Next estimated percentage after one tick.
pub fn next_estimate(current: u8) -> u8 {
    if current >= PROGRESS_CEILING {
        current
    } else {
        (current + PROGRESS_STEP).min(PROGRESS_CEILING)
    }
}

/// Called by the orchestrator as stages start and finish.
///
/// Implementations must be `Send + Sync`: retries may be issued from a
/// different task than the one running the sequence. All methods default
/// to no-ops so callers override only what they need.
pub trait StageProgressCallback: Send + Sync {
    /// Called once when a sequence begins.
    ///
    /// # Arguments
    /// * `total_stages`: number of stages in the catalog
    fn on_sequence_start(&self, total_stages: usize) {
        let _ = total_stages;
    }

    /// Called just before the analysis request for a stage is sent.
    ///
    /// # Arguments
    /// * `stage_id`: catalog id
    /// * `ordinal`:  zero-based position of the stage
    /// * `total`:    number of stages in the catalog
    fn on_stage_start(&self, stage_id: &str, ordinal: usize, total: usize) {
        let _ = (stage_id, ordinal, total);
    }

    /// Estimated percentage for the running stage (display only).
    fn on_stage_progress(&self, stage_id: &str, percent: u8) {
        let _ = (stage_id, percent);
    }

    /// Called when a stage stores its result.
    ///
    /// # Arguments
    /// * `content_len`: byte length of the analysis text
    fn on_stage_complete(&self, stage_id: &str, content_len: usize) {
        let _ = (stage_id, content_len);
    }

    /// Called when a stage stores an error.
    fn on_stage_error(&self, stage_id: &str, error: &str) {
        let _ = (stage_id, error);
    }

    /// Called once when a sequence finishes or halts.
    ///
    /// # Arguments
    /// * `total_stages`: number of stages in the catalog
    /// * `completed`:    stages in the completed state at that point
    fn on_sequence_complete(&self, total_stages: usize, completed: usize) {
        let _ = (total_stages, completed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl StageProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn StageProgressCallback>;
