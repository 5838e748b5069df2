//! Stage events as a `Stream`.
//!
//! Hosts that would rather poll a channel than implement
//! [`StageProgressCallback`] can call [`event_channel`], install the returned
//! callback in the config, and read [`StageEvent`]s from the stream. The
//! stream ends once every clone of the callback has been dropped.

use crate::progress::{ProgressCallback, StageProgressCallback};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum StageEvent {
    SequenceStarted { total: usize },
    StageStarted { stage: String, ordinal: usize, total: usize },
    StageProgress { stage: String, percent: u8 },
    StageCompleted { stage: String, content_len: usize },
    StageFailed { stage: String, error: String },
    SequenceFinished { total: usize, completed: usize },
}

/// A stream of stage events.
pub type StageEventStream = UnboundedReceiverStream<StageEvent>;

struct ChannelCallback {
    tx: mpsc::UnboundedSender<StageEvent>,
}

impl ChannelCallback {
    fn emit(&self, event: StageEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl StageProgressCallback for ChannelCallback {
    fn on_sequence_start(&self, total_stages: usize) {
        self.emit(StageEvent::SequenceStarted { total: total_stages });
    }

    fn on_stage_start(&self, stage_id: &str, ordinal: usize, total: usize) {
        self.emit(StageEvent::StageStarted {
            stage: stage_id.to_string(),
            ordinal,
            total,
        });
    }

    fn on_stage_progress(&self, stage_id: &str, percent: u8) {
        self.emit(StageEvent::StageProgress {
            stage: stage_id.to_string(),
            percent,
        });
    }

    fn on_stage_complete(&self, stage_id: &str, content_len: usize) {
        self.emit(StageEvent::StageCompleted {
            stage: stage_id.to_string(),
            content_len,
        });
    }

    fn on_stage_error(&self, stage_id: &str, error: &str) {
        self.emit(StageEvent::StageFailed {
            stage: stage_id.to_string(),
            error: error.to_string(),
        });
    }

    fn on_sequence_complete(&self, total_stages: usize, completed: usize) {
        self.emit(StageEvent::SequenceFinished {
            total: total_stages,
            completed,
        });
    }
}

/// Create a callback and the stream it feeds.
pub fn event_channel() -> (ProgressCallback, StageEventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: ProgressCallback = Arc::new(ChannelCallback { tx });
    (callback, UnboundedReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn events_arrive_in_order_and_stream_ends() {
        let (cb, stream) = event_channel();
        cb.on_sequence_start(10);
        cb.on_stage_start("jtbd-analysis", 0, 10);
        cb.on_stage_complete("jtbd-analysis", 12);
        drop(cb);

        let events: Vec<_> = stream.collect().await;
        assert_eq!(
            events,
            vec![
                StageEvent::SequenceStarted { total: 10 },
                StageEvent::StageStarted {
                    stage: "jtbd-analysis".into(),
                    ordinal: 0,
                    total: 10
                },
                StageEvent::StageCompleted {
                    stage: "jtbd-analysis".into(),
                    content_len: 12
                },
            ]
        );
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_value(StageEvent::StageFailed {
            stage: "curse".into(),
            error: "boom".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "stage-failed");
        assert_eq!(json["error"], "boom");
    }
}
