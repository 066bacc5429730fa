//! Aggregation stage: handoff channel to sample store.

use tokio::sync::mpsc;

use super::signal::{Completion, CompletionSignal};
use super::store::{delta_seconds, Insertion, Sample, SampleStore};
use super::TimestampedFrame;
use crate::error::{FrameError, SamplerError};
use crate::message::{decode_frame, DecodedFrame};
use crate::report::ReportFile;

/// What the consumer saw before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationSummary {
    pub frames_processed: u64,
    pub frames_rejected: u64,
    pub duplicates: u64,
}

/// Decode a frame, logging and counting it if it has to be dropped.
fn decode_or_reject(
    frame: &TimestampedFrame,
    summary: &mut AggregationSummary,
) -> Option<DecodedFrame> {
    summary.frames_processed += 1;
    match decode_frame(&frame.frame) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            summary.frames_rejected += 1;
            match e {
                FrameError::MissingSeparator(_) => tracing::warn!("Discarding frame: {}", e),
                _ => tracing::warn!("Discarding frame: {} (raw: {})", e, frame.frame),
            }
            None
        }
    }
}

/// Collects distinct samples until the target count is reached.
pub struct Aggregator {
    rx: mpsc::Receiver<TimestampedFrame>,
    store: SampleStore,
    target: usize,
    completion: CompletionSignal,
}

impl Aggregator {
    pub fn new(
        rx: mpsc::Receiver<TimestampedFrame>,
        store: SampleStore,
        target: usize,
        completion: CompletionSignal,
    ) -> Self {
        Self {
            rx,
            store,
            target,
            completion,
        }
    }

    /// Consume until the store holds `target` distinct samples or the
    /// channel closes, then fire the completion signal.
    ///
    /// The receiver is dropped on return, so a producer blocked on send is
    /// released.
    pub async fn run(mut self) -> AggregationSummary {
        let mut summary = AggregationSummary::default();

        let reason = loop {
            if self.store.len() >= self.target {
                break Completion::TargetReached;
            }

            let Some(frame) = self.rx.recv().await else {
                tracing::warn!(
                    "Message stream closed with {} of {} samples",
                    self.store.len(),
                    self.target
                );
                break Completion::StreamClosed;
            };

            let Some(decoded) = decode_or_reject(&frame, &mut summary) else {
                continue;
            };

            let sample = Sample {
                id: decoded.record.id,
                start_time: decoded.published_at,
                receive_time: frame.received_at,
            };
            tracing::debug!(
                "Message {} published at {} received at {}",
                sample.id,
                sample.start_time,
                sample.receive_time
            );

            let latency = sample.latency_seconds();
            let id = sample.id.clone();
            match self.store.insert_if_absent(sample) {
                Insertion::Inserted { count } => {
                    tracing::debug!("Sample {}/{}: {} took {}s", count, self.target, id, latency);
                }
                Insertion::Duplicate => {
                    summary.duplicates += 1;
                    tracing::debug!("Duplicate message {} ignored (would have been {}s)", id, latency);
                }
            }
        };

        self.rx.close();
        self.completion.fire(reason);
        tracing::info!(
            "Aggregation finished ({:?}): {} samples from {} frames",
            reason,
            self.store.len(),
            summary.frames_processed
        );
        summary
    }
}

/// Writes a report row for every decoded frame as it arrives.
///
/// No deduplication and no target; runs until the channel closes.
pub struct StreamRecorder {
    rx: mpsc::Receiver<TimestampedFrame>,
    report: ReportFile,
}

impl StreamRecorder {
    pub fn new(rx: mpsc::Receiver<TimestampedFrame>, report: ReportFile) -> Self {
        Self { rx, report }
    }

    /// Hands the report back unfinished so the caller decides when to
    /// close it. Any write failure ends the recording.
    pub async fn run(mut self) -> Result<(ReportFile, AggregationSummary), SamplerError> {
        let mut summary = AggregationSummary::default();

        while let Some(frame) = self.rx.recv().await {
            let Some(decoded) = decode_or_reject(&frame, &mut summary) else {
                continue;
            };

            let latency = delta_seconds(frame.received_at - decoded.published_at);
            let index = self.report.append(latency)?;
            self.report.flush()?;
            tracing::info!("Row {}: message {} took {}s", index, decoded.record.id, latency);
        }

        Ok((self.report, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};
    use serde_json::json;

    const BASE_NANOS: i64 = 1_700_000_000_000_000_000;

    fn frame(id: &str, published_nanos: i64, latency_millis: i64) -> TimestampedFrame {
        let data = json!({ "publishedAt": published_nanos }).to_string();
        let record = json!({
            "id": id,
            "networkId": 1,
            "nonce": 0,
            "parentMessageIds": [],
            "payload": { "data": data, "index": "" }
        });
        TimestampedFrame {
            frame: format!("LB_STATUS {}", record),
            received_at: DateTime::from_timestamp_nanos(published_nanos)
                + TimeDelta::milliseconds(latency_millis),
        }
    }

    fn raw(text: &str) -> TimestampedFrame {
        TimestampedFrame {
            frame: text.to_string(),
            received_at: Utc::now(),
        }
    }

    async fn aggregate(
        frames: Vec<TimestampedFrame>,
        target: usize,
    ) -> (SampleStore, AggregationSummary, Option<Completion>) {
        let (tx, rx) = mpsc::channel(frames.len().max(1));
        for f in frames {
            tx.send(f).await.unwrap();
        }
        drop(tx);

        let store = SampleStore::new();
        let (signal, mut listener) = CompletionSignal::channel();
        let summary = Aggregator::new(rx, store.clone(), target, signal).run().await;
        (store, summary, listener.wait().await)
    }

    #[tokio::test]
    async fn test_stops_at_target() {
        let frames = (0..5).map(|i| frame(&format!("m{}", i), BASE_NANOS, 100)).collect();

        let (store, summary, reason) = aggregate(frames, 3).await;

        assert_eq!(store.len(), 3);
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(reason, Some(Completion::TargetReached));
    }

    #[tokio::test]
    async fn test_duplicates_are_not_counted() {
        let frames = vec![
            frame("a", BASE_NANOS, 100),
            frame("a", BASE_NANOS, 900),
            frame("b", BASE_NANOS, 200),
        ];

        let (store, summary, reason) = aggregate(frames, 2).await;

        assert_eq!(store.len(), 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(store.get("a").unwrap().latency_seconds(), 0.1);
        assert_eq!(reason, Some(Completion::TargetReached));
    }

    #[tokio::test]
    async fn test_rejected_frames_never_reach_store() {
        let data_without_timestamp = json!({"id": "x", "payload": {"data": "{}", "index": ""}});
        let frames = vec![
            raw("onlytopic-no-space"),
            raw("T {broken"),
            raw(&format!("T {}", data_without_timestamp)),
            frame("ok", BASE_NANOS, 100),
        ];

        let (store, summary, _) = aggregate(frames, 10).await;

        assert_eq!(store.len(), 1);
        assert!(store.contains("ok"));
        assert!(!store.contains("x"));
        assert_eq!(summary.frames_rejected, 3);
    }

    #[tokio::test]
    async fn test_closed_stream_before_target() {
        let frames = vec![frame("a", BASE_NANOS, 100)];

        let (store, _, reason) = aggregate(frames, 5).await;

        assert_eq!(store.len(), 1);
        assert_eq!(reason, Some(Completion::StreamClosed));
    }

    #[tokio::test]
    async fn test_zero_target_completes_without_reading() {
        let (tx, rx) = mpsc::channel(1);
        let store = SampleStore::new();
        let (signal, mut listener) = CompletionSignal::channel();

        let summary = Aggregator::new(rx, store, 0, signal).run().await;

        assert_eq!(summary.frames_processed, 0);
        assert_eq!(listener.wait().await, Some(Completion::TargetReached));
        assert!(tx.send(raw("late")).await.is_err());
    }

    #[tokio::test]
    async fn test_stream_recorder_writes_every_frame() {
        let tmp = tempfile::TempDir::new().unwrap();
        let report = crate::report::ReportWriter::new(tmp.path()).create().unwrap();
        let (tx, rx) = mpsc::channel(8);
        tx.send(frame("a", BASE_NANOS, 250)).await.unwrap();
        tx.send(raw("garbage")).await.unwrap();
        tx.send(frame("a", BASE_NANOS, 500)).await.unwrap();
        drop(tx);

        let (report, summary) = StreamRecorder::new(rx, report).run().await.unwrap();
        let (path, rows) = report.finish().unwrap();

        assert_eq!(rows, 2);
        assert_eq!(summary.frames_rejected, 1);
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "Índice,Tempo de consulta (s)\n1,0.25\n2,0.5\n"
        );
    }
}
