//! Coordinator: wires ingestion, aggregation and the report writer.
//!
//! The report is only written after the aggregation task has been joined,
//! so it always reads a store that nothing else is writing to.

use std::future::Future;
use std::path::PathBuf;

use tokio::sync::mpsc;
use uuid::Uuid;

use super::aggregate::{AggregationSummary, Aggregator, StreamRecorder};
use super::ingest::{IngestStats, Ingestor};
use super::signal::{Completion, CompletionSignal, StopSignal};
use super::store::SampleStore;
use super::{Clock, SystemClock, HANDOFF_CAPACITY};
use crate::config::SamplerConfig;
use crate::error::SamplerError;
use crate::report::ReportWriter;
use crate::transport::{Backoff, Subscriber};

/// Outcome of a [`Sampler::run`].
#[derive(Debug, Clone)]
pub struct SamplingReport {
    pub run_id: Uuid,
    pub path: PathBuf,
    pub completion: Completion,
    /// Distinct samples written to the report.
    pub samples: usize,
    pub ingest: IngestStats,
    pub aggregation: AggregationSummary,
}

/// Outcome of a [`Sampler::stream`].
#[derive(Debug, Clone)]
pub struct StreamingReport {
    pub run_id: Uuid,
    pub path: PathBuf,
    pub rows: usize,
    pub ingest: IngestStats,
    pub aggregation: AggregationSummary,
}

pub struct Sampler<C = SystemClock> {
    target: usize,
    writer: ReportWriter,
    clock: C,
    backoff: Backoff,
}

impl Sampler<SystemClock> {
    pub fn new(target: usize, writer: ReportWriter) -> Self {
        Self {
            target,
            writer,
            clock: SystemClock,
            backoff: Backoff::default(),
        }
    }

    pub fn from_config(config: &SamplerConfig) -> Self {
        Self::new(config.target, ReportWriter::new(config.output_dir.clone()))
    }
}

impl<C: Clock> Sampler<C> {
    /// Stamp frames with a different clock.
    pub fn with_clock<D: Clock>(self, clock: D) -> Sampler<D> {
        Sampler {
            target: self.target,
            writer: self.writer,
            clock,
            backoff: self.backoff,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Collect `target` distinct samples from `subscriber` and write them
    /// to a new report.
    ///
    /// If the subscription ends first, whatever was collected is written.
    pub async fn run<S: Subscriber>(self, subscriber: S) -> Result<SamplingReport, SamplerError> {
        let run_id = Uuid::new_v4();
        tracing::info!("Sampling run {} started (target: {} samples)", run_id, self.target);

        let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
        let (stop, stop_listener) = StopSignal::channel();
        let (completion, mut completion_listener) = CompletionSignal::channel();
        let store = SampleStore::new();

        let ingest = tokio::spawn(
            Ingestor::new(subscriber, self.clock, tx, stop_listener)
                .with_backoff(self.backoff)
                .run(),
        );
        let aggregate = tokio::spawn(
            Aggregator::new(rx, store.clone(), self.target, completion).run(),
        );

        let completion = completion_listener.wait().await;
        stop.request();

        let ingest_stats = ingest.await?;
        let aggregation = aggregate.await?;
        let completion = completion.ok_or_else(|| {
            SamplerError::Task("aggregation stopped without signalling completion".to_string())
        })?;

        let path = self.writer.write(&store)?;
        tracing::info!(
            "Sampling run {} finished ({:?}): {} samples written to {}",
            run_id,
            completion,
            store.len(),
            path.display()
        );

        Ok(SamplingReport {
            run_id,
            path,
            completion,
            samples: store.len(),
            ingest: ingest_stats,
            aggregation,
        })
    }

    /// Append a report row for every decoded frame until `shutdown`
    /// resolves or the subscription ends.
    pub async fn stream<S, F>(self, subscriber: S, shutdown: F) -> Result<StreamingReport, SamplerError>
    where
        S: Subscriber,
        F: Future<Output = ()>,
    {
        let run_id = Uuid::new_v4();
        let report = self.writer.create()?;
        tracing::info!("Streaming run {} writing to {}", run_id, report.path().display());

        let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
        let (stop, stop_listener) = StopSignal::channel();

        let ingest = tokio::spawn(
            Ingestor::new(subscriber, self.clock, tx, stop_listener)
                .with_backoff(self.backoff)
                .run(),
        );
        let mut recorder = tokio::spawn(StreamRecorder::new(rx, report).run());

        let finished_early = tokio::select! {
            _ = shutdown => None,
            result = &mut recorder => Some(result),
        };
        stop.request();

        let ingest_stats = ingest.await?;
        let recorded = match finished_early {
            Some(result) => result,
            // Ingestion has dropped its sender, so the recorder drains and exits.
            None => recorder.await,
        };
        let (report, aggregation) = recorded??;
        let (path, rows) = report.finish()?;
        tracing::info!("Streaming run {} finished: {} rows in {}", run_id, rows, path.display());

        Ok(StreamingReport {
            run_id,
            path,
            rows,
            ingest: ingest_stats,
            aggregation,
        })
    }
}
