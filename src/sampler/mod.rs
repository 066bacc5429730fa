//! The concurrent ingestion and aggregation pipeline.
//!
//! Ingestion pulls frames off a [`Subscriber`](crate::transport::Subscriber),
//! stamps them and hands them over a bounded channel to aggregation, which
//! deduplicates by message id into a [`SampleStore`] until the target count
//! is reached. The [`Sampler`] coordinates both and writes the report once
//! the store is quiescent.

pub mod aggregate;
pub mod coordinator;
pub mod ingest;
pub mod signal;
pub mod store;

use chrono::{DateTime, Utc};

pub use aggregate::{AggregationSummary, Aggregator, StreamRecorder};
pub use coordinator::{Sampler, SamplingReport, StreamingReport};
pub use ingest::{IngestStats, Ingestor};
pub use signal::{Completion, CompletionListener, CompletionSignal, StopListener, StopSignal};
pub use store::{Insertion, Sample, SampleStore};

/// Capacity of the ingestion-to-aggregation handoff channel.
pub const HANDOFF_CAPACITY: usize = 1;

/// A raw frame stamped with the instant it came off the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedFrame {
    pub frame: String,
    pub received_at: DateTime<Utc>,
}

/// Source of receive timestamps.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
