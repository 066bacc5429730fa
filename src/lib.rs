//! # tangle-latency: pub/sub delivery latency sampler
//!
//! Subscribes to topics on a message bus, stamps every frame as it arrives,
//! recovers the publisher's timestamp from the payload and records the
//! difference in a CSV report.
//!
//! ## Features
//!
//! - **Deduplicating sampler**: collects a target number of distinct message ids
//! - **Stream mode**: writes a row for every decoded frame as it arrives
//! - **Pluggable transports**: ZeroMQ SUB sockets and NATS subscriptions
//!
//! ## Frame format
//!
//! ```text
//! LB_STATUS {"id":"...","networkId":1,"nonce":0,"parentMessageIds":[],
//!            "payload":{"data":"{\"publishedAt\":1700000000000000000}","index":"..."}}
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use tangle_latency::{transport, Sampler, SamplerConfig};
//!
//! let config = SamplerConfig::default();
//! let subscriber = transport::open(&config).await?;
//! let report = Sampler::from_config(&config).run(subscriber).await?;
//! println!("{} samples in {}", report.samples, report.path.display());
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod report;
pub mod sampler;
pub mod transport;

// Re-export key types
pub use config::{Mode, SamplerConfig, TransportKind};
pub use error::{FrameError, SamplerError, TransportError};
pub use message::{decode_frame, DecodedFrame, MessageRecord};
pub use report::{ReportFile, ReportWriter};
pub use sampler::{
    Clock, Completion, Sample, SampleStore, Sampler, SamplingReport, StreamingReport,
    SystemClock, TimestampedFrame,
};
pub use transport::{AnySubscriber, Subscriber};
