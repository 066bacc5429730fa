//! Ingestion stage: transport to handoff channel.

use tokio::sync::mpsc;

use super::signal::StopListener;
use super::{Clock, TimestampedFrame};
use crate::error::TransportError;
use crate::transport::{Backoff, Subscriber};

/// Counters reported when ingestion shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub frames_received: u64,
    pub frames_forwarded: u64,
    pub transport_errors: u64,
}

pub struct Ingestor<S, C> {
    subscriber: S,
    clock: C,
    tx: mpsc::Sender<TimestampedFrame>,
    stop: StopListener,
    backoff: Backoff,
}

impl<S: Subscriber, C: Clock> Ingestor<S, C> {
    pub fn new(
        subscriber: S,
        clock: C,
        tx: mpsc::Sender<TimestampedFrame>,
        stop: StopListener,
    ) -> Self {
        Self {
            subscriber,
            clock,
            tx,
            stop,
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run until stop is requested, the subscription ends, or the consumer
    /// hangs up.
    ///
    /// The sender is dropped on return, which closes the handoff channel.
    pub async fn run(mut self) -> IngestStats {
        let mut stats = IngestStats::default();
        tracing::info!("Starting to read messages");

        loop {
            if self.stop.is_requested() {
                break;
            }

            let received = tokio::select! {
                biased;
                _ = self.stop.requested() => break,
                received = self.subscriber.receive() => received,
            };

            let frame = match received {
                Ok(frame) => frame,
                Err(TransportError::Closed) => {
                    tracing::warn!("Subscription ended, no more messages will arrive");
                    break;
                }
                Err(e) => {
                    stats.transport_errors += 1;
                    let delay = self.backoff.next_delay();
                    tracing::warn!(
                        "{} (failure {}, retrying in {:?})",
                        e,
                        self.backoff.failures(),
                        delay
                    );
                    tokio::select! {
                        biased;
                        _ = self.stop.requested() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            };

            self.backoff.reset();
            stats.frames_received += 1;

            let stamped = TimestampedFrame {
                frame,
                received_at: self.clock.now(),
            };

            tokio::select! {
                biased;
                _ = self.stop.requested() => break,
                sent = self.tx.send(stamped) => {
                    if sent.is_err() {
                        tracing::debug!("Handoff channel closed by consumer");
                        break;
                    }
                    stats.frames_forwarded += 1;
                }
            }
        }

        tracing::info!(
            "Finished reading messages ({} received, {} forwarded, {} transport errors)",
            stats.frames_received,
            stats.frames_forwarded,
            stats.transport_errors
        );
        stats
    }
}
