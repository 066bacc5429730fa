//! Pub/sub transports that feed raw frames into the sampler
//!
//! Provides the `Subscriber` seam plus ZeroMQ and NATS implementations

pub mod nats;
pub mod zmq;

use std::future::Future;
use std::time::Duration;

use crate::config::{SamplerConfig, TransportKind};
use crate::error::TransportError;

pub use nats::NatsSubscriber;
pub use zmq::ZmqSubscriber;

/// A connected client already subscribed to its topic filter.
///
/// `receive` must be cancel-safe: the ingestion loop races it against the
/// stop signal and drops the future when stop wins.
pub trait Subscriber: Send + 'static {
    /// Wait for the next raw frame (`"<topic> <payload>"`).
    fn receive(&mut self) -> impl Future<Output = Result<String, TransportError>> + Send;
}

/// Subscriber picked at runtime from [`SamplerConfig::transport`].
pub enum AnySubscriber {
    Zmq(ZmqSubscriber),
    Nats(NatsSubscriber),
}

impl Subscriber for AnySubscriber {
    async fn receive(&mut self) -> Result<String, TransportError> {
        match self {
            AnySubscriber::Zmq(s) => s.receive().await,
            AnySubscriber::Nats(s) => s.receive().await,
        }
    }
}

/// Connect and subscribe according to the configuration.
pub async fn open(config: &SamplerConfig) -> Result<AnySubscriber, TransportError> {
    let address = config.address();

    match config.transport {
        TransportKind::Zmq => {
            let subscriber = ZmqSubscriber::connect_and_subscribe(&address, &config.topics)?;
            Ok(AnySubscriber::Zmq(subscriber))
        }
        TransportKind::Nats => {
            let subscriber = NatsSubscriber::connect_and_subscribe(&address, &config.topics).await?;
            Ok(AnySubscriber::Nats(subscriber))
        }
    }
}

/// Bounded exponential delay between failed receives.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(10), Duration::from_secs(1))
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
        }
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        let shift = self.failures.min(16);
        self.failures = self.failures.saturating_add(1);
        self.base.saturating_mul(1 << shift).min(self.max)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_millis(50));

        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(20));
        assert_eq!(backoff.next_delay(), Duration::from_millis(40));
        assert_eq!(backoff.next_delay(), Duration::from_millis(50));
        assert_eq!(backoff.next_delay(), Duration::from_millis(50));
        assert_eq!(backoff.failures(), 5);
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();

        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
    }

    #[test]
    fn test_backoff_survives_many_failures() {
        let mut backoff = Backoff::default();
        for _ in 0..100 {
            assert!(backoff.next_delay() <= Duration::from_secs(1));
        }
    }
}
