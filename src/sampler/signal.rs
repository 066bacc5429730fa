//! One-shot stop and completion signals.
//!
//! Both are backed by `tokio::sync::watch`, so firing twice is a no-op and
//! a listener that arrives late still sees the signal.

use tokio::sync::watch;

/// Requests the ingestion stage to shut down.
#[derive(Debug)]
pub struct StopSignal {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct StopListener {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn channel() -> (StopSignal, StopListener) {
        let (tx, rx) = watch::channel(false);
        (StopSignal { tx }, StopListener { rx })
    }

    pub fn request(&self) {
        self.tx.send_replace(true);
    }
}

impl StopListener {
    /// Non-blocking check. A dropped [`StopSignal`] counts as a stop request.
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once stop has been requested.
    pub async fn requested(&mut self) {
        // Err means every StopSignal is gone, which is also a stop.
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

/// Why aggregation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The store holds the target number of distinct samples.
    TargetReached,
    /// The handoff channel closed before the target was reached.
    StreamClosed,
}

/// Fired by aggregation when it stops consuming.
///
/// Only the first reason sticks.
#[derive(Debug)]
pub struct CompletionSignal {
    tx: watch::Sender<Option<Completion>>,
}

#[derive(Debug)]
pub struct CompletionListener {
    rx: watch::Receiver<Option<Completion>>,
}

impl CompletionSignal {
    pub fn channel() -> (CompletionSignal, CompletionListener) {
        let (tx, rx) = watch::channel(None);
        (CompletionSignal { tx }, CompletionListener { rx })
    }

    /// Returns `true` if this call was the one that completed the signal.
    pub fn fire(&self, reason: Completion) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }
}

impl CompletionListener {
    /// Wait for completion.
    ///
    /// Returns `None` if the signal was dropped without firing, which means
    /// the aggregation task died.
    pub async fn wait(&mut self) -> Option<Completion> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(reason) => *reason,
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (stop, mut listener) = StopSignal::channel();
        assert!(!listener.is_requested());

        stop.request();
        stop.request();

        assert!(listener.is_requested());
        listener.requested().await;
    }

    #[tokio::test]
    async fn test_dropped_stop_signal_counts_as_stop() {
        let (stop, mut listener) = StopSignal::channel();
        drop(stop);

        assert!(listener.is_requested());
        listener.requested().await;
    }

    #[tokio::test]
    async fn test_completion_keeps_first_reason() {
        let (signal, mut listener) = CompletionSignal::channel();

        assert!(signal.fire(Completion::TargetReached));
        assert!(!signal.fire(Completion::StreamClosed));
        assert!(!signal.fire(Completion::TargetReached));

        assert_eq!(listener.wait().await, Some(Completion::TargetReached));
        assert_eq!(listener.wait().await, Some(Completion::TargetReached));
    }

    #[tokio::test]
    async fn test_dropped_completion_signal() {
        let (signal, mut listener) = CompletionSignal::channel();
        drop(signal);

        assert_eq!(listener.wait().await, None);
    }

    #[tokio::test]
    async fn test_late_listener_sees_completion() {
        let (signal, mut listener) = CompletionSignal::channel();

        let waiter = tokio::spawn(async move { listener.wait().await });
        signal.fire(Completion::StreamClosed);

        assert_eq!(waiter.await.unwrap(), Some(Completion::StreamClosed));
    }
}
