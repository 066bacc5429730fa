//! NATS subscriber
//!
//! Provides connection management and a merged subscription over every
//! configured subject

use futures::stream::{select_all, SelectAll};
use futures::StreamExt;

use super::Subscriber;
use crate::error::TransportError;

/// Wildcard used when no subject is configured.
const ALL_SUBJECTS: &str = ">";

pub struct NatsSubscriber {
    // Dropping the last client handle closes the connection.
    _client: async_nats::Client,
    subscriptions: SelectAll<async_nats::Subscriber>,
}

impl NatsSubscriber {
    /// Connect to NATS and subscribe to each subject
    pub async fn connect_and_subscribe(
        address: &str,
        subjects: &[String],
    ) -> Result<Self, TransportError> {
        let client = async_nats::connect(address)
            .await
            .map_err(|e| TransportError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        tracing::info!("Connected to NATS at {}", address);

        let subjects: Vec<String> = if subjects.is_empty() {
            vec![ALL_SUBJECTS.to_string()]
        } else {
            subjects.to_vec()
        };

        let mut subscriptions = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let subscription = client
                .subscribe(subject.clone())
                .await
                .map_err(|e| TransportError::Subscribe {
                    topic: subject.clone(),
                    reason: e.to_string(),
                })?;
            tracing::debug!("Subscribed to NATS subject {}", subject);
            subscriptions.push(subscription);
        }

        Ok(Self {
            _client: client,
            subscriptions: select_all(subscriptions),
        })
    }
}

/// Render a NATS message in the `"<topic> <payload>"` frame shape.
fn to_frame(subject: &str, payload: &[u8]) -> String {
    format!("{} {}", subject, String::from_utf8_lossy(payload))
}

impl Subscriber for NatsSubscriber {
    async fn receive(&mut self) -> Result<String, TransportError> {
        match self.subscriptions.next().await {
            Some(message) => Ok(to_frame(message.subject.as_str(), &message.payload)),
            None => Err(TransportError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_frame() {
        assert_eq!(
            to_frame("LB_STATUS", b"{\"id\":\"a\"}"),
            "LB_STATUS {\"id\":\"a\"}"
        );
    }
}
