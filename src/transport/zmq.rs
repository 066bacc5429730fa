//! ZeroMQ SUB socket subscriber
//!
//! Wraps a tokio-registered `tmq` subscription and flattens each multipart
//! message into a single space-joined frame

use futures::StreamExt;
use tmq::{subscribe, Context, Multipart};

use super::Subscriber;
use crate::error::TransportError;

pub struct ZmqSubscriber {
    socket: subscribe::Subscribe,
    _context: Context,
}

impl ZmqSubscriber {
    /// Connect a SUB socket and register every topic prefix.
    ///
    /// An empty topic list subscribes to everything.
    pub fn connect_and_subscribe(
        address: &str,
        topics: &[String],
    ) -> Result<Self, TransportError> {
        let (first, rest) = match topics.split_first() {
            Some((first, rest)) => (first.as_str(), rest),
            None => ("", &[][..]),
        };

        let context = Context::new();
        let mut socket = subscribe(&context)
            .connect(address)
            .map_err(|e| TransportError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?
            .subscribe(first.as_bytes())
            .map_err(|e| subscribe_error(first, e))?;

        for topic in rest {
            socket
                .subscribe(topic.as_bytes())
                .map_err(|e| subscribe_error(topic, e))?;
        }

        tracing::info!("Connected to ZeroMQ publisher at {} (topics: {:?})", address, topics);

        Ok(Self {
            socket,
            _context: context,
        })
    }
}

fn subscribe_error(topic: &str, e: impl std::fmt::Display) -> TransportError {
    TransportError::Subscribe {
        topic: topic.to_string(),
        reason: e.to_string(),
    }
}

/// Join the parts of a multipart message with single spaces.
///
/// Publishers that send topic and payload as one part pass through untouched.
fn join_parts(multipart: &Multipart) -> String {
    multipart
        .iter()
        .map(|part| String::from_utf8_lossy(&**part))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Subscriber for ZmqSubscriber {
    async fn receive(&mut self) -> Result<String, TransportError> {
        match self.socket.next().await {
            Some(Ok(multipart)) => Ok(join_parts(&multipart)),
            Some(Err(e)) => Err(TransportError::Receive(e.to_string())),
            None => Err(TransportError::Closed),
        }
    }
}
