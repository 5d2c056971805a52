//! Client-facing stream halves used by a room session.
//!
//! A session reads message bodies from an [`InboundStream`] and writes
//! [`EnrichedMessage`]s to an [`OutboundSink`]. The WebSocket route adapts a
//! socket to these traits; the channel-backed adapters here serve tests and
//! in-process clients.

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::shared::EnrichedMessage;

/// Failure of one side of a client connection
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The peer went away
    #[error("stream closed")]
    Closed,

    /// The transport reported an error
    #[error("transport error: {0}")]
    Transport(String),
}

/// Client → server half of a session
#[async_trait]
pub trait InboundStream: Send {
    /// Next message body, or `None` at end of stream
    async fn recv(&mut self) -> Result<Option<String>, StreamError>;
}

/// Server → client half of a session
#[async_trait]
pub trait OutboundSink: Send {
    async fn send(&mut self, message: EnrichedMessage) -> Result<(), StreamError>;

    /// Close the outbound direction; closing twice is a no-op
    async fn close(&mut self) -> Result<(), StreamError>;
}

#[async_trait]
impl<'a, T: InboundStream + ?Sized> InboundStream for &'a mut T {
    async fn recv(&mut self) -> Result<Option<String>, StreamError> {
        (**self).recv().await
    }
}

#[async_trait]
impl<'a, T: OutboundSink + ?Sized> OutboundSink for &'a mut T {
    async fn send(&mut self, message: EnrichedMessage) -> Result<(), StreamError> {
        (**self).send(message).await
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        (**self).close().await
    }
}

/// Inbound half over any stream of message bodies
///
/// # Example
///
/// ```rust
/// use roomcast::backend::chat::{InboundStream, StreamInbound};
///
/// # tokio_test::block_on(async {
/// let mut inbound = StreamInbound::new(futures_util::stream::iter(vec!["hi".to_string()]));
/// assert_eq!(inbound.recv().await.unwrap(), Some("hi".to_string()));
/// assert_eq!(inbound.recv().await.unwrap(), None);
/// # });
/// ```
pub struct StreamInbound<S> {
    inner: S,
}

impl<S> StreamInbound<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> InboundStream for StreamInbound<S>
where
    S: Stream<Item = String> + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Option<String>, StreamError> {
        Ok(self.inner.next().await)
    }
}

/// Outbound half that forwards into an `mpsc` channel
#[derive(Debug)]
pub struct ChannelOutbound {
    sender: Option<mpsc::Sender<EnrichedMessage>>,
}

impl ChannelOutbound {
    pub fn new(sender: mpsc::Sender<EnrichedMessage>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Outbound half plus the receiver the client reads from
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<EnrichedMessage>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl OutboundSink for ChannelOutbound {
    async fn send(&mut self, message: EnrichedMessage) -> Result<(), StreamError> {
        let sender = self.sender.as_ref().ok_or(StreamError::Closed)?;
        sender.send(message).await.map_err(|_| StreamError::Closed)
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.sender = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::wrappers::ReceiverStream;

    fn enriched(body: &str) -> EnrichedMessage {
        EnrichedMessage {
            id: "m1".to_string(),
            room_id: "R1".to_string(),
            user_id: "alice".to_string(),
            body: body.to_string(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn test_stream_inbound_reads_until_end() {
        let (tx, rx) = mpsc::channel(4);
        let mut inbound = StreamInbound::new(ReceiverStream::new(rx));

        tx.send("one".to_string()).await.unwrap();
        drop(tx);

        assert_eq!(inbound.recv().await.unwrap(), Some("one".to_string()));
        assert_eq!(inbound.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_channel_outbound_close_ends_receiver() {
        let (mut outbound, mut rx) = ChannelOutbound::channel(4);
        outbound.send(enriched("hello")).await.unwrap();
        outbound.close().await.unwrap();
        outbound.close().await.unwrap();

        assert_eq!(rx.recv().await.unwrap().body, "hello");
        assert!(rx.recv().await.is_none());
        assert_eq!(outbound.send(enriched("late")).await, Err(StreamError::Closed));
    }

    #[tokio::test]
    async fn test_channel_outbound_reports_dropped_receiver() {
        let (mut outbound, rx) = ChannelOutbound::channel(1);
        drop(rx);
        assert_eq!(outbound.send(enriched("x")).await, Err(StreamError::Closed));
    }
}
