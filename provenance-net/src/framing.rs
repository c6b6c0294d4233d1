//! Message framing using tokio-util's LengthDelimitedCodec.
//!
//! Sends and receives length-prefixed `ValidatorMessage` frames over
//! any AsyncWrite/AsyncRead stream, decoupled from the transport.

use crate::NetError;
use futures_util::{SinkExt, StreamExt};
use prost::Message;
use provenance_proto::validator::ValidatorMessage;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

/// Framed writer for sending ValidatorMessage over any AsyncWrite stream
pub struct MessageSink<W: AsyncWrite + Send + Unpin> {
    inner: FramedWrite<W, LengthDelimitedCodec>,
}

impl<W: AsyncWrite + Send + Unpin> MessageSink<W> {
    pub fn new(stream: W) -> Self {
        Self {
            inner: FramedWrite::new(stream, LengthDelimitedCodec::new()),
        }
    }

    /// Send a ValidatorMessage (length-prefixed)
    pub async fn send(&mut self, message: &ValidatorMessage) -> Result<(), NetError> {
        let bytes = message.encode_to_vec();
        self.inner
            .send(bytes.into())
            .await
            .map_err(NetError::Io)
    }
}

/// Framed reader for receiving ValidatorMessage from any AsyncRead stream
pub struct MessageStream<R: AsyncRead + Send + Unpin> {
    inner: FramedRead<R, LengthDelimitedCodec>,
}

impl<R: AsyncRead + Send + Unpin> MessageStream<R> {
    pub fn new(stream: R) -> Self {
        Self {
            inner: FramedRead::new(stream, LengthDelimitedCodec::new()),
        }
    }

    /// Receive the next ValidatorMessage (or None if the stream closed)
    pub async fn recv(&mut self) -> Result<Option<ValidatorMessage>, NetError> {
        match self.inner.next().await {
            Some(Ok(bytes)) => ValidatorMessage::decode(&bytes[..])
                .map(Some)
                .map_err(NetError::from),
            Some(Err(err)) => Err(NetError::Io(err)),
            None => Ok(None),
        }
    }
}
