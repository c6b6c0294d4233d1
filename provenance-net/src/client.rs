//! Validator client: one TCP connection, many concurrent callers.
//!
//! An IO task owns the framed stream. Requests carry a correlation id;
//! the task parks each caller's oneshot until the matching response
//! frame arrives. Event frames are pushed to the subscription channel
//! instead. The task exits when the stream closes, which drops every
//! pending oneshot and surfaces `ConnectionClosed` to callers.

use crate::framing::{MessageSink, MessageStream};
use crate::NetError;
use prost::Message;
use provenance_model::NAMESPACE;
use provenance_proto::txn::Batch;
use provenance_proto::validator::{
    events_subscribe_response, validator_message::MessageType, BatchStatusRequest,
    BatchStatusResponse, BatchSubmitRequest, BatchSubmitResponse, EventList,
    EventSubscription, EventsSubscribeRequest, EventsSubscribeResponse, ValidatorMessage,
};
use std::collections::HashMap;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

const EVENT_BUFFER: usize = 64;
const REQUEST_BUFFER: usize = 32;

/// The address-filter regex sent with the state-delta subscription.
pub fn address_filter() -> String {
    format!("^{}.*", NAMESPACE)
}

struct Outgoing {
    message: ValidatorMessage,
    resp: oneshot::Sender<ValidatorMessage>,
}

/// Client for the platform's framed TCP endpoint. Cheap to share:
/// methods take `&self` and may be called concurrently.
pub struct ValidatorClient {
    outgoing: mpsc::Sender<Outgoing>,
    events: Mutex<Option<mpsc::Receiver<EventList>>>,
}

impl ValidatorClient {
    /// Connect to a `tcp://host:port` endpoint and spawn the IO task.
    pub async fn connect(url: &str) -> Result<ValidatorClient, NetError> {
        let address = url
            .strip_prefix("tcp://")
            .unwrap_or(url);
        if address.is_empty() {
            return Err(NetError::InvalidUrl(url.to_string()));
        }

        let stream = TcpStream::connect(address).await?;
        let (read_half, write_half) = tokio::io::split(stream);

        let (outgoing_tx, outgoing_rx) = mpsc::channel(REQUEST_BUFFER);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        let io = IoTask {
            sink: MessageSink::new(write_half),
            stream: MessageStream::new(read_half),
            outgoing_rx,
            pending: HashMap::new(),
            events_tx,
        };
        tokio::spawn(io.run());

        Ok(ValidatorClient {
            outgoing: outgoing_tx,
            events: Mutex::new(Some(events_rx)),
        })
    }

    async fn request(
        &self,
        message_type: MessageType,
        content: Vec<u8>,
    ) -> Result<ValidatorMessage, NetError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let message = ValidatorMessage {
            message_type: message_type as i32,
            correlation_id: Uuid::new_v4().to_string(),
            content,
        };
        self.outgoing
            .send(Outgoing {
                message,
                resp: resp_tx,
            })
            .await
            .map_err(|_| NetError::ConnectionClosed)?;
        resp_rx.await.map_err(|_| NetError::ConnectionClosed)
    }

    /// Submit batches to the platform.
    pub async fn submit_batches(
        &self,
        batches: Vec<Batch>,
    ) -> Result<BatchSubmitResponse, NetError> {
        let content = BatchSubmitRequest { batches }.encode_to_vec();
        let reply = self
            .request(MessageType::BatchSubmitRequest, content)
            .await?;
        Ok(BatchSubmitResponse::decode(reply.content.as_slice())?)
    }

    /// Query commit status for a set of batch ids.
    pub async fn batch_statuses(
        &self,
        batch_ids: Vec<String>,
        wait: bool,
        timeout_ms: u32,
    ) -> Result<BatchStatusResponse, NetError> {
        let content = BatchStatusRequest {
            batch_ids,
            wait,
            timeout_ms,
        }
        .encode_to_vec();
        let reply = self
            .request(MessageType::BatchStatusRequest, content)
            .await?;
        Ok(BatchStatusResponse::decode(reply.content.as_slice())?)
    }

    /// Subscribe to block-commit and namespaced state-delta events,
    /// anchored at the given known block ids (empty = genesis).
    ///
    /// Returns the event receiver; a connection carries at most one
    /// subscription.
    pub async fn subscribe(
        &self,
        last_known_block_ids: Vec<String>,
    ) -> Result<mpsc::Receiver<EventList>, NetError> {
        let request = EventsSubscribeRequest {
            last_known_block_ids,
            subscriptions: vec![
                EventSubscription {
                    event_type: "block-commit".to_string(),
                    address_filter: String::new(),
                },
                EventSubscription {
                    event_type: "state-delta".to_string(),
                    address_filter: address_filter(),
                },
            ],
        };
        let reply = self
            .request(MessageType::EventsSubscribeRequest, request.encode_to_vec())
            .await?;
        let response = EventsSubscribeResponse::decode(reply.content.as_slice())?;
        if response.status() != events_subscribe_response::Status::Ok {
            return Err(NetError::Rejected(format!(
                "subscription refused: {:?} {}",
                response.status(),
                response.message
            )));
        }

        self.events
            .lock()
            .await
            .take()
            .ok_or_else(|| NetError::Rejected("already subscribed".to_string()))
    }
}

struct IoTask {
    sink: MessageSink<WriteHalf<TcpStream>>,
    stream: MessageStream<ReadHalf<TcpStream>>,
    outgoing_rx: mpsc::Receiver<Outgoing>,
    pending: HashMap<String, oneshot::Sender<ValidatorMessage>>,
    events_tx: mpsc::Sender<EventList>,
}

enum IoEvent {
    Outgoing(Option<Outgoing>),
    Incoming(Result<Option<ValidatorMessage>, NetError>),
}

impl IoTask {
    async fn run(mut self) {
        loop {
            let event = tokio::select! {
                outgoing = self.outgoing_rx.recv() => IoEvent::Outgoing(outgoing),
                incoming = self.stream.recv() => IoEvent::Incoming(incoming),
            };

            match event {
                IoEvent::Outgoing(Some(Outgoing { message, resp })) => {
                    self.pending.insert(message.correlation_id.clone(), resp);
                    if let Err(err) = self.sink.send(&message).await {
                        tracing::warn!("validator send failed: {}", err);
                        break;
                    }
                }
                // Client dropped.
                IoEvent::Outgoing(None) => break,
                IoEvent::Incoming(Ok(Some(message))) => self.dispatch(message).await,
                IoEvent::Incoming(Ok(None)) => {
                    tracing::warn!("validator closed the connection");
                    break;
                }
                IoEvent::Incoming(Err(err)) => {
                    tracing::warn!("validator receive failed: {}", err);
                    break;
                }
            }
        }
        // Dropping `pending` wakes every waiting caller with
        // ConnectionClosed.
    }

    async fn dispatch(&mut self, message: ValidatorMessage) {
        if message.message_type() == MessageType::EventList {
            match EventList::decode(message.content.as_slice()) {
                Ok(events) => {
                    if self.events_tx.send(events).await.is_err() {
                        tracing::debug!("event receiver dropped, discarding event");
                    }
                }
                Err(err) => tracing::warn!("undecodable event frame: {}", err),
            }
            return;
        }

        match self.pending.remove(&message.correlation_id) {
            Some(resp) => {
                let _ = resp.send(message);
            }
            None => tracing::warn!(
                correlation_id = %message.correlation_id,
                "response with unknown correlation id"
            ),
        }
    }
}
