//! Client tests against an in-process framed TCP endpoint.

use prost::Message;
use provenance_net::{MessageSink, MessageStream, ValidatorClient};
use provenance_proto::validator::validator_message::MessageType;
use provenance_proto::validator::{
    batch_status, batch_submit_response, BatchStatus, BatchStatusRequest, BatchStatusResponse,
    BatchSubmitResponse, EventList, EventsSubscribeResponse, ValidatorMessage,
};
use tokio::net::TcpListener;

/// Accept one connection and answer requests the way the platform
/// endpoint would; events are pushed after a subscription is accepted.
async fn spawn_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = tokio::io::split(stream);
        let mut sink = MessageSink::new(write_half);
        let mut stream = MessageStream::new(read_half);

        while let Ok(Some(message)) = stream.recv().await {
            match message.message_type() {
                MessageType::BatchSubmitRequest => {
                    let response = BatchSubmitResponse {
                        status: batch_submit_response::Status::Ok as i32,
                    };
                    sink.send(&ValidatorMessage {
                        message_type: MessageType::BatchSubmitResponse as i32,
                        correlation_id: message.correlation_id,
                        content: response.encode_to_vec(),
                    })
                    .await
                    .unwrap();
                }
                MessageType::BatchStatusRequest => {
                    let request =
                        BatchStatusRequest::decode(message.content.as_slice()).unwrap();
                    let statuses = request
                        .batch_ids
                        .into_iter()
                        .map(|batch_id| BatchStatus {
                            batch_id,
                            status: batch_status::Status::Committed as i32,
                            message: String::new(),
                        })
                        .collect();
                    sink.send(&ValidatorMessage {
                        message_type: MessageType::BatchStatusResponse as i32,
                        correlation_id: message.correlation_id,
                        content: BatchStatusResponse { statuses }.encode_to_vec(),
                    })
                    .await
                    .unwrap();
                }
                MessageType::EventsSubscribeRequest => {
                    let response = EventsSubscribeResponse {
                        status:
                            provenance_proto::validator::events_subscribe_response::Status::Ok
                                as i32,
                        message: String::new(),
                    };
                    sink.send(&ValidatorMessage {
                        message_type: MessageType::EventsSubscribeResponse as i32,
                        correlation_id: message.correlation_id,
                        content: response.encode_to_vec(),
                    })
                    .await
                    .unwrap();

                    // One committed block right after the handshake.
                    let events = EventList {
                        block_num: 1,
                        block_id: "block-1".to_string(),
                        state_root_hash: "beef".to_string(),
                        changes: vec![],
                    };
                    sink.send(&ValidatorMessage {
                        message_type: MessageType::EventList as i32,
                        correlation_id: String::new(),
                        content: events.encode_to_vec(),
                    })
                    .await
                    .unwrap();
                }
                _ => {}
            }
        }
    });

    format!("tcp://{}", address)
}

#[tokio::test]
async fn submit_and_status_round_trip() {
    let url = spawn_endpoint().await;
    let client = ValidatorClient::connect(&url).await.unwrap();

    let response = client.submit_batches(vec![]).await.unwrap();
    assert_eq!(response.status(), batch_submit_response::Status::Ok);

    let statuses = client
        .batch_statuses(vec!["abc".to_string()], true, 1000)
        .await
        .unwrap();
    assert_eq!(statuses.statuses.len(), 1);
    assert_eq!(statuses.statuses[0].status(), batch_status::Status::Committed);
}

#[tokio::test]
async fn subscription_delivers_events() {
    let url = spawn_endpoint().await;
    let client = ValidatorClient::connect(&url).await.unwrap();

    let mut events = client.subscribe(vec![]).await.unwrap();
    let first = events.recv().await.unwrap();
    assert_eq!(first.block_num, 1);
    assert_eq!(first.block_id, "block-1");

    // A second subscription on the same connection is refused.
    assert!(client.subscribe(vec![]).await.is_err());
}
