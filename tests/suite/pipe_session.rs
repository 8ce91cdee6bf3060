//! A full session over a real socket: announce, dial, talk, shut down.

use std::time::Duration;

use buildlink_client::{ChannelSink, ClientOptions};
use buildlink_transport::{CONNECT_ATTEMPTS_EVENT, Connector, PipeEndpoint, RetryPolicy};
use buildlink_types::{ClientMessage, TelemetryEvent, method};
use serde_json::{Value, json};
use tempfile::tempdir;
use tokio::net::UnixListener;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::common::{FakeServer, Harness, task_id};

#[tokio::test]
async fn late_server_is_reached_and_shut_down_cleanly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bsp.sock");
    let endpoint = PipeEndpoint::Socket(path.clone());

    let server = tokio::spawn(async move {
        sleep(Duration::from_millis(120)).await;
        let listener = UnixListener::bind(&path).unwrap();
        let (stream, _) = listener.accept().await.unwrap();
        let mut server = FakeServer::new(stream);

        server
            .notify(
                method::TASK_START,
                json!({ "taskId": task_id("sync", &[]), "message": "Configuring" }),
            )
            .await;

        let id = server.expect_request(method::SHUTDOWN).await;
        server.respond(id, Value::Null).await;
        server.expect_notification(method::EXIT).await;
        assert!(server.recv().await.is_none(), "client should close the pipe");
    });

    let (announce, mut announced) = ChannelSink::new();
    let connector = Connector::new(RetryPolicy {
        max_attempts: 50,
        interval: Duration::from_millis(20),
    });
    let connection = connector
        .connect_to(endpoint.clone(), &announce, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(connection.endpoint(), &endpoint);

    assert_eq!(
        announced.recv().await.unwrap(),
        ClientMessage::WillConnect {
            pipe_name: endpoint.name()
        }
    );
    let ClientMessage::Telemetry(TelemetryEvent { name, properties }) =
        announced.recv().await.unwrap()
    else {
        panic!("expected connect telemetry");
    };
    assert_eq!(name, CONNECT_ATTEMPTS_EVENT);
    assert!(properties.as_u64().unwrap() > 1, "server was not up at first dial");

    let (reader, writer) = connection.into_split();
    let mut harness = Harness::start(reader, writer, ClientOptions::default());
    assert_eq!(
        harness.next_messages(2).await,
        [
            ClientMessage::ProgressCreate {
                token: "sync".into()
            },
            ClientMessage::ProgressBegin {
                token: "sync".into(),
                title: "Build Server Task".into(),
                message: Some("Configuring".into()),
            },
        ]
    );

    harness.link.shutdown().await;
    server.await.unwrap();
}
