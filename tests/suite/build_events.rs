//! Build server notifications flowing through the link into client messages.

use buildlink_client::ClientOptions;
use buildlink_link::{CloseReason, LinkEvent, METHOD_NOT_FOUND};
use buildlink_types::{ClientMessage, JavaTestStatus, StatusCode, method};
use serde_json::json;

use crate::common::{Harness, task_id, test_name};

#[tokio::test]
async fn initialize_handshake_then_initialized() {
    let (harness, mut server) = Harness::in_memory(ClientOptions::default());
    let remote = harness.link.remote();

    let client = tokio::spawn(async move { remote.initialize("file:///ws/").await });

    let id = server.expect_request(method::INITIALIZE).await;
    server
        .respond(id, json!({ "displayName": "fake", "capabilities": {} }))
        .await;
    let initialized = server.expect_notification(method::INITIALIZED).await;
    assert!(initialized.is_null() || initialized.is_object());

    let result = client.await.unwrap().unwrap();
    assert_eq!(result["displayName"], "fake");
}

#[tokio::test]
async fn logs_after_compile_failure_land_in_build_output() {
    let (mut harness, mut server) = Harness::in_memory(ClientOptions::default());

    server
        .notify(
            method::TASK_FINISH,
            json!({
                "taskId": task_id("compileJava", &["A", "B"]),
                "status": 2,
                "dataKind": "compile-report",
                "message": "1 error"
            }),
        )
        .await;
    server
        .notify(
            method::LOG_MESSAGE,
            json!({ "type": 1, "task": task_id("B", &[]), "message": "Foo.java:3: error" }),
        )
        .await;
    server
        .notify(
            method::LOG_MESSAGE,
            json!({ "type": 3, "task": task_id("C", &[]), "message": "configuring :lib" }),
        )
        .await;

    assert_eq!(
        harness.next_messages(3).await,
        [
            ClientMessage::AppendBuildLog("1 error\n------\n".into()),
            ClientMessage::AppendBuildLog("Foo.java:3: error".into()),
            ClientMessage::AppendEventLog("configuring :lib".into()),
        ]
    );
}

#[tokio::test]
async fn test_run_updates_explorer() {
    let (mut harness, mut server) = Harness::in_memory(ClientOptions::default());
    let parts = vec![
        "Gradle Test Run :test".to_string(),
        "com.acme.FooTest".to_string(),
        "works".to_string(),
    ];

    server
        .notify(
            method::TASK_START,
            json!({
                "taskId": task_id("t1", &["run"]),
                "dataKind": "test-start",
                "data": { "displayName": "works()", "testName": test_name("com.acme.FooTest", "works") }
            }),
        )
        .await;
    server
        .notify(
            method::TASK_FINISH,
            json!({
                "taskId": task_id("t1", &["run"]),
                "status": 1,
                "dataKind": "test-finish",
                "data": {
                    "displayName": "works()",
                    "status": 1,
                    "testName": test_name("com.acme.FooTest", "works")
                }
            }),
        )
        .await;
    server
        .notify(
            method::TASK_FINISH,
            json!({
                "taskId": task_id("run", &[]),
                "status": 1,
                "dataKind": "test-report",
                "message": "1 test completed"
            }),
        )
        .await;

    assert_eq!(
        harness.next_messages(3).await,
        [
            ClientMessage::TestItemStatus {
                parts: parts.clone(),
                status: JavaTestStatus::Running,
                display_name: Some("works()".into()),
                stack_trace: None,
            },
            ClientMessage::TestItemStatus {
                parts,
                status: JavaTestStatus::Passed,
                display_name: None,
                stack_trace: None,
            },
            ClientMessage::TestRunFinished {
                status: StatusCode::Ok,
                message: Some("1 test completed".into()),
            },
        ]
    );
}

#[tokio::test]
async fn unsupported_notification_is_reported_and_session_survives() {
    let (mut harness, mut server) = Harness::in_memory(ClientOptions::default());

    server
        .notify(method::SHOW_MESSAGE, json!({ "type": 3, "message": "hi" }))
        .await;
    let LinkEvent::HandlerFailed { method: failed, error } = harness.next_event().await else {
        panic!("expected a handler failure");
    };
    assert_eq!(failed, method::SHOW_MESSAGE);
    assert!(error.contains("not implemented"), "{error}");

    server
        .notify(method::LOG_MESSAGE, json!({ "type": 2, "message": "still here" }))
        .await;
    assert_eq!(
        harness.next_message().await,
        ClientMessage::AppendEventLog("still here".into())
    );
}

#[tokio::test]
async fn server_requests_get_method_not_found() {
    let (_harness, mut server) = Harness::in_memory(ClientOptions::default());

    server.request(7, "client/registerCapability").await;
    let reply = server.recv().await.unwrap();
    assert_eq!(reply["id"], 7);
    assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);
}

#[tokio::test]
async fn server_hangup_closes_session() {
    let (mut harness, server) = Harness::in_memory(ClientOptions::default());
    drop(server);
    assert_eq!(
        harness.next_event().await,
        LinkEvent::Closed {
            reason: CloseReason::Eof
        }
    );
}
