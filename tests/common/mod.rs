//! Shared test utilities and fixtures

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use buildlink_client::{BuildEventClient, ChannelSink, ClientOptions};
use buildlink_link::codec::{FrameReader, FrameWriter};
use buildlink_link::{LinkEvent, LinkOptions, RpcLink};
use buildlink_types::{ClientMessage, ClientSink};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadHalf, WriteHalf, duplex, split};
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const WAIT: Duration = Duration::from_secs(5);

/// Scripted build server end of a session.
pub struct FakeServer<S> {
    reader: FrameReader<ReadHalf<S>>,
    writer: FrameWriter<WriteHalf<S>>,
}

impl<S: AsyncRead + AsyncWrite> FakeServer<S> {
    pub fn new(stream: S) -> Self {
        let (read, write) = split(stream);
        Self {
            reader: FrameReader::new(read),
            writer: FrameWriter::new(write),
        }
    }

    pub async fn recv(&mut self) -> Option<Value> {
        timeout(WAIT, self.reader.read_frame())
            .await
            .expect("server waited too long for a frame")
            .expect("malformed frame")
    }

    /// Read the next frame, assert it is a request for `method`, return its id.
    pub async fn expect_request(&mut self, method: &str) -> Value {
        let frame = self.recv().await.expect("stream ended");
        assert_eq!(frame["method"], method, "unexpected frame {frame}");
        frame["id"].clone()
    }

    pub async fn expect_notification(&mut self, method: &str) -> Value {
        let frame = self.recv().await.expect("stream ended");
        assert_eq!(frame["method"], method, "unexpected frame {frame}");
        assert!(frame.get("id").is_none(), "expected a notification: {frame}");
        frame.get("params").cloned().unwrap_or(Value::Null)
    }

    pub async fn respond(&mut self, id: Value, result: Value) {
        self.writer
            .write_frame(&json!({ "jsonrpc": "2.0", "id": id, "result": result }))
            .await
            .unwrap();
    }

    /// Send a server-initiated request.
    pub async fn request(&mut self, id: u64, method: &str) {
        self.writer
            .write_frame(&json!({ "jsonrpc": "2.0", "id": id, "method": method }))
            .await
            .unwrap();
    }

    pub async fn notify(&mut self, method: &str, params: Value) {
        self.writer
            .write_frame(&json!({ "jsonrpc": "2.0", "method": method, "params": params }))
            .await
            .unwrap();
    }
}

/// A running client session plus the messages it emits toward the IDE.
pub struct Harness {
    pub link: RpcLink,
    pub messages: mpsc::UnboundedReceiver<ClientMessage>,
    pub events: mpsc::Receiver<LinkEvent>,
}

impl Harness {
    pub fn start<R, W>(reader: R, writer: W, options: ClientOptions) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, messages) = ChannelSink::new();
        let client = BuildEventClient::with_options(Arc::new(sink) as Arc<dyn ClientSink>, options);
        let (events_tx, events) = mpsc::channel(16);
        let link = RpcLink::start(
            reader,
            writer,
            Arc::new(client),
            Some(events_tx),
            LinkOptions::default(),
        );
        Self {
            link,
            messages,
            events,
        }
    }

    /// Session over an in-memory pipe.
    pub fn in_memory(options: ClientOptions) -> (Self, FakeServer<DuplexStream>) {
        let (ours, theirs) = duplex(64 * 1024);
        let (read, write) = split(ours);
        (Self::start(read, write, options), FakeServer::new(theirs))
    }

    pub async fn next_message(&mut self) -> ClientMessage {
        timeout(WAIT, self.messages.recv())
            .await
            .expect("no client message in time")
            .expect("client sink closed")
    }

    pub async fn next_messages(&mut self, n: usize) -> Vec<ClientMessage> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.next_message().await);
        }
        out
    }

    pub async fn next_event(&mut self) -> LinkEvent {
        timeout(WAIT, self.events.recv())
            .await
            .expect("no link event in time")
            .expect("event channel closed")
    }
}

pub fn task_id(id: &str, parents: &[&str]) -> Value {
    json!({ "id": id, "parents": parents })
}

pub fn test_name(class: &str, method: &str) -> Value {
    json!({
        "displayName": format!("{method}()"),
        "methodName": method,
        "parent": {
            "displayName": class,
            "className": class,
            "parent": { "displayName": "Gradle Test Run :test", "suiteName": "Gradle Test Run :test" }
        }
    })
}
