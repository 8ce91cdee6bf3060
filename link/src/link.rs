//! Running JSON-RPC session with the build server.
//!
//! ```text
//!            +-- writer task <-- mpsc<WriterCommand> <-- BuildServer proxy
//!   stream --+
//!            +-- reader task --> pending responses (oneshot per id)
//!                            --> NotificationHandler (in arrival order)
//!                            --> -32601 replies to server requests
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use buildlink_types::{BuildTargetIdentifier, StatusCode, method};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time;

use crate::codec::{FrameReader, FrameWriter};
use crate::protocol::{
    self, BuildTarget, CompileParams, CompileResult, IncomingFrame, Notification, Request,
    WorkspaceBuildTargetsResult,
};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

const WRITER_CHANNEL_CAPACITY: usize = 64;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// Receives server-pushed notifications, one at a time, in arrival order.
///
/// Implementations must return promptly; long work belongs on a spawned task.
/// An `Err` is logged and reported as [`LinkEvent::HandlerFailed`]; the
/// session keeps running.
pub trait NotificationHandler: Send + Sync + 'static {
    fn handle_notification(&self, method: &str, params: Option<Value>) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server closed its end.
    Eof,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    HandlerFailed { method: String, error: String },
    Closed { reason: CloseReason },
}

#[derive(Debug, Clone, Copy)]
pub struct LinkOptions {
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            request_timeout: REQUEST_TIMEOUT,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
        }
    }
}

enum WriterCommand {
    Send(Value),
    /// Close the stream and stop.
    Shutdown,
}

struct Outbox {
    writer_tx: mpsc::Sender<WriterCommand>,
    pending: PendingMap,
    next_id: AtomicU64,
    request_timeout: Duration,
}

impl Outbox {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let frame = serde_json::to_value(Request::new(id, method, params))
            .context("serializing request")?;
        if self
            .writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            bail!("build server link closed before {method} was sent");
        }

        let body = match time::timeout(self.request_timeout, rx).await {
            Ok(Ok(body)) => body,
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&id);
                bail!("build server link closed while waiting for {method}");
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                bail!("{method} timed out after {:?}", self.request_timeout);
            }
        };

        if let Some(error) = body.get("error") {
            bail!(
                "{method} failed: {}",
                error["message"].as_str().unwrap_or("unknown error")
            );
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let frame = serde_json::to_value(Notification::new(method, params))
            .context("serializing notification")?;
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| anyhow!("build server link closed before {method} was sent"))
    }
}

/// Clonable proxy for calls into the build server.
#[derive(Clone)]
pub struct BuildServer {
    outbox: Arc<Outbox>,
}

impl BuildServer {
    /// `build/initialize` followed by `build/initialized`.
    pub async fn initialize(&self, root_uri: &str) -> Result<Value> {
        let result = self
            .outbox
            .request(method::INITIALIZE, Some(protocol::initialize_params(root_uri)))
            .await?;
        self.outbox
            .notify(method::INITIALIZED, Some(json!({})))
            .await?;
        Ok(result)
    }

    pub async fn build_targets(&self) -> Result<Vec<BuildTarget>> {
        let result = self.outbox.request(method::BUILD_TARGETS, None).await?;
        let parsed: WorkspaceBuildTargetsResult =
            serde_json::from_value(result).context("decoding workspace/buildTargets result")?;
        Ok(parsed.targets)
    }

    pub async fn compile(
        &self,
        targets: &[BuildTargetIdentifier],
        origin_id: Option<&str>,
    ) -> Result<StatusCode> {
        let params = serde_json::to_value(CompileParams { targets, origin_id })
            .context("serializing compile params")?;
        let result = self.outbox.request(method::COMPILE, Some(params)).await?;
        let parsed: CompileResult =
            serde_json::from_value(result).context("decoding buildTarget/compile result")?;
        Ok(parsed.status_code)
    }

    /// Arbitrary request; returns the `result` member.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.outbox.request(method, params).await
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.outbox.notify(method, params).await
    }
}

/// One live session with the build server.
pub struct RpcLink {
    outbox: Arc<Outbox>,
    shutdown_timeout: Duration,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl RpcLink {
    /// Start the reader and writer tasks over an already connected stream.
    pub fn start<R, W>(
        reader: R,
        writer: W,
        handler: Arc<dyn NotificationHandler>,
        events: Option<mpsc::Sender<LinkEvent>>,
        options: LinkOptions,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (writer_tx, writer_rx) = mpsc::channel(WRITER_CHANNEL_CAPACITY);

        let writer_handle = tokio::spawn(run_writer(FrameWriter::new(writer), writer_rx));
        let reader_handle = tokio::spawn(run_reader(
            FrameReader::new(reader),
            Arc::clone(&pending),
            writer_tx.clone(),
            handler,
            events,
        ));

        Self {
            outbox: Arc::new(Outbox {
                writer_tx,
                pending,
                next_id: AtomicU64::new(1),
                request_timeout: options.request_timeout,
            }),
            shutdown_timeout: options.shutdown_timeout,
            reader_handle,
            writer_handle,
        }
    }

    #[must_use]
    pub fn remote(&self) -> BuildServer {
        BuildServer {
            outbox: Arc::clone(&self.outbox),
        }
    }

    /// `true` once the reader has stopped (server gone or stream broken).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.reader_handle.is_finished()
    }

    /// Ask the server to shut down, tell it to exit, then close the stream.
    ///
    /// A server that does not answer `build/shutdown` still gets `build/exit`.
    pub async fn shutdown(self) {
        let outbox = &self.outbox;
        let shutdown = time::timeout(self.shutdown_timeout, outbox.request(method::SHUTDOWN, None));
        match shutdown.await {
            Ok(Ok(_)) => tracing::debug!("Build server acknowledged shutdown"),
            Ok(Err(e)) => tracing::warn!("Build server shutdown request failed: {e:#}"),
            Err(_) => tracing::warn!("Build server did not answer shutdown in time"),
        }
        if let Err(e) = outbox.notify(method::EXIT, None).await {
            tracing::debug!("Could not send exit notification: {e:#}");
        }
        let _ = outbox.writer_tx.send(WriterCommand::Shutdown).await;

        let Self {
            shutdown_timeout,
            reader_handle,
            writer_handle,
            ..
        } = self;
        if time::timeout(shutdown_timeout, writer_handle).await.is_err() {
            tracing::debug!("Writer task did not finish in time");
        }
        let abort = reader_handle.abort_handle();
        if time::timeout(shutdown_timeout, reader_handle).await.is_err() {
            tracing::debug!("Reader task still running after exit, aborting");
            abort.abort();
        }
    }
}

async fn run_writer<W>(mut writer: FrameWriter<W>, mut rx: mpsc::Receiver<WriterCommand>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        match command {
            WriterCommand::Send(frame) => {
                if let Err(e) = writer.write_frame(&frame).await {
                    tracing::warn!("Build server write error: {e:#}");
                    return;
                }
            }
            WriterCommand::Shutdown => break,
        }
    }
    if let Err(e) = writer.close().await {
        tracing::debug!("Closing build server stream: {e:#}");
    }
}

async fn run_reader<R>(
    mut reader: FrameReader<R>,
    pending: PendingMap,
    writer_tx: mpsc::Sender<WriterCommand>,
    handler: Arc<dyn NotificationHandler>,
    events: Option<mpsc::Sender<LinkEvent>>,
) where
    R: AsyncRead + Unpin,
{
    let reason = loop {
        match reader.read_frame().await {
            Ok(Some(frame)) => {
                dispatch_frame(&frame, &pending, &writer_tx, handler.as_ref(), events.as_ref())
                    .await;
            }
            Ok(None) => {
                tracing::info!("Build server closed the connection");
                break CloseReason::Eof;
            }
            Err(e) => {
                tracing::warn!("Build server read error: {e:#}");
                break CloseReason::Failed(format!("{e:#}"));
            }
        }
    };

    // Wake every caller still waiting on a response.
    pending.lock().await.clear();
    if let Some(events) = events {
        let _ = events.send(LinkEvent::Closed { reason }).await;
    }
}

async fn dispatch_frame(
    frame: &Value,
    pending: &Mutex<HashMap<u64, oneshot::Sender<Value>>>,
    writer_tx: &mpsc::Sender<WriterCommand>,
    handler: &dyn NotificationHandler,
    events: Option<&mpsc::Sender<LinkEvent>>,
) {
    let Some(incoming) = protocol::parse_incoming(frame) else {
        tracing::trace!("Ignoring malformed JSON-RPC frame");
        return;
    };

    match incoming {
        IncomingFrame::Response { id, body } => {
            let sender = pending.lock().await.remove(&id);
            match sender {
                Some(tx) => {
                    let _ = tx.send(body);
                }
                None => tracing::debug!(id, "Response for unknown request"),
            }
        }
        IncomingFrame::ServerRequest { id, method } => {
            tracing::debug!("Build server sent request {method}, replying method not found");
            let reply = protocol::method_not_found(&id, &method);
            let _ = writer_tx.send(WriterCommand::Send(reply)).await;
        }
        IncomingFrame::Notification { method, params } => {
            tracing::trace!(%method, "Build server notification");
            if let Err(e) = handler.handle_notification(&method, params) {
                tracing::error!("Handling {method} failed: {e:#}");
                if let Some(events) = events {
                    let _ = events
                        .send(LinkEvent::HandlerFailed {
                            method,
                            error: format!("{e:#}"),
                        })
                        .await;
                }
            }
        }
    }
}
