use std::future::Future;
use std::io;
use std::time::Duration;

use buildlink_types::{ClientMessage, ClientSink, TelemetryEvent};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf, split};
#[cfg(unix)]
use tokio::net::UnixStream;
#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::endpoint::{PipeEndpoint, generate_endpoint};
use crate::error::TransportError;
use crate::stream::{PipeReader, PipeStream, PipeWriter};

pub const MAX_ATTEMPTS: u32 = 30;
pub const RETRY_INTERVAL: Duration = Duration::from_millis(2000);
/// Telemetry event carrying the number of dial attempts of one connect.
pub const CONNECT_ATTEMPTS_EVENT: &str = "importerConnectAttempts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Fixed sleep between failed attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            interval: RETRY_INTERVAL,
        }
    }
}

/// Opens the platform primitive for an endpoint. One call is one attempt.
pub trait Dial: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    fn dial(
        &self,
        endpoint: &PipeEndpoint,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Unix domain socket on POSIX, named pipe client on Windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformDialer;

impl Dial for PlatformDialer {
    type Stream = PipeStream;

    async fn dial(&self, endpoint: &PipeEndpoint) -> io::Result<PipeStream> {
        match endpoint {
            #[cfg(unix)]
            PipeEndpoint::Socket(path) => UnixStream::connect(path).await.map(PipeStream::Unix),
            #[cfg(windows)]
            PipeEndpoint::NamedPipe(name) => ClientOptions::new()
                .open(name)
                .map(PipeStream::NamedPipe),
            other => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{other} is not a local pipe on this platform"),
            )),
        }
    }
}

/// Connects to the build server's pipe, retrying until the peer has
/// created it.
///
/// Single use per session: concurrent connects to the same endpoint are
/// not supported.
#[derive(Debug, Clone)]
pub struct Connector<D = PlatformDialer> {
    dialer: D,
    policy: RetryPolicy,
}

impl Connector<PlatformDialer> {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_dialer(PlatformDialer, policy)
    }
}

impl<D: Dial> Connector<D> {
    pub fn with_dialer(dialer: D, policy: RetryPolicy) -> Self {
        Self { dialer, policy }
    }

    /// Generate a fresh endpoint, announce it and dial it.
    pub async fn connect(
        &self,
        sink: &dyn ClientSink,
        cancel: &CancellationToken,
    ) -> Result<Connection<D::Stream>, TransportError> {
        let endpoint = generate_endpoint()?;
        self.connect_to(endpoint, sink, cancel).await
    }

    /// Announce `endpoint` to the peer and dial it until it answers.
    ///
    /// The attempt count is reported through `sink` whatever the outcome.
    pub async fn connect_to(
        &self,
        endpoint: PipeEndpoint,
        sink: &dyn ClientSink,
        cancel: &CancellationToken,
    ) -> Result<Connection<D::Stream>, TransportError> {
        sink.send(ClientMessage::WillConnect {
            pipe_name: endpoint.name(),
        });

        let (outcome, attempts) = self.dial_with_retry(&endpoint, cancel).await;
        sink.send(ClientMessage::Telemetry(TelemetryEvent::count(
            CONNECT_ATTEMPTS_EVENT,
            u64::from(attempts),
        )));

        let stream = outcome?;
        info!(%endpoint, attempts, "Connected to build server pipe");
        Ok(Connection::new(endpoint, stream))
    }

    async fn dial_with_retry(
        &self,
        endpoint: &PipeEndpoint,
        cancel: &CancellationToken,
    ) -> (Result<D::Stream, TransportError>, u32) {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return (Err(TransportError::Cancelled { attempts }), attempts);
                }
                result = self.dialer.dial(endpoint) => result,
            };

            match result {
                Ok(stream) => return (Ok(stream), attempts),
                Err(e) => debug!(%endpoint, attempt = attempts, error = %e, "Pipe not ready"),
            }

            if attempts >= max_attempts {
                warn!(%endpoint, attempts, "Giving up on build server pipe");
                return (Err(TransportError::ConnectionTimeout { attempts }), attempts);
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return (Err(TransportError::Cancelled { attempts }), attempts);
                }
                () = time::sleep(self.policy.interval) => {}
            }
        }
    }
}

/// Both halves of one connected pipe.
#[derive(Debug)]
pub struct Connection<S> {
    endpoint: PipeEndpoint,
    reader: PipeReader<ReadHalf<S>>,
    writer: PipeWriter<WriteHalf<S>>,
}

impl<S: AsyncRead + AsyncWrite> Connection<S> {
    pub fn new(endpoint: PipeEndpoint, stream: S) -> Self {
        let (read, write) = split(stream);
        Self {
            endpoint,
            reader: PipeReader::new(read),
            writer: PipeWriter::new(write),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &PipeEndpoint {
        &self.endpoint
    }

    pub fn into_split(self) -> (PipeReader<ReadHalf<S>>, PipeWriter<WriteHalf<S>>) {
        (self.reader, self.writer)
    }
}
