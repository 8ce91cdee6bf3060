//! buildlink - bridges an IDE to an out-of-process build server.
//!
//! ```text
//! IDE stdin/stdout <-> ChannelSink / ide::spawn_writer
//!                                ^
//!                                | ClientMessage
//!                        BuildEventClient  <- notifications
//!                                ^
//!                             RpcLink  <-> pipe (Connector) | child stdio (ChildServer)
//! ```
//!
//! Without a `[server]` section the build server is expected to listen on a
//! pipe whose name is announced to the IDE before dialing. With one, the
//! server is launched as a child process and spoken to over its stdio.

mod ide;
mod projects;

use std::env;
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use buildlink_client::{BuildEventClient, ChannelSink, ClientOptions, ProjectModel, WorkspaceRoots};
use buildlink_config::BuildlinkConfig;
use buildlink_link::{
    BuildServer, ChildServer, LaunchSpec, LinkEvent, LinkOptions, NotificationHandler, RpcLink,
};
use buildlink_transport::{Connector, RetryPolicy};
use buildlink_types::ClientSink;
use tokio::io;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use url::Url;

use crate::projects::WorkspaceProjects;

const LINK_EVENT_CAPACITY: usize = 32;
/// Grace period for queued IDE messages after the session ends.
const IDE_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // stdout carries the IDE protocol; no log file means no logs.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => warnings.push(format!(
                "Failed to open log file {}: {e}",
                candidate.display()
            )),
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = buildlink_config::buildlink_home() {
        candidates.push(home.join("logs").join("buildlink.log"));
    }
    candidates.push(PathBuf::from(".buildlink").join("logs").join("buildlink.log"));
    candidates
}

/// The build server session, however it was reached.
enum Session {
    Pipe(RpcLink),
    Child(ChildServer),
}

impl Session {
    fn remote(&self) -> BuildServer {
        match self {
            Session::Pipe(link) => link.remote(),
            Session::Child(child) => child.remote(),
        }
    }

    async fn shutdown(self) {
        match self {
            Session::Pipe(link) => link.shutdown().await,
            Session::Child(child) => child.shutdown().await,
        }
    }
}

fn root_uri(config: &BuildlinkConfig) -> Result<String> {
    let root = match config.workspace.roots().into_iter().next() {
        Some(root) => root,
        None => env::current_dir().context("resolving working directory")?,
    };
    Url::from_directory_path(&root)
        .map(String::from)
        .map_err(|()| anyhow::anyhow!("workspace root {} is not absolute", root.display()))
}

async fn open_session(
    config: &BuildlinkConfig,
    sink: &ChannelSink,
    handler: Arc<dyn NotificationHandler>,
    events: mpsc::Sender<LinkEvent>,
    cancel: &CancellationToken,
) -> Result<Session> {
    let options = LinkOptions {
        request_timeout: config.link.request_timeout(),
        shutdown_timeout: config.link.shutdown_timeout(),
    };

    if let Some(server) = &config.server {
        let mut spec = LaunchSpec::new(server.command()).args(server.args());
        if let Some(dir) = server.working_dir() {
            spec = spec.working_dir(dir);
        }
        let child = ChildServer::spawn(&spec, handler, Some(events), options)?;
        return Ok(Session::Child(child));
    }

    let connector = Connector::new(RetryPolicy {
        max_attempts: config.transport.max_attempts,
        interval: config.transport.retry_interval(),
    });
    let connection = connector
        .connect(sink, cancel)
        .await
        .context("connecting to build server pipe")?;
    let (reader, writer) = connection.into_split();
    Ok(Session::Pipe(RpcLink::start(
        reader,
        writer,
        handler,
        Some(events),
        options,
    )))
}

/// Send `build/initialize`, giving up early if the session is cancelled.
async fn initialize(server: &BuildServer, root_uri: &str, cancel: &CancellationToken) {
    tokio::select! {
        biased;
        () = cancel.cancelled() => tracing::info!("Cancelled while initializing"),
        result = server.initialize(root_uri) => match result {
            Ok(_) => tracing::info!("Build server initialized"),
            Err(e) => tracing::error!("Build server initialize failed: {e:#}"),
        },
    }
}

async fn run(config: BuildlinkConfig) -> Result<()> {
    let (sink, messages) = ChannelSink::new();
    let ide_writer = ide::spawn_writer(messages, io::stdout());
    let shared_sink: Arc<dyn ClientSink> = Arc::new(sink.clone());

    let roots = WorkspaceRoots::new(config.workspace.roots());
    let projects = Arc::new(WorkspaceProjects::new(roots, Arc::clone(&shared_sink)));
    let client = BuildEventClient::with_options(
        shared_sink,
        ClientOptions {
            failure_cache_capacity: config.client.failure_cache_capacity,
            filter_stack_traces: config.client.filter_stack_traces,
        },
    )
    .with_projects(Arc::clone(&projects) as Arc<dyn ProjectModel>);

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted");
            ctrl_c_cancel.cancel();
        }
    });

    let (events_tx, mut events) = mpsc::channel(LINK_EVENT_CAPACITY);
    let session = open_session(&config, &sink, Arc::new(client), events_tx, &cancel).await?;
    let server = session.remote();
    projects.attach(server.clone());

    initialize(&server, &root_uri(&config)?, &cancel).await;

    let ide_gone = ide::wait_for_eof(io::stdin());
    tokio::pin!(ide_gone);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = &mut ide_gone => break,
            event = events.recv() => match event {
                Some(LinkEvent::Closed { reason }) => {
                    tracing::info!(?reason, "Build server session closed");
                    break;
                }
                Some(LinkEvent::HandlerFailed { method, error }) => {
                    tracing::debug!(%method, "Notification not handled: {error}");
                }
                None => break,
            },
        }
    }

    session.shutdown().await;
    drop(sink);
    drop(projects);
    match time::timeout(IDE_DRAIN_TIMEOUT, ide_writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("IDE writer task failed: {e}"),
        Err(_) => tracing::debug!("IDE writer still busy at exit"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = match BuildlinkConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            tracing::error!("Ignoring unusable config {}: {e}", e.path().display());
            BuildlinkConfig::default()
        }
    };

    let result = run(config).await;
    if let Err(e) = &result {
        tracing::error!("buildlink stopped: {e:#}");
    }
    result
}
