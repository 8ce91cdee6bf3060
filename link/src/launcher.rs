//! Build server as a child process speaking JSON-RPC on stdin/stdout.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time;

use crate::link::{BuildServer, LinkEvent, LinkOptions, NotificationHandler, RpcLink};

/// How to start the build server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable name or path; bare names are resolved on `PATH`.
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// A spawned build server with a link over its stdio.
pub struct ChildServer {
    child: Child,
    link: RpcLink,
    shutdown_timeout: time::Duration,
}

impl ChildServer {
    pub fn spawn(
        spec: &LaunchSpec,
        handler: Arc<dyn NotificationHandler>,
        events: Option<mpsc::Sender<LinkEvent>>,
        options: LinkOptions,
    ) -> Result<Self> {
        let program = which::which(&spec.command)
            .with_context(|| format!("{} not found in PATH", spec.command))?;
        let mut command = Command::new(&program);
        command
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("spawning {}", program.display()))?;
        let stdout = child.stdout.take().context("no stdout from build server")?;
        let stdin = child.stdin.take().context("no stdin from build server")?;
        tracing::info!(pid = child.id(), "Started build server {}", program.display());

        Ok(Self {
            child,
            link: RpcLink::start(stdout, stdin, handler, events, options),
            shutdown_timeout: options.shutdown_timeout,
        })
    }

    #[must_use]
    pub fn remote(&self) -> BuildServer {
        self.link.remote()
    }

    /// Orderly shutdown of the session, then wait for the process to exit.
    /// A process that outlives the grace period is killed.
    pub async fn shutdown(self) {
        let Self {
            mut child,
            link,
            shutdown_timeout,
        } = self;
        link.shutdown().await;

        match time::timeout(shutdown_timeout, child.wait()).await {
            Ok(Ok(status)) => tracing::info!("Build server exited with {status}"),
            Ok(Err(e)) => tracing::warn!("Waiting for build server failed: {e}"),
            Err(_) => {
                tracing::debug!("Build server didn't exit in time, killing");
                let _ = child.kill().await;
            }
        }
    }
}
