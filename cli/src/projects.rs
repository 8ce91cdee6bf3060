//! Project resync against the live build server.

use std::sync::{Arc, OnceLock};

use anyhow::Context;
use buildlink_client::{ProjectModel, ResyncFuture, WorkspaceRoots, strip_query};
use buildlink_link::BuildServer;
use buildlink_types::{ClientMessage, ClientSink};
use url::Url;

/// Resolves targets against the configured roots and, on resync, re-reads the
/// build targets belonging to a project and reports them to the IDE.
///
/// The server handle is attached once the session is up; a resync requested
/// before that fails.
pub struct WorkspaceProjects {
    roots: WorkspaceRoots,
    server: OnceLock<BuildServer>,
    sink: Arc<dyn ClientSink>,
}

impl WorkspaceProjects {
    pub fn new(roots: WorkspaceRoots, sink: Arc<dyn ClientSink>) -> Self {
        Self {
            roots,
            server: OnceLock::new(),
            sink,
        }
    }

    pub fn attach(&self, server: BuildServer) {
        if self.server.set(server).is_err() {
            tracing::warn!("Build server already attached to project model");
        }
    }
}

impl ProjectModel for WorkspaceProjects {
    fn project_for_target(&self, target: &Url) -> Option<String> {
        self.roots.project_for_target(target)
    }

    fn resync(&self, project: String) -> ResyncFuture {
        let server = self.server.get().cloned();
        let roots = self.roots.clone();
        let sink = Arc::clone(&self.sink);
        Box::pin(async move {
            let Some(server) = server else {
                tracing::debug!(%project, "Resync requested before the session is up, skipping");
                return Ok(());
            };
            let targets = server
                .build_targets()
                .await
                .with_context(|| format!("listing build targets for {project}"))?;

            let owned: Vec<String> = targets
                .into_iter()
                .map(|target| target.id.uri)
                .filter(|uri| {
                    strip_query(uri)
                        .ok()
                        .and_then(|url| roots.project_for_target(&url))
                        .is_some_and(|owner| owner == project)
                })
                .collect();
            tracing::info!(%project, targets = owned.len(), "Project resynced");
            sink.send(ClientMessage::ProjectChanged {
                project,
                targets: owned,
            });
            Ok(())
        })
    }
}
