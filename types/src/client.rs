//! Commands the build event client emits toward the IDE.
//!
//! Each [`ClientMessage`] is fire-and-forget. [`ClientMessage::to_notification`]
//! renders the JSON-RPC notification the IDE extension listens for.

use serde::Serialize;
use serde_json::{Value, json};

use crate::bsp::StatusCode;
use crate::test_name::JavaTestStatus;

/// Command identifiers understood by the IDE extension.
pub mod command {
    pub const APPEND_BUILD_LOG: &str = "_java.gradle.buildServer.appendBuildLog";
    pub const EVENT_LOG: &str = "_java.gradle.buildServer.log";
    pub const TEST_ITEM_STATUS: &str = "java.gradle.buildServer.onDidChangeTestItemStatus";
    pub const TEST_RUN_FINISHED: &str = "java.gradle.buildServer.onDidFinishTestRun";
    pub const PROJECT_CHANGED: &str = "java.gradle.buildServer.onDidChangeProject";
}

const WILL_CONNECT_METHOD: &str = "_gradle.onWillImporterConnect";
const COMMAND_METHOD: &str = "workspace/notify";
const PROGRESS_CREATE_METHOD: &str = "window/workDoneProgress/create";
const PROGRESS_METHOD: &str = "$/progress";
const TELEMETRY_METHOD: &str = "telemetry/event";

/// A named telemetry record. Best-effort; never blocks the sender.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    pub name: String,
    pub properties: Value,
}

impl TelemetryEvent {
    #[must_use]
    pub fn count(name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            properties: json!(value),
        }
    }

    #[must_use]
    pub fn message(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Value::String(text.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Publishes the freshly generated pipe name before connecting.
    WillConnect { pipe_name: String },
    /// Build output surface: compile banners, compile progress, failure details.
    AppendBuildLog(String),
    /// General build-server log surface.
    AppendEventLog(String),
    TestItemStatus {
        parts: Vec<String>,
        status: JavaTestStatus,
        display_name: Option<String>,
        stack_trace: Option<String>,
    },
    TestRunFinished {
        status: StatusCode,
        message: Option<String>,
    },
    ProgressCreate { token: String },
    ProgressBegin {
        token: String,
        title: String,
        message: Option<String>,
    },
    ProgressReport { token: String, message: String },
    ProgressEnd { token: String, message: String },
    /// A project's build model was refreshed after its targets changed.
    ProjectChanged { project: String, targets: Vec<String> },
    Telemetry(TelemetryEvent),
}

impl ClientMessage {
    /// Render as a JSON-RPC 2.0 notification frame body.
    #[must_use]
    pub fn to_notification(&self) -> Value {
        let (method, params) = match self {
            Self::WillConnect { pipe_name } => (WILL_CONNECT_METHOD, json!([pipe_name])),
            Self::AppendBuildLog(text) => (
                COMMAND_METHOD,
                execute(command::APPEND_BUILD_LOG, &[json!(text)]),
            ),
            Self::AppendEventLog(text) => {
                (COMMAND_METHOD, execute(command::EVENT_LOG, &[json!(text)]))
            }
            Self::TestItemStatus {
                parts,
                status,
                display_name,
                stack_trace,
            } => {
                let mut arguments = vec![json!(parts), json!(status.code()), json!(display_name)];
                // Finished tests always carry the trace slot, null when absent.
                if *status != JavaTestStatus::Running {
                    arguments.push(json!(stack_trace));
                }
                (COMMAND_METHOD, execute(command::TEST_ITEM_STATUS, &arguments))
            }
            Self::TestRunFinished { status, message } => (
                COMMAND_METHOD,
                execute(
                    command::TEST_RUN_FINISHED,
                    &[json!(status.value()), json!(message)],
                ),
            ),
            Self::ProgressCreate { token } => (PROGRESS_CREATE_METHOD, json!({ "token": token })),
            Self::ProgressBegin {
                token,
                title,
                message,
            } => (
                PROGRESS_METHOD,
                json!({
                    "token": token,
                    "value": { "kind": "begin", "title": title, "message": message }
                }),
            ),
            Self::ProgressReport { token, message } => (
                PROGRESS_METHOD,
                json!({ "token": token, "value": { "kind": "report", "message": message } }),
            ),
            Self::ProgressEnd { token, message } => (
                PROGRESS_METHOD,
                json!({ "token": token, "value": { "kind": "end", "message": message } }),
            ),
            Self::ProjectChanged { project, targets } => (
                COMMAND_METHOD,
                execute(command::PROJECT_CHANGED, &[json!(project), json!(targets)]),
            ),
            Self::Telemetry(event) => (TELEMETRY_METHOD, json!(event)),
        };

        json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        })
    }
}

/// Outbound edge toward the IDE.
///
/// Implementations must not block; delivery is best-effort.
pub trait ClientSink: Send + Sync {
    fn send(&self, message: ClientMessage);
}

impl<F> ClientSink for F
where
    F: Fn(ClientMessage) + Send + Sync,
{
    fn send(&self, message: ClientMessage) {
        self(message);
    }
}

fn execute(command: &str, arguments: &[Value]) -> Value {
    json!({ "command": command, "arguments": arguments })
}
