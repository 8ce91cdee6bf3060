//! Build Server Protocol notification payloads.
//!
//! Only the subset the client consumes is modelled. Field names follow the
//! protocol's camelCase JSON; optional fields default so that sparse payloads
//! from older servers still decode.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON-RPC method names exchanged with the build server.
pub mod method {
    pub const LOG_MESSAGE: &str = "build/logMessage";
    pub const SHOW_MESSAGE: &str = "build/showMessage";
    pub const PUBLISH_DIAGNOSTICS: &str = "build/publishDiagnostics";
    pub const TASK_START: &str = "build/taskStart";
    pub const TASK_PROGRESS: &str = "build/taskProgress";
    pub const TASK_FINISH: &str = "build/taskFinish";
    pub const TARGET_DID_CHANGE: &str = "buildTarget/didChange";

    pub const INITIALIZE: &str = "build/initialize";
    pub const INITIALIZED: &str = "build/initialized";
    pub const SHUTDOWN: &str = "build/shutdown";
    pub const EXIT: &str = "build/exit";
    pub const BUILD_TARGETS: &str = "workspace/buildTargets";
    pub const COMPILE: &str = "buildTarget/compile";
}

#[derive(Debug, Error)]
#[error("unknown {kind} code: {code}")]
pub struct UnknownCodeError {
    kind: &'static str,
    code: i64,
}

/// Correlation key for one unit of work tracked by the build server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId {
    pub id: String,
    /// Ancestor task ids, innermost first as sent by the server.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

impl TaskId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parents: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents = parents.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Severity of a `build/logMessage` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum MessageType {
    Error = 1,
    Warning = 2,
    Info = 3,
    /// Plain log output; routed to telemetry rather than the UI.
    Log = 4,
}

impl TryFrom<i64> for MessageType {
    type Error = UnknownCodeError;

    fn try_from(code: i64) -> Result<Self, UnknownCodeError> {
        match code {
            1 => Ok(MessageType::Error),
            2 => Ok(MessageType::Warning),
            3 => Ok(Self::Info),
            4 => Ok(Self::Log),
            _ => Err(UnknownCodeError {
                kind: "message type",
                code,
            }),
        }
    }
}

impl From<MessageType> for i64 {
    fn from(value: MessageType) -> Self {
        value as i64
    }
}

/// Outcome of a finished task or build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum StatusCode {
    Ok = 1,
    Error = 2,
    Cancelled = 3,
}

impl StatusCode {
    #[must_use]
    pub const fn value(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for StatusCode {
    type Error = UnknownCodeError;

    fn try_from(code: i64) -> Result<Self, UnknownCodeError> {
        match code {
            1 => Ok(StatusCode::Ok),
            2 => Ok(StatusCode::Error),
            3 => Ok(StatusCode::Cancelled),
            _ => Err(UnknownCodeError {
                kind: "status",
                code,
            }),
        }
    }
}

impl From<StatusCode> for i64 {
    fn from(value: StatusCode) -> Self {
        value.value()
    }
}

/// Tag describing how to interpret the `data` field of a task event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskDataKind {
    CompileTask,
    CompileReport,
    TestTask,
    TestStart,
    TestFinish,
    TestReport,
    Other(String),
}

impl TaskDataKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CompileTask => "compile-task",
            Self::CompileReport => "compile-report",
            Self::TestTask => "test-task",
            Self::TestStart => "test-start",
            Self::TestFinish => "test-finish",
            Self::TestReport => "test-report",
            Self::Other(kind) => kind,
        }
    }
}

impl From<String> for TaskDataKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "compile-task" => Self::CompileTask,
            "compile-report" => Self::CompileReport,
            "test-task" => Self::TestTask,
            "test-start" => Self::TestStart,
            "test-finish" => Self::TestFinish,
            "test-report" => Self::TestReport,
            _ => Self::Other(value),
        }
    }
}

impl From<TaskDataKind> for String {
    fn from(value: TaskDataKind) -> Self {
        match value {
            TaskDataKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMessageParams {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStartParams {
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_kind: Option<TaskDataKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgressParams {
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_kind: Option<TaskDataKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFinishParams {
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_kind: Option<TaskDataKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildTargetIdentifier {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTargetEvent {
    pub target: BuildTargetIdentifier,
    /// 1 = created, 2 = changed, 3 = deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidChangeBuildTarget {
    pub changes: Vec<BuildTargetEvent>,
}
