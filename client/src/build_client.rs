//! Reactions to build server notifications.
//!
//! Every notification turns into at most one [`ClientMessage`] for the IDE,
//! except build target changes, which schedule a project resync off the
//! delivery path.

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

use buildlink_link::NotificationHandler;
use buildlink_types::{
    ClientMessage, ClientSink, DidChangeBuildTarget, JavaTestStatus, LogMessageParams,
    MessageType, StatusCode, TaskDataKind, TaskFinishParams, TaskProgressParams, TaskStartParams,
    TelemetryEvent, TestFinishEx, TestStartEx, method,
};
use chrono::Local;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;

use crate::error::ClientError;
use crate::failure_cache::{DEFAULT_CAPACITY, FailureCache};
use crate::projects::{ProjectModel, strip_query};
use crate::stack_trace::filter_stack_trace;
use crate::test_path::resolve_test_path;

/// Title of every progress report the client opens.
pub const BUILD_SERVER_TASK: &str = "Build Server Task";
/// Telemetry event for `Log`-severity build messages.
pub const BUILD_LOG_EVENT: &str = "buildServerLog";

const COMPILE_REPORT_SEPARATOR: &str = "\n------\n";

/// Display names the server uses for synthetic suite starts; these are
/// not shown in the test explorer.
static SUITE_START_NAMES: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)^test suite '.+'$").expect("valid suite pattern"),
        Regex::new(r"(?i)^test\s+\w+\(.*\)\(\w+(\.\w+)*\)$").expect("valid executor pattern"),
    ]
});

#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub failure_cache_capacity: usize,
    pub filter_stack_traces: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            failure_cache_capacity: DEFAULT_CAPACITY,
            filter_stack_traces: false,
        }
    }
}

pub struct BuildEventClient {
    sink: Arc<dyn ClientSink>,
    failed_tasks: FailureCache,
    projects: Option<Arc<dyn ProjectModel>>,
    filter_stack_traces: bool,
}

impl BuildEventClient {
    pub fn new(sink: Arc<dyn ClientSink>) -> Self {
        Self::with_options(sink, ClientOptions::default())
    }

    pub fn with_options(sink: Arc<dyn ClientSink>, options: ClientOptions) -> Self {
        Self {
            sink,
            failed_tasks: FailureCache::new(options.failure_cache_capacity),
            projects: None,
            filter_stack_traces: options.filter_stack_traces,
        }
    }

    /// Enable project resync on `buildTarget/didChange`.
    pub fn with_projects(mut self, projects: Arc<dyn ProjectModel>) -> Self {
        self.projects = Some(projects);
        self
    }

    #[must_use]
    pub fn failed_tasks(&self) -> &FailureCache {
        &self.failed_tasks
    }

    /// Route one notification by method name.
    pub fn dispatch(&self, name: &str, params: Option<Value>) -> Result<(), ClientError> {
        match name {
            method::LOG_MESSAGE => self.on_build_log_message(decode(name, require(name, params)?)?),
            method::SHOW_MESSAGE => return Err(ClientError::Unimplemented(method::SHOW_MESSAGE)),
            method::PUBLISH_DIAGNOSTICS => {
                return Err(ClientError::Unimplemented(method::PUBLISH_DIAGNOSTICS));
            }
            method::TASK_START => self.on_build_task_start(decode(name, require(name, params)?)?)?,
            method::TASK_PROGRESS => {
                self.on_build_task_progress(decode(name, require(name, params)?)?);
            }
            method::TASK_FINISH => self.on_build_task_finish(decode(name, require(name, params)?)?)?,
            method::TARGET_DID_CHANGE => {
                self.on_build_target_did_change(&decode(name, require(name, params)?)?);
            }
            other => return Err(ClientError::UnknownNotification(other.to_string())),
        }
        Ok(())
    }

    pub fn on_build_log_message(&self, params: LogMessageParams) {
        if params.kind == MessageType::Log {
            self.send(ClientMessage::Telemetry(TelemetryEvent::message(
                BUILD_LOG_EVENT,
                params.message,
            )));
            return;
        }

        // Only errors belonging to a failed compile go to the build output.
        let after_failure = params.kind == MessageType::Error
            && params
                .task
                .as_ref()
                .is_some_and(|task| self.failed_tasks.contains(&task.id));
        if after_failure {
            self.send(ClientMessage::AppendBuildLog(params.message));
        } else {
            self.send(ClientMessage::AppendEventLog(params.message));
        }
    }

    pub fn on_build_task_start(&self, params: TaskStartParams) -> Result<(), ClientError> {
        match params.data_kind {
            Some(TaskDataKind::CompileTask) => {
                let now = Local::now().format("%Y-%m-%d %H:%M:%S");
                let message = params.message.unwrap_or_default();
                self.send(ClientMessage::AppendBuildLog(format!(
                    "> Build starts at {now}\n{message}"
                )));
            }
            Some(TaskDataKind::TestStart) => {
                let start: TestStartEx = decode("test-start data", params.data.unwrap_or_default())?;
                let parts = resolve_test_path(&start.test_name);
                let display_name = Some(start.test_name.display_name)
                    .filter(|name| !is_suite_start(name));
                self.send(ClientMessage::TestItemStatus {
                    parts,
                    status: JavaTestStatus::Running,
                    display_name,
                    stack_trace: None,
                });
            }
            _ => {
                let token = params.task_id.id;
                self.send(ClientMessage::ProgressCreate {
                    token: token.clone(),
                });
                self.send(ClientMessage::ProgressBegin {
                    token,
                    title: BUILD_SERVER_TASK.to_string(),
                    message: params.message,
                });
            }
        }
        Ok(())
    }

    pub fn on_build_task_progress(&self, params: TaskProgressParams) {
        if params.data_kind == Some(TaskDataKind::CompileTask) {
            self.send(ClientMessage::AppendBuildLog(
                params.message.unwrap_or_default(),
            ));
        } else {
            self.send(ClientMessage::ProgressReport {
                token: params.task_id.id,
                message: progress_label(params.message.as_deref()),
            });
        }
    }

    pub fn on_build_task_finish(&self, params: TaskFinishParams) -> Result<(), ClientError> {
        match params.data_kind {
            Some(TaskDataKind::CompileReport) => {
                let message = params.message.unwrap_or_default();
                self.send(ClientMessage::AppendBuildLog(format!(
                    "{message}{COMPILE_REPORT_SEPARATOR}"
                )));
                if params.status == StatusCode::Error {
                    tracing::debug!(task = %params.task_id, "Compile failed, remembering parents");
                    self.failed_tasks.extend(params.task_id.parents);
                }
            }
            Some(TaskDataKind::TestFinish) => {
                let finish: TestFinishEx = decode("test-finish data", params.data.unwrap_or_default())?;
                let status = JavaTestStatus::try_from(finish.status)?;
                let parts = resolve_test_path(&finish.test_name);
                let stack_trace = if self.filter_stack_traces {
                    finish.stack_trace.as_deref().map(filter_stack_trace)
                } else {
                    finish.stack_trace
                };
                self.send(ClientMessage::TestItemStatus {
                    parts,
                    status,
                    display_name: None,
                    stack_trace,
                });
            }
            Some(TaskDataKind::TestReport) => {
                self.send(ClientMessage::TestRunFinished {
                    status: params.status,
                    message: params.message,
                });
            }
            _ => {
                self.send(ClientMessage::ProgressEnd {
                    token: params.task_id.id,
                    message: progress_label(params.message.as_deref()),
                });
            }
        }
        Ok(())
    }

    /// Resync every distinct project owning a changed target.
    ///
    /// The resync runs on a spawned task so slow project updates never hold
    /// up the next notification; failures are logged there.
    pub fn on_build_target_did_change(&self, params: &DidChangeBuildTarget) {
        let Some(model) = &self.projects else {
            tracing::debug!("Build targets changed, no project model attached");
            return;
        };

        let projects: BTreeSet<String> = params
            .changes
            .iter()
            .filter_map(|change| match strip_query(&change.target.uri) {
                Ok(uri) => model.project_for_target(&uri),
                Err(e) => {
                    tracing::warn!("Ignoring malformed target URI {}: {e}", change.target.uri);
                    None
                }
            })
            .collect();
        if projects.is_empty() {
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            tracing::error!("No async runtime to resync {} project(s) on", projects.len());
            return;
        };
        let model = Arc::clone(model);
        runtime.spawn(async move {
            for project in projects {
                tracing::info!(%project, "Resyncing project after build target change");
                if let Err(e) = model.resync(project.clone()).await {
                    tracing::error!(%project, "Project resync failed: {e:#}");
                }
            }
        });
    }

    fn send(&self, message: ClientMessage) {
        self.sink.send(message);
    }
}

impl NotificationHandler for BuildEventClient {
    fn handle_notification(&self, method: &str, params: Option<Value>) -> anyhow::Result<()> {
        self.dispatch(method, params)?;
        Ok(())
    }
}

fn require(method: &str, params: Option<Value>) -> Result<Value, ClientError> {
    params.ok_or_else(|| ClientError::MissingParams(method.to_string()))
}

fn decode<T: DeserializeOwned>(what: &str, value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|source| ClientError::Decode {
        method: what.to_string(),
        source,
    })
}

fn is_suite_start(display_name: &str) -> bool {
    SUITE_START_NAMES
        .iter()
        .any(|pattern| pattern.is_match(display_name))
}

fn progress_label(message: Option<&str>) -> String {
    match message.map(str::trim) {
        Some(message) if !message.is_empty() => format!("{BUILD_SERVER_TASK} - {message}"),
        _ => BUILD_SERVER_TASK.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::mem;
    use std::sync::Mutex;
    use std::time::Duration;

    use buildlink_types::TaskId;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use url::Url;

    use super::*;
    use crate::projects::ResyncFuture;

    #[derive(Default)]
    struct Recorder {
        messages: Mutex<Vec<ClientMessage>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<ClientMessage> {
            mem::take(&mut *self.messages.lock().unwrap())
        }
    }

    impl ClientSink for Recorder {
        fn send(&self, message: ClientMessage) {
            self.messages.lock().unwrap().push(message);
        }
    }

    fn client() -> (BuildEventClient, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let client = BuildEventClient::new(Arc::clone(&recorder) as Arc<dyn ClientSink>);
        (client, recorder)
    }

    fn log(kind: MessageType, task: Option<&str>, message: &str) -> LogMessageParams {
        LogMessageParams {
            kind,
            task: task.map(TaskId::new),
            origin_id: None,
            message: message.to_string(),
        }
    }

    fn finish(task_id: TaskId, status: StatusCode, kind: Option<TaskDataKind>) -> TaskFinishParams {
        TaskFinishParams {
            task_id,
            event_time: None,
            message: Some("done".to_string()),
            status,
            data_kind: kind,
            data: None,
        }
    }

    fn start(id: &str, kind: Option<TaskDataKind>, data: Option<Value>) -> TaskStartParams {
        TaskStartParams {
            task_id: TaskId::new(id),
            event_time: None,
            message: Some("Running".to_string()),
            data_kind: kind,
            data,
        }
    }

    fn test_name_json(display: &str) -> Value {
        json!({
            "displayName": display,
            "methodName": "works",
            "parent": { "displayName": "FooTest", "className": "com.acme.FooTest" }
        })
    }

    #[test]
    fn log_severity_goes_to_telemetry() {
        let (client, recorder) = client();
        client.on_build_log_message(log(MessageType::Log, Some("t"), "noise"));
        assert_eq!(
            recorder.take(),
            [ClientMessage::Telemetry(TelemetryEvent::message(
                BUILD_LOG_EVENT,
                "noise"
            ))]
        );
    }

    #[test]
    fn messages_after_compile_failure_go_to_build_log() {
        let (client, recorder) = client();
        client
            .on_build_task_finish(finish(
                TaskId::new("compile").with_parents(["A", "B"]),
                StatusCode::Error,
                Some(TaskDataKind::CompileReport),
            ))
            .unwrap();
        assert_eq!(
            recorder.take(),
            [ClientMessage::AppendBuildLog("done\n------\n".to_string())]
        );

        client.on_build_log_message(log(MessageType::Error, Some("B"), "error: missing ;"));
        client.on_build_log_message(log(MessageType::Info, Some("C"), "configured"));
        client.on_build_log_message(log(MessageType::Warning, None, "no task"));
        assert_eq!(
            recorder.take(),
            [
                ClientMessage::AppendBuildLog("error: missing ;".to_string()),
                ClientMessage::AppendEventLog("configured".to_string()),
                ClientMessage::AppendEventLog("no task".to_string()),
            ]
        );
    }

    #[test]
    fn warnings_for_failed_tasks_stay_in_general_log() {
        let (client, recorder) = client();
        client
            .on_build_task_finish(finish(
                TaskId::new("compile").with_parents(["A", "B"]),
                StatusCode::Error,
                Some(TaskDataKind::CompileReport),
            ))
            .unwrap();
        recorder.take();

        client.on_build_log_message(log(MessageType::Warning, Some("B"), "warning: deprecated"));
        client.on_build_log_message(log(MessageType::Info, Some("A"), "compiling"));
        client.on_build_log_message(log(MessageType::Error, Some("A"), "error: boom"));
        assert_eq!(
            recorder.take(),
            [
                ClientMessage::AppendEventLog("warning: deprecated".to_string()),
                ClientMessage::AppendEventLog("compiling".to_string()),
                ClientMessage::AppendBuildLog("error: boom".to_string()),
            ]
        );
    }

    #[test]
    fn successful_compile_report_remembers_nothing() {
        let (client, recorder) = client();
        client
            .on_build_task_finish(finish(
                TaskId::new("compile").with_parents(["A"]),
                StatusCode::Ok,
                Some(TaskDataKind::CompileReport),
            ))
            .unwrap();
        assert!(client.failed_tasks().is_empty());
        recorder.take();

        client.on_build_log_message(log(MessageType::Info, Some("A"), "fine"));
        assert_eq!(
            recorder.take(),
            [ClientMessage::AppendEventLog("fine".to_string())]
        );
    }

    #[test]
    fn oldest_failure_is_forgotten_past_capacity() {
        let recorder = Arc::new(Recorder::default());
        let client = BuildEventClient::with_options(
            Arc::clone(&recorder) as Arc<dyn ClientSink>,
            ClientOptions {
                failure_cache_capacity: 2,
                filter_stack_traces: false,
            },
        );
        client
            .on_build_task_finish(finish(
                TaskId::new("c").with_parents(["A", "B", "C"]),
                StatusCode::Error,
                Some(TaskDataKind::CompileReport),
            ))
            .unwrap();
        assert!(!client.failed_tasks().contains("A"));
        assert!(client.failed_tasks().contains("B"));
        assert!(client.failed_tasks().contains("C"));
    }

    #[test]
    fn compile_task_start_writes_banner() {
        let (client, recorder) = client();
        client
            .on_build_task_start(start("c1", Some(TaskDataKind::CompileTask), None))
            .unwrap();
        let messages = recorder.take();
        let [ClientMessage::AppendBuildLog(text)] = messages.as_slice() else {
            panic!("unexpected messages: {messages:?}");
        };
        assert!(text.starts_with("> Build starts at "));
        assert!(text.ends_with("\nRunning"));
    }

    #[test]
    fn test_start_reports_running_with_display_name() {
        let (client, recorder) = client();
        let data = json!({ "displayName": "works()", "testName": test_name_json("works()") });
        client
            .on_build_task_start(start("t1", Some(TaskDataKind::TestStart), Some(data)))
            .unwrap();
        assert_eq!(
            recorder.take(),
            [ClientMessage::TestItemStatus {
                parts: vec!["com.acme.FooTest".to_string(), "works".to_string()],
                status: JavaTestStatus::Running,
                display_name: Some("works()".to_string()),
                stack_trace: None,
            }]
        );
    }

    #[test]
    fn suite_display_names_are_suppressed() {
        assert!(is_suite_start("Test suite 'com.acme.FooTest'"));
        assert!(is_suite_start("test works()(com.acme.FooTest)"));
        assert!(!is_suite_start("works()"));
        assert!(!is_suite_start("prefix Test suite 'x'"));

        let (client, recorder) = client();
        let display = "Test suite 'com.acme.FooTest'";
        let data = json!({ "displayName": display, "testName": test_name_json(display) });
        client
            .on_build_task_start(start("t1", Some(TaskDataKind::TestStart), Some(data)))
            .unwrap();
        let messages = recorder.take();
        assert!(matches!(
            messages.as_slice(),
            [ClientMessage::TestItemStatus { display_name: None, .. }]
        ));
    }

    #[test]
    fn other_task_start_opens_progress() {
        let (client, recorder) = client();
        client.on_build_task_start(start("task-9", None, None)).unwrap();
        assert_eq!(
            recorder.take(),
            [
                ClientMessage::ProgressCreate {
                    token: "task-9".to_string()
                },
                ClientMessage::ProgressBegin {
                    token: "task-9".to_string(),
                    title: BUILD_SERVER_TASK.to_string(),
                    message: Some("Running".to_string()),
                },
            ]
        );
    }

    #[test]
    fn progress_label_rules() {
        assert_eq!(progress_label(None), "Build Server Task");
        assert_eq!(progress_label(Some("  ")), "Build Server Task");
        assert_eq!(progress_label(Some("50%")), "Build Server Task - 50%");
    }

    #[test]
    fn task_progress_routes_by_kind() {
        let (client, recorder) = client();
        let progress = |kind, message: Option<&str>| TaskProgressParams {
            task_id: TaskId::new("p"),
            event_time: None,
            message: message.map(str::to_string),
            total: None,
            progress: None,
            unit: None,
            data_kind: kind,
            data: None,
        };
        client.on_build_task_progress(progress(Some(TaskDataKind::CompileTask), Some("javac")));
        client.on_build_task_progress(progress(None, None));
        client.on_build_task_progress(progress(None, Some("3/10")));
        assert_eq!(
            recorder.take(),
            [
                ClientMessage::AppendBuildLog("javac".to_string()),
                ClientMessage::ProgressReport {
                    token: "p".to_string(),
                    message: "Build Server Task".to_string()
                },
                ClientMessage::ProgressReport {
                    token: "p".to_string(),
                    message: "Build Server Task - 3/10".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_finish_maps_status_and_keeps_trace() {
        let (client, recorder) = client();
        let mut params = finish(TaskId::new("t"), StatusCode::Ok, Some(TaskDataKind::TestFinish));
        params.data = Some(json!({
            "displayName": "works()",
            "status": 2,
            "testName": test_name_json("works()"),
            "stackTrace": "java.lang.AssertionError\n\tat org.junit.Assert.fail(Assert.java:1)"
        }));
        client.on_build_task_finish(params).unwrap();
        assert_eq!(
            recorder.take(),
            [ClientMessage::TestItemStatus {
                parts: vec!["com.acme.FooTest".to_string(), "works".to_string()],
                status: JavaTestStatus::Failed,
                display_name: None,
                stack_trace: Some(
                    "java.lang.AssertionError\n\tat org.junit.Assert.fail(Assert.java:1)"
                        .to_string()
                ),
            }]
        );
    }

    #[test]
    fn stack_trace_filtering_is_opt_in() {
        let recorder = Arc::new(Recorder::default());
        let client = BuildEventClient::with_options(
            Arc::clone(&recorder) as Arc<dyn ClientSink>,
            ClientOptions {
                filter_stack_traces: true,
                ..ClientOptions::default()
            },
        );
        let mut params = finish(TaskId::new("t"), StatusCode::Ok, Some(TaskDataKind::TestFinish));
        params.data = Some(json!({
            "displayName": "works()",
            "status": 2,
            "testName": test_name_json("works()"),
            "stackTrace": "java.lang.AssertionError\n\tat org.junit.Assert.fail(Assert.java:1)"
        }));
        client.on_build_task_finish(params).unwrap();
        let messages = recorder.take();
        let [ClientMessage::TestItemStatus { stack_trace, .. }] = messages.as_slice() else {
            panic!("unexpected messages: {messages:?}");
        };
        assert_eq!(stack_trace.as_deref(), Some("java.lang.AssertionError"));
    }

    #[test]
    fn unknown_test_status_is_an_error() {
        let (client, recorder) = client();
        let mut params = finish(TaskId::new("t"), StatusCode::Ok, Some(TaskDataKind::TestFinish));
        params.data = Some(json!({
            "displayName": "works()",
            "status": 42,
            "testName": test_name_json("works()")
        }));
        let err = client.on_build_task_finish(params).unwrap_err();
        assert!(matches!(err, ClientError::UnsupportedTestStatus(42)));
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_report_finishes_run() {
        let (client, recorder) = client();
        client
            .on_build_task_finish(finish(
                TaskId::new("r"),
                StatusCode::Cancelled,
                Some(TaskDataKind::TestReport),
            ))
            .unwrap();
        assert_eq!(
            recorder.take(),
            [ClientMessage::TestRunFinished {
                status: StatusCode::Cancelled,
                message: Some("done".to_string()),
            }]
        );
    }

    #[test]
    fn other_task_finish_ends_progress() {
        let (client, recorder) = client();
        client
            .on_build_task_finish(finish(TaskId::new("task-9"), StatusCode::Ok, None))
            .unwrap();
        assert_eq!(
            recorder.take(),
            [ClientMessage::ProgressEnd {
                token: "task-9".to_string(),
                message: "Build Server Task - done".to_string(),
            }]
        );
    }

    #[test]
    fn dispatch_decodes_and_rejects() {
        let (client, recorder) = client();
        client
            .dispatch(
                method::LOG_MESSAGE,
                Some(json!({ "type": 3, "message": "hello" })),
            )
            .unwrap();
        assert_eq!(
            recorder.take(),
            [ClientMessage::AppendEventLog("hello".to_string())]
        );

        assert!(matches!(
            client.dispatch(method::SHOW_MESSAGE, Some(json!({}))),
            Err(ClientError::Unimplemented(_))
        ));
        assert!(matches!(
            client.dispatch(method::PUBLISH_DIAGNOSTICS, Some(json!({}))),
            Err(ClientError::Unimplemented(_))
        ));
        assert!(matches!(
            client.dispatch("build/mystery", None),
            Err(ClientError::UnknownNotification(_))
        ));
        assert!(matches!(
            client.dispatch(method::TASK_START, None),
            Err(ClientError::MissingParams(_))
        ));
        assert!(matches!(
            client.dispatch(method::TASK_START, Some(json!({ "taskId": 5 }))),
            Err(ClientError::Decode { .. })
        ));
    }

    struct FakeProjects {
        resynced: mpsc::UnboundedSender<String>,
    }

    impl ProjectModel for FakeProjects {
        fn project_for_target(&self, target: &Url) -> Option<String> {
            target
                .path_segments()
                .and_then(|mut segments| segments.next())
                .filter(|first| !first.is_empty())
                .map(str::to_string)
        }

        fn resync(&self, project: String) -> ResyncFuture {
            let tx = self.resynced.clone();
            Box::pin(async move {
                if project == "broken" {
                    anyhow::bail!("sync failed");
                }
                let _ = tx.send(project);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn target_change_resyncs_each_project_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (client, _recorder) = client();
        let client = client.with_projects(Arc::new(FakeProjects { resynced: tx }));

        client
            .dispatch(
                method::TARGET_DID_CHANGE,
                Some(json!({ "changes": [
                    { "target": { "uri": "file:///app/main?sourceset=main" } },
                    { "target": { "uri": "file:///app/test?sourceset=test" } },
                    { "target": { "uri": "file:///broken/x" } },
                    { "target": { "uri": "file:///lib/x" } },
                    { "target": { "uri": "::bad::" } }
                ]})),
            )
            .unwrap();

        let mut seen = Vec::new();
        while seen.len() < 2 {
            let project = timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            seen.push(project);
        }
        assert_eq!(seen, ["app", "lib"]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn target_change_without_runtime_is_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (client, _recorder) = client();
        let client = client.with_projects(Arc::new(FakeProjects { resynced: tx }));
        client.on_build_target_did_change(&DidChangeBuildTarget { changes: Vec::new() });
        client
            .dispatch(
                method::TARGET_DID_CHANGE,
                Some(json!({ "changes": [{ "target": { "uri": "file:///app/x" } }] })),
            )
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn handler_surfaces_errors_as_anyhow() {
        let (client, _recorder) = client();
        let err = client
            .handle_notification(method::SHOW_MESSAGE, None)
            .unwrap_err();
        assert!(err.to_string().contains("not implemented"));
    }
}
