//! Build event client.
//!
//! Turns build server notifications into IDE commands: build log output,
//! work-done progress, test explorer updates and telemetry. Compile failures
//! are remembered in a small [`FailureCache`] so the log lines that follow them
//! land in the build output instead of the general log.

mod build_client;
mod error;
mod failure_cache;
mod projects;
mod sink;
mod stack_trace;
mod test_path;

pub use build_client::{BUILD_LOG_EVENT, BUILD_SERVER_TASK, BuildEventClient, ClientOptions};
pub use error::ClientError;
pub use failure_cache::{DEFAULT_CAPACITY, FailureCache};
pub use projects::{ProjectModel, ResyncFuture, WorkspaceRoots, strip_query};
pub use sink::ChannelSink;
pub use stack_trace::filter_stack_trace;
pub use test_path::resolve_test_path;
