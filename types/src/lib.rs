//! Core protocol types for buildlink.
//!
//! This crate holds the build server protocol payloads the client consumes,
//! the test identity records carried inside them, and the commands the client
//! emits toward the IDE. No IO, no async.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod bsp;
mod client;
mod test_name;

pub use bsp::{
    BuildTargetEvent, BuildTargetIdentifier, DidChangeBuildTarget, LogMessageParams, MessageType,
    StatusCode, TaskDataKind, TaskFinishParams, TaskId, TaskProgressParams, TaskStartParams,
    UnknownCodeError, method,
};
pub use client::{ClientMessage, ClientSink, TelemetryEvent, command};
pub use test_name::{
    JavaTestStatus, TestFinishEx, TestName, TestStartEx, TestStatus, UnsupportedTestStatus,
};
