//! JSON-RPC link between buildlink and a build server.
//!
//! [`RpcLink`] runs over any connected byte stream (the transport pipe or a
//! child's stdio), routes responses to waiting callers, hands notifications to
//! a [`NotificationHandler`] in arrival order and answers server-initiated
//! requests with "method not found".

pub mod codec;

mod launcher;
mod link;
mod protocol;

pub use launcher::{ChildServer, LaunchSpec};
pub use link::{
    BuildServer, CloseReason, LinkEvent, LinkOptions, NotificationHandler, REQUEST_TIMEOUT,
    RpcLink, SHUTDOWN_TIMEOUT,
};
pub use protocol::{BuildTarget, JSONRPC_VERSION, METHOD_NOT_FOUND};
