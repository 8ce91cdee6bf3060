//! Point-to-point transport between the IDE-side client and the build server.
//!
//! The client generates a random endpoint name, publishes it to the peer,
//! then keeps dialing until the peer has created the endpoint or the retry
//! budget runs out:
//!
//! ```text
//! generate_endpoint() -> WillConnect(name) -> dial, sleep, dial, ... -> Connection
//!                                                   |
//!                                                   v
//!                                  PipeReader / PipeWriter (1 KiB blocks)
//! ```

mod connector;
mod endpoint;
mod error;
mod stream;

pub use connector::{
    CONNECT_ATTEMPTS_EVENT, Connection, Connector, Dial, MAX_ATTEMPTS, PlatformDialer,
    RETRY_INTERVAL, RetryPolicy,
};
pub use endpoint::{MIN_RANDOM_CHARS, PipeEndpoint, SocketNamer, generate_endpoint};
pub use error::TransportError;
pub use stream::{BLOCK_SIZE, PipeReader, PipeStream, PipeWriter};
