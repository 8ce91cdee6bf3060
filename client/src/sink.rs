use buildlink_types::{ClientMessage, ClientSink};
use tokio::sync::mpsc;

/// Forwards client messages into an unbounded channel; never blocks.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ClientMessage>,
}

impl ChannelSink {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ClientSink for ChannelSink {
    fn send(&self, message: ClientMessage) {
        if self.tx.send(message).is_err() {
            tracing::trace!("Client message dropped, receiver closed");
        }
    }
}
