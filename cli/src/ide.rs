//! The IDE side of the bridge: JSON-RPC frames over our own stdin/stdout.

use buildlink_link::codec::{FrameReader, FrameWriter};
use buildlink_types::ClientMessage;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Drain client messages onto `out` as `Content-Length` frames.
///
/// Ends when every sink is dropped or the IDE stops reading.
pub fn spawn_writer<W>(
    mut messages: mpsc::UnboundedReceiver<ClientMessage>,
    out: W,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut writer = FrameWriter::new(out);
        while let Some(message) = messages.recv().await {
            if let Err(e) = writer.write_frame(&message.to_notification()).await {
                tracing::warn!("IDE output closed: {e:#}");
                return;
            }
        }
        tracing::debug!("Client message stream ended");
    })
}

/// Read frames from the IDE until it closes its end.
///
/// Nothing the IDE sends is acted on yet; end of input is the signal to shut
/// the session down.
pub async fn wait_for_eof<R: AsyncRead + Unpin>(input: R) {
    let mut reader = FrameReader::new(input);
    loop {
        match reader.read_frame().await {
            Ok(Some(frame)) => tracing::trace!(%frame, "Ignoring IDE frame"),
            Ok(None) => {
                tracing::info!("IDE closed stdin");
                return;
            }
            Err(e) => {
                tracing::warn!("Unreadable IDE input: {e:#}");
                return;
            }
        }
    }
}
