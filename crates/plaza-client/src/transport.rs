//! WebSocket transport for the realtime channel.
//!
//! Provides [`ConnectedSocket`], a pair of channels bridged to a socket by an
//! internal task. This is a thin layer that just moves text frames; protocol
//! logic stays in the Sans-IO state machines.
//!
//! [`Connector`] abstracts how a socket is opened so the realtime task runs
//! unchanged over an in-memory transport in tests.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::mpsc, task::AbortHandle};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::error::TransportError;

/// Frames buffered in each direction.
const CHANNEL_CAPACITY: usize = 64;

/// Handle to an open realtime socket.
///
/// Text frames are sent and received via the channels. The socket closes
/// when `to_server` is dropped, when [`ConnectedSocket::stop`] is called, or
/// when the peer goes away; in every case `from_server` then yields `None`.
#[derive(Debug)]
pub struct ConnectedSocket {
    /// Send frames to the server.
    pub to_server: mpsc::Sender<String>,
    /// Receive frames from the server.
    pub from_server: mpsc::Receiver<String>,
    /// Abort handle of the I/O task.
    abort_handle: AbortHandle,
}

impl ConnectedSocket {
    /// Assemble a socket handle from its channels and the task that bridges
    /// them.
    pub fn new(
        to_server: mpsc::Sender<String>,
        from_server: mpsc::Receiver<String>,
        abort_handle: AbortHandle,
    ) -> Self {
        Self { to_server, from_server, abort_handle }
    }

    /// Stop the I/O task.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }

    /// Split into the outbound sender, inbound receiver and abort handle.
    pub fn into_parts(self) -> (mpsc::Sender<String>, mpsc::Receiver<String>, AbortHandle) {
        (self.to_server, self.from_server, self.abort_handle)
    }
}

/// Opens realtime sockets.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a socket to `url`.
    async fn connect(&self, url: &str) -> Result<ConnectedSocket, TransportError>;
}

/// [`Connector`] over WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<ConnectedSocket, TransportError> {
        let (stream, _response) =
            connect_async(url).await.map_err(|e| TransportError::Connection(e.to_string()))?;

        let (to_server_tx, to_server_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (from_server_tx, from_server_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        let handle = tokio::spawn(run_socket(stream, to_server_rx, from_server_tx));
        Ok(ConnectedSocket::new(to_server_tx, from_server_rx, handle.abort_handle()))
    }
}

/// Bridge channels and a WebSocket until either side goes away.
async fn run_socket(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut to_server: mpsc::Receiver<String>,
    from_server: mpsc::Sender<String>,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            outbound = to_server.recv() => {
                let Some(text) = outbound else {
                    // Owner dropped the sender: close politely
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };
                if let Err(error) = sink.send(Message::Text(text.into())).await {
                    tracing::debug!(%error, "realtime send failed");
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if from_server.send(text.as_str().to_owned()).await.is_err() {
                        break;
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "realtime socket closed by peer");
                    break;
                },
                // Pings are answered by tungstenite; binary frames are not part
                // of the protocol
                Some(Ok(_)) => {},
                Some(Err(error)) => {
                    tracing::debug!(%error, "realtime receive failed");
                    break;
                },
                None => break,
            },
        }
    }
}
