//! Connection handling logic for WebSocket clients.
//!
//! This module manages the lifecycle of individual relay connections:
//! WebSocket handshake, registration and announcement, message relaying,
//! and departure.

use crate::{
    connection::ClientId,
    error::ServerError,
    messaging::{route_binary_message, route_client_message},
    state::SharedRelayState,
};
use futures::{SinkExt, StreamExt};
use futures_util::stream::SplitSink;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{
    accept_async_with_config,
    tungstenite::{protocol::WebSocketConfig, Message},
    WebSocketStream,
};
use tracing::{debug, trace, warn};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// How long a closing client gets to take the relay's close reply.
const CLOSE_REPLY_TIMEOUT: Duration = Duration::from_secs(1);

/// Handles a single client connection from handshake to departure.
///
/// # Connection Flow
///
/// 1. Perform the WebSocket handshake
/// 2. Register with the relay state, which queues `I<id>` for this client
///    and broadcasts `J<id>` to everyone else
/// 3. Relay every inbound frame until the client closes or the transport fails,
///    answering a client close with a close reply
/// 4. Broadcast `L<id>`, clear the score entry and unregister; a connection
///    whose id was since handed to a newer one is unregistered silently
///
/// Outgoing frames are drained from an unbounded queue by a dedicated writer,
/// so a slow client never blocks the relay. When the writer stops (socket
/// error or close) the queue closes with it and broadcasts skip this client.
///
/// # Returns
///
/// `Ok(())` once the connection has been cleaned up, or a `ServerError` if
/// the handshake failed.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: SharedRelayState,
    max_message_size: usize,
) -> Result<(), ServerError> {
    let ws_config = WebSocketConfig::default()
        .max_message_size(Some(max_message_size))
        .max_frame_size(Some(max_message_size));
    let ws_stream = accept_async_with_config(stream, Some(ws_config))
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let registration = state.lock().await.connect(addr, outbound_tx);
    let Some(registration) = registration else {
        let _ = ws_sender.close().await;
        return Ok(());
    };
    let id = registration.id;
    let session = registration.session;

    let incoming_task = {
        let state = state.clone();
        async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let mut relay = state.lock().await;
                        route_client_message(&mut relay, id, session, text.as_str());
                    }
                    Ok(frame @ Message::Binary(_)) => {
                        let mut relay = state.lock().await;
                        route_binary_message(&mut relay, id, session, frame);
                    }
                    Ok(Message::Close(frame)) => {
                        debug!("🔌 Client {} requested close: {:?}", id, frame);
                        // tungstenite queued the close reply; the next read
                        // flushes it and then reports the stream as ended
                        if timeout(CLOSE_REPLY_TIMEOUT, ws_receiver.next()).await.is_err() {
                            debug!("Client {} did not take the close reply in time", id);
                        }
                        break;
                    }
                    Ok(Message::Ping(_)) => {
                        // tungstenite queues the pong itself
                        trace!("🏓 Ping from client {}", id);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("WebSocket error for client {}: {}", id, e);
                        break;
                    }
                }
            }
        }
    };

    let outgoing_task = write_outbound(ws_sender, outbound_rx, id);

    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    state.lock().await.disconnect(id, session);
    Ok(())
}

/// Drains queued frames into the socket until either side gives up.
async fn write_outbound(mut ws_sender: WsSink, mut outbound: mpsc::UnboundedReceiver<Message>, id: ClientId) {
    while let Some(message) = outbound.recv().await {
        let closing = message.is_close();
        if let Err(e) = ws_sender.send(message).await {
            debug!("Failed to send to client {}: {}", id, e);
            break;
        }
        if closing {
            break;
        }
    }
    outbound.close();
}
