use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info};

use crate::AppState;

/// How long the writer may take to flush queued frames and the close reply
/// after the client is gone from the relay.
const WRITER_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Drive one WebSocket client for its whole lifetime.
///
/// The client is registered (and replayed history) before its first frame is
/// read. Inbound frames are handed to the relay in order; a separate task
/// drains the client's outbound queue into the socket.
pub async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    state.metrics.connection_opened();
    let (client_id, mut outbound) = state.relay.connect().await;
    if state.relay.keeps_history() {
        state.metrics.history_replayed();
    }
    info!(client = %client_id, "Client connected");

    // Ends once the relay drops this client's queue, then closes the socket
    let mut writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                state.metrics.message_received();
                match state.relay.handle_message(client_id, text.as_str()).await {
                    Ok(delivered) => state.metrics.message_broadcast(delivered),
                    Err(e) if e.is_malformed() => state.metrics.message_dropped(),
                    Err(e) => debug!(client = %client_id, "Relay error: {}", e),
                }
            }
            Ok(Message::Binary(_)) => {
                debug!(client = %client_id, "Binary messages not supported");
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Ok(_) => {}
            Err(e) => {
                // Transport failure counts as a disconnect
                state.metrics.transport_error();
                debug!(client = %client_id, "WebSocket receive error: {}", e);
                break;
            }
        }
    }

    state.relay.disconnect(client_id).await;
    if tokio::time::timeout(WRITER_CLOSE_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        debug!(client = %client_id, "Writer did not finish in time, aborting");
        writer.abort();
    }
    state.metrics.connection_closed();
    info!(client = %client_id, "Client disconnected");
}
