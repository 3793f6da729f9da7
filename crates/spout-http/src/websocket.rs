//! Websocket log streaming.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use spout_attach::Subscription;
use spout_logs::{LogRecord, TypeFilter};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Streams records to an upgraded connection as JSON text frames.
///
/// Runs until the subscription ends, a frame cannot be written or the
/// client closes; in every case the listener is unregistered before
/// returning.
pub async fn stream_records(
    socket: WebSocket,
    records: mpsc::Receiver<Arc<LogRecord>>,
    subscription: Subscription,
    types: TypeFilter,
) {
    let (mut sender, mut receiver) = socket.split();

    let ended = tokio::select! {
        ended = forward_records(&mut sender, records, &types) => ended,
        () = wait_for_close(&mut receiver) => {
            debug!(listener = subscription.id(), "websocket client went away");
            false
        }
    };

    subscription.cancel();
    if ended {
        if let Err(e) = sender.send(Message::Close(None)).await {
            debug!(error = %e, "websocket close failed");
        }
    }
    debug!(listener = subscription.id(), "websocket stream closed");
}

/// Returns true when the record channel ended, false on a write failure.
async fn forward_records(
    sender: &mut SplitSink<WebSocket, Message>,
    mut records: mpsc::Receiver<Arc<LogRecord>>,
    types: &TypeFilter,
) -> bool {
    while let Some(record) = records.recv().await {
        if !types.accepts(record.stream) {
            continue;
        }
        let json = match serde_json::to_string(&*record) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to encode log record");
                continue;
            }
        };
        if sender.send(Message::Text(json.into())).await.is_err() {
            return false;
        }
    }
    true
}

async fn wait_for_close(receiver: &mut SplitStream<WebSocket>) {
    while let Some(Ok(message)) = receiver.next().await {
        if matches!(message, Message::Close(_)) {
            break;
        }
    }
}
