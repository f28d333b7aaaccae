use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use atelier_types::api::Claims;
use atelier_types::events::{ClientEvent, EventReply, ServerEvent};

use crate::registry::Outbound;
use crate::relay::Relay;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Drive one authenticated WebSocket connection. The credential was already
/// verified at the HTTP upgrade layer, so the handle is registered right
/// away and a `ready` frame is pushed. Disconnect — ours or theirs —
/// unregisters the handle before this function returns.
pub async fn handle_socket(socket: WebSocket, relay: Relay, claims: Claims) {
    let (mut sender, mut receiver) = socket.split();
    let user_id = claims.sub;
    let handle = Uuid::new_v4();

    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    relay.registry().register(handle, user_id, tx.clone()).await;

    info!("{} ({}) connected on handle {}", claims.email, user_id, handle);

    let ready = ServerEvent::Ready { user_id };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        relay.registry().unregister(handle).await;
        return;
    }

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Writer task: drains the per-connection queue (replies + fan-out)
    // into the socket, interleaved with heartbeat pings.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let frame = match frame {
                        Some(frame) => frame,
                        None => break,
                    };
                    let text = match frame {
                        Outbound::Event(event) => serde_json::to_string(&event).unwrap(),
                        Outbound::Reply(reply) => serde_json::to_string(&reply).unwrap(),
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader task: events are handled one at a time, so two sends from the
    // same handle persist in submission order.
    let relay_recv = relay.clone();
    let email_recv = claims.email.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let reply = match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => dispatch(&relay_recv, handle, event).await,
                        Err(e) => {
                            warn!(
                                "{} ({}) bad event: {} -- raw: {}",
                                email_recv,
                                user_id,
                                e,
                                snippet(&text, 200)
                            );
                            EventReply::err("invalid event")
                        }
                    };
                    if tx.send(Outbound::Reply(reply)).is_err() {
                        break;
                    }
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Synchronous with teardown: no fan-out can reach this handle afterwards.
    relay.registry().unregister(handle).await;
    info!("{} ({}) disconnected from gateway", claims.email, user_id);
}

/// Truncate client-supplied text for logging without slicing through a
/// multi-byte character.
fn snippet(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Route one inbound event to the relay. Failures become `{error}` replies
/// for this connection only; the loop keeps running.
async fn dispatch(relay: &Relay, handle: Uuid, event: ClientEvent) -> EventReply {
    let result = match event {
        ClientEvent::SendMessage {
            recipient_id,
            kind,
            content,
            order_id,
            metadata,
        } => {
            relay
                .send(handle, recipient_id, kind, content, order_id, metadata)
                .await
        }
        ClientEvent::MarkAsRead { message_id } => match relay.registry().lookup(handle).await {
            Some(requester_id) => relay.mark_as_read(message_id, requester_id).await,
            None => Err(crate::error::GatewayError::Unauthorized),
        },
    };

    match result {
        Ok(message) => EventReply::ok(message),
        Err(e) => {
            warn!("event on handle {} failed: {}", handle, e);
            EventReply::err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_never_splits_a_character() {
        // "é" is two bytes; a cap of 5 falls inside the third one.
        let text = "ééé";
        assert_eq!(snippet(text, 5), "éé");
        assert_eq!(snippet(text, 6), "ééé");
        assert_eq!(snippet(text, 100), "ééé");

        let garbage = format!("{{\"event\": \"…{}\"", "🧵".repeat(100));
        let cut = snippet(&garbage, 200);
        assert!(cut.len() <= 200);
        assert!(garbage.starts_with(cut));
    }
}
