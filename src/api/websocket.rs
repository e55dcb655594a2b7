//! Subscriber protocol over WebSocket.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

use crate::monitor::protocol::{parse_command, ClientCommand, ServerMessage};

use super::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscription = match state.monitor.subscribe().await {
        Ok(sub) => sub,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting subscriber");
            let _ = send_json(&mut sender, &ServerMessage::error(e.to_string())).await;
            return;
        }
    };
    let id = subscription.id;

    loop {
        tokio::select! {
            outbound = subscription.messages.recv() => {
                // The monitor dropped us or shut down.
                let Some(message) = outbound else { break };
                if let Err(e) = send_json(&mut sender, &message).await {
                    tracing::debug!(subscriber = id, error = %e, "Subscriber send failed");
                    break;
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let command = match decode(text.as_str()) {
                            Ok(command) => command,
                            Err(reply) => {
                                if send_json(&mut sender, &reply).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                        };
                        if let Err(e) = state.monitor.command(id, command).await {
                            let _ = send_json(&mut sender, &ServerMessage::error(e.to_string())).await;
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(subscriber = id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }
        }
    }

    state.monitor.unsubscribe(id).await;
}

/// A malformed command becomes an `error` reply; the connection stays open.
fn decode(text: &str) -> Result<ClientCommand, ServerMessage> {
    parse_command(text).map_err(|e| {
        tracing::debug!(error = %e, "Malformed subscriber message");
        ServerMessage::error(e.to_string())
    })
}

async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> eyre::Result<()> {
    let json = serde_json::to_string(message)?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| eyre::eyre!("Failed to send to subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_command() {
        assert_eq!(decode(r#"{"command":"force_analysis"}"#).unwrap(), ClientCommand::ForceAnalysis);
    }

    #[test]
    fn test_decode_malformed_replies_error() {
        let reply = decode("{\"command\":").unwrap_err();
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "error");
        assert!(json["message"].as_str().unwrap().starts_with("Invalid command"));
    }
}
