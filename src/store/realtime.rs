//! Realtime change notifications over a Phoenix-style websocket.
//!
//! The managed database pushes `postgres_changes` messages for every
//! insert/update/delete on the subscribed table. Only the event kind is
//! forwarded; consumers re-fetch the full list themselves.

use super::ChangeFeed;
use crate::error::{SurveyError, SurveyResult};
use crate::models::ChangeKind;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info, warn};

/// Interval between keep-alive heartbeats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Build the websocket endpoint from the REST base URL.
pub fn realtime_url(base_url: &str, api_key: &str) -> SurveyResult<String> {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        return Err(SurveyError::Network(format!(
            "store url must start with http:// or https://: {}",
            base_url
        )));
    };

    let mut url = Url::parse(&format!("{}/realtime/v1/websocket", ws_base))
        .map_err(|e| SurveyError::Network(format!("invalid realtime url: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("apikey", api_key)
        .append_pair("vsn", "1.0.0");

    Ok(url.to_string())
}

/// Channel topic for a table in the public schema.
pub fn topic_for(table: &str) -> String {
    format!("realtime:public:{}", table)
}

/// Join request subscribing to every change on `table`.
pub fn join_message(table: &str, api_key: &str) -> Value {
    json!({
        "topic": topic_for(table),
        "event": "phx_join",
        "payload": {
            "config": {
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": table }
                ]
            },
            "access_token": api_key
        },
        "ref": "1",
        "join_ref": "1"
    })
}

fn heartbeat_message(msg_ref: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string()
    })
}

/// Extract the change kind from an incoming frame, if it is one.
pub fn parse_change(text: &str, topic: &str) -> Option<ChangeKind> {
    let value: Value = serde_json::from_str(text).ok()?;
    if value["topic"].as_str() != Some(topic) {
        return None;
    }

    match value["event"].as_str()? {
        "postgres_changes" => value["payload"]["data"]["type"].as_str()?.parse().ok(),
        "INSERT" | "UPDATE" | "DELETE" => value["event"].as_str()?.parse().ok(),
        "phx_reply" => {
            if value["payload"]["status"].as_str() != Some("ok") {
                warn!("Realtime join rejected: {}", value["payload"]);
            }
            None
        }
        "phx_error" => {
            warn!("Realtime channel error: {}", value["payload"]);
            None
        }
        _ => None,
    }
}

/// Open the websocket, join the table channel and start forwarding events.
pub async fn connect(base_url: &str, api_key: &str, table: &str) -> SurveyResult<ChangeFeed> {
    let url = realtime_url(base_url, api_key)?;
    let (socket, response) = connect_async(url.as_str()).await.map_err(|e| {
        error!("Realtime connection failed: {}", e);
        SurveyError::Network(format!("realtime connect: {}", e))
    })?;
    info!("Realtime connected: {}", response.status());

    let (mut write, mut read) = socket.split();
    write
        .send(Message::Text(join_message(table, api_key).to_string()))
        .await
        .map_err(|e| SurveyError::Network(format!("realtime join: {}", e)))?;

    let topic = topic_for(table);
    let (tx, rx) = mpsc::unbounded_channel();

    let worker = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut msg_ref: u64 = 1;

        loop {
            tokio::select! {
                _ = tx.closed() => {
                    debug!("Change listener gone, leaving {}", topic);
                    break;
                }
                _ = heartbeat.tick() => {
                    msg_ref += 1;
                    let frame = Message::Text(heartbeat_message(msg_ref).to_string());
                    if let Err(e) = write.send(frame).await {
                        warn!("Realtime heartbeat failed: {}", e);
                        break;
                    }
                }
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(kind) = parse_change(&text, &topic) {
                            debug!("Realtime {:?} on {}", kind, topic);
                            if tx.send(kind).is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(reason) = frame {
                            info!("Realtime socket closed: {}", reason);
                        }
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("Realtime socket error: {}", e);
                        break;
                    }
                    None => break,
                },
            }
        }

        let _ = write.close().await;
    });

    Ok(ChangeFeed::new(rx, Some(worker)))
}
