//! Thin gateway websocket session feeding normalized chat events into the
//! bridge runtime.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use stitch_core::events::ChatEvent;

use crate::gateway_event::normalize_dispatch;

const OP_DISPATCH: u64 = 0;
const OP_HEARTBEAT: u64 = 1;
const OP_IDENTIFY: u64 = 2;
const OP_RECONNECT: u64 = 7;
const OP_INVALID_SESSION: u64 = 9;
const OP_HELLO: u64 = 10;

/// Guilds + guild messages + message content.
pub const DEFAULT_GATEWAY_INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 15);

#[derive(Clone)]
pub struct DiscordGatewayConfig {
    pub gateway_url: String,
    pub bot_token: String,
    pub intents: u64,
    pub reconnect_delay: Duration,
}

/// Runs the gateway session until shutdown is requested, reconnecting with
/// a fixed delay after socket errors.
pub async fn run_discord_gateway(
    config: DiscordGatewayConfig,
    events_tx: mpsc::Sender<ChatEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    loop {
        if *shutdown_rx.borrow() {
            return Ok(());
        }
        match run_socket_session(&config, &events_tx, &mut shutdown_rx).await {
            Ok(()) => {
                println!("issue bridge gateway shutdown requested");
                return Ok(());
            }
            Err(error) => {
                eprintln!("issue bridge gateway session error: {error:#}");
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return Ok(());
                }
            }
        }
    }
}

async fn run_socket_session(
    config: &DiscordGatewayConfig,
    events_tx: &mpsc::Sender<ChatEvent>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<()> {
    let (socket, _) = connect_async(config.gateway_url.as_str())
        .await
        .context("failed to open gateway connection")?;
    let (mut sink, mut stream) = socket.split();

    // The first frame is hello with the heartbeat cadence.
    let hello = read_payload(&mut stream)
        .await?
        .ok_or_else(|| anyhow!("gateway closed before hello"))?;
    if hello.get("op").and_then(Value::as_u64) != Some(OP_HELLO) {
        return Err(anyhow!("expected gateway hello, got {hello}"));
    }
    let heartbeat_interval_ms = hello
        .get("d")
        .and_then(|d| d.get("heartbeat_interval"))
        .and_then(Value::as_u64)
        .unwrap_or(41_250);

    let identify = json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": config.bot_token,
            "intents": config.intents,
            "properties": {"os": "linux", "browser": "stitch", "device": "stitch"},
        },
    });
    sink.send(WsMessage::text(identify.to_string()))
        .await
        .context("failed to send gateway identify")?;
    println!("issue bridge gateway connected");

    let mut heartbeat = tokio::time::interval(Duration::from_millis(heartbeat_interval_ms.max(1)));
    heartbeat.tick().await;
    let mut last_sequence: Option<u64> = None;

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return Ok(());
                }
            }
            _ = heartbeat.tick() => {
                let payload = json!({ "op": OP_HEARTBEAT, "d": last_sequence });
                sink.send(WsMessage::text(payload.to_string()))
                    .await
                    .context("failed to send gateway heartbeat")?;
            }
            frame = stream.next() => {
                let Some(frame) = frame else {
                    return Err(anyhow!("gateway connection closed"));
                };
                let frame = frame.context("gateway read failed")?;
                let Some(payload) = parse_frame(frame)? else {
                    continue;
                };
                if let Some(sequence) = payload.get("s").and_then(Value::as_u64) {
                    last_sequence = Some(sequence);
                }
                match payload.get("op").and_then(Value::as_u64) {
                    Some(OP_DISPATCH) => {
                        let event_type = payload
                            .get("t")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let data = payload.get("d").cloned().unwrap_or(Value::Null);
                        match normalize_dispatch(&event_type, &data) {
                            Ok(Some(event)) => {
                                if events_tx.send(event).await.is_err() {
                                    // Runtime is gone; stop the session.
                                    return Ok(());
                                }
                            }
                            Ok(None) => {}
                            Err(error) => {
                                eprintln!(
                                    "issue bridge dropped malformed {event_type} dispatch: {error:#}"
                                );
                            }
                        }
                    }
                    Some(OP_HEARTBEAT) => {
                        let payload = json!({ "op": OP_HEARTBEAT, "d": last_sequence });
                        sink.send(WsMessage::text(payload.to_string()))
                            .await
                            .context("failed to answer gateway heartbeat request")?;
                    }
                    Some(OP_RECONNECT) | Some(OP_INVALID_SESSION) => {
                        return Err(anyhow!("gateway requested reconnect"));
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn read_payload<S>(stream: &mut S) -> Result<Option<Value>>
where
    S: StreamExt<Item = std::result::Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    loop {
        let Some(frame) = stream.next().await else {
            return Ok(None);
        };
        let frame = frame.context("gateway read failed")?;
        if let Some(payload) = parse_frame(frame)? {
            return Ok(Some(payload));
        }
    }
}

fn parse_frame(frame: WsMessage) -> Result<Option<Value>> {
    match frame {
        WsMessage::Text(text) => {
            let payload: Value =
                serde_json::from_str(text.as_str()).context("malformed gateway frame")?;
            Ok(Some(payload))
        }
        WsMessage::Close(_) => Err(anyhow!("gateway sent close frame")),
        _ => Ok(None),
    }
}
