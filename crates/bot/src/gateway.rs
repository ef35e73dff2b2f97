//! Discord gateway connection.
//!
//! Keeps one websocket session alive: Hello, Identify, heartbeats, and
//! dispatch of `INTERACTION_CREATE` events to the ticket handler. The
//! session is re-established with exponential backoff until shutdown.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use ticketbot_core::{Interaction, TicketHandler};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// `GUILDS`; interactions are delivered without further intents.
const INTENTS: u64 = 1;

mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Connection closed: {0}")]
    Closed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Heartbeat not acknowledged")]
    HeartbeatTimeout,

    #[error("Invalid payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        GatewayError::Connection(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct Payload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

/// Event received from the gateway.
#[derive(Debug, PartialEq)]
pub enum GatewayEvent {
    Hello { heartbeat_interval_ms: u64 },
    Dispatch {
        sequence: Option<u64>,
        name: String,
        data: Value,
    },
    HeartbeatRequest,
    HeartbeatAck,
    Reconnect,
    InvalidSession,
    Other(u8),
}

pub fn parse_event(text: &str) -> Result<GatewayEvent, GatewayError> {
    let payload: Payload = serde_json::from_str(text)?;

    Ok(match payload.op {
        opcode::HELLO => {
            let interval = payload.d["heartbeat_interval"]
                .as_u64()
                .ok_or_else(|| GatewayError::Protocol("Hello without heartbeat_interval".into()))?;
            GatewayEvent::Hello {
                heartbeat_interval_ms: interval,
            }
        }
        opcode::DISPATCH => GatewayEvent::Dispatch {
            sequence: payload.s,
            name: payload
                .t
                .ok_or_else(|| GatewayError::Protocol("Dispatch without event name".into()))?,
            data: payload.d,
        },
        opcode::HEARTBEAT => GatewayEvent::HeartbeatRequest,
        opcode::HEARTBEAT_ACK => GatewayEvent::HeartbeatAck,
        opcode::RECONNECT => GatewayEvent::Reconnect,
        opcode::INVALID_SESSION => GatewayEvent::InvalidSession,
        other => GatewayEvent::Other(other),
    })
}

pub fn identify_payload(token: &str) -> Value {
    json!({
        "op": opcode::IDENTIFY,
        "d": {
            "token": token,
            "intents": INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "ticketbot",
                "device": "ticketbot",
            },
        },
    })
}

pub fn heartbeat_payload(sequence: Option<u64>) -> Value {
    json!({ "op": opcode::HEARTBEAT, "d": sequence })
}

/// Tracks whether the last heartbeat was acknowledged.
#[derive(Debug)]
struct Heartbeat {
    acked: bool,
}

impl Heartbeat {
    fn new() -> Self {
        Self { acked: true }
    }

    /// Called before sending a scheduled heartbeat.
    fn beat(&mut self) -> Result<(), GatewayError> {
        if !self.acked {
            return Err(GatewayError::HeartbeatTimeout);
        }
        self.acked = false;
        Ok(())
    }

    fn ack(&mut self) {
        self.acked = true;
    }
}

/// Gateway client feeding interactions to a [`TicketHandler`].
pub struct Gateway {
    url: String,
    token: String,
    handler: Arc<TicketHandler>,
}

impl Gateway {
    pub fn new(url: String, token: String, handler: Arc<TicketHandler>) -> Self {
        Self {
            url,
            token,
            handler,
        }
    }

    /// Run sessions until a shutdown signal arrives.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Gateway loop started");
        let mut backoff = INITIAL_BACKOFF;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Gateway received shutdown signal");
                    break;
                }
                result = self.run_session(&mut backoff) => {
                    match result {
                        Ok(()) => info!("Gateway asked for a new session"),
                        Err(e) => warn!("Gateway session ended: {}", e),
                    }
                }
            }

            debug!("Reconnecting to gateway in {:?}", backoff);
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Gateway received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = next_backoff(backoff);
        }

        info!("Gateway loop stopped");
    }

    /// One websocket session. `Ok` means the gateway asked us to reconnect.
    async fn run_session(&self, backoff: &mut Duration) -> Result<(), GatewayError> {
        let (stream, _) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = stream.split();

        let heartbeat_interval_ms = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => match parse_event(&text)? {
                    GatewayEvent::Hello {
                        heartbeat_interval_ms,
                    } => break heartbeat_interval_ms,
                    other => {
                        return Err(GatewayError::Protocol(format!(
                            "expected Hello, got {:?}",
                            other
                        )))
                    }
                },
                Some(Ok(Message::Close(frame))) => return Err(closed(frame)),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(GatewayError::Closed("stream ended".to_string())),
            }
        };

        send(&mut write, &identify_payload(&self.token)).await?;
        info!(
            "Gateway connected, heartbeat every {}ms",
            heartbeat_interval_ms
        );

        let period = Duration::from_millis(heartbeat_interval_ms.max(1));
        let mut heartbeat = tokio::time::interval(period);
        // First tick completes immediately
        heartbeat.tick().await;
        let mut sequence: Option<u64> = None;
        let mut tracker = Heartbeat::new();

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    tracker.beat()?;
                    send(&mut write, &heartbeat_payload(sequence)).await?;
                }
                frame = read.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(frame))) => return Err(closed(frame)),
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(GatewayError::Closed("stream ended".to_string())),
                    };

                    match parse_event(&text) {
                        Ok(GatewayEvent::Dispatch { sequence: seq, name, data }) => {
                            if seq.is_some() {
                                sequence = seq;
                            }
                            if name == "READY" {
                                info!("Gateway session ready");
                                *backoff = INITIAL_BACKOFF;
                            }
                            self.dispatch(&name, data);
                        }
                        Ok(GatewayEvent::HeartbeatRequest) => {
                            send(&mut write, &heartbeat_payload(sequence)).await?;
                        }
                        Ok(GatewayEvent::HeartbeatAck) => tracker.ack(),
                        Ok(GatewayEvent::Reconnect) | Ok(GatewayEvent::InvalidSession) => {
                            return Ok(());
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Skipping gateway payload: {}", e),
                    }
                }
            }
        }
    }

    fn dispatch(&self, name: &str, data: Value) {
        if name != "INTERACTION_CREATE" {
            debug!("Ignoring gateway event {}", name);
            return;
        }

        match serde_json::from_value::<Interaction>(data) {
            Ok(interaction) => {
                let handler = Arc::clone(&self.handler);
                tokio::spawn(async move {
                    handler.handle_interaction(&interaction).await;
                });
            }
            Err(e) => warn!("Failed to parse interaction: {}", e),
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

fn closed(frame: Option<tokio_tungstenite::tungstenite::protocol::CloseFrame<'static>>) -> GatewayError {
    match frame {
        Some(frame) => GatewayError::Closed(format!("{} {}", u16::from(frame.code), frame.reason)),
        None => GatewayError::Closed("no close frame".to_string()),
    }
}

async fn send<S>(write: &mut S, payload: &Value) -> Result<(), GatewayError>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    write.send(Message::Text(payload.to_string())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketbot_core::testing::{fixtures, MockPlatformClient};
    use tokio_test::assert_ok;

    #[test]
    fn test_parse_hello() {
        let event = parse_event(r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#)
            .unwrap();
        assert_eq!(
            event,
            GatewayEvent::Hello {
                heartbeat_interval_ms: 41250
            }
        );
    }

    #[test]
    fn test_parse_hello_without_interval_fails() {
        assert!(matches!(
            parse_event(r#"{"op":10,"d":{}}"#),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_interaction_dispatch() {
        let text = r#"{
            "op": 0,
            "s": 42,
            "t": "INTERACTION_CREATE",
            "d": {
                "id": "1",
                "application_id": "2",
                "type": 3,
                "token": "tok",
                "guild_id": "900",
                "channel_id": "901",
                "data": { "custom_id": "create_ticket", "component_type": 2 },
                "member": { "user": { "id": "U1", "username": "alice" }, "roles": [] }
            }
        }"#;

        let GatewayEvent::Dispatch {
            sequence,
            name,
            data,
        } = parse_event(text).unwrap()
        else {
            panic!("expected dispatch");
        };
        assert_eq!(sequence, Some(42));
        assert_eq!(name, "INTERACTION_CREATE");

        let interaction: Interaction = serde_json::from_value(data).unwrap();
        assert!(interaction.is_message_component());
        assert_eq!(interaction.custom_id(), Some("create_ticket"));
        assert_eq!(interaction.acting_user().unwrap().id, "U1");
    }

    #[test]
    fn test_parse_control_opcodes() {
        assert_eq!(
            parse_event(r#"{"op":1,"d":null}"#).unwrap(),
            GatewayEvent::HeartbeatRequest
        );
        assert_eq!(
            parse_event(r#"{"op":11}"#).unwrap(),
            GatewayEvent::HeartbeatAck
        );
        assert_eq!(
            parse_event(r#"{"op":7,"d":null}"#).unwrap(),
            GatewayEvent::Reconnect
        );
        assert_eq!(
            parse_event(r#"{"op":9,"d":false}"#).unwrap(),
            GatewayEvent::InvalidSession
        );
        assert_eq!(parse_event(r#"{"op":42}"#).unwrap(), GatewayEvent::Other(42));
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(matches!(parse_event("not json"), Err(GatewayError::Json(_))));
    }

    #[test]
    fn test_identify_payload() {
        let payload = identify_payload("secret");
        assert_eq!(payload["op"], 2);
        assert_eq!(payload["d"]["token"], "secret");
        assert_eq!(payload["d"]["intents"], 1);
    }

    #[test]
    fn test_heartbeat_payload() {
        assert_eq!(heartbeat_payload(None), json!({ "op": 1, "d": null }));
        assert_eq!(heartbeat_payload(Some(7)), json!({ "op": 1, "d": 7 }));
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let mut backoff = INITIAL_BACKOFF;
        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push(backoff.as_secs());
            backoff = next_backoff(backoff);
        }
        assert_eq!(seen, vec![1, 2, 4, 8, 16, 32, 60, 60]);
    }

    #[test]
    fn test_heartbeat_requires_ack_between_beats() {
        let mut tracker = Heartbeat::new();
        assert_ok!(tracker.beat());
        assert!(matches!(tracker.beat(), Err(GatewayError::HeartbeatTimeout)));

        let mut tracker = Heartbeat::new();
        for _ in 0..3 {
            assert_ok!(tracker.beat());
            tracker.ack();
        }
    }

    /// Gateway that says Hello and then never acknowledges heartbeats.
    async fn silent_gateway() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let hello = json!({ "op": 10, "d": { "heartbeat_interval": 20 } });
            ws.send(Message::Text(hello.to_string())).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        format!("ws://{}", addr)
    }

    #[tokio::test]
    async fn test_session_ends_without_heartbeat_ack() {
        let handler = Arc::new(fixtures::handler(Arc::new(MockPlatformClient::new())));
        let gateway = Gateway::new(silent_gateway().await, "token".to_string(), handler);

        let mut backoff = INITIAL_BACKOFF;
        let session = gateway.run_session(&mut backoff);
        let result = tokio::time::timeout(Duration::from_secs(5), session)
            .await
            .expect("session did not end");
        assert!(matches!(result, Err(GatewayError::HeartbeatTimeout)));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let handler = Arc::new(fixtures::handler(Arc::new(MockPlatformClient::new())));
        let gateway = Gateway::new("ws://127.0.0.1:9".to_string(), "token".to_string(), handler);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(gateway.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_ok!(shutdown_tx.send(()));

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("gateway did not stop")
            .unwrap();
    }
}
