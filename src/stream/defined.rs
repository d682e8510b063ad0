//! Trade events from the Defined realtime API over the
//! `graphql-transport-ws` protocol.

use alloy::primitives::Address;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::{net::TcpStream, sync::mpsc, time::timeout};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        http::{HeaderValue, header::SEC_WEBSOCKET_PROTOCOL},
    },
};
use tokio_util::sync::CancellationToken;

use super::traits::{EventStream, EventStreamProvider, StreamError, StreamItem};
use crate::{
    config::StreamConfig,
    models::{TradeEvent, TradeKind},
    providers::value_to_decimal,
};

const SUBPROTOCOL: &str = "graphql-transport-ws";
const SUBSCRIPTION_ID: &str = "1";
const STREAM_BUFFER: usize = 256;

const CREATE_EVENTS_QUERY: &str = r#"subscription CreateEvents($id: String) {
  onCreateEvents(id: $id) {
    events {
      eventDisplayType
      maker
      transactionHash
      data {
        ... on SwapEventData {
          amount0Out
          amount1Out
          priceBaseTokenTotal
          priceUsdTotal
        }
      }
    }
  }
}"#;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSwapData {
    amount0_out: Option<Value>,
    amount1_out: Option<Value>,
    price_base_token_total: Option<Value>,
    price_usd_total: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    event_display_type: Option<String>,
    maker: Option<String>,
    transaction_hash: String,
    data: Option<RawSwapData>,
}

fn value_to_string(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

impl From<RawEvent> for TradeEvent {
    fn from(raw: RawEvent) -> Self {
        let kind = raw.event_display_type.as_deref().map_or(TradeKind::Other, TradeKind::from_display_type);
        let decimal = |value: Option<&Value>| value.and_then(value_to_decimal).unwrap_or(Decimal::ZERO);
        let data = raw.data.as_ref();

        TradeEvent {
            kind,
            maker: raw.maker.unwrap_or_default(),
            tx_hash: raw.transaction_hash,
            amount0_out: data.and_then(|d| value_to_string(&d.amount0_out)),
            amount1_out: data.and_then(|d| value_to_string(&d.amount1_out)),
            base_total: decimal(data.and_then(|d| d.price_base_token_total.as_ref())),
            usd_total: decimal(data.and_then(|d| d.price_usd_total.as_ref())),
        }
    }
}

/// A decoded server frame.
#[derive(Debug)]
enum ServerMessage {
    ConnectionAck,
    Next(Vec<TradeEvent>),
    Error(String),
    Complete,
    Ping,
    Ignored,
}

fn parse_server_message(text: &str) -> Result<ServerMessage, StreamError> {
    let frame: Value =
        serde_json::from_str(text).map_err(|e| StreamError::Protocol(e.to_string()))?;
    let kind = frame.get("type").and_then(Value::as_str).unwrap_or_default();

    Ok(match kind {
        "connection_ack" => ServerMessage::ConnectionAck,
        "ping" => ServerMessage::Ping,
        "complete" => ServerMessage::Complete,
        "error" => ServerMessage::Error(frame.get("payload").map(Value::to_string).unwrap_or_default()),
        "next" => {
            let payload = frame.get("payload").unwrap_or(&Value::Null);
            if let Some(errors) = payload.get("errors").filter(|e| !e.is_null()) {
                return Ok(ServerMessage::Error(errors.to_string()));
            }
            let events = payload
                .pointer("/data/onCreateEvents/events")
                .cloned()
                .unwrap_or(Value::Array(vec![]));
            let raw: Vec<RawEvent> = serde_json::from_value(events)
                .map_err(|e| StreamError::Protocol(format!("malformed events: {e}")))?;
            ServerMessage::Next(raw.into_iter().map(TradeEvent::from).collect())
        }
        _ => ServerMessage::Ignored,
    })
}

fn text(frame: Value) -> Message {
    Message::Text(frame.to_string())
}

async fn wait_for_ack(ws: &mut WsStream) -> Result<(), StreamError> {
    while let Some(message) = ws.next().await {
        match message.map_err(|e| StreamError::Transport(e.to_string()))? {
            Message::Text(body) => match parse_server_message(&body)? {
                ServerMessage::ConnectionAck => return Ok(()),
                ServerMessage::Ping => {
                    ws.send(text(json!({ "type": "pong" })))
                        .await
                        .map_err(|e| StreamError::Transport(e.to_string()))?;
                }
                ServerMessage::Error(reason) => return Err(StreamError::Server(reason)),
                _ => {}
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
    Err(StreamError::Protocol("connection closed before acknowledgement".to_string()))
}

/// Forwards frames to `tx` until the server completes, the connection drops,
/// the reader goes away or `cancel` fires.
async fn pump(ws: WsStream, tx: mpsc::Sender<StreamItem>, cancel: CancellationToken, pair: Address) {
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(%pair, "Unsubscribing from trade events.");
                let _ = write.send(text(json!({ "id": SUBSCRIPTION_ID, "type": "complete" }))).await;
                let _ = write.close().await;
                break;
            }
            message = read.next() => {
                let frame = match message {
                    None => break,
                    Some(Err(e)) => {
                        let _ = tx.send(StreamItem::Error(StreamError::Transport(e.to_string()))).await;
                        break;
                    }
                    Some(Ok(frame)) => frame,
                };
                match frame {
                    Message::Text(body) => match parse_server_message(&body) {
                        Ok(ServerMessage::Next(events)) => {
                            if !events.is_empty() && tx.send(StreamItem::Events(events)).await.is_err() {
                                break;
                            }
                        }
                        Ok(ServerMessage::Ping) => {
                            let _ = write.send(text(json!({ "type": "pong" }))).await;
                        }
                        Ok(ServerMessage::Complete) => break,
                        Ok(ServerMessage::Error(reason)) => {
                            let _ = tx.send(StreamItem::Error(StreamError::Server(reason))).await;
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!(%pair, error = %e, "Skipping undecodable frame."),
                    },
                    Message::Ping(data) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }
    tracing::debug!(%pair, "Trade event stream ended.");
}

/// Opens one websocket per subscribed pair.
pub struct DefinedStreamProvider {
    config: StreamConfig,
}

impl DefinedStreamProvider {
    /// Creates a provider from the stream settings.
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    async fn handshake(&self, pair: Address) -> Result<WsStream, StreamError> {
        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| StreamError::Connect(e.to_string()))?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));

        let (mut ws, _) =
            connect_async(request).await.map_err(|e| StreamError::Connect(e.to_string()))?;

        ws.send(text(json!({
            "type": "connection_init",
            "payload": { "Authorization": self.config.api_key },
        })))
        .await
        .map_err(|e| StreamError::Transport(e.to_string()))?;

        wait_for_ack(&mut ws).await?;

        let topic = format!("{}:{}", pair.to_string().to_lowercase(), self.config.network_id);
        ws.send(text(json!({
            "id": SUBSCRIPTION_ID,
            "type": "subscribe",
            "payload": { "query": CREATE_EVENTS_QUERY, "variables": { "id": topic } },
        })))
        .await
        .map_err(|e| StreamError::Transport(e.to_string()))?;

        Ok(ws)
    }
}

#[async_trait]
impl EventStreamProvider for DefinedStreamProvider {
    #[tracing::instrument(skip(self), fields(pair = %pair), level = "debug")]
    async fn subscribe(&self, pair: Address) -> Result<EventStream, StreamError> {
        let ws = timeout(self.config.handshake_timeout, self.handshake(pair))
            .await
            .map_err(|_| StreamError::Timeout)??;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let cancel = CancellationToken::new();
        tokio::spawn(pump(ws, tx, cancel.clone(), pair));

        tracing::info!(%pair, "Subscribed to trade events.");
        Ok(EventStream { events: rx, cancel })
    }
}
