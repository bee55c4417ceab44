//! Decoding of server payloads into [`OrderEvent`]s.
//!
//! Both transports speak JSON. The polling endpoint returns a batch (a bare
//! array or `{"results": [...]}`) of order envelopes; the socket pushes
//! frames tagged with a `type` field. Only a resolvable, non-empty id is
//! required of an order; payload shape is left to the application.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::{EventKind, OrderEvent, OrderId, TransportMode};
use crate::error::ParseError;

/// Keys probed, in order, when resolving an order id.
const ID_KEYS: [&str; 3] = ["id", "order_id", "delivery_id"];

/// Keys under which a frame may nest the order object.
const NESTED_KEYS: [&str; 2] = ["data", "order"];

/// Frame types that carry no order and are silently ignored.
const CONTROL_TYPES: [&str; 4] = ["ping", "pong", "heartbeat", "connection_established"];

/// A decoded socket frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Order(OrderEvent),
    /// Server-side error frame; reported, the socket stays open.
    ServerError(String),
    /// Keepalive or handshake chatter.
    Control,
}

/// Split a polling response body into its order envelopes.
pub fn decode_batch(body: &str) -> Result<Vec<Value>, ParseError> {
    match serde_json::from_str::<Value>(body)? {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ParseError::UnexpectedShape {
                expected: "a JSON array or an object with a `results` array",
            }),
        },
        _ => Err(ParseError::UnexpectedShape {
            expected: "a JSON array or an object with a `results` array",
        }),
    }
}

/// Turn one polled envelope into an event.
///
/// Envelopes tagged `order_update` (under `type` or `event`) become updates;
/// everything else announces a new order.
pub fn decode_polled(value: Value, received_at: DateTime<Utc>) -> Result<OrderEvent, ParseError> {
    let Value::Object(map) = value else {
        return Err(ParseError::UnexpectedShape {
            expected: "an order object",
        });
    };
    let kind = match tag(&map, "type").or_else(|| tag(&map, "event")) {
        Some("order_update") => EventKind::Update,
        _ => EventKind::New,
    };
    let id = resolve_id(&map).ok_or(ParseError::MissingId)?;
    Ok(OrderEvent::new(id, kind, TransportMode::Polling)
        .with_payload(map)
        .with_received_at(received_at))
}

/// Decode one text frame pushed over the socket.
pub fn decode_frame(text: &str, received_at: DateTime<Utc>) -> Result<Frame, ParseError> {
    let Value::Object(mut frame) = serde_json::from_str::<Value>(text)? else {
        return Err(ParseError::UnexpectedShape {
            expected: "a JSON object frame",
        });
    };

    let kind = match tag(&frame, "type").ok_or(ParseError::MissingType)? {
        "new_order" => EventKind::New,
        "order_update" => EventKind::Update,
        "error" => {
            let message = ["message", "error", "detail"]
                .into_iter()
                .find_map(|key| tag(&frame, key))
                .unwrap_or("unspecified server error");
            return Ok(Frame::ServerError(message.to_string()));
        }
        other if CONTROL_TYPES.contains(&other) => return Ok(Frame::Control),
        other => return Err(ParseError::UnknownType(other.to_string())),
    };

    frame.remove("type");
    let payload = take_nested(&mut frame).unwrap_or_else(|| frame.clone());
    let id = resolve_id(&payload)
        .or_else(|| resolve_id(&frame))
        .ok_or(ParseError::MissingId)?;

    Ok(Frame::Order(
        OrderEvent::new(id, kind, TransportMode::Websocket)
            .with_payload(payload)
            .with_received_at(received_at),
    ))
}

/// Find the first usable id among the known id keys.
pub fn resolve_id(map: &Map<String, Value>) -> Option<OrderId> {
    ID_KEYS.into_iter().find_map(|key| match map.get(key)? {
        Value::String(s) => OrderId::new(s.as_str()).ok(),
        Value::Number(n) if n.is_i64() || n.is_u64() => OrderId::new(n.to_string()).ok(),
        _ => None,
    })
}

fn tag<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

fn take_nested(frame: &mut Map<String, Value>) -> Option<Map<String, Value>> {
    for key in NESTED_KEYS {
        if matches!(frame.get(key), Some(Value::Object(_))) {
            if let Some(Value::Object(inner)) = frame.remove(key) {
                return Some(inner);
            }
        }
    }
    None
}
