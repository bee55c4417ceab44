use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{OrderId, TransportMode};

/// Whether an event announces a new order or changes a known one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    New,
    Update,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery-order notification received from one transport.
///
/// The payload is kept opaque: shaping it into an order model is an
/// application concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub id: OrderId,
    pub kind: EventKind,
    pub payload: Map<String, Value>,
    pub source: TransportMode,
    pub received_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn new(id: OrderId, kind: EventKind, source: TransportMode) -> Self {
        Self {
            id,
            kind,
            payload: Map::new(),
            source,
            received_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    #[must_use]
    pub const fn is_new(&self) -> bool {
        matches!(self.kind, EventKind::New)
    }
}
