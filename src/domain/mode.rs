use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One concrete mechanism for receiving order events.
///
/// `Push` is an extension point: the default transport factory does not
/// build it, but an injected factory may.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Polling,
    Websocket,
    Push,
}

impl TransportMode {
    pub const ALL: [TransportMode; 3] = [Self::Polling, Self::Websocket, Self::Push];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Polling => "polling",
            Self::Websocket => "websocket",
            Self::Push => "push",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown transport mode '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("WebSocket".parse::<TransportMode>(), Ok(TransportMode::Websocket));
        assert_eq!(" polling ".parse::<TransportMode>(), Ok(TransportMode::Polling));
        assert!("sms".parse::<TransportMode>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&TransportMode::Websocket).unwrap();
        assert_eq!(json, "\"websocket\"");
    }
}
