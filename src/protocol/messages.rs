//! Wire message definitions and parsing
//!
//! Inbound frames are untrusted. Parsing never fails loudly: a frame that is
//! not a JSON object with a string `type` is reported as malformed and every
//! field read falls back to a fixed default.

use crate::error::{RelayError, Result};
use crate::types::{
    ClientId, LobbyId, LobbyListing, LobbySummary, DEFAULT_DISPLAY_NAME, DEFAULT_GAME_VERSION,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// A parsed client request
#[derive(Debug, Clone, PartialEq)]
pub enum InboundCommand {
    Hello,
    ListLobbies,
    CreateLobby {
        display_name: String,
        game_version: String,
    },
    JoinLobby {
        lobby_id: LobbyId,
    },
    /// `None` means "the lobby this session is currently in"
    LeaveLobby {
        lobby_id: Option<LobbyId>,
    },
    Heartbeat,
    Relay {
        lobby_id: LobbyId,
        /// Forwarded verbatim; `None` when the field was absent
        payload: Option<Value>,
    },
    /// Well-formed frame with a `type` this server does not handle
    Unknown {
        message_type: String,
    },
}

impl InboundCommand {
    /// Parse a raw frame. Returns `None` for malformed input.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(raw).ok()?;
        let fields = value.as_object()?;
        let message_type = fields.get("type")?.as_str()?;

        let command = match message_type {
            "hello" => InboundCommand::Hello,
            "list_lobbies" => InboundCommand::ListLobbies,
            "create_lobby" => InboundCommand::CreateLobby {
                display_name: string_field(fields, "display_name")
                    .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
                game_version: string_field(fields, "game_version")
                    .unwrap_or_else(|| DEFAULT_GAME_VERSION.to_string()),
            },
            "join_lobby" => InboundCommand::JoinLobby {
                lobby_id: string_field(fields, "lobby_id").unwrap_or_default(),
            },
            "leave_lobby" => InboundCommand::LeaveLobby {
                lobby_id: string_field(fields, "lobby_id"),
            },
            "heartbeat" => InboundCommand::Heartbeat,
            "relay" => InboundCommand::Relay {
                lobby_id: string_field(fields, "lobby_id").unwrap_or_default(),
                payload: fields.get("payload").cloned(),
            },
            other => InboundCommand::Unknown {
                message_type: other.to_string(),
            },
        };

        Some(command)
    }

    /// Label used for logging and metrics
    pub fn message_type(&self) -> &str {
        match self {
            InboundCommand::Hello => "hello",
            InboundCommand::ListLobbies => "list_lobbies",
            InboundCommand::CreateLobby { .. } => "create_lobby",
            InboundCommand::JoinLobby { .. } => "join_lobby",
            InboundCommand::LeaveLobby { .. } => "leave_lobby",
            InboundCommand::Heartbeat => "heartbeat",
            InboundCommand::Relay { .. } => "relay",
            InboundCommand::Unknown { .. } => "unknown",
        }
    }
}

/// Read a field as a string, treating empty and falsy values as missing.
///
/// Non-empty strings are taken as is; non-zero numbers and `true` use their
/// textual form. Null, `false`, zero, empty strings, arrays and objects yield
/// `None`.
fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64().map_or(true, |f| f != 0.0) => Some(number_text(n)),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Integers keep their exact digits. Floats use `f64`'s shortest form, so an
/// integral float such as `1.0` reads as `1`.
fn number_text(n: &Number) -> String {
    if n.is_f64() {
        n.as_f64().map_or_else(|| n.to_string(), |f| f.to_string())
    } else {
        n.to_string()
    }
}

/// Messages sent from the server to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Hello {
        client_id: ClientId,
    },
    LobbyList {
        lobbies: Vec<LobbyListing>,
    },
    JoinedLobby {
        lobby: LobbySummary,
    },
    Error {
        message: String,
    },
    Relay {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}

impl OutboundMessage {
    /// Build an `error` reply from a protocol error
    pub fn error(error: &RelayError) -> Self {
        OutboundMessage::Error {
            message: error.to_string(),
        }
    }

    /// Serialize to the JSON text frame sent on the wire
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            RelayError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Label used for logging and metrics
    pub fn message_type(&self) -> &'static str {
        match self {
            OutboundMessage::Hello { .. } => "hello",
            OutboundMessage::LobbyList { .. } => "lobby_list",
            OutboundMessage::JoinedLobby { .. } => "joined_lobby",
            OutboundMessage::Error { .. } => "error",
            OutboundMessage::Relay { .. } => "relay",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Option<InboundCommand> {
        InboundCommand::from_bytes(value.to_string().as_bytes())
    }

    #[test]
    fn test_malformed_frames_are_rejected() {
        assert_eq!(InboundCommand::from_bytes(b"not json"), None);
        assert_eq!(InboundCommand::from_bytes(b"{\"type\":"), None);
        assert_eq!(InboundCommand::from_bytes(&[0xff, 0xfe, 0x00]), None);
        assert_eq!(parse(json!(42)), None);
        assert_eq!(parse(json!(["hello"])), None);
        assert_eq!(parse(json!({"lobby_id": "l_1"})), None);
        assert_eq!(parse(json!({"type": 7})), None);
    }

    #[test]
    fn test_unknown_type_is_well_formed() {
        assert_eq!(
            parse(json!({"type": "teleport"})),
            Some(InboundCommand::Unknown {
                message_type: "teleport".to_string()
            })
        );
    }

    #[test]
    fn test_create_lobby_defaults() {
        assert_eq!(
            parse(json!({"type": "create_lobby"})),
            Some(InboundCommand::CreateLobby {
                display_name: "Lobby".to_string(),
                game_version: "unknown".to_string(),
            })
        );

        assert_eq!(
            parse(json!({"type": "create_lobby", "display_name": "", "game_version": null})),
            Some(InboundCommand::CreateLobby {
                display_name: "Lobby".to_string(),
                game_version: "unknown".to_string(),
            })
        );
    }

    #[test]
    fn test_field_coercion() {
        assert_eq!(
            parse(json!({"type": "create_lobby", "display_name": 12, "game_version": 1.5})),
            Some(InboundCommand::CreateLobby {
                display_name: "12".to_string(),
                game_version: "1.5".to_string(),
            })
        );

        assert_eq!(
            parse(json!({"type": "create_lobby", "display_name": {"x": 1}, "game_version": 0})),
            Some(InboundCommand::CreateLobby {
                display_name: "Lobby".to_string(),
                game_version: "unknown".to_string(),
            })
        );

        assert_eq!(
            parse(json!({"type": "join_lobby"})),
            Some(InboundCommand::JoinLobby {
                lobby_id: String::new()
            })
        );
    }

    #[test]
    fn test_integral_float_drops_fraction() {
        let command = InboundCommand::from_bytes(
            br#"{"type": "create_lobby", "display_name": 1.0, "game_version": -2.50}"#,
        );

        assert_eq!(
            command,
            Some(InboundCommand::CreateLobby {
                display_name: "1".to_string(),
                game_version: "-2.5".to_string(),
            })
        );
    }

    #[test]
    fn test_leave_lobby_without_id() {
        assert_eq!(
            parse(json!({"type": "leave_lobby"})),
            Some(InboundCommand::LeaveLobby { lobby_id: None })
        );
        assert_eq!(
            parse(json!({"type": "leave_lobby", "lobby_id": "l_abc"})),
            Some(InboundCommand::LeaveLobby {
                lobby_id: Some("l_abc".to_string())
            })
        );
    }

    #[test]
    fn test_relay_payload_is_kept_verbatim() {
        let payload = json!({"pos": [1, 2, 3], "nested": {"ok": true}});
        assert_eq!(
            parse(json!({"type": "relay", "lobby_id": "l_abc", "payload": payload.clone()})),
            Some(InboundCommand::Relay {
                lobby_id: "l_abc".to_string(),
                payload: Some(payload),
            })
        );

        assert_eq!(
            parse(json!({"type": "relay", "lobby_id": "l_abc"})),
            Some(InboundCommand::Relay {
                lobby_id: "l_abc".to_string(),
                payload: None,
            })
        );
    }

    #[test]
    fn test_outbound_wire_shapes() {
        let hello = OutboundMessage::Hello {
            client_id: "c_0123456789ab".to_string(),
        };
        let value: Value = serde_json::from_str(&hello.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "hello", "client_id": "c_0123456789ab"}));

        let list = OutboundMessage::LobbyList {
            lobbies: vec![LobbyListing {
                lobby_id: "l_1".to_string(),
                display_name: "X".to_string(),
                game_version: "1.0".to_string(),
                members: 1,
                created_at: 1_700_000_000_000,
            }],
        };
        let value: Value = serde_json::from_str(&list.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "lobby_list",
                "lobbies": [{
                    "lobby_id": "l_1",
                    "display_name": "X",
                    "game_version": "1.0",
                    "members": 1,
                    "created_at": 1_700_000_000_000i64
                }]
            })
        );

        let error = OutboundMessage::error(&RelayError::LobbyNotFound {
            lobby_id: "l_1".to_string(),
        });
        let value: Value = serde_json::from_str(&error.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "error", "message": "Lobby not found"}));
    }

    #[test]
    fn test_relay_without_payload_omits_field() {
        let relay = OutboundMessage::Relay { payload: None };
        assert_eq!(relay.to_json().unwrap(), r#"{"type":"relay"}"#);

        let relay = OutboundMessage::Relay {
            payload: Some(Value::Null),
        };
        assert_eq!(relay.to_json().unwrap(), r#"{"type":"relay","payload":null}"#);
    }
}
