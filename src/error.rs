//! Error types for the relay service
//!
//! Protocol errors render to the exact human-readable string that is sent to
//! the originating client in an `error` message.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific relay scenarios
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("Lobby not found")]
    LobbyNotFound { lobby_id: String },

    #[error("Not a member of lobby")]
    NotMember { lobby_id: String, client_id: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl RelayError {
    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::LobbyNotFound { .. } => "lobby_not_found",
            RelayError::NotMember { .. } => "not_member",
            RelayError::InternalError { .. } => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_render_wire_strings() {
        let not_found = RelayError::LobbyNotFound {
            lobby_id: "l_000000000000".to_string(),
        };
        assert_eq!(not_found.to_string(), "Lobby not found");

        let not_member = RelayError::NotMember {
            lobby_id: "l_000000000000".to_string(),
            client_id: "c_000000000000".to_string(),
        };
        assert_eq!(not_member.to_string(), "Not a member of lobby");
        assert_eq!(not_member.kind(), "not_member");
    }
}
