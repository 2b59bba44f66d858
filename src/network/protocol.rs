//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Messages are tagged JSON objects (`"type": "..."`).

use serde::{Serialize, Deserialize};

use crate::battle::outcome::BattleOutcome;
use crate::matchmaking::{BattleResult, MatchmakingError};
use crate::network::auth::AuthError;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate the connection.
    Auth {
        /// Bearer token (JWT, or a debug token when enabled).
        token: String,
    },

    /// Join the battle rendezvous.
    JoinBattle,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication result.
    AuthResult(AuthResult),

    /// Caller holds the waiting slot.
    Waiting { message: String },

    /// Battle result, sent to both participants.
    BattleFinished(BattleFinished),

    /// Pong response.
    Pong { timestamp: u64, server_time: u64 },

    /// Error message.
    Error(ErrorPayload),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Authentication result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    /// Whether auth succeeded.
    pub success: bool,
    /// Authenticated username.
    pub participant: Option<String>,
    /// Error message if failed.
    pub error: Option<String>,
    /// Server version.
    pub server_version: String,
}

/// Battle result as sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleFinished {
    /// True once the battle has completed, void battles included.
    pub success: bool,
    /// Closing narration line.
    pub message: String,
    /// Battle id.
    pub battle_id: String,
    /// Outcome.
    pub outcome: BattleOutcome,
    /// Full narration.
    pub battle_log: Vec<String>,
    /// Rounds played.
    pub rounds: u32,
    /// Hex-encoded replay record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay: Option<String>,
}

impl From<&BattleResult> for BattleFinished {
    fn from(result: &BattleResult) -> Self {
        Self {
            success: true,
            message: result.summary(),
            battle_id: result.battle_id.to_string(),
            outcome: result.outcome().clone(),
            battle_log: result.log_lines(),
            rounds: result.report.rounds,
            replay: result.replay.as_deref().map(hex::encode),
        }
    }
}

/// Error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ErrorPayload {
    /// Build a payload.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl From<&AuthError> for ErrorPayload {
    fn from(err: &AuthError) -> Self {
        let code = match err {
            AuthError::Expired => ErrorCode::TokenExpired,
            AuthError::NotConfigured => ErrorCode::AuthFailed,
            _ => ErrorCode::InvalidToken,
        };
        Self::new(code, err.to_string())
    }
}

impl From<&MatchmakingError> for ErrorPayload {
    fn from(err: &MatchmakingError) -> Self {
        let code = match err {
            MatchmakingError::NoOpponent => ErrorCode::NoOpponent,
            MatchmakingError::AlreadyWaiting(_) => ErrorCode::AlreadyWaiting,
            MatchmakingError::Store(_) => ErrorCode::StoreUnavailable,
            MatchmakingError::Cancelled => ErrorCode::InternalError,
        };
        Self::new(code, err.to_string())
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Authentication failed.
    AuthFailed,
    /// Not authenticated.
    NotAuthenticated,
    /// JWT token has expired.
    TokenExpired,
    /// Invalid JWT token (signature, format, claims).
    InvalidToken,
    /// Malformed message.
    InvalidInput,
    /// Caller is already waiting for an opponent.
    AlreadyWaiting,
    /// Nobody joined before the wait timeout.
    NoOpponent,
    /// Decks could not be loaded.
    StoreUnavailable,
    /// Server overloaded.
    ServerOverloaded,
    /// Internal error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::card::{Card, Element};
    use crate::battle::deck::Deck;
    use crate::battle::engine::{run_battle, BattleConfig, BattleSetup};
    use crate::battle::participant::ParticipantId;
    use crate::store::StoreError;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_client_messages_parse() {
        let auth = ClientMessage::from_json(r#"{"type":"auth","token":"kienboec-debug"}"#).unwrap();
        assert!(matches!(auth, ClientMessage::Auth { ref token } if token == "kienboec-debug"));

        let join = ClientMessage::from_json(r#"{"type":"join_battle"}"#).unwrap();
        assert!(matches!(join, ClientMessage::JoinBattle));

        let ping = ClientMessage::from_json(r#"{"type":"ping","timestamp":42}"#).unwrap();
        assert!(matches!(ping, ClientMessage::Ping { timestamp: 42 }));

        assert!(ClientMessage::from_json(r#"{"type":"deal_cards"}"#).is_err());
    }

    #[test]
    fn test_battle_finished_shape() {
        let msg = ServerMessage::BattleFinished(BattleFinished {
            success: true,
            message: "Battle ended. Winner: alice".into(),
            battle_id: "b7".into(),
            outcome: BattleOutcome::Win {
                winner: ParticipantId::new("alice"),
                loser: ParticipantId::new("bob"),
            },
            battle_log: vec!["Battle started between alice and bob".into()],
            rounds: 12,
            replay: None,
        });

        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "battle_finished");
        assert_eq!(json["outcome"]["result"], "win");
        assert_eq!(json["outcome"]["winner"], "alice");
        assert_eq!(json["rounds"], 12);
        assert!(json.get("replay").is_none());
    }

    #[test]
    fn test_void_battle_is_still_successful() {
        let short_deck = |prefix: &str| {
            Deck::new(
                (0..3)
                    .map(|i| Card::monster(format!("{}{}", prefix, i), "Troll", 10.0, Element::Normal))
                    .collect(),
            )
        };
        let report = run_battle(
            BattleSetup {
                participant_a: ParticipantId::new("alice"),
                participant_b: ParticipantId::new("bob"),
                deck_a: short_deck("a"),
                deck_b: short_deck("b"),
                seed: 1,
            },
            &BattleConfig::default(),
        );
        let result = BattleResult {
            battle_id: Uuid::new_v4(),
            finished_at: Utc::now(),
            report,
            replay: None,
            persistence_error: None,
        };
        assert!(result.outcome().is_void());

        let msg = ServerMessage::BattleFinished(BattleFinished::from(&result));
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["outcome"]["result"], "void");
        assert_eq!(json["battle_log"].as_array().unwrap().len(), 1);
        assert_eq!(
            json["battle_log"][0],
            "Both players must have 4 cards in their deck to battle."
        );
        assert_eq!(json["rounds"], 0);
    }

    #[test]
    fn test_error_codes() {
        let auth = ErrorPayload::from(&AuthError::Expired);
        assert_eq!(auth.code, ErrorCode::TokenExpired);

        let store = ErrorPayload::from(&MatchmakingError::Store(StoreError::Backend("down".into())));
        assert_eq!(store.code, ErrorCode::StoreUnavailable);

        let json = ServerMessage::Error(ErrorPayload::from(&MatchmakingError::NoOpponent))
            .to_json()
            .unwrap();
        assert!(json.contains("no_opponent"));
    }
}
