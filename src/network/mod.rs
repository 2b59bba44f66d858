//! Network Layer
//!
//! WebSocket server for battle clients.
//! This layer is **non-deterministic**; battle logic runs through `battle/`.

pub mod auth;
pub mod protocol;
pub mod server;

pub use auth::{authenticate, validate_token, AuthConfig, AuthError, TokenClaims};
pub use protocol::{
    AuthResult, BattleFinished, ClientMessage, ErrorCode, ErrorPayload, ServerMessage,
};
pub use server::{BattleServer, ServerConfig, ServerError};
