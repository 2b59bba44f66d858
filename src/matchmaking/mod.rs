//! Matchmaking Module
//!
//! Two-party rendezvous: the first caller waits, the second runs the battle
//! and both receive the same result.
//!
//! ## Module Structure
//!
//! - `rendezvous`: Single waiting slot and pairing
//! - `result`: Shared battle result

pub mod rendezvous;
pub mod result;

pub use rendezvous::{Entry, Matchmaker, MatchmakingConfig, MatchmakingError, PendingBattle};
pub use result::BattleResult;
