//! # Card Battle Server
//!
//! Two-party matchmaking in front of a deterministic card battle engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CARD BATTLE SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  └── rng.rs      - Xorshift128+ PRNG, battle seed derivation │
//! │                                                              │
//! │  battle/         - Battle logic (deterministic)              │
//! │  ├── card.rs     - Cards, elements, special traits           │
//! │  ├── deck.rs     - Decks owned by a battle                   │
//! │  ├── rules.rs    - Rule cascade for one round                │
//! │  ├── engine.rs   - Round loop and termination                │
//! │  ├── outcome.rs  - Scoring and persistence updates           │
//! │  └── events.rs   - Structured battle log                     │
//! │                                                              │
//! │  matchmaking/    - Two-party rendezvous                      │
//! │  store/          - Persistence boundary, in-memory store     │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── auth.rs     - Token authentication                      │
//! │  ├── protocol.rs - Message types                             │
//! │  └── server.rs   - WebSocket server                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! Given the same decks and seed, `battle::run_battle` produces the same
//! rounds, log and outcome. All randomness comes from a seeded
//! Xorshift128+; the seed is derived from the battle id and participants.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod battle;
pub mod matchmaking;
pub mod store;
pub mod network;

// Re-export commonly used types
pub use core::rng::{DeterministicRng, derive_battle_seed};
pub use battle::{
    run_battle, BattleConfig, BattleOutcome, BattleReport, BattleSetup, Card, Deck, ParticipantId,
};
pub use matchmaking::{BattleResult, Matchmaker, MatchmakingConfig, MatchmakingError};
pub use store::{BattleStore, InMemoryStore, StoreError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Round cap per battle
pub const MAX_ROUNDS: u32 = 100;

/// Cards each deck needs for a battle to run
pub const MIN_DECK_SIZE: usize = 4;

/// Critical hit chance per side in a generic round (percent)
pub const CRIT_CHANCE_PERCENT: u32 = 10;
