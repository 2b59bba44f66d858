//! Persistence Boundary
//!
//! The battle core reads decks and writes rating/statistics updates through
//! [`BattleStore`]. Account management, the card catalog and the database
//! schema live behind it.

pub mod memory;

use async_trait::async_trait;

use crate::battle::card::Card;
use crate::battle::outcome::ParticipantUpdate;
use crate::battle::participant::ParticipantId;

pub use memory::{InMemoryStore, PlayerRecord, SeedData, SeedPlayer, CatalogCard};

/// Rating every new account starts with.
pub const DEFAULT_RATING: i32 = 100;

/// Persistence errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No such participant.
    #[error("Unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    /// Participant already exists.
    #[error("Participant already exists: {0}")]
    DuplicateParticipant(ParticipantId),

    /// Seed data could not be loaded.
    #[error("Invalid seed data: {0}")]
    InvalidSeed(String),

    /// Storage backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Operations the battle core needs from persistence.
#[async_trait]
pub trait BattleStore: Send + Sync {
    /// Current deck of a participant, in order.
    async fn fetch_deck(&self, participant: &ParticipantId) -> Result<Vec<Card>, StoreError>;

    /// Add `delta` to the participant's rating.
    async fn apply_rating_delta(&self, participant: &ParticipantId, delta: i32) -> Result<(), StoreError>;

    /// Count one game played, plus a win or a loss as flagged.
    /// Both flags false records a draw.
    async fn record_game_outcome(
        &self,
        participant: &ParticipantId,
        won: bool,
        lost: bool,
    ) -> Result<(), StoreError>;
}

/// Apply a battle's participant updates, in order.
///
/// Stops at the first failure; there is no retry.
pub async fn apply_updates<S>(store: &S, updates: &[ParticipantUpdate]) -> Result<(), StoreError>
where
    S: BattleStore + ?Sized,
{
    for update in updates {
        if let Some(delta) = update.rating_delta {
            store.apply_rating_delta(&update.participant, delta).await?;
        }
        store
            .record_game_outcome(&update.participant, update.won, update.lost)
            .await?;
    }
    Ok(())
}
