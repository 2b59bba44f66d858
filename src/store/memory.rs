//! In-Memory Store
//!
//! A `BattleStore` backed by maps behind async RwLocks. Used by the server
//! binary (optionally seeded from a JSON file) and by tests.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use tokio::sync::RwLock;

use crate::battle::card::Card;
use crate::battle::participant::ParticipantId;
use crate::store::{BattleStore, StoreError, DEFAULT_RATING};

/// Rating and statistics of one account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Elo-like rating.
    pub rating: i32,
    /// Games played, including draws.
    pub games_played: u32,
    /// Games won.
    pub wins: u32,
    /// Games lost.
    pub losses: u32,
}

impl Default for PlayerRecord {
    fn default() -> Self {
        Self {
            rating: DEFAULT_RATING,
            games_played: 0,
            wins: 0,
            losses: 0,
        }
    }
}

// =============================================================================
// SEED DATA
// =============================================================================

/// Catalog entry: id, name and damage. Kind, element and special trait are
/// derived from the name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogCard {
    /// Card id.
    pub id: String,
    /// Catalog name.
    pub name: String,
    /// Raw damage.
    pub damage: f64,
}

/// One account in a seed file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedPlayer {
    /// Username.
    pub username: String,
    /// Starting rating.
    #[serde(default = "default_rating")]
    pub rating: i32,
    /// Configured deck.
    #[serde(default)]
    pub deck: Vec<CatalogCard>,
}

fn default_rating() -> i32 {
    DEFAULT_RATING
}

/// Seed file contents.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SeedData {
    /// Accounts to create.
    pub players: Vec<SeedPlayer>,
}

impl SeedData {
    /// Parse from JSON.
    pub fn from_json(s: &str) -> Result<Self, StoreError> {
        serde_json::from_str(s).map_err(|e| StoreError::InvalidSeed(e.to_string()))
    }
}

// =============================================================================
// STORE
// =============================================================================

/// In-memory `BattleStore`.
#[derive(Default)]
pub struct InMemoryStore {
    players: RwLock<BTreeMap<ParticipantId, PlayerRecord>>,
    decks: RwLock<BTreeMap<ParticipantId, Vec<Card>>>,
    /// Rating/statistics writes performed so far.
    writes: AtomicU64,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from seed data.
    pub async fn from_seed(seed: SeedData) -> Result<Self, StoreError> {
        let store = Self::new();
        for player in seed.players {
            let id = ParticipantId::new(player.username);
            store.register_player_with_rating(id.clone(), player.rating).await?;

            let cards = player
                .deck
                .into_iter()
                .map(|c| Card::from_catalog(c.id, c.name, c.damage))
                .collect();
            store.set_deck(&id, cards).await?;
        }
        Ok(store)
    }

    /// Load a JSON seed file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| StoreError::InvalidSeed(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_seed(SeedData::from_json(&raw)?).await
    }

    /// Register a new account with the default rating.
    pub async fn register_player(&self, participant: ParticipantId) -> Result<(), StoreError> {
        self.register_player_with_rating(participant, DEFAULT_RATING).await
    }

    /// Register a new account with a given rating.
    pub async fn register_player_with_rating(
        &self,
        participant: ParticipantId,
        rating: i32,
    ) -> Result<(), StoreError> {
        let mut players = self.players.write().await;
        if players.contains_key(&participant) {
            return Err(StoreError::DuplicateParticipant(participant));
        }
        players.insert(participant, PlayerRecord { rating, ..Default::default() });
        Ok(())
    }

    /// Replace a participant's deck.
    pub async fn set_deck(&self, participant: &ParticipantId, cards: Vec<Card>) -> Result<(), StoreError> {
        if !self.players.read().await.contains_key(participant) {
            return Err(StoreError::UnknownParticipant(participant.clone()));
        }
        self.decks.write().await.insert(participant.clone(), cards);
        Ok(())
    }

    /// Rating and statistics of a participant.
    pub async fn player_record(&self, participant: &ParticipantId) -> Option<PlayerRecord> {
        self.players.read().await.get(participant).copied()
    }

    /// Number of registered accounts.
    pub async fn player_count(&self) -> usize {
        self.players.read().await.len()
    }

    /// Rating/statistics writes performed so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    async fn update_record(
        &self,
        participant: &ParticipantId,
        update: impl FnOnce(&mut PlayerRecord),
    ) -> Result<(), StoreError> {
        let mut players = self.players.write().await;
        let record = players
            .get_mut(participant)
            .ok_or_else(|| StoreError::UnknownParticipant(participant.clone()))?;
        update(record);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl BattleStore for InMemoryStore {
    async fn fetch_deck(&self, participant: &ParticipantId) -> Result<Vec<Card>, StoreError> {
        if !self.players.read().await.contains_key(participant) {
            return Err(StoreError::UnknownParticipant(participant.clone()));
        }
        // A registered account without a configured deck battles with none
        Ok(self.decks.read().await.get(participant).cloned().unwrap_or_default())
    }

    async fn apply_rating_delta(&self, participant: &ParticipantId, delta: i32) -> Result<(), StoreError> {
        self.update_record(participant, |record| {
            record.rating = record.rating.saturating_add(delta);
        })
        .await
    }

    async fn record_game_outcome(
        &self,
        participant: &ParticipantId,
        won: bool,
        lost: bool,
    ) -> Result<(), StoreError> {
        self.update_record(participant, |record| {
            record.games_played += 1;
            if won {
                record.wins += 1;
            }
            if lost {
                record.losses += 1;
            }
        })
        .await
    }
}
