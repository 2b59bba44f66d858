//! Matchmaking Rendezvous
//!
//! A single waiting slot. The first caller takes the slot and suspends on a
//! one-shot channel; the next caller claims the waiter, runs the battle for
//! (waiter, self) and hands the shared result back through that channel.
//!
//! The slot lock is only held to claim or fill the slot. Deck fetching, the
//! engine and persistence all run outside it, so independent pairs battle
//! concurrently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::battle::deck::Deck;
use crate::battle::engine::{run_battle, BattleConfig, BattleSetup};
use crate::battle::participant::ParticipantId;
use crate::core::rng::derive_battle_seed;
use crate::matchmaking::result::BattleResult;
use crate::store::{apply_updates, BattleStore, StoreError};

/// What a caller receives once paired.
pub type PairingResult = Result<Arc<BattleResult>, MatchmakingError>;

/// Matchmaking errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchmakingError {
    /// Nobody joined before the wait timeout.
    #[error("No opponent found")]
    NoOpponent,

    /// The participant already holds the waiting slot.
    #[error("{0} is already waiting for an opponent")]
    AlreadyWaiting(ParticipantId),

    /// Deck fetch failed; the pairing was aborted.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The counterpart went away before delivering a result.
    #[error("Pairing was cancelled")]
    Cancelled,
}

/// Rendezvous configuration.
#[derive(Debug, Clone, Default)]
pub struct MatchmakingConfig {
    /// How long a waiter stays in the slot. `None` waits forever.
    pub wait_timeout: Option<Duration>,
}

/// Result of entering the rendezvous.
#[derive(Debug)]
pub enum Entry {
    /// Caller was the counterpart; the battle already ran.
    Paired(Arc<BattleResult>),
    /// Caller holds the slot; pass this to [`Matchmaker::wait`].
    Waiting(PendingBattle),
}

/// The waiter's handle on its future battle.
#[derive(Debug)]
pub struct PendingBattle {
    participant: ParticipantId,
    ticket: u64,
    receiver: oneshot::Receiver<PairingResult>,
}

impl PendingBattle {
    /// Participant holding the slot.
    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }
}

struct Waiter {
    participant: ParticipantId,
    ticket: u64,
    reply: oneshot::Sender<PairingResult>,
}

/// Two-party rendezvous in front of the battle engine.
pub struct Matchmaker {
    store: Arc<dyn BattleStore>,
    battle: BattleConfig,
    config: MatchmakingConfig,
    slot: Mutex<Option<Waiter>>,
    next_ticket: AtomicU64,
}

impl Matchmaker {
    /// Create a rendezvous over a store.
    pub fn new(store: Arc<dyn BattleStore>, battle: BattleConfig, config: MatchmakingConfig) -> Self {
        Self {
            store,
            battle,
            config,
            slot: Mutex::new(None),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Battle rules in use.
    pub fn battle_config(&self) -> &BattleConfig {
        &self.battle
    }

    /// Current slot occupant, if any.
    pub async fn waiting_participant(&self) -> Option<ParticipantId> {
        self.slot.lock().await.as_ref().map(|w| w.participant.clone())
    }

    /// Join and wait for the battle result.
    pub async fn join(&self, participant: ParticipantId) -> PairingResult {
        match self.enter(participant).await? {
            Entry::Paired(result) => Ok(result),
            Entry::Waiting(pending) => self.wait(pending).await,
        }
    }

    /// Enter the rendezvous without waiting.
    ///
    /// Takes the slot if it is empty. Otherwise claims the waiter, runs the
    /// battle with the waiter as side A, delivers the result to the waiter
    /// and returns it.
    #[instrument(skip_all, fields(participant = %participant))]
    pub async fn enter(&self, participant: ParticipantId) -> Result<Entry, MatchmakingError> {
        let waiter = {
            let mut slot = self.slot.lock().await;

            if slot.as_ref().is_some_and(|w| w.reply.is_closed()) {
                if let Some(gone) = slot.take() {
                    debug!(waiter = %gone.participant, "Discarding abandoned waiter");
                }
            }

            match slot.take() {
                Some(waiter) if waiter.participant == participant => {
                    *slot = Some(waiter);
                    return Err(MatchmakingError::AlreadyWaiting(participant));
                }
                Some(waiter) => waiter,
                None => {
                    let (reply, receiver) = oneshot::channel();
                    let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                    *slot = Some(Waiter {
                        participant: participant.clone(),
                        ticket,
                        reply,
                    });
                    debug!("Waiting for an opponent");
                    return Ok(Entry::Waiting(PendingBattle {
                        participant,
                        ticket,
                        receiver,
                    }));
                }
            }
        };

        let Waiter { participant: opponent, reply, .. } = waiter;
        let result = self.run_pairing(opponent.clone(), participant).await;

        if reply.send(result.clone()).is_err() {
            warn!(waiter = %opponent, "Waiter left before the result arrived");
        }

        result.map(Entry::Paired)
    }

    /// Wait for a pending battle.
    ///
    /// With a wait timeout, an unclaimed waiter is removed from the slot and
    /// gets [`MatchmakingError::NoOpponent`]. A waiter that was already
    /// claimed keeps waiting for its battle.
    pub async fn wait(&self, pending: PendingBattle) -> PairingResult {
        let PendingBattle { participant, ticket, mut receiver } = pending;

        let Some(timeout) = self.config.wait_timeout else {
            return flatten(receiver.await);
        };

        match tokio::time::timeout(timeout, &mut receiver).await {
            Ok(received) => flatten(received),
            Err(_) => {
                {
                    let mut slot = self.slot.lock().await;
                    if slot.as_ref().is_some_and(|w| w.ticket == ticket) {
                        slot.take();
                        info!(participant = %participant, "No opponent arrived");
                        return Err(MatchmakingError::NoOpponent);
                    }
                }
                debug!(participant = %participant, "Claimed at timeout, awaiting battle");
                flatten(receiver.await)
            }
        }
    }

    async fn run_pairing(&self, waiter: ParticipantId, counterpart: ParticipantId) -> PairingResult {
        let battle_id = Uuid::new_v4();

        let deck_a = self.store.fetch_deck(&waiter).await.map_err(|e| {
            error!(%battle_id, participant = %waiter, error = %e, "Deck fetch failed");
            e
        })?;
        let deck_b = self.store.fetch_deck(&counterpart).await.map_err(|e| {
            error!(%battle_id, participant = %counterpart, error = %e, "Deck fetch failed");
            e
        })?;

        let seed = derive_battle_seed(battle_id.as_bytes(), [waiter.as_str(), counterpart.as_str()]);
        info!(
            %battle_id,
            participant_a = %waiter,
            participant_b = %counterpart,
            seed = %hex::encode(seed.to_be_bytes()),
            "Battle starting"
        );

        let setup = BattleSetup {
            participant_a: waiter,
            participant_b: counterpart,
            deck_a: Deck::new(deck_a),
            deck_b: Deck::new(deck_b),
            seed,
        };
        let replay = match setup.to_bytes() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(%battle_id, error = %e, "Failed to encode replay record");
                None
            }
        };

        let report = run_battle(setup, &self.battle);

        let persistence_error = match apply_updates(self.store.as_ref(), &report.updates).await {
            Ok(()) => None,
            Err(e) => {
                error!(%battle_id, error = %e, "Failed to persist battle outcome");
                Some(e)
            }
        };

        info!(%battle_id, rounds = report.rounds, outcome = ?report.outcome, "Battle finished");

        Ok(Arc::new(BattleResult {
            battle_id,
            finished_at: Utc::now(),
            report,
            replay,
            persistence_error,
        }))
    }
}

fn flatten(received: Result<PairingResult, oneshot::error::RecvError>) -> PairingResult {
    received.unwrap_or(Err(MatchmakingError::Cancelled))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::battle::card::{Card, Element, SpecialTrait};
    use crate::battle::outcome::BattleOutcome;
    use crate::store::InMemoryStore;

    fn trolls(prefix: &str, count: usize, damage: f64) -> Vec<Card> {
        (0..count)
            .map(|i| Card::monster(format!("{}{}", prefix, i), "Troll", damage, Element::Normal))
            .collect()
    }

    async fn store_with(decks: &[(&str, Vec<Card>)]) -> Arc<InMemoryStore> {
        let store = InMemoryStore::new();
        for (name, deck) in decks {
            let id = ParticipantId::new(*name);
            store.register_player(id.clone()).await.unwrap();
            store.set_deck(&id, deck.clone()).await.unwrap();
        }
        Arc::new(store)
    }

    fn matchmaker(store: Arc<dyn BattleStore>, config: MatchmakingConfig) -> Matchmaker {
        Matchmaker::new(store, BattleConfig::default(), config)
    }

    #[tokio::test]
    async fn test_first_caller_waits_second_runs_battle() {
        let store = store_with(&[
            ("alice", trolls("a", 4, 100.0)),
            ("bob", trolls("b", 4, 1.0)),
        ]).await;
        let mm = matchmaker(store.clone(), MatchmakingConfig::default());

        let pending = match mm.enter(ParticipantId::new("alice")).await.unwrap() {
            Entry::Waiting(p) => p,
            Entry::Paired(_) => panic!("first caller must wait"),
        };
        assert_eq!(pending.participant().as_str(), "alice");
        assert_eq!(mm.waiting_participant().await, Some(ParticipantId::new("alice")));

        let paired = match mm.enter(ParticipantId::new("bob")).await.unwrap() {
            Entry::Paired(r) => r,
            Entry::Waiting(_) => panic!("second caller must pair"),
        };
        let waited = mm.wait(pending).await.unwrap();

        assert!(Arc::ptr_eq(&paired, &waited));
        assert_eq!(mm.waiting_participant().await, None);

        // Waiter is side A
        assert_eq!(paired.report.participant_a.as_str(), "alice");
        assert_eq!(paired.outcome().winner(), Some(&ParticipantId::new("alice")));
        assert!(paired.is_persisted());

        let alice = store.player_record(&ParticipantId::new("alice")).await.unwrap();
        let bob = store.player_record(&ParticipantId::new("bob")).await.unwrap();
        assert_eq!((alice.rating, alice.wins, alice.games_played), (103, 1, 1));
        assert_eq!((bob.rating, bob.losses, bob.games_played), (95, 1, 1));
    }

    #[tokio::test]
    async fn test_concurrent_joins_pair_up() {
        let store = store_with(&[
            ("p1", trolls("a", 4, 10.0)),
            ("p2", trolls("b", 4, 10.0)),
            ("p3", trolls("c", 4, 10.0)),
            ("p4", trolls("d", 4, 10.0)),
        ]).await;
        let mm = Arc::new(matchmaker(store.clone(), MatchmakingConfig::default()));

        let handles: Vec<_> = ["p1", "p2", "p3", "p4"]
            .into_iter()
            .map(|name| {
                let mm = mm.clone();
                tokio::spawn(async move { mm.join(ParticipantId::new(name)).await })
            })
            .collect();

        let mut battle_ids = Vec::new();
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            battle_ids.push(result.battle_id);
        }

        battle_ids.sort();
        assert_eq!(battle_ids[0], battle_ids[1]);
        assert_eq!(battle_ids[2], battle_ids[3]);
        assert_ne!(battle_ids[1], battle_ids[2]);

        for name in ["p1", "p2", "p3", "p4"] {
            let record = store.player_record(&ParticipantId::new(name)).await.unwrap();
            assert_eq!(record.games_played, 1);
        }
    }

    #[tokio::test]
    async fn test_rejoin_while_waiting_is_rejected() {
        let store = store_with(&[("alice", trolls("a", 4, 10.0))]).await;
        let mm = matchmaker(store, MatchmakingConfig::default());

        let _pending = mm.enter(ParticipantId::new("alice")).await.unwrap();
        let again = mm.enter(ParticipantId::new("alice")).await;

        assert!(matches!(again, Err(MatchmakingError::AlreadyWaiting(_))));
        assert_eq!(mm.waiting_participant().await, Some(ParticipantId::new("alice")));
    }

    #[tokio::test]
    async fn test_abandoned_waiter_is_discarded() {
        let store = store_with(&[
            ("alice", trolls("a", 4, 10.0)),
            ("bob", trolls("b", 4, 10.0)),
        ]).await;
        let mm = matchmaker(store.clone(), MatchmakingConfig::default());

        match mm.enter(ParticipantId::new("alice")).await.unwrap() {
            Entry::Waiting(pending) => drop(pending),
            Entry::Paired(_) => panic!("first caller must wait"),
        }

        let entry = mm.enter(ParticipantId::new("bob")).await.unwrap();
        assert!(matches!(entry, Entry::Waiting(_)));
        assert_eq!(mm.waiting_participant().await, Some(ParticipantId::new("bob")));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_timeout_without_opponent() {
        let store = store_with(&[("alice", trolls("a", 4, 10.0))]).await;
        let config = MatchmakingConfig { wait_timeout: Some(Duration::from_millis(20)) };
        let mm = matchmaker(store, config);

        let result = mm.join(ParticipantId::new("alice")).await;

        assert_eq!(result.unwrap_err(), MatchmakingError::NoOpponent);
        assert_eq!(mm.waiting_participant().await, None);
    }

    #[tokio::test]
    async fn test_deck_fetch_failure_reaches_both_callers() {
        // bob has no account
        let store = store_with(&[("alice", trolls("a", 4, 10.0))]).await;
        let mm = matchmaker(store.clone(), MatchmakingConfig::default());

        let pending = match mm.enter(ParticipantId::new("alice")).await.unwrap() {
            Entry::Waiting(p) => p,
            Entry::Paired(_) => panic!("first caller must wait"),
        };

        let expected = MatchmakingError::Store(StoreError::UnknownParticipant(ParticipantId::new("bob")));
        assert_eq!(mm.enter(ParticipantId::new("bob")).await.unwrap_err(), expected);
        assert_eq!(mm.wait(pending).await.unwrap_err(), expected);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_void_battle_touches_no_records() {
        let store = store_with(&[
            ("alice", trolls("a", 3, 10.0)),
            ("bob", trolls("b", 9, 10.0)),
        ]).await;
        let mm = Arc::new(matchmaker(store.clone(), MatchmakingConfig::default()));

        let waiter = {
            let mm = mm.clone();
            tokio::spawn(async move { mm.join(ParticipantId::new("alice")).await })
        };
        while mm.waiting_participant().await.is_none() {
            tokio::task::yield_now().await;
        }
        let result = mm.join(ParticipantId::new("bob")).await.unwrap();
        let waited = waiter.await.unwrap().unwrap();

        assert_eq!(result.outcome(), &BattleOutcome::Void);
        assert_eq!(waited.battle_id, result.battle_id);
        assert_eq!(result.log_lines().len(), 1);
        assert_eq!(store.write_count(), 0);

        let alice = store.player_record(&ParticipantId::new("alice")).await.unwrap();
        assert_eq!(alice.games_played, 0);
    }

    #[tokio::test]
    async fn test_draw_records_games_without_rating_change() {
        let goblins = (0..4)
            .map(|i| Card::monster(format!("g{}", i), "Goblin", 80.0, Element::Normal).with_trait(SpecialTrait::Goblin))
            .collect();
        let dragons = (0..4)
            .map(|i| Card::monster(format!("d{}", i), "Dragon", 5.0, Element::Fire).with_trait(SpecialTrait::Dragon))
            .collect();
        let store = store_with(&[("alice", goblins), ("bob", dragons)]).await;
        let mm = matchmaker(store.clone(), MatchmakingConfig::default());

        let pending = match mm.enter(ParticipantId::new("alice")).await.unwrap() {
            Entry::Waiting(p) => p,
            Entry::Paired(_) => panic!("first caller must wait"),
        };
        let result = mm.join(ParticipantId::new("bob")).await.unwrap();
        mm.wait(pending).await.unwrap();

        assert_eq!(result.outcome(), &BattleOutcome::Draw);
        assert_eq!(result.summary(), "The battle ended in a draw. No ELO changes.");
        for name in ["alice", "bob"] {
            let record = store.player_record(&ParticipantId::new(name)).await.unwrap();
            assert_eq!(record.rating, 100);
            assert_eq!(record.games_played, 1);
            assert_eq!((record.wins, record.losses), (0, 0));
        }
    }

    /// Reads decks from an in-memory store but rejects every write.
    struct ReadOnlyStore(InMemoryStore);

    #[async_trait]
    impl BattleStore for ReadOnlyStore {
        async fn fetch_deck(&self, participant: &ParticipantId) -> Result<Vec<Card>, StoreError> {
            self.0.fetch_deck(participant).await
        }

        async fn apply_rating_delta(&self, _: &ParticipantId, _: i32) -> Result<(), StoreError> {
            Err(StoreError::Backend("read-only".into()))
        }

        async fn record_game_outcome(&self, _: &ParticipantId, _: bool, _: bool) -> Result<(), StoreError> {
            Err(StoreError::Backend("read-only".into()))
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_result() {
        let inner = InMemoryStore::new();
        for (name, damage) in [("alice", 100.0), ("bob", 1.0)] {
            let id = ParticipantId::new(name);
            inner.register_player(id.clone()).await.unwrap();
            inner.set_deck(&id, trolls(name, 4, damage)).await.unwrap();
        }
        let mm = matchmaker(Arc::new(ReadOnlyStore(inner)), MatchmakingConfig::default());

        let pending = match mm.enter(ParticipantId::new("alice")).await.unwrap() {
            Entry::Waiting(p) => p,
            Entry::Paired(_) => panic!("first caller must wait"),
        };
        let result = mm.join(ParticipantId::new("bob")).await.unwrap();
        let waited = mm.wait(pending).await.unwrap();

        assert_eq!(result.outcome().winner(), Some(&ParticipantId::new("alice")));
        assert_eq!(result.persistence_error, Some(StoreError::Backend("read-only".into())));
        assert!(!waited.is_persisted());
    }

    #[tokio::test]
    async fn test_replay_record_matches_report() {
        let store = store_with(&[
            ("alice", trolls("a", 5, 10.0)),
            ("bob", trolls("b", 5, 10.0)),
        ]).await;
        let mm = matchmaker(store, MatchmakingConfig::default());

        let pending = match mm.enter(ParticipantId::new("alice")).await.unwrap() {
            Entry::Waiting(p) => p,
            Entry::Paired(_) => panic!("first caller must wait"),
        };
        let result = mm.join(ParticipantId::new("bob")).await.unwrap();
        mm.wait(pending).await.unwrap();

        let setup = BattleSetup::from_bytes(result.replay.as_deref().unwrap()).unwrap();
        assert_eq!(setup.seed, result.report.seed);
        assert_eq!(run_battle(setup, mm.battle_config()), result.report);
    }
}
