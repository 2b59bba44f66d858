//! Battle Engine
//!
//! The authoritative round loop. Given two decks and a seed it always
//! produces the same report, so any battle can be replayed from its setup.

use serde::{Serialize, Deserialize};

use crate::battle::deck::{Deck, DeckPair};
use crate::battle::events::{BattleEvent, BattleEventData, CardSnapshot};
use crate::battle::outcome::{score_battle, BattleOutcome, ParticipantUpdate, RatingDeltas};
use crate::battle::participant::ParticipantId;
use crate::battle::rules::{resolve_round, RoundContext};
use crate::core::rng::DeterministicRng;

/// Rules configuration for battles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BattleConfig {
    /// Hard cap on rounds.
    pub max_rounds: u32,
    /// Minimum cards each deck needs for the battle to run.
    pub min_deck_size: usize,
    /// Chance (percent) of a critical hit per side in a generic round.
    pub crit_chance_percent: u32,
    /// Rating changes for decisive battles.
    pub rating: RatingDeltas,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            max_rounds: crate::MAX_ROUNDS,
            min_deck_size: crate::MIN_DECK_SIZE,
            crit_chance_percent: crate::CRIT_CHANCE_PERCENT,
            rating: RatingDeltas::default(),
        }
    }
}

/// Everything a battle needs. Decks are moved in; the battle owns them.
///
/// A setup fully determines its battle, so its binary encoding doubles as a
/// replay record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BattleSetup {
    /// Owner of deck A.
    pub participant_a: ParticipantId,
    /// Owner of deck B.
    pub participant_b: ParticipantId,
    /// Deck A.
    pub deck_a: Deck,
    /// Deck B.
    pub deck_b: Deck,
    /// RNG seed.
    pub seed: u64,
}

impl BattleSetup {
    /// Encode as a compact replay record.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decode a replay record.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

/// Full record of a finished battle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BattleReport {
    /// Owner of deck A.
    pub participant_a: ParticipantId,
    /// Owner of deck B.
    pub participant_b: ParticipantId,
    /// Result.
    pub outcome: BattleOutcome,
    /// Ordered events.
    pub events: Vec<BattleEvent>,
    /// Rounds played.
    pub rounds: u32,
    /// Seed the battle ran with.
    pub seed: u64,
    /// Decks as they ended.
    pub final_decks: DeckPair,
    /// Persistence updates to apply (empty for a void battle).
    pub updates: Vec<ParticipantUpdate>,
}

impl BattleReport {
    /// Narration lines, in order.
    pub fn log_lines(&self) -> Vec<String> {
        self.events.iter().map(ToString::to_string).collect()
    }

    /// Final deck sizes, A then B.
    pub fn final_sizes(&self) -> [usize; 2] {
        [self.final_decks.a.len(), self.final_decks.b.len()]
    }
}

/// Run a battle to completion.
///
/// # Rounds
///
/// While both decks have cards and the round cap is not reached, one card
/// is drawn from each deck (uniformly over its current contents), the rule
/// cascade resolves the pair, and the result is applied to the decks.
///
/// # Determinism
///
/// All randomness comes from a [`DeterministicRng`] seeded with
/// `setup.seed`, consumed in a fixed order: draw A, draw B, then crit A and
/// crit B for generic rounds.
pub fn run_battle(setup: BattleSetup, config: &BattleConfig) -> BattleReport {
    let BattleSetup { participant_a, participant_b, deck_a, deck_b, seed } = setup;
    let mut decks = DeckPair::new(deck_a, deck_b);
    let mut events = Vec::new();

    // 0. Deck size precondition
    if decks.a.len() < config.min_deck_size || decks.b.len() < config.min_deck_size {
        events.push(BattleEvent::new(0, BattleEventData::InsufficientDecks {
            size_a: decks.a.len(),
            size_b: decks.b.len(),
            required: config.min_deck_size,
        }));

        return BattleReport {
            participant_a,
            participant_b,
            outcome: BattleOutcome::Void,
            events,
            rounds: 0,
            seed,
            final_decks: decks,
            updates: Vec::new(),
        };
    }

    events.push(BattleEvent::new(0, BattleEventData::BattleStarted {
        participant_a: participant_a.to_string(),
        participant_b: participant_b.to_string(),
    }));

    // 1. Round loop
    let mut rng = DeterministicRng::new(seed);
    let mut rounds = 0u32;

    while !decks.a.is_empty() && !decks.b.is_empty() && rounds < config.max_rounds {
        rounds += 1;

        let (index_a, index_b) = match (decks.a.draw_index(&mut rng), decks.b.draw_index(&mut rng)) {
            (Some(a), Some(b)) => (a, b),
            _ => break,
        };

        let resolution = {
            let (card_a, card_b) = match (decks.a.get(index_a), decks.b.get(index_b)) {
                (Some(a), Some(b)) => (a, b),
                _ => break,
            };

            events.push(BattleEvent::new(rounds, BattleEventData::RoundStarted {
                card_a: CardSnapshot::from(card_a),
                card_b: CardSnapshot::from(card_b),
            }));

            let mut ctx = RoundContext {
                round: rounds,
                crit_chance_percent: config.crit_chance_percent,
                rng: &mut rng,
                events: &mut events,
            };
            resolve_round(card_a, card_b, &mut ctx)
        };

        resolution.apply(&mut decks, index_a, index_b);

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(
            round = rounds,
            size_a = decks.a.len(),
            size_b = decks.b.len(),
            ?resolution,
            "round resolved"
        );
    }

    // 2. Scoring
    let (outcome, updates) = score_battle(
        [&participant_a, &participant_b],
        [decks.a.len(), decks.b.len()],
        config.rating,
    );

    let closing = match &outcome {
        BattleOutcome::Win { winner, loser } => BattleEventData::BattleWon {
            winner: winner.to_string(),
            loser: loser.to_string(),
        },
        _ => BattleEventData::BattleDrawn,
    };
    events.push(BattleEvent::new(rounds, closing));

    BattleReport {
        participant_a,
        participant_b,
        outcome,
        events,
        rounds,
        seed,
        final_decks: decks,
        updates,
    }
}

// =============================================================================
// TESTS
// =============================================================================
