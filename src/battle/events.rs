//! Battle Events
//!
//! Structured record of everything that happened in a battle. Each event
//! renders to one human-readable narration line; the ordered lines form the
//! battle log sent to both participants.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::battle::card::Card;
use crate::battle::deck::Side;

/// Card as it appeared in a round (name and raw damage).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardSnapshot {
    /// Display name.
    pub name: String,
    /// Raw damage.
    pub damage: f64,
}

impl From<&Card> for CardSnapshot {
    fn from(card: &Card) -> Self {
        Self {
            name: card.name.clone(),
            damage: card.damage,
        }
    }
}

/// Battle event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BattleEventData {
    /// Both decks passed the size check.
    BattleStarted {
        participant_a: String,
        participant_b: String,
    },

    /// A deck was too small; the battle is void.
    InsufficientDecks {
        size_a: usize,
        size_b: usize,
        required: usize,
    },

    /// Cards drawn for a round.
    RoundStarted {
        card_a: CardSnapshot,
        card_b: CardSnapshot,
    },

    /// A goblin refused to attack a dragon.
    Fear {
        goblin: String,
        dragon: String,
    },

    /// A wizard took control of an ork.
    MindControl {
        wizard: String,
        ork: String,
    },

    /// A knight was destroyed by a water spell.
    Drowned {
        side: Side,
        knight: String,
        spell: String,
    },

    /// A kraken shrugged off a spell.
    SpellImmunity {
        kraken: String,
        spell: String,
    },

    /// A fire elf evaded a dragon.
    Evasion {
        elf: String,
        dragon: String,
    },

    /// A card landed a critical hit.
    CriticalHit {
        side: Side,
        attacker: String,
        defender: String,
        damage: f64,
    },

    /// The stronger card captured the weaker one.
    Captured {
        by: Side,
        winner: CardSnapshot,
        loser: CardSnapshot,
    },

    /// Equal effective damage; nothing moves.
    Standoff {
        card_a: String,
        card_b: String,
        damage: f64,
    },

    /// The battle produced a winner.
    BattleWon {
        winner: String,
        loser: String,
    },

    /// The battle ended with equal deck sizes.
    BattleDrawn,
}

/// A battle event tagged with the round it happened in (0 before the first
/// round starts).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BattleEvent {
    /// Round number.
    pub round: u32,

    /// Event data.
    #[serde(flatten)]
    pub data: BattleEventData,
}

impl BattleEvent {
    /// Create a new event.
    pub fn new(round: u32, data: BattleEventData) -> Self {
        Self { round, data }
    }

    /// Whether this event moved or destroyed a card.
    pub fn changes_decks(&self) -> bool {
        matches!(
            self.data,
            BattleEventData::Captured { .. } | BattleEventData::Drowned { .. }
        )
    }
}

impl fmt::Display for BattleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            BattleEventData::BattleStarted { participant_a, participant_b } => {
                write!(f, "Battle started between {} and {}", participant_a, participant_b)
            }
            BattleEventData::InsufficientDecks { required, .. } => {
                write!(f, "Both players must have {} cards in their deck to battle.", required)
            }
            BattleEventData::RoundStarted { card_a, card_b } => write!(
                f,
                "Round {}: {} ({}) vs {} ({})",
                self.round, card_a.name, card_a.damage, card_b.name, card_b.damage
            ),
            BattleEventData::Fear { goblin, dragon } => {
                write!(f, "{} is too afraid to attack {}!", goblin, dragon)
            }
            BattleEventData::MindControl { wizard, ork } => {
                write!(f, "{} controls {}, preventing it from attacking!", wizard, ork)
            }
            BattleEventData::Drowned { knight, spell, .. } => {
                write!(f, "{} drowns instantly due to {}!", knight, spell)
            }
            BattleEventData::SpellImmunity { kraken, .. } => {
                write!(f, "{} is immune to spells!", kraken)
            }
            BattleEventData::Evasion { elf, dragon } => {
                write!(f, "{} evades {}'s attack!", elf, dragon)
            }
            BattleEventData::CriticalHit { attacker, defender, damage, .. } => write!(
                f,
                "CRITICAL HIT! {} deals double damage ({}) to {}!",
                attacker, damage, defender
            ),
            BattleEventData::Captured { winner, loser, .. } => write!(
                f,
                "{} ({}) defeats {} ({}) and captures it!",
                winner.name, winner.damage, loser.name, loser.damage
            ),
            BattleEventData::Standoff { card_a, card_b, damage } => write!(
                f,
                "{} and {} are evenly matched ({}); no card changes sides.",
                card_a, card_b, damage
            ),
            BattleEventData::BattleWon { winner, .. } => {
                write!(f, "Battle ended. Winner: {}", winner)
            }
            BattleEventData::BattleDrawn => {
                f.write_str("The battle ended in a draw. No ELO changes.")
            }
        }
    }
}
