//! Battle Outcome and Scoring
//!
//! Turns final deck sizes into a result and the persistence updates the
//! store has to apply. The engine itself never writes anything.

use serde::{Serialize, Deserialize};

use crate::battle::deck::Side;
use crate::battle::participant::ParticipantId;

/// Terminal classification of a battle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BattleOutcome {
    /// One participant ended with more cards.
    Win {
        /// Participant with the larger final deck.
        winner: ParticipantId,
        /// Participant with the smaller final deck.
        loser: ParticipantId,
    },
    /// Final decks are the same size.
    Draw,
    /// A deck was too small to battle; nothing happened.
    Void,
}

impl BattleOutcome {
    /// Winner, if any.
    pub fn winner(&self) -> Option<&ParticipantId> {
        match self {
            BattleOutcome::Win { winner, .. } => Some(winner),
            _ => None,
        }
    }

    /// Whether this battle counts for ratings and statistics.
    pub fn is_void(&self) -> bool {
        matches!(self, BattleOutcome::Void)
    }
}

/// Persistence update for one participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantUpdate {
    /// Who to update.
    pub participant: ParticipantId,
    /// Additive rating change (None for a draw).
    pub rating_delta: Option<i32>,
    /// Record a win.
    pub won: bool,
    /// Record a loss.
    pub lost: bool,
}

/// Rating deltas applied to decisive battles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RatingDeltas {
    /// Added to the winner's rating.
    pub win: i32,
    /// Added to the loser's rating (negative).
    pub loss: i32,
}

impl Default for RatingDeltas {
    fn default() -> Self {
        Self { win: 3, loss: -5 }
    }
}

/// Score a finished battle from the final deck sizes.
///
/// The side with more cards wins. Equal sizes are a draw: both participants
/// get a game recorded, neither a win nor a loss, and no rating change.
pub fn score_battle(
    participants: [&ParticipantId; 2],
    final_sizes: [usize; 2],
    deltas: RatingDeltas,
) -> (BattleOutcome, Vec<ParticipantUpdate>) {
    let [a, b] = participants;
    let [size_a, size_b] = final_sizes;

    let winner_side = match size_a.cmp(&size_b) {
        std::cmp::Ordering::Greater => Side::A,
        std::cmp::Ordering::Less => Side::B,
        std::cmp::Ordering::Equal => {
            let updates = [a, b]
                .into_iter()
                .map(|p| ParticipantUpdate {
                    participant: p.clone(),
                    rating_delta: None,
                    won: false,
                    lost: false,
                })
                .collect();
            return (BattleOutcome::Draw, updates);
        }
    };

    let (winner, loser) = match winner_side {
        Side::A => (a, b),
        Side::B => (b, a),
    };

    let updates = vec![
        ParticipantUpdate {
            participant: winner.clone(),
            rating_delta: Some(deltas.win),
            won: true,
            lost: false,
        },
        ParticipantUpdate {
            participant: loser.clone(),
            rating_delta: Some(deltas.loss),
            won: false,
            lost: true,
        },
    ];

    (
        BattleOutcome::Win {
            winner: winner.clone(),
            loser: loser.clone(),
        },
        updates,
    )
}
