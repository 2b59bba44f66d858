//! Battle Logic Module
//!
//! All battle simulation code. Deterministic given a seed.
//!
//! ## Module Structure
//!
//! - `card`: Cards, elements, special traits
//! - `deck`: Decks owned by a battle
//! - `participant`: Participant identity
//! - `rules`: Rule cascade for a single round
//! - `engine`: Round loop and termination
//! - `outcome`: Scoring and persistence updates
//! - `events`: Structured battle log

pub mod card;
pub mod deck;
pub mod participant;
pub mod rules;
pub mod engine;
pub mod outcome;
pub mod events;

// Re-export key types
pub use card::{Card, CardKind, Element, SpecialTrait};
pub use deck::{Deck, DeckPair, Side};
pub use participant::ParticipantId;
pub use engine::{run_battle, BattleConfig, BattleReport, BattleSetup};
pub use outcome::{BattleOutcome, ParticipantUpdate, RatingDeltas};
pub use events::{BattleEvent, BattleEventData};
