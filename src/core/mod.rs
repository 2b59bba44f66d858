//! Core deterministic primitives.
//!
//! Everything a battle needs to be replayable from its seed.

pub mod rng;

pub use rng::{DeterministicRng, derive_battle_seed};
