//! Deterministic Random Number Generator
//!
//! Xorshift128+ seeded through SplitMix64. Every random decision a battle
//! makes (card draws, critical hit rolls) goes through this generator, so a
//! battle replays identically from its seed.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use card_battle::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(12345);
/// let value = rng.next_u64();
/// assert_eq!(value, 6233086606872742541); // Always the same!
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Xorshift must never run from the all-zero state
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        // Modulo bias is negligible for deck-sized ranges
        (self.next_u64() % max as u64) as u32
    }

    /// Pick a uniformly distributed index into a collection of `len` items.
    ///
    /// Returns `None` for an empty collection.
    #[inline]
    pub fn next_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let bounded = u32::try_from(len).unwrap_or(u32::MAX);
        Some(self.next_int(bounded) as usize)
    }

    /// Roll a percentage check: true with probability `percent`/100.
    ///
    /// Always consumes exactly one value, so replays stay aligned even when
    /// `percent` is 0 or 100.
    #[inline]
    pub fn roll_percent(&mut self, percent: u32) -> bool {
        self.next_int(100) < percent
    }

    /// Get current state (for checkpointing/debugging).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }
}

/// SplitMix64 for seed initialization.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a battle seed from the battle id and both participants.
///
/// The participants are hashed in the order given: deck A first, deck B
/// second. Swapping them yields a different seed.
pub fn derive_battle_seed(battle_id: &[u8; 16], participants: [&str; 2]) -> u64 {
    let mut hasher = Sha256::new();

    hasher.update(b"CARD_BATTLE_SEED_V1");
    hasher.update(battle_id);

    for name in participants {
        // Length prefix keeps ("ab", "c") and ("a", "bc") apart
        hasher.update((name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
    }

    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================
