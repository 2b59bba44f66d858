//! Decks
//!
//! A battle owns both decks outright for its whole run. Cards move between
//! them by value; nothing outside the battle can observe the intermediate
//! states.

use serde::{Serialize, Deserialize};

use crate::battle::card::Card;
use crate::core::rng::DeterministicRng;

/// Which of the two battling decks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// First deck (the participant who was waiting).
    A,
    /// Second deck (the participant who completed the pairing).
    B,
}

impl Side {
    /// The opposing side.
    #[inline]
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Ordered collection of cards owned by one participant for one battle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Create a deck from cards, preserving order.
    pub fn new(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// Number of cards.
    #[inline]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the deck has no cards left.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Card at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Card> {
        self.cards.get(index)
    }

    /// Pick a card index uniformly over the current contents.
    ///
    /// Drawing does not remove the card; the same card can be drawn again
    /// next round if it is still here.
    pub fn draw_index(&self, rng: &mut DeterministicRng) -> Option<usize> {
        rng.next_index(self.cards.len())
    }

    /// Take the card at `index` out of the deck.
    pub fn remove(&mut self, index: usize) -> Option<Card> {
        if index < self.cards.len() {
            Some(self.cards.remove(index))
        } else {
            None
        }
    }

    /// Append a card at the end.
    pub fn push(&mut self, card: Card) {
        self.cards.push(card);
    }

    /// Cards in order.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Consume the deck, returning its cards.
    pub fn into_cards(self) -> Vec<Card> {
        self.cards
    }
}

impl From<Vec<Card>> for Deck {
    fn from(cards: Vec<Card>) -> Self {
        Self::new(cards)
    }
}

/// Both decks of one battle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckPair {
    /// Deck A.
    pub a: Deck,
    /// Deck B.
    pub b: Deck,
}

impl DeckPair {
    /// Pair up two decks.
    pub fn new(a: Deck, b: Deck) -> Self {
        Self { a, b }
    }

    /// Deck for `side`.
    #[inline]
    pub fn get(&self, side: Side) -> &Deck {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    /// Mutable deck for `side`.
    #[inline]
    pub fn get_mut(&mut self, side: Side) -> &mut Deck {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }

    /// Cards across both decks.
    #[inline]
    pub fn total_len(&self) -> usize {
        self.a.len() + self.b.len()
    }

    /// Move the card at `index` from `from`'s deck to the end of the other
    /// deck. Returns false if there was no such card.
    pub fn transfer(&mut self, from: Side, index: usize) -> bool {
        match self.get_mut(from).remove(index) {
            Some(card) => {
                self.get_mut(from.other()).push(card);
                true
            }
            None => false,
        }
    }
}
