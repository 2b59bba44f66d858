//! Card Definitions
//!
//! Cards are immutable once built. Only their deck membership changes while a
//! battle runs.

use std::fmt;
use serde::{Serialize, Deserialize};

// =============================================================================
// ELEMENT
// =============================================================================

/// Elemental affinity of a card.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    /// Fire element.
    Fire,
    /// Water element.
    Water,
    /// No particular element.
    #[default]
    Normal,
}

impl Element {
    /// Whether `self` has the advantage over `other` in the
    /// Water > Fire > Normal > Water cycle.
    #[inline]
    pub fn beats(self, other: Element) -> bool {
        matches!(
            (self, other),
            (Element::Water, Element::Fire)
                | (Element::Fire, Element::Normal)
                | (Element::Normal, Element::Water)
        )
    }

    /// Infer the element from a catalog card name.
    ///
    /// "Water" wins over "Fire" when a name mentions both.
    pub fn from_name(name: &str) -> Element {
        let lower = name.to_ascii_lowercase();
        if lower.contains("water") {
            Element::Water
        } else if lower.contains("fire") {
            Element::Fire
        } else {
            Element::Normal
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Element::Fire => "Fire",
            Element::Water => "Water",
            Element::Normal => "Normal",
        };
        f.write_str(name)
    }
}

// =============================================================================
// CARD KIND
// =============================================================================

/// Monster or spell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    /// A creature card.
    Monster,
    /// A spell card.
    Spell,
}

// =============================================================================
// SPECIAL TRAIT
// =============================================================================

/// Capability tag that special battle rules key on.
///
/// Set when the card is created and never derived from display text during a
/// battle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialTrait {
    /// No special interactions.
    #[default]
    None,
    /// Too afraid to attack dragons.
    Goblin,
    /// Frightens goblins, is evaded by fire elves.
    Dragon,
    /// Can be controlled by wizards.
    Ork,
    /// Controls orks.
    Wizard,
    /// Drowns when hit by water spells.
    Knight,
    /// Immune to spells.
    Kraken,
    /// Evades dragons.
    FireElf,
}

impl SpecialTrait {
    /// Catalog keywords, checked in order.
    const KEYWORDS: [(&'static str, SpecialTrait); 7] = [
        ("FireElf", SpecialTrait::FireElf),
        ("Goblin", SpecialTrait::Goblin),
        ("Dragon", SpecialTrait::Dragon),
        ("Ork", SpecialTrait::Ork),
        ("Wizard", SpecialTrait::Wizard),
        ("Knight", SpecialTrait::Knight),
        ("Kraken", SpecialTrait::Kraken),
    ];

    /// Infer a trait from a catalog monster name. First keyword wins.
    pub fn from_name(name: &str) -> SpecialTrait {
        Self::KEYWORDS
            .iter()
            .find(|(keyword, _)| name.contains(keyword))
            .map(|(_, special)| *special)
            .unwrap_or_default()
    }
}

// =============================================================================
// CARD
// =============================================================================

/// A single card.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Opaque card identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Raw damage value.
    pub damage: f64,
    /// Monster or spell.
    pub kind: CardKind,
    /// Elemental affinity.
    pub element: Element,
    /// Special rule tag (monsters only).
    #[serde(default)]
    pub special: SpecialTrait,
}

impl Card {
    /// Create a monster card without special traits.
    pub fn monster(id: impl Into<String>, name: impl Into<String>, damage: f64, element: Element) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            damage,
            kind: CardKind::Monster,
            element,
            special: SpecialTrait::None,
        }
    }

    /// Create a spell card.
    pub fn spell(id: impl Into<String>, name: impl Into<String>, damage: f64, element: Element) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            damage,
            kind: CardKind::Spell,
            element,
            special: SpecialTrait::None,
        }
    }

    /// Attach a special trait. Ignored for spells.
    pub fn with_trait(mut self, special: SpecialTrait) -> Self {
        if self.is_monster() {
            self.special = special;
        }
        self
    }

    /// Build a card from catalog data (id, name, damage), following the
    /// package naming convention:
    ///
    /// - names containing "Spell" are spells, everything else is a monster
    /// - the element comes from "Water"/"Fire" in the name, else Normal
    /// - monsters get their special trait from name keywords
    pub fn from_catalog(id: impl Into<String>, name: impl Into<String>, damage: f64) -> Self {
        let name = name.into();
        let element = Element::from_name(&name);

        if name.to_ascii_lowercase().contains("spell") {
            Self::spell(id, name, damage, element)
        } else {
            let special = SpecialTrait::from_name(&name);
            Self::monster(id, name, damage, element).with_trait(special)
        }
    }

    /// Is this a monster card.
    #[inline]
    pub fn is_monster(&self) -> bool {
        self.kind == CardKind::Monster
    }

    /// Is this a spell card.
    #[inline]
    pub fn is_spell(&self) -> bool {
        self.kind == CardKind::Spell
    }

    /// Is this a monster carrying the given trait.
    #[inline]
    pub fn is_monster_with(&self, special: SpecialTrait) -> bool {
        self.is_monster() && self.special == special
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
