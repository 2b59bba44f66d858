//! Rule Cascade
//!
//! Resolves one round between the two drawn cards. Special interactions are
//! checked first, in a fixed order; the first one that applies ends the
//! round. Otherwise damage is compared after elemental effectiveness and
//! critical hits, and the stronger card captures the weaker one.

use crate::battle::card::{Card, CardKind, Element, SpecialTrait};
use crate::battle::deck::{DeckPair, Side};
use crate::battle::events::{BattleEvent, BattleEventData, CardSnapshot};
use crate::core::rng::DeterministicRng;

/// Special interactions, in cascade order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecialRule {
    /// Goblin vs dragon: the goblin does not attack.
    Fear,
    /// Ork vs wizard: the wizard controls the ork.
    MindControl,
    /// Knight vs water spell: the knight is destroyed.
    Drowning,
    /// Kraken vs any spell: nothing happens to the kraken.
    SpellImmunity,
    /// Fire elf vs dragon: the elf evades.
    Evasion,
}

impl SpecialRule {
    /// Cascade order.
    pub const CASCADE: [SpecialRule; 5] = [
        SpecialRule::Fear,
        SpecialRule::MindControl,
        SpecialRule::Drowning,
        SpecialRule::SpellImmunity,
        SpecialRule::Evasion,
    ];

    /// Whether the rule applies with `subject` as the affected card.
    pub fn applies(self, subject: &Card, opponent: &Card) -> bool {
        match self {
            SpecialRule::Fear => {
                subject.is_monster_with(SpecialTrait::Goblin)
                    && opponent.is_monster_with(SpecialTrait::Dragon)
            }
            SpecialRule::MindControl => {
                subject.is_monster_with(SpecialTrait::Ork)
                    && opponent.is_monster_with(SpecialTrait::Wizard)
            }
            SpecialRule::Drowning => {
                subject.is_monster_with(SpecialTrait::Knight)
                    && opponent.is_spell()
                    && opponent.element == Element::Water
            }
            SpecialRule::SpellImmunity => {
                subject.is_monster_with(SpecialTrait::Kraken) && opponent.is_spell()
            }
            SpecialRule::Evasion => {
                subject.is_monster_with(SpecialTrait::FireElf)
                    && opponent.is_monster_with(SpecialTrait::Dragon)
            }
        }
    }
}

/// Find the first special rule that applies to this pairing.
///
/// Deck A's card is always the subject. A pairing that would only trigger a
/// rule with deck B's card as the subject resolves generically.
pub fn find_special_rule(card_a: &Card, card_b: &Card) -> Option<SpecialRule> {
    SpecialRule::CASCADE
        .iter()
        .copied()
        .find(|rule| rule.applies(card_a, card_b))
}

/// Damage `attacker` deals to `defender` after elemental effectiveness.
///
/// Only a spell attacking a monster is affected: doubled if the spell's
/// element beats the monster's, halved if the monster's element beats the
/// spell's. Every other pairing uses raw damage.
pub fn effective_damage(attacker: &Card, defender: &Card) -> f64 {
    match (attacker.kind, defender.kind) {
        (CardKind::Spell, CardKind::Monster) => {
            if attacker.element.beats(defender.element) {
                attacker.damage * 2.0
            } else if defender.element.beats(attacker.element) {
                attacker.damage / 2.0
            } else {
                attacker.damage
            }
        }
        _ => attacker.damage,
    }
}

/// What a round does to the decks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundResolution {
    /// Both drawn cards stay where they are.
    NoCapture,
    /// The drawn card of this side is destroyed.
    Destroy(Side),
    /// This side captures the other side's drawn card.
    Capture {
        /// Capturing side.
        by: Side,
    },
}

impl RoundResolution {
    /// Apply to the decks, given the indices of the two drawn cards.
    pub fn apply(self, decks: &mut DeckPair, index_a: usize, index_b: usize) {
        let index_of = |side: Side| match side {
            Side::A => index_a,
            Side::B => index_b,
        };

        match self {
            RoundResolution::NoCapture => {}
            RoundResolution::Destroy(side) => {
                decks.get_mut(side).remove(index_of(side));
            }
            RoundResolution::Capture { by } => {
                let loser = by.other();
                decks.transfer(loser, index_of(loser));
            }
        }
    }
}

/// Per-round inputs that don't come from the cards.
pub struct RoundContext<'a> {
    /// Round number, for event tagging.
    pub round: u32,
    /// Chance (percent) of a critical hit per side.
    pub crit_chance_percent: u32,
    /// Battle RNG.
    pub rng: &'a mut DeterministicRng,
    /// Event sink.
    pub events: &'a mut Vec<BattleEvent>,
}

impl RoundContext<'_> {
    fn emit(&mut self, data: BattleEventData) {
        self.events.push(BattleEvent::new(self.round, data));
    }
}

/// Resolve one round between `card_a` (deck A) and `card_b` (deck B).
///
/// Narration is pushed to the context's event sink. The returned resolution
/// has not been applied to any deck yet.
pub fn resolve_round(card_a: &Card, card_b: &Card, ctx: &mut RoundContext<'_>) -> RoundResolution {
    if let Some(rule) = find_special_rule(card_a, card_b) {
        return resolve_special(rule, card_a, card_b, ctx);
    }

    resolve_generic(card_a, card_b, ctx)
}

fn resolve_special(
    rule: SpecialRule,
    subject: &Card,
    opponent: &Card,
    ctx: &mut RoundContext<'_>,
) -> RoundResolution {
    let subject_name = subject.name.clone();
    let opponent_name = opponent.name.clone();

    match rule {
        SpecialRule::Fear => {
            ctx.emit(BattleEventData::Fear { goblin: subject_name, dragon: opponent_name });
            RoundResolution::NoCapture
        }
        SpecialRule::MindControl => {
            ctx.emit(BattleEventData::MindControl { wizard: opponent_name, ork: subject_name });
            RoundResolution::NoCapture
        }
        SpecialRule::Drowning => {
            ctx.emit(BattleEventData::Drowned {
                side: Side::A,
                knight: subject_name,
                spell: opponent_name,
            });
            RoundResolution::Destroy(Side::A)
        }
        SpecialRule::SpellImmunity => {
            ctx.emit(BattleEventData::SpellImmunity { kraken: subject_name, spell: opponent_name });
            RoundResolution::NoCapture
        }
        SpecialRule::Evasion => {
            ctx.emit(BattleEventData::Evasion { elf: subject_name, dragon: opponent_name });
            RoundResolution::NoCapture
        }
    }
}

fn resolve_generic(card_a: &Card, card_b: &Card, ctx: &mut RoundContext<'_>) -> RoundResolution {
    let mut damage_a = effective_damage(card_a, card_b);
    let mut damage_b = effective_damage(card_b, card_a);

    // Both rolls happen every generic round, A first
    let crit_a = ctx.rng.roll_percent(ctx.crit_chance_percent);
    let crit_b = ctx.rng.roll_percent(ctx.crit_chance_percent);

    if crit_a {
        damage_a *= 2.0;
        ctx.emit(BattleEventData::CriticalHit {
            side: Side::A,
            attacker: card_a.name.clone(),
            defender: card_b.name.clone(),
            damage: damage_a,
        });
    }
    if crit_b {
        damage_b *= 2.0;
        ctx.emit(BattleEventData::CriticalHit {
            side: Side::B,
            attacker: card_b.name.clone(),
            defender: card_a.name.clone(),
            damage: damage_b,
        });
    }

    if damage_a > damage_b {
        ctx.emit(BattleEventData::Captured {
            by: Side::A,
            winner: CardSnapshot { name: card_a.name.clone(), damage: damage_a },
            loser: CardSnapshot { name: card_b.name.clone(), damage: damage_b },
        });
        RoundResolution::Capture { by: Side::A }
    } else if damage_b > damage_a {
        ctx.emit(BattleEventData::Captured {
            by: Side::B,
            winner: CardSnapshot { name: card_b.name.clone(), damage: damage_b },
            loser: CardSnapshot { name: card_a.name.clone(), damage: damage_a },
        });
        RoundResolution::Capture { by: Side::B }
    } else {
        ctx.emit(BattleEventData::Standoff {
            card_a: card_a.name.clone(),
            card_b: card_b.name.clone(),
            damage: damage_a,
        });
        RoundResolution::NoCapture
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::deck::Deck;

    fn monster(name: &str, damage: f64, element: Element, special: SpecialTrait) -> Card {
        Card::monster(name, name, damage, element).with_trait(special)
    }

    fn plain(name: &str, damage: f64) -> Card {
        Card::monster(name, name, damage, Element::Normal)
    }

    fn spell(name: &str, damage: f64, element: Element) -> Card {
        Card::spell(name, name, damage, element)
    }

    /// Resolve with crits disabled.
    fn resolve(card_a: &Card, card_b: &Card) -> (RoundResolution, Vec<BattleEvent>) {
        resolve_with(card_a, card_b, 0, 1)
    }

    fn resolve_with(card_a: &Card, card_b: &Card, crit: u32, seed: u64) -> (RoundResolution, Vec<BattleEvent>) {
        let mut rng = DeterministicRng::new(seed);
        let mut events = Vec::new();
        let mut ctx = RoundContext {
            round: 1,
            crit_chance_percent: crit,
            rng: &mut rng,
            events: &mut events,
        };
        let resolution = resolve_round(card_a, card_b, &mut ctx);
        (resolution, events)
    }

    #[test]
    fn test_fear_short_circuits_damage() {
        let goblin = monster("Goblin", 1000.0, Element::Normal, SpecialTrait::Goblin);
        let dragon = monster("Dragon", 1.0, Element::Fire, SpecialTrait::Dragon);

        let (resolution, events) = resolve(&goblin, &dragon);
        assert_eq!(resolution, RoundResolution::NoCapture);
        assert_eq!(events[0].to_string(), "Goblin is too afraid to attack Dragon!");
        assert_eq!(events.len(), 1);

        // Goblin on deck B is not afraid: plain damage comparison
        let (resolution, events) = resolve(&dragon, &goblin);
        assert_eq!(resolution, RoundResolution::Capture { by: Side::B });
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_dragon_on_deck_a_fights_goblin() {
        let dragon = monster("Dragon", 60.0, Element::Fire, SpecialTrait::Dragon);
        let goblin = monster("Goblin", 40.0, Element::Normal, SpecialTrait::Goblin);

        assert_eq!(find_special_rule(&dragon, &goblin), None);
        let (resolution, events) = resolve(&dragon, &goblin);
        assert_eq!(resolution, RoundResolution::Capture { by: Side::A });
        assert!(matches!(events[0].data, BattleEventData::Captured { by: Side::A, .. }));
    }

    #[test]
    fn test_mind_control() {
        let ork = monster("Ork", 50.0, Element::Normal, SpecialTrait::Ork);
        let wizard = monster("Wizard", 5.0, Element::Normal, SpecialTrait::Wizard);

        let (resolution, events) = resolve(&ork, &wizard);
        assert_eq!(resolution, RoundResolution::NoCapture);
        assert_eq!(events[0].to_string(), "Wizard controls Ork, preventing it from attacking!");
    }

    #[test]
    fn test_knight_drowns_only_as_deck_a_card() {
        let knight = monster("Knight", 99.0, Element::Normal, SpecialTrait::Knight);
        let water = spell("Water Spell", 1.0, Element::Water);

        let (resolution, events) = resolve(&knight, &water);
        assert_eq!(resolution, RoundResolution::Destroy(Side::A));
        assert_eq!(events[0].to_string(), "Knight drowns instantly due to Water Spell!");

        // Spell on deck A vs knight on deck B: Water vs Normal halves, 0.5 vs 99
        let (resolution, events) = resolve(&water, &knight);
        assert_eq!(resolution, RoundResolution::Capture { by: Side::B });
        assert!(!events.iter().any(|e| matches!(e.data, BattleEventData::Drowned { .. })));
    }

    #[test]
    fn test_knight_vs_fire_spell_is_generic() {
        let knight = monster("Knight", 20.0, Element::Normal, SpecialTrait::Knight);
        let fire = spell("FireSpell", 15.0, Element::Fire);

        // Fire beats Normal: 30 vs 20
        let (resolution, _) = resolve(&knight, &fire);
        assert_eq!(resolution, RoundResolution::Capture { by: Side::B });
    }

    #[test]
    fn test_kraken_immune_to_any_spell() {
        let kraken = monster("Kraken", 1.0, Element::Water, SpecialTrait::Kraken);
        for element in [Element::Fire, Element::Water, Element::Normal] {
            let s = spell("Spell", 500.0, element);
            let (resolution, events) = resolve(&kraken, &s);
            assert_eq!(resolution, RoundResolution::NoCapture);
            assert_eq!(events[0].to_string(), "Kraken is immune to spells!");
        }
    }

    #[test]
    fn test_special_rules_use_deck_a_card_as_subject() {
        let knight = monster("Knight", 10.0, Element::Normal, SpecialTrait::Knight);
        let water = spell("Water Spell", 10.0, Element::Water);
        assert_eq!(find_special_rule(&knight, &water), Some(SpecialRule::Drowning));
        assert_eq!(find_special_rule(&water, &knight), None);

        let kraken = monster("Kraken", 10.0, Element::Water, SpecialTrait::Kraken);
        assert_eq!(find_special_rule(&kraken, &water), Some(SpecialRule::SpellImmunity));
        assert_eq!(find_special_rule(&water, &kraken), None);
    }

    #[test]
    fn test_fire_elf_evades_dragon() {
        let elf = monster("FireElf", 1.0, Element::Fire, SpecialTrait::FireElf);
        let dragon = monster("Dragon", 100.0, Element::Fire, SpecialTrait::Dragon);

        let (resolution, events) = resolve(&elf, &dragon);
        assert_eq!(resolution, RoundResolution::NoCapture);
        assert_eq!(events[0].to_string(), "FireElf evades Dragon's attack!");
    }

    #[test]
    fn test_no_special_rule_for_plain_cards() {
        assert_eq!(find_special_rule(&plain("A", 1.0), &plain("B", 2.0)), None);
    }

    #[test]
    fn test_elemental_cycle() {
        let water_spell = spell("WaterSpell", 10.0, Element::Water);
        let fire_spell = spell("FireSpell", 10.0, Element::Fire);
        let fire_monster = monster("FireTroll", 10.0, Element::Fire, SpecialTrait::None);
        let water_monster = monster("WaterTroll", 10.0, Element::Water, SpecialTrait::None);
        let normal_monster = plain("Troll", 10.0);

        assert_eq!(effective_damage(&water_spell, &fire_monster), 20.0);
        assert_eq!(effective_damage(&fire_spell, &water_monster), 5.0);
        assert_eq!(effective_damage(&fire_spell, &normal_monster), 20.0);
        assert_eq!(effective_damage(&water_spell, &normal_monster), 5.0);
        assert_eq!(effective_damage(&water_spell, &water_monster), 10.0);
    }

    #[test]
    fn test_monster_damage_unmodified() {
        let fire_monster = monster("FireTroll", 12.0, Element::Fire, SpecialTrait::None);
        let water_monster = monster("WaterTroll", 12.0, Element::Water, SpecialTrait::None);
        let water_spell = spell("WaterSpell", 10.0, Element::Water);

        assert_eq!(effective_damage(&fire_monster, &water_monster), 12.0);
        assert_eq!(effective_damage(&fire_monster, &water_spell), 12.0);
        assert_eq!(effective_damage(&water_spell, &spell("FireSpell", 3.0, Element::Fire)), 10.0);
    }

    #[test]
    fn test_generic_capture_and_standoff() {
        let strong = plain("Strong", 20.0);
        let weak = plain("Weak", 10.0);

        let (resolution, events) = resolve(&weak, &strong);
        assert_eq!(resolution, RoundResolution::Capture { by: Side::B });
        assert_eq!(events[0].to_string(), "Strong (20) defeats Weak (10) and captures it!");

        let (resolution, _) = resolve(&strong, &plain("Twin", 20.0));
        assert_eq!(resolution, RoundResolution::NoCapture);
    }

    #[test]
    fn test_guaranteed_crits_double_both_sides() {
        let a = plain("A", 10.0);
        let b = plain("B", 15.0);

        let (resolution, events) = resolve_with(&a, &b, 100, 7);
        let crits: Vec<_> = events
            .iter()
            .filter(|e| matches!(e.data, BattleEventData::CriticalHit { .. }))
            .collect();
        assert_eq!(crits.len(), 2);
        assert_eq!(crits[0].to_string(), "CRITICAL HIT! A deals double damage (20) to B!");
        // 20 vs 30: B still wins
        assert_eq!(resolution, RoundResolution::Capture { by: Side::B });
    }

    #[test]
    fn test_special_rules_never_roll_crits() {
        let goblin = monster("Goblin", 1.0, Element::Normal, SpecialTrait::Goblin);
        let dragon = monster("Dragon", 1.0, Element::Fire, SpecialTrait::Dragon);

        let mut rng = DeterministicRng::new(11);
        let before = rng.state();
        let mut events = Vec::new();
        let mut ctx = RoundContext {
            round: 1,
            crit_chance_percent: 100,
            rng: &mut rng,
            events: &mut events,
        };
        resolve_round(&goblin, &dragon, &mut ctx);
        assert_eq!(rng.state(), before);
    }

    #[test]
    fn test_apply_resolution() {
        let mut decks = DeckPair::new(
            Deck::new(vec![plain("a0", 1.0), plain("a1", 1.0)]),
            Deck::new(vec![plain("b0", 1.0), plain("b1", 1.0), plain("b2", 1.0)]),
        );

        RoundResolution::Capture { by: Side::A }.apply(&mut decks, 0, 2);
        assert_eq!(decks.a.len(), 3);
        assert_eq!(decks.a.cards()[2].name, "b2");
        assert_eq!(decks.b.len(), 2);

        RoundResolution::Destroy(Side::A).apply(&mut decks, 1, 0);
        assert_eq!(decks.a.len(), 2);
        assert_eq!(decks.total_len(), 4);

        RoundResolution::NoCapture.apply(&mut decks, 0, 0);
        assert_eq!(decks.total_len(), 4);
    }
}
