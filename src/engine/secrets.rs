use std::collections::{BTreeMap, BTreeSet};

use crate::characters::Character;
use crate::rng::Rng;
use crate::types::{PlayerSecrets, Sighting};

use super::roles::RoleAssignment;

/// Character -> players that character's holder learned something about.
pub type SightGraph = BTreeMap<Character, BTreeSet<String>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Label {
    Bad,
    Stray,
    Named(Character),
    Lancelot,
    PercivalOrAssassin,
    MorganaOrMerlin,
    MorganaOrViviana,
    Notable,
    /// Resolved against Stray's holder before use.
    BadOrStray,
    NamedOrStray(Character),
}

impl Label {
    fn resolve(self, stray_holder: bool) -> Self {
        match self {
            Self::BadOrStray if stray_holder => Self::Stray,
            Self::BadOrStray => Self::Bad,
            Self::NamedOrStray(_) if stray_holder => Self::Stray,
            Self::NamedOrStray(character) => Self::Named(character),
            other => other,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::Bad | Self::BadOrStray => "bad",
            Self::Stray => "Stray",
            Self::Named(character) | Self::NamedOrStray(character) => character.name(),
            Self::Lancelot => "Lancelot",
            Self::PercivalOrAssassin => "Percival/Assassin",
            Self::MorganaOrMerlin => "Morgana/Merlin",
            Self::MorganaOrViviana => "Morgana/Viviana",
            Self::Notable => "notable",
        }
    }
}

/// What `viewer` learns about the holder of `target`, if anything.
pub fn reveal(viewer: Character, target: Character, merlin_in_play: bool) -> Option<Label> {
    specific_reveal(viewer, target, merlin_in_play)
        .or_else(|| nirlem_reveal(viewer, target))
        .or_else(|| minion_reveal(viewer, target))
}

fn specific_reveal(viewer: Character, target: Character, merlin_in_play: bool) -> Option<Label> {
    use Character::*;

    match (viewer, target) {
        (Meliagant, target) if target.is_bad() => Some(Label::NamedOrStray(target)),
        (Meliagant, Lot) => Some(Label::Named(Lot)),

        (Merlin, Oberon) => Some(Label::Named(Oberon)),
        (Merlin, Mordred | Accolon) => None,
        (Merlin, target) if target.is_bad() => Some(Label::Bad),
        (Merlin, Stray | Lot | Gawain) => Some(Label::Named(target)),
        (Merlin, Meliagant | Ginerva | SirKay) => Some(Label::Bad),

        (Guinevere, LancelotGood | LancelotBad) => Some(Label::Lancelot),
        (Iseult, Tristan)
        | (Tristan, Iseult)
        | (Balin, Balain)
        | (Balain, Balin)
        | (PrinceClaudin, KingClaudin)
        | (KingClaudin, PrinceClaudin) => Some(Label::Named(target)),
        (MerlinApprentice, Percival | Assassin) => Some(Label::PercivalOrAssassin),

        (Lot, Lot | Oberon | Accolon) => None,
        (Lot, Polygraph) => Some(Label::Named(Polygraph)),
        (Lot, target) if target.is_bad() || target == Meliagant => Some(Label::Bad),

        (Nimue, Galahad | Merlin) => Some(Label::Named(target)),
        (Nerzhul | Dagonet, Oberon) => Some(Label::Named(Oberon)),
        (Morgana, Gawain) => Some(Label::Named(Gawain)),
        (Claudas, Oberon | SirKay) => Some(Label::Named(target)),
        (TheQuestingBeast, Pellinore) => Some(Label::Named(Pellinore)),

        (Percival, Morgana) if merlin_in_play => Some(Label::MorganaOrMerlin),
        (Percival, Morgana) => Some(Label::MorganaOrViviana),
        (Percival, Merlin) => Some(Label::MorganaOrMerlin),
        (Percival, Viviana) if !merlin_in_play => Some(Label::MorganaOrViviana),

        (Gawain, Gawain | Oberon | Accolon) => None,
        (Gawain, target) if target.is_bad() => Some(Label::Notable),
        (Gawain, Meliagant | Percival | Merlin | Nirlem | Viviana) => Some(Label::Notable),
        _ => None,
    }
}

fn nirlem_reveal(viewer: Character, target: Character) -> Option<Label> {
    use Character::*;

    if target != Nirlem || !viewer.is_good() {
        return None;
    }
    if matches!(viewer, Nirlem | Lot | Meliagant | LancelotGood | Balain) {
        return None;
    }
    Some(Label::Named(Nirlem))
}

fn minion_reveal(viewer: Character, target: Character) -> Option<Label> {
    use Character::*;

    if !viewer.is_bad() || matches!(viewer, Oberon | Accolon | LancelotBad | Balin | Agravain) {
        return None;
    }
    match target {
        Stray => Some(Label::Stray),
        Oberon | Accolon | Agravain => None,
        target if target == viewer => None,
        Polygraph => Some(Label::Named(Polygraph)),
        target if target.is_bad() || target == Meliagant => Some(Label::BadOrStray),
        _ => None,
    }
}

fn push_label(secrets: &mut PlayerSecrets, player: &str, label: Label) {
    secrets.facts.push(format!("{player} is {}", label.text()));
    match label {
        Label::Bad => secrets.bad_players.push(player.to_string()),
        other => {
            secrets
                .uncovered
                .insert(player.to_string(), other.text().to_string());
        }
    }
}

/// First pass: every player's direct knowledge plus the sight graph.
pub fn compute_secrets(
    roles: &RoleAssignment,
    roster: &[String],
    rng: &mut Rng,
) -> (BTreeMap<String, PlayerSecrets>, SightGraph) {
    let merlin_in_play = roles.in_play(Character::Merlin);
    let mut graph = SightGraph::new();
    let mut all = BTreeMap::new();

    for player in roster {
        let Some(viewer) = roles.character_of(player) else {
            continue;
        };
        let mut secrets = PlayerSecrets::default();
        if viewer == Character::Gornemant {
            secrets = gornemant_secrets(roles, rng);
        }

        let mut seen = BTreeSet::new();
        for (target, holder) in &roles.character_to_player {
            if holder == player || seen.contains(holder) {
                continue;
            }
            let Some(label) = reveal(viewer, *target, merlin_in_play) else {
                continue;
            };
            let label = label.resolve(roles.is_stray_holder(holder));
            seen.insert(holder.clone());
            graph.entry(viewer).or_default().insert(holder.clone());
            push_label(&mut secrets, holder, label);
        }

        rng.shuffle(&mut secrets.facts);
        rng.shuffle(&mut secrets.bad_players);
        all.insert(player.clone(), secrets);
    }

    (all, graph)
}

/// One same-loyalty pair and one mixed pair drawn from the dealt characters.
pub fn gornemant_secrets(roles: &RoleAssignment, rng: &mut Rng) -> PlayerSecrets {
    let disguise = roles.stray_disguise();
    let dealt: Vec<Character> = roles
        .characters()
        .iter()
        .map(|character| match (character, disguise) {
            (Character::Stray, Some(disguise)) => disguise,
            (other, _) => *other,
        })
        .filter(|character| *character != Character::Gornemant)
        .collect();
    let goods: Vec<Character> = dealt.iter().copied().filter(|c| c.is_good()).collect();
    let others: Vec<Character> = dealt.iter().copied().filter(|c| !c.is_good()).collect();
    let (mut same, other) = if rng.coin() {
        (others, goods)
    } else {
        (goods, others)
    };

    let mut secrets = PlayerSecrets::default();
    let holder = |character: Character| roles.holder(character).unwrap_or_default().to_string();

    if same.len() >= 2 {
        let first = same.remove(rng.pick_index(same.len()));
        let second = same.remove(rng.pick_index(same.len()));
        let (first, second) = (holder(first), holder(second));
        secrets
            .facts
            .push(format!("{first} and {second} share a loyalty"));
        secrets.same_loyalty = vec![first, second];
    }
    if let (Some(outsider), Some(insider)) = (rng.pick(&other).copied(), rng.pick(&same).copied()) {
        let mut pair = vec![holder(outsider), holder(insider)];
        rng.shuffle(&mut pair);
        secrets
            .facts
            .push(format!("{} and {} differ in loyalty", pair[0], pair[1]));
        secrets.different_loyalty = pair;
    }
    secrets
}

/// Blanchefleur learns one real sighting from `graph` and one invented one.
pub fn blanchefleur_secrets(
    roles: &RoleAssignment,
    roster: &[String],
    graph: &SightGraph,
    rng: &mut Rng,
) -> PlayerSecrets {
    let mut secrets = PlayerSecrets::default();
    let Some(blanchefleur) = roles.holder(Character::Blanchefleur) else {
        return secrets;
    };

    let candidates: Vec<(Character, Vec<&String>)> = graph
        .iter()
        .filter(|(viewer, _)| **viewer != Character::Blanchefleur)
        .map(|(viewer, seen)| {
            let seen: Vec<&String> = seen.iter().filter(|p| *p != blanchefleur).collect();
            (*viewer, seen)
        })
        .filter(|(_, seen)| !seen.is_empty())
        .collect();
    let Some((true_character, true_seen)) = rng.pick(&candidates) else {
        return secrets;
    };
    let Some(true_holder) = roles.holder(*true_character) else {
        return secrets;
    };
    let Some(true_target) = rng.pick(true_seen) else {
        return secrets;
    };
    secrets.sightings.push(Sighting {
        viewer: true_holder.to_string(),
        seen: true_target.to_string(),
    });

    let empty = BTreeSet::new();
    let decoys: Vec<(&str, Vec<&String>)> = roles
        .characters()
        .iter()
        .filter(|character| **character != *true_character)
        .filter(|character| **character != Character::Blanchefleur)
        .filter_map(|character| {
            let holder = roles.holder(*character)?;
            let viewer = roles.character_of(holder)?;
            let sees = graph.get(&viewer).unwrap_or(&empty);
            let unseen: Vec<&String> = roster
                .iter()
                .filter(|p| p.as_str() != blanchefleur && p.as_str() != holder)
                .filter(|p| !sees.contains(*p))
                .collect();
            (!unseen.is_empty()).then_some((holder, unseen))
        })
        .collect();
    if let Some((decoy_holder, unseen)) = rng.pick(&decoys) {
        if let Some(decoy_target) = rng.pick(unseen) {
            secrets.sightings.push(Sighting {
                viewer: decoy_holder.to_string(),
                seen: decoy_target.to_string(),
            });
        }
    }

    rng.shuffle(&mut secrets.sightings);
    secrets.facts = secrets
        .sightings
        .iter()
        .map(|sighting| format!("{} sees {}", sighting.viewer, sighting.seen))
        .collect();
    secrets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::roles::assign_roles;
    use crate::types::CharacterSelection;

    fn deal(characters: &[Character], seed: u64) -> (Vec<String>, RoleAssignment) {
        let roster: Vec<String> = (1..=characters.len()).map(|i| format!("p{i}")).collect();
        let selection: Vec<CharacterSelection> = characters
            .iter()
            .map(|character| CharacterSelection {
                character: *character,
                assassin: false,
            })
            .collect();
        let roles = assign_roles(&roster, &selection, &mut Rng::new(seed));
        (roster, roles)
    }

    fn holder(roles: &RoleAssignment, character: Character) -> String {
        roles.holder(character).expect("dealt").to_string()
    }

    #[test]
    fn merlin_sees_bad_except_mordred_and_names_oberon() {
        let (roster, roles) = deal(
            &[
                Character::Merlin,
                Character::Percival,
                Character::Mordred,
                Character::Oberon,
                Character::Morgana,
                Character::LoyalServant,
                Character::SirKay,
            ],
            11,
        );
        let (secrets, graph) = compute_secrets(&roles, &roster, &mut Rng::new(1));
        let merlin = &secrets[&holder(&roles, Character::Merlin)];

        let morgana = holder(&roles, Character::Morgana);
        let sir_kay = holder(&roles, Character::SirKay);
        let oberon = holder(&roles, Character::Oberon);
        let mordred = holder(&roles, Character::Mordred);
        assert!(merlin.bad_players.contains(&morgana));
        assert!(merlin.bad_players.contains(&sir_kay));
        assert_eq!(merlin.uncovered.get(&oberon).map(String::as_str), Some("Oberon"));
        assert!(!merlin.bad_players.contains(&mordred));
        assert!(!merlin.uncovered.contains_key(&mordred));
        assert_eq!(merlin.facts.len(), 3);
        assert_eq!(graph[&Character::Merlin].len(), 3);
    }

    #[test]
    fn percival_cannot_tell_morgana_from_merlin() {
        let (roster, roles) = deal(
            &[
                Character::Merlin,
                Character::Percival,
                Character::Morgana,
                Character::Assassin,
                Character::LoyalServant,
            ],
            5,
        );
        let (secrets, _) = compute_secrets(&roles, &roster, &mut Rng::new(2));
        let percival = &secrets[&holder(&roles, Character::Percival)];
        let morgana = holder(&roles, Character::Morgana);
        let merlin = holder(&roles, Character::Merlin);
        assert_eq!(percival.uncovered[&morgana], "Morgana/Merlin");
        assert_eq!(percival.uncovered[&merlin], "Morgana/Merlin");
    }

    #[test]
    fn percival_pairs_morgana_with_viviana_without_merlin() {
        assert_eq!(
            reveal(Character::Percival, Character::Morgana, false),
            Some(Label::MorganaOrViviana)
        );
        assert_eq!(
            reveal(Character::Percival, Character::Viviana, false),
            Some(Label::MorganaOrViviana)
        );
        assert_eq!(reveal(Character::Percival, Character::Viviana, true), None);
    }

    #[test]
    fn minions_see_each_other_but_not_oberon() {
        let (roster, roles) = deal(
            &[
                Character::Morgana,
                Character::Assassin,
                Character::Oberon,
                Character::Merlin,
                Character::LoyalServant,
                Character::Percival,
            ],
            9,
        );
        let (secrets, _) = compute_secrets(&roles, &roster, &mut Rng::new(3));
        let morgana = &secrets[&holder(&roles, Character::Morgana)];
        assert_eq!(morgana.bad_players, vec![holder(&roles, Character::Assassin)]);
        let oberon = &secrets[&holder(&roles, Character::Oberon)];
        assert!(oberon.facts.is_empty());
    }

    #[test]
    fn stray_holder_is_labelled_stray_for_minions() {
        assert_eq!(
            reveal(Character::Morgana, Character::Stray, true),
            Some(Label::Stray)
        );
        assert_eq!(
            reveal(Character::Morgana, Character::Mordred, true).map(|label| label.resolve(true)),
            Some(Label::Stray)
        );
        assert_eq!(
            reveal(Character::Meliagant, Character::Mordred, true).map(|label| label.resolve(false)),
            Some(Label::Named(Character::Mordred))
        );
    }

    #[test]
    fn nirlem_is_visible_to_most_good_characters() {
        assert_eq!(
            reveal(Character::LoyalServant, Character::Nirlem, true),
            Some(Label::Named(Character::Nirlem))
        );
        assert_eq!(reveal(Character::Lot, Character::Nirlem, true), None);
        assert_eq!(reveal(Character::Morgana, Character::Nirlem, true), None);
        assert_eq!(reveal(Character::Nirlem, Character::Nirlem, true), None);
    }

    #[test]
    fn nobody_learns_about_themself() {
        let (roster, roles) = deal(
            &[
                Character::Morgana,
                Character::Assassin,
                Character::Mordred,
                Character::Merlin,
                Character::Percival,
                Character::Nirlem,
                Character::LoyalServant,
            ],
            21,
        );
        let (secrets, _) = compute_secrets(&roles, &roster, &mut Rng::new(4));
        for (player, secrets) in &secrets {
            assert!(!secrets.bad_players.contains(player));
            assert!(!secrets.uncovered.contains_key(player));
        }
    }

    #[test]
    fn gornemant_pairs_hold_up_against_alignments() {
        let (roster, roles) = deal(
            &[
                Character::Gornemant,
                Character::Merlin,
                Character::Percival,
                Character::LoyalServant,
                Character::Morgana,
                Character::Assassin,
                Character::Mordred,
            ],
            2,
        );
        let good = |player: &str| {
            roles
                .character_of(player)
                .map(Character::is_good)
                .expect("dealt")
        };
        for seed in 0..10 {
            let secrets = gornemant_secrets(&roles, &mut Rng::new(seed));
            assert_eq!(secrets.same_loyalty.len(), 2);
            assert_eq!(secrets.different_loyalty.len(), 2);
            assert_eq!(good(&secrets.same_loyalty[0]), good(&secrets.same_loyalty[1]));
            assert_ne!(
                good(&secrets.different_loyalty[0]),
                good(&secrets.different_loyalty[1])
            );
            let gornemant = holder(&roles, Character::Gornemant);
            assert!(!secrets.same_loyalty.contains(&gornemant));
        }
        assert_eq!(roster.len(), 7);
    }

    #[test]
    fn blanchefleur_gets_one_true_and_one_false_sighting() {
        let (roster, roles) = deal(
            &[
                Character::Blanchefleur,
                Character::Merlin,
                Character::Percival,
                Character::LoyalServant,
                Character::Morgana,
                Character::Assassin,
                Character::Mordred,
            ],
            6,
        );
        let (_, graph) = compute_secrets(&roles, &roster, &mut Rng::new(5));
        for seed in 0..10 {
            let secrets = blanchefleur_secrets(&roles, &roster, &graph, &mut Rng::new(seed));
            assert_eq!(secrets.sightings.len(), 2);
            assert_eq!(secrets.facts.len(), 2);
            let truthful = secrets
                .sightings
                .iter()
                .filter(|sighting| {
                    let viewer = roles.character_of(&sighting.viewer).expect("dealt");
                    graph
                        .get(&viewer)
                        .map(|seen| seen.contains(&sighting.seen))
                        .unwrap_or(false)
                })
                .count();
            assert_eq!(truthful, 1);
        }
    }
}
