use std::collections::{BTreeMap, BTreeSet};

use crate::characters::{Character, STRAY_DISGUISES};
use crate::constants::STRAY_RESTRICTED_BELOW;
use crate::error::{ActionError, ActionResult};
use crate::rng::Rng;
use crate::types::CharacterSelection;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LancelotPairing {
    None,
    Both,
    OnlyGood,
    OnlyBad,
}

/// Who holds what. `character_to_player` keeps both Stray and Stray's disguise
/// pointing at the same player, while `player_to_character` holds the disguise.
#[derive(Clone, Debug)]
pub struct RoleAssignment {
    pub(super) player_to_character: BTreeMap<String, Character>,
    pub(super) character_to_player: BTreeMap<Character, String>,
    pub(super) characters: Vec<Character>,
    pub(super) assassin: Option<String>,
    pub(super) stray: Option<(String, Character)>,
    pub(super) lancelot: LancelotPairing,
    pub(super) balin_pair: bool,
}

impl RoleAssignment {
    pub fn character_of(&self, player: &str) -> Option<Character> {
        self.player_to_character.get(player).copied()
    }

    pub fn holder(&self, character: Character) -> Option<&str> {
        self.character_to_player.get(&character).map(String::as_str)
    }

    pub fn in_play(&self, character: Character) -> bool {
        self.character_to_player.contains_key(&character)
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn assassin(&self) -> Option<&str> {
        self.assassin.as_deref()
    }

    pub fn is_stray_holder(&self, player: &str) -> bool {
        self.stray
            .as_ref()
            .map(|(holder, _)| holder == player)
            .unwrap_or(false)
    }

    pub fn stray_disguise(&self) -> Option<Character> {
        self.stray.as_ref().map(|(_, disguise)| *disguise)
    }

    /// Players whose current character is Bad, in roster order.
    pub fn bad_players(&self, roster: &[String]) -> Vec<String> {
        roster
            .iter()
            .filter(|player| {
                self.character_of(player)
                    .map(Character::is_bad)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    pub(super) fn swap_holders(&mut self, left: Character, right: Character) {
        let (Some(left_player), Some(right_player)) = (
            self.character_to_player.get(&left).cloned(),
            self.character_to_player.get(&right).cloned(),
        ) else {
            return;
        };
        self.player_to_character.insert(left_player.clone(), right);
        self.player_to_character.insert(right_player.clone(), left);
        self.character_to_player.insert(left, right_player);
        self.character_to_player.insert(right, left_player);
    }

    pub(super) fn convert(&mut self, from: Character, to: Character) {
        let Some(player) = self.character_to_player.remove(&from) else {
            return;
        };
        self.player_to_character.insert(player.clone(), to);
        self.character_to_player.insert(to, player);
        for character in self.characters.iter_mut() {
            if *character == from {
                *character = to;
            }
        }
    }
}

/// Checks a host selection against the board for `roster_len` players.
pub fn validate_selection(
    selection: &[CharacterSelection],
    roster_len: usize,
    required_bad: usize,
) -> ActionResult {
    let mut unique = BTreeSet::new();
    for entry in selection {
        if !unique.insert(entry.character) {
            return Err(ActionError::precondition(format!(
                "{} selected twice",
                entry.character
            )));
        }
        if entry.assassin && !entry.character.is_bad() {
            return Err(ActionError::precondition(format!(
                "{} cannot be the assassin",
                entry.character
            )));
        }
    }

    let bad = selection
        .iter()
        .filter(|entry| entry.character.counts_as_bad())
        .count();
    if bad != required_bad {
        return Err(ActionError::precondition(format!(
            "{bad} bad characters selected, {required_bad} required"
        )));
    }
    if selection.len() != roster_len {
        return Err(ActionError::precondition(format!(
            "{} characters selected for {roster_len} players",
            selection.len()
        )));
    }
    Ok(())
}

/// Whether a finished good win could need an Assassin that nobody holds.
pub fn assassin_missing(selection: &[CharacterSelection]) -> bool {
    let has = |character: Character| selection.iter().any(|entry| entry.character == character);
    let resolvable = has(Character::Assassin) || selection.iter().any(|entry| entry.assassin);
    let targets = selection
        .iter()
        .any(|entry| entry.character.is_assassin_target())
        || (has(Character::Tristan) && has(Character::Iseult));
    targets && !resolvable
}

/// Deals `selection` to `roster` (already in seating order).
pub fn assign_roles(
    roster: &[String],
    selection: &[CharacterSelection],
    rng: &mut Rng,
) -> RoleAssignment {
    let mut characters: Vec<Character> = selection.iter().map(|entry| entry.character).collect();
    rng.shuffle(&mut characters);
    deal(roster, characters, selection, rng)
}

/// Seats `characters[i]` at `roster[i]`.
pub fn deal(
    roster: &[String],
    characters: Vec<Character>,
    selection: &[CharacterSelection],
    rng: &mut Rng,
) -> RoleAssignment {
    let mut player_to_character = BTreeMap::new();
    let mut character_to_player = BTreeMap::new();
    for (player, character) in roster.iter().zip(characters.iter()) {
        player_to_character.insert(player.clone(), *character);
        character_to_player.insert(*character, player.clone());
    }

    let mut stray = None;
    if let Some(stray_player) = character_to_player.get(&Character::Stray).cloned() {
        if let Some(disguise) = draw_stray_disguise(&characters, roster.len(), rng) {
            player_to_character.insert(stray_player.clone(), disguise);
            character_to_player.insert(disguise, stray_player.clone());
            stray = Some((stray_player, disguise));
        }
    }

    let mut assassin = selection
        .iter()
        .find(|entry| entry.assassin)
        .and_then(|entry| character_to_player.get(&entry.character).cloned());
    if let Some(holder) = character_to_player.get(&Character::Assassin) {
        assassin = Some(holder.clone());
    }

    let has_good = character_to_player.contains_key(&Character::LancelotGood);
    let has_bad = character_to_player.contains_key(&Character::LancelotBad);
    let lancelot = match (has_good, has_bad) {
        (true, true) => LancelotPairing::Both,
        (true, false) => LancelotPairing::OnlyGood,
        (false, true) => LancelotPairing::OnlyBad,
        (false, false) => LancelotPairing::None,
    };
    let balin_pair = character_to_player.contains_key(&Character::Balin)
        && character_to_player.contains_key(&Character::Balain);

    RoleAssignment {
        player_to_character,
        character_to_player,
        characters,
        assassin,
        stray,
        lancelot,
        balin_pair,
    }
}

/// Mordred or a random good disguise, never something already dealt.
pub fn draw_stray_disguise(
    in_play: &[Character],
    roster_len: usize,
    rng: &mut Rng,
) -> Option<Character> {
    let pool: Vec<Character> = STRAY_DISGUISES
        .iter()
        .copied()
        .filter(|candidate| !in_play.contains(candidate))
        .filter(|candidate| {
            roster_len >= STRAY_RESTRICTED_BELOW
                || !matches!(candidate, Character::Gornemant | Character::Blanchefleur)
        })
        .collect();
    let good = rng.pick(&pool).copied();
    let mordred_free = !in_play.contains(&Character::Mordred);

    match (mordred_free, good) {
        (true, Some(good)) => Some(if rng.coin() { Character::Mordred } else { good }),
        (true, None) => Some(Character::Mordred),
        (false, good) => good,
    }
}
