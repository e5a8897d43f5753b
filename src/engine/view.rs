use super::*;

use crate::engine::secrets::reveal;
use crate::types::{
    CharacterDescription, GameView, LadyView, MurderTarget, MurderView, PlayerReveal, QuestPolicy,
    RosterView, SecretView, SeerView,
};

/// Characters allowed to name `character` in a murder step, given the cast.
fn murdered_by(character: Character, cast: &[Character]) -> Vec<Character> {
    let has = |candidate: Character| cast.contains(&candidate);
    let mut hunters = Vec::new();
    if character == Character::TheQuestingBeast && has(Character::Pellinore) {
        hunters.push(Character::Pellinore);
    }
    let lover = matches!(character, Character::Tristan | Character::Iseult)
        && has(Character::Tristan)
        && has(Character::Iseult);
    if character.is_assassin_target() || lover {
        hunters.push(Character::Assassin);
    }
    if character == Character::Mordred && has(Character::Cordana) {
        hunters.push(Character::Cordana);
    }
    if character.is_bad() {
        if has(Character::KingArthur) {
            hunters.push(Character::KingArthur);
        }
        if has(Character::Percival) && has(Character::KingClaudin) && has(Character::PrinceClaudin)
        {
            hunters.push(Character::Percival);
        }
    }
    hunters
}

impl MatchEngine {
    /// The board as `viewer` is allowed to see it.
    pub fn view_for(&self, viewer: &str) -> GameView {
        let concluded = self.phase.is_concluded();
        let voting_open = matches!(
            self.phase,
            GamePhase::JourneyVoting | GamePhase::ExcaliburPick
        );
        let own_character = self.character_of(viewer);

        let mut quests = self.quests.clone();
        if voting_open {
            if let Some(quest) = quests.get_mut(self.current) {
                quest.tally = VoteTally::default();
            }
        }

        let on_team = self.suggested.iter().any(|member| member == viewer);
        let legal_votes = if self.phase == GamePhase::JourneyVoting
            && on_team
            && !self.has_voted_on_journey(viewer)
        {
            self.legal_votes_for(viewer)
        } else {
            Vec::new()
        };

        let hide_ballots = self.phase == GamePhase::SuggestionVoting;
        let (voted_yes, voted_no) = if hide_ballots {
            (Vec::new(), Vec::new())
        } else {
            (self.voted_yes.clone(), self.voted_no.clone())
        };

        let only_good_suggested = (own_character == Some(Character::Meliagant)
            && !self.suggested.is_empty())
        .then_some(self.only_good_suggested);

        let seer = (self.phase == GamePhase::SirPickPlayer)
            .then(|| self.holder_of(Character::Seer))
            .flatten()
            .map(|seer| SeerView {
                seer: seer.to_string(),
                options: self.seer_options(),
            });

        GameView {
            viewer: viewer.to_string(),
            phase: self.phase,
            status: self.status.clone(),
            halted: self.halted,
            players: RosterView {
                all: self.roster.clone(),
                active: self.suggestion_voters(),
            },
            current_quest: self.current,
            num_quests: self.num_quests,
            active_players: self.active_players,
            successes: self.successes,
            failures: self.failures,
            characters: self.describe_characters(viewer),
            quests,
            archive: self.redacted_archive(),
            secrets: self.secret_view(viewer),
            legal_votes,
            suggester: self.suggester().map(str::to_string),
            veto_holder: self.veto_holder.clone(),
            suggested_players: self.suggested.clone(),
            suggestion_voters: self.suggestion_votes.keys().cloned().collect(),
            voted_yes,
            voted_no,
            journey_voters: self.journey_votes.keys().cloned().collect(),
            only_good_suggested,
            seer,
            excalibur_enabled: self.flags.excalibur,
            excalibur_holder: self.excalibur_holder.clone(),
            lady: self.lady_view(viewer),
            murder: self.murder_view(),
            reveals: self.reveals(),
            shadow_results: if concluded {
                self.shadow_results.clone()
            } else {
                BTreeMap::new()
            },
        }
    }

    /// The selected cast. Stray's holder reads the Stray entry as their disguise.
    fn describe_characters(&self, viewer: &str) -> BTreeMap<String, CharacterDescription> {
        let Some(roles) = self.roles.as_ref() else {
            return BTreeMap::new();
        };
        let cast = roles.characters();
        let merlin_in_play = cast.contains(&Character::Merlin);
        let disguise = roles
            .is_stray_holder(viewer)
            .then(|| roles.stray_disguise())
            .flatten();

        cast.iter()
            .map(|listed| {
                let (character, stray_holder) = match disguise {
                    Some(disguise) if *listed == Character::Stray => (disguise, true),
                    _ => (*listed, false),
                };
                let regular = VoteContext::baseline(QuestPolicy::Regular);
                let flush = VoteContext::baseline(QuestPolicy::Flush);
                let sees = cast
                    .iter()
                    .copied()
                    .filter(|other| *other != character && other != listed)
                    .filter(|other| reveal(character, *other, merlin_in_play).is_some())
                    .collect();
                let description = CharacterDescription {
                    alignment: character.alignment(),
                    legal_votes: legal_votes(character, stray_holder, &regular),
                    flush_votes: legal_votes(character, stray_holder, &flush),
                    sees,
                    murdered_by: murdered_by(character, cast),
                };
                (listed.name().to_string(), description)
            })
            .collect()
    }

    fn redacted_archive(&self) -> Vec<QuestArchiveItem> {
        let mut archive = self.archive.clone();
        let Some(newest) = archive.last_mut() else {
            return archive;
        };
        match self.phase {
            GamePhase::SuggestionVoting => {
                newest.voted_yes.clear();
                newest.voted_no.clear();
            }
            GamePhase::JourneyVoting | GamePhase::ExcaliburPick => {
                newest.tally = VoteTally::default();
            }
            _ => {}
        }
        archive
    }

    fn secret_view(&self, viewer: &str) -> Option<SecretView> {
        let character = self.character_of(viewer)?;
        let secrets = self.secrets.get(viewer).cloned().unwrap_or_default();
        Some(SecretView { character, secrets })
    }

    fn lady_view(&self, viewer: &str) -> Option<LadyView> {
        let lady = self.lady.as_ref()?;
        let publishing = self.phase == GamePhase::LadySuggesterPublishResponseToWorld;
        let is_holder = lady.holder == viewer;
        let response = if publishing && is_holder {
            lady.response
        } else {
            None
        };
        let response_options = match (self.phase, lady.chosen.as_deref()) {
            (GamePhase::LadyResponse, Some(chosen)) if chosen == viewer => self
                .character_of(chosen)
                .map(lady_loyalty_options)
                .unwrap_or_default(),
            (GamePhase::LadySuggesterPublishResponseToWorld, _) if is_holder => {
                vec![Loyalty::Good, Loyalty::Bad]
            }
            _ => Vec::new(),
        };
        Some(LadyView {
            holder: lady.holder.clone(),
            previous_holder: lady.previous.clone(),
            chosen: lady.chosen.clone(),
            response,
            response_options,
        })
    }

    fn murder_view(&self) -> Option<MurderView> {
        if !self.phase.is_murder_phase() {
            return None;
        }
        let step = self.murders.front()?;
        // The assassin names one player, or both lovers.
        let target_count = if step.by_character == Character::Assassin {
            1
        } else {
            step.targets.len()
        };
        Some(MurderView {
            by: step.by.clone(),
            by_character: step.by_character,
            target_characters: step.target_characters.clone(),
            target_count,
        })
    }

    fn reveals(&self) -> Vec<PlayerReveal> {
        let Some(roles) = self.roles.as_ref() else {
            return Vec::new();
        };
        let concluded = self.phase.is_concluded();
        let murdering = self.phase.is_murder_phase();
        self.roster
            .iter()
            .filter_map(|player| {
                let character = roles.character_of(player)?;
                let public = concluded
                    || character == Character::Ector
                    || (murdering && character == Character::Dagonet);
                public.then(|| PlayerReveal {
                    player: player.clone(),
                    character: if concluded && roles.is_stray_holder(player) {
                        Character::Stray
                    } else {
                        character
                    },
                    killed_by: self.killed.get(player).cloned(),
                })
            })
            .collect()
    }
}
