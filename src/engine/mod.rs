use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, error, info};

use crate::characters::Character;
use crate::constants::{get_board_config_by_player_count, get_quest_policy, LANCELOT_DECK};
use crate::error::{ActionError, ActionResult};
use crate::rng::Rng;
use crate::types::{
    CharacterSelection, GameAction, GamePhase, Loyalty, PendingMurder, PlayerSecrets,
    QuestArchiveItem, QuestOutcome, QuestStage, QuestStats, QuestVote, VoteTally,
};

mod murders;
mod powers;
mod quests;
pub mod roles;
pub mod secrets;
mod suggestions;
mod view;

pub use self::powers::lady_loyalty_options;
pub use self::quests::{calculate_quest_result, legal_votes, VoteContext};

use self::roles::{assign_roles, assassin_missing, validate_selection, RoleAssignment};
use self::secrets::{blanchefleur_secrets, compute_secrets, SightGraph};

#[derive(Clone, Debug, Default)]
struct MatchFlags {
    excalibur: bool,
    titanya_failed: bool,
    elaine_used: bool,
    beast_succeeded: bool,
}

#[derive(Clone, Debug)]
struct LadyState {
    holder: String,
    previous: Option<String>,
    chosen: Option<String>,
    response: Option<Loyalty>,
}

#[derive(Clone, Debug, Default)]
struct LancelotDeck {
    cards: Vec<u8>,
    next: usize,
}

impl LancelotDeck {
    fn draw(&mut self) -> u8 {
        let Some(card) = self.cards.get(self.next).copied() else {
            return 0;
        };
        self.next = (self.next + 1) % self.cards.len();
        card
    }
}

/// The board of one match. Every mutator validates before it touches state, so
/// a rejected action leaves the board exactly as it was.
#[derive(Clone, Debug)]
pub struct MatchEngine {
    rng: Rng,
    roster: Vec<String>,
    phase: GamePhase,
    status: String,
    halted: bool,

    roles: Option<RoleAssignment>,
    flags: MatchFlags,
    num_quests: usize,
    active_players: usize,
    retries: Vec<usize>,
    quests: Vec<QuestStats>,
    current: usize,
    successes: usize,
    failures: usize,
    shadow_results: BTreeMap<usize, QuestOutcome>,

    stage: QuestStage,
    last_stage: QuestStage,
    suggester_index: usize,
    veto_holder: Option<String>,
    suggested: Vec<String>,
    only_good_suggested: bool,
    excalibur_holder: Option<String>,
    suggestion_votes: BTreeMap<String, bool>,
    voted_yes: Vec<String>,
    voted_no: Vec<String>,
    journey_votes: BTreeMap<String, QuestVote>,
    archive: Vec<QuestArchiveItem>,

    secrets: BTreeMap<String, PlayerSecrets>,
    sight_graph: SightGraph,
    lady: Option<LadyState>,
    lancelot_deck: LancelotDeck,
    murders: VecDeque<PendingMurder>,
    killed: BTreeMap<String, String>,
}

impl MatchEngine {
    pub fn new(rng: Rng) -> Self {
        Self {
            rng,
            roster: Vec::new(),
            phase: GamePhase::NotStarted,
            status: GamePhase::NotStarted.describe().to_string(),
            halted: false,
            roles: None,
            flags: MatchFlags::default(),
            num_quests: 0,
            active_players: 0,
            retries: Vec::new(),
            quests: Vec::new(),
            current: 0,
            successes: 0,
            failures: 0,
            shadow_results: BTreeMap::new(),
            stage: QuestStage::first(),
            last_stage: QuestStage::first(),
            suggester_index: 0,
            veto_holder: None,
            suggested: Vec::new(),
            only_good_suggested: false,
            excalibur_holder: None,
            suggestion_votes: BTreeMap::new(),
            voted_yes: Vec::new(),
            voted_no: Vec::new(),
            journey_votes: BTreeMap::new(),
            archive: Vec::new(),
            secrets: BTreeMap::new(),
            sight_graph: SightGraph::new(),
            lady: None,
            lancelot_deck: LancelotDeck::default(),
            murders: VecDeque::new(),
            killed: BTreeMap::new(),
        }
    }

    /// Back to `NotStarted` with the same roster.
    pub fn reset(&mut self) {
        let roster = std::mem::take(&mut self.roster);
        let rng = self.rng.clone();
        *self = Self::new(rng);
        self.roster = roster;
        info!(players = self.roster.len(), "match reset");
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    pub fn roles(&self) -> Option<&RoleAssignment> {
        self.roles.as_ref()
    }

    pub fn character_of(&self, player: &str) -> Option<Character> {
        self.roles.as_ref()?.character_of(player)
    }

    pub fn holder_of(&self, character: Character) -> Option<&str> {
        self.roles.as_ref()?.holder(character)
    }

    pub fn num_quests(&self) -> usize {
        self.num_quests
    }

    pub fn current_quest(&self) -> usize {
        self.current
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn quests(&self) -> &[QuestStats] {
        &self.quests
    }

    pub fn archive(&self) -> &[QuestArchiveItem] {
        &self.archive
    }

    pub fn secrets_of(&self, player: &str) -> Option<&PlayerSecrets> {
        self.secrets.get(player)
    }

    pub fn suggested(&self) -> &[String] {
        &self.suggested
    }

    pub fn excalibur_holder(&self) -> Option<&str> {
        self.excalibur_holder.as_deref()
    }

    pub fn veto_holder(&self) -> Option<&str> {
        self.veto_holder.as_deref()
    }

    pub fn lady_holder(&self) -> Option<&str> {
        self.lady.as_ref().map(|lady| lady.holder.as_str())
    }

    pub fn lady_chosen(&self) -> Option<&str> {
        self.lady.as_ref()?.chosen.as_deref()
    }

    pub fn pending_murder(&self) -> Option<&PendingMurder> {
        self.murders.front()
    }

    pub fn suggester(&self) -> Option<&str> {
        if self.roster.is_empty() {
            return None;
        }
        self.roster
            .get(self.suggester_index % self.roster.len())
            .map(String::as_str)
    }

    pub fn required_team_size(&self) -> Option<usize> {
        self.quests
            .get(self.current)
            .map(|quest| quest.required_players)
    }

    /// Roster members who vote on suggestions. Ector's holder sits out.
    pub fn suggestion_voters(&self) -> Vec<String> {
        let ector = self.holder_of(Character::Ector);
        self.roster
            .iter()
            .filter(|player| Some(player.as_str()) != ector)
            .cloned()
            .collect()
    }

    pub fn has_voted_on_suggestion(&self, player: &str) -> bool {
        self.suggestion_votes.contains_key(player)
    }

    pub fn has_voted_on_journey(&self, player: &str) -> bool {
        self.journey_votes.contains_key(player)
    }

    pub fn add_player(&mut self, name: &str) -> ActionResult {
        self.ensure_roster_open()?;
        if self.roster.iter().any(|player| player == name) {
            return Ok(());
        }
        self.roster.push(name.to_string());
        debug!(player = name, "player joined");
        Ok(())
    }

    pub fn remove_player(&mut self, name: &str) -> ActionResult {
        self.ensure_roster_open()?;
        self.roster.retain(|player| player != name);
        debug!(player = name, "player left");
        Ok(())
    }

    pub fn start_game(
        &mut self,
        selection: &[CharacterSelection],
        excalibur: bool,
        lady: bool,
    ) -> ActionResult {
        self.ensure_live()?;
        self.ensure_phase(GamePhase::NotStarted)?;
        let roster_len = self.roster.len();
        let Some(table) = get_board_config_by_player_count(roster_len) else {
            return Err(ActionError::precondition(format!(
                "no board for {roster_len} players"
            )));
        };
        validate_selection(selection, roster_len, table.num_bad)?;
        let has_ector = selection
            .iter()
            .any(|entry| entry.character == Character::Ector);
        let active_players = if has_ector { roster_len - 1 } else { roster_len };
        if get_board_config_by_player_count(active_players).is_none() {
            return Err(ActionError::precondition(format!(
                "no board for {active_players} active players"
            )));
        }
        if assassin_missing(selection) {
            return Err(self.halt("assassination targets selected without an assassin"));
        }

        self.rng.shuffle(&mut self.roster);
        let roles = assign_roles(&self.roster, selection, &mut self.rng);
        self.begin_match(roles, excalibur, lady);
        Ok(())
    }

    fn begin_match(&mut self, roles: RoleAssignment, excalibur: bool, lady: bool) {
        let active_players = if roles.in_play(Character::Ector) {
            self.roster.len().saturating_sub(1)
        } else {
            self.roster.len()
        };
        let Some(board) = get_board_config_by_player_count(active_players) else {
            return;
        };
        let shrink = usize::from(roles.in_play(Character::Meliagant));

        self.active_players = active_players;
        self.num_quests = board.num_quests;
        self.retries = board.retries_per_level.to_vec();
        self.quests = board
            .players_per_level
            .iter()
            .enumerate()
            .map(|(index, size)| QuestStats {
                level: index + 1,
                policy: get_quest_policy(index + 1, active_players),
                required_players: size.saturating_sub(shrink).max(1),
                tally: VoteTally::default(),
                avalon_power: false,
                outcome: None,
            })
            .collect();
        self.flags = MatchFlags {
            excalibur,
            ..MatchFlags::default()
        };
        self.lady = if lady {
            self.roster.last().map(|holder| LadyState {
                holder: holder.clone(),
                previous: None,
                chosen: None,
                response: None,
            })
        } else {
            None
        };
        let mut cards = LANCELOT_DECK.to_vec();
        self.rng.shuffle(&mut cards);
        self.lancelot_deck = LancelotDeck { cards, next: 0 };

        self.current = 0;
        self.stage = QuestStage::first();
        self.last_stage = QuestStage::first();
        self.suggester_index = 0;

        let (secrets, graph) = compute_secrets(&roles, &self.roster, &mut self.rng);
        self.secrets = secrets;
        self.sight_graph = graph;
        let has_seer = roles.in_play(Character::Seer);
        self.roles = Some(roles);
        if !has_seer {
            self.run_blanchefleur_pass();
        }

        self.refresh_veto_holder();
        self.enter(if has_seer {
            GamePhase::SirPickPlayer
        } else {
            GamePhase::AwaitingSuggestion
        });
        info!(
            players = self.roster.len(),
            active_players,
            excalibur,
            lady,
            "match started"
        );
    }

    /// Single entry point for the transport. `sender` must be entitled to act.
    pub fn apply(&mut self, sender: &str, action: GameAction) -> ActionResult {
        self.ensure_live()?;
        if !self.entitled(sender, &action) {
            return Err(ActionError::NotEntitled(sender.to_string()));
        }
        match action {
            GameAction::StartGame {
                selection,
                excalibur,
                lady,
            } => self.start_game(&selection, excalibur, lady),
            GameAction::SirPick { player } => self.sir_pick(&player),
            GameAction::Suggest { players, excalibur } => {
                self.suggest(&players, excalibur.as_deref())
            }
            GameAction::SuggestTemporary { players } => self.suggest_temporary(&players),
            GameAction::VoteForSuggestion { player, yes } => {
                self.vote_for_suggestion(&player, yes)
            }
            GameAction::VoteForJourney { player, vote } => self.vote_for_journey(&player, vote),
            GameAction::ExcaliburPick { players } => self.excalibur_pick(&players),
            GameAction::LadySuggest { player } => self.lady_suggest(&player),
            GameAction::LadyResponse { loyalty } => self.lady_response(loyalty),
            GameAction::LadyPublishResponse { loyalty } => self.lady_publish_response(loyalty),
            GameAction::Murder { target, selection } => self.murder(target, &selection),
        }
    }

    fn entitled(&self, sender: &str, action: &GameAction) -> bool {
        let lady = self.lady.as_ref();
        match action {
            GameAction::StartGame { .. } => self.roster.iter().any(|player| player == sender),
            GameAction::SirPick { .. } => self.holder_of(Character::Seer) == Some(sender),
            GameAction::Suggest { .. } | GameAction::SuggestTemporary { .. } => {
                self.suggester() == Some(sender)
            }
            GameAction::VoteForSuggestion { player, .. }
            | GameAction::VoteForJourney { player, .. } => player == sender,
            GameAction::ExcaliburPick { .. } => self.excalibur_holder.as_deref() == Some(sender),
            GameAction::LadySuggest { .. } | GameAction::LadyPublishResponse { .. } => {
                lady.map(|lady| lady.holder == sender).unwrap_or(false)
            }
            GameAction::LadyResponse { .. } => {
                lady.and_then(|lady| lady.chosen.as_deref()) == Some(sender)
            }
            GameAction::Murder { .. } => self
                .murders
                .front()
                .map(|step| step.by == sender)
                .unwrap_or(false),
        }
    }

    fn run_blanchefleur_pass(&mut self) {
        let Some(roles) = self.roles.as_ref() else {
            return;
        };
        let Some(holder) = roles.holder(Character::Blanchefleur) else {
            return;
        };
        let secrets = blanchefleur_secrets(roles, &self.roster, &self.sight_graph, &mut self.rng);
        self.secrets.insert(holder.to_string(), secrets);
    }

    fn enter(&mut self, phase: GamePhase) {
        self.phase = phase;
        self.status = phase.describe().to_string();
    }

    /// The player who will propose the forced suggestion of this mission.
    fn refresh_veto_holder(&mut self) {
        let Some(retries) = self.retries.get(self.current).copied() else {
            self.veto_holder = None;
            return;
        };
        if self.roster.is_empty() {
            return;
        }
        let remaining = retries.saturating_sub(self.stage.attempt).saturating_sub(1);
        let index = (self.suggester_index + remaining) % self.roster.len();
        self.veto_holder = self.roster.get(index).cloned();
    }

    fn advance_suggester(&mut self) {
        if self.roster.is_empty() {
            return;
        }
        self.suggester_index = (self.suggester_index + 1) % self.roster.len();
    }

    fn team_has(&self, character: Character) -> bool {
        let Some(holder) = self.holder_of(character) else {
            return false;
        };
        self.suggested.iter().any(|player| player == holder)
    }

    fn final_mission(&self) -> bool {
        self.current + 1 == self.num_quests
    }

    fn clear_cycle(&mut self) {
        self.journey_votes.clear();
        self.suggestion_votes.clear();
        self.suggested.clear();
        self.only_good_suggested = false;
        self.excalibur_holder = None;
    }

    fn halt(&mut self, reason: &str) -> ActionError {
        self.halted = true;
        error!(reason, "match halted");
        ActionError::Structural(reason.to_string())
    }

    fn ensure_live(&self) -> ActionResult {
        if self.halted {
            return Err(ActionError::Halted);
        }
        Ok(())
    }

    fn ensure_phase(&self, expected: GamePhase) -> ActionResult {
        if self.phase != expected {
            return Err(ActionError::WrongPhase(self.phase));
        }
        Ok(())
    }

    fn ensure_roster_open(&self) -> ActionResult {
        if self.phase == GamePhase::NotStarted || self.phase.is_concluded() {
            return Ok(());
        }
        Err(ActionError::WrongPhase(self.phase))
    }

    fn ensure_on_roster(&self, player: &str) -> ActionResult {
        if self.roster.iter().any(|name| name == player) {
            return Ok(());
        }
        Err(ActionError::UnknownPlayer(player.to_string()))
    }

    fn unique_roster_members(&self, players: &[String]) -> ActionResult {
        let mut unique = BTreeSet::new();
        for player in players {
            self.ensure_on_roster(player)?;
            if !unique.insert(player.as_str()) {
                return Err(ActionError::precondition(format!(
                    "{player} named twice"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A started match with `seats[i].1` dealt to `seats[i].0`, in that order.
    pub(crate) fn rigged(seats: &[(&str, Character)], excalibur: bool, lady: bool) -> MatchEngine {
        let mut engine = MatchEngine::new(Rng::new(7));
        engine.roster = seats.iter().map(|(name, _)| name.to_string()).collect();
        let characters: Vec<Character> = seats.iter().map(|(_, character)| *character).collect();
        let selection: Vec<CharacterSelection> = characters
            .iter()
            .map(|character| CharacterSelection {
                character: *character,
                assassin: false,
            })
            .collect();
        let roles = roles::deal(&engine.roster, characters, &selection, &mut engine.rng);
        engine.begin_match(roles, excalibur, lady);
        engine
    }

    pub(crate) fn names(players: &[&str]) -> Vec<String> {
        players.iter().map(|player| player.to_string()).collect()
    }

    /// Everyone who can votes `yes` on the current suggestion.
    pub(crate) fn vote_all(engine: &mut MatchEngine, yes: bool) {
        for player in engine.suggestion_voters() {
            engine
                .vote_for_suggestion(&player, yes)
                .expect("suggestion vote accepted");
        }
    }

    /// Suggests `team`, waves it through and casts `votes` in team order.
    pub(crate) fn play_mission(engine: &mut MatchEngine, team: &[&str], votes: &[QuestVote]) {
        engine
            .suggest(&names(team), None)
            .expect("suggestion accepted");
        if engine.phase() == GamePhase::SuggestionVoting {
            vote_all(engine, true);
        }
        for (player, vote) in team.iter().zip(votes) {
            engine
                .vote_for_journey(player, *vote)
                .expect("mission vote accepted");
        }
    }

    pub(crate) fn five_plain() -> MatchEngine {
        rigged(
            &[
                ("ann", Character::LoyalServant),
                ("bob", Character::LoyalServant1),
                ("cid", Character::Minion),
                ("dan", Character::LoyalServant2),
                ("eve", Character::Minion1),
            ],
            false,
            false,
        )
    }
}
