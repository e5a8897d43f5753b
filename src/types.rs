use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::characters::{Alignment, Character};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    NotStarted,
    SirPickPlayer,
    AwaitingSuggestion,
    SuggestionVoting,
    JourneyVoting,
    ExcaliburPick,
    WaitingForLadySuggester,
    LadyResponse,
    LadySuggesterPublishResponseToWorld,
    MurdersAfterGoodVictory,
    MurdersAfterBadVictory,
    VictoryForGood,
    VictoryForBad,
    VictoryForGawain,
    VictoryForSirGawain,
}

impl GamePhase {
    pub fn is_concluded(self) -> bool {
        matches!(
            self,
            Self::VictoryForGood
                | Self::VictoryForBad
                | Self::VictoryForGawain
                | Self::VictoryForSirGawain
        )
    }

    pub fn is_murder_phase(self) -> bool {
        matches!(
            self,
            Self::MurdersAfterGoodVictory | Self::MurdersAfterBadVictory
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::NotStarted => "waiting for the host to start the game",
            Self::SirPickPlayer => "the Seer is choosing a neighbour to look at",
            Self::AwaitingSuggestion => "waiting for a mission suggestion",
            Self::SuggestionVoting => "voting on the suggested team",
            Self::JourneyVoting => "the team is on the mission",
            Self::ExcaliburPick => "Excalibur may flip one mission vote",
            Self::WaitingForLadySuggester => "the Lady of the Lake is choosing a player",
            Self::LadyResponse => "the chosen player answers the Lady of the Lake",
            Self::LadySuggesterPublishResponseToWorld => {
                "the Lady of the Lake announces the answer"
            }
            Self::MurdersAfterGoodVictory => "good won the missions, murders pending",
            Self::MurdersAfterBadVictory => "bad won the missions, murders pending",
            Self::VictoryForGood => "good wins",
            Self::VictoryForBad => "bad wins",
            Self::VictoryForGawain => "Gawain wins",
            Self::VictoryForSirGawain => "Sir Gawain wins",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestPolicy {
    Regular,
    Flush,
    TwoFailsRequired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestOutcome {
    Fail,
    Success,
}

impl QuestOutcome {
    pub fn flipped(self) -> Self {
        match self {
            Self::Fail => Self::Success,
            Self::Success => Self::Fail,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestVote {
    Fail,
    Success,
    Reversal,
    Beast,
    AvalonPower,
}

impl QuestVote {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Fail),
            1 => Some(Self::Success),
            2 => Some(Self::Reversal),
            3 => Some(Self::Beast),
            5 => Some(Self::AvalonPower),
            _ => None,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fail" | "Fail" => Some(Self::Fail),
            "success" | "Success" => Some(Self::Success),
            "reversal" | "Reversal" => Some(Self::Reversal),
            "beast" | "Beast" => Some(Self::Beast),
            "avalon_power" | "Avalon Power" => Some(Self::AvalonPower),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Fail => "Fail",
            Self::Success => "Success",
            Self::Reversal => "Reversal",
            Self::Beast => "Beast",
            Self::AvalonPower => "Avalon Power",
        }
    }

    /// Beast votes score as fails.
    pub fn counts_as_fail(self) -> bool {
        matches!(self, Self::Fail | Self::Beast)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Loyalty {
    Bad,
    Good,
    Neutral,
}

impl Loyalty {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Bad),
            1 => Some(Self::Good),
            2 => Some(Self::Neutral),
            _ => None,
        }
    }
}

impl From<Alignment> for Loyalty {
    fn from(value: Alignment) -> Self {
        match value {
            Alignment::Good => Self::Good,
            Alignment::Bad => Self::Bad,
            Alignment::Neutral => Self::Neutral,
        }
    }
}

/// Mission number plus the count of rejected suggestions before it, shown as `2.1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QuestStage {
    pub mission: usize,
    pub attempt: usize,
}

impl QuestStage {
    pub fn first() -> Self {
        Self {
            mission: 1,
            attempt: 0,
        }
    }

    pub fn next_attempt(self) -> Self {
        Self {
            mission: self.mission,
            attempt: self.attempt + 1,
        }
    }

    pub fn next_mission(self) -> Self {
        Self {
            mission: self.mission + 1,
            attempt: 0,
        }
    }
}

impl fmt::Display for QuestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.mission, self.attempt)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub successes: usize,
    pub failures: usize,
    pub reversals: usize,
    pub beasts: usize,
}

impl VoteTally {
    pub fn record(&mut self, vote: QuestVote) {
        match vote {
            QuestVote::Fail => self.failures += 1,
            QuestVote::Success => self.successes += 1,
            QuestVote::Reversal => self.reversals += 1,
            QuestVote::Beast => self.beasts += 1,
            QuestVote::AvalonPower => {}
        }
    }

    pub fn retract(&mut self, vote: QuestVote) {
        let counter = match vote {
            QuestVote::Fail => &mut self.failures,
            QuestVote::Success => &mut self.successes,
            QuestVote::Reversal => &mut self.reversals,
            QuestVote::Beast => &mut self.beasts,
            QuestVote::AvalonPower => return,
        };
        *counter = counter.saturating_sub(1);
    }

    pub fn total(&self) -> usize {
        self.successes + self.failures + self.reversals + self.beasts
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestStats {
    pub level: usize,
    pub policy: QuestPolicy,
    pub required_players: usize,
    #[serde(flatten)]
    pub tally: VoteTally,
    pub avalon_power: bool,
    pub outcome: Option<QuestOutcome>,
}

/// One record per suggestion. Only the newest entry is ever mutated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestArchiveItem {
    pub stage: QuestStage,
    pub suggester: String,
    pub players: Vec<String>,
    pub excalibur_holder: Option<String>,
    pub excalibur_target: Option<String>,
    pub voted_yes: Vec<String>,
    pub voted_no: Vec<String>,
    pub accepted: bool,
    #[serde(flatten)]
    pub tally: VoteTally,
    pub outcome: Option<QuestOutcome>,
    pub avalon_power: bool,
    pub lancelot_switched: bool,
    pub lady_suggester: Option<String>,
    pub lady_target: Option<String>,
    pub lady_claim: Option<Loyalty>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CharacterSelection {
    pub character: Character,
    pub assassin: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Sighting {
    pub viewer: String,
    pub seen: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSecrets {
    pub facts: Vec<String>,
    pub same_loyalty: Vec<String>,
    pub different_loyalty: Vec<String>,
    pub good_players: Vec<String>,
    pub bad_players: Vec<String>,
    pub uncovered: BTreeMap<String, String>,
    pub sightings: Vec<Sighting>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MurderTarget {
    Character(Character),
    Lovers,
}

impl MurderTarget {
    pub fn parse(value: &str) -> Option<Self> {
        if value == "The-Lovers" {
            return Some(Self::Lovers);
        }
        Character::parse(value).map(Self::Character)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Character(character) => character.name(),
            Self::Lovers => "The-Lovers",
        }
    }
}

impl Serialize for MurderTarget {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMurder {
    pub by: String,
    pub by_character: Character,
    pub targets: Vec<String>,
    pub target_characters: Vec<MurderTarget>,
    pub on_success: Option<GamePhase>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterView {
    pub all: Vec<String>,
    pub active: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterDescription {
    pub alignment: Alignment,
    pub legal_votes: Vec<QuestVote>,
    pub flush_votes: Vec<QuestVote>,
    pub sees: Vec<Character>,
    pub murdered_by: Vec<Character>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretView {
    pub character: Character,
    #[serde(flatten)]
    pub secrets: PlayerSecrets,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeerView {
    pub seer: String,
    pub options: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LadyView {
    pub holder: String,
    pub previous_holder: Option<String>,
    pub chosen: Option<String>,
    pub response: Option<Loyalty>,
    pub response_options: Vec<Loyalty>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MurderView {
    pub by: String,
    pub by_character: Character,
    pub target_characters: Vec<MurderTarget>,
    pub target_count: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerReveal {
    pub player: String,
    pub character: Character,
    pub killed_by: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub viewer: String,
    pub phase: GamePhase,
    pub status: String,
    pub halted: bool,
    pub players: RosterView,
    pub current_quest: usize,
    pub num_quests: usize,
    pub active_players: usize,
    pub successes: usize,
    pub failures: usize,
    pub characters: BTreeMap<String, CharacterDescription>,
    pub quests: Vec<QuestStats>,
    pub archive: Vec<QuestArchiveItem>,
    pub secrets: Option<SecretView>,
    pub legal_votes: Vec<QuestVote>,
    pub suggester: Option<String>,
    pub veto_holder: Option<String>,
    pub suggested_players: Vec<String>,
    pub suggestion_voters: Vec<String>,
    pub voted_yes: Vec<String>,
    pub voted_no: Vec<String>,
    pub journey_voters: Vec<String>,
    pub only_good_suggested: Option<bool>,
    pub seer: Option<SeerView>,
    pub excalibur_enabled: bool,
    pub excalibur_holder: Option<String>,
    pub lady: Option<LadyView>,
    pub murder: Option<MurderView>,
    pub reveals: Vec<PlayerReveal>,
    pub shadow_results: BTreeMap<usize, QuestOutcome>,
}

/// Everything a player can ask the match to do once it is running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameAction {
    StartGame {
        selection: Vec<CharacterSelection>,
        excalibur: bool,
        lady: bool,
    },
    SirPick {
        player: String,
    },
    Suggest {
        players: Vec<String>,
        excalibur: Option<String>,
    },
    SuggestTemporary {
        players: Vec<String>,
    },
    VoteForSuggestion {
        player: String,
        yes: bool,
    },
    VoteForJourney {
        player: String,
        vote: QuestVote,
    },
    ExcaliburPick {
        players: Vec<String>,
    },
    LadySuggest {
        player: String,
    },
    LadyResponse {
        loyalty: Loyalty,
    },
    LadyPublishResponse {
        loyalty: Loyalty,
    },
    Murder {
        target: Option<MurderTarget>,
        selection: Vec<String>,
    },
}
