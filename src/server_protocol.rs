use serde_json::{Map, Value};

use crate::characters::Character;
use crate::types::{CharacterSelection, GameAction, Loyalty, MurderTarget, QuestVote};

#[derive(Debug, PartialEq, Eq)]
pub enum ParsedClientMessage {
    Hello { name: String },
    Action(GameAction),
    Refresh,
    Reset,
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    let action = match message_type {
        "hello" => {
            let name = object.get("name")?.as_str()?.to_string();
            return Some(ParsedClientMessage::Hello { name });
        }
        "refresh" => return Some(ParsedClientMessage::Refresh),
        "reset" => return Some(ParsedClientMessage::Reset),
        "start_game" => GameAction::StartGame {
            selection: parse_selection(object.get("selectedCharacters")?)?,
            excalibur: parse_optional_bool(object.get("excalibur"))?,
            lady: parse_optional_bool(object.get("lady"))?,
        },
        "sir_pick" => GameAction::SirPick {
            player: string_field(object, "player")?,
        },
        "suggestion" => {
            let excalibur = match object.get("excaliburPlayer") {
                None | Some(Value::Null) => None,
                Some(value) => Some(value.as_str()?.to_string()),
            };
            GameAction::Suggest {
                players: string_list(object.get("players")?)?,
                excalibur: excalibur.filter(|name| !name.is_empty()),
            }
        }
        "suggestion_tmp" => GameAction::SuggestTemporary {
            players: string_list(object.get("players")?)?,
        },
        "vote_for_suggestion" => GameAction::VoteForSuggestion {
            player: string_field(object, "player")?,
            yes: object.get("vote")?.as_bool()?,
        },
        "vote_for_journey" => GameAction::VoteForJourney {
            player: string_field(object, "player")?,
            vote: parse_vote(object.get("vote")?)?,
        },
        "excalibur_pick" => GameAction::ExcaliburPick {
            players: string_list(object.get("players")?)?,
        },
        "lady_suggest" => GameAction::LadySuggest {
            player: string_field(object, "player")?,
        },
        "lady_response" => GameAction::LadyResponse {
            loyalty: parse_loyalty(object.get("loyalty")?)?,
        },
        "lady_publish_response" => GameAction::LadyPublishResponse {
            loyalty: parse_loyalty(object.get("loyalty")?)?,
        },
        "murder" => {
            let target = match object.get("character") {
                None | Some(Value::Null) => None,
                Some(value) => match value.as_str()? {
                    "" => None,
                    name => Some(MurderTarget::parse(name)?),
                },
            };
            GameAction::Murder {
                target,
                selection: string_list(object.get("selection")?)?,
            }
        }
        _ => return None,
    };
    Some(ParsedClientMessage::Action(action))
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    Some(object.get(key)?.as_str()?.to_string())
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn parse_optional_bool(value: Option<&Value>) -> Option<bool> {
    match value {
        None | Some(Value::Null) => Some(false),
        Some(value) => value.as_bool(),
    }
}

/// Entries are `{name, checked, assistant}`; unchecked entries are skipped and
/// `assistant` marks the character that carries the Assassin role.
fn parse_selection(value: &Value) -> Option<Vec<CharacterSelection>> {
    let mut selection = Vec::new();
    for entry in value.as_array()? {
        let entry = entry.as_object()?;
        let checked = match entry.get("checked") {
            None | Some(Value::Null) => true,
            Some(value) => value.as_bool()?,
        };
        if !checked {
            continue;
        }
        let character = Character::parse(entry.get("name")?.as_str()?)?;
        let assassin = parse_optional_bool(entry.get("assistant"))?;
        selection.push(CharacterSelection {
            character,
            assassin,
        });
    }
    Some(selection)
}

/// Numeric codes or labels.
fn parse_vote(value: &Value) -> Option<QuestVote> {
    if let Some(code) = value.as_i64() {
        return QuestVote::from_code(code);
    }
    QuestVote::parse(value.as_str()?)
}

fn parse_loyalty(value: &Value) -> Option<Loyalty> {
    if let Some(code) = value.as_i64() {
        return Loyalty::from_code(code);
    }
    match value.as_str()? {
        "bad" | "Bad" => Some(Loyalty::Bad),
        "good" | "Good" => Some(Loyalty::Good),
        "neutral" | "Neutral" => Some(Loyalty::Neutral),
        _ => None,
    }
}
