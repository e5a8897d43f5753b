pub const MAX_NAME_CHARS: usize = 20;

/// Trims, drops control characters, collapses inner whitespace and caps the
/// length. `None` when nothing printable is left.
pub fn normalize_player_name(value: &str) -> Option<String> {
    let words: Vec<String> = value
        .split_whitespace()
        .map(|word| word.chars().filter(|c| !c.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect();
    let name: String = words.join(" ").chars().take(MAX_NAME_CHARS).collect();
    let name = name.trim_end().to_string();
    (!name.is_empty()).then_some(name)
}

/// The roster entry `name` refers to. Matching ignores case so a returning
/// player keeps their seat.
pub fn find_roster_name<'a>(roster: &'a [String], name: &str) -> Option<&'a str> {
    roster
        .iter()
        .find(|entry| entry.to_lowercase() == name.to_lowercase())
        .map(String::as_str)
}

/// Which connections a fan-out reaches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recipients {
    All,
    AllExcept(String),
    Only(String),
}

impl Recipients {
    pub fn includes(&self, client_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::AllExcept(excluded) => excluded != client_id,
            Self::Only(target) => target == client_id,
        }
    }
}
