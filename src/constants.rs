use crate::types::QuestPolicy;

pub const MIN_PLAYERS: usize = 5;
pub const MAX_PLAYERS: usize = 13;

/// Lancelot allegiance deck, `1` swaps the Lancelots after a mission.
pub const LANCELOT_DECK: [u8; 7] = [0, 0, 1, 0, 1, 0, 0];

/// Gornemant and Blanchefleur stay out of Stray's disguise pool below this roster size.
pub const STRAY_RESTRICTED_BELOW: usize = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardConfig {
    pub num_quests: usize,
    pub num_bad: usize,
    pub players_per_level: &'static [usize],
    pub retries_per_level: &'static [usize],
}

const RETRIES_SHORT: [usize; 5] = [5, 5, 5, 5, 5];
const RETRIES_LONG: [usize; 7] = [5, 5, 5, 7, 7, 7, 3];

pub fn get_board_config_by_player_count(player_count: usize) -> Option<BoardConfig> {
    let config = match player_count {
        2 => BoardConfig {
            num_quests: 3,
            num_bad: 1,
            players_per_level: &[2, 2, 2],
            retries_per_level: &[5, 5, 5],
        },
        4 => BoardConfig {
            num_quests: 4,
            num_bad: 1,
            players_per_level: &[2, 3, 3, 3],
            retries_per_level: &[5, 5, 5, 5],
        },
        5 => BoardConfig {
            num_quests: 5,
            num_bad: 2,
            players_per_level: &[2, 3, 2, 3, 3],
            retries_per_level: &RETRIES_SHORT,
        },
        6 => BoardConfig {
            num_quests: 5,
            num_bad: 2,
            players_per_level: &[2, 3, 4, 3, 4],
            retries_per_level: &RETRIES_SHORT,
        },
        7 => BoardConfig {
            num_quests: 7,
            num_bad: 3,
            players_per_level: &[3, 3, 3, 4, 3, 4, 4],
            retries_per_level: &RETRIES_LONG,
        },
        8 => BoardConfig {
            num_quests: 7,
            num_bad: 3,
            players_per_level: &[3, 3, 4, 4, 4, 5, 5],
            retries_per_level: &RETRIES_LONG,
        },
        9 => BoardConfig {
            num_quests: 7,
            num_bad: 3,
            players_per_level: &[3, 4, 4, 5, 4, 5, 5],
            retries_per_level: &RETRIES_LONG,
        },
        10 => BoardConfig {
            num_quests: 7,
            num_bad: 4,
            players_per_level: &[3, 4, 4, 5, 4, 5, 5],
            retries_per_level: &RETRIES_LONG,
        },
        11 => BoardConfig {
            num_quests: 7,
            num_bad: 4,
            players_per_level: &[4, 5, 4, 5, 5, 5, 6],
            retries_per_level: &RETRIES_LONG,
        },
        12 => BoardConfig {
            num_quests: 7,
            num_bad: 5,
            players_per_level: &[4, 5, 5, 6, 5, 6, 6],
            retries_per_level: &RETRIES_LONG,
        },
        13 => BoardConfig {
            num_quests: 8,
            num_bad: 5,
            players_per_level: &[4, 5, 5, 6, 5, 6, 6, 7],
            retries_per_level: &[5, 5, 5, 7, 7, 7, 7, 3],
        },
        _ => return None,
    };
    Some(config)
}

/// Scoring policy of mission `level` (1-based). Small games only play regular
/// missions; larger ones have a flush on mission 4 and need two fails on the last.
pub fn get_quest_policy(level: usize, active_players: usize) -> QuestPolicy {
    if active_players <= 6 {
        return QuestPolicy::Regular;
    }
    let Some(config) = get_board_config_by_player_count(active_players) else {
        return QuestPolicy::Regular;
    };
    if level == 4 {
        return QuestPolicy::Flush;
    }
    if level == config.num_quests {
        return QuestPolicy::TwoFailsRequired;
    }
    QuestPolicy::Regular
}

pub fn is_good_victory(successes: usize, num_quests: usize) -> bool {
    successes > num_quests / 2
}

pub fn is_bad_victory(failures: usize, num_quests: usize) -> bool {
    failures > num_quests / 2 || (num_quests == 4 && failures == 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_configured_roster_has_consistent_levels() {
        for players in 1..=MAX_PLAYERS {
            let Some(config) = get_board_config_by_player_count(players) else {
                continue;
            };
            assert_eq!(config.players_per_level.len(), config.num_quests);
            assert_eq!(config.retries_per_level.len(), config.num_quests);
            assert!(config.players_per_level.iter().all(|size| *size <= players));
        }
        assert!(get_board_config_by_player_count(1).is_none());
        assert!(get_board_config_by_player_count(3).is_none());
        assert!(get_board_config_by_player_count(14).is_none());
    }

    #[test]
    fn rotation_indices_stay_in_roster_bounds() {
        for players in MIN_PLAYERS..=MAX_PLAYERS {
            let config = get_board_config_by_player_count(players).expect("configured");
            let total: usize = config.players_per_level.iter().sum();
            for retries in config.retries_per_level {
                for proposer in 0..players * 3 {
                    let veto = (proposer + retries - 1) % players;
                    assert!(veto < players);
                }
            }
            assert!(total % players < players);
        }
    }

    #[test]
    fn large_games_flush_mission_four_and_need_two_fails_last() {
        assert_eq!(get_quest_policy(4, 7), QuestPolicy::Flush);
        assert_eq!(get_quest_policy(7, 7), QuestPolicy::TwoFailsRequired);
        assert_eq!(get_quest_policy(8, 13), QuestPolicy::TwoFailsRequired);
        assert_eq!(get_quest_policy(7, 13), QuestPolicy::Regular);
        assert_eq!(get_quest_policy(1, 10), QuestPolicy::Regular);
        assert_eq!(get_quest_policy(4, 6), QuestPolicy::Regular);
        assert_eq!(get_quest_policy(5, 5), QuestPolicy::Regular);
    }

    #[test]
    fn four_mission_board_is_lost_at_exact_half() {
        assert!(is_bad_victory(2, 4));
        assert!(!is_bad_victory(1, 4));
        assert!(!is_bad_victory(2, 5));
        assert!(is_bad_victory(3, 5));
        assert!(is_bad_victory(4, 7));
        assert!(!is_good_victory(2, 5));
        assert!(is_good_victory(3, 5));
        assert!(is_good_victory(3, 4));
    }
}
