use avalon_server::characters::Character;
use avalon_server::constants::{get_board_config_by_player_count, MAX_PLAYERS, MIN_PLAYERS};
use avalon_server::engine::MatchEngine;
use avalon_server::error::ActionError;
use avalon_server::rng::Rng;
use avalon_server::types::{CharacterSelection, GameAction, GamePhase, Loyalty, MurderTarget};
use clap::Parser;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

const STEP_BUDGET: usize = 5_000;

const GOOD_POOL: [Character; 8] = [
    Character::Merlin,
    Character::Percival,
    Character::LoyalServant,
    Character::LoyalServant1,
    Character::LoyalServant2,
    Character::LoyalServant3,
    Character::LoyalServant4,
    Character::Galahad,
];

const BAD_POOL: [Character; 5] = [
    Character::Assassin,
    Character::Morgana,
    Character::Mordred,
    Character::Minion,
    Character::Minion1,
];

#[derive(Parser, Debug)]
#[command(author, version, about = "Plays random matches against the rules engine")]
struct Cli {
    /// Roster sizes to play; every supported size when omitted.
    #[arg(long = "players")]
    players: Vec<usize>,
    #[arg(long, default_value_t = 20)]
    games: usize,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    excalibur: bool,
    #[arg(long)]
    lady: bool,
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    players: usize,
    seed: u64,
    excalibur: bool,
    lady: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioResultLine {
    scenario: String,
    seed: u64,
    players: usize,
    outcome: String,
    missions_played: usize,
    successes: usize,
    failures: usize,
    suggestions: usize,
    steps: usize,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunSummary {
    run_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    scenario_count: usize,
    anomaly_count: usize,
    average_missions: f64,
    outcome_counts: BTreeMap<usize, BTreeMap<String, usize>>,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StructuredLogLine {
    timestamp_ms: u64,
    level: String,
    event: String,
    run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    details: Value,
}

fn main() {
    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli);
    let run_started_at_ms = now_ms();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let run_id = cli
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(seed_hint, run_started_at_ms));
    let mut has_anomaly = false;
    let mut results = Vec::new();

    for scenario in &scenarios {
        let result = run_scenario(scenario);
        for anomaly in &result.anomalies {
            emit_log(
                "warn",
                "anomaly_detected",
                &run_id,
                Some(&scenario.name),
                Some(scenario.seed),
                json!({ "message": anomaly }),
            );
        }
        has_anomaly |= !result.anomalies.is_empty();
        emit_log(
            "info",
            "scenario_finished",
            &run_id,
            Some(&scenario.name),
            Some(scenario.seed),
            json!({
                "outcome": result.outcome,
                "missionsPlayed": result.missions_played,
                "steps": result.steps,
            }),
        );
        match serde_json::to_string(&result) {
            Ok(line) => println!("{line}"),
            Err(error) => emit_log(
                "error",
                "result_serialize_failed",
                &run_id,
                Some(&scenario.name),
                Some(scenario.seed),
                json!({ "error": error.to_string() }),
            ),
        }
        results.push(result);
    }

    let summary = build_run_summary(run_id.clone(), run_started_at_ms, now_ms(), results);

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &run_id,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &run_id,
        None,
        None,
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "averageMissions": summary.average_missions,
            "outcomeCounts": summary.outcome_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let sizes: Vec<usize> = if cli.players.is_empty() {
        (MIN_PLAYERS..=MAX_PLAYERS).collect()
    } else {
        cli.players
            .iter()
            .copied()
            .filter(|size| (MIN_PLAYERS..=MAX_PLAYERS).contains(size))
            .collect()
    };
    let base_seed = cli.seed.unwrap_or_else(now_ms);
    let mut scenarios = Vec::new();
    for players in sizes {
        for game in 0..cli.games {
            let seed = base_seed
                .wrapping_mul(31)
                .wrapping_add((players * 1_000 + game) as u64);
            scenarios.push(Scenario {
                name: format!("p{players}-g{game}"),
                players,
                seed,
                excalibur: cli.excalibur,
                lady: cli.lady,
            });
        }
    }
    scenarios
}

/// Merlin, Percival and loyal servants against an Assassin-led bad side.
fn default_selection(players: usize) -> Option<Vec<CharacterSelection>> {
    let board = get_board_config_by_player_count(players)?;
    let good = players.checked_sub(board.num_bad)?;
    if good > GOOD_POOL.len() || board.num_bad > BAD_POOL.len() {
        return None;
    }
    let characters = GOOD_POOL[..good].iter().chain(&BAD_POOL[..board.num_bad]);
    Some(
        characters
            .map(|character| CharacterSelection {
                character: *character,
                assassin: false,
            })
            .collect(),
    )
}

fn run_scenario(scenario: &Scenario) -> ScenarioResultLine {
    let mut engine = MatchEngine::new(Rng::new(scenario.seed));
    let mut bots = Rng::new(scenario.seed ^ 0x5eed);
    let mut anomalies = Vec::new();

    for idx in 1..=scenario.players {
        if let Err(error) = engine.add_player(&format!("bot{idx}")) {
            anomalies.push(format!("join rejected: {error}"));
        }
    }
    let host = engine.roster().first().cloned().unwrap_or_default();
    let Some(selection) = default_selection(scenario.players) else {
        anomalies.push(format!("no selection for {} players", scenario.players));
        return finish(scenario, &engine, 0, anomalies);
    };
    let start = GameAction::StartGame {
        selection,
        excalibur: scenario.excalibur,
        lady: scenario.lady,
    };
    if let Err(error) = engine.apply(&host, start) {
        anomalies.push(format!("start rejected: {error}"));
        return finish(scenario, &engine, 0, anomalies);
    }

    let mut steps = 0;
    while !engine.phase().is_concluded() {
        if steps >= STEP_BUDGET {
            anomalies.push(format!("step budget exceeded in {:?}", engine.phase()));
            break;
        }
        steps += 1;
        let Some((sender, action)) = next_bot_action(&engine, &mut bots) else {
            anomalies.push(format!("no bot can act in {:?}", engine.phase()));
            break;
        };
        if let Err(error) = engine.apply(&sender, action.clone()) {
            anomalies.push(format!("{sender} {action:?} rejected: {error}"));
            if error == ActionError::Halted || engine.is_halted() {
                break;
            }
        }
    }

    if engine.successes() + engine.failures() > engine.num_quests() {
        anomalies.push("more mission results than missions".to_string());
    }
    finish(scenario, &engine, steps, anomalies)
}

fn finish(
    scenario: &Scenario,
    engine: &MatchEngine,
    steps: usize,
    anomalies: Vec<String>,
) -> ScenarioResultLine {
    ScenarioResultLine {
        scenario: scenario.name.clone(),
        seed: scenario.seed,
        players: scenario.players,
        outcome: phase_key(engine.phase()),
        missions_played: engine
            .quests()
            .iter()
            .filter(|quest| quest.outcome.is_some())
            .count(),
        successes: engine.successes(),
        failures: engine.failures(),
        suggestions: engine.archive().len(),
        steps,
        anomalies,
    }
}

/// A random legal move for whoever the board is waiting on.
fn next_bot_action(engine: &MatchEngine, bots: &mut Rng) -> Option<(String, GameAction)> {
    match engine.phase() {
        GamePhase::SirPickPlayer => {
            let seer = engine.holder_of(Character::Seer)?.to_string();
            let options = engine.seer_options();
            let player = bots.pick(&options)?.clone();
            Some((seer, GameAction::SirPick { player }))
        }
        GamePhase::AwaitingSuggestion => {
            let suggester = engine.suggester()?.to_string();
            let size = engine.required_team_size()?;
            let mut roster = engine.roster().to_vec();
            bots.shuffle(&mut roster);
            roster.truncate(size);
            let excalibur = engine
                .view_for(&suggester)
                .excalibur_enabled
                .then(|| bots.pick(&roster).cloned())
                .flatten();
            Some((
                suggester,
                GameAction::Suggest {
                    players: roster,
                    excalibur,
                },
            ))
        }
        GamePhase::SuggestionVoting => {
            let player = engine
                .suggestion_voters()
                .into_iter()
                .find(|player| !engine.has_voted_on_suggestion(player))?;
            let yes = bots.coin() || bots.coin();
            Some((player.clone(), GameAction::VoteForSuggestion { player, yes }))
        }
        GamePhase::JourneyVoting => {
            let player = engine
                .suggested()
                .iter()
                .find(|player| !engine.has_voted_on_journey(player))?
                .clone();
            let options = engine.legal_votes_for(&player);
            let vote = *bots.pick(&options)?;
            Some((player.clone(), GameAction::VoteForJourney { player, vote }))
        }
        GamePhase::ExcaliburPick => {
            let holder = engine.excalibur_holder()?.to_string();
            let candidates: Vec<String> = engine
                .suggested()
                .iter()
                .filter(|player| **player != holder)
                .cloned()
                .collect();
            let players = match bots.pick(&candidates) {
                Some(target) if bots.coin() => vec![target.clone()],
                _ => Vec::new(),
            };
            Some((holder, GameAction::ExcaliburPick { players }))
        }
        GamePhase::WaitingForLadySuggester => {
            let holder = engine.lady_holder()?.to_string();
            let previous = engine.view_for(&holder).lady?.previous_holder;
            let candidates: Vec<String> = engine
                .roster()
                .iter()
                .filter(|player| **player != holder && Some(*player) != previous.as_ref())
                .cloned()
                .collect();
            let player = bots.pick(&candidates)?.clone();
            Some((holder, GameAction::LadySuggest { player }))
        }
        GamePhase::LadyResponse => {
            let chosen = engine.lady_chosen()?.to_string();
            let options = engine.view_for(&chosen).lady?.response_options;
            let loyalty = *bots.pick(&options)?;
            Some((chosen, GameAction::LadyResponse { loyalty }))
        }
        GamePhase::LadySuggesterPublishResponseToWorld => {
            let holder = engine.lady_holder()?.to_string();
            let loyalty = if bots.coin() {
                Loyalty::Good
            } else {
                Loyalty::Bad
            };
            Some((holder, GameAction::LadyPublishResponse { loyalty }))
        }
        GamePhase::MurdersAfterGoodVictory | GamePhase::MurdersAfterBadVictory => {
            let step = engine.pending_murder()?;
            let mut roster = engine.roster().to_vec();
            bots.shuffle(&mut roster);
            let (target, count) = if step.by_character == Character::Assassin {
                let target = *bots.pick(&step.target_characters)?;
                let count = if target == MurderTarget::Lovers { 2 } else { 1 };
                (Some(target), count)
            } else {
                (None, step.targets.len())
            };
            roster.truncate(count);
            Some((
                step.by.clone(),
                GameAction::Murder {
                    target,
                    selection: roster,
                },
            ))
        }
        GamePhase::NotStarted
        | GamePhase::VictoryForGood
        | GamePhase::VictoryForBad
        | GamePhase::VictoryForGawain
        | GamePhase::VictoryForSirGawain => None,
    }
}

fn phase_key(phase: GamePhase) -> String {
    serde_json::to_value(phase)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{phase:?}"))
}

fn default_run_id(seed: u64, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    run_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    scenarios: Vec<ScenarioResultLine>,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let anomaly_count = scenarios.iter().map(|result| result.anomalies.len()).sum();
    let total_missions: usize = scenarios.iter().map(|result| result.missions_played).sum();
    let average_missions = if scenario_count == 0 {
        0.0
    } else {
        total_missions as f64 / scenario_count as f64
    };
    let mut outcome_counts: BTreeMap<usize, BTreeMap<String, usize>> = BTreeMap::new();
    for result in &scenarios {
        *outcome_counts
            .entry(result.players)
            .or_default()
            .entry(result.outcome.clone())
            .or_insert(0) += 1;
    }
    RunSummary {
        run_id,
        started_at_ms,
        finished_at_ms,
        scenario_count,
        anomaly_count,
        average_missions,
        outcome_counts,
        scenarios,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    run_id: &str,
    scenario: Option<&str>,
    seed: Option<u64>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        run_id: run_id.to_string(),
        scenario: scenario.map(|value| value.to_string()),
        seed,
        details,
    };
    if let Ok(line) = serde_json::to_string(&log_line) {
        eprintln!("{line}");
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(players: usize, seed: u64, excalibur: bool, lady: bool) -> Scenario {
        Scenario {
            name: format!("test-{players}"),
            players,
            seed,
            excalibur,
            lady,
        }
    }

    fn make_result(players: usize, outcome: &str, missions_played: usize) -> ScenarioResultLine {
        ScenarioResultLine {
            scenario: "test".to_string(),
            seed: 42,
            players,
            outcome: outcome.to_string(),
            missions_played,
            successes: 0,
            failures: 0,
            suggestions: 0,
            steps: 0,
            anomalies: Vec::new(),
        }
    }

    #[test]
    fn default_run_id_contains_seed_and_timestamp() {
        assert_eq!(default_run_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn default_selection_fits_every_board() {
        for players in MIN_PLAYERS..=MAX_PLAYERS {
            let selection = default_selection(players).expect("selection exists");
            assert_eq!(selection.len(), players);
            assert!(selection
                .iter()
                .any(|entry| entry.character == Character::Assassin));
        }
        assert!(default_selection(3).is_none());
    }

    #[test]
    fn random_matches_finish_without_anomalies() {
        for players in MIN_PLAYERS..=MAX_PLAYERS {
            for seed in 0..3 {
                let result = run_scenario(&scenario(players, seed, seed == 1, seed == 2));
                assert!(
                    result.anomalies.is_empty(),
                    "{players} players, seed {seed}: {:?}",
                    result.anomalies
                );
                assert!(result.outcome.starts_with("victory_for"));
            }
        }
    }

    #[test]
    fn build_run_summary_groups_outcomes_by_roster_size() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            1,
            2,
            vec![
                make_result(5, "victory_for_good", 3),
                make_result(5, "victory_for_bad", 5),
                make_result(7, "victory_for_bad", 4),
            ],
        );
        assert_eq!(summary.scenario_count, 3);
        assert_eq!(summary.average_missions, 4.0);
        assert_eq!(summary.outcome_counts[&5]["victory_for_bad"], 1);
        assert_eq!(summary.outcome_counts[&7]["victory_for_bad"], 1);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let target = std::env::temp_dir()
            .join(format!("avalon-sim-missing-{}", now_ms()))
            .join("summary.json");
        let summary = build_run_summary("sim-1-1".to_string(), 1, 2, Vec::new());
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn resolve_scenarios_skips_unsupported_sizes() {
        let cli = Cli::parse_from(["simulate", "--players", "4", "--players", "6", "--games", "2"]);
        let scenarios = resolve_scenarios(&cli);
        assert_eq!(scenarios.len(), 2);
        assert!(scenarios.iter().all(|scenario| scenario.players == 6));
    }
}
