use super::*;

use crate::characters::Alignment;
use crate::types::MurderTarget;

fn same_players(left: &[String], right: &[String]) -> bool {
    let left: BTreeSet<&str> = left.iter().map(String::as_str).collect();
    let right: BTreeSet<&str> = right.iter().map(String::as_str).collect();
    left == right
}

impl MatchEngine {
    /// Missions are decided. Either the murder table takes over or the match ends.
    pub(super) fn declare_mission_victory(&mut self, winner: Alignment) -> ActionResult {
        let (steps, murder_phase, victory) = match winner {
            Alignment::Bad => (
                self.bad_win_murders(),
                GamePhase::MurdersAfterBadVictory,
                GamePhase::VictoryForBad,
            ),
            _ => match self.good_win_murders() {
                Ok(steps) => (
                    steps,
                    GamePhase::MurdersAfterGoodVictory,
                    GamePhase::VictoryForGood,
                ),
                Err(reason) => return Err(self.halt(reason)),
            },
        };
        self.begin_murders(steps, murder_phase, victory);
        Ok(())
    }

    fn begin_murders(
        &mut self,
        steps: VecDeque<PendingMurder>,
        murder_phase: GamePhase,
        victory: GamePhase,
    ) {
        if steps.is_empty() {
            self.murders.clear();
            self.enter(victory);
            info!(outcome = ?victory, "match decided");
            return;
        }
        self.murders = steps;
        self.enter(murder_phase);
        self.describe_pending_murder();
        info!(phase = ?murder_phase, steps = self.murders.len(), "murders pending");
    }

    fn describe_pending_murder(&mut self) {
        let Some(step) = self.murders.front() else {
            return;
        };
        let targets: Vec<&str> = step
            .target_characters
            .iter()
            .map(|target| target.name())
            .collect();
        self.status = format!(
            "{} ({}) is hunting: {}",
            step.by,
            step.by_character,
            targets.join(", ")
        );
    }

    fn beast_hunt(&self) -> Option<PendingMurder> {
        let pellinore = self.holder_of(Character::Pellinore)?;
        let beast = self.holder_of(Character::TheQuestingBeast)?;
        Some(PendingMurder {
            by: pellinore.to_string(),
            by_character: Character::Pellinore,
            targets: vec![beast.to_string()],
            target_characters: vec![MurderTarget::Character(Character::TheQuestingBeast)],
            on_success: None,
        })
    }

    /// `hunter` must name every bad player at once.
    fn bad_hunt(&self, hunter: Character, on_success: GamePhase) -> Option<PendingMurder> {
        let by = self.holder_of(hunter)?.to_string();
        let roles = self.roles.as_ref()?;
        let targets = roles.bad_players(&self.roster);
        let target_characters = targets
            .iter()
            .filter_map(|player| roles.character_of(player))
            .map(MurderTarget::Character)
            .collect();
        Some(PendingMurder {
            by,
            by_character: hunter,
            targets,
            target_characters,
            on_success: Some(on_success),
        })
    }

    fn good_win_murders(&self) -> Result<VecDeque<PendingMurder>, &'static str> {
        let mut steps: VecDeque<PendingMurder> = self.beast_hunt().into_iter().collect();

        let claudins = self.holder_of(Character::KingClaudin).is_some()
            && self.holder_of(Character::PrinceClaudin).is_some();
        if claudins {
            let hunter = [Character::Percival, Character::KingArthur]
                .into_iter()
                .find(|character| self.holder_of(*character).is_some());
            if let Some(step) =
                hunter.and_then(|hunter| self.bad_hunt(hunter, GamePhase::VictoryForGood))
            {
                steps.push_back(step);
            }
        }

        let mut targets = Vec::new();
        let mut target_characters = Vec::new();
        for character in Character::ALL
            .iter()
            .copied()
            .filter(|character| character.is_assassin_target())
        {
            if let Some(holder) = self.holder_of(character) {
                targets.push(holder.to_string());
                target_characters.push(MurderTarget::Character(character));
            }
        }
        if let (Some(tristan), Some(iseult)) = (
            self.holder_of(Character::Tristan),
            self.holder_of(Character::Iseult),
        ) {
            targets.push(tristan.to_string());
            targets.push(iseult.to_string());
            target_characters.push(MurderTarget::Lovers);
        }
        if target_characters.is_empty() {
            return Ok(steps);
        }

        let Some(assassin) = self.roles.as_ref().and_then(|roles| roles.assassin()) else {
            return Err("assassination targets are in play but nobody is the assassin");
        };
        steps.push_back(PendingMurder {
            by: assassin.to_string(),
            by_character: Character::Assassin,
            targets,
            target_characters,
            on_success: Some(GamePhase::VictoryForBad),
        });
        Ok(steps)
    }

    fn bad_win_murders(&self) -> VecDeque<PendingMurder> {
        let mut steps: VecDeque<PendingMurder> = self.beast_hunt().into_iter().collect();
        if let (Some(cordana), Some(mordred)) = (
            self.holder_of(Character::Cordana),
            self.holder_of(Character::Mordred),
        ) {
            steps.push_back(PendingMurder {
                by: cordana.to_string(),
                by_character: Character::Cordana,
                targets: vec![mordred.to_string()],
                target_characters: vec![MurderTarget::Character(Character::Mordred)],
                on_success: Some(GamePhase::MurdersAfterGoodVictory),
            });
        }
        if let Some(step) = self.bad_hunt(Character::KingArthur, GamePhase::VictoryForGood) {
            steps.push_back(step);
        }
        steps
    }

    fn assassin_hits(&self, named: MurderTarget, selection: &[String]) -> bool {
        match (named, selection) {
            (MurderTarget::Character(character), [single]) => {
                self.character_of(single) == Some(character)
            }
            (MurderTarget::Lovers, [_, _]) => {
                let lovers: Vec<String> = [Character::Tristan, Character::Iseult]
                    .into_iter()
                    .filter_map(|character| self.holder_of(character).map(str::to_string))
                    .collect();
                lovers.len() == 2 && same_players(&lovers, selection)
            }
            _ => false,
        }
    }

    pub fn murder(&mut self, target: Option<MurderTarget>, selection: &[String]) -> ActionResult {
        self.ensure_live()?;
        if !self.phase.is_murder_phase() {
            return Err(ActionError::WrongPhase(self.phase));
        }
        self.unique_roster_members(selection)?;
        let Some(step) = self.murders.front().cloned() else {
            return Err(ActionError::WrongPhase(self.phase));
        };
        let assassin_step = step.by_character == Character::Assassin;
        let named = match (assassin_step, target) {
            (true, Some(named)) if step.target_characters.contains(&named) => Some(named),
            (true, Some(named)) => {
                return Err(ActionError::precondition(format!(
                    "{} is not an assassination target",
                    named.name()
                )))
            }
            (true, None) => {
                return Err(ActionError::precondition("the assassin must name a character"))
            }
            (false, _) => None,
        };

        if selection
            .iter()
            .any(|player| self.character_of(player) == Some(Character::SirGawain))
        {
            self.murders.clear();
            self.enter(GamePhase::VictoryForSirGawain);
            info!(killer = %step.by, "Sir Gawain was named, match over");
            return Ok(());
        }

        let success = match named {
            Some(named) => self.assassin_hits(named, selection),
            None => same_players(&step.targets, selection),
        };
        let next_table = match (success, step.on_success) {
            (true, Some(GamePhase::MurdersAfterGoodVictory)) => match self.good_win_murders() {
                Ok(steps) => Some(steps),
                Err(reason) => return Err(self.halt(reason)),
            },
            _ => None,
        };

        self.murders.pop_front();
        info!(
            killer = %step.by,
            by = %step.by_character,
            success,
            "murder attempt"
        );
        if success {
            for player in selection {
                self.killed.insert(player.clone(), step.by.clone());
            }
            match (step.on_success, next_table) {
                (Some(GamePhase::MurdersAfterGoodVictory), Some(steps)) => {
                    self.begin_murders(
                        steps,
                        GamePhase::MurdersAfterGoodVictory,
                        GamePhase::VictoryForGood,
                    );
                    return Ok(());
                }
                (Some(phase), _) => {
                    self.murders.clear();
                    self.enter(phase);
                    info!(outcome = ?phase, "match decided by murder");
                    return Ok(());
                }
                (None, _) => {}
            }
        }

        if self.murders.is_empty() {
            let victory = if self.phase == GamePhase::MurdersAfterGoodVictory {
                GamePhase::VictoryForGood
            } else {
                GamePhase::VictoryForBad
            };
            self.enter(victory);
            info!(outcome = ?victory, "match decided");
        } else {
            self.describe_pending_murder();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    /// One success short of the good win, then a clean mission by the first seats.
    fn won_by_good(seats: &[(&str, Character)]) -> MatchEngine {
        let mut engine = rigged(seats, false, false);
        engine.successes = engine.num_quests() / 2;
        let size = engine.required_team_size().unwrap_or(2);
        let team: Vec<&str> = seats.iter().take(size).map(|(name, _)| *name).collect();
        play_mission(&mut engine, &team, &vec![QuestVote::Success; size]);
        engine
    }

    fn merlin_table() -> Vec<(&'static str, Character)> {
        vec![
            ("ann", Character::Merlin),
            ("bob", Character::LoyalServant),
            ("cid", Character::Assassin),
            ("dan", Character::LoyalServant1),
            ("eve", Character::Morgana),
        ]
    }

    #[test]
    fn assassin_gets_one_shot_at_merlin() {
        let mut engine = won_by_good(&merlin_table());
        assert_eq!(engine.phase(), GamePhase::MurdersAfterGoodVictory);
        let step = engine.pending_murder().expect("assassin step");
        assert_eq!(step.by, "cid");
        assert_eq!(
            step.target_characters,
            vec![MurderTarget::Character(Character::Merlin)]
        );

        engine
            .murder(
                Some(MurderTarget::Character(Character::Merlin)),
                &names(&["ann"]),
            )
            .expect("assassin strikes");
        assert_eq!(engine.phase(), GamePhase::VictoryForBad);
        assert_eq!(engine.killed.get("ann").map(String::as_str), Some("cid"));
    }

    #[test]
    fn missed_assassination_keeps_the_good_win() {
        let mut engine = won_by_good(&merlin_table());
        engine
            .murder(
                Some(MurderTarget::Character(Character::Merlin)),
                &names(&["bob"]),
            )
            .expect("assassin misses");
        assert_eq!(engine.phase(), GamePhase::VictoryForGood);
        assert!(engine.killed.is_empty());
    }

    #[test]
    fn assassin_must_name_a_listed_character() {
        let mut engine = won_by_good(&merlin_table());
        assert!(matches!(
            engine.murder(
                Some(MurderTarget::Character(Character::Percival)),
                &names(&["ann"])
            ),
            Err(ActionError::Precondition(_))
        ));
        assert!(engine.murder(None, &names(&["ann"])).is_err());
        assert_eq!(engine.phase(), GamePhase::MurdersAfterGoodVictory);
        assert!(engine.pending_murder().is_some());
    }

    #[test]
    fn lovers_must_both_be_named() {
        let mut engine = won_by_good(&[
            ("ann", Character::Tristan),
            ("bob", Character::Iseult),
            ("cid", Character::Assassin),
            ("dan", Character::LoyalServant),
            ("eve", Character::Morgana),
        ]);
        engine
            .murder(Some(MurderTarget::Lovers), &names(&["bob", "ann"]))
            .expect("lovers named");
        assert_eq!(engine.phase(), GamePhase::VictoryForBad);
    }

    #[test]
    fn naming_sir_gawain_ends_everything() {
        let mut engine = won_by_good(&[
            ("ann", Character::Merlin),
            ("bob", Character::SirGawain),
            ("cid", Character::Assassin),
            ("dan", Character::LoyalServant),
            ("eve", Character::Morgana),
        ]);
        engine
            .murder(
                Some(MurderTarget::Character(Character::Merlin)),
                &names(&["bob"]),
            )
            .expect("gawain named");
        assert_eq!(engine.phase(), GamePhase::VictoryForSirGawain);
        assert!(engine.pending_murder().is_none());
    }

    #[test]
    fn good_win_without_an_assassin_halts() {
        let mut engine = rigged(
            &[
                ("ann", Character::Merlin),
                ("bob", Character::LoyalServant),
                ("cid", Character::Minion),
                ("dan", Character::LoyalServant1),
                ("eve", Character::Morgana),
            ],
            false,
            false,
        );
        engine.successes = 2;
        engine
            .suggest(&names(&["ann", "bob"]), None)
            .expect("suggestion accepted");
        vote_all(&mut engine, true);
        engine
            .vote_for_journey("ann", QuestVote::Success)
            .expect("first vote");
        let result = engine.vote_for_journey("bob", QuestVote::Success);
        assert!(matches!(result, Err(ActionError::Structural(_))));
        assert!(engine.is_halted());
    }

    #[test]
    fn claudins_and_pellinore_queue_before_the_assassin() {
        let mut engine = won_by_good(&[
            ("ann", Character::Percival),
            ("bob", Character::Pellinore),
            ("cid", Character::KingClaudin),
            ("dan", Character::PrinceClaudin),
            ("eve", Character::TheQuestingBeast),
            ("fay", Character::Merlin),
            ("gus", Character::Assassin),
        ]);
        let order: Vec<Character> = engine
            .murders
            .iter()
            .map(|step| step.by_character)
            .collect();
        assert_eq!(
            order,
            vec![Character::Pellinore, Character::Percival, Character::Assassin]
        );

        engine
            .murder(None, &names(&["eve"]))
            .expect("beast hunted");
        assert_eq!(engine.phase(), GamePhase::MurdersAfterGoodVictory);
        engine
            .murder(None, &names(&["gus", "cid"]))
            .expect("percival names the bad players");
        assert_eq!(engine.phase(), GamePhase::VictoryForGood);
        assert!(engine.pending_murder().is_none());
    }

    #[test]
    fn cordana_turns_a_bad_win_around() {
        let mut engine = rigged(
            &[
                ("ann", Character::Cordana),
                ("bob", Character::Mordred),
                ("cid", Character::Assassin),
                ("dan", Character::Merlin),
                ("eve", Character::LoyalServant),
            ],
            false,
            false,
        );
        engine.failures = 2;
        play_mission(
            &mut engine,
            &["ann", "bob"],
            &[QuestVote::Success, QuestVote::Fail],
        );
        assert_eq!(engine.phase(), GamePhase::MurdersAfterBadVictory);
        assert_eq!(engine.pending_murder().map(|step| step.by.as_str()), Some("ann"));

        engine
            .murder(None, &names(&["bob"]))
            .expect("cordana finds mordred");
        assert_eq!(engine.phase(), GamePhase::MurdersAfterGoodVictory);
        assert_eq!(engine.pending_murder().map(|step| step.by.as_str()), Some("cid"));
    }

    #[test]
    fn king_arthur_must_find_every_bad_player() {
        let mut engine = rigged(
            &[
                ("ann", Character::KingArthur),
                ("bob", Character::Morgana),
                ("cid", Character::Minion),
                ("dan", Character::LoyalServant),
                ("eve", Character::LoyalServant1),
            ],
            false,
            false,
        );
        engine.failures = 2;
        play_mission(
            &mut engine,
            &["ann", "bob"],
            &[QuestVote::Fail, QuestVote::Fail],
        );
        assert_eq!(engine.phase(), GamePhase::MurdersAfterBadVictory);
        engine
            .murder(None, &names(&["bob"]))
            .expect("arthur guesses");
        assert_eq!(engine.phase(), GamePhase::VictoryForBad);
    }
}
