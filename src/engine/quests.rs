use super::roles::LancelotPairing;
use super::*;

use crate::characters::Alignment;
use crate::constants::{is_bad_victory, is_good_victory};
use crate::types::QuestPolicy;

/// Mission facts that shape which votes a team member may cast.
#[derive(Clone, Copy, Debug)]
pub struct VoteContext<'a> {
    pub policy: QuestPolicy,
    pub team: &'a [Character],
    pub failures: usize,
    pub num_quests: usize,
    pub final_mission: bool,
    pub titanya_failed: bool,
    pub elaine_used: bool,
    pub beast_succeeded: bool,
}

impl VoteContext<'static> {
    /// A first mission with nothing on the board yet.
    pub fn baseline(policy: QuestPolicy) -> Self {
        Self {
            policy,
            team: &[],
            failures: 0,
            num_quests: 5,
            final_mission: false,
            titanya_failed: false,
            elaine_used: false,
            beast_succeeded: false,
        }
    }
}

/// Votes `character` may cast on a mission. Rules are checked in order and the
/// first match wins.
pub fn legal_votes(character: Character, stray_holder: bool, ctx: &VoteContext<'_>) -> Vec<QuestVote> {
    use Character::*;
    use QuestVote::{AvalonPower, Beast, Fail, Reversal, Success};

    match character {
        Gawain => return vec![Fail, Success],
        KingArthur | LancelotBad | Balin => return vec![Fail],
        Titanya => {
            if is_bad_victory(ctx.failures + 1, ctx.num_quests) {
                return vec![Success];
            }
            if !ctx.titanya_failed {
                return vec![Fail];
            }
        }
        Elaine if !ctx.elaine_used && !ctx.final_mission => return vec![Success, AvalonPower],
        Polygraph => return vec![Fail],
        Agravain | Lot => return vec![Success],
        Nimue if ctx.team.contains(&Merlin) && !ctx.team.contains(&Galahad) => {
            return vec![Fail];
        }
        _ => {}
    }

    if ctx.policy == QuestPolicy::Flush {
        if character.is_bad() || matches!(character, Ginerva | Meliagant) {
            return vec![Fail];
        }
        return vec![Success];
    }

    match character {
        Meliagant => return vec![Fail, Success],
        TheQuestingBeast if ctx.beast_succeeded => return vec![Beast],
        TheQuestingBeast => return vec![Success, Beast],
        _ => {}
    }

    let mut votes = Vec::with_capacity(3);
    if character.is_angel() {
        votes.push(Reversal);
    }
    votes.push(Success);
    if character.is_bad() || matches!(character, Puck | Ginerva) || stray_holder {
        votes.push(Fail);
    }
    votes
}

/// Scores a full set of mission votes. Beast votes count as fails; every
/// unpaired reversal flips the result.
pub fn calculate_quest_result(votes: &[QuestVote], policy: QuestPolicy) -> QuestOutcome {
    let fails = votes.iter().filter(|vote| vote.counts_as_fail()).count();
    let mut reversals = votes
        .iter()
        .filter(|vote| **vote == QuestVote::Reversal)
        .count();

    let outcome = match policy {
        QuestPolicy::Regular if fails > 0 => QuestOutcome::Fail,
        QuestPolicy::Regular => QuestOutcome::Success,
        QuestPolicy::Flush if fails == 1 => QuestOutcome::Fail,
        QuestPolicy::Flush => QuestOutcome::Success,
        QuestPolicy::TwoFailsRequired if reversals > 0 => {
            reversals -= 1;
            if fails >= 2 {
                QuestOutcome::Success
            } else {
                QuestOutcome::Fail
            }
        }
        QuestPolicy::TwoFailsRequired if fails >= 2 => QuestOutcome::Fail,
        QuestPolicy::TwoFailsRequired => QuestOutcome::Success,
    };

    if reversals % 2 == 1 {
        outcome.flipped()
    } else {
        outcome
    }
}

impl MatchEngine {
    pub fn legal_votes_for(&self, player: &str) -> Vec<QuestVote> {
        let Some(roles) = self.roles.as_ref() else {
            return Vec::new();
        };
        let Some(character) = roles.character_of(player) else {
            return Vec::new();
        };
        let team: Vec<Character> = self
            .suggested
            .iter()
            .filter_map(|member| roles.character_of(member))
            .collect();
        let ctx = VoteContext {
            policy: self.current_policy(),
            team: &team,
            failures: self.failures,
            num_quests: self.num_quests,
            final_mission: self.final_mission(),
            titanya_failed: self.flags.titanya_failed,
            elaine_used: self.flags.elaine_used,
            beast_succeeded: self.flags.beast_succeeded,
        };
        legal_votes(character, roles.is_stray_holder(player), &ctx)
    }

    pub fn vote_for_journey(&mut self, player: &str, vote: QuestVote) -> ActionResult {
        self.ensure_live()?;
        self.ensure_phase(GamePhase::JourneyVoting)?;
        self.ensure_on_roster(player)?;
        if !self.suggested.iter().any(|member| member == player) {
            return Err(ActionError::NotEntitled(player.to_string()));
        }
        if self.journey_votes.contains_key(player) {
            debug!(player, "repeated mission vote ignored");
            return Ok(());
        }
        if !self.legal_votes_for(player).contains(&vote) {
            return Err(ActionError::IllegalVote {
                player: player.to_string(),
                vote: vote.label(),
            });
        }

        match (self.character_of(player), vote) {
            (Some(Character::Titanya), QuestVote::Fail) => self.flags.titanya_failed = true,
            (Some(Character::Elaine), QuestVote::AvalonPower) => self.flags.elaine_used = true,
            (Some(Character::TheQuestingBeast), QuestVote::Success) => {
                self.flags.beast_succeeded = true
            }
            _ => {}
        }
        self.journey_votes.insert(player.to_string(), vote);
        if let Some(quest) = self.quests.get_mut(self.current) {
            quest.tally.record(vote);
        }
        if let Some(entry) = self.archive.last_mut() {
            entry.tally.record(vote);
        }
        debug!(player, mission = self.current + 1, "mission vote recorded");

        if self.journey_votes.len() < self.suggested.len() {
            return Ok(());
        }
        if self
            .journey_votes
            .values()
            .any(|vote| *vote == QuestVote::AvalonPower)
        {
            self.cancel_mission();
            return Ok(());
        }
        if self.flags.excalibur && self.excalibur_holder.is_some() {
            self.enter(GamePhase::ExcaliburPick);
            return Ok(());
        }
        self.resolve_mission()
    }

    pub(super) fn current_policy(&self) -> QuestPolicy {
        self.quests
            .get(self.current)
            .map(|quest| quest.policy)
            .unwrap_or(QuestPolicy::Regular)
    }

    /// Avalon Power: the mission never happened and a new team must be suggested.
    fn cancel_mission(&mut self) {
        if let Some(quest) = self.quests.get_mut(self.current) {
            quest.tally = VoteTally::default();
            quest.avalon_power = true;
        }
        if let Some(entry) = self.archive.last_mut() {
            entry.tally = VoteTally::default();
            entry.avalon_power = true;
        }
        self.clear_cycle();
        self.stage = self.last_stage;
        self.refresh_veto_holder();
        self.enter(GamePhase::AwaitingSuggestion);
        info!(mission = self.current + 1, "mission cancelled by Avalon Power");
    }

    pub(super) fn resolve_mission(&mut self) -> ActionResult {
        let policy = self.current_policy();
        let votes: Vec<QuestVote> = self.journey_votes.values().copied().collect();
        let outcome = calculate_quest_result(&votes, policy);
        let level = self.current + 1;

        if let Some(quest) = self.quests.get_mut(self.current) {
            quest.outcome = Some(outcome);
        }
        if let Some(entry) = self.archive.last_mut() {
            entry.outcome = Some(outcome);
        }
        match outcome {
            QuestOutcome::Success => self.successes += 1,
            QuestOutcome::Fail => self.failures += 1,
        }
        if let Some(shadow) = self.king_arthur_shadow(policy) {
            if shadow != outcome {
                self.shadow_results.insert(level, shadow);
            }
        }
        info!(
            mission = level,
            ?outcome,
            successes = self.successes,
            failures = self.failures,
            "mission resolved"
        );
        self.clear_cycle();

        if is_good_victory(self.successes, self.num_quests) {
            return self.declare_mission_victory(Alignment::Good);
        }
        if is_bad_victory(self.failures, self.num_quests) || level >= self.num_quests {
            return self.declare_mission_victory(Alignment::Bad);
        }

        self.switch_lancelots();
        self.current += 1;
        self.refresh_veto_holder();
        let lady_turn = self.lady.is_some() && level >= 2;
        self.enter(if lady_turn {
            GamePhase::WaitingForLadySuggester
        } else {
            GamePhase::AwaitingSuggestion
        });
        Ok(())
    }

    /// The result had King-Arthur voted the other way, if he was on the team.
    fn king_arthur_shadow(&self, policy: QuestPolicy) -> Option<QuestOutcome> {
        let holder = self.holder_of(Character::KingArthur)?;
        let own = *self.journey_votes.get(holder)?;
        let flipped = match own {
            QuestVote::Fail => QuestVote::Success,
            QuestVote::Success => QuestVote::Fail,
            other => other,
        };
        let votes: Vec<QuestVote> = self
            .journey_votes
            .iter()
            .map(|(player, vote)| if player == holder { flipped } else { *vote })
            .collect();
        Some(calculate_quest_result(&votes, policy))
    }

    fn switch_lancelots(&mut self) {
        let pairing = match self.roles.as_ref() {
            Some(roles) => roles.lancelot,
            None => return,
        };
        if pairing == LancelotPairing::None || self.lancelot_deck.draw() != 1 {
            return;
        }
        let Some(roles) = self.roles.as_mut() else {
            return;
        };
        match pairing {
            LancelotPairing::Both => {
                roles.swap_holders(Character::LancelotGood, Character::LancelotBad)
            }
            LancelotPairing::OnlyGood => {
                roles.convert(Character::LancelotGood, Character::LancelotBad);
                roles.lancelot = LancelotPairing::OnlyBad;
            }
            LancelotPairing::OnlyBad => {
                roles.convert(Character::LancelotBad, Character::LancelotGood);
                roles.lancelot = LancelotPairing::OnlyGood;
            }
            LancelotPairing::None => return,
        }
        if let Some(entry) = self.archive.last_mut() {
            entry.lancelot_switched = true;
        }
        info!(mission = self.current + 1, "Lancelots switched allegiance");
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    use QuestVote::{AvalonPower, Beast, Fail, Reversal, Success};

    #[test]
    fn regular_mission_fails_on_any_fail() {
        assert_eq!(
            calculate_quest_result(&[Success, Success], QuestPolicy::Regular),
            QuestOutcome::Success
        );
        assert_eq!(
            calculate_quest_result(&[Success, Fail, Fail], QuestPolicy::Regular),
            QuestOutcome::Fail
        );
        assert_eq!(
            calculate_quest_result(&[Success, Beast], QuestPolicy::Regular),
            QuestOutcome::Fail
        );
    }

    #[test]
    fn flush_mission_fails_on_exactly_one_fail() {
        assert_eq!(
            calculate_quest_result(&[Fail, Success, Success], QuestPolicy::Flush),
            QuestOutcome::Fail
        );
        assert_eq!(
            calculate_quest_result(&[Fail, Fail, Success], QuestPolicy::Flush),
            QuestOutcome::Success
        );
        assert_eq!(
            calculate_quest_result(&[Success, Success, Success], QuestPolicy::Flush),
            QuestOutcome::Success
        );
    }

    #[test]
    fn two_fails_required_with_and_without_reversal() {
        let policy = QuestPolicy::TwoFailsRequired;
        assert_eq!(
            calculate_quest_result(&[Fail, Success, Success], policy),
            QuestOutcome::Success
        );
        assert_eq!(
            calculate_quest_result(&[Fail, Fail, Success], policy),
            QuestOutcome::Fail
        );
        assert_eq!(
            calculate_quest_result(&[Fail, Fail, Reversal], policy),
            QuestOutcome::Success
        );
        assert_eq!(
            calculate_quest_result(&[Fail, Success, Reversal], policy),
            QuestOutcome::Fail
        );
    }

    #[test]
    fn paired_reversals_cancel_out() {
        let plain = calculate_quest_result(&[Fail, Success, Success], QuestPolicy::Regular);
        let paired = calculate_quest_result(&[Fail, Reversal, Reversal], QuestPolicy::Regular);
        assert_eq!(plain, paired);
        assert_eq!(
            calculate_quest_result(&[Success, Reversal], QuestPolicy::Regular),
            QuestOutcome::Fail
        );
    }

    #[test]
    fn titanya_fails_once_unless_bad_is_about_to_win() {
        let mut ctx = VoteContext::baseline(QuestPolicy::Regular);
        assert_eq!(legal_votes(Character::Titanya, false, &ctx), vec![Fail]);
        ctx.titanya_failed = true;
        assert_eq!(legal_votes(Character::Titanya, false, &ctx), vec![Success]);
        ctx.titanya_failed = false;
        ctx.failures = 2;
        assert_eq!(legal_votes(Character::Titanya, false, &ctx), vec![Success]);
    }

    #[test]
    fn elaine_holds_avalon_power_until_used_or_the_last_mission() {
        let mut ctx = VoteContext::baseline(QuestPolicy::Regular);
        assert_eq!(
            legal_votes(Character::Elaine, false, &ctx),
            vec![Success, AvalonPower]
        );
        ctx.final_mission = true;
        assert_eq!(legal_votes(Character::Elaine, false, &ctx), vec![Success]);
        ctx.final_mission = false;
        ctx.elaine_used = true;
        assert_eq!(legal_votes(Character::Elaine, false, &ctx), vec![Success]);
    }

    #[test]
    fn team_and_policy_dependent_votes() {
        let team = [Character::Merlin, Character::Nimue];
        let mut ctx = VoteContext::baseline(QuestPolicy::Regular);
        ctx.team = &team;
        assert_eq!(legal_votes(Character::Nimue, false, &ctx), vec![Fail]);
        let with_galahad = [Character::Merlin, Character::Nimue, Character::Galahad];
        ctx.team = &with_galahad;
        assert_eq!(legal_votes(Character::Nimue, false, &ctx), vec![Success]);

        let flush = VoteContext::baseline(QuestPolicy::Flush);
        assert_eq!(legal_votes(Character::Morgana, false, &flush), vec![Fail]);
        assert_eq!(legal_votes(Character::Puck, false, &flush), vec![Success]);
        assert_eq!(legal_votes(Character::Meliagant, false, &flush), vec![Fail]);
    }

    #[test]
    fn fallback_votes_by_character() {
        let ctx = VoteContext::baseline(QuestPolicy::Regular);
        assert_eq!(legal_votes(Character::Merlin, false, &ctx), vec![Success]);
        assert_eq!(legal_votes(Character::Merlin, true, &ctx), vec![Success, Fail]);
        assert_eq!(legal_votes(Character::Morgana, false, &ctx), vec![Success, Fail]);
        assert_eq!(
            legal_votes(Character::BadAngel, false, &ctx),
            vec![Reversal, Success, Fail]
        );
        assert_eq!(
            legal_votes(Character::GoodAngel, false, &ctx),
            vec![Reversal, Success]
        );
        assert_eq!(
            legal_votes(Character::TheQuestingBeast, false, &ctx),
            vec![Success, Beast]
        );
        let mut after = ctx;
        after.beast_succeeded = true;
        assert_eq!(
            legal_votes(Character::TheQuestingBeast, false, &after),
            vec![Beast]
        );
    }

    #[test]
    fn only_team_members_vote_and_only_legal_votes() {
        let mut engine = five_plain();
        engine
            .suggest(&names(&["ann", "cid"]), None)
            .expect("suggestion accepted");
        vote_all(&mut engine, true);
        assert_eq!(
            engine.vote_for_journey("bob", Success),
            Err(ActionError::NotEntitled("bob".to_string()))
        );
        assert!(matches!(
            engine.vote_for_journey("ann", Fail),
            Err(ActionError::IllegalVote { .. })
        ));
        engine.vote_for_journey("cid", Fail).expect("minion may fail");
        engine
            .vote_for_journey("cid", Success)
            .expect("repeat is ignored");
        assert_eq!(engine.quests()[0].tally.failures, 1);
        assert_eq!(engine.quests()[0].tally.successes, 0);
    }

    #[test]
    fn three_successes_end_the_match_for_good_without_murders() {
        let mut engine = five_plain();
        play_mission(&mut engine, &["ann", "bob"], &[Success, Success]);
        play_mission(&mut engine, &["ann", "bob", "dan"], &[Success, Success, Success]);
        assert_eq!(engine.phase(), GamePhase::AwaitingSuggestion);
        play_mission(&mut engine, &["bob", "dan"], &[Success, Success]);
        assert_eq!(engine.successes(), 3);
        assert_eq!(engine.phase(), GamePhase::VictoryForGood);
        assert!(engine.pending_murder().is_none());
    }

    #[test]
    fn four_mission_board_is_lost_at_two_fails() {
        let mut engine = rigged(
            &[
                ("ann", Character::LoyalServant),
                ("bob", Character::LoyalServant1),
                ("cid", Character::Minion),
                ("dan", Character::LoyalServant2),
            ],
            false,
            false,
        );
        assert_eq!(engine.num_quests(), 4);
        play_mission(&mut engine, &["ann", "cid"], &[Success, Fail]);
        assert_eq!(engine.phase(), GamePhase::AwaitingSuggestion);
        play_mission(&mut engine, &["bob", "cid", "dan"], &[Success, Fail, Success]);
        assert_eq!(engine.failures(), 2);
        assert_eq!(engine.phase(), GamePhase::VictoryForBad);
    }

    #[test]
    fn avalon_power_cancels_the_mission_before_excalibur() {
        let mut engine = rigged(
            &[
                ("ann", Character::Elaine),
                ("bob", Character::LoyalServant),
                ("cid", Character::Minion),
                ("dan", Character::LoyalServant1),
                ("eve", Character::Minion1),
            ],
            true,
            false,
        );
        engine
            .suggest(&names(&["ann", "bob"]), Some("bob"))
            .expect("suggestion accepted");
        vote_all(&mut engine, true);
        engine
            .vote_for_journey("ann", AvalonPower)
            .expect("elaine cancels");
        engine.vote_for_journey("bob", Success).expect("bob votes");

        assert_eq!(engine.phase(), GamePhase::AwaitingSuggestion);
        assert_eq!(engine.current_quest(), 0);
        assert_eq!(engine.stage.to_string(), "1.0");
        assert_eq!(engine.successes() + engine.failures(), 0);
        assert!(engine.quests()[0].avalon_power);
        assert_eq!(engine.quests()[0].tally.total(), 0);
        let entry = &engine.archive()[0];
        assert!(entry.avalon_power);
        assert_eq!(entry.tally.total(), 0);
        assert!(engine.suggested().is_empty());
        assert!(engine.excalibur_holder().is_none());

        engine
            .suggest(&names(&["ann", "dan"]), Some("dan"))
            .expect("suggestion accepted");
        vote_all(&mut engine, true);
        assert_eq!(engine.legal_votes_for("ann"), vec![Success]);
    }

    #[test]
    fn lancelots_swap_when_the_deck_says_so() {
        let mut engine = rigged(
            &[
                ("ann", Character::LancelotGood),
                ("bob", Character::LoyalServant),
                ("cid", Character::LancelotBad),
                ("dan", Character::LoyalServant1),
                ("eve", Character::Minion),
            ],
            false,
            false,
        );
        engine.lancelot_deck = LancelotDeck {
            cards: vec![1],
            next: 0,
        };
        play_mission(&mut engine, &["ann", "bob"], &[Success, Success]);
        assert_eq!(engine.character_of("ann"), Some(Character::LancelotBad));
        assert_eq!(engine.character_of("cid"), Some(Character::LancelotGood));
        assert_eq!(engine.holder_of(Character::LancelotGood), Some("cid"));
        assert_eq!(engine.holder_of(Character::LancelotBad), Some("ann"));
        assert!(engine.archive()[0].lancelot_switched);
    }

    #[test]
    fn lone_lancelot_changes_sides() {
        let mut engine = rigged(
            &[
                ("ann", Character::LancelotGood),
                ("bob", Character::LoyalServant),
                ("cid", Character::Minion),
                ("dan", Character::LoyalServant1),
                ("eve", Character::Minion1),
            ],
            false,
            false,
        );
        engine.lancelot_deck = LancelotDeck {
            cards: vec![0, 1],
            next: 0,
        };
        play_mission(&mut engine, &["ann", "bob"], &[Success, Success]);
        assert_eq!(engine.character_of("ann"), Some(Character::LancelotGood));
        assert!(!engine.archive()[0].lancelot_switched);

        play_mission(&mut engine, &["ann", "bob", "dan"], &[Success, Success, Success]);
        assert_eq!(engine.character_of("ann"), Some(Character::LancelotBad));
        assert!(engine.holder_of(Character::LancelotGood).is_none());
        assert!(engine.archive()[1].lancelot_switched);
        assert_eq!(engine.legal_votes_for("ann"), vec![Fail]);
    }

    #[test]
    fn king_arthur_shadow_is_kept_apart_from_the_score() {
        let mut engine = rigged(
            &[
                ("ann", Character::KingArthur),
                ("bob", Character::LoyalServant),
                ("cid", Character::Minion),
                ("dan", Character::LoyalServant1),
                ("eve", Character::Minion1),
            ],
            false,
            false,
        );
        play_mission(&mut engine, &["ann", "bob"], &[Fail, Success]);
        assert_eq!(engine.quests()[0].outcome, Some(QuestOutcome::Fail));
        assert_eq!(engine.failures(), 1);
        assert_eq!(engine.successes(), 0);
        assert_eq!(
            engine.shadow_results.get(&1),
            Some(&QuestOutcome::Success)
        );
    }
}
