use super::*;

/// Answers the holder of `character` may give when probed by the Lady of the Lake.
pub fn lady_loyalty_options(character: Character) -> Vec<Loyalty> {
    match character {
        Character::QueenMab => vec![Loyalty::Bad, Loyalty::Good],
        Character::Lot
        | Character::Meliagant
        | Character::Gawain
        | Character::Ginerva
        | Character::Raven => vec![Loyalty::Bad],
        Character::Puck => vec![Loyalty::Good],
        other => vec![Loyalty::from(other.alignment())],
    }
}

/// The vote Excalibur leaves behind. Reversals resolve by which angel cast them.
fn excalibur_flip(vote: QuestVote, voter: Option<Character>) -> QuestVote {
    match vote {
        QuestVote::Reversal if voter == Some(Character::GoodAngel) => QuestVote::Fail,
        QuestVote::Reversal => QuestVote::Success,
        QuestVote::Fail | QuestVote::Beast => QuestVote::Success,
        QuestVote::Success => QuestVote::Fail,
        QuestVote::AvalonPower => QuestVote::AvalonPower,
    }
}

impl MatchEngine {
    /// The Seer's two roster neighbours.
    pub fn seer_options(&self) -> Vec<String> {
        let Some(seer) = self.holder_of(Character::Seer) else {
            return Vec::new();
        };
        let Some(index) = self.roster.iter().position(|player| player == seer) else {
            return Vec::new();
        };
        let len = self.roster.len();
        let mut options = Vec::with_capacity(2);
        for neighbour in [(index + len - 1) % len, (index + 1) % len] {
            if neighbour == index {
                continue;
            }
            if let Some(player) = self.roster.get(neighbour) {
                if !options.contains(player) {
                    options.push(player.clone());
                }
            }
        }
        options
    }

    pub fn sir_pick(&mut self, player: &str) -> ActionResult {
        self.ensure_live()?;
        self.ensure_phase(GamePhase::SirPickPlayer)?;
        self.ensure_on_roster(player)?;
        if !self.seer_options().iter().any(|option| option == player) {
            return Err(ActionError::precondition(format!(
                "{player} does not sit next to the Seer"
            )));
        }
        let Some(seer) = self.holder_of(Character::Seer).map(str::to_string) else {
            return Err(ActionError::precondition("no Seer in this match"));
        };
        let Some(roles) = self.roles.as_ref() else {
            return Err(ActionError::WrongPhase(self.phase));
        };
        let seen = if roles.is_stray_holder(player) {
            Character::Stray
        } else {
            roles.character_of(player).unwrap_or(Character::Stray)
        };

        let secrets = self.secrets.entry(seer.clone()).or_default();
        secrets.facts.push(format!("{player} is {seen}"));
        secrets
            .uncovered
            .insert(player.to_string(), seen.name().to_string());
        self.sight_graph
            .entry(Character::Seer)
            .or_default()
            .insert(player.to_string());
        self.run_blanchefleur_pass();

        self.enter(GamePhase::AwaitingSuggestion);
        debug!(seer = %seer, player, "Seer looked at a neighbour");
        Ok(())
    }

    /// An empty pick keeps every vote as cast.
    pub fn excalibur_pick(&mut self, players: &[String]) -> ActionResult {
        self.ensure_live()?;
        self.ensure_phase(GamePhase::ExcaliburPick)?;
        let target = match players {
            [] => {
                debug!("Excalibur not used");
                return self.resolve_mission();
            }
            [target] => target.as_str(),
            _ => return Err(ActionError::precondition("Excalibur flips a single vote")),
        };
        self.ensure_on_roster(target)?;
        if self.excalibur_holder.as_deref() == Some(target) {
            return Err(ActionError::precondition("Excalibur cannot be turned on its holder"));
        }
        if !self.journey_votes.contains_key(target) {
            return Err(ActionError::precondition(format!(
                "{target} did not vote on this mission"
            )));
        }

        self.wield_excalibur(target);
        self.resolve_mission()
    }

    fn wield_excalibur(&mut self, target: &str) {
        let Some(original) = self.journey_votes.get(target).copied() else {
            return;
        };
        let voter = self.character_of(target);
        if let Some(holder) = self.excalibur_holder.clone() {
            self.secrets.entry(holder).or_default().facts.push(format!(
                "{target} voted {} (quest {})",
                original.label(),
                self.last_stage
            ));
        }
        if let Some(entry) = self.archive.last_mut() {
            entry.excalibur_target = Some(target.to_string());
        }
        if voter == Some(Character::Maeve) {
            debug!(player = target, "Maeve is untouched by Excalibur");
            return;
        }

        let flipped = excalibur_flip(original, voter);
        self.journey_votes.insert(target.to_string(), flipped);
        if let Some(quest) = self.quests.get_mut(self.current) {
            quest.tally.retract(original);
            quest.tally.record(flipped);
        }
        if let Some(entry) = self.archive.last_mut() {
            entry.tally.retract(original);
            entry.tally.record(flipped);
        }
        debug!(
            player = target,
            from = original.label(),
            to = flipped.label(),
            "Excalibur flipped a vote"
        );
    }

    pub fn lady_suggest(&mut self, player: &str) -> ActionResult {
        self.ensure_live()?;
        self.ensure_phase(GamePhase::WaitingForLadySuggester)?;
        self.ensure_on_roster(player)?;
        let Some(lady) = self.lady.as_mut() else {
            return Err(ActionError::WrongPhase(self.phase));
        };
        if lady.holder == player || lady.previous.as_deref() == Some(player) {
            return Err(ActionError::precondition(format!(
                "the Lady cannot be passed to {player}"
            )));
        }
        lady.chosen = Some(player.to_string());
        lady.response = None;
        let holder = lady.holder.clone();
        if let Some(entry) = self.archive.last_mut() {
            entry.lady_suggester = Some(holder.clone());
            entry.lady_target = Some(player.to_string());
        }
        self.enter(GamePhase::LadyResponse);
        debug!(holder = %holder, player, "Lady of the Lake names a player");
        Ok(())
    }

    pub fn lady_response(&mut self, loyalty: Loyalty) -> ActionResult {
        self.ensure_live()?;
        self.ensure_phase(GamePhase::LadyResponse)?;
        let options = self
            .lady_chosen()
            .and_then(|chosen| self.character_of(chosen))
            .map(lady_loyalty_options)
            .unwrap_or_default();
        if !options.contains(&loyalty) {
            return Err(ActionError::precondition(format!(
                "{loyalty:?} is not an answer this player may give"
            )));
        }
        if let Some(lady) = self.lady.as_mut() {
            lady.response = Some(loyalty);
        }
        self.enter(GamePhase::LadySuggesterPublishResponseToWorld);
        Ok(())
    }

    pub fn lady_publish_response(&mut self, loyalty: Loyalty) -> ActionResult {
        self.ensure_live()?;
        self.ensure_phase(GamePhase::LadySuggesterPublishResponseToWorld)?;
        if loyalty == Loyalty::Neutral {
            return Err(ActionError::precondition("the Lady announces good or bad"));
        }
        let Some(lady) = self.lady.as_mut() else {
            return Err(ActionError::WrongPhase(self.phase));
        };
        let Some(chosen) = lady.chosen.take() else {
            return Err(ActionError::WrongPhase(self.phase));
        };
        let announcer = std::mem::replace(&mut lady.holder, chosen);
        lady.previous = Some(announcer.clone());
        lady.response = None;
        if let Some(entry) = self.archive.last_mut() {
            entry.lady_claim = Some(loyalty);
        }
        self.enter(GamePhase::AwaitingSuggestion);
        info!(announcer = %announcer, claim = ?loyalty, "Lady of the Lake answer announced");
        Ok(())
    }
}
