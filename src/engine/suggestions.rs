use super::*;

impl MatchEngine {
    pub fn suggest(&mut self, players: &[String], excalibur: Option<&str>) -> ActionResult {
        self.ensure_live()?;
        self.ensure_phase(GamePhase::AwaitingSuggestion)?;
        let required = self.required_team_size().unwrap_or_default();
        if players.len() != required {
            return Err(ActionError::precondition(format!(
                "mission {} needs {required} players, got {}",
                self.current + 1,
                players.len()
            )));
        }
        self.unique_roster_members(players)?;
        let excalibur_holder = match (self.flags.excalibur, excalibur) {
            (true, Some(holder)) => {
                self.ensure_on_roster(holder)?;
                Some(holder.to_string())
            }
            (true, None) => return Err(ActionError::precondition("Excalibur needs a holder")),
            (false, _) => None,
        };

        let suggester = self.suggester().unwrap_or_default().to_string();
        let only_good = players.iter().all(|player| {
            self.character_of(player)
                .map(|character| !character.spoils_good_team())
                .unwrap_or(true)
        });

        self.suggested = players.to_vec();
        self.only_good_suggested = only_good;
        self.excalibur_holder = excalibur_holder.clone();
        self.suggestion_votes.clear();
        self.voted_yes.clear();
        self.voted_no.clear();
        self.archive.push(QuestArchiveItem {
            stage: self.stage,
            suggester: suggester.clone(),
            players: players.to_vec(),
            excalibur_holder,
            ..QuestArchiveItem::default()
        });

        let retries = self.retries.get(self.current).copied().unwrap_or(1);
        if self.stage.attempt + 1 >= retries {
            info!(
                mission = self.current + 1,
                suggester = %suggester,
                "forced suggestion accepted without a vote"
            );
            self.voted_yes = self.roster.clone();
            if let Some(entry) = self.archive.last_mut() {
                entry.voted_yes = self.roster.clone();
            }
            self.accept_suggestion(&suggester);
            self.advance_suggester();
            return Ok(());
        }

        self.enter(GamePhase::SuggestionVoting);
        debug!(suggester = %suggester, stage = %self.stage, "suggestion open for votes");
        Ok(())
    }

    /// A draft team the proposer is considering. Nothing on the board changes.
    pub fn suggest_temporary(&self, players: &[String]) -> ActionResult {
        self.ensure_live()?;
        self.ensure_phase(GamePhase::AwaitingSuggestion)?;
        self.unique_roster_members(players)?;
        let required = self.required_team_size().unwrap_or_default();
        if players.len() > required {
            return Err(ActionError::precondition(format!(
                "draft names {} players, mission takes {required}",
                players.len()
            )));
        }
        Ok(())
    }

    pub fn vote_for_suggestion(&mut self, player: &str, yes: bool) -> ActionResult {
        self.ensure_live()?;
        self.ensure_phase(GamePhase::SuggestionVoting)?;
        self.ensure_on_roster(player)?;
        if self.holder_of(Character::Ector) == Some(player) {
            return Err(ActionError::NotEntitled(player.to_string()));
        }
        if self.suggestion_votes.contains_key(player) {
            debug!(player, "repeated suggestion vote ignored");
            return Ok(());
        }

        self.suggestion_votes.insert(player.to_string(), yes);
        let entry = self.archive.last_mut();
        if yes {
            self.voted_yes.push(player.to_string());
            if let Some(entry) = entry {
                entry.voted_yes.push(player.to_string());
            }
        } else {
            self.voted_no.push(player.to_string());
            if let Some(entry) = entry {
                entry.voted_no.push(player.to_string());
            }
        }
        if self.suggestion_votes.len() < self.active_players {
            return Ok(());
        }

        let suggester = self.suggester().unwrap_or_default().to_string();
        let mut yes_votes = self.voted_yes.len();
        let mut no_votes = self.voted_no.len();
        if self.final_mission() && self.team_has(Character::Gawain) {
            let gawain_vote = self
                .holder_of(Character::Gawain)
                .and_then(|holder| self.suggestion_votes.get(holder))
                .copied();
            match gawain_vote {
                Some(true) => yes_votes += 1,
                Some(false) => no_votes += 1,
                None => {}
            }
        }

        if yes_votes > no_votes {
            self.accept_suggestion(&suggester);
        } else {
            self.stage = self.stage.next_attempt();
            self.enter(GamePhase::AwaitingSuggestion);
            debug!(
                suggester = %suggester,
                yes_votes,
                no_votes,
                stage = %self.stage,
                "suggestion rejected"
            );
        }
        self.advance_suggester();
        Ok(())
    }

    fn accept_suggestion(&mut self, suggester: &str) {
        if let Some(entry) = self.archive.last_mut() {
            entry.accepted = true;
        }
        if self.final_mission() && self.team_has(Character::Gawain) {
            info!("Gawain joins the final mission");
            self.enter(GamePhase::VictoryForGawain);
            return;
        }

        self.last_stage = self.stage;
        self.stage = self.stage.next_mission();
        self.reveal_suggester_to_viviana(suggester);

        let balin_pair = self
            .roles
            .as_ref()
            .map(|roles| roles.balin_pair)
            .unwrap_or(false);
        if balin_pair && self.team_has(Character::Balin) && self.team_has(Character::Balain) {
            if let Some(roles) = self.roles.as_mut() {
                roles.swap_holders(Character::Balin, Character::Balain);
            }
            debug!("Balin and Balain traded places");
        }

        self.enter(GamePhase::JourneyVoting);
        debug!(mission = self.current + 1, team = ?self.suggested, "suggestion accepted");
    }

    /// Viviana learns which side each accepted proposer is on, and sometimes who.
    fn reveal_suggester_to_viviana(&mut self, suggester: &str) {
        let Some(viviana) = self.holder_of(Character::Viviana).map(str::to_string) else {
            return;
        };
        if viviana == suggester {
            return;
        }
        let Some(character) = self.character_of(suggester) else {
            return;
        };
        let stray = self
            .roles
            .as_ref()
            .map(|roles| roles.is_stray_holder(suggester))
            .unwrap_or(false);

        let (side, name) = match character {
            _ if stray => (None, Some(Character::Stray.name())),
            Character::SirKay => (Some(Loyalty::Bad), None),
            Character::Mordred => (Some(Loyalty::Good), None),
            Character::Lot | Character::Gawain | Character::Ginerva => {
                (Some(Loyalty::Bad), Some(character.name()))
            }
            Character::Oberon => (None, Some(character.name())),
            other if other.is_bad() => (Some(Loyalty::Bad), None),
            _ => (Some(Loyalty::Good), None),
        };

        let secrets = self.secrets.entry(viviana).or_default();
        match side {
            Some(Loyalty::Bad) if !secrets.bad_players.iter().any(|p| p == suggester) => {
                secrets.bad_players.push(suggester.to_string());
                secrets.facts.push(format!("{suggester} is bad"));
            }
            Some(Loyalty::Good) if !secrets.good_players.iter().any(|p| p == suggester) => {
                secrets.good_players.push(suggester.to_string());
                secrets.facts.push(format!("{suggester} is good"));
            }
            _ => {}
        }
        if let Some(name) = name {
            if !secrets.uncovered.contains_key(suggester) {
                secrets
                    .uncovered
                    .insert(suggester.to_string(), name.to_string());
                secrets.facts.push(format!("{suggester} is {name}"));
            }
        }
    }
}
