use crate::types::{BlankGuessRound, PlayerId};
use std::collections::HashMap;

impl BlankGuessRound {
    pub fn new(eligible: Vec<PlayerId>, target: String) -> Self {
        Self {
            eligible,
            answers: HashMap::new(),
            target,
        }
    }

    pub fn is_eligible(&self, player_id: &str) -> bool {
        self.eligible.iter().any(|id| id == player_id)
    }

    /// Store a guess (trimmed). Ignored for players outside the frozen
    /// eligible set; a repeat submission before the round closes overwrites
    /// the earlier one.
    pub fn submit(&mut self, player_id: &str, guess: &str) -> bool {
        if !self.is_eligible(player_id) {
            return false;
        }
        self.answers
            .insert(player_id.to_string(), guess.trim().to_string());
        true
    }

    pub fn is_complete(&self) -> bool {
        self.answers.len() >= self.eligible.len()
    }

    /// The round succeeds when any submitted guess exactly matches the
    /// target word. Case-sensitive, no fuzzy matching; success is a joint
    /// win for the whole eligible set.
    pub fn succeeded(&self) -> bool {
        self.answers.values().any(|a| *a == self.target)
    }
}
