use crate::types::{PlayerId, VoteRound};

/// Result of a completed voting round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Top two tallies are equal; nobody is eliminated.
    Tie,
    Eliminated(PlayerId),
}

impl VoteRound {
    /// Record a vote. Returns `false` without any state change when the
    /// voter already cast this round; duplicate and late client messages are
    /// tolerated as no-ops.
    pub fn cast(&mut self, voter_id: &str, target_id: &str) -> bool {
        if self.voters.contains(voter_id) {
            return false;
        }
        *self.counts.entry(target_id.to_string()).or_insert(0) += 1;
        self.voters.insert(voter_id.to_string());
        true
    }

    pub fn has_voted(&self, voter_id: &str) -> bool {
        self.voters.contains(voter_id)
    }

    /// Complete once every alive voter has cast.
    pub fn is_complete(&self, alive_voters: usize) -> bool {
        self.voters.len() >= alive_voters
    }

    /// Rank targets by descending count; equal top two counts mean a tie.
    pub fn resolve(&self) -> VoteOutcome {
        let mut tally: Vec<(&PlayerId, u32)> =
            self.counts.iter().map(|(id, n)| (id, *n)).collect();
        tally.sort_by(|a, b| b.1.cmp(&a.1));

        match tally.first() {
            None => VoteOutcome::Tie,
            Some(&(top_id, top_votes)) => {
                if tally.get(1).is_some_and(|&(_, n)| n == top_votes) {
                    VoteOutcome::Tie
                } else {
                    VoteOutcome::Eliminated(top_id.clone())
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.counts.clear();
        self.voters.clear();
    }
}
