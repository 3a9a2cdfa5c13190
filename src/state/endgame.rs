use crate::types::RoleCounts;

/// Verdict over the current survivor set, computed after every elimination
/// event (never polled proactively).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndGame {
    /// Spies match or outnumber the rest of the field; terminal.
    SpyWin,
    /// No spies and no blanks left; terminal.
    CivilianWin,
    /// No spies left but blanks survive; hand over to the blank-guess round.
    BlankGuess,
    Continue,
}

pub fn evaluate(counts: RoleCounts) -> EndGame {
    if counts.spies > 0 && counts.spies >= counts.civilians + counts.blanks {
        EndGame::SpyWin
    } else if counts.spies == 0 && counts.blanks == 0 {
        EndGame::CivilianWin
    } else if counts.spies == 0 {
        EndGame::BlankGuess
    } else {
        EndGame::Continue
    }
}
