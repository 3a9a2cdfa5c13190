use crate::error::EngineError;
use crate::types::{Player, Role};
use rand::Rng;

/// A pathological rank source could tie forever; give up after this many
/// re-rolls and fail the room instead of spinning.
const MAX_REROLLS: usize = 64;

/// Assign Blank/Spy/Civilian roles by randomized ranking. Every player draws
/// an independent rank in [0,1); sorted ascending, the first `blank_count`
/// become Blank, the next `spy_count` Spy, the rest Civilian.
pub fn assign_roles(
    players: &mut [Player],
    spy_count: usize,
    blank_count: usize,
) -> Result<(), EngineError> {
    let mut rng = rand::rng();
    assign_with(players, spy_count, blank_count, &mut || rng.random())
}

/// Rank-source-injected form of [`assign_roles`], so tests can force exact
/// ties at the split points.
pub(crate) fn assign_with(
    players: &mut [Player],
    spy_count: usize,
    blank_count: usize,
    next_rank: &mut dyn FnMut() -> f64,
) -> Result<(), EngineError> {
    let blank_split = blank_count;
    let spy_split = blank_count + spy_count;

    let mut ranked: Vec<(usize, f64)> = players
        .iter()
        .enumerate()
        .map(|(idx, _)| (idx, next_rank()))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    // The spy boundary is re-checked only after the blank boundary settles,
    // since the blank re-rolls can perturb ranks around the spy split.
    let mut rerolls = 0usize;
    resolve_boundary(&mut ranked, blank_split, next_rank, &mut rerolls)?;
    resolve_boundary(&mut ranked, spy_split, next_rank, &mut rerolls)?;

    for (pos, (idx, _)) in ranked.iter().enumerate() {
        players[*idx].role = Some(if pos < blank_split {
            Role::Blank
        } else if pos < spy_split {
            Role::Spy
        } else {
            Role::Civilian
        });
    }
    Ok(())
}

/// Resolve ties straddling one split index. When the player just inside the
/// boundary and the player just outside carry the same rank, every player
/// sharing that value re-rolls (only those; untied players keep their
/// ordering advantage) and the whole list re-sorts, until the boundary ranks
/// differ.
fn resolve_boundary(
    ranked: &mut [(usize, f64)],
    split: usize,
    next_rank: &mut dyn FnMut() -> f64,
    rerolls: &mut usize,
) -> Result<(), EngineError> {
    if split == 0 || split >= ranked.len() {
        return Ok(());
    }

    while ranked[split - 1].1 == ranked[split].1 {
        if *rerolls >= MAX_REROLLS {
            return Err(EngineError::AssignmentDiverged(*rerolls));
        }
        *rerolls += 1;

        let tied = ranked[split].1;
        tracing::debug!(split, rank = tied, "boundary tie detected, re-rolling");
        for entry in ranked.iter_mut().filter(|e| e.1 == tied) {
            entry.1 = next_rank();
        }
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player::new(format!("p{i}"), format!("addr{i}"), format!("Player {i}")))
            .collect()
    }

    fn role_counts(players: &[Player]) -> (usize, usize, usize) {
        let blanks = players.iter().filter(|p| p.role == Some(Role::Blank)).count();
        let spies = players.iter().filter(|p| p.role == Some(Role::Spy)).count();
        let civs = players
            .iter()
            .filter(|p| p.role == Some(Role::Civilian))
            .count();
        (blanks, spies, civs)
    }

    #[test]
    fn produces_exact_role_counts() {
        for n in 3..=10 {
            for spy in 1..=n / 2 {
                for blank in 0..=(n / 2 - spy) {
                    let mut ps = players(n);
                    assign_roles(&mut ps, spy, blank).unwrap();
                    assert_eq!(
                        role_counts(&ps),
                        (blank, spy, n - spy - blank),
                        "n={n} spy={spy} blank={blank}"
                    );
                }
            }
        }
    }

    #[test]
    fn resolves_tie_at_blank_boundary() {
        // 4 players, 1 blank, 1 spy. First pass ties everyone at 0.5; the
        // re-roll hands out distinct ranks.
        let mut ps = players(4);
        let mut ranks = vec![0.5, 0.5, 0.5, 0.5, 0.4, 0.1, 0.9, 0.7].into_iter();
        assign_with(&mut ps, 1, 1, &mut || ranks.next().unwrap()).unwrap();

        assert_eq!(role_counts(&ps), (1, 1, 2));
        // Re-rolled order is p1(0.1) p0(0.4) p3(0.7) p2(0.9)
        assert_eq!(ps[1].role, Some(Role::Blank));
        assert_eq!(ps[0].role, Some(Role::Spy));
        assert_eq!(ps[2].role, Some(Role::Civilian));
        assert_eq!(ps[3].role, Some(Role::Civilian));
    }

    #[test]
    fn reroll_includes_every_player_sharing_the_tied_rank() {
        // Three players tied at 0.5 straddle the spy boundary; all three
        // must re-roll, consuming exactly three fresh ranks.
        let mut ps = players(4);
        let mut drawn = 0usize;
        let script = vec![0.5, 0.5, 0.5, 0.2, 0.6, 0.3, 0.9];
        let mut iter = script.into_iter();
        assign_with(&mut ps, 1, 1, &mut || {
            drawn += 1;
            iter.next().unwrap()
        })
        .unwrap();
        assert_eq!(drawn, 7, "4 initial draws + 3 tied re-rolls");
        assert_eq!(role_counts(&ps), (1, 1, 2));
    }

    #[test]
    fn boundary_ranks_differ_after_resolution() {
        // Tie exactly at the spy/civilian split, resolved on the second try.
        let mut ps = players(5);
        let script = vec![0.1, 0.5, 0.5, 0.7, 0.9, 0.45, 0.55];
        let mut iter = script.into_iter();
        assign_with(&mut ps, 1, 1, &mut || iter.next().unwrap()).unwrap();
        assert_eq!(role_counts(&ps), (1, 1, 3));

        // p1 re-rolled to 0.45 (spy side), p2 to 0.55 (civilian side).
        assert_eq!(ps[1].role, Some(Role::Spy));
        assert_eq!(ps[2].role, Some(Role::Civilian));
    }

    #[test]
    fn untied_players_keep_their_ordering() {
        // p0 drew the lowest rank and is not part of the tie; it must stay
        // Blank through the resolution.
        let mut ps = players(4);
        let script = vec![0.05, 0.5, 0.5, 0.8, 0.6, 0.7];
        let mut iter = script.into_iter();
        assign_with(&mut ps, 1, 1, &mut || iter.next().unwrap()).unwrap();
        assert_eq!(ps[0].role, Some(Role::Blank));
    }

    #[test]
    fn deterministic_rank_source_fails_instead_of_looping() {
        let mut ps = players(4);
        let err = assign_with(&mut ps, 1, 1, &mut || 0.5).unwrap_err();
        assert!(matches!(err, EngineError::AssignmentDiverged(_)));
    }

    #[test]
    fn zero_blanks_skips_blank_boundary() {
        let mut ps = players(5);
        assign_roles(&mut ps, 2, 0).unwrap();
        assert_eq!(role_counts(&ps), (0, 2, 3));
    }
}
