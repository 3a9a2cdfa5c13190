use std::sync::Arc;

use undercover::broadcast::{MemorySink, Recipient};
use undercover::error::EngineError;
use undercover::protocol::{GameResult, OutReason, ServerMessage, VoteStatus};
use undercover::questions::QuestionBank;
use undercover::state::AppState;
use undercover::store::MemoryStore;
use undercover::types::{PlayerId, Role, RoomConfig, RoomState};

struct Harness {
    state: Arc<AppState>,
    sink: Arc<MemorySink>,
}

fn harness() -> Harness {
    let sink = Arc::new(MemorySink::new());
    let state = Arc::new(AppState::new(
        Arc::new(QuestionBank::with_defaults()),
        Arc::new(MemoryStore::new()),
        sink.clone(),
    ));
    Harness { state, sink }
}

fn config(total: usize, spies: usize, blanks: usize) -> RoomConfig {
    RoomConfig {
        total_players: total,
        spy_count: spies,
        blank_count: blanks,
        category: None,
    }
}

async fn fill_room(h: &Harness, room_id: &str, n: usize) -> Vec<PlayerId> {
    let mut ids = Vec::new();
    for i in 0..n {
        let pid = h
            .state
            .join_room(room_id, Some(format!("P{i}")), &format!("addr-{i}"), None)
            .await
            .unwrap();
        ids.push(pid);
    }
    ids
}

/// All alive players vote for one target, completing the round.
async fn unanimous_vote(h: &Harness, room_id: &str, target: &str) {
    h.state.start_vote(room_id).await.unwrap();
    let room = h.state.room_snapshot(room_id).await.unwrap();
    let voters: Vec<PlayerId> = room.alive_players().map(|p| p.id.clone()).collect();
    for v in &voters {
        h.state.cast_vote(room_id, v, target).await.unwrap();
    }
}

#[tokio::test]
async fn game_auto_starts_when_the_roster_fills() {
    let h = harness();
    let room_id = h.state.create_room(config(5, 1, 1)).await.unwrap();
    fill_room(&h, &room_id, 5).await;

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::Gaming);

    let spies = room
        .players
        .iter()
        .filter(|p| p.role == Some(Role::Spy))
        .count();
    let blanks = room
        .players
        .iter()
        .filter(|p| p.role == Some(Role::Blank))
        .count();
    assert_eq!(spies, 1);
    assert_eq!(blanks, 1);

    // Blanks get an empty word, spies and civilians get different real words
    let blank = room
        .players
        .iter()
        .find(|p| p.role == Some(Role::Blank))
        .unwrap();
    assert_eq!(blank.word.as_deref(), Some(""));

    let spy_word = room
        .players
        .iter()
        .find(|p| p.role == Some(Role::Spy))
        .and_then(|p| p.word.clone())
        .unwrap();
    let civ_word = room
        .players
        .iter()
        .find(|p| p.role == Some(Role::Civilian))
        .and_then(|p| p.word.clone())
        .unwrap();
    assert!(!spy_word.is_empty());
    assert!(!civ_word.is_empty());
    assert_ne!(spy_word, civ_word);

    // Every player was dealt a word privately
    let words = h
        .sink
        .snapshot()
        .iter()
        .filter(|e| matches!(e.msg, ServerMessage::YourWord { .. }))
        .count();
    assert_eq!(words, 5);
}

#[tokio::test]
async fn join_into_a_full_room_is_rejected() {
    let h = harness();
    let room_id = h.state.create_room(config(3, 1, 0)).await.unwrap();
    fill_room(&h, &room_id, 3).await;

    let err = h
        .state
        .join_room(&room_id, Some("late".into()), "addr-late", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RoomFull));
}

#[tokio::test]
async fn spies_win_once_they_match_everyone_else() {
    let h = harness();
    let room_id = h.state.create_room(config(4, 1, 0)).await.unwrap();
    fill_room(&h, &room_id, 4).await;

    // Two civilian eliminations leave one spy against one civilian
    for _ in 0..2 {
        let room = h.state.room_snapshot(&room_id).await.unwrap();
        let target = room
            .alive_players()
            .find(|p| p.role == Some(Role::Civilian))
            .unwrap()
            .id
            .clone();
        unanimous_vote(&h, &room_id, &target).await;
    }

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::Finished);

    let events = h.sink.take();
    let (result, winners) = events
        .iter()
        .rev()
        .find_map(|e| match &e.msg {
            ServerMessage::GameOver {
                result, winners, ..
            } => Some((result.clone(), winners.clone())),
            _ => None,
        })
        .expect("game over event");
    assert_eq!(result, GameResult::SpyWin);
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].role, Some(Role::Spy));
}

#[tokio::test]
async fn tied_vote_eliminates_nobody() {
    let h = harness();
    let room_id = h.state.create_room(config(3, 1, 0)).await.unwrap();
    let ids = fill_room(&h, &room_id, 3).await;

    h.state.start_vote(&room_id).await.unwrap();
    // Circular votes: one for each player
    h.state.cast_vote(&room_id, &ids[0], &ids[1]).await.unwrap();
    h.state.cast_vote(&room_id, &ids[1], &ids[2]).await.unwrap();
    h.state.cast_vote(&room_id, &ids[2], &ids[0]).await.unwrap();

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::Gaming);
    assert_eq!(room.alive_players().count(), 3);

    let events = h.sink.take();
    let complete = events
        .iter()
        .find_map(|e| match &e.msg {
            ServerMessage::VotingComplete { status, player, .. } => {
                Some((status.clone(), player.clone()))
            }
            _ => None,
        })
        .expect("voting complete event");
    assert_eq!(complete.0, VoteStatus::Tie);
    assert!(complete.1.is_none());
}

#[tokio::test]
async fn vote_cast_after_the_round_resolves_is_ignored() {
    let h = harness();
    let room_id = h.state.create_room(config(3, 1, 0)).await.unwrap();
    let ids = fill_room(&h, &room_id, 3).await;

    h.state.start_vote(&room_id).await.unwrap();
    h.state.cast_vote(&room_id, &ids[0], &ids[1]).await.unwrap();
    h.state.cast_vote(&room_id, &ids[1], &ids[2]).await.unwrap();
    h.state.cast_vote(&room_id, &ids[2], &ids[0]).await.unwrap();

    // The circular round tied and resolved; a straggler vote changes nothing
    let resolved = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(resolved.state, RoomState::Gaming);
    h.sink.take();

    h.state.cast_vote(&room_id, &ids[0], &ids[1]).await.unwrap();

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::Gaming);
    assert!(room.votes.counts.is_empty());
    assert_eq!(room.alive_players().count(), 3);
    assert!(!h
        .sink
        .take()
        .iter()
        .any(|e| matches!(e.msg, ServerMessage::VoteUpdate { .. })));
}

#[tokio::test]
async fn civilians_leaving_mid_game_can_hand_spies_the_win() {
    let h = harness();
    let room_id = h.state.create_room(config(4, 1, 0)).await.unwrap();
    fill_room(&h, &room_id, 4).await;

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    let civilians: Vec<PlayerId> = room
        .players
        .iter()
        .filter(|p| p.role == Some(Role::Civilian))
        .map(|p| p.id.clone())
        .collect();

    // One civilian against one spy is a spy win
    h.state.leave_room(&room_id, &civilians[0]).await.unwrap();
    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::Gaming);

    h.state.leave_room(&room_id, &civilians[1]).await.unwrap();
    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::Finished);

    let (result, winners) = h
        .sink
        .take()
        .iter()
        .find_map(|e| match &e.msg {
            ServerMessage::GameOver {
                result, winners, ..
            } => Some((result.clone(), winners.clone())),
            _ => None,
        })
        .expect("game over event");
    assert_eq!(result, GameResult::SpyWin);
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].role, Some(Role::Spy));
}

#[tokio::test]
async fn voted_out_blank_guesses_the_word_and_steals_the_win() {
    let h = harness();
    let room_id = h.state.create_room(config(4, 1, 1)).await.unwrap();
    fill_room(&h, &room_id, 4).await;

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    let blank_id = room
        .players
        .iter()
        .find(|p| p.role == Some(Role::Blank))
        .unwrap()
        .id
        .clone();
    let civilian_word = room.words.as_ref().unwrap().civilian_word.clone();

    unanimous_vote(&h, &room_id, &blank_id).await;

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::BlankGuess);
    let round = room.blank_guess.as_ref().expect("open guess round");
    assert_eq!(round.eligible, vec![blank_id.clone()]);

    // Only the guesser is prompted
    let events = h.sink.take();
    let prompts: Vec<_> = events
        .iter()
        .filter(|e| matches!(e.msg, ServerMessage::BlankGuessPrompt))
        .collect();
    assert_eq!(prompts.len(), 1);
    let blank_addr = room.player(&blank_id).unwrap().addr.clone();
    assert_eq!(prompts[0].to, Recipient::Player(blank_addr));

    h.state
        .submit_blank_guess(&room_id, &blank_id, &civilian_word)
        .await
        .unwrap();

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::Finished);

    let (result, winners) = h
        .sink
        .take()
        .iter()
        .find_map(|e| match &e.msg {
            ServerMessage::GameOver {
                result, winners, ..
            } => Some((result.clone(), winners.clone())),
            _ => None,
        })
        .expect("game over event");
    assert_eq!(result, GameResult::BlankWin);
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].id, blank_id);
}

#[tokio::test]
async fn failed_blank_guess_removes_the_guesser_and_play_continues() {
    let h = harness();
    let room_id = h.state.create_room(config(5, 1, 1)).await.unwrap();
    fill_room(&h, &room_id, 5).await;

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    let blank_id = room
        .players
        .iter()
        .find(|p| p.role == Some(Role::Blank))
        .unwrap()
        .id
        .clone();

    unanimous_vote(&h, &room_id, &blank_id).await;
    h.sink.take();

    h.state
        .submit_blank_guess(&room_id, &blank_id, "definitely wrong")
        .await
        .unwrap();

    // One spy and three civilians remain, so the game goes on
    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::Gaming);
    let blank = room.player(&blank_id).unwrap();
    assert!(blank.is_out);
    assert!(!blank.pending_blank);

    let events = h.sink.take();
    assert!(events.iter().any(|e| matches!(
        e.msg,
        ServerMessage::YouOut {
            reason: OutReason::BlankGuessFailed
        }
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e.msg, ServerMessage::BlankGuessEnd { .. })));
}

#[tokio::test]
async fn civilians_win_after_the_last_blank_misses() {
    let h = harness();
    let room_id = h.state.create_room(config(4, 1, 1)).await.unwrap();
    fill_room(&h, &room_id, 4).await;

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    let spy_id = room
        .players
        .iter()
        .find(|p| p.role == Some(Role::Spy))
        .unwrap()
        .id
        .clone();
    let blank_id = room
        .players
        .iter()
        .find(|p| p.role == Some(Role::Blank))
        .unwrap()
        .id
        .clone();

    // Voting out the spy leaves no spies; the surviving blank gets a shot
    unanimous_vote(&h, &room_id, &spy_id).await;

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::BlankGuess);
    assert_eq!(
        room.blank_guess.as_ref().unwrap().eligible,
        vec![blank_id.clone()]
    );

    h.state
        .submit_blank_guess(&room_id, &blank_id, "not the word")
        .await
        .unwrap();

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::Finished);

    let (result, winners) = h
        .sink
        .take()
        .iter()
        .find_map(|e| match &e.msg {
            ServerMessage::GameOver {
                result, winners, ..
            } => Some((result.clone(), winners.clone())),
            _ => None,
        })
        .expect("game over event");
    assert_eq!(result, GameResult::CivilWin);
    assert_eq!(winners.len(), 2);
    assert!(winners.iter().all(|w| w.role == Some(Role::Civilian)));
}

#[tokio::test]
async fn leaving_the_lobby_frees_the_seat() {
    let h = harness();
    let room_id = h.state.create_room(config(4, 1, 0)).await.unwrap();
    let ids = fill_room(&h, &room_id, 2).await;

    h.state.leave_room(&room_id, &ids[0]).await.unwrap();

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::Lobby);
    assert_eq!(room.players.len(), 1);
    assert!(room.player(&ids[0]).is_none());

    // The freed seat can be taken again, and the fourth join starts the game
    for i in 10..13 {
        h.state
            .join_room(&room_id, Some(format!("P{i}")), &format!("addr-{i}"), None)
            .await
            .unwrap();
    }
    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::Gaming);
}

#[tokio::test]
async fn blank_leaving_mid_game_gets_a_solo_guess_round() {
    let h = harness();
    let room_id = h.state.create_room(config(4, 1, 1)).await.unwrap();
    fill_room(&h, &room_id, 4).await;

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    let blank_id = room
        .players
        .iter()
        .find(|p| p.role == Some(Role::Blank))
        .unwrap()
        .id
        .clone();

    h.state.leave_room(&room_id, &blank_id).await.unwrap();

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::BlankGuess);
    assert_eq!(
        room.blank_guess.as_ref().unwrap().eligible,
        vec![blank_id.clone()]
    );

    let events = h.sink.take();
    assert!(events.iter().any(|e| matches!(
        e.msg,
        ServerMessage::YouOut {
            reason: OutReason::Left
        }
    )));
}

#[tokio::test]
async fn restart_keeping_players_deals_a_fresh_game() {
    let h = harness();
    let room_id = h.state.create_room(config(3, 1, 0)).await.unwrap();
    fill_room(&h, &room_id, 3).await;

    h.state.restart_game(&room_id, true).await.unwrap();

    // The full roster is still seated, so the next game starts right away
    let room = h.state.room_snapshot(&room_id).await.unwrap();
    assert_eq!(room.state, RoomState::Gaming);
    assert_eq!(room.question_history.len(), 2);
    assert!(room.players.iter().all(|p| !p.is_out));
    assert!(room.players.iter().all(|p| p.role.is_some()));
}

#[tokio::test]
async fn restart_without_keeping_players_refills_the_next_room() {
    let h = harness();
    let room_id = h.state.create_room(config(3, 1, 0)).await.unwrap();
    fill_room(&h, &room_id, 3).await;

    h.state.restart_game(&room_id, false).await.unwrap();

    assert!(h.state.room_snapshot(&room_id).await.is_none());
    assert_eq!(h.state.waiting_count().await, 3);

    let events = h.sink.take();
    let parked = events
        .iter()
        .filter(|e| matches!(e.msg, ServerMessage::RoomResetWait))
        .count();
    assert_eq!(parked, 3);

    // A new room pulls the parked players back in
    h.state.create_room(config(4, 1, 0)).await.unwrap();
    assert_eq!(h.state.waiting_count().await, 0);

    let events = h.sink.take();
    let redirected = events
        .iter()
        .filter(|e| matches!(e.msg, ServerMessage::RedirectRoom { .. }))
        .count();
    assert_eq!(redirected, 3);
}

#[tokio::test]
async fn rejoin_rebinds_the_address_and_resends_the_word() {
    let h = harness();
    let room_id = h.state.create_room(config(3, 1, 0)).await.unwrap();
    let ids = fill_room(&h, &room_id, 3).await;

    let before = h.state.room_snapshot(&room_id).await.unwrap();
    let old = before.player(&ids[0]).unwrap().clone();
    h.sink.take();

    let pid = h
        .state
        .join_room(&room_id, None, "addr-reconnected", Some(ids[0].clone()))
        .await
        .unwrap();
    assert_eq!(pid, ids[0]);

    let room = h.state.room_snapshot(&room_id).await.unwrap();
    let player = room.player(&ids[0]).unwrap();
    assert_eq!(player.addr, "addr-reconnected");
    assert_eq!(player.role, old.role);
    assert_eq!(player.word, old.word);
    // The roster did not grow
    assert_eq!(room.players.len(), 3);

    let events = h.sink.take();
    assert!(events.iter().any(|e| {
        e.to == Recipient::Player("addr-reconnected".to_string())
            && matches!(e.msg, ServerMessage::YourWord { .. })
    }));
}
