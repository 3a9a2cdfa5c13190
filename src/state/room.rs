use super::endgame::{self, EndGame};
use super::roles;
use super::vote::VoteOutcome;
use super::{AppState, Events};
use crate::broadcast::Recipient;
use crate::error::EngineError;
use crate::protocol::{GameResult, OutReason, PlayerView, ServerMessage, VoteStatus};
use crate::types::*;
use rand::Rng;

impl AppState {
    /// Join a room, or reclaim an existing seat on rejoin. A rejoin rebinds
    /// the transport address and re-sends the player's word; role and
    /// elimination status are untouched. A join that completes the roster
    /// auto-starts the game.
    pub async fn join_room(
        &self,
        room_id: &str,
        name: Option<String>,
        addr: &str,
        existing_id: Option<PlayerId>,
    ) -> Result<PlayerId, EngineError> {
        let room_arc = self.room(room_id).await?;
        let observers = self.observers_of(room_id).await;

        let mut events = Events::new();
        let mut start_error = None;

        let (snapshot, player_id) = {
            let mut room = room_arc.lock().await;

            let rejoin = existing_id.as_ref().and_then(|id| {
                room.player_mut(id).map(|p| {
                    p.addr = addr.to_string();
                    (p.id.clone(), p.name.clone(), p.word.clone())
                })
            });

            if let Some((pid, name, word)) = rejoin {
                events.push((
                    Recipient::Player(addr.to_string()),
                    ServerMessage::Joined {
                        player_id: pid.clone(),
                        room_id: room.id.clone(),
                        name,
                    },
                ));
                if let Some(word) = word.filter(|w| !w.is_empty()) {
                    events.push((
                        Recipient::Player(addr.to_string()),
                        ServerMessage::YourWord { word },
                    ));
                }
                self.lobby_events(&room, &observers, &mut events);
                tracing::debug!(room_id, player_id = %pid, "player rejoined");
                (Some(room.clone()), pid)
            } else {
                if room.players.len() >= room.config.total_players {
                    return Err(EngineError::RoomFull);
                }

                let pid = existing_id.unwrap_or_else(|| ulid::Ulid::new().to_string());
                let name = name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| format!("Player {}", room.players.len() + 1));
                room.players
                    .push(Player::new(pid.clone(), addr.to_string(), name.clone()));

                events.push((
                    Recipient::Player(addr.to_string()),
                    ServerMessage::Joined {
                        player_id: pid.clone(),
                        room_id: room.id.clone(),
                        name,
                    },
                ));
                tracing::info!(room_id, player_id = %pid, "player joined");

                if room.players.len() == room.config.total_players
                    && room.state == RoomState::Lobby
                {
                    if let Err(e) = self.start_game_locked(&mut room, &mut events) {
                        tracing::error!(room_id, error = %e, "auto-start failed");
                        start_error = Some(e);
                    }
                }

                self.lobby_events(&room, &observers, &mut events);
                (Some(room.clone()), pid)
            }
        };

        self.commit(snapshot, events).await;
        match start_error {
            Some(e) => Err(e),
            None => Ok(player_id),
        }
    }

    /// Manual start. A no-op unless the room is in LOBBY with a full roster
    /// (the usual path is the auto-start on the final join).
    pub async fn start_game(&self, room_id: &str) -> Result<(), EngineError> {
        let room_arc = self.room(room_id).await?;
        let observers = self.observers_of(room_id).await;

        let mut events = Events::new();
        let snapshot = {
            let mut room = room_arc.lock().await;
            if room.state != RoomState::Lobby
                || room.players.len() != room.config.total_players
            {
                return Ok(());
            }
            self.start_game_locked(&mut room, &mut events)?;
            self.lobby_events(&room, &observers, &mut events);
            Some(room.clone())
        };

        self.commit(snapshot, events).await;
        Ok(())
    }

    /// Draw a question, flip the word assignment, deal roles and words,
    /// and enter GAMING. Caller holds the room lock and flushes events.
    fn start_game_locked(&self, room: &mut Room, events: &mut Events) -> Result<(), EngineError> {
        let question = self
            .questions
            .next(room.config.category.as_deref(), &room.used_question_ids)?;
        room.used_question_ids.insert(question.id.clone());
        room.question_history.push(QuestionRecord {
            id: question.id.clone(),
            category: question.category.clone(),
            word_a: question.word_a.clone(),
            word_b: question.word_b.clone(),
            used_at: chrono::Utc::now().to_rfc3339(),
        });

        roles::assign_roles(
            &mut room.players,
            room.config.spy_count,
            room.config.blank_count,
        )?;

        // Fair coin flip: which side of the pair the civilians get must not
        // be predictable across games.
        let flip = rand::rng().random_bool(0.5);
        let (civilian_word, spy_word) = if flip {
            (question.word_a.clone(), question.word_b.clone())
        } else {
            (question.word_b.clone(), question.word_a.clone())
        };

        for p in &mut room.players {
            p.word = Some(match p.role {
                Some(Role::Civilian) => civilian_word.clone(),
                Some(Role::Spy) => spy_word.clone(),
                _ => String::new(),
            });
            p.vote = None;
        }
        room.words = Some(WordAssignment {
            civilian_word,
            spy_word,
        });

        tracing::info!(
            room_id = %room.id,
            question_id = %question.id,
            category = %question.category,
            "game started"
        );
        room.question = Some(question);
        room.state = RoomState::Gaming;
        room.votes.reset();
        room.blank_guess = None;

        events.push((
            Recipient::Room(room.id.clone()),
            ServerMessage::GameStarted {
                players: room.players.iter().map(PlayerView::audience).collect(),
                counts: room.alive_counts(),
            },
        ));
        for p in &room.players {
            events.push((
                Recipient::Player(p.addr.clone()),
                ServerMessage::YourWord {
                    word: p.word.clone().unwrap_or_default(),
                },
            ));
        }
        Ok(())
    }

    /// Host opens a voting round. Allowed from any non-FINISHED state; the
    /// tally always starts fresh.
    pub async fn start_vote(&self, room_id: &str) -> Result<(), EngineError> {
        let room_arc = self.room(room_id).await?;
        let observers = self.observers_of(room_id).await;

        let mut events = Events::new();
        let snapshot = {
            let mut room = room_arc.lock().await;
            if room.state == RoomState::Finished {
                return Ok(());
            }
            room.state = RoomState::Voting;
            reset_votes(&mut room);

            events.push((
                Recipient::Room(room.id.clone()),
                ServerMessage::VoteBegin {
                    players: room.alive_players().map(PlayerView::audience).collect(),
                },
            ));
            self.lobby_events(&room, &observers, &mut events);
            tracing::debug!(room_id, "voting round opened");
            Some(room.clone())
        };

        self.commit(snapshot, events).await;
        Ok(())
    }

    /// Record one vote. Silently ignored outside VOTING, for unknown or
    /// eliminated voters, and for duplicates. The final vote resolves the
    /// round: a tie discards it, a plurality eliminates the target and
    /// routes the room onward.
    pub async fn cast_vote(
        &self,
        room_id: &str,
        voter_id: &str,
        target_id: &str,
    ) -> Result<(), EngineError> {
        let room_arc = self.room(room_id).await?;
        let observers = self.observers_of(room_id).await;

        let mut events = Events::new();
        let snapshot = {
            let mut room = room_arc.lock().await;
            if room.state != RoomState::Voting {
                return Ok(());
            }
            if !room.player(voter_id).is_some_and(Player::alive)
                || room.votes.has_voted(voter_id)
            {
                return Ok(());
            }

            room.votes.cast(voter_id, target_id);
            if let Some(v) = room.player_mut(voter_id) {
                v.vote = Some(target_id.to_string());
            }
            tracing::debug!(room_id, voter_id, target_id, "vote cast");
            events.push((
                Recipient::Room(room.id.clone()),
                ServerMessage::VoteUpdate {
                    voter_id: voter_id.to_string(),
                    target_id: target_id.to_string(),
                    votes: room.votes.counts.clone(),
                },
            ));

            let alive = room.alive_players().count();
            if room.votes.is_complete(alive) {
                self.resolve_vote(&mut room, &mut events);
                self.lobby_events(&room, &observers, &mut events);
            }
            Some(room.clone())
        };

        self.commit(snapshot, events).await;
        Ok(())
    }

    fn resolve_vote(&self, room: &mut Room, events: &mut Events) {
        let outcome = room.votes.resolve();
        reset_votes(room);

        let target = match outcome {
            VoteOutcome::Tie => None,
            VoteOutcome::Eliminated(id) => {
                // A vote for a player no longer in the roster resolves to
                // nothing; treat the round as discarded.
                room.player_mut(&id).map(|p| {
                    let was_blank = p.role == Some(Role::Blank);
                    p.is_out = true;
                    p.pending_blank = was_blank;
                    (id.clone(), p.addr.clone(), was_blank)
                })
            }
        };

        match target {
            None => {
                room.state = RoomState::Gaming;
                events.push((
                    Recipient::Room(room.id.clone()),
                    ServerMessage::VotingComplete {
                        status: VoteStatus::Tie,
                        player: None,
                        counts: room.alive_counts(),
                    },
                ));
                tracing::debug!(room_id = %room.id, "vote tied, round discarded");
            }
            Some((id, addr, was_blank)) => {
                events.push((
                    Recipient::Player(addr),
                    ServerMessage::YouOut {
                        reason: OutReason::VotedOut,
                    },
                ));
                events.push((
                    Recipient::Room(room.id.clone()),
                    ServerMessage::VotingComplete {
                        status: VoteStatus::Out,
                        player: room.player(&id).map(PlayerView::audience),
                        counts: room.alive_counts(),
                    },
                ));
                tracing::info!(room_id = %room.id, player_id = %id, "player voted out");

                // The just-completed vote's direct consequence takes
                // precedence over any carried-over pending state: an
                // eliminated Blank immediately gets their own guess round.
                if was_blank {
                    begin_blank_guess(room, vec![id], events);
                } else {
                    route_by_evaluation(room, events);
                }
            }
        }
    }

    /// Explicit leave: an elimination event with the same consequences as a
    /// vote. A transport disconnect never reaches this path.
    pub async fn leave_room(&self, room_id: &str, player_id: &str) -> Result<(), EngineError> {
        let room_arc = self.room(room_id).await?;
        let observers = self.observers_of(room_id).await;

        let mut events = Events::new();
        let snapshot = {
            let mut room = room_arc.lock().await;
            let Some((addr, was_blank)) = room
                .player(player_id)
                .map(|p| (p.addr.clone(), p.role == Some(Role::Blank)))
            else {
                return Ok(());
            };

            match room.state {
                RoomState::Lobby => {
                    // No game yet: free the seat instead of burying it.
                    room.players.retain(|p| p.id != player_id);
                    events.push((
                        Recipient::Player(addr),
                        ServerMessage::YouOut {
                            reason: OutReason::Left,
                        },
                    ));
                }
                RoomState::Finished => {
                    if let Some(p) = room.player_mut(player_id) {
                        p.is_out = true;
                        p.pending_blank = false;
                    }
                    events.push((
                        Recipient::Player(addr),
                        ServerMessage::YouOut {
                            reason: OutReason::Left,
                        },
                    ));
                }
                _ => {
                    if let Some(p) = room.player_mut(player_id) {
                        p.is_out = true;
                        p.pending_blank = was_blank;
                    }
                    events.push((
                        Recipient::Player(addr),
                        ServerMessage::YouOut {
                            reason: OutReason::Left,
                        },
                    ));
                    // Same precedence as a vote elimination: a departing
                    // Blank gets a solo guess round regardless of any other
                    // Blank's status.
                    if was_blank {
                        begin_blank_guess(&mut room, vec![player_id.to_string()], &mut events);
                    } else {
                        route_by_evaluation(&mut room, &mut events);
                    }
                }
            }

            self.lobby_events(&room, &observers, &mut events);
            tracing::info!(room_id, player_id, "player left");
            Some(room.clone())
        };

        self.commit(snapshot, events).await;
        Ok(())
    }

    /// Record a blank guess. Ignored outside BLANK_GUESS and for players
    /// outside the frozen eligible set. The last guess resolves the round.
    pub async fn submit_blank_guess(
        &self,
        room_id: &str,
        player_id: &str,
        guess: &str,
    ) -> Result<(), EngineError> {
        let room_arc = self.room(room_id).await?;
        let observers = self.observers_of(room_id).await;

        let mut events = Events::new();
        let snapshot = {
            let mut room = room_arc.lock().await;
            if room.state != RoomState::BlankGuess {
                return Ok(());
            }
            if !room
                .player(player_id)
                .is_some_and(|p| p.role == Some(Role::Blank))
            {
                return Ok(());
            }

            let complete = match room.blank_guess.as_mut() {
                Some(round) => {
                    if !round.submit(player_id, guess) {
                        return Ok(());
                    }
                    tracing::debug!(room_id, player_id, "blank guess submitted");
                    round.is_complete()
                }
                None => return Ok(()),
            };
            // A partial round persists the answer with nothing to announce.
            if complete {
                let Some(round) = room.blank_guess.take() else {
                    return Ok(());
                };
                self.resolve_blank_guess(&mut room, round, &mut events);
                self.lobby_events(&room, &observers, &mut events);
            }
            Some(room.clone())
        };

        self.commit(snapshot, events).await;
        Ok(())
    }

    fn resolve_blank_guess(&self, room: &mut Room, round: BlankGuessRound, events: &mut Events) {
        if round.succeeded() {
            for id in &round.eligible {
                if let Some(p) = room.player_mut(id) {
                    p.pending_blank = false;
                }
            }
            tracing::info!(room_id = %room.id, "blank guess succeeded");
            finish_game(room, GameResult::BlankWin, Some(&round.eligible), events);
            return;
        }

        // Every eligible guesser is now permanently out.
        for id in &round.eligible {
            if let Some(p) = room.player_mut(id) {
                p.pending_blank = false;
                p.is_out = true;
                events.push((
                    Recipient::Player(p.addr.clone()),
                    ServerMessage::YouOut {
                        reason: OutReason::BlankGuessFailed,
                    },
                ));
            }
        }
        tracing::info!(room_id = %room.id, "blank guess failed");

        let counts = room.alive_counts();
        match endgame::evaluate(counts) {
            EndGame::SpyWin => finish_game(room, GameResult::SpyWin, None, events),
            EndGame::CivilianWin => finish_game(room, GameResult::CivilWin, None, events),
            EndGame::Continue => {
                room.state = RoomState::Gaming;
                events.push((
                    Recipient::Room(room.id.clone()),
                    ServerMessage::BlankGuessEnd {
                        counts,
                        state: room.state,
                    },
                ));
            }
            EndGame::BlankGuess => {
                // Other Blanks survive with no Spies left: report this round
                // closed, then open a fresh one for them.
                events.push((
                    Recipient::Room(room.id.clone()),
                    ServerMessage::BlankGuessEnd {
                        counts,
                        state: RoomState::BlankGuess,
                    },
                ));
                let ids: Vec<PlayerId> = room
                    .alive_players()
                    .filter(|p| p.role == Some(Role::Blank))
                    .map(|p| p.id.clone())
                    .collect();
                begin_blank_guess(room, ids, events);
            }
        }
    }

    /// Restart. With `keep_players` the roster stays seated and the room
    /// returns to LOBBY with roles, words, flags and tally cleared (and
    /// auto-starts again if the roster is still full). Otherwise the room is
    /// destroyed and every player is parked in the waiting pool for the next
    /// created room.
    pub async fn restart_game(
        &self,
        room_id: &str,
        keep_players: bool,
    ) -> Result<(), EngineError> {
        if keep_players {
            return self.restart_keeping_players(room_id).await;
        }

        let Some(room_arc) = self.rooms.write().await.remove(room_id) else {
            return Err(EngineError::RoomNotFound);
        };

        let mut events = Events::new();
        {
            let room = room_arc.lock().await;
            let mut waiting = self.waiting.write().await;
            for p in &room.players {
                waiting.insert(
                    p.addr.clone(),
                    WaitingPlayer {
                        addr: p.addr.clone(),
                        name: p.name.clone(),
                        player_id: p.id.clone(),
                    },
                );
                events.push((Recipient::Player(p.addr.clone()), ServerMessage::RoomResetWait));
            }
        }
        events.push((
            Recipient::Room(room_id.to_string()),
            ServerMessage::RoomResetHost,
        ));

        self.teardown_room(room_id).await;
        self.commit(None, events).await;
        tracing::info!(room_id, "room reset, players parked in waiting pool");
        Ok(())
    }

    async fn restart_keeping_players(&self, room_id: &str) -> Result<(), EngineError> {
        let room_arc = self.room(room_id).await?;
        let observers = self.observers_of(room_id).await;

        let mut events = Events::new();
        let mut start_error = None;

        let snapshot = {
            let mut room = room_arc.lock().await;
            room.question = None;
            room.words = None;
            room.blank_guess = None;
            room.state = RoomState::Lobby;
            reset_votes(&mut room);
            for p in &mut room.players {
                p.is_out = false;
                p.pending_blank = false;
                p.role = None;
                p.word = None;
            }

            if room.players.len() == room.config.total_players {
                if let Err(e) = self.start_game_locked(&mut room, &mut events) {
                    tracing::error!(room_id, error = %e, "restart auto-start failed");
                    start_error = Some(e);
                }
            }
            self.lobby_events(&room, &observers, &mut events);
            tracing::info!(room_id, "room restarted keeping players");
            Some(room.clone())
        };

        self.commit(snapshot, events).await;
        match start_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn reset_votes(room: &mut Room) {
    room.votes.reset();
    for p in &mut room.players {
        p.vote = None;
    }
}

/// Open a blank-guess round for the given eligible set (frozen from here
/// on). The target is the current civilian word.
fn begin_blank_guess(room: &mut Room, eligible: Vec<PlayerId>, events: &mut Events) {
    if eligible.is_empty() {
        return;
    }
    let target = room
        .words
        .as_ref()
        .map(|w| w.civilian_word.clone())
        .unwrap_or_default();

    room.state = RoomState::BlankGuess;
    room.blank_guess = Some(BlankGuessRound::new(eligible.clone(), target));

    events.push((
        Recipient::Room(room.id.clone()),
        ServerMessage::BlankGuessStart,
    ));
    for p in &room.players {
        let msg = if eligible.contains(&p.id) {
            ServerMessage::BlankGuessPrompt
        } else {
            ServerMessage::BlankGuessWait
        };
        events.push((Recipient::Player(p.addr.clone()), msg));
    }
    tracing::info!(room_id = %room.id, guessers = eligible.len(), "blank guess round opened");
}

/// Post-elimination routing via the end-game evaluator.
fn route_by_evaluation(room: &mut Room, events: &mut Events) {
    match endgame::evaluate(room.alive_counts()) {
        EndGame::SpyWin => finish_game(room, GameResult::SpyWin, None, events),
        EndGame::CivilianWin => finish_game(room, GameResult::CivilWin, None, events),
        EndGame::BlankGuess => {
            let ids: Vec<PlayerId> = room
                .alive_players()
                .filter(|p| p.role == Some(Role::Blank))
                .map(|p| p.id.clone())
                .collect();
            begin_blank_guess(room, ids, events);
        }
        EndGame::Continue => room.state = RoomState::Gaming,
    }
}

/// Terminal transition. Winners default to the whole camp matching the
/// result; blank wins pass the eligible guesser set explicitly. Final roles
/// go out to everyone, the game being over.
fn finish_game(
    room: &mut Room,
    result: GameResult,
    winner_ids: Option<&[PlayerId]>,
    events: &mut Events,
) {
    room.state = RoomState::Finished;

    let winners: Vec<PlayerView> = match winner_ids {
        Some(ids) => room
            .players
            .iter()
            .filter(|p| ids.contains(&p.id))
            .map(PlayerView::host)
            .collect(),
        None => {
            let camp = match result {
                GameResult::SpyWin => Role::Spy,
                GameResult::CivilWin => Role::Civilian,
                GameResult::BlankWin => Role::Blank,
            };
            room.players
                .iter()
                .filter(|p| p.role == Some(camp))
                .map(PlayerView::host)
                .collect()
        }
    };

    tracing::info!(room_id = %room.id, result = ?result, "game over");
    events.push((
        Recipient::Room(room.id.clone()),
        ServerMessage::GameOver {
            result,
            winners,
            final_roles: room.players.iter().map(PlayerView::host).collect(),
        },
    ));
}
