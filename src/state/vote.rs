use super::{require_id, AppState};
use crate::error::{GameError, GameResult};
use crate::game::{quorum, tally};
use crate::protocol::GameResults;
use crate::store::StoreError;
use crate::types::*;
use chrono::Utc;

impl AppState {
    /// Ask everyone else to end the speaking phase early
    pub async fn request_vote(&self, room_id: &str, player_id: &str) -> GameResult<VoteRequest> {
        require_id(room_id, "roomId")?;
        require_id(player_id, "playerId")?;

        let room = self.load_room(room_id).await?;
        if room.status != RoomStatus::Playing {
            return Err(GameError::precondition("Not in the speaking phase"));
        }
        self.load_player(room_id, player_id).await?;

        let request = VoteRequest {
            id: ulid::Ulid::new().to_string(),
            room_id: room_id.to_string(),
            requester_player_id: player_id.to_string(),
            status: VoteRequestStatus::Pending,
            created_at: Utc::now(),
        };
        let request = match self.store.open_vote_request(request).await {
            Ok(request) => request,
            Err(StoreError::Conflict) => {
                return Err(GameError::precondition("A vote request is already pending"))
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            "Player {} requested an early vote in room {}",
            player_id,
            room_id
        );
        Ok(request)
    }

    /// Approve or deny a pending request.
    ///
    /// Returns the request's status after this answer. A single denial
    /// settles it; the last missing approval moves the room to voting.
    pub async fn respond_vote(
        &self,
        room_id: &str,
        player_id: &str,
        request_id: &str,
        approved: bool,
    ) -> GameResult<VoteRequestStatus> {
        require_id(room_id, "roomId")?;
        require_id(player_id, "playerId")?;
        require_id(request_id, "requestId")?;

        let room = self.load_room(room_id).await?;
        if room.status != RoomStatus::Playing {
            return Err(GameError::precondition("Not in the speaking phase"));
        }
        self.load_player(room_id, player_id).await?;
        let request = self
            .store
            .get_vote_request(room_id, request_id)
            .await?
            .ok_or_else(|| GameError::not_found("Vote request not found"))?;
        if request.status != VoteRequestStatus::Pending {
            return Err(GameError::precondition("Vote request is no longer pending"));
        }
        if request.requester_player_id == player_id {
            return Err(GameError::precondition(
                "Cannot respond to your own vote request",
            ));
        }

        self.store
            .upsert_vote_response(VoteResponse {
                request_id: request_id.to_string(),
                player_id: player_id.to_string(),
                approved,
            })
            .await?;

        // Only answers from players still in the room count
        let players = self.store.list_players(room_id).await?;
        let responses: Vec<VoteResponse> = self
            .store
            .list_vote_responses(request_id)
            .await?
            .into_iter()
            .filter(|r| {
                r.player_id != request.requester_player_id
                    && players.iter().any(|p| p.id == r.player_id)
            })
            .collect();

        // The requester is an implicit yes, even after leaving
        let electorate = players
            .iter()
            .filter(|p| p.id != request.requester_player_id)
            .count()
            + 1;
        let status = quorum::evaluate(&responses, electorate);
        if status == VoteRequestStatus::Pending {
            return Ok(status);
        }

        if !self.store.resolve_vote_request(request_id, status).await? {
            // Someone else settled it first; report what they decided
            let current = self
                .store
                .get_vote_request(room_id, request_id)
                .await?
                .map(|r| r.status)
                .unwrap_or(status);
            if current == VoteRequestStatus::Approved {
                self.open_early_vote(room_id).await?;
            }
            return Ok(current);
        }

        tracing::info!("Vote request {} in room {} {:?}", request_id, room_id, status);
        if status == VoteRequestStatus::Approved {
            self.open_early_vote(room_id).await?;
        }
        Ok(status)
    }

    async fn open_early_vote(&self, room_id: &str) -> GameResult<()> {
        if self
            .store
            .transition_status(room_id, RoomStatus::Playing, RoomStatus::Voting)
            .await?
        {
            tracing::info!("Room {} voting early by agreement", room_id);
        }
        Ok(())
    }

    /// Cast or change a ballot
    pub async fn cast_vote(
        &self,
        room_id: &str,
        voter_id: &str,
        voted_for_id: &str,
    ) -> GameResult<()> {
        require_id(room_id, "roomId")?;
        require_id(voter_id, "voterId")?;
        require_id(voted_for_id, "votedForId")?;
        if voter_id == voted_for_id {
            return Err(GameError::invalid("Cannot vote for yourself"));
        }

        let room = self.load_room(room_id).await?;
        if room.status != RoomStatus::Voting {
            return Err(GameError::precondition("Voting is not open"));
        }
        self.load_player(room_id, voter_id).await?;
        if self.store.get_player(room_id, voted_for_id).await?.is_none() {
            return Err(GameError::precondition(
                "Can only vote for a player in this room",
            ));
        }

        match self.store.set_vote(room_id, voter_id, voted_for_id).await {
            Ok(true) => {}
            Ok(false) => return Err(GameError::not_found("Player not found")),
            // Voting closed after the read above
            Err(StoreError::Conflict) => {
                return Err(GameError::precondition("Voting is not open"))
            }
            Err(e) => return Err(e.into()),
        }
        tracing::debug!("Player {} voted in room {}", voter_id, room_id);

        self.settle_derived_status(room_id).await?;
        Ok(())
    }

    /// Reveal the impostor once every ballot is in
    pub async fn fetch_results(&self, room_id: &str) -> GameResult<GameResults> {
        require_id(room_id, "roomId")?;

        let room = self.load_room(room_id).await?;
        if room.status != RoomStatus::Results {
            return Err(GameError::precondition("Results are not available yet"));
        }
        let secret = self
            .store
            .get_secret(room_id)
            .await?
            .ok_or_else(|| GameError::precondition("Room not ready"))?;
        let players = self.store.list_players(room_id).await?;
        let theme = self.store.get_theme(&secret.theme_id).await?;

        let tally = tally::tally(&players, &secret.impostor_player_id);
        let impostor_name = players
            .iter()
            .find(|p| p.id == secret.impostor_player_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(GameResults {
            impostor_id: secret.impostor_player_id,
            impostor_name,
            theme: theme.map(|t| t.text).unwrap_or_else(|| "Unknown".to_string()),
            votes: tally.votes,
            most_voted_id: tally.most_voted_id,
            impostor_caught: tally.impostor_caught,
        })
    }

    /// Host's "play again": back to the lobby with the same players
    pub async fn reset_to_lobby(&self, room_id: &str, player_id: &str) -> GameResult<()> {
        require_id(room_id, "roomId")?;
        require_id(player_id, "playerId")?;

        let room = self.load_room(room_id).await?;
        self.require_host(&room, player_id, "reset the game").await?;
        match room.status {
            RoomStatus::Lobby => return Ok(()),
            RoomStatus::Results => {}
            _ => {
                return Err(GameError::precondition(
                    "Can only return to the lobby from the results",
                ))
            }
        }

        let mut next = room;
        next.clear_game_state();
        self.store.return_to_lobby(next).await?;

        tracing::info!("Room {} back in the lobby", room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::protocol::JoinedRoom;

    async fn voting_room(state: &AppState, guests: usize) -> Vec<JoinedRoom> {
        let players = lobby(state, GameMode::InPerson, guests).await;
        playing(state, &players).await;
        state
            .force_voting(&players[0].room_id, &players[0].player_id)
            .await
            .unwrap();
        players
    }

    #[tokio::test]
    async fn test_four_player_quorum() {
        let state = state();
        let players = lobby(&state, GameMode::Remote, 3).await;
        playing(&state, &players).await;
        let room_id = &players[0].room_id;

        let request = state
            .request_vote(room_id, &players[0].player_id)
            .await
            .unwrap();

        for p in &players[1..3] {
            let status = state
                .respond_vote(room_id, &p.player_id, &request.id, true)
                .await
                .unwrap();
            assert_eq!(status, VoteRequestStatus::Pending);
        }
        assert_eq!(
            state.load_room(room_id).await.unwrap().status,
            RoomStatus::Playing
        );

        let status = state
            .respond_vote(room_id, &players[3].player_id, &request.id, true)
            .await
            .unwrap();
        assert_eq!(status, VoteRequestStatus::Approved);
        assert_eq!(
            state.load_room(room_id).await.unwrap().status,
            RoomStatus::Voting
        );
    }

    #[tokio::test]
    async fn test_single_denial_settles_request() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 3).await;
        playing(&state, &players).await;
        let room_id = &players[0].room_id;

        let request = state
            .request_vote(room_id, &players[1].player_id)
            .await
            .unwrap();
        let status = state
            .respond_vote(room_id, &players[2].player_id, &request.id, false)
            .await
            .unwrap();
        assert_eq!(status, VoteRequestStatus::Denied);
        assert_eq!(
            state.load_room(room_id).await.unwrap().status,
            RoomStatus::Playing
        );

        let err = state
            .respond_vote(room_id, &players[3].player_id, &request.id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));

        // A settled request leaves room for a new one
        state
            .request_vote(room_id, &players[3].player_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_one_pending_request_at_a_time() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 2).await;
        playing(&state, &players).await;
        let room_id = &players[0].room_id;

        let request = state
            .request_vote(room_id, &players[0].player_id)
            .await
            .unwrap();
        let err = state
            .request_vote(room_id, &players[1].player_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));

        let err = state
            .respond_vote(room_id, &players[0].player_id, &request.id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));

        let err = state
            .respond_vote(room_id, &players[1].player_id, "missing", true)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_responses_close_with_the_speaking_phase() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 3).await;
        playing(&state, &players).await;
        let room_id = &players[0].room_id;

        let request = state
            .request_vote(room_id, &players[1].player_id)
            .await
            .unwrap();
        state
            .force_voting(room_id, &players[0].player_id)
            .await
            .unwrap();

        let err = state
            .respond_vote(room_id, &players[2].player_id, &request.id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
        assert!(state
            .store
            .list_vote_responses(&request.id)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            state
                .store
                .get_vote_request(room_id, &request.id)
                .await
                .unwrap()
                .unwrap()
                .status,
            VoteRequestStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_request_vote_outside_speaking_phase() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 2).await;
        let err = state
            .request_vote(&players[0].room_id, &players[0].player_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_full_ballot_shows_results() {
        let state = state();
        let players = voting_room(&state, 2).await;
        let room_id = &players[0].room_id;
        let (a, b, c) = (
            &players[0].player_id,
            &players[1].player_id,
            &players[2].player_id,
        );

        let err = state.fetch_results(room_id).await.unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));

        state.cast_vote(room_id, a, b).await.unwrap();
        // Changing your mind overwrites the ballot
        state.cast_vote(room_id, a, c).await.unwrap();
        state.cast_vote(room_id, b, c).await.unwrap();
        assert_eq!(
            state.load_room(room_id).await.unwrap().status,
            RoomStatus::Voting
        );
        state.cast_vote(room_id, c, a).await.unwrap();
        assert_eq!(
            state.load_room(room_id).await.unwrap().status,
            RoomStatus::Results
        );

        let results = state.fetch_results(room_id).await.unwrap();
        let secret = state.store.get_secret(room_id).await.unwrap().unwrap();
        assert_eq!(results.impostor_id, secret.impostor_player_id);
        assert_eq!(results.votes.get(c), Some(&2));
        assert_eq!(results.votes.get(a), Some(&1));
        assert_eq!(results.most_voted_id.as_ref(), Some(c));
        assert_eq!(results.impostor_caught, secret.impostor_player_id == *c);

        let err = state.cast_vote(room_id, b, a).await.unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_ballot_validation() {
        let state = state();
        let players = voting_room(&state, 2).await;
        let room_id = &players[0].room_id;
        let a = &players[0].player_id;

        assert!(matches!(
            state.cast_vote(room_id, a, a).await,
            Err(GameError::InvalidInput(_))
        ));
        assert!(matches!(
            state.cast_vote(room_id, a, "").await,
            Err(GameError::InvalidInput(_))
        ));
        assert!(matches!(
            state.cast_vote(room_id, a, "stranger").await,
            Err(GameError::PreconditionFailed(_))
        ));
        assert!(matches!(
            state.cast_vote(room_id, "stranger", a).await,
            Err(GameError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_to_lobby() {
        let state = state();
        let players = voting_room(&state, 2).await;
        let room_id = &players[0].room_id;

        let err = state
            .reset_to_lobby(room_id, &players[0].player_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));

        let ids: Vec<_> = players.iter().map(|p| p.player_id.clone()).collect();
        for (i, voter) in ids.iter().enumerate() {
            let target = &ids[(i + 1) % ids.len()];
            state.cast_vote(room_id, voter, target).await.unwrap();
        }

        let err = state
            .reset_to_lobby(room_id, &players[1].player_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));

        state
            .reset_to_lobby(room_id, &players[0].player_id)
            .await
            .unwrap();
        // Again, already in the lobby
        state
            .reset_to_lobby(room_id, &players[0].player_id)
            .await
            .unwrap();

        let room = state.load_room(room_id).await.unwrap();
        assert_eq!(room.status, RoomStatus::Lobby);
        assert!(room.turn_order.is_empty());
        assert_eq!(room.current_round, 1);
        assert!(state.store.get_secret(room_id).await.unwrap().is_none());

        let players_after = state.store.list_players(room_id).await.unwrap();
        assert_eq!(players_after.len(), 3);
        assert!(players_after
            .iter()
            .all(|p| !p.has_seen_card && p.voted_for.is_none()));

        // And a second game can be dealt
        state
            .start_game(room_id, &players[0].player_id)
            .await
            .unwrap();
        assert_eq!(state.store.recent_history(room_id, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_departed_player_does_not_block_quorum() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 3).await;
        playing(&state, &players).await;
        let room_id = &players[0].room_id;

        let request = state
            .request_vote(room_id, &players[0].player_id)
            .await
            .unwrap();
        state
            .respond_vote(room_id, &players[1].player_id, &request.id, true)
            .await
            .unwrap();
        state
            .leave_room(room_id, &players[3].player_id)
            .await
            .unwrap();

        let status = state
            .respond_vote(room_id, &players[2].player_id, &request.id, true)
            .await
            .unwrap();
        assert_eq!(status, VoteRequestStatus::Approved);
    }

    #[tokio::test]
    async fn test_departed_requester_still_needs_everyone_else() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 3).await;
        playing(&state, &players).await;
        let room_id = &players[0].room_id;

        let request = state
            .request_vote(room_id, &players[3].player_id)
            .await
            .unwrap();
        state
            .leave_room(room_id, &players[3].player_id)
            .await
            .unwrap();

        for p in &players[1..3] {
            let status = state
                .respond_vote(room_id, &p.player_id, &request.id, true)
                .await
                .unwrap();
            assert_eq!(status, VoteRequestStatus::Pending);
        }
        let status = state
            .respond_vote(room_id, &players[0].player_id, &request.id, true)
            .await
            .unwrap();
        assert_eq!(status, VoteRequestStatus::Approved);
    }
}
