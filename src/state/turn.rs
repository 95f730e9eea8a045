use super::{require_id, AppState};
use crate::error::{GameError, GameResult};
use crate::game::turns::{self, TurnPosition};
use crate::types::*;
use chrono::Utc;

impl AppState {
    /// End the current speaker's turn
    pub async fn advance_turn(&self, room_id: &str, player_id: &str) -> GameResult<TurnPosition> {
        require_id(room_id, "roomId")?;
        require_id(player_id, "playerId")?;

        let room = self.load_room(room_id).await?;
        if room.status != RoomStatus::Playing {
            return Err(GameError::precondition("Not in the speaking phase"));
        }
        self.load_player(room_id, player_id).await?;
        if !turns::can_advance(&room, player_id) {
            return Err(GameError::precondition("Not your turn"));
        }

        self.apply_advance(room).await
    }

    /// Post the current speaker's hint and pass the turn on (remote games)
    pub async fn submit_hint(
        &self,
        room_id: &str,
        player_id: &str,
        text: &str,
    ) -> GameResult<TurnPosition> {
        require_id(room_id, "roomId")?;
        require_id(player_id, "playerId")?;
        let text = text.trim();
        if text.is_empty() {
            return Err(GameError::invalid("Hint is empty"));
        }
        if text.chars().count() > MAX_HINT_CHARS {
            return Err(GameError::invalid(format!(
                "Hint must be at most {} characters",
                MAX_HINT_CHARS
            )));
        }

        let room = self.load_room(room_id).await?;
        if room.mode != GameMode::Remote {
            return Err(GameError::precondition("Hints are only used in remote games"));
        }
        if room.status != RoomStatus::Playing {
            return Err(GameError::precondition("Not in the speaking phase"));
        }
        self.load_player(room_id, player_id).await?;
        if room.current_speaker().map(String::as_str) != Some(player_id) {
            return Err(GameError::precondition("Not your turn"));
        }

        let round_number = room.current_round;
        // Advance first: a stale turn must not leave a stray hint behind
        let position = self.apply_advance(room).await?;
        self.store
            .append_message(HintMessage {
                id: ulid::Ulid::new().to_string(),
                room_id: room_id.to_string(),
                player_id: player_id.to_string(),
                text: text.to_string(),
                round_number,
                created_at: Utc::now(),
            })
            .await?;

        Ok(position)
    }

    /// Host override: skip the remaining turns and open the ballot
    pub async fn force_voting(&self, room_id: &str, player_id: &str) -> GameResult<()> {
        require_id(room_id, "roomId")?;
        require_id(player_id, "playerId")?;

        let room = self.load_room(room_id).await?;
        self.require_host(&room, player_id, "start the vote").await?;
        if room.status != RoomStatus::Playing {
            return Err(GameError::precondition("Not in the speaking phase"));
        }

        if !self
            .store
            .transition_status(room_id, RoomStatus::Playing, RoomStatus::Voting)
            .await?
        {
            return Err(GameError::precondition("Not in the speaking phase"));
        }
        tracing::info!("Host forced voting in room {}", room_id);
        Ok(())
    }

    async fn apply_advance(&self, mut room: Room) -> GameResult<TurnPosition> {
        let position = turns::advance(&mut room);
        let room = self.store.update_room(room).await?;

        if position.status == RoomStatus::Voting {
            tracing::info!("Room {} finished its rounds, voting open", room.id);
        } else {
            tracing::debug!(
                "Room {} round {} turn {}",
                room.id,
                position.round,
                position.index
            );
        }
        Ok(position)
    }
}
