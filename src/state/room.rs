use super::{require_id, AppState};
use crate::error::{GameError, GameResult};
use crate::game::{lifecycle, quorum, turns};
use crate::protocol::{JoinedRoom, RoomSnapshot, VoteRequestInfo};
use crate::store::StoreError;
use crate::types::*;
use chrono::Utc;
use rand::Rng;

/// Join code alphabet, without the easily confused 0/O and 1/I
const CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 4;
const MAX_CODE_ATTEMPTS: usize = 5;
/// Attempts at fixing the turn order after a departure before giving up
const MAX_ORDER_REPAIRS: usize = 3;

fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Trim and bound a display name
pub(crate) fn normalize_name(name: &str) -> GameResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GameError::invalid("Name is required"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(GameError::invalid(format!(
            "Name must be at most {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(name.to_string())
}

fn normalize_code(code: &str) -> GameResult<String> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        return Err(GameError::invalid("Room code is required"));
    }
    Ok(code)
}

impl AppState {
    /// Create a room and its host player
    pub async fn create_room(
        &self,
        name: &str,
        mode: GameMode,
        total_rounds: u32,
    ) -> GameResult<JoinedRoom> {
        let codes = std::iter::repeat_with(generate_room_code);
        self.create_room_with_codes(name, mode, total_rounds, codes)
            .await
    }

    pub(crate) async fn create_room_with_codes(
        &self,
        name: &str,
        mode: GameMode,
        total_rounds: u32,
        codes: impl Iterator<Item = String>,
    ) -> GameResult<JoinedRoom> {
        let name = normalize_name(name)?;
        if !(1..=MAX_ROUNDS).contains(&total_rounds) {
            return Err(GameError::invalid(format!(
                "Rounds must be between 1 and {}",
                MAX_ROUNDS
            )));
        }

        let room_id = ulid::Ulid::new().to_string();
        let player_id = ulid::Ulid::new().to_string();

        let mut inserted = None;
        for code in codes.take(MAX_CODE_ATTEMPTS) {
            let room = Room {
                id: room_id.clone(),
                code,
                status: RoomStatus::Lobby,
                mode,
                total_rounds,
                current_round: 1,
                turn_order: Vec::new(),
                current_turn_index: 0,
                host_player_id: player_id.clone(),
                created_at: Utc::now(),
                version: 0,
            };
            match self.store.insert_room(room).await {
                Ok(room) => {
                    inserted = Some(room);
                    break;
                }
                Err(StoreError::CodeTaken(code)) => {
                    tracing::debug!("Room code {} taken, retrying", code);
                }
                Err(e) => return Err(e.into()),
            }
        }
        let Some(room) = inserted else {
            return Err(GameError::StorageFailure(
                "could not allocate a free room code".to_string(),
            ));
        };

        let host = Player {
            id: player_id.clone(),
            room_id: room.id.clone(),
            name,
            is_host: true,
            has_seen_card: false,
            voted_for: None,
            joined_at: Utc::now(),
        };
        if let Err(e) = self.store.insert_player(host).await {
            // Don't leave a room nobody can reach
            if let Err(cleanup) = self.store.delete_room(&room.id).await {
                tracing::error!("Failed to remove orphaned room {}: {}", room.id, cleanup);
            }
            return Err(e.into());
        }

        tracing::info!("Room {} created with code {} ({:?})", room.id, room.code, mode);
        Ok(JoinedRoom {
            room_id: room.id,
            room_code: room.code,
            player_id,
        })
    }

    /// Join a room in the lobby by its code
    pub async fn join_room(&self, name: &str, code: &str) -> GameResult<JoinedRoom> {
        let name = normalize_name(name)?;
        let code = normalize_code(code)?;

        let room = self
            .store
            .find_room_by_code(&code)
            .await?
            .ok_or_else(|| GameError::not_found("Room not found"))?;
        if room.status != RoomStatus::Lobby {
            return Err(GameError::precondition("Game already in progress"));
        }
        if self.store.list_players(&room.id).await?.len() >= MAX_PLAYERS {
            return Err(GameError::precondition("Room is full"));
        }

        let player = Player {
            id: ulid::Ulid::new().to_string(),
            room_id: room.id.clone(),
            name,
            is_host: false,
            has_seen_card: false,
            voted_for: None,
            joined_at: Utc::now(),
        };
        let player = self.store.insert_player(player).await?;

        // Concurrent joins and starts are only caught after the fact: re-read
        // and back out if this join pushed the room past either limit.
        let seat = self
            .store
            .list_players(&room.id)
            .await?
            .iter()
            .position(|p| p.id == player.id);
        let status = self.store.get_room(&room.id).await?.map(|r| r.status);
        let rejection = match (seat, status) {
            (Some(seat), Some(RoomStatus::Lobby)) if seat < MAX_PLAYERS => None,
            (_, Some(RoomStatus::Lobby)) => Some(GameError::precondition("Room is full")),
            (_, Some(_)) => Some(GameError::precondition("Game already in progress")),
            (_, None) => Some(GameError::not_found("Room not found")),
        };
        if let Some(err) = rejection {
            self.store.delete_player(&room.id, &player.id).await?;
            return Err(err);
        }

        tracing::info!("Player {} joined room {}", player.id, room.id);
        Ok(JoinedRoom {
            room_id: room.id,
            room_code: room.code,
            player_id: player.id,
        })
    }

    /// Remove a player. The last one out deletes the room.
    pub async fn leave_room(&self, room_id: &str, player_id: &str) -> GameResult<()> {
        require_id(room_id, "roomId")?;
        require_id(player_id, "playerId")?;

        if self.store.delete_player(room_id, player_id).await? {
            tracing::info!("Player {} left room {}", player_id, room_id);
        }

        if self.store.list_players(room_id).await?.is_empty() {
            if self.store.delete_room(room_id).await? {
                tracing::info!("Room {} deleted, last player left", room_id);
            }
            return Ok(());
        }

        self.drop_from_turn_order(room_id, player_id).await?;
        self.settle_derived_status(room_id).await?;
        Ok(())
    }

    async fn drop_from_turn_order(&self, room_id: &str, player_id: &str) -> GameResult<()> {
        for _ in 0..MAX_ORDER_REPAIRS {
            let Some(mut room) = self.store.get_room(room_id).await? else {
                return Ok(());
            };
            if !turns::remove_from_order(&mut room, player_id) {
                return Ok(());
            }
            match self.store.update_room(room).await {
                Ok(_) => return Ok(()),
                Err(StoreError::Conflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        tracing::warn!(
            "Gave up removing {} from the turn order of room {}",
            player_id,
            room_id
        );
        Ok(())
    }

    /// Delete the room for everyone
    pub async fn end_room(&self, room_id: &str, player_id: &str) -> GameResult<()> {
        require_id(room_id, "roomId")?;
        require_id(player_id, "playerId")?;

        let room = self.load_room(room_id).await?;
        self.require_host(&room, player_id, "end the room").await?;

        self.store.delete_room(room_id).await?;
        tracing::info!("Room {} ended by host", room_id);
        Ok(())
    }

    /// Everything a client needs to render the room
    pub async fn room_snapshot(&self, room_id: &str) -> GameResult<RoomSnapshot> {
        require_id(room_id, "roomId")?;

        let room = self.load_room(room_id).await?;
        let players = self.store.list_players(room_id).await?;

        let vote_request = match self.store.latest_vote_request(room_id).await? {
            Some(request) => {
                let responses = self.store.list_vote_responses(&request.id).await?;
                Some(VoteRequestInfo {
                    approvals: responses.iter().filter(|r| r.approved).count(),
                    required_approvals: quorum::required_approvals(players.len()),
                    responded_player_ids: responses.into_iter().map(|r| r.player_id).collect(),
                    id: request.id,
                    requester_player_id: request.requester_player_id,
                    status: request.status,
                })
            }
            None => None,
        };

        Ok(RoomSnapshot {
            valid_transitions: lifecycle::valid_transitions(room.status),
            room,
            players,
            vote_request,
            server_now: Utc::now().to_rfc3339(),
        })
    }

    /// Remote-mode hint transcript, oldest first
    pub async fn list_messages(&self, room_id: &str) -> GameResult<Vec<HintMessage>> {
        require_id(room_id, "roomId")?;
        self.load_room(room_id).await?;
        Ok(self.store.list_messages(room_id).await?)
    }
}
