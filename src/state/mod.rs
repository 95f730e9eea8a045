mod cleanup;
mod room;
mod round;
mod turn;
mod vote;

pub use cleanup::SweepOutcome;

use crate::config::AppConfig;
use crate::error::{GameError, GameResult};
use crate::game::lifecycle;
use crate::store::{MemoryStore, Store};
use crate::themes;
use crate::types::*;
use std::sync::Arc;

/// Session controller shared by every request handler.
///
/// Holds no game state of its own: each operation reads fresh rows from the
/// store, validates, and writes back with conditional updates, so any number
/// of controllers may front the same store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        Self { store, config }
    }

    /// In-memory store seeded with the built-in themes
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new(themes::default_themes())), config)
    }

    pub(crate) async fn load_room(&self, room_id: &str) -> GameResult<Room> {
        self.store
            .get_room(room_id)
            .await?
            .ok_or_else(|| GameError::not_found("Room not found"))
    }

    pub(crate) async fn load_player(&self, room_id: &str, player_id: &str) -> GameResult<Player> {
        self.store
            .get_player(room_id, player_id)
            .await?
            .ok_or_else(|| GameError::not_found("Player not found"))
    }

    /// Reject callers other than the room's host
    pub(crate) async fn require_host(
        &self,
        room: &Room,
        player_id: &str,
        action: &str,
    ) -> GameResult<()> {
        self.load_player(&room.id, player_id).await?;
        if room.host_player_id != player_id {
            return Err(GameError::precondition(format!(
                "Only the host can {}",
                action
            )));
        }
        Ok(())
    }

    /// Re-read the room and apply whichever transition the player set implies.
    ///
    /// Safe to call from any number of writers at once: the status flip is
    /// conditional, so only one of them applies it and the rest see `false`.
    pub(crate) async fn settle_derived_status(
        &self,
        room_id: &str,
    ) -> GameResult<Option<RoomStatus>> {
        let Some(room) = self.store.get_room(room_id).await? else {
            return Ok(None);
        };
        let players = self.store.list_players(room_id).await?;
        let Some(to) = lifecycle::derived_transition(room.status, &players) else {
            return Ok(None);
        };

        if self.store.transition_status(room_id, room.status, to).await? {
            tracing::info!("Room {} moved {:?} -> {:?}", room_id, room.status, to);
            Ok(Some(to))
        } else {
            Ok(None)
        }
    }
}

/// Reject blank identifiers before they reach the store
pub(crate) fn require_id(value: &str, what: &str) -> GameResult<()> {
    if value.trim().is_empty() {
        return Err(GameError::invalid(format!("{} is required", what)));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::protocol::JoinedRoom;

    pub fn state() -> AppState {
        AppState::in_memory(AppConfig::default())
    }

    /// Host plus `guests` players, all in the lobby. Returns the host first.
    pub async fn lobby(state: &AppState, mode: GameMode, guests: usize) -> Vec<JoinedRoom> {
        let host = state.create_room("Host", mode, 1).await.unwrap();
        let mut joined = vec![host.clone()];
        for i in 0..guests {
            let guest = state
                .join_room(&format!("Guest{}", i + 1), &host.room_code)
                .await
                .unwrap();
            joined.push(guest);
        }
        joined
    }

    /// Start the game and have everyone look at their card
    pub async fn playing(state: &AppState, players: &[JoinedRoom]) {
        let room_id = &players[0].room_id;
        state.start_game(room_id, &players[0].player_id).await.unwrap();
        for p in players {
            state.mark_card_seen(room_id, &p.player_id).await.unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_settle_is_noop_without_condition() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 2).await;
        let settled = state
            .settle_derived_status(&players[0].room_id)
            .await
            .unwrap();
        assert_eq!(settled, None);
    }

    #[tokio::test]
    async fn test_settle_on_missing_room() {
        let state = state();
        assert_eq!(state.settle_derived_status("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_require_host_rejects_guest() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 1).await;
        let room = state.load_room(&players[0].room_id).await.unwrap();

        assert!(state
            .require_host(&room, &players[0].player_id, "start")
            .await
            .is_ok());
        let err = state
            .require_host(&room, &players[1].player_id, "start")
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
    }

    #[test]
    fn test_require_id() {
        assert!(require_id("abc", "roomId").is_ok());
        assert!(matches!(
            require_id("  ", "roomId"),
            Err(GameError::InvalidInput(_))
        ));
    }
}
