use super::{require_id, AppState};
use crate::error::{GameError, GameResult};
use crate::game::assignment::{self, AssignmentError, HISTORY_WINDOW};
use crate::game::lifecycle;
use crate::protocol::MyCard;
use crate::store::StoreError;
use crate::types::*;
use chrono::Utc;

impl AppState {
    /// Deal a new game: pick theme and impostor, shuffle the speaking order
    /// and move the room to the reveal.
    pub async fn start_game(&self, room_id: &str, player_id: &str) -> GameResult<Room> {
        require_id(room_id, "roomId")?;
        require_id(player_id, "playerId")?;

        let room = self.load_room(room_id).await?;
        self.require_host(&room, player_id, "start the game").await?;
        if !lifecycle::is_valid_transition(room.status, RoomStatus::Revealing) {
            return Err(GameError::precondition("Game already in progress"));
        }

        let players = self.store.list_players(room_id).await?;
        if players.len() < MIN_PLAYERS {
            return Err(GameError::precondition(format!(
                "Need at least {} players to start",
                MIN_PLAYERS
            )));
        }
        let player_ids: Vec<PlayerId> = players.into_iter().map(|p| p.id).collect();

        let themes = self.store.active_themes().await?;
        let history = self.store.recent_history(room_id, HISTORY_WINDOW).await?;

        let (picked, turn_order) = {
            let mut rng = rand::rng();
            let picked = assignment::assign(&themes, &player_ids, &history, &mut rng);
            (picked, assignment::shuffled_turn_order(&player_ids, &mut rng))
        };
        let picked = picked.map_err(|e| match e {
            AssignmentError::NoThemes => GameError::StorageFailure(e.to_string()),
            AssignmentError::NoPlayers => GameError::precondition(e.to_string()),
        })?;

        let mut next = room;
        next.status = RoomStatus::Revealing;
        next.turn_order = turn_order;
        next.current_turn_index = 0;
        next.current_round = 1;
        let secret = RoomSecret {
            room_id: room_id.to_string(),
            theme_id: picked.theme_id.clone(),
            impostor_player_id: picked.impostor_player_id.clone(),
        };
        let entry = RoundHistoryEntry {
            room_id: room_id.to_string(),
            theme_id: picked.theme_id,
            impostor_player_id: picked.impostor_player_id,
            created_at: Utc::now(),
        };
        // Losing this race means someone else already started; nothing was written
        let next = self.store.begin_game(next, secret, entry).await?;

        tracing::info!(
            "Room {} started with {} players over {} rounds",
            room_id,
            next.turn_order.len(),
            next.total_rounds
        );
        Ok(next)
    }

    /// Record that a player has looked at their card.
    ///
    /// Repeating the call, or calling it after the reveal is over, changes
    /// nothing.
    pub async fn mark_card_seen(&self, room_id: &str, player_id: &str) -> GameResult<()> {
        require_id(room_id, "roomId")?;
        require_id(player_id, "playerId")?;

        match self.store.set_card_seen(room_id, player_id).await {
            Ok(true) => {}
            Ok(false) => return Err(GameError::not_found("Player not found")),
            // Not revealing: find out whether it is too early or already over
            Err(StoreError::Conflict) => {
                let room = self.load_room(room_id).await?;
                if room.status == RoomStatus::Lobby {
                    return Err(GameError::precondition("Game has not started"));
                }
                self.load_player(room_id, player_id).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        tracing::debug!("Player {} has seen their card", player_id);

        self.settle_derived_status(room_id).await?;
        Ok(())
    }

    /// The calling player's card: the theme, or the impostor marker
    pub async fn fetch_my_card(&self, room_id: &str, player_id: &str) -> GameResult<MyCard> {
        require_id(room_id, "roomId")?;
        require_id(player_id, "playerId")?;

        self.load_player(room_id, player_id).await?;
        let secret = self
            .store
            .get_secret(room_id)
            .await?
            .ok_or_else(|| GameError::precondition("Room not ready"))?;

        if secret.impostor_player_id == player_id {
            return Ok(MyCard {
                role: CardRole::Impostor,
                theme: None,
            });
        }

        let theme = self.store.get_theme(&secret.theme_id).await?;
        Ok(MyCard {
            role: CardRole::Crew,
            theme: theme.map(|t| t.text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_start_game_deals_cards() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 3).await;
        let room_id = &players[0].room_id;

        let room = state.start_game(room_id, &players[0].player_id).await.unwrap();
        assert_eq!(room.status, RoomStatus::Revealing);
        assert_eq!(room.current_round, 1);
        assert_eq!(room.current_turn_index, 0);

        let ids: HashSet<_> = players.iter().map(|p| p.player_id.clone()).collect();
        let order: HashSet<_> = room.turn_order.iter().cloned().collect();
        assert_eq!(room.turn_order.len(), 4);
        assert_eq!(order, ids);

        let secret = state.store.get_secret(room_id).await.unwrap().unwrap();
        assert!(ids.contains(&secret.impostor_player_id));

        let history = state.store.recent_history(room_id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].theme_id, secret.theme_id);
    }

    #[tokio::test]
    async fn test_start_requires_three_players() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 1).await;

        let err = state
            .start_game(&players[0].room_id, &players[0].player_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));

        let room = state.load_room(&players[0].room_id).await.unwrap();
        assert_eq!(room.status, RoomStatus::Lobby);
        assert!(state.store.get_secret(&room.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_only_host_starts() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 2).await;

        let err = state
            .start_game(&players[0].room_id, &players[1].player_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_cannot_start_twice() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 2).await;
        let room_id = &players[0].room_id;

        state.start_game(room_id, &players[0].player_id).await.unwrap();
        let err = state
            .start_game(room_id, &players[0].player_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
        assert_eq!(state.store.recent_history(room_id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reveal_completes_after_everyone_looks() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 2).await;
        let room_id = &players[0].room_id;
        state.start_game(room_id, &players[0].player_id).await.unwrap();

        for p in &players[..2] {
            state.mark_card_seen(room_id, &p.player_id).await.unwrap();
            // Repeats are harmless
            state.mark_card_seen(room_id, &p.player_id).await.unwrap();
        }
        assert_eq!(
            state.load_room(room_id).await.unwrap().status,
            RoomStatus::Revealing
        );

        state.mark_card_seen(room_id, &players[2].player_id).await.unwrap();
        assert_eq!(
            state.load_room(room_id).await.unwrap().status,
            RoomStatus::Playing
        );

        // Late duplicate after the reveal is a no-op
        state.mark_card_seen(room_id, &players[2].player_id).await.unwrap();
        assert_eq!(
            state.load_room(room_id).await.unwrap().status,
            RoomStatus::Playing
        );
    }

    #[tokio::test]
    async fn test_mark_card_seen_in_lobby_rejected() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 2).await;
        let err = state
            .mark_card_seen(&players[0].room_id, &players[1].player_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_mark_card_seen_by_stranger() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 2).await;
        let room_id = &players[0].room_id;
        state.start_game(room_id, &players[0].player_id).await.unwrap();

        let err = state.mark_card_seen(room_id, "stranger").await.unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));

        for p in &players {
            state.mark_card_seen(room_id, &p.player_id).await.unwrap();
        }
        let err = state.mark_card_seen(room_id, "stranger").await.unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));

        let err = state.mark_card_seen("nowhere", "stranger").await.unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_exactly_one_impostor_card() {
        let state = state();
        let players = lobby(&state, GameMode::Remote, 4).await;
        let room_id = &players[0].room_id;
        state.start_game(room_id, &players[0].player_id).await.unwrap();

        let mut impostors = 0;
        let mut themes = HashSet::new();
        for p in &players {
            let card = state.fetch_my_card(room_id, &p.player_id).await.unwrap();
            match card.role {
                CardRole::Impostor => {
                    impostors += 1;
                    assert!(card.theme.is_none());
                }
                CardRole::Crew => {
                    themes.insert(card.theme.unwrap());
                }
            }
        }
        assert_eq!(impostors, 1);
        assert_eq!(themes.len(), 1);
    }

    #[tokio::test]
    async fn test_card_before_start() {
        let state = state();
        let players = lobby(&state, GameMode::InPerson, 2).await;
        let err = state
            .fetch_my_card(&players[0].room_id, &players[0].player_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::PreconditionFailed(_)));

        let err = state
            .fetch_my_card(&players[0].room_id, "stranger")
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_start_without_themes() {
        let store = std::sync::Arc::new(crate::store::MemoryStore::new(Vec::new()));
        let state = AppState::new(store, crate::config::AppConfig::default());
        let players = lobby(&state, GameMode::InPerson, 2).await;

        let err = state
            .start_game(&players[0].room_id, &players[0].player_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::StorageFailure(_)));
        assert_eq!(
            state.load_room(&players[0].room_id).await.unwrap().status,
            RoomStatus::Lobby
        );
    }
}
