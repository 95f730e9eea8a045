use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, RwLock};

use super::{ChangeEvent, ChangeOp, Store, StoreError, StoreResult, Table};
use crate::types::*;

/// All rows, behind one lock so multi-row writes are atomic
#[derive(Default)]
struct Tables {
    rooms: HashMap<RoomId, Room>,
    players: HashMap<PlayerId, Player>,
    secrets: HashMap<RoomId, RoomSecret>,
    history: Vec<RoundHistoryEntry>,
    vote_requests: HashMap<VoteRequestId, VoteRequest>,
    vote_responses: HashMap<(VoteRequestId, PlayerId), VoteResponse>,
    messages: Vec<HintMessage>,
}

impl Tables {
    fn drop_vote_requests(&mut self, room_id: &str) {
        let stale: Vec<VoteRequestId> = self
            .vote_requests
            .values()
            .filter(|r| r.room_id == room_id)
            .map(|r| r.id.clone())
            .collect();
        for id in &stale {
            self.vote_requests.remove(id);
        }
        self.vote_responses
            .retain(|(request_id, _), _| !stale.contains(request_id));
    }

    fn clear_round_fields(&mut self, room_id: &str) {
        for player in self.players.values_mut().filter(|p| p.room_id == room_id) {
            player.has_seen_card = false;
            player.voted_for = None;
        }
    }

    /// Versioned compare-and-set of a room row
    fn swap_room(&mut self, mut room: Room) -> StoreResult<Room> {
        let stored = self.rooms.get_mut(&room.id).ok_or(StoreError::Conflict)?;
        if stored.version != room.version {
            return Err(StoreError::Conflict);
        }
        room.version += 1;
        *stored = room.clone();
        Ok(room)
    }

    fn room_in(&self, room_id: &str, status: RoomStatus) -> bool {
        self.rooms.get(room_id).is_some_and(|r| r.status == status)
    }

    fn drop_room(&mut self, room_id: &str) -> bool {
        let existed = self.rooms.remove(room_id).is_some();
        self.players.retain(|_, p| p.room_id != room_id);
        self.secrets.remove(room_id);
        self.history.retain(|h| h.room_id != room_id);
        self.messages.retain(|m| m.room_id != room_id);
        self.drop_vote_requests(room_id);
        existed
    }
}

/// In-process [`Store`] backed by hash maps
pub struct MemoryStore {
    tables: RwLock<Tables>,
    themes: Vec<Theme>,
    changes: broadcast::Sender<ChangeEvent>,
    /// When set, every call fails with [`StoreError::Unavailable`]
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new(themes: Vec<Theme>) -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            tables: RwLock::new(Tables::default()),
            themes,
            changes: tx,
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate the store going away (or coming back)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn notify(&self, room_id: &str, table: Table, op: ChangeOp) {
        // No subscribers is fine
        let _ = self.changes.send(ChangeEvent {
            room_id: room_id.to_string(),
            table,
            op,
        });
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    async fn insert_room(&self, room: Room) -> StoreResult<Room> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        if tables.rooms.values().any(|r| r.code == room.code) {
            return Err(StoreError::CodeTaken(room.code));
        }
        if tables.rooms.contains_key(&room.id) {
            return Err(StoreError::Conflict);
        }
        tables.rooms.insert(room.id.clone(), room.clone());
        drop(tables);

        self.notify(&room.id, Table::Rooms, ChangeOp::Insert);
        Ok(room)
    }

    async fn get_room(&self, room_id: &str) -> StoreResult<Option<Room>> {
        self.check_online()?;
        Ok(self.tables.read().await.rooms.get(room_id).cloned())
    }

    async fn find_room_by_code(&self, code: &str) -> StoreResult<Option<Room>> {
        self.check_online()?;
        Ok(self
            .tables
            .read()
            .await
            .rooms
            .values()
            .find(|r| r.code == code)
            .cloned())
    }

    async fn update_room(&self, room: Room) -> StoreResult<Room> {
        self.check_online()?;
        let room = self.tables.write().await.swap_room(room)?;
        self.notify(&room.id, Table::Rooms, ChangeOp::Update);
        Ok(room)
    }

    async fn begin_game(
        &self,
        room: Room,
        secret: RoomSecret,
        entry: RoundHistoryEntry,
    ) -> StoreResult<Room> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let room = tables.swap_room(room)?;
        tables.clear_round_fields(&room.id);
        tables.drop_vote_requests(&room.id);
        tables.secrets.insert(room.id.clone(), secret);
        tables.history.push(entry);
        drop(tables);

        self.notify(&room.id, Table::Rooms, ChangeOp::Update);
        self.notify(&room.id, Table::Players, ChangeOp::Update);
        self.notify(&room.id, Table::VoteRequests, ChangeOp::Delete);
        Ok(room)
    }

    async fn return_to_lobby(&self, room: Room) -> StoreResult<Room> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let room = tables.swap_room(room)?;
        tables.clear_round_fields(&room.id);
        tables.drop_vote_requests(&room.id);
        tables.secrets.remove(&room.id);
        drop(tables);

        self.notify(&room.id, Table::Rooms, ChangeOp::Update);
        self.notify(&room.id, Table::Players, ChangeOp::Update);
        self.notify(&room.id, Table::VoteRequests, ChangeOp::Delete);
        Ok(room)
    }

    async fn transition_status(
        &self,
        room_id: &str,
        from: RoomStatus,
        to: RoomStatus,
    ) -> StoreResult<bool> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let applied = match tables.rooms.get_mut(room_id) {
            Some(room) if room.status == from => {
                room.status = to;
                if to == RoomStatus::Voting || to == RoomStatus::Playing {
                    room.current_turn_index = 0;
                }
                room.version += 1;
                true
            }
            _ => false,
        };
        drop(tables);

        if applied {
            self.notify(room_id, Table::Rooms, ChangeOp::Update);
        }
        Ok(applied)
    }

    async fn delete_room(&self, room_id: &str) -> StoreResult<bool> {
        self.check_online()?;
        let existed = self.tables.write().await.drop_room(room_id);
        if existed {
            self.notify(room_id, Table::Rooms, ChangeOp::Delete);
        }
        Ok(existed)
    }

    async fn delete_rooms_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let expired: Vec<RoomId> = tables
            .rooms
            .values()
            .filter(|r| r.created_at < cutoff)
            .map(|r| r.id.clone())
            .collect();
        for room_id in &expired {
            tables.drop_room(room_id);
        }
        drop(tables);

        for room_id in &expired {
            self.notify(room_id, Table::Rooms, ChangeOp::Delete);
        }
        Ok(expired.len())
    }

    async fn insert_player(&self, mut player: Player) -> StoreResult<Player> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        if !tables.rooms.contains_key(&player.room_id) {
            return Err(StoreError::Conflict);
        }
        // Join order must be strict even when two clock reads tie
        let latest = tables
            .players
            .values()
            .filter(|p| p.room_id == player.room_id)
            .map(|p| p.joined_at)
            .max();
        if let Some(latest) = latest {
            if player.joined_at <= latest {
                player.joined_at = latest + chrono::Duration::microseconds(1);
            }
        }
        tables.players.insert(player.id.clone(), player.clone());
        drop(tables);

        self.notify(&player.room_id, Table::Players, ChangeOp::Insert);
        Ok(player)
    }

    async fn get_player(&self, room_id: &str, player_id: &str) -> StoreResult<Option<Player>> {
        self.check_online()?;
        Ok(self
            .tables
            .read()
            .await
            .players
            .get(player_id)
            .filter(|p| p.room_id == room_id)
            .cloned())
    }

    async fn list_players(&self, room_id: &str) -> StoreResult<Vec<Player>> {
        self.check_online()?;
        let mut players: Vec<Player> = self
            .tables
            .read()
            .await
            .players
            .values()
            .filter(|p| p.room_id == room_id)
            .cloned()
            .collect();
        players.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
        Ok(players)
    }

    async fn set_card_seen(&self, room_id: &str, player_id: &str) -> StoreResult<bool> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        if !tables.room_in(room_id, RoomStatus::Revealing) {
            return Err(StoreError::Conflict);
        }
        let found = match tables.players.get_mut(player_id) {
            Some(player) if player.room_id == room_id => {
                player.has_seen_card = true;
                true
            }
            _ => false,
        };
        drop(tables);

        if found {
            self.notify(room_id, Table::Players, ChangeOp::Update);
        }
        Ok(found)
    }

    async fn set_vote(&self, room_id: &str, voter_id: &str, target_id: &str) -> StoreResult<bool> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        if !tables.room_in(room_id, RoomStatus::Voting) {
            return Err(StoreError::Conflict);
        }
        let found = match tables.players.get_mut(voter_id) {
            Some(player) if player.room_id == room_id => {
                player.voted_for = Some(target_id.to_string());
                true
            }
            _ => false,
        };
        drop(tables);

        if found {
            self.notify(room_id, Table::Players, ChangeOp::Update);
        }
        Ok(found)
    }

    async fn delete_player(&self, room_id: &str, player_id: &str) -> StoreResult<bool> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let removed = tables
            .players
            .get(player_id)
            .is_some_and(|p| p.room_id == room_id);
        if removed {
            tables.players.remove(player_id);
        }
        drop(tables);

        if removed {
            self.notify(room_id, Table::Players, ChangeOp::Delete);
        }
        Ok(removed)
    }

    async fn get_secret(&self, room_id: &str) -> StoreResult<Option<RoomSecret>> {
        self.check_online()?;
        Ok(self.tables.read().await.secrets.get(room_id).cloned())
    }

    async fn recent_history(
        &self,
        room_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<RoundHistoryEntry>> {
        self.check_online()?;
        // Appended in time order, so walking backwards yields newest first
        Ok(self
            .tables
            .read()
            .await
            .history
            .iter()
            .rev()
            .filter(|h| h.room_id == room_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn open_vote_request(&self, request: VoteRequest) -> StoreResult<VoteRequest> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let pending = tables
            .vote_requests
            .values()
            .any(|r| r.room_id == request.room_id && r.status == VoteRequestStatus::Pending);
        if pending {
            return Err(StoreError::Conflict);
        }
        tables.drop_vote_requests(&request.room_id);
        tables
            .vote_requests
            .insert(request.id.clone(), request.clone());
        drop(tables);

        self.notify(&request.room_id, Table::VoteRequests, ChangeOp::Insert);
        Ok(request)
    }

    async fn get_vote_request(
        &self,
        room_id: &str,
        request_id: &str,
    ) -> StoreResult<Option<VoteRequest>> {
        self.check_online()?;
        Ok(self
            .tables
            .read()
            .await
            .vote_requests
            .get(request_id)
            .filter(|r| r.room_id == room_id)
            .cloned())
    }

    async fn latest_vote_request(&self, room_id: &str) -> StoreResult<Option<VoteRequest>> {
        self.check_online()?;
        // At most one request per room survives open_vote_request
        Ok(self
            .tables
            .read()
            .await
            .vote_requests
            .values()
            .filter(|r| r.room_id == room_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at))
            .cloned())
    }

    async fn resolve_vote_request(
        &self,
        request_id: &str,
        status: VoteRequestStatus,
    ) -> StoreResult<bool> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let resolved = match tables.vote_requests.get_mut(request_id) {
            Some(request) if request.status == VoteRequestStatus::Pending => {
                request.status = status;
                Some(request.room_id.clone())
            }
            _ => None,
        };
        drop(tables);

        match resolved {
            Some(room_id) => {
                self.notify(&room_id, Table::VoteRequests, ChangeOp::Update);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn upsert_vote_response(&self, response: VoteResponse) -> StoreResult<()> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let room_id = match tables.vote_requests.get(&response.request_id) {
            Some(request) => request.room_id.clone(),
            // Superseded while the response was in flight
            None => return Err(StoreError::Conflict),
        };
        tables.vote_responses.insert(
            (response.request_id.clone(), response.player_id.clone()),
            response,
        );
        drop(tables);

        self.notify(&room_id, Table::VoteResponses, ChangeOp::Update);
        Ok(())
    }

    async fn list_vote_responses(&self, request_id: &str) -> StoreResult<Vec<VoteResponse>> {
        self.check_online()?;
        Ok(self
            .tables
            .read()
            .await
            .vote_responses
            .values()
            .filter(|r| r.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn active_themes(&self) -> StoreResult<Vec<Theme>> {
        self.check_online()?;
        Ok(self.themes.iter().filter(|t| t.active).cloned().collect())
    }

    async fn get_theme(&self, theme_id: &str) -> StoreResult<Option<Theme>> {
        self.check_online()?;
        Ok(self.themes.iter().find(|t| t.id == theme_id).cloned())
    }

    async fn append_message(&self, message: HintMessage) -> StoreResult<()> {
        self.check_online()?;
        let room_id = message.room_id.clone();
        self.tables.write().await.messages.push(message);
        self.notify(&room_id, Table::Messages, ChangeOp::Insert);
        Ok(())
    }

    async fn list_messages(&self, room_id: &str) -> StoreResult<Vec<HintMessage>> {
        self.check_online()?;
        Ok(self
            .tables
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect())
    }
}
