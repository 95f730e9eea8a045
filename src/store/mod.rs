//! Shared state store the session controller reads and conditionally writes.
//!
//! Every client acts independently, so the store is the only point of
//! coordination. It offers row-level operations with the two kinds of
//! conditional writes the controller relies on:
//! - versioned compare-and-set of a whole [`Room`] row ([`Store::update_room`])
//! - conditional status flips ([`Store::transition_status`]), used for every
//!   derived transition so repeating them is harmless
//!
//! Starting and resetting a game touch several tables at once; those go
//! through [`Store::begin_game`] and [`Store::return_to_lobby`], which apply
//! all of their rows or none. Card and ballot writes only land while the room
//! is in the matching phase.
//!
//! Each write publishes a [`ChangeEvent`]. Events are hints only: they carry no
//! row payload, and subscribers are expected to re-read.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::*;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum StoreError {
    /// A conditional write found a different row than expected
    #[error("row was modified concurrently")]
    Conflict,

    #[error("room code {0} is already taken")]
    CodeTaken(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Rooms,
    Players,
    VoteRequests,
    VoteResponses,
    Messages,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Notification that some row of a room changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub room_id: RoomId,
    pub table: Table,
    pub op: ChangeOp,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Subscribe to change notifications for all rooms
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    // ---- rooms ----

    /// Insert a new room; fails with [`StoreError::CodeTaken`] on a code collision
    async fn insert_room(&self, room: Room) -> StoreResult<Room>;
    async fn get_room(&self, room_id: &str) -> StoreResult<Option<Room>>;
    async fn find_room_by_code(&self, code: &str) -> StoreResult<Option<Room>>;
    /// Replace a room row if its stored version still equals `room.version`.
    /// Returns the stored row with the bumped version.
    async fn update_room(&self, room: Room) -> StoreResult<Room>;
    /// Set `status = to` only if it currently equals `from`.
    /// Returns whether the update applied.
    async fn transition_status(
        &self,
        room_id: &str,
        from: RoomStatus,
        to: RoomStatus,
    ) -> StoreResult<bool>;
    /// Compare-and-set the room like [`Store::update_room`] and, in the same
    /// write, clear every player's card and ballot, drop the room's vote
    /// requests, store the new secret and record the history entry.
    /// On [`StoreError::Conflict`] nothing is written.
    async fn begin_game(
        &self,
        room: Room,
        secret: RoomSecret,
        entry: RoundHistoryEntry,
    ) -> StoreResult<Room>;
    /// Compare-and-set the room and, in the same write, clear every player's
    /// card and ballot, the secret and the vote requests
    async fn return_to_lobby(&self, room: Room) -> StoreResult<Room>;
    /// Delete a room and every row that belongs to it
    async fn delete_room(&self, room_id: &str) -> StoreResult<bool>;
    async fn delete_rooms_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;

    // ---- players ----

    async fn insert_player(&self, player: Player) -> StoreResult<Player>;
    async fn get_player(&self, room_id: &str, player_id: &str) -> StoreResult<Option<Player>>;
    /// Players of a room in join order
    async fn list_players(&self, room_id: &str) -> StoreResult<Vec<Player>>;
    /// Returns false if the player does not exist.
    /// Fails with [`StoreError::Conflict`] unless the room is revealing cards.
    async fn set_card_seen(&self, room_id: &str, player_id: &str) -> StoreResult<bool>;
    /// Returns false if the voter does not exist.
    /// Fails with [`StoreError::Conflict`] unless the room is voting.
    async fn set_vote(&self, room_id: &str, voter_id: &str, target_id: &str) -> StoreResult<bool>;
    async fn delete_player(&self, room_id: &str, player_id: &str) -> StoreResult<bool>;

    // ---- secrets and history ----

    async fn get_secret(&self, room_id: &str) -> StoreResult<Option<RoomSecret>>;
    /// Up to `limit` history entries, newest first
    async fn recent_history(&self, room_id: &str, limit: usize)
        -> StoreResult<Vec<RoundHistoryEntry>>;

    // ---- early-vote requests ----

    /// Supersede every request of the room with `request`, atomically.
    /// Fails with [`StoreError::Conflict`] while another request is pending.
    async fn open_vote_request(&self, request: VoteRequest) -> StoreResult<VoteRequest>;
    async fn get_vote_request(
        &self,
        room_id: &str,
        request_id: &str,
    ) -> StoreResult<Option<VoteRequest>>;
    async fn latest_vote_request(&self, room_id: &str) -> StoreResult<Option<VoteRequest>>;
    /// Move a pending request to a terminal status; false if it was not pending
    async fn resolve_vote_request(
        &self,
        request_id: &str,
        status: VoteRequestStatus,
    ) -> StoreResult<bool>;
    async fn upsert_vote_response(&self, response: VoteResponse) -> StoreResult<()>;
    async fn list_vote_responses(&self, request_id: &str) -> StoreResult<Vec<VoteResponse>>;

    // ---- catalog and transcript ----

    async fn active_themes(&self) -> StoreResult<Vec<Theme>>;
    async fn get_theme(&self, theme_id: &str) -> StoreResult<Option<Theme>>;
    async fn append_message(&self, message: HintMessage) -> StoreResult<()>;
    /// Messages of a room, oldest first
    async fn list_messages(&self, room_id: &str) -> StoreResult<Vec<HintMessage>>;
}
