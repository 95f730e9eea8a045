use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID types
pub type RoomId = String;
pub type PlayerId = String;
pub type ThemeId = String;
pub type VoteRequestId = String;
pub type MessageId = String;

/// Most players a single room accepts
pub const MAX_PLAYERS: usize = 10;
/// Fewest players needed to start a game
pub const MIN_PLAYERS: usize = 3;
pub const MAX_ROUNDS: u32 = 10;
pub const MAX_NAME_CHARS: usize = 32;
pub const MAX_HINT_CHARS: usize = 280;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Lobby,
    Revealing,
    Playing,
    Voting,
    Results,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum GameMode {
    /// One device passed around the table
    #[default]
    #[serde(rename = "in-person", alias = "presencial")]
    InPerson,
    /// Everyone on their own device, hints typed into the room
    #[serde(rename = "remote", alias = "online")]
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub code: String,
    pub status: RoomStatus,
    pub mode: GameMode,
    pub total_rounds: u32,
    pub current_round: u32,
    pub turn_order: Vec<PlayerId>,
    pub current_turn_index: usize,
    pub host_player_id: PlayerId,
    pub created_at: DateTime<Utc>,
    /// Row version, bumped by the store on every successful update
    pub version: u64,
}

impl Room {
    /// Player whose turn it is, if a turn order is set
    pub fn current_speaker(&self) -> Option<&PlayerId> {
        self.turn_order.get(self.current_turn_index)
    }

    /// Clear everything that belongs to a single game
    pub fn clear_game_state(&mut self) {
        self.status = RoomStatus::Lobby;
        self.turn_order.clear();
        self.current_turn_index = 0;
        self.current_round = 1;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub room_id: RoomId,
    pub name: String,
    pub is_host: bool,
    pub has_seen_card: bool,
    pub voted_for: Option<PlayerId>,
    pub joined_at: DateTime<Utc>,
}

/// Per-game secret, never sent to clients as-is
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSecret {
    pub room_id: RoomId,
    pub theme_id: ThemeId,
    pub impostor_player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundHistoryEntry {
    pub room_id: RoomId,
    pub theme_id: ThemeId,
    pub impostor_player_id: PlayerId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoteRequestStatus {
    Pending,
    Approved,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub id: VoteRequestId,
    pub room_id: RoomId,
    pub requester_player_id: PlayerId,
    pub status: VoteRequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub request_id: VoteRequestId,
    pub player_id: PlayerId,
    pub approved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Theme {
    pub id: ThemeId,
    pub text: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// A hint typed by the active speaker in remote mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HintMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub text: String,
    pub round_number: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CardRole {
    Impostor,
    Crew,
}
