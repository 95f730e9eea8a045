use crate::store::{ChangeOp, Table};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifiers handed to a device after creating or joining a room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinedRoom {
    pub room_id: RoomId,
    pub room_code: String,
    pub player_id: PlayerId,
}

/// Authoritative view of a room, served to polling clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room: Room,
    /// Players in join order
    pub players: Vec<Player>,
    pub vote_request: Option<VoteRequestInfo>,
    pub valid_transitions: Vec<RoomStatus>,
    pub server_now: String,
}

/// Early-vote request as seen by clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequestInfo {
    pub id: VoteRequestId,
    pub requester_player_id: PlayerId,
    pub status: VoteRequestStatus,
    pub approvals: usize,
    pub required_approvals: usize,
    /// Players who have answered, so clients can hide the prompt
    pub responded_player_ids: Vec<PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MyCard {
    pub role: CardRole,
    /// Withheld from the impostor
    pub theme: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameResults {
    pub impostor_id: PlayerId,
    pub impostor_name: String,
    pub theme: String,
    pub votes: HashMap<PlayerId, u32>,
    pub most_voted_id: Option<PlayerId>,
    pub impostor_caught: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequestCreated {
    pub request_id: VoteRequestId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequestOutcome {
    pub status: VoteRequestStatus,
}

/// Messages pushed over the room WebSocket.
///
/// These are hints: none of them carry row data, clients re-fetch the room
/// snapshot when one arrives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        room_id: RoomId,
        poll_interval_ms: u64,
        server_now: String,
    },
    Changed {
        table: Table,
        op: ChangeOp,
    },
    /// Some notifications were dropped; refresh everything
    Resync,
    RoomDeleted,
    Error {
        code: String,
        msg: String,
    },
}
