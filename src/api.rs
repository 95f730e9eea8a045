//! HTTP API.
//!
//! Thin adapters from JSON bodies to [`AppState`] operations. Missing fields
//! deserialize to empty values so the controller reports them as invalid
//! input with the usual error body.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::GameResult;
use crate::protocol::*;
use crate::state::{AppState, SweepOutcome};
use crate::types::*;
use crate::ws;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub name: String,
    pub mode: GameMode,
    pub total_rounds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub name: String,
    pub code: String,
}

/// Body of every call that only names a room and the acting player
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerRequest {
    pub room_id: String,
    pub player_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HintRequest {
    pub room_id: String,
    pub player_id: String,
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RespondVoteRequest {
    pub room_id: String,
    pub player_id: String,
    pub request_id: String,
    pub approved: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CastVoteRequest {
    pub room_id: String,
    pub voter_id: String,
    pub voted_for_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResultsRequest {
    pub room_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CleanupRequest {
    pub token: String,
    pub days: Option<i64>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OkResponse {
    pub ok: bool,
}

const OK: OkResponse = OkResponse { ok: true };

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub status: RoomStatus,
    pub current_round: u32,
    pub current_turn_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_rooms: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<String>,
}

/// POST /api/rooms/create
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRoomRequest>,
) -> GameResult<Json<JoinedRoom>> {
    let joined = state
        .create_room(&req.name, req.mode, req.total_rounds.unwrap_or(1))
        .await?;
    Ok(Json(joined))
}

/// POST /api/rooms/join
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JoinRoomRequest>,
) -> GameResult<Json<JoinedRoom>> {
    Ok(Json(state.join_room(&req.name, &req.code).await?))
}

/// POST /api/rooms/leave
pub async fn leave_room(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayerRequest>,
) -> GameResult<Json<OkResponse>> {
    state.leave_room(&req.room_id, &req.player_id).await?;
    Ok(Json(OK))
}

/// POST /api/rooms/end
pub async fn end_room(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayerRequest>,
) -> GameResult<Json<OkResponse>> {
    state.end_room(&req.room_id, &req.player_id).await?;
    Ok(Json(OK))
}

/// GET /api/rooms/{room_id}
pub async fn room_snapshot(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> GameResult<Json<RoomSnapshot>> {
    Ok(Json(state.room_snapshot(&room_id).await?))
}

/// GET /api/rooms/{room_id}/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> GameResult<Json<Vec<HintMessage>>> {
    Ok(Json(state.list_messages(&room_id).await?))
}

/// POST /api/game/start
pub async fn start_game(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayerRequest>,
) -> GameResult<Json<OkResponse>> {
    state.start_game(&req.room_id, &req.player_id).await?;
    Ok(Json(OK))
}

/// POST /api/game/ready
pub async fn mark_card_seen(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayerRequest>,
) -> GameResult<Json<OkResponse>> {
    state.mark_card_seen(&req.room_id, &req.player_id).await?;
    Ok(Json(OK))
}

/// POST /api/game/my-card
pub async fn my_card(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayerRequest>,
) -> GameResult<Json<MyCard>> {
    Ok(Json(state.fetch_my_card(&req.room_id, &req.player_id).await?))
}

/// POST /api/game/next-turn
pub async fn next_turn(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayerRequest>,
) -> GameResult<Json<TurnResponse>> {
    let pos = state.advance_turn(&req.room_id, &req.player_id).await?;
    Ok(Json(TurnResponse {
        status: pos.status,
        current_round: pos.round,
        current_turn_index: pos.index,
    }))
}

/// POST /api/game/hint
pub async fn submit_hint(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HintRequest>,
) -> GameResult<Json<TurnResponse>> {
    let pos = state
        .submit_hint(&req.room_id, &req.player_id, &req.text)
        .await?;
    Ok(Json(TurnResponse {
        status: pos.status,
        current_round: pos.round,
        current_turn_index: pos.index,
    }))
}

/// POST /api/game/force-vote
pub async fn force_vote(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayerRequest>,
) -> GameResult<Json<OkResponse>> {
    state.force_voting(&req.room_id, &req.player_id).await?;
    Ok(Json(OK))
}

/// POST /api/game/request-vote
pub async fn request_vote(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayerRequest>,
) -> GameResult<Json<VoteRequestCreated>> {
    let request = state.request_vote(&req.room_id, &req.player_id).await?;
    Ok(Json(VoteRequestCreated {
        request_id: request.id,
    }))
}

/// POST /api/game/respond-vote
pub async fn respond_vote(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RespondVoteRequest>,
) -> GameResult<Json<VoteRequestOutcome>> {
    let status = state
        .respond_vote(&req.room_id, &req.player_id, &req.request_id, req.approved)
        .await?;
    Ok(Json(VoteRequestOutcome { status }))
}

/// POST /api/game/vote
pub async fn cast_vote(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CastVoteRequest>,
) -> GameResult<Json<OkResponse>> {
    state
        .cast_vote(&req.room_id, &req.voter_id, &req.voted_for_id)
        .await?;
    Ok(Json(OK))
}

/// POST /api/game/results
pub async fn results(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResultsRequest>,
) -> GameResult<Json<GameResults>> {
    Ok(Json(state.fetch_results(&req.room_id).await?))
}

/// POST /api/game/reset
pub async fn reset_game(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayerRequest>,
) -> GameResult<Json<OkResponse>> {
    state.reset_to_lobby(&req.room_id, &req.player_id).await?;
    Ok(Json(OK))
}

/// Retention sweep.
///
/// POST /api/admin/cleanup
///
/// `dryRun` only checks the token.
pub async fn cleanup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CleanupRequest>,
) -> GameResult<Json<CleanupResponse>> {
    let outcome = state
        .sweep_expired_rooms(&req.token, req.days, req.dry_run)
        .await?;
    let response = match outcome {
        SweepOutcome::Verified => CleanupResponse {
            ok: true,
            verified: Some(true),
            removed_rooms: None,
            cutoff: None,
        },
        SweepOutcome::Removed { rooms, cutoff } => CleanupResponse {
            ok: true,
            verified: None,
            removed_rooms: Some(rooms),
            cutoff: Some(cutoff.to_rfc3339()),
        },
    };
    Ok(Json(response))
}

/// All routes, without the tracing and CORS layers `main` adds
pub fn router(state: Arc<AppState>) -> Router {
    let rooms = Router::new()
        .route("/create", post(create_room))
        .route("/join", post(join_room))
        .route("/leave", post(leave_room))
        .route("/end", post(end_room))
        .route("/{room_id}", get(room_snapshot))
        .route("/{room_id}/messages", get(list_messages));

    let game = Router::new()
        .route("/start", post(start_game))
        .route("/ready", post(mark_card_seen))
        .route("/my-card", post(my_card))
        .route("/next-turn", post(next_turn))
        .route("/hint", post(submit_hint))
        .route("/force-vote", post(force_vote))
        .route("/request-vote", post(request_vote))
        .route("/respond-vote", post(respond_vote))
        .route("/vote", post(cast_vote))
        .route("/results", post(results))
        .route("/reset", post(reset_game));

    Router::new()
        .nest("/api/rooms", rooms)
        .nest("/api/game", game)
        .route("/api/admin/cleanup", post(cleanup))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}
