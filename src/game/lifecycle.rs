//! Room status transition table and the transitions derived from player state.

use crate::types::{Player, RoomStatus};

/// Check if a status transition is legal
pub fn is_valid_transition(from: RoomStatus, to: RoomStatus) -> bool {
    use RoomStatus::*;

    matches!(
        (from, to),
        (Lobby, Revealing)
            | (Revealing, Playing)
            | (Playing, Voting)
            | (Voting, Results)
            | (Results, Lobby)
    )
}

/// Statuses reachable from `from`, for clients rendering controls
pub fn valid_transitions(from: RoomStatus) -> Vec<RoomStatus> {
    use RoomStatus::*;

    [Lobby, Revealing, Playing, Voting, Results]
        .into_iter()
        .filter(|to| is_valid_transition(from, *to))
        .collect()
}

/// Transition implied by the current player set, if any.
///
/// Recomputed from a fresh read after every card-seen or vote write rather
/// than tracked with counters, so concurrent writers converge on the same
/// answer.
pub fn derived_transition(status: RoomStatus, players: &[Player]) -> Option<RoomStatus> {
    if players.is_empty() {
        return None;
    }
    match status {
        RoomStatus::Revealing if players.iter().all(|p| p.has_seen_card) => {
            Some(RoomStatus::Playing)
        }
        RoomStatus::Voting if players.iter().all(|p| p.voted_for.is_some()) => {
            Some(RoomStatus::Results)
        }
        _ => None,
    }
}
