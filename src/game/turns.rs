//! Speaking-order progression across rounds.

use crate::types::{GameMode, Room, RoomStatus};

/// Where the room stands after a turn ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnPosition {
    pub round: u32,
    pub index: usize,
    pub status: RoomStatus,
}

/// Next position after the current speaker finishes.
///
/// Wraps to the next round after the last speaker and moves to voting after
/// the last speaker of the last round. The index is reset to 0 on voting so no
/// stale value outlives the speaking phase.
pub fn next_position(
    current_round: u32,
    total_rounds: u32,
    current_index: usize,
    order_len: usize,
) -> TurnPosition {
    let is_last = current_index + 1 >= order_len;
    if !is_last {
        return TurnPosition {
            round: current_round,
            index: current_index + 1,
            status: RoomStatus::Playing,
        };
    }

    if current_round < total_rounds {
        TurnPosition {
            round: current_round + 1,
            index: 0,
            status: RoomStatus::Playing,
        }
    } else {
        TurnPosition {
            round: current_round,
            index: 0,
            status: RoomStatus::Voting,
        }
    }
}

/// Apply [`next_position`] to a room in place
pub fn advance(room: &mut Room) -> TurnPosition {
    let next = next_position(
        room.current_round,
        room.total_rounds,
        room.current_turn_index,
        room.turn_order.len(),
    );
    room.current_round = next.round;
    room.current_turn_index = next.index;
    room.status = next.status;
    next
}

/// Who may end the current turn.
///
/// Remote games are paced by the host. In person the device travels around
/// the table, so whoever is holding it (the current speaker) may pass it on.
pub fn can_advance(room: &Room, actor_id: &str) -> bool {
    if room.host_player_id == actor_id {
        return true;
    }
    match room.mode {
        GameMode::Remote => false,
        GameMode::InPerson => room.current_speaker().is_some_and(|id| id == actor_id),
    }
}

/// Drop a departed player from the speaking order.
///
/// The current speaker keeps the floor when someone earlier in the order
/// leaves. If the speaker themselves leaves, the next player inherits the
/// index, wrapping to the start of the order. Returns false if the player was
/// not in the order.
pub fn remove_from_order(room: &mut Room, player_id: &str) -> bool {
    let Some(pos) = room.turn_order.iter().position(|id| id == player_id) else {
        return false;
    };
    room.turn_order.remove(pos);
    if pos < room.current_turn_index {
        room.current_turn_index -= 1;
    }
    if room.current_turn_index >= room.turn_order.len() {
        room.current_turn_index = 0;
    }
    true
}
