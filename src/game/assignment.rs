//! Theme and impostor selection with anti-repetition weighting.
//!
//! Both choices look at the last [`HISTORY_WINDOW`] rounds of the room:
//! themes used there are skipped while unused ones remain, and the impostor
//! is drawn from the players picked least often, never the previous impostor
//! while someone else is tied with them.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use std::collections::{HashMap, HashSet};

use crate::types::{PlayerId, RoundHistoryEntry, Theme, ThemeId};

/// How many past rounds influence the next assignment
pub const HISTORY_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub theme_id: ThemeId,
    pub impostor_player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignmentError {
    #[error("no themes available")]
    NoThemes,
    #[error("no players to choose an impostor from")]
    NoPlayers,
}

/// Pick this game's theme and impostor.
///
/// `history` must be ordered newest first; only the first
/// [`HISTORY_WINDOW`] entries are considered.
pub fn assign<R: Rng + ?Sized>(
    themes: &[Theme],
    players: &[PlayerId],
    history: &[RoundHistoryEntry],
    rng: &mut R,
) -> Result<Assignment, AssignmentError> {
    let window = &history[..history.len().min(HISTORY_WINDOW)];
    let theme_id = pick_theme(themes, window, rng)?;
    let impostor_player_id = pick_impostor(players, window, rng)?;
    Ok(Assignment {
        theme_id,
        impostor_player_id,
    })
}

/// Uniform pick among active themes not used in the window, falling back to
/// every active theme once they have all been used recently.
pub fn pick_theme<R: Rng + ?Sized>(
    themes: &[Theme],
    window: &[RoundHistoryEntry],
    rng: &mut R,
) -> Result<ThemeId, AssignmentError> {
    let active: Vec<&Theme> = themes.iter().filter(|t| t.active).collect();
    if active.is_empty() {
        return Err(AssignmentError::NoThemes);
    }

    let recent: HashSet<&str> = window.iter().map(|h| h.theme_id.as_str()).collect();
    let fresh: Vec<&Theme> = active
        .iter()
        .copied()
        .filter(|t| !recent.contains(t.id.as_str()))
        .collect();
    let pool = if fresh.is_empty() { active } else { fresh };

    pool.choose(rng)
        .map(|t| t.id.clone())
        .ok_or(AssignmentError::NoThemes)
}

/// Players tied for the fewest impostor turns in the window.
///
/// The previous impostor is removed from the pool unless they are the only
/// candidate left.
pub fn impostor_pool(players: &[PlayerId], window: &[RoundHistoryEntry]) -> Vec<PlayerId> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entry in window {
        *counts.entry(entry.impostor_player_id.as_str()).or_insert(0) += 1;
    }

    let count_of = |id: &PlayerId| counts.get(id.as_str()).copied().unwrap_or(0);
    let min_count = match players.iter().map(count_of).min() {
        Some(min) => min,
        None => return Vec::new(),
    };

    let least_chosen: Vec<PlayerId> = players
        .iter()
        .filter(|p| count_of(p) == min_count)
        .cloned()
        .collect();

    let last_impostor = window.first().map(|h| &h.impostor_player_id);
    match last_impostor {
        Some(last) if least_chosen.len() > 1 => least_chosen
            .into_iter()
            .filter(|p| p != last)
            .collect(),
        _ => least_chosen,
    }
}

pub fn pick_impostor<R: Rng + ?Sized>(
    players: &[PlayerId],
    window: &[RoundHistoryEntry],
    rng: &mut R,
) -> Result<PlayerId, AssignmentError> {
    impostor_pool(players, window)
        .choose(rng)
        .cloned()
        .ok_or(AssignmentError::NoPlayers)
}

/// Uniformly shuffled speaking order
pub fn shuffled_turn_order<R: Rng + ?Sized>(players: &[PlayerId], rng: &mut R) -> Vec<PlayerId> {
    let mut order = players.to_vec();
    order.shuffle(rng);
    order
}
