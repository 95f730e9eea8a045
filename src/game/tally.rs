//! Ballot counting.

use std::collections::HashMap;

use crate::types::{Player, PlayerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    /// Votes per candidate; candidates nobody voted for are absent
    pub votes: HashMap<PlayerId, u32>,
    pub most_voted_id: Option<PlayerId>,
    pub impostor_caught: bool,
}

/// Count every cast ballot and check whether the impostor was caught.
///
/// Ties go to the candidate who joined the room first. Candidates who have
/// since left come after everyone still present, ordered by id. A candidate
/// needs a strictly higher count to take the lead, so zero ballots means no
/// most-voted player and the impostor escapes.
pub fn tally(players: &[Player], impostor_id: &str) -> Tally {
    let mut votes: HashMap<PlayerId, u32> = HashMap::new();
    for target in players.iter().filter_map(|p| p.voted_for.as_ref()) {
        *votes.entry(target.clone()).or_insert(0) += 1;
    }

    let mut departed: Vec<&PlayerId> = votes
        .keys()
        .filter(|id| !players.iter().any(|p| &p.id == *id))
        .collect();
    departed.sort();

    let candidates = players.iter().map(|p| &p.id).chain(departed);

    let mut most_voted_id: Option<PlayerId> = None;
    let mut max_votes = 0;
    for candidate in candidates {
        let count = votes.get(candidate).copied().unwrap_or(0);
        if count > max_votes {
            max_votes = count;
            most_voted_id = Some(candidate.clone());
        }
    }

    let impostor_caught = most_voted_id.as_deref() == Some(impostor_id);
    Tally {
        votes,
        most_voted_id,
        impostor_caught,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn roster(votes: &[(&str, Option<&str>)]) -> Vec<Player> {
        let start = Utc::now();
        votes
            .iter()
            .enumerate()
            .map(|(i, (id, voted_for))| Player {
                id: id.to_string(),
                room_id: "room".to_string(),
                name: id.to_string(),
                is_host: i == 0,
                has_seen_card: true,
                voted_for: voted_for.map(str::to_string),
                joined_at: start + Duration::seconds(i as i64),
            })
            .collect()
    }

    #[test]
    fn test_majority_catches_impostor() {
        let players = roster(&[("A", Some("C")), ("B", Some("C")), ("C", None), ("D", Some("A"))]);
        let result = tally(&players, "C");

        assert_eq!(result.votes.len(), 2);
        assert_eq!(result.votes.get("C"), Some(&2));
        assert_eq!(result.votes.get("A"), Some(&1));
        assert_eq!(result.most_voted_id.as_deref(), Some("C"));
        assert!(result.impostor_caught);
    }

    #[test]
    fn test_majority_on_wrong_player() {
        let players = roster(&[("A", Some("C")), ("B", Some("C")), ("C", None), ("D", Some("A"))]);
        let result = tally(&players, "D");
        assert!(!result.impostor_caught);
    }

    #[test]
    fn test_no_votes() {
        let players = roster(&[("A", None), ("B", None), ("C", None)]);
        let result = tally(&players, "A");

        assert!(result.votes.is_empty());
        assert_eq!(result.most_voted_id, None);
        assert!(!result.impostor_caught);
    }

    #[test]
    fn test_tie_goes_to_earliest_joined() {
        // Everyone has one vote; A joined first
        let players = roster(&[("A", Some("C")), ("B", Some("A")), ("C", Some("B"))]);
        let result = tally(&players, "B");
        assert_eq!(result.most_voted_id.as_deref(), Some("A"));

        let players = roster(&[("A", Some("C")), ("B", Some("C")), ("C", Some("B")), ("D", Some("B"))]);
        let result = tally(&players, "B");
        assert_eq!(result.most_voted_id.as_deref(), Some("B"));
        assert!(result.impostor_caught);
    }

    #[test]
    fn test_departed_candidate_still_counts() {
        let players = roster(&[("A", Some("Z")), ("B", Some("Z")), ("C", Some("A"))]);
        let result = tally(&players, "Z");
        assert_eq!(result.most_voted_id.as_deref(), Some("Z"));
        assert!(result.impostor_caught);
    }
}
