//! Unanimous-consent rule for early-vote requests.

use crate::types::{VoteRequestStatus, VoteResponse};

/// Approvals needed: everybody except the requester
pub fn required_approvals(player_count: usize) -> usize {
    player_count.saturating_sub(1)
}

/// Decide a request from the full set of responses collected so far.
///
/// A single denial settles the request immediately. Otherwise it stays
/// pending until every other player has approved. Players who have not
/// answered are simply undecided.
pub fn evaluate(responses: &[VoteResponse], player_count: usize) -> VoteRequestStatus {
    if responses.iter().any(|r| !r.approved) {
        return VoteRequestStatus::Denied;
    }
    if responses.len() >= required_approvals(player_count) {
        VoteRequestStatus::Approved
    } else {
        VoteRequestStatus::Pending
    }
}
