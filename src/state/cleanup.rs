use super::AppState;
use crate::error::{GameError, GameResult};
use chrono::{DateTime, Duration, Utc};

/// What a retention sweep did
#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    /// Dry run: the token checked out, nothing was deleted
    Verified,
    Removed {
        rooms: usize,
        cutoff: DateTime<Utc>,
    },
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

impl AppState {
    /// Delete rooms (and everything in them) created more than `days` ago.
    ///
    /// Operator-only: requires the configured cleanup token. A missing or
    /// non-positive `days` falls back to the configured retention window.
    pub async fn sweep_expired_rooms(
        &self,
        token: &str,
        days: Option<i64>,
        dry_run: bool,
    ) -> GameResult<SweepOutcome> {
        let Some(expected) = self.config.cleanup_token.as_deref() else {
            tracing::warn!("Retention sweep requested but ADMIN_CLEANUP_TOKEN is not set");
            return Err(GameError::NotConfigured("ADMIN_CLEANUP_TOKEN"));
        };
        if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
            tracing::warn!("Retention sweep rejected: bad token");
            return Err(GameError::Unauthorized);
        }
        if dry_run {
            return Ok(SweepOutcome::Verified);
        }

        let days = days
            .filter(|d| *d > 0)
            .unwrap_or(i64::from(self.config.default_retention_days));
        let cutoff = Utc::now() - Duration::days(days);
        let rooms = self.store.delete_rooms_created_before(cutoff).await?;

        tracing::info!("Retention sweep removed {} rooms created before {}", rooms, cutoff);
        Ok(SweepOutcome::Removed { rooms, cutoff })
    }
}
