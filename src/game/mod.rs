//! Pure game rules. Nothing in here touches the store; `state` feeds these
//! functions fresh reads and writes back what they decide.

pub mod assignment;
pub mod lifecycle;
pub mod quorum;
pub mod tally;
pub mod turns;
