//! Application layer for the yoga practice tracker: a session that ties the
//! profile store, health source and local store together and publishes an
//! observable [`PracticeState`].

pub mod digest;
pub mod error;
pub mod session;
pub mod state;

#[cfg(test)]
mod test_utils;

pub use digest::{Digest, build_digest};
pub use error::{AppError, AppResult};
pub use session::{PracticeSession, SessionSettings};
pub use state::{MetricStat, PracticeState, StateStore};
