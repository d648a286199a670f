//! Per-screen state holders.
//!
//! Each holder is built with the repositories it needs and owns its state outright.
//! Fields loaded independently carry their own error slot, so one failed request
//! leaves the rest of the screen intact instead of blanking it.

pub mod auth;
pub mod history;
pub mod home;
pub mod leaderboard;
pub mod missions;
pub mod profile;
pub mod trophies;

use crate::supabase::BackendError;

/// Split a load result into the value (if any) and a displayable error.
pub(crate) fn slot<T>(result: Result<T, BackendError>) -> (Option<T>, Option<String>) {
  match result {
    Ok(v) => (Some(v), None),
    Err(e) => (None, Some(e.to_string())),
  }
}
