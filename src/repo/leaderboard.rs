use serde_json::json;
use tracing::instrument;

use crate::domain::{LeaderboardEntry, LeaderboardPeriod};
use crate::session::SessionReader;
use crate::supabase::{BackendError, SupabaseClient};

#[derive(Clone)]
pub struct LeaderboardRepository {
  backend: SupabaseClient,
  session: SessionReader,
}

impl LeaderboardRepository {
  pub fn new(backend: SupabaseClient, session: SessionReader) -> Self {
    Self { backend, session }
  }

  /// Top five for the period.
  #[instrument(target = "backend", level = "debug", skip(self))]
  pub async fn top_users(&self, period: LeaderboardPeriod) -> Result<Vec<LeaderboardEntry>, BackendError> {
    let s = self.session.require()?;
    self.backend.rpc(&s, "get_top_users", json!({ "input_period": period.as_str() })).await
  }

  /// The signed-in user plus two neighbours above and below.
  #[instrument(target = "backend", level = "debug", skip(self))]
  pub async fn surrounding_users(&self, period: LeaderboardPeriod) -> Result<Vec<LeaderboardEntry>, BackendError> {
    let s = self.session.require()?;
    self.backend
      .rpc(&s, "get_surrounding_users", json!({ "p_user_id": s.user_id, "p_period": period.as_str() }))
      .await
  }
}
