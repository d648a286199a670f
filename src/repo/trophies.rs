use serde_json::json;
use tracing::instrument;

use crate::domain::{AchievedTrophy, Trophy};
use crate::session::SessionReader;
use crate::supabase::{BackendError, SupabaseClient};

#[derive(Clone)]
pub struct TrophyRepository {
  backend: SupabaseClient,
  session: SessionReader,
}

impl TrophyRepository {
  pub fn new(backend: SupabaseClient, session: SessionReader) -> Self {
    Self { backend, session }
  }

  /// Most recent first, as ordered by the backend.
  #[instrument(target = "backend", level = "debug", skip(self))]
  pub async fn achieved(&self) -> Result<Vec<AchievedTrophy>, BackendError> {
    let s = self.session.require()?;
    self.backend.rpc(&s, "get_achieved_trophies", json!({ "p_user_id": s.user_id })).await
  }

  #[instrument(target = "backend", level = "debug", skip(self))]
  pub async fn not_received(&self) -> Result<Vec<Trophy>, BackendError> {
    let s = self.session.require()?;
    self.backend.rpc(&s, "get_not_received_trophies", json!({ "p_user_id": s.user_id })).await
  }
}
