use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::domain::{CompletedMission, Mission};
use crate::session::SessionReader;
use crate::supabase::{BackendError, SupabaseClient};

#[derive(Serialize)]
struct UserMission<'a> {
  user_id: &'a str,
  mission_id: i64,
}

#[derive(Clone)]
pub struct MissionsRepository {
  backend: SupabaseClient,
  session: SessionReader,
}

impl MissionsRepository {
  pub fn new(backend: SupabaseClient, session: SessionReader) -> Self {
    Self { backend, session }
  }

  #[instrument(target = "backend", level = "debug", skip(self))]
  pub async fn uncompleted(&self) -> Result<Vec<Mission>, BackendError> {
    let s = self.session.require()?;
    self.backend.rpc(&s, "get_uncompleted_missions", json!({ "p_user_id": s.user_id })).await
  }

  #[instrument(target = "backend", level = "debug", skip(self))]
  pub async fn completed(&self) -> Result<Vec<CompletedMission>, BackendError> {
    let s = self.session.require()?;
    self.backend.rpc(&s, "get_completed_missions", json!({ "p_user_id": s.user_id })).await
  }

  #[instrument(target = "backend", level = "debug", skip(self))]
  pub async fn history(&self) -> Result<Vec<CompletedMission>, BackendError> {
    let s = self.session.require()?;
    self.backend.rpc(&s, "get_my_mission_history", json!({})).await
  }

  /// Record one completion: the `user_missions` row, then the point award.
  /// Never retried; the backend rejects a second row for the same mission.
  #[instrument(target = "backend", level = "info", skip(self))]
  pub async fn record_completion(&self, mission_id: i64, points: i64) -> Result<(), BackendError> {
    let s = self.session.require()?;
    self.backend
      .insert(&s, "user_missions", &UserMission { user_id: &s.user_id, mission_id })
      .await?;
    self.backend
      .rpc_unit(&s, "add_points_to_profile", json!({ "input_user_id": s.user_id, "input_points": points }))
      .await?;
    info!(target: "mission", mission_id, points, "Completion recorded");
    Ok(())
  }
}
