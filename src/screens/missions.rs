use serde::Serialize;
use tracing::{error, instrument};

use crate::domain::{CompletedMission, Mission};
use crate::repo::MissionsRepository;

use super::slot;

#[derive(Clone, Debug, Default, Serialize)]
pub struct MissionsSnapshot {
  pub uncompleted: Vec<Mission>,
  pub uncompleted_error: Option<String>,
  pub completed: Vec<CompletedMission>,
  pub completed_error: Option<String>,
  pub completion_error: Option<String>,
  pub revision: u64,
}

/// Uncompleted/completed mission lists, refreshed after every completion.
pub struct MissionsScreen {
  repo: MissionsRepository,
  state: MissionsSnapshot,
}

impl MissionsScreen {
  pub fn new(repo: MissionsRepository) -> Self {
    Self { repo, state: MissionsSnapshot::default() }
  }

  #[instrument(target = "mission", level = "debug", skip(self))]
  pub async fn load(&mut self) {
    let (uncompleted, completed) = tokio::join!(self.repo.uncompleted(), self.repo.completed());
    let (u, u_err) = slot(uncompleted);
    let (c, c_err) = slot(completed);
    if let Some(u) = u { self.state.uncompleted = u; }
    if let Some(c) = c { self.state.completed = c; }
    self.state.uncompleted_error = u_err;
    self.state.completed_error = c_err;
  }

  /// Record a completion, then refresh both lists whatever the outcome.
  /// Returns whether the completion was recorded.
  #[instrument(target = "mission", level = "info", skip(self))]
  pub async fn complete_mission(&mut self, mission_id: i64, points: i64) -> bool {
    let recorded = match self.repo.record_completion(mission_id, points).await {
      Ok(()) => {
        self.state.completion_error = None;
        true
      }
      Err(e) => {
        error!(target: "mission", mission_id, error = %e, "Recording completion failed");
        self.state.completion_error = Some(e.to_string());
        false
      }
    };
    self.load().await;
    self.state.revision += 1;
    recorded
  }

  pub fn find(&self, mission_id: i64) -> Option<&Mission> {
    self.state.uncompleted.iter().find(|m| m.id == mission_id)
  }

  pub fn snapshot(&self) -> MissionsSnapshot {
    self.state.clone()
  }

  pub fn revision(&self) -> u64 {
    self.state.revision
  }

  pub fn error(&self) -> Option<&str> {
    self.state.completion_error.as_deref()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::session::session_channel;
  use crate::supabase::tests::{client_for, session};
  use serde_json::json;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[tokio::test]
  async fn one_failed_list_keeps_the_other() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/rest/v1/rpc/get_uncompleted_missions"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
        "mission_id": 3, "title": "Take the bus", "points": 15, "type": "daily", "camera": false
      }])))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/rest/v1/rpc/get_completed_missions"))
      .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
      .mount(&server)
      .await;

    let (writer, reader) = session_channel(None);
    writer.sign_in(session());
    let mut screen = MissionsScreen::new(MissionsRepository::new(client_for(&server), reader));
    screen.load().await;

    let snap = screen.snapshot();
    assert_eq!(snap.uncompleted.len(), 1);
    assert!(screen.find(3).is_some());
    assert!(snap.uncompleted_error.is_none());
    assert_eq!(snap.completed_error.as_deref(), Some("backend returned 500: boom"));
  }

  #[tokio::test]
  async fn signed_out_load_reports_errors_without_network() {
    let server = MockServer::start().await;
    let (_writer, reader) = session_channel(None);
    let mut screen = MissionsScreen::new(MissionsRepository::new(client_for(&server), reader));
    screen.load().await;
    assert_eq!(screen.snapshot().uncompleted_error.as_deref(), Some("not signed in"));
    assert!(server.received_requests().await.unwrap().is_empty());
  }
}
