use serde::Serialize;
use tracing::instrument;

use crate::domain::{AchievedTrophy, LeaderboardEntry, LeaderboardPeriod, Mission, Profile};
use crate::repo::{LeaderboardRepository, MissionsRepository, ProfileRepository, TrophyRepository};

use super::slot;

/// How many recently earned trophies the home screen shows.
const RECENT_TROPHIES: usize = 3;

#[derive(Clone, Debug, Serialize)]
pub struct PeriodStanding {
  pub period: LeaderboardPeriod,
  pub entry: Option<LeaderboardEntry>,
  pub error: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct HomeSnapshot {
  pub profile: Option<Profile>,
  pub profile_error: Option<String>,
  pub active_missions: Vec<Mission>,
  pub missions_error: Option<String>,
  pub recent_trophies: Vec<AchievedTrophy>,
  pub trophies_error: Option<String>,
  pub standings: Vec<PeriodStanding>,
}

pub struct HomeScreen {
  profiles: ProfileRepository,
  missions: MissionsRepository,
  trophies: TrophyRepository,
  leaderboard: LeaderboardRepository,
}

impl HomeScreen {
  pub fn new(
    profiles: ProfileRepository,
    missions: MissionsRepository,
    trophies: TrophyRepository,
    leaderboard: LeaderboardRepository,
  ) -> Self {
    Self { profiles, missions, trophies, leaderboard }
  }

  /// Fire every home-screen request at once and join them here.
  #[instrument(target = "ecoquest", level = "info", skip(self))]
  pub async fn load(&self) -> HomeSnapshot {
    let (profile, missions, trophies, daily, weekly, monthly) = tokio::join!(
      self.profiles.profile(),
      self.missions.uncompleted(),
      self.trophies.achieved(),
      self.leaderboard.surrounding_users(LeaderboardPeriod::Daily),
      self.leaderboard.surrounding_users(LeaderboardPeriod::Weekly),
      self.leaderboard.surrounding_users(LeaderboardPeriod::Monthly),
    );

    let (profile, profile_error) = slot(profile);
    let (missions, missions_error) = slot(missions);
    let (trophies, trophies_error) = slot(trophies);
    let username = profile.as_ref().map(|p| p.username.as_str());

    let standings = LeaderboardPeriod::ALL
      .into_iter()
      .zip([daily, weekly, monthly])
      .map(|(period, result)| {
        let (entries, error) = slot(result);
        let entry = entries
          .zip(username)
          .and_then(|(entries, me)| entries.into_iter().find(|e| e.username == me));
        PeriodStanding { period, entry, error }
      })
      .collect();

    HomeSnapshot {
      active_missions: missions.unwrap_or_default(),
      missions_error,
      recent_trophies: trophies.unwrap_or_default().into_iter().take(RECENT_TROPHIES).collect(),
      trophies_error,
      standings,
      profile_error,
      profile,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::session::session_channel;
  use crate::supabase::tests::{client_for, session};
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn trophy(id: i64) -> serde_json::Value {
    json!({ "trophy_id": id, "name": format!("T{id}"), "description": "d", "earned_at": "2024-03-01T00:00:00Z" })
  }

  #[tokio::test]
  async fn partial_failures_stay_in_their_own_slot() {
    let server = MockServer::start().await;
    let uid = session().user_id;
    Mock::given(method("GET"))
      .and(path("/rest/v1/profiles"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "user_id": uid, "username": "ada", "points": 120 }])))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/rest/v1/rpc/get_uncompleted_missions"))
      .respond_with(ResponseTemplate::new(503))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/rest/v1/rpc/get_achieved_trophies"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([trophy(1), trophy(2), trophy(3), trophy(4)])))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/rest/v1/rpc/get_surrounding_users"))
      .and(body_partial_json(json!({ "p_period": "weekly" })))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/rest/v1/rpc/get_surrounding_users"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        { "username": "bo", "points": 130, "rank": 1 },
        { "username": "ada", "points": 120, "rank": 2 }
      ])))
      .mount(&server)
      .await;

    let (writer, reader) = session_channel(None);
    writer.sign_in(session());
    let backend = client_for(&server);
    let home = HomeScreen::new(
      ProfileRepository::new(backend.clone(), reader.clone(), "profile_picture"),
      MissionsRepository::new(backend.clone(), reader.clone()),
      TrophyRepository::new(backend.clone(), reader.clone()),
      LeaderboardRepository::new(backend, reader),
    );
    let snap = home.load().await;

    assert_eq!(snap.profile.as_ref().map(|p| p.points), Some(120));
    assert!(snap.active_missions.is_empty());
    assert!(snap.missions_error.is_some());
    assert_eq!(snap.recent_trophies.len(), 3);
    assert_eq!(snap.standings.len(), 3);
    assert_eq!(snap.standings[0].entry.as_ref().map(|e| e.rank), Some(2));
    assert!(snap.standings[1].entry.is_none());
    assert!(snap.standings[1].error.is_some());
    assert_eq!(snap.standings[2].period, LeaderboardPeriod::Monthly);
  }
}
