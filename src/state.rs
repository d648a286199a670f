//! Application state: one signed-in user's session, the screen state holders built on
//! top of it, the mission flow, and the attempts currently in progress.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::flow::{MissionAttempt, MissionFlow};
use crate::gemini::Gemini;
use crate::image::ImageResolver;
use crate::repo::{AuthRepository, LeaderboardRepository, MissionsRepository, ProfileRepository, TrophyRepository};
use crate::screens::{
  auth::AuthScreen, history::QuestHistoryScreen, home::HomeScreen, leaderboard::LeaderboardScreen,
  missions::MissionsScreen, profile::{ProfileFormScreen, ProfileScreen}, trophies::TrophiesScreen,
};
use crate::session::{session_channel, SessionReader};
use crate::supabase::SupabaseClient;

pub type SharedAttempt = Arc<Mutex<MissionAttempt>>;

pub struct AppState {
  pub session: SessionReader,
  pub auth: AuthScreen,
  pub home: HomeScreen,
  /// Shared by the missions route and every attempt that awards points.
  pub missions: Mutex<MissionsScreen>,
  pub history: QuestHistoryScreen,
  pub trophies: TrophiesScreen,
  pub leaderboard: LeaderboardScreen,
  pub profile: ProfileScreen,
  pub profile_form: ProfileFormScreen,
  pub flow: MissionFlow,
  pub images: ImageResolver,
  attempts: RwLock<HashMap<Uuid, SharedAttempt>>,
}

impl AppState {
  /// Wire the clients, session channel and screens from config.
  #[instrument(level = "info", skip_all)]
  pub fn from_config(cfg: &AppConfig) -> Result<Self, reqwest::Error> {
    let backend = SupabaseClient::from_config(&cfg.backend)?;
    let vision = Gemini::from_config(&cfg.vision, ImageResolver::new(cfg.storage.content_root.clone()))?;
    let images = vision.resolver().clone();
    if vision.is_configured() {
      info!(target: "ecoquest", model = %cfg.vision.model, "Vision verification enabled");
    } else {
      info!(target: "ecoquest", "No GEMINI_API_KEY; photo evidence will fail verification");
    }

    let (writer, session) = session_channel(cfg.storage.session_path.clone());

    let missions = MissionsRepository::new(backend.clone(), session.clone());
    let trophies = TrophyRepository::new(backend.clone(), session.clone());
    let leaderboard = LeaderboardRepository::new(backend.clone(), session.clone());
    let profiles = ProfileRepository::new(backend.clone(), session.clone(), cfg.storage.profile_bucket.clone());

    Ok(Self {
      auth: AuthScreen::new(AuthRepository::new(backend, writer), profiles.clone()),
      home: HomeScreen::new(profiles.clone(), missions.clone(), trophies.clone(), leaderboard.clone()),
      missions: Mutex::new(MissionsScreen::new(missions.clone())),
      history: QuestHistoryScreen::new(missions),
      trophies: TrophiesScreen::new(trophies),
      leaderboard: LeaderboardScreen::new(leaderboard),
      profile: ProfileScreen::new(profiles.clone()),
      profile_form: ProfileFormScreen::new(profiles),
      flow: MissionFlow::new(vision, cfg.prompts.camera_verification.clone()),
      images,
      session,
      attempts: RwLock::new(HashMap::new()),
    })
  }

  #[instrument(level = "debug", skip(self, attempt), fields(id = %attempt.id))]
  pub async fn insert_attempt(&self, attempt: MissionAttempt) -> SharedAttempt {
    let id = attempt.id;
    let shared = Arc::new(Mutex::new(attempt));
    self.attempts.write().await.insert(id, shared.clone());
    shared
  }

  pub async fn attempt(&self, id: Uuid) -> Option<SharedAttempt> {
    self.attempts.read().await.get(&id).cloned()
  }

  /// Drop an attempt once it is finished; its last view has already been handed out.
  pub async fn retire_if_finished(&self, attempt: &MissionAttempt) {
    if attempt.is_finished() && self.attempts.write().await.remove(&attempt.id).is_some() {
      debug!(target: "mission", id = %attempt.id, "Finished attempt retired");
    }
  }

  /// Attempts belong to whoever was signed in when they started; drop them whenever
  /// the session changes hands.
  pub fn spawn_session_watch(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
    let state = Arc::clone(self);
    let mut rx = self.session.subscribe();
    tokio::spawn(async move {
      let mut current = rx.borrow_and_update().as_ref().map(|s| s.user_id.clone());
      while rx.changed().await.is_ok() {
        let next = rx.borrow_and_update().as_ref().map(|s| s.user_id.clone());
        if next != current {
          info!(target: "ecoquest", signed_in = next.is_some(), "Session changed");
          state.clear_attempts().await;
          current = next;
        }
      }
    })
  }

  async fn clear_attempts(&self) {
    let mut attempts = self.attempts.write().await;
    if !attempts.is_empty() {
      info!(target: "mission", dropped = attempts.len(), "Discarding attempts in progress");
    }
    attempts.clear();
  }
}
