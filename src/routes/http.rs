//! HTTP endpoint handlers. Thin wrappers over the screens and the mission flow;
//! each one is instrumented and logs what it did.

use std::sync::Arc;

use axum::{
  extract::{Path, Request, State},
  http::StatusCode,
  middleware::Next,
  response::{IntoResponse, Response},
  Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{LeaderboardPeriod, Profile};
use crate::error::ApiError;
use crate::flow::MissionAttempt;
use crate::protocol::*;
use crate::screens::{
  auth::LoginOutcome, history::HistoryDay, home::HomeSnapshot, leaderboard::LeaderboardSnapshot,
  missions::MissionsSnapshot, profile::{PictureUpdate, ProfileForm}, trophies::TrophiesSnapshot,
};
use crate::state::{AppState, SharedAttempt};

type ApiResult<T> = Result<T, ApiError>;

fn decode_base64(field: &str, data: &str) -> ApiResult<Vec<u8>> {
  STANDARD
    .decode(data.trim())
    .map_err(|e| ApiError::MalformedPayload(format!("{field}: {e}")))
}

/// Runs before every API handler so a restored or long-lived session does not go stale.
pub async fn refresh_session(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
  state.auth.keep_fresh().await;
  next.run(req).await
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut {
    ok: true,
    signed_in: state.session.is_signed_in(),
    vision_configured: state.flow.vision_configured(),
  })
}

//
// Auth
//

#[instrument(level = "info", skip(state, body), fields(email = %body.email))]
pub async fn http_signup(State(state): State<Arc<AppState>>, Json(body): Json<CredentialsIn>) -> ApiResult<StatusCode> {
  state.auth.sign_up(&body.email, &body.password).await?;
  info!(target: "ecoquest", "Account created");
  Ok(StatusCode::CREATED)
}

#[instrument(level = "info", skip(state, body), fields(email = %body.email))]
pub async fn http_login(State(state): State<Arc<AppState>>, Json(body): Json<CredentialsIn>) -> ApiResult<Json<LoginOutcome>> {
  let outcome = state.auth.login(&body.email, &body.password).await?;
  info!(target: "ecoquest", user_id = %outcome.user_id, profile_complete = outcome.profile_complete, "Signed in");
  Ok(Json(outcome))
}

#[instrument(level = "info", skip(state))]
pub async fn http_logout(State(state): State<Arc<AppState>>) -> StatusCode {
  state.auth.logout().await;
  StatusCode::NO_CONTENT
}

#[instrument(level = "debug", skip(state))]
pub async fn http_session(State(state): State<Arc<AppState>>) -> Json<SessionOut> {
  let current = state.session.current();
  Json(SessionOut {
    signed_in: current.is_some(),
    user_id: current.as_ref().map(|s| s.user_id.clone()),
    email: current.map(|s| s.email),
  })
}

//
// Screens
//

#[instrument(level = "info", skip(state))]
pub async fn http_home(State(state): State<Arc<AppState>>) -> ApiResult<Json<HomeSnapshot>> {
  state.session.require()?;
  Ok(Json(state.home.load().await))
}

#[instrument(level = "info", skip(state))]
pub async fn http_missions(State(state): State<Arc<AppState>>) -> ApiResult<Json<MissionsSnapshot>> {
  state.session.require()?;
  let mut board = state.missions.lock().await;
  board.load().await;
  debug!(target: "ecoquest", revision = board.revision(), "Missions served");
  Ok(Json(board.snapshot()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_history(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<HistoryDay>>> {
  let days = state.history.load().await?;
  info!(target: "ecoquest", days = days.len(), "Quest history served");
  Ok(Json(days))
}

#[instrument(level = "info", skip(state))]
pub async fn http_trophies(State(state): State<Arc<AppState>>) -> ApiResult<Json<TrophiesSnapshot>> {
  state.session.require()?;
  Ok(Json(state.trophies.load().await))
}

#[instrument(level = "info", skip(state))]
pub async fn http_leaderboard(
  State(state): State<Arc<AppState>>,
  Path(period): Path<LeaderboardPeriod>,
) -> ApiResult<Json<LeaderboardSnapshot>> {
  state.session.require()?;
  Ok(Json(state.leaderboard.load(period).await))
}

//
// Mission attempts
//

async fn find_attempt(state: &AppState, id: Uuid) -> ApiResult<SharedAttempt> {
  state.attempt(id).await.ok_or(ApiError::UnknownAttempt)
}

/// Start an attempt for one of the user's uncompleted missions. Missions that need
/// no evidence are verified and recorded right away.
#[instrument(level = "info", skip(state))]
pub async fn http_start_attempt(State(state): State<Arc<AppState>>, Path(mission_id): Path<i64>) -> ApiResult<Json<AttemptOut>> {
  state.session.require()?;
  let mission = {
    let mut board = state.missions.lock().await;
    if board.find(mission_id).is_none() {
      board.load().await;
    }
    board.find(mission_id).cloned()
  };
  let mission = mission.ok_or(ApiError::UnknownMission(mission_id))?;

  let mut attempt = MissionAttempt::begin(mission, state.flow.default_instruction(), &mut rand::thread_rng())?;
  {
    let mut board = state.missions.lock().await;
    state.flow.settle(&mut attempt, &mut board).await;
  }
  let out = attempt_out(&attempt);
  info!(target: "mission", attempt_id = %attempt.id, mission_id, requirement = out.requirement, "Attempt started");
  if !attempt.is_finished() {
    state.insert_attempt(attempt).await;
  }
  Ok(Json(out))
}

#[instrument(level = "debug", skip(state))]
pub async fn http_get_attempt(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<Json<AttemptOut>> {
  let shared = find_attempt(&state, id).await?;
  let attempt = shared.lock().await;
  Ok(Json(attempt_out(&attempt)))
}

fn discard_upload(state: &AppState, handle: &str) {
  if let Err(e) = state.images.discard(handle) {
    warn!(target: "mission", %handle, error = %e, "Could not remove uploaded evidence");
  }
}

/// Capture photo evidence, have it judged, and record the completion on success.
#[instrument(level = "info", skip(state, body), fields(uploaded = body.image_base64.is_some()))]
pub async fn http_post_evidence(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<EvidenceIn>,
) -> ApiResult<Json<AttemptOut>> {
  let shared = find_attempt(&state, id).await?;
  let mut attempt = shared.lock().await;

  let (image_ref, uploaded) = match (body.image_ref, body.image_base64) {
    (_, Some(data)) => {
      let bytes = decode_base64("imageBase64", &data)?;
      let ext = body.extension.as_deref().unwrap_or("jpg");
      (state.images.store_evidence(&bytes, ext)?, true)
    }
    (Some(r), None) if !r.trim().is_empty() => (r, false),
    _ => return Err(ApiError::MalformedPayload("imageRef or imageBase64 is required".into())),
  };

  if let Err(e) = attempt.capture_evidence(image_ref.clone()) {
    if uploaded {
      discard_upload(&state, &image_ref);
    }
    return Err(e.into());
  }
  let verified = state.flow.verify_evidence(&mut attempt).await;
  if uploaded {
    discard_upload(&state, &image_ref);
  }
  verified?;

  {
    let mut board = state.missions.lock().await;
    state.flow.settle(&mut attempt, &mut board).await;
  }
  let out = attempt_out(&attempt);
  state.retire_if_finished(&attempt).await;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AnswerIn>,
) -> ApiResult<Json<AttemptOut>> {
  let shared = find_attempt(&state, id).await?;
  let mut attempt = shared.lock().await;
  let correct = attempt.answer(&body.option)?;
  info!(target: "mission", attempt_id = %id, correct, "Quiz answered");
  {
    let mut board = state.missions.lock().await;
    state.flow.settle(&mut attempt, &mut board).await;
  }
  let out = attempt_out(&attempt);
  state.retire_if_finished(&attempt).await;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_retry(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<Json<AttemptOut>> {
  let shared = find_attempt(&state, id).await?;
  let mut attempt = shared.lock().await;
  attempt.retry(&mut rand::thread_rng())?;
  Ok(Json(attempt_out(&attempt)))
}

//
// Profile
//

#[instrument(level = "info", skip(state))]
pub async fn http_profile(State(state): State<Arc<AppState>>) -> ApiResult<Json<Profile>> {
  Ok(Json(state.profile.load().await?))
}

#[instrument(level = "info", skip(state, form), fields(username = %form.username))]
pub async fn http_complete_profile(State(state): State<Arc<AppState>>, Json(form): Json<ProfileForm>) -> ApiResult<StatusCode> {
  state.profile_form.complete(&form).await?;
  Ok(StatusCode::CREATED)
}

#[instrument(level = "info", skip(state, form), fields(username = %form.username))]
pub async fn http_update_profile(State(state): State<Arc<AppState>>, Json(form): Json<ProfileForm>) -> ApiResult<StatusCode> {
  state.profile_form.update(&form).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "debug", skip(state))]
pub async fn http_username(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> ApiResult<Json<AvailabilityOut>> {
  let available = state.profile_form.availability(&name).await?;
  Ok(Json(AvailabilityOut { username: name, available }))
}

#[instrument(level = "info", skip(state, body), fields(b64_len = body.image_base64.len()))]
pub async fn http_profile_picture(State(state): State<Arc<AppState>>, Json(body): Json<PictureIn>) -> ApiResult<Json<PictureUpdate>> {
  let bytes = decode_base64("imageBase64", &body.image_base64)?;
  Ok(Json(state.profile.change_picture(bytes).await?))
}
