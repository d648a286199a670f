//! Mission-completion flow.
//!
//! A `MissionAttempt` is a small synchronous state machine:
//!
//! ```text
//! NotStarted ──capture──▶ EvidenceCaptured ──▶ Verifying ──▶ Verified(success | failure)
//!     ▲                                                              │
//!     └───────────────────────────── retry (failure only) ───────────┘
//! ```
//!
//! Dispatch happens when the attempt begins: camera missions need a photo, missions with a
//! prompt are quizzes, everything else is verified on the spot. `MissionFlow` performs the
//! IO around it (vision call, completion recording) and guarantees the completion is
//! recorded at most once per attempt.

use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Mission, VerificationOutcome};
use crate::gemini::{is_failure_text, Gemini};
use crate::quiz::{QuizBank, QuizError, QuizOptions};
use crate::screens::missions::MissionsScreen;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
  #[error("cannot {action} while the attempt is {state}")]
  InvalidTransition { state: &'static str, action: &'static str },
  #[error("this mission is not verified by {0}")]
  WrongRequirement(&'static str),
  #[error(transparent)]
  Quiz(#[from] QuizError),
}

/// What a mission needs before it counts as verified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
  Photo { instruction: String },
  Quiz(QuizBank),
  Nothing,
}

impl Requirement {
  /// Checked in order: camera flag, then prompt text, then nothing.
  pub fn for_mission(mission: &Mission, default_instruction: &str) -> Result<Self, QuizError> {
    if mission.camera {
      let instruction = mission.prompt().unwrap_or(default_instruction).to_string();
      return Ok(Self::Photo { instruction });
    }
    match mission.prompt() {
      Some(prompt) => Ok(Self::Quiz(QuizBank::parse(prompt)?)),
      None => Ok(Self::Nothing),
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Self::Photo { .. } => "photo",
      Self::Quiz(_) => "quiz",
      Self::Nothing => "none",
    }
  }
}

/// Loose judgment of a vision answer: "yes" or "success", any case.
/// The vision client's own failure strings never pass, whatever body they embed.
pub fn judge_verification(text: &str) -> bool {
  if is_failure_text(text) {
    return false;
  }
  let lower = text.to_lowercase();
  lower.contains("yes") || lower.contains("success")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AttemptState {
  NotStarted,
  EvidenceCaptured { image_ref: String },
  Verifying,
  Verified { success: bool },
}

impl AttemptState {
  fn name(&self) -> &'static str {
    match self {
      Self::NotStarted => "not started",
      Self::EvidenceCaptured { .. } => "holding evidence",
      Self::Verifying => "verifying",
      Self::Verified { success: true } => "verified",
      Self::Verified { success: false } => "failed",
    }
  }
}

#[derive(Debug)]
pub struct MissionAttempt {
  pub id: Uuid,
  pub mission: Mission,
  requirement: Requirement,
  state: AttemptState,
  quiz: Option<QuizOptions>,
  outcome: Option<VerificationOutcome>,
  /// `None` until the award was attempted; then whether it was recorded.
  recorded: Option<bool>,
}

impl MissionAttempt {
  /// Select a mission and dispatch on what it requires.
  pub fn begin<R: Rng + ?Sized>(mission: Mission, default_instruction: &str, rng: &mut R) -> Result<Self, FlowError> {
    let requirement = Requirement::for_mission(&mission, default_instruction)?;
    let quiz = match &requirement {
      Requirement::Quiz(bank) => Some(bank.draw(rng)),
      _ => None,
    };
    let state = match requirement {
      Requirement::Nothing => AttemptState::Verified { success: true },
      _ => AttemptState::NotStarted,
    };
    Ok(Self { id: Uuid::new_v4(), mission, requirement, state, quiz, outcome: None, recorded: None })
  }

  pub fn requirement(&self) -> &Requirement {
    &self.requirement
  }

  pub fn state(&self) -> &AttemptState {
    &self.state
  }

  pub fn quiz(&self) -> Option<&QuizOptions> {
    self.quiz.as_ref()
  }

  pub fn outcome(&self) -> Option<&VerificationOutcome> {
    self.outcome.as_ref()
  }

  pub fn recorded(&self) -> Option<bool> {
    self.recorded
  }

  fn invalid(&self, action: &'static str) -> FlowError {
    FlowError::InvalidTransition { state: self.state.name(), action }
  }

  pub fn capture_evidence(&mut self, image_ref: impl Into<String>) -> Result<(), FlowError> {
    if !matches!(self.requirement, Requirement::Photo { .. }) {
      return Err(FlowError::WrongRequirement("photo"));
    }
    if self.state != AttemptState::NotStarted {
      return Err(self.invalid("capture evidence"));
    }
    self.state = AttemptState::EvidenceCaptured { image_ref: image_ref.into() };
    Ok(())
  }

  /// Pick a quiz option. Returns whether it was the correct one.
  pub fn answer(&mut self, choice: &str) -> Result<bool, FlowError> {
    let Requirement::Quiz(bank) = &self.requirement else {
      return Err(FlowError::WrongRequirement("quiz"));
    };
    if self.state != AttemptState::NotStarted {
      return Err(self.invalid("answer"));
    }
    let success = bank.is_correct(choice);
    self.state = AttemptState::Verified { success };
    Ok(success)
  }

  /// Go back to `NotStarted` after a failed verification. Quizzes get a fresh draw.
  pub fn retry<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), FlowError> {
    if self.state != (AttemptState::Verified { success: false }) {
      return Err(self.invalid("retry"));
    }
    if let Requirement::Quiz(bank) = &self.requirement {
      self.quiz = Some(bank.draw(rng));
    }
    self.state = AttemptState::NotStarted;
    self.outcome = None;
    Ok(())
  }

  fn begin_verifying(&mut self) -> Result<(String, String), FlowError> {
    let Requirement::Photo { instruction } = &self.requirement else {
      return Err(FlowError::WrongRequirement("photo"));
    };
    let AttemptState::EvidenceCaptured { image_ref } = &self.state else {
      return Err(self.invalid("verify"));
    };
    let job = (image_ref.clone(), instruction.clone());
    self.state = AttemptState::Verifying;
    Ok(job)
  }

  fn finish_verifying(&mut self, response: String) -> VerificationOutcome {
    let outcome = VerificationOutcome { success: judge_verification(&response), response };
    self.state = AttemptState::Verified { success: outcome.success };
    self.outcome = Some(outcome.clone());
    outcome
  }

  /// Verified and settled: nothing more can happen to this attempt.
  pub fn is_finished(&self) -> bool {
    self.state == (AttemptState::Verified { success: true }) && self.recorded.is_some()
  }

  fn award_due(&self) -> bool {
    self.state == (AttemptState::Verified { success: true }) && self.recorded.is_none()
  }
}

/// IO around attempts: the vision call and the one-time completion recording.
#[derive(Clone)]
pub struct MissionFlow {
  vision: Gemini,
  default_instruction: String,
}

impl MissionFlow {
  pub fn new(vision: Gemini, default_instruction: impl Into<String>) -> Self {
    Self { vision, default_instruction: default_instruction.into() }
  }

  pub fn default_instruction(&self) -> &str {
    &self.default_instruction
  }

  pub fn vision_configured(&self) -> bool {
    self.vision.is_configured()
  }

  /// Send captured evidence to the vision model and judge the answer.
  #[instrument(target = "mission", level = "info", skip(self, attempt), fields(attempt_id = %attempt.id, mission_id = attempt.mission.id))]
  pub async fn verify_evidence(&self, attempt: &mut MissionAttempt) -> Result<VerificationOutcome, FlowError> {
    let (image_ref, instruction) = attempt.begin_verifying()?;
    let response = self.vision.analyze(&image_ref, &instruction).await;
    let outcome = attempt.finish_verifying(response);
    info!(target: "mission", success = outcome.success, "Photo evidence judged");
    Ok(outcome)
  }

  /// Record the completion if the attempt just succeeded. At most once per attempt, no retry.
  /// Returns `None` when nothing was due, otherwise whether recording worked.
  #[instrument(target = "mission", level = "info", skip(self, attempt, board), fields(attempt_id = %attempt.id, mission_id = attempt.mission.id))]
  pub async fn settle(&self, attempt: &mut MissionAttempt, board: &mut MissionsScreen) -> Option<bool> {
    if !attempt.award_due() {
      return None;
    }
    attempt.recorded = Some(false);
    let recorded = board.complete_mission(attempt.mission.id, attempt.mission.points).await;
    if !recorded {
      warn!(target: "mission", error = board.error().unwrap_or_default(), "Completion was verified but could not be recorded");
    }
    attempt.recorded = Some(recorded);
    Some(recorded)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::VisionConfig;
  use crate::domain::MissionCategory;
  use crate::image::ImageResolver;
  use crate::repo::MissionsRepository;
  use crate::session::session_channel;
  use crate::supabase::tests::{client_for, session};
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use serde_json::json;
  use wiremock::matchers::{method, path, path_regex};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn mission(camera: bool, prompt: Option<&str>) -> Mission {
    Mission {
      id: 12,
      title: "Sort the recycling".into(),
      description: Some("Which bin takes glass?".into()),
      points: 30,
      category: MissionCategory::Daily,
      mission_pic: None,
      mission_prompt: prompt.map(str::to_string),
      camera,
    }
  }

  fn rng() -> StdRng {
    StdRng::seed_from_u64(99)
  }

  #[test]
  fn judgment_matches_yes_or_success_only() {
    assert!(judge_verification("Yes, that is a reusable bottle."));
    assert!(judge_verification("SUCCESS"));
    assert!(judge_verification("the eyes are visible"));
    assert!(!judge_verification("No, this is a plastic bag."));
    assert!(!judge_verification("API Error: 500 - internal"));
    assert!(!judge_verification("Error analyzing image: timed out"));
    assert!(!judge_verification("Could not access image file"));
    assert!(!judge_verification(""));
    assert!(!judge_verification("API Error: 500 - {\"success\":false}"));
    assert!(!judge_verification("Error analyzing image: yes, the request timed out"));
  }

  #[test]
  fn dispatch_order_is_camera_then_prompt_then_nothing() {
    let photo = MissionAttempt::begin(mission(true, Some("Is there a bike?")), "default", &mut rng()).unwrap();
    assert_eq!(photo.requirement(), &Requirement::Photo { instruction: "Is there a bike?".into() });
    assert_eq!(photo.state(), &AttemptState::NotStarted);

    let photo_default = MissionAttempt::begin(mission(true, None), "default", &mut rng()).unwrap();
    assert_eq!(photo_default.requirement(), &Requirement::Photo { instruction: "default".into() });

    let quiz = MissionAttempt::begin(mission(false, Some("Green\nBlue\nYellow\nGrey")), "d", &mut rng()).unwrap();
    assert_eq!(quiz.requirement().kind(), "quiz");
    assert_eq!(quiz.quiz().unwrap().options.len(), 4);

    let trivial = MissionAttempt::begin(mission(false, Some("   ")), "d", &mut rng()).unwrap();
    assert_eq!(trivial.state(), &AttemptState::Verified { success: true });
  }

  #[test]
  fn quiz_without_distractors_refuses_to_start() {
    let err = MissionAttempt::begin(mission(false, Some("Green")), "d", &mut rng()).unwrap_err();
    assert_eq!(err, FlowError::Quiz(QuizError::NoDistractors));
  }

  #[test]
  fn quiz_answers_and_retry() {
    let mut a = MissionAttempt::begin(mission(false, Some("Green\nBlue\nYellow\nGrey")), "d", &mut rng()).unwrap();
    assert_eq!(a.capture_evidence("x.jpg"), Err(FlowError::WrongRequirement("photo")));
    assert_eq!(a.retry(&mut rng()).unwrap_err().to_string(), "cannot retry while the attempt is not started");

    assert!(!a.answer("Blue").unwrap());
    assert_eq!(a.state(), &AttemptState::Verified { success: false });
    assert!(a.answer("Green").is_err());

    a.retry(&mut rng()).unwrap();
    assert_eq!(a.state(), &AttemptState::NotStarted);
    assert!(a.answer("Green").unwrap());
    assert!(a.retry(&mut rng()).is_err(), "successful attempts are terminal");
  }

  #[test]
  fn photo_attempt_rejects_out_of_order_steps() {
    let mut a = MissionAttempt::begin(mission(true, None), "d", &mut rng()).unwrap();
    assert_eq!(a.answer("anything"), Err(FlowError::WrongRequirement("quiz")));
    assert!(a.begin_verifying().is_err());
    a.capture_evidence("/tmp/a.jpg").unwrap();
    assert!(a.capture_evidence("/tmp/b.jpg").is_err());
  }

  struct Harness {
    backend: MockServer,
    vision: MockServer,
    flow: MissionFlow,
    board: MissionsScreen,
    dir: tempfile::TempDir,
  }

  async fn harness() -> Harness {
    let backend = MockServer::start().await;
    let vision = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = VisionConfig {
      api_key: Some("k".into()),
      base_url: format!("{}/models", vision.uri()),
      ..VisionConfig::default()
    };
    let gemini = Gemini::from_config(&cfg, ImageResolver::new(dir.path())).unwrap();
    let (writer, reader) = session_channel(None);
    writer.sign_in(session());
    let board = MissionsScreen::new(MissionsRepository::new(client_for(&backend), reader));
    // List refreshes after a completion.
    Mock::given(method("POST"))
      .and(path_regex(r"^/rest/v1/rpc/get_(un)?completed_missions$"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .mount(&backend)
      .await;
    Harness { backend, vision, flow: MissionFlow::new(gemini, "default"), board, dir }
  }

  async fn expect_recording(server: &MockServer, insert_status: u16, times: u64) {
    Mock::given(method("POST"))
      .and(path("/rest/v1/user_missions"))
      .respond_with(ResponseTemplate::new(insert_status))
      .expect(times)
      .mount(server)
      .await;
    Mock::given(method("POST"))
      .and(path("/rest/v1/rpc/add_points_to_profile"))
      .respond_with(ResponseTemplate::new(204))
      .expect(if insert_status < 300 { times } else { 0 })
      .mount(server)
      .await;
  }

  #[tokio::test]
  async fn trivial_mission_records_once_without_vision_call() {
    let mut h = harness().await;
    expect_recording(&h.backend, 201, 1).await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&h.vision).await;

    let mut a = MissionAttempt::begin(mission(false, None), "d", &mut rng()).unwrap();
    assert!(!a.is_finished());
    assert_eq!(h.flow.settle(&mut a, &mut h.board).await, Some(true));
    assert_eq!(h.flow.settle(&mut a, &mut h.board).await, None);
    assert_eq!(a.recorded(), Some(true));
    assert!(a.is_finished());
  }

  #[tokio::test]
  async fn positive_photo_verification_awards_points() {
    let mut h = harness().await;
    expect_recording(&h.backend, 201, 1).await;
    Mock::given(method("POST"))
      .and(path("/models/gemini-2.0-flash:generateContent"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "parts": [{ "text": "YES - a reusable cup is shown." }] } }]
      })))
      .expect(1)
      .mount(&h.vision)
      .await;

    let photo = h.dir.path().join("cup.jpg");
    std::fs::write(&photo, b"jpeg").unwrap();
    let mut a = MissionAttempt::begin(mission(true, Some("Is this a reusable cup?")), "d", &mut rng()).unwrap();
    a.capture_evidence(photo.to_string_lossy()).unwrap();
    let outcome = h.flow.verify_evidence(&mut a).await.unwrap();
    assert!(outcome.success);
    assert_eq!(h.flow.settle(&mut a, &mut h.board).await, Some(true));
    assert_eq!(h.board.revision(), 1);
  }

  #[tokio::test]
  async fn failed_verification_records_nothing_and_can_retry() {
    let mut h = harness().await;
    expect_recording(&h.backend, 201, 0).await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
      .mount(&h.vision)
      .await;

    let photo = h.dir.path().join("cup.png");
    std::fs::write(&photo, b"png").unwrap();
    let mut a = MissionAttempt::begin(mission(true, None), "d", &mut rng()).unwrap();
    a.capture_evidence(photo.to_string_lossy()).unwrap();
    let outcome = h.flow.verify_evidence(&mut a).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.response, "API Error: 503 - overloaded");
    assert_eq!(h.flow.settle(&mut a, &mut h.board).await, None);

    a.retry(&mut rng()).unwrap();
    assert!(a.outcome().is_none());
    a.capture_evidence(photo.to_string_lossy()).unwrap();
  }

  #[tokio::test]
  async fn error_body_mentioning_success_does_not_award_points() {
    let mut h = harness().await;
    expect_recording(&h.backend, 201, 0).await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(500).set_body_string("{\"success\":false}"))
      .mount(&h.vision)
      .await;

    let photo = h.dir.path().join("cup.jpg");
    std::fs::write(&photo, b"jpeg").unwrap();
    let mut a = MissionAttempt::begin(mission(true, None), "d", &mut rng()).unwrap();
    a.capture_evidence(photo.to_string_lossy()).unwrap();
    let outcome = h.flow.verify_evidence(&mut a).await.unwrap();
    assert_eq!(outcome.response, "API Error: 500 - {\"success\":false}");
    assert!(!outcome.success);
    assert_eq!(h.flow.settle(&mut a, &mut h.board).await, None);
  }

  #[tokio::test]
  async fn recording_failure_is_swallowed_and_never_retried() {
    let mut h = harness().await;
    expect_recording(&h.backend, 500, 1).await;

    let mut a = MissionAttempt::begin(mission(false, None), "d", &mut rng()).unwrap();
    assert_eq!(h.flow.settle(&mut a, &mut h.board).await, Some(false));
    assert_eq!(h.flow.settle(&mut a, &mut h.board).await, None);
    assert_eq!(a.state(), &AttemptState::Verified { success: true });
    assert!(h.board.error().is_some());
  }
}
