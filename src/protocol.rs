//! Public HTTP DTOs (serde ready). Screen snapshots are serialized as they are;
//! only requests and the attempt view need their own shapes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::VerificationOutcome;
use crate::flow::{AttemptState, MissionAttempt, Requirement};

#[derive(Deserialize)]
pub struct CredentialsIn {
  pub email: String,
  pub password: String,
}

#[derive(Serialize)]
pub struct SessionOut {
  #[serde(rename = "signedIn")]
  pub signed_in: bool,
  #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
}

/// Photo evidence: either a reference the gateway can read (path, `file://`, `content://`)
/// or the image itself, base64-encoded.
#[derive(Deserialize)]
pub struct EvidenceIn {
  #[serde(rename = "imageRef")]
  pub image_ref: Option<String>,
  #[serde(rename = "imageBase64")]
  pub image_base64: Option<String>,
  /// File extension for an uploaded image, e.g. "png". Defaults to jpg.
  pub extension: Option<String>,
}

#[derive(Deserialize)]
pub struct AnswerIn {
  pub option: String,
}

#[derive(Deserialize)]
pub struct PictureIn {
  #[serde(rename = "imageBase64")]
  pub image_base64: String,
}

#[derive(Serialize)]
pub struct AvailabilityOut {
  pub username: String,
  /// `null` when the name is blank and nothing was asked.
  pub available: Option<bool>,
}

#[derive(Serialize)]
pub struct AttemptOut {
  #[serde(rename = "attemptId")]
  pub attempt_id: Uuid,
  #[serde(rename = "missionId")]
  pub mission_id: i64,
  pub requirement: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub instruction: Option<String>,
  #[serde(flatten)]
  pub state: AttemptState,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub options: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub outcome: Option<VerificationOutcome>,
  /// Whether the completion reached the backend; absent until an award was due.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub recorded: Option<bool>,
}

pub fn attempt_out(a: &MissionAttempt) -> AttemptOut {
  let instruction = match a.requirement() {
    Requirement::Photo { instruction } => Some(instruction.clone()),
    _ => None,
  };
  AttemptOut {
    attempt_id: a.id,
    mission_id: a.mission.id,
    requirement: a.requirement().kind(),
    instruction,
    state: a.state().clone(),
    options: a.quiz().map(|q| q.options.clone()),
    outcome: a.outcome().cloned(),
    recorded: a.recorded(),
  }
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  #[serde(rename = "signedIn")]
  pub signed_in: bool,
  #[serde(rename = "visionConfigured")]
  pub vision_configured: bool,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Mission, MissionCategory};
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn mission(camera: bool, prompt: Option<&str>) -> Mission {
    Mission {
      id: 5,
      title: "Bike to work".into(),
      description: None,
      points: 20,
      category: MissionCategory::Weekly,
      mission_pic: None,
      mission_prompt: prompt.map(str::to_string),
      camera,
    }
  }

  #[test]
  fn photo_attempt_view_carries_instruction_and_flat_state() {
    let a = MissionAttempt::begin(mission(true, Some("Is there a bike?")), "d", &mut StdRng::seed_from_u64(1)).unwrap();
    let v = serde_json::to_value(attempt_out(&a)).unwrap();
    assert_eq!(v["state"], "not_started");
    assert_eq!(v["requirement"], "photo");
    assert_eq!(v["instruction"], "Is there a bike?");
    assert_eq!(v["missionId"], 5);
    assert!(v.get("options").is_none());
    assert!(v.get("recorded").is_none());
  }

  #[test]
  fn quiz_attempt_view_lists_options() {
    let a = MissionAttempt::begin(mission(false, Some("A\nB\nC\nD")), "d", &mut StdRng::seed_from_u64(1)).unwrap();
    let v = serde_json::to_value(attempt_out(&a)).unwrap();
    assert_eq!(v["requirement"], "quiz");
    assert_eq!(v["options"].as_array().unwrap().len(), 4);
  }
}
