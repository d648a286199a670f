//! Domain records as returned by the backend, plus the small value types derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mission recurrence bucket. Unknown values are preserved instead of failing the list.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MissionCategory {
  Daily,
  Weekly,
  Monthly,
  Other(String),
}

impl From<String> for MissionCategory {
  fn from(s: String) -> Self {
    match s.to_ascii_lowercase().as_str() {
      "daily" => Self::Daily,
      "weekly" => Self::Weekly,
      "monthly" => Self::Monthly,
      _ => Self::Other(s),
    }
  }
}

impl From<MissionCategory> for String {
  fn from(c: MissionCategory) -> Self {
    match c {
      MissionCategory::Daily => "daily".into(),
      MissionCategory::Weekly => "weekly".into(),
      MissionCategory::Monthly => "monthly".into(),
      MissionCategory::Other(s) => s,
    }
  }
}

/// A mission the user can still complete.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mission {
  #[serde(rename = "mission_id")]
  pub id: i64,
  pub title: String,
  #[serde(default)] pub description: Option<String>,
  pub points: i64,
  #[serde(rename = "type")]
  pub category: MissionCategory,
  #[serde(default)] pub mission_pic: Option<String>,
  #[serde(default)] pub mission_prompt: Option<String>,
  #[serde(default)] pub camera: bool,
}

impl Mission {
  /// Prompt text, if present and not blank.
  pub fn prompt(&self) -> Option<&str> {
    self.mission_prompt.as_deref().filter(|p| !p.trim().is_empty())
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletedMission {
  #[serde(rename = "mission_id")]
  pub id: i64,
  pub title: String,
  #[serde(default)] pub description: Option<String>,
  pub points: i64,
  #[serde(rename = "type")]
  pub category: MissionCategory,
  #[serde(default)] pub mission_pic: Option<String>,
  pub completed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trophy {
  pub trophy_id: i64,
  pub name: String,
  pub description: String,
  #[serde(default)] pub condition: Option<String>,
  #[serde(default)] pub picture_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AchievedTrophy {
  pub trophy_id: i64,
  pub name: String,
  pub description: String,
  #[serde(default)] pub condition: Option<String>,
  pub earned_at: DateTime<Utc>,
  #[serde(default)] pub picture_url: Option<String>,
}

/// Ranking window for leaderboards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardPeriod {
  Daily,
  Weekly,
  Monthly,
}

impl LeaderboardPeriod {
  pub const ALL: [LeaderboardPeriod; 3] = [Self::Daily, Self::Weekly, Self::Monthly];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Daily => "daily",
      Self::Weekly => "weekly",
      Self::Monthly => "monthly",
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
  pub username: String,
  pub points: i64,
  pub rank: i64,
  #[serde(default)] pub updated_at: Option<DateTime<Utc>>,
  #[serde(default)] pub profile_pic: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
  pub user_id: String,
  pub username: String,
  #[serde(default)] pub first_name: Option<String>,
  #[serde(default)] pub last_name: Option<String>,
  #[serde(default)] pub profile_pic: Option<String>,
  #[serde(default)] pub daily_points: i64,
  #[serde(default)] pub weekly_points: i64,
  #[serde(default)] pub monthly_points: i64,
  #[serde(default)] pub points: i64,
  #[serde(default)] pub created_at: Option<DateTime<Utc>>,
}

/// Result of one photo verification attempt. Lives only as long as the attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
  pub success: bool,
  pub response: String,
}
