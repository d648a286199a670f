use serde::Serialize;

use crate::domain::{AchievedTrophy, Trophy};
use crate::repo::TrophyRepository;

use super::slot;

#[derive(Clone, Debug, Default, Serialize)]
pub struct TrophiesSnapshot {
  pub achieved: Vec<AchievedTrophy>,
  pub achieved_error: Option<String>,
  pub locked: Vec<Trophy>,
  pub locked_error: Option<String>,
}

pub struct TrophiesScreen {
  repo: TrophyRepository,
}

impl TrophiesScreen {
  pub fn new(repo: TrophyRepository) -> Self {
    Self { repo }
  }

  pub async fn load(&self) -> TrophiesSnapshot {
    let (achieved, locked) = tokio::join!(self.repo.achieved(), self.repo.not_received());
    let (achieved, achieved_error) = slot(achieved);
    let (locked, locked_error) = slot(locked);
    TrophiesSnapshot {
      achieved: achieved.unwrap_or_default(),
      achieved_error,
      locked: locked.unwrap_or_default(),
      locked_error,
    }
  }
}
