use serde::Serialize;

use crate::domain::{LeaderboardEntry, LeaderboardPeriod};
use crate::repo::LeaderboardRepository;

use super::slot;

#[derive(Clone, Debug, Serialize)]
pub struct LeaderboardSnapshot {
  pub period: LeaderboardPeriod,
  pub top: Vec<LeaderboardEntry>,
  pub top_error: Option<String>,
  pub surrounding: Vec<LeaderboardEntry>,
  pub surrounding_error: Option<String>,
}

pub struct LeaderboardScreen {
  repo: LeaderboardRepository,
}

impl LeaderboardScreen {
  pub fn new(repo: LeaderboardRepository) -> Self {
    Self { repo }
  }

  pub async fn load(&self, period: LeaderboardPeriod) -> LeaderboardSnapshot {
    let (top, surrounding) = tokio::join!(self.repo.top_users(period), self.repo.surrounding_users(period));
    let (top, top_error) = slot(top);
    let (surrounding, surrounding_error) = slot(surrounding);
    LeaderboardSnapshot {
      period,
      top: top.unwrap_or_default(),
      top_error,
      surrounding: surrounding.unwrap_or_default(),
      surrounding_error,
    }
  }
}
