use std::collections::BTreeMap;

use chrono::{Local, NaiveDate, TimeZone};
use serde::Serialize;

use crate::domain::CompletedMission;
use crate::repo::MissionsRepository;
use crate::supabase::BackendError;

#[derive(Clone, Debug, Serialize)]
pub struct HistoryDay {
  pub date: NaiveDate,
  pub missions: Vec<CompletedMission>,
}

/// Group completions by calendar day in `tz`, newest day first.
pub fn group_by_day<Tz: TimeZone>(missions: Vec<CompletedMission>, tz: &Tz) -> Vec<HistoryDay> {
  let mut days: BTreeMap<NaiveDate, Vec<CompletedMission>> = BTreeMap::new();
  for m in missions {
    let day = m.completed_at.with_timezone(tz).date_naive();
    days.entry(day).or_default().push(m);
  }
  days
    .into_iter()
    .rev()
    .map(|(date, missions)| HistoryDay { date, missions })
    .collect()
}

pub struct QuestHistoryScreen {
  repo: MissionsRepository,
}

impl QuestHistoryScreen {
  pub fn new(repo: MissionsRepository) -> Self {
    Self { repo }
  }

  pub async fn load(&self) -> Result<Vec<HistoryDay>, BackendError> {
    Ok(group_by_day(self.repo.history().await?, &Local))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{FixedOffset, Utc};
  use crate::domain::MissionCategory;

  fn done(id: i64, at: &str) -> CompletedMission {
    CompletedMission {
      id,
      title: format!("m{id}"),
      description: None,
      points: 5,
      category: MissionCategory::Daily,
      mission_pic: None,
      completed_at: at.parse().unwrap(),
    }
  }

  #[test]
  fn newest_day_first() {
    let days = group_by_day(
      vec![
        done(1, "2024-05-01T08:00:00Z"),
        done(2, "2024-05-03T08:00:00Z"),
        done(3, "2024-05-01T20:00:00Z"),
      ],
      &Utc,
    );
    let dates: Vec<String> = days.iter().map(|d| d.date.to_string()).collect();
    assert_eq!(dates, ["2024-05-03", "2024-05-01"]);
    assert_eq!(days[1].missions.len(), 2);
  }

  #[test]
  fn day_boundary_follows_the_time_zone() {
    let late = vec![done(1, "2024-05-01T23:30:00Z")];
    let tz = FixedOffset::east_opt(2 * 3600).unwrap();
    assert_eq!(group_by_day(late.clone(), &Utc)[0].date.to_string(), "2024-05-01");
    assert_eq!(group_by_day(late, &tz)[0].date.to_string(), "2024-05-02");
  }
}
