//! Multiple-choice quiz built from a mission prompt.
//!
//! Prompt layout: one answer per line, the first line is the correct one and the
//! rest are distractors. Blank lines and `\r` line endings are ignored.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

/// Options shown per quiz, correct answer included.
pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
  #[error("quiz prompt has no answers")]
  Empty,
  #[error("quiz prompt has a correct answer but no distractors")]
  NoDistractors,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuizBank {
  correct: String,
  distractors: Vec<String>,
}

impl QuizBank {
  pub fn parse(prompt: &str) -> Result<Self, QuizError> {
    let mut lines = prompt
      .split('\n')
      .map(|l| l.trim_end_matches('\r').trim())
      .filter(|l| !l.is_empty())
      .map(str::to_string);
    let correct = lines.next().ok_or(QuizError::Empty)?;
    let distractors: Vec<String> = lines.collect();
    if distractors.is_empty() {
      return Err(QuizError::NoDistractors);
    }
    Ok(Self { correct, distractors })
  }

  /// Up to three distractors sampled without replacement, plus the correct answer, shuffled.
  pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> QuizOptions {
    let mut options: Vec<String> = self
      .distractors
      .choose_multiple(rng, OPTION_COUNT - 1)
      .cloned()
      .collect();
    options.push(self.correct.clone());
    options.shuffle(rng);
    QuizOptions { options }
  }

  pub fn is_correct(&self, choice: &str) -> bool {
    choice == self.correct
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuizOptions {
  pub options: Vec<String>,
}
